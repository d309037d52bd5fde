//! Per-channel pointer-array buffers used by the process calls.
//!
//! The host side owns a [`ChannelBuffer`]: one flat planar allocation plus
//! an array with one pointer per channel, which is what `processReplacing`
//! and `processDoubleReplacing` receive. The plugin side sees the same
//! arrays through the borrowed [`Channels`] / [`ChannelsMut`] views.

use crate::signal::Signal;
use std::marker::PhantomData;

/// Sample precision carried by the protocol.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + 'static {
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Sample for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

/// Owned planar buffer with a wire pointer array.
pub struct ChannelBuffer<T: Sample> {
    channels: usize,
    frames: usize,
    data: Vec<T>,
    ptrs: Vec<*mut T>,
}

pub type FloatBuffer = ChannelBuffer<f32>;
pub type DoubleBuffer = ChannelBuffer<f64>;

// SAFETY: the pointer array only addresses `data`, which the buffer owns.
unsafe impl<T: Sample> Send for ChannelBuffer<T> {}
unsafe impl<T: Sample> Sync for ChannelBuffer<T> {}

impl<T: Sample> ChannelBuffer<T> {
    pub fn new(channels: usize, frames: usize) -> Self {
        let mut data = vec![T::default(); channels * frames];
        let base = data.as_mut_ptr();
        // SAFETY: every offset stays inside the allocation of channels * frames.
        let ptrs = (0..channels)
            .map(|ch| unsafe { base.add(ch * frames) })
            .collect();
        Self {
            channels,
            frames,
            data,
            ptrs,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Copies `signal` into the buffer, converting precision.
    ///
    /// Panics when the channel counts differ. Copies
    /// `min(self.frames, signal.frames())` frames.
    pub fn write(&mut self, signal: &Signal) {
        assert_eq!(
            self.channels,
            signal.channels(),
            "buffer has {} channels, signal has {}",
            self.channels,
            signal.channels()
        );
        let frames = self.frames.min(signal.frames());
        for ch in 0..self.channels {
            let dst = &mut self.data[ch * self.frames..ch * self.frames + frames];
            for (frame, sample) in dst.iter_mut().enumerate() {
                *sample = T::from_f64(signal.sample(ch, frame));
            }
        }
    }

    /// Copies the buffer into `signal`. Same shape rules as [`write`](Self::write).
    pub fn read(&self, signal: &mut Signal) {
        assert_eq!(
            self.channels,
            signal.channels(),
            "buffer has {} channels, signal has {}",
            self.channels,
            signal.channels()
        );
        let frames = self.frames.min(signal.frames());
        for ch in 0..self.channels {
            for (frame, &sample) in self.channel(ch)[..frames].iter().enumerate() {
                signal.set_sample(ch, frame, sample.to_f64());
            }
        }
    }

    /// Convenience for `read` into a fresh signal of the buffer's shape.
    pub fn to_signal(&self) -> Signal {
        let mut signal = Signal::new(self.channels, self.frames);
        self.read(&mut signal);
        signal
    }

    pub fn channel(&self, index: usize) -> &[T] {
        &self.data[index * self.frames..(index + 1) * self.frames]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [T] {
        &mut self.data[index * self.frames..(index + 1) * self.frames]
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Pointer array for the wire. Valid while the buffer is alive and not
    /// borrowed mutably elsewhere.
    pub fn as_raw(&self) -> *mut *mut T {
        self.ptrs.as_ptr() as *mut *mut T
    }

    pub fn as_raw_mut(&mut self) -> *mut *mut T {
        self.ptrs.as_mut_ptr()
    }

    pub fn as_channels(&self) -> Channels<'_, T> {
        // SAFETY: the pointer array and data outlive the returned borrow.
        unsafe { Channels::from_raw(self.ptrs.as_ptr() as *const *const T, self.channels, self.frames) }
    }

    pub fn as_channels_mut(&mut self) -> ChannelsMut<'_, T> {
        // SAFETY: the exclusive borrow of self covers every channel.
        unsafe { ChannelsMut::from_raw(self.ptrs.as_mut_ptr(), self.channels, self.frames) }
    }
}

impl<T: Sample> std::fmt::Debug for ChannelBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBuffer")
            .field("channels", &self.channels)
            .field("frames", &self.frames)
            .finish()
    }
}

/// Read-only view over a wire pointer array.
#[derive(Clone, Copy)]
pub struct Channels<'a, T> {
    ptrs: *const *const T,
    channels: usize,
    frames: usize,
    _marker: PhantomData<&'a [T]>,
}

impl<'a, T: Sample> Channels<'a, T> {
    /// A null `ptrs` yields an empty view.
    ///
    /// # Safety
    /// `ptrs` must be null or address `channels` pointers, each null or valid
    /// for reads of `frames` samples during `'a`.
    pub unsafe fn from_raw(ptrs: *const *const T, channels: usize, frames: usize) -> Self {
        Self {
            ptrs,
            channels: if ptrs.is_null() { 0 } else { channels },
            frames,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn get(&self, index: usize) -> Option<&'a [T]> {
        if index >= self.channels {
            return None;
        }
        // SAFETY: index is in range and the caller of `from_raw` vouched for
        // every non-null channel pointer.
        unsafe {
            let ptr = *self.ptrs.add(index);
            if ptr.is_null() {
                None
            } else {
                Some(std::slice::from_raw_parts(ptr, self.frames))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [T]> + '_ {
        (0..self.channels).filter_map(move |i| self.get(i))
    }
}

/// Writable view over a wire pointer array.
pub struct ChannelsMut<'a, T> {
    ptrs: *mut *mut T,
    channels: usize,
    frames: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T: Sample> ChannelsMut<'a, T> {
    /// # Safety
    /// Same as [`Channels::from_raw`], with write access, and no two channel
    /// pointers may overlap.
    pub unsafe fn from_raw(ptrs: *mut *mut T, channels: usize, frames: usize) -> Self {
        Self {
            ptrs,
            channels: if ptrs.is_null() { 0 } else { channels },
            frames,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn get(&self, index: usize) -> Option<&[T]> {
        self.raw(index)
            // SAFETY: see `from_raw`.
            .map(|ptr| unsafe { std::slice::from_raw_parts(ptr as *const T, self.frames) })
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.raw(index)
            // SAFETY: see `from_raw`; the exclusive borrow prevents aliasing.
            .map(|ptr| unsafe { std::slice::from_raw_parts_mut(ptr, self.frames) })
    }

    /// Mutable slices of every non-null channel at once.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut [T]> + '_ {
        let frames = self.frames;
        (0..self.channels)
            .filter_map(|i| self.raw(i))
            .collect::<Vec<_>>()
            .into_iter()
            // SAFETY: channel pointers are disjoint per `from_raw`.
            .map(move |ptr| unsafe { std::slice::from_raw_parts_mut(ptr, frames) })
    }

    pub fn fill(&mut self, value: T) {
        for channel in self.iter_mut() {
            channel.fill(value);
        }
    }

    fn raw(&self, index: usize) -> Option<*mut T> {
        if index >= self.channels {
            return None;
        }
        // SAFETY: index is in range of the pointer array.
        let ptr = unsafe { *self.ptrs.add(index) };
        (!ptr.is_null()).then_some(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(channels: usize, frames: usize) -> Signal {
        let mut signal = Signal::new(channels, frames);
        for ch in 0..channels {
            for frame in 0..frames {
                signal.set_sample(ch, frame, (ch * 100 + frame) as f64 / 1000.0);
            }
        }
        signal
    }

    #[test]
    fn test_write_read_reproduces_signal() {
        for (channels, frames) in [(0, 0), (1, 1), (2, 64), (3, 17)] {
            let signal = ramp(channels, frames);

            let mut double = DoubleBuffer::new(channels, frames);
            double.write(&signal);
            assert_eq!(double.to_signal(), signal, "f64 {}x{}", channels, frames);

            let mut float = FloatBuffer::new(channels, frames);
            float.write(&signal);
            let back = float.to_signal();
            for ch in 0..channels {
                for frame in 0..frames {
                    let want = signal.sample(ch, frame) as f32;
                    assert_eq!(back.sample(ch, frame) as f32, want, "f32 {}x{}", channels, frames);
                }
            }
        }
    }

    #[test]
    fn test_pointer_array_addresses_planar_channels() {
        let mut buffer = FloatBuffer::new(2, 4);
        buffer.channel_mut(1).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let raw = buffer.as_raw();
        unsafe {
            let second = *raw.add(1);
            assert_eq!(*second.add(2), 3.0);
            assert_eq!(**raw, 0.0);
        }
    }

    #[test]
    fn test_frames_copied_is_minimum() {
        let signal = ramp(2, 8);
        let mut buffer = DoubleBuffer::new(2, 4);
        buffer.write(&signal);
        assert_eq!(buffer.channel(1), &[0.1, 0.101, 0.102, 0.103]);

        let mut longer = Signal::new(2, 6);
        longer.fill(9.0);
        buffer.read(&mut longer);
        assert_eq!(longer.sample(0, 3), 0.003);
        assert_eq!(longer.sample(0, 4), 9.0, "frames past the buffer stay untouched");
    }

    #[test]
    #[should_panic(expected = "channels")]
    fn test_write_channel_mismatch_panics() {
        let mut buffer = FloatBuffer::new(2, 16);
        buffer.write(&Signal::new(1, 16));
    }

    #[test]
    #[should_panic(expected = "channels")]
    fn test_read_channel_mismatch_panics() {
        let buffer = DoubleBuffer::new(1, 16);
        buffer.read(&mut Signal::new(2, 16));
    }

    #[test]
    fn test_views_over_wire_arrays() {
        let mut buffer = DoubleBuffer::new(2, 3);
        {
            let mut view = buffer.as_channels_mut();
            assert_eq!(view.len(), 2);
            view.fill(0.25);
            view.get_mut(0).unwrap()[1] = 0.75;
            assert!(view.get_mut(2).is_none());
        }
        let view = buffer.as_channels();
        assert_eq!(view.frames(), 3);
        assert_eq!(view.get(0).unwrap(), &[0.25, 0.75, 0.25]);
        assert_eq!(view.iter().count(), 2);
    }

    #[test]
    fn test_null_views_are_empty() {
        let view = unsafe { Channels::<f32>::from_raw(std::ptr::null(), 4, 16) };
        assert!(view.is_empty());
        assert!(view.get(0).is_none());

        let mut ptrs = [std::ptr::null_mut::<f32>(); 2];
        let mut view = unsafe { ChannelsMut::from_raw(ptrs.as_mut_ptr(), 2, 16) };
        assert_eq!(view.len(), 2);
        assert!(view.get_mut(0).is_none());
        assert_eq!(view.iter_mut().count(), 0);
    }
}
