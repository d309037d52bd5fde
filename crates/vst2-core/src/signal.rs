//! Host-native multi-channel signal.

/// Owned interleaved `f64` buffer addressed by `(channel, frame)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    channels: usize,
    frames: usize,
    data: Vec<f64>,
}

impl Signal {
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            channels,
            frames,
            data: vec![0.0; channels * frames],
        }
    }

    /// Wraps interleaved samples. Trailing samples that do not fill a whole
    /// frame are discarded.
    pub fn from_interleaved(channels: usize, mut data: Vec<f64>) -> Self {
        let frames = if channels == 0 { 0 } else { data.len() / channels };
        data.truncate(channels * frames);
        Self {
            channels,
            frames,
            data,
        }
    }

    /// Builds a signal from per-channel slices. The frame count is the
    /// length of the shortest channel.
    pub fn from_channels<C: AsRef<[f64]>>(channels: &[C]) -> Self {
        let frames = channels.iter().map(|c| c.as_ref().len()).min().unwrap_or(0);
        let mut signal = Self::new(channels.len(), frames);
        for (ch, samples) in channels.iter().enumerate() {
            for (frame, &sample) in samples.as_ref()[..frames].iter().enumerate() {
                signal.set_sample(ch, frame, sample);
            }
        }
        signal
    }

    pub fn to_channels(&self) -> Vec<Vec<f64>> {
        (0..self.channels)
            .map(|ch| (0..self.frames).map(|frame| self.sample(ch, frame)).collect())
            .collect()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Panics when `channel` or `frame` is out of range.
    pub fn sample(&self, channel: usize, frame: usize) -> f64 {
        self.data[self.position(channel, frame)]
    }

    pub fn set_sample(&mut self, channel: usize, frame: usize, value: f64) {
        let pos = self.position(channel, frame);
        self.data[pos] = value;
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn position(&self, channel: usize, frame: usize) -> usize {
        assert!(
            channel < self.channels && frame < self.frames,
            "sample ({}, {}) outside {}x{} signal",
            channel,
            frame,
            self.channels,
            self.frames
        );
        frame * self.channels + channel
    }
}
