//! `#[repr(C)]` layouts of the frozen protocol (version 2400).
//!
//! The effect header, the time info record and the proc signatures come
//! from `vst::api`. The records below are the ones the bridge marshals
//! itself. Nothing here allocates or validates; the typed layers in
//! `ascii`, `events` and `buffer` and the two dispatch bridges are the only
//! code that reads or writes them.

use crate::ascii::{Ascii24, Ascii64, Ascii8};
use crate::flags::{ParameterFlag, PinFlag, SpeakerArrangementType};

pub use vst::api::{
    AEffect, DispatcherProc, GetParameterProc, HostCallbackProc, ProcessProc, ProcessProcF64,
    SetParameterProc, TimeInfo,
};

/// Protocol version reported by both sides.
pub const VST_VERSION: i32 = 2400;

/// `'VstP'`, first field of every effect header.
pub const EFFECT_MAGIC: i32 = i32::from_be_bytes(*b"VstP");

/// Pointer-sized integer used for `value` and the return slot.
pub type VstIntPtr = isize;

/// Exported module entry point (`VSTPluginMain`). A null callback arrives
/// as `None`.
pub type PluginMain = unsafe extern "C" fn(callback: Option<HostCallbackProc>) -> *mut AEffect;

/// Editor bounds in pixels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditorRectangle {
    pub top: i16,
    pub left: i16,
    pub bottom: i16,
    pub right: i16,
}

impl EditorRectangle {
    pub fn width(&self) -> i32 {
        i32::from(self.right) - i32::from(self.left)
    }

    pub fn height(&self) -> i32 {
        i32::from(self.bottom) - i32::from(self.top)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterProperties {
    pub step_float: f32,
    pub small_step_float: f32,
    pub large_step_float: f32,
    pub label: Ascii64,
    pub flags: ParameterFlag,
    pub min_integer: i32,
    pub max_integer: i32,
    pub step_integer: i32,
    pub large_step_integer: i32,
    pub short_label: Ascii8,
    pub display_index: i16,
    pub category: i16,
    pub num_parameters_in_category: i16,
    pub reserved: i16,
    pub category_label: Ascii24,
    pub future: [u8; 16],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PinProperties {
    pub label: Ascii64,
    pub flags: PinFlag,
    pub arrangement_type: i32,
    pub short_label: Ascii8,
    pub future: [u8; 48],
}

impl Default for PinProperties {
    fn default() -> Self {
        Self {
            label: Ascii64::new(),
            flags: PinFlag::empty(),
            arrangement_type: 0,
            short_label: Ascii8::new(),
            future: [0; 48],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpeakerProperties {
    pub azimuth: f32,
    pub elevation: f32,
    pub radius: f32,
    pub reserved: f32,
    pub name: Ascii64,
    pub speaker_type: i32,
    pub future: [u8; 28],
}

impl Default for SpeakerProperties {
    fn default() -> Self {
        Self {
            azimuth: 0.0,
            elevation: 0.0,
            radius: 0.0,
            reserved: 0.0,
            name: Ascii64::new(),
            speaker_type: 0,
            future: [0; 28],
        }
    }
}

/// Maximum speakers carried inline by [`SpeakerArrangement`].
pub const MAX_SPEAKERS: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpeakerArrangement {
    pub arrangement_type: i32,
    pub num_channels: i32,
    pub speakers: [SpeakerProperties; MAX_SPEAKERS],
}

impl SpeakerArrangement {
    pub fn new(kind: SpeakerArrangementType, num_channels: usize) -> Self {
        Self {
            arrangement_type: kind.raw(),
            num_channels: num_channels.min(MAX_SPEAKERS) as i32,
            speakers: [SpeakerProperties::default(); MAX_SPEAKERS],
        }
    }

    pub fn kind(&self) -> SpeakerArrangementType {
        SpeakerArrangementType::from_raw(i64::from(self.arrangement_type))
    }
}

impl Default for SpeakerArrangement {
    fn default() -> Self {
        Self::new(SpeakerArrangementType::Empty, 0)
    }
}
