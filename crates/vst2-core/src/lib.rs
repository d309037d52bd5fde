//! Shared protocol layer for the VST2 dispatch bridge
//!
//! Both directions of the bridge speak one fixed call shape,
//! `(opcode, index, value, ptr, opt) -> isize`. This crate holds what the
//! host and plugin sides have in common:
//!
//! - `api`: `#[repr(C)]` layouts of the effect header and the records passed
//!   through `ptr`
//! - `opcode` / `flags`: the two opcode tables, capability bits and value
//!   enumerations
//! - `ascii`: fixed 8/24/32/64 byte string slots
//! - `events`: owned and borrowed event blocks
//! - `buffer` / `signal`: per-channel pointer arrays and the host-native
//!   interleaved signal
//! - `registry`: native address to instance state lookup
//!
//! Protocol version 2400 is the only one supported.

pub mod api;
pub mod ascii;
pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod flags;
pub mod opcode;
pub mod registry;
pub mod signal;

pub use api::{
    AEffect, EditorRectangle, HostCallbackProc, ParameterProperties, PinProperties, PluginMain,
    SpeakerArrangement, TimeInfo, EFFECT_MAGIC, VST_VERSION,
};
pub use ascii::{Ascii24, Ascii32, Ascii64, Ascii8};
pub use buffer::{ChannelBuffer, Channels, ChannelsMut, DoubleBuffer, FloatBuffer, Sample};
pub use config::{HostConfig, Language};
pub use error::{BridgeError, LoadStage, Result};
pub use events::{Event, EventList, EventVec, EventsRef, MidiEvent, SysExEvent};
pub use flags::{
    AutomationState, CanDoResponse, HostCanDo, HostLanguage, MidiEventFlag, ParameterFlag,
    PinFlag, PluginCanDo, PluginCategory, PluginFlag, ProcessLevel, ProcessPrecision,
    SpeakerArrangementType, TimeInfoFlag,
};
pub use opcode::{HostOpcode, PluginOpcode};
pub use registry::{InstanceId, InstanceRegistry};
pub use signal::Signal;
