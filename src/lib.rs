//! # vst2-bridge
//!
//! Bridge between the generic VST2 dispatch ABI and typed Rust code, in
//! both directions.
//!
//! ## Architecture
//!
//! - **vst2-core** - Wire layouts, opcode tables, string slots, event and
//!   buffer marshaling, instance registry
//! - **vst2-host** - Load a module and drive its instances through typed
//!   operations; decode plugin callbacks into a typed host
//! - **vst2-plugin** - Export an effect; route generic host calls to typed
//!   handlers and call the host back through a typed wrapper
//!
//! ## Quick Start
//!
//! ```ignore
//! use vst2_bridge::host::{Host, Module};
//! use vst2_bridge::HostConfig;
//!
//! let module = Module::open("/usr/lib/vst/gain.so")?;
//! let plugin = module.plugin(Host::from_config(&HostConfig::default()).callback())?;
//! plugin.start();
//! println!("{} params", plugin.num_params());
//! plugin.close();
//! ```
//!
//! ## Feature Flags
//!
//! - `host` (default) - Module loading and instance control
//! - `plugin` (default) - Effect export

/// Re-export of vst2-core for direct access
pub use vst2_core as core;

pub use vst2_core::{
    BridgeError, ChannelBuffer, DoubleBuffer, Event, EventList, EventsRef, FloatBuffer,
    HostCanDo, HostConfig, HostOpcode, Language, LoadStage, MidiEvent, PluginCanDo,
    PluginCategory, PluginFlag, PluginOpcode, Result, Signal, SysExEvent, VST_VERSION,
};

#[cfg(feature = "host")]
pub use vst2_host as host;

#[cfg(feature = "plugin")]
pub use vst2_plugin as plugin;
