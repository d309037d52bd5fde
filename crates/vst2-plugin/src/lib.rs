//! Plugin side of the VST2 dispatch bridge
//!
//! An effect describes itself with a [`Plugin`] (identity, channels,
//! parameters, process functions) and a [`Dispatcher`] holding typed handlers
//! for the host calls it cares about. The bridge owns the effect header,
//! routes every generic host call to the matching handler and answers 0 for
//! the rest.
//!
//! ## Usage
//!
//! ```ignore
//! use vst2_plugin::{export_vst2, Dispatcher, HostCallback, Parameter, Plugin, PluginAllocator};
//!
//! struct Passthrough;
//!
//! impl PluginAllocator for Passthrough {
//!     fn allocate(_host: HostCallback) -> (Plugin, Dispatcher) {
//!         let plugin = Plugin::new(*b"Pass", "Passthrough")
//!             .parameter(Parameter::new("Level", 1.0))
//!             .process_float(|input, mut output| {
//!                 for (i, out) in output.iter_mut().enumerate() {
//!                     if let Some(src) = input.get(i) {
//!                         out.copy_from_slice(src);
//!                     }
//!                 }
//!             });
//!         (plugin, Dispatcher::new())
//!     }
//! }
//!
//! export_vst2!(Passthrough);
//! ```

mod dispatcher;
pub use dispatcher::{Dispatcher, WindowHandle};

mod entry;
pub use entry::{instance, live_instances, plugin_main, Instance, PluginAllocator};

mod host;
pub use host::HostCallback;

mod plugin;
pub use plugin::{Parameter, ParameterValue, Plugin, ProcessDoubleFn, ProcessFloatFn};

pub use vst2_core::{
    AEffect, CanDoResponse, Channels, ChannelsMut, EditorRectangle, Event, EventsRef,
    HostCallbackProc, HostCanDo, HostOpcode, ParameterProperties, PluginCanDo, PluginCategory,
    PluginFlag, PluginOpcode, Sample, SpeakerArrangement, TimeInfo, TimeInfoFlag,
};
