//! Host side of the VST2 dispatch bridge
//!
//! Loads a VST2 module, creates effect instances and drives them through
//! typed operations. Callbacks from the plugin are decoded into a [`Host`]
//! handler set, or handled by any [`HostCallbackFn`].
//!
//! ## Usage
//!
//! ```ignore
//! use vst2_host::{Host, Module};
//! use vst2_core::{DoubleBuffer, HostConfig};
//!
//! let config = HostConfig::new(44_100.0, 64);
//! let module = Module::open("/usr/lib/vst/gain.so")?;
//! let mut plugin = module.plugin(Host::from_config(&config).callback())?;
//! plugin.start();
//! plugin.set_sample_rate(config.sample_rate);
//! plugin.set_buffer_size(config.block_size);
//! plugin.resume();
//!
//! let input = DoubleBuffer::new(plugin.num_inputs(), config.block_size);
//! let mut output = DoubleBuffer::new(plugin.num_outputs(), config.block_size);
//! plugin.process_double(&input, &mut output);
//! plugin.close();
//! ```

mod host;
pub use host::{bound_instances, noop_host_callback, Host, HostCallbackFn, HostCallbackHandler};

mod loader;
pub use loader::Module;

mod paths;
pub use paths::scan_paths;

mod plugin;
pub use plugin::{InstanceState, Plugin, MAX_CHUNK_LEN};

pub use vst2_core::{BridgeError, HostConfig, LoadStage, Result};
