//! Test helpers and fixtures for bridge integration tests
//!
//! Every test drives the demo gain effect in-process through the full ABI:
//! host typed call → generic dispatch → plugin router → typed handler, and
//! back through the host trampoline for callbacks.

#![allow(dead_code)]

pub mod tolerances;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vst2_bridge::host::{Host, HostCallbackFn, Module, Plugin};
use vst2_bridge::{HostConfig, HostOpcode, Signal};

/// Sample rate used by the processing scenarios.
pub const TEST_SAMPLE_RATE: f64 = 44_100.0;

/// Frames per process call.
pub const TEST_BLOCK_SIZE: usize = 64;

pub fn test_config() -> HostConfig {
    HostConfig::new(TEST_SAMPLE_RATE, TEST_BLOCK_SIZE).product("bridge tests")
}

/// Routes bridge logs to the test harness output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn demo_module() -> Module {
    Module::from_entry(vst2_demo::NAME, vst2_demo::VSTPluginMain)
}

/// Demo instance, opened and configured but not resumed.
pub fn open_demo() -> Plugin {
    open_demo_with(Host::from_config(&test_config()).callback())
}

pub fn open_demo_with(callback: HostCallbackFn) -> Plugin {
    init_tracing();
    let plugin = demo_module()
        .plugin(callback)
        .expect("Failed to create demo instance");
    plugin.start();
    plugin.set_sample_rate(TEST_SAMPLE_RATE);
    plugin.set_buffer_size(TEST_BLOCK_SIZE);
    plugin
}

/// Callback that counts every request per opcode and answers 0, except
/// the sample rate.
pub struct CallCounter {
    counts: [AtomicUsize; 64],
}

impl Default for CallCounter {
    fn default() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicUsize::new(0)),
        }
    }
}

impl CallCounter {
    pub fn count(&self, op: HostOpcode) -> usize {
        self.counts[op.raw() as usize].load(Ordering::SeqCst)
    }

    pub fn callback(self: &Arc<Self>) -> HostCallbackFn {
        let counter = Arc::clone(self);
        Arc::new(
            move |op: HostOpcode, _index: i32, _value: isize, _ptr: *mut std::ffi::c_void, _opt: f32| {
                counter.counts[op.raw() as usize].fetch_add(1, Ordering::SeqCst);
                match op {
                    HostOpcode::GetSampleRate => TEST_SAMPLE_RATE as isize,
                    _ => 0,
                }
            },
        )
    }
}

/// Signal with every sample set to `value`.
pub fn constant_signal(channels: usize, frames: usize, value: f64) -> Signal {
    let mut signal = Signal::new(channels, frames);
    signal.fill(value);
    signal
}

/// Deterministic ramp, distinct per channel.
pub fn ramp_signal(channels: usize, frames: usize) -> Signal {
    let mut signal = Signal::new(channels, frames);
    for ch in 0..channels {
        for frame in 0..frames {
            signal.set_sample(ch, frame, (ch as f64 + 1.0) * frame as f64 / frames as f64);
        }
    }
    signal
}
