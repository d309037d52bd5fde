//! Stereo gain effect exported as a VST2 module.
//!
//! Used by the host tests to drive the whole bridge in-process, and builds
//! as a `cdylib` that any VST2 host can load.

use parking_lot::Mutex;
use std::sync::Arc;
use vst2_plugin::{
    export_vst2, CanDoResponse, Channels, ChannelsMut, Dispatcher, EditorRectangle, HostCallback,
    Parameter, Plugin, PluginAllocator, PluginCanDo, PluginCategory, Sample,
};

pub const UNIQUE_ID: [u8; 4] = *b"BrGn";
pub const NAME: &str = "Bridge Gain";
pub const VENDOR: &str = "vst2-bridge";
pub const VERSION: i32 = 1000;
pub const DEFAULT_GAIN: f32 = 0.5;

/// Editor bounds reported to hosts; no window is ever drawn.
pub const EDITOR_RECT: EditorRectangle = EditorRectangle {
    top: 0,
    left: 0,
    bottom: 120,
    right: 240,
};

pub struct GainAllocator;

impl PluginAllocator for GainAllocator {
    fn allocate(host: HostCallback) -> (Plugin, Dispatcher) {
        let host_version = host.version();
        tracing::debug!("{} created by a version {} host", NAME, host_version);
        let gain_param = Parameter::new("Gain", DEFAULT_GAIN)
            .display(|v| format!("{:.0}%", v * 100.0));
        let gain = gain_param.handle();
        let preset: Arc<Mutex<Vec<u8>>> = Arc::default();

        let plugin = Plugin::new(UNIQUE_ID, NAME)
            .vendor(VENDOR)
            .version(VERSION)
            .category(PluginCategory::Effect)
            .channels(2, 2)
            .parameter(gain_param)
            .program("Default")
            .program("Unity")
            .process_float({
                let gain = gain.clone();
                move |input, output| apply_gain(input, output, gain.get())
            })
            .process_double({
                let gain = gain.clone();
                move |input, output| apply_gain(input, output, f64::from(gain.get()))
            });

        let dispatcher = Dispatcher::new()
            .on_state_changed(move |resumed| {
                if resumed {
                    let rate = host.sample_rate();
                    tracing::debug!("{} resumed, host rate {} Hz", NAME, rate);
                }
            })
            .on_can_do(|key| match key {
                PluginCanDo::Bypass | PluginCanDo::ReceiveEvents => CanDoResponse::Yes,
                PluginCanDo::Offline => CanDoResponse::No,
                _ => CanDoResponse::Maybe,
            })
            .on_process_events(|events| {
                tracing::trace!("{} received {} events", NAME, events.len());
            })
            .on_get_chunk({
                let gain = gain.clone();
                let preset = Arc::clone(&preset);
                move |is_preset| {
                    if is_preset {
                        preset.lock().clone()
                    } else {
                        gain.get().to_le_bytes().to_vec()
                    }
                }
            })
            .on_set_chunk(move |data, is_preset| {
                if let Ok(bytes) = <[u8; 4]>::try_from(data) {
                    gain.set(f32::from_le_bytes(bytes));
                }
                if is_preset {
                    *preset.lock() = data.to_vec();
                }
            })
            .on_editor_get_rect(|| Some(EDITOR_RECT))
            .on_set_bypass(|_| true)
            .on_tail_size(|| 1);

        (plugin, dispatcher)
    }
}

fn apply_gain<T>(input: Channels<'_, T>, mut output: ChannelsMut<'_, T>, gain: T)
where
    T: Sample + std::ops::Mul<Output = T>,
{
    for (channel, out) in output.iter_mut().enumerate() {
        match input.get(channel) {
            Some(src) => {
                for (o, &i) in out.iter_mut().zip(src) {
                    *o = i * gain;
                }
            }
            None => out.fill(T::from_f64(0.0)),
        }
    }
}

export_vst2!(GainAllocator);
