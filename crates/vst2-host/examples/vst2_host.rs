//! # VST2 Host
//!
//! Load a VST2 module, print what it reports and run one block of audio
//! through it. Without an argument the bundled demo gain effect is used.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p vst2-host --example vst2_host -- /usr/lib/vst/plugin.so
//! ```

use std::env;
use vst2_core::{DoubleBuffer, FloatBuffer, HostConfig, PluginCanDo, Signal};
use vst2_host::{scan_paths, Host, Module, Result};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let module = match env::args().nth(1) {
        Some(path) => Module::open(path)?,
        None => {
            println!("No module given, using the demo effect. Default locations:");
            for path in scan_paths() {
                println!("  {}", path.display());
            }
            Module::from_entry("vst2-demo", vst2_demo::VSTPluginMain)
        }
    };

    let config = HostConfig::new(44_100.0, 64).product("vst2_host example");
    let host = Host::from_config(&config).on_automate(|index, value| {
        println!("plugin automated parameter {} to {:.3}", index, value);
    });

    let mut plugin = module.plugin(host.callback())?;
    plugin.start();
    plugin.set_sample_rate(config.sample_rate);
    plugin.set_buffer_size(config.block_size);

    println!(
        "{} by {} (version {}, category {:?})",
        plugin.plugin_name(),
        plugin.vendor_string(),
        plugin.vendor_version(),
        plugin.category()
    );
    println!(
        "{} in / {} out, {} params, {} programs, flags {:?}",
        plugin.num_inputs(),
        plugin.num_outputs(),
        plugin.num_params(),
        plugin.num_programs(),
        plugin.flags()
    );
    for index in 0..plugin.num_params() as i32 {
        println!(
            "  param {}: {} = {} {}",
            index,
            plugin.param_name(index),
            plugin.param_value_name(index),
            plugin.param_unit_name(index)
        );
    }
    println!("bypass: {:?}", plugin.can_do(&PluginCanDo::Bypass));

    plugin.resume();
    let frames = config.block_size;
    let signal = Signal::from_channels(&vec![vec![0.5; frames]; plugin.num_inputs()]);
    let mut result = Signal::new(plugin.num_outputs(), frames);
    if plugin.can_process_f64() {
        let mut input = DoubleBuffer::new(plugin.num_inputs(), frames);
        let mut output = DoubleBuffer::new(plugin.num_outputs(), frames);
        input.write(&signal);
        plugin.process_double(&input, &mut output);
        output.read(&mut result);
    } else if plugin.can_process_f32() {
        let mut input = FloatBuffer::new(plugin.num_inputs(), frames);
        let mut output = FloatBuffer::new(plugin.num_outputs(), frames);
        input.write(&signal);
        plugin.process_float(&input, &mut output);
        output.read(&mut result);
    }
    let peak = result.as_slice().iter().fold(0.0f64, |peak, s| peak.max(s.abs()));
    println!("processed {} frames, output peak {:.3}", frames, peak);

    plugin.suspend();
    plugin.close();
    module.close();
    Ok(())
}
