//! Effect descriptor: identity, channel layout, parameters and process
//! functions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vst2_core::{Channels, ChannelsMut, ParameterProperties, PluginCategory, PluginFlag};

/// Single precision process function.
pub type ProcessFloatFn =
    Box<dyn Fn(Channels<'_, f32>, ChannelsMut<'_, f32>) + Send + Sync + 'static>;

/// Double precision process function.
pub type ProcessDoubleFn =
    Box<dyn Fn(Channels<'_, f64>, ChannelsMut<'_, f64>) + Send + Sync + 'static>;

/// Shared, lock-free parameter value.
///
/// Cloning yields another handle to the same value, so a process function
/// can read what the host writes through `setParameter`.
#[derive(Clone, Debug, Default)]
pub struct ParameterValue(Arc<AtomicU32>);

impl ParameterValue {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// One automatable value, addressed by its index in [`Plugin::parameters`].
pub struct Parameter {
    pub name: String,
    /// Unit label: "dB", "ms".
    pub unit: String,
    pub not_automated: bool,
    pub properties: Option<ParameterProperties>,
    display: Option<Box<dyn Fn(f32) -> String + Send + Sync>>,
    value: ParameterValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            not_automated: false,
            properties: None,
            display: None,
            value: ParameterValue::new(default),
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn not_automated(mut self) -> Self {
        self.not_automated = true;
        self
    }

    pub fn properties(mut self, properties: ParameterProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Formats the value text shown by the host ("0.5", "HALL").
    pub fn display<F>(mut self, format: F) -> Self
    where
        F: Fn(f32) -> String + Send + Sync + 'static,
    {
        self.display = Some(Box::new(format));
        self
    }

    pub fn value(&self) -> f32 {
        self.value.get()
    }

    pub fn set_value(&self, value: f32) {
        self.value.set(value);
    }

    pub fn handle(&self) -> ParameterValue {
        self.value.clone()
    }

    pub fn value_label(&self) -> String {
        let value = self.value();
        match &self.display {
            Some(format) => format(value),
            None => format!("{:.2}", value),
        }
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("value", &self.value())
            .finish()
    }
}

/// Static description of an effect and its processing.
pub struct Plugin {
    /// Four character id, packed big-endian into the effect header.
    pub unique_id: [u8; 4],
    pub version: i32,
    pub name: String,
    pub vendor: String,
    pub category: PluginCategory,
    pub input_channels: usize,
    pub output_channels: usize,
    /// Extra capability bits. Processing and chunk bits are derived.
    pub flags: PluginFlag,
    /// Latency in samples.
    pub initial_delay: i32,
    pub parameters: Vec<Parameter>,
    /// Initial program names; their count is the program count.
    pub programs: Vec<String>,
    pub process_float: Option<ProcessFloatFn>,
    pub process_double: Option<ProcessDoubleFn>,
}

impl Default for Plugin {
    fn default() -> Self {
        Self {
            unique_id: *b"NoId",
            version: 1,
            name: String::new(),
            vendor: String::new(),
            category: PluginCategory::Effect,
            input_channels: 2,
            output_channels: 2,
            flags: PluginFlag::empty(),
            initial_delay: 0,
            parameters: Vec::new(),
            programs: Vec::new(),
            process_float: None,
            process_double: None,
        }
    }
}

impl Plugin {
    pub fn new(unique_id: [u8; 4], name: impl Into<String>) -> Self {
        Self {
            unique_id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn category(mut self, category: PluginCategory) -> Self {
        self.category = category;
        self
    }

    pub fn channels(mut self, inputs: usize, outputs: usize) -> Self {
        self.input_channels = inputs;
        self.output_channels = outputs;
        self
    }

    pub fn flags(mut self, flags: PluginFlag) -> Self {
        self.flags = flags;
        self
    }

    pub fn initial_delay(mut self, samples: i32) -> Self {
        self.initial_delay = samples;
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn program(mut self, name: impl Into<String>) -> Self {
        self.programs.push(name.into());
        self
    }

    pub fn process_float<F>(mut self, process: F) -> Self
    where
        F: Fn(Channels<'_, f32>, ChannelsMut<'_, f32>) + Send + Sync + 'static,
    {
        self.process_float = Some(Box::new(process));
        self
    }

    pub fn process_double<F>(mut self, process: F) -> Self
    where
        F: Fn(Channels<'_, f64>, ChannelsMut<'_, f64>) + Send + Sync + 'static,
    {
        self.process_double = Some(Box::new(process));
        self
    }

    pub fn unique_id_raw(&self) -> i32 {
        i32::from_be_bytes(self.unique_id)
    }

    /// Header flags: the declared bits plus one bit per defined process
    /// function.
    pub fn header_flags(&self) -> PluginFlag {
        let mut flags = self.flags;
        if self.process_float.is_some() {
            flags.insert(PluginFlag::FLOAT_PROCESSING);
        }
        if self.process_double.is_some() {
            flags.insert(PluginFlag::DOUBLE_PROCESSING);
        }
        flags
    }

    pub fn parameter_at(&self, index: i32) -> Option<&Parameter> {
        usize::try_from(index).ok().and_then(|i| self.parameters.get(i))
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("unique_id", &String::from_utf8_lossy(&self.unique_id))
            .field("name", &self.name)
            .field("vendor", &self.vendor)
            .field("channels", &(self.input_channels, self.output_channels))
            .field("parameters", &self.parameters)
            .field("programs", &self.programs)
            .finish()
    }
}
