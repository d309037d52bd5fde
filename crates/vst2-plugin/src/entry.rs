//! Effect construction and the generic → typed router.
//!
//! [`plugin_main`] is the module entry point. It allocates the effect header,
//! lets the [`PluginAllocator`] build the typed plugin, and registers the
//! instance under the header's address. The `extern "C"` functions stored in
//! the header look the instance up again on every call.

use crate::dispatcher::{Dispatcher, WindowHandle};
use crate::host::HostCallback;
use crate::plugin::Plugin;
use parking_lot::Mutex;
use std::ffi::{c_void, CStr};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};
use vst2_core::ascii::{read_c_string, write_slot};
use vst2_core::{
    AEffect, Channels, ChannelsMut, EditorRectangle, EventsRef, HostCallbackProc, InstanceRegistry,
    ParameterProperties, PluginCanDo, PluginFlag, PluginOpcode, SpeakerArrangement,
    EFFECT_MAGIC, VST_VERSION,
};

/// Builds the typed plugin and its handlers for one new instance.
pub trait PluginAllocator {
    fn allocate(host: HostCallback) -> (Plugin, Dispatcher);
}

/// Live state behind one effect header.
pub struct Instance {
    plugin: Plugin,
    dispatcher: Dispatcher,
    host: HostCallback,
    program: AtomicI32,
    program_names: Mutex<Vec<String>>,
    /// Last chunk handed out; the host reads it after the call returns.
    chunk: Mutex<Vec<u8>>,
    editor_rect: Mutex<EditorRectangle>,
}

impl Instance {
    fn new(plugin: Plugin, dispatcher: Dispatcher, host: HostCallback) -> Self {
        let program_names = plugin.programs.clone();
        Self {
            plugin,
            dispatcher,
            host,
            program: AtomicI32::new(0),
            program_names: Mutex::new(program_names),
            chunk: Mutex::new(Vec::new()),
            editor_rect: Mutex::new(EditorRectangle::default()),
        }
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn host(&self) -> HostCallback {
        self.host
    }

    pub fn program(&self) -> i32 {
        self.program.load(Ordering::Relaxed)
    }

    fn program_index(&self, index: isize) -> Option<usize> {
        let index = usize::try_from(index).ok()?;
        (index < self.plugin.programs.len()).then_some(index)
    }

    /// Routes one generic call to the typed plugin. Unknown opcodes and
    /// opcodes without a handler answer 0.
    ///
    /// # Safety
    /// `ptr` must satisfy the argument contract of `op`.
    pub unsafe fn dispatch(
        &self,
        op: PluginOpcode,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        opt: f32,
    ) -> isize {
        let d = &self.dispatcher;
        match op {
            PluginOpcode::SetProgram => {
                let Some(program) = self.program_index(value) else {
                    return 0;
                };
                self.program.store(program as i32, Ordering::Relaxed);
                1
            }
            PluginOpcode::GetProgram => self.program() as isize,
            PluginOpcode::SetProgramName => {
                if ptr.is_null() {
                    return 0;
                }
                let Some(current) = self.program_index(self.program() as isize) else {
                    return 0;
                };
                let name = unsafe { read_c_string(ptr as *const _) };
                self.program_names.lock()[current] = name;
                1
            }
            PluginOpcode::GetProgramName => {
                let names = self.program_names.lock();
                match names.get(self.program() as usize) {
                    Some(name) => (unsafe { write_slot::<24>(ptr, name) }) as isize,
                    None => 0,
                }
            }
            PluginOpcode::GetProgramNameIndexed => {
                let names = self.program_names.lock();
                match usize::try_from(index).ok().and_then(|i| names.get(i)) {
                    Some(name) => (unsafe { write_slot::<24>(ptr, name) }) as isize,
                    None => 0,
                }
            }
            PluginOpcode::GetParamName => self.write_param_text(index, ptr, |p| p.name.clone()),
            PluginOpcode::GetParamLabel => self.write_param_text(index, ptr, |p| p.unit.clone()),
            PluginOpcode::GetParamDisplay => self.write_param_text(index, ptr, |p| p.value_label()),
            PluginOpcode::CanBeAutomated => match self.plugin.parameter_at(index) {
                Some(param) if !param.not_automated => 1,
                _ => 0,
            },
            PluginOpcode::String2Parameter => {
                let Some(param) = self.plugin.parameter_at(index) else {
                    return 0;
                };
                if ptr.is_null() {
                    return 0;
                }
                let text = unsafe { CStr::from_ptr(ptr as *const _) }.to_string_lossy();
                match text.trim().parse::<f32>() {
                    Ok(value) => {
                        param.set_value(value);
                        1
                    }
                    Err(_) => 0,
                }
            }
            PluginOpcode::GetParameterProperties => {
                let Some(props) = self.plugin.parameter_at(index).and_then(|p| p.properties) else {
                    return 0;
                };
                if ptr.is_null() {
                    return 0;
                }
                unsafe { *(ptr as *mut ParameterProperties) = props };
                1
            }
            PluginOpcode::SetSampleRate => match &d.set_sample_rate {
                Some(f) => {
                    f(opt);
                    1
                }
                None => 0,
            },
            PluginOpcode::SetBufferSize => match &d.set_buffer_size {
                Some(f) => {
                    f(value.max(0) as usize);
                    1
                }
                None => 0,
            },
            PluginOpcode::StateChanged => match &d.state_changed {
                Some(f) => {
                    f(value != 0);
                    1
                }
                None => 0,
            },
            PluginOpcode::GetPluginName => (unsafe { write_slot::<32>(ptr, &self.plugin.name) }) as isize,
            PluginOpcode::GetProductString => {
                (unsafe { write_slot::<64>(ptr, &self.plugin.name) }) as isize
            }
            PluginOpcode::GetVendorString => {
                (unsafe { write_slot::<64>(ptr, &self.plugin.vendor) }) as isize
            }
            PluginOpcode::GetVendorVersion => self.plugin.version as isize,
            PluginOpcode::GetPlugCategory => self.plugin.category.raw() as isize,
            PluginOpcode::GetVstVersion => VST_VERSION as isize,
            PluginOpcode::CanDo => {
                let Some(f) = &d.can_do else {
                    return 0;
                };
                if ptr.is_null() {
                    return 0;
                }
                let key = unsafe { CStr::from_ptr(ptr as *const _) }.to_string_lossy();
                f(&PluginCanDo::from(&*key)).raw() as isize
            }
            PluginOpcode::ProcessEvents => {
                let Some(f) = &d.process_events else {
                    return 0;
                };
                match unsafe { EventsRef::from_raw(ptr as *const _) } {
                    Some(events) => {
                        f(events);
                        1
                    }
                    None => 0,
                }
            }
            PluginOpcode::GetChunk => {
                let Some(f) = &d.get_chunk else {
                    return 0;
                };
                if ptr.is_null() {
                    return 0;
                }
                let data = f(index > 0);
                let mut chunk = self.chunk.lock();
                *chunk = data;
                let out = ptr as *mut *mut c_void;
                if chunk.is_empty() {
                    unsafe { *out = std::ptr::null_mut() };
                    return 0;
                }
                unsafe { *out = chunk.as_mut_ptr().cast() };
                chunk.len() as isize
            }
            PluginOpcode::SetChunk => {
                let Some(f) = &d.set_chunk else {
                    return 0;
                };
                let data: &[u8] = if ptr.is_null() || value <= 0 {
                    &[]
                } else {
                    unsafe { std::slice::from_raw_parts(ptr as *const u8, value as usize) }
                };
                f(data, index > 0);
                1
            }
            PluginOpcode::SetSpeakerArrangement => {
                let Some(f) = &d.set_speaker_arrangement else {
                    return 0;
                };
                let input = value as *const SpeakerArrangement;
                let output = ptr as *const SpeakerArrangement;
                if input.is_null() || output.is_null() {
                    return 0;
                }
                f(unsafe { &*input }, unsafe { &*output }) as isize
            }
            PluginOpcode::EditGetRect => {
                let Some(f) = &d.editor_get_rect else {
                    return 0;
                };
                if ptr.is_null() {
                    return 0;
                }
                let Some(rect) = f() else {
                    return 0;
                };
                let mut stored = self.editor_rect.lock();
                *stored = rect;
                unsafe { *(ptr as *mut *mut EditorRectangle) = &mut *stored as *mut EditorRectangle };
                1
            }
            PluginOpcode::EditOpen => match &d.editor_open {
                Some(f) => f(WindowHandle(ptr)) as isize,
                None => 0,
            },
            PluginOpcode::EditClose => notify(&d.editor_close),
            PluginOpcode::EditIdle => notify(&d.editor_idle),
            PluginOpcode::SetBypass => match &d.set_bypass {
                Some(f) => f(value != 0) as isize,
                None => 0,
            },
            PluginOpcode::StartProcess => notify(&d.start_process),
            PluginOpcode::StopProcess => notify(&d.stop_process),
            PluginOpcode::GetTailSize => match &d.tail_size {
                Some(f) => f() as isize,
                None => 0,
            },
            _ => 0,
        }
    }

    fn write_param_text<F>(&self, index: i32, ptr: *mut c_void, text: F) -> isize
    where
        F: FnOnce(&crate::plugin::Parameter) -> String,
    {
        match self.plugin.parameter_at(index) {
            // SAFETY: parameter text opcodes carry an 8-byte slot in ptr.
            Some(param) => (unsafe { write_slot::<8>(ptr, &text(param)) }) as isize,
            None => 0,
        }
    }
}

fn notify(handler: &Option<Box<dyn Fn() + Send + Sync>>) -> isize {
    match handler {
        Some(f) => {
            f();
            1
        }
        None => 0,
    }
}

fn instances() -> &'static InstanceRegistry<Instance> {
    static INSTANCES: OnceLock<InstanceRegistry<Instance>> = OnceLock::new();
    INSTANCES.get_or_init(InstanceRegistry::new)
}

/// Number of live effect instances in this module.
pub fn live_instances() -> usize {
    instances().len()
}

/// Looks up the instance behind an effect header.
pub fn instance(effect: *const AEffect) -> Option<Arc<Instance>> {
    instances().lookup(effect as usize)
}

/// Header with every proc slot wired to the router. Capabilities are
/// announced through `flags`; a process slot without a typed callback
/// leaves the outputs untouched.
fn blank_effect() -> AEffect {
    AEffect {
        magic: 0,
        dispatcher: dispatch,
        _process: process_accumulating,
        setParameter: set_parameter,
        getParameter: get_parameter,
        numPrograms: 0,
        numParams: 0,
        numInputs: 0,
        numOutputs: 0,
        flags: 0,
        reserved1: 0,
        reserved2: 0,
        initialDelay: 0,
        _realQualities: 0,
        _offQualities: 0,
        _ioRatio: 1.0,
        object: std::ptr::null_mut(),
        user: std::ptr::null_mut(),
        uniqueId: 0,
        version: 0,
        processReplacing: process_replacing,
        processReplacingF64: process_double_replacing,
        future: [0; 56],
    }
}

/// Module entry point for allocator `A`.
///
/// # Safety
/// Must only be called by a host, with a callback valid for the lifetime of
/// the returned effect.
pub unsafe extern "C" fn plugin_main<A: PluginAllocator>(
    callback: Option<HostCallbackProc>,
) -> *mut AEffect {
    let Some(callback) = callback else {
        tracing::warn!("entry point called without a host callback");
        return std::ptr::null_mut();
    };

    let effect = Box::into_raw(Box::new(blank_effect()));
    let host = HostCallback::new(callback, effect);
    let (plugin, dispatcher) = A::allocate(host);

    let mut flags = plugin.header_flags();
    if dispatcher.has_chunks() {
        flags.insert(PluginFlag::PROGRAM_CHUNKS);
    }

    // SAFETY: effect was just allocated and is not shared yet.
    let header = unsafe { &mut *effect };
    header.magic = EFFECT_MAGIC;
    header.numPrograms = plugin.programs.len() as i32;
    header.numParams = plugin.parameters.len() as i32;
    header.numInputs = plugin.input_channels as i32;
    header.numOutputs = plugin.output_channels as i32;
    header.flags = flags.bits();
    header.initialDelay = plugin.initial_delay;
    header.uniqueId = plugin.unique_id_raw();
    header.version = plugin.version;

    tracing::info!(
        "created effect {:?} at {:p}: {} in / {} out, {} params",
        plugin.name,
        effect,
        plugin.input_channels,
        plugin.output_channels,
        plugin.parameters.len()
    );
    instances().register(effect as usize, Instance::new(plugin, dispatcher, host));
    effect
}

extern "C" fn dispatch(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let Some(instance) = instance(effect) else {
        tracing::warn!("dispatch {} for unknown effect {:p}", opcode, effect);
        return 0;
    };
    let Some(op) = PluginOpcode::from_raw(opcode) else {
        tracing::trace!("unknown plugin opcode {}", opcode);
        return 0;
    };
    tracing::trace!("dispatch {} index={} value={} opt={}", op, index, value, opt);

    match op {
        PluginOpcode::Close => {
            if let Some(close) = &instance.dispatcher.close {
                close();
            }
            instances().unregister(effect as usize);
            drop(instance);
            // SAFETY: the header came from Box::into_raw in plugin_main and
            // the host makes no call after close.
            drop(unsafe { Box::from_raw(effect) });
            tracing::debug!("effect {:p} closed", effect);
            0
        }
        // SAFETY: the host follows the argument contract of each opcode.
        _ => unsafe { instance.dispatch(op, index, value, ptr, opt) },
    }
}

extern "C" fn set_parameter(effect: *mut AEffect, index: i32, value: f32) {
    if let Some(param) = instance(effect).as_deref().and_then(|i| i.plugin.parameter_at(index)) {
        param.set_value(value);
    }
}

extern "C" fn get_parameter(effect: *mut AEffect, index: i32) -> f32 {
    instance(effect)
        .as_deref()
        .and_then(|i| i.plugin.parameter_at(index).map(|p| p.value()))
        .unwrap_or(0.0)
}

/// The accumulating process call is deprecated and never reaches the plugin.
extern "C" fn process_accumulating(
    _effect: *mut AEffect,
    _inputs: *const *const f32,
    _outputs: *mut *mut f32,
    _frames: i32,
) {
}

extern "C" fn process_replacing(
    effect: *mut AEffect,
    inputs: *const *const f32,
    outputs: *mut *mut f32,
    frames: i32,
) {
    let Some(instance) = instance(effect) else {
        return;
    };
    let Some(process) = &instance.plugin.process_float else {
        return;
    };
    let frames = frames.max(0) as usize;
    // SAFETY: the host hands one pointer per declared channel, each valid for
    // `frames` samples during the call.
    let (input, output) = unsafe {
        (
            Channels::from_raw(inputs, instance.plugin.input_channels, frames),
            ChannelsMut::from_raw(outputs, instance.plugin.output_channels, frames),
        )
    };
    process(input, output);
}

extern "C" fn process_double_replacing(
    effect: *mut AEffect,
    inputs: *const *const f64,
    outputs: *mut *mut f64,
    frames: i32,
) {
    let Some(instance) = instance(effect) else {
        return;
    };
    let Some(process) = &instance.plugin.process_double else {
        return;
    };
    let frames = frames.max(0) as usize;
    // SAFETY: see process_replacing.
    let (input, output) = unsafe {
        (
            Channels::from_raw(inputs, instance.plugin.input_channels, frames),
            ChannelsMut::from_raw(outputs, instance.plugin.output_channels, frames),
        )
    };
    process(input, output);
}

/// Exports `VSTPluginMain` for a [`PluginAllocator`].
///
/// ```ignore
/// vst2_plugin::export_vst2!(GainAllocator);
/// ```
#[macro_export]
macro_rules! export_vst2 {
    ($allocator:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn VSTPluginMain(
            callback: ::std::option::Option<$crate::HostCallbackProc>,
        ) -> *mut $crate::AEffect {
            $crate::plugin_main::<$allocator>(callback)
        }
    };
}
