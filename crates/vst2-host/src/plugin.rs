//! Host-side handle to one effect instance.
//!
//! Each typed operation is exactly one generic dispatch with the argument
//! layout of its opcode. Replies are decoded per opcode: booleans as `> 0`,
//! counts as plain integers, and pointers as addresses the plugin still owns.

use crate::host::{self, HostCallbackFn, PendingBinding};
use parking_lot::Mutex;
use std::ffi::{c_void, CString};
use std::ptr::NonNull;
use std::sync::Arc;
use vst2_core::ascii::{Ascii24, Ascii32, Ascii64, Ascii8};
use vst2_core::{
    AEffect, BridgeError, CanDoResponse, DoubleBuffer, EditorRectangle, EventList, FloatBuffer,
    InstanceId, ParameterProperties, PinProperties, PluginCanDo, PluginCategory, PluginFlag,
    PluginOpcode, ProcessPrecision, Result, SpeakerArrangement,
};

/// Largest chunk copied out of a plugin.
pub const MAX_CHUNK_LEN: usize = 256 * 1024 * 1024;

/// Lifecycle of an instance as seen by the host. Tracked for diagnostics;
/// calls out of order are still dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Unopened,
    Open,
    Suspended,
    Resumed,
    Closed,
}

/// An effect instance created by [`Module::plugin`](crate::Module::plugin).
pub struct Plugin {
    effect: NonNull<AEffect>,
    binding: InstanceId,
    state: Mutex<InstanceState>,
    _library: Option<Arc<libloading::Library>>,
}

// SAFETY: the effect is only reached through `&self`/`&mut self` methods and
// the protocol allows calls from any thread as long as they are not
// concurrent process calls on one instance.
unsafe impl Send for Plugin {}

impl Plugin {
    /// Wraps a freshly created effect and binds `callback` to it.
    pub(crate) fn new(
        effect: NonNull<AEffect>,
        callback: HostCallbackFn,
        library: Option<Arc<libloading::Library>>,
    ) -> Self {
        let binding = host::bind(effect.as_ptr(), callback);
        Self {
            effect,
            binding,
            state: Mutex::new(InstanceState::Unopened),
            _library: library,
        }
    }

    fn header(&self) -> &AEffect {
        // SAFETY: the effect stays allocated until plugClose, which only
        // `shutdown` sends.
        unsafe { self.effect.as_ref() }
    }

    /// Raw effect header address.
    pub fn as_ptr(&self) -> *mut AEffect {
        self.effect.as_ptr()
    }

    pub fn state(&self) -> InstanceState {
        *self.state.lock()
    }

    fn transition(&self, next: InstanceState) {
        let mut state = self.state.lock();
        tracing::debug!("effect {:p}: {:?} -> {:?}", self.effect, *state, next);
        *state = next;
    }

    /// One generic call into the plugin.
    pub fn dispatch(
        &self,
        op: PluginOpcode,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        opt: f32,
    ) -> isize {
        if self.state() == InstanceState::Closed {
            panic!("{} dispatched to closed effect {:p}", op, self.effect);
        }
        tracing::trace!("dispatch {} index={} value={} opt={}", op, index, value, opt);
        (self.header().dispatcher)(self.effect.as_ptr(), op.raw(), index, value, ptr, opt)
    }

    fn send(&self, op: PluginOpcode) -> isize {
        self.dispatch(op, 0, 0, std::ptr::null_mut(), 0.0)
    }

    /// `plugOpen`.
    pub fn start(&self) {
        self.send(PluginOpcode::Open);
        self.transition(InstanceState::Open);
    }

    /// Sends `plugClose` and releases the callback binding. Callbacks the
    /// plugin issues while closing still reach this instance's host.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.state() == InstanceState::Closed {
            return;
        }
        // The header address is free for reuse as soon as Close returns.
        let closing = host::unbind(self.binding).map(PendingBinding::install);
        self.send(PluginOpcode::Close);
        self.transition(InstanceState::Closed);
        drop(closing);
        tracing::info!("effect {:p} closed (binding {})", self.effect, self.binding);
    }

    pub fn resume(&self) {
        self.dispatch(PluginOpcode::StateChanged, 0, 1, std::ptr::null_mut(), 0.0);
        self.transition(InstanceState::Resumed);
    }

    pub fn suspend(&self) {
        self.dispatch(PluginOpcode::StateChanged, 0, 0, std::ptr::null_mut(), 0.0);
        self.transition(InstanceState::Suspended);
    }

    pub fn set_sample_rate(&self, sample_rate: f64) {
        self.dispatch(PluginOpcode::SetSampleRate, 0, 0, std::ptr::null_mut(), sample_rate as f32);
    }

    /// Maximum frames per process call.
    pub fn set_buffer_size(&self, frames: usize) {
        self.dispatch(PluginOpcode::SetBufferSize, 0, frames as isize, std::ptr::null_mut(), 0.0);
    }

    pub fn set_block_size_and_sample_rate(&self, frames: usize, sample_rate: f64) {
        self.dispatch(
            PluginOpcode::SetBlockSizeAndSampleRate,
            0,
            frames as isize,
            std::ptr::null_mut(),
            sample_rate as f32,
        );
    }

    /// Returns whether the plugin accepts the arrangements.
    pub fn set_speaker_arrangement(
        &self,
        input: &SpeakerArrangement,
        output: &SpeakerArrangement,
    ) -> bool {
        self.dispatch(
            PluginOpcode::SetSpeakerArrangement,
            0,
            input as *const SpeakerArrangement as isize,
            output as *const SpeakerArrangement as *mut c_void,
            0.0,
        ) > 0
    }

    /// Parameter name: "Release", "Gain".
    pub fn param_name(&self, index: i32) -> String {
        let mut text = Ascii8::new();
        self.dispatch(PluginOpcode::GetParamName, index, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    /// Parameter value text: "0.5", "HALL".
    pub fn param_value_name(&self, index: i32) -> String {
        let mut text = Ascii8::new();
        self.dispatch(PluginOpcode::GetParamDisplay, index, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    /// Parameter unit: "dB", "ms".
    pub fn param_unit_name(&self, index: i32) -> String {
        let mut text = Ascii8::new();
        self.dispatch(PluginOpcode::GetParamLabel, index, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    pub fn param_value(&self, index: i32) -> f32 {
        (self.header().getParameter)(self.effect.as_ptr(), index)
    }

    pub fn set_param_value(&self, index: i32, value: f32) {
        (self.header().setParameter)(self.effect.as_ptr(), index, value)
    }

    /// `None` when the plugin does not describe the parameter.
    pub fn param_properties(&self, index: i32) -> Option<ParameterProperties> {
        let mut props = ParameterProperties::default();
        let reply = self.dispatch(
            PluginOpcode::GetParameterProperties,
            index,
            0,
            &mut props as *mut ParameterProperties as *mut c_void,
            0.0,
        );
        (reply > 0).then_some(props)
    }

    pub fn can_be_automated(&self, index: i32) -> bool {
        self.dispatch(PluginOpcode::CanBeAutomated, index, 0, std::ptr::null_mut(), 0.0) > 0
    }

    /// Sets a parameter from its text form. Returns whether it was accepted.
    pub fn string_to_parameter(&self, index: i32, text: &str) -> bool {
        let Ok(text) = CString::new(text) else {
            return false;
        };
        self.dispatch(PluginOpcode::String2Parameter, index, 0, text.as_ptr() as *mut c_void, 0.0) > 0
    }

    pub fn program(&self) -> i32 {
        self.send(PluginOpcode::GetProgram) as i32
    }

    pub fn set_program(&self, index: i32) {
        self.dispatch(PluginOpcode::SetProgram, 0, index as isize, std::ptr::null_mut(), 0.0);
    }

    pub fn current_program_name(&self) -> String {
        let mut text = Ascii24::new();
        self.dispatch(PluginOpcode::GetProgramName, 0, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    /// Renames the current program. At most 23 ASCII characters are kept.
    pub fn set_current_program_name(&self, name: &str) {
        let mut text = Ascii24::encode(name);
        self.dispatch(PluginOpcode::SetProgramName, 0, 0, text.as_mut_ptr().cast(), 0.0);
    }

    pub fn program_name(&self, index: i32) -> String {
        let mut text = Ascii24::new();
        self.dispatch(PluginOpcode::GetProgramNameIndexed, index, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    /// Chunk of the current program.
    pub fn get_program_data(&self) -> Result<Vec<u8>> {
        self.get_chunk(true)
    }

    pub fn set_program_data(&self, data: &[u8]) {
        self.set_chunk(data, true);
    }

    /// Chunk of the whole bank.
    pub fn get_bank_data(&self) -> Result<Vec<u8>> {
        self.get_chunk(false)
    }

    pub fn set_bank_data(&self, data: &[u8]) {
        self.set_chunk(data, false);
    }

    fn get_chunk(&self, preset: bool) -> Result<Vec<u8>> {
        let mut data: *mut c_void = std::ptr::null_mut();
        let len = self.dispatch(
            PluginOpcode::GetChunk,
            preset as i32,
            0,
            &mut data as *mut *mut c_void as *mut c_void,
            0.0,
        );
        // SAFETY: the plugin keeps `data` alive until its next call.
        unsafe { copy_chunk(data, len) }
    }

    fn set_chunk(&self, data: &[u8], preset: bool) {
        self.dispatch(
            PluginOpcode::SetChunk,
            preset as i32,
            data.len() as isize,
            data.as_ptr() as *mut c_void,
            0.0,
        );
    }

    /// Delivers events for the next process call.
    pub fn send_events(&self, events: &EventList) {
        self.dispatch(PluginOpcode::ProcessEvents, 0, 0, events.as_void_ptr(), 0.0);
    }

    /// `None` when the plugin has no editor.
    pub fn editor_get_rect(&self) -> Option<EditorRectangle> {
        let mut rect: *mut EditorRectangle = std::ptr::null_mut();
        self.dispatch(
            PluginOpcode::EditGetRect,
            0,
            0,
            &mut rect as *mut *mut EditorRectangle as *mut c_void,
            0.0,
        );
        // SAFETY: a non-null reply points to a plugin-owned rectangle.
        (!rect.is_null()).then(|| unsafe { *rect })
    }

    /// Opens the editor inside a native parent window (HWND, NSView*, X11
    /// window).
    pub fn editor_open(&self, window: *mut c_void) -> bool {
        self.dispatch(PluginOpcode::EditOpen, 0, 0, window, 0.0) > 0
    }

    pub fn editor_close(&self) {
        self.send(PluginOpcode::EditClose);
    }

    pub fn editor_idle(&self) {
        self.send(PluginOpcode::EditIdle);
    }

    pub fn can_do(&self, key: &PluginCanDo) -> CanDoResponse {
        let Ok(key) = CString::new(key.as_str()) else {
            return CanDoResponse::Maybe;
        };
        let reply = self.dispatch(PluginOpcode::CanDo, 0, 0, key.as_ptr() as *mut c_void, 0.0);
        CanDoResponse::from_raw(reply as i64)
    }

    /// Tail in samples. 0 means default, 1 means no tail.
    pub fn tail_size(&self) -> usize {
        self.send(PluginOpcode::GetTailSize).max(0) as usize
    }

    pub fn input_properties(&self, index: i32) -> Option<PinProperties> {
        self.pin_properties(PluginOpcode::GetInputProperties, index)
    }

    pub fn output_properties(&self, index: i32) -> Option<PinProperties> {
        self.pin_properties(PluginOpcode::GetOutputProperties, index)
    }

    fn pin_properties(&self, op: PluginOpcode, index: i32) -> Option<PinProperties> {
        let mut props = PinProperties::default();
        let reply = self.dispatch(op, index, 0, &mut props as *mut PinProperties as *mut c_void, 0.0);
        (reply > 0).then_some(props)
    }

    pub fn vst_version(&self) -> i32 {
        self.send(PluginOpcode::GetVstVersion) as i32
    }

    pub fn plugin_name(&self) -> String {
        let mut text = Ascii32::new();
        self.dispatch(PluginOpcode::GetPluginName, 0, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    pub fn vendor_string(&self) -> String {
        let mut text = Ascii64::new();
        self.dispatch(PluginOpcode::GetVendorString, 0, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    pub fn product_string(&self) -> String {
        let mut text = Ascii64::new();
        self.dispatch(PluginOpcode::GetProductString, 0, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }

    pub fn vendor_version(&self) -> i32 {
        self.send(PluginOpcode::GetVendorVersion) as i32
    }

    pub fn category(&self) -> PluginCategory {
        PluginCategory::from_raw(self.send(PluginOpcode::GetPlugCategory) as i64)
    }

    pub fn set_bypass(&self, bypass: bool) -> bool {
        self.dispatch(PluginOpcode::SetBypass, 0, bypass as isize, std::ptr::null_mut(), 0.0) > 0
    }

    pub fn start_process(&self) {
        self.send(PluginOpcode::StartProcess);
    }

    pub fn stop_process(&self) {
        self.send(PluginOpcode::StopProcess);
    }

    pub fn set_process_precision(&self, precision: ProcessPrecision) -> bool {
        self.dispatch(
            PluginOpcode::SetProcessPrecision,
            0,
            precision.raw() as isize,
            std::ptr::null_mut(),
            0.0,
        ) > 0
    }

    pub fn idle(&self) {
        self.send(PluginOpcode::Idle);
    }

    pub fn num_params(&self) -> usize {
        self.header().numParams.max(0) as usize
    }

    pub fn num_programs(&self) -> usize {
        self.header().numPrograms.max(0) as usize
    }

    pub fn num_inputs(&self) -> usize {
        self.header().numInputs.max(0) as usize
    }

    pub fn num_outputs(&self) -> usize {
        self.header().numOutputs.max(0) as usize
    }

    pub fn flags(&self) -> PluginFlag {
        PluginFlag::from_bits(self.header().flags)
    }

    pub fn unique_id(&self) -> i32 {
        self.header().uniqueId
    }

    pub fn version(&self) -> i32 {
        self.header().version
    }

    /// Latency in samples.
    pub fn initial_delay(&self) -> i32 {
        self.header().initialDelay
    }

    pub fn can_process_f32(&self) -> bool {
        self.flags().contains(PluginFlag::FLOAT_PROCESSING)
    }

    pub fn can_process_f64(&self) -> bool {
        self.flags().contains(PluginFlag::DOUBLE_PROCESSING)
    }

    fn check_buffers(&self, in_channels: usize, out_channels: usize, in_frames: usize, out_frames: usize) {
        assert_eq!(
            in_frames, out_frames,
            "input has {} frames, output has {}",
            in_frames, out_frames
        );
        assert!(
            in_channels >= self.num_inputs(),
            "input buffer has {} channels, plugin reads {}",
            in_channels,
            self.num_inputs()
        );
        assert!(
            out_channels >= self.num_outputs(),
            "output buffer has {} channels, plugin writes {}",
            out_channels,
            self.num_outputs()
        );
    }

    /// Single precision processing over the whole buffer length.
    ///
    /// # Panics
    /// When frame counts differ or a buffer has fewer channels than the
    /// plugin declares.
    pub fn process_float(&mut self, input: &FloatBuffer, output: &mut FloatBuffer) {
        self.check_buffers(input.channels(), output.channels(), input.frames(), output.frames());
        if !self.can_process_f32() {
            return;
        }
        // Both pointer arrays cover the declared channels for `frames` samples.
        (self.header().processReplacing)(
            self.effect.as_ptr(),
            input.as_raw() as *const *const f32,
            output.as_raw_mut(),
            input.frames() as i32,
        );
    }

    /// Double precision processing over the whole buffer length.
    ///
    /// # Panics
    /// Same conditions as [`process_float`](Self::process_float).
    pub fn process_double(&mut self, input: &DoubleBuffer, output: &mut DoubleBuffer) {
        self.check_buffers(input.channels(), output.channels(), input.frames(), output.frames());
        if !self.can_process_f64() {
            return;
        }
        (self.header().processReplacingF64)(
            self.effect.as_ptr(),
            input.as_raw() as *const *const f64,
            output.as_raw_mut(),
            input.frames() as i32,
        );
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        let mut s = f.debug_struct("Plugin");
        s.field("effect", &self.effect).field("state", &state);
        if state != InstanceState::Closed {
            s.field("unique_id", &self.unique_id())
                .field("params", &self.num_params())
                .field("io", &(self.num_inputs(), self.num_outputs()));
        }
        s.finish()
    }
}

/// Copies a plugin-owned chunk.
///
/// # Safety
/// `data` must be null or valid for reads of `len` bytes.
unsafe fn copy_chunk(data: *const c_void, len: isize) -> Result<Vec<u8>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let malformed = |reason: String| {
        tracing::warn!("rejecting chunk reply: {}", reason);
        BridgeError::MalformedReply {
            opcode: PluginOpcode::GetChunk,
            reason,
        }
    };
    let Ok(len) = usize::try_from(len) else {
        return Err(malformed(format!("negative length {}", len)));
    };
    if len > MAX_CHUNK_LEN {
        return Err(malformed(format!("length {} exceeds {}", len, MAX_CHUNK_LEN)));
    }
    if data.is_null() {
        return Err(malformed(format!("null data with length {}", len)));
    }
    // SAFETY: checked non-null; the caller guarantees `len` readable bytes.
    Ok(unsafe { std::slice::from_raw_parts(data as *const u8, len) }.to_vec())
}
