//! Typed access to the host's generic callback.
//!
//! Each method performs exactly one callback invocation with the argument
//! layout of its opcode and decodes the reply.

use std::ffi::{c_void, CString};
use vst2_core::ascii::{read_c_string, Ascii64};
use vst2_core::{
    AEffect, AutomationState, CanDoResponse, EventList, HostCallbackProc, HostCanDo,
    HostLanguage, HostOpcode, ProcessLevel, TimeInfo, TimeInfoFlag,
};

/// The host callback bound to one effect instance.
///
/// A detached callback (no host function) answers every request with 0.
#[derive(Clone, Copy)]
pub struct HostCallback {
    callback: Option<HostCallbackProc>,
    effect: usize,
}

impl HostCallback {
    pub fn new(callback: HostCallbackProc, effect: *mut AEffect) -> Self {
        Self {
            callback: Some(callback),
            effect: effect as usize,
        }
    }

    pub fn detached() -> Self {
        Self {
            callback: None,
            effect: 0,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.callback.is_some()
    }

    /// Raw generic invocation.
    pub fn call(&self, op: HostOpcode, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        let Some(callback) = self.callback else {
            return 0;
        };
        tracing::trace!("host callback {} index={} value={}", op, index, value);
        callback(self.effect as *mut AEffect, op.raw(), index, value, ptr, opt)
    }

    fn ask(&self, op: HostOpcode) -> isize {
        self.call(op, 0, 0, std::ptr::null_mut(), 0.0)
    }

    pub fn version(&self) -> i32 {
        self.ask(HostOpcode::Version) as i32
    }

    pub fn sample_rate(&self) -> f64 {
        self.ask(HostOpcode::GetSampleRate) as f64
    }

    pub fn buffer_size(&self) -> usize {
        self.ask(HostOpcode::GetBufferSize).max(0) as usize
    }

    pub fn process_level(&self) -> ProcessLevel {
        ProcessLevel::from_raw(self.ask(HostOpcode::GetCurrentProcessLevel) as i64)
    }

    /// Time info with at least the requested validity bits, if the host
    /// provides any.
    pub fn time_info(&self, flags: TimeInfoFlag) -> Option<TimeInfo> {
        let ptr = self.call(
            HostOpcode::GetTime,
            0,
            flags.bits() as isize,
            std::ptr::null_mut(),
            0.0,
        ) as *const TimeInfo;
        if ptr.is_null() {
            return None;
        }
        // SAFETY: a non-zero reply is the address of a host-owned time info.
        Some(unsafe { *ptr })
    }

    pub fn update_display(&self) -> bool {
        self.ask(HostOpcode::UpdateDisplay) > 0
    }

    /// Reports a parameter change made by the effect itself.
    pub fn automate(&self, index: i32, value: f32) {
        self.call(HostOpcode::Automate, index, 0, std::ptr::null_mut(), value);
    }

    pub fn idle(&self) {
        self.ask(HostOpcode::Idle);
    }

    /// Sends events to the host. The list must outlive the call only.
    pub fn process_events(&self, events: &EventList) -> bool {
        self.call(HostOpcode::ProcessEvents, 0, 0, events.as_void_ptr(), 0.0) > 0
    }

    pub fn io_changed(&self) -> bool {
        self.ask(HostOpcode::IOChanged) > 0
    }

    pub fn size_window(&self, width: i32, height: i32) -> bool {
        self.call(HostOpcode::SizeWindow, width, height as isize, std::ptr::null_mut(), 0.0) > 0
    }

    pub fn input_latency(&self) -> i32 {
        self.ask(HostOpcode::GetInputLatency) as i32
    }

    pub fn output_latency(&self) -> i32 {
        self.ask(HostOpcode::GetOutputLatency) as i32
    }

    pub fn automation_state(&self) -> AutomationState {
        AutomationState::from_raw(self.ask(HostOpcode::GetAutomationState) as i64)
    }

    pub fn vendor_string(&self) -> String {
        self.fetch_ascii64(HostOpcode::GetVendorString)
    }

    pub fn product_string(&self) -> String {
        self.fetch_ascii64(HostOpcode::GetProductString)
    }

    pub fn vendor_version(&self) -> i32 {
        self.ask(HostOpcode::GetVendorVersion) as i32
    }

    pub fn can_do(&self, key: &HostCanDo) -> CanDoResponse {
        let Ok(key) = CString::new(key.as_str()) else {
            return CanDoResponse::Maybe;
        };
        let reply = self.call(HostOpcode::CanDo, 0, 0, key.as_ptr() as *mut c_void, 0.0);
        CanDoResponse::from_raw(reply as i64)
    }

    pub fn language(&self) -> HostLanguage {
        HostLanguage::from_raw(self.ask(HostOpcode::GetLanguage) as i64)
    }

    /// Directory the host associates with this effect; empty when unknown.
    pub fn directory(&self) -> String {
        let ptr = self.ask(HostOpcode::GetDirectory) as *const std::ffi::c_char;
        // SAFETY: a non-zero reply is a host-owned null-terminated string.
        unsafe { read_c_string(ptr) }
    }

    pub fn begin_edit(&self, index: i32) -> bool {
        self.call(HostOpcode::BeginEdit, index, 0, std::ptr::null_mut(), 0.0) > 0
    }

    pub fn end_edit(&self, index: i32) -> bool {
        self.call(HostOpcode::EndEdit, index, 0, std::ptr::null_mut(), 0.0) > 0
    }

    fn fetch_ascii64(&self, op: HostOpcode) -> String {
        let mut text = Ascii64::new();
        self.call(op, 0, 0, text.as_mut_ptr().cast(), 0.0);
        text.decode()
    }
}

impl std::fmt::Debug for HostCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCallback")
            .field("attached", &self.is_attached())
            .field("effect", &format_args!("{:#x}", self.effect))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vst2_core::ascii::copy_ascii;
    use std::sync::OnceLock;
    use vst2_core::api::VstIntPtr;

    fn time() -> &'static TimeInfo {
        static TIME: OnceLock<TimeInfo> = OnceLock::new();
        TIME.get_or_init(|| TimeInfo {
            sample_pos: 128.0,
            sample_rate: 48_000.0,
            tempo: 120.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            flags: TimeInfoFlag::TEMPO_VALID.bits(),
            ..Default::default()
        })
    }

    static DIRECTORY: &[u8] = b"/opt/plugins\0";

    extern "C" fn fake_host(
        _effect: *mut AEffect,
        opcode: i32,
        index: i32,
        value: VstIntPtr,
        ptr: *mut c_void,
        opt: f32,
    ) -> VstIntPtr {
        match HostOpcode::from_raw(opcode) {
            Some(HostOpcode::Version) => 2400,
            Some(HostOpcode::GetSampleRate) => 48_000,
            Some(HostOpcode::GetBufferSize) => 256,
            Some(HostOpcode::GetCurrentProcessLevel) => 2,
            Some(HostOpcode::GetTime) => time() as *const TimeInfo as VstIntPtr,
            Some(HostOpcode::GetVendorString) => {
                let slot = unsafe { std::slice::from_raw_parts_mut(ptr as *mut u8, 64) };
                copy_ascii(slot, "Acme Audio");
                1
            }
            Some(HostOpcode::CanDo) => {
                let key = unsafe { read_c_string(ptr as *const _) };
                if key == "sizeWindow" {
                    1
                } else {
                    -1
                }
            }
            Some(HostOpcode::GetDirectory) => DIRECTORY.as_ptr() as VstIntPtr,
            Some(HostOpcode::SizeWindow) => (index == 640 && value == 480) as VstIntPtr,
            Some(HostOpcode::Automate) => (index == 3 && opt == 0.5) as VstIntPtr,
            _ => 0,
        }
    }

    #[test]
    fn test_typed_requests_decode_replies() {
        let host = HostCallback::new(fake_host, std::ptr::null_mut());
        assert_eq!(host.version(), 2400);
        assert_eq!(host.sample_rate(), 48_000.0);
        assert_eq!(host.buffer_size(), 256);
        assert_eq!(host.process_level(), ProcessLevel::Realtime);
        assert_eq!(host.vendor_string(), "Acme Audio");
        assert_eq!(host.directory(), "/opt/plugins");
        assert!(host.size_window(640, 480));
        assert!(!host.size_window(1, 1));
        assert_eq!(host.can_do(&HostCanDo::SizeWindow), CanDoResponse::Yes);
        assert_eq!(host.can_do(&HostCanDo::Offline), CanDoResponse::No);
        assert_eq!(host.language(), HostLanguage::Unknown);
    }

    #[test]
    fn test_time_info_copies_host_record() {
        let host = HostCallback::new(fake_host, std::ptr::null_mut());
        let info = host.time_info(TimeInfoFlag::TEMPO_VALID).expect("host provides time info");
        assert_eq!(info.tempo, 120.0);
        assert!(TimeInfoFlag::from_bits(info.flags).contains(TimeInfoFlag::TEMPO_VALID));
    }

    #[test]
    fn test_detached_answers_zero() {
        let host = HostCallback::detached();
        assert!(!host.is_attached());
        assert_eq!(host.version(), 0);
        assert!(host.time_info(TimeInfoFlag::empty()).is_none());
        assert_eq!(host.directory(), "");
        assert_eq!(host.product_string(), "");
        assert!(!host.begin_edit(0));
    }
}
