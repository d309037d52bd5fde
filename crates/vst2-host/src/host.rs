//! Plugin → host callback routing.
//!
//! Every loaded effect receives the same `extern "C"` trampoline. It finds
//! the callback bound to the calling effect's address in a process-wide
//! registry. Callbacks issued while the entry point is still running come
//! before the effect address is known; they go to the binding pending on
//! the current thread. Closing works the other way round: the binding is
//! released by id before `Close` and stays pending on the closing thread
//! until the plugin has freed its header.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::ffi::{c_void, CString};
use std::sync::{Arc, OnceLock};
use vst2_core::ascii::{read_c_string, write_slot};
use vst2_core::{
    AEffect, AutomationState, CanDoResponse, EventsRef, HostCanDo, HostConfig, HostLanguage,
    HostOpcode, InstanceId, InstanceRegistry, ProcessLevel, TimeInfo, TimeInfoFlag, VST_VERSION,
};

/// Generic plugin → host handler: `(opcode, index, value, ptr, opt) -> reply`.
pub type HostCallbackHandler =
    dyn Fn(HostOpcode, i32, isize, *mut c_void, f32) -> isize + Send + Sync;

pub type HostCallbackFn = Arc<HostCallbackHandler>;

fn bindings() -> &'static InstanceRegistry<HostCallbackHandler> {
    static BINDINGS: OnceLock<InstanceRegistry<HostCallbackHandler>> = OnceLock::new();
    BINDINGS.get_or_init(InstanceRegistry::new)
}

thread_local! {
    static PENDING: RefCell<Option<HostCallbackFn>> = const { RefCell::new(None) };
}

/// Routes callbacks on this thread to `callback` until dropped.
pub(crate) struct PendingBinding {
    previous: Option<HostCallbackFn>,
}

impl PendingBinding {
    pub(crate) fn install(callback: HostCallbackFn) -> Self {
        let previous = PENDING.with(|pending| pending.borrow_mut().replace(callback));
        Self { previous }
    }
}

impl Drop for PendingBinding {
    fn drop(&mut self) {
        let previous = self.previous.take();
        PENDING.with(|pending| *pending.borrow_mut() = previous);
    }
}

pub(crate) fn bind(effect: *mut AEffect, callback: HostCallbackFn) -> InstanceId {
    bindings().register(effect as usize, callback)
}

/// Releases a binding. A newer effect at the same address keeps its own.
pub(crate) fn unbind(binding: InstanceId) -> Option<HostCallbackFn> {
    bindings().unregister_id(binding)
}

/// Number of effects with a bound host callback.
pub fn bound_instances() -> usize {
    bindings().len()
}

fn binding_for(effect: *mut AEffect) -> Option<HostCallbackFn> {
    bindings()
        .lookup(effect as usize)
        .or_else(|| PENDING.with(|pending| pending.borrow().clone()))
}

/// The host callback handed to every entry point.
pub(crate) extern "C" fn host_trampoline(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let Some(op) = HostOpcode::from_raw(opcode) else {
        tracing::trace!("unknown host opcode {} from {:p}", opcode, effect);
        return 0;
    };
    match binding_for(effect) {
        Some(callback) => callback(op, index, value, ptr, opt),
        None if op == HostOpcode::Version => VST_VERSION as isize,
        None => {
            tracing::warn!("{} from unknown effect {:p}", op, effect);
            0
        }
    }
}

/// Callback that answers every request with 0 and traces it.
pub fn noop_host_callback() -> HostCallbackFn {
    Arc::new(|op: HostOpcode, index: i32, value: isize, _ptr: *mut c_void, opt: f32| {
        tracing::trace!("host received {} index={} value={} opt={}", op, index, value, opt);
        0
    })
}

type Query<T> = Option<Box<dyn Fn() -> T + Send + Sync>>;
type Request<Arg, Ret> = Option<Box<dyn Fn(Arg) -> Ret + Send + Sync>>;

/// Typed host services. Requests without a handler are answered with 0.
#[derive(Default)]
pub struct Host {
    pub sample_rate: Query<f64>,
    pub buffer_size: Query<usize>,
    pub process_level: Query<ProcessLevel>,
    /// Requested validity bits in, snapshot out.
    pub time_info: Request<TimeInfoFlag, Option<TimeInfo>>,
    pub update_display: Query<bool>,
    /// Parameter index and new value.
    pub automate: Option<Box<dyn Fn(i32, f32) + Send + Sync>>,
    pub idle: Option<Box<dyn Fn() + Send + Sync>>,
    /// Events sent by the plugin; valid during the call only.
    pub process_events: Option<Box<dyn Fn(EventsRef<'_>) + Send + Sync>>,
    pub io_changed: Query<bool>,
    /// Width and height in pixels.
    pub size_window: Option<Box<dyn Fn(i32, i32) -> bool + Send + Sync>>,
    pub input_latency: Query<i32>,
    pub output_latency: Query<i32>,
    pub automation_state: Query<AutomationState>,
    pub vendor: Query<String>,
    pub product: Query<String>,
    pub vendor_version: Query<i32>,
    pub can_do: Option<Box<dyn Fn(&HostCanDo) -> CanDoResponse + Send + Sync>>,
    pub language: Query<HostLanguage>,
    pub directory: Query<String>,
    pub begin_edit: Request<i32, bool>,
    pub end_edit: Request<i32, bool>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host answering with the values of `config`.
    pub fn from_config(config: &HostConfig) -> Self {
        let sample_rate = config.sample_rate;
        let block_size = config.block_size;
        let vendor = config.vendor.clone();
        let product = config.product.clone();
        let vendor_version = config.vendor_version;
        let language = HostLanguage::from(config.language);
        let mut host = Self {
            sample_rate: Some(Box::new(move || sample_rate)),
            buffer_size: Some(Box::new(move || block_size)),
            vendor: Some(Box::new(move || vendor.clone())),
            product: Some(Box::new(move || product.clone())),
            vendor_version: Some(Box::new(move || vendor_version)),
            language: Some(Box::new(move || language)),
            ..Self::default()
        };
        if let Some(dir) = &config.directory {
            let dir = dir.to_string_lossy().into_owned();
            host.directory = Some(Box::new(move || dir.clone()));
        }
        host
    }

    pub fn on_automate<F>(mut self, f: F) -> Self
    where
        F: Fn(i32, f32) + Send + Sync + 'static,
    {
        self.automate = Some(Box::new(f));
        self
    }

    pub fn on_time_info<F>(mut self, f: F) -> Self
    where
        F: Fn(TimeInfoFlag) -> Option<TimeInfo> + Send + Sync + 'static,
    {
        self.time_info = Some(Box::new(f));
        self
    }

    pub fn on_process_events<F>(mut self, f: F) -> Self
    where
        F: Fn(EventsRef<'_>) + Send + Sync + 'static,
    {
        self.process_events = Some(Box::new(f));
        self
    }

    pub fn on_can_do<F>(mut self, f: F) -> Self
    where
        F: Fn(&HostCanDo) -> CanDoResponse + Send + Sync + 'static,
    {
        self.can_do = Some(Box::new(f));
        self
    }

    pub fn on_begin_edit<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) -> bool + Send + Sync + 'static,
    {
        self.begin_edit = Some(Box::new(f));
        self
    }

    pub fn on_end_edit<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) -> bool + Send + Sync + 'static,
    {
        self.end_edit = Some(Box::new(f));
        self
    }

    pub fn on_size_window<F>(mut self, f: F) -> Self
    where
        F: Fn(i32, i32) -> bool + Send + Sync + 'static,
    {
        self.size_window = Some(Box::new(f));
        self
    }

    pub fn on_idle<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.idle = Some(Box::new(f));
        self
    }

    /// Generic callback decoding every request into the typed handlers.
    pub fn callback(self) -> HostCallbackFn {
        let state = Arc::new(HostState {
            host: self,
            time: Mutex::new(TimeInfo::default()),
            directory: Mutex::new(CString::default()),
        });
        Arc::new(
            move |op: HostOpcode, index: i32, value: isize, ptr: *mut c_void, opt: f32| {
                state.handle(op, index, value, ptr, opt)
            },
        )
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("time_info", &self.time_info.is_some())
            .field("process_events", &self.process_events.is_some())
            .field("can_do", &self.can_do.is_some())
            .finish_non_exhaustive()
    }
}

/// Storage for replies the plugin reads through a returned address.
struct HostState {
    host: Host,
    time: Mutex<TimeInfo>,
    directory: Mutex<CString>,
}

fn flag(answer: bool) -> isize {
    answer as isize
}

impl HostState {
    fn handle(&self, op: HostOpcode, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        let h = &self.host;
        tracing::trace!("host callback {} index={} value={}", op, index, value);
        match op {
            HostOpcode::Version => VST_VERSION as isize,
            HostOpcode::Automate => {
                if let Some(f) = &h.automate {
                    f(index, opt);
                }
                0
            }
            HostOpcode::Idle => {
                if let Some(f) = &h.idle {
                    f();
                }
                0
            }
            HostOpcode::GetCurrentProcessLevel => {
                h.process_level.as_ref().map_or(0, |f| f().raw() as isize)
            }
            HostOpcode::GetSampleRate => h.sample_rate.as_ref().map_or(0, |f| f() as isize),
            HostOpcode::GetBufferSize => h.buffer_size.as_ref().map_or(0, |f| f() as isize),
            HostOpcode::GetTime => {
                let Some(f) = &h.time_info else {
                    return 0;
                };
                match f(TimeInfoFlag::from_bits(value as i32)) {
                    Some(info) => {
                        let mut time = self.time.lock();
                        *time = info;
                        &mut *time as *mut TimeInfo as isize
                    }
                    None => 0,
                }
            }
            HostOpcode::ProcessEvents => {
                let Some(f) = &h.process_events else {
                    return 0;
                };
                // SAFETY: the plugin passes an event block or null.
                if let Some(events) = unsafe { EventsRef::from_raw(ptr as *const _) } {
                    f(events);
                }
                1
            }
            HostOpcode::IOChanged => h.io_changed.as_ref().map_or(0, |f| flag(f())),
            HostOpcode::SizeWindow => {
                h.size_window.as_ref().map_or(0, |f| flag(f(index, value as i32)))
            }
            HostOpcode::GetInputLatency => h.input_latency.as_ref().map_or(0, |f| f() as isize),
            HostOpcode::GetOutputLatency => h.output_latency.as_ref().map_or(0, |f| f() as isize),
            HostOpcode::GetAutomationState => {
                h.automation_state.as_ref().map_or(0, |f| f().raw() as isize)
            }
            HostOpcode::GetVendorString => match &h.vendor {
                // SAFETY: the opcode carries a 64-byte slot.
                Some(f) => flag(unsafe { write_slot::<64>(ptr, &f()) }),
                None => 0,
            },
            HostOpcode::GetProductString => match &h.product {
                // SAFETY: as above.
                Some(f) => flag(unsafe { write_slot::<64>(ptr, &f()) }),
                None => 0,
            },
            HostOpcode::GetVendorVersion => h.vendor_version.as_ref().map_or(0, |f| f() as isize),
            HostOpcode::CanDo => {
                let Some(f) = &h.can_do else {
                    return 0;
                };
                // SAFETY: the opcode carries a null-terminated key.
                let key = unsafe { read_c_string(ptr as *const _) };
                f(&HostCanDo::from(key.as_str())).raw() as isize
            }
            HostOpcode::GetLanguage => h.language.as_ref().map_or(0, |f| f().raw() as isize),
            HostOpcode::GetDirectory => {
                let Some(f) = &h.directory else {
                    return 0;
                };
                let Ok(dir) = CString::new(f()) else {
                    return 0;
                };
                let mut stored = self.directory.lock();
                *stored = dir;
                stored.as_ptr() as isize
            }
            HostOpcode::UpdateDisplay => h.update_display.as_ref().map_or(0, |f| flag(f())),
            HostOpcode::BeginEdit => h.begin_edit.as_ref().map_or(0, |f| flag(f(index))),
            HostOpcode::EndEdit => h.end_edit.as_ref().map_or(0, |f| flag(f(index))),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use vst2_core::ascii::Ascii64;
    use vst2_core::{Event, EventList, MidiEvent};

    fn ask(callback: &HostCallbackFn, op: HostOpcode) -> isize {
        callback(op, 0, 0, std::ptr::null_mut(), 0.0)
    }

    #[test]
    fn test_from_config_answers_values() {
        let config = HostConfig::new(48_000.0, 128).vendor("Acme").directory("/opt/vst");
        let callback = Host::from_config(&config).callback();
        assert_eq!(ask(&callback, HostOpcode::Version), 2400);
        assert_eq!(ask(&callback, HostOpcode::GetSampleRate), 48_000);
        assert_eq!(ask(&callback, HostOpcode::GetBufferSize), 128);
        assert_eq!(ask(&callback, HostOpcode::GetLanguage), HostLanguage::English.raw() as isize);

        let mut vendor = Ascii64::new();
        let reply = callback(HostOpcode::GetVendorString, 0, 0, vendor.as_mut_ptr().cast(), 0.0);
        assert_eq!(reply, 1);
        assert_eq!(vendor.decode(), "Acme");

        let dir = ask(&callback, HostOpcode::GetDirectory) as *const std::ffi::c_char;
        assert_eq!(unsafe { read_c_string(dir) }, "/opt/vst");
    }

    #[test]
    fn test_missing_handlers_answer_zero() {
        let callback = Host::new().callback();
        assert_eq!(ask(&callback, HostOpcode::GetSampleRate), 0);
        assert_eq!(ask(&callback, HostOpcode::GetTime), 0);
        assert_eq!(ask(&callback, HostOpcode::CanDo), 0);
        assert_eq!(ask(&callback, HostOpcode::GetDirectory), 0);
        assert_eq!(ask(&callback, HostOpcode::OpenWindow), 0);
        assert_eq!(ask(&callback, HostOpcode::Version), 2400, "version is always known");
    }

    #[test]
    fn test_time_info_pointer_stays_valid() {
        let callback = Host::new()
            .on_time_info(|flags| {
                flags.contains(TimeInfoFlag::TEMPO_VALID).then(|| TimeInfo {
                    tempo: 140.0,
                    flags: TimeInfoFlag::TEMPO_VALID.bits(),
                    ..TimeInfo::default()
                })
            })
            .callback();
        let bits = TimeInfoFlag::TEMPO_VALID.bits() as isize;
        let reply = callback(HostOpcode::GetTime, 0, bits, std::ptr::null_mut(), 0.0);
        assert_ne!(reply, 0);
        let info = unsafe { *(reply as *const TimeInfo) };
        assert_eq!(info.tempo, 140.0);
        assert_eq!(callback(HostOpcode::GetTime, 0, 0, std::ptr::null_mut(), 0.0), 0);
    }

    #[test]
    fn test_automate_and_edit_notifications() {
        let last = Arc::new(AtomicI32::new(-1));
        let seen = Arc::clone(&last);
        let callback = Host::new()
            .on_automate(move |index, value| {
                assert_eq!(value, 0.25);
                seen.store(index, Ordering::SeqCst);
            })
            .on_begin_edit(|index| index == 2)
            .callback();
        callback(HostOpcode::Automate, 2, 0, std::ptr::null_mut(), 0.25);
        assert_eq!(last.load(Ordering::SeqCst), 2);
        assert_eq!(callback(HostOpcode::BeginEdit, 2, 0, std::ptr::null_mut(), 0.0), 1);
        assert_eq!(callback(HostOpcode::BeginEdit, 3, 0, std::ptr::null_mut(), 0.0), 0);
        assert_eq!(callback(HostOpcode::EndEdit, 2, 0, std::ptr::null_mut(), 0.0), 0);
    }

    #[test]
    fn test_process_events_and_can_do() {
        let count = Arc::new(AtomicI32::new(0));
        let seen = Arc::clone(&count);
        let callback = Host::new()
            .on_process_events(move |events| {
                seen.fetch_add(events.len() as i32, Ordering::SeqCst);
            })
            .on_can_do(|key| match key {
                HostCanDo::SendTimeInfo => CanDoResponse::Yes,
                _ => CanDoResponse::No,
            })
            .callback();
        let list = EventList::build(&[Event::Midi(MidiEvent::note_on(0, 0, 64, 90))]);
        assert_eq!(callback(HostOpcode::ProcessEvents, 0, 0, list.as_void_ptr(), 0.0), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let key = CString::new("sendVstTimeInfo").unwrap();
        assert_eq!(callback(HostOpcode::CanDo, 0, 0, key.as_ptr() as *mut c_void, 0.0), 1);
        let key = CString::new("openFileSelector").unwrap();
        assert_eq!(callback(HostOpcode::CanDo, 0, 0, key.as_ptr() as *mut c_void, 0.0), -1);
    }

    #[test]
    fn test_trampoline_prefers_pending_then_bound() {
        let effect = Box::into_raw(Box::new(0u64)) as *mut AEffect;
        let pending: HostCallbackFn = Arc::new(|_: HostOpcode, _: i32, _: isize, _: *mut c_void, _: f32| 7);
        let bound: HostCallbackFn = Arc::new(|_: HostOpcode, _: i32, _: isize, _: *mut c_void, _: f32| 9);
        let raw = HostOpcode::GetSampleRate.raw();

        {
            let _guard = PendingBinding::install(pending);
            let reply = host_trampoline(effect, raw, 0, 0, std::ptr::null_mut(), 0.0);
            assert_eq!(reply, 7, "callbacks during entry reach the pending binding");
        }
        let reply = host_trampoline(effect, raw, 0, 0, std::ptr::null_mut(), 0.0);
        assert_eq!(reply, 0);

        let binding = bind(effect, bound);
        let reply = host_trampoline(effect, raw, 0, 0, std::ptr::null_mut(), 0.0);
        assert_eq!(reply, 9);
        assert!(unbind(binding).is_some());

        let version = HostOpcode::Version.raw();
        let reply = host_trampoline(effect, version, 0, 0, std::ptr::null_mut(), 0.0);
        assert_eq!(reply, 2400);
        drop(unsafe { Box::from_raw(effect as *mut u64) });
    }

    #[test]
    fn test_stale_binding_release_keeps_address_successor() {
        let effect = Box::into_raw(Box::new(0u64)) as *mut AEffect;
        let closed: HostCallbackFn = Arc::new(|_: HostOpcode, _: i32, _: isize, _: *mut c_void, _: f32| 3);
        let successor: HostCallbackFn = Arc::new(|_: HostOpcode, _: i32, _: isize, _: *mut c_void, _: f32| 5);
        let raw = HostOpcode::GetBufferSize.raw();

        let first = bind(effect, closed);
        let released = unbind(first).expect("first binding is live");
        let second = bind(effect, successor);
        assert!(unbind(first).is_none(), "a released binding cannot be released twice");
        assert_eq!(host_trampoline(effect, raw, 0, 0, std::ptr::null_mut(), 0.0), 5);

        {
            let _closing = PendingBinding::install(released);
            assert_eq!(
                host_trampoline(effect, raw, 0, 0, std::ptr::null_mut(), 0.0),
                5,
                "a registered effect is routed before any pending binding"
            );
        }
        assert!(unbind(second).is_some());
        drop(unsafe { Box::from_raw(effect as *mut u64) });
    }
}
