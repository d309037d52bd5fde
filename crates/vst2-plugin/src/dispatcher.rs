//! Typed handlers for host calls that need effect-specific behavior.
//!
//! Every handler is optional. An opcode whose handler is missing is answered
//! with 0 and leaves the instance untouched.

use std::ffi::c_void;
use vst2_core::{CanDoResponse, EditorRectangle, EventsRef, PluginCanDo, SpeakerArrangement};

type Handler<Arg, Ret = ()> = Option<Box<dyn Fn(Arg) -> Ret + Send + Sync>>;
type Notify = Option<Box<dyn Fn() + Send + Sync>>;
type Query<Ret> = Option<Box<dyn Fn() -> Ret + Send + Sync>>;

/// Native parent window handle passed to `editor_open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle(pub *mut c_void);

#[derive(Default)]
pub struct Dispatcher {
    pub(crate) set_buffer_size: Handler<usize>,
    pub(crate) set_sample_rate: Handler<f32>,
    pub(crate) state_changed: Handler<bool>,
    pub(crate) can_do: Option<Box<dyn Fn(&PluginCanDo) -> CanDoResponse + Send + Sync>>,
    pub(crate) close: Notify,
    pub(crate) process_events: Option<Box<dyn Fn(EventsRef<'_>) + Send + Sync>>,
    pub(crate) get_chunk: Handler<bool, Vec<u8>>,
    pub(crate) set_chunk: Option<Box<dyn Fn(&[u8], bool) + Send + Sync>>,
    pub(crate) set_speaker_arrangement:
        Option<Box<dyn Fn(&SpeakerArrangement, &SpeakerArrangement) -> bool + Send + Sync>>,
    pub(crate) editor_get_rect: Query<Option<EditorRectangle>>,
    pub(crate) editor_open: Handler<WindowHandle, bool>,
    pub(crate) editor_close: Notify,
    pub(crate) editor_idle: Notify,
    pub(crate) set_bypass: Handler<bool, bool>,
    pub(crate) start_process: Notify,
    pub(crate) stop_process: Notify,
    pub(crate) tail_size: Query<usize>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum frames per process call.
    pub fn on_set_buffer_size<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.set_buffer_size = Some(Box::new(f));
        self
    }

    pub fn on_set_sample_rate<F>(mut self, f: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.set_sample_rate = Some(Box::new(f));
        self
    }

    /// `true` on resume, `false` on suspend.
    pub fn on_state_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.state_changed = Some(Box::new(f));
        self
    }

    pub fn on_can_do<F>(mut self, f: F) -> Self
    where
        F: Fn(&PluginCanDo) -> CanDoResponse + Send + Sync + 'static,
    {
        self.can_do = Some(Box::new(f));
        self
    }

    /// Called right before the instance is freed.
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.close = Some(Box::new(f));
        self
    }

    /// Events for the next process block. The view is only valid during the
    /// call; copy what must be kept.
    pub fn on_process_events<F>(mut self, f: F) -> Self
    where
        F: Fn(EventsRef<'_>) + Send + Sync + 'static,
    {
        self.process_events = Some(Box::new(f));
        self
    }

    /// `true` requests the current program, `false` the whole bank. Define
    /// together with [`on_set_chunk`](Self::on_set_chunk) to advertise chunk
    /// support.
    pub fn on_get_chunk<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) -> Vec<u8> + Send + Sync + 'static,
    {
        self.get_chunk = Some(Box::new(f));
        self
    }

    pub fn on_set_chunk<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8], bool) + Send + Sync + 'static,
    {
        self.set_chunk = Some(Box::new(f));
        self
    }

    /// Receives the input and output arrangements. Returns whether they are
    /// accepted.
    pub fn on_set_speaker_arrangement<F>(mut self, f: F) -> Self
    where
        F: Fn(&SpeakerArrangement, &SpeakerArrangement) -> bool + Send + Sync + 'static,
    {
        self.set_speaker_arrangement = Some(Box::new(f));
        self
    }

    pub fn on_editor_get_rect<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<EditorRectangle> + Send + Sync + 'static,
    {
        self.editor_get_rect = Some(Box::new(f));
        self
    }

    pub fn on_editor_open<F>(mut self, f: F) -> Self
    where
        F: Fn(WindowHandle) -> bool + Send + Sync + 'static,
    {
        self.editor_open = Some(Box::new(f));
        self
    }

    pub fn on_editor_close<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.editor_close = Some(Box::new(f));
        self
    }

    pub fn on_editor_idle<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.editor_idle = Some(Box::new(f));
        self
    }

    pub fn on_set_bypass<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) -> bool + Send + Sync + 'static,
    {
        self.set_bypass = Some(Box::new(f));
        self
    }

    pub fn on_start_process<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.start_process = Some(Box::new(f));
        self
    }

    pub fn on_stop_process<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.stop_process = Some(Box::new(f));
        self
    }

    /// Tail in samples. 0 means default, 1 means no tail.
    pub fn on_tail_size<F>(mut self, f: F) -> Self
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        self.tail_size = Some(Box::new(f));
        self
    }

    pub fn has_chunks(&self) -> bool {
        self.get_chunk.is_some() && self.set_chunk.is_some()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chunks", &self.has_chunks())
            .field("process_events", &self.process_events.is_some())
            .field("editor", &self.editor_open.is_some())
            .finish()
    }
}
