//! Timestamped event records and the contiguous event block.
//!
//! An event block is a count header followed by an array of pointers, each
//! addressing one individually allocated record. [`EventList`] builds and
//! owns such a block; [`EventsRef`] reads a block owned by the other side.

use crate::flags::MidiEventFlag;
use smallvec::SmallVec;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::mem::{offset_of, size_of};
use vst::api::{
    Event as WireEvent, EventType, Events, MidiEvent as WireMidiEvent,
    SysExEvent as WireSysExEvent,
};

/// Wire discriminant of a MIDI record.
pub const EVENT_TYPE_MIDI: i32 = 1;
/// Wire discriminant of a system exclusive record.
pub const EVENT_TYPE_SYSEX: i32 = 6;

/// Short MIDI message with its frame offset inside the next block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MidiEvent {
    pub delta_frames: i32,
    pub data: [u8; 3],
    /// Length in frames of the whole note, 0 when unknown.
    pub note_length: i32,
    /// Frames into the note from where playback starts.
    pub note_offset: i32,
    /// Cents, -64..=63.
    pub detune: i8,
    pub note_off_velocity: u8,
    pub realtime: bool,
}

impl MidiEvent {
    pub fn new(delta_frames: i32, data: [u8; 3]) -> Self {
        Self {
            delta_frames,
            data,
            ..Default::default()
        }
    }

    pub fn note_on(delta_frames: i32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(delta_frames, [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }

    pub fn note_off(delta_frames: i32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(delta_frames, [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }

    pub fn status(&self) -> u8 {
        self.data[0] & 0xF0
    }

    pub fn channel(&self) -> u8 {
        self.data[0] & 0x0F
    }

    fn to_wire(self) -> WireMidiEvent {
        let mut flags = MidiEventFlag::empty();
        if self.realtime {
            flags.insert(MidiEventFlag::REALTIME);
        }
        WireMidiEvent {
            event_type: EventType::Midi,
            byte_size: size_of::<WireMidiEvent>() as i32,
            delta_frames: self.delta_frames,
            flags: flags.bits(),
            note_length: self.note_length,
            note_offset: self.note_offset,
            midi_data: self.data,
            _midi_reserved: 0,
            detune: self.detune,
            note_off_velocity: self.note_off_velocity,
            _reserved1: 0,
            _reserved2: 0,
        }
    }

    fn from_wire(wire: &WireMidiEvent) -> Self {
        Self {
            delta_frames: wire.delta_frames,
            data: wire.midi_data,
            note_length: wire.note_length,
            note_offset: wire.note_offset,
            detune: wire.detune,
            note_off_velocity: wire.note_off_velocity,
            realtime: MidiEventFlag::from_bits(wire.flags).contains(MidiEventFlag::REALTIME),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysExEvent {
    pub delta_frames: i32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Midi(MidiEvent),
    SysEx(SysExEvent),
}

impl Event {
    pub fn delta_frames(&self) -> i32 {
        match self {
            Event::Midi(e) => e.delta_frames,
            Event::SysEx(e) => e.delta_frames,
        }
    }
}

impl From<MidiEvent> for Event {
    fn from(event: MidiEvent) -> Self {
        Event::Midi(event)
    }
}

impl From<SysExEvent> for Event {
    fn from(event: SysExEvent) -> Self {
        Event::SysEx(event)
    }
}

/// Decoded events of one block.
pub type EventVec = SmallVec<[Event; 8]>;

enum Record {
    Midi(Box<WireMidiEvent>),
    SysEx {
        record: Box<WireSysExEvent>,
        _dump: Box<[u8]>,
    },
}

impl Record {
    fn as_event_ptr(&mut self) -> *mut WireEvent {
        match self {
            Record::Midi(record) => &mut **record as *mut WireMidiEvent as *mut WireEvent,
            Record::SysEx { record, .. } => &mut **record as *mut WireSysExEvent as *mut WireEvent,
        }
    }
}

/// Owned event block.
///
/// The header and pointer array live in one 8-byte aligned allocation; every
/// record is boxed separately so its address stays fixed. Everything is
/// released when the list is dropped.
pub struct EventList {
    block: Vec<u64>,
    records: Vec<Record>,
}

// SAFETY: every pointer inside the block addresses memory owned by the list.
unsafe impl Send for EventList {}

impl EventList {
    pub fn build<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut records: Vec<Record> = events
            .into_iter()
            .map(|event| match event {
                Event::Midi(midi) => Record::Midi(Box::new(midi.to_wire())),
                Event::SysEx(sysex) => {
                    let dump: Box<[u8]> = sysex.payload.clone().into_boxed_slice();
                    let record = WireSysExEvent {
                        event_type: EventType::SysEx,
                        byte_size: size_of::<WireSysExEvent>() as i32,
                        delta_frames: sysex.delta_frames,
                        _flags: 0,
                        data_size: dump.len() as i32,
                        _reserved1: 0,
                        system_data: dump.as_ptr() as *mut u8,
                        _reserved2: 0,
                    };
                    Record::SysEx {
                        record: Box::new(record),
                        _dump: dump,
                    }
                }
            })
            .collect();

        let array_offset = offset_of!(Events, events);
        let needed = array_offset + records.len() * size_of::<*mut WireEvent>();
        let alloc_size = needed.max(size_of::<Events>());
        let mut block = vec![0u64; alloc_size.div_ceil(8)];

        // SAFETY: the block is zeroed, 8-byte aligned and large enough for the
        // header plus one pointer per record.
        unsafe {
            let base = block.as_mut_ptr() as *mut u8;
            let header = base as *mut Events;
            (*header).num_events = records.len() as i32;
            let slots = base.add(array_offset) as *mut *mut WireEvent;
            for (i, record) in records.iter_mut().enumerate() {
                *slots.add(i) = record.as_event_ptr();
            }
        }

        Self { block, records }
    }

    /// Number of records announced by the header.
    pub fn len(&self) -> usize {
        // SAFETY: the block always holds an initialised header.
        let count = unsafe { (*(self.block.as_ptr() as *const Events)).num_events };
        count.max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wire pointer for `PlugProcessEvents` / `HostProcessEvents`. Valid until
    /// the list is dropped; the receiver must not write through it.
    pub fn as_ptr(&self) -> *mut Events {
        self.block.as_ptr() as *mut Events
    }

    pub fn as_void_ptr(&self) -> *mut c_void {
        self.as_ptr().cast()
    }

    pub fn events(&self) -> EventsRef<'_> {
        // SAFETY: the block is live for the borrow of self.
        unsafe { EventsRef::from_raw(self.as_ptr()) }.unwrap_or_default()
    }
}

impl std::fmt::Debug for EventList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventList")
            .field("len", &self.len())
            .field("records", &self.records.len())
            .finish()
    }
}

/// Borrowed view of an event block owned by the other side.
#[derive(Clone, Copy)]
pub struct EventsRef<'a> {
    ptr: *const Events,
    _marker: PhantomData<&'a Events>,
}

impl Default for EventsRef<'_> {
    fn default() -> Self {
        Self {
            ptr: std::ptr::null(),
            _marker: PhantomData,
        }
    }
}

impl<'a> EventsRef<'a> {
    /// # Safety
    /// `ptr` must be null or point to an event block whose header, pointer
    /// array and records stay valid for `'a`.
    pub unsafe fn from_raw(ptr: *const Events) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self {
                ptr,
                _marker: PhantomData,
            })
        }
    }

    /// Header count, negative values clamped to zero.
    pub fn len(&self) -> usize {
        if self.ptr.is_null() {
            return 0;
        }
        // SAFETY: non-null pointers are valid for 'a per `from_raw`.
        unsafe { (*self.ptr).num_events }.max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, i: usize) -> *const WireEvent {
        // SAFETY: i < len(), and the sender sized the array for len() slots.
        unsafe {
            let slots = (self.ptr as *const u8).add(offset_of!(Events, events))
                as *const *const WireEvent;
            *slots.add(i)
        }
    }

    /// Decodes every MIDI and SysEx record. Null slots and unknown record
    /// types are skipped.
    pub fn iter(&self) -> impl Iterator<Item = Event> + 'a {
        let this = *self;
        (0..this.len()).filter_map(move |i| {
            let record = this.record(i);
            if record.is_null() {
                return None;
            }
            // SAFETY: non-null records are valid for 'a.
            unsafe { decode_record(record) }
        })
    }

    pub fn to_vec(&self) -> EventVec {
        self.iter().collect()
    }
}

impl std::fmt::Debug for EventsRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventsRef").field("len", &self.len()).finish()
    }
}

/// Reads the type tag as a plain integer so that unknown discriminants from
/// the other side never materialise as an `EventType`.
unsafe fn decode_record(record: *const WireEvent) -> Option<Event> {
    // SAFETY: caller guarantees a valid record; the tag is its first field.
    let kind = unsafe { *(record as *const i32) };
    match kind {
        EVENT_TYPE_MIDI => {
            let wire = unsafe { &*(record as *const WireMidiEvent) };
            Some(Event::Midi(MidiEvent::from_wire(wire)))
        }
        EVENT_TYPE_SYSEX => {
            let wire = unsafe { &*(record as *const WireSysExEvent) };
            let payload = if wire.data_size > 0 && !wire.system_data.is_null() {
                unsafe { std::slice::from_raw_parts(wire.system_data, wire.data_size as usize) }
                    .to_vec()
            } else {
                Vec::new()
            };
            Some(Event::SysEx(SysExEvent {
                delta_frames: wire.delta_frames,
                payload,
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_record_sizes() {
        assert_eq!(size_of::<WireEvent>(), 32);
        assert_eq!(size_of::<WireMidiEvent>(), 32);
        #[cfg(target_pointer_width = "64")]
        {
            assert_eq!(size_of::<WireSysExEvent>(), 48);
            assert_eq!(offset_of!(Events, events), 16);
        }
    }

    #[test]
    fn test_build_reports_count() {
        for n in [0usize, 1, 2, 3, 17] {
            let events: Vec<Event> = (0..n)
                .map(|i| MidiEvent::note_on(i as i32, 0, 60, 100).into())
                .collect();
            let list = EventList::build(&events);
            assert_eq!(list.len(), n, "count header for {} events", n);
            assert_eq!(list.is_empty(), n == 0);
        }
    }

    #[test]
    fn test_decode_yields_built_events() {
        let mut note = MidiEvent::note_on(12, 3, 64, 90);
        note.realtime = true;
        note.detune = -5;
        let events = vec![
            Event::Midi(note),
            Event::SysEx(SysExEvent {
                delta_frames: 30,
                payload: vec![0xF0, 0x7E, 0x7F, 0xF7],
            }),
            Event::Midi(MidiEvent::note_off(40, 3, 64, 0)),
        ];
        let list = EventList::build(&events);
        let decoded = list.events().to_vec();
        assert_eq!(decoded.as_slice(), events.as_slice());
    }

    #[test]
    fn test_rebuild_does_not_disturb_other_list() {
        let first = EventList::build(&[Event::Midi(MidiEvent::note_on(0, 0, 60, 100))]);
        {
            let second: Vec<Event> = (0..5).map(|i| MidiEvent::new(i, [0xB0, 7, 100]).into()).collect();
            let second = EventList::build(&second);
            assert_eq!(second.len(), 5);
        }
        let none: [Event; 0] = [];
        let third = EventList::build(&none);
        assert_eq!(third.len(), 0);
        assert_eq!(first.len(), 1);
        assert_eq!(
            first.events().to_vec()[0],
            Event::Midi(MidiEvent::note_on(0, 0, 60, 100))
        );
    }

    #[test]
    fn test_events_ref_clamps_negative_count_and_skips_nulls() {
        let mut midi = MidiEvent::new(5, [0x90, 1, 2]).to_wire();
        let mut block = [0u64; 5];
        unsafe {
            let base = block.as_mut_ptr() as *mut u8;
            let header = base as *mut Events;
            (*header).num_events = -3;
            let view = EventsRef::from_raw(header).unwrap();
            assert_eq!(view.len(), 0);
            assert_eq!(view.iter().count(), 0);

            (*header).num_events = 3;
            let slots = base.add(offset_of!(Events, events)) as *mut *mut WireEvent;
            *slots = std::ptr::null_mut();
            *slots.add(1) = &mut midi as *mut WireMidiEvent as *mut WireEvent;
            *slots.add(2) = std::ptr::null_mut();
            let decoded = view.to_vec();
            assert_eq!(decoded.len(), 1, "null slots must be skipped");
            assert_eq!(decoded[0].delta_frames(), 5);
        }
        assert!(unsafe { EventsRef::from_raw(std::ptr::null()) }.is_none());
    }

    #[test]
    fn test_unknown_record_type_is_skipped() {
        let mut midi = MidiEvent::new(2, [0x80, 60, 0]).to_wire();
        let mut foreign = [0u64; 4];
        let mut block = [0u64; 4];
        unsafe {
            *(foreign.as_mut_ptr() as *mut i32) = 42;
            let base = block.as_mut_ptr() as *mut u8;
            (*(base as *mut Events)).num_events = 2;
            let slots = base.add(offset_of!(Events, events)) as *mut *mut WireEvent;
            *slots = foreign.as_mut_ptr() as *mut WireEvent;
            *slots.add(1) = &mut midi as *mut WireMidiEvent as *mut WireEvent;
            let decoded = EventsRef::from_raw(base as *const Events).unwrap().to_vec();
            assert_eq!(decoded.len(), 1, "record type 42 must be skipped");
            assert_eq!(decoded[0].delta_frames(), 2);
        }
    }

    #[test]
    fn test_midi_helpers() {
        let on = MidiEvent::note_on(0, 0x12, 200, 100);
        assert_eq!(on.status(), 0x90);
        assert_eq!(on.channel(), 0x02);
        assert_eq!(on.data[1], 200 & 0x7F);
    }
}
