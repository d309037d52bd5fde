//! Bit-flag sets and value enumerations carried through the dispatch arguments.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* const $flag:ident = $bits:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name(i32);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: $name = $name($bits); )*

            const NAMES: &'static [(&'static str, $name)] = &[
                $( (stringify!($flag), $name::$flag), )*
            ];

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn from_bits(bits: i32) -> Self {
                $name(bits)
            }

            pub const fn bits(self) -> i32 {
                self.0
            }

            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: $name) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = $name;
            fn bitand(self, rhs: $name) -> $name {
                $name(self.0 & rhs.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let set: Vec<&str> = Self::NAMES
                    .iter()
                    .filter(|(_, flag)| !flag.is_empty() && self.contains(*flag))
                    .map(|(name, _)| *name)
                    .collect();
                write!(f, "{}({:#x}: {})", stringify!($name), self.0, set.join(" | "))
            }
        }
    };
}

flag_set! {
    /// Capabilities advertised in the effect header.
    pub struct PluginFlag {
        const HAS_EDITOR = 1 << 0;
        /// `processReplacing` is implemented.
        const FLOAT_PROCESSING = 1 << 4;
        /// State is exchanged through chunks rather than parameter lists.
        const PROGRAM_CHUNKS = 1 << 5;
        const IS_SYNTH = 1 << 8;
        const NO_SOUND_IN_STOP = 1 << 9;
        /// `processDoubleReplacing` is implemented.
        const DOUBLE_PROCESSING = 1 << 12;
    }
}

flag_set! {
    /// Validity and transport bits of a time info record.
    pub struct TimeInfoFlag {
        const TRANSPORT_CHANGED = 1 << 0;
        const TRANSPORT_PLAYING = 1 << 1;
        const TRANSPORT_CYCLE_ACTIVE = 1 << 2;
        const TRANSPORT_RECORDING = 1 << 3;
        const AUTOMATION_WRITING = 1 << 6;
        const AUTOMATION_READING = 1 << 7;
        const NANOS_VALID = 1 << 8;
        const PPQ_POS_VALID = 1 << 9;
        const TEMPO_VALID = 1 << 10;
        const BARS_VALID = 1 << 11;
        const CYCLE_POS_VALID = 1 << 12;
        const TIME_SIG_VALID = 1 << 13;
        const SMPTE_VALID = 1 << 14;
        const CLOCK_VALID = 1 << 15;
    }
}

flag_set! {
    /// Parameter property bits.
    pub struct ParameterFlag {
        const IS_SWITCH = 1 << 0;
        const USES_INTEGER_MIN_MAX = 1 << 1;
        const USES_FLOAT_STEP = 1 << 2;
        const USES_INT_STEP = 1 << 3;
        const SUPPORTS_DISPLAY_INDEX = 1 << 4;
        const SUPPORTS_DISPLAY_CATEGORY = 1 << 5;
        const CAN_RAMP = 1 << 6;
    }
}

flag_set! {
    /// Input/output pin property bits.
    pub struct PinFlag {
        const IS_ACTIVE = 1 << 0;
        const IS_STEREO = 1 << 1;
        const USE_SPEAKER = 1 << 2;
    }
}

flag_set! {
    pub struct MidiEventFlag {
        /// Event is played live rather than from a sequencer track.
        const REALTIME = 1 << 0;
    }
}

macro_rules! value_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )*
        }
        default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )*
        }

        impl $name {
            /// Decodes a raw reply; values outside the table fall back to the
            /// neutral variant.
            pub fn from_raw(raw: i64) -> Self {
                match raw {
                    $( $value => $name::$variant, )*
                    _ => $name::$default,
                }
            }

            pub const fn raw(self) -> i32 {
                self as i32
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }
    };
}

value_enum! {
    pub enum PluginCategory {
        Unknown = 0,
        Effect = 1,
        Synth = 2,
        Analysis = 3,
        Mastering = 4,
        Spacializer = 5,
        RoomFx = 6,
        SurroundFx = 7,
        Restoration = 8,
        OfflineProcess = 9,
        Shell = 10,
        Generator = 11,
    }
    default Unknown
}

value_enum! {
    pub enum AutomationState {
        Unsupported = 0,
        Off = 1,
        Read = 2,
        Write = 3,
        ReadWrite = 4,
    }
    default Unsupported
}

value_enum! {
    /// Context the current call is executed in.
    pub enum ProcessLevel {
        Unknown = 0,
        User = 1,
        Realtime = 2,
        Prefetch = 3,
        Offline = 4,
    }
    default Unknown
}

value_enum! {
    pub enum HostLanguage {
        Unknown = 0,
        English = 1,
        German = 2,
        French = 3,
        Italian = 4,
        Spanish = 5,
        Japanese = 6,
    }
    default Unknown
}

value_enum! {
    /// Answer to a can-do query.
    pub enum CanDoResponse {
        No = -1,
        Maybe = 0,
        Yes = 1,
    }
    default Maybe
}

value_enum! {
    pub enum ProcessPrecision {
        Single = 0,
        Double = 1,
    }
    default Single
}

value_enum! {
    pub enum SpeakerArrangementType {
        UserDefined = -2,
        Empty = -1,
        Mono = 0,
        Stereo = 1,
        StereoSurround = 2,
        StereoCenter = 3,
        StereoSide = 4,
        StereoCLfe = 5,
        Cine30 = 6,
        Music30 = 7,
        Cine31 = 8,
        Music31 = 9,
        Cine40 = 10,
        Music40 = 11,
        Cine41 = 12,
        Music41 = 13,
        Surround50 = 14,
        Surround51 = 15,
        Cine60 = 16,
        Music60 = 17,
        Cine61 = 18,
        Music61 = 19,
        Cine70 = 20,
        Music70 = 21,
        Cine71 = 22,
        Music71 = 23,
        Cine80 = 24,
        Music80 = 25,
        Cine81 = 26,
        Music81 = 27,
        Surround102 = 28,
    }
    default Empty
}

macro_rules! can_do_keys {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => $key:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )*
            /// Key outside the known table, passed through verbatim.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $( $name::$variant => $key, )*
                    $name::Other(key) => key,
                }
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                match key {
                    $( $key => $name::$variant, )*
                    other => $name::Other(other.to_string()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

can_do_keys! {
    /// Capabilities a host may ask a plugin about.
    pub enum PluginCanDo {
        SendEvents => "sendVstEvents",
        SendMidiEvent => "sendVstMidiEvent",
        ReceiveEvents => "receiveVstEvents",
        ReceiveMidiEvent => "receiveVstMidiEvent",
        ReceiveTimeInfo => "receiveVstTimeInfo",
        Offline => "offline",
        MidiProgramNames => "midiProgramNames",
        Bypass => "bypass",
    }
}

can_do_keys! {
    /// Capabilities a plugin may ask its host about.
    pub enum HostCanDo {
        SendEvents => "sendVstEvents",
        SendMidiEvent => "sendVstMidiEvent",
        SendTimeInfo => "sendVstTimeInfo",
        ReceiveEvents => "receiveVstEvents",
        ReceiveMidiEvent => "receiveVstMidiEvent",
        ReportConnectionChanges => "reportConnectionChanges",
        AcceptIOChanges => "acceptIOChanges",
        SizeWindow => "sizeWindow",
        Offline => "offline",
        OpenFileSelector => "openFileSelector",
        CloseFileSelector => "closeFileSelector",
        StartStopProcess => "startStopProcess",
        ShellCategory => "shellCategory",
        SendMidiEventFlagIsRealtime => "sendVstMidiEventFlagIsRealtime",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_flag_contains() {
        let flags = PluginFlag::FLOAT_PROCESSING | PluginFlag::DOUBLE_PROCESSING;
        assert!(flags.contains(PluginFlag::DOUBLE_PROCESSING));
        assert!(flags.contains(PluginFlag::FLOAT_PROCESSING));
        assert!(!flags.contains(PluginFlag::HAS_EDITOR));
        assert_eq!(flags.bits(), 0x1010);
        assert_eq!(PluginFlag::from_bits(0x1010), flags);
    }

    #[test]
    fn test_flag_insert_remove() {
        let mut flags = PluginFlag::empty();
        assert!(flags.is_empty());
        flags.insert(PluginFlag::PROGRAM_CHUNKS);
        assert!(flags.contains(PluginFlag::PROGRAM_CHUNKS));
        flags.remove(PluginFlag::PROGRAM_CHUNKS);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_flag_debug_lists_names() {
        let flags = PluginFlag::HAS_EDITOR | PluginFlag::IS_SYNTH;
        let text = format!("{:?}", flags);
        assert!(text.contains("HAS_EDITOR"), "{}", text);
        assert!(text.contains("IS_SYNTH"), "{}", text);
        assert!(!text.contains("PROGRAM_CHUNKS"), "{}", text);
    }

    #[test]
    fn test_value_enum_fallback() {
        assert_eq!(PluginCategory::from_raw(2), PluginCategory::Synth);
        assert_eq!(PluginCategory::from_raw(99), PluginCategory::Unknown);
        assert_eq!(CanDoResponse::from_raw(-1), CanDoResponse::No);
        assert_eq!(CanDoResponse::from_raw(1), CanDoResponse::Yes);
        assert_eq!(CanDoResponse::from_raw(7), CanDoResponse::Maybe);
        assert_eq!(ProcessLevel::from_raw(2), ProcessLevel::Realtime);
        assert_eq!(SpeakerArrangementType::from_raw(-2), SpeakerArrangementType::UserDefined);
    }

    #[test]
    fn test_can_do_keys() {
        assert_eq!(PluginCanDo::ReceiveMidiEvent.as_str(), "receiveVstMidiEvent");
        assert_eq!(PluginCanDo::from("bypass"), PluginCanDo::Bypass);
        assert_eq!(
            PluginCanDo::from("hasCockosExtensions"),
            PluginCanDo::Other("hasCockosExtensions".into())
        );
        assert_eq!(HostCanDo::from("sizeWindow"), HostCanDo::SizeWindow);
        assert_eq!(HostCanDo::StartStopProcess.to_string(), "startStopProcess");
    }
}
