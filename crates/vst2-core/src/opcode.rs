//! Opcode tables for both directions of the generic dispatch.
//!
//! Every call across the boundary is `(opcode, index, value, ptr, opt)`. The
//! opcode selects the operation; which of the other four arguments carry
//! meaning is fixed per opcode and documented on the variants that the
//! bridges actually speak.

use std::fmt;

macro_rules! opcode_table {
    (@name $prefix:literal, $variant:ident) => {
        concat!($prefix, stringify!($variant))
    };
    (@name $prefix:literal, $variant:ident, $label:literal) => {
        $label
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $prefix:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal $(as $label:literal)?, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )*
        }

        impl $name {
            /// Every opcode of the table, in ascending raw order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Canonical symbolic name used by diagnostics.
            pub const fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => opcode_table!(@name $prefix, $variant $(, $label)?), )*
                }
            }

            pub const fn raw(self) -> i32 {
                self as i32
            }

            pub const fn from_raw(raw: i32) -> Option<Self> {
                match raw {
                    $( $value => Some($name::$variant), )*
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl TryFrom<i32> for $name {
            type Error = i32;

            fn try_from(raw: i32) -> Result<Self, i32> {
                Self::from_raw(raw).ok_or(raw)
            }
        }

        impl From<$name> for i32 {
            fn from(op: $name) -> i32 {
                op as i32
            }
        }
    };
}

opcode_table! {
    /// Host → plugin opcodes.
    ///
    /// Opcodes the bridge wraps in a typed operation carry a lowercase
    /// `plug` name; the rest use `Plug`.
    pub enum PluginOpcode: "Plug" {
        /// Initialise the instance. Must be preceded by callback registration.
        Open = 0 as "plugOpen",
        /// Last call the instance receives; the effect is freed afterwards.
        Close = 1 as "plugClose",
        /// `value`: program index.
        SetProgram = 2 as "plugSetProgram",
        /// Returns the current program index.
        GetProgram = 3 as "plugGetProgram",
        /// `ptr`: 24-byte name of the current program.
        SetProgramName = 4 as "plugSetProgramName",
        /// `ptr`: 24-byte buffer receiving the current program name.
        GetProgramName = 5 as "plugGetProgramName",
        /// `index`: parameter, `ptr`: 8-byte unit label ("dB", "ms").
        GetParamLabel = 6 as "plugGetParamLabel",
        /// `index`: parameter, `ptr`: 8-byte value text ("0.5", "HALL").
        GetParamDisplay = 7 as "plugGetParamDisplay",
        /// `index`: parameter, `ptr`: 8-byte parameter name.
        GetParamName = 8 as "plugGetParamName",
        GetVu = 9,
        /// `opt`: sample rate.
        SetSampleRate = 10 as "plugSetSampleRate",
        /// `value`: maximum frames per process call.
        SetBufferSize = 11 as "plugSetBufferSize",
        /// `value`: 1 resume, 0 suspend.
        StateChanged = 12 as "plugStateChanged",
        /// `ptr`: receives a pointer to the editor rectangle.
        EditGetRect = 13,
        /// `ptr`: native parent window handle.
        EditOpen = 14,
        EditClose = 15,
        EditDraw = 16,
        EditMouse = 17,
        EditKey = 18,
        EditIdle = 19,
        EditTop = 20,
        EditSleep = 21,
        Identify = 22,
        /// `index`: 1 program, 0 bank; `ptr`: receives the chunk address.
        /// Returns the chunk length. The plugin keeps ownership.
        GetChunk = 23 as "plugGetChunk",
        /// `index`: 1 program, 0 bank; `value`: length; `ptr`: chunk bytes.
        SetChunk = 24 as "plugSetChunk",
        /// `ptr`: event block.
        ProcessEvents = 25,
        /// `index`: parameter.
        CanBeAutomated = 26,
        /// `index`: parameter, `ptr`: null terminated text.
        String2Parameter = 27,
        GetNumProgramCategories = 28,
        /// `index`: program, `ptr`: 24-byte name buffer.
        GetProgramNameIndexed = 29 as "plugGetProgramNameIndexed",
        CopyProgram = 30,
        ConnectInput = 31,
        ConnectOutput = 32,
        /// `index`: input pin, `ptr`: pin properties.
        GetInputProperties = 33,
        /// `index`: output pin, `ptr`: pin properties.
        GetOutputProperties = 34,
        GetPlugCategory = 35,
        GetCurrentPosition = 36,
        GetDestinationBuffer = 37,
        OfflineNotify = 38,
        OfflinePrepare = 39,
        OfflineRun = 40,
        ProcessVarIo = 41,
        /// `value`: input arrangement address, `ptr`: output arrangement.
        SetSpeakerArrangement = 42 as "plugSetSpeakerArrangement",
        SetBlockSizeAndSampleRate = 43,
        /// `value`: 1 bypass on, 0 off.
        SetBypass = 44,
        /// `ptr`: 32-byte buffer.
        GetPluginName = 45,
        GetErrorText = 46,
        /// `ptr`: 64-byte buffer.
        GetVendorString = 47,
        /// `ptr`: 64-byte buffer.
        GetProductString = 48,
        GetVendorVersion = 49,
        VendorSpecific = 50,
        /// `ptr`: null terminated can-do key.
        CanDo = 51,
        GetTailSize = 52,
        Idle = 53,
        GetIcon = 54,
        SetViewPosition = 55,
        /// `index`: parameter, `ptr`: parameter properties.
        GetParameterProperties = 56 as "plugGetParameterProperties",
        KeysRequired = 57,
        GetVstVersion = 58,
        EditKeyDown = 59,
        EditKeyUp = 60,
        SetEditKnobMode = 61,
        GetMidiProgramName = 62,
        GetCurrentMidiProgram = 63,
        GetMidiProgramCategory = 64,
        HasMidiProgramsChanged = 65,
        GetMidiKeyName = 66,
        BeginSetProgram = 67,
        EndSetProgram = 68,
        GetSpeakerArrangement = 69,
        ShellGetNextPlugin = 70,
        StartProcess = 71,
        StopProcess = 72,
        SetTotalSampleToProcess = 73,
        SetPanLaw = 74,
        BeginLoadBank = 75,
        BeginLoadProgram = 76,
        /// `value`: 0 single precision, 1 double precision.
        SetProcessPrecision = 77,
        GetNumMidiInputChannels = 78,
        GetNumMidiOutputChannels = 79,
    }
}

opcode_table! {
    /// Plugin → host opcodes.
    pub enum HostOpcode: "Host" {
        /// `index`: parameter, `opt`: new value.
        Automate = 0,
        /// Returns the protocol version (2400).
        Version = 1,
        CurrentID = 2,
        Idle = 3,
        PinConnected = 4,
        WantMidi = 6,
        /// `value`: requested time info flags. Returns a time info address.
        GetTime = 7,
        /// `ptr`: event block.
        ProcessEvents = 8,
        SetTime = 9,
        TempoAt = 10,
        GetNumAutomatableParameters = 11,
        GetParameterQuantization = 12,
        IOChanged = 13,
        NeedIdle = 14,
        /// `index`: width, `value`: height.
        SizeWindow = 15,
        GetSampleRate = 16,
        GetBufferSize = 17,
        GetInputLatency = 18,
        GetOutputLatency = 19,
        GetPreviousPlug = 20,
        GetNextPlug = 21,
        WillReplaceOrAccumulate = 22,
        GetCurrentProcessLevel = 23,
        GetAutomationState = 24,
        OfflineStart = 25,
        OfflineRead = 26,
        OfflineWrite = 27,
        OfflineGetCurrentPass = 28,
        OfflineGetCurrentMetaPass = 29,
        SetOutputSampleRate = 30,
        GetOutputSpeakerArrangement = 31,
        /// `ptr`: 64-byte buffer.
        GetVendorString = 32,
        /// `ptr`: 64-byte buffer.
        GetProductString = 33,
        GetVendorVersion = 34,
        VendorSpecific = 35,
        SetIcon = 36,
        /// `ptr`: null terminated can-do key.
        CanDo = 37,
        GetLanguage = 38,
        OpenWindow = 39,
        CloseWindow = 40,
        /// Returns the address of a null terminated directory path.
        GetDirectory = 41,
        UpdateDisplay = 42,
        /// `index`: parameter.
        BeginEdit = 43,
        /// `index`: parameter.
        EndEdit = 44,
        OpenFileSelector = 45,
        CloseFileSelector = 46,
        EditFile = 47,
        GetChunkFile = 48,
        GetInputSpeakerArrangement = 49,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_opcode_names() {
        let cases = [
            (PluginOpcode::Open, "plugOpen"),
            (PluginOpcode::Close, "plugClose"),
            (PluginOpcode::SetProgram, "plugSetProgram"),
            (PluginOpcode::GetProgram, "plugGetProgram"),
            (PluginOpcode::SetProgramName, "plugSetProgramName"),
            (PluginOpcode::GetProgramName, "plugGetProgramName"),
            (PluginOpcode::GetParamLabel, "plugGetParamLabel"),
            (PluginOpcode::GetParamDisplay, "plugGetParamDisplay"),
            (PluginOpcode::GetParamName, "plugGetParamName"),
            (PluginOpcode::SetSampleRate, "plugSetSampleRate"),
            (PluginOpcode::SetBufferSize, "plugSetBufferSize"),
            (PluginOpcode::StateChanged, "plugStateChanged"),
            (PluginOpcode::EditGetRect, "PlugEditGetRect"),
            (PluginOpcode::EditOpen, "PlugEditOpen"),
            (PluginOpcode::EditClose, "PlugEditClose"),
            (PluginOpcode::EditIdle, "PlugEditIdle"),
            (PluginOpcode::GetChunk, "plugGetChunk"),
            (PluginOpcode::SetChunk, "plugSetChunk"),
            (PluginOpcode::ProcessEvents, "PlugProcessEvents"),
            (PluginOpcode::CanBeAutomated, "PlugCanBeAutomated"),
            (PluginOpcode::String2Parameter, "PlugString2Parameter"),
            (PluginOpcode::GetProgramNameIndexed, "plugGetProgramNameIndexed"),
            (PluginOpcode::GetInputProperties, "PlugGetInputProperties"),
            (PluginOpcode::GetOutputProperties, "PlugGetOutputProperties"),
            (PluginOpcode::GetPlugCategory, "PlugGetPlugCategory"),
            (PluginOpcode::SetSpeakerArrangement, "plugSetSpeakerArrangement"),
            (PluginOpcode::SetBypass, "PlugSetBypass"),
            (PluginOpcode::GetPluginName, "PlugGetPluginName"),
            (PluginOpcode::GetVendorString, "PlugGetVendorString"),
            (PluginOpcode::GetProductString, "PlugGetProductString"),
            (PluginOpcode::GetVendorVersion, "PlugGetVendorVersion"),
            (PluginOpcode::VendorSpecific, "PlugVendorSpecific"),
            (PluginOpcode::CanDo, "PlugCanDo"),
            (PluginOpcode::GetTailSize, "PlugGetTailSize"),
            (PluginOpcode::GetParameterProperties, "plugGetParameterProperties"),
            (PluginOpcode::GetVstVersion, "PlugGetVstVersion"),
            (PluginOpcode::StartProcess, "PlugStartProcess"),
            (PluginOpcode::StopProcess, "PlugStopProcess"),
        ];
        for (op, want) in cases {
            assert_eq!(op.to_string(), want, "name of opcode {}", op.raw());
        }
    }

    #[test]
    fn test_host_opcode_names() {
        let cases = [
            (HostOpcode::Automate, "HostAutomate"),
            (HostOpcode::Version, "HostVersion"),
            (HostOpcode::CurrentID, "HostCurrentID"),
            (HostOpcode::GetTime, "HostGetTime"),
            (HostOpcode::IOChanged, "HostIOChanged"),
            (HostOpcode::GetCurrentProcessLevel, "HostGetCurrentProcessLevel"),
            (HostOpcode::CanDo, "HostCanDo"),
            (HostOpcode::BeginEdit, "HostBeginEdit"),
            (HostOpcode::CloseFileSelector, "HostCloseFileSelector"),
        ];
        for (op, want) in cases {
            assert_eq!(op.to_string(), want, "name of opcode {}", op.raw());
        }
    }

    #[test]
    fn test_raw_values_are_frozen() {
        assert_eq!(PluginOpcode::Open.raw(), 0);
        assert_eq!(PluginOpcode::StateChanged.raw(), 12);
        assert_eq!(PluginOpcode::GetChunk.raw(), 23);
        assert_eq!(PluginOpcode::ProcessEvents.raw(), 25);
        assert_eq!(PluginOpcode::CanDo.raw(), 51);
        assert_eq!(PluginOpcode::GetNumMidiOutputChannels.raw(), 79);
        assert_eq!(HostOpcode::GetSampleRate.raw(), 16);
        assert_eq!(HostOpcode::GetInputSpeakerArrangement.raw(), 49);
    }

    #[test]
    fn test_from_raw_roundtrip_covers_table() {
        assert_eq!(PluginOpcode::ALL.len(), 80);
        for op in PluginOpcode::ALL {
            assert_eq!(PluginOpcode::from_raw(op.raw()), Some(*op));
        }
        // Value 5 is not assigned in the host table.
        assert_eq!(HostOpcode::ALL.len(), 49);
        assert_eq!(HostOpcode::from_raw(5), None);
        assert_eq!(PluginOpcode::try_from(80), Err(80));
        assert_eq!(HostOpcode::try_from(-1), Err(-1));
    }

    #[test]
    fn test_tables_have_unique_names() {
        let mut names: Vec<&str> = PluginOpcode::ALL
            .iter()
            .map(|op| op.name())
            .chain(HostOpcode::ALL.iter().map(|op| op.name()))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total, "opcode names must be unique");
    }
}
