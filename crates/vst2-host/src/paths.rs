//! Default VST2 install locations.

use std::path::PathBuf;

/// Directories where VST2 modules are conventionally installed on this OS.
///
/// Nothing is read or checked for existence.
pub fn scan_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Library/Audio/Plug-Ins/VST"),
            PathBuf::from(format!(
                "{}/Library/Audio/Plug-Ins/VST",
                std::env::var("HOME").unwrap_or_default()
            )),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\Program Files\\VstPlugins"),
            PathBuf::from("C:\\Program Files\\Common Files\\VST2"),
            PathBuf::from("C:\\Program Files (x86)\\VstPlugins"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![
            PathBuf::from("/usr/lib/vst"),
            PathBuf::from("/usr/local/lib/vst"),
            PathBuf::from(format!(
                "{}/.vst",
                std::env::var("HOME").unwrap_or_default()
            )),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_paths_name_vst_directories() {
        let paths = scan_paths();
        assert_eq!(paths.len(), 3 - usize::from(cfg!(target_os = "macos")));
        for path in &paths {
            let text = path.to_string_lossy().to_lowercase();
            assert!(text.contains("vst"), "{} is not a VST directory", text);
        }
    }
}
