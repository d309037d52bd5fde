//! VST2 module loading
//!
//! A [`Module`] is an opened plugin binary (or an in-process entry point)
//! from which any number of effect instances can be created.

use crate::host::{host_trampoline, HostCallbackFn, PendingBinding};
use crate::plugin::Plugin;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;
use vst2_core::{BridgeError, LoadStage, PluginMain, Result, EFFECT_MAGIC};

/// Entry symbols tried in order.
const ENTRY_SYMBOLS: [&[u8]; 2] = [b"VSTPluginMain\0", b"main\0"];

/// An opened VST2 module.
pub struct Module {
    name: String,
    path: Option<PathBuf>,
    entry: PluginMain,
    library: Option<Arc<libloading::Library>>,
}

impl Module {
    /// Opens the module at `path`. On macOS a `.vst` bundle resolves to its
    /// inner binary.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let resolved = resolve_bundle_path(path);

        // SAFETY: loading runs the module's initializers; trusting them is
        // inherent to hosting native plugins.
        let library = unsafe {
            libloading::Library::new(&resolved).map_err(|e| BridgeError::LoadFailed {
                path: path.to_path_buf(),
                stage: LoadStage::Opening,
                reason: format!("Failed to load library: {}", e),
            })?
        };

        let mut last_error = None;
        let mut entry = None;
        for symbol in ENTRY_SYMBOLS {
            // SAFETY: the symbol is declared with the entry point signature.
            match unsafe { library.get::<PluginMain>(symbol) } {
                Ok(found) => {
                    entry = Some(*found);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let entry = entry.ok_or_else(|| BridgeError::LoadFailed {
            path: path.to_path_buf(),
            stage: LoadStage::EntryPoint,
            reason: format!(
                "No VSTPluginMain or main symbol: {}",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
        })?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("loaded VST2 module {:?} from {}", name, resolved.display());

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            entry,
            library: Some(Arc::new(library)),
        })
    }

    /// Wraps an entry point linked into this process.
    pub fn from_entry(name: impl Into<String>, entry: PluginMain) -> Self {
        Self {
            name: name.into(),
            path: None,
            entry,
            library: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates an instance bound to `callback`. The instance is not opened;
    /// call [`Plugin::start`].
    pub fn plugin(&self, callback: HostCallbackFn) -> Result<Plugin> {
        let effect = {
            let _pending = PendingBinding::install(Arc::clone(&callback));
            // SAFETY: the entry point has the exported signature.
            unsafe { (self.entry)(Some(host_trampoline)) }
        };

        let Some(effect) = NonNull::new(effect) else {
            return Err(self.instantiation_error("entry point returned null"));
        };
        // SAFETY: a non-null effect points to a header owned by the plugin.
        let magic = unsafe { effect.as_ref().magic };
        if magic != EFFECT_MAGIC {
            return Err(BridgeError::InvalidEntryPoint(format!(
                "{}: bad magic {:#010x}",
                self.name, magic
            )));
        }

        let plugin = Plugin::new(effect, callback, self.library.clone());
        tracing::info!(
            "created {} instance at {:p}: {} in / {} out, {} params",
            self.name,
            effect,
            plugin.num_inputs(),
            plugin.num_outputs(),
            plugin.num_params()
        );
        Ok(plugin)
    }

    fn instantiation_error(&self, reason: &str) -> BridgeError {
        BridgeError::LoadFailed {
            path: self.path.clone().unwrap_or_else(|| PathBuf::from(&self.name)),
            stage: LoadStage::Instantiation,
            reason: reason.to_string(),
        }
    }

    /// Releases this handle; same as dropping it. Instances created from
    /// the module hold their own reference to the library and keep it
    /// loaded until they are closed.
    pub fn close(self) {
        tracing::debug!("closing module {}", self.name);
        drop(self);
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("in_process", &self.library.is_none())
            .finish()
    }
}

/// Resolves a macOS `.vst` bundle to the binary at `Contents/MacOS/<name>`.
fn resolve_bundle_path(path: &Path) -> PathBuf {
    if path.is_dir() && path.extension().and_then(|e| e.to_str()) == Some("vst") {
        let stem = path.file_stem().unwrap_or_default();
        let inner = path.join("Contents").join("MacOS").join(stem);
        if inner.exists() {
            return inner;
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails_opening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.so");
        let err = Module::open(&path).unwrap_err();
        match err {
            BridgeError::LoadFailed { stage, path: failed, .. } => {
                assert_eq!(stage, LoadStage::Opening);
                assert_eq!(failed, path);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_open_non_library_fails_opening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.so");
        std::fs::write(&path, b"not a shared object").unwrap();
        let err = Module::open(&path).unwrap_err();
        assert!(
            matches!(err, BridgeError::LoadFailed { stage: LoadStage::Opening, .. }),
            "{}",
            err
        );
    }

    #[test]
    fn test_resolve_bundle_path() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Echo.vst");
        let inner = bundle.join("Contents").join("MacOS");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(inner.join("Echo"), b"").unwrap();
        assert_eq!(resolve_bundle_path(&bundle), inner.join("Echo"));

        let plain = dir.path().join("echo.so");
        assert_eq!(resolve_bundle_path(&plain), plain);
    }

    unsafe extern "C" fn null_entry(
        _callback: Option<vst2_core::HostCallbackProc>,
    ) -> *mut vst2_core::AEffect {
        std::ptr::null_mut()
    }

    #[test]
    fn test_null_effect_is_instantiation_error() {
        let module = Module::from_entry("null", null_entry);
        assert_eq!(module.name(), "null");
        assert!(module.path().is_none());
        let err = module.plugin(crate::noop_host_callback()).unwrap_err();
        assert!(
            matches!(err, BridgeError::LoadFailed { stage: LoadStage::Instantiation, .. }),
            "{}",
            err
        );
    }

    #[test]
    fn test_instances_outlive_closed_module() {
        let module = Module::from_entry(vst2_demo::NAME, vst2_demo::VSTPluginMain);
        let plugin = module
            .plugin(crate::noop_host_callback())
            .expect("Failed to create demo instance");
        module.close();
        plugin.start();
        plugin.set_param_value(0, 0.25);
        assert_eq!(plugin.param_value(0), 0.25);
        assert_eq!(plugin.plugin_name(), vst2_demo::NAME);
        plugin.close();
    }
}
