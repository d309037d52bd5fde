//! Host-side configuration answered to plugin callbacks.

use crate::flags::HostLanguage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Values a host reports about itself.
///
/// Every field has a default, so partial configuration files deserialize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,

    /// Maximum frames per process call
    pub block_size: usize,

    /// Host vendor name (at most 63 ASCII characters reach the plugin)
    pub vendor: String,

    /// Host product name
    pub product: String,

    /// Host version as a plain integer
    pub vendor_version: i32,

    /// User interface language
    pub language: Language,

    /// Directory reported to plugins asking for their install location
    pub directory: Option<PathBuf>,
}

/// Serializable mirror of [`HostLanguage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    German,
    French,
    Italian,
    Spanish,
    Japanese,
}

impl From<Language> for HostLanguage {
    fn from(language: Language) -> Self {
        match language {
            Language::English => HostLanguage::English,
            Language::German => HostLanguage::German,
            Language::French => HostLanguage::French,
            Language::Italian => HostLanguage::Italian,
            Language::Spanish => HostLanguage::Spanish,
            Language::Japanese => HostLanguage::Japanese,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            block_size: 512,
            vendor: "vst2-bridge".to_string(),
            product: "vst2-bridge".to_string(),
            vendor_version: 1,
            language: Language::English,
            directory: None,
        }
    }
}

impl HostConfig {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            ..Self::default()
        }
    }

    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    pub fn vendor_version(mut self, version: i32) -> Self {
        self.vendor_version = version;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HostConfig::new(48_000.0, 256)
            .vendor("Acme")
            .product("Mixer")
            .vendor_version(1200)
            .language(Language::German)
            .directory("/opt/vst");
        assert_eq!(config.sample_rate, 48_000.0);
        assert_eq!(config.block_size, 256);
        assert_eq!(config.vendor, "Acme");
        assert_eq!(HostLanguage::from(config.language), HostLanguage::German);
        assert_eq!(config.directory, Some(PathBuf::from("/opt/vst")));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = HostConfig::default().product("Render").block_size(64);
        let json = serde_json::to_string(&config).unwrap();
        let decoded: HostConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_config_serde_partial_uses_defaults() {
        let decoded: HostConfig =
            serde_json::from_str(r#"{"sample_rate": 96000.0, "language": "french"}"#).unwrap();
        assert_eq!(decoded.sample_rate, 96_000.0);
        assert_eq!(decoded.block_size, 512);
        assert_eq!(decoded.language, Language::French);
        assert!(decoded.directory.is_none());
    }
}
