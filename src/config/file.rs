//! TOML configuration file loading
//!
//! Supports `~/.config/kestrel/config.toml` as a persistent config source.
//! All fields are optional: the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct KestrelConfigFile {
    /// Device identity settings
    #[serde(default)]
    pub device: DeviceFileConfig,

    /// Assistant bridge settings
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Plugin selection and per-plugin settings
    #[serde(default)]
    pub plugins: PluginsFileConfig,
}

/// Device identity configuration
#[derive(Debug, Default, Deserialize)]
pub struct DeviceFileConfig {
    /// Device model id registered with the cloud project
    pub model_id: Option<String>,

    /// Cloud project id used for registration
    pub project_id: Option<String>,

    /// Nickname shown in the user's device list
    pub nickname: Option<String>,

    /// Where the registration record is persisted
    pub config_path: Option<PathBuf>,

    /// OAuth credentials file
    pub credentials: Option<PathBuf>,
}

/// Assistant bridge configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Bridge executable
    pub command: Option<PathBuf>,

    /// Extra bridge arguments
    pub args: Option<Vec<String>>,

    /// Minimum time between accepted conversation requests
    pub conversation_cooldown_ms: Option<u64>,
}

/// Plugin configuration
#[derive(Debug, Default, Deserialize)]
pub struct PluginsFileConfig {
    /// Plugins to load, in dispatch order
    pub enabled: Option<Vec<String>>,

    /// Status LED plugin settings
    #[serde(default)]
    pub voicekit: VoiceKitFileConfig,
}

/// Status LED plugin configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceKitFileConfig {
    /// LED class device name (e.g. "led0")
    pub led: Option<String>,

    /// LED class directory override
    pub leds_dir: Option<PathBuf>,
}

/// Load the TOML config file from `path`, or the standard path if `None`
///
/// Returns `KestrelConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> KestrelConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return KestrelConfigFile::default();
    };

    if !path.exists() {
        return KestrelConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                KestrelConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            KestrelConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/kestrel/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("kestrel").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let file: KestrelConfigFile = toml::from_str(
            r#"
            [device]
            model_id = "kestrel-model"
            project_id = "kestrel-project"
            nickname = "kitchen"

            [assistant]
            command = "/usr/local/bin/assistant-bridge"
            args = ["--lang", "en-GB"]
            conversation_cooldown_ms = 750

            [plugins]
            enabled = ["voicekit", "trigger"]

            [plugins.voicekit]
            led = "led0"
            "#,
        )
        .unwrap();

        assert_eq!(file.device.model_id.as_deref(), Some("kestrel-model"));
        assert_eq!(file.assistant.args.unwrap(), vec!["--lang", "en-GB"]);
        assert_eq!(file.assistant.conversation_cooldown_ms, Some(750));
        assert_eq!(file.plugins.enabled.unwrap(), vec!["voicekit", "trigger"]);
        assert_eq!(file.plugins.voicekit.led.as_deref(), Some("led0"));
    }

    #[test]
    fn empty_file_is_default() {
        let file: KestrelConfigFile = toml::from_str("").unwrap();
        assert!(file.device.model_id.is_none());
        assert!(file.plugins.enabled.is_none());
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device\nmodel_id = ").unwrap();

        let file = load_config_file(Some(&path));
        assert!(file.device.model_id.is_none());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = load_config_file(Some(&dir.path().join("absent.toml")));
        assert!(file.assistant.command.is_none());
    }
}
