//! Configuration management for the Kestrel controller
//!
//! Precedence, lowest first: built-in defaults, the TOML config file,
//! environment variables and CLI flags (both arrive as [`ConfigOverrides`]).

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::assistant::BridgeConfig;
use crate::identity::{Credentials, DeviceRegistration, RegistrationRequest};

use self::file::KestrelConfigFile;

/// Bridge executable looked up on `PATH` when none is configured
pub const DEFAULT_ASSISTANT_COMMAND: &str = "kestrel-assistant-bridge";

/// Kestrel controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Identity requested for this run
    pub registration: RegistrationRequest,

    /// Where the registration record lives
    pub device_config: PathBuf,

    /// OAuth credentials file
    pub credentials: PathBuf,

    /// Plugins to load, in dispatch order
    pub plugins: Vec<String>,

    /// Assistant bridge process
    pub bridge: BridgeConfig,

    /// Minimum time between accepted conversation requests
    pub conversation_cooldown: Duration,

    /// Per-plugin settings
    pub plugin_settings: PluginSettings,
}

/// Per-plugin settings
#[derive(Debug, Clone, Default)]
pub struct PluginSettings {
    /// Status LED plugin
    pub voicekit: VoiceKitSettings,
}

/// Status LED plugin settings
#[derive(Debug, Clone, Default)]
pub struct VoiceKitSettings {
    /// LED class device name; `None` logs LED state instead
    pub led: Option<String>,

    /// LED class directory override
    pub leds_dir: Option<PathBuf>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Device model id
    pub device_model_id: Option<String>,
    /// Cloud project id
    pub project_id: Option<String>,
    /// Registration nickname
    pub nickname: Option<String>,
    /// Registration record path
    pub device_config: Option<PathBuf>,
    /// OAuth credentials path
    pub credentials: Option<PathBuf>,
    /// Plugins to load
    pub plugins: Option<Vec<String>>,
    /// Assistant bridge executable
    pub assistant_command: Option<PathBuf>,
    /// Config file override
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load the config file and apply `overrides` on top
    #[must_use]
    pub fn load(overrides: ConfigOverrides) -> Self {
        let file = file::load_config_file(overrides.config_file.as_deref());
        Self::resolve(file, overrides)
    }

    /// Merge a parsed config file with overrides
    #[must_use]
    pub fn resolve(file: KestrelConfigFile, overrides: ConfigOverrides) -> Self {
        let device = file.device;
        let assistant = file.assistant;

        let nickname = overrides
            .nickname
            .or(device.nickname)
            .or_else(default_nickname);

        let credentials = overrides
            .credentials
            .or(device.credentials)
            .unwrap_or_else(Credentials::default_path);

        let bridge = BridgeConfig {
            command: overrides
                .assistant_command
                .or(assistant.command)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSISTANT_COMMAND)),
            args: assistant.args.unwrap_or_default(),
            credentials: credentials.clone(),
        };

        Self {
            registration: RegistrationRequest {
                requested_model_id: overrides.device_model_id.or(device.model_id),
                requested_project_id: overrides.project_id.or(device.project_id),
                nickname,
            },
            device_config: overrides
                .device_config
                .or(device.config_path)
                .unwrap_or_else(DeviceRegistration::default_path),
            credentials,
            plugins: overrides
                .plugins
                .or(file.plugins.enabled)
                .unwrap_or_default(),
            bridge,
            conversation_cooldown: Duration::from_millis(
                assistant.conversation_cooldown_ms.unwrap_or(0),
            ),
            plugin_settings: PluginSettings {
                voicekit: VoiceKitSettings {
                    led: file.plugins.voicekit.led,
                    leds_dir: file.plugins.voicekit.leds_dir,
                },
            },
        }
    }
}

/// Host name, used as the registration nickname when none is configured
fn default_nickname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}
