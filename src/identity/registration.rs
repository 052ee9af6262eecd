//! Persisted device registration record
//!
//! Stored as JSON next to the rest of the device configuration. The file only
//! ever changes after a successful registration call, and every write goes
//! through a temp file in the same directory followed by a rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Device registration as last confirmed by the cloud service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    /// Device model the device was registered under
    pub model_id: String,

    /// Cloud project owning the device model
    pub project_id: String,

    /// Device id the registration was made for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_device_id: Option<String>,
}

impl DeviceRegistration {
    /// Read the record at `path`
    ///
    /// A missing file is not an error: it means the device has never been
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no device registration on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let registration: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid device config {}: {e}", path.display())))?;

        tracing::debug!(
            path = %path.display(),
            model_id = %registration.model_id,
            last_device_id = ?registration.last_device_id,
            "loaded device registration"
        );

        Ok(Some(registration))
    }

    /// Write the record to `path`, creating the parent directory if needed
    ///
    /// Either the whole record lands or the previous file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the write fails
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let content = serde_json::to_string_pretty(self)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            path = %path.display(),
            model_id = %self.model_id,
            project_id = %self.project_id,
            "saved device registration"
        );
        Ok(())
    }

    /// Default record location: `~/.config/kestrel/device.json`
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".config/kestrel/device.json"),
            |d| d.config_dir().join("kestrel").join("device.json"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceRegistration {
        DeviceRegistration {
            model_id: "kestrel-model".to_string(),
            project_id: "kestrel-project".to_string(),
            last_device_id: Some("dev-1".to_string()),
        }
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = DeviceRegistration::load(&dir.path().join("device.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_creates_directory_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("device.json");

        sample().save(&path).unwrap();

        let loaded = DeviceRegistration::load(&path).unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn reads_file_without_last_device_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, r#"{"model_id": "m", "project_id": "p"}"#).unwrap();

        let loaded = DeviceRegistration::load(&path).unwrap().unwrap();
        assert_eq!(loaded.model_id, "m");
        assert!(loaded.last_device_id.is_none());
    }

    #[test]
    fn invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, "{ not json").unwrap();

        let err = DeviceRegistration::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn save_replaces_previous_record_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");

        sample().save(&path).unwrap();
        let updated = DeviceRegistration {
            last_device_id: Some("dev-2".to_string()),
            ..sample()
        };
        updated.save(&path).unwrap();

        let loaded = DeviceRegistration::load(&path).unwrap().unwrap();
        assert_eq!(loaded.last_device_id.as_deref(), Some("dev-2"));

        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn serialized_keys_match_device_config_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["model_id"], "kestrel-model");
        assert_eq!(json["project_id"], "kestrel-project");
        assert_eq!(json["last_device_id"], "dev-1");
    }
}
