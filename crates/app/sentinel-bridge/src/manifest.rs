//! Browser native-messaging host manifests.
//! See: https://developer.chrome.com/docs/extensions/develop/concepts/native-messaging

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BridgeError, BridgeResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub host_type: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl HostManifest {
    pub fn file_name(host_name: &str) -> String {
        format!("{host_name}.json")
    }

    pub fn read(path: &Path) -> BridgeResult<Self> {
        let contents = std::fs::read(path).map_err(|source| BridgeError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: HostManifest = serde_json::from_slice(&contents)?;

        // Relative host paths are resolved against the manifest's directory.
        if manifest.path.is_relative()
            && let Some(dir) = path.parent()
        {
            manifest.path = dir.join(&manifest.path);
        }
        Ok(manifest)
    }

    /// Looks for `<host_name>.json` in each directory, in order.
    pub fn locate_in(host_name: &str, dirs: &[PathBuf]) -> BridgeResult<Self> {
        let file_name = Self::file_name(host_name);
        for dir in dirs {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                debug!("Using native host manifest {:?}", candidate);
                return Self::read(&candidate);
            }
        }
        Err(BridgeError::ManifestNotFound(host_name.to_string()))
    }

    /// Looks in the per-user manifest directories of the supported browsers.
    pub fn locate(host_name: &str) -> BridgeResult<Self> {
        Self::locate_in(host_name, &native_messaging_hosts_dirs())
    }
}

/// Per-user `NativeMessagingHosts` directories, Chrome first.
pub fn native_messaging_hosts_dirs() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let Some(home) = dirs::home_dir() else {
            return Vec::new();
        };
        let support = home.join("Library/Application Support");
        vec![
            support.join("Google/Chrome/NativeMessagingHosts"),
            support.join("Chromium/NativeMessagingHosts"),
        ]
    }

    #[cfg(not(target_os = "macos"))]
    {
        let Some(config) = dirs::config_dir() else {
            return Vec::new();
        };
        vec![
            config.join("google-chrome/NativeMessagingHosts"),
            config.join("chromium/NativeMessagingHosts"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, body: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("com.focussentinel.json"), body).unwrap();
    }

    #[test]
    fn parses_browser_manifest_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{
                "name": "com.focussentinel",
                "description": "Focus Sentinel policy host",
                "path": "/opt/focussentinel/host",
                "type": "stdio",
                "allowed_origins": ["chrome-extension://abc/"]
            }"#,
        );

        let manifest =
            HostManifest::locate_in("com.focussentinel", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(manifest.path, PathBuf::from("/opt/focussentinel/host"));
        assert_eq!(manifest.host_type, "stdio");
        assert_eq!(manifest.allowed_origins, vec!["chrome-extension://abc/"]);
    }

    #[test]
    fn relative_path_resolves_against_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"name": "com.focussentinel", "path": "bin/host", "type": "stdio"}"#,
        );

        let manifest =
            HostManifest::locate_in("com.focussentinel", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(manifest.path, dir.path().join("bin/host"));
    }

    #[test]
    fn first_directory_with_a_manifest_wins() {
        let empty = tempfile::tempdir().unwrap();
        let chromium = tempfile::tempdir().unwrap();
        write_manifest(
            chromium.path(),
            r#"{"name": "com.focussentinel", "path": "/usr/bin/host", "type": "stdio"}"#,
        );

        let manifest = HostManifest::locate_in(
            "com.focussentinel",
            &[empty.path().to_path_buf(), chromium.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(manifest.path, PathBuf::from("/usr/bin/host"));
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostManifest::locate_in("com.focussentinel", &[dir.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, BridgeError::ManifestNotFound(ref name) if name == "com.focussentinel"));
    }

    #[test]
    fn malformed_manifest_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"{"name": "com.focussentinel"}"#);
        let err = HostManifest::locate_in("com.focussentinel", &[dir.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, BridgeError::Json(_)));
    }
}
