//! Focus settings shared between the popup UI and the bridge.
//!
//! The bridge treats [`FocusConfig`] as an opaque payload; the editing rules
//! and the on-disk format live here.

use serde::{Deserialize, Serialize};

mod error;
mod persistence;
mod sync;

pub use error::{SettingsError, SettingsResult};
pub use persistence::{LoadedSettings, SETTINGS_DIR, SETTINGS_FILE, SettingsStore};
pub use sync::SyncOutcome;

/// Domains seeded into the whitelist the first time the extension starts.
pub const DEFAULT_WHITELIST: &[&str] = &["google.com", "github.com", "localhost"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FocusConfig {
    #[serde(alias = "isActive")]
    pub is_active: bool,
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            is_active: false,
            whitelist: DEFAULT_WHITELIST.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl FocusConfig {
    /// Adds a domain to the end of the whitelist.
    ///
    /// The whitelist is read-only while focus mode is active.
    pub fn add_domain(&mut self, raw: &str) -> SettingsResult<()> {
        if self.is_active {
            return Err(SettingsError::Locked);
        }
        let domain = raw.trim();
        if domain.is_empty() {
            return Err(SettingsError::EmptyDomain);
        }
        if self.whitelist.iter().any(|d| d == domain) {
            return Err(SettingsError::DomainExists(domain.to_string()));
        }
        self.whitelist.push(domain.to_string());
        Ok(())
    }

    /// Removes every entry equal to `domain`. Returns whether anything changed.
    pub fn remove_domain(&mut self, domain: &str) -> SettingsResult<bool> {
        if self.is_active {
            return Err(SettingsError::Locked);
        }
        let before = self.whitelist.len();
        self.whitelist.retain(|d| d != domain);
        Ok(self.whitelist.len() != before)
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}
