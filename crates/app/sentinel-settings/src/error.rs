use std::path::PathBuf;

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings")]
    Parse(#[from] serde_json_lenient::Error),

    #[error("missing config dir")]
    MissingConfigDir,

    #[error("Domain already exists")]
    DomainExists(String),

    #[error("Domain cannot be empty")]
    EmptyDomain,

    #[error("Whitelist cannot be edited while focus mode is active")]
    Locked,
}
