use std::path::PathBuf;
use thiserror::Error;

/// Failures around the station's persisted settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
