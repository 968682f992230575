use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Where the session finds its provider credentials.
///
/// Looked up at every session start, so a key saved while the app runs is
/// picked up by the next call.
pub trait ApiKeyStore: Send + Sync {
    fn load(&self) -> Option<SecretString>;
}

#[derive(Deserialize)]
struct KeyFile {
    gemini_api_key: Option<String>,
}

/// Reads the key from a local JSON file, then from `GEMINI_API_KEY`.
#[derive(Debug, Clone, Default)]
pub struct LocalKeyStore {
    path: Option<PathBuf>,
}

impl LocalKeyStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn from_file(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("no key file at {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<KeyFile>(&raw) {
            Ok(file) => file.gemini_api_key.filter(|k| !k.trim().is_empty()),
            Err(e) => {
                tracing::warn!("ignoring malformed key file {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl ApiKeyStore for LocalKeyStore {
    fn load(&self) -> Option<SecretString> {
        self.from_file()
            .or_else(|| {
                std::env::var(API_KEY_ENV)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .map(|k| SecretString::from(k.trim().to_string()))
    }
}
