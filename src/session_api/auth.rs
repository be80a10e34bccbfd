use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Deserialize;

/// Source of the current Firebase ID token
///
/// Read once per request. Implementations must not refresh the token here;
/// that belongs to the auth layer.
pub trait AuthTokenProvider: Send + Sync {
    /// The latest cached ID token, or `None` when signed out
    fn current_id_token(&self) -> Option<String>;
}

/// Treat empty and whitespace-only tokens as absent
fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.trim().is_empty())
}

/// Fixed token, mostly for tests and scripts
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl AuthTokenProvider for StaticToken {
    fn current_id_token(&self) -> Option<String> {
        non_empty(self.0.clone())
    }
}

/// Token slot shared with the auth layer, which updates it on sign-in,
/// refresh and sign-out
#[derive(Debug, Clone, Default)]
pub struct SharedToken(Arc<RwLock<Option<String>>>);

impl SharedToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.0.write() {
            *slot = Some(token.into());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.0.write() {
            *slot = None;
        }
    }
}

impl AuthTokenProvider for SharedToken {
    fn current_id_token(&self) -> Option<String> {
        let token = self.0.read().ok().and_then(|slot| slot.clone());
        non_empty(token)
    }
}

/// Auth file structure written by the desktop app (`auth.json`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthFile {
    id_token: Option<String>,
}

/// Reads the ID token from the app's persisted `auth.json` on every call
///
/// A missing or unreadable file means "signed out".
#[derive(Debug, Clone)]
pub struct StoredAuthToken {
    path: PathBuf,
}

impl StoredAuthToken {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthTokenProvider for StoredAuthToken {
    fn current_id_token(&self) -> Option<String> {
        match read_token_file(&self.path) {
            Ok(token) => non_empty(token),
            Err(e) => {
                log::debug!("No usable auth token: {e}");
                None
            }
        }
    }
}

fn read_token_file(path: &Path) -> Result<Option<String>, String> {
    if !path.exists() {
        return Err(format!("Auth file not found at {}", path.display()));
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read auth file: {e}"))?;

    parse_auth_json(&content)
}

fn parse_auth_json(json_str: &str) -> Result<Option<String>, String> {
    let auth: AuthFile = serde_json::from_str(json_str.trim())
        .map_err(|e| format!("Failed to parse auth JSON: {e}"))?;
    Ok(auth.id_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_treats_empty_as_absent() {
        assert_eq!(StaticToken::new("abc").current_id_token().as_deref(), Some("abc"));
        assert_eq!(StaticToken::new("").current_id_token(), None);
        assert_eq!(StaticToken::none().current_id_token(), None);
    }

    #[test]
    fn test_shared_token_set_and_clear() {
        let token = SharedToken::new();
        let reader = token.clone();
        assert_eq!(reader.current_id_token(), None);

        token.set("fresh-token");
        assert_eq!(reader.current_id_token().as_deref(), Some("fresh-token"));

        token.clear();
        assert_eq!(reader.current_id_token(), None);
    }

    #[test]
    fn test_parse_auth_json() {
        let json = r#"{ "idToken": "id-123", "refreshToken": "r-456", "user": {"uid": "u1"} }"#;
        assert_eq!(parse_auth_json(json).unwrap().as_deref(), Some("id-123"));

        assert_eq!(parse_auth_json("{}").unwrap(), None);
        assert!(parse_auth_json("not json").is_err());
    }

    #[test]
    fn test_stored_token_reads_file_each_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let provider = StoredAuthToken::new(&path);

        assert_eq!(provider.current_id_token(), None);

        std::fs::write(&path, r#"{"idToken": "first"}"#).unwrap();
        assert_eq!(provider.current_id_token().as_deref(), Some("first"));

        std::fs::write(&path, r#"{"idToken": "second"}"#).unwrap();
        assert_eq!(provider.current_id_token().as_deref(), Some("second"));

        std::fs::write(&path, r#"{"idToken": ""}"#).unwrap();
        assert_eq!(provider.current_id_token(), None);
    }
}
