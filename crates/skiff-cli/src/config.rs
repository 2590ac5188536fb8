//! Local CLI state: the saved identity and the API endpoint.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

const API_URL_ENV: &str = "SKIFF_API_URL";

#[derive(Debug, Serialize, Deserialize)]
struct Credentials {
    username: String,
}

/// Resolve the API endpoint: explicit flag, then environment, then default.
pub fn api_url(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var(API_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

fn credentials_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("skiff")
        .join("user.json"))
}

pub fn save_user(username: &str) -> Result<()> {
    write_credentials(&credentials_path()?, username)
}

/// The saved identity, if any. Unreadable or malformed files count as
/// not logged in.
pub fn current_user() -> Option<String> {
    read_credentials(&credentials_path().ok()?)
}

pub fn require_user() -> Result<String> {
    current_user().context("not logged in, run `skiff login <username>` first")
}

fn write_credentials(path: &Path, username: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;
    }
    let creds = Credentials {
        username: username.to_string(),
    };
    fs::write(path, serde_json::to_vec(&creds)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn read_credentials(path: &Path) -> Option<String> {
    let raw = fs::read(path).ok()?;
    let creds: Credentials = serde_json::from_slice(&raw).ok()?;
    Some(creds.username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("user.json");

        write_credentials(&path, "alice").unwrap();
        assert_eq!(read_credentials(&path), Some("alice".to_string()));
    }

    #[test]
    fn missing_or_malformed_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        assert_eq!(read_credentials(&path), None);

        fs::write(&path, b"not json").unwrap();
        assert_eq!(read_credentials(&path), None);
    }

    #[test]
    fn flag_beats_default() {
        assert_eq!(api_url(Some("http://api:9000".into())), "http://api:9000");
    }
}
