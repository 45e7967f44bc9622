//! Configuration loading: required chat-service credentials (JSON) and
//! optional tool settings (TOML).
//!
//! Credentials search order: --config PATH, then ./config.json, then
//! $XDG_CONFIG_HOME/bookforge/config.json (or ~/.config/bookforge/config.json).
//! Settings search order: ./bookforge.toml, then
//! $XDG_CONFIG_HOME/bookforge/settings.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Chat-service login credentials, read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Use the Microsoft login provider instead of the default email login.
    #[serde(rename = "isMicrosoftLogin", default)]
    pub is_microsoft_login: bool,
}

/// Settings file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Settings {
    /// Default output directory when --directory is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// Base URL of the chat service API.
    pub base_url: Option<String>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Delay in seconds between chat requests.
    pub request_delay_secs: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Number of HTTP attempts for transient failures (default 3).
    pub retry_count: Option<u32>,
    /// Delay in seconds before each retry (e.g. [1, 2, 4]).
    pub retry_backoff_secs: Option<Vec<u64>>,
    /// Include a visible table-of-contents page after the title page (default: true).
    pub toc_page: Option<bool>,
}

/// Load credentials from `path` if given, otherwise from the search locations.
/// An explicit path that cannot be read is an error; with no explicit path,
/// having no credentials file anywhere is also an error (the tool cannot log in).
pub fn load_credentials(path: Option<&Path>) -> Result<Credentials, String> {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_credential_paths().into_iter().find(|p| p.exists()),
    };
    let Some(file) = candidate else {
        return Err(
            "No credentials file found. Create ./config.json (or \
             ~/.config/bookforge/config.json) with \"email\", \"password\", and \
             \"isMicrosoftLogin\", or pass --config PATH."
                .to_string(),
        );
    };
    let s = std::fs::read_to_string(&file)
        .map_err(|e| format!("Cannot read credentials {}: {}", file.display(), e))?;
    let creds: Credentials = serde_json::from_str(&s)
        .map_err(|e| format!("Invalid credentials {}: {}", file.display(), e))?;
    if creds.email.trim().is_empty() {
        return Err(format!("Credentials {}: email is empty.", file.display()));
    }
    if creds.password.is_empty() {
        return Err(format!("Credentials {}: password is empty.", file.display()));
    }
    Ok(creds)
}

fn default_credential_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("config.json")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("bookforge").join("config.json"));
    }
    paths
}

/// Search order: (1) ./bookforge.toml, (2) $XDG_CONFIG_HOME/bookforge/settings.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_settings() -> Result<Option<Settings>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("bookforge.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("bookforge").join("settings.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read settings {}: {}", path.display(), e))?;
            let settings: Settings = toml::from_str(&s)
                .map_err(|e| format!("Invalid settings {}: {}", path.display(), e))?;
            return Ok(Some(settings));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_credentials_with_all_fields() {
        let s = r#"{"email": "me@example.com", "password": "hunter2", "isMicrosoftLogin": true}"#;
        let c: Credentials = serde_json::from_str(s).unwrap();
        assert_eq!(c.email, "me@example.com");
        assert_eq!(c.password, "hunter2");
        assert!(c.is_microsoft_login);
    }

    #[test]
    fn parse_credentials_login_flag_defaults_false() {
        let s = r#"{"email": "me@example.com", "password": "hunter2"}"#;
        let c: Credentials = serde_json::from_str(s).unwrap();
        assert!(!c.is_microsoft_login);
    }

    #[test]
    fn load_credentials_explicit_path() {
        let path = std::env::temp_dir().join("bookforge_creds_test.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(br#"{"email": "a@b.c", "password": "p", "isMicrosoftLogin": false}"#)
            .unwrap();
        let c = load_credentials(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(c.email, "a@b.c");
    }

    #[test]
    fn load_credentials_explicit_missing_path_errors() {
        let path = PathBuf::from("/nonexistent_dir_bookforge_xyz/config.json");
        let result = load_credentials(Some(&path));
        assert!(result.is_err());
    }

    #[test]
    fn load_credentials_rejects_empty_email() {
        let path = std::env::temp_dir().join("bookforge_creds_empty_email.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(br#"{"email": "  ", "password": "p"}"#).unwrap();
        let result = load_credentials(Some(&path));
        std::fs::remove_file(&path).ok();
        assert!(result.unwrap_err().contains("email is empty"));
    }

    #[test]
    fn load_credentials_rejects_empty_password() {
        let path = std::env::temp_dir().join("bookforge_creds_empty_pw.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(br#"{"email": "a@b.c", "password": ""}"#).unwrap();
        let result = load_credentials(Some(&path));
        std::fs::remove_file(&path).ok();
        assert!(result.unwrap_err().contains("password is empty"));
    }

    #[test]
    fn parse_empty_settings() {
        let s: Settings = toml::from_str("").unwrap();
        assert!(s.output_dir.is_none());
        assert!(s.base_url.is_none());
        assert!(s.user_agent.is_none());
        assert!(s.request_delay_secs.is_none());
        assert!(s.timeout_secs.is_none());
        assert!(s.retry_count.is_none());
        assert!(s.retry_backoff_secs.is_none());
        assert!(s.toc_page.is_none());
    }

    #[test]
    fn parse_full_settings() {
        let s = r#"
            output_dir = "out"
            base_url = "https://chat.example.com/api"
            user_agent = "Custom/1.0"
            request_delay_secs = 3
            timeout_secs = 120
            retry_count = 5
            retry_backoff_secs = [1, 2, 4, 8]
            toc_page = false
        "#;
        let s: Settings = toml::from_str(s).unwrap();
        assert_eq!(s.output_dir.as_deref(), Some(Path::new("out")));
        assert_eq!(s.base_url.as_deref(), Some("https://chat.example.com/api"));
        assert_eq!(s.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(s.request_delay_secs, Some(3));
        assert_eq!(s.timeout_secs, Some(120));
        assert_eq!(s.retry_count, Some(5));
        assert_eq!(s.retry_backoff_secs.as_deref(), Some([1, 2, 4, 8].as_slice()));
        assert_eq!(s.toc_page, Some(false));
    }

    #[test]
    fn invalid_settings_toml_errors() {
        assert!(toml::from_str::<Settings>("output_dir = [").is_err());
    }
}
