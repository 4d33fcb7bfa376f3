//! API-key storage.
//!
//! Lookup order: `RUNPOD_API_KEY` (non-blank) wins over the credentials
//! file. The file lives under the XDG config home
//! (`~/.config/runpod/credentials.toml` by default) and holds a single
//! `api_key` string. A malformed or blank file means "no key", never an
//! error — login simply starts fresh.

use std::path::PathBuf;

use flash_domain::{env, Error, Result};

const CREDENTIALS_FILENAME: &str = "credentials.toml";

/// Resolve where the credentials file lives.
///
/// `RUNPOD_CREDENTIALS_FILE` overrides; otherwise
/// `${XDG_CONFIG_HOME:-~/.config}/runpod/credentials.toml`.
pub fn credentials_path() -> PathBuf {
    if let Some(explicit) = env::var_nonblank(env::RUNPOD_CREDENTIALS_FILE) {
        return PathBuf::from(explicit);
    }
    config_home().join("runpod").join(CREDENTIALS_FILENAME)
}

/// The XDG config home, honoring `XDG_CONFIG_HOME`.
pub fn config_home() -> PathBuf {
    if let Some(xdg) = env::var_nonblank(env::XDG_CONFIG_HOME) {
        return PathBuf::from(xdg);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
}

/// Look up the user's API key: environment first, then the credentials file.
/// Blank values are treated as absent.
pub fn get_api_key() -> Option<String> {
    if let Some(key) = env::var_nonblank(env::RUNPOD_API_KEY) {
        return Some(key);
    }
    read_key_from_file()
}

fn read_key_from_file() -> Option<String> {
    let path = credentials_path();
    let raw = std::fs::read_to_string(&path).ok()?;
    let parsed: toml::Value = match raw.parse() {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring malformed credentials file");
            return None;
        }
    };
    parsed
        .get("api_key")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Persist the API key with owner-only permissions. Creates parent
/// directories. Returns the path written.
pub fn save_api_key(key: &str) -> Result<PathBuf> {
    let path = credentials_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = format!("api_key = \"{}\"\n", key.trim());

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    std::fs::write(&path, contents)?;

    tracing::debug!(path = %path.display(), "API key saved");
    Ok(path)
}

/// Error the caller can show when no key resolves anywhere.
pub fn require_api_key() -> Result<String> {
    get_api_key().ok_or_else(Error::missing_api_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Credential lookups read process-global env vars; serialize the tests
    // that mutate them.
    static ENV_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

    struct EnvVar(&'static str);

    impl EnvVar {
        fn set(name: &'static str, value: &str) -> Self {
            std::env::set_var(name, value);
            EnvVar(name)
        }
    }

    impl Drop for EnvVar {
        fn drop(&mut self) {
            std::env::remove_var(self.0);
        }
    }

    #[test]
    fn env_var_takes_precedence() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.toml");
        std::fs::write(&creds, "api_key = \"stored-key\"\n").unwrap();

        let _file = EnvVar::set(env::RUNPOD_CREDENTIALS_FILE, creds.to_str().unwrap());
        let _key = EnvVar::set(env::RUNPOD_API_KEY, "env-key");
        assert_eq!(get_api_key().as_deref(), Some("env-key"));
    }

    #[test]
    fn blank_env_falls_back_to_file() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.toml");
        std::fs::write(&creds, "api_key = \"stored-key\"\n").unwrap();

        let _file = EnvVar::set(env::RUNPOD_CREDENTIALS_FILE, creds.to_str().unwrap());
        let _key = EnvVar::set(env::RUNPOD_API_KEY, "   ");
        assert_eq!(get_api_key().as_deref(), Some("stored-key"));
    }

    #[test]
    fn malformed_file_means_no_key() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.toml");
        std::fs::write(&creds, "not valid toml {{{{").unwrap();

        let _file = EnvVar::set(env::RUNPOD_CREDENTIALS_FILE, creds.to_str().unwrap());
        assert_eq!(get_api_key(), None);
    }

    #[test]
    fn blank_stored_key_means_no_key() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.toml");
        std::fs::write(&creds, "api_key = \"  \"\n").unwrap();

        let _file = EnvVar::set(env::RUNPOD_CREDENTIALS_FILE, creds.to_str().unwrap());
        assert_eq!(get_api_key(), None);
    }

    #[test]
    fn non_string_key_means_no_key() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.toml");
        std::fs::write(&creds, "api_key = 12345\n").unwrap();

        let _file = EnvVar::set(env::RUNPOD_CREDENTIALS_FILE, creds.to_str().unwrap());
        assert_eq!(get_api_key(), None);
    }

    #[test]
    fn save_creates_parents_and_round_trips() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("deep").join("nested").join("credentials.toml");

        let _file = EnvVar::set(env::RUNPOD_CREDENTIALS_FILE, creds.to_str().unwrap());
        let written = save_api_key("my-new-key").unwrap();
        assert_eq!(written, creds);
        assert_eq!(get_api_key().as_deref(), Some("my-new-key"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&creds).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn save_overwrites_existing(){
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.toml");
        std::fs::write(&creds, "api_key = \"old-key\"\n").unwrap();

        let _file = EnvVar::set(env::RUNPOD_CREDENTIALS_FILE, creds.to_str().unwrap());
        save_api_key("new-key").unwrap();
        assert_eq!(get_api_key().as_deref(), Some("new-key"));
    }
}
