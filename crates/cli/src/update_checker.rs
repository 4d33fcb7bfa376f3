//! Passive background update check.
//!
//! On CLI start (unless opted out) a daemon thread consults a 24-hour disk
//! cache and, when stale, asks the package registry for the latest
//! release. Before the process exits, a one-line notice lands on stderr if
//! a newer version is known. The check must never slow down or fail a
//! command: every error is swallowed, and a thread that has not finished
//! by exit time is simply ignored.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use flash_client::credentials;
use flash_domain::env;

pub const CACHE_FILENAME: &str = "update_check.json";
const CHECK_INTERVAL_HOURS: i64 = 24;
const REGISTRY_URL: &str = "https://crates.io/api/v1/crates/flash-cli";

static NEWER_VERSION: OnceLock<String> = OnceLock::new();
static CHECK_DONE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Serialize, Deserialize)]
struct UpdateCache {
    last_checked_utc: String,
    latest_version: String,
}

/// Spawn the daemon check thread. Skipped under `CI` or
/// `FLASH_NO_UPDATE_CHECK`.
pub fn start_background_check() {
    if std::env::var_os(env::FLASH_NO_UPDATE_CHECK).is_some()
        || std::env::var_os(env::CI).is_some()
    {
        return;
    }
    std::thread::Builder::new()
        .name("flash-update-check".into())
        .spawn(run_check)
        .ok();
}

/// Print the notice if the background check finished and found something.
pub fn print_update_notice() {
    if !CHECK_DONE.load(Ordering::SeqCst) {
        return;
    }
    if let Some(version) = NEWER_VERSION.get() {
        eprintln!(
            "\nA new version of flash is available: {version}  Run 'flash update' to upgrade."
        );
    }
}

fn run_check() {
    let result = check(env!("CARGO_PKG_VERSION"));
    if let Some(version) = result {
        let _ = NEWER_VERSION.set(version);
    }
    CHECK_DONE.store(true, Ordering::SeqCst);
}

/// Returns the newer version when one exists. All failures become `None`.
fn check(current: &str) -> Option<String> {
    let cache_path = cache_path();
    let cached = read_cache(&cache_path);

    let latest = match cached.filter(is_cache_fresh) {
        Some(cache) => cache.latest_version,
        None => {
            let latest = fetch_latest_version()?;
            write_cache(&cache_path, &latest);
            latest
        }
    };

    (parse_version(&latest) > parse_version(current)).then_some(latest)
}

/// Cache lives beside the credentials file under the config home.
pub fn cache_path() -> PathBuf {
    credentials::config_home().join("runpod").join(CACHE_FILENAME)
}

fn read_cache(path: &PathBuf) -> Option<UpdateCache> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn is_cache_fresh(cache: &UpdateCache) -> bool {
    let Ok(last_checked) = chrono::DateTime::parse_from_rfc3339(&cache.last_checked_utc)
    else {
        return false;
    };
    let elapsed = chrono::Utc::now().signed_duration_since(last_checked);
    elapsed.num_hours() < CHECK_INTERVAL_HOURS
}

fn write_cache(path: &PathBuf, latest_version: &str) {
    let cache = UpdateCache {
        last_checked_utc: chrono::Utc::now().to_rfc3339(),
        latest_version: latest_version.to_string(),
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(raw) = serde_json::to_string(&cache) {
        let _ = std::fs::write(path, raw);
    }
}

fn fetch_latest_version() -> Option<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(flash_client::user_agent::user_agent())
        .build()
        .ok()?;
    let payload: serde_json::Value = client.get(REGISTRY_URL).send().ok()?.json().ok()?;
    payload["crate"]["max_stable_version"]
        .as_str()
        .map(String::from)
}

/// `"1.5.0"` → `(1, 5, 0)`; non-numeric segments count as zero.
pub fn parse_version(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| {
            part.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
        .collect()
}
