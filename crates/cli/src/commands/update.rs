//! `flash update` — explicit version check with install instructions.

use crate::update_checker;

pub async fn run() -> anyhow::Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("flash {current}");

    let latest = fetch_latest().await?;
    if update_checker::parse_version(&latest) > update_checker::parse_version(current) {
        println!("\nA newer version is available: {latest}");
        println!("Upgrade with:\n\n    cargo install flash-cli --force\n");
    } else {
        println!("You are on the latest version.");
    }
    Ok(())
}

async fn fetch_latest() -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent(flash_client::user_agent::user_agent())
        .build()?;
    let payload: serde_json::Value = client
        .get("https://crates.io/api/v1/crates/flash-cli")
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("registry returned an error: {e}. Try again later."))?
        .json()
        .await?;
    payload["crate"]["max_stable_version"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| anyhow::anyhow!("registry response had no version information"))
}
