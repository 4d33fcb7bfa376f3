//! `flash login` — browser-approval auth flow.
//!
//! An unauthenticated session creates an auth request; the user approves
//! it in the browser; polling picks up the issued API key and stores it in
//! the credentials file.

use std::time::{Duration, Instant};

use serde_json::json;

use flash_client::{credentials, ControlPlaneClient};

const POLL_INTERVAL: Duration = Duration::from_secs(3);

pub async fn run(no_open: bool, timeout_seconds: u64) -> anyhow::Result<()> {
    let client = ControlPlaneClient::unauthenticated()?;

    let data = client
        .graphql(
            r#"mutation createFlashAuthRequest {
                createFlashAuthRequest { id url }
            }"#,
            json!({}),
        )
        .await?;
    let request = &data["createFlashAuthRequest"];
    let (Some(id), Some(url)) = (request["id"].as_str(), request["url"].as_str()) else {
        anyhow::bail!("auth request failed: control plane returned no id/url");
    };

    println!("\nTo log in, approve this request in your browser:\n");
    println!("    {url}\n");
    if !no_open {
        println!("(copy the URL into a browser on any machine)\n");
    }

    let deadline = Instant::now() + Duration::from_secs(timeout_seconds);
    loop {
        if Instant::now() >= deadline {
            anyhow::bail!(
                "login timed out after {timeout_seconds}s; run 'flash login' to try again"
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;

        let data = client
            .graphql(
                r#"query flashAuthRequestStatus($id: String!) {
                    flashAuthRequestStatus(id: $id) { status apiKey }
                }"#,
                json!({ "id": id }),
            )
            .await?;
        let status_payload = &data["flashAuthRequestStatus"];
        match status_payload["status"].as_str() {
            Some("APPROVED") => {
                let api_key = status_payload["apiKey"]
                    .as_str()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        anyhow::anyhow!("auth request approved but no API key was issued")
                    })?;
                let path = credentials::save_api_key(api_key)?;
                println!("Logged in. API key saved to {}", path.display());
                return Ok(());
            }
            Some("DENIED") => anyhow::bail!("login denied in the browser"),
            Some("EXPIRED") => anyhow::bail!("auth request expired; run 'flash login' again"),
            _ => {} // PENDING — keep polling
        }
    }
}
