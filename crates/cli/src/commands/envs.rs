//! `flash env` — deployment-environment CRUD over the control plane.

use serde_json::json;

use flash_client::ControlPlaneClient;

use crate::cli::EnvCommand;
use crate::format;

pub async fn run(command: EnvCommand) -> anyhow::Result<()> {
    let client = ControlPlaneClient::new(None)?;
    match command {
        EnvCommand::Create { app, name } => create(&client, &app, &name).await,
        EnvCommand::Get { id } => get(&client, &id).await,
        EnvCommand::List { app } => list(&client, &app).await,
        EnvCommand::Delete { id } => delete(&client, &id).await,
    }
}

async fn list(client: &ControlPlaneClient, app: &str) -> anyhow::Result<()> {
    let data = client
        .graphql(
            r#"query flashEnvironments($appName: String!) {
                flashEnvironments(appName: $appName) { id name state createdAt }
            }"#,
            json!({ "appName": app }),
        )
        .await?;

    let environments = data["flashEnvironments"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    if environments.is_empty() {
        println!("\nNo environments found for app '{app}'.\n");
        return Ok(());
    }

    println!("\nEnvironments for '{app}' ({})\n", environments.len());
    let rows: Vec<(String, String)> = environments
        .iter()
        .map(|environment| {
            (
                environment["name"].as_str().unwrap_or("(unnamed)").to_string(),
                format!(
                    "{}  {}",
                    environment["id"].as_str().unwrap_or("?"),
                    environment["state"].as_str().unwrap_or("UNKNOWN")
                ),
            )
        })
        .collect();
    format::print_rows(&rows);
    println!();
    Ok(())
}

async fn get(client: &ControlPlaneClient, id: &str) -> anyhow::Result<()> {
    let data = client
        .graphql(
            r#"query flashEnvironment($id: String!) {
                flashEnvironment(id: $id) { id name state createdAt resourcesEndpoints }
            }"#,
            json!({ "id": id }),
        )
        .await?;

    let environment = &data["flashEnvironment"];
    if environment.is_null() {
        anyhow::bail!("environment '{id}' not found");
    }
    println!("\n{}", environment["name"].as_str().unwrap_or(id));
    println!("  id:     {}", environment["id"].as_str().unwrap_or("?"));
    println!(
        "  state:  {}",
        environment["state"].as_str().unwrap_or("UNKNOWN")
    );
    if let Some(created) = environment["createdAt"].as_str() {
        println!("  created: {}", format::format_datetime(created));
    }
    println!();
    Ok(())
}

async fn create(client: &ControlPlaneClient, app: &str, name: &str) -> anyhow::Result<()> {
    let data = client
        .graphql(
            r#"mutation createFlashEnvironment($input: CreateFlashEnvironmentInput!) {
                createFlashEnvironment(input: $input) { id name }
            }"#,
            json!({ "input": { "appName": app, "name": name } }),
        )
        .await?;
    println!(
        "Created environment '{}' ({})",
        name,
        data["createFlashEnvironment"]["id"].as_str().unwrap_or("?")
    );
    Ok(())
}

async fn delete(client: &ControlPlaneClient, id: &str) -> anyhow::Result<()> {
    client
        .graphql(
            r#"mutation deleteFlashEnvironment($id: String!) {
                deleteFlashEnvironment(id: $id)
            }"#,
            json!({ "id": id }),
        )
        .await?;
    println!("Deleted environment '{id}'");
    Ok(())
}
