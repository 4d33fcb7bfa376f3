//! `flash app` — app CRUD over the control plane.

use serde_json::{json, Value};

use flash_client::ControlPlaneClient;

use crate::cli::AppCommand;
use crate::format;

pub async fn run(command: AppCommand) -> anyhow::Result<()> {
    let client = ControlPlaneClient::new(None)?;
    match command {
        AppCommand::Create { name } => create(&client, &name).await,
        AppCommand::Get { name } => get(&client, &name).await,
        AppCommand::List => list(&client).await,
        AppCommand::Delete { name } => delete(&client, &name).await,
    }
}

async fn list(client: &ControlPlaneClient) -> anyhow::Result<()> {
    let data = client
        .graphql(
            r#"query flashApps {
                flashApps { id name createdAt flashEnvironments { id } flashBuilds { id } }
            }"#,
            json!({}),
        )
        .await?;

    let apps = data["flashApps"].as_array().cloned().unwrap_or_default();
    if apps.is_empty() {
        println!("\nNo Flash apps found.");
        println!("  Run 'flash deploy' to create one.\n");
        return Ok(());
    }

    println!("\nApps ({})\n", apps.len());
    let rows: Vec<(String, String)> = apps
        .iter()
        .map(|app| {
            let environments = app["flashEnvironments"].as_array().map(Vec::len).unwrap_or(0);
            let builds = app["flashBuilds"].as_array().map(Vec::len).unwrap_or(0);
            (
                app["name"].as_str().unwrap_or("(unnamed)").to_string(),
                format!(
                    "{environments} env{}, {builds} build{}",
                    format::plural(environments),
                    format::plural(builds)
                ),
            )
        })
        .collect();
    format::print_rows(&rows);
    println!();
    Ok(())
}

async fn get(client: &ControlPlaneClient, name: &str) -> anyhow::Result<()> {
    let app = find_by_name(client, name).await?;
    println!("\n{}", app["name"].as_str().unwrap_or(name));
    println!("  id:       {}", app["id"].as_str().unwrap_or("?"));
    if let Some(created) = app["createdAt"].as_str() {
        println!("  created:  {}", format::format_datetime(created));
    }
    if let Some(environments) = app["flashEnvironments"].as_array() {
        println!("  environments:");
        for environment in environments {
            println!(
                "    {}  {}",
                environment["id"].as_str().unwrap_or("?"),
                environment["name"].as_str().unwrap_or("")
            );
        }
    }
    println!();
    Ok(())
}

async fn create(client: &ControlPlaneClient, name: &str) -> anyhow::Result<()> {
    let data = client
        .graphql(
            r#"mutation createFlashApp($input: CreateFlashAppInput!) {
                createFlashApp(input: $input) { id name }
            }"#,
            json!({ "input": { "name": name } }),
        )
        .await?;
    println!(
        "Created app '{}' ({})",
        name,
        data["createFlashApp"]["id"].as_str().unwrap_or("?")
    );
    Ok(())
}

async fn delete(client: &ControlPlaneClient, name: &str) -> anyhow::Result<()> {
    let app = find_by_name(client, name).await?;
    let id = app["id"].as_str().unwrap_or_default();
    client
        .graphql(
            r#"mutation deleteFlashApp($id: String!) {
                deleteFlashApp(id: $id)
            }"#,
            json!({ "id": id }),
        )
        .await?;
    println!("Deleted app '{name}'");
    Ok(())
}

async fn find_by_name(client: &ControlPlaneClient, name: &str) -> anyhow::Result<Value> {
    let data = client
        .graphql(
            r#"query flashApps {
                flashApps { id name createdAt flashEnvironments { id name } }
            }"#,
            json!({}),
        )
        .await?;
    data["flashApps"]
        .as_array()
        .and_then(|apps| {
            apps.iter()
                .find(|app| app["name"].as_str() == Some(name))
                .cloned()
        })
        .ok_or_else(|| anyhow::anyhow!("app '{name}' not found"))
}
