//! Command tree.

use clap::{Parser, Subcommand};

/// Flash — deploy and dispatch serverless functions on RunPod.
#[derive(Debug, Parser)]
#[command(name = "flash", version, about, disable_version_flag = true)]
pub struct Cli {
    /// Print version information and exit.
    #[arg(short = 'v', short_alias = 'V', long = "version", global = true)]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage flash apps.
    #[command(subcommand)]
    App(AppCommand),
    /// Manage deployment environments.
    #[command(subcommand)]
    Env(EnvCommand),
    /// Authenticate with RunPod and store the API key.
    Login {
        /// Do not suggest opening the approval URL in a browser.
        #[arg(long)]
        no_open: bool,
        /// Seconds to wait for approval.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
    /// Check for (and explain how to install) a newer release.
    Update,
    /// Scan the project and write the manifest and handlers.
    Build {
        /// Project root to scan.
        #[arg(long, default_value = ".")]
        path: String,
        /// Project name recorded in the manifest.
        #[arg(long)]
        name: Option<String>,
    },
    /// Deploy every resource the manifest names.
    Deploy {
        /// Manifest path (defaults to the standard search order).
        #[arg(long)]
        manifest: Option<String>,
        /// Environment id to attach resources to.
        #[arg(long)]
        environment: Option<String>,
    },
    /// Invoke one deployed function and print its result.
    Run {
        /// Function name from the manifest.
        function: String,
        /// JSON object of keyword arguments.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Manifest path (defaults to the standard search order).
        #[arg(long)]
        manifest: Option<String>,
    },
    /// Serve a local gateway that proxies LB routes to deployed endpoints.
    Preview {
        /// Port to listen on.
        #[arg(long, default_value_t = 8000)]
        port: u16,
        /// Manifest path (defaults to the standard search order).
        #[arg(long)]
        manifest: Option<String>,
    },
    /// Scaffold a new flash project in the given directory.
    Init {
        /// Target directory.
        #[arg(default_value = ".")]
        path: String,
    },
    /// Remove a deployed resource.
    Undeploy {
        /// Registry key (`Kind:name`) or plain resource name.
        resource: String,
        /// Forget the resource even if remote teardown fails.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum AppCommand {
    /// Create a new flash app.
    Create { name: String },
    /// Show one app in detail.
    Get { name: String },
    /// List apps under your account.
    List,
    /// Delete an app and its associated resources.
    Delete { name: String },
}

#[derive(Debug, Subcommand)]
pub enum EnvCommand {
    /// Create a deployment environment inside an app.
    Create {
        app: String,
        name: String,
    },
    /// Show one environment in detail.
    Get { id: String },
    /// List environments for an app.
    List { app: String },
    /// Delete an environment.
    Delete { id: String },
}
