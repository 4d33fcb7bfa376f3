use clap::Parser;
use tracing_subscriber::EnvFilter;

use flash_cli::cli::{Cli, Command};
use flash_cli::{commands, update_checker};
use flash_domain::env;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("flash {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    init_tracing();
    update_checker::start_background_check();

    let outcome = run(cli).await;
    // The update notice prints last so it never interleaves with command
    // output.
    update_checker::print_update_notice();

    if let Err(e) = outcome {
        eprintln!("\x1b[31merror:\x1b[0m {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None => {
            // Bare `flash` prints help and succeeds, mirroring `--help`.
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(())
        }
        Some(Command::App(command)) => commands::apps::run(command).await,
        Some(Command::Env(command)) => commands::envs::run(command).await,
        Some(Command::Login { no_open, timeout }) => {
            commands::login::run(no_open, timeout).await
        }
        Some(Command::Update) => commands::update::run().await,
        Some(Command::Build { path, name }) => commands::build::run(&path, name.as_deref()),
        Some(Command::Deploy {
            manifest,
            environment,
        }) => commands::deploy::run(manifest.as_deref(), environment.as_deref()).await,
        Some(Command::Run {
            function,
            args,
            manifest,
        }) => commands::run::run(&function, &args, manifest.as_deref()).await,
        Some(Command::Preview { port, manifest }) => {
            commands::preview::run(port, manifest.as_deref()).await
        }
        Some(Command::Init { path }) => commands::init::run(&path),
        Some(Command::Undeploy { resource, force }) => {
            commands::deploy::undeploy(&resource, force).await
        }
    }
}

fn init_tracing() {
    let default = env::var_nonblank(env::LOG_LEVEL).unwrap_or_else(|| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}
