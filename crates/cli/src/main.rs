use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gs_cli::cli::{commands, config, load_config, Cli, Command, ConfigCommand};
use gs_client::{client_from_config, CommandType};
use gs_domain::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();

    let (config, config_path) = load_config()?;

    match cli.command {
        Command::Config(ConfigCommand::Validate) => {
            if !config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => config::show(&config),
        Command::Version => {
            println!("gardena {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => run_client_command(command, &config).await,
    }
}

/// Run a subcommand that talks to the API and print its result as JSON.
async fn run_client_command(command: Command, config: &Config) -> anyhow::Result<()> {
    let client = client_from_config(config).context("setting up client")?;

    let output = match command {
        Command::LoginStatus => commands::login_status(&client).await,
        Command::Locations => commands::locations(&client).await?,
        Command::Devices => commands::devices(&client).await?,
        Command::Location { id } => commands::location(&client, &id).await?,
        Command::Valve(args) => commands::control(&client, CommandType::ValveControl, &args).await?,
        Command::Mower(args) => commands::control(&client, CommandType::MowerControl, &args).await?,
        Command::PowerSocket(args) => {
            commands::control(&client, CommandType::PowerSocketControl, &args).await?
        }
        Command::ServiceStatus { id, service_type } => {
            commands::service_status(&client, &id, &service_type).await?
        }
        Command::Config(_) | Command::Version => {
            anyhow::bail!("not a client command")
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Tracing for the CLI: warn level by default, compact, on stderr so that
/// stdout stays JSON.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
