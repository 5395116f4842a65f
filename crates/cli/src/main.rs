//! modelprobe binary entrypoint.
//!
//! Loads configuration, applies CLI overrides, and starts the HTTP gateway.

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    modelprobe_config::{discover_and_load, ModelprobeConfig},
    modelprobe_gateway::AppState,
    rand::RngCore,
    secrecy::Secret,
    sqlx::SqlitePool,
    std::net::SocketAddr,
    tracing::info,
    tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter},
};

#[derive(Parser, Debug)]
#[command(name = "modelprobe", version, about = "AI provider credential vault and model probe service")]
struct Cli {
    /// Log level filter when RUST_LOG is unset (e.g. "info", "modelprobe_gateway=debug").
    #[arg(long, global = true, default_value = "info", env = "MODELPROBE_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway (default when no subcommand is given).
    Serve(ServeArgs),
    /// Generate a fresh 32-byte hex encryption key for the secret vault.
    Keygen,
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Bind address override.
    #[arg(long, env = "MODELPROBE_BIND")]
    bind: Option<String>,

    /// Port override.
    #[arg(long, env = "MODELPROBE_PORT")]
    port: Option<u16>,

    /// Database URL override.
    #[arg(long, env = "MODELPROBE_DATABASE_URL")]
    database_url: Option<String>,

    /// Vault encryption key override (64 hex chars).
    #[arg(long, env = "MODELPROBE_ENCRYPTION_KEY", hide_env_values = true)]
    encryption_key: Option<String>,
}

fn init_telemetry(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn apply_overrides(config: &mut ModelprobeConfig, args: &ServeArgs) {
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    if let Some(key) = &args.encryption_key {
        config.vault.encryption_key = Some(Secret::new(key.clone()));
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = discover_and_load();
    apply_overrides(&mut config, &args);

    let pool = SqlitePool::connect(&config.database.url)
        .await
        .with_context(|| format!("connecting to database {}", config.database.url))?;

    let state = AppState::from_config(pool, &config).await?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.bind, config.server.port
            )
        })?;

    modelprobe_gateway::serve(addr, state).await
}

fn keygen() {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
    println!("{hex}");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_telemetry(&cli.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "modelprobe starting");

    match cli.command {
        Some(Command::Keygen) => {
            keygen();
            Ok(())
        }
        Some(Command::Serve(args)) => serve(args).await,
        None => serve(ServeArgs::default()).await,
    }
}
