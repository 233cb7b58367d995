use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use artistbot_core::Error;
use artistbot_core::config::BotConfig;
use artistbot_core::tasks::spawn_health_check_task;

mod context;
use context::ServerContext;

/// How long sessions get to leave their calls on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[derive(Parser, Debug, Clone)]
#[command(name = "artistbot")]
#[command(author, version, about = "ArtistBot - queue songs from chat into a voice call")]
struct Args {
    /// Extra dotenv file to load before reading the environment.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Overrides DOWNLOAD_DIR.
    #[arg(long, env = "DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("artistbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    if let Some(path) = &args.env_file {
        dotenv::from_path(path)
            .map_err(|e| Error::Config(format!("could not load {}: {e}", path.display())))?;
    }

    let mut config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Startup aborted: {e}");
            return Err(e.into());
        }
    };
    if let Some(dir) = args.download_dir {
        config.download_dir = dir;
    }

    info!("ArtistBot starting. prefix='{}'", config.command_prefix);
    if let Err(e) = run_server(config).await {
        error!("Server error: {e}");
        return Err(e.into());
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run_server(config: BotConfig) -> Result<(), Error> {
    let ctx = ServerContext::new(config).await?;

    let announcer = ctx
        .announcer()
        .spawn(ctx.registry.subscribe(), ctx.tasks_shutdown.clone());

    let health = ctx.config.health_check_channel.map(|chat| {
        spawn_health_check_task(
            ctx.messenger(),
            chat,
            ctx.config.health_check_interval,
            ctx.tasks_shutdown.clone(),
        )
    });
    if health.is_none() {
        info!("No HEALTH_CHECK_CHANNEL or LOG_CHANNEL set; health check disabled");
    }

    info!("Listening for commands. Press Ctrl-C to stop.");
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Ctrl-C received; shutting down");
                break;
            }
            event = ctx.platform.next_message_event() => {
                let Some(event) = event else {
                    warn!("Discord event stream closed; shutting down");
                    break;
                };
                ctx.command_service
                    .spawn_dispatch(event.command_context(), event.text.clone());
            }
        }
    }

    ctx.registry.shutdown(SHUTDOWN_GRACE).await;
    ctx.tasks_shutdown.cancel();
    if let Err(e) = announcer.await {
        warn!("Announcer task ended abnormally: {e}");
    }
    if let Some(health) = health {
        if let Err(e) = health.await {
            warn!("Health check task ended abnormally: {e}");
        }
    }
    ctx.platform.disconnect().await?;
    Ok(())
}
