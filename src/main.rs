use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use podspace::config::{DEFAULT_CONFIG_FILE, HubConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "podspace")]
#[command(version, about = "Pod workspaces with chat, docs, calendar and goal blocks")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the hub HTTP and WebSocket server
    Serve {
        /// Port to serve on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path (overrides config)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS for a separately served frontend)
        #[arg(long)]
        dev: bool,

        /// Open the hub in a browser once it is listening
        #[arg(long)]
        open: bool,
    },
    /// Create the database and its schema, then exit
    InitDb {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Load the bundled Explore profiles into the database
    Seed {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Sign in to a running hub and print unread counts for a pod
    Watch {
        /// Hub base URL, e.g. http://127.0.0.1:3210
        #[arg(long)]
        server: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Pod to watch
        #[arg(long)]
        pod: i64,

        /// Seconds between polls (overrides config)
        #[arg(long)]
        interval: Option<u64>,

        /// Also follow the messages of this chat block
        #[arg(long)]
        chat: Option<i64>,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "debug"
    } else {
        "info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(
            json.then(|| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
            }),
        )
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = HubConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve {
            port,
            db_path,
            dev,
            open,
        } => cmd::cmd_serve(config, port, db_path, dev, open).await?,
        Commands::InitDb { db_path } => cmd::cmd_init_db(&config, db_path)?,
        Commands::Seed { db_path } => cmd::cmd_seed(&config, db_path)?,
        Commands::Watch {
            server,
            email,
            password,
            pod,
            interval,
            chat,
        } => {
            let args = cmd::WatchArgs {
                server: &server,
                email: &email,
                password: &password,
                pod_id: pod,
                interval,
                chat,
            };
            cmd::cmd_watch(&config, args).await?
        }
    }

    Ok(())
}
