use clap::{Parser, Subcommand};

mod commands;
mod fleet;

#[derive(Parser)]
#[command(
    name = "tierctl",
    about = "tierstore: tiered block placement for storage metadata services",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tierstore.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Replay allocations against a fleet description.
    ///
    /// Every node in the fleet file is registered with its free blocks, then
    /// the requested number of allocations is served and the resulting
    /// placement is reported per node and per tier.
    Simulate {
        /// Fleet description (TOML, one [[node]] table per storage node)
        #[arg(long)]
        fleet: String,
        /// Registry configuration; defaults apply when omitted
        #[arg(short, long)]
        config: Option<String>,
        /// Number of allocation requests to issue
        #[arg(short = 'n', long, default_value_t = 16)]
        requests: usize,
        /// Requested storage class (0 leaves the choice to the registry)
        #[arg(long, default_value_t = 0)]
        tier: u32,
        /// Requested affinity group (0 means no preference)
        #[arg(long, default_value_t = 0)]
        affinity: u32,
        /// Request size hint handed to the scheduler
        #[arg(long, default_value_t = 1.0)]
        size_hint: f64,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a tierstore.toml with every default, or write it to --path
    Init {
        #[arg(short, long)]
        path: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tierctl=info".parse()?)
                .add_directive("tierstore=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { path } => commands::config::init(path.as_deref()),
        },
        Commands::Simulate {
            fleet,
            config,
            requests,
            tier,
            affinity,
            size_hint,
            format,
        } => {
            let options = commands::simulate::SimulateOptions {
                requests,
                tier,
                affinity,
                size_hint,
            };
            commands::simulate::simulate(&fleet, config.as_deref(), &options, &format)
        }
    }
}
