use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

use handspell::config::{Config, LogFormatConfig};
use handspell::{logging, replay, server};

#[derive(Parser)]
#[command(name = "handspell", version, about = "Compose words from hand-sign frames")]
struct Cli {
    /// Config file (defaults to ./handspell.toml when present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format (overrides the config file)
    #[arg(long = "log-format", global = true)]
    log_format: Option<CliLogFormat>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Feed a JSON-lines recording of classifier output through a composer
    Replay {
        /// Recording with one {"t", "letter", "confidence"} object per line
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Text,
    Json,
}

impl From<CliLogFormat> for LogFormatConfig {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => LogFormatConfig::Text,
            CliLogFormat::Json => LogFormatConfig::Json,
        }
    }
}

#[hotpath::main]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    let level = logging::level_for_verbosity(cli.verbose, &config.logging.level);
    let format = cli.log_format.map(Into::into).unwrap_or(config.logging.format);
    logging::init_logging(&level, format)?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            info!(version = env!("CARGO_PKG_VERSION"), "handspell starting");

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(server::serve(config))
        }
        Command::Replay { file } => run_replay(&config, &file),
    }
}

fn run_replay(config: &Config, path: &Path) -> anyhow::Result<()> {
    let composer = config.composer.to_composer_config()?;
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("opening {}", path.display()))?,
    );
    let samples = replay::parse_recording(reader)?;
    info!(samples = samples.len(), path = %path.display(), "replaying");

    let report = replay::replay(composer, &samples);
    println!("{}", report);
    Ok(())
}
