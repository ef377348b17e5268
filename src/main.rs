use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voicecmd_gateway::api::ApiServerBuilder;
use voicecmd_gateway::eval::{self, SweepDriver};
use voicecmd_gateway::{Config, EngineFactory, SessionManager};

/// Voicecmd - grammar-constrained voice command server
#[derive(Parser)]
#[command(name = "voicecmd", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/voicecmd/config.toml)
    #[arg(short, long, env = "VOICECMD_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve voice commands over WebSocket (default)
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Measure command accuracy under background noise
    Eval {
        /// Directory of clean utterances named after their command
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Background noise WAV file
        #[arg(long)]
        noise: Option<PathBuf>,
        /// Directory the CSV report is written to
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// SNR levels in dB, e.g. 20,15,10,5
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        snr: Option<Vec<f64>>,
        /// Decodes per utterance per level
        #[arg(short, long)]
        repetitions: Option<usize>,
    },
    /// Print the active command vocabulary
    Grammar,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voicecmd_gateway=info",
        1 => "info,voicecmd_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Eval {
            corpus,
            noise,
            output,
            snr,
            repetitions,
        } => {
            let mut config = config;
            if let Some(dir) = corpus {
                config.eval.corpus_dir = dir;
            }
            if let Some(path) = noise {
                config.eval.noise_path = path;
            }
            if let Some(dir) = output {
                config.eval.output_dir = dir;
            }
            if let Some(levels) = snr {
                config.eval.snr_steps = levels;
            }
            if let Some(n) = repetitions {
                config.eval.repetitions = n;
            }
            tokio::task::spawn_blocking(move || evaluate(&config)).await?
        }
        Command::Grammar => print_grammar(&config),
    }
}

/// Run the WebSocket server until interrupted
async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    config.validate()?;
    let grammar = Arc::new(config.command_grammar()?);
    let factory = engine_factory(&config)?;

    tracing::info!(
        grammar = %grammar.to_engine_json(),
        model = %config.model.path.display(),
        sample_rate = config.model.sample_rate,
        "starting voice command gateway"
    );

    let sessions = Arc::new(
        SessionManager::new(factory, grammar, config.model.sample_rate)
            .with_drain_timeout(config.server.drain_timeout),
    );

    let server = ApiServerBuilder::new(sessions)
        .host(config.server.host.clone())
        .port(config.server.port)
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Run the noise sweep and write the CSV report
fn evaluate(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    let grammar = Arc::new(config.command_grammar()?);
    let factory = engine_factory(config)?;

    let corpus = eval::load_corpus(&config.eval.corpus_dir, config.model.sample_rate)?;
    let noise = eval::load_noise(&config.eval.noise_path)?;

    tracing::info!(
        utterances = corpus.len(),
        levels = ?config.eval.snr_steps,
        repetitions = config.eval.repetitions,
        "starting noise sweep"
    );

    let driver = SweepDriver::new(factory, grammar, config.model.sample_rate);
    let results = driver.run(
        &corpus,
        &noise,
        &config.eval.snr_steps,
        config.eval.repetitions,
    )?;

    let path = eval::write_report(&config.eval.output_dir, &results, &chrono::Local::now())?;
    println!("Saved {}", path.display());

    Ok(())
}

/// Print the active vocabulary, one command per line
fn print_grammar(config: &Config) -> anyhow::Result<()> {
    let grammar = config.command_grammar()?;
    for command in grammar.commands() {
        println!("{command}");
    }
    println!("(sentinel: {})", grammar.sentinel());
    Ok(())
}

#[cfg(feature = "vosk")]
fn engine_factory(config: &Config) -> anyhow::Result<Arc<dyn EngineFactory>> {
    let factory = voicecmd_gateway::engine::VoskFactory::load(&config.model.path)?;
    Ok(Arc::new(factory))
}

#[cfg(not(feature = "vosk"))]
fn engine_factory(_config: &Config) -> anyhow::Result<Arc<dyn EngineFactory>> {
    Err(voicecmd_gateway::Error::Config(
        "built without a recognizer backend; rebuild with `--features vosk`".to_string(),
    )
    .into())
}
