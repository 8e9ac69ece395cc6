use std::{process::ExitCode, time::Instant};

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use varco_tts::{
    batch, lister, projector, BatchConfig, CollisionMode, HttpApi, ListerConfig,
    ProjectorConfig,
};

#[derive(Parser, Debug)]
#[command(name = "varco-tts", version, about = "VARCO TTS voice list and batch generation")]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the voice list and save it as a spreadsheet and JSON
    ListVoices,
    /// Copy selected columns of a speaker JSON file into a spreadsheet
    Project,
    /// Generate WAV files from the scripts sheet
    Generate {
        /// 1 = regenerate and number duplicates, 2 = skip existing files
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=2))]
        mode: Option<u8>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = color_eyre::install() {
        eprintln!("{e}");
    }
    match dotenvy::dotenv() {
        Ok(path) => debug!("loaded {}", path.display()),
        Err(e) => debug!("no .env loaded: {e}"),
    }

    let started = Instant::now();
    let result = match cli.command {
        Command::ListVoices => ListerConfig::from_env()
            .map_err(color_eyre::Report::new)
            .and_then(|config| {
                let api = HttpApi::new(&config.api_key).with_voices_url(&config.voice_url);
                lister::run(&config, &api).map(|_| ())
            }),
        Command::Project => ProjectorConfig::from_env()
            .map_err(color_eyre::Report::new)
            .and_then(|config| projector::run(&config).map(|_| ())),
        Command::Generate { mode } => {
            let mode = mode.and_then(CollisionMode::from_selector);
            BatchConfig::from_env(mode)
                .map_err(color_eyre::Report::new)
                .and_then(|config| {
                    let api = HttpApi::new(&config.api_key).with_synthesis_url(&config.gen_url);
                    batch::run(&config, &api).map(|_| ())
                })
        }
    };
    info!("finished in {:.4}s", started.elapsed().as_secs_f64());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
