use std::{error::Error, path::Path, process};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};

use wnp_relay::{
    capability::{PlaybackState, Shared},
    config::Config,
    coordinator::Coordinator,
    error::ErrorKind,
    player::Simulated,
    release, signal,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, PartialEq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// Lists the listeners to connect to. Built-in defaults are used when
    /// the file does not exist.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("wnp-relay.toml"), env = "WNP_RELAY_CONFIG")]
    config: String,

    /// Title of the simulated track
    #[arg(long, default_value_t = String::from("Now Playing"))]
    title: String,

    /// Artist of the simulated track
    #[arg(long, default_value_t = String::from("wnp-relay"))]
    artist: String,

    /// Album of the simulated track
    #[arg(long, default_value_t = String::new())]
    album: String,

    /// Duration of the simulated track in seconds
    #[arg(long, default_value_t = 180.0)]
    duration: f64,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Loads the configuration, falling back to defaults if there is no file.
fn load_config(path: &str) -> wnp_relay::error::Result<Config> {
    match Config::from_file(path) {
        Err(e) if e.kind == ErrorKind::NotFound => {
            info!(
                "{} not found, using built-in listeners",
                Path::new(path).display()
            );
            Ok(Config::default())
        }
        result => result,
    }
}

/// Main application loop.
///
/// Runs until interrupted or terminated. SIGHUP reloads the configuration;
/// an invalid file on reload keeps the running configuration.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    let feed = release::from_config(&config)?;

    let mut player = Simulated::new(config.app_name.clone());
    player.load(&args.title, &args.artist, &args.album, "", args.duration);
    player.set_state(PlaybackState::Playing);
    let source = Shared::new(Some(player));

    let mut signals = signal::Handler::new()?;
    let (mut coordinator, mut events) = Coordinator::new(config, source, feed);
    coordinator.start();

    loop {
        tokio::select! {
            // Prioritize signals.
            biased;

            signal = signals.recv() => {
                if signal.is_shutdown() {
                    info!("received {signal}, shutting down gracefully");
                    coordinator.teardown().await;
                    break Ok(());
                }

                info!("received {signal}, reloading {}", args.config);
                match load_config(&args.config) {
                    Ok(config) => {
                        coordinator.reload(config).await;
                    }
                    Err(e) => warn!("keeping current configuration: {e}"),
                }
            }

            Some(event) = events.recv() => info!("{event}"),
        }
    }
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and starts the main application loop.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
