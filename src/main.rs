use std::{
    error::Error,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    process,
    sync::Arc,
    time::Duration,
};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, LevelFilter};

use resonite_spotify::{
    config::Config,
    dispatch::Dispatcher,
    error::{ErrorKind, Result},
    secrets::Credentials,
    server::Server,
    session::{Session, SharedSession},
    signal,
    spotify::{self, token, Api},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Holds the Spotify application credentials and, once authorized, the
    /// refresh token. Keep this file private: it grants control over your
    /// Spotify account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"), env = "RESONITE_SPOTIFY_SECRETS")]
    secrets_file: String,

    /// Address to listen on
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST), env = "RESONITE_SPOTIFY_BIND")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = Config::DEFAULT_PORT, env = "RESONITE_SPOTIFY_PORT")]
    port: u16,

    /// Playback device
    ///
    /// Id or name of the device to control when several are available.
    #[arg(short, long, env = "RESONITE_SPOTIFY_DEVICE")]
    device: Option<String>,

    /// Market for search results and top tracks
    #[arg(short, long, default_value_t = String::from(Config::DEFAULT_MARKET), env = "RESONITE_SPOTIFY_MARKET")]
    market: String,

    /// Log every command and response
    #[arg(long, default_value_t = false, env = "RESONITE_SPOTIFY_DEBUG")]
    debug: bool,

    /// Authorize the Spotify account
    ///
    /// Prints the URL to grant access, reads the URL the browser was
    /// redirected to and prints the refresh token to add to the secrets file.
    #[arg(long, default_value_t = false)]
    authorize: bool,

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
        logger.filter_module("resonite_spotify", level);
    }

    logger.init();
}

/// Loads the credentials, hinting at the documentation when the secrets file
/// does not exist.
fn load_credentials(secrets_file: &str) -> Result<Credentials> {
    let credentials = Credentials::from_file(secrets_file);

    if let Err(ref e) = credentials {
        if e.kind == ErrorKind::NotFound {
            info!("copy secrets.toml.example to {secrets_file} and fill in your Spotify application credentials");
        }
    }

    credentials
}

/// Runs the one-time authorization code flow.
async fn authorize(config: &Config, client: &spotify::Client, secrets_file: &str) -> Result<()> {
    let url = token::authorize_url(&config.credentials, &config.accounts_url)?;
    println!("Open this URL in a browser and grant access:\n\n{url}\n");
    println!("Then paste the URL your browser was redirected to:");

    let redirected = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;

    let code = token::code_from_redirect(&redirected)?;
    let refresh_token = client
        .tokens()
        .exchange_code(client.http_client(), &code)
        .await?;

    println!("\nAdd this line to {secrets_file}:\n\nrefresh_token = \"{refresh_token}\"");
    Ok(())
}

/// Serves websocket clients until the listener fails.
async fn serve(config: &Config, api: Arc<dyn Api>, session: SharedSession) -> Result<()> {
    let dispatcher = Dispatcher::new(api, session);
    let server = Server::bind(config.listen, dispatcher, config.debug).await?;
    server.run().await
}

/// Main application loop.
///
/// # Errors
///
/// This function returns an error when the configuration is invalid or the
/// account is not authorized.
async fn run(args: Args) -> std::result::Result<(), Box<dyn Error>> {
    let credentials = load_credentials(&args.secrets_file)?;

    let mut config = Config::with_credentials(credentials)?;
    config.listen = SocketAddr::new(args.bind, args.port);
    config.market = args.market;
    config.preferred_device = args.device;
    config.debug = args.debug;
    debug!("{config:#?}");

    let client = spotify::Client::new(&config)?;

    if args.authorize {
        authorize(&config, &client, &args.secrets_file).await?;
        return Ok(());
    }

    if !config.credentials.is_authorized() {
        return Err(format!(
            "no refresh token in {}; run with --authorize first",
            args.secrets_file
        )
        .into());
    }

    let api: Arc<dyn Api> = Arc::new(client);
    let session = Session::new(config.preferred_device.clone(), config.debug).shared();
    let mut signals = signal::Handler::new()?;

    // Restart after sleeping some duration when the listener fails, for
    // instance because the port is still taken. The first start happens
    // immediately.
    let restart_timer = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(restart_timer);

    loop {
        tokio::select! {
            // Prioritize shutdown signals.
            biased;

            signal = signals.recv() => {
                info!("received {signal}, shutting down gracefully");
                break Ok(());
            }

            result = serve(&config, Arc::clone(&api), Arc::clone(&session)), if restart_timer.is_elapsed() => {
                if let Err(e) = result {
                    error!("{e}");
                }

                // Sleep with jitter so that a persistent failure does not
                // spin.
                let duration = Duration::from_millis(fastrand::u64(5_000..6_000));
                info!("restarting in {:.1}s", duration.as_secs_f32());
                restart_timer.as_mut().reset(tokio::time::Instant::now() + duration);
            }

            () = &mut restart_timer, if !restart_timer.is_elapsed() => {}
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
