use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use spotify_broadcast::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[clap(about = "Run the HTTP server")]
    Serve,

    #[clap(about = "Authorize a Spotify account and store its tokens")]
    Login(LoginOptions),

    #[clap(about = "Show which credentials are stored")]
    Status,

    #[clap(about = "Obtain a valid access token once, refreshing if needed")]
    Check,

    #[clap(about = "Remove stored credentials")]
    Logout,

    #[clap(about = "Print a new TOKEN_ENCRYPTION_KEY")]
    Keygen,

    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct LoginOptions {
    /// Authorization code from the redirect URL, skips the interactive flow
    #[clap(long)]
    code: Option<String>,

    /// Only print the consent URL
    #[clap(long)]
    no_browser: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotify_broadcast=info".into()),
        )
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Command::Keygen => return cli::keygen(),
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
            return;
        }
        _ => {}
    }

    init_tracing();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    };

    match cli.command {
        Command::Serve => cli::serve(&config).await,
        Command::Login(opt) => cli::login(&config, opt.code, opt.no_browser).await,
        Command::Status => cli::status(&config).await,
        Command::Check => cli::check(&config).await,
        Command::Logout => cli::logout(&config).await,
        Command::Keygen | Command::Completions(_) => {}
    }
}
