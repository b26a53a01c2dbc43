use clap::{Parser, Subcommand};
use termchat::chat::ChatSession;
use termchat::config::Settings;

#[derive(Parser)]
#[command(name = "termchat")]
#[command(about = "Terminal chat client for LLM APIs with retrieval-augmented context")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Start an interactive chat session (default)
    Chat,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // For non-init commands, warn when no config exists yet.
    if !matches!(cli.command, Some(Commands::Init { .. })) {
        if let Err(warning) = Settings::check_init() {
            eprintln!("Warning: {warning}");
            eprintln!("Using default configuration for now.");
        }
    }

    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });

    termchat::logging::init_with_config(&settings.logging);

    match cli.command {
        Some(Commands::Init { force }) => match Settings::init_config_file(force) {
            Ok(path) => {
                println!("Created default configuration at: {}", path.display());
                println!("Set your API key via TERMCHAT_API__KEY or api.key in the file.");
            }
            Err(e) => {
                eprintln!("Failed to create configuration: {e}");
                std::process::exit(1);
            }
        },

        Some(Commands::Config) => match toml::to_string_pretty(&settings) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("Failed to render configuration: {e}");
                std::process::exit(1);
            }
        },

        Some(Commands::Chat) | None => {
            let mut session = match ChatSession::new(settings) {
                Ok(session) => session,
                Err(e) => {
                    eprintln!("Failed to start chat session: {e}");
                    std::process::exit(1);
                }
            };

            if let Err(e) = session.run().await {
                eprintln!("Chat session ended with error: {e}");
                std::process::exit(1);
            }
        }
    }
}
