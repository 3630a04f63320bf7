use clap::Parser;
use concierge::cli::{
    analyze, chat, embed, handle_completions, handle_config_init, Cli, Commands, ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => chat::run_chat(args).await,
        Commands::Embed(args) => embed::run_embed(args).await,
        Commands::Analyze(args) => analyze::run_analyze(args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
