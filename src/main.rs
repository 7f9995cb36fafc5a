use std::io::Write as _;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use stepline::cache::CacheLocation;
use stepline::cli::{CacheAction, Cli, Commands};
use stepline::commands;

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = dispatch(cli) {
        eprintln!("{} {err}", "Error:".red());
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Steps => commands::list_steps(),
        Commands::Inspect { config } => commands::inspect_config(&config),
        Commands::Run {
            config,
            input_json,
            context,
            use_llm,
            dry_run,
            cache_dir,
            shared_cache,
        } => commands::run_pipeline(commands::RunConfig {
            config,
            input_json,
            context,
            use_llm,
            dry_run,
            cache_dir,
            shared_cache,
        }),
        Commands::New { name, dir, force } => {
            commands::scaffold_app(commands::NewAppConfig { name, dir, force })
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats {
                cache_dir,
                shared_cache,
            } => commands::cache_stats(&CacheLocation::from_cli(cache_dir, shared_cache)),
            CacheAction::Clear {
                older_than_secs,
                cache_dir,
                shared_cache,
            } => commands::cache_clear(
                &CacheLocation::from_cli(cache_dir, shared_cache),
                older_than_secs.map(Duration::from_secs),
            ),
        },
    }
}

/// Info level by default; `RUST_LOG` overrides. Lines render as
/// `LEVEL: message`.
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}
