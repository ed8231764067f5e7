mod agent;
mod autoclassify;
mod classifier;
mod config;
mod core;
mod extractor;
mod priority;
mod proactive;
mod providers;
mod router;
mod sources;
mod state;
mod tools;
mod traits;
mod worker;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("steward {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("steward {}", env!("CARGO_PKG_VERSION"));
                println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
                println!("Usage: steward [OPTIONS]\n");
                println!("Reads config.toml from the working directory and starts an");
                println!("interactive chat session. Type /quit to exit.\n");
                println!("Options:");
                println!("  -h, --help       Print help");
                println!("  -V, --version    Print version");
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: '{other}'. Try --help.");
                std::process::exit(1);
            }
        }
    }

    let config_path = PathBuf::from("config.toml");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let config = config::AppConfig::load(&config_path).await?;
            core::run(config).await
        })
}
