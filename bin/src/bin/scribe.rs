use clap::Parser;
use scribe_bin::{cli::Cli, commands};
use scribe_config::Config;
use scribe_log::LogConfig;

fn main() {
    let cli = Cli::parse();

    let _log_guard = match scribe_log::init(LogConfig {
        log_file_path: cli.log_file.clone(),
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {e}");
            None
        },
    };

    let discovered = std::env::current_dir()
        .map(|dir| scribe_config::discover(&dir))
        .unwrap_or_default();
    let config = Config::load_with_overrides(cli.config.as_deref(), &discovered)
        .unwrap_or_else(|e| {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        });

    match commands::run(&cli.command, &config) {
        Ok(output) if output.ends_with('\n') => print!("{output}"),
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        },
    }
}
