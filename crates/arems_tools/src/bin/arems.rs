#![forbid(unsafe_code)]

use std::env;
use std::io::{self, IsTerminal, Read};

use arems_engines::notify::ENV_API_KEY;
use arems_tools::cli::{
    execute_notify_test, execute_phase, execute_progress, execute_stats, sample_notice, Cli,
    Command,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let output = match cli.command {
        Command::Phase { hours } => execute_phase(hours),
        Command::Progress {
            hours,
            total,
            adjustment,
        } => execute_progress(hours, total, adjustment),
        Command::Stats { file, json } => execute_stats(&file, json),
        Command::NotifyTest { to, orientee } => {
            let api_key = read_api_key()?;
            let today = chrono::Local::now().date_naive();
            sample_notice(&to, &orientee, today)
                .and_then(|notice| execute_notify_test(&notice, api_key, |k| env::var(k).ok()))
        }
    }
    .map_err(|e| e.to_string())?;
    println!("{output}");
    Ok(())
}

fn read_api_key() -> Result<String, String> {
    if let Some(key) = env::var(ENV_API_KEY)
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        return Ok(key);
    }
    let value = if io::stdin().is_terminal() {
        rpassword::prompt_password(format!("Enter value for {ENV_API_KEY}:"))
            .map_err(|e| e.to_string())?
    } else {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| e.to_string())?;
        input
    };
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        return Err("api key must not be empty".to_string());
    }
    Ok(trimmed)
}
