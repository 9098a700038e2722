//! Haulbook - command-line front end for trucking trip records.
//!
//! Log in, check the dashboard, and manage transport records from the
//! terminal. Sessions persist between runs and expired tokens are refreshed
//! automatically.

mod app;
mod prompt;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use haulbook_core::Config;

use app::{App, Command};

const USAGE: &str = "\
Usage: haulbook <command>

Commands:
  login [username]               Log in (prompts for password)
  register <username> <email>    Create an account and log in
  logout                         Forget the stored session
  status                         Show who is logged in
  dashboard                      Show trip totals and recent records
  records list [--sort COL] [--asc|--desc] [--search TEXT]
                                 List records (COL: date, po, from, to, miles, pay)
  records show <id>              Show one record
  records add                    Create a record interactively
  records edit <id>              Edit a record interactively
  records delete <id>...         Delete one or more records
";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // HAULBOOK_LOG_DIR adds a daily log file next to stderr output
    match std::env::var("HAULBOOK_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "haulbook.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if matches!(command, Command::Help) {
        print!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    info!(api = %config.base_url(), "haulbook starting");

    let mut app = App::new(config)?;
    let result = app.run(command).await;
    app.shutdown();

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
