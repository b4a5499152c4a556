//! Thermolog - a terminal temperature converter with per-user history.
//!
//! Accounts live in a local credential store. Each user sees only their own
//! conversion history, which can be cleared or exported to CSV.

mod app;
mod ui;

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use thermolog_core::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file name inside the log directory
const LOG_FILE: &str = "thermolog.log";

const USAGE: &str = "\
Usage: thermolog [OPTION]

Without an option, starts the interactive converter.

Options:
  --register          Create an account from the terminal
  --change-password   Change an account password from the terminal
  -h, --help          Show this help

Environment:
  THERMOLOG_DATA_DIR  Directory holding accounts and history
  THERMOLOG_USERNAME  Username to prefill at login
  RUST_LOG            Log filter (default: warn)";

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to a file so log lines never draw over the TUI.
fn init_tracing(log_dir: Option<&Path>) {
    let file_layer = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let appender = tracing_appender::rolling::never(dir, LOG_FILE);
        Some(fmt::layer().with_ansi(false).with_writer(appender))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(env_filter())
        .init();
}

/// Command-line subcommands log to stderr.
fn init_cli_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().context("Failed to load configuration")?;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None => {}
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some("--register") => {
            init_cli_tracing();
            return register_interactive(&config);
        }
        Some("--change-password") => {
            init_cli_tracing();
            return change_password_interactive(&config);
        }
        Some(other) => {
            eprintln!("Unknown option: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    // Initialize logging
    init_tracing(config.log_dir().ok().as_deref());
    info!("Thermolog starting");

    // Create app before touching the terminal so errors print normally
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Thermolog shutting down");
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// Command-line account management
// ============================================================================

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt for a username, offering `default` when one is known.
fn prompt_username(default: Option<&str>) -> Result<String> {
    let username = match default {
        Some(last) => {
            let input = prompt(&format!("Username [{}]: ", last))?;
            if input.is_empty() {
                last.to_string()
            } else {
                input
            }
        }
        None => prompt("Username: ")?,
    };
    if username.is_empty() {
        bail!("Username must not be empty");
    }
    Ok(username)
}

/// Read a new password twice without echo.
fn prompt_new_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(format!("{}: ", label))?;
    let confirm = rpassword::prompt_password("Confirm: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

fn register_interactive(config: &Config) -> Result<()> {
    println!("\n=== Thermolog Registration ===\n");

    let (mut sessions, _) = thermolog_core::open(config)?;

    let username = prompt_username(None)?;
    let password = prompt_new_password("Password")?;
    let email = prompt("Email (optional): ")?;
    let email = (!email.is_empty()).then_some(email.as_str());

    sessions
        .register(&username, &password, email)
        .with_context(|| format!("Could not register {}", username))?;

    println!("\nRegistered {}. Start thermolog to log in.", username);
    Ok(())
}

fn change_password_interactive(config: &Config) -> Result<()> {
    println!("\n=== Thermolog Change Password ===\n");

    let (mut sessions, _) = thermolog_core::open(config)?;

    let default = std::env::var(thermolog_core::config::USERNAME_ENV)
        .ok()
        .or_else(|| config.last_username.clone());
    let username = prompt_username(default.as_deref())?;
    let old_password = rpassword::prompt_password("Current password: ")?;
    let new_password = prompt_new_password("New password")?;

    sessions
        .change_password(&username, &old_password, &new_password)
        .with_context(|| format!("Could not change password for {}", username))?;

    println!("\nPassword changed for {}.", username);
    Ok(())
}
