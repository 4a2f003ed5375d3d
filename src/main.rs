use clap::{value_parser, Arg, ArgMatches, Command};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs,
    io::{self, IsTerminal, Write},
    path::PathBuf,
    process::ExitCode,
};
use taskers::{
    app::{edit_secret, App, SecretEntry},
    auth::{IdentityProvider, LocalIdentityProvider},
    board::TaskBoard,
    config::{Config, LOG_FILE},
    store::JsonFileStore,
    ui, Error, Result,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("taskers")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Personal task board in the terminal")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding tasks, accounts and logs"),
        )
        .subcommand(Command::new("board").about("Open the task board (default)"))
        .subcommand(
            Command::new("signup")
                .about("Create an account and sign in")
                .arg(Arg::new("email").required(true).help("Account email")),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in")
                .arg(Arg::new("email").required(true).help("Account email")),
        )
        .subcommand(Command::new("logout").about("Sign out"))
        .subcommand(
            Command::new("reset-password")
                .about("Request a password reset")
                .arg(Arg::new("email").required(true).help("Account email")),
        )
}

fn init_tracing(config: &Config) -> io::Result<WorkerGuard> {
    fs::create_dir_all(&config.data_dir)?;
    // stdout belongs to the TUI, so logs go to a file
    let appender = tracing_appender::rolling::never(&config.data_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();
    Ok(guard)
}

/// Reads a password with echo off. Piped input is read as a plain line.
fn prompt_password(message: &str) -> io::Result<String> {
    print!("{message}: ");
    io::stdout().flush()?;
    if !io::stdin().is_terminal() {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        return Ok(input.trim_end_matches(['\r', '\n']).to_string());
    }

    enable_raw_mode()?;
    let entered = read_secret();
    disable_raw_mode()?;
    println!();
    entered
}

fn read_secret() -> io::Result<String> {
    let mut secret = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            match edit_secret(&mut secret, key) {
                SecretEntry::Typing => {}
                SecretEntry::Done => return Ok(secret),
                SecretEntry::Cancelled => {
                    return Err(io::Error::new(
                        io::ErrorKind::Interrupted,
                        "password entry cancelled",
                    ))
                }
            }
        }
    }
}

fn email_arg(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("email")
        .map(String::as_str)
        .unwrap_or_default()
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    let config = match Config::load(matches.get_one::<PathBuf>("data-dir").map(PathBuf::as_path))
    {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    // held until main returns so buffered log lines are flushed
    let _guard = match init_tracing(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: cannot open log file: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(data_dir = %config.data_dir.display(), "taskers starting");

    match run(&matches, &config) {
        Ok(code) => code,
        Err(Error::Auth(err)) => {
            tracing::warn!(error = %err, action = ?err.action(), "identity operation failed");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(error = %err, "taskers failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches, config: &Config) -> Result<ExitCode> {
    let provider = LocalIdentityProvider::new(&config.data_dir, config.max_login_attempts);

    let outcome = match matches.subcommand() {
        Some(("signup", sub)) => {
            let password = prompt_password("Password (min 6 characters)")?;
            provider
                .sign_up(email_arg(sub), &password)
                .map(|s| format!("Account created successfully! Signed in as {}", s.email))
        }
        Some(("login", sub)) => {
            let password = prompt_password("Password")?;
            provider
                .log_in(email_arg(sub), &password)
                .map(|s| format!("Logged in successfully as {}", s.email))
        }
        Some(("logout", _)) => provider.log_out().map(|()| "Logged out".to_string()),
        Some(("reset-password", sub)) => provider.reset_password(email_arg(sub)).map(|()| {
            "Password reset email sent! Check your inbox and follow the instructions to reset your password."
                .to_string()
        }),
        _ => return run_board(config, &provider),
    };

    println!("{}", outcome?);
    Ok(ExitCode::SUCCESS)
}

fn run_board(config: &Config, provider: &impl IdentityProvider) -> Result<ExitCode> {
    let Some(session) = provider.current_session() else {
        eprintln!("Not signed in. Run `taskers login <email>` or `taskers signup <email>` first.");
        return Ok(ExitCode::FAILURE);
    };

    let store = JsonFileStore::in_dir(&config.data_dir);
    let board = TaskBoard::new(store, Some(session.owner_id.clone()));
    let mut app = App::new(board, Some(session.email));
    app.reload();

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui::run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result?;
    tracing::info!("board closed");
    Ok(ExitCode::SUCCESS)
}
