//! RecipeVault CLI - a terminal client for the RecipeVault recipe backend.
//!
//! Drives the session core from the command line: log in and out, inspect
//! the current session, check whether a view is reachable, and make
//! authenticated API calls.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recipevault_core::{
    ApiClient, Config, FileStorage, Navigation, NavigationGuard, SessionError, SessionState,
    SessionStore,
};

/// Environment variable holding the login password (skips the prompt)
const PASSWORD_ENV: &str = "RECIPEVAULT_PASSWORD";

/// Environment variable naming a directory for log files
const LOG_DIR_ENV: &str = "RECIPEVAULT_LOG_DIR";

const USAGE: &str = "\
Usage: recipevault <command>

Commands:
  login [username]              Log in and remember the session
  logout                        Forget the current session
  status                        Show who is logged in and for how long
  visit <path>                  Check whether a view can be opened
  get <path>                    Authenticated GET, prints the JSON response
  register <username> <name>    Create an account";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "recipevault.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Everything a command needs, built once at startup
struct Client {
    config: Config,
    api: ApiClient,
    store: SessionStore<FileStorage>,
    guard: NavigationGuard,
}

impl Client {
    fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let api = ApiClient::new(&config.api_base_url())
            .context("Failed to create API client")?;
        let store = SessionStore::restored(config.session_storage()?);

        Ok(Self {
            config,
            api,
            store,
            guard: NavigationGuard::recipe_vault(),
        })
    }

    async fn login(&mut self, username: Option<&str>) -> Result<()> {
        let username = match username {
            Some(name) => name.to_string(),
            None => prompt_username(self.config.last_username.as_deref())?,
        };
        if username.is_empty() {
            anyhow::bail!("Username required");
        }

        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => password,
            _ => rpassword::prompt_password("Password: ")?,
        };

        match self.store.login(&self.api, &username, &password).await {
            Ok(session) => {
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                println!(
                    "Logged in as {} ({}), session valid for {} minutes",
                    session.display_name,
                    session.username,
                    self.store.minutes_until_expiry()
                );
                Ok(())
            }
            Err(SessionError::AuthenticationFailed(e)) if e.is_unauthorized() => {
                anyhow::bail!("Invalid username or password")
            }
            Err(e) => Err(e.into()),
        }
    }

    fn logout(&mut self) -> Result<()> {
        self.store.logout().context("Failed to remove stored session")?;
        println!("Logged out");
        Ok(())
    }

    fn status(&self) {
        let Some(session) = self.store.current() else {
            println!("Not logged in");
            return;
        };

        match self.store.state() {
            SessionState::AuthenticatedValid => println!(
                "Logged in as {} ({}, id {}), expires in {} minutes",
                session.display_name,
                session.username,
                session.user_id,
                self.store.minutes_until_expiry()
            ),
            SessionState::AuthenticatedExpired => println!(
                "Session for {} has expired, run `recipevault login`",
                session.username
            ),
            SessionState::Unauthenticated => println!("Not logged in"),
        }
    }

    fn visit(&mut self, path: &str) -> Result<()> {
        let outcome = self.guard.evaluate(&mut self.store, path);
        match outcome {
            Navigation::Allow => println!("{}: allowed", path),
            Navigation::Redirect { ref to, .. } => println!("{}: redirected to {}", path, to),
        }
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        Ok(())
    }

    async fn get(&mut self, path: &str) -> Result<()> {
        let headers = self.store.authenticator().headers()?;
        match self.api.get_json::<serde_json::Value>(path, headers).await {
            Ok(body) => {
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                // The server is the final judge of the credential
                if self.store.current().is_some() {
                    info!("Server rejected credential, clearing session");
                    self.store.clear().context("Failed to remove stored session")?;
                }
                anyhow::bail!("Not authorized, run `recipevault login`")
            }
            Err(e) => Err(e).with_context(|| format!("GET {} failed", path)),
        }
    }

    async fn register(&self, username: &str, full_name: &str) -> Result<()> {
        let password = rpassword::prompt_password("Choose a password: ")?;
        let confirm = rpassword::prompt_password("Repeat password: ")?;
        if password != confirm {
            anyhow::bail!("Passwords do not match");
        }

        self.api
            .register(username, full_name, &password)
            .await
            .context("Registration failed")?;
        println!("Account {} created, run `recipevault login {}`", username, username);
        Ok(())
    }
}

fn prompt_username(last_username: Option<&str>) -> Result<String> {
    match last_username {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match last_username {
        Some(last) if input.is_empty() => last.to_string(),
        _ => input.to_string(),
    })
}

/// A parsed command line
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Login(Option<&'a str>),
    Logout,
    Status,
    Visit(&'a str),
    Get(&'a str),
    Register { username: &'a str, full_name: String },
}

fn parse_command<'a>(args: &[&'a str]) -> Option<Command<'a>> {
    match args {
        ["login"] => Some(Command::Login(None)),
        ["login", username] => Some(Command::Login(Some(*username))),
        ["logout"] => Some(Command::Logout),
        ["status"] => Some(Command::Status),
        ["visit", path] => Some(Command::Visit(*path)),
        ["get", path] => Some(Command::Get(*path)),
        ["register", username, name @ ..] if !name.is_empty() => Some(Command::Register {
            username: *username,
            full_name: name.join(" "),
        }),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let Some(command) = parse_command(&args) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let mut client = Client::new()?;

    match command {
        Command::Login(username) => client.login(username).await,
        Command::Logout => client.logout(),
        Command::Status => {
            client.status();
            Ok(())
        }
        Command::Visit(path) => client.visit(path),
        Command::Get(path) => client.get(path).await,
        Command::Register { username, full_name } => client.register(username, &full_name).await,
    }
}
