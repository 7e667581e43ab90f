//! authkeep - log in to an Auth0-style identity provider from the terminal
//! and keep the resulting session tokens in the OS keychain or an encrypted
//! file.

mod cli;
mod settings;
mod terminal;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use authkeep_core::auth::DEFAULT_REFRESH_BUFFER_MINUTES;
use authkeep_core::config::cache_dir;
use authkeep_core::store::keychain::DEFAULT_SERVICE_NAME;
use authkeep_core::{
    Auth0Provider, AuthConfig, AuthSettings, AuthorizeOptions, FileStore, KeyringStore,
    RedirectFailurePolicy, SessionManager, SessionPhase, SessionStore, SocialConnection,
    StoreSecret,
};
use chrono::{Duration, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use cli::{Cli, Commands, StoreBackend};
use settings::CliSettings;
use terminal::TerminalRouter;

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr (filtered by RUST_LOG, default `warn`) and, when a log
/// directory is available, to a daily rolling file. The returned guard must be
/// kept alive so buffered file output is flushed.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "authkeep.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_dir = cache_dir().ok().map(|dir| dir.join("logs"));
    let _guard = init_tracing(cli.verbose, log_dir.as_deref());
    info!("authkeep starting");

    let mut settings = match CliSettings::load() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to load CLI settings, using defaults");
            CliSettings::default()
        }
    };
    if let Some(backend) = cli.store {
        settings.store = Some(backend);
    }

    // Configuration has to work before a complete config exists
    if let Commands::Configure { .. } = cli.command {
        return configure(&cli.command);
    }

    let manager = build_manager(&settings, cli.passphrase_env.as_deref())?;
    let result = run(&cli, &manager, &mut settings).await;

    if let Err(e) = settings.save() {
        warn!(error = %e, "Failed to save CLI settings");
    }

    result
}

fn configure(command: &Commands) -> Result<()> {
    let Commands::Configure {
        domain,
        client_id,
        audience,
        redirect_uri,
        logout_return_uri,
        teardown_on_failure,
    } = command
    else {
        return Ok(());
    };

    let mut stored = AuthSettings::load().context("Failed to read existing configuration")?;
    let updates = [
        (&mut stored.domain, domain),
        (&mut stored.client_id, client_id),
        (&mut stored.audience, audience),
        (&mut stored.redirect_uri, redirect_uri),
        (&mut stored.logout_return_uri, logout_return_uri),
    ];
    for (field, value) in updates {
        if let Some(value) = value {
            *field = Some(value.clone());
        }
    }
    if *teardown_on_failure {
        stored.redirect_failure_policy = Some(RedirectFailurePolicy::Teardown);
    }

    stored.save().context("Failed to save configuration")?;
    info!("Configuration saved");

    match stored.into_config() {
        Ok(config) => println!("Configuration saved for {}.", config.domain),
        Err(e) => println!("Configuration saved, but still incomplete: {}", e),
    }
    Ok(())
}

fn build_manager(
    settings: &CliSettings,
    passphrase_env: Option<&str>,
) -> Result<SessionManager<Auth0Provider>> {
    let config = AuthConfig::load().context("Failed to load identity provider configuration")?;
    let provider =
        Auth0Provider::new(&config).context("Failed to create identity provider client")?;

    let store: Arc<dyn SessionStore> = match settings.store_backend() {
        StoreBackend::Keyring => Arc::new(KeyringStore::default()),
        StoreBackend::File => {
            let secret = match passphrase_env {
                Some(var) => StoreSecret::Passphrase(
                    std::env::var(var)
                        .with_context(|| format!("Passphrase variable {} is not set", var))?,
                ),
                None => StoreSecret::Keychain {
                    service: DEFAULT_SERVICE_NAME.to_string(),
                },
            };
            let dir = cache_dir().context("Failed to locate cache directory")?;
            Arc::new(FileStore::in_dir(&dir, secret))
        }
    };

    let terminal = Arc::new(TerminalRouter);
    Ok(SessionManager::new(config, provider, store, terminal.clone()).with_notifier(terminal))
}

async fn run(
    cli: &Cli,
    manager: &SessionManager<Auth0Provider>,
    settings: &mut CliSettings,
) -> Result<()> {
    match &cli.command {
        Commands::Configure { .. } => configure(&cli.command)?,

        Commands::Login { username } => {
            let username = match username.clone().or_else(|| settings.last_username.clone()) {
                Some(u) => u,
                None => prompt("Username: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;

            println!("\nAuthenticating...");
            let phase = manager
                .login_with_credentials(&username, &password)
                .await
                .context("Login failed")?;
            settings.last_username = Some(username);
            report_phase(phase);
        }

        Commands::Social { connection } => {
            let connection: SocialConnection = connection.parse()?;
            manager.initiate_social_login(connection)?;
            println!("Then run `authkeep callback <redirected URL>`.");
        }

        Commands::Authorize { login_hint, signup } => {
            let mut options = AuthorizeOptions::default();
            if let Some(hint) = login_hint {
                options = options.with_login_hint(hint.clone());
            }
            if *signup {
                options = options.with_screen_hint("signup");
            }
            manager.initiate_login(options)?;
            println!("Then run `authkeep callback <redirected URL>`.");
        }

        Commands::Callback { url } => {
            let url = Url::parse(url).context("Invalid callback URL")?;
            let phase = manager
                .complete_redirect_exchange(&url)
                .await
                .context("Failed to complete browser login")?;
            report_phase(phase);
        }

        Commands::Signup { email } => {
            let password = rpassword::prompt_password("Choose a password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                anyhow::bail!("Passwords do not match");
            }
            let phase = manager
                .register_account(email, &password)
                .await
                .context("Signup failed")?;
            settings.last_username = Some(email.clone());
            report_phase(phase);
        }

        Commands::ResetPassword { email } => {
            manager
                .request_password_reset(email)
                .await
                .context("Password reset failed")?;
        }

        Commands::Refresh { if_expiring } => {
            if let Some(minutes) = if_expiring {
                if !manager.needs_refresh(refresh_buffer(*minutes)?)? {
                    println!("Access token is still fresh; nothing to do.");
                    return Ok(());
                }
            }
            match manager.refresh_session().await? {
                SessionPhase::Authenticated => println!("Access token refreshed."),
                _ => println!("Refresh failed; the session has been ended."),
            }
        }

        Commands::Logout => {
            manager.logout()?;
            println!("Logged out.");
        }

        Commands::Status { json } => {
            let status = SessionStatus::read(manager)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                status.print();
            }
        }

        Commands::Whoami { json } => match manager.current_claims()? {
            Some(claims) if *json => println!("{}", serde_json::to_string_pretty(&claims)?),
            Some(claims) => {
                println!("Email:    {}", claims.email);
                if let Some(name) = claims.name {
                    println!("Name:     {}", name);
                }
                if let Some(sub) = claims.sub {
                    println!("Subject:  {}", sub);
                }
                if let Some(verified) = claims.email_verified {
                    println!("Verified: {}", verified);
                }
            }
            None => println!("Not logged in."),
        },

        Commands::Sso => {
            let data = manager.check_sso().await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }

    Ok(())
}

fn refresh_buffer(minutes: i64) -> Result<Duration> {
    Duration::try_minutes(minutes)
        .with_context(|| format!("--if-expiring {} is out of range", minutes))
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn report_phase(phase: SessionPhase) {
    if phase == SessionPhase::LoggedOut {
        eprintln!("The identity provider returned an incomplete session; nothing was stored.");
    }
}

#[derive(Debug, Serialize)]
struct SessionStatus {
    authenticated: bool,
    phase: SessionPhase,
    expires_at: Option<chrono::DateTime<Utc>>,
    minutes_until_expiry: Option<i64>,
    needs_refresh: bool,
}

impl SessionStatus {
    fn read(manager: &SessionManager<Auth0Provider>) -> Result<Self> {
        let expires_at = manager.expires_at()?;
        Ok(Self {
            authenticated: manager.is_authenticated(),
            phase: manager.phase(),
            expires_at,
            minutes_until_expiry: expires_at
                .map(|at| (at - Utc::now()).num_minutes().max(0)),
            needs_refresh: manager
                .needs_refresh(Duration::minutes(DEFAULT_REFRESH_BUFFER_MINUTES))?,
        })
    }

    fn print(&self) {
        if !self.authenticated {
            println!("Not logged in.");
            return;
        }
        println!("Logged in.");
        match (self.expires_at, self.minutes_until_expiry) {
            (Some(at), Some(minutes)) => {
                println!("Access token expires {} ({} min)", at.to_rfc3339(), minutes)
            }
            _ => println!("Access token expiry unknown."),
        }
        if self.needs_refresh {
            println!("Run `authkeep refresh` to renew it.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_buffer_rejects_out_of_range_minutes() {
        assert_eq!(refresh_buffer(5).unwrap(), Duration::minutes(5));
        assert!(refresh_buffer(i64::MAX).is_err());
    }
}
