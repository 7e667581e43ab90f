use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "authkeep")]
#[command(about = "Log in to an identity provider and keep the session tokens safe")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Where session tokens are kept (defaults to the last used backend)
    #[arg(long, value_enum, global = true)]
    pub store: Option<StoreBackend>,

    /// Environment variable holding the passphrase for the file store.
    /// Without it the file key is derived from a secret kept in the OS keychain.
    #[arg(long, global = true, value_name = "VAR")]
    pub passphrase_env: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save identity provider settings to the config file
    Configure {
        /// Tenant domain, e.g. example.auth0.com
        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        client_id: Option<String>,

        /// API audience to request access tokens for
        #[arg(long)]
        audience: Option<String>,

        /// Where the provider sends the browser after login
        #[arg(long)]
        redirect_uri: Option<String>,

        /// Where the provider sends the browser after logout
        #[arg(long)]
        logout_return_uri: Option<String>,

        /// Clear the stored session when a browser login fails
        #[arg(long)]
        teardown_on_failure: bool,
    },

    /// Log in with username and password
    Login {
        /// Username or email (defaults to the last one used)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Start a browser login through a social connection
    Social {
        /// One of: twitter, google-oauth2, facebook, linkedin, github
        connection: String,
    },

    /// Start a browser login on the provider's hosted page
    Authorize {
        /// Pre-fill the login form
        #[arg(long)]
        login_hint: Option<String>,

        /// Open the signup tab instead of login
        #[arg(long)]
        signup: bool,
    },

    /// Finish a browser login from the URL the provider redirected to
    Callback {
        /// Full callback URL including `code` and `state`
        url: String,
    },

    /// Create an account and log in
    Signup {
        email: String,
    },

    /// Send a password reset email
    ResetPassword {
        email: String,
    },

    /// Exchange the stored refresh token for a new access token
    Refresh {
        /// Only refresh when the access token expires within this many minutes
        #[arg(long, value_name = "MINUTES")]
        if_expiring: Option<i64>,
    },

    /// Clear the stored session and end the provider session
    Logout,

    /// Show whether a session is stored and when it expires
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the claims of the stored ID token
    Whoami {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query the provider's single sign-on state
    Sso,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One OS keychain entry per token
    Keyring,
    /// Encrypted file in the cache directory
    File,
}
