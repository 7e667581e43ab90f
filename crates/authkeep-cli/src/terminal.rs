//! Terminal stand-ins for the browser router and toast notifications.

use authkeep_core::auth::{HOME_ROUTE, LOGIN_ROUTE};
use authkeep_core::{Notice, Notifier, Router};
use tracing::debug;
use url::Url;

#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRouter;

impl Router for TerminalRouter {
    fn replace(&self, path: &str) {
        debug!(%path, "Route replaced");
        match path {
            HOME_ROUTE => println!("Signed in."),
            LOGIN_ROUTE => println!("Session cleared. Run `authkeep login` to sign in again."),
            other => println!("-> {}", other),
        }
    }

    fn open(&self, url: &Url) {
        debug!(host = ?url.host_str(), path = url.path(), "External navigation");
        println!("Open this URL in your browser:\n\n  {}\n", url);
    }
}

impl Notifier for TerminalRouter {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(message) => println!("{}", message),
            Notice::Error(message) => eprintln!("Error: {}", message),
        }
    }
}
