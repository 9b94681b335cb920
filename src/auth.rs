//! The authentication collaborator seam.
//!
//! All protocol and browser-impersonation work lives in the collaborator. This module only
//! describes what is asked of it and how its answers are classified.

use crate::{Credentials, Report};
use thiserror::Error;
use tracing::debug;

/// Hint attached to the report when the collaborator can't be resolved
pub const INSTALL_HINT: &str = "pip install --user truthbrush";

/// A resolved collaborator able to open authentication sessions.
pub trait Authenticator {
    type Session: TokenSession;

    /// Constructs a session for the given credentials. Nothing is sent over the network yet.
    fn session(&self, credentials: &Credentials) -> Self::Session;
}

/// An authentication session exposing the single "fetch token" operation.
pub trait TokenSession {
    fn fetch_token(&self, username: &str, password: &str) -> FetchOutcome;
}

/// Result of a token fetch, already classified by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Bearer token issued by the platform
    Token(String),

    /// The platform rejected the credentials
    LoginRejected(String),

    /// Anything else that went wrong during the fetch
    Failed(String),
}

#[derive(Error, Debug)]
pub enum Unavailable {
    #[error("Unable to launch interpreter `{interpreter}`: {source}")]
    Interpreter {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{details}")]
    Import { interpreter: String, details: String },
}

/// Runs a single fetch against an already resolved (or unresolvable) collaborator.
///
/// Resolution failures short-circuit before any session is built, so no network traffic happens
/// when the collaborator is missing.
pub fn fetch_report<A: Authenticator>(
    resolved: Result<A, Unavailable>,
    credentials: &Credentials,
) -> Report {
    let authenticator = match resolved {
        Ok(authenticator) => authenticator,
        Err(e) => {
            debug!(error = %e, "collaborator unavailable");
            return Report::Unavailable {
                details: e.to_string(),
                hint: INSTALL_HINT.to_string(),
            };
        }
    };

    let session = authenticator.session(credentials);
    match session.fetch_token(&credentials.username, &credentials.password) {
        FetchOutcome::Token(token) => {
            debug!("token fetched");
            Report::Token(token)
        }
        FetchOutcome::LoginRejected(details) => {
            debug!("login rejected by collaborator");
            Report::LoginFailed(details)
        }
        FetchOutcome::Failed(details) => {
            debug!(details = %details, "token fetch failed");
            Report::Unexpected(details)
        }
    }
}
