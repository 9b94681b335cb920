//! Bridge to the `truthbrush` library hosted in a Python interpreter.
//!
//! Resolution probes that the library is importable. Each fetch then runs [`BRIDGE_SCRIPT`] in
//! the same interpreter: credentials go in as JSON on stdin, a tagged reply comes back on stdout.

use crate::{
    Credentials,
    auth::{Authenticator, FetchOutcome, TokenSession, Unavailable},
};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, Write},
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
};
use thiserror::Error;
use tracing::debug;

/// Interpreter used when none is configured
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Program checking that the collaborator can be imported
pub const PROBE_SCRIPT: &str = "import truthbrush.api";

/// Program performing the login and printing a tagged reply
pub const BRIDGE_SCRIPT: &str = include_str!("bridge.py");

/// The `truthbrush` collaborator, resolved against a specific interpreter.
#[derive(Debug, Clone)]
pub struct TruthbrushBridge {
    interpreter: PathBuf,
}

impl TruthbrushBridge {
    /// Checks that `interpreter` can be launched and imports `truthbrush.api`.
    ///
    /// No network traffic happens here: the probe only imports the module.
    pub fn resolve(interpreter: impl Into<PathBuf>) -> Result<Self, Unavailable> {
        let interpreter = interpreter.into();
        let name = interpreter.display().to_string();
        debug!(interpreter = %name, "probing for truthbrush");

        let output = Command::new(&interpreter)
            .args(["-c", PROBE_SCRIPT])
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Unavailable::Interpreter {
                interpreter: name.clone(),
                source,
            })?;

        if !output.status.success() {
            let details = last_line(&output.stderr)
                .unwrap_or_else(|| format!("Import probe exited with {}", output.status));
            return Err(Unavailable::Import {
                interpreter: name,
                details,
            });
        }

        Ok(Self { interpreter })
    }
}

impl Authenticator for TruthbrushBridge {
    type Session = BridgeSession;

    fn session(&self, credentials: &Credentials) -> BridgeSession {
        BridgeSession {
            interpreter: self.interpreter.clone(),
            credentials: credentials.clone(),
        }
    }
}

/// A `truthbrush` API client bound to one account.
pub struct BridgeSession {
    interpreter: PathBuf,
    credentials: Credentials,
}

impl BridgeSession {
    fn exchange(&self, request: &BridgeRequest<'_>) -> Result<BridgeReply, BridgeError> {
        let mut child = Command::new(&self.interpreter)
            .args(["-c", BRIDGE_SCRIPT])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(BridgeError::Spawn)?;

        // Dropping stdin closes it, so the bridge sees EOF after the request
        let sent = match child.stdin.take() {
            Some(mut stdin) => serde_json::to_writer(&mut stdin, request)
                .map_err(io::Error::from)
                .and_then(|()| stdin.flush()),
            None => Ok(()),
        };

        // Exit status takes precedence over a broken pipe
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(BridgeError::Exited {
                status: output.status,
                stderr: last_line(&output.stderr).unwrap_or_default(),
            });
        }
        sent?;

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl TokenSession for BridgeSession {
    fn fetch_token(&self, username: &str, password: &str) -> FetchOutcome {
        let request = BridgeRequest {
            session: Login {
                username: &self.credentials.username,
                password: &self.credentials.password,
            },
            login: Login { username, password },
        };

        debug!(interpreter = %self.interpreter.display(), "running truthbrush bridge");
        match self.exchange(&request) {
            Ok(reply) => reply.into(),
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }
}

/// Returns the last non-blank line of a process' output, where Python puts the exception.
fn last_line(output: &[u8]) -> Option<String> {
    String::from_utf8_lossy(output)
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Serialize)]
struct BridgeRequest<'a> {
    /// Credentials the API client is constructed with
    #[serde(rename = "session")]
    session: Login<'a>,

    /// Credentials the token is requested for
    #[serde(rename = "login")]
    login: Login<'a>,
}

#[derive(Serialize)]
struct Login<'a> {
    #[serde(rename = "username")]
    username: &'a str,

    #[serde(rename = "password")]
    password: &'a str,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "status")]
enum BridgeReply {
    #[serde(rename = "ok")]
    Token { token: String },

    #[serde(rename = "login_rejected")]
    LoginRejected { message: String },

    #[serde(rename = "failed")]
    Failed { message: String },
}

impl From<BridgeReply> for FetchOutcome {
    fn from(reply: BridgeReply) -> Self {
        match reply {
            BridgeReply::Token { token } => FetchOutcome::Token(token),
            BridgeReply::LoginRejected { message } => FetchOutcome::LoginRejected(message),
            BridgeReply::Failed { message } => FetchOutcome::Failed(message),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Unable to launch interpreter: {0}")]
    Spawn(#[source] io::Error),

    #[error("Unable to communicate with the bridge process: {0}")]
    Io(#[from] io::Error),

    #[error("Bridge process exited with {status}: {stderr}")]
    Exited { status: ExitStatus, stderr: String },

    #[error("Malformed bridge reply: {0}")]
    Reply(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(json: &str) -> FetchOutcome {
        serde_json::from_str::<BridgeReply>(json).unwrap().into()
    }

    #[test]
    fn ok_reply_carries_token() {
        assert_eq!(
            parse(r#"{"status": "ok", "token": "abc"}"#),
            FetchOutcome::Token("abc".into())
        );
    }

    #[test]
    fn login_rejected_reply() {
        assert_eq!(
            parse(r#"{"status": "login_rejected", "message": "Invalid credentials"}"#),
            FetchOutcome::LoginRejected("Invalid credentials".into())
        );
    }

    #[test]
    fn failed_reply() {
        assert_eq!(
            parse(r#"{"status": "failed", "message": "timed out"}"#),
            FetchOutcome::Failed("timed out".into())
        );
    }

    #[test]
    fn malformed_replies_are_rejected() {
        assert!(serde_json::from_str::<BridgeReply>(r#"{"status": "maybe"}"#).is_err());
        assert!(serde_json::from_str::<BridgeReply>(r#"{"status": "ok", "token": null}"#).is_err());
        assert!(serde_json::from_str::<BridgeReply>("").is_err());
    }

    #[test]
    fn request_carries_both_credential_pairs() {
        let request = BridgeRequest {
            session: Login {
                username: "u",
                password: "p",
            },
            login: Login {
                username: "u",
                password: "p",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "session": {"username": "u", "password": "p"},
                "login": {"username": "u", "password": "p"},
            })
        );
    }

    #[test]
    fn last_line_skips_trailing_blank_lines() {
        let stderr = b"Traceback (most recent call last):\n  File \"<string>\", line 1\nModuleNotFoundError: No module named 'truthbrush'\n\n";
        assert_eq!(
            last_line(stderr).as_deref(),
            Some("ModuleNotFoundError: No module named 'truthbrush'")
        );
        assert_eq!(last_line(b"\n  \n"), None);
    }

    #[test]
    fn missing_interpreter_is_unavailable() {
        let dir = tempdir().unwrap();
        let interpreter = dir.path().join("no-such-python");

        match TruthbrushBridge::resolve(interpreter.clone()) {
            Err(Unavailable::Interpreter { interpreter: name, .. }) => {
                assert!(name.ends_with("no-such-python"), "Unexpected name: {name}");
            }
            r => panic!("Expected Unavailable::Interpreter, got {r:?}"),
        }
    }

    #[test]
    fn bridge_script_maps_login_errors_separately() {
        assert!(BRIDGE_SCRIPT.contains("except LoginErrorException"));
        assert!(BRIDGE_SCRIPT.contains("\"login_rejected\""));
    }
}
