use serde::Serialize;
use serde_json::ser::Formatter;
use std::{fmt, io};

pub mod auth;
pub mod bridge;

pub use auth::{Authenticator, FetchOutcome, TokenSession, Unavailable, fetch_report};
pub use bridge::TruthbrushBridge;

/// Exit code of a successful fetch
pub const EXIT_OK: u8 = 0;

/// Exit code when the collaborator can't be resolved
pub const EXIT_UNAVAILABLE: u8 = 1;

/// Exit code when the platform rejects the credentials
pub const EXIT_LOGIN_FAILED: u8 = 2;

/// Exit code for any other failure during the fetch
pub const EXIT_UNEXPECTED: u8 = 3;

/// Account credentials, supplied once per invocation.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The single document written at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Token(String),
    Unavailable { details: String, hint: String },
    LoginFailed(String),
    Unexpected(String),
}

/// Wire shape of [`Report`]
#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "ok")]
    ok: bool,

    #[serde(rename = "token", skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,

    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,

    #[serde(rename = "details", skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,

    #[serde(rename = "hint", skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
}

impl<'a> Document<'a> {
    fn failure(error: &'a str, details: &'a str) -> Self {
        Self {
            ok: false,
            token: None,
            error: Some(error),
            details: Some(details),
            hint: None,
        }
    }
}

impl Report {
    pub fn exit_code(&self) -> u8 {
        match self {
            Report::Token(_) => EXIT_OK,
            Report::Unavailable { .. } => EXIT_UNAVAILABLE,
            Report::LoginFailed(_) => EXIT_LOGIN_FAILED,
            Report::Unexpected(_) => EXIT_UNEXPECTED,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Report::Token(_))
    }

    fn document(&self) -> Document<'_> {
        match self {
            Report::Token(token) => Document {
                ok: true,
                token: Some(token.as_str()),
                error: None,
                details: None,
                hint: None,
            },
            Report::Unavailable { details, hint } => Document {
                hint: Some(hint.as_str()),
                ..Document::failure("truthbrush import failed", details)
            },
            Report::LoginFailed(details) => Document::failure("login failed", details),
            Report::Unexpected(details) => Document::failure("unexpected error", details),
        }
    }

    /// Renders the report as a single JSON line (without the trailing newline).
    pub fn to_json(&self) -> String {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        // Serializing a struct of strings and a bool into memory has no failure mode
        let _ = self.document().serialize(&mut ser);
        String::from_utf8(buf).unwrap_or_default()
    }

    /// Writes the report to `stdout` on success and to `stderr` otherwise.
    pub fn emit(
        &self,
        stdout: &mut impl io::Write,
        stderr: &mut impl io::Write,
    ) -> io::Result<()> {
        let out: &mut dyn io::Write = if self.is_success() { stdout } else { stderr };
        writeln!(out, "{}", self.to_json())?;
        out.flush()
    }
}

/// Compact JSON on one line, but with `", "` and `": "` separators.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn success_document() {
        let report = Report::Token("T".into());
        assert_eq!(report.to_json(), r#"{"ok": true, "token": "T"}"#);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn login_failed_document() {
        let report = Report::LoginFailed("M".into());
        assert_eq!(
            report.to_json(),
            r#"{"ok": false, "error": "login failed", "details": "M"}"#
        );
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn unexpected_error_document() {
        let report = Report::Unexpected("M".into());
        assert_eq!(
            report.to_json(),
            r#"{"ok": false, "error": "unexpected error", "details": "M"}"#
        );
        assert_eq!(report.exit_code(), 3);
    }

    #[test]
    fn unavailable_document_carries_hint() {
        let report = Report::Unavailable {
            details: "No module named 'truthbrush'".into(),
            hint: "pip install --user truthbrush".into(),
        };
        let value: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(
            value,
            json!({
                "ok": false,
                "error": "truthbrush import failed",
                "details": "No module named 'truthbrush'",
                "hint": "pip install --user truthbrush",
            })
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn details_are_escaped_and_kept_on_one_line() {
        let report = Report::Unexpected("line one\nsaid \"hi\"".into());
        let json = report.to_json();
        assert!(!json.contains('\n'), "Document must be a single line: {json}");

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["details"], "line one\nsaid \"hi\"");
    }

    #[test]
    fn success_goes_to_stdout_only() {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        Report::Token("T".into())
            .emit(&mut stdout, &mut stderr)
            .unwrap();
        assert_eq!(
            String::from_utf8(stdout).unwrap(),
            "{\"ok\": true, \"token\": \"T\"}\n"
        );
        assert!(stderr.is_empty());
    }

    #[test]
    fn failure_goes_to_stderr_only() {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        Report::LoginFailed("M".into())
            .emit(&mut stdout, &mut stderr)
            .unwrap();
        assert!(stdout.is_empty());
        assert_eq!(String::from_utf8(stderr).unwrap().lines().count(), 1);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials::new("user@example.com", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
