use clap::Parser;
use dotenv::dotenv;
use std::{
    io::{stderr, stdout},
    path::PathBuf,
    process::ExitCode,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use truthsocial_token::{
    Credentials, TruthbrushBridge, bridge::DEFAULT_INTERPRETER, fetch_report,
};

#[derive(Parser)]
#[command(name = "truthsocial-token")]
#[command(about = "Fetch a Truth Social OAuth token using truthbrush")]
struct Cli {
    /// Truth Social username (email)
    #[arg(long)]
    username: String,

    /// Truth Social password
    #[arg(long)]
    password: String,

    /// Python interpreter with truthbrush installed
    #[arg(long, env = "TRUTHBRUSH_PYTHON", default_value = DEFAULT_INTERPRETER)]
    python: PathBuf,
}

fn main() -> ExitCode {
    dotenv().ok();

    // Logging is opt-in via RUST_LOG, so by default the report is the only output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::OFF.into())
                .from_env_lossy(),
        )
        .with_writer(stderr)
        .init();

    let cli = Cli::parse();
    let credentials = Credentials::new(cli.username, cli.password);

    let report = fetch_report(TruthbrushBridge::resolve(cli.python), &credentials);

    // Nowhere left to report a failure to write the report itself
    let _ = report.emit(&mut stdout().lock(), &mut stderr().lock());
    ExitCode::from(report.exit_code())
}
