#![warn(clippy::pedantic)]

//! # App Engine SDK installer (appengine)
//!
//! The `appengine` command installs the Google App Engine Python SDK into a
//! prefix and publishes its command-line tools into a tools directory.
//!
//! ## Pipeline
//!
//! 1. Ask the update-check endpoint for the current release
//! 2. Resolve the requested SDK to a download URL or a local archive path
//! 3. Fetch the archive
//! 4. Unpack it into the prefix
//! 5. Link the SDK's `*.py` tools into the tools directory
//!
//! ## Examples
//!
//! Install the current release into `~/.appengine`:
//! ```bash
//! appengine
//! ```
//!
//! Install a specific release without publishing tools:
//! ```bash
//! appengine 1.9.40 --no-bindir
//! ```

mod commands;
mod errors;
mod logging;
mod sdk;

use anyhow::Result;
use clap::{ArgAction, Parser};
use commands::install;

/// App Engine Python SDK installer.
///
/// Installs an SDK release (by version, URL or local zip) and links its tools
/// into a bin directory.
#[derive(Parser)]
#[command(
    name = "appengine",
    author,
    version,
    about = "Install the Google App Engine Python SDK",
    after_help = "\
SDK IDENTIFIERS:
    1.9.40                  A released version
    latest                  The current release (the default)
    https://host/sdk.zip    An archive URL
    ./sdk.zip               A local archive

ENVIRONMENT VARIABLES:
    APPENGINEPY_SDK_VERSION       SDK to install when none is given
    APPENGINE_PREFIX              Install prefix (default: ~/.appengine)
    APPENGINEPY_UPDATECHECK_URL   Update-check endpoint
    RUST_LOG                      Log filter, overrides -v"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub install: install::InstallArgs,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints the error chain and returns the exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(err) = e.downcast_ref::<errors::SdkError>() {
        tracing::debug!(kind = err.kind(), "install failed");
    }
    eprintln!("Error: {e:?}");
    1
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;
    install::execute(&cli.install).await
}
