// ABOUTME: starts the Haven terminal companion: loads settings, builds the
// ABOUTME: consent engine from the builtin action catalog, and runs the command loop.

mod app;
mod audit;
mod config;
mod error;
mod integrations;
mod llm;
mod memory;
mod ui;
mod workspace;

use std::sync::Arc;

use clap::Parser;
use haven_consent::{builtin_catalog, ConsentEngine, Language};
use tracing_subscriber::EnvFilter;

use crate::app::HavenApp;
use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(name = "haven", about = "bilingual terminal companion with consent-gated actions")]
struct Args {
    /// Profile whose conversations, notes, and tasks are loaded.
    #[arg(long, default_value = "default")]
    username: String,

    /// Override the SQLite database path from the environment.
    #[arg(long)]
    db_path: Option<String>,

    /// Override the interface language (ar or en).
    #[arg(long)]
    language: Option<String>,

    /// Override the audit log path from the environment.
    #[arg(long)]
    audit_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(db_path) = args.db_path {
        settings.db_path = db_path;
    }
    if let Some(language) = args.language {
        settings.default_language = Language::parse(&language)?;
    }
    if let Some(audit_path) = args.audit_path {
        settings.audit_path = audit_path;
    }

    // A duplicate registration in the catalog is a programming error; refuse
    // to start rather than run with an ambiguous action table.
    let registry = builtin_catalog()?.build();
    let engine = Arc::new(ConsentEngine::new(registry));

    let mut app = HavenApp::new(&settings, &args.username, engine)?;
    app.run().await?;
    Ok(())
}
