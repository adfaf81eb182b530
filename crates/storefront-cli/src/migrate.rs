//! # Migrate Subcommand
//!
//! Applies the schema migrations embedded in `storefront-api`. The API
//! server runs the same migrator on startup; this command lets operators
//! migrate ahead of a deploy.

use anyhow::{Context, Result};
use clap::Args;

use storefront_api::db::MIGRATOR;

use crate::DatabaseArgs;

/// Arguments for `storefront migrate`.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,
}

/// Execute the migrate subcommand.
pub async fn run_migrate(args: &MigrateArgs) -> Result<u8> {
    let pool = args.db.connect().await?;
    MIGRATOR
        .run(&pool)
        .await
        .context("failed to apply migrations")?;

    let count = MIGRATOR.iter().count();
    tracing::info!(migrations = count, "schema is up to date");
    println!("Schema up to date ({count} migrations known).");
    Ok(0)
}
