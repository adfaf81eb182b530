//! # storefront-cli — Operator CLI for the Storefront
//!
//! Provides the `storefront` command-line interface for tasks that sit
//! outside the HTTP API.
//!
//! ## Subcommands
//!
//! - `storefront migrate` — Apply the embedded schema migrations.
//! - `storefront seed` — Load collections and products from a YAML file.
//! - `storefront inventory` — Print stock levels with their status.
//! - `storefront token` — Mint a bearer token in the API's format.
//!
//! ```bash
//! storefront migrate --database-url postgres://localhost/storefront
//! storefront seed catalog.yaml --dry-run
//! storefront inventory --low-only
//! storefront token --role customer --user-id 6f9c... --secret s3cret
//! ```

pub mod inventory;
pub mod migrate;
pub mod seed;
pub mod token;

use anyhow::{Context, Result};
use clap::Args;
use sqlx::PgPool;

/// Database connection shared by the subcommands that touch Postgres.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

impl DatabaseArgs {
    /// Open a pool against the configured database.
    pub async fn connect(&self) -> Result<PgPool> {
        storefront_api::db::connect(&self.database_url)
            .await
            .context("failed to connect to the database")
    }
}
