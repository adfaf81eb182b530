//! # storefront CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use storefront_cli::inventory::{run_inventory, InventoryArgs};
use storefront_cli::migrate::{run_migrate, MigrateArgs};
use storefront_cli::seed::{run_seed, SeedArgs};
use storefront_cli::token::{run_token, TokenArgs};

/// Storefront operator CLI.
///
/// Schema migrations, catalog seeding, inventory reports and bearer-token
/// minting for the storefront API.
#[derive(Parser, Debug)]
#[command(name = "storefront", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the embedded database migrations.
    Migrate(MigrateArgs),

    /// Load collections and products from a YAML file.
    Seed(SeedArgs),

    /// Print products with their inventory status.
    Inventory(InventoryArgs),

    /// Print a bearer token for the API.
    Token(TokenArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = match &cli.command {
        Commands::Migrate(args) => runtime.block_on(run_migrate(args)),
        Commands::Seed(args) => runtime.block_on(run_seed(args)),
        Commands::Inventory(args) => runtime.block_on(run_inventory(args)),
        Commands::Token(args) => run_token(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_migrate() {
        let cli = Cli::try_parse_from([
            "storefront",
            "migrate",
            "--database-url",
            "postgres://localhost/shop",
        ])
        .unwrap();
        if let Commands::Migrate(args) = cli.command {
            assert_eq!(args.db.database_url, "postgres://localhost/shop");
        } else {
            panic!("expected migrate");
        }
    }

    #[test]
    fn cli_parse_seed_dry_run_needs_no_database() {
        let cli = Cli::try_parse_from(["storefront", "seed", "catalog.yaml", "--dry-run"]).unwrap();
        if let Commands::Seed(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("catalog.yaml"));
            assert!(args.dry_run);
        } else {
            panic!("expected seed");
        }
    }

    #[test]
    fn cli_parse_inventory_low_only() {
        let cli = Cli::try_parse_from([
            "storefront",
            "inventory",
            "--database-url",
            "postgres://db",
            "--low-only",
            "--threshold",
            "5",
        ])
        .unwrap();
        if let Commands::Inventory(args) = cli.command {
            assert!(args.low_only);
            assert_eq!(args.threshold, 5);
        } else {
            panic!("expected inventory");
        }
    }

    #[test]
    fn cli_parse_token() {
        let cli = Cli::try_parse_from([
            "storefront",
            "token",
            "--role",
            "customer",
            "--user-id",
            "6f9c2d0e-9b7a-4c1e-8a53-3f2b1d4e5a60",
            "--secret",
            "s3cret",
        ])
        .unwrap();
        if let Commands::Token(args) = cli.command {
            assert_eq!(args.role, storefront_cli::token::TokenRole::Customer);
            assert!(args.user_id.is_some());
            assert_eq!(args.secret, "s3cret");
        } else {
            panic!("expected token");
        }
    }

    #[test]
    fn cli_parse_token_rejects_bad_uuid() {
        let result = Cli::try_parse_from([
            "storefront",
            "token",
            "--role",
            "customer",
            "--user-id",
            "nope",
            "--secret",
            "s",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_verbose_levels() {
        let cli = Cli::try_parse_from(["storefront", "-vv", "seed", "x.yaml", "--dry-run"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["storefront"]).is_err());
    }
}
