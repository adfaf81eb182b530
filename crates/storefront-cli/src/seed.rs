//! # Seed Subcommand
//!
//! Loads collections and their products from a YAML file into Postgres.
//!
//! ```yaml
//! collections:
//!   - title: Kitchen
//!     products:
//!       - title: Coffee Mug
//!         unit_price: "19.99"
//!         inventory: 40
//!         description: Stoneware, 350 ml
//! ```
//!
//! Prices are strings (or whole integers); floats are rejected so no
//! rounding happens on the way in. The whole file is validated before the
//! first write, and all rows go in within a single transaction.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Deserialize;
use uuid::Uuid;

use storefront_api::routes::products::validate_unit_price;
use storefront_api::state::{CollectionRecord, ProductRecord};
use storefront_core::{require_text, slugify, Money};

/// Arguments for `storefront seed`.
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// YAML file describing collections and products.
    pub file: PathBuf,

    /// Validate the file and print what would be inserted.
    #[arg(long)]
    pub dry_run: bool,

    /// Postgres connection URL. Not needed with `--dry-run`.
    #[arg(long, env = "DATABASE_URL", required_unless_present = "dry_run")]
    pub database_url: Option<String>,
}

/// Top-level seed document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    pub collections: Vec<SeedCollection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCollection {
    pub title: String,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub title: String,
    pub unit_price: Money,
    pub inventory: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Validated rows ready to insert.
#[derive(Debug)]
pub struct SeedPlan {
    pub collections: Vec<CollectionRecord>,
    pub products: Vec<ProductRecord>,
}

/// Read and parse a seed file.
pub fn load_seed_file(path: &Path) -> Result<SeedFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Validate every entry and build the records to insert.
///
/// All problems are reported together; nothing is returned unless the whole
/// file is clean.
pub fn plan(file: &SeedFile, now: DateTime<Utc>) -> Result<SeedPlan> {
    let mut errors = Vec::new();
    let mut seen_titles = HashSet::new();
    let mut plan = SeedPlan {
        collections: Vec::with_capacity(file.collections.len()),
        products: Vec::new(),
    };

    for (ci, collection) in file.collections.iter().enumerate() {
        let at = format!("collections[{ci}]");
        let title = match require_text("title", &collection.title, 255) {
            Ok(title) => title,
            Err(e) => {
                errors.push(format!("{at}: {e}"));
                continue;
            }
        };
        if !seen_titles.insert(title.to_lowercase()) {
            errors.push(format!("{at}: duplicate collection title {title:?}"));
            continue;
        }

        let record = CollectionRecord {
            id: Uuid::new_v4(),
            title,
            created_at: now,
        };

        for (pi, product) in collection.products.iter().enumerate() {
            match product_record(product, record.id, now) {
                Ok(p) => plan.products.push(p),
                Err(e) => errors.push(format!("{at}.products[{pi}]: {e}")),
            }
        }
        plan.collections.push(record);
    }

    if !errors.is_empty() {
        bail!(
            "seed file has {} problem(s):\n  {}",
            errors.len(),
            errors.join("\n  ")
        );
    }
    Ok(plan)
}

fn product_record(
    product: &SeedProduct,
    collection_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ProductRecord> {
    let title = require_text("title", &product.title, 255)?;
    let slug = match &product.slug {
        Some(slug) => require_text("slug", slug, 255)?,
        None => slugify(&title),
    };
    let description = product
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(ProductRecord {
        id: Uuid::new_v4(),
        title,
        slug,
        description,
        unit_price: validate_unit_price(product.unit_price)?,
        inventory: product.inventory,
        collection_id,
        last_update: now,
    })
}

async fn apply(pool: &sqlx::PgPool, plan: &SeedPlan) -> Result<()> {
    let mut tx = pool.begin().await.context("failed to open transaction")?;
    for collection in &plan.collections {
        storefront_api::db::catalog::insert_collection(&mut *tx, collection)
            .await
            .with_context(|| format!("failed to insert collection {:?}", collection.title))?;
    }
    for product in &plan.products {
        storefront_api::db::catalog::insert_product(&mut *tx, product)
            .await
            .with_context(|| format!("failed to insert product {:?}", product.title))?;
    }
    tx.commit().await.context("failed to commit seed transaction")?;
    Ok(())
}

/// Execute the seed subcommand.
pub async fn run_seed(args: &SeedArgs) -> Result<u8> {
    let file = load_seed_file(&args.file)?;
    let plan = plan(&file, Utc::now())?;

    if args.dry_run {
        println!(
            "Dry run: {} collections, {} products would be inserted.",
            plan.collections.len(),
            plan.products.len()
        );
        return Ok(0);
    }

    let Some(url) = args.database_url.as_deref() else {
        bail!("--database-url (or DATABASE_URL) is required unless --dry-run is set");
    };
    let pool = storefront_api::db::connect(url)
        .await
        .context("failed to connect to the database")?;
    apply(&pool, &plan).await?;

    tracing::info!(
        collections = plan.collections.len(),
        products = plan.products.len(),
        "catalog seeded"
    );
    println!(
        "Inserted {} collections, {} products.",
        plan.collections.len(),
        plan.products.len()
    );
    Ok(0)
}
