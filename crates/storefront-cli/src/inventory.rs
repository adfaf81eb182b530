//! # Inventory Subcommand
//!
//! Prints every product with its stock level and status, lowest stock
//! first. `--low-only` narrows the report to products below the threshold.

use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use storefront_api::state::{CollectionRecord, ProductRecord};
use storefront_core::{InventoryStatus, Money, DEFAULT_LOW_INVENTORY_THRESHOLD};

use crate::DatabaseArgs;

/// Arguments for `storefront inventory`.
#[derive(Args, Debug)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,

    /// Only list products below the low-stock threshold.
    #[arg(long)]
    pub low_only: bool,

    /// Stock level below which a product counts as low.
    #[arg(long, env = "STOREFRONT_LOW_INVENTORY", default_value_t = DEFAULT_LOW_INVENTORY_THRESHOLD)]
    pub threshold: u32,
}

/// One row of the inventory report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLine {
    pub status: InventoryStatus,
    pub inventory: u32,
    pub unit_price: Money,
    pub title: String,
    pub collection: String,
}

/// Build report rows, lowest stock first, then by title.
pub fn report(
    products: &[ProductRecord],
    collections: &[CollectionRecord],
    threshold: u32,
    low_only: bool,
) -> Vec<InventoryLine> {
    let titles: HashMap<Uuid, &str> = collections
        .iter()
        .map(|c| (c.id, c.title.as_str()))
        .collect();

    let mut lines: Vec<InventoryLine> = products
        .iter()
        .map(|p| InventoryLine {
            status: InventoryStatus::classify(p.inventory, threshold),
            inventory: p.inventory,
            unit_price: p.unit_price,
            title: p.title.clone(),
            collection: titles.get(&p.collection_id).copied().unwrap_or("-").to_string(),
        })
        .filter(|line| !low_only || line.status == InventoryStatus::Low)
        .collect();
    lines.sort_by(|a, b| a.inventory.cmp(&b.inventory).then_with(|| a.title.cmp(&b.title)));
    lines
}

/// Render rows as a fixed-width table.
pub fn render(lines: &[InventoryLine]) -> String {
    let title_width = lines
        .iter()
        .map(|l| l.title.chars().count())
        .max()
        .unwrap_or(0)
        .max("PRODUCT".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:>9} {:>10}  {:<title_width$}  COLLECTION",
        "STATUS", "INVENTORY", "PRICE", "PRODUCT"
    );
    for line in lines {
        let _ = writeln!(
            out,
            "{:<6} {:>9} {:>10}  {:<title_width$}  {}",
            line.status.as_str(),
            line.inventory,
            line.unit_price.to_string(),
            line.title,
            line.collection
        );
    }
    out
}

/// Execute the inventory subcommand.
pub async fn run_inventory(args: &InventoryArgs) -> Result<u8> {
    let pool = args.db.connect().await?;
    let products = storefront_api::db::catalog::load_products(&pool)
        .await
        .context("failed to load products")?;
    let collections = storefront_api::db::catalog::load_collections(&pool)
        .await
        .context("failed to load collections")?;

    let lines = report(&products, &collections, args.threshold, args.low_only);
    let low = lines
        .iter()
        .filter(|l| l.status == InventoryStatus::Low)
        .count();
    tracing::debug!(products = lines.len(), low, "inventory report built");

    print!("{}", render(&lines));
    println!("{} products, {low} low.", lines.len());
    Ok(0)
}
