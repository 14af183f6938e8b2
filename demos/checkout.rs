//! Checkout Example
//!
//! Loads a product catalog and storefront configuration, rehydrates a cart
//! from a JSON file store, applies the requested changes and prints the
//! order summary.
//!
//! Use `--add` to add products by id (repeatable)
//! Use `--zone` to pick the delivery zone (`local` or `remote`)
//! Use `--coupon` to apply a coupon code
//! Use `--checkout` to hand the order off and record it in the store
//!
//! Run with: `cargo run --example checkout -- --add 1 --add 3 --coupon save10 --checkout`

use std::{io, path::PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tally::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

/// Checkout example arguments
#[derive(Debug, Parser)]
#[command(name = "checkout", about = "Price and check out a storefront cart")]
struct Args {
    /// Product catalog (`{ "products": [...] }`)
    #[arg(long, env = "TALLY_CATALOG", default_value = "demos/products.json")]
    catalog: PathBuf,

    /// Storefront configuration; built-in defaults when omitted
    #[arg(long, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file holding the cart between runs
    #[arg(long, env = "TALLY_STORE", default_value = "target/tally-store.json")]
    store: PathBuf,

    /// Product id to add
    #[arg(long = "add", value_name = "ID")]
    add: Vec<u64>,

    /// Units added per `--add`
    #[arg(short = 'n', long, default_value_t = 1)]
    quantity: u32,

    /// Delivery zone
    #[arg(long)]
    zone: Option<DeliveryZone>,

    /// Coupon code
    #[arg(long)]
    coupon: Option<String>,

    /// Empty the cart before applying changes
    #[arg(long)]
    clear: bool,

    /// Hand the order off to the store's order history
    #[arg(long)]
    checkout: bool,

    /// Log format
    #[arg(long, value_enum, env = "TALLY_LOG_FORMAT", default_value = "compact")]
    log_format: LogFormat,
}

/// Checkout Example
#[expect(clippy::print_stdout, reason = "Example code")]
pub fn main() -> Result<()> {
    let _env = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing(args.log_format);

    let config = match &args.config {
        Some(path) => StorefrontConfig::from_path(path)?,
        None => StorefrontConfig::default(),
    };

    let catalog = ProductCatalog::from_path(&args.catalog)?;

    info!(products = catalog.len(), store = %args.store.display(), "starting checkout example");

    if let Some(parent) = args.store.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let storage = FileStorage::new(&args.store);
    let mut store = config.open_store(storage.clone())?;

    if args.clear {
        store.clear()?;
    }

    for id in &args.add {
        store.add_from_catalog(&catalog, ProductId::new(*id), args.quantity)?;
    }

    if let Some(zone) = args.zone {
        store.set_delivery_zone(zone)?;
    }

    if let Some(code) = args.coupon.as_deref() {
        store.apply_coupon(code)?;
    }

    let assembler = config.checkout_assembler();

    if store.cart().is_empty() {
        println!("Cart is empty. Add products with --add <ID>.");

        return Ok(());
    }

    let order = if args.checkout {
        let mut sink = StorageOrderSink::new(storage);
        let order = assembler.hand_off(&mut store, &mut sink)?;

        println!("Order {} placed ({} in history)", order.order_id(), sink.orders()?.len());

        order
    } else {
        assembler.assemble(&store)?
    };

    order.write_to(io::stdout())?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info"));

    match format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
    }
}
