//! # Seed Data Generator
//!
//! Populates a server database with a demo catalog and opening stock.
//!
//! ## Usage
//! ```bash
//! cargo run -p stockline-db --bin seed
//! cargo run -p stockline-db --bin seed -- --db ./data/stockline.db --stock 40
//! ```

use std::env;
use stockline_core::NewProduct;
use stockline_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// Demo catalog: (category, name, price in cents, barcode).
const CATALOG: &[(&str, &str, i64, &str)] = &[
    ("beverages", "Cola 330ml", 129, "5449000000996"),
    ("beverages", "Sparkling Water 500ml", 99, "5449000131805"),
    ("beverages", "Orange Juice 1L", 349, "5000112548167"),
    ("snacks", "Salted Crisps", 149, "5000328116495"),
    ("snacks", "Chocolate Bar", 119, "7622210449283"),
    ("snacks", "Trail Mix", 399, "0016000275287"),
    ("dairy", "Whole Milk 1L", 139, "5000128104517"),
    ("dairy", "Greek Yogurt", 229, "5201054017524"),
    ("grocery", "Spaghetti 500g", 179, "8076809513753"),
    ("grocery", "Basmati Rice 1kg", 329, "5011157630012"),
    ("household", "Dish Soap", 259, "8001090211632"),
    ("household", "Paper Towels", 449, "0037000862055"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./stockline_dev.db");
    let mut stock: i64 = 25;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--db" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "-s" | "--stock" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("Stockline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./stockline_dev.db)");
                println!("  -s, --stock <N>     Opening quantity per product (default: 25)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Stockline Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products, skipping seed", existing);
        return Ok(());
    }

    for (idx, (category, name, price_cents, barcode)) in CATALOG.iter().enumerate() {
        // Leave a few items under their threshold so low-stock views have data
        let initial_quantity = if idx % 4 == 3 { 3 } else { stock };

        let new = NewProduct {
            name: name.to_string(),
            description: None,
            category: category.to_string(),
            price_cents: *price_cents,
            barcode: Some(barcode.to_string()),
            initial_quantity,
            min_stock_level: stockline_core::DEFAULT_MIN_STOCK_LEVEL,
        };

        match db.products().insert(&new).await {
            Ok(product) => println!("  + {:<24} {:>4} in stock  ({})", product.name, initial_quantity, product.id),
            Err(e) => eprintln!("  ✗ {}: {}", name, e),
        }
    }

    let low = db.products().list_with_inventory(true).await?;
    println!();
    println!("✓ Seeded {} products ({} at or below reorder level)", CATALOG.len(), low.len());

    db.close().await;
    Ok(())
}
