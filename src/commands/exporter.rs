// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::store::{load_transactions, TransactionFilter};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub.get_one::<String>("path").unwrap()),
        _ => Ok(()),
    }
}

/// Writes every stored transaction as CSV with the same column names the
/// importer reads, so an export can be re-imported unchanged.
fn export_transactions(conn: &Connection, path: &str) -> Result<()> {
    let txs = load_transactions(conn, &TransactionFilter::default())?;
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("Create CSV {}", path))?;

    wtr.write_record([
        "Date",
        "Type",
        "Sub Type",
        "Symbol",
        "Action",
        "Quantity",
        "Average Price",
        "Total",
        "Fees",
        "Commissions",
        "Asset Category",
    ])?;
    let count = txs.len();
    for t in txs {
        wtr.write_record([
            t.date.to_string(),
            t.r#type.as_str().to_string(),
            t.sub_type.unwrap_or_default(),
            t.symbol.unwrap_or_default(),
            t.action.map(|a| a.as_str().to_string()).unwrap_or_default(),
            t.quantity.map(|d| d.to_string()).unwrap_or_default(),
            t.average_price.map(|d| d.to_string()).unwrap_or_default(),
            t.total.map(|d| d.to_string()).unwrap_or_default(),
            t.fees.map(|d| d.to_string()).unwrap_or_default(),
            t.commissions.map(|d| d.to_string()).unwrap_or_default(),
            t.asset_category.as_str().to_string(),
        ])?;
    }
    wtr.flush()?;
    println!("Exported {} transactions to {}", count, path);
    Ok(())
}
