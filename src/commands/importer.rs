// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use rusqlite::Connection;
use std::collections::HashMap;

use crate::models::{AssetCategory, TradeAction, TransactionType};
use crate::store::{insert_transaction, NewTransaction};
use crate::utils::{categorize_symbol, clean_numeric, parse_date};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => import_transactions(conn, sub.get_one::<String>("path").unwrap()),
        _ => Ok(()),
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: Option<&usize>) -> Option<&'a str> {
    idx.and_then(|&i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "--" && !s.eq_ignore_ascii_case("none"))
}

/// Imports a broker activity CSV (tastytrade-style column names). Rows
/// are cleaned field by field: numeric cells go through the accounting
/// cleanup, empty markers become NULL, and each symbol is categorized once
/// for the whole file. Rows without a parseable date or type are skipped
/// and counted, not fatal.
fn import_transactions(conn: &mut Connection, path: &str) -> Result<()> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path))?;

    let headers = rdr.headers()?.clone();
    let col: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();

    let tx = conn.transaction()?;
    let mut category_cache: HashMap<String, AssetCategory> = HashMap::new();
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for result in rdr.records() {
        let rec = result?;
        let Some(date_raw) = field(&rec, col.get("Date")) else {
            skipped += 1;
            continue;
        };
        // Broker exports may carry a full timestamp; the engine works at
        // day precision.
        let Ok(date) = parse_date(date_raw.get(..10).unwrap_or(date_raw)) else {
            skipped += 1;
            continue;
        };
        let Some(r#type) = field(&rec, col.get("Type")).and_then(TransactionType::parse) else {
            skipped += 1;
            continue;
        };

        let symbol = field(&rec, col.get("Symbol")).map(|s| s.to_uppercase());
        let instrument_type = field(&rec, col.get("Instrument Type"));
        let category = match &symbol {
            Some(sym) => *category_cache
                .entry(sym.clone())
                .or_insert_with(|| categorize_symbol(sym, instrument_type)),
            None => AssetCategory::Unknown,
        };
        let action = field(&rec, col.get("Action")).map(TradeAction::parse);
        let sub_type = field(&rec, col.get("Sub Type")).map(str::to_string);

        insert_transaction(
            &tx,
            &NewTransaction {
                date,
                r#type,
                sub_type: sub_type.as_deref(),
                symbol: symbol.as_deref(),
                action: action.as_ref(),
                quantity: field(&rec, col.get("Quantity")).and_then(clean_numeric),
                average_price: field(&rec, col.get("Average Price")).and_then(clean_numeric),
                total: field(&rec, col.get("Total"))
                    .or_else(|| field(&rec, col.get("Value")))
                    .and_then(clean_numeric),
                fees: field(&rec, col.get("Fees")).and_then(clean_numeric),
                commissions: field(&rec, col.get("Commissions")).and_then(clean_numeric),
                asset_category: category,
            },
        )?;
        imported += 1;
    }
    tx.commit()?;

    if skipped > 0 {
        println!("Imported {} transactions from {} ({} rows skipped)", imported, path, skipped);
    } else {
        println!("Imported {} transactions from {}", imported, path);
    }
    Ok(())
}
