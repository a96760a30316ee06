// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::models::{AssetCategory, TradeAction, TransactionType};
use crate::store::{insert_transaction, load_transactions, NewTransaction, TransactionFilter};
use crate::utils::{
    categorize_symbol, fmt_usd, maybe_print_json, parse_date, parse_decimal, pretty_table,
};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        _ => Ok(()),
    }
}

fn opt_decimal(sub: &clap::ArgMatches, name: &str) -> Result<Option<rust_decimal::Decimal>> {
    sub.get_one::<String>(name)
        .map(|raw| parse_decimal(raw.trim()))
        .transpose()
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(sub.get_one::<String>("date").unwrap().trim())?;
    let type_raw = sub.get_one::<String>("type").unwrap().trim();
    let r#type = TransactionType::parse(type_raw)
        .with_context(|| format!("Unknown transaction type '{}'", type_raw))?;
    let sub_type = sub.get_one::<String>("sub-type").map(|s| s.trim().to_string());
    let symbol = sub
        .get_one::<String>("symbol")
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());
    let action = sub
        .get_one::<String>("action")
        .map(|s| TradeAction::parse(s));
    let category = match sub.get_one::<String>("category") {
        Some(raw) => AssetCategory::parse(raw),
        None => symbol
            .as_deref()
            .map(|s| categorize_symbol(s, None))
            .unwrap_or(AssetCategory::Unknown),
    };

    let id = insert_transaction(
        conn,
        &NewTransaction {
            date,
            r#type,
            sub_type: sub_type.as_deref(),
            symbol: symbol.as_deref(),
            action: action.as_ref(),
            quantity: opt_decimal(sub, "quantity")?,
            average_price: opt_decimal(sub, "price")?,
            total: opt_decimal(sub, "total")?,
            fees: opt_decimal(sub, "fees")?,
            commissions: opt_decimal(sub, "commissions")?,
            asset_category: category,
        },
    )?;
    println!(
        "Recorded transaction {} ({} {} {})",
        id,
        date,
        r#type.as_str(),
        symbol.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let filter = TransactionFilter {
        symbol: sub
            .get_one::<String>("symbol")
            .map(|s| s.trim().to_uppercase()),
        r#type: None,
        year: sub.get_one::<i32>("year").copied(),
    };
    let txs = load_transactions(conn, &filter)?;

    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &txs)? {
        return Ok(());
    }

    let rows = txs
        .into_iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.date.to_string(),
                t.r#type.as_str().to_string(),
                t.symbol.clone().unwrap_or_default(),
                t.action.as_ref().map(|a| a.as_str().to_string()).unwrap_or_default(),
                t.quantity.map(|q| q.to_string()).unwrap_or_default(),
                t.total.map(fmt_usd).unwrap_or_default(),
                t.asset_category.as_str().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Date", "Type", "Symbol", "Action", "Qty", "Total", "Category"],
            rows
        )
    );
    Ok(())
}
