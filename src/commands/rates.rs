// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::store::{list_rates, load_rate_table, upsert_rate};
use crate::utils::{fmt_eur_opt, http_client, parse_date, parse_decimal, pretty_table};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("import", sub)) => import_file(conn, sub.get_one::<String>("path").unwrap()),
        Some(("fetch", sub)) => {
            let days: usize = *sub.get_one::<usize>("days").unwrap_or(&120);
            fetch(conn, days)
        }
        Some(("list", _)) => list(conn),
        Some(("convert", sub)) => convert(conn, sub),
        _ => Ok(()),
    }
}

/// Imports a Bundesbank reference-rate file: semicolon-delimited
/// `date;rate;flag` lines with a comma decimal separator, preceded by
/// metadata header lines. Rows that do not parse as a date plus a rate
/// (headers, `.` placeholders, "Kein Wert vorhanden") are skipped.
fn import_file(conn: &mut Connection, path: &str) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Open rates file {}", path))?;
    let reader = BufReader::new(file);

    let tx = conn.transaction()?;
    let mut imported = 0usize;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with("\"\"") {
            continue;
        }
        let mut parts = line.split(';');
        let (Some(date_s), Some(rate_s)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(date) = parse_date(date_s.trim()) else {
            continue;
        };
        let normalized = rate_s.trim().replace(',', ".");
        let Ok(rate) = normalized.parse::<Decimal>() else {
            continue;
        };
        tx.execute(
            "INSERT INTO exchange_rates(date, usd_to_eur_rate) VALUES (?1, ?2) \
             ON CONFLICT(date) DO UPDATE SET usd_to_eur_rate=excluded.usd_to_eur_rate",
            rusqlite::params![date.to_string(), rate.to_string()],
        )?;
        imported += 1;
    }
    tx.commit()?;
    println!("Imported {} exchange rates from {}", imported, path);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Series {
    rates: std::collections::HashMap<String, std::collections::HashMap<String, f64>>,
    #[serde(rename = "base")]
    _base: String,
}

/// Daily EUR→USD reference rates from Frankfurter (ECB data). The quote
/// is USD per EUR, which is exactly the stored rate convention.
fn fetch(conn: &Connection, days: usize) -> Result<()> {
    let today = Utc::now().date_naive();
    let start = today - chrono::Duration::days(days as i64);
    let url = format!("https://api.frankfurter.dev/{start}..{today}?from=EUR&to=USD");
    let client = http_client()?;
    let resp = client.get(url).send()?.error_for_status()?;
    let series: Series = resp.json()?;

    let mut stored = 0usize;
    for (date_s, quotes) in series.rates {
        let Some(usd_per_eur) = quotes.get("USD") else {
            continue;
        };
        let Some(rate) = Decimal::from_f64_retain(*usd_per_eur) else {
            continue;
        };
        let date = parse_date(&date_s)
            .with_context(|| format!("Unexpected rate date '{}' from Frankfurter", date_s))?;
        upsert_rate(conn, date, rate)?;
        stored += 1;
    }
    println!("Fetched {} EUR/USD rates via Frankfurter (ECB).", stored);
    Ok(())
}

fn list(conn: &Connection) -> Result<()> {
    let rows = list_rates(conn, 50)?
        .into_iter()
        .map(|r| vec![r.date.to_string(), r.usd_to_eur_rate.to_string()])
        .collect();
    println!("{}", pretty_table(&["Date", "USD per EUR"], rows));
    Ok(())
}

fn convert(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(sub.get_one::<String>("date").unwrap().trim())?;
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    let table = load_rate_table(conn)?;
    match table.rate(date) {
        Some(rate) => {
            let eur = table.usd_to_eur(amount, date);
            println!(
                "{} USD -> {} EUR (1 EUR = {} USD)",
                amount,
                fmt_eur_opt(eur),
                rate
            );
        }
        None => println!("No exchange rate on or before {}", date),
    }
    Ok(())
}
