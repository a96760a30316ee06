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

use crate::engine::unrealized::PriceSource;
use crate::store::{get_setting, list_prices, save_price, set_setting, traded_symbols};
use crate::utils::{http_client, pretty_table};

const FINNHUB_KEY_SETTING: &str = "finnhub_api_key";

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("fetch", _)) => fetch(conn),
        Some(("list", _)) => list(conn),
        Some(("set-key", sub)) => {
            set_setting(conn, FINNHUB_KEY_SETTING, sub.get_one::<String>("key").unwrap().trim())?;
            println!("Finnhub API key stored");
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    /// Current price; 0 when the symbol is unknown to Finnhub.
    c: Option<f64>,
}

/// Quote lookup against Finnhub with the client's bounded timeout. Any
/// failure (HTTP error, timeout, unknown symbol) yields `None` so callers
/// fall through their price-resolution chain instead of aborting.
pub struct FinnhubSource {
    client: reqwest::blocking::Client,
    api_key: String,
}

impl FinnhubSource {
    pub fn from_settings(conn: &Connection) -> Result<Option<Self>> {
        let Some(api_key) = get_setting(conn, FINNHUB_KEY_SETTING)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            client: http_client()?,
            api_key,
        }))
    }
}

impl PriceSource for FinnhubSource {
    fn current_price(&self, symbol: &str) -> Option<Decimal> {
        let url = format!(
            "https://finnhub.io/api/v1/quote?symbol={}&token={}",
            symbol.trim().to_uppercase(),
            self.api_key
        );
        let resp = self.client.get(url).send().ok()?.error_for_status().ok()?;
        let quote: FinnhubQuote = resp.json().ok()?;
        let price = quote.c?;
        if price <= 0.0 {
            return None;
        }
        Decimal::from_f64_retain(price)
    }
}

fn fetch(conn: &mut Connection) -> Result<()> {
    let symbols = traded_symbols(conn)?;
    if symbols.is_empty() {
        println!("No traded symbols to fetch");
        return Ok(());
    }
    let source = FinnhubSource::from_settings(conn)?
        .context("Finnhub API key not set; run 'taxlot prices set-key <key>'")?;

    let now = Utc::now().to_rfc3339();
    let mut fetched = 0usize;
    for symbol in &symbols {
        match source.current_price(symbol) {
            Some(price) => {
                save_price(conn, symbol, price, &now, "finnhub")?;
                fetched += 1;
            }
            None => eprintln!("No quote for {}", symbol),
        }
    }
    println!("Fetched {}/{} prices at {}", fetched, symbols.len(), now);
    Ok(())
}

fn list(conn: &Connection) -> Result<()> {
    let rows = list_prices(conn, 50)?
        .into_iter()
        .map(|p| vec![p.symbol, p.price.to_string(), p.as_of, p.source])
        .collect();
    println!("{}", pretty_table(&["Symbol", "Price", "As Of", "Source"], rows));
    Ok(())
}
