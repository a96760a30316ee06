// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::models::AssetCategory;

const UA: &str = concat!("taxlot/", env!("CARGO_PKG_VERSION"));

pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

/// Broker-CSV numeric cleanup: strips surrounding quotes, currency symbols,
/// thousands commas, and spaces; accounting parentheses mean negative.
/// Blank, `--`, and `None` cells yield `None` rather than an error; the
/// engine treats absent numerics as zero.
pub fn clean_numeric(value: &str) -> Option<Decimal> {
    let mut cleaned = value.trim();
    if cleaned.is_empty() || cleaned == "--" || cleaned.eq_ignore_ascii_case("none") {
        return None;
    }
    if (cleaned.starts_with('"') && cleaned.ends_with('"') && cleaned.len() >= 2)
        || (cleaned.starts_with('\'') && cleaned.ends_with('\'') && cleaned.len() >= 2)
    {
        cleaned = &cleaned[1..cleaned.len() - 1];
    }
    let mut negative = false;
    let mut inner = cleaned.trim();
    if inner.starts_with('(') && inner.ends_with(')') && inner.len() >= 2 {
        negative = true;
        inner = &inner[1..inner.len() - 1];
    }
    let stripped: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let mut parsed = stripped.parse::<Decimal>().ok()?;
    if negative {
        parsed = -parsed;
    }
    Some(parsed)
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn fmt_usd(d: Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

/// EUR figures can be absent when no historical rate covers the date.
pub fn fmt_eur_opt(d: Option<Decimal>) -> String {
    match d {
        Some(d) => format!("{:.2}", d.round_dp(2)),
        None => "n/a".to_string(),
    }
}

pub fn maybe_print_json<T: serde::Serialize>(json_flag: bool, jsonl_flag: bool, v: &T) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

// OCC option symbols: root, yymmdd expiry, C/P, strike in eighths of a cent.
static OCC_OPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z.]{1,6}\s*\d{6}[CP]\d{8}$").unwrap());

static KNOWN_ETFS: &[&str] = &[
    "SPY", "QQQ", "IWM", "VTI", "VOO", "VEA", "VWO", "VXUS", "AGG", "BND", "TLT", "IEF", "SHY",
    "LQD", "HYG", "GLD", "SLV", "IAU", "USO", "XLF", "XLE", "XLK", "XLV", "XLI", "XLP", "XLU",
    "XLB", "XLY", "XLRE", "VNQ", "ARKK", "SQQQ", "TQQQ", "UVXY", "VXX", "EEM", "FXI", "EWJ",
    "JEPI", "JEPQ", "SCHD", "QYLD", "RYLD", "XYLD", "SPYD", "HDV", "VYM", "DGRO", "NOBL", "VIG",
    "VUG", "VTV", "MTUM", "QUAL", "USMV", "IJH", "IJR", "MDY", "VB", "VO",
];

/// Local categorization heuristic for imported rows that carry no explicit
/// instrument metadata: OCC-formatted symbols are options, known tickers
/// and ETF-ish suffixes are ETFs, everything else defaults to Stock.
pub fn categorize_symbol(symbol: &str, instrument_type: Option<&str>) -> AssetCategory {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return AssetCategory::Unknown;
    }
    if let Some(it) = instrument_type {
        let it = it.to_lowercase();
        if it.contains("option") {
            return AssetCategory::Option;
        }
        if it.contains("etf") {
            return AssetCategory::Etf;
        }
    }
    if OCC_OPTION.is_match(&symbol) {
        return AssetCategory::Option;
    }
    if KNOWN_ETFS.contains(&symbol.as_str()) {
        return AssetCategory::Etf;
    }
    for pattern in ["ETF", "FUND", "TRUST"] {
        if symbol.contains(pattern) {
            return AssetCategory::Etf;
        }
    }
    AssetCategory::Stock
}
