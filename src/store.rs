// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::engine::fx::RateTable;
use crate::engine::unrealized::PricePersistence;
use crate::models::{
    AssetCategory, ExchangeRate, StockPrice, TradeAction, Transaction, TransactionType,
};
use crate::utils::parse_date;

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub symbol: Option<String>,
    pub r#type: Option<TransactionType>,
    pub year: Option<i32>,
}

fn decimal_opt(raw: Option<String>, what: &str, id: i64) -> Result<Option<Decimal>> {
    raw.map(|s| {
        Decimal::from_str_exact(&s)
            .with_context(|| format!("Invalid stored {} '{}' for transaction {}", what, s, id))
    })
    .transpose()
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, Vec<Option<String>>)> {
    Ok((
        row.get(0)?,
        (1..=11)
            .map(|i| row.get::<_, Option<String>>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?,
    ))
}

fn build_transaction(id: i64, cols: Vec<Option<String>>) -> Result<Transaction> {
    let [date, r#type, sub_type, symbol, action, quantity, average_price, total, fees, commissions, category]: [Option<String>; 11] =
        cols.try_into()
            .map_err(|_| anyhow::anyhow!("Unexpected column count for transaction {}", id))?;
    let date_s = date.with_context(|| format!("Transaction {} has no date", id))?;
    let date = parse_date(date_s.get(..10).unwrap_or(&date_s))
        .with_context(|| format!("Invalid stored date '{}' for transaction {}", date_s, id))?;
    let type_s = r#type.unwrap_or_default();
    let r#type = TransactionType::parse(&type_s)
        .with_context(|| format!("Unknown transaction type '{}' for transaction {}", type_s, id))?;
    Ok(Transaction {
        id,
        date,
        r#type,
        sub_type,
        symbol,
        action: action.map(|a| TradeAction::parse(&a)),
        quantity: decimal_opt(quantity, "quantity", id)?,
        average_price: decimal_opt(average_price, "price", id)?,
        total: decimal_opt(total, "total", id)?,
        fees: decimal_opt(fees, "fees", id)?,
        commissions: decimal_opt(commissions, "commissions", id)?,
        asset_category: AssetCategory::parse(category.as_deref().unwrap_or("Unknown")),
        currency: "USD".to_string(),
    })
}

/// Ordered transaction snapshot: ascending by date, stable by insertion
/// order for equal dates. Everything the engine consumes flows through
/// here.
pub fn load_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    let mut sql = String::from(
        "SELECT id, date, type, sub_type, symbol, action, quantity, average_price, total, \
         fees, commissions, asset_category FROM transactions",
    );
    let mut conditions = Vec::new();
    let mut args: Vec<String> = Vec::new();
    if let Some(symbol) = &filter.symbol {
        conditions.push(format!("symbol = ?{}", args.len() + 1));
        args.push(symbol.clone());
    }
    if let Some(t) = filter.r#type {
        conditions.push(format!("type = ?{}", args.len() + 1));
        args.push(t.as_str().to_string());
    }
    if let Some(year) = filter.year {
        conditions.push(format!("substr(date,1,4) = ?{}", args.len() + 1));
        args.push(year.to_string());
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY date ASC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), transaction_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        let (id, cols) = row?;
        out.push(build_transaction(id, cols)?);
    }
    Ok(out)
}

pub struct NewTransaction<'a> {
    pub date: NaiveDate,
    pub r#type: TransactionType,
    pub sub_type: Option<&'a str>,
    pub symbol: Option<&'a str>,
    pub action: Option<&'a TradeAction>,
    pub quantity: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub total: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub commissions: Option<Decimal>,
    pub asset_category: AssetCategory,
}

pub fn insert_transaction(conn: &Connection, tx: &NewTransaction<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(date, type, sub_type, symbol, action, quantity, \
         average_price, total, fees, commissions, asset_category) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
        params![
            tx.date.to_string(),
            tx.r#type.as_str(),
            tx.sub_type,
            tx.symbol,
            tx.action.map(|a| a.as_str().to_string()),
            tx.quantity.map(|d| d.to_string()),
            tx.average_price.map(|d| d.to_string()),
            tx.total.map(|d| d.to_string()),
            tx.fees.map(|d| d.to_string()),
            tx.commissions.map(|d| d.to_string()),
            tx.asset_category.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_rate_table(conn: &Connection) -> Result<RateTable> {
    let mut stmt = conn.prepare("SELECT date, usd_to_eur_rate FROM exchange_rates")?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut rates = Vec::new();
    for row in rows {
        let (date_s, rate_s) = row?;
        let date = parse_date(&date_s)
            .with_context(|| format!("Invalid stored rate date '{}'", date_s))?;
        let rate = Decimal::from_str_exact(&rate_s)
            .with_context(|| format!("Invalid stored rate '{}' for {}", rate_s, date_s))?;
        rates.push(ExchangeRate {
            date,
            usd_to_eur_rate: rate,
        });
    }
    Ok(RateTable::from_rates(rates))
}

pub fn upsert_rate(conn: &Connection, date: NaiveDate, rate: Decimal) -> Result<()> {
    conn.execute(
        "INSERT INTO exchange_rates(date, usd_to_eur_rate) VALUES (?1, ?2) \
         ON CONFLICT(date) DO UPDATE SET usd_to_eur_rate=excluded.usd_to_eur_rate",
        params![date.to_string(), rate.to_string()],
    )?;
    Ok(())
}

pub fn list_rates(conn: &Connection, limit: usize) -> Result<Vec<ExchangeRate>> {
    let mut stmt = conn.prepare(
        "SELECT date, usd_to_eur_rate FROM exchange_rates ORDER BY date DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (date_s, rate_s) = row?;
        out.push(ExchangeRate {
            date: parse_date(&date_s)?,
            usd_to_eur_rate: Decimal::from_str_exact(&rate_s)
                .with_context(|| format!("Invalid stored rate '{}' for {}", rate_s, date_s))?,
        });
    }
    Ok(out)
}

pub fn save_price(conn: &Connection, symbol: &str, price: Decimal, as_of: &str, source: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO stock_prices(symbol, price, as_of, source) VALUES (?1,?2,?3,?4)",
        params![symbol.trim().to_uppercase(), price.to_string(), as_of, source],
    )?;
    Ok(())
}

pub fn last_known_price(conn: &Connection, symbol: &str) -> Result<Option<Decimal>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT price FROM stock_prices WHERE symbol=?1 ORDER BY as_of DESC, id DESC LIMIT 1",
            params![symbol.trim().to_uppercase()],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| {
        Decimal::from_str_exact(&s)
            .with_context(|| format!("Invalid stored price '{}' for {}", s, symbol))
    })
    .transpose()
}

pub fn list_prices(conn: &Connection, limit: usize) -> Result<Vec<StockPrice>> {
    let mut stmt = conn.prepare(
        "SELECT symbol, price, as_of, source FROM stock_prices ORDER BY as_of DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (symbol, price_s, as_of, source) = row?;
        out.push(StockPrice {
            price: Decimal::from_str_exact(&price_s)
                .with_context(|| format!("Invalid stored price '{}' for {}", price_s, symbol))?,
            symbol,
            as_of,
            source,
        });
    }
    Ok(out)
}

/// Symbols with at least one trade, for bulk price refresh.
pub fn traded_symbols(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT symbol FROM transactions \
         WHERE type='Trade' AND symbol IS NOT NULL AND symbol != '' ORDER BY symbol",
    )?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| r.get(0))
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// `PricePersistence` backed by the `stock_prices` table.
pub struct SqlitePrices<'a> {
    pub conn: &'a Connection,
}

impl PricePersistence for SqlitePrices<'_> {
    fn last_known(&self, symbol: &str) -> Option<Decimal> {
        last_known_price(self.conn, symbol).ok().flatten()
    }
}
