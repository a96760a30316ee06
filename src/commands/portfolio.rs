// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::commands::prices::FinnhubSource;
use crate::engine::dividends::net_dividends_by_symbol;
use crate::engine::unrealized::{
    unrealized_gains_losses, PriceOrigin, PriceSource, SharedPriceCache, ValuationContext,
};
use crate::store::{load_rate_table, load_transactions, save_price, SqlitePrices, TransactionFilter};
use crate::utils::{fmt_eur_opt, fmt_usd, maybe_print_json, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("positions", sub)) => positions(conn, sub),
        _ => Ok(()),
    }
}

struct NoSource;

impl PriceSource for NoSource {
    fn current_price(&self, _symbol: &str) -> Option<Decimal> {
        None
    }
}

fn positions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let txs = load_transactions(conn, &TransactionFilter::default())?;
    let rates = load_rate_table(conn)?;
    let dividends = net_dividends_by_symbol(&txs);

    let live = sub.get_flag("live");
    let finnhub = FinnhubSource::from_settings(conn)?;
    if live && finnhub.is_none() {
        eprintln!("warning: no Finnhub API key set, falling back to stored prices");
    }
    let no_source = NoSource;
    let source: &dyn PriceSource = match &finnhub {
        Some(s) => s,
        None => &no_source,
    };

    let cache = SharedPriceCache::default();
    let persistence = SqlitePrices { conn };
    let now = Utc::now();
    let ctx = ValuationContext {
        fetch_fresh: live && finnhub.is_some(),
        source,
        cache: &cache,
        persistence: &persistence,
        now,
    };
    let report = unrealized_gains_losses(&txs, &rates, &dividends, &ctx);

    for w in &report.warnings {
        eprintln!(
            "warning: {} {:?} on {} closed {} more shares than were open",
            w.symbol, w.side, w.date, w.unmatched_quantity
        );
    }

    // Freshly fetched quotes are kept for the next offline run.
    if ctx.fetch_fresh {
        let as_of = now.to_rfc3339();
        for p in &report.positions {
            if p.price_origin == PriceOrigin::Live {
                save_price(conn, &p.symbol, p.current_price, &as_of, "finnhub")?;
            }
        }
    }

    if maybe_print_json(sub.get_flag("json"), false, &report)? {
        return Ok(());
    }

    let rows = report
        .positions
        .iter()
        .map(|p| {
            vec![
                p.symbol.clone(),
                p.quantity.to_string(),
                fmt_usd(p.avg_cost),
                fmt_usd(p.adjusted_avg_cost),
                fmt_usd(p.current_price),
                format!("{:?}", p.price_origin),
                fmt_usd(p.current_value),
                fmt_usd(p.unrealized_gain_loss),
                fmt_eur_opt(p.unrealized_gain_loss_eur),
                p.earliest_open_date.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Symbol", "Qty", "Avg Cost", "Adj Cost", "Price", "Origin", "Value", "Unrealized",
                "Unrealized EUR", "Opened",
            ],
            rows
        )
    );
    println!(
        "Totals: cost {} USD, value {} USD, unrealized {} USD ({} EUR)",
        fmt_usd(report.total_cost_basis),
        fmt_usd(report.total_current_value),
        fmt_usd(report.total_unrealized_gain_loss),
        fmt_eur_opt(report.total_unrealized_gain_loss_eur)
    );
    Ok(())
}
