// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use crate::engine::fx::RateTable;
use crate::engine::lots::IntegrityWarning;
use crate::engine::realized::{realized_gains_losses, GainLossBucket, Period, RealizedReport};
use crate::engine::report::{dividend_report, fees_report, tax_summary, DividendReport};
use crate::models::Transaction;
use crate::store::{load_rate_table, load_transactions, TransactionFilter};
use crate::utils::{fmt_eur_opt, fmt_usd, maybe_print_json, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let Some((name, sub)) = m.subcommand() else {
        return Ok(());
    };
    let period = period_from_args(sub)?;
    let today = Utc::now().date_naive();
    let txs = load_transactions(conn, &TransactionFilter::default())?;
    let rates = load_rate_table(conn)?;
    let json = sub.get_flag("json");

    match name {
        "realized" => print_realized(&txs, &rates, period, today, json),
        "dividends" => print_dividends(&txs, &rates, period, today, json),
        "fees" => print_fees(&txs, &rates, period, today, json),
        "summary" => print_summary(&txs, &rates, period, today, json),
        _ => Ok(()),
    }
}

/// `--ytd` wins over `--year`; with neither, the report covers the current
/// year to date.
fn period_from_args(sub: &clap::ArgMatches) -> Result<Period> {
    if sub.get_flag("ytd") {
        return Ok(Period::Ytd);
    }
    match sub.get_one::<String>("year") {
        Some(raw) => Ok(Period::from_arg(raw)?),
        None => Ok(Period::Ytd),
    }
}

fn warn_integrity(warnings: &[IntegrityWarning]) {
    for w in warnings {
        eprintln!(
            "warning: {} {:?} on {} closed {} more shares than were open",
            w.symbol, w.side, w.date, w.unmatched_quantity
        );
    }
}

fn bucket_row(label: &str, b: &GainLossBucket) -> Vec<String> {
    vec![
        label.to_string(),
        fmt_usd(b.gains),
        fmt_usd(b.losses),
        fmt_usd(b.net),
        fmt_eur_opt(b.gains_eur),
        fmt_eur_opt(b.losses_eur),
        fmt_eur_opt(b.net_eur),
    ]
}

fn realized_table(report: &RealizedReport) -> comfy_table::Table {
    pretty_table(
        &["Bucket", "Gains", "Losses", "Net", "Gains EUR", "Losses EUR", "Net EUR"],
        vec![
            bucket_row("Stocks", &report.stock),
            bucket_row("Options", &report.option),
            bucket_row("Other", &report.other),
            bucket_row("Total", &report.total),
        ],
    )
}

fn print_realized(
    txs: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let report = realized_gains_losses(txs, rates, period, today);
    warn_integrity(&report.warnings);
    if maybe_print_json(json, false, &report)? {
        return Ok(());
    }
    println!("Realized gains/losses {} ({} matches)", period.label(today), report.matches.len());
    println!("{}", realized_table(&report));
    Ok(())
}

fn dividends_table(report: &DividendReport) -> comfy_table::Table {
    let mut rows: Vec<Vec<String>> = report
        .by_symbol
        .iter()
        .map(|r| {
            vec![
                r.symbol.clone(),
                fmt_usd(r.dividends),
                fmt_usd(r.source_tax),
                r.payment_count.to_string(),
                r.withholding_count.to_string(),
            ]
        })
        .collect();
    rows.push(vec![
        "Total".to_string(),
        fmt_usd(report.total_dividends),
        fmt_usd(report.total_source_tax),
        String::new(),
        String::new(),
    ]);
    pretty_table(&["Symbol", "Dividends", "Source Tax", "Payments", "Withholdings"], rows)
}

fn print_dividends(
    txs: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let report = dividend_report(txs, rates, period, today);
    if maybe_print_json(json, false, &report)? {
        return Ok(());
    }
    println!("Dividend income {}", period.label(today));
    println!("{}", dividends_table(&report));
    println!(
        "EUR: {} dividends, {} source tax",
        fmt_usd(report.total_dividends_eur),
        fmt_usd(report.total_source_tax_eur)
    );
    Ok(())
}

fn print_fees(
    txs: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let report = fees_report(txs, rates, period, today);
    if maybe_print_json(json, false, &report)? {
        return Ok(());
    }
    println!(
        "Fees and commissions {}: {} USD ({} EUR)",
        period.label(today),
        fmt_usd(report.total_fees),
        fmt_usd(report.total_fees_eur)
    );
    Ok(())
}

fn print_summary(
    txs: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let summary = tax_summary(txs, rates, period, today);
    warn_integrity(&summary.realized.warnings);
    if maybe_print_json(json, false, &summary)? {
        return Ok(());
    }
    println!("Tax summary {}", summary.period);
    println!("{}", realized_table(&summary.realized));
    println!("{}", dividends_table(&summary.dividends));
    println!(
        "Fees and commissions: {} USD ({} EUR)",
        fmt_usd(summary.fees.total_fees),
        fmt_usd(summary.fees.total_fees_eur)
    );
    Ok(())
}
