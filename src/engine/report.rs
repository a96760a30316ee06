// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::engine::fx::RateTable;
use crate::engine::realized::{realized_gains_losses, Period, RealizedReport};
use crate::models::Transaction;

/// Aggregate dividend report for a period. Unlike the per-symbol "still
/// held" allocation, this counts every dividend cash event regardless of
/// whether the underlying lots were sold later; it is the tax-return view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DividendReport {
    pub total_dividends: Decimal,
    pub total_dividends_eur: Decimal,
    pub total_source_tax: Decimal,
    pub total_source_tax_eur: Decimal,
    pub by_symbol: Vec<SymbolDividendRow>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolDividendRow {
    pub symbol: String,
    pub dividends: Decimal,
    pub source_tax: Decimal,
    pub payment_count: usize,
    pub withholding_count: usize,
}

/// Sums dividend cash events in the period: positive totals are gross
/// income, negative ones source tax (stored absolute). EUR figures convert
/// each event at its own date's rate; events without a resolvable rate are
/// absent from the EUR sums.
pub fn dividend_report(
    transactions: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
) -> DividendReport {
    let mut report = DividendReport::default();
    let mut rows: BTreeMap<String, SymbolDividendRow> = BTreeMap::new();

    for tx in transactions {
        if !tx.is_dividend_event() || !period.contains(tx.date, today) {
            continue;
        }
        let value = tx.total_or_zero();
        if value.is_zero() {
            continue;
        }
        let symbol = tx.symbol.as_deref().unwrap_or("").trim().to_string();
        let row = rows.entry(symbol.clone()).or_insert_with(|| SymbolDividendRow {
            symbol,
            ..Default::default()
        });
        if value > Decimal::ZERO {
            report.total_dividends += value;
            row.dividends += value;
            row.payment_count += 1;
            if let Some(eur) = rates.usd_to_eur(value, tx.date) {
                report.total_dividends_eur += eur;
            }
        } else {
            report.total_source_tax += value.abs();
            row.source_tax += value.abs();
            row.withholding_count += 1;
            if let Some(eur) = rates.usd_to_eur(value.abs(), tx.date) {
                report.total_source_tax_eur += eur;
            }
        }
    }

    let mut by_symbol: Vec<SymbolDividendRow> = rows.into_values().collect();
    by_symbol.sort_by(|a, b| b.dividends.cmp(&a.dividends));
    report.by_symbol = by_symbol;
    report
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeesReport {
    pub total_fees: Decimal,
    pub total_fees_eur: Decimal,
}

/// Sums fees and commissions (as positive charges) over every transaction
/// in the period, whatever its type.
pub fn fees_report(
    transactions: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
) -> FeesReport {
    let mut report = FeesReport::default();
    for tx in transactions {
        if !period.contains(tx.date, today) {
            continue;
        }
        let charges = tx.charges();
        if charges.is_zero() {
            continue;
        }
        report.total_fees += charges;
        if let Some(eur) = rates.usd_to_eur(charges, tx.date) {
            report.total_fees_eur += eur;
        }
    }
    report
}

/// One-stop summary for the tax dashboard: realized buckets, dividend
/// totals, and fee totals for the same period, with parallel USD/EUR
/// fields. Pure aggregation over the other reports.
#[derive(Debug, Clone, Serialize)]
pub struct TaxSummary {
    pub period: String,
    pub realized: RealizedReport,
    pub dividends: DividendReport,
    pub fees: FeesReport,
}

pub fn tax_summary(
    transactions: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
) -> TaxSummary {
    TaxSummary {
        period: period.label(today),
        realized: realized_gains_losses(transactions, rates, period, today),
        dividends: dividend_report(transactions, rates, period, today),
        fees: fees_report(transactions, rates, period, today),
    }
}
