// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::engine::fx::RateTable;
use crate::engine::lots::{match_all, IntegrityWarning, LotMatch};
use crate::models::{AssetCategory, Transaction};

/// Reporting window: one fiscal year, or the current calendar year so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Ytd,
}

impl Period {
    pub fn year(&self, today: NaiveDate) -> i32 {
        match self {
            Period::Year(y) => *y,
            Period::Ytd => today.year(),
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date.year() == self.year(today)
    }

    pub fn label(&self, today: NaiveDate) -> String {
        match self {
            Period::Year(y) => y.to_string(),
            Period::Ytd => format!("YTD {}", today.year()),
        }
    }
}

/// Gains and losses for one tax bucket. Losses are stored as absolute
/// values. EUR figures are exact sums of each match's own historically
/// converted gain/loss; matches whose dates have no resolvable rate are
/// absent from the EUR sums, never re-converted at a blended rate. The EUR
/// fields stay `None` until at least one match in the bucket resolves, so
/// a missing rate table reads as absent rather than a zero result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GainLossBucket {
    pub gains: Decimal,
    pub losses: Decimal,
    pub net: Decimal,
    pub gains_eur: Option<Decimal>,
    pub losses_eur: Option<Decimal>,
    pub net_eur: Option<Decimal>,
}

impl GainLossBucket {
    fn add(&mut self, m: &LotMatch) {
        if m.gain_loss > Decimal::ZERO {
            self.gains += m.gain_loss;
        } else {
            self.losses += m.gain_loss.abs();
        }
        if let Some(gl_eur) = m.gain_loss_eur {
            if gl_eur > Decimal::ZERO {
                *self.gains_eur.get_or_insert(Decimal::ZERO) += gl_eur;
                self.losses_eur.get_or_insert(Decimal::ZERO);
            } else {
                *self.losses_eur.get_or_insert(Decimal::ZERO) += gl_eur.abs();
                self.gains_eur.get_or_insert(Decimal::ZERO);
            }
        }
    }

    fn finish(&mut self) {
        self.net = self.gains - self.losses;
        if let (Some(g), Some(l)) = (self.gains_eur, self.losses_eur) {
            self.net_eur = Some(g - l);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RealizedReport {
    pub total: GainLossBucket,
    pub stock: GainLossBucket,
    pub option: GainLossBucket,
    pub other: GainLossBucket,
    /// Matches whose closing date falls inside the period, in symbol order.
    pub matches: Vec<LotMatch>,
    pub warnings: Vec<IntegrityWarning>,
}

/// FIFO-matches the full transaction history and aggregates the matches
/// closed inside `period` into per-category gain/loss buckets. Matching
/// always runs over the whole history so lots opened in earlier years are
/// consumed before the period's own closings are judged.
pub fn realized_gains_losses(
    transactions: &[Transaction],
    rates: &RateTable,
    period: Period,
    today: NaiveDate,
) -> RealizedReport {
    let mut report = RealizedReport::default();

    for (_, outcome) in match_all(transactions, rates) {
        report.warnings.extend(outcome.warnings);
        for m in outcome.matches {
            if !period.contains(m.close_date(), today) {
                continue;
            }
            report.total.add(&m);
            match m.asset_category {
                AssetCategory::Stock => report.stock.add(&m),
                AssetCategory::Option => report.option.add(&m),
                AssetCategory::Etf | AssetCategory::Unknown => report.other.add(&m),
            }
            report.matches.push(m);
        }
    }

    report.total.finish();
    report.stock.finish();
    report.option.finish();
    report.other.finish();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TradeAction, TransactionType};
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn trade(
        symbol: &str,
        category: AssetCategory,
        date: &str,
        action: TradeAction,
        qty: &str,
        total: &str,
    ) -> Transaction {
        Transaction {
            id: 0,
            date: d(date),
            r#type: TransactionType::Trade,
            sub_type: None,
            symbol: Some(symbol.into()),
            action: Some(action),
            quantity: Some(dec(qty)),
            average_price: Some(Decimal::ZERO),
            total: Some(dec(total)),
            fees: None,
            commissions: None,
            asset_category: category,
            currency: "USD".into(),
        }
    }

    #[test]
    fn splits_by_category_and_gain_sign() {
        let txs = vec![
            trade("AAA", AssetCategory::Stock, "2024-01-01", TradeAction::BuyToOpen, "10", "-100"),
            trade("AAA", AssetCategory::Stock, "2024-02-01", TradeAction::SellToClose, "10", "150"),
            trade("BBB", AssetCategory::Etf, "2024-01-01", TradeAction::BuyToOpen, "10", "-200"),
            trade("BBB", AssetCategory::Etf, "2024-02-01", TradeAction::SellToClose, "10", "180"),
            trade("CCC", AssetCategory::Option, "2024-01-05", TradeAction::SellToOpen, "1", "50"),
            trade("CCC", AssetCategory::Option, "2024-01-20", TradeAction::BuyToClose, "1", "-20"),
        ];
        let report =
            realized_gains_losses(&txs, &RateTable::new(), Period::Year(2024), d("2025-06-01"));
        assert_eq!(report.stock.gains, dec("50"));
        assert_eq!(report.stock.losses, Decimal::ZERO);
        assert_eq!(report.other.losses, dec("20"));
        assert_eq!(report.option.gains, dec("30"));
        assert_eq!(report.total.gains, dec("80"));
        assert_eq!(report.total.losses, dec("20"));
        assert_eq!(report.total.net, dec("60"));
        assert_eq!(report.matches.len(), 3);
    }

    #[test]
    fn period_filter_keys_off_closing_date() {
        // Lot opened in 2023, closed in 2024: realized in 2024 only.
        let txs = vec![
            trade("AAA", AssetCategory::Stock, "2023-06-01", TradeAction::BuyToOpen, "10", "-100"),
            trade("AAA", AssetCategory::Stock, "2024-03-01", TradeAction::SellToClose, "10", "120"),
        ];
        let today = d("2025-01-01");
        let y2023 = realized_gains_losses(&txs, &RateTable::new(), Period::Year(2023), today);
        assert!(y2023.matches.is_empty());
        let y2024 = realized_gains_losses(&txs, &RateTable::new(), Period::Year(2024), today);
        assert_eq!(y2024.total.gains, dec("20"));
    }

    #[test]
    fn prior_year_sells_consume_lots_before_period() {
        // 2023 sell eats the first lot; the 2024 sell must match lot 2.
        let txs = vec![
            trade("AAA", AssetCategory::Stock, "2022-01-01", TradeAction::BuyToOpen, "10", "-100"),
            trade("AAA", AssetCategory::Stock, "2022-06-01", TradeAction::BuyToOpen, "10", "-200"),
            trade("AAA", AssetCategory::Stock, "2023-01-01", TradeAction::SellToClose, "10", "110"),
            trade("AAA", AssetCategory::Stock, "2024-01-01", TradeAction::SellToClose, "10", "260"),
        ];
        let report =
            realized_gains_losses(&txs, &RateTable::new(), Period::Year(2024), d("2025-01-01"));
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].cost_basis, dec("200"));
        assert_eq!(report.total.net, dec("60"));
    }

    #[test]
    fn ytd_uses_injected_today() {
        let txs = vec![
            trade("AAA", AssetCategory::Stock, "2024-01-01", TradeAction::BuyToOpen, "10", "-100"),
            trade("AAA", AssetCategory::Stock, "2024-02-01", TradeAction::SellToClose, "10", "150"),
        ];
        let hit = realized_gains_losses(&txs, &RateTable::new(), Period::Ytd, d("2024-06-01"));
        assert_eq!(hit.total.gains, dec("50"));
        let miss = realized_gains_losses(&txs, &RateTable::new(), Period::Ytd, d("2025-06-01"));
        assert!(miss.matches.is_empty());
    }

    #[test]
    fn eur_totals_sum_per_match_rates() {
        let mut rates = RateTable::new();
        rates.insert(d("2024-01-01"), dec("1.25"));
        rates.insert(d("2024-02-01"), dec("1.20"));
        let txs = vec![
            trade("AAA", AssetCategory::Stock, "2024-01-01", TradeAction::BuyToOpen, "10", "-100"),
            trade("AAA", AssetCategory::Stock, "2024-02-01", TradeAction::SellToClose, "10", "150"),
        ];
        let report =
            realized_gains_losses(&txs, &rates, Period::Year(2024), d("2025-01-01"));
        // 150/1.20 - 100/1.25 = 125 - 80 = 45 EUR.
        assert_eq!(report.total.gains_eur, Some(dec("45")));
        assert_eq!(report.total.losses_eur, Some(Decimal::ZERO));
        assert_eq!(report.stock.net_eur, Some(dec("45")));
    }

    #[test]
    fn eur_buckets_stay_absent_without_rates() {
        let txs = vec![
            trade("AAA", AssetCategory::Stock, "2024-01-01", TradeAction::BuyToOpen, "10", "-100"),
            trade("AAA", AssetCategory::Stock, "2024-02-01", TradeAction::SellToClose, "10", "150"),
        ];
        let report =
            realized_gains_losses(&txs, &RateTable::new(), Period::Year(2024), d("2025-01-01"));
        // A $50 USD gain with no rate table must not masquerade as 0 EUR.
        assert_eq!(report.total.gains, dec("50"));
        assert_eq!(report.total.gains_eur, None);
        assert_eq!(report.total.net_eur, None);
        assert_eq!(report.stock.net_eur, None);
    }

    #[test]
    fn over_close_warning_surfaces_in_report() {
        let txs = vec![
            trade("AAA", AssetCategory::Stock, "2024-01-01", TradeAction::BuyToOpen, "10", "-100"),
            trade("AAA", AssetCategory::Stock, "2024-02-01", TradeAction::SellToClose, "15", "180"),
        ];
        let report =
            realized_gains_losses(&txs, &RateTable::new(), Period::Year(2024), d("2025-01-01"));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].unmatched_quantity, dec("5"));
    }
}
