// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::ExchangeRate;

/// Historical USD/EUR rate table. Rates are sparse (trading days only);
/// a lookup falls back to the most recent rate on or before the target
/// date, never a future one.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: BTreeMap<NaiveDate, Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rates(rates: impl IntoIterator<Item = ExchangeRate>) -> Self {
        let mut table = Self::new();
        for r in rates {
            table.insert(r.date, r.usd_to_eur_rate);
        }
        table
    }

    pub fn insert(&mut self, date: NaiveDate, usd_per_eur: Decimal) {
        self.rates.insert(date, usd_per_eur);
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Rate for `date`, meaning 1 EUR = rate USD. Exact match wins,
    /// otherwise the closest earlier entry carries forward.
    pub fn rate(&self, date: NaiveDate) -> Option<Decimal> {
        self.rates.range(..=date).next_back().map(|(_, r)| *r)
    }

    /// USD amount expressed in EUR at the rate for `date`. `None` when no
    /// rate resolves or the stored rate is zero. Not rounded; display
    /// rounding happens at the aggregation boundary.
    pub fn usd_to_eur(&self, amount: Decimal, date: NaiveDate) -> Option<Decimal> {
        let rate = self.rate(date)?;
        if rate.is_zero() {
            return None;
        }
        Some(amount / rate)
    }

    /// `Option`-propagating variant for fields that may be null upstream.
    pub fn usd_to_eur_opt(&self, amount: Option<Decimal>, date: NaiveDate) -> Option<Decimal> {
        self.usd_to_eur(amount?, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn carry_forward_uses_most_recent_prior_rate() {
        let mut t = RateTable::new();
        t.insert(d("2024-01-01"), dec("1.10"));
        t.insert(d("2024-01-10"), dec("1.08"));

        assert_eq!(t.rate(d("2024-01-01")), Some(dec("1.10")));
        assert_eq!(t.rate(d("2024-01-05")), Some(dec("1.10")));
        assert_eq!(t.rate(d("2024-01-10")), Some(dec("1.08")));
        assert_eq!(t.rate(d("2024-03-01")), Some(dec("1.08")));
        assert_eq!(t.rate(d("2023-12-31")), None);
    }

    #[test]
    fn empty_table_resolves_nothing() {
        let t = RateTable::new();
        assert_eq!(t.rate(d("2024-01-01")), None);
        assert_eq!(t.usd_to_eur(dec("100"), d("2024-01-01")), None);
    }

    #[test]
    fn conversion_divides_by_rate() {
        let mut t = RateTable::new();
        t.insert(d("2024-06-03"), dec("1.25"));
        assert_eq!(t.usd_to_eur(dec("125"), d("2024-06-03")), Some(dec("100")));
    }

    #[test]
    fn zero_rate_never_divides() {
        let mut t = RateTable::new();
        t.insert(d("2024-06-03"), Decimal::ZERO);
        assert_eq!(t.usd_to_eur(dec("125"), d("2024-06-03")), None);
    }

    #[test]
    fn round_trip_within_display_tolerance() {
        let mut t = RateTable::new();
        t.insert(d("2024-06-03"), dec("1.0834"));
        let x = dec("1234.56");
        let eur = t.usd_to_eur(x, d("2024-06-03")).unwrap();
        let back = eur * t.rate(d("2024-06-03")).unwrap();
        assert!((back - x).abs() < dec("0.01"));
    }

    #[test]
    fn none_amount_propagates() {
        let mut t = RateTable::new();
        t.insert(d("2024-06-03"), dec("1.10"));
        assert_eq!(t.usd_to_eur_opt(None, d("2024-06-03")), None);
        assert_eq!(
            t.usd_to_eur_opt(Some(dec("11")), d("2024-06-03")),
            Some(dec("10"))
        );
    }
}
