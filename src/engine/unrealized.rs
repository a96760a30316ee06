// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::engine::dividends::{net_dividend_for, SymbolDividends};
use crate::engine::fx::RateTable;
use crate::engine::lots::{match_all, IntegrityWarning};
use crate::models::Transaction;

/// External market quote lookup. Implementations apply their own bounded
/// timeout; `None` means unavailable and the resolution chain falls through.
pub trait PriceSource {
    fn current_price(&self, symbol: &str) -> Option<Decimal>;
}

/// Most recent price previously persisted for a symbol.
pub trait PricePersistence {
    fn last_known(&self, symbol: &str) -> Option<Decimal>;
}

pub const PRICE_CACHE_TTL_SECS: i64 = 300;

/// Short-lived per-symbol quote cache with a fixed TTL. Age is measured
/// against a caller-supplied timestamp so reports are reproducible under an
/// injected clock. Callers share it across requests behind a `Mutex`.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: HashMap<String, (Decimal, DateTime<Utc>)>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str, now: DateTime<Utc>) -> Option<Decimal> {
        let key = symbol.trim().to_uppercase();
        let (price, stored_at) = self.entries.get(&key)?;
        if (now - *stored_at).num_seconds() < PRICE_CACHE_TTL_SECS {
            Some(*price)
        } else {
            None
        }
    }

    pub fn put(&mut self, symbol: &str, price: Decimal, now: DateTime<Utc>) {
        self.entries
            .insert(symbol.trim().to_uppercase(), (price, now));
    }
}

pub type SharedPriceCache = Mutex<PriceCache>;

/// Where a position's current price came from, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceOrigin {
    Live,
    Cached,
    Persisted,
    CostBasis,
}

/// Aggregate remaining long exposure to one symbol, marked to the resolved
/// current price. `adjusted_avg_cost` nets the still-held shares' dividends
/// out of the average cost.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
    pub price_origin: PriceOrigin,
    pub cost_basis: Decimal,
    pub current_value: Decimal,
    pub unrealized_gain_loss: Decimal,
    pub earliest_open_date: NaiveDate,
    pub net_dividends: Decimal,
    pub adjusted_avg_cost: Decimal,
    pub current_value_eur: Option<Decimal>,
    pub unrealized_gain_loss_eur: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnrealizedReport {
    pub total_cost_basis: Decimal,
    pub total_current_value: Decimal,
    pub total_unrealized_gain_loss: Decimal,
    pub total_cost_basis_eur: Option<Decimal>,
    pub total_current_value_eur: Option<Decimal>,
    pub total_unrealized_gain_loss_eur: Option<Decimal>,
    pub positions: Vec<Position>,
    pub warnings: Vec<IntegrityWarning>,
}

/// Everything the valuator needs from its collaborators. `source` is only
/// consulted when `fetch_fresh` is set; a successful fresh quote is written
/// back to the cache under the lock.
pub struct ValuationContext<'a> {
    pub fetch_fresh: bool,
    pub source: &'a dyn PriceSource,
    pub cache: &'a SharedPriceCache,
    pub persistence: &'a dyn PricePersistence,
    pub now: DateTime<Utc>,
}

impl ValuationContext<'_> {
    fn resolve_price(&self, symbol: &str, fallback: Decimal) -> (Decimal, PriceOrigin) {
        if self.fetch_fresh {
            if let Some(price) = self.source.current_price(symbol) {
                let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                cache.put(symbol, price, self.now);
                return (price, PriceOrigin::Live);
            }
        }
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(price) = cache.get(symbol, self.now) {
                return (price, PriceOrigin::Cached);
            }
        }
        if let Some(price) = self.persistence.last_known(symbol) {
            return (price, PriceOrigin::Persisted);
        }
        // Marking to the average cost makes the unrealized figure degrade
        // to exactly zero instead of failing the report.
        (fallback, PriceOrigin::CostBasis)
    }
}

/// Values every symbol with surviving long lots. The open-lot queues come
/// from the same FIFO pass as the realized report, so the two views never
/// disagree about what is still held.
pub fn unrealized_gains_losses(
    transactions: &[Transaction],
    rates: &RateTable,
    dividends: &BTreeMap<String, SymbolDividends>,
    ctx: &ValuationContext<'_>,
) -> UnrealizedReport {
    let mut report = UnrealizedReport::default();
    let today = ctx.now.date_naive();

    for (symbol, outcome) in match_all(transactions, rates) {
        report.warnings.extend(outcome.warnings);
        if outcome.open_long.is_empty() {
            continue;
        }

        let quantity: Decimal = outcome.open_long.iter().map(|l| l.quantity).sum();
        if quantity <= Decimal::ZERO {
            continue;
        }
        let cost_basis: Decimal = outcome
            .open_long
            .iter()
            .map(|l| l.total_cost + l.fees)
            .sum();
        let avg_cost = cost_basis / quantity;
        let earliest_open_date = outcome
            .open_long
            .iter()
            .map(|l| l.open_date)
            .min()
            .unwrap_or(today);

        let (current_price, price_origin) = ctx.resolve_price(&symbol, avg_cost);
        let current_value = quantity * current_price;
        let unrealized = current_value - cost_basis;

        let net_dividends = net_dividend_for(dividends, &symbol);
        let adjusted_avg_cost = avg_cost - net_dividends / quantity;

        report.total_cost_basis += cost_basis;
        report.total_current_value += current_value;
        report.positions.push(Position {
            symbol,
            quantity,
            avg_cost,
            current_price,
            price_origin,
            cost_basis,
            current_value,
            unrealized_gain_loss: unrealized,
            earliest_open_date,
            net_dividends,
            adjusted_avg_cost,
            current_value_eur: rates.usd_to_eur(current_value, today),
            unrealized_gain_loss_eur: rates.usd_to_eur(unrealized, today),
        });
    }

    report.total_unrealized_gain_loss = report.total_current_value - report.total_cost_basis;
    report.total_cost_basis_eur = rates.usd_to_eur(report.total_cost_basis, today);
    report.total_current_value_eur = rates.usd_to_eur(report.total_current_value, today);
    report.total_unrealized_gain_loss_eur =
        rates.usd_to_eur(report.total_unrealized_gain_loss, today);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dividends::net_dividends_by_symbol;
    use crate::models::{AssetCategory, TradeAction, TransactionType};
    use chrono::TimeZone;
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn trade(
        symbol: &str,
        date: &str,
        action: TradeAction,
        qty: &str,
        total: &str,
        fees: &str,
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
            fees: Some(dec(fees)),
            commissions: None,
            asset_category: AssetCategory::Stock,
            currency: "USD".into(),
        }
    }

    struct FixedSource(Option<Decimal>);
    impl PriceSource for FixedSource {
        fn current_price(&self, _symbol: &str) -> Option<Decimal> {
            self.0
        }
    }

    struct FixedPersistence(Option<Decimal>);
    impl PricePersistence for FixedPersistence {
        fn last_known(&self, _symbol: &str) -> Option<Decimal> {
            self.0
        }
    }

    fn ctx<'a>(
        fetch_fresh: bool,
        source: &'a FixedSource,
        cache: &'a SharedPriceCache,
        persistence: &'a FixedPersistence,
    ) -> ValuationContext<'a> {
        ValuationContext {
            fetch_fresh,
            source,
            cache,
            persistence,
            now: now(),
        }
    }

    #[test]
    fn fallback_to_cost_basis_degrades_to_zero() {
        let txs = vec![trade("AAA", "2024-01-01", TradeAction::BuyToOpen, "10", "-100", "0")];
        let source = FixedSource(None);
        let persistence = FixedPersistence(None);
        let cache = SharedPriceCache::default();
        let report = unrealized_gains_losses(
            &txs,
            &RateTable::new(),
            &BTreeMap::new(),
            &ctx(false, &source, &cache, &persistence),
        );
        assert_eq!(report.positions.len(), 1);
        let p = &report.positions[0];
        assert_eq!(p.price_origin, PriceOrigin::CostBasis);
        assert_eq!(p.unrealized_gain_loss, Decimal::ZERO);
        assert_eq!(report.total_unrealized_gain_loss, Decimal::ZERO);
    }

    #[test]
    fn persisted_price_beats_cost_basis() {
        let txs = vec![trade("AAA", "2024-01-01", TradeAction::BuyToOpen, "10", "-100", "0")];
        let source = FixedSource(Some(dec("99")));
        let persistence = FixedPersistence(Some(dec("12")));
        let cache = SharedPriceCache::default();
        // fetch_fresh is off, so the live quote must not be consulted.
        let report = unrealized_gains_losses(
            &txs,
            &RateTable::new(),
            &BTreeMap::new(),
            &ctx(false, &source, &cache, &persistence),
        );
        let p = &report.positions[0];
        assert_eq!(p.price_origin, PriceOrigin::Persisted);
        assert_eq!(p.current_price, dec("12"));
        assert_eq!(p.unrealized_gain_loss, dec("20"));
    }

    #[test]
    fn fresh_fetch_wins_and_populates_cache() {
        let txs = vec![trade("AAA", "2024-01-01", TradeAction::BuyToOpen, "10", "-100", "0")];
        let source = FixedSource(Some(dec("15")));
        let persistence = FixedPersistence(Some(dec("12")));
        let cache = SharedPriceCache::default();
        let report = unrealized_gains_losses(
            &txs,
            &RateTable::new(),
            &BTreeMap::new(),
            &ctx(true, &source, &cache, &persistence),
        );
        assert_eq!(report.positions[0].price_origin, PriceOrigin::Live);
        assert_eq!(report.positions[0].current_value, dec("150"));
        let cached = cache.lock().unwrap().get("AAA", now());
        assert_eq!(cached, Some(dec("15")));
    }

    #[test]
    fn cache_entry_expires_after_ttl() {
        let cache = PriceCache::new();
        let mut cache = cache;
        cache.put("aaa", dec("15"), now());
        let fresh = now() + chrono::Duration::seconds(PRICE_CACHE_TTL_SECS - 1);
        assert_eq!(cache.get("AAA", fresh), Some(dec("15")));
        let stale = now() + chrono::Duration::seconds(PRICE_CACHE_TTL_SECS);
        assert_eq!(cache.get("AAA", stale), None);
    }

    #[test]
    fn failed_fresh_fetch_falls_through_to_cache() {
        let txs = vec![trade("AAA", "2024-01-01", TradeAction::BuyToOpen, "10", "-100", "0")];
        let source = FixedSource(None);
        let persistence = FixedPersistence(None);
        let cache = SharedPriceCache::default();
        cache.lock().unwrap().put("AAA", dec("14"), now());
        let report = unrealized_gains_losses(
            &txs,
            &RateTable::new(),
            &BTreeMap::new(),
            &ctx(true, &source, &cache, &persistence),
        );
        assert_eq!(report.positions[0].price_origin, PriceOrigin::Cached);
        assert_eq!(report.positions[0].current_price, dec("14"));
    }

    #[test]
    fn dividend_adjusted_cost_reflects_surviving_allocation() {
        // Scenario: buy 100 @ $10, $50 dividend, sell 40. The 60 held
        // shares keep $30 of dividends.
        let txs = vec![
            trade("AAA", "2024-01-01", TradeAction::BuyToOpen, "100", "-1000", "0"),
            Transaction {
                id: 0,
                date: d("2024-01-02"),
                r#type: TransactionType::MoneyMovement,
                sub_type: Some("Dividend".into()),
                symbol: Some("AAA".into()),
                action: None,
                quantity: None,
                average_price: None,
                total: Some(dec("50")),
                fees: None,
                commissions: None,
                asset_category: AssetCategory::Stock,
                currency: "USD".into(),
            },
            trade("AAA", "2024-01-03", TradeAction::SellToClose, "40", "600", "0"),
        ];
        let dividends = net_dividends_by_symbol(&txs);
        let source = FixedSource(None);
        let persistence = FixedPersistence(None);
        let cache = SharedPriceCache::default();
        let report = unrealized_gains_losses(
            &txs,
            &RateTable::new(),
            &dividends,
            &ctx(false, &source, &cache, &persistence),
        );
        let p = &report.positions[0];
        assert_eq!(p.quantity, dec("60"));
        assert_eq!(p.cost_basis, dec("600"));
        assert_eq!(p.net_dividends, dec("30"));
        assert_eq!(p.avg_cost, dec("10"));
        assert_eq!(p.adjusted_avg_cost, dec("9.5"));
        assert_eq!(p.earliest_open_date, d("2024-01-01"));
    }

    #[test]
    fn fully_closed_symbols_produce_no_position() {
        let txs = vec![
            trade("AAA", "2024-01-01", TradeAction::BuyToOpen, "10", "-100", "0"),
            trade("AAA", "2024-02-01", TradeAction::SellToClose, "10", "120", "0"),
        ];
        let source = FixedSource(None);
        let persistence = FixedPersistence(None);
        let cache = SharedPriceCache::default();
        let report = unrealized_gains_losses(
            &txs,
            &RateTable::new(),
            &BTreeMap::new(),
            &ctx(false, &source, &cache, &persistence),
        );
        assert!(report.positions.is_empty());
    }
}
