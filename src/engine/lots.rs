// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

use crate::engine::fx::RateTable;
use crate::models::{AssetCategory, TradeAction, Transaction, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LotSide {
    Long,
    Short,
}

/// Unclosed remainder of one opening trade. Lives only for the duration of
/// a matching pass. `total_cost` holds the opening cash amount pro rata to
/// the remaining quantity: acquisition cost for a long lot, gross proceeds
/// for a short lot.
#[derive(Debug, Clone, Serialize)]
pub struct Lot {
    pub open_date: NaiveDate,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_cost: Decimal,
    pub fees: Decimal,
    pub asset_category: AssetCategory,
}

/// One quantity closed from one lot by one closing transaction. The buy
/// side carries the cost basis (opening trade for longs, closing trade for
/// shorts) and the sell side the proceeds; `gain_loss` is their difference,
/// so `cost_basis + gain_loss == proceeds` holds exactly.
///
/// EUR fields use the respective event dates' own historical rates and are
/// absent when no rate resolves for that date.
#[derive(Debug, Clone, Serialize)]
pub struct LotMatch {
    pub symbol: String,
    pub side: LotSide,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub quantity: Decimal,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub gain_loss: Decimal,
    pub asset_category: AssetCategory,
    pub buy_price_eur: Option<Decimal>,
    pub sell_price_eur: Option<Decimal>,
    pub cost_basis_eur: Option<Decimal>,
    pub proceeds_eur: Option<Decimal>,
    pub gain_loss_eur: Option<Decimal>,
}

impl LotMatch {
    /// Date the position was (partially) closed: the sell for a long lot,
    /// the buy-back for a short lot. Period filters key off this.
    pub fn close_date(&self) -> NaiveDate {
        match self.side {
            LotSide::Long => self.sell_date,
            LotSide::Short => self.buy_date,
        }
    }
}

/// Close quantity that exceeded the cumulative open quantity for a symbol.
/// Non-fatal; the residual is left unmatched.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityWarning {
    pub symbol: String,
    pub date: NaiveDate,
    pub side: LotSide,
    pub unmatched_quantity: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    pub matches: Vec<LotMatch>,
    pub open_long: Vec<Lot>,
    pub open_short: Vec<Lot>,
    pub warnings: Vec<IntegrityWarning>,
}

/// Groups trade transactions by symbol, preserving the chronological stream
/// order inside each group. Input is assumed ascending by date; ties keep
/// their original order.
pub fn group_by_symbol(transactions: &[Transaction]) -> BTreeMap<String, Vec<&Transaction>> {
    let mut by_symbol: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        if let Some(symbol) = tx.symbol.as_deref() {
            let symbol = symbol.trim();
            if !symbol.is_empty() {
                by_symbol.entry(symbol.to_string()).or_default().push(tx);
            }
        }
    }
    by_symbol
}

/// Runs the FIFO matcher over every symbol in the stream.
pub fn match_all(transactions: &[Transaction], rates: &RateTable) -> BTreeMap<String, MatchOutcome> {
    group_by_symbol(transactions)
        .into_iter()
        .map(|(symbol, txs)| {
            let outcome = match_symbol(&symbol, &txs, rates);
            (symbol, outcome)
        })
        .collect()
}

fn is_matchable(tx: &Transaction) -> bool {
    matches!(
        tx.r#type,
        TransactionType::Trade | TransactionType::ReceiveDeliver
    ) && tx.action.is_some()
}

/// FIFO-matches one symbol's chronological transaction stream into realized
/// matches and surviving open lots. Long and short exposure live in two
/// independent queues: `BuyToOpen`/`SellToClose` work the long queue,
/// `SellToOpen`/`BuyToClose` the short queue. Pure function of its input.
pub fn match_symbol(symbol: &str, transactions: &[&Transaction], rates: &RateTable) -> MatchOutcome {
    let mut long: VecDeque<Lot> = VecDeque::new();
    let mut short: VecDeque<Lot> = VecDeque::new();
    let mut out = MatchOutcome::default();

    for tx in transactions {
        if !is_matchable(tx) {
            continue;
        }
        let action = tx.action.clone().unwrap_or(TradeAction::Other(String::new()));
        match action {
            TradeAction::BuyToOpen => long.push_back(open_lot(tx)),
            TradeAction::SellToOpen => short.push_back(open_lot(tx)),
            TradeAction::SellToClose => {
                close_against(symbol, tx, LotSide::Long, &mut long, rates, &mut out);
            }
            TradeAction::BuyToClose => {
                close_against(symbol, tx, LotSide::Short, &mut short, rates, &mut out);
            }
            TradeAction::Other(_) => {}
        }
    }

    out.open_long = long.into_iter().collect();
    out.open_short = short.into_iter().collect();
    out
}

fn open_lot(tx: &Transaction) -> Lot {
    Lot {
        open_date: tx.date,
        quantity: tx.quantity_or_zero().abs(),
        unit_price: tx.price_or_zero().abs(),
        total_cost: tx.total_or_zero().abs(),
        fees: tx.charges(),
        asset_category: tx.asset_category,
    }
}

fn close_against(
    symbol: &str,
    close: &Transaction,
    side: LotSide,
    queue: &mut VecDeque<Lot>,
    rates: &RateTable,
    out: &mut MatchOutcome,
) {
    let close_qty = close.quantity_or_zero().abs();
    if close_qty.is_zero() {
        return;
    }
    let close_total = close.total_or_zero().abs();
    let close_price = close.price_or_zero().abs();
    let close_charges = close.charges();

    let mut remaining = close_qty;
    while remaining > Decimal::ZERO {
        let Some(lot) = queue.front_mut() else {
            break;
        };
        if lot.quantity.is_zero() {
            queue.pop_front();
            continue;
        }

        let matched = if lot.quantity <= remaining {
            lot.quantity
        } else {
            remaining
        };

        // Shares of the lot's opening cash and fees; subtracting the exact
        // shares keeps the queue's totals conserved across partial fills.
        let lot_frac = matched / lot.quantity;
        let lot_amount_share = lot.total_cost * lot_frac;
        let lot_fee_share = lot.fees * lot_frac;
        let close_frac = matched / close_qty;

        let m = match side {
            LotSide::Long => {
                let cost_basis = lot_amount_share + lot_fee_share;
                let proceeds = close_total * close_frac;
                build_match(
                    symbol,
                    side,
                    lot.open_date,
                    close.date,
                    matched,
                    lot.unit_price,
                    close_price,
                    cost_basis,
                    proceeds,
                    lot.asset_category,
                    rates,
                )
            }
            LotSide::Short => {
                // The buy-back is the cost side; its fees load the basis
                // the same way opening fees do for a long.
                let cost_basis = (close_total + close_charges) * close_frac;
                let proceeds = lot_amount_share;
                build_match(
                    symbol,
                    side,
                    close.date,
                    lot.open_date,
                    matched,
                    close_price,
                    lot.unit_price,
                    cost_basis,
                    proceeds,
                    lot.asset_category,
                    rates,
                )
            }
        };
        out.matches.push(m);

        lot.quantity -= matched;
        lot.total_cost -= lot_amount_share;
        lot.fees -= lot_fee_share;
        remaining -= matched;
        if lot.quantity.is_zero() {
            queue.pop_front();
        }
    }

    if remaining > Decimal::ZERO {
        out.warnings.push(IntegrityWarning {
            symbol: symbol.to_string(),
            date: close.date,
            side,
            unmatched_quantity: remaining,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn build_match(
    symbol: &str,
    side: LotSide,
    buy_date: NaiveDate,
    sell_date: NaiveDate,
    quantity: Decimal,
    buy_price: Decimal,
    sell_price: Decimal,
    cost_basis: Decimal,
    proceeds: Decimal,
    asset_category: AssetCategory,
    rates: &RateTable,
) -> LotMatch {
    let cost_basis_eur = rates.usd_to_eur(cost_basis, buy_date);
    let proceeds_eur = rates.usd_to_eur(proceeds, sell_date);
    let gain_loss_eur = match (proceeds_eur, cost_basis_eur) {
        (Some(p), Some(c)) => Some(p - c),
        _ => None,
    };
    LotMatch {
        symbol: symbol.to_string(),
        side,
        buy_date,
        sell_date,
        quantity,
        buy_price,
        sell_price,
        cost_basis,
        proceeds,
        gain_loss: proceeds - cost_basis,
        asset_category,
        buy_price_eur: rates.usd_to_eur(buy_price, buy_date),
        sell_price_eur: rates.usd_to_eur(sell_price, sell_date),
        cost_basis_eur,
        proceeds_eur,
        gain_loss_eur,
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

    fn trade(
        date: &str,
        action: TradeAction,
        qty: &str,
        price: &str,
        total: &str,
        fees: &str,
    ) -> Transaction {
        Transaction {
            id: 0,
            date: d(date),
            r#type: TransactionType::Trade,
            sub_type: None,
            symbol: Some("ABC".into()),
            action: Some(action),
            quantity: Some(dec(qty)),
            average_price: Some(dec(price)),
            total: Some(dec(total)),
            fees: Some(dec(fees)),
            commissions: Some(Decimal::ZERO),
            asset_category: AssetCategory::Stock,
            currency: "USD".into(),
        }
    }

    fn run(txs: &[Transaction]) -> MatchOutcome {
        let refs: Vec<&Transaction> = txs.iter().collect();
        match_symbol("ABC", &refs, &RateTable::new())
    }

    #[test]
    fn full_fifo_close_produces_single_match() {
        // Buy 100 @ $10 ($1000 + $5 fee), sell 100 @ $15 ($1500).
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "100", "10", "-1000", "5"),
            trade("2024-01-05", TradeAction::SellToClose, "100", "15", "1500", "0"),
        ];
        let out = run(&txs);
        assert_eq!(out.matches.len(), 1);
        assert!(out.open_long.is_empty());
        assert!(out.warnings.is_empty());
        let m = &out.matches[0];
        assert_eq!(m.quantity, dec("100"));
        assert_eq!(m.cost_basis, dec("1005"));
        assert_eq!(m.proceeds, dec("1500"));
        assert_eq!(m.gain_loss, dec("495"));
        assert_eq!(m.cost_basis + m.gain_loss, m.proceeds);
    }

    #[test]
    fn partial_close_spans_two_lots_in_order() {
        // Buy 50 @ $10, buy 50 @ $12, sell 70 for $1000 total.
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "50", "10", "-500", "0"),
            trade("2024-01-02", TradeAction::BuyToOpen, "50", "12", "-600", "0"),
            trade("2024-01-03", TradeAction::SellToClose, "70", "20", "1000", "0"),
        ];
        let out = run(&txs);
        assert_eq!(out.matches.len(), 2);

        let first = &out.matches[0];
        assert_eq!(first.buy_date, d("2024-01-01"));
        assert_eq!(first.quantity, dec("50"));
        assert_eq!(first.cost_basis, dec("500"));
        assert!((first.proceeds - dec("714.2857142857142857142857143")).abs() < dec("0.000001"));

        let second = &out.matches[1];
        assert_eq!(second.buy_date, d("2024-01-02"));
        assert_eq!(second.quantity, dec("20"));
        assert_eq!(second.cost_basis, dec("240"));
        assert!((second.proceeds - dec("285.7142857142857142857142857")).abs() < dec("0.000001"));

        let total_gain = first.gain_loss + second.gain_loss;
        assert!((total_gain - dec("260")).abs() < dec("0.000001"));

        // Lot 2 keeps the unsold 30 units with proportional cost.
        assert_eq!(out.open_long.len(), 1);
        let open = &out.open_long[0];
        assert_eq!(open.open_date, d("2024-01-02"));
        assert_eq!(open.quantity, dec("30"));
        assert_eq!(open.total_cost, dec("360"));
    }

    #[test]
    fn small_close_touches_only_oldest_lot() {
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "100", "10", "-1000", "0"),
            trade("2024-01-02", TradeAction::BuyToOpen, "100", "11", "-1100", "0"),
            trade("2024-01-03", TradeAction::SellToClose, "40", "12", "480", "0"),
        ];
        let out = run(&txs);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].buy_date, d("2024-01-01"));
        assert_eq!(out.open_long.len(), 2);
        assert_eq!(out.open_long[0].quantity, dec("60"));
        assert_eq!(out.open_long[0].total_cost, dec("600"));
        assert_eq!(out.open_long[1].quantity, dec("100"));
        assert_eq!(out.open_long[1].total_cost, dec("1100"));
    }

    #[test]
    fn conservation_across_splits() {
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "30", "9", "-270", "3"),
            trade("2024-01-02", TradeAction::BuyToOpen, "70", "10", "-700", "7"),
            trade("2024-02-01", TradeAction::SellToClose, "45", "11", "495", "0"),
            trade("2024-03-01", TradeAction::SellToClose, "55", "12", "660", "0"),
        ];
        let out = run(&txs);
        let qty: Decimal = out.matches.iter().map(|m| m.quantity).sum();
        assert_eq!(qty, dec("100"));
        let cost: Decimal = out.matches.iter().map(|m| m.cost_basis).sum();
        let gain: Decimal = out.matches.iter().map(|m| m.gain_loss).sum();
        let proceeds: Decimal = out.matches.iter().map(|m| m.proceeds).sum();
        assert_eq!(cost + gain, proceeds);
        // Everything bought was matched: full opening cost consumed.
        assert!((cost - dec("980")).abs() < dec("0.000000001"));
        assert!(out.open_long.is_empty());
    }

    #[test]
    fn over_close_leaves_warning_and_residual() {
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "50", "10", "-500", "0"),
            trade("2024-01-05", TradeAction::SellToClose, "80", "11", "880", "0"),
        ];
        let out = run(&txs);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].quantity, dec("50"));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].unmatched_quantity, dec("30"));
        assert_eq!(out.warnings[0].date, d("2024-01-05"));
    }

    #[test]
    fn short_queue_is_independent_of_long_queue() {
        // A written call must not consume the long stock lot.
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "100", "10", "-1000", "0"),
            trade("2024-01-02", TradeAction::SellToOpen, "1", "3", "300", "1"),
            trade("2024-02-01", TradeAction::BuyToClose, "1", "1", "-100", "1"),
        ];
        let out = run(&txs);
        assert_eq!(out.open_long.len(), 1);
        assert_eq!(out.open_long[0].quantity, dec("100"));
        assert!(out.open_short.is_empty());
        assert_eq!(out.matches.len(), 1);
        let m = &out.matches[0];
        assert_eq!(m.side, LotSide::Short);
        assert_eq!(m.proceeds, dec("300"));
        assert_eq!(m.cost_basis, dec("101"));
        assert_eq!(m.gain_loss, dec("199"));
        assert_eq!(m.close_date(), d("2024-02-01"));
    }

    #[test]
    fn idempotent_over_same_input() {
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "50", "10", "-500", "1"),
            trade("2024-01-02", TradeAction::SellToClose, "20", "11", "220", "0"),
        ];
        let a = run(&txs);
        let b = run(&txs);
        assert_eq!(a.matches.len(), b.matches.len());
        assert_eq!(a.matches[0].gain_loss, b.matches[0].gain_loss);
        assert_eq!(a.open_long[0].quantity, b.open_long[0].quantity);
        assert_eq!(a.open_long[0].total_cost, b.open_long[0].total_cost);
    }

    #[test]
    fn eur_fields_absent_without_rates() {
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "10", "10", "-100", "0"),
            trade("2024-01-02", TradeAction::SellToClose, "10", "11", "110", "0"),
        ];
        let out = run(&txs);
        let m = &out.matches[0];
        assert!(m.cost_basis_eur.is_none());
        assert!(m.proceeds_eur.is_none());
        assert!(m.gain_loss_eur.is_none());
    }

    #[test]
    fn eur_fields_use_each_sides_own_rate() {
        let mut rates = RateTable::new();
        rates.insert(d("2024-01-01"), dec("1.25"));
        rates.insert(d("2024-01-02"), dec("1.10"));
        let txs = vec![
            trade("2024-01-01", TradeAction::BuyToOpen, "10", "10", "-100", "0"),
            trade("2024-01-02", TradeAction::SellToClose, "10", "11", "110", "0"),
        ];
        let refs: Vec<&Transaction> = txs.iter().collect();
        let out = match_symbol("ABC", &refs, &rates);
        let m = &out.matches[0];
        assert_eq!(m.cost_basis_eur, Some(dec("80")));
        assert_eq!(m.proceeds_eur, Some(dec("100")));
        assert_eq!(m.gain_loss_eur, Some(dec("20")));
    }
}
