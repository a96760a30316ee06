// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

use crate::engine::lots::group_by_symbol;
use crate::models::{TradeAction, Transaction, TransactionType};

/// Dividends attributable to shares still held: gross income, source tax
/// withheld, and their difference. Dividends earned on lots that were later
/// sold are not in here; the aggregate dividend report counts those.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolDividends {
    pub gross_dividends: Decimal,
    pub source_tax: Decimal,
    pub net_dividends: Decimal,
}

#[derive(Debug, Clone)]
struct DividendLot {
    quantity: Decimal,
    gross_dividends: Decimal,
    source_tax: Decimal,
}

/// Replays every symbol's chronological stream, crediting each dividend
/// cash event to the long lots open at that instant, pro rata by quantity.
/// Closing trades shrink lots FIFO and take their accrued dividends with
/// the departing shares, so only the surviving shares' dividends remain.
pub fn net_dividends_by_symbol(transactions: &[Transaction]) -> BTreeMap<String, SymbolDividends> {
    let mut result = BTreeMap::new();
    for (symbol, txs) in group_by_symbol(transactions) {
        let totals = allocate_symbol(&txs);
        if !totals.gross_dividends.is_zero() || !totals.source_tax.is_zero() {
            result.insert(symbol, totals);
        }
    }
    result
}

fn allocate_symbol(transactions: &[&Transaction]) -> SymbolDividends {
    let mut lots: VecDeque<DividendLot> = VecDeque::new();

    for tx in transactions {
        if tx.r#type == TransactionType::Trade || tx.r#type == TransactionType::ReceiveDeliver {
            match tx.action {
                Some(TradeAction::BuyToOpen) => {
                    lots.push_back(DividendLot {
                        quantity: tx.quantity_or_zero().abs(),
                        gross_dividends: Decimal::ZERO,
                        source_tax: Decimal::ZERO,
                    });
                }
                Some(TradeAction::SellToClose) => {
                    consume(&mut lots, tx.quantity_or_zero().abs());
                }
                _ => {}
            }
        } else if tx.is_dividend_event() {
            distribute(&mut lots, tx.total_or_zero());
        }
    }

    let mut totals = SymbolDividends::default();
    for lot in &lots {
        totals.gross_dividends += lot.gross_dividends;
        totals.source_tax += lot.source_tax;
    }
    totals.net_dividends = totals.gross_dividends - totals.source_tax;
    totals
}

fn consume(lots: &mut VecDeque<DividendLot>, sold: Decimal) {
    let mut remaining = sold;
    while remaining > Decimal::ZERO {
        let Some(lot) = lots.front_mut() else {
            break;
        };
        if lot.quantity <= remaining {
            remaining -= lot.quantity;
            lots.pop_front();
        } else {
            let retained = (lot.quantity - remaining) / lot.quantity;
            lot.quantity -= remaining;
            lot.gross_dividends *= retained;
            lot.source_tax *= retained;
            remaining = Decimal::ZERO;
        }
    }
}

fn distribute(lots: &mut VecDeque<DividendLot>, value: Decimal) {
    let total_shares: Decimal = lots.iter().map(|l| l.quantity).sum();
    if total_shares.is_zero() {
        return;
    }
    for lot in lots.iter_mut() {
        let share = value * (lot.quantity / total_shares);
        if value > Decimal::ZERO {
            lot.gross_dividends += share;
        } else {
            lot.source_tax += share.abs();
        }
    }
}

/// Convenience wrapper when only the per-symbol net figure is needed.
pub fn net_dividend_for(
    dividends: &BTreeMap<String, SymbolDividends>,
    symbol: &str,
) -> Decimal {
    dividends
        .get(symbol)
        .map(|d| d.net_dividends)
        .unwrap_or(Decimal::ZERO)
}
