// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Trade,
    MoneyMovement,
    ReceiveDeliver,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Trade => "Trade",
            TransactionType::MoneyMovement => "Money Movement",
            TransactionType::ReceiveDeliver => "Receive Deliver",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Trade" => Some(TransactionType::Trade),
            "Money Movement" => Some(TransactionType::MoneyMovement),
            "Receive Deliver" => Some(TransactionType::ReceiveDeliver),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    BuyToOpen,
    BuyToClose,
    SellToOpen,
    SellToClose,
    Other(String),
}

impl TradeAction {
    pub fn as_str(&self) -> &str {
        match self {
            TradeAction::BuyToOpen => "BUY_TO_OPEN",
            TradeAction::BuyToClose => "BUY_TO_CLOSE",
            TradeAction::SellToOpen => "SELL_TO_OPEN",
            TradeAction::SellToClose => "SELL_TO_CLOSE",
            TradeAction::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "BUY_TO_OPEN" => TradeAction::BuyToOpen,
            "BUY_TO_CLOSE" => TradeAction::BuyToClose,
            "SELL_TO_OPEN" => TradeAction::SellToOpen,
            "SELL_TO_CLOSE" => TradeAction::SellToClose,
            other => TradeAction::Other(other.to_string()),
        }
    }
}

/// Tax bucket for a symbol. German-style reporting splits stock earnings
/// from option earnings; ETFs and unclassified symbols report under "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetCategory {
    Stock,
    Option,
    Etf,
    Unknown,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Stock => "Stock",
            AssetCategory::Option => "Option",
            AssetCategory::Etf => "ETF",
            AssetCategory::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "Stock" => AssetCategory::Stock,
            "Option" => AssetCategory::Option,
            "ETF" => AssetCategory::Etf,
            _ => AssetCategory::Unknown,
        }
    }
}

/// One immutable brokerage record. All monetary fields are USD; EUR is a
/// reporting overlay derived from the historical rate table. Nullable
/// numeric fields coerce to zero at the engine boundary rather than being
/// rejected here; row-level validation belongs to the importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub r#type: TransactionType,
    pub sub_type: Option<String>,
    pub symbol: Option<String>,
    pub action: Option<TradeAction>,
    pub quantity: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub total: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub commissions: Option<Decimal>,
    pub asset_category: AssetCategory,
    pub currency: String,
}

impl Transaction {
    pub fn quantity_or_zero(&self) -> Decimal {
        self.quantity.unwrap_or(Decimal::ZERO)
    }

    pub fn price_or_zero(&self) -> Decimal {
        self.average_price.unwrap_or(Decimal::ZERO)
    }

    pub fn total_or_zero(&self) -> Decimal {
        self.total.unwrap_or(Decimal::ZERO)
    }

    /// Fees and commissions combined, as a positive charge.
    pub fn charges(&self) -> Decimal {
        self.fees.unwrap_or(Decimal::ZERO).abs() + self.commissions.unwrap_or(Decimal::ZERO).abs()
    }

    pub fn is_dividend_event(&self) -> bool {
        self.r#type == TransactionType::MoneyMovement
            && self.sub_type.as_deref().map(str::trim) == Some("Dividend")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub date: NaiveDate,
    /// 1 EUR = rate USD.
    pub usd_to_eur_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPrice {
    pub symbol: String,
    pub price: Decimal,
    pub as_of: String,
    pub source: String,
}
