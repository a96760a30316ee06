// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Lot-accounting engine: FIFO matching, dividend allocation, historical
//! currency conversion, and the realized/unrealized/aggregate reports built
//! on top of them. Every pass is a pure function of an ordered transaction
//! snapshot; derived lots and matches live only for that pass.

pub mod dividends;
pub mod fx;
pub mod lots;
pub mod realized;
pub mod report;
pub mod unrealized;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid reporting period '{0}', expected a year like 2024 or 'ytd'")]
    InvalidPeriod(String),
}

impl realized::Period {
    /// Parses a CLI/report argument: a four-digit year or the literal
    /// `ytd` (case-insensitive).
    pub fn from_arg(arg: &str) -> Result<Self, EngineError> {
        let arg = arg.trim();
        if arg.eq_ignore_ascii_case("ytd") {
            return Ok(realized::Period::Ytd);
        }
        arg.parse::<i32>()
            .map(realized::Period::Year)
            .map_err(|_| EngineError::InvalidPeriod(arg.to_string()))
    }
}
