// Copyright (c) 2025 Taxlot Developers.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod exporter;
pub mod importer;
pub mod portfolio;
pub mod prices;
pub mod rates;
pub mod tax;
pub mod transactions;
