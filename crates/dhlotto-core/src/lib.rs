// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of DhLotto.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Coordinators and the outward service contract: periodic snapshot
//! refreshes of balance, winning numbers and weekly history, plus the
//! refresh/buy operations exposed to the host platform.

pub mod coordinator;
pub mod reconciler;
pub mod service;

pub use coordinator::{
    COORDINATOR_UPDATE_INTERVAL, Lotto645Coordinator, Lotto645Snapshot, LotteryCoordinator,
    LotterySnapshot,
};
pub use reconciler::{GameRecord, RANK_SKIPPED, RANK_UNRESOLVED, Reconciler, calculate_rank};
pub use service::{BuyResponse, LotteryService, parse_slot_spec};
