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

//! Purchase-time checks, run before anything is submitted to the portal.

use crate::errors::{DhLotteryError, DhResult};
use crate::types::{BalanceData, BuyHistoryEntry, RESULT_NOT_DRAWN, SelMode, Slot};
use crate::{GAME_PRICE, MAX_GAMES_PER_BUY, WEEKLY_GAME_LIMIT};
use chrono::{DateTime, Datelike, Timelike, Weekday};
use chrono_tz::Tz;

/// Sales resume at 06:00 every day.
const OPEN_HOUR: u32 = 6;
/// Sales stop on the draw day at 20:00, ahead of the evening draw.
const DRAW_DAY: Weekday = Weekday::Sat;
const DRAW_DAY_CLOSE_HOUR: u32 = 20;

/// Checks the portal sales window against the given Seoul-local time.
pub fn check_purchase_window(now: DateTime<Tz>) -> DhResult<()> {
    if now.hour() < OPEN_HOUR {
        return Err(DhLotteryError::PurchaseWindow(
            "매일 6시부터 24시까지 구매 가능",
        ));
    }
    if now.weekday() == DRAW_DAY && now.hour() >= DRAW_DAY_CLOSE_HOUR {
        return Err(DhLotteryError::PurchaseWindow(
            "추첨일 오후 8시부터 다음날(일요일) 오전 6시까지는 판매 정지",
        ));
    }
    Ok(())
}

/// Checks the requested line count and each manual line's number count.
pub fn check_slots(slots: &[Slot]) -> DhResult<()> {
    if slots.is_empty() {
        return Err(DhLotteryError::NoTickets);
    }
    if slots.len() > MAX_GAMES_PER_BUY {
        return Err(DhLotteryError::TooManyTickets);
    }
    for (idx, slot) in slots.iter().enumerate() {
        if slot.mode == SelMode::Manual && slot.numbers.len() > 6 {
            return Err(DhLotteryError::InvalidSelection { game: idx + 1 });
        }
    }
    Ok(())
}

/// Game lines bought this week that are still waiting for their draw.
pub fn unresolved_game_count(entries: &[BuyHistoryEntry]) -> usize {
    entries
        .iter()
        .filter(|entry| entry.result == RESULT_NOT_DRAWN)
        .map(|entry| entry.games.len())
        .sum()
}

/// Lines still allowed this week. Errors only when the quota is already
/// used up; a request larger than the remainder is truncated by the caller.
pub fn remaining_weekly_quota(already_bought: usize) -> DhResult<usize> {
    if already_bought >= WEEKLY_GAME_LIMIT {
        return Err(DhLotteryError::WeeklyLimitExceeded);
    }
    Ok(WEEKLY_GAME_LIMIT - already_bought)
}

/// Checks the deposit against the cost of `count` lines.
pub fn check_balance(count: usize, balance: &BalanceData) -> DhResult<()> {
    let cost = GAME_PRICE * count as u64;
    if cost > balance.purchase_available {
        return Err(DhLotteryError::InsufficientBalance {
            available: balance.purchase_available,
        });
    }
    Ok(())
}
