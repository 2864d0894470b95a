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

//! Polling coordinators refreshing portal snapshots for the host platform.
//!
//! Each coordinator ticks once a minute but only talks to the portal when
//! its data has gone stale, so a failing update leaves the previous
//! snapshot in place.

use crate::reconciler::{GameRecord, Reconciler};
use chrono::{Datelike, Timelike, Utc, Weekday};
use chrono_tz::Asia::Seoul;
use dhlotto_client::{BalanceData, DhLotteryClient, DhResult, Lotto645, WinningData};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tick of the coordinator poll loops.
pub const COORDINATOR_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
/// Staleness threshold of the balance snapshot.
pub const BALANCE_STALE_AFTER: Duration = Duration::from_secs(30 * 60);
/// Staleness threshold of the weekly history snapshot.
pub const HISTORY_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

/// Account-level snapshot for display entities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LotterySnapshot {
    pub balance: Option<BalanceData>,
}

/// Deposit coordinator for the portal account.
#[derive(Debug)]
pub struct LotteryCoordinator {
    client: Arc<DhLotteryClient>,
    snapshot: RwLock<LotterySnapshot>,
    balance_updated: Mutex<Option<Instant>>,
}

impl LotteryCoordinator {
    pub fn new(client: Arc<DhLotteryClient>) -> Self {
        Self {
            client,
            snapshot: RwLock::new(LotterySnapshot::default()),
            balance_updated: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &Arc<DhLotteryClient> {
        &self.client
    }

    pub async fn snapshot(&self) -> LotterySnapshot {
        self.snapshot.read().await.clone()
    }

    /// Refreshes the balance when it has gone stale.
    pub async fn update(&self) -> DhResult<()> {
        let mut updated = self.balance_updated.lock().await;
        let stale = updated.is_none_or(|at| at.elapsed() >= BALANCE_STALE_AFTER);
        if !stale {
            return Ok(());
        }
        debug!("💰 Refreshing deposit balance");
        let balance = self.client.get_balance().await?;
        *updated = Some(Instant::now());
        drop(updated);
        self.snapshot.write().await.balance = Some(balance);
        Ok(())
    }

    /// Drops the staleness stamp and refreshes immediately. A failed
    /// refresh is logged; the previous snapshot stays in place.
    pub async fn clear_refresh(&self) {
        *self.balance_updated.lock().await = None;
        if let Err(e) = self.update().await {
            warn!("⚠️ Balance refresh failed: {e}");
        }
    }

    /// Spawns the poll loop. It runs until the handle is dropped or
    /// aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.update().await {
                    warn!("⚠️ Lottery coordinator update failed: {e}");
                }
                tokio::time::sleep(COORDINATOR_UPDATE_INTERVAL).await;
            }
        })
    }
}

/// Lotto 6/45 snapshot for display entities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Lotto645Snapshot {
    pub latest_winning: Option<WinningData>,
    pub weekly_games: Vec<GameRecord>,
}

/// Winning-number and weekly-history coordinator.
#[derive(Debug)]
pub struct Lotto645Coordinator {
    lotto: Lotto645,
    reconciler: Reconciler,
    snapshot: RwLock<Lotto645Snapshot>,
    history_updated: Mutex<Option<Instant>>,
}

impl Lotto645Coordinator {
    pub fn new(lotto: Lotto645) -> Self {
        Self {
            reconciler: Reconciler::new(lotto.clone()),
            lotto,
            snapshot: RwLock::new(Lotto645Snapshot::default()),
            history_updated: Mutex::new(None),
        }
    }

    pub fn lotto(&self) -> &Lotto645 {
        &self.lotto
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub async fn snapshot(&self) -> Lotto645Snapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn update(&self) -> DhResult<()> {
        if self.should_update_winning().await {
            let round = self.lotto.latest_round_no().await?;
            let winning = self.reconciler.winning_numbers(round).await?;
            debug!("⭐ Latest draw {}: {:?} + {}", winning.round, winning.numbers, winning.bonus);
            self.snapshot.write().await.latest_winning = Some(winning);
        }

        let mut updated = self.history_updated.lock().await;
        let stale = updated.is_none_or(|at| at.elapsed() >= HISTORY_STALE_AFTER);
        if stale {
            let games = self.reconciler.weekly_games().await?;
            *updated = Some(Instant::now());
            drop(updated);
            self.snapshot.write().await.weekly_games = games;
        }
        Ok(())
    }

    /// A fresh draw is published on Saturday evening between 20:40 and
    /// 21:30 Seoul time; outside that window a cached result stays valid
    /// until cleared.
    async fn should_update_winning(&self) -> bool {
        let Some(current) = self.snapshot.read().await.latest_winning.clone() else {
            return true;
        };
        let now = Utc::now().with_timezone(&Seoul);
        if now.weekday() == Weekday::Sat {
            let hm = (now.hour(), now.minute());
            if hm >= (20, 40) && hm <= (21, 30) {
                return now.format("%Y-%m-%d").to_string() != current.draw_date;
            }
        }
        false
    }

    /// Drops all cached state and refreshes immediately. A failed refresh
    /// is logged; the previous weekly games stay in place.
    pub async fn clear_refresh(&self) {
        self.snapshot.write().await.latest_winning = None;
        *self.history_updated.lock().await = None;
        self.reconciler.clear();
        if let Err(e) = self.update().await {
            warn!("⚠️ Lotto 6/45 refresh failed: {e}");
        }
    }

    /// Spawns the poll loop. It runs until the handle is dropped or
    /// aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.update().await {
                    warn!("⚠️ Lotto 6/45 coordinator update failed: {e}");
                }
                tokio::time::sleep(COORDINATOR_UPDATE_INTERVAL).await;
            }
        })
    }
}
