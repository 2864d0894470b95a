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

//! Outward contract consumed by host sensor and button entities.

use crate::coordinator::{Lotto645Coordinator, LotteryCoordinator};
use dhlotto_client::{BuyData, DhLotteryError, DhResult, SelMode, Slot};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of a buy request, shaped for host actuators.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BuyResponse {
    Success { value: BuyData, message: String },
    Fail { message: String },
}

/// Refresh and purchase operations of the integration.
#[derive(Debug, Clone)]
pub struct LotteryService {
    lottery: Arc<LotteryCoordinator>,
    lotto: Arc<Lotto645Coordinator>,
}

impl LotteryService {
    pub fn new(lottery: Arc<LotteryCoordinator>, lotto: Arc<Lotto645Coordinator>) -> Self {
        Self { lottery, lotto }
    }

    pub fn lottery(&self) -> &Arc<LotteryCoordinator> {
        &self.lottery
    }

    pub fn lotto_645(&self) -> &Arc<Lotto645Coordinator> {
        &self.lotto
    }

    /// Forces a re-fetch of balance, history and winning numbers.
    pub async fn refresh(&self) {
        self.lottery.clear_refresh().await;
        self.lotto.clear_refresh().await;
    }

    /// Buys up to five games described by textual slot specifications
    /// (`자동`, or `수동`/`반자동` followed by comma-separated numbers).
    ///
    /// Both coordinators are re-synchronized afterward regardless of the
    /// outcome, so a failed attempt never leaves stale quota or balance
    /// data behind.
    pub async fn buy(&self, specs: &[String]) -> BuyResponse {
        let response = match self.execute_buy(specs).await {
            Ok(data) => {
                let message = notification_message(&data);
                info!("🎉 Lotto 6/45 purchase:\n{message}");
                BuyResponse::Success {
                    value: data,
                    message,
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!("Lotto 6/45 purchase failed: {message}");
                BuyResponse::Fail { message }
            }
        };
        self.refresh().await;
        response
    }

    async fn execute_buy(&self, specs: &[String]) -> DhResult<BuyData> {
        let slots = specs
            .iter()
            .map(|spec| parse_slot_spec(spec))
            .collect::<DhResult<Vec<_>>>()?;
        self.lotto.lotto().buy(slots).await
    }
}

/// Parses one slot specification: a selection-mode label, optionally
/// followed by comma-separated numbers. Numbers after `자동` are ignored,
/// as the portal fills that line itself.
pub fn parse_slot_spec(spec: &str) -> DhResult<Slot> {
    let mut parts = spec.split(',').map(str::trim);
    let label = parts.next().unwrap_or_default();
    let mode = SelMode::from_exact_label(label).ok_or_else(|| {
        DhLotteryError::PurchaseFailed(format!("알 수 없는 선택 방식: {label}"))
    })?;
    if mode == SelMode::Auto {
        return Ok(Slot::auto());
    }
    let numbers = parts
        .map(|text| {
            text.parse::<u8>()
                .map_err(|_| DhLotteryError::PurchaseFailed(format!("잘못된 번호: {text}")))
        })
        .collect::<DhResult<Vec<u8>>>()?;
    Ok(Slot::new(mode, numbers))
}

fn notification_message(data: &BuyData) -> String {
    let games = data
        .games
        .iter()
        .map(|game| {
            let numbers = game
                .numbers
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            format!("{} {} {numbers}", game.slot, game.mode)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "제 {}회\n발행일: {}\n바코드: {}\n번호:\n{}",
        data.round, data.issued_at, data.barcode, games
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhlotto_client::Game;

    #[test]
    fn auto_spec_ignores_numbers() {
        let slot = parse_slot_spec("자동").unwrap();
        assert_eq!(slot.mode, SelMode::Auto);
        assert!(slot.numbers.is_empty());

        let slot = parse_slot_spec("자동,1,2,3").unwrap();
        assert!(slot.numbers.is_empty());
    }

    #[test]
    fn manual_and_semi_auto_specs_keep_numbers() {
        let slot = parse_slot_spec("수동,1,2,3,4,5,6").unwrap();
        assert_eq!(slot.mode, SelMode::Manual);
        assert_eq!(slot.numbers, vec![1, 2, 3, 4, 5, 6]);

        let slot = parse_slot_spec("반자동, 7, 21").unwrap();
        assert_eq!(slot.mode, SelMode::SemiAuto);
        assert_eq!(slot.numbers, vec![7, 21]);
    }

    #[test]
    fn seven_number_manual_spec_still_parses() {
        // The count violation is reported by validation at buy time, with
        // the slot's 1-based position.
        let slot = parse_slot_spec("수동,1,2,3,4,5,6,7").unwrap();
        assert_eq!(slot.numbers.len(), 7);
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!(parse_slot_spec("automatic").is_err());
        assert!(parse_slot_spec("").is_err());
    }

    #[test]
    fn bad_number_is_rejected() {
        assert!(parse_slot_spec("수동,1,x").is_err());
    }

    #[test]
    fn notification_lists_every_game() {
        let data = BuyData {
            round: 1122,
            issued_at: "2024/05/28 화 17:55:27".to_owned(),
            barcode: "59865 36399 04155 63917 56431 42167".to_owned(),
            games: vec![
                Game {
                    slot: "A".to_owned(),
                    mode: SelMode::Auto,
                    numbers: vec![9, 12, 30, 33, 35, 43],
                },
                Game {
                    slot: "B".to_owned(),
                    mode: SelMode::Manual,
                    numbers: vec![1, 2, 4, 27, 39, 44],
                },
            ],
        };
        let message = notification_message(&data);
        assert!(message.starts_with("제 1122회"));
        assert!(message.contains("A 자동 9 12 30 33 35 43"));
        assert!(message.contains("B 수동 1 2 4 27 39 44"));
        assert!(message.contains("바코드: 59865 36399 04155 63917 56431 42167"));
    }
}
