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

//! Lotto 6/45 operations layered over the shared portal session: round and
//! winning-number lookups, the purchase protocol, and the weekly purchase
//! history with its receipt details.

use crate::client::DhLotteryClient;
use crate::errors::{DhLotteryError, DhResult};
use crate::markup;
use crate::types::{BuyData, BuyHistoryEntry, Game, SelMode, Slot, WinningData};
use crate::{GAME_PRICE, LOTTO645_PRODUCT_CODE, SLOT_LETTERS, WEEKLY_GAME_LIMIT};
use crate::validate;
use chrono::{DateTime, Utc};
use chrono_tz::Asia::Seoul;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Result code the purchase endpoint returns on success.
const EXEC_BUY_SUCCESS: &str = "100";

/// Form fields of the purchase endpoint, keyed symbolically so the wire
/// names live in one table.
#[derive(Debug, Clone, Copy)]
enum PurchaseField {
    Round,
    ReadyToken,
    Amount,
    Tickets,
    GameCount,
}

impl PurchaseField {
    const fn wire_name(self) -> &'static str {
        match self {
            PurchaseField::Round => "round",
            PurchaseField::ReadyToken => "direct",
            PurchaseField::Amount => "nBuyAmount",
            PurchaseField::Tickets => "param",
            PurchaseField::GameCount => "gameCnt",
        }
    }
}

#[derive(Debug, Serialize)]
struct TicketParam {
    #[serde(rename = "genType")]
    gen_type: &'static str,
    #[serde(rename = "arrGameChoiceNum")]
    numbers: Option<String>,
    #[serde(rename = "alpabet")]
    slot: char,
}

#[derive(Debug, Deserialize)]
struct ReadySocket {
    ready_ip: String,
}

#[derive(Debug, Deserialize)]
struct ExecBuyResponse {
    result: ExecBuyResult,
}

/// Purchase confirmation payload. Everything except the result code is
/// absent on rejection responses.
#[derive(Debug, Deserialize)]
struct ExecBuyResult {
    #[serde(rename = "resultCode")]
    result_code: String,
    #[serde(rename = "resultMsg", default)]
    result_msg: String,
    #[serde(rename = "buyRound", default)]
    buy_round: String,
    #[serde(rename = "issueTime", default)]
    issue_time: String,
    #[serde(rename = "issueDay", default)]
    issue_day: String,
    #[serde(rename = "weekDay", default)]
    week_day: String,
    #[serde(rename = "barCode1", default)]
    bar_code1: String,
    #[serde(rename = "barCode2", default)]
    bar_code2: String,
    #[serde(rename = "barCode3", default)]
    bar_code3: String,
    #[serde(rename = "barCode4", default)]
    bar_code4: String,
    #[serde(rename = "barCode5", default)]
    bar_code5: String,
    #[serde(rename = "barCode6", default)]
    bar_code6: String,
    #[serde(rename = "arrGameChoiceNum", default)]
    games: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LottoNumberResponse {
    #[serde(rename = "returnValue")]
    return_value: String,
    #[serde(rename = "drwNo", default)]
    round: u32,
    #[serde(rename = "drwtNo1", default)]
    no1: u8,
    #[serde(rename = "drwtNo2", default)]
    no2: u8,
    #[serde(rename = "drwtNo3", default)]
    no3: u8,
    #[serde(rename = "drwtNo4", default)]
    no4: u8,
    #[serde(rename = "drwtNo5", default)]
    no5: u8,
    #[serde(rename = "drwtNo6", default)]
    no6: u8,
    #[serde(rename = "bnusNo", default)]
    bonus: u8,
    #[serde(rename = "drwNoDate", default)]
    draw_date: String,
}

/// Lotto 6/45 client sharing one authenticated portal session.
#[derive(Debug, Clone)]
pub struct Lotto645 {
    client: Arc<DhLotteryClient>,
}

impl Lotto645 {
    pub fn new(client: Arc<DhLotteryClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<DhLotteryClient> {
        &self.client
    }

    /// Round number currently advertised on the portal landing page.
    pub async fn latest_round_no(&self) -> DhResult<u32> {
        let url = format!("{}/common.do?method=main", self.client.base_url());
        let body = self
            .client
            .get_text(&url)
            .await
            .map_err(|_| DhLotteryError::RoundLookup)?;
        markup::element_text_by_id(&body, "lottoDrwNo")
            .and_then(|text| text.parse().ok())
            .ok_or(DhLotteryError::RoundLookup)
    }

    /// Official result of one drawing round.
    pub async fn winning_numbers(&self, round: u32) -> DhResult<WinningData> {
        let url = format!(
            "{}/common.do?method=getLottoNumber&drwNo={round}",
            self.client.base_url()
        );
        // Served as text/html although the body is JSON.
        let body = self
            .client
            .get_text(&url)
            .await
            .map_err(|_| DhLotteryError::WinningNumbers { round })?;
        let parsed: LottoNumberResponse = serde_json::from_str(&body)
            .map_err(|_| DhLotteryError::WinningNumbers { round })?;
        if parsed.return_value != "success" {
            return Err(DhLotteryError::WinningNumbers { round });
        }
        Ok(WinningData {
            round: parsed.round,
            numbers: [
                parsed.no1, parsed.no2, parsed.no3, parsed.no4, parsed.no5, parsed.no6,
            ],
            bonus: parsed.bonus,
            draw_date: parsed.draw_date,
        })
    }

    /// Buys up to five game lines for the upcoming round.
    ///
    /// The request is validated (sales window, line counts, weekly quota,
    /// deposit) before anything is submitted; a request exceeding the
    /// remaining weekly quota is silently truncated to it.
    pub async fn buy(&self, slots: Vec<Slot>) -> DhResult<BuyData> {
        self.buy_at(slots, Utc::now().with_timezone(&Seoul)).await
    }

    /// Purchase entry point with an injected clock so the sales-window
    /// check stays testable; `buy` passes the current Seoul time.
    pub async fn buy_at(&self, mut slots: Vec<Slot>, now: DateTime<Tz>) -> DhResult<BuyData> {
        for slot in &mut slots {
            slot.dedupe();
        }
        debug!("🎫 Buy request: {} slot(s)", slots.len());

        validate::check_purchase_window(now)?;
        validate::check_slots(&slots)?;

        let history = self.buy_history_this_week().await?;
        let already = validate::unresolved_game_count(&history);
        let quota = validate::remaining_weekly_quota(already)?;
        debug!("Remaining weekly quota: {quota}");

        let balance = self.client.get_balance().await?;
        let buy_count = slots.len().min(quota);
        validate::check_balance(buy_count, &balance)?;
        slots.truncate(buy_count);

        let round = self.latest_round_no().await? + 1;
        let ready = self.ready_token().await?;
        let tickets = encode_slots(&slots)?;
        let amount = GAME_PRICE * buy_count as u64;

        let url = format!("{}/olotto/game/execBuy.do", self.client.game_url());
        let form = [
            (PurchaseField::Round.wire_name(), round.to_string()),
            (PurchaseField::ReadyToken.wire_name(), ready),
            (PurchaseField::Amount.wire_name(), amount.to_string()),
            (PurchaseField::Tickets.wire_name(), tickets),
            (PurchaseField::GameCount.wire_name(), buy_count.to_string()),
        ];
        let body = self
            .client
            .post_form_text(&url, &form)
            .await
            .map_err(|e| DhLotteryError::PurchaseFailed(e.to_string()))?;
        let confirm: ExecBuyResponse = serde_json::from_str(&body)
            .map_err(|e| DhLotteryError::PurchaseFailed(e.to_string()))?;
        if confirm.result.result_code != EXEC_BUY_SUCCESS {
            return Err(DhLotteryError::PurchaseRejected(confirm.result.result_msg));
        }
        let data = parse_buy_data(confirm.result)?;
        info!(
            "✅ Bought round {}: {} game(s), barcode {}",
            data.round,
            data.games.len(),
            data.barcode
        );
        Ok(data)
    }

    /// Purchase records of the last seven days, each with the per-slot
    /// games read from its receipt page. Stops once five game lines have
    /// been collected; the portal does not sell more per week.
    pub async fn buy_history_this_week(&self) -> DhResult<Vec<BuyHistoryEntry>> {
        let rows = self.client.fetch_buy_list(LOTTO645_PRODUCT_CODE).await?;
        let mut entries: Vec<BuyHistoryEntry> = Vec::new();
        let mut total_games = 0usize;
        for row in rows {
            let cells = markup::table_cells(&row);
            if cells.len() < 6 {
                continue;
            }
            let Some((order_no, barcode)) = markup::receipt_link(&cells[3]) else {
                continue;
            };
            let games = self.fetch_receipt(&order_no, &barcode).await?;
            total_games += games.len();
            entries.push(BuyHistoryEntry {
                round: u32::try_from(markup::parse_digits(&markup::strip_tags(&cells[2])))
                    .unwrap_or(0),
                barcode: markup::strip_tags(&cells[3]),
                result: markup::strip_tags(&cells[5]),
                games,
            });
            if total_games >= WEEKLY_GAME_LIMIT {
                break;
            }
        }
        Ok(entries)
    }

    async fn fetch_receipt(&self, order_no: &str, barcode: &str) -> DhResult<Vec<Game>> {
        let url = format!(
            "{}/myPage.do?method=lotto645Detail&orderNo={order_no}&barcode={barcode}&issueNo=1",
            self.client.base_url()
        );
        let body = self
            .client
            .get_text(&url)
            .await
            .map_err(|e| DhLotteryError::History(e.to_string()))?;
        parse_receipt(&body)
            .ok_or_else(|| DhLotteryError::History("영수증을 해석하지 못했습니다".to_owned()))
    }

    /// One-time token the purchase endpoint requires from the
    /// session-initiation call.
    async fn ready_token(&self) -> DhResult<String> {
        let url = format!(
            "{}/olotto/game/egovUserReadySocket.json",
            self.client.game_url()
        );
        let body = self
            .client
            .post_empty_text(&url)
            .await
            .map_err(|e| DhLotteryError::PurchaseFailed(e.to_string()))?;
        let ready: ReadySocket = serde_json::from_str(&body)
            .map_err(|e| DhLotteryError::PurchaseFailed(e.to_string()))?;
        Ok(ready.ready_ip)
    }
}

/// Wire encoding of the requested lines, one object per slot letter.
fn encode_slots(slots: &[Slot]) -> DhResult<String> {
    let tickets: Vec<TicketParam> = slots
        .iter()
        .zip(SLOT_LETTERS)
        .map(|(slot, letter)| TicketParam {
            gen_type: slot.effective_mode().gen_type(),
            numbers: match slot.mode {
                SelMode::Auto => None,
                SelMode::Manual | SelMode::SemiAuto => {
                    let mut numbers = slot.numbers.clone();
                    numbers.sort_unstable();
                    Some(
                        numbers
                            .iter()
                            .map(u8::to_string)
                            .collect::<Vec<_>>()
                            .join(","),
                    )
                }
            },
            slot: letter,
        })
        .collect();
    serde_json::to_string(&tickets).map_err(|e| DhLotteryError::PurchaseFailed(e.to_string()))
}

fn parse_buy_data(result: ExecBuyResult) -> DhResult<BuyData> {
    let round = result
        .buy_round
        .parse::<u32>()
        .map_err(|e| DhLotteryError::PurchaseFailed(format!("buyRound: {e}")))?;
    let games = result
        .games
        .iter()
        .map(|entry| decode_confirmation(entry))
        .collect::<DhResult<Vec<_>>>()?;
    Ok(BuyData {
        round,
        issued_at: format!(
            "{} {} {}",
            result.issue_day, result.week_day, result.issue_time
        ),
        barcode: format!(
            "{} {} {} {} {} {}",
            result.bar_code1,
            result.bar_code2,
            result.bar_code3,
            result.bar_code4,
            result.bar_code5,
            result.bar_code6
        ),
        games,
    })
}

/// Decodes one `"<slot>|<n1>|…|<n6>|<modeCode>"` confirmation string. The
/// mode code is the single character trailing the last number.
fn decode_confirmation(entry: &str) -> DhResult<Game> {
    let malformed = || DhLotteryError::PurchaseFailed(format!("게임 문자열을 해석하지 못했습니다: {entry}"));
    if !entry.is_ascii() || entry.len() < 4 {
        return Err(malformed());
    }
    let (head, code) = entry.split_at(entry.len() - 1);
    let mode = SelMode::from_code(code).ok_or_else(malformed)?;
    let (slot, numbers_part) = head.split_once('|').ok_or_else(malformed)?;
    if slot.len() != 1 {
        return Err(malformed());
    }
    let numbers = numbers_part
        .split('|')
        .map(|n| n.parse::<u8>().map_err(|_| malformed()))
        .collect::<DhResult<Vec<u8>>>()?;
    Ok(Game {
        slot: slot.to_owned(),
        mode,
        numbers,
    })
}

fn parse_receipt(html: &str) -> Option<Vec<Game>> {
    let section = markup::section_from(html, "class=\"selected\"")?;
    let mut games = Vec::new();
    for item in markup::list_items(section) {
        let texts = markup::span_texts(&item);
        if texts.len() < 2 {
            continue;
        }
        let mode = SelMode::from_label(&texts[1])?;
        let numbers = texts[2..]
            .iter()
            .filter_map(|text| text.parse::<u8>().ok())
            .collect();
        games.push(Game {
            slot: texts[0].clone(),
            mode,
            numbers,
        });
    }
    Some(games)
}
