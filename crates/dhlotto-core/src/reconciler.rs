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

//! Matches the weekly purchase history against published winning numbers.

use dhlotto_client::{
    DhResult, Game, Lotto645, RESULT_NOT_DRAWN, WEEKLY_GAME_LIMIT, WinningData,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Rank of a game whose round has not been drawn yet.
pub const RANK_UNRESOLVED: i8 = -1;
/// Rank recorded when the portal status is final but carries no win-related
/// text, so no computation is run. Distinct from [`RANK_UNRESOLVED`].
pub const RANK_SKIPPED: i8 = 0;

/// One game line of the weekly history, annotated with its prize rank.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    pub round: u32,
    pub barcode: String,
    pub game: Game,
    pub result: String,
    pub rank: i8,
}

/// History and winning-number reconciler.
///
/// A round's winning numbers never change once drawn, so they are cached
/// per round for the lifetime of this instance. The cache is owned here,
/// not process-global, so separate instances stay isolated.
#[derive(Debug)]
pub struct Reconciler {
    lotto: Lotto645,
    winning_cache: Mutex<HashMap<u32, WinningData>>,
}

impl Reconciler {
    pub fn new(lotto: Lotto645) -> Self {
        Self {
            lotto,
            winning_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Winning numbers of one round, fetched at most once.
    pub async fn winning_numbers(&self, round: u32) -> DhResult<WinningData> {
        if let Some(data) = self.winning_cache.lock().get(&round) {
            debug!("winning numbers for round {round} served from cache");
            return Ok(data.clone());
        }
        let data = self.lotto.winning_numbers(round).await?;
        self.winning_cache.lock().insert(round, data.clone());
        Ok(data)
    }

    /// Drops every cached round.
    pub fn clear(&self) {
        self.winning_cache.lock().clear();
    }

    /// Weekly purchase history flattened to one record per game line,
    /// capped at the weekly purchase limit.
    pub async fn weekly_games(&self) -> DhResult<Vec<GameRecord>> {
        let mut records = Vec::new();
        'entries: for entry in self.lotto.buy_history_this_week().await? {
            for game in &entry.games {
                let rank = self
                    .rank_for(&entry.result, entry.round, &game.numbers)
                    .await?;
                records.push(GameRecord {
                    round: entry.round,
                    barcode: entry.barcode.clone(),
                    game: game.clone(),
                    result: entry.result.clone(),
                    rank,
                });
                if records.len() >= WEEKLY_GAME_LIMIT {
                    break 'entries;
                }
            }
        }
        Ok(records)
    }

    async fn rank_for(&self, result: &str, round: u32, numbers: &[u8]) -> DhResult<i8> {
        if result == RESULT_NOT_DRAWN {
            return Ok(RANK_UNRESOLVED);
        }
        if result.contains("당첨") {
            let winning = self.winning_numbers(round).await?;
            return Ok(calculate_rank(numbers, &winning.numbers, winning.bonus) as i8);
        }
        Ok(RANK_SKIPPED)
    }
}

/// Prize rank of a player's numbers against a round's result: 1 is the
/// jackpot, 6 means no prize. Order of either number list is irrelevant.
pub fn calculate_rank(mine: &[u8], winning: &[u8; 6], bonus: u8) -> u8 {
    let matches = winning.iter().filter(|n| mine.contains(n)).count();
    match matches {
        6 => 1,
        5 if mine.contains(&bonus) => 2,
        5 => 3,
        4 => 4,
        3 => 5,
        _ => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhlotto_client::DhLotteryClient;
    use std::sync::Arc;

    const WINNING: [u8; 6] = [6, 11, 17, 19, 40, 43];
    const BONUS: u8 = 28;

    #[test]
    fn rank_table() {
        assert_eq!(calculate_rank(&[6, 11, 17, 19, 40, 43], &WINNING, BONUS), 1);
        assert_eq!(calculate_rank(&[6, 11, 17, 19, 40, 28], &WINNING, BONUS), 2);
        assert_eq!(calculate_rank(&[6, 11, 17, 19, 40, 1], &WINNING, BONUS), 3);
        assert_eq!(calculate_rank(&[6, 11, 17, 19, 1, 2], &WINNING, BONUS), 4);
        assert_eq!(calculate_rank(&[6, 11, 17, 1, 2, 3], &WINNING, BONUS), 5);
        assert_eq!(calculate_rank(&[6, 11, 1, 2, 3, 4], &WINNING, BONUS), 6);
        assert_eq!(calculate_rank(&[1, 2, 3, 4, 5, 7], &WINNING, BONUS), 6);
    }

    #[test]
    fn rank_is_order_independent() {
        let shuffled = [43, 6, 40, 17, 11, 19];
        assert_eq!(calculate_rank(&shuffled, &WINNING, BONUS), 1);
        let winning_reordered = [43, 40, 19, 17, 11, 6];
        assert_eq!(calculate_rank(&shuffled, &winning_reordered, BONUS), 1);
    }

    fn lotto_for(server: &mockito::Server) -> Lotto645 {
        Lotto645::new(Arc::new(
            DhLotteryClient::new("user", "pw")
                .unwrap()
                .with_base_urls(server.url(), server.url()),
        ))
    }

    #[tokio::test]
    async fn winning_numbers_are_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/common.do?method=getLottoNumber&drwNo=1122")
            .with_status(200)
            .with_body(
                r#"{"returnValue":"success","drwNo":1122,"drwtNo1":6,"drwtNo2":11,"drwtNo3":17,"drwtNo4":19,"drwtNo5":40,"drwtNo6":43,"bnusNo":28,"drwNoDate":"2024-05-25"}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let reconciler = Reconciler::new(lotto_for(&server));
        let first = reconciler.winning_numbers(1122).await.unwrap();
        let second = reconciler.winning_numbers(1122).await.unwrap();

        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cache_clear_forces_a_refetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/common.do?method=getLottoNumber&drwNo=1122")
            .with_status(200)
            .with_body(
                r#"{"returnValue":"success","drwNo":1122,"drwtNo1":6,"drwtNo2":11,"drwtNo3":17,"drwtNo4":19,"drwtNo5":40,"drwtNo6":43,"bnusNo":28,"drwNoDate":"2024-05-25"}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let reconciler = Reconciler::new(lotto_for(&server));
        reconciler.winning_numbers(1122).await.unwrap();
        reconciler.clear();
        reconciler.winning_numbers(1122).await.unwrap();
        mock.assert_async().await;
    }

    fn logged_in(extra: &str) -> String {
        format!(r##"<html><body><a href="#" class="btn_common">로그아웃</a>{extra}</body></html>"##)
    }

    async fn mock_week_with_result(
        server: &mut mockito::Server,
        result: &str,
    ) -> Vec<mockito::Mock> {
        let view = server
            .mock("GET", "/myPage.do?method=lottoBuyListView")
            .with_status(200)
            .with_body(logged_in(""))
            .create_async()
            .await;
        let list = server
            .mock("POST", "/myPage.do?method=lottoBuyList")
            .with_status(200)
            .with_body(format!(
                r#"<table class="tbl_data_col"><tbody><tr>
                    <td>2024-05-28</td><td>로또6/45</td><td>1122</td>
                    <td><a href="javascript:detailPop('51234567', '91234567890');">59865 36399 04155</a></td>
                    <td>1</td><td>{result}</td><td>-</td>
                </tr></tbody></table>"#
            ))
            .create_async()
            .await;
        let receipt = server
            .mock("GET", "/myPage.do")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("method".into(), "lotto645Detail".into()),
                mockito::Matcher::UrlEncoded("orderNo".into(), "51234567".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"<div class="selected"><ul>
                    <li><strong><span>A</span><span>자동</span></strong>
                      <div class="nums">
                        <span><span>6</span></span><span><span>11</span></span>
                        <span><span>17</span></span><span><span>19</span></span>
                        <span><span>40</span></span><span><span>43</span></span>
                      </div></li>
                </ul></div>"#,
            )
            .create_async()
            .await;
        vec![view, list, receipt]
    }

    #[tokio::test]
    async fn undrawn_games_get_the_unresolved_sentinel() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_week_with_result(&mut server, "미추첨").await;

        let reconciler = Reconciler::new(lotto_for(&server));
        let records = reconciler.weekly_games().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rank, RANK_UNRESOLVED);
        assert_eq!(records[0].round, 1122);
    }

    #[tokio::test]
    async fn drawn_without_win_text_skips_computation() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_week_with_result(&mut server, "낙첨").await;

        let reconciler = Reconciler::new(lotto_for(&server));
        let records = reconciler.weekly_games().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rank, RANK_SKIPPED);
    }

    #[tokio::test]
    async fn winning_status_computes_the_rank() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_week_with_result(&mut server, "1등 당첨").await;
        server
            .mock("GET", "/common.do?method=getLottoNumber&drwNo=1122")
            .with_status(200)
            .with_body(
                r#"{"returnValue":"success","drwNo":1122,"drwtNo1":6,"drwtNo2":11,"drwtNo3":17,"drwtNo4":19,"drwtNo5":40,"drwtNo6":43,"bnusNo":28,"drwNoDate":"2024-05-25"}"#,
            )
            .create_async()
            .await;

        let reconciler = Reconciler::new(lotto_for(&server));
        let records = reconciler.weekly_games().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rank, 1);
    }
}
