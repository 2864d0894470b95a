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

use crate::errors::{DhLotteryError, DhResult};
use crate::markup;
use crate::types::BalanceData;
use chrono::Utc;
use chrono_tz::Asia::Seoul;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DH_LOTTERY_URL: &str = "https://dhlottery.co.kr";
pub const DH_GAME_URL: &str = "https://ol.dhlottery.co.kr";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.77 Safari/537.36";

/// Anchor class of both the logout link on authenticated pages and the
/// confirm button of the login error page.
const BTN_COMMON: &str = "btn_common";
const LOGOUT_LABEL: &str = "로그아웃";

/// One re-login is attempted when the session cookie has expired.
const SESSION_RETRY_BUDGET: usize = 1;

/// Authenticated session against the DH Lottery portal.
///
/// The session cookie lives in the cookie store of the inner HTTP client;
/// login state transitions and expiry-triggered re-logins are serialized
/// through a session lock so concurrent callers cannot clobber each other's
/// authentication state.
pub struct DhLotteryClient {
    http: reqwest::Client,
    base_url: String,
    game_url: String,
    username: String,
    password: String,
    logged_in: AtomicBool,
    session_lock: Mutex<()>,
}

impl fmt::Debug for DhLotteryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhLotteryClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("logged_in", &self.logged_in.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(header::ORIGIN, HeaderValue::from_static(DH_LOTTERY_URL));
    headers.insert(header::REFERER, HeaderValue::from_static(DH_LOTTERY_URL));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
             image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("ko,en-US;q=0.9,en;q=0.8,ko-KR;q=0.7"),
    );
    headers.insert(
        header::HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert(
        header::HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );
    headers
}

impl DhLotteryClient {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> DhResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .cookie_store(true)
            .default_headers(default_headers())
            .build()
            .map_err(|e| DhLotteryError::Config(format!("HTTP 클라이언트 생성 실패: {e}")))?;

        Ok(Self {
            http,
            base_url: DH_LOTTERY_URL.to_owned(),
            game_url: DH_GAME_URL.to_owned(),
            username: username.into(),
            password: password.into(),
            logged_in: AtomicBool::new(false),
            session_lock: Mutex::new(()),
        })
    }

    /// Points the client at different portal hosts; used by tests against a
    /// local mock server.
    pub fn with_base_urls(mut self, base_url: impl Into<String>, game_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.game_url = game_url.into();
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn game_url(&self) -> &str {
        &self.game_url
    }

    pub(crate) async fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.http.get(url).send().await?.text().await
    }

    pub(crate) async fn post_form_text(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<String, reqwest::Error> {
        self.http.post(url).form(form).send().await?.text().await
    }

    pub(crate) async fn post_empty_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.http.post(url).send().await?.text().await
    }

    /// Logs in to the portal. Safe to call at any time; concurrent session
    /// use is held off until the login finishes.
    pub async fn login(&self) -> DhResult<()> {
        let _guard = self.session_lock.lock().await;
        self.login_locked().await
    }

    async fn login_locked(&self) -> DhResult<()> {
        info!("🔐 Logging in to the lottery portal as {}", self.username);
        let url = format!("{}/userSsl.do?method=login", self.base_url);
        let return_url = format!("{}/common.do?method=main", self.base_url);
        let form = [
            ("returnUrl", return_url),
            ("userId", self.username.clone()),
            ("password", self.password.clone()),
            ("checkSave", "off".to_owned()),
            ("newsEventYn", String::new()),
        ];
        let body = async {
            self.http.post(&url).form(&form).send().await?.text().await
        }
        .await
        .map_err(|e| DhLotteryError::Authentication(format!("로그인을 수행하지 못했습니다: {e}")))?;

        // Only the login error page carries a btn_common confirm anchor.
        if markup::has_anchor_with_class(&body, BTN_COMMON) {
            self.logged_in.store(false, Ordering::SeqCst);
            warn!("❌ Login failed for {}", self.username);
            return Err(DhLotteryError::Authentication(
                "아이디 또는 비밀번호를 확인해주세요. (5회 실패했을 수도 있습니다. \
                 이 경우엔 홈페이지에서 비밀번호를 변경해야 합니다)"
                    .to_owned(),
            ));
        }
        self.logged_in.store(true, Ordering::SeqCst);
        info!("✅ Logged in to the lottery portal");
        Ok(())
    }

    /// Fetches a page that requires an authenticated session.
    ///
    /// A page served without the logout anchor means the session cookie has
    /// expired; one re-login is attempted before giving up. The retry is an
    /// explicit bounded loop, not recursion.
    pub async fn get_with_login(&self, path: &str) -> DhResult<String> {
        let _guard = self.session_lock.lock().await;
        let url = format!("{}/{}", self.base_url, path);
        for attempt in 0..=SESSION_RETRY_BUDGET {
            let body = async { self.http.get(&url).send().await?.text().await }
                .await
                .map_err(|e| {
                    DhLotteryError::Session(format!(
                        "로그인이 필요한 페이지를 가져오지 못했습니다. ({e})"
                    ))
                })?;
            if markup::anchor_with_class_contains(&body, BTN_COMMON, LOGOUT_LABEL) {
                return Ok(body);
            }
            debug!("session expired while fetching {path}, attempt {attempt}");
            if attempt < SESSION_RETRY_BUDGET {
                self.login_locked().await?;
            }
        }
        self.logged_in.store(false, Ordering::SeqCst);
        Err(DhLotteryError::Session(
            "로그인에 실패했습니다. 세션 상태를 확인해주세요.".to_owned(),
        ))
    }

    /// Reads the deposit box of the my-page.
    pub async fn get_balance(&self) -> DhResult<BalanceData> {
        let page = self.get_with_login("userSsl.do?method=myPage").await?;
        parse_balance_page(&page)
            .ok_or_else(|| DhLotteryError::Balance("예치금 항목을 찾지 못했습니다".to_owned()))
    }

    /// Queries the purchase records of the last seven days for one lottery
    /// product and returns the raw result rows. An explicit "no data" cell
    /// yields an empty set.
    pub async fn fetch_buy_list(&self, product_code: &str) -> DhResult<Vec<String>> {
        // The portal only answers the list query after the list view page
        // has been opened in the same session.
        self.get_with_login("myPage.do?method=lottoBuyListView").await?;

        let end = Utc::now().with_timezone(&Seoul);
        let start = end - chrono::Duration::days(7);
        let url = format!("{}/myPage.do?method=lottoBuyList", self.base_url);
        let form = [
            ("nowPage", "1".to_owned()),
            ("searchStartDate", start.format("%Y%m%d").to_string()),
            ("searchEndDate", end.format("%Y%m%d").to_string()),
            ("lottoId", product_code.to_owned()),
            ("winGrade", "2".to_owned()),
            ("calendarStartDt", start.format("%Y-%m-%d").to_string()),
            ("calendarEndDt", end.format("%Y-%m-%d").to_string()),
            ("sortOrder", "DESC".to_owned()),
        ];
        let body = self
            .post_form_text(&url, &form)
            .await
            .map_err(|e| DhLotteryError::History(e.to_string()))?;

        if body.contains("nodata") {
            return Ok(Vec::new());
        }
        let Some(table) = markup::section_from(&body, "tbl_data_col") else {
            return Err(DhLotteryError::History(
                "구매내역 표를 찾지 못했습니다".to_owned(),
            ));
        };
        Ok(markup::table_rows(table))
    }
}

fn parse_balance_page(html: &str) -> Option<BalanceData> {
    let money = markup::section_from(html, "box money")?;
    let total = markup::section_from(money, "total_new")?;
    let deposit = markup::parse_digits(&markup::first_tag_text(total, "strong")?);

    let account = markup::section_from(money, "tbl_total_account_number")?;
    let account = account.find("</table>").map_or(account, |end| &account[..end]);
    let cells = markup::td_texts_with_class(account, "ta_right");
    if cells.len() < 5 {
        return None;
    }
    Some(BalanceData {
        deposit,
        purchase_available: markup::parse_digits(&cells[0]),
        reservation_purchase: markup::parse_digits(&cells[1]),
        withdrawal_request: markup::parse_digits(&cells[2]),
        purchase_impossible: markup::parse_digits(&cells[3]),
        this_month_purchase: markup::parse_digits(&cells[4]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const LOGGED_IN_PAGE: &str =
        r##"<html><body><a href="#" class="btn_common">로그아웃</a>{}</body></html>"##;

    pub(crate) fn logged_in_page(extra: &str) -> String {
        LOGGED_IN_PAGE.replace("{}", extra)
    }

    pub(crate) fn balance_markup() -> String {
        r#"
        <div class="box money">
          <p class="total_new"><strong>5,500원</strong></p>
          <table class="tbl_total_account_number"><tbody>
            <tr><th>구매가능금액</th><td class="ta_right">5,000원</td></tr>
            <tr><th>예약구매금액</th><td class="ta_right">0원</td></tr>
            <tr><th>출금신청중금액</th><td class="ta_right">0원</td></tr>
            <tr><th>구매불가능금액</th><td class="ta_right">500원</td></tr>
            <tr><th>이번달누적구매금액</th><td class="ta_right">3,000원</td></tr>
          </tbody></table>
        </div>"#
            .to_owned()
    }

    #[test]
    fn balance_page_parsing() {
        let page = logged_in_page(&balance_markup());
        let balance = parse_balance_page(&page).unwrap();
        assert_eq!(
            balance,
            BalanceData {
                deposit: 5500,
                purchase_available: 5000,
                reservation_purchase: 0,
                withdrawal_request: 0,
                purchase_impossible: 500,
                this_month_purchase: 3000,
            }
        );
    }

    #[test]
    fn balance_page_without_money_box_is_rejected() {
        assert!(parse_balance_page("<html><body>empty</body></html>").is_none());
    }

    #[tokio::test]
    async fn login_success_sets_state() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/userSsl.do?method=login")
            .with_status(200)
            .with_body("<html><body>main</body></html>")
            .create_async()
            .await;

        let client = DhLotteryClient::new("user", "pw")
            .unwrap()
            .with_base_urls(server.url(), server.url());
        client.login().await.unwrap();

        assert!(client.is_logged_in());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_error_page_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/userSsl.do?method=login")
            .with_status(200)
            .with_body(r#"<html><body><a class="btn_common">확인</a></body></html>"#)
            .create_async()
            .await;

        let client = DhLotteryClient::new("user", "bad-pw")
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let result = client.login().await;

        assert!(matches!(result, Err(DhLotteryError::Authentication(_))));
        assert!(!client.is_logged_in());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_session_relogs_in_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        // The page never shows the logout anchor, so the client re-logs in
        // once and then gives up.
        let page = server
            .mock("GET", "/userSsl.do?method=myPage")
            .with_status(200)
            .with_body("<html><body>로그인</body></html>")
            .expect(2)
            .create_async()
            .await;
        let login = server
            .mock("POST", "/userSsl.do?method=login")
            .with_status(200)
            .with_body("<html><body>main</body></html>")
            .expect(1)
            .create_async()
            .await;

        let client = DhLotteryClient::new("user", "pw")
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let result = client.get_with_login("userSsl.do?method=myPage").await;

        assert!(matches!(result, Err(DhLotteryError::Session(_))));
        page.assert_async().await;
        login.assert_async().await;
    }

    #[tokio::test]
    async fn balance_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let body = logged_in_page(&balance_markup());
        let mock = server
            .mock("GET", "/userSsl.do?method=myPage")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = DhLotteryClient::new("user", "pw")
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let balance = client.get_balance().await.unwrap();

        assert_eq!(balance.purchase_available, 5000);
        assert_eq!(balance.deposit, 5500);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn buy_list_nodata_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let view = server
            .mock("GET", "/myPage.do?method=lottoBuyListView")
            .with_status(200)
            .with_body(logged_in_page(""))
            .create_async()
            .await;
        let list = server
            .mock("POST", "/myPage.do?method=lottoBuyList")
            .with_status(200)
            .with_body(r#"<table class="tbl_data_col"><tbody><tr><td class="nodata">조회 결과가 없습니다.</td></tr></tbody></table>"#)
            .create_async()
            .await;

        let client = DhLotteryClient::new("user", "pw")
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let rows = client.fetch_buy_list("LO40").await.unwrap();

        assert!(rows.is_empty());
        view.assert_async().await;
        list.assert_async().await;
    }
}
