//! TWSE ISIN listing pages.
//!
//! `C_public.jsp?strMode=2` lists main board securities, `strMode=4` the
//! alternate board. Both are a single HTML table whose first cell per row
//! reads "1101　台泥" (code, ideographic space, name). Only 4-character
//! codes (ordinary shares and 4-digit ETFs) are kept.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

use super::{UniverseProvider, UniverseUnavailable};
use crate::data::{Board, InstrumentId};

/// Default ISIN listing host
pub const ISIN_BASE_URL: &str = "https://isin.twse.com.tw";

const LISTING_PATH: &str = "/isin/C_public.jsp";

const CODE_LEN: usize = 4;

fn listing_mode(board: Board) -> &'static str {
    match board {
        Board::Main => "2",
        Board::Alternate => "4",
    }
}

/// Extract instrument identifiers from a listing page, in page order.
///
/// The first table row is the header. The code is the leading ASCII run of
/// the first cell, which also survives a page decoded with the wrong
/// charset.
pub fn parse_listing(html: &str, board: Board) -> Vec<InstrumentId> {
    let document = Html::parse_document(html);
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_sel).next() else {
        return Vec::new();
    };

    table
        .select(&row_sel)
        .skip(1)
        .filter_map(|row| {
            let cell = row.select(&cell_sel).next()?;
            let text: String = cell.text().collect();
            let code: String = text
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            (code.len() == CODE_LEN).then(|| InstrumentId::for_board(&code, board))
        })
        .collect()
}

/// Universe scraped from the ISIN listing pages.
pub struct IsinListingUniverse {
    client: reqwest::Client,
    base_url: String,
    boards: Vec<Board>,
}

impl IsinListingUniverse {
    pub fn new() -> Self {
        Self::with_base_url(ISIN_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            boards: Board::ALL.to_vec(),
        }
    }

    /// Restrict to a subset of boards (order is preserved).
    pub fn with_boards(mut self, boards: Vec<Board>) -> Self {
        self.boards = boards;
        self
    }

    async fn fetch_board(&self, board: Board) -> Result<Vec<InstrumentId>, UniverseUnavailable> {
        let url = format!("{}{}", self.base_url, LISTING_PATH);
        debug!(url = %url, board = ?board, "Fetching ISIN listing");

        let response = self
            .client
            .get(&url)
            .query(&[("strMode", listing_mode(board))])
            .send()
            .await
            .map_err(|e| UniverseUnavailable::Network {
                board,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UniverseUnavailable::Http {
                board,
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| UniverseUnavailable::Network {
            board,
            message: e.to_string(),
        })?;

        let ids = parse_listing(&html, board);
        if ids.is_empty() {
            return Err(UniverseUnavailable::Parse {
                board,
                message: "no 4-character codes found".into(),
            });
        }

        info!(board = ?board, count = ids.len(), "Loaded ISIN listing");
        Ok(ids)
    }
}

impl Default for IsinListingUniverse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UniverseProvider for IsinListingUniverse {
    fn name(&self) -> &'static str {
        "isin"
    }

    async fn list_instruments(&self) -> Result<Vec<InstrumentId>, UniverseUnavailable> {
        let fetches = self.boards.iter().map(|&board| self.fetch_board(board));
        let results = futures::future::join_all(fetches).await;

        let mut ids = Vec::new();
        for result in results {
            ids.extend(result?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MAIN_PAGE: &str = r#"<html><body>
        <table class="h4">
          <tr><td>有價證券代號及名稱</td><td>國際證券辨識號碼(ISIN Code)</td><td>上市日</td></tr>
          <tr><td colspan="7"><b>股票</b></td></tr>
          <tr><td>1101　台泥</td><td>TW0001101004</td><td>1962/02/09</td></tr>
          <tr><td>2330　台積電</td><td>TW0002330008</td><td>1994/09/05</td></tr>
          <tr><td>01001T　土銀富邦R1</td><td>TW00001001T4</td><td>2005/03/10</td></tr>
          <tr><td>0050　元大台灣50</td><td>TW0000050004</td><td>2003/06/30</td></tr>
        </table>
        <table><tr><td>9999　footer</td></tr><tr><td>8888　footer</td></tr></table>
      </body></html>"#;

    const ALT_PAGE: &str = r#"<table>
          <tr><td>有價證券代號及名稱</td></tr>
          <tr><td>股票</td></tr>
          <tr><td>6488　環球晶</td></tr>
        </table>"#;

    #[test]
    fn test_parse_listing_main_board() {
        let ids = parse_listing(MAIN_PAGE, Board::Main);
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["1101.TW", "2330.TW", "0050.TW"]);
    }

    #[test]
    fn test_parse_listing_alternate_board() {
        let ids = parse_listing(ALT_PAGE, Board::Alternate);
        assert_eq!(ids, vec![InstrumentId::from("6488.TWO")]);
    }

    #[test]
    fn test_parse_listing_without_table() {
        assert!(parse_listing("<html><p>maintenance</p></html>", Board::Main).is_empty());
    }

    #[tokio::test]
    async fn test_list_instruments_main_then_alternate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("strMode", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ALT_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("strMode", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MAIN_PAGE))
            .mount(&server)
            .await;

        let universe = IsinListingUniverse::with_base_url(server.uri());
        let ids = universe.list_instruments().await.unwrap();
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["1101.TW", "2330.TW", "0050.TW", "6488.TWO"]);
    }

    #[tokio::test]
    async fn test_list_instruments_board_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("strMode", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MAIN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("strMode", "4"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let universe = IsinListingUniverse::with_base_url(server.uri());
        let err = universe.list_instruments().await.unwrap_err();
        assert_eq!(
            err,
            UniverseUnavailable::Http {
                board: Board::Alternate,
                status: 503
            }
        );
    }

    #[tokio::test]
    async fn test_with_boards_subset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("strMode", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ALT_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let universe =
            IsinListingUniverse::with_base_url(server.uri()).with_boards(vec![Board::Alternate]);
        let ids = universe.list_instruments().await.unwrap();
        assert_eq!(ids.len(), 1);
    }
}
