/*
[INPUT]:  Product codes and paging parameters
[OUTPUT]: Market data (markets, board, ticker, executions, exchange status)
[POS]:    HTTP layer - public market data endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use reqwest::Method;

use crate::http::{BitflyerClient, Result};
use crate::types::{
    Board, BoardState, Chat, ChatsQuery, Execution, ExecutionsQuery, Health, Market, Pagination,
    ProductCode, ProductQuery, Ticker,
};

impl BitflyerClient {
    /// List tradable markets
    ///
    /// GET /v1/getmarkets
    pub async fn get_markets(&self) -> Result<Vec<Market>> {
        let builder = self.request(Method::GET, "/v1/getmarkets")?;
        self.send_json(builder).await
    }

    /// Full order book snapshot
    ///
    /// GET /v1/getboard?product_code={product_code}
    pub async fn get_board(&self, product_code: &ProductCode) -> Result<Board> {
        let builder = self
            .request(Method::GET, "/v1/getboard")?
            .query(&ProductQuery { product_code });
        self.send_json(builder).await
    }

    /// GET /v1/getticker?product_code={product_code}
    pub async fn get_ticker(&self, product_code: &ProductCode) -> Result<Ticker> {
        let builder = self
            .request(Method::GET, "/v1/getticker")?
            .query(&ProductQuery { product_code });
        self.send_json(builder).await
    }

    /// Recent executions, newest first
    ///
    /// GET /v1/getexecutions?product_code={product_code}&count=&before=&after=
    pub async fn get_executions(
        &self,
        product_code: &ProductCode,
        pagination: Pagination,
    ) -> Result<Vec<Execution>> {
        let builder = self
            .request(Method::GET, "/v1/getexecutions")?
            .query(&ExecutionsQuery {
                product_code,
                pagination,
            });
        self.send_json(builder).await
    }

    /// GET /v1/getboardstate?product_code={product_code}
    pub async fn get_board_state(&self, product_code: &ProductCode) -> Result<BoardState> {
        let builder = self
            .request(Method::GET, "/v1/getboardstate")?
            .query(&ProductQuery { product_code });
        self.send_json(builder).await
    }

    /// GET /v1/gethealth?product_code={product_code}
    pub async fn get_health(&self, product_code: &ProductCode) -> Result<Health> {
        let builder = self
            .request(Method::GET, "/v1/gethealth")?
            .query(&ProductQuery { product_code });
        self.send_json(builder).await
    }

    /// Public chat log, from `from_date` (e.g. `2024-01-01`) or the last five days
    ///
    /// GET /v1/getchats?from_date={from_date}
    pub async fn get_chats(&self, from_date: Option<&str>) -> Result<Vec<Chat>> {
        let builder = self
            .request(Method::GET, "/v1/getchats")?
            .query(&ChatsQuery { from_date });
        self.send_json(builder).await
    }
}
