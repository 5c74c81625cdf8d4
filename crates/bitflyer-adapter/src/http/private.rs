/*
[INPUT]:  Signed requests built from order and query parameters
[OUTPUT]: Account state, order acknowledgements and order listings
[POS]:    HTTP layer - private endpoints (require ACCESS-* signature headers)
[UPDATE]: When adding new private endpoints or changing order flow
*/

use reqwest::Method;

use crate::http::{BitflyerClient, Result};
use crate::types::{
    Balance, BalanceHistory, BalanceHistoryQuery, CancelAllChildOrdersRequest,
    CancelChildOrderRequest, CancelParentOrderRequest, ChildOrder, Collateral, CollateralAccount,
    CollateralHistory, CurrencyCode, GetChildOrdersRequest, GetMyExecutionsRequest,
    GetParentOrderRequest, GetParentOrdersRequest, MyExecution, Pagination, ParentOrder,
    ParentOrderDetail, Position, ProductCode, ProductQuery, SendChildOrderRequest,
    SendChildOrderResponse, SendParentOrderRequest, SendParentOrderResponse, TradingCommission,
};

impl BitflyerClient {
    /// Endpoints the API key may call
    ///
    /// GET /v1/me/getpermissions
    pub async fn get_permissions(&self) -> Result<Vec<String>> {
        let builder = self.request(Method::GET, "/v1/me/getpermissions")?;
        self.send_signed_json(builder).await
    }

    /// GET /v1/me/getbalance
    pub async fn get_balance(&self) -> Result<Vec<Balance>> {
        let builder = self.request(Method::GET, "/v1/me/getbalance")?;
        self.send_signed_json(builder).await
    }

    /// GET /v1/me/getcollateral
    pub async fn get_collateral(&self) -> Result<Collateral> {
        let builder = self.request(Method::GET, "/v1/me/getcollateral")?;
        self.send_signed_json(builder).await
    }

    /// Open positions for a margin product
    ///
    /// GET /v1/me/getpositions?product_code={product_code}
    pub async fn get_positions(&self, product_code: &ProductCode) -> Result<Vec<Position>> {
        let builder = self
            .request(Method::GET, "/v1/me/getpositions")?
            .query(&ProductQuery { product_code });
        self.send_signed_json(builder).await
    }

    /// Place a child order
    ///
    /// POST /v1/me/sendchildorder
    pub async fn send_child_order(
        &self,
        req: &SendChildOrderRequest,
    ) -> Result<SendChildOrderResponse> {
        let builder = self.request(Method::POST, "/v1/me/sendchildorder")?.json(req);
        self.send_signed_json(builder).await
    }

    /// Cancel one child order
    ///
    /// POST /v1/me/cancelchildorder
    pub async fn cancel_child_order(&self, req: &CancelChildOrderRequest) -> Result<()> {
        let builder = self.request(Method::POST, "/v1/me/cancelchildorder")?.json(req);
        self.send_signed_empty(builder).await
    }

    /// Cancel every open child order for a product
    ///
    /// POST /v1/me/cancelallchildorders
    pub async fn cancel_all_child_orders(&self, product_code: &ProductCode) -> Result<()> {
        let req = CancelAllChildOrdersRequest {
            product_code: product_code.clone(),
        };
        let builder = self
            .request(Method::POST, "/v1/me/cancelallchildorders")?
            .json(&req);
        self.send_signed_empty(builder).await
    }

    /// GET /v1/me/getchildorders
    pub async fn get_child_orders(&self, req: &GetChildOrdersRequest) -> Result<Vec<ChildOrder>> {
        let builder = self.request(Method::GET, "/v1/me/getchildorders")?.query(req);
        self.send_signed_json(builder).await
    }

    /// Place a special order (IFD, OCO, IFDOCO or a single conditional leg)
    ///
    /// POST /v1/me/sendparentorder
    pub async fn send_parent_order(
        &self,
        req: &SendParentOrderRequest,
    ) -> Result<SendParentOrderResponse> {
        let builder = self.request(Method::POST, "/v1/me/sendparentorder")?.json(req);
        self.send_signed_json(builder).await
    }

    /// POST /v1/me/cancelparentorder
    pub async fn cancel_parent_order(&self, req: &CancelParentOrderRequest) -> Result<()> {
        let builder = self.request(Method::POST, "/v1/me/cancelparentorder")?.json(req);
        self.send_signed_empty(builder).await
    }

    /// GET /v1/me/getparentorders
    pub async fn get_parent_orders(&self, req: &GetParentOrdersRequest) -> Result<Vec<ParentOrder>> {
        let builder = self.request(Method::GET, "/v1/me/getparentorders")?.query(req);
        self.send_signed_json(builder).await
    }

    /// GET /v1/me/getparentorder?parent_order_id= | parent_order_acceptance_id=
    pub async fn get_parent_order(&self, req: &GetParentOrderRequest) -> Result<ParentOrderDetail> {
        let builder = self.request(Method::GET, "/v1/me/getparentorder")?.query(req);
        self.send_signed_json(builder).await
    }

    /// Own fills, optionally for one child order
    ///
    /// GET /v1/me/getexecutions
    pub async fn get_my_executions(&self, req: &GetMyExecutionsRequest) -> Result<Vec<MyExecution>> {
        let builder = self.request(Method::GET, "/v1/me/getexecutions")?.query(req);
        self.send_signed_json(builder).await
    }

    /// GET /v1/me/getbalancehistory?currency_code={currency_code}
    pub async fn get_balance_history(
        &self,
        currency_code: &CurrencyCode,
        pagination: Pagination,
    ) -> Result<Vec<BalanceHistory>> {
        let builder = self
            .request(Method::GET, "/v1/me/getbalancehistory")?
            .query(&BalanceHistoryQuery {
                currency_code,
                pagination,
            });
        self.send_signed_json(builder).await
    }

    /// GET /v1/me/getcollateralhistory
    pub async fn get_collateral_history(&self, pagination: Pagination) -> Result<Vec<CollateralHistory>> {
        let builder = self
            .request(Method::GET, "/v1/me/getcollateralhistory")?
            .query(&pagination);
        self.send_signed_json(builder).await
    }

    /// Margin deposited per currency
    ///
    /// GET /v1/me/getcollateralaccounts
    pub async fn get_collateral_accounts(&self) -> Result<Vec<CollateralAccount>> {
        let builder = self.request(Method::GET, "/v1/me/getcollateralaccounts")?;
        self.send_signed_json(builder).await
    }

    /// GET /v1/me/gettradingcommission?product_code={product_code}
    pub async fn get_trading_commission(&self, product_code: &ProductCode) -> Result<TradingCommission> {
        let builder = self
            .request(Method::GET, "/v1/me/gettradingcommission")?
            .query(&ProductQuery { product_code });
        self.send_signed_json(builder).await
    }
}
