/*
[INPUT]:  Order and query parameters supplied by callers
[OUTPUT]: Serializable request bodies and query strings
[POS]:    Data layer - request builders for REST endpoints
[UPDATE]: When endpoint parameters change
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{
    ChildOrderState, ConditionType, CurrencyCode, IdType, OrderMethod, OrderType, ProductCode, Side,
    TimeInForce,
};
use crate::http::{BitflyerError, Result};

/// `count`/`before`/`after` paging shared by list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ProductQuery<'a> {
    pub product_code: &'a ProductCode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ExecutionsQuery<'a> {
    pub product_code: &'a ProductCode,
    #[serde(flatten)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ChatsQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct BalanceHistoryQuery<'a> {
    pub currency_code: &'a CurrencyCode,
    #[serde(flatten)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendChildOrderRequest {
    pub product_code: ProductCode,
    pub child_order_type: OrderType,
    pub side: Side,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub size: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute_to_expire: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
}

impl SendChildOrderRequest {
    pub fn limit(product_code: ProductCode, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            product_code,
            child_order_type: OrderType::Limit,
            side,
            price: Some(price),
            size,
            minute_to_expire: None,
            time_in_force: None,
        }
    }

    pub fn market(product_code: ProductCode, side: Side, size: Decimal) -> Self {
        Self {
            product_code,
            child_order_type: OrderType::Market,
            side,
            price: None,
            size,
            minute_to_expire: None,
            time_in_force: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendChildOrderResponse {
    pub child_order_acceptance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelChildOrderRequest {
    pub product_code: ProductCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order_acceptance_id: Option<String>,
}

impl CancelChildOrderRequest {
    /// Only child order ids and child order acceptance ids can be cancelled.
    pub fn new(product_code: ProductCode, id_type: IdType, order_id: impl Into<String>) -> Result<Self> {
        let order_id = order_id.into();
        match id_type {
            IdType::ChildOrderId => Ok(Self {
                product_code,
                child_order_id: Some(order_id),
                child_order_acceptance_id: None,
            }),
            IdType::ChildOrderAcceptanceId => Ok(Self {
                product_code,
                child_order_id: None,
                child_order_acceptance_id: Some(order_id),
            }),
            other => Err(BitflyerError::InvalidRequest(format!(
                "cannot cancel child order by {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAllChildOrdersRequest {
    pub product_code: ProductCode,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetChildOrdersRequest {
    pub product_code: ProductCode,
    #[serde(flatten)]
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order_state: Option<ChildOrderState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order_acceptance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_order_id: Option<String>,
}

impl GetChildOrdersRequest {
    pub fn new(product_code: ProductCode) -> Self {
        Self {
            product_code,
            ..Default::default()
        }
    }

    /// Look up child orders by a single identifier.
    ///
    /// Parent order acceptance ids are not accepted by this endpoint.
    pub fn by_id(product_code: ProductCode, id_type: IdType, order_id: impl Into<String>) -> Result<Self> {
        let mut request = Self::new(product_code);
        let order_id = order_id.into();
        match id_type {
            IdType::ChildOrderId => request.child_order_id = Some(order_id),
            IdType::ChildOrderAcceptanceId => request.child_order_acceptance_id = Some(order_id),
            IdType::ParentOrderId => request.parent_order_id = Some(order_id),
            IdType::ParentOrderAcceptanceId => {
                return Err(BitflyerError::InvalidRequest(
                    "cannot look up child orders by parent order acceptance id".to_string(),
                ));
            }
        }
        Ok(request)
    }
}

/// Own executions, optionally narrowed to one child order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetMyExecutionsRequest {
    pub product_code: ProductCode,
    #[serde(flatten)]
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_order_acceptance_id: Option<String>,
}

impl GetMyExecutionsRequest {
    pub fn new(product_code: ProductCode, pagination: Pagination) -> Self {
        Self {
            product_code,
            pagination,
            ..Default::default()
        }
    }

    pub fn by_id(product_code: ProductCode, id_type: IdType, order_id: impl Into<String>) -> Result<Self> {
        let mut request = Self::new(product_code, Pagination::default());
        let order_id = order_id.into();
        match id_type {
            IdType::ChildOrderId => request.child_order_id = Some(order_id),
            IdType::ChildOrderAcceptanceId => request.child_order_acceptance_id = Some(order_id),
            other => {
                return Err(BitflyerError::InvalidRequest(format!(
                    "cannot look up executions by {other:?}"
                )));
            }
        }
        Ok(request)
    }
}

/// One leg of a parent order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentOrderParameter {
    pub product_code: ProductCode,
    pub condition_type: ConditionType,
    pub side: Side,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub size: Decimal,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub trigger_price: Option<Decimal>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub offset: Option<Decimal>,
}

impl ParentOrderParameter {
    fn with_condition(product_code: ProductCode, condition_type: ConditionType, side: Side, size: Decimal) -> Self {
        Self {
            product_code,
            condition_type,
            side,
            price: None,
            size,
            trigger_price: None,
            offset: None,
        }
    }

    pub fn limit(product_code: ProductCode, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            price: Some(price),
            ..Self::with_condition(product_code, ConditionType::Limit, side, size)
        }
    }

    pub fn market(product_code: ProductCode, side: Side, size: Decimal) -> Self {
        Self::with_condition(product_code, ConditionType::Market, side, size)
    }

    /// Market order once the price crosses `trigger_price`.
    pub fn stop(product_code: ProductCode, side: Side, trigger_price: Decimal, size: Decimal) -> Self {
        Self {
            trigger_price: Some(trigger_price),
            ..Self::with_condition(product_code, ConditionType::Stop, side, size)
        }
    }

    pub fn stop_limit(
        product_code: ProductCode,
        side: Side,
        price: Decimal,
        trigger_price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            price: Some(price),
            trigger_price: Some(trigger_price),
            ..Self::with_condition(product_code, ConditionType::StopLimit, side, size)
        }
    }

    pub fn trail(product_code: ProductCode, side: Side, offset: Decimal, size: Decimal) -> Self {
        Self {
            offset: Some(offset),
            ..Self::with_condition(product_code, ConditionType::Trail, side, size)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendParentOrderRequest {
    pub order_method: OrderMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute_to_expire: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    pub parameters: Vec<ParentOrderParameter>,
}

impl SendParentOrderRequest {
    /// The number of parameters must match the order method
    /// (SIMPLE 1, IFD 2, OCO 2, IFDOCO 3).
    pub fn new(order_method: OrderMethod, parameters: Vec<ParentOrderParameter>) -> Result<Self> {
        if parameters.len() != order_method.parameter_count() {
            return Err(BitflyerError::InvalidRequest(format!(
                "{order_method:?} takes {} parameters, got {}",
                order_method.parameter_count(),
                parameters.len()
            )));
        }
        Ok(Self {
            order_method,
            minute_to_expire: None,
            time_in_force: None,
            parameters,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendParentOrderResponse {
    pub parent_order_acceptance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelParentOrderRequest {
    pub product_code: ProductCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_order_acceptance_id: Option<String>,
}

impl CancelParentOrderRequest {
    pub fn new(product_code: ProductCode, id_type: IdType, order_id: impl Into<String>) -> Result<Self> {
        let (parent_order_id, parent_order_acceptance_id) = parent_id(id_type, order_id.into())?;
        Ok(Self {
            product_code,
            parent_order_id,
            parent_order_acceptance_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetParentOrdersRequest {
    pub product_code: ProductCode,
    #[serde(flatten)]
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_order_state: Option<ChildOrderState>,
}

impl GetParentOrdersRequest {
    pub fn new(product_code: ProductCode) -> Self {
        Self {
            product_code,
            ..Default::default()
        }
    }
}

/// Detail lookup of one parent order, by either of its identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetParentOrderRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_order_acceptance_id: Option<String>,
}

impl GetParentOrderRequest {
    pub fn new(id_type: IdType, order_id: impl Into<String>) -> Result<Self> {
        let (parent_order_id, parent_order_acceptance_id) = parent_id(id_type, order_id.into())?;
        Ok(Self {
            parent_order_id,
            parent_order_acceptance_id,
        })
    }
}

fn parent_id(id_type: IdType, order_id: String) -> Result<(Option<String>, Option<String>)> {
    match id_type {
        IdType::ParentOrderId => Ok((Some(order_id), None)),
        IdType::ParentOrderAcceptanceId => Ok((None, Some(order_id))),
        other => Err(BitflyerError::InvalidRequest(format!(
            "parent orders are not addressed by {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_order_serializes_numbers() {
        let req = SendChildOrderRequest::limit(
            ProductCode::from("BTC_JPY"),
            Side::Buy,
            Decimal::from(30000),
            Decimal::new(1, 1),
        );

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["child_order_type"], "LIMIT");
        assert_eq!(body["side"], "BUY");
        assert_eq!(body["price"], serde_json::json!(30000.0));
        assert_eq!(body["size"], serde_json::json!(0.1));
        assert!(body.get("time_in_force").is_none());
    }

    #[test]
    fn test_market_order_omits_price() {
        let req = SendChildOrderRequest::market(ProductCode::from("BTC_JPY"), Side::Sell, Decimal::ONE);
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("price").is_none());
    }

    #[test]
    fn test_cancel_request_rejects_parent_ids() {
        let err = CancelChildOrderRequest::new(
            ProductCode::from("BTC_JPY"),
            IdType::ParentOrderId,
            "JRF20150707-033333-099999",
        )
        .unwrap_err();
        assert!(matches!(err, BitflyerError::InvalidRequest(_)));

        let ok = CancelChildOrderRequest::new(
            ProductCode::from("BTC_JPY"),
            IdType::ChildOrderAcceptanceId,
            "JRF20150707-033333-099999",
        )
        .unwrap();
        assert_eq!(ok.child_order_acceptance_id.as_deref(), Some("JRF20150707-033333-099999"));
        assert!(ok.child_order_id.is_none());
    }

    #[test]
    fn test_child_orders_by_parent_acceptance_id_is_invalid() {
        let result = GetChildOrdersRequest::by_id(
            ProductCode::from("BTC_JPY"),
            IdType::ParentOrderAcceptanceId,
            "JRF20150925-060559-396699",
        );
        assert!(matches!(result, Err(BitflyerError::InvalidRequest(_))));
    }

    #[test]
    fn test_parent_order_parameter_count_must_match_method() {
        let product = ProductCode::from("BTC_JPY");
        let legs = vec![
            ParentOrderParameter::limit(product.clone(), Side::Buy, Decimal::from(30000), Decimal::ONE),
            ParentOrderParameter::stop(product, Side::Sell, Decimal::from(29000), Decimal::ONE),
        ];

        assert!(matches!(
            SendParentOrderRequest::new(OrderMethod::Ifdoco, legs.clone()),
            Err(BitflyerError::InvalidRequest(_))
        ));
        let req = SendParentOrderRequest::new(OrderMethod::Ifd, legs).unwrap();
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["order_method"], "IFD");
        assert_eq!(body["parameters"][1]["condition_type"], "STOP");
        assert_eq!(body["parameters"][1]["trigger_price"], serde_json::json!(29000.0));
        assert!(body["parameters"][1].get("price").is_none());
    }

    #[test]
    fn test_parent_ids_only_address_parent_orders() {
        let product = ProductCode::from("BTC_JPY");
        assert!(CancelParentOrderRequest::new(product.clone(), IdType::ChildOrderId, "x").is_err());
        assert!(GetParentOrderRequest::new(IdType::ChildOrderAcceptanceId, "x").is_err());
        assert!(GetMyExecutionsRequest::by_id(product, IdType::ParentOrderId, "x").is_err());

        let lookup = GetParentOrderRequest::new(IdType::ParentOrderAcceptanceId, "JRF1").unwrap();
        assert_eq!(lookup.parent_order_acceptance_id.as_deref(), Some("JRF1"));
        assert!(lookup.parent_order_id.is_none());
    }
}
