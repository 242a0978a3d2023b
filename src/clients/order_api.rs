use crate::{
    errors::ServiceError,
    models::{
        address::Address,
        order::{BankTransferInstructions, Order, OrderItem, PaymentMethod},
    },
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount must be greater than 0".into());
        Err(err)
    }
}

/// Request to create an order from a snapshotted cart.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,
    #[validate(custom = "validate_positive_decimal")]
    pub total: Decimal,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<Address>,
    pub notes: Option<String>,
}

/// Result of a re-payment request: bank transfers hand back transfer
/// instructions for a fresh session, everything else redirects to an
/// externally supplied payment URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepayOutcome {
    BankTransfer(BankTransferInstructions),
    Redirect { payment_url: String },
}

/// The order service. `cancel_order` and `repay_order` are idempotent by
/// contract: repeating them against an already-terminal order is a safe
/// no-op server-side.
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ServiceError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError>;

    async fn cancel_order(&self, order_id: Uuid) -> Result<Order, ServiceError>;

    async fn repay_order(&self, order_id: Uuid) -> Result<RepayOutcome, ServiceError>;
}

/// HTTP implementation of the order service contract.
#[derive(Clone)]
pub struct HttpOrderApi {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpOrderApi {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn from_config(config: &crate::config::AppConfig, auth_token: impl Into<String>) -> Self {
        Self::new(config.services.order_base_url.clone(), auth_token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ServiceError> {
        let order = self
            .http
            .post(self.url("/orders"))
            .bearer_auth(&self.auth_token)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<Order>()
            .await?;
        Ok(order)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let order = self
            .http
            .get(self.url(&format!("/orders/{}", order_id)))
            .bearer_auth(&self.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Order>()
            .await?;
        Ok(order)
    }

    async fn cancel_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let order = self
            .http
            .post(self.url(&format!("/orders/{}/cancel", order_id)))
            .bearer_auth(&self.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Order>()
            .await?;
        Ok(order)
    }

    async fn repay_order(&self, order_id: Uuid) -> Result<RepayOutcome, ServiceError> {
        let outcome = self
            .http
            .post(self.url(&format!("/orders/{}/repay", order_id)))
            .bearer_auth(&self.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json::<RepayOutcome>()
            .await?;
        Ok(outcome)
    }
}
