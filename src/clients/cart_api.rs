use crate::{
    errors::ServiceError,
    models::cart::{Cart, NewCartItem},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

/// The server-held cart service. Every mutation returns the server's full
/// recomputed cart, never a delta, so callers can replace local state
/// wholesale.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Fetches the caller's cart, or `None` when the server holds no cart
    /// for this identity yet.
    async fn get_cart(&self) -> Result<Option<Cart>, ServiceError>;

    async fn add_item(&self, item: &NewCartItem) -> Result<Cart, ServiceError>;

    async fn update_item(&self, item_id: Uuid, quantity: u32) -> Result<Cart, ServiceError>;

    async fn remove_item(&self, item_id: Uuid) -> Result<Cart, ServiceError>;

    /// Clears the cart server-side, releasing any server-held state tied to
    /// its lines.
    async fn clear(&self) -> Result<Cart, ServiceError>;
}

/// HTTP implementation of the cart service contract. The bearer token comes
/// from the identity collaborator; this client never manages sessions.
#[derive(Clone)]
pub struct HttpCartApi {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

#[derive(Serialize)]
struct UpdateQuantityBody {
    quantity: u32,
}

impl HttpCartApi {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn from_config(config: &crate::config::AppConfig, auth_token: impl Into<String>) -> Self {
        Self::new(config.services.cart_base_url.clone(), auth_token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl CartApi for HttpCartApi {
    async fn get_cart(&self) -> Result<Option<Cart>, ServiceError> {
        let response = self
            .http
            .get(self.url("/cart"))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let cart = response.error_for_status()?.json::<Cart>().await?;
        Ok(Some(cart))
    }

    async fn add_item(&self, item: &NewCartItem) -> Result<Cart, ServiceError> {
        let cart = self
            .http
            .post(self.url("/cart/items"))
            .bearer_auth(&self.auth_token)
            .json(item)
            .send()
            .await?
            .error_for_status()?
            .json::<Cart>()
            .await?;
        Ok(cart)
    }

    async fn update_item(&self, item_id: Uuid, quantity: u32) -> Result<Cart, ServiceError> {
        let cart = self
            .http
            .put(self.url(&format!("/cart/items/{}", item_id)))
            .bearer_auth(&self.auth_token)
            .json(&UpdateQuantityBody { quantity })
            .send()
            .await?
            .error_for_status()?
            .json::<Cart>()
            .await?;
        Ok(cart)
    }

    async fn remove_item(&self, item_id: Uuid) -> Result<Cart, ServiceError> {
        let cart = self
            .http
            .delete(self.url(&format!("/cart/items/{}", item_id)))
            .bearer_auth(&self.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Cart>()
            .await?;
        Ok(cart)
    }

    async fn clear(&self) -> Result<Cart, ServiceError> {
        let cart = self
            .http
            .delete(self.url("/cart"))
            .bearer_auth(&self.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Cart>()
            .await?;
        Ok(cart)
    }
}
