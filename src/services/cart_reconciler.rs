use crate::{
    clients::cart_api::CartApi,
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    models::cart::{Cart, NewCartItem, MAX_QUANTITY},
    services::cart_storage::CartStorage,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Which cart representation is authoritative right now. Modelled as an
/// explicit tagged state threaded through the reconciler, never read from
/// an ambient global flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartMode {
    /// No authenticated session: the client-held cart is the only cart.
    Local,
    /// Authenticated: the server cart is authoritative. The id is `None`
    /// until the server has materialized a cart for this customer.
    Server { cart_id: Option<Uuid> },
}

/// Result of a cart mutation. `Degraded` means the server rejected or
/// failed the call and the mutation was applied to local state instead;
/// the caller should surface an offline/degraded notice.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationOutcome {
    Applied(Cart),
    Degraded(Cart),
}

impl MutationOutcome {
    pub fn cart(&self) -> &Cart {
        match self {
            MutationOutcome::Applied(cart) | MutationOutcome::Degraded(cart) => cart,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MutationOutcome::Degraded(_))
    }
}

struct ReconcilerState {
    mode: CartMode,
    cart: Cart,
    degraded: bool,
}

/// Maintains the authoritative cart across the authenticated/unauthenticated
/// boundary.
///
/// Every mutation on the authenticated path goes to the server first; a
/// successful response is the server's full recomputed cart and replaces
/// local state wholesale, which keeps server-side price/stock recomputation
/// from drifting. On failure the mutation lands on local state as a
/// fallback and the outcome is marked degraded. There is no retry queue:
/// the next successful server response re-synchronizes everything.
pub struct CartReconciler {
    api: Arc<dyn CartApi>,
    storage: Arc<dyn CartStorage>,
    events: Arc<EventSender>,
    config: Arc<AppConfig>,
    state: RwLock<ReconcilerState>,
}

impl CartReconciler {
    pub fn new(
        api: Arc<dyn CartApi>,
        storage: Arc<dyn CartStorage>,
        events: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        let cart = storage.load();
        Self {
            api,
            storage,
            events,
            config,
            state: RwLock::new(ReconcilerState {
                mode: CartMode::Local,
                cart,
                degraded: false,
            }),
        }
    }

    /// Validates and clamps a requested quantity against the configured
    /// maximum and the known stock, before any network call is attempted.
    fn clamp_quantity(&self, requested: i32, available_stock: u32) -> Result<u32, ServiceError> {
        if requested <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let max = self.config.cart.max_quantity.min(MAX_QUANTITY);
        let clamped = (requested as u32).min(max);

        if clamped > available_stock {
            return Err(ServiceError::InsufficientStock(format!(
                "Requested {} but only {} in stock",
                clamped, available_stock
            )));
        }
        Ok(clamped)
    }

    /// Called when the shopper signs in. A server cart, when present,
    /// becomes authoritative and replaces local state; when the server has
    /// no cart yet, the locally held cart stays as the starting point but
    /// all later writes target the server.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<Cart, ServiceError> {
        match self.api.get_cart().await {
            Ok(Some(server_cart)) => {
                let mut state = self.state.write().await;
                state.mode = CartMode::Server {
                    cart_id: server_cart.id,
                };
                state.cart = server_cart;
                state.degraded = false;
                self.persist(&state.cart);
                info!(cart_id = ?state.cart.id, "Adopted server cart");
                Ok(state.cart.clone())
            }
            Ok(None) => {
                let mut state = self.state.write().await;
                state.mode = CartMode::Server { cart_id: None };
                state.degraded = false;
                info!("No server cart yet, keeping local cart as starting point");
                Ok(state.cart.clone())
            }
            Err(error) => {
                // Sign-in itself succeeded upstream; the cart fetch failing
                // leaves us in degraded mode until the next successful call.
                warn!(%error, "Server cart fetch failed at sign-in");
                let mut state = self.state.write().await;
                state.mode = CartMode::Server { cart_id: None };
                state.degraded = true;
                Ok(state.cart.clone())
            }
        }
    }

    /// Called when the session ends; the cart falls back to local-only.
    pub async fn sign_out(&self) {
        let mut state = self.state.write().await;
        state.mode = CartMode::Local;
        state.degraded = false;
    }

    /// Adds an item, merging into an existing line for the same
    /// product/variant. `available_stock` is the stock known from the
    /// resolved selection.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn add_item(
        &self,
        mut item: NewCartItem,
        available_stock: u32,
    ) -> Result<MutationOutcome, ServiceError> {
        let quantity = self.clamp_quantity(item.quantity as i32, available_stock)?;
        item.quantity = quantity;

        let authenticated = self.is_authenticated().await;
        let outcome = if authenticated {
            match self.api.add_item(&item).await {
                Ok(server_cart) => self.adopt_server_cart(server_cart).await,
                Err(error) => {
                    warn!(%error, "Server add-item failed, applying locally");
                    self.apply_add_locally(item.clone(), available_stock, true)
                        .await
                }
            }
        } else {
            self.apply_add_locally(item.clone(), available_stock, false)
                .await
        };

        self.events
            .send_or_log(Event::CartItemAdded {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity,
            })
            .await;
        if outcome.is_degraded() {
            self.notify_degraded("add_item").await;
        }
        Ok(outcome)
    }

    /// Sets the quantity of an existing line.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        item_id: Uuid,
        quantity: i32,
        available_stock: u32,
    ) -> Result<MutationOutcome, ServiceError> {
        let quantity = self.clamp_quantity(quantity, available_stock)?;

        {
            let state = self.state.read().await;
            if state.cart.find_item(item_id).is_none() {
                return Err(ServiceError::NotFound(format!(
                    "Cart item {} not found",
                    item_id
                )));
            }
        }

        let authenticated = self.is_authenticated().await;
        let outcome = if authenticated {
            match self.api.update_item(item_id, quantity).await {
                Ok(server_cart) => self.adopt_server_cart(server_cart).await,
                Err(error) => {
                    warn!(%error, "Server update-item failed, applying locally");
                    self.apply_update_locally(item_id, quantity, true).await
                }
            }
        } else {
            self.apply_update_locally(item_id, quantity, false).await
        };

        self.events
            .send_or_log(Event::CartItemUpdated { item_id, quantity })
            .await;
        if outcome.is_degraded() {
            self.notify_degraded("update_quantity").await;
        }
        Ok(outcome)
    }

    /// Removes a line.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: Uuid) -> Result<MutationOutcome, ServiceError> {
        let authenticated = self.is_authenticated().await;
        let outcome = if authenticated {
            match self.api.remove_item(item_id).await {
                Ok(server_cart) => self.adopt_server_cart(server_cart).await,
                Err(error) => {
                    warn!(%error, "Server remove-item failed, applying locally");
                    self.apply_remove_locally(item_id, true).await
                }
            }
        } else {
            self.apply_remove_locally(item_id, false).await
        };

        self.events.send_or_log(Event::CartItemRemoved(item_id)).await;
        if outcome.is_degraded() {
            self.notify_degraded("remove_item").await;
        }
        Ok(outcome)
    }

    /// Empties the cart. Goes through the server when authenticated so
    /// server-held state tied to the cart is also released.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<MutationOutcome, ServiceError> {
        let authenticated = self.is_authenticated().await;
        let outcome = if authenticated {
            match self.api.clear().await {
                Ok(server_cart) => self.adopt_server_cart(server_cart).await,
                Err(error) => {
                    warn!(%error, "Server clear failed, clearing locally");
                    self.clear_locally(true).await
                }
            }
        } else {
            self.clear_locally(false).await
        };

        self.events.send_or_log(Event::CartCleared).await;
        if outcome.is_degraded() {
            self.notify_degraded("clear").await;
        }
        Ok(outcome)
    }

    /// Snapshot of the current cart.
    pub async fn cart(&self) -> Cart {
        self.state.read().await.cart.clone()
    }

    pub async fn mode(&self) -> CartMode {
        self.state.read().await.mode.clone()
    }

    /// Whether the last server interaction failed and the cart is running
    /// on local fallback state.
    pub async fn is_degraded(&self) -> bool {
        self.state.read().await.degraded
    }

    async fn is_authenticated(&self) -> bool {
        matches!(self.state.read().await.mode, CartMode::Server { .. })
    }

    /// A successful server response replaces local state entirely.
    async fn adopt_server_cart(&self, server_cart: Cart) -> MutationOutcome {
        let mut state = self.state.write().await;
        state.mode = CartMode::Server {
            cart_id: server_cart.id,
        };
        state.cart = server_cart;
        state.degraded = false;
        self.persist(&state.cart);
        MutationOutcome::Applied(state.cart.clone())
    }

    async fn apply_add_locally(
        &self,
        item: NewCartItem,
        available_stock: u32,
        degraded: bool,
    ) -> MutationOutcome {
        let max = self.config.cart.max_quantity.min(MAX_QUANTITY);
        let mut state = self.state.write().await;

        if let Some(existing) = state
            .cart
            .items
            .iter_mut()
            .find(|line| line.matches(item.product_id, item.variant_id))
        {
            // Merged quantity is clamped silently; the next stock check
            // corrects any transient overshoot.
            existing.quantity = (existing.quantity + item.quantity)
                .min(max)
                .min(available_stock.max(1));
        } else {
            state.cart.items.push(item.into_local_item());
        }

        state.degraded = degraded;
        self.persist(&state.cart);
        self.outcome(&state, degraded)
    }

    async fn apply_update_locally(
        &self,
        item_id: Uuid,
        quantity: u32,
        degraded: bool,
    ) -> MutationOutcome {
        let mut state = self.state.write().await;
        if let Some(line) = state.cart.items.iter_mut().find(|line| line.id == item_id) {
            line.quantity = quantity;
        }
        state.degraded = degraded;
        self.persist(&state.cart);
        self.outcome(&state, degraded)
    }

    async fn apply_remove_locally(&self, item_id: Uuid, degraded: bool) -> MutationOutcome {
        let mut state = self.state.write().await;
        state.cart.items.retain(|line| line.id != item_id);
        state.degraded = degraded;
        self.persist(&state.cart);
        self.outcome(&state, degraded)
    }

    async fn clear_locally(&self, degraded: bool) -> MutationOutcome {
        let mut state = self.state.write().await;
        state.cart.items.clear();
        state.degraded = degraded;
        self.persist(&state.cart);
        self.outcome(&state, degraded)
    }

    fn outcome(&self, state: &ReconcilerState, degraded: bool) -> MutationOutcome {
        if degraded {
            MutationOutcome::Degraded(state.cart.clone())
        } else {
            MutationOutcome::Applied(state.cart.clone())
        }
    }

    fn persist(&self, cart: &Cart) {
        if let Err(error) = self.storage.save(cart) {
            warn!(%error, "Failed to persist local cart");
        }
    }

    async fn notify_degraded(&self, operation: &str) {
        self.events
            .send_or_log(Event::CartSyncDegraded {
                operation: operation.to_string(),
            })
            .await;
    }
}
