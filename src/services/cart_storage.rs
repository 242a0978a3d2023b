use crate::{errors::ServiceError, models::cart::Cart};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Client-held cart persistence. A bad or partial read must degrade to an
/// empty cart, never fail: the local cart has no schema versioning.
pub trait CartStorage: Send + Sync {
    fn load(&self) -> Cart;
    fn save(&self, cart: &Cart) -> Result<(), ServiceError>;
}

/// JSON-file-backed cart storage.
pub struct JsonFileCartStorage {
    path: PathBuf,
    currency: String,
}

impl JsonFileCartStorage {
    pub fn new(path: impl Into<PathBuf>, currency: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            currency: currency.into(),
        }
    }
}

impl CartStorage for JsonFileCartStorage {
    fn load(&self) -> Cart {
        match std::fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Cart>(&bytes) {
                Ok(cart) => cart,
                Err(error) => {
                    warn!(path = %self.path.display(), %error, "Stored cart is unreadable, starting empty");
                    Cart::empty(self.currency.clone())
                }
            },
            Err(error) => {
                // A missing file is the normal first-run state.
                debug!(path = %self.path.display(), %error, "No stored cart");
                Cart::empty(self.currency.clone())
            }
        }
    }

    fn save(&self, cart: &Cart) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec(cart)?;
        std::fs::write(&self.path, bytes)
            .map_err(|e| ServiceError::InternalError(format!("Failed to persist cart: {}", e)))
    }
}

/// In-memory cart storage, used in tests and as a fallback when no
/// filesystem location is configured.
pub struct InMemoryCartStorage {
    cart: Mutex<Cart>,
}

impl InMemoryCartStorage {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            cart: Mutex::new(Cart::empty(currency)),
        }
    }
}

impl CartStorage for InMemoryCartStorage {
    fn load(&self) -> Cart {
        self.cart.lock().map(|c| c.clone()).unwrap_or_else(|_| {
            warn!("Cart storage lock poisoned, starting empty");
            Cart::empty("VND")
        })
    }

    fn save(&self, cart: &Cart) -> Result<(), ServiceError> {
        let mut guard = self
            .cart
            .lock()
            .map_err(|_| ServiceError::InternalError("Cart storage lock poisoned".to_string()))?;
        *guard = cart.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cart::CartItem;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn cart_with_one_item() -> Cart {
        let mut cart = Cart::empty("VND");
        cart.items.push(CartItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: None,
            name: "USB cable".to_string(),
            unit_price: dec!(45000),
            quantity: 2,
            image: None,
            selected_attributes: None,
            warranty_package_ids: Vec::new(),
        });
        cart
    }

    #[test]
    fn round_trips_through_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileCartStorage::new(dir.path().join("cart.json"), "VND");

        let cart = cart_with_one_item();
        storage.save(&cart).unwrap();
        assert_eq!(storage.load(), cart);
    }

    #[test]
    fn missing_file_loads_an_empty_cart() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileCartStorage::new(dir.path().join("nope.json"), "VND");

        let cart = storage.load();
        assert!(cart.items.is_empty());
        assert_eq!(cart.currency, "VND");
    }

    #[test]
    fn corrupt_file_degrades_to_an_empty_cart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, b"{\"items\": [{\"truncated").unwrap();

        let storage = JsonFileCartStorage::new(path, "VND");
        assert!(storage.load().items.is_empty());
    }

    #[test]
    fn in_memory_storage_round_trips() {
        let storage = InMemoryCartStorage::new("VND");
        let cart = cart_with_one_item();
        storage.save(&cart).unwrap();
        assert_eq!(storage.load(), cart);
    }
}
