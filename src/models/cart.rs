use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lower bound on a line item's quantity.
pub const MIN_QUANTITY: u32 = 1;
/// Upper bound on a line item's quantity, independent of stock.
pub const MAX_QUANTITY: u32 = 99;

/// A cart line item. For local carts the id is generated client-side;
/// server carts assign their own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub image: Option<String>,
    /// Attribute selection at the time the item was added.
    pub selected_attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub warranty_package_ids: Vec<Uuid>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Whether this line refers to the same purchasable as another request
    /// (same product and same variant, or both variant-less).
    pub fn matches(&self, product_id: Uuid, variant_id: Option<Uuid>) -> bool {
        self.product_id == product_id && self.variant_id == variant_id
    }
}

/// Payload for adding an item; the id is assigned by whichever side owns
/// the cart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCartItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub image: Option<String>,
    pub selected_attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub warranty_package_ids: Vec<Uuid>,
}

impl NewCartItem {
    /// Materializes the item with a client-generated id for the local cart.
    pub fn into_local_item(self) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            variant_id: self.variant_id,
            name: self.name,
            unit_price: self.unit_price,
            quantity: self.quantity,
            image: self.image,
            selected_attributes: self.selected_attributes,
            warranty_package_ids: self.warranty_package_ids,
        }
    }
}

/// A shopping cart. `id == None` marks the locally-held cart of an
/// unauthenticated shopper; server carts carry the server-assigned id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Option<Uuid>,
    pub currency: String,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn empty(currency: impl Into<String>) -> Self {
        Self {
            id: None,
            currency: currency.into(),
            items: Vec::new(),
        }
    }

    pub fn is_server_cart(&self) -> bool {
        self.id.is_some()
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn find_item(&self, item_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn find_line(&self, product_id: Uuid, variant_id: Option<Uuid>) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.matches(product_id, variant_id))
    }
}
