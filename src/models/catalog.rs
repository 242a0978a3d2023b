use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One selectable value of a configuration attribute, with the stock and
/// price adjustment the storefront displays per value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub value: String,
    pub stock: u32,
    pub available: bool,
    /// Signed amount added to the product base price when this value is
    /// selected and the matching variant carries no explicit price.
    pub price_adjustment: Option<Decimal>,
    /// Whether the value is appended to the product display name.
    #[serde(default)]
    pub affects_display_name: bool,
}

/// A named axis of configuration (e.g. "Color") with its ordered values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Uuid,
    pub name: String,
    pub values: Vec<AttributeValue>,
}

impl Attribute {
    pub fn value(&self, value: &str) -> Option<&AttributeValue> {
        self.values.iter().find(|v| v.value == value)
    }
}

/// A concrete, purchasable configuration of a product: one value per
/// attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    /// Explicit variant price. When present it wins over the additive
    /// base-plus-adjustments formula.
    pub price: Option<Decimal>,
    /// Struck-through price; only meaningful when it exceeds the effective
    /// price.
    pub compare_at_price: Option<Decimal>,
    pub stock_quantity: u32,
    /// Attribute name -> selected value.
    pub attribute_values: BTreeMap<String, String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

/// Catalog snapshot of a product, read-only from this crate's perspective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub base_stock: u32,
    pub is_variant_product: bool,
    pub attributes: Vec<Attribute>,
    pub variants: Vec<Variant>,
}

impl Product {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// True when the product is sold as concrete variants rather than
    /// directly from its base price/stock.
    pub fn has_variants(&self) -> bool {
        self.is_variant_product && !self.variants.is_empty()
    }
}
