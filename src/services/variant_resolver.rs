use crate::{
    errors::ServiceError,
    models::catalog::{Product, Variant},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A (possibly partial) attribute selection, keyed by attribute name.
/// BTreeMap keeps the keys sorted so resolution is order-independent.
pub type Selection = BTreeMap<String, String>;

/// The price, stock and identity of a fully resolved selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    /// `None` for non-configurable products sold from base price/stock.
    pub variant_id: Option<Uuid>,
    pub sku: Option<String>,
    pub display_name: String,
    pub unit_price: Decimal,
    /// Struck-through price, present only when it exceeds the unit price.
    pub compare_at_price: Option<Decimal>,
    pub stock: u32,
    pub available: bool,
}

/// Per-value availability surfaced while a selection is still incomplete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueAvailability {
    pub value: String,
    pub stock: u32,
    pub available: bool,
}

/// The remaining choices for one attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeOptions {
    pub attribute: String,
    pub values: Vec<ValueAvailability>,
}

/// Outcome of mapping a selection onto a product's variants. Incomplete
/// and NoMatch are ordinary values: callers disable the purchase action,
/// nothing raises.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    Resolved(ResolvedSelection),
    Incomplete { options: Vec<AttributeOptions> },
    NoMatch,
}

impl Resolution {
    pub fn as_resolved(&self) -> Option<&ResolvedSelection> {
        match self {
            Resolution::Resolved(resolved) => Some(resolved),
            _ => None,
        }
    }
}

/// Deterministic selection-to-variant resolution for one product.
///
/// Variants are pre-indexed by their sorted (attribute, value) pairs;
/// resolving is a single lookup, never combinatorial generation. Variants
/// are authored administratively and arrive here as a read-only snapshot.
#[derive(Clone, Debug)]
pub struct VariantResolver {
    product: Product,
    index: HashMap<String, usize>,
}

fn selection_key(values: &BTreeMap<String, String>) -> String {
    // BTreeMap iteration is sorted by attribute name; unit separator keeps
    // composite keys unambiguous.
    let mut key = String::new();
    for (attribute, value) in values {
        key.push_str(attribute);
        key.push('\u{1f}');
        key.push_str(value);
        key.push('\u{1e}');
    }
    key
}

impl VariantResolver {
    pub fn new(product: Product) -> Self {
        let index = product
            .variants
            .iter()
            .enumerate()
            .map(|(position, variant)| (selection_key(&variant.attribute_values), position))
            .collect();
        Self { product, index }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    /// Maps a selection onto the product.
    ///
    /// A complete selection resolves to at most one variant. A partial one
    /// yields the remaining choices with per-value stock. A complete
    /// selection matching no variant is a data inconsistency and yields
    /// `NoMatch`.
    pub fn resolve(&self, selection: &Selection) -> Resolution {
        if !self.product.has_variants() {
            return Resolution::Resolved(ResolvedSelection {
                variant_id: None,
                sku: None,
                display_name: self.product.name.clone(),
                unit_price: self.product.base_price,
                compare_at_price: None,
                stock: self.product.base_stock,
                available: self.product.base_stock > 0,
            });
        }

        if selection.len() < self.product.attributes.len() {
            return Resolution::Incomplete {
                options: self.remaining_options(),
            };
        }

        match self.index.get(&selection_key(selection)) {
            Some(&position) => {
                let variant = &self.product.variants[position];
                Resolution::Resolved(self.resolve_variant(variant, selection))
            }
            None => Resolution::NoMatch,
        }
    }

    fn resolve_variant(&self, variant: &Variant, selection: &Selection) -> ResolvedSelection {
        let unit_price = variant
            .price
            .unwrap_or_else(|| self.additive_price(selection));

        // Only show a discount when the reference price actually exceeds
        // what the shopper pays.
        let compare_at_price = variant
            .compare_at_price
            .filter(|compare_at| *compare_at > unit_price);

        ResolvedSelection {
            variant_id: Some(variant.id),
            sku: Some(variant.sku.clone()),
            display_name: self.display_name(selection),
            unit_price,
            compare_at_price,
            stock: variant.stock_quantity,
            available: variant.is_available && variant.stock_quantity > 0,
        }
    }

    /// Base price plus the adjustments of every selected value.
    fn additive_price(&self, selection: &Selection) -> Decimal {
        let adjustments: Decimal = selection
            .iter()
            .filter_map(|(attribute, value)| {
                self.product
                    .attribute(attribute)
                    .and_then(|a| a.value(value))
                    .and_then(|v| v.price_adjustment)
            })
            .sum();
        self.product.base_price + adjustments
    }

    /// Product name plus the selected values flagged as name-affecting,
    /// in attribute order.
    fn display_name(&self, selection: &Selection) -> String {
        let mut name = self.product.name.clone();
        for attribute in &self.product.attributes {
            if let Some(value) = selection.get(&attribute.name) {
                if attribute
                    .value(value)
                    .is_some_and(|v| v.affects_display_name)
                {
                    name.push(' ');
                    name.push_str(value);
                }
            }
        }
        name
    }

    fn remaining_options(&self) -> Vec<AttributeOptions> {
        self.product
            .attributes
            .iter()
            .map(|attribute| AttributeOptions {
                attribute: attribute.name.clone(),
                values: attribute
                    .values
                    .iter()
                    .map(|value| ValueAvailability {
                        value: value.value.clone(),
                        stock: value.stock,
                        available: value.available,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// A shopper's in-progress selection with its requested quantity.
///
/// Any change to the selection resets the quantity to 1, so a quantity
/// picked against one variant can never silently carry over to another
/// variant with less stock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSelection {
    selection: Selection,
    quantity: u32,
}

impl Default for ProductSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductSelection {
    pub fn new() -> Self {
        Self {
            selection: Selection::new(),
            quantity: 1,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity.max(1);
    }

    /// Selects a value, or clears the attribute when the value is already
    /// selected (re-click). Unavailable values are rejected before any
    /// resolution happens.
    pub fn toggle(
        &mut self,
        product: &Product,
        attribute: &str,
        value: &str,
    ) -> Result<(), ServiceError> {
        let attr = product
            .attribute(attribute)
            .ok_or_else(|| ServiceError::InvalidInput(format!("Unknown attribute {}", attribute)))?;
        let attr_value = attr
            .value(value)
            .ok_or_else(|| ServiceError::InvalidInput(format!("Unknown value {}", value)))?;

        if !attr_value.available && self.selection.get(attribute).map(String::as_str) != Some(value)
        {
            return Err(ServiceError::ValidationError(format!(
                "Value {} is not available",
                value
            )));
        }

        if self.selection.get(attribute).map(String::as_str) == Some(value) {
            self.selection.remove(attribute);
        } else {
            self.selection
                .insert(attribute.to_string(), value.to_string());
        }
        self.quantity = 1;
        Ok(())
    }
}
