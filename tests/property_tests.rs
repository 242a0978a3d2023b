//! Property-based tests for the storefront core invariants.
//!
//! These use proptest to exercise the variant resolver, the quantity
//! clamp, and the default-address invariant across randomized inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use storefront_core::{
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    models::{
        cart::NewCartItem,
        catalog::{Attribute, AttributeValue, Product, Variant},
    },
    services::{
        addresses::{AddressService, AddressUpdate, InMemoryAddressStore, NewAddress},
        cart_reconciler::CartReconciler,
        cart_storage::InMemoryCartStorage,
        variant_resolver::{Selection, VariantResolver},
    },
};
use uuid::Uuid;

mod support {
    use super::*;
    use async_trait::async_trait;
    use storefront_core::clients::cart_api::CartApi;
    use storefront_core::models::cart::Cart;

    /// A cart service that is never reached; local-mode properties must
    /// hold without any network traffic.
    pub struct UnreachableCartApi;

    #[async_trait]
    impl CartApi for UnreachableCartApi {
        async fn get_cart(&self) -> Result<Option<Cart>, ServiceError> {
            panic!("local-mode cart operations must not call the server")
        }
        async fn add_item(&self, _item: &NewCartItem) -> Result<Cart, ServiceError> {
            panic!("local-mode cart operations must not call the server")
        }
        async fn update_item(&self, _item_id: Uuid, _quantity: u32) -> Result<Cart, ServiceError> {
            panic!("local-mode cart operations must not call the server")
        }
        async fn remove_item(&self, _item_id: Uuid) -> Result<Cart, ServiceError> {
            panic!("local-mode cart operations must not call the server")
        }
        async fn clear(&self) -> Result<Cart, ServiceError> {
            panic!("local-mode cart operations must not call the server")
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

fn color_storage_product(colors: &[&str], storages: &[&str]) -> Product {
    let product_id = Uuid::new_v4();
    let mut variants = Vec::new();
    for color in colors {
        for storage in storages {
            variants.push(Variant {
                id: Uuid::new_v4(),
                product_id,
                sku: format!("SKU-{}-{}", color, storage),
                price: None,
                compare_at_price: None,
                stock_quantity: 10,
                attribute_values: BTreeMap::from([
                    ("Color".to_string(), color.to_string()),
                    ("Storage".to_string(), storage.to_string()),
                ]),
                is_default: false,
                is_available: true,
            });
        }
    }
    Product {
        id: product_id,
        name: "Aster X2".to_string(),
        base_price: Decimal::from(1000000),
        base_stock: 0,
        is_variant_product: true,
        attributes: vec![
            Attribute {
                id: Uuid::new_v4(),
                name: "Color".to_string(),
                values: colors
                    .iter()
                    .map(|c| AttributeValue {
                        value: c.to_string(),
                        stock: 10,
                        available: true,
                        price_adjustment: Some(Decimal::from(10000)),
                        affects_display_name: false,
                    })
                    .collect(),
            },
            Attribute {
                id: Uuid::new_v4(),
                name: "Storage".to_string(),
                values: storages
                    .iter()
                    .map(|s| AttributeValue {
                        value: s.to_string(),
                        stock: 10,
                        available: true,
                        price_adjustment: None,
                        affects_display_name: false,
                    })
                    .collect(),
            },
        ],
        variants,
    }
}

fn local_reconciler() -> CartReconciler {
    let (events, _rx) = EventSender::channel(256);
    CartReconciler::new(
        Arc::new(support::UnreachableCartApi),
        Arc::new(InMemoryCartStorage::new("VND")),
        Arc::new(events),
        Arc::new(AppConfig::default()),
    )
}

fn cart_item(quantity: u32) -> NewCartItem {
    NewCartItem {
        product_id: Uuid::new_v4(),
        variant_id: None,
        name: "Anything".to_string(),
        unit_price: Decimal::from(10000),
        quantity,
        image: None,
        selected_attributes: None,
        warranty_package_ids: Vec::new(),
    }
}

// Property: resolution is deterministic and total over arbitrary selections.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn resolution_is_deterministic_and_never_panics(
        color_idx in 0usize..4,
        storage_idx in 0usize..4,
        pick_color in any::<bool>(),
        pick_storage in any::<bool>(),
    ) {
        let colors = ["Black", "Silver", "Gold"];
        let storages = ["128GB", "256GB", "512GB"];
        let product = color_storage_product(&colors, &storages);
        let resolver = VariantResolver::new(product);

        let mut selection = Selection::new();
        if pick_color {
            // Index 3 is deliberately out of catalog: an unknown value.
            let value = colors.get(color_idx).copied().unwrap_or("Magenta");
            selection.insert("Color".to_string(), value.to_string());
        }
        if pick_storage {
            let value = storages.get(storage_idx).copied().unwrap_or("1TB");
            selection.insert("Storage".to_string(), value.to_string());
        }

        let first = resolver.resolve(&selection);
        let second = resolver.resolve(&selection);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn complete_valid_selections_always_resolve(
        color_idx in 0usize..3,
        storage_idx in 0usize..3,
    ) {
        let colors = ["Black", "Silver", "Gold"];
        let storages = ["128GB", "256GB", "512GB"];
        let product = color_storage_product(&colors, &storages);
        let resolver = VariantResolver::new(product);

        let selection = Selection::from([
            ("Color".to_string(), colors[color_idx].to_string()),
            ("Storage".to_string(), storages[storage_idx].to_string()),
        ]);

        let resolved = resolver.resolve(&selection);
        prop_assert!(resolved.as_resolved().is_some());
    }
}

// Property: the quantity clamp honors [1, min(99, stock)] and never calls
// the server in local mode.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cart_quantity_is_always_clamped(requested in 0u32..500, stock in 0u32..200) {
        let rt = runtime();
        rt.block_on(async {
            let reconciler = local_reconciler();
            let result = reconciler.add_item(cart_item(requested), stock).await;

            if requested == 0 {
                prop_assert!(matches!(result, Err(ServiceError::ValidationError(_))));
            } else if requested.min(99) > stock {
                prop_assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));
            } else {
                let outcome = result.expect("in-range quantity should be accepted");
                let quantity = outcome.cart().items[0].quantity;
                prop_assert_eq!(quantity, requested.min(99));
                prop_assert!(quantity >= 1 && quantity <= 99.min(stock.max(1)));
            }
            Ok(())
        })?;
    }
}

#[derive(Debug, Clone)]
enum AddressOp {
    Create { default: bool },
    Delete { pick: usize },
    SetDefault { pick: usize },
    UpdateDefault { pick: usize },
}

fn address_op_strategy() -> impl Strategy<Value = AddressOp> {
    prop_oneof![
        any::<bool>().prop_map(|default| AddressOp::Create { default }),
        (0usize..8).prop_map(|pick| AddressOp::Delete { pick }),
        (0usize..8).prop_map(|pick| AddressOp::SetDefault { pick }),
        (0usize..8).prop_map(|pick| AddressOp::UpdateDefault { pick }),
    ]
}

// Property: after any operation sequence, exactly one default exists iff
// the owner has at least one address.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn default_address_invariant_holds_under_any_sequence(
        ops in proptest::collection::vec(address_op_strategy(), 1..24),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (events, _rx) = EventSender::channel(1024);
            let service = AddressService::new(
                Arc::new(InMemoryAddressStore::new()),
                Arc::new(events),
            );
            let owner_id = Uuid::new_v4();
            let mut counter = 0u32;

            for op in ops {
                let current = service.list(owner_id).await.expect("list");
                match op {
                    AddressOp::Create { default } => {
                        counter += 1;
                        service
                            .create(NewAddress {
                                owner_id,
                                recipient: format!("Recipient {}", counter),
                                phone: "0901234567".to_string(),
                                line1: "12 Nguyen Trai".to_string(),
                                line2: None,
                                city: "Ho Chi Minh City".to_string(),
                                province: "HCM".to_string(),
                                postal_code: "700000".to_string(),
                                country_code: "VN".to_string(),
                                is_default: default,
                            })
                            .await
                            .expect("create");
                    }
                    AddressOp::Delete { pick } if !current.is_empty() => {
                        let target = current[pick % current.len()].id;
                        service.delete(target).await.expect("delete");
                    }
                    AddressOp::SetDefault { pick } if !current.is_empty() => {
                        let target = current[pick % current.len()].id;
                        service.set_default(owner_id, target).await.expect("set default");
                    }
                    AddressOp::UpdateDefault { pick } if !current.is_empty() => {
                        let target = current[pick % current.len()].id;
                        service
                            .update(
                                target,
                                AddressUpdate {
                                    is_default: Some(true),
                                    ..AddressUpdate::default()
                                },
                            )
                            .await
                            .expect("update");
                    }
                    // Operations on an empty address book are skipped.
                    _ => {}
                }

                let after = service.list(owner_id).await.expect("list");
                let defaults = after.iter().filter(|a| a.is_default).count();
                if after.is_empty() {
                    prop_assert_eq!(defaults, 0);
                } else {
                    prop_assert_eq!(defaults, 1);
                }
            }
            Ok(())
        })?;
    }
}
