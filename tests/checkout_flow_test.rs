use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use rust_decimal_macros::dec;
use std::sync::Arc;
use storefront_core::{
    clients::{
        cart_api::CartApi,
        order_api::{CreateOrderRequest, OrderApi, RepayOutcome},
    },
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    models::{
        cart::{Cart, NewCartItem},
        order::{Order, OrderStatus, PaymentMethod, PaymentStatus},
    },
    services::{
        cart_reconciler::CartReconciler,
        cart_storage::InMemoryCartStorage,
        checkout::{CheckoutService, PlaceOrderRequest},
    },
};
use uuid::Uuid;

mock! {
    pub OrderService {}

    #[async_trait]
    impl OrderApi for OrderService {
        async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ServiceError>;
        async fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError>;
        async fn cancel_order(&self, order_id: Uuid) -> Result<Order, ServiceError>;
        async fn repay_order(&self, order_id: Uuid) -> Result<RepayOutcome, ServiceError>;
    }
}

mock! {
    pub CartService {}

    #[async_trait]
    impl CartApi for CartService {
        async fn get_cart(&self) -> Result<Option<Cart>, ServiceError>;
        async fn add_item(&self, item: &NewCartItem) -> Result<Cart, ServiceError>;
        async fn update_item(&self, item_id: Uuid, quantity: u32) -> Result<Cart, ServiceError>;
        async fn remove_item(&self, item_id: Uuid) -> Result<Cart, ServiceError>;
        async fn clear(&self) -> Result<Cart, ServiceError>;
    }
}

fn order_from_request(request: &CreateOrderRequest) -> Order {
    let order_id = Uuid::new_v4();
    Order {
        id: order_id,
        order_number: format!("ORD-{}", &order_id.simple().to_string()[..8].to_uppercase()),
        customer_id: request.customer_id,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: request.payment_method,
        total: request.total,
        currency: request.currency.clone(),
        items: request.items.clone(),
        shipping_address: request.shipping_address.clone(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn reconciler() -> Arc<CartReconciler> {
    let (events, _rx) = EventSender::channel(64);
    Arc::new(CartReconciler::new(
        Arc::new(MockCartService::new()),
        Arc::new(InMemoryCartStorage::new("VND")),
        Arc::new(events),
        Arc::new(AppConfig::default()),
    ))
}

fn cart_item(price: rust_decimal::Decimal, quantity: u32) -> NewCartItem {
    NewCartItem {
        product_id: Uuid::new_v4(),
        variant_id: None,
        name: "Aster X2".to_string(),
        unit_price: price,
        quantity,
        image: None,
        selected_attributes: None,
        warranty_package_ids: vec![Uuid::new_v4()],
    }
}

#[tokio::test]
async fn checkout_on_an_empty_cart_is_rejected() {
    let mut orders = MockOrderService::new();
    orders.expect_create_order().times(0);

    let (events, _rx) = EventSender::channel(64);
    let checkout = CheckoutService::new(Arc::new(orders), reconciler(), Arc::new(events));

    let err = checkout
        .place_order(PlaceOrderRequest {
            customer_id: Uuid::new_v4(),
            payment_method: PaymentMethod::BankTransferQr,
            shipping_address: None,
            notes: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn checkout_snapshots_the_cart_and_consumes_it() {
    let reconciler = reconciler();
    reconciler
        .add_item(cart_item(dec!(250000), 2), 50)
        .await
        .unwrap();
    reconciler
        .add_item(cart_item(dec!(120000), 1), 50)
        .await
        .unwrap();

    let mut orders = MockOrderService::new();
    orders
        .expect_create_order()
        .times(1)
        .withf(|request| {
            request.items.len() == 2
                && request.total == dec!(620000)
                && request.currency == "VND"
                && request
                    .items
                    .iter()
                    .all(|item| item.line_total == item.unit_price * rust_decimal::Decimal::from(item.quantity))
        })
        .returning(|request| Ok(order_from_request(request)));

    let (events, _rx) = EventSender::channel(64);
    let checkout = CheckoutService::new(Arc::new(orders), reconciler.clone(), Arc::new(events));

    let order = checkout
        .place_order(PlaceOrderRequest {
            customer_id: Uuid::new_v4(),
            payment_method: PaymentMethod::BankTransferQr,
            shipping_address: None,
            notes: Some("Deliver in the morning".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.total, dec!(620000));
    assert_eq!(order.items.len(), 2);

    // The cart was consumed by the order.
    assert!(reconciler.cart().await.items.is_empty());
}

#[tokio::test]
async fn order_creation_failure_leaves_the_cart_intact() {
    let reconciler = reconciler();
    reconciler
        .add_item(cart_item(dec!(250000), 1), 50)
        .await
        .unwrap();

    let mut orders = MockOrderService::new();
    orders
        .expect_create_order()
        .times(1)
        .returning(|_| Err(ServiceError::ExternalServiceError("order service down".to_string())));

    let (events, _rx) = EventSender::channel(64);
    let checkout = CheckoutService::new(Arc::new(orders), reconciler.clone(), Arc::new(events));

    let result = checkout
        .place_order(PlaceOrderRequest {
            customer_id: Uuid::new_v4(),
            payment_method: PaymentMethod::Card,
            shipping_address: None,
            notes: None,
        })
        .await;

    assert!(result.is_err());
    assert_eq!(reconciler.cart().await.items.len(), 1);
}
