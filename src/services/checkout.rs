use crate::{
    clients::order_api::{CreateOrderRequest, OrderApi},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        address::Address,
        cart::CartItem,
        order::{Order, OrderItem, PaymentMethod},
    },
    services::cart_reconciler::CartReconciler,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Checkout input. Items and totals come from the reconciled cart, not
/// from the caller.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub customer_id: Uuid,
    pub payment_method: PaymentMethod,
    pub shipping_address: Option<Address>,
    pub notes: Option<String>,
}

/// Converts the reconciled cart into an order.
///
/// The cart lines are snapshotted (name, unit price, quantity) at
/// order-creation time, the order service owns the resulting record, and
/// the cart is consumed afterwards.
#[derive(Clone)]
pub struct CheckoutService {
    orders: Arc<dyn OrderApi>,
    reconciler: Arc<CartReconciler>,
    events: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderApi>,
        reconciler: Arc<CartReconciler>,
        events: Arc<EventSender>,
    ) -> Self {
        Self {
            orders,
            reconciler,
            events,
        }
    }

    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn place_order(&self, input: PlaceOrderRequest) -> Result<Order, ServiceError> {
        let cart = self.reconciler.cart().await;
        if cart.items.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let items: Vec<OrderItem> = cart.items.iter().map(snapshot_line).collect();
        let request = CreateOrderRequest {
            customer_id: input.customer_id,
            payment_method: input.payment_method,
            currency: cart.currency.clone(),
            total: cart.subtotal(),
            items,
            shipping_address: input.shipping_address,
            notes: input.notes,
        };
        request.validate()?;

        let order = self.orders.create_order(&request).await?;

        // The cart is consumed by the order. A degraded clear is tolerable:
        // the server-held cart was already converted.
        match self.reconciler.clear().await {
            Ok(outcome) if outcome.is_degraded() => {
                warn!(order_id = %order.id, "Cart clear fell back to local state");
            }
            Ok(_) => {}
            Err(error) => {
                warn!(order_id = %order.id, %error, "Cart clear failed after order creation");
            }
        }

        self.events.send_or_log(Event::OrderCreated(order.id)).await;
        info!(order_id = %order.id, order_number = %order.order_number, "Order created");
        Ok(order)
    }
}

fn snapshot_line(item: &CartItem) -> OrderItem {
    OrderItem {
        product_id: item.product_id,
        variant_id: item.variant_id,
        name: item.name.clone(),
        unit_price: item.unit_price,
        quantity: item.quantity,
        line_total: item.line_total(),
        warranty_package_ids: item.warranty_package_ids.clone(),
    }
}
