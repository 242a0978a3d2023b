use crate::models::address::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Fulfillment status of an order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Payment status of an order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// How the shopper pays. Only bank-transfer QR is driven by this crate's
/// payment flow; other methods resolve to an external payment URL.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    BankTransferQr,
    Card,
    CashOnDelivery,
}

/// An order line, snapshotted from the cart at order-creation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    #[serde(default)]
    pub warranty_package_ids: Vec<Uuid>,
}

/// An order. Created once per checkout; only `status` and `payment_status`
/// move after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total: Decimal,
    pub currency: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether a re-payment attempt makes sense for this order.
    pub fn is_awaiting_payment(&self) -> bool {
        self.status != OrderStatus::Cancelled
            && matches!(
                self.payment_status,
                PaymentStatus::Pending | PaymentStatus::Failed
            )
    }
}

/// Bank-transfer details handed back by the order service when a
/// bank-transfer payment (or re-payment) session opens. The QR payload is
/// opaque to this crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BankTransferInstructions {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub transfer_memo: String,
    pub qr_payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn statuses_round_trip_through_wire_strings() {
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(OrderStatus::from_str("shipped").unwrap(), OrderStatus::Shipped);

        assert_eq!(PaymentStatus::Paid.to_string(), "paid");
        assert_eq!(
            PaymentStatus::from_str("refunded").unwrap(),
            PaymentStatus::Refunded
        );

        assert_eq!(PaymentMethod::BankTransferQr.to_string(), "bank_transfer_qr");
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert!(OrderStatus::from_str("misplaced").is_err());
    }

    #[test]
    fn repayment_only_for_unpaid_uncancelled_orders() {
        let mut order = Order {
            id: Uuid::new_v4(),
            order_number: "ORD-1A2B3C4D".to_string(),
            customer_id: Uuid::new_v4(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::BankTransferQr,
            total: Decimal::from(500000),
            currency: "VND".to_string(),
            items: Vec::new(),
            shipping_address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(order.is_awaiting_payment());

        order.payment_status = PaymentStatus::Paid;
        assert!(!order.is_awaiting_payment());

        order.payment_status = PaymentStatus::Failed;
        order.status = OrderStatus::Cancelled;
        assert!(!order.is_awaiting_payment());
    }
}
