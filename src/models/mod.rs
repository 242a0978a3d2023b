pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;

pub use address::Address;
pub use cart::{Cart, CartItem, NewCartItem};
pub use catalog::{Attribute, AttributeValue, Product, Variant};
pub use order::{
    BankTransferInstructions, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
};
