pub mod addresses;
pub mod cart_reconciler;
pub mod cart_storage;
pub mod checkout;
pub mod payment_flow;
pub mod variant_resolver;

pub use addresses::{AddressService, AddressStore, InMemoryAddressStore, SeaOrmAddressStore};
pub use cart_reconciler::{CartMode, CartReconciler, MutationOutcome};
pub use cart_storage::{CartStorage, InMemoryCartStorage, JsonFileCartStorage};
pub use checkout::{CheckoutService, PlaceOrderRequest};
pub use payment_flow::{
    PaymentFlowService, PaymentProgress, PaymentSession, PaymentSessionHandle,
    PaymentSessionState, PaymentSignal,
};
pub use variant_resolver::{ProductSelection, Resolution, ResolvedSelection, VariantResolver};
