//! Storefront Core Library
//!
//! This crate provides the correctness core of a retail storefront:
//! variant/stock/price resolution for configurable products, reconciliation
//! between a locally-held cart and the server-held cart, the order payment
//! lifecycle (including the time-boxed bank-transfer QR flow), and the
//! single-default shipping address invariant.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod clients;
pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;

pub use crate::config::AppConfig;
pub use crate::errors::ServiceError;
