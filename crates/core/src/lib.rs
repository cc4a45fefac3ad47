//! Kaline Core - Shared types library.
//!
//! This crate provides the domain types used across the Kaline components:
//! - `commerce` - The client-side commerce state engine (catalog, cart, favorites)
//! - `cli` - Command-line front end driving the engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure normalizers - no I/O, no storage
//! access, no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, prices, products, cart lines and notifications

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
