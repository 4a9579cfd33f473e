//! Core types and trait definitions for the Quill blogging platform.
//!
//! This crate holds the domain model (accounts, posts, payments), the
//! business rules that gate content creation (authorship resolution, tier
//! quotas, payment projection, lazy subscription expiry), and the traits
//! implemented by storage and gateway backends. It is deliberately free of
//! HTTP and database dependencies; all other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod author;
pub mod error;
pub mod gateway;
pub mod payment;
pub mod post;
pub mod store;
pub mod subscription;
pub mod tier;

pub use error::{Error, Result};
