#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Authenticated session layer for the Cadre API.
//!
//! Layout:
//! - `client.rs`: the request pipeline, login/logout, retry-once and
//!   background token maintenance
//! - `session.rs`: shared session state, snapshots, and event publication
//! - `refresh.rs`: single-flight refresh gate
//! - `store.rs`: persisted session storage
//! - `token.rs`: claim decoding and expiry resolution
//! - `error.rs`: the error taxonomy surfaced to callers

pub mod client;
pub mod error;
mod refresh;
mod session;
mod store;
mod token;

pub use client::{ApiClient, ApiRequest};
pub use error::{ApiError, ApiResult};
pub use reqwest::Method;
pub use session::SessionSnapshot;
