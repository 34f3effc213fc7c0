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

//! Typed configuration for the Cadre client.
//!
//! Layout: `model.rs` (the [`ClientConfig`] model and defaults),
//! `validate.rs` (validation/parsing helpers), `loader.rs` (environment and
//! profile-file loading).

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_API_URL, ENV_CONFIG_FILE, ProfileFile, load, resolve};
pub use model::ClientConfig;
