//! Content-addressed storage for game mod bundles.
//!
//! Uploaded archives are validated and unpacked into deduplicated blobs;
//! each instance maps install paths to blob hashes, and a collector
//! reclaims content no instance references.

pub mod archive;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod gc;
pub mod index;
pub mod locks;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

pub use error::VaultError;
pub use state::VaultState;
