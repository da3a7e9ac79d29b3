//! Catalog synchronizer
//!
//! Publishes rasters as layers of a remote map catalog through the
//! [`CatalogClient`] interface. [`RestCatalogClient`] speaks the GeoServer
//! REST dialect.

mod client;
mod error;
mod rest_client;
mod synchronizer;

#[cfg(test)]
pub(crate) mod mock;

pub use client::CatalogClient;
pub use error::{CatalogError, Result};
pub use rest_client::RestCatalogClient;
pub use synchronizer::{CatalogSynchronizer, store_name};
