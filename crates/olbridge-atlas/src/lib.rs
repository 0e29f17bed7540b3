//! # olbridge-atlas
//!
//! [`CatalogClient`](olbridge_core::CatalogClient) implementation for catalogs
//! exposing the Apache Atlas v2 REST API, including Microsoft Purview's
//! `/catalog` endpoint.
//!
//! Catalog identifiers are expected to be numeric. A lookup that returns a
//! non-numeric `guid` fails rather than being guessed at.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;

pub use client::AtlasCatalogClient;
pub use config::AtlasConfig;
