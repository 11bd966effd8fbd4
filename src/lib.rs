//! Loader core for the Japan MOE environmental geoportal.
//!
//! Resolves a (dataset, prefecture) selection against the built-in catalog,
//! fetches the published vector payload (or synthesizes a feature-service
//! endpoint), reprojects it to the requested CRS, and materializes a styled
//! output layer. The last applied style per dataset is persisted and reused.

pub mod arcgis;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod output;
pub mod pipeline;
pub mod reproject;
pub mod style;
