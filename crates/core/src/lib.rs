//! Core library: collection scanning, color sampling, metadata extraction,
//! and cache reconciliation.

pub mod colors;
pub mod config;
pub mod extractor;
pub mod reconcile;
pub mod scanner;
