//! Command implementations for the `mosaic` binary.

pub mod catalog;
pub mod config;
pub mod hash;
pub mod ingest;
pub mod output;
pub mod records;
pub mod search;
