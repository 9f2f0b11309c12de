//! Integration tests for ddreloc-app.
//!
//! These tests run the full pipeline on synthetic data:
//! - Catalog and cross-correlation differential times
//! - Pair linking
//! - Relocation and artifact reuse

pub mod common;
