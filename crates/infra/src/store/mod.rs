//! Entity store boundary.
//!
//! Typed insert/get/update/delete/list for products and reviews, plus the atomic
//! rating and vote statements. Two backends share the trait: Postgres for real
//! deployments and an in-memory map for tests/dev.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;
pub use r#trait::{
    CatalogStore, Page, ProductStore, RatingStore, ReviewStore, StoreError, StoreResult,
};
