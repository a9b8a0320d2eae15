//! Infrastructure layer: entity stores, concurrency guard, rating maintenance and
//! the catalog service that ties them together.

pub mod db;
pub mod error;
pub mod guard;
pub mod ratings;
pub mod service;
pub mod store;
pub mod workers;

pub use error::{CatalogError, CatalogResult};
pub use guard::ConcurrencyGuard;
pub use ratings::RatingMaintainer;
pub use service::CatalogService;
pub use store::{
    CatalogStore, InMemoryCatalogStore, Page, PostgresCatalogStore, StoreError, StoreResult,
};
pub use workers::{RatingSweepWorker, WorkerHandle};

#[cfg(test)]
mod integration_tests;
