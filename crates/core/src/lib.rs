//! `catalog-core`: building blocks shared by the catalog crates.
//!
//! This crate contains **pure** primitives (no IO): the error taxonomy, typed ids,
//! optimistic versions, field validation and the pagination/filter engine.

pub mod entity;
pub mod error;
pub mod id;
pub mod pagination;
pub mod validator;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, FieldErrors};
pub use id::{ProductId, ReviewId};
pub use pagination::{
    Filters, ListQuery, Metadata, SortDirection, Window, build_metadata, compute_window,
    resolve_sort,
};
pub use validator::Validator;
pub use version::ExpectedVersion;
