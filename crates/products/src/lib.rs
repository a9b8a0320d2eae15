//! Products domain module.
//!
//! Business rules for catalog products: field constraints, partial updates and
//! listing predicates. Deterministic logic only (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    NewProduct, Product, ProductFilter, ProductPatch, SORT_SAFELIST, validate_product,
};
