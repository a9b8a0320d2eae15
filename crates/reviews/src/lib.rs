//! Reviews domain module.
//!
//! Customer reviews attached to a product: rating/content rules, partial updates
//! and listing predicates. Deterministic logic only.

pub mod review;

pub use review::{NewReview, Review, ReviewFilter, ReviewPatch, SORT_SAFELIST, validate_review};
