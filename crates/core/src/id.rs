//! Strongly-typed identifiers used across the domain.
//!
//! Ids are store-assigned positive integers. Anything below 1 never resolves to a
//! row, so parsing is lenient and lookups treat such ids as not found.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

/// Identifier of a review.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(i64);

macro_rules! impl_serial_newtype {
    ($t:ty) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }

            /// Ids below 1 are never assigned by the store.
            pub const fn is_valid(self) -> bool {
                self.0 >= 1
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            /// Malformed and out-of-range ids both surface as not found.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.parse::<i64>().map_err(|_| DomainError::NotFound)?;
                let id = Self(value);
                if id.is_valid() { Ok(id) } else { Err(DomainError::NotFound) }
            }
        }
    };
}

impl_serial_newtype!(ProductId);
impl_serial_newtype!(ReviewId);
