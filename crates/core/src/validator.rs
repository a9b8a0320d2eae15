//! Field validation collector.

use crate::error::{DomainError, DomainResult, FieldErrors};

/// Collects every failed check before reporting, keyed by field name.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.errors.add(field, message);
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.add(field, message);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// `Ok(())` when no check failed, otherwise a `Validation` error with all of them.
    pub fn finish(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.errors))
        }
    }
}

/// Length in characters, not bytes.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_all_failures() {
        let mut v = Validator::new();
        v.check(false, "name", "must be provided");
        v.check(true, "category", "must be provided");
        v.check(false, "image_url", "must be provided");

        match v.finish() {
            Err(DomainError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains("name"));
                assert!(errors.contains("image_url"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn char_len_counts_multibyte_once() {
        assert_eq!(char_len("héllo"), 5);
    }
}
