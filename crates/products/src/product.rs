use serde::{Deserialize, Serialize};

use catalog_core::validator::char_len;
use catalog_core::{DomainResult, Entity, ProductId, Validator};

pub const NAME_MAX_CHARS: usize = 100;
pub const CATEGORY_MAX_CHARS: usize = 50;
pub const IMAGE_URL_MAX_CHARS: usize = 255;

/// Columns a product listing may be sorted by (optionally `-`-prefixed).
pub const SORT_SAFELIST: &[&str] = &["id", "name", "category", "average_rating"];

/// A catalog product as stored.
///
/// `average_rating` is derived from the product's reviews and is never written
/// from caller input; `id` and `version` are store-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub image_url: String,
    pub average_rating: f64,
    pub version: i32,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub image_url: String,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        let mut v = Validator::new();
        validate_fields(&mut v, &self.name, &self.category, &self.image_url);
        v.finish()
    }
}

/// Partial update: `None` leaves the stored value unchanged, `Some("")` is an
/// explicit (and invalid) empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.category.is_none() && self.image_url.is_none()
    }

    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(image_url) = self.image_url {
            product.image_url = image_url;
        }
    }
}

/// Validate the client-settable fields of a (possibly patched) product.
pub fn validate_product(product: &Product) -> DomainResult<()> {
    let mut v = Validator::new();
    validate_fields(&mut v, &product.name, &product.category, &product.image_url);
    v.finish()
}

fn validate_fields(v: &mut Validator, name: &str, category: &str, image_url: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        char_len(name) <= NAME_MAX_CHARS,
        "name",
        "must not be more than 100 characters",
    );
    v.check(!category.is_empty(), "category", "must be provided");
    v.check(
        char_len(category) <= CATEGORY_MAX_CHARS,
        "category",
        "must not be more than 50 characters",
    );
    v.check(!image_url.is_empty(), "image_url", "must be provided");
    v.check(
        char_len(image_url) <= IMAGE_URL_MAX_CHARS,
        "image_url",
        "must not be more than 255 characters",
    );
}

/// Listing predicates. An absent (or empty) predicate matches every product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    name: Option<String>,
    category: Option<String>,
}

impl ProductFilter {
    pub fn new(name: Option<String>, category: Option<String>) -> Self {
        Self {
            name: name.filter(|s| !s.is_empty()),
            category: category.filter(|s| !s.is_empty()),
        }
    }

    /// Case-insensitive substring on `name`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Case-insensitive substring on `category`.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn matches(&self, product: &Product) -> bool {
        contains_ci(&product.name, self.name())
            && contains_ci(&product.category, self.category())
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::DomainError;

    fn widget() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Widget".to_string(),
            category: "Tools".to_string(),
            image_url: "https://img.example/widget.png".to_string(),
            average_rating: 0.0,
            version: 1,
        }
    }

    #[test]
    fn new_product_with_all_fields_is_valid() {
        let input = NewProduct {
            name: "Widget".to_string(),
            category: "Tools".to_string(),
            image_url: "https://img.example/widget.png".to_string(),
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn new_product_reports_every_missing_field() {
        let input = NewProduct {
            name: String::new(),
            category: String::new(),
            image_url: String::new(),
        };

        let DomainError::Validation(errors) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("name"), Some("must be provided"));
        assert_eq!(errors.get("category"), Some("must be provided"));
        assert_eq!(errors.get("image_url"), Some("must be provided"));
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let mut product = widget();
        product.name = "n".repeat(101);
        product.category = "c".repeat(51);
        product.image_url = "u".repeat(256);

        let DomainError::Validation(errors) = validate_product(&product).unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("name"), Some("must not be more than 100 characters"));
        assert_eq!(errors.get("category"), Some("must not be more than 50 characters"));
        assert_eq!(errors.get("image_url"), Some("must not be more than 255 characters"));
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut product = widget();
        ProductPatch {
            category: Some("Hardware".to_string()),
            ..Default::default()
        }
        .apply(&mut product);

        assert_eq!(product.name, "Widget");
        assert_eq!(product.category, "Hardware");
        assert_eq!(product.version, 1);
    }

    #[test]
    fn patch_with_empty_value_fails_validation() {
        let mut product = widget();
        ProductPatch {
            name: Some(String::new()),
            ..Default::default()
        }
        .apply(&mut product);

        assert!(validate_product(&product).is_err());
    }

    #[test]
    fn empty_predicates_are_inactive() {
        let filter = ProductFilter::new(Some(String::new()), None);
        assert_eq!(filter, ProductFilter::default());
        assert!(filter.matches(&widget()));
    }

    #[test]
    fn predicates_match_case_insensitive_substrings() {
        let product = widget();
        assert!(ProductFilter::new(Some("dge".into()), Some("TOOL".into())).matches(&product));
        assert!(!ProductFilter::new(Some("gadget".into()), None).matches(&product));
        assert!(!ProductFilter::new(None, Some("garden".into())).matches(&product));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any in-bounds, non-empty field set validates.
            #[test]
            fn in_bounds_products_validate(
                name in "[A-Za-z0-9 ]{1,100}",
                category in "[a-z]{1,50}",
                image_url in "https://[a-z]{1,200}",
            ) {
                let input = NewProduct { name, category, image_url };
                prop_assert!(input.validate().is_ok());
            }

            /// Property: an empty patch never changes the product.
            #[test]
            fn empty_patch_is_identity(name in "[A-Za-z]{1,20}") {
                let mut product = widget();
                product.name = name;
                let before = product.clone();
                ProductPatch::default().apply(&mut product);
                prop_assert_eq!(before, product);
            }
        }
    }
}
