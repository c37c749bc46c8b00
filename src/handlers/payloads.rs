//! Request bodies, response bodies and the validation that turns one into
//! the other.

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::category::Category;
use crate::db::models::product::{NewProduct, Product, ProductChanges};
use crate::error::{ApiError, ApiResult, FieldErrors, NON_FIELD_ERRORS};
use crate::pricing::{self, PricingError, MAX_DISCOUNT};

pub const PRODUCT_NAME_MAX_LEN: usize = 50;
pub const CATEGORY_NAME_MAX_LEN: usize = 100;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
// NUMERIC(12, 2)
const MAX_PRICE: f64 = 9_999_999_999.99;

fn default_true() -> bool {
    true
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProductPayload {
    pub name: String,
    pub category_id: i32,
    pub price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub discount: i32,
    #[serde(default = "default_true")]
    pub available: bool,
    pub cost_price: f64,
}

/// Body of `PATCH /v0/products/:id`; absent fields keep their stored value.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
    pub discount: Option<i32>,
    pub available: Option<bool>,
    pub cost_price: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CategoryPayload {
    pub name: String,
}

/// A product with every field validated, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidProduct {
    pub name: String,
    pub category_id: i32,
    pub price: BigDecimal,
    pub quantity: i32,
    pub discount: i32,
    pub available: bool,
    pub cost_price: BigDecimal,
}

impl ValidProduct {
    pub fn into_new(self) -> NewProduct {
        NewProduct {
            name: self.name,
            category_id: self.category_id,
            price: self.price,
            quantity: self.quantity,
            discount: self.discount,
            available: self.available,
            cost_price: self.cost_price,
        }
    }

    pub fn into_changes(self) -> ProductChanges {
        ProductChanges {
            name: Some(self.name),
            category_id: Some(self.category_id),
            price: Some(self.price),
            quantity: Some(self.quantity),
            discount: Some(self.discount),
            available: Some(self.available),
            cost_price: Some(self.cost_price),
            updated_at: None,
        }
    }
}

struct Draft {
    name: String,
    category_id: i32,
    price: Option<BigDecimal>,
    quantity: i32,
    discount: i32,
    available: bool,
    cost_price: Option<BigDecimal>,
}

impl ProductPayload {
    pub fn validate(&self, loss_factor: f64) -> ApiResult<ValidProduct> {
        let mut errors = FieldErrors::new();
        let draft = Draft {
            name: self.name.trim().to_string(),
            category_id: self.category_id,
            price: money(&mut errors, "price", self.price),
            quantity: self.quantity,
            discount: self.discount,
            available: self.available,
            cost_price: money(&mut errors, "cost_price", self.cost_price),
        };
        draft.finish(errors, loss_factor)
    }
}

impl ProductPatch {
    /// Merges the patch over `current` and validates the result as a whole,
    /// so the loss rule also holds for partial updates.
    pub fn merge(&self, current: &Product, loss_factor: f64) -> ApiResult<ValidProduct> {
        let mut errors = FieldErrors::new();
        let draft = Draft {
            name: self
                .name
                .as_deref()
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| current.name.clone()),
            category_id: self.category_id.unwrap_or(current.category_id),
            price: match self.price {
                Some(p) => money(&mut errors, "price", p),
                None => Some(current.price.clone()),
            },
            quantity: self.quantity.unwrap_or(current.quantity),
            discount: self.discount.unwrap_or(current.discount),
            available: self.available.unwrap_or(current.available),
            cost_price: match self.cost_price {
                Some(p) => money(&mut errors, "cost_price", p),
                None => Some(current.cost_price.clone()),
            },
        };
        draft.finish(errors, loss_factor)
    }
}

impl Draft {
    fn finish(self, mut errors: FieldErrors, loss_factor: f64) -> ApiResult<ValidProduct> {
        if self.name.is_empty() {
            errors.add("name", "This field may not be blank.");
        } else if self.name.chars().count() > PRODUCT_NAME_MAX_LEN {
            errors.add(
                "name",
                format!("Ensure this field has no more than {} characters.", PRODUCT_NAME_MAX_LEN),
            );
        }
        if self.quantity < 0 {
            errors.add("quantity", "Ensure this value is greater than or equal to 0.");
        }
        if !(0..=MAX_DISCOUNT).contains(&self.discount) {
            errors.add(
                "discount",
                format!("Ensure this value is between 0 and {}.", MAX_DISCOUNT),
            );
        }

        let (Some(price), Some(cost_price)) = (self.price, self.cost_price) else {
            return Err(ApiError::Validation(errors));
        };
        errors.into_result()?;

        if let Err(e) = pricing::check_loss(&price, self.discount, &cost_price, loss_factor) {
            let mut errors = FieldErrors::new();
            match e {
                PricingError::DiscountOutOfRange => errors.add("discount", e.to_string()),
                PricingError::BelowCost | PricingError::InvalidLossFactor(_) => {
                    errors.add(NON_FIELD_ERRORS, e.to_string())
                }
            }
            return Err(ApiError::Validation(errors));
        }

        Ok(ValidProduct {
            name: self.name,
            category_id: self.category_id,
            price,
            quantity: self.quantity,
            discount: self.discount,
            available: self.available,
            cost_price,
        })
    }
}

fn money(errors: &mut FieldErrors, field: &str, value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        errors.add(field, "A valid number is required.");
        return None;
    }
    if value < 0.0 {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
        return None;
    }
    if value > MAX_PRICE {
        errors.add(field, "Ensure that there are no more than 12 digits in total.");
        return None;
    }
    match BigDecimal::from_f64(value) {
        Some(d) => Some(d.round(2)),
        None => {
            errors.add(field, "A valid number is required.");
            None
        }
    }
}

impl CategoryPayload {
    pub fn validate(&self) -> ApiResult<String> {
        let mut errors = FieldErrors::new();
        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "This field may not be blank.");
        } else if name.chars().count() > CATEGORY_NAME_MAX_LEN {
            errors.add(
                "name",
                format!("Ensure this field has no more than {} characters.", CATEGORY_NAME_MAX_LEN),
            );
        }
        errors.into_result()?;
        Ok(name.to_string())
    }
}

/// Entry of the public product listing.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductSearchItem {
    pub id: i32,
    pub name: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<f64>,
}

impl From<&Product> for ProductSearchItem {
    fn from(product: &Product) -> Self {
        ProductSearchItem {
            id: product.id,
            name: product.name.clone(),
            price: to_f64(&product.price),
            discounted_price: pricing::effective_discounted_price(&product.price, product.discount)
                .as_ref()
                .map(to_f64),
        }
    }
}

/// Public product detail. Discount fields are left out when no discount applies.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductDetail {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<i32>,
    pub quantity: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductDetail {
    pub fn new(product: &Product, category: &Category) -> Self {
        let discounted = pricing::effective_discounted_price(&product.price, product.discount);
        ProductDetail {
            id: product.id,
            name: product.name.clone(),
            category: category.name.clone(),
            price: to_f64(&product.price),
            discounted_price: discounted.as_ref().map(to_f64),
            discount: discounted.map(|_| product.discount),
            quantity: product.quantity,
            created_at: format_timestamp(&product.created_at),
            updated_at: format_timestamp(&product.updated_at),
        }
    }
}

/// Full product as seen by admins.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
    pub category: String,
    pub price: f64,
    pub quantity: i32,
    pub discount: i32,
    pub available: bool,
    pub cost_price: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductResponse {
    pub fn new(product: &Product, category: &Category) -> Self {
        ProductResponse {
            id: product.id,
            name: product.name.clone(),
            category_id: product.category_id,
            category: category.name.clone(),
            price: to_f64(&product.price),
            quantity: product.quantity,
            discount: product.discount,
            available: product.available,
            cost_price: to_f64(&product.cost_price),
            created_at: format_timestamp(&product.created_at),
            updated_at: format_timestamp(&product.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn payload() -> ProductPayload {
        ProductPayload {
            name: "Keyboard".to_string(),
            category_id: 1,
            price: 100.0,
            quantity: 5,
            discount: 0,
            available: true,
            cost_price: 60.0,
        }
    }

    fn stored() -> Product {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 15).unwrap();
        Product {
            id: 7,
            name: "Keyboard".to_string(),
            category_id: 1,
            price: BigDecimal::from(100),
            quantity: 5,
            discount: 10,
            available: true,
            cost_price: BigDecimal::from(60),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn field_errors(result: ApiResult<ValidProduct>) -> FieldErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_payload_passes() {
        let valid = payload().validate(1.0).unwrap();
        assert_eq!(valid.name, "Keyboard");
        assert_eq!(valid.price, BigDecimal::from(100));
    }

    #[test]
    fn prices_are_rounded_to_cents() {
        let mut p = payload();
        p.price = 19.999;
        p.cost_price = 10.0;
        let valid = p.validate(1.0).unwrap();
        assert_eq!(valid.price, BigDecimal::from_str("20.00").unwrap());
    }

    #[test]
    fn field_errors_are_reported_together() {
        let mut p = payload();
        p.name = "  ".to_string();
        p.quantity = -1;
        p.price = -5.0;
        let errors = field_errors(p.validate(1.0));
        assert!(errors.get("name").is_some());
        assert!(errors.get("quantity").is_some());
        assert!(errors.get("price").is_some());
    }

    #[test]
    fn long_names_are_rejected() {
        let mut p = payload();
        p.name = "x".repeat(PRODUCT_NAME_MAX_LEN + 1);
        assert!(field_errors(p.validate(1.0)).get("name").is_some());
    }

    #[test]
    fn selling_below_cost_is_a_non_field_error() {
        let mut p = payload();
        p.discount = 50;
        let errors = field_errors(p.validate(1.0));
        assert_eq!(
            errors.get(NON_FIELD_ERRORS).unwrap()[0],
            "Product price after applying discount cannot be lower than the cost price."
        );
    }

    #[test]
    fn patch_is_checked_against_stored_values() {
        let patch = ProductPatch {
            cost_price: Some(95.0),
            ..Default::default()
        };
        // stored discount of 10% leaves 90, below the new cost of 95
        assert!(field_errors(patch.merge(&stored(), 1.0)).get(NON_FIELD_ERRORS).is_some());

        let patch = ProductPatch {
            quantity: Some(42),
            ..Default::default()
        };
        let merged = patch.merge(&stored(), 1.0).unwrap();
        assert_eq!(merged.quantity, 42);
        assert_eq!(merged.discount, 10);
    }

    #[test]
    fn category_name_is_trimmed_and_checked() {
        let ok = CategoryPayload { name: " Books ".to_string() }.validate().unwrap();
        assert_eq!(ok, "Books");
        assert!(CategoryPayload { name: "".to_string() }.validate().is_err());
    }

    #[test]
    fn search_item_hides_zero_discount() {
        let mut product = stored();
        product.discount = 0;
        let json = serde_json::to_value(ProductSearchItem::from(&product)).unwrap();
        assert!(json.get("discounted_price").is_none());

        let json = serde_json::to_value(ProductSearchItem::from(&stored())).unwrap();
        assert_eq!(json["discounted_price"], 90.0);
    }

    #[test]
    fn detail_formats_timestamps_and_discount() {
        let category = Category { id: 1, name: "Peripherals".to_string() };
        let detail = ProductDetail::new(&stored(), &category);
        assert_eq!(detail.created_at, "2024-05-01 09:30");
        assert_eq!(detail.discount, Some(10));
        assert_eq!(detail.discounted_price, Some(90.0));
        assert_eq!(detail.category, "Peripherals");
    }
}
