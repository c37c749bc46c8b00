use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::{ApiResult, FieldErrors, NON_FIELD_ERRORS};

/// Raw query string of `GET /v0/products/search`.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ProductFilterParams {
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub name: Option<String>,
}

/// Parsed product search filter. Empty fields match everything.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProductFilter {
    pub categories: Vec<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub name: Option<String>,
}

impl ProductFilter {
    pub fn from_params(params: &ProductFilterParams) -> ApiResult<Self> {
        let mut errors = FieldErrors::new();

        let categories = params
            .category
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let min_price = parse_price(&mut errors, "min_price", params.min_price.as_deref());
        let max_price = parse_price(&mut errors, "max_price", params.max_price.as_deref());
        if let (Some(min), Some(max)) = (&min_price, &max_price) {
            if min > max {
                errors.add(NON_FIELD_ERRORS, "min_price cannot be greater than max_price.");
            }
        }

        let name = params
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        errors.into_result()?;
        Ok(Self {
            categories,
            min_price,
            max_price,
            name,
        })
    }

    /// `name` as an ILIKE pattern with wildcards in the input escaped.
    pub fn name_pattern(&self) -> Option<String> {
        self.name.as_ref().map(|name| {
            let escaped = name
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }
}

fn parse_price(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<BigDecimal> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match BigDecimal::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(field, "Enter a number.");
            None
        }
    }
}
