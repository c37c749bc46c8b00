use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::models::category::Category;
use crate::db::postgres::schema::products;

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(table_name = products)]
#[diesel(belongs_to(Category))]
#[diesel(primary_key(id))]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
    pub price: BigDecimal,
    pub quantity: i32,
    pub discount: i32,
    pub available: bool,
    pub cost_price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = products)]
pub struct NewProduct {
    pub name: String,
    pub category_id: i32,
    pub price: BigDecimal,
    pub quantity: i32,
    pub discount: i32,
    pub available: bool,
    pub cost_price: BigDecimal,
}

/// Column updates for a product. `None` leaves the column untouched.
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = products)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub price: Option<BigDecimal>,
    pub quantity: Option<i32>,
    pub discount: Option<i32>,
    pub available: Option<bool>,
    pub cost_price: Option<BigDecimal>,
    pub updated_at: Option<DateTime<Utc>>,
}
