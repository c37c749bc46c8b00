use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::Error;
use std::sync::Arc;

use super::DBPool;
use crate::db::models::category::Category;
use crate::db::models::product::{NewProduct, Product, ProductChanges};
use crate::db::postgres::schema::{categories, products};
use crate::filters::ProductFilter;

/// Repository struct holding the connection pool for Product operations
#[derive(Clone)]
pub struct ProductRepository {
    pool: Arc<DBPool>,
}

impl ProductRepository {
    pub fn new(pool: Arc<DBPool>) -> Self {
        ProductRepository { pool }
    }

    fn get_conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, Error> {
        self.pool.get().map_err(|e| {
            Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UnableToSendCommand,
                Box::new(format!("Failed to get DB connection: {}", e)),
            )
        })
    }

    pub fn create(&self, new_item: NewProduct) -> Result<Product, Error> {
        let mut conn = self.get_conn()?;
        diesel::insert_into(products::table)
            .values(&new_item)
            .returning(Product::as_returning())
            .get_result(&mut conn)
    }

    pub fn find(&self, pk_id: i32) -> Result<Option<Product>, Error> {
        let mut conn = self.get_conn()?;
        products::table
            .find(pk_id)
            .select(Product::as_select())
            .first(&mut conn)
            .optional()
    }

    /// Finds a product together with the category it belongs to.
    pub fn find_with_category(&self, pk_id: i32) -> Result<Option<(Product, Category)>, Error> {
        let mut conn = self.get_conn()?;
        products::table
            .inner_join(categories::table)
            .filter(products::id.eq(pk_id))
            .select((Product::as_select(), Category::as_select()))
            .first(&mut conn)
            .optional()
    }

    pub fn exists_by_name(&self, product_name: &str) -> Result<bool, Error> {
        let mut conn = self.get_conn()?;
        diesel::select(diesel::dsl::exists(
            products::table.filter(products::name.eq(product_name)),
        ))
        .get_result(&mut conn)
    }

    /// Products matching every populated field of `filter`, ordered by id.
    pub fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, Error> {
        let mut conn = self.get_conn()?;
        let mut query = products::table
            .inner_join(categories::table)
            .select(Product::as_select())
            .order(products::id.asc())
            .into_boxed();

        if !filter.categories.is_empty() {
            query = query.filter(categories::name.eq_any(filter.categories.clone()));
        }
        if let Some(min) = &filter.min_price {
            query = query.filter(products::price.ge(min.clone()));
        }
        if let Some(max) = &filter.max_price {
            query = query.filter(products::price.le(max.clone()));
        }
        if let Some(pattern) = filter.name_pattern() {
            query = query.filter(products::name.ilike(pattern));
        }

        query.load(&mut conn)
    }

    /// Applies `changes` and stamps `updated_at`.
    pub fn update(&self, pk_id: i32, mut changes: ProductChanges) -> Result<Option<Product>, Error> {
        let mut conn = self.get_conn()?;
        changes.updated_at = Some(Utc::now());
        diesel::update(products::table.find(pk_id))
            .set(&changes)
            .returning(Product::as_returning())
            .get_result(&mut conn)
            .optional()
    }

    /// Returns the number of deleted rows (0 or 1).
    pub fn delete(&self, pk_id: i32) -> Result<usize, Error> {
        let mut conn = self.get_conn()?;
        diesel::delete(products::table.find(pk_id)).execute(&mut conn)
    }
}
