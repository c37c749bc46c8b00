use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::Error;
use std::sync::Arc;

use super::DBPool;
use crate::db::models::category::{Category, NewCategory};
use crate::db::postgres::schema::categories::dsl::*;

/// Repository struct holding the connection pool for Category operations
#[derive(Clone)]
pub struct CategoryRepository {
    pool: Arc<DBPool>,
}

impl CategoryRepository {
    pub fn new(pool: Arc<DBPool>) -> Self {
        CategoryRepository { pool }
    }

    fn get_conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, Error> {
        self.pool.get().map_err(|e| {
            Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UnableToSendCommand,
                Box::new(format!("Failed to get DB connection: {}", e)),
            )
        })
    }

    pub fn create(&self, new_item: NewCategory) -> Result<Category, Error> {
        let mut conn = self.get_conn()?;
        diesel::insert_into(categories)
            .values(&new_item)
            .returning(Category::as_returning())
            .get_result(&mut conn)
    }

    pub fn find(&self, pk_id: i32) -> Result<Option<Category>, Error> {
        let mut conn = self.get_conn()?;
        categories
            .find(pk_id)
            .select(Category::as_select())
            .first(&mut conn)
            .optional()
    }

    pub fn find_by_name(&self, category_name: &str) -> Result<Option<Category>, Error> {
        let mut conn = self.get_conn()?;
        categories
            .filter(name.eq(category_name))
            .select(Category::as_select())
            .first(&mut conn)
            .optional()
    }

    /// All categories ordered by id.
    pub fn find_all(&self) -> Result<Vec<Category>, Error> {
        let mut conn = self.get_conn()?;
        categories
            .order(id.asc())
            .select(Category::as_select())
            .load(&mut conn)
    }

    /// Returns the number of deleted rows (0 or 1). Fails with a foreign key
    /// violation while products still reference the category.
    pub fn delete(&self, pk_id: i32) -> Result<usize, Error> {
        let mut conn = self.get_conn()?;
        diesel::delete(categories.find(pk_id)).execute(&mut conn)
    }
}
