use diesel::prelude::*;
use serde::Serialize;

use crate::db::postgres::schema::categories;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Serialize)]
#[diesel(table_name = categories)]
#[diesel(primary_key(id))]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = categories)]
pub struct NewCategory {
    pub name: String,
}
