pub mod categories;
pub mod health;
pub mod payloads;
pub mod products;
