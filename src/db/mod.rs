// Declare database submodules
pub mod models;
pub mod postgres; // schema.rs and embedded migrations
pub mod repositories;
