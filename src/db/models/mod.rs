// Declare model modules
pub mod category;
pub mod product;
