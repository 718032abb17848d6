pub mod batch;
pub mod product;
