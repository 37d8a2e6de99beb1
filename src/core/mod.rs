pub mod dataset;
pub mod operations;
