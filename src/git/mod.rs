pub mod ops;
pub mod repo;
