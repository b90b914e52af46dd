pub mod complex;
pub mod error;
