//! Domain types for DDLab

pub mod price;

pub use price::PricePoint;
