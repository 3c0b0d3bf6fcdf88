//! Year-by-year net worth projection for a UK household portfolio.

pub mod api;
pub mod core;
