pub mod date_range;
pub mod period;
pub mod product;
pub mod traits;
