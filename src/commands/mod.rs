pub mod angle;
pub mod reduce;
pub mod resolve;
