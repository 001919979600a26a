pub mod config;
pub mod primitives;
pub mod validate;
