pub mod config;
pub mod error;
pub mod io;
pub mod marketplace;
pub mod paths;
pub mod primitives;
pub mod registry;
pub mod semver;
pub mod validate;
pub mod workbench;

pub use error::{AgondaError, ErrorKind, Result};
