pub mod arch;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod optimization;
mod test;
pub mod training;

pub use error::{NetError, Result};
