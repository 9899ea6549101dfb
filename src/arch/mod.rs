pub mod layers;
mod model;

pub use model::{Evaluation, Model};
