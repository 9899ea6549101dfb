mod optimizer;
mod scheduler;

pub use optimizer::{Optimizer, Optimum};
pub use scheduler::LrPolicy;
