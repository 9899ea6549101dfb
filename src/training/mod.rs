mod trainer;

pub use trainer::{TestReport, Trainer};
