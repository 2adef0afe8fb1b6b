pub mod combinations;
pub mod runner;

pub use crate::model::{Combination, ExecutionMode};
pub use combinations::{CombinationSpace, Combinations};
pub use runner::Runner;
