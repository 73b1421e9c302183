//! Outlier detection by incremental grouping of values.

pub mod engine;

pub use engine::{group_values, Engine, Group, Member};
