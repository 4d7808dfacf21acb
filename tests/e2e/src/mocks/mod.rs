//! Synthetic data generators for scenario tests.

mod fixtures;

pub use fixtures::{BatchConfig, TestDataFactory, TestScenario};
