pub mod matcher;

pub use matcher::{AudioFeatureMatcher, ToleranceMode, Violation};
