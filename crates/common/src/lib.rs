//! Shared plain types used by every oceanview crate.

mod types;

pub use types::{ClearColor, Extent2d};
