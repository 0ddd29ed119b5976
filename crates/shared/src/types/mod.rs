//! Common types used across the application.

pub mod id;
pub mod money;
pub mod pagination;

pub use id::*;
pub use money::{
    DISPLAY_SCALE, FUNCTIONAL_SCALE, round_display, round_functional, rounding_tolerance,
};
pub use pagination::KeysetPage;
