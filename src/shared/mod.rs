//! Shared geometry types used by the window control unit and its driver.

pub mod window_state;

pub use window_state::{Corner, Geometry, Margin};
