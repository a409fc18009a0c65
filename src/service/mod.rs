//! Input handling shared by the write handlers: payload merging and row validation.

mod merger;
mod validation;
pub use merger::{blank_row, merge, Submission};
pub use validation::{RowValidator, Violation};
