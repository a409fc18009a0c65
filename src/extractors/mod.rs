//! Request extractors whose rejections render as API errors.

mod path;
mod submission;

pub use path::ApiPath;
