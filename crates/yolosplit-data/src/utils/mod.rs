//! Utility modules

pub mod fs;
pub mod image;

pub use fs::{CopyFile, MoveFile};
pub use image::ImageUtils;
