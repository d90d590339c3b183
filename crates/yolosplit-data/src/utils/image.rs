//! Image helpers on top of the `image` crate

use crate::error::{DatasetError, Result};
use std::path::Path;

/// Extensions treated as images when scanning raw dataset trees
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct ImageUtils;

impl ImageUtils {
    /// Width and height, read from the header without decoding pixels
    pub fn dimensions<P: AsRef<Path>>(path: P) -> Result<(u32, u32)> {
        image::image_dimensions(path.as_ref()).map_err(|source| DatasetError::Image {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    /// Case-insensitive check against [`IMAGE_EXTENSIONS`]
    pub fn is_image_file<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}
