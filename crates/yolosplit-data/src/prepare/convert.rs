//! Raw pixel-box annotations to normalized detection labels

use crate::bbox::{AbsoluteBox, LabelFile, LabelFileError};
use crate::dataset::{LABEL_SUFFIX, normalize_ext};
use crate::error::{DatasetError, Result};
use crate::utils::ImageUtils;
use crate::utils::fs::{ensure_dirs, files_with_suffix, stem_before};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertStats {
    pub converted: usize,
    pub skipped_missing_image: usize,
    pub objects: usize,
}

/// Convert the text of one raw annotation file for an image of the given size
pub fn convert_text(text: &str, width: u32, height: u32) -> std::result::Result<LabelFile, LabelFileError> {
    let mut labels = LabelFile::new();
    for (line_num, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let label = AbsoluteBox::parse(line)
            .and_then(|raw| raw.to_yolo(width, height))
            .map_err(|source| LabelFileError {
                line: line_num + 1,
                source,
            })?;
        labels.push(label);
    }
    Ok(labels)
}

/// Convert every `*.txt` in `raw_dir` whose image exists in `images_dir`,
/// writing same-named label files into `out_dir`
pub fn convert_annotations(
    raw_dir: &Path,
    images_dir: &Path,
    image_ext: &str,
    out_dir: &Path,
) -> Result<ConvertStats> {
    ensure_dirs([out_dir])?;
    let ext = normalize_ext(image_ext);
    let mut stats = ConvertStats::default();

    for path in files_with_suffix(raw_dir, LABEL_SUFFIX)? {
        let Some(stem) = stem_before(&path, LABEL_SUFFIX) else {
            continue;
        };
        let image = images_dir.join(format!("{stem}{ext}"));
        if !image.is_file() {
            debug!("No image for {:?}, skipping", path);
            stats.skipped_missing_image += 1;
            continue;
        }

        let (width, height) = ImageUtils::dimensions(&image)?;
        let text = fs::read_to_string(&path).map_err(|e| DatasetError::io(&path, e))?;
        let labels = convert_text(&text, width, height).map_err(|source| DatasetError::Parse {
            path: path.clone(),
            source,
        })?;

        let target = out_dir.join(format!("{stem}{LABEL_SUFFIX}"));
        fs::write(&target, labels.to_text()).map_err(|e| DatasetError::io(&target, e))?;
        stats.converted += 1;
        stats.objects += labels.len();
    }

    info!(
        "Converted {} annotation files ({} objects, {} without image) into {:?}",
        stats.converted, stats.objects, stats.skipped_missing_image, out_dir
    );
    Ok(stats)
}
