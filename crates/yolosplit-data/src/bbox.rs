//! Bounding box formats
//!
//! Raw annotations carry absolute pixel corners with a 1-indexed class;
//! detection labels carry a 0-indexed class and a center/size box
//! normalized to the image dimensions. A detection label's class is kept
//! as the token written in the file.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use yolosplit_core::{ClassCounts, ClassId};

/// Problem with a single annotation line
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid {field} value `{value}`")]
    Number { field: &'static str, value: String },

    #[error("raw class ids start at 1, found {0}")]
    ClassBase(i64),

    #[error("image size {width}x{height} cannot normalize a box")]
    EmptyImage { width: u32, height: u32 },
}

/// Line-numbered failure inside a label file (1-based)
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {source}")]
pub struct LabelFileError {
    pub line: usize,
    #[source]
    pub source: LineError,
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, LineError> {
    value.trim().parse().map_err(|_| LineError::Number {
        field,
        value: value.trim().to_string(),
    })
}

/// Pixel-space box from a raw annotation line `(x1,y1),(x2,y2),class`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
    /// 1-indexed class id
    pub class_id: u32,
}

impl AbsoluteBox {
    pub fn parse(line: &str) -> Result<Self, LineError> {
        let cleaned = line.replace(['(', ')'], "");
        let fields: Vec<&str> = cleaned.split(',').collect();
        if fields.len() != 5 {
            return Err(LineError::FieldCount {
                expected: 5,
                found: fields.len(),
            });
        }

        let class: i64 = parse_field("class", fields[4])?;
        if class < 1 {
            return Err(LineError::ClassBase(class));
        }
        let class_id = u32::try_from(class).map_err(|_| LineError::Number {
            field: "class",
            value: class.to_string(),
        })?;

        Ok(Self {
            x1: parse_field("x1", fields[0])?,
            y1: parse_field("y1", fields[1])?,
            x2: parse_field("x2", fields[2])?,
            y2: parse_field("y2", fields[3])?,
            class_id,
        })
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    /// Normalize against the image size, shifting the class to 0-indexed
    pub fn to_yolo(&self, image_width: u32, image_height: u32) -> Result<YoloLabel, LineError> {
        if image_width == 0 || image_height == 0 {
            return Err(LineError::EmptyImage {
                width: image_width,
                height: image_height,
            });
        }
        let w = f64::from(image_width);
        let h = f64::from(image_height);

        Ok(YoloLabel {
            class: ClassId::new((self.class_id - 1).to_string()),
            x_center: ((self.x1 + self.x2) as f64 / 2.0) / w,
            y_center: ((self.y1 + self.y2) as f64 / 2.0) / h,
            width: self.width() as f64 / w,
            height: self.height() as f64 / h,
        })
    }
}

/// Normalized detection label `class x_center y_center width height`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoloLabel {
    /// First field of the line, verbatim
    pub class: ClassId,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl YoloLabel {
    pub fn parse(line: &str) -> Result<Self, LineError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(LineError::FieldCount {
                expected: 5,
                found: fields.len(),
            });
        }

        Ok(Self {
            class: ClassId::new(fields[0]),
            x_center: parse_field("x_center", fields[1])?,
            y_center: parse_field("y_center", fields[2])?,
            width: parse_field("width", fields[3])?,
            height: parse_field("height", fields[4])?,
        })
    }

    pub fn class(&self) -> &ClassId {
        &self.class
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class, self.x_center, self.y_center, self.width, self.height
        )
    }

    /// Expand back to pixel corners, rounding to the nearest pixel. Needs a
    /// numeric class.
    pub fn to_absolute(
        &self,
        image_width: u32,
        image_height: u32,
    ) -> Result<AbsoluteBox, LineError> {
        let class: u32 = parse_field("class", self.class.as_str())?;
        let class_id = class.checked_add(1).ok_or_else(|| LineError::Number {
            field: "class",
            value: self.class.to_string(),
        })?;
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        let half_w = self.width * w / 2.0;
        let half_h = self.height * h / 2.0;
        let cx = self.x_center * w;
        let cy = self.y_center * h;

        Ok(AbsoluteBox {
            x1: (cx - half_w).round() as i64,
            y1: (cy - half_h).round() as i64,
            x2: (cx + half_w).round() as i64,
            y2: (cy + half_h).round() as i64,
            class_id,
        })
    }
}

/// Contents of one detection label file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelFile {
    labels: Vec<YoloLabel>,
}

impl LabelFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(labels: Vec<YoloLabel>) -> Self {
        Self { labels }
    }

    /// Parse a whole file; blank lines are ignored
    pub fn parse(text: &str) -> Result<Self, LabelFileError> {
        let mut labels = Vec::new();
        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let label = YoloLabel::parse(line).map_err(|source| LabelFileError {
                line: line_num + 1,
                source,
            })?;
            labels.push(label);
        }
        Ok(Self { labels })
    }

    pub fn push(&mut self, label: YoloLabel) {
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, YoloLabel> {
        self.labels.iter()
    }

    /// One occurrence per labeled object
    pub fn class_counts(&self) -> ClassCounts {
        self.labels.iter().map(|label| label.class.clone()).collect()
    }

    /// File text: one line per label, always newline terminated
    pub fn to_text(&self) -> String {
        let lines: Vec<String> = self.labels.iter().map(YoloLabel::to_line).collect();
        format!("{}\n", lines.join("\n"))
    }
}

impl FromIterator<YoloLabel> for LabelFile {
    fn from_iter<T: IntoIterator<Item = YoloLabel>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl IntoIterator for LabelFile {
    type Item = YoloLabel;
    type IntoIter = std::vec::IntoIter<YoloLabel>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_line_to_yolo() {
        let raw = AbsoluteBox::parse("(10,10),(50,50),2").unwrap();
        let label = raw.to_yolo(100, 100).unwrap();

        assert_eq!(label.to_line(), "1 0.300000 0.300000 0.400000 0.400000");
    }

    #[test]
    fn test_round_trip_within_a_pixel() {
        let raw = AbsoluteBox::parse("(37,91),(418,305),7").unwrap();
        let line = raw.to_yolo(958, 633).unwrap().to_line();

        let back = YoloLabel::parse(&line).unwrap().to_absolute(958, 633).unwrap();
        assert_eq!(back.class_id, 7);
        for (a, b) in [
            (back.x1, raw.x1),
            (back.y1, raw.y1),
            (back.x2, raw.x2),
            (back.y2, raw.y2),
        ] {
            assert!((a - b).abs() <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn test_raw_parse_tolerates_spaces() {
        let raw = AbsoluteBox::parse("(563, 478),(630, 573), 1").unwrap();
        assert_eq!(raw.x1, 563);
        assert_eq!(raw.y2, 573);
        assert_eq!(raw.class_id, 1);
    }

    #[test]
    fn test_raw_parse_errors() {
        assert_eq!(
            AbsoluteBox::parse("(1,2),(3,4)"),
            Err(LineError::FieldCount {
                expected: 5,
                found: 4
            })
        );
        assert_eq!(
            AbsoluteBox::parse("(1,2),(3,x),1"),
            Err(LineError::Number {
                field: "y2",
                value: "x".to_string()
            })
        );
        assert_eq!(
            AbsoluteBox::parse("(1,2),(3,4),0"),
            Err(LineError::ClassBase(0))
        );
    }

    #[test]
    fn test_zero_sized_image_is_rejected() {
        let raw = AbsoluteBox::parse("(1,2),(3,4),1").unwrap();
        assert!(matches!(raw.to_yolo(0, 10), Err(LineError::EmptyImage { .. })));
    }

    #[test]
    fn test_label_file_parse_and_counts() {
        let file = LabelFile::parse("0 0.5 0.5 0.1 0.1\n\n2 0.2 0.2 0.1 0.1\n0 0.7 0.7 0.2 0.2\n")
            .unwrap();

        assert_eq!(file.len(), 3);
        let counts = file.class_counts();
        assert_eq!(counts.get(&"0".into()), 2);
        assert_eq!(counts.get(&"2".into()), 1);
    }

    #[test]
    fn test_class_tokens_are_opaque() {
        let file = LabelFile::parse("01 0.5 0.5 0.1 0.1\n1 0.5 0.5 0.1 0.1\nship 0.2 0.2 0.1 0.1\n")
            .unwrap();

        let counts = file.class_counts();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts.get(&"01".into()), 1);
        assert_eq!(counts.get(&"ship".into()), 1);
        assert_eq!(
            file.to_text(),
            "01 0.500000 0.500000 0.100000 0.100000\n1 0.500000 0.500000 0.100000 0.100000\nship 0.200000 0.200000 0.100000 0.100000\n"
        );

        let named = YoloLabel::parse("ship 0.2 0.2 0.1 0.1").unwrap();
        assert!(matches!(named.to_absolute(10, 10), Err(LineError::Number { .. })));
    }

    #[test]
    fn test_label_file_reports_line_number() {
        let err = LabelFile::parse("0 0.5 0.5 0.1 0.1\n1 0.5 0.5\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(
            err.source,
            LineError::FieldCount {
                expected: 5,
                found: 3
            }
        );
    }

    #[test]
    fn test_empty_file_text_is_single_newline() {
        assert_eq!(LabelFile::new().to_text(), "\n");
        assert!(LabelFile::parse("\n").unwrap().is_empty());
    }
}
