//! YOLO text labels: one `class cx cy w h` line per object, geometry
//! normalized to the image size.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::{Error, Result};

/// Center-format box with every component in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl NormalizedBox {
    /// Converts a pixel-space corner box, clipping it to the image first.
    pub fn from_corners(xmin: f32, ymin: f32, xmax: f32, ymax: f32, img_w: f32, img_h: f32) -> Self {
        let x1 = xmin.clamp(0.0, img_w);
        let x2 = xmax.clamp(0.0, img_w);
        let y1 = ymin.clamp(0.0, img_h);
        let y2 = ymax.clamp(0.0, img_h);
        Self {
            cx: ((x1 + x2) / 2.0 / img_w).clamp(0.0, 1.0),
            cy: ((y1 + y2) / 2.0 / img_h).clamp(0.0, 1.0),
            w: ((x2 - x1) / img_w).clamp(0.0, 1.0),
            h: ((y2 - y1) / img_h).clamp(0.0, 1.0),
        }
    }

    pub fn is_normalized(&self) -> bool {
        [self.cx, self.cy, self.w, self.h]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLine {
    pub class_id: u32,
    pub bbox: NormalizedBox,
}

impl fmt::Display for LabelLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.bbox.cx, self.bbox.cy, self.bbox.w, self.bbox.h
        )
    }
}

impl FromStr for LabelLine {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedLabel {
            line: line.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(malformed("expected 5 fields"));
        }
        let class_id = parts[0]
            .parse::<u32>()
            .map_err(|_| malformed("class id is not a non-negative integer"))?;
        let mut values = [0f32; 4];
        for (slot, raw) in values.iter_mut().zip(&parts[1..]) {
            *slot = raw.parse().map_err(|_| malformed("geometry is not numeric"))?;
        }
        let bbox = NormalizedBox {
            cx: values[0],
            cy: values[1],
            w: values[2],
            h: values[3],
        };
        if !bbox.is_normalized() {
            return Err(malformed("geometry outside [0, 1]"));
        }
        Ok(Self { class_id, bbox })
    }
}

/// Processing state of an image, judged from its label file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelState {
    /// No label file: never processed.
    Missing,
    /// Empty file: processed, nothing found.
    Empty,
    Labeled,
}

pub fn label_state(path: &Path) -> LabelState {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => LabelState::Labeled,
        Ok(_) => LabelState::Empty,
        Err(_) => LabelState::Missing,
    }
}

/// Writes `lines` to `path`; an empty slice leaves an empty marker file.
pub fn write_label_file(path: &Path, lines: &[LabelLine]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut text = String::new();
    for line in lines {
        text.push_str(&line.to_string());
        text.push('\n');
    }
    fs::write(path, text)?;
    Ok(())
}

/// Reads every non-blank line of a label file.
pub fn read_label_file(path: &Path) -> Result<Vec<LabelLine>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_and_parse() {
        let line = LabelLine {
            class_id: 3,
            bbox: NormalizedBox {
                cx: 0.5,
                cy: 0.25,
                w: 0.1,
                h: 0.2,
            },
        };
        let text = line.to_string();
        assert_eq!(text, "3 0.500000 0.250000 0.100000 0.200000");
        assert_eq!(text.parse::<LabelLine>().unwrap(), line);
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert!("1 0.5 0.5 0.1".parse::<LabelLine>().is_err());
        assert!("-1 0.5 0.5 0.1 0.1".parse::<LabelLine>().is_err());
        assert!("1 0.5 1.5 0.1 0.1".parse::<LabelLine>().is_err());
    }

    #[test]
    fn test_corner_conversion_clips_to_image() {
        let bbox = NormalizedBox::from_corners(-20.0, 10.0, 60.0, 130.0, 100.0, 100.0);
        assert!(bbox.is_normalized());
        assert!((bbox.cx - 0.3).abs() < 1e-6);
        assert!((bbox.w - 0.6).abs() < 1e-6);
        assert!((bbox.h - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_label_states() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("frame.txt");
        assert_eq!(label_state(&path), LabelState::Missing);

        write_label_file(&path, &[]).unwrap();
        assert_eq!(label_state(&path), LabelState::Empty);

        let line: LabelLine = "0 0.5 0.5 0.2 0.2".parse().unwrap();
        write_label_file(&path, &[line]).unwrap();
        assert_eq!(label_state(&path), LabelState::Labeled);
        assert_eq!(read_label_file(&path).unwrap(), vec![line]);
    }
}
