//! Annotation objects at rest
//!
//! Every value here is zoom-independent: positions, scales and stroke widths
//! are expressed in document points as if the page were shown at reference
//! scale 1.0. Conversion to and from live screen geometry lives in
//! `viewer-core`.

use crate::path::PathEncoding;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_FONT_SIZE: f64 = 20.0;
const DEFAULT_COLOR: &str = "#000000";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("malformed annotation: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Placed text
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnnotation {
    pub text: String,
    pub left: f64,
    pub top: f64,
    /// Zoom-independent font size
    pub base_font_size: f64,
    /// Resize-handle factors; never carries zoom
    pub manual_scale_x: f64,
    pub manual_scale_y: f64,
    pub fill_color: String,
}

/// Freehand ink stroke
#[derive(Debug, Clone, PartialEq)]
pub struct PathAnnotation {
    pub raw_path: PathEncoding,
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub stroke_color: String,
    pub stroke_width: f64,
    /// Declared footprint, used when the path itself cannot be drawn
    pub width: f64,
    pub height: f64,
}

/// Signature image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnnotation {
    pub source_data_uri: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Closed set of annotation kinds
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationObject {
    Text(TextAnnotation),
    Path(PathAnnotation),
    Image(ImageAnnotation),
    /// A `type` tag this pipeline does not draw; kept so callers can account for it
    Unsupported { kind: String },
}

impl AnnotationObject {
    /// Decode one wire object
    ///
    /// A missing or non-string `type` decodes as `Unsupported` with an empty kind.
    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        match value.get("type").and_then(Value::as_str) {
            Some(TEXT_TAG | PATH_TAG | IMAGE_TAG) => {}
            Some(kind) => return Ok(Self::Unsupported { kind: kind.to_owned() }),
            None => return Ok(Self::Unsupported { kind: String::new() }),
        }

        let wire = WireAnnotation::deserialize(value)?;
        Ok(match wire {
            WireAnnotation::Text(text) => Self::Text(text.into()),
            WireAnnotation::Path(path) => Self::Path(path.into()),
            WireAnnotation::Image(image) => Self::Image(image.into()),
        })
    }

    /// Encode back into the wire shape
    pub fn to_value(&self) -> Value {
        let wire = match self {
            Self::Text(text) => WireAnnotation::Text(TextWire::from(text)),
            Self::Path(path) => WireAnnotation::Path(PathWire::from(path)),
            Self::Image(image) => WireAnnotation::Image(ImageWire::from(image)),
            Self::Unsupported { kind } => return serde_json::json!({ "type": kind }),
        };
        // Plain structs with string keys always serialize.
        serde_json::to_value(wire).unwrap_or(Value::Null)
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Text(_) => TEXT_TAG,
            Self::Path(_) => PATH_TAG,
            Self::Image(_) => IMAGE_TAG,
            Self::Unsupported { kind } => kind,
        }
    }
}

impl Serialize for AnnotationObject {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

const TEXT_TAG: &str = "i-text";
const PATH_TAG: &str = "path";
const IMAGE_TAG: &str = "image";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum WireAnnotation {
    #[serde(rename = "i-text")]
    Text(TextWire),
    #[serde(rename = "path")]
    Path(PathWire),
    #[serde(rename = "image")]
    Image(ImageWire),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextWire {
    #[serde(default)]
    text: String,
    #[serde(default)]
    left: f64,
    #[serde(default)]
    top: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    manual_scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    manual_scale_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fill: Option<String>,
}

impl From<TextWire> for TextAnnotation {
    fn from(wire: TextWire) -> Self {
        Self {
            text: wire.text,
            left: wire.left,
            top: wire.top,
            base_font_size: wire.base_font_size.or(wire.font_size).unwrap_or(DEFAULT_FONT_SIZE),
            manual_scale_x: wire.manual_scale_x.or(wire.scale_x).unwrap_or(1.0),
            manual_scale_y: wire.manual_scale_y.or(wire.scale_y).unwrap_or(1.0),
            fill_color: wire.fill.unwrap_or_else(|| DEFAULT_COLOR.to_owned()),
        }
    }
}

impl From<&TextAnnotation> for TextWire {
    fn from(text: &TextAnnotation) -> Self {
        Self {
            text: text.text.clone(),
            left: text.left,
            top: text.top,
            base_font_size: Some(text.base_font_size),
            font_size: None,
            manual_scale_x: Some(text.manual_scale_x),
            manual_scale_y: Some(text.manual_scale_y),
            scale_x: None,
            scale_y: None,
            fill: Some(text.fill_color.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathWire {
    #[serde(default)]
    path: PathEncoding,
    #[serde(default)]
    left: f64,
    #[serde(default)]
    top: f64,
    #[serde(default = "unit_scale")]
    scale_x: f64,
    #[serde(default = "unit_scale")]
    scale_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stroke: Option<String>,
    #[serde(default = "unit_scale")]
    stroke_width: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

impl From<PathWire> for PathAnnotation {
    fn from(wire: PathWire) -> Self {
        Self {
            raw_path: wire.path,
            left: wire.left,
            top: wire.top,
            scale_x: wire.scale_x,
            scale_y: wire.scale_y,
            stroke_color: wire.stroke.unwrap_or_else(|| DEFAULT_COLOR.to_owned()),
            stroke_width: wire.stroke_width,
            width: wire.width,
            height: wire.height,
        }
    }
}

impl From<&PathAnnotation> for PathWire {
    fn from(path: &PathAnnotation) -> Self {
        Self {
            path: path.raw_path.clone(),
            left: path.left,
            top: path.top,
            scale_x: path.scale_x,
            scale_y: path.scale_y,
            stroke: Some(path.stroke_color.clone()),
            stroke_width: path.stroke_width,
            width: path.width,
            height: path.height,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageWire {
    #[serde(default)]
    src: String,
    #[serde(default)]
    left: f64,
    #[serde(default)]
    top: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default = "unit_scale")]
    scale_x: f64,
    #[serde(default = "unit_scale")]
    scale_y: f64,
}

impl From<ImageWire> for ImageAnnotation {
    fn from(wire: ImageWire) -> Self {
        Self {
            source_data_uri: wire.src,
            left: wire.left,
            top: wire.top,
            width: wire.width,
            height: wire.height,
            scale_x: wire.scale_x,
            scale_y: wire.scale_y,
        }
    }
}

impl From<&ImageAnnotation> for ImageWire {
    fn from(image: &ImageAnnotation) -> Self {
        Self {
            src: image.source_data_uri.clone(),
            left: image.left,
            top: image.top,
            width: image.width,
            height: image.height,
            scale_x: image.scale_x,
            scale_y: image.scale_y,
        }
    }
}

fn unit_scale() -> f64 {
    1.0
}
