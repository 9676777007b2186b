//! Annotation data model shared by the editor and the flattening engine.

pub mod annotation;
pub mod color;
pub mod geometry;
pub mod page_set;
pub mod path;

pub use annotation::{AnnotationObject, ImageAnnotation, ModelError, PathAnnotation, TextAnnotation};
pub use color::Rgb;
pub use geometry::{Point, Rect};
pub use page_set::{PageAnnotationSet, RawAnnotation, SubmissionPayload};
pub use path::{parse as parse_path, CommandStream, PathEncoding, PathError, PathSegment, PathToken, PathVerb};
