//! Editing viewport transform and zoom-independent annotation storage
//!
//! The editor draws a page at `scale = base_fit_scale × zoom`. Annotations are
//! edited in that screen space but always stored at scale 1.0, so a page set
//! saved at 250% looks identical when reopened at 75%. [`store`] and
//! [`restore`] are exact inverses for a given [`ViewTransform`].

use doc_model::{
    AnnotationObject, ImageAnnotation, ModelError, PageAnnotationSet, PathAnnotation,
    PathEncoding, TextAnnotation,
};
use serde_json::{json, Value};

pub const MIN_ZOOM_PERCENT: u16 = 10;
pub const MAX_ZOOM_PERCENT: u16 = 1600;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("scale factor must be positive and finite, got {0}")]
    InvalidScale(f64),
}

/// Current editing scale, passed explicitly to every conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    base_fit_scale: f64,
    zoom_percent: u16,
}

impl ViewTransform {
    pub fn new(base_fit_scale: f64, zoom_percent: u16) -> Result<Self, NormalizeError> {
        if !base_fit_scale.is_finite() || base_fit_scale <= 0.0 {
            return Err(NormalizeError::InvalidScale(base_fit_scale));
        }

        Ok(Self {
            base_fit_scale,
            zoom_percent: zoom_percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT),
        })
    }

    /// Transform for an arbitrary combined scale at 100% zoom
    pub fn from_scale(scale: f64) -> Result<Self, NormalizeError> {
        Self::new(scale, 100)
    }

    /// Fit the page width into the container, then apply zoom
    pub fn fit_width(
        container_width_px: f64,
        page_width_pt: f64,
        zoom_percent: u16,
    ) -> Result<Self, NormalizeError> {
        Self::new(fit_width_scale(container_width_px, page_width_pt), zoom_percent)
    }

    pub fn base_fit_scale(&self) -> f64 {
        self.base_fit_scale
    }

    pub fn zoom_percent(&self) -> u16 {
        self.zoom_percent
    }

    /// Combined screen pixels per document point
    pub fn scale(&self) -> f64 {
        self.base_fit_scale * f64::from(self.zoom_percent) / 100.0
    }

    pub fn with_zoom_percent(self, zoom_percent: u16) -> Self {
        Self { zoom_percent: zoom_percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT), ..self }
    }

    /// New base scale after a container resize; zoom is kept
    pub fn with_container_width(
        self,
        container_width_px: f64,
        page_width_pt: f64,
    ) -> Result<Self, NormalizeError> {
        Self::new(fit_width_scale(container_width_px, page_width_pt), self.zoom_percent)
    }
}

pub fn fit_width_scale(container_width_px: f64, page_width_pt: f64) -> f64 {
    if container_width_px <= 0.0 || page_width_pt <= 0.0 {
        return 1.0;
    }

    container_width_px / page_width_pt
}

/// Text as shown on the editing surface
#[derive(Debug, Clone, PartialEq)]
pub struct LiveText {
    pub text: String,
    pub left: f64,
    pub top: f64,
    /// Rendered size at the current scale
    pub font_size: f64,
    /// Resize-handle factors, unaffected by zoom
    pub scale_x: f64,
    pub scale_y: f64,
    pub fill: String,
    /// Base size recovered by an earlier store, reused to avoid drift
    pub base_font_size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LivePath {
    pub path: PathEncoding,
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub stroke: String,
    pub stroke_width: f64,
    /// Intrinsic path extent, not zoom dependent
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveImage {
    pub src: String,
    pub left: f64,
    pub top: f64,
    /// Intrinsic pixel size of the source image
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveAnnotation {
    Text(LiveText),
    Path(LivePath),
    Image(LiveImage),
    Unsupported { kind: String },
}

impl LiveAnnotation {
    /// Decode an object as the editing surface serializes it
    ///
    /// Same shape as the stored form, except `fontSize` is the rendered size
    /// and `baseFontSize`, when present, is the size recovered earlier.
    pub fn from_wire(value: &Value) -> Result<Self, ModelError> {
        let view = ViewTransform { base_fit_scale: 1.0, zoom_percent: 100 };
        let live = match restore(&AnnotationObject::from_value(value)?, &view) {
            Self::Text(text) => {
                let base_font_size = value.get("baseFontSize").and_then(Value::as_f64);
                let font_size = value
                    .get("fontSize")
                    .and_then(Value::as_f64)
                    .unwrap_or(text.font_size);
                Self::Text(LiveText { font_size, base_font_size, ..text })
            }
            other => other,
        };
        Ok(live)
    }

    pub fn to_wire(&self) -> Value {
        match self {
            Self::Text(text) => {
                let mut value = json!({
                    "type": "i-text",
                    "text": text.text,
                    "left": text.left,
                    "top": text.top,
                    "fontSize": text.font_size,
                    "scaleX": text.scale_x,
                    "scaleY": text.scale_y,
                    "fill": text.fill,
                });
                if let Some(base) = text.base_font_size {
                    value["baseFontSize"] = json!(base);
                }
                value
            }
            Self::Path(path) => json!({
                "type": "path",
                "path": path.path,
                "left": path.left,
                "top": path.top,
                "scaleX": path.scale_x,
                "scaleY": path.scale_y,
                "stroke": path.stroke,
                "strokeWidth": path.stroke_width,
                "width": path.width,
                "height": path.height,
            }),
            Self::Image(image) => json!({
                "type": "image",
                "src": image.src,
                "left": image.left,
                "top": image.top,
                "width": image.width,
                "height": image.height,
                "scaleX": image.scale_x,
                "scaleY": image.scale_y,
            }),
            Self::Unsupported { kind } => json!({ "type": kind }),
        }
    }
}

/// Convert live screen geometry to the zoom-independent stored form
pub fn store(live: &LiveAnnotation, view: &ViewTransform) -> AnnotationObject {
    let s = view.scale();

    match live {
        LiveAnnotation::Text(text) => AnnotationObject::Text(TextAnnotation {
            text: text.text.clone(),
            left: text.left / s,
            top: text.top / s,
            base_font_size: text.base_font_size.unwrap_or(text.font_size / s),
            manual_scale_x: text.scale_x,
            manual_scale_y: text.scale_y,
            fill_color: text.fill.clone(),
        }),
        LiveAnnotation::Path(path) => AnnotationObject::Path(PathAnnotation {
            raw_path: path.path.clone(),
            left: path.left / s,
            top: path.top / s,
            scale_x: path.scale_x / s,
            scale_y: path.scale_y / s,
            stroke_color: path.stroke.clone(),
            stroke_width: path.stroke_width / s,
            width: path.width,
            height: path.height,
        }),
        LiveAnnotation::Image(image) => AnnotationObject::Image(ImageAnnotation {
            source_data_uri: image.src.clone(),
            left: image.left / s,
            top: image.top / s,
            width: image.width,
            height: image.height,
            scale_x: image.scale_x / s,
            scale_y: image.scale_y / s,
        }),
        LiveAnnotation::Unsupported { kind } => AnnotationObject::Unsupported { kind: kind.clone() },
    }
}

/// Convert a stored annotation back to screen geometry at `view`
pub fn restore(stored: &AnnotationObject, view: &ViewTransform) -> LiveAnnotation {
    let s = view.scale();

    match stored {
        AnnotationObject::Text(text) => LiveAnnotation::Text(LiveText {
            text: text.text.clone(),
            left: text.left * s,
            top: text.top * s,
            font_size: text.base_font_size * s,
            scale_x: text.manual_scale_x,
            scale_y: text.manual_scale_y,
            fill: text.fill_color.clone(),
            base_font_size: Some(text.base_font_size),
        }),
        AnnotationObject::Path(path) => LiveAnnotation::Path(LivePath {
            path: path.raw_path.clone(),
            left: path.left * s,
            top: path.top * s,
            scale_x: path.scale_x * s,
            scale_y: path.scale_y * s,
            stroke: path.stroke_color.clone(),
            stroke_width: path.stroke_width * s,
            width: path.width,
            height: path.height,
        }),
        AnnotationObject::Image(image) => LiveAnnotation::Image(LiveImage {
            src: image.source_data_uri.clone(),
            left: image.left * s,
            top: image.top * s,
            width: image.width,
            height: image.height,
            scale_x: image.scale_x * s,
            scale_y: image.scale_y * s,
        }),
        AnnotationObject::Unsupported { kind } => LiveAnnotation::Unsupported { kind: kind.clone() },
    }
}

/// Re-express live geometry after a zoom or container resize
pub fn rezoom(live: &LiveAnnotation, from: &ViewTransform, to: &ViewTransform) -> LiveAnnotation {
    restore(&store(live, from), to)
}

/// Normalize the live objects of one page and write them into the set
pub fn store_page(
    set: &mut PageAnnotationSet,
    page_number: u32,
    live: &[LiveAnnotation],
    view: &ViewTransform,
) {
    let stored: Vec<AnnotationObject> = live.iter().map(|object| store(object, view)).collect();
    set.set_page(page_number, &stored);
}

/// Live objects for one page at `view`, in z-order
pub fn restore_page(
    set: &PageAnnotationSet,
    page_number: u32,
    view: &ViewTransform,
) -> Vec<Result<LiveAnnotation, ModelError>> {
    set.decode_page(page_number)
        .into_iter()
        .map(|decoded| decoded.map(|stored| restore(&stored, view)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    fn sample_text() -> LiveText {
        LiveText {
            text: "Signed".to_owned(),
            left: 123.4,
            top: 56.7,
            font_size: 33.0,
            scale_x: 1.5,
            scale_y: 0.75,
            fill: "#112233".to_owned(),
            base_font_size: None,
        }
    }

    fn sample_path() -> LivePath {
        LivePath {
            path: PathEncoding::Svg("M 0 0 Q 5 10 10 0".to_owned()),
            left: 40.0,
            top: 80.0,
            scale_x: 2.2,
            scale_y: 1.8,
            stroke: "#000000".to_owned(),
            stroke_width: 3.0,
            width: 10.0,
            height: 10.0,
        }
    }

    fn sample_image() -> LiveImage {
        LiveImage {
            src: "data:image/png;base64,AAAA".to_owned(),
            left: 300.0,
            top: 500.0,
            width: 400.0,
            height: 120.0,
            scale_x: 0.9,
            scale_y: 0.9,
        }
    }

    fn assert_live_close(actual: &LiveAnnotation, expected: &LiveAnnotation) {
        match (actual, expected) {
            (LiveAnnotation::Text(a), LiveAnnotation::Text(e)) => {
                assert!(close(a.left, e.left) && close(a.top, e.top));
                assert!(close(a.font_size, e.font_size));
                assert_eq!((a.scale_x, a.scale_y), (e.scale_x, e.scale_y));
                assert_eq!(a.text, e.text);
                assert_eq!(a.fill, e.fill);
            }
            (LiveAnnotation::Path(a), LiveAnnotation::Path(e)) => {
                assert!(close(a.left, e.left) && close(a.top, e.top));
                assert!(close(a.scale_x, e.scale_x) && close(a.scale_y, e.scale_y));
                assert!(close(a.stroke_width, e.stroke_width));
                assert_eq!(a.path, e.path);
            }
            (LiveAnnotation::Image(a), LiveAnnotation::Image(e)) => {
                assert!(close(a.left, e.left) && close(a.top, e.top));
                assert!(close(a.scale_x, e.scale_x) && close(a.scale_y, e.scale_y));
                assert_eq!((a.width, a.height), (e.width, e.height));
            }
            other => panic!("variant mismatch: {other:?}"),
        }
    }

    #[test]
    fn store_then_restore_is_identity_for_any_scale() {
        let objects = [
            LiveAnnotation::Text(sample_text()),
            LiveAnnotation::Path(sample_path()),
            LiveAnnotation::Image(sample_image()),
        ];

        for scale in [0.013, 0.25, 1.0, 1.337, 2.0, 7.5, 64.0] {
            let view = ViewTransform::from_scale(scale).expect("valid scale");
            for object in &objects {
                let back = restore(&store(object, &view), &view);
                assert_live_close(&back, object);
            }
        }
    }

    #[test]
    fn store_divides_geometry_by_scale() {
        let view = ViewTransform::new(1.25, 200).expect("valid transform");
        assert!(close(view.scale(), 2.5));

        let AnnotationObject::Path(path) = store(&LiveAnnotation::Path(sample_path()), &view) else {
            panic!("expected path");
        };
        assert!(close(path.left, 16.0));
        assert!(close(path.top, 32.0));
        assert!(close(path.scale_x, 0.88));
        assert!(close(path.stroke_width, 1.2));
        assert_eq!(path.width, 10.0);
    }

    #[test]
    fn text_keeps_manual_scale_apart_from_zoom() {
        let view = ViewTransform::from_scale(3.0).expect("valid scale");
        let AnnotationObject::Text(text) = store(&LiveAnnotation::Text(sample_text()), &view) else {
            panic!("expected text");
        };

        assert!(close(text.base_font_size, 11.0));
        assert_eq!(text.manual_scale_x, 1.5);
        assert_eq!(text.manual_scale_y, 0.75);
    }

    #[test]
    fn previously_recovered_base_font_size_is_reused() {
        let view = ViewTransform::from_scale(2.0).expect("valid scale");
        let live = LiveText { base_font_size: Some(12.0), font_size: 25.0, ..sample_text() };

        let AnnotationObject::Text(text) = store(&LiveAnnotation::Text(live), &view) else {
            panic!("expected text");
        };
        assert_eq!(text.base_font_size, 12.0);
    }

    #[test]
    fn rezoom_scales_live_geometry_only() {
        let from = ViewTransform::new(1.0, 100).expect("valid transform");
        let to = from.with_zoom_percent(200);

        let LiveAnnotation::Text(text) = rezoom(&LiveAnnotation::Text(sample_text()), &from, &to)
        else {
            panic!("expected text");
        };
        assert!(close(text.left, 246.8));
        assert!(close(text.font_size, 66.0));
        assert_eq!(text.scale_x, 1.5);
        assert_eq!(text.base_font_size, Some(33.0));
    }

    #[test]
    fn invalid_scales_are_rejected() {
        assert_eq!(ViewTransform::from_scale(0.0), Err(NormalizeError::InvalidScale(0.0)));
        assert!(ViewTransform::from_scale(-2.0).is_err());
        assert!(ViewTransform::from_scale(f64::NAN).is_err());
        assert!(ViewTransform::from_scale(f64::INFINITY).is_err());
    }

    #[test]
    fn zoom_percent_is_clamped() {
        let view = ViewTransform::new(1.0, 1).expect("valid transform");
        assert_eq!(view.zoom_percent(), MIN_ZOOM_PERCENT);
        assert_eq!(view.with_zoom_percent(9999).zoom_percent(), MAX_ZOOM_PERCENT);
    }

    #[test]
    fn fit_width_uses_container_to_page_ratio() {
        assert!(close(fit_width_scale(1224.0, 612.0), 2.0));
        assert_eq!(fit_width_scale(0.0, 612.0), 1.0);
        assert_eq!(fit_width_scale(800.0, 0.0), 1.0);

        let view = ViewTransform::fit_width(612.0, 612.0, 150).expect("valid transform");
        assert!(close(view.scale(), 1.5));

        let resized = view.with_container_width(306.0, 612.0).expect("valid transform");
        assert!(close(resized.scale(), 0.75));
    }

    #[test]
    fn wire_form_keeps_rendered_and_base_font_sizes_apart() {
        let live = LiveAnnotation::from_wire(&json!({
            "type": "i-text",
            "text": "Signed",
            "left": 40,
            "top": 60,
            "fontSize": 48,
            "scaleX": 1.5,
            "scaleY": 1.5
        }))
        .expect("wire text should decode");

        let LiveAnnotation::Text(text) = &live else {
            panic!("expected text");
        };
        assert_eq!(text.font_size, 48.0);
        assert_eq!(text.base_font_size, None);
        assert_eq!(text.scale_x, 1.5);

        let view = ViewTransform::from_scale(2.0).expect("valid scale");
        let AnnotationObject::Text(stored) = store(&live, &view) else {
            panic!("expected text");
        };
        assert_eq!(stored.base_font_size, 24.0);
        assert_eq!(stored.manual_scale_x, 1.5);

        let back = LiveAnnotation::from_wire(&restore(&AnnotationObject::Text(stored), &view).to_wire())
            .expect("round trip should decode");
        let LiveAnnotation::Text(back) = back else {
            panic!("expected text");
        };
        assert_eq!(back.font_size, 48.0);
        assert_eq!(back.base_font_size, Some(24.0));
    }

    #[test]
    fn wire_form_round_trips_paths_and_images() {
        for live in [LiveAnnotation::Path(sample_path()), LiveAnnotation::Image(sample_image())] {
            let back = LiveAnnotation::from_wire(&live.to_wire()).expect("wire should decode");
            assert_eq!(back, live);
        }
    }

    #[test]
    fn page_store_and_restore_preserve_order() {
        let view = ViewTransform::from_scale(1.6).expect("valid scale");
        let live = vec![
            LiveAnnotation::Image(sample_image()),
            LiveAnnotation::Text(sample_text()),
            LiveAnnotation::Path(sample_path()),
        ];

        let mut set = PageAnnotationSet::new();
        store_page(&mut set, 2, &live, &view);
        assert_eq!(set.page(2).len(), 3);

        let restored: Vec<LiveAnnotation> = restore_page(&set, 2, &view)
            .into_iter()
            .map(|object| object.expect("decode"))
            .collect();
        for (back, original) in restored.iter().zip(&live) {
            assert_live_close(back, original);
        }
    }
}
