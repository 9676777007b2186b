//! Committing one stored annotation onto a page canvas

use crate::canvas::{PageCanvas, StrokeStyle};
use crate::flatten::{flatten, FlattenTransform};
use crate::options::FlattenOptions;
use crate::raster::decode_data_uri;
use doc_model::{
    parse_path, AnnotationObject, ImageAnnotation, PathAnnotation, Point, Rect, Rgb, TextAnnotation,
};

/// Rough Helvetica advance per character, used only to centre captions
const CAPTION_CHAR_WIDTH: f64 = 0.6;
const PLACEHOLDER_GRAY: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn,
    /// Drawn as a bounding-box or captioned stand-in
    Placeholder,
    /// Nothing to draw, e.g. blank text
    Skipped,
    /// Kind this renderer does not handle
    Ignored,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("{kind} annotation has non-finite {field}")]
    NonFinite { kind: &'static str, field: &'static str },
}

pub fn render_annotation(
    canvas: &mut dyn PageCanvas,
    annotation: &AnnotationObject,
    options: &FlattenOptions,
) -> Result<RenderOutcome, RenderError> {
    match annotation {
        AnnotationObject::Text(text) => render_text(canvas, text, options),
        AnnotationObject::Path(path) => render_path(canvas, path),
        AnnotationObject::Image(image) => render_image(canvas, image, options),
        AnnotationObject::Unsupported { kind } => {
            tracing::debug!(kind = %kind, "ignoring unsupported annotation");
            Ok(RenderOutcome::Ignored)
        }
    }
}

fn ensure_finite(kind: &'static str, fields: &[(&'static str, f64)]) -> Result<(), RenderError> {
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((field, _)) => Err(RenderError::NonFinite { kind, field: *field }),
        None => Ok(()),
    }
}

fn render_text(
    canvas: &mut dyn PageCanvas,
    text: &TextAnnotation,
    options: &FlattenOptions,
) -> Result<RenderOutcome, RenderError> {
    if text.text.trim().is_empty() {
        return Ok(RenderOutcome::Skipped);
    }

    let size = options
        .clamp_font_size(text.base_font_size * ((text.manual_scale_x + text.manual_scale_y) / 2.0));
    ensure_finite("text", &[("left", text.left), ("top", text.top), ("font size", size)])?;

    let page = canvas.geometry();
    let color = Rgb::from_hex(&text.fill_color);
    let mut baseline = page.height - text.top - size * options.cap_height_ratio;

    for line in text.text.lines() {
        if !line.trim().is_empty() {
            canvas.fill_text(line, Point::new(text.left, baseline), size, color);
        }
        baseline -= size * options.line_height;
    }

    Ok(RenderOutcome::Drawn)
}

fn render_path(canvas: &mut dyn PageCanvas, path: &PathAnnotation) -> Result<RenderOutcome, RenderError> {
    ensure_finite(
        "path",
        &[
            ("left", path.left),
            ("top", path.top),
            ("scaleX", path.scale_x),
            ("scaleY", path.scale_y),
            ("strokeWidth", path.stroke_width),
        ],
    )?;

    let page = canvas.geometry();
    let style = StrokeStyle { width: path.stroke_width, color: Rgb::from_hex(&path.stroke_color) };

    if !path.raw_path.is_empty() {
        let transform = FlattenTransform {
            left: path.left,
            top: path.top,
            scale_x: path.scale_x,
            scale_y: path.scale_y,
            page_height: page.height,
        };
        let flattened = parse_path(&path.raw_path)
            .and_then(|stream| flatten(&stream, &transform));

        match flattened {
            Ok(polylines) if polylines.is_empty() => {
                tracing::debug!("path has no drawable commands, using its bounding box");
            }
            Ok(polylines) => {
                for polyline in &polylines {
                    canvas.stroke_polyline(polyline, style);
                }
                return Ok(RenderOutcome::Drawn);
            }
            Err(err) => {
                tracing::warn!(error = %err, "path could not be drawn, using its bounding box");
            }
        }
    }

    let width = path.width * path.scale_x;
    let height = path.height * path.scale_y;
    ensure_finite("path", &[("width", width), ("height", height)])?;
    canvas.stroke_rect(
        Rect::new(path.left, page.height - path.top - height, width, height),
        style,
    );

    Ok(RenderOutcome::Placeholder)
}

/// Lower-left placement of an image footprint, kept on the page per axis
pub fn image_placement(
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    page_width: f64,
    page_height: f64,
) -> Rect {
    let x = left.min(page_width - width).max(0.0);
    let y = (page_height - top - height).min(page_height - height).max(0.0);
    Rect::new(x, y, width, height)
}

fn render_image(
    canvas: &mut dyn PageCanvas,
    image: &ImageAnnotation,
    options: &FlattenOptions,
) -> Result<RenderOutcome, RenderError> {
    let width = image.width * image.scale_x;
    let height = image.height * image.scale_y;
    ensure_finite(
        "image",
        &[("left", image.left), ("top", image.top), ("width", width), ("height", height)],
    )?;

    let page = canvas.geometry();
    let rect = image_placement(image.left, image.top, width, height, page.width, page.height);

    match decode_data_uri(&image.source_data_uri) {
        Ok(raster) => {
            canvas.draw_image(raster, rect);
            Ok(RenderOutcome::Drawn)
        }
        Err(err) => {
            tracing::warn!(error = %err, "signature image unavailable, drawing placeholder");
            draw_placeholder(canvas, rect, options);
            Ok(RenderOutcome::Placeholder)
        }
    }
}

fn draw_placeholder(canvas: &mut dyn PageCanvas, rect: Rect, options: &FlattenOptions) {
    let gray = Rgb { r: PLACEHOLDER_GRAY as f32, g: PLACEHOLDER_GRAY as f32, b: PLACEHOLDER_GRAY as f32 };
    canvas.stroke_rect(rect, StrokeStyle { width: options.placeholder_stroke_width, color: gray });

    let size = placeholder_caption_size(rect.width, rect.height, options);
    if size <= options.min_caption_size {
        return;
    }

    let caption = &options.placeholder_caption;
    let text_width = caption.chars().count() as f64 * size * CAPTION_CHAR_WIDTH;
    let origin = Point::new(
        rect.x + ((rect.width - text_width) / 2.0).max(0.0),
        rect.y + (rect.height - size) / 2.0 + size * (1.0 - options.cap_height_ratio),
    );
    canvas.fill_text(caption, origin, size, gray);
}

pub fn placeholder_caption_size(width: f64, height: f64, options: &FlattenOptions) -> f64 {
    (height * 0.3).min(width / 6.0).min(options.max_caption_size)
}
