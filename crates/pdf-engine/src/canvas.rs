//! Drawing surface for one page
//!
//! Renderers talk to [`PageCanvas`] in page-box coordinates (origin at the
//! lower-left of the page box, y up). [`ContentCanvas`] turns those calls into
//! content stream operations for the document backend to commit.

use crate::document::PageGeometry;
use crate::raster::RasterImage;
use doc_model::{Point, Rect, Rgb};
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::collections::HashSet;

const FONT_PREFIX: &str = "SfF";
const IMAGE_PREFIX: &str = "SfIm";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub width: f64,
    pub color: Rgb,
}

pub trait PageCanvas {
    fn geometry(&self) -> PageGeometry;
    fn stroke_polyline(&mut self, points: &[Point], style: StrokeStyle);
    fn stroke_rect(&mut self, rect: Rect, style: StrokeStyle);
    /// Single line of Helvetica with its baseline starting at `origin`
    fn fill_text(&mut self, text: &str, origin: Point, size: f64, color: Rgb);
    fn draw_image(&mut self, image: RasterImage, rect: Rect);
}

/// Everything a page needs committed after rendering
#[derive(Debug, Default)]
pub struct CanvasContent {
    pub operations: Vec<Operation>,
    /// Resource name of the Helvetica font, if any text was drawn
    pub font: Option<String>,
    pub images: Vec<(String, RasterImage)>,
}

pub struct ContentCanvas {
    geometry: PageGeometry,
    taken: HashSet<String>,
    content: CanvasContent,
}

impl ContentCanvas {
    /// `taken` holds resource names already present on the page
    pub fn new(geometry: PageGeometry, taken: impl IntoIterator<Item = String>) -> Self {
        Self { geometry, taken: taken.into_iter().collect(), content: CanvasContent::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.content.operations.is_empty()
    }

    pub fn into_content(self) -> CanvasContent {
        self.content
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        let mut index = 1usize;
        loop {
            let name = format!("{prefix}{index}");
            if self.taken.insert(name.clone()) {
                return name;
            }
            index += 1;
        }
    }

    fn font_name(&mut self) -> String {
        if let Some(name) = &self.content.font {
            return name.clone();
        }
        let name = self.fresh_name(FONT_PREFIX);
        self.content.font = Some(name.clone());
        name
    }

    fn absolute(&self, point: Point) -> (f64, f64) {
        (point.x + self.geometry.origin_x, point.y + self.geometry.origin_y)
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.content.operations.push(Operation::new(operator, operands));
    }

    fn set_stroke(&mut self, style: StrokeStyle) {
        let (r, g, b) = style.color.components();
        self.push("RG", vec![r.into(), g.into(), b.into()]);
        self.push("w", vec![real(style.width)]);
    }
}

impl PageCanvas for ContentCanvas {
    fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    fn stroke_polyline(&mut self, points: &[Point], style: StrokeStyle) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        if rest.is_empty() {
            return;
        }

        self.push("q", vec![]);
        self.set_stroke(style);
        self.push("J", vec![Object::Integer(1)]);
        self.push("j", vec![Object::Integer(1)]);
        let (x, y) = self.absolute(*first);
        self.push("m", vec![real(x), real(y)]);
        for point in rest {
            let (x, y) = self.absolute(*point);
            self.push("l", vec![real(x), real(y)]);
        }
        self.push("S", vec![]);
        self.push("Q", vec![]);
    }

    fn stroke_rect(&mut self, rect: Rect, style: StrokeStyle) {
        let (x, y) = self.absolute(Point::new(rect.x, rect.y));
        self.push("q", vec![]);
        self.set_stroke(style);
        self.push("re", vec![real(x), real(y), real(rect.width), real(rect.height)]);
        self.push("S", vec![]);
        self.push("Q", vec![]);
    }

    fn fill_text(&mut self, text: &str, origin: Point, size: f64, color: Rgb) {
        let font = self.font_name();
        let (x, y) = self.absolute(origin);
        let (r, g, b) = color.components();

        self.push("q", vec![]);
        self.push("rg", vec![r.into(), g.into(), b.into()]);
        self.push("BT", vec![]);
        self.push("Tf", vec![Object::Name(font.into_bytes()), real(size)]);
        self.push("Td", vec![real(x), real(y)]);
        self.push("Tj", vec![Object::String(encode_win_ansi(text), StringFormat::Literal)]);
        self.push("ET", vec![]);
        self.push("Q", vec![]);
    }

    fn draw_image(&mut self, image: RasterImage, rect: Rect) {
        let name = self.fresh_name(IMAGE_PREFIX);
        let (x, y) = self.absolute(Point::new(rect.x, rect.y));

        self.push("q", vec![]);
        self.push(
            "cm",
            vec![real(rect.width), real(0.0), real(0.0), real(rect.height), real(x), real(y)],
        );
        self.push("Do", vec![Object::Name(name.clone().into_bytes())]);
        self.push("Q", vec![]);
        self.content.images.push((name, image));
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Bytes for the standard Helvetica encoding; code points past Latin-1 become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|ch| *ch != '\r' && *ch != '\n')
        .map(|ch| match ch {
            '\t' => b' ',
            ch if (ch as u32) <= 0xFF => ch as u8,
            _ => b'?',
        })
        .collect()
}
