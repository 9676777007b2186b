//! Flattening stored annotations into PDF pages
//!
//! [`flatten_document`] and [`flatten_pages`] are the entry points; both take
//! a [`PageAnnotationSet`](doc_model::PageAnnotationSet) in zoom-independent
//! form and return finalized bytes plus a [`FlattenReport`].

pub mod canvas;
pub mod document;
pub mod flatten;
pub mod options;
pub mod pipeline;
pub mod raster;
pub mod render;

pub use canvas::{ContentCanvas, PageCanvas, StrokeStyle};
pub use document::PageGeometry;
pub use flatten::{flatten, FlattenTransform, Polyline};
pub use options::FlattenOptions;
pub use pipeline::{
    flatten_document, flatten_page, flatten_pages, FlattenError, FlattenReport, FlattenedDocument,
    FlattenedPages, PageSource,
};
pub use raster::{RasterError, RasterImage};
pub use render::{render_annotation, RenderError, RenderOutcome};

/// Size of every page, in page order
pub fn page_geometries(pdf_bytes: &[u8]) -> Result<Vec<PageGeometry>, FlattenError> {
    let doc = document::load(pdf_bytes)?;
    Ok(document::page_geometries(&doc))
}
