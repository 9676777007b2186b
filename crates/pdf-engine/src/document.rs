//! lopdf document access: loading, page geometry, resources and commit

use crate::canvas::CanvasContent;
use crate::pipeline::FlattenError;
use crate::raster::RasterImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::Serialize;

const LETTER_WIDTH_PT: f64 = 612.0;
const LETTER_HEIGHT_PT: f64 = 792.0;
const MAX_PARENT_DEPTH: usize = 64;

/// Size and origin of a page's MediaBox, in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    #[serde(skip)]
    pub origin_x: f64,
    #[serde(skip)]
    pub origin_y: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self { width: LETTER_WIDTH_PT, height: LETTER_HEIGHT_PT, origin_x: 0.0, origin_y: 0.0 }
    }
}

pub fn load(bytes: &[u8]) -> Result<Document, FlattenError> {
    if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(FlattenError::EncryptedUnsupported);
    }

    let doc = Document::load_mem(bytes)?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(FlattenError::EncryptedUnsupported);
    }
    if doc.get_pages().is_empty() {
        return Err(FlattenError::NoPages);
    }

    Ok(doc)
}

pub fn save(mut doc: Document, compress: bool) -> Result<Vec<u8>, FlattenError> {
    if compress {
        doc.compress();
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|err| FlattenError::Save(err.to_string()))?;
    Ok(buffer)
}

/// Page sizes in page order
pub fn page_geometries(doc: &Document) -> Vec<PageGeometry> {
    doc.get_pages().values().map(|page_id| page_geometry(doc, *page_id)).collect()
}

pub fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|media_box| media_box_geometry(doc, &media_box))
        .unwrap_or_default()
}

fn media_box_geometry(doc: &Document, media_box: &Object) -> Option<PageGeometry> {
    let array = resolve(doc, media_box).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut values = [0.0f64; 4];
    for (slot, object) in values.iter_mut().zip(array) {
        *slot = number(resolve(doc, object))?;
    }
    let [x0, y0, x1, y1] = values;
    let (width, height) = ((x1 - x0).abs(), (y1 - y0).abs());
    if width == 0.0 || height == 0.0 {
        return None;
    }

    Some(PageGeometry { width, height, origin_x: x0.min(x1), origin_y: y0.min(y1) })
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Look up a page attribute, walking the `Parent` chain for inherited values
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        if depth > MAX_PARENT_DEPTH {
            break;
        }
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    None
}

/// Give the page its own direct resource dictionary and report the names in use
///
/// Inherited or shared resources are copied down so adding entries never
/// changes what other pages see.
pub fn prepare_resources(doc: &mut Document, page_id: ObjectId) -> Result<Vec<String>, FlattenError> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(object) => match resolve(doc, &object) {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        None => Dictionary::new(),
    };

    let mut names = Vec::new();
    for category in [b"Font".as_slice(), b"XObject".as_slice()] {
        let entries = match resources.get(category) {
            Ok(object) => match resolve(doc, object) {
                Object::Dictionary(dict) => dict.clone(),
                _ => Dictionary::new(),
            },
            Err(_) => Dictionary::new(),
        };
        names.extend(entries.iter().map(|(name, _)| String::from_utf8_lossy(name).into_owned()));
        resources.set(category.to_vec(), Object::Dictionary(entries));
    }

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)?
        .set("Resources", Object::Dictionary(resources));
    Ok(names)
}

/// Append rendered marks to a page whose resources were prepared
pub fn commit(doc: &mut Document, page_id: ObjectId, content: CanvasContent) -> Result<(), FlattenError> {
    if content.operations.is_empty() {
        return Ok(());
    }

    let font_id = content.font.as_ref().map(|_| {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        })
    });
    let images: Vec<(String, ObjectId)> = content
        .images
        .into_iter()
        .map(|(name, image)| (name, add_image(doc, image)))
        .collect();

    let mut operations = Vec::with_capacity(content.operations.len() + 1);
    operations.push(Operation::new("Q", vec![]));
    operations.extend(content.operations);
    let mut marks = b"\n".to_vec();
    marks.extend(Content { operations }.encode()?);
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let marks_id = doc.add_object(Stream::new(dictionary! {}, marks));

    let existing = existing_contents(doc, page_id)?;
    let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(marks_id));
    page.set("Contents", Object::Array(contents));

    let resources = match page.get_mut(b"Resources") {
        Ok(Object::Dictionary(dict)) => dict,
        _ => return Err(FlattenError::Backend("page resources were not prepared".to_owned())),
    };
    if let (Some(name), Some(id)) = (content.font, font_id) {
        sub_dictionary(resources, b"Font")?.set(name.into_bytes(), Object::Reference(id));
    }
    let xobjects = sub_dictionary(resources, b"XObject")?;
    for (name, id) in images {
        xobjects.set(name.into_bytes(), Object::Reference(id));
    }

    Ok(())
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, FlattenError> {
    let page = doc.get_dictionary(page_id)?;
    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    Ok(contents)
}

fn sub_dictionary<'a>(resources: &'a mut Dictionary, key: &[u8]) -> Result<&'a mut Dictionary, FlattenError> {
    if !matches!(resources.get(key), Ok(Object::Dictionary(_))) {
        resources.set(key.to_vec(), Object::Dictionary(Dictionary::new()));
    }
    match resources.get_mut(key) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(FlattenError::Backend(format!(
            "resource category {} is not a dictionary",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn add_image(doc: &mut Document, image: RasterImage) -> ObjectId {
    let width = i64::from(image.width);
    let height = i64::from(image.height);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if let Some(alpha) = image.alpha {
        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        dict.set("SMask", Object::Reference(smask_id));
    }

    doc.add_object(Stream::new(dict, image.rgb))
}
