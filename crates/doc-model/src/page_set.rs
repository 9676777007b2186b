//! Per-page annotation sets and the submission envelope

use crate::annotation::{AnnotationObject, ModelError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One annotation still in wire form
///
/// Entries are decoded one at a time so a malformed object only costs itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAnnotation(pub Value);

impl RawAnnotation {
    pub fn decode(&self) -> Result<AnnotationObject, ModelError> {
        AnnotationObject::from_value(&self.0)
    }
}

impl From<&AnnotationObject> for RawAnnotation {
    fn from(annotation: &AnnotationObject) -> Self {
        Self(annotation.to_value())
    }
}

/// Annotations keyed by 1-based page number, in z-order within each page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageAnnotationSet {
    pages: BTreeMap<u32, Vec<RawAnnotation>>,
}

impl PageAnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the annotations of a page, keeping the given order
    pub fn set_page(&mut self, page_number: u32, annotations: &[AnnotationObject]) {
        let raw = annotations.iter().map(RawAnnotation::from).collect();
        self.pages.insert(page_number, raw);
    }

    /// Replace a page with entries still in wire form
    pub fn set_raw_page(&mut self, page_number: u32, annotations: Vec<RawAnnotation>) {
        self.pages.insert(page_number, annotations);
    }

    pub fn push(&mut self, page_number: u32, annotation: &AnnotationObject) {
        self.pages.entry(page_number).or_default().push(annotation.into());
    }

    pub fn push_raw(&mut self, page_number: u32, raw: Value) {
        self.pages.entry(page_number).or_default().push(RawAnnotation(raw));
    }

    pub fn page(&self, page_number: u32) -> &[RawAnnotation] {
        self.pages.get(&page_number).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Decode every entry of a page, keeping failures in place
    pub fn decode_page(&self, page_number: u32) -> Vec<Result<AnnotationObject, ModelError>> {
        self.page(page_number).iter().map(RawAnnotation::decode).collect()
    }

    /// Pages in ascending order, including pages whose sequence is empty
    pub fn pages(&self) -> impl Iterator<Item = (u32, &[RawAnnotation])> {
        self.pages.iter().map(|(page, annotations)| (*page, annotations.as_slice()))
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    pub fn annotation_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.annotation_count() == 0
    }
}

impl Serialize for PageAnnotationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<String, &Vec<RawAnnotation>> =
            self.pages.iter().map(|(page, annotations)| (page.to_string(), annotations)).collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PageAnnotationSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_wire_map(map))
    }
}

impl PageAnnotationSet {
    /// Build from the `pages` object of a submission
    ///
    /// Keys that are not positive integers are dropped; a page value that is
    /// not an array counts as an empty page.
    pub fn from_wire_map(map: Map<String, Value>) -> Self {
        let mut pages = BTreeMap::new();

        for (key, value) in map {
            let Some(page_number) = key.trim().parse::<u32>().ok().filter(|page| *page >= 1) else {
                tracing::warn!(key = %key, "ignoring annotation page with invalid page number");
                continue;
            };

            let annotations = match value {
                Value::Array(items) => items.into_iter().map(RawAnnotation).collect(),
                _ => Vec::new(),
            };
            pages.insert(page_number, annotations);
        }

        Self { pages }
    }
}

/// Body of a signing submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    #[serde(default)]
    pub pages: PageAnnotationSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Snapshot of the page being edited at submit time; informational only
    #[serde(default, deserialize_with = "objects_or_empty")]
    pub current_page_objects: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_height: Option<f64>,
}

impl SubmissionPayload {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// `null` or any non-array value reads as no objects
fn objects_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ImageAnnotation;
    use serde_json::json;

    #[test]
    fn submission_keeps_page_order_and_z_order() {
        let payload = SubmissionPayload::from_json(
            br#"{
                "pages": {
                    "10": [{"type": "path", "path": "M 0 0"}],
                    "2": [
                        {"type": "i-text", "text": "first"},
                        {"type": "i-text", "text": "second"}
                    ]
                },
                "totalPages": 12,
                "currentPageObjects": [],
                "canvasWidth": 800,
                "canvasHeight": 1000
            }"#,
        )
        .expect("payload should parse");

        assert_eq!(payload.pages.page_numbers(), vec![2, 10]);
        assert_eq!(payload.total_pages, Some(12));

        let texts: Vec<String> = payload
            .pages
            .decode_page(2)
            .into_iter()
            .map(|decoded| match decoded.expect("decode") {
                AnnotationObject::Text(text) => text.text,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn informational_snapshot_tolerates_null() {
        for snapshot in ["null", "{}", "\"stale\""] {
            let body = format!(r#"{{"pages": {{"1": []}}, "currentPageObjects": {snapshot}}}"#);
            let payload = SubmissionPayload::from_json(body.as_bytes()).expect("payload should parse");
            assert!(payload.current_page_objects.is_empty(), "{snapshot}");
            assert_eq!(payload.pages.page_numbers(), vec![1]);
        }

        let payload = SubmissionPayload::from_json(br#"{"currentPageObjects": [{"type": "path"}]}"#)
            .expect("payload should parse");
        assert_eq!(payload.current_page_objects.len(), 1);
    }

    #[test]
    fn invalid_page_keys_and_values_are_tolerated() {
        let set: PageAnnotationSet = serde_json::from_value(json!({
            "0": [{"type": "path"}],
            "abc": [{"type": "path"}],
            "3": "not an array",
            "4": [{"type": "path"}]
        }))
        .expect("set should parse");

        assert_eq!(set.page_numbers(), vec![3, 4]);
        assert!(set.page(3).is_empty());
        assert_eq!(set.page(4).len(), 1);
        assert!(set.page(99).is_empty());
    }

    #[test]
    fn malformed_entries_decode_individually() {
        let mut set = PageAnnotationSet::new();
        set.push_raw(1, json!({"type": "i-text", "text": "ok"}));
        set.push_raw(1, json!({"type": "i-text", "left": [1, 2]}));
        set.push_raw(1, json!({"type": "triangle"}));

        let decoded = set.decode_page(1);
        assert!(decoded[0].is_ok());
        assert!(decoded[1].is_err());
        assert!(matches!(decoded[2], Ok(AnnotationObject::Unsupported { .. })));
    }

    #[test]
    fn set_serializes_with_string_keys() {
        let mut set = PageAnnotationSet::new();
        set.push(
            1,
            &AnnotationObject::Image(ImageAnnotation {
                source_data_uri: String::new(),
                left: 0.0,
                top: 0.0,
                width: 10.0,
                height: 10.0,
                scale_x: 1.0,
                scale_y: 1.0,
            }),
        );

        let value = serde_json::to_value(&set).expect("serialize");
        assert_eq!(value["1"][0]["type"], "image");

        let back: PageAnnotationSet = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, set);
    }
}
