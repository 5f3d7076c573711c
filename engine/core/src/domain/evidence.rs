// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evidence
//!
//! Inbound inspection requests and the evidence items they carry.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Validate loosely shaped request payloads once, at the boundary,
//!   into a tagged union of evidence items
//!
//! Internal components only ever see [`EvidenceItem`]; nothing past
//! [`InspectRequest::into_items`] branches on raw JSON shape.

use crate::domain::errors::{EngineError, ValidationError};
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Hard cap on evidence items per request.
pub const MAX_EVIDENCE_ITEMS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    Image,
    Text,
    Form,
    Sensor,
    Video,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Form => "form",
            Self::Sensor => "sensor",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "text" => Some(Self::Text),
            "form" => Some(Self::Form),
            "sensor" => Some(Self::Sensor),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where image bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(String),
    Inline {
        data: Bytes,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(alias = "label")]
    pub question: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Checklist {
    Items(Vec<ChecklistItem>),
    /// Form data without an `items` array, analyzed as pretty-printed JSON
    Raw(Value),
}

impl Checklist {
    /// Render as the numbered COMPLETED / NOT COMPLETED listing fed to the text analyzer.
    pub fn render(&self) -> String {
        let mut out = String::from("CHECKLIST ANALYSIS\n\n");
        match self {
            Self::Items(items) => {
                for (i, item) in items.iter().enumerate() {
                    out.push_str(&format!("{}. {}\n", i + 1, item.question));
                    let status = if item.completed { "COMPLETED" } else { "NOT COMPLETED" };
                    out.push_str(&format!("   Status: {}\n", status));
                    if let Some(response) = &item.response {
                        out.push_str(&format!("   Response: {}\n", response));
                    }
                    if let Some(notes) = &item.notes {
                        out.push_str(&format!("   Notes: {}\n", notes));
                    }
                    out.push('\n');
                }
            }
            Self::Raw(value) => {
                out.push_str(&serde_json::to_string_pretty(value).unwrap_or_default());
            }
        }
        out
    }
}

/// Validated evidence payload, one variant per analysis path.
///
/// Video has no variant: it is rejected during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidencePayload {
    Image(ImageSource),
    Text {
        content: String,
        document_type: Option<String>,
        name: Option<String>,
    },
    Checklist(Checklist),
    Sensor(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceItem {
    /// Position in the request; results are reported in this order
    pub index: usize,
    pub evidence_type: EvidenceType,
    pub payload: EvidencePayload,
    pub source_locator: Option<String>,
}

/// Caller-supplied context echoed into prompts and report metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl InspectionContext {
    pub fn location_or(&self, fallback: &str) -> String {
        self.location
            .clone()
            .or_else(|| self.area.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// The engine's inbound request.
///
/// `input_type` and `payload` stay untyped until [`InspectRequest::into_items`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_pack: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,

    #[serde(default)]
    pub input_type: String,

    #[serde(default)]
    pub context: InspectionContext,

    #[serde(default)]
    pub payload: Value,
}

impl InspectRequest {
    pub fn input_type(&self) -> Result<EvidenceType, EngineError> {
        EvidenceType::parse(&self.input_type).ok_or_else(|| {
            ValidationError::InvalidInputType(self.input_type.clone()).into()
        })
    }

    /// Validate the payload into evidence items.
    ///
    /// Fails with `Unsupported` for video and `Validation` for anything else
    /// malformed. No item is produced for an invalid request.
    pub fn into_items(&self, max_items: usize) -> Result<Vec<EvidenceItem>, EngineError> {
        let input_type = self.input_type()?;
        let payload = &self.payload;

        let items: Vec<(EvidenceType, EvidencePayload, Option<String>)> = match input_type {
            EvidenceType::Video => {
                return Err(EngineError::Unsupported(
                    "Video input processing is not yet supported".to_string(),
                ))
            }
            EvidenceType::Image => parse_images(payload)?,
            EvidenceType::Text => parse_text(payload)?,
            EvidenceType::Form => {
                let raw = payload
                    .get("checklist")
                    .or_else(|| payload.get("form_data"))
                    .ok_or_else(|| {
                        ValidationError::MalformedPayload(
                            "For input_type \"form\", payload must contain \"checklist\" or \"form_data\""
                                .to_string(),
                        )
                    })?;
                vec![(EvidenceType::Form, EvidencePayload::Checklist(parse_checklist(raw)?), None)]
            }
            EvidenceType::Sensor => match payload.get("readings").and_then(Value::as_array) {
                Some(readings) if !readings.is_empty() => readings
                    .iter()
                    .map(|r| (EvidenceType::Sensor, EvidencePayload::Sensor(r.clone()), None))
                    .collect(),
                _ if payload.is_object() => {
                    vec![(EvidenceType::Sensor, EvidencePayload::Sensor(payload.clone()), None)]
                }
                _ => {
                    return Err(ValidationError::MalformedPayload(
                        "For input_type \"sensor\", payload must be an object".to_string(),
                    )
                    .into())
                }
            },
        };

        if items.len() > max_items {
            return Err(ValidationError::TooManyItems {
                count: items.len(),
                max: max_items,
            }
            .into());
        }

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, (evidence_type, payload, source_locator))| EvidenceItem {
                index,
                evidence_type,
                payload,
                source_locator,
            })
            .collect())
    }
}

fn malformed(msg: &str) -> EngineError {
    ValidationError::MalformedPayload(msg.to_string()).into()
}

fn parse_images(
    payload: &Value,
) -> Result<Vec<(EvidenceType, EvidencePayload, Option<String>)>, EngineError> {
    let images = payload
        .get("images")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            malformed("For input_type \"image\", payload must contain a non-empty \"images\" array")
        })?;

    images
        .iter()
        .map(|entry| {
            let source = match entry {
                Value::String(s) if s.starts_with("data:") => decode_data_url(s)?,
                Value::String(s) => parse_url(s)?,
                Value::Object(obj) => {
                    if let Some(url) = obj.get("url").and_then(Value::as_str) {
                        parse_url(url)?
                    } else if let Some(data) = obj.get("data").and_then(Value::as_str) {
                        let content_type = obj
                            .get("content_type")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        ImageSource::Inline {
                            data: decode_base64(data)?,
                            content_type,
                        }
                    } else {
                        return Err(malformed("Image entries must carry \"url\" or \"data\""));
                    }
                }
                _ => return Err(malformed("Image entries must be URLs or objects")),
            };
            let locator = match &source {
                ImageSource::Url(u) => Some(u.clone()),
                ImageSource::Inline { .. } => None,
            };
            Ok((EvidenceType::Image, EvidencePayload::Image(source), locator))
        })
        .collect()
}

fn parse_url(raw: &str) -> Result<ImageSource, EngineError> {
    let url = url::Url::parse(raw)
        .map_err(|e| malformed(&format!("Invalid image URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(ImageSource::Url(raw.to_string())),
        other => Err(malformed(&format!("Unsupported image URL scheme '{}'", other))),
    }
}

fn decode_base64(data: &str) -> Result<Bytes, EngineError> {
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map(Bytes::from)
        .map_err(|e| malformed(&format!("Invalid base64 image data: {}", e)))
}

fn decode_data_url(raw: &str) -> Result<ImageSource, EngineError> {
    let rest = raw.trim_start_matches("data:");
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| malformed("Malformed data URL"))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| malformed("Only base64 data URLs are accepted"))?;
    Ok(ImageSource::Inline {
        data: decode_base64(data)?,
        content_type: (!content_type.is_empty()).then(|| content_type.to_string()),
    })
}

/// Documents may arrive as text or as structured JSON.
fn document_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

fn parse_text(
    payload: &Value,
) -> Result<Vec<(EvidenceType, EvidencePayload, Option<String>)>, EngineError> {
    let doc_type = |v: &Value| v.get("document_type").and_then(Value::as_str).map(str::to_string);

    if let Some(text) = payload.get("text").and_then(Value::as_str) {
        return Ok(vec![(
            EvidenceType::Text,
            EvidencePayload::Text {
                content: text.to_string(),
                document_type: None,
                name: None,
            },
            None,
        )]);
    }
    if let Some(document) = payload.get("document") {
        return Ok(vec![(
            EvidenceType::Text,
            EvidencePayload::Text {
                content: document_text(document),
                document_type: doc_type(payload),
                name: None,
            },
            None,
        )]);
    }
    if let Some(checklist) = payload.get("checklist") {
        return Ok(vec![(
            EvidenceType::Form,
            EvidencePayload::Checklist(parse_checklist(checklist)?),
            None,
        )]);
    }
    if let Some(documents) = payload.get("documents").and_then(Value::as_array) {
        if documents.is_empty() {
            return Err(malformed("\"documents\" must not be empty"));
        }
        return documents
            .iter()
            .map(|doc| {
                let content = doc
                    .get("content")
                    .map(document_text)
                    .ok_or_else(|| malformed("Each document must carry \"content\""))?;
                let name = doc.get("name").and_then(Value::as_str).map(str::to_string);
                Ok((
                    EvidenceType::Text,
                    EvidencePayload::Text {
                        content,
                        document_type: doc.get("type").and_then(Value::as_str).map(str::to_string),
                        name: name.clone(),
                    },
                    name,
                ))
            })
            .collect();
    }

    Err(malformed(
        "No text content provided. Expected \"text\", \"document\", \"checklist\", or \"documents\" in payload.",
    ))
}

fn parse_checklist(raw: &Value) -> Result<Checklist, EngineError> {
    match raw.get("items") {
        Some(items @ Value::Array(_)) => serde_json::from_value(items.clone())
            .map(Checklist::Items)
            .map_err(|e| malformed(&format!("Invalid checklist item: {}", e))),
        _ => Ok(Checklist::Raw(raw.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(input_type: &str, payload: Value) -> InspectRequest {
        InspectRequest {
            protocol_pack: Some("food_service_nationwide_v1".to_string()),
            input_type: input_type.to_string(),
            payload,
            ..Default::default()
        }
    }

    #[test]
    fn test_image_urls_become_ordered_items() {
        let req = request(
            "image",
            json!({"images": ["https://cdn.example.com/a.jpg", {"url": "https://cdn.example.com/b.png"}]}),
        );
        let items = req.into_items(MAX_EVIDENCE_ITEMS).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].index, 1);
        assert_eq!(items[1].source_locator.as_deref(), Some("https://cdn.example.com/b.png"));
    }

    #[test]
    fn test_inline_data_url_is_decoded() {
        let req = request("image", json!({"images": ["data:image/png;base64,aGVsbG8="]}));
        let items = req.into_items(MAX_EVIDENCE_ITEMS).unwrap();
        match &items[0].payload {
            EvidencePayload::Image(ImageSource::Inline { data, content_type }) => {
                assert_eq!(&data[..], b"hello");
                assert_eq!(content_type.as_deref(), Some("image/png"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_video_is_unsupported_not_invalid() {
        let req = request("video", json!({"videos": ["https://x/y.mp4"]}));
        assert!(matches!(req.into_items(10), Err(EngineError::Unsupported(_))));
    }

    #[test]
    fn test_unknown_input_type_rejected() {
        let req = request("audio", json!({}));
        assert!(matches!(
            req.into_items(10),
            Err(EngineError::Validation(ValidationError::InvalidInputType(_)))
        ));
    }

    #[test]
    fn test_empty_images_rejected() {
        let req = request("image", json!({"images": []}));
        assert!(matches!(req.into_items(10), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_item_cap_enforced() {
        let urls: Vec<String> = (0..5).map(|i| format!("https://x.test/{}.jpg", i)).collect();
        let req = request("image", json!({ "images": urls }));
        assert!(matches!(
            req.into_items(4),
            Err(EngineError::Validation(ValidationError::TooManyItems { count: 5, max: 4 }))
        ));
    }

    #[test]
    fn test_documents_fan_out() {
        let req = request(
            "text",
            json!({"documents": [
                {"name": "sop.txt", "type": "procedure", "content": "Wash hands"},
                {"name": "log.json", "content": {"temps": [40, 39]}}
            ]}),
        );
        let items = req.into_items(10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source_locator.as_deref(), Some("sop.txt"));
        match &items[1].payload {
            EvidencePayload::Text { content, .. } => assert!(content.contains("\"temps\"")),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_form_checklist_renders_completion() {
        let req = request(
            "form",
            json!({"checklist": {"items": [
                {"question": "Sanitizer buckets at 200ppm", "completed": true},
                {"label": "Walk-in below 41F", "completed": false, "notes": "reads 44F"}
            ]}}),
        );
        let items = req.into_items(10).unwrap();
        assert_eq!(items[0].evidence_type, EvidenceType::Form);
        let EvidencePayload::Checklist(checklist) = &items[0].payload else {
            panic!("expected checklist");
        };
        let rendered = checklist.render();
        assert!(rendered.starts_with("CHECKLIST ANALYSIS"));
        assert!(rendered.contains("1. Sanitizer buckets at 200ppm\n   Status: COMPLETED"));
        assert!(rendered.contains("2. Walk-in below 41F\n   Status: NOT COMPLETED"));
        assert!(rendered.contains("   Notes: reads 44F"));
    }

    #[test]
    fn test_sensor_readings() {
        let req = request("sensor", json!({"readings": [{"temp_f": 40}, {"temp_f": 45}]}));
        assert_eq!(req.into_items(10).unwrap().len(), 2);
    }

    #[test]
    fn test_text_without_content_rejected() {
        let req = request("text", json!({"body": "nothing useful"}));
        assert!(matches!(req.into_items(10), Err(EngineError::Validation(_))));
    }
}
