use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub(crate) enum ResponseError {
    #[error("no JSON array found in classifier response")]
    NoArray,
    #[error("classifier response is not valid JSON: {0}")]
    Syntax(String),
    #[error("classifier response JSON is not an array")]
    NotArray,
    #[error("classifier response item {index} does not match the annotation schema: {reason}")]
    Schema { index: usize, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelAnnotation {
    #[serde(default)]
    id: Value,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl ModelAnnotation {
    pub(crate) fn id(&self) -> Option<&str> {
        self.id.as_str()
    }

    pub(crate) fn into_payload(self) -> Value {
        Value::Object(self.fields)
    }
}

pub(crate) fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if trimmed.starts_with("```") {
        if let Some((_, rest)) = trimmed.split_once('\n') {
            trimmed = rest;
        }
        if let Some(inner) = trimmed.trim_end().strip_suffix("```") {
            trimmed = inner;
        }
    }
    trimmed.trim()
}

pub(crate) fn extract_json_array(text: &str) -> Result<&str, ResponseError> {
    let stripped = strip_code_fences(text);
    let start = stripped.find('[').ok_or(ResponseError::NoArray)?;
    let end = stripped.rfind(']').ok_or(ResponseError::NoArray)?;
    if end <= start {
        return Err(ResponseError::NoArray);
    }
    Ok(&stripped[start..=end])
}

pub(crate) fn parse_annotations(text: &str) -> Result<Vec<ModelAnnotation>, ResponseError> {
    let array_text = extract_json_array(text)?;
    let parsed: Value = serde_json::from_str(array_text)
        .map_err(|err| ResponseError::Syntax(err.to_string()))?;
    let Value::Array(items) = parsed else {
        return Err(ResponseError::NotArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<ModelAnnotation>(item).map_err(|err| ResponseError::Schema {
                index,
                reason: err.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_removes_language_tagged_fence() {
        let raw = "```json\n[{\"id\":\"x1\"}]\n```";
        assert_eq!(strip_code_fences(raw), "[{\"id\":\"x1\"}]");
    }

    #[test]
    fn strip_code_fences_leaves_plain_text_alone() {
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn extract_json_array_tolerates_surrounding_prose() {
        let raw = "Here you go:\n[{\"id\": \"a\"}]\nLet me know if you need more.";
        assert_eq!(
            extract_json_array(raw).expect("array should be found"),
            "[{\"id\": \"a\"}]"
        );
    }

    #[test]
    fn extract_json_array_rejects_missing_or_reversed_brackets() {
        assert_eq!(extract_json_array("no json here"), Err(ResponseError::NoArray));
        assert_eq!(extract_json_array("] backwards ["), Err(ResponseError::NoArray));
        assert_eq!(extract_json_array("{\"id\": 1}"), Err(ResponseError::NoArray));
    }

    #[test]
    fn parse_annotations_reads_fenced_upper_case_payload() {
        let raw = "```json\n[{\"id\":\"x1\",\"sentiment\":\"POSITIVE\",\"intent\":\"praise\"}]\n```";
        let items = parse_annotations(raw).expect("payload should parse");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), Some("x1"));
        let payload = items[0].clone().into_payload();
        assert_eq!(payload["sentiment"], "POSITIVE");
        assert!(payload.get("id").is_none());
    }

    #[test]
    fn parse_annotations_reports_syntax_errors() {
        let result = parse_annotations("[{\"id\": \"a\",}]");
        assert!(matches!(result, Err(ResponseError::Syntax(_))));
    }

    #[test]
    fn parse_annotations_reports_non_object_items_as_schema_errors() {
        let result = parse_annotations("[{\"id\": \"a\"}, 42]");
        assert!(matches!(result, Err(ResponseError::Schema { index: 1, .. })));
    }

    #[test]
    fn parse_annotations_keeps_items_with_unusable_ids() {
        let items = parse_annotations("[{\"id\": 5}, {\"sentiment\": \"neutral\"}]")
            .expect("payload should parse");
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.id().is_none()));
    }
}
