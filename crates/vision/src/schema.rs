use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("code fence pattern is valid"));

/// A landmark the model recognized, fields taken verbatim from its answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

/// Strictly typed reading of one model answer
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Recognized(Landmark),
    /// The model answered with an `error` key
    Unidentified(String),
    /// The answer was not the agreed JSON shape
    Unparseable(String),
}

#[derive(Deserialize)]
struct RawLandmark {
    name: String,
    lat: f64,
    #[serde(alias = "lon")]
    lng: f64,
    #[serde(default)]
    desc: Option<String>,
}

/// Remove markdown code fences (```json ... ```) wrapped around an answer.
pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw, "").trim().to_string()
}

pub fn parse_response(raw: &str) -> Recognition {
    let cleaned = strip_code_fences(raw);

    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(e) => return Recognition::Unparseable(format!("invalid JSON: {}", e)),
    };

    let Some(object) = value.as_object() else {
        return Recognition::Unparseable("answer is not a JSON object".to_string());
    };

    if let Some(error) = object.get("error") {
        let reason = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Recognition::Unidentified(reason);
    }

    let raw: RawLandmark = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => return Recognition::Unparseable(format!("invalid landmark payload: {}", e)),
    };

    if raw.name.trim().is_empty() {
        return Recognition::Unparseable("landmark name is empty".to_string());
    }

    Recognition::Recognized(Landmark {
        name: raw.name,
        latitude: raw.lat,
        longitude: raw.lng,
        description: raw.desc.filter(|d| !d.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_answer() {
        let raw = "```json\n{\"name\":\"Eiffel Tower\",\"lat\":48.8584,\"lng\":2.2945,\"desc\":\"Iconic Paris landmark\"}\n```";

        assert_eq!(
            parse_response(raw),
            Recognition::Recognized(Landmark {
                name: "Eiffel Tower".to_string(),
                latitude: 48.8584,
                longitude: 2.2945,
                description: Some("Iconic Paris landmark".to_string()),
            })
        );
    }

    #[test]
    fn test_bare_fence_and_whitespace() {
        let raw = "  ```\n{\"name\":\"Louvre Museum\",\"lat\":48.8606,\"lon\":2.3376}\n```  ";

        match parse_response(raw) {
            Recognition::Recognized(landmark) => {
                assert_eq!(landmark.name, "Louvre Museum");
                assert_eq!(landmark.longitude, 2.3376);
                assert_eq!(landmark.description, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_key_is_unidentified() {
        assert_eq!(
            parse_response(r#"{"error":"unknown"}"#),
            Recognition::Unidentified("unknown".to_string())
        );
    }

    #[test]
    fn test_string_coordinates_rejected() {
        let raw = r#"{"name":"Notre Dame","lat":"48.8529","lng":2.3501}"#;
        assert!(matches!(parse_response(raw), Recognition::Unparseable(_)));
    }

    #[test]
    fn test_missing_key_rejected() {
        let raw = r#"{"name":"Notre Dame","lat":48.8529}"#;
        assert!(matches!(parse_response(raw), Recognition::Unparseable(_)));
    }

    #[test]
    fn test_prose_rejected() {
        let raw = "I think this is the Panthéon in Paris.";
        assert!(matches!(parse_response(raw), Recognition::Unparseable(_)));
    }

    #[test]
    fn test_array_rejected() {
        assert!(matches!(parse_response("[1, 2]"), Recognition::Unparseable(_)));
    }

    #[test]
    fn test_empty_description_dropped() {
        let raw = r#"{"name":"Pantheon","lat":48.8462,"lng":2.3447,"desc":"  "}"#;
        match parse_response(raw) {
            Recognition::Recognized(landmark) => assert_eq!(landmark.description, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_name_kept_verbatim() {
        let raw = r#"{"name":" Sacré-Cœur ","lat":48.8867,"lng":2.3431}"#;
        match parse_response(raw) {
            Recognition::Recognized(landmark) => assert_eq!(landmark.name, " Sacré-Cœur "),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_blank_name_rejected() {
        let raw = r#"{"name":"   ","lat":48.8867,"lng":2.3431}"#;
        assert!(matches!(parse_response(raw), Recognition::Unparseable(_)));
    }
}
