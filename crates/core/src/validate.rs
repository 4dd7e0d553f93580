//! # Output Validation
//!
//! Validates raw agent output against named JSON Schemas. Schemas are
//! bundled at compile time and consumed as opaque contracts; callers refer
//! to them by name only.
//!
//! Validation reports *all* violations found in one pass so a re-prompt can
//! address them together, and never throws past its boundary: an unknown
//! schema name comes back as an invalid result, not a panic.

use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;

/// Outcome of validating one payload against one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Bundled schemas, compiled once per process
const BUNDLED_SCHEMAS: &[(&str, &str)] = &[
    ("analyst", include_str!("../schemas/analyst.json")),
    ("architect", include_str!("../schemas/architect.json")),
    ("implementer", include_str!("../schemas/implementer.json")),
    ("tester", include_str!("../schemas/tester.json")),
    ("specialist", include_str!("../schemas/specialist.json")),
    ("custom", include_str!("../schemas/custom.json")),
    ("decomposition", include_str!("../schemas/decomposition.json")),
];

/// Validator over a registry of named schemas
pub struct OutputValidator {
    validators: HashMap<String, Validator>,
}

impl OutputValidator {
    /// Build a validator from the bundled schema set
    pub fn bundled() -> anyhow::Result<Self> {
        let mut validators = HashMap::new();
        for (name, raw) in BUNDLED_SCHEMAS {
            let schema: Value = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("schema '{}' is not valid JSON: {}", name, e))?;
            let validator = jsonschema::validator_for(&schema)
                .map_err(|e| anyhow::anyhow!("schema '{}' failed to compile: {}", name, e))?;
            validators.insert(name.to_string(), validator);
        }
        Ok(Self { validators })
    }

    /// Register or replace a schema under `name`
    pub fn register(&mut self, name: &str, schema: &Value) -> anyhow::Result<()> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| anyhow::anyhow!("schema '{}' failed to compile: {}", name, e))?;
        self.validators.insert(name.to_string(), validator);
        Ok(())
    }

    pub fn schema_names(&self) -> Vec<&str> {
        self.validators.keys().map(String::as_str).collect()
    }

    /// Validate `payload` against the schema registered under `schema_name`,
    /// collecting every violation
    pub fn validate(&self, payload: &Value, schema_name: &str) -> ValidationResult {
        let Some(validator) = self.validators.get(schema_name) else {
            return ValidationResult::invalid(vec![format!(
                "unknown schema '{}'",
                schema_name
            )]);
        };

        let errors: Vec<String> = validator
            .iter_errors(payload)
            .map(|err| {
                let path = err.instance_path().to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{}: {}", path, err)
                }
            })
            .collect();

        if errors.is_empty() {
            ValidationResult::ok()
        } else {
            ValidationResult::invalid(errors)
        }
    }
}

/// Extract a JSON object from raw model text
///
/// Accepts, in order of preference: a ```json fenced block, a bare fenced
/// block, or the outermost `{...}` span. Returns None when nothing parses.
pub fn extract_payload(raw: &str) -> Option<Value> {
    static FENCED: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let fenced = FENCED.get_or_init(|| {
        regex::Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap()
    });
    if let Some(caps) = fenced.captures(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    // Whole response might already be JSON
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        if value.is_object() {
            return Some(value);
        }
    }

    // Last resort: outermost brace span
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&raw[start..=end])
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> OutputValidator {
        OutputValidator::bundled().expect("bundled schemas compile")
    }

    #[test]
    fn test_bundled_schemas_compile() {
        let v = validator();
        for name in [
            "analyst",
            "architect",
            "implementer",
            "tester",
            "specialist",
            "custom",
            "decomposition",
        ] {
            assert!(v.schema_names().contains(&name), "missing schema {}", name);
        }
    }

    #[test]
    fn test_valid_architect_payload() {
        let payload = json!({
            "summary": "Two-tier layout",
            "components": [
                {"name": "api", "responsibility": "HTTP surface"}
            ]
        });
        let result = validator().validate(&payload, "architect");
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_reports_all_violations_in_one_pass() {
        // Missing summary AND missing components
        let payload = json!({ "decisions": [] });
        let result = validator().validate(&payload, "architect");
        assert!(!result.valid);
        assert!(result.errors.len() >= 2, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_unknown_schema_is_invalid_not_panic() {
        let result = validator().validate(&json!({}), "nonexistent");
        assert!(!result.valid);
        assert!(result.errors[0].contains("unknown schema"));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let v = validator();
        let payload = json!({ "summary": "s", "tests": [] });
        let first = v.validate(&payload, "tester");
        let second = v.validate(&payload, "tester");
        assert_eq!(first, second);
    }

    #[test]
    fn test_qa_mode_requires_answer() {
        let v = validator();
        let missing = json!({ "summary": "qa", "mode": "qa" });
        assert!(!v.validate(&missing, "analyst").valid);

        let ok = json!({ "summary": "qa", "mode": "qa", "answer": "42 components" });
        assert!(v.validate(&ok, "analyst").valid);
    }

    #[test]
    fn test_decomposition_rejects_unknown_agent_kind() {
        let v = validator();
        let payload = json!({
            "tasks": [{ "id": "t1", "agent_kind": "wizard", "input": "x" }]
        });
        assert!(!v.validate(&payload, "decomposition").valid);
    }

    #[test]
    fn test_extract_payload_fenced_block() {
        let raw = "Here you go:\n```json\n{\"summary\": \"ok\"}\n```\nDone.";
        let value = extract_payload(raw).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn test_extract_payload_bare_object() {
        let value = extract_payload("  {\"a\": 1}  ").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_payload_embedded_object() {
        let raw = "The result is {\"a\": {\"b\": 2}} as requested";
        let value = extract_payload(raw).unwrap();
        assert_eq!(value["a"]["b"], 2);
    }

    #[test]
    fn test_extract_payload_none_for_prose() {
        assert!(extract_payload("no json here").is_none());
    }
}
