//! Normalization of heterogeneous workflow-webhook responses into the
//! canonical chat envelope.
//!
//! Upstream answers arrive as a bare object, a list of objects, or an object
//! whose `output` field holds either a nested object or a JSON-encoded
//! string. Shape detection is explicit — no reflection, no coercion.

use std::cmp::Ordering;

use serde_json::Value;

use cn_core::ChatEnvelope;

/// Ranked collections are truncated to this many entries.
pub const RANKED_RESULT_LIMIT: usize = 10;

/// Normalize a raw webhook body into the canonical envelope.
pub fn normalize(raw: &Value) -> ChatEnvelope {
    // A list contributes only its FIRST element; anything beyond it is
    // silently discarded. Known upstream quirk, kept as-is.
    let item = match raw {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return ChatEnvelope::unexpected_shape("unexpected response shape: empty array"),
        },
        Value::Object(_) => raw,
        other => {
            return ChatEnvelope::unexpected_shape(format!(
                "unexpected response shape: {}",
                json_type_name(other)
            ))
        }
    };

    // `output` holding a JSON-encoded string decodes to the same source as a
    // nested object; a failed decode (or any other value type) falls back to
    // the outer object's own fields.
    let decoded;
    let source: &Value = match item.get("output") {
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(value) => {
                decoded = value;
                &decoded
            }
            Err(_) => item,
        },
        Some(nested @ Value::Object(_)) => nested,
        Some(_) | None => item,
    };

    ChatEnvelope {
        existing_solutions: ranked_items(source.get("existing_solutions")),
        potential_suppliers: ranked_items(source.get("potential_suppliers")),
        // The timestamp rides on the outer item, not the decoded output.
        timestamp: item.get("timestamp").cloned().filter(|v| !v.is_null()),
        success: true,
        error: None,
    }
}

/// Sort a collection by `ranking` descending and cap it. A missing or
/// non-list field means "no items", never an error.
fn ranked_items(field: Option<&Value>) -> Vec<Value> {
    let Some(Value::Array(items)) = field else {
        return Vec::new();
    };

    let mut items = items.clone();
    // Stable sort keeps equal rankings in upstream order, which keeps the
    // output deterministic.
    items.sort_by(|a, b| {
        ranking_of(b)
            .partial_cmp(&ranking_of(a))
            .unwrap_or(Ordering::Equal)
    });
    items.truncate(RANKED_RESULT_LIMIT);
    items
}

/// The `ranking` field as f64; missing or unparseable values rank 0.0.
fn ranking_of(item: &Value) -> f64 {
    let ranking = match item.get("ranking") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if ranking.is_finite() {
        ranking
    } else {
        0.0
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rankings(items: &[Value]) -> Vec<f64> {
        items.iter().map(ranking_of).collect()
    }

    #[test]
    fn absent_collections_yield_empty_success() {
        let envelope = normalize(&json!({"unrelated": 1}));
        assert!(envelope.existing_solutions.is_empty());
        assert!(envelope.potential_suppliers.is_empty());
        assert!(envelope.success);
        assert!(envelope.error.is_none());
    }

    #[test]
    fn sorts_descending_and_caps_at_ten() {
        let items: Vec<Value> = [1, 9, 3, 7, 2, 8, 4, 6, 5, 0, 10]
            .iter()
            .map(|r| json!({"name": format!("c{r}"), "ranking": r}))
            .collect();
        let envelope = normalize(&json!({"existing_solutions": items}));

        assert_eq!(envelope.existing_solutions.len(), RANKED_RESULT_LIMIT);
        assert_eq!(
            rankings(&envelope.existing_solutions),
            vec![10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]
        );
        // The lowest-ranked entry fell off the end.
        assert!(!envelope
            .existing_solutions
            .iter()
            .any(|i| i["name"] == "c0"));
    }

    #[test]
    fn string_encoded_and_nested_output_are_equivalent() {
        let inner = json!({
            "existing_solutions": [{"name": "A", "ranking": 2}, {"name": "B", "ranking": 7}],
            "potential_suppliers": [{"name": "C", "ranking": 1}],
        });
        let encoded = normalize(&json!({"output": inner.to_string()}));
        let nested = normalize(&json!({"output": inner}));
        assert_eq!(encoded, nested);
        assert_eq!(encoded.existing_solutions[0]["name"], "B");
    }

    #[test]
    fn undecodable_output_falls_back_to_outer_fields() {
        let envelope = normalize(&json!({
            "output": "{not valid json",
            "potential_suppliers": [{"name": "X", "ranking": 3}],
        }));
        assert_eq!(envelope.potential_suppliers.len(), 1);
        assert_eq!(envelope.potential_suppliers[0]["name"], "X");
    }

    #[test]
    fn list_contributes_only_its_first_element() {
        let envelope = normalize(&json!([
            {"potential_suppliers": [{"name": "first", "ranking": 1}]},
            {"potential_suppliers": [{"name": "second", "ranking": 9}]},
        ]));
        assert_eq!(envelope.potential_suppliers.len(), 1);
        assert_eq!(envelope.potential_suppliers[0]["name"], "first");
    }

    #[test]
    fn unrecognized_shapes_soft_fail() {
        for raw in [json!([]), json!("plain string"), json!(42), Value::Null] {
            let envelope = normalize(&raw);
            assert!(envelope.success);
            assert!(envelope.existing_solutions.is_empty());
            assert!(envelope.potential_suppliers.is_empty());
            let error = envelope.error.expect("shape error");
            assert!(error.contains("unexpected response shape"));
        }
    }

    #[test]
    fn non_list_collections_mean_no_items() {
        let envelope = normalize(&json!({
            "existing_solutions": "not a list",
            "potential_suppliers": {"name": "obj"},
        }));
        assert!(envelope.existing_solutions.is_empty());
        assert!(envelope.potential_suppliers.is_empty());
        assert!(envelope.success);
        assert!(envelope.error.is_none());
    }

    #[test]
    fn missing_and_unparseable_rankings_sort_as_zero() {
        let envelope = normalize(&json!({
            "potential_suppliers": [
                {"name": "none"},
                {"name": "texty", "ranking": "abc"},
                {"name": "stringy", "ranking": "5"},
                {"name": "real", "ranking": 2.5},
            ],
        }));
        let names: Vec<&str> = envelope
            .potential_suppliers
            .iter()
            .map(|i| i["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["stringy", "real", "none", "texty"]);
    }

    #[test]
    fn equal_rankings_keep_upstream_order() {
        let envelope = normalize(&json!({
            "existing_solutions": [
                {"name": "a", "ranking": 1},
                {"name": "b", "ranking": 1},
                {"name": "c", "ranking": 1},
            ],
        }));
        let names: Vec<&str> = envelope
            .existing_solutions
            .iter()
            .map(|i| i["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn timestamp_passes_through_from_the_outer_item() {
        let envelope = normalize(&json!([{
            "output": json!({"existing_solutions": []}).to_string(),
            "timestamp": "2024-03-01T09:00:00Z",
        }]));
        assert_eq!(envelope.timestamp, Some(json!("2024-03-01T09:00:00Z")));

        let none = normalize(&json!({"existing_solutions": []}));
        assert!(none.timestamp.is_none());
    }
}
