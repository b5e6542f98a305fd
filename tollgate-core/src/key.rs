//! Deterministic cache-key derivation for external API requests.
//!
//! A key is the SHA-256 of `service|operation|canonical-params`, hex encoded.
//! Canonicalization sorts object keys at every nesting level and serializes
//! with compact separators, so two requests whose parameters are equal as
//! key/value sets derive the same key regardless of insertion order.
//!
//! # Exact-match semantics
//!
//! Derivation is NOT semantically aware, by design: `5000` and `"5000"`, or
//! `"40.71"` and `"40.7100"`, derive different keys even though a human might
//! consider them equivalent. The cache trades recall for a zero
//! false-positive guarantee: it never returns a response for meaningfully
//! different parameters. Any fuzzy matching (geographic clustering, text
//! normalization) belongs in a layer in front of this one, never inside it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::KeyError;

/// Length of the hex-encoded key (full SHA-256 digest).
pub const KEY_HEX_LEN: usize = 64;

/// Opaque, fixed-length cache key.
///
/// Construct via [`derive_key`]; the inner digest is not reversible to the
/// original parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for `(service_name, operation, params)`.
///
/// `params` may be any JSON-representable structure (maps, sequences,
/// strings, numbers, booleans, null, arbitrarily nested).
///
/// # Errors
///
/// [`KeyError::Unserializable`] if the parameters fall outside the JSON data
/// model. That is a caller bug, reported eagerly rather than silently
/// degrading.
pub fn derive_key<P: Serialize>(
    service_name: &str,
    operation: &str,
    params: &P,
) -> Result<CacheKey, KeyError> {
    let value = serde_json::to_value(params).map_err(|e| KeyError::Unserializable {
        reason: e.to_string(),
    })?;

    let mut canonical = String::new();
    write_canonical(&value, &mut canonical)?;

    let composite = format!("{service_name}|{operation}|{canonical}");
    let digest = Sha256::digest(composite.as_bytes());
    Ok(CacheKey(hex::encode(digest)))
}

/// Serialize a JSON value with sorted object keys and compact separators.
///
/// serde_json's default map type already sorts, but downstream feature
/// unification can switch it to insertion order; sorting here keeps the key
/// stable either way.
fn write_canonical(value: &Value, out: &mut String) -> Result<(), KeyError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(s, out)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(k, out)?;
                out.push(':');
                write_canonical(v, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_escaped(s: &str, out: &mut String) -> Result<(), KeyError> {
    let escaped = serde_json::to_string(s).map_err(|e| KeyError::Unserializable {
        reason: e.to_string(),
    })?;
    out.push_str(&escaped);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deterministic() {
        let params = json!({"location": "40.7,-74.0", "radius": 5000});
        let k1 = derive_key("places", "nearby_search", &params).expect("derive should succeed");
        let k2 = derive_key("places", "nearby_search", &params).expect("derive should succeed");
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_key_length_and_format() {
        let key = derive_key("places", "nearby_search", &json!({"radius": 5000}))
            .expect("derive should succeed");
        assert_eq!(key.as_str().len(), KEY_HEX_LEN);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.as_str(), key.as_str().to_lowercase());
    }

    #[test]
    fn test_param_order_independence() {
        let k1 = derive_key(
            "places",
            "nearby_search",
            &json!({"location": "40.7,-74.0", "radius": 5000}),
        )
        .expect("derive should succeed");
        let k2 = derive_key(
            "places",
            "nearby_search",
            &json!({"radius": 5000, "location": "40.7,-74.0"}),
        )
        .expect("derive should succeed");
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_nested_order_independence() {
        let k1 = derive_key(
            "places",
            "text_search",
            &json!({"filter": {"open_now": true, "min_rating": 4}, "query": "pharmacy"}),
        )
        .expect("derive should succeed");
        let k2 = derive_key(
            "places",
            "text_search",
            &json!({"query": "pharmacy", "filter": {"min_rating": 4, "open_now": true}}),
        )
        .expect("derive should succeed");
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_value_change_changes_key() {
        let base = derive_key("places", "nearby_search", &json!({"radius": 5000}))
            .expect("derive should succeed");
        let changed = derive_key("places", "nearby_search", &json!({"radius": 10000}))
            .expect("derive should succeed");
        assert_ne!(base, changed);
    }

    #[test]
    fn test_type_change_changes_key() {
        // 5000 vs "5000" must not collide: exact-match only.
        let number = derive_key("places", "nearby_search", &json!({"radius": 5000}))
            .expect("derive should succeed");
        let string = derive_key("places", "nearby_search", &json!({"radius": "5000"}))
            .expect("derive should succeed");
        assert_ne!(number, string);
    }

    #[test]
    fn test_precision_change_changes_key() {
        let k1 = derive_key("places", "nearby_search", &json!({"location": "40.7128,-74.0060"}))
            .expect("derive should succeed");
        let k2 = derive_key("places", "nearby_search", &json!({"location": "40.7129,-74.0060"}))
            .expect("derive should succeed");
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_service_and_operation_segments() {
        let params = json!({"q": "water"});
        let a = derive_key("places", "text_search", &params).expect("derive should succeed");
        let b = derive_key("weather", "text_search", &params).expect("derive should succeed");
        let c = derive_key("places", "nearby_search", &params).expect("derive should succeed");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_array_order_is_significant() {
        let k1 = derive_key("places", "details", &json!({"fields": ["name", "rating"]}))
            .expect("derive should succeed");
        let k2 = derive_key("places", "details", &json!({"fields": ["rating", "name"]}))
            .expect("derive should succeed");
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_null_value_vs_absent_key() {
        let with_null = derive_key("places", "details", &json!({"lang": null}))
            .expect("derive should succeed");
        let absent = derive_key("places", "details", &json!({})).expect("derive should succeed");
        assert_ne!(with_null, absent);
    }

    #[test]
    fn test_non_finite_float_fails_fast() {
        #[derive(serde::Serialize)]
        struct Bad {
            ratio: f64,
        }
        let result = derive_key("places", "details", &Bad { ratio: f64::NAN });
        assert!(matches!(result, Err(KeyError::Unserializable { .. })));
    }

    #[test]
    fn test_string_escaping_is_stable() {
        let k1 = derive_key("places", "text_search", &json!({"q": "caf\u{e9} \"bar\""}))
            .expect("derive should succeed");
        let k2 = derive_key("places", "text_search", &json!({"q": "caf\u{e9} \"bar\""}))
            .expect("derive should succeed");
        assert_eq!(k1, k2);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    /// Strategy for parameter maps with distinct keys and scalar values.
    fn params_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
        proptest::collection::hash_map("[a-z]{1,8}", any::<i64>(), 1..8)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: insertion order of parameter keys never affects the key.
        #[test]
        fn prop_order_independent(pairs in params_strategy()) {
            let forward: Map<String, Value> = pairs
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(*v)))
                .collect();
            let reversed: Map<String, Value> = pairs
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), Value::from(*v)))
                .collect();

            let k1 = derive_key("svc", "op", &forward).expect("derive should succeed");
            let k2 = derive_key("svc", "op", &reversed).expect("derive should succeed");
            prop_assert_eq!(k1, k2);
        }

        /// Property: changing any single value changes the key.
        #[test]
        fn prop_value_sensitive(pairs in params_strategy(), bump in 1i64..1000) {
            let original: Map<String, Value> = pairs
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(*v)))
                .collect();

            let mut perturbed = original.clone();
            let first_key = pairs[0].0.clone();
            let new_value = pairs[0].1.wrapping_add(bump);
            perturbed.insert(first_key, Value::from(new_value));

            let k1 = derive_key("svc", "op", &original).expect("derive should succeed");
            let k2 = derive_key("svc", "op", &perturbed).expect("derive should succeed");
            prop_assert_ne!(k1, k2);
        }

        /// Property: keys are always 64 lowercase hex characters.
        #[test]
        fn prop_fixed_length_hex(pairs in params_strategy()) {
            let params: Map<String, Value> = pairs
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect();
            let key = derive_key("svc", "op", &params).expect("derive should succeed");
            prop_assert_eq!(key.as_str().len(), KEY_HEX_LEN);
            prop_assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        }
    }
}
