//! Canonical JSON used as signing input
//!
//! Compact output, object keys sorted by byte order at every depth, arrays in
//! their given order. Scalars use serde_json's own formatting. The result does
//! not depend on serde_json's `preserve_order` feature, so the signer and the
//! verifier always hash the same bytes for the same logical value.

use serde_json::Value;

/// Render `value` canonically
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
        // Compact serde_json rendering, escapes included
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let value = json!({
            "version": 1,
            "data": { "zeta": [3, { "b": true, "a": null }], "alpha": "x" },
            "id": "abc",
        });
        assert_eq!(
            to_canonical_string(&value),
            r#"{"data":{"alpha":"x","zeta":[3,{"a":null,"b":true}]},"id":"abc","version":1}"#
        );
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();
        assert_eq!(to_canonical_string(&a), to_canonical_string(&b));
    }

    #[test]
    fn test_string_escapes_match_serde_json() {
        let s = "quote \" slash \\ nl \n tab \t bell \u{07} del \u{7f} emoji 🎫 é";
        assert_eq!(
            to_canonical_string(&Value::String(s.to_string())),
            serde_json::to_string(s).unwrap()
        );
    }

    #[test]
    fn test_keys_are_escaped() {
        let value = json!({ "line\nbreak": 1, "quo\"te": { "\u{01}": null } });
        assert_eq!(
            to_canonical_string(&value),
            r#"{"line\nbreak":1,"quo\"te":{"\u0001":null}}"#
        );
    }

    #[test]
    fn test_numbers() {
        let value = json!([0, -7, 1.5, 1e-7, u64::MAX, i64::MIN]);
        assert_eq!(
            to_canonical_string(&value),
            serde_json::to_string(&value).unwrap()
        );
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::from),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map(".*", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_canonical_survives_reparse(value in arb_json()) {
            let canonical = to_canonical_string(&value);
            let reparsed: Value = serde_json::from_str(&canonical).unwrap();
            prop_assert_eq!(&reparsed, &value);
            prop_assert_eq!(to_canonical_string(&reparsed), canonical);
        }
    }
}
