//! Canonical serialization and content addressing for ABI documents.
//!
//! Stored ABI rows are deduplicated by a digest of their canonical JSON form,
//! so the serialization here must stay stable forever: object keys sorted at
//! every depth, `", "` item and `": "` key separators and non-ASCII escaped
//! as `\uXXXX`. Documents that differ only in key ordering hash identically.

use md5::{Digest, Md5};
use serde_json::Value;

/// Number of bytes of the MD5 digest kept as the content address.
pub const ABI_HASH_LEN: usize = 4;

/// Serialize a JSON value canonically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Content address of an ABI document: the trailing [`ABI_HASH_LEN`] bytes of
/// the MD5 digest of its canonical serialization.
pub fn abi_hash(value: &Value) -> [u8; ABI_HASH_LEN] {
    let digest = Md5::digest(canonical_json(value).as_bytes());
    let mut hash = [0u8; ABI_HASH_LEN];
    hash.copy_from_slice(&digest[16 - ABI_HASH_LEN..]);
    hash
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_value(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c if c.is_ascii() => out.push(c),
            c => {
                // escape non-ASCII, splitting astral chars into surrogate pairs
                let cp = c as u32;
                if cp > 0xffff {
                    let cp = cp - 0x10000;
                    out.push_str(&format!(
                        "\\u{:04x}\\u{:04x}",
                        0xd800 + (cp >> 10),
                        0xdc00 + (cp & 0x3ff)
                    ));
                } else {
                    out.push_str(&format!("\\u{cp:04x}"));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_depth() {
        let a = serde_json::from_str::<Value>(
            r#"[{"type":"function","name":"transfer","inputs":[{"type":"address","name":"to"}]}]"#,
        )
        .unwrap();
        let b = serde_json::from_str::<Value>(
            r#"[{"inputs":[{"name":"to","type":"address"}],"name":"transfer","type":"function"}]"#,
        )
        .unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(abi_hash(&a), abi_hash(&b));
    }

    #[test]
    fn matches_reference_serialization() {
        // json.dumps({"b": [1, true], "a": "x"}, sort_keys=True)
        let value = json!({"b": [1, true], "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a": "x", "b": [1, true]}"#);
    }

    #[test]
    fn matches_reference_digest() {
        // hashlib.md5(json.dumps([], sort_keys=True).encode()).hexdigest()
        // == "d751713988987e9331980363e24189ce"
        assert_eq!(abi_hash(&json!([])), [0xe2, 0x41, 0x89, 0xce]);
    }

    #[test]
    fn escapes_non_ascii() {
        let value = json!({"name": "caf\u{00e9}"});
        assert_eq!(canonical_json(&value), "{\"name\": \"caf\\u00e9\"}");
    }

    #[test]
    fn hash_is_stable_for_known_abi() {
        let abi = serde_json::from_str::<Value>(
            r#"[{"inputs":[{"name":"owner","type":"address"}],"name":"balanceOf",
                "outputs":[{"name":"","type":"uint256"}],"stateMutability":"view",
                "type":"function"}]"#,
        )
        .unwrap();
        // md5 of the reference serialization is 251e5fd9210dc70a50878b1cb9ecc58b
        assert_eq!(abi_hash(&abi), [0xb9, 0xec, 0xc5, 0x8b]);
    }
}
