//! Token payload decoding.
//!
//! The client trusts whatever issued the token: only the middle segment is
//! read, the header and signature are carried along untouched. Every failure
//! is returned as a [`DecodeError`]; nothing here panics.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;
use thiserror::Error;

use crate::Claims;

/// Standard-alphabet engine that accepts padded and unpadded input, the way a
/// browser's `atob` does.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Why a token payload could not be turned into [`Claims`].
///
/// Callers are expected to treat every variant the same way; the distinction
/// exists for diagnostics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token must have 3 dot-separated segments, found {segments}")]
    MalformedStructure { segments: usize },

    #[error("payload segment is not valid base64url: {0}")]
    Base64(String),

    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("payload is not a JSON object: {0}")]
    JsonParse(String),
}

impl DecodeError {
    /// Short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::MalformedStructure { .. } => "malformed_structure",
            DecodeError::Base64(_) => "base64",
            DecodeError::InvalidUtf8(_) => "invalid_utf8",
            DecodeError::JsonParse(_) => "json_parse",
        }
    }
}

/// The three raw segments of a token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TokenParts<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

/// Split a token into header, payload and signature.
pub fn split(token: &str) -> Result<TokenParts<'_>, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    match segments.as_slice() {
        [header, payload, signature] => Ok(TokenParts {
            header,
            payload,
            signature,
        }),
        _ => Err(DecodeError::MalformedStructure {
            segments: segments.len(),
        }),
    }
}

/// Decode the claims carried by `token` without checking its signature.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let parts = split(token)?;
    tracing::trace!(payload_len = parts.payload.len(), "decoding token payload");

    let standard: String = parts
        .payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE
        .decode(standard.as_bytes())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let text = String::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;

    let value: Value =
        serde_json::from_str(&text).map_err(|e| DecodeError::JsonParse(e.to_string()))?;

    match value {
        Value::Object(fields) => Ok(Claims::from_map(fields)),
        other => Err(DecodeError::JsonParse(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, UserId};
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use serde_json::json;

    const HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

    fn token_for(payload: &Value) -> String {
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("{HEADER}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn decodes_well_formed_token() {
        let token = token_for(&json!({
            "id": 1,
            "email": "a@b.com",
            "role": "admin",
            "exp": 4_102_444_800i64,
        }));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.user_id(), Some(UserId::new(1)));
        assert_eq!(claims.email(), Some("a@b.com"));
        assert_eq!(claims.role(), Some(Role::Admin));
        assert_eq!(claims.exp().and_then(|n| n.as_i64()), Some(4_102_444_800));
    }

    #[test]
    fn signature_is_not_inspected() {
        let payload = json!({"id": 2, "email": "t@b.com", "role": "trainer"});
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());

        let a = decode(&format!("{HEADER}.{body}.")).unwrap();
        let b = decode(&format!("garbage.{body}.!!not-base64!!")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn recovers_multibyte_characters() {
        let token = token_for(&json!({
            "id": 5,
            "email": "zoe@example.com",
            "role": "trainer",
            "name": "Zoë Łukasiewicz 山田",
        }));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.name(), Some("Zoë Łukasiewicz 山田"));
    }

    #[test]
    fn accepts_padded_and_standard_alphabet_payloads() {
        let payload = json!({"id": 9, "email": "p@b.com", "role": "admin", "name": "??>>"});
        let padded = STANDARD.encode(serde_json::to_vec(&payload).unwrap());
        let token = format!("{HEADER}.{padded}.sig");

        assert_eq!(decode(&token).unwrap().name(), Some("??>>"));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert_eq!(
            decode("not-a-jwt"),
            Err(DecodeError::MalformedStructure { segments: 1 })
        );
        assert_eq!(
            decode("a.b"),
            Err(DecodeError::MalformedStructure { segments: 2 })
        );
        assert_eq!(
            decode("a.b.c.d"),
            Err(DecodeError::MalformedStructure { segments: 4 })
        );
        assert_eq!(
            decode(""),
            Err(DecodeError::MalformedStructure { segments: 1 })
        );
    }

    #[test]
    fn rejects_bad_base64() {
        let err = decode("h.%%%%.s").unwrap_err();
        assert_eq!(err.kind(), "base64");

        // A single trailing symbol can never be valid base64.
        let err = decode("h.eyJpZCI6MX0ab.s").unwrap_err();
        assert_eq!(err.kind(), "base64");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let body = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
        let err = decode(&format!("h.{body}.s")).unwrap_err();
        assert_eq!(err.kind(), "invalid_utf8");
    }

    #[test]
    fn rejects_non_json_and_non_object_payloads() {
        let body = URL_SAFE_NO_PAD.encode("hello there");
        assert_eq!(decode(&format!("h.{body}.s")).unwrap_err().kind(), "json_parse");

        let body = URL_SAFE_NO_PAD.encode("[1,2,3]");
        let err = decode(&format!("h.{body}.s")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::JsonParse("expected a JSON object, found an array".into())
        );

        assert_eq!(decode("h..s").unwrap_err().kind(), "json_parse");
    }

    #[test]
    fn accepts_any_json_object() {
        let payload = json!({"email": "a@b.com", "role": "admin"});
        let claims = decode(&token_for(&payload)).unwrap();
        assert_eq!(claims.id(), None);
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);

        let payload = json!({"id": "u-42", "email": "a@b.com", "role": "owner", "exp": "soon"});
        let claims = decode(&token_for(&payload)).unwrap();
        assert_eq!(claims.id(), Some(&json!("u-42")));
        assert_eq!(claims.role(), None);
        assert_eq!(claims.exp(), None);
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);

        let claims = decode(&token_for(&json!({}))).unwrap();
        assert!(claims.as_map().is_empty());
    }

    #[test]
    fn split_exposes_opaque_segments() {
        let parts = split("aaa.bbb.ccc").unwrap();
        assert_eq!(parts.header, "aaa");
        assert_eq!(parts.payload, "bbb");
        assert_eq!(parts.signature, "ccc");
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use serde_json::Map;

        fn payload_strategy() -> impl Strategy<Value = Value> {
            (
                any::<i64>(),
                "[a-z]{1,12}@[a-z]{1,8}\\.(com|org|io)",
                prop_oneof![Just("trainer"), Just("admin")],
                proptest::option::of("\\PC{0,24}"),
                proptest::option::of(0i64..=10_000_000_000),
                proptest::collection::btree_map("x_[a-z]{1,8}", "\\PC{0,16}", 0..4),
            )
                .prop_map(|(id, email, role, name, exp, extra)| {
                    let mut obj = Map::new();
                    obj.insert("id".into(), json!(id));
                    obj.insert("email".into(), json!(email));
                    obj.insert("role".into(), json!(role));
                    if let Some(name) = name {
                        obj.insert("name".into(), json!(name));
                    }
                    if let Some(exp) = exp {
                        obj.insert("exp".into(), json!(exp));
                    }
                    for (k, v) in extra {
                        obj.insert(k, json!(v));
                    }
                    Value::Object(obj)
                })
        }

        /// Any JSON value; floats are quarters so they print and parse exactly.
        fn json_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::from),
                any::<i64>().prop_map(Value::from),
                any::<u64>().prop_map(Value::from),
                (-4_000_000i64..4_000_000).prop_map(|n| json!(n as f64 / 4.0)),
                "\\PC{0,16}".prop_map(Value::from),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    proptest::collection::btree_map("\\PC{0,8}", inner, 0..4)
                        .prop_map(|m| Value::Object(m.into_iter().collect())),
                ]
            })
        }

        /// Objects with arbitrary keys, including the recognized claim names
        /// bound to values of any type.
        fn object_strategy() -> impl Strategy<Value = Value> {
            let key = prop_oneof![
                Just("id".to_string()),
                Just("email".to_string()),
                Just("role".to_string()),
                Just("name".to_string()),
                Just("exp".to_string()),
                "\\PC{0,10}",
            ];
            proptest::collection::btree_map(key, json_value(), 0..8)
                .prop_map(|m| Value::Object(m.into_iter().collect()))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: a well-formed token decodes to exactly its payload,
            /// whatever its signature segment holds.
            #[test]
            fn well_formed_tokens_decode_to_payload(
                payload in payload_strategy(),
                signature in "[A-Za-z0-9_-]{0,43}",
            ) {
                let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
                let token = format!("{HEADER}.{body}.{signature}");

                let claims = decode(&token).unwrap();
                prop_assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
            }

            /// Property: every JSON object payload decodes, and re-serializing
            /// the claims yields the payload unchanged.
            #[test]
            fn arbitrary_objects_decode_to_payload(payload in object_strategy()) {
                let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
                let token = format!("{HEADER}.{body}.sig");

                let claims = decode(&token).unwrap();
                prop_assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
            }

            /// Property: decode never panics on arbitrary input.
            #[test]
            fn arbitrary_strings_never_panic(input in "\\PC{0,64}") {
                let _ = decode(&input);
            }

            /// Property: anything but three segments is a structural error.
            #[test]
            fn wrong_segment_count_is_malformed(
                segments in proptest::collection::vec("[A-Za-z0-9_-]{0,12}", 1..8)
                    .prop_filter("three segments is well-formed", |s| s.len() != 3),
            ) {
                let token = segments.join(".");
                prop_assert_eq!(
                    decode(&token),
                    Err(DecodeError::MalformedStructure { segments: segments.len() })
                );
            }
        }
    }
}
