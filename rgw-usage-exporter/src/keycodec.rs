//! Composite key encoding for cross-namespace joins
//!
//! Keys are built from URL-safe base64 (no padding) per component, joined
//! by `.`. An empty component encodes to the literal `none` rather than an
//! empty base64 string, so the placeholder round-trips unambiguously.
//!
//! A user key is `enc(id) "." enc(tenant)`. A bucket/usage key extends it
//! with a third component: `enc(id) "." enc(tenant) "." enc(bucket)`. The
//! user-key form is therefore always a strict prefix of every bucket-key
//! belonging to that user — this prefix relation is the join key the
//! aggregator uses to group usage and bucket records under their owner.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{Error, Result};

const NONE: &str = "none";

/// Encode a user identity into its composite key.
pub fn encode_user(id: &str, tenant: &str) -> String {
    format!("{}.{}", encode_component(id), encode_component(tenant))
}

/// Encode a `(user, bucket)` identity into its composite key.
pub fn encode_bucket(id: &str, tenant: &str, bucket: &str) -> String {
    format!("{}.{}", encode_user(id, tenant), encode_component(bucket))
}

/// Decode a composite key back into `(id, tenant, bucket)`.
///
/// Accepts both `.` (current) and `$` (legacy) as the component separator.
/// Fails when the key doesn't split into 1, 2, or 3 components, or when any
/// component is neither `none` nor valid URL-safe base64.
pub fn decode(key: &str) -> Result<(String, String, Option<String>)> {
    let sep = if key.contains('.') { '.' } else { '$' };
    let parts: Vec<&str> = key.split(sep).collect();

    match parts.as_slice() {
        [id] => Ok((decode_component(id)?, String::new(), None)),
        [id, tenant] => Ok((decode_component(id)?, decode_component(tenant)?, None)),
        [id, tenant, bucket] => Ok((
            decode_component(id)?,
            decode_component(tenant)?,
            Some(decode_component(bucket)?),
        )),
        _ => Err(Error::KeyFormat(format!(
            "key {key:?} has {} components, expected 1, 2, or 3",
            parts.len()
        ))),
    }
}

/// Split an owner identity string (`id$tenant` or just `id`) into its parts.
pub fn split_identity(s: &str) -> (String, String) {
    match s.split_once('$') {
        Some((id, tenant)) => (id.to_string(), tenant.to_string()),
        None => (s.to_string(), String::new()),
    }
}

/// Inverse of [`split_identity`]: `id$tenant` when tenanted, else just `id`.
pub fn join_identity(id: &str, tenant: &str) -> String {
    if tenant.is_empty() {
        id.to_string()
    } else {
        format!("{id}${tenant}")
    }
}

fn encode_component(s: &str) -> String {
    if s.is_empty() {
        NONE.to_string()
    } else {
        URL_SAFE_NO_PAD.encode(s.as_bytes())
    }
}

fn decode_component(s: &str) -> Result<String> {
    if s == NONE {
        return Ok(String::new());
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::KeyFormat(format!("component {s:?} is not valid URL-safe: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::KeyFormat(format!("component {s:?} is not valid UTF-8: {e}")))
}

/// True when `bucket_key` belongs to the user identified by `user_key`.
pub fn is_prefix_of(user_key: &str, bucket_key: &str) -> bool {
    bucket_key
        .strip_prefix(user_key)
        .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_round_trips() {
        let key = encode_user("alice", "");
        let (id, tenant, bucket) = decode(&key).unwrap();
        assert_eq!(id, "alice");
        assert_eq!(tenant, "");
        assert_eq!(bucket, None);
    }

    #[test]
    fn bucket_key_round_trips() {
        let key = encode_bucket("bob", "acme", "photos");
        let (id, tenant, bucket) = decode(&key).unwrap();
        assert_eq!(id, "bob");
        assert_eq!(tenant, "acme");
        assert_eq!(bucket, Some("photos".to_string()));
    }

    #[test]
    fn empty_components_map_to_none_placeholder() {
        let key = encode_user("", "");
        assert_eq!(key, "none.none");
        let (id, tenant, _) = decode(&key).unwrap();
        assert_eq!(id, "");
        assert_eq!(tenant, "");
    }

    #[test]
    fn legacy_dollar_separator_decodes() {
        let key = encode_bucket("bob", "acme", "photos").replace('.', "$");
        let (id, tenant, bucket) = decode(&key).unwrap();
        assert_eq!(id, "bob");
        assert_eq!(tenant, "acme");
        assert_eq!(bucket, Some("photos".to_string()));
    }

    #[test]
    fn rejects_too_many_components() {
        let err = decode("a.b.c.d").unwrap_err();
        assert!(matches!(err, Error::KeyFormat(_)));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = decode("not-base64-!!!.none").unwrap_err();
        assert!(matches!(err, Error::KeyFormat(_)));
    }

    #[test]
    fn bucket_key_is_prefixed_by_its_user_key() {
        let user_key = encode_user("bob", "acme");
        let bucket_key = encode_bucket("bob", "acme", "photos");
        assert!(is_prefix_of(&user_key, &bucket_key));
        assert!(!is_prefix_of(&user_key, &encode_bucket("eve", "", "x")));
    }

    #[test]
    fn split_identity_splits_on_first_dollar() {
        assert_eq!(split_identity("bob$acme"), ("bob".into(), "acme".into()));
        assert_eq!(split_identity("bob"), ("bob".into(), "".into()));
    }

    #[test]
    fn join_identity_is_the_inverse_of_split_identity() {
        assert_eq!(join_identity("bob", "acme"), "bob$acme");
        assert_eq!(join_identity("bob", ""), "bob");
        let (id, tenant) = split_identity(&join_identity("bob", "acme"));
        assert_eq!((id.as_str(), tenant.as_str()), ("bob", "acme"));
    }
}
