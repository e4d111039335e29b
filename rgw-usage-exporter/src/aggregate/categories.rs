//! Read/write classification of usage categories.
//!
//! A single centrally defined table, per the design note that any new
//! category observed on the wire and classified as neither read nor write
//! must still count toward `total_ops` and the API-ops map, with no crash
//! and no warning spam.

use once_cell::sync::Lazy;
use std::collections::HashSet;

static READ_CATEGORIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "get_obj",
        "list_bucket",
        "get_bucket_policy",
        "get_lifecycle",
        "get_obj_tags",
        "list_buckets",
        "get_bucket_location",
        "stat_bucket",
        "stat_account",
        "get_obj_acl",
        "get_bucket_versioning",
        "get_bucket_logging",
        "get_bucket_notification",
        "list_bucket_multiparts",
        "list_multipart",
        "get_request_payment",
        "get_bucket_public_access_block",
        "get_acls",
        "get_bucket_cors",
    ])
});

static WRITE_CATEGORIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "put_obj",
        "delete_obj",
        "create_bucket",
        "delete_bucket",
        "put_bucket_policy",
        "put_lifecycle",
        "put_obj_acl",
        "put_obj_metadata",
        "put_bucket_metadata",
        "delete_bucket_policy",
        "put_bucket_cors",
        "delete_bucket_cors",
        "put_bucket_logging",
        "delete_bucket_logging",
        "put_bucket_notification",
        "delete_bucket_notification",
        "put_bucket_versioning",
        "init_multipart",
        "complete_multipart",
        "abort_multipart",
        "multi_object_delete",
        "copy_obj",
        "put_acls",
        "post_obj",
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Read,
    Write,
    Unknown,
}

pub fn classify(category: &str) -> OpClass {
    if READ_CATEGORIES.contains(category) {
        OpClass::Read
    } else if WRITE_CATEGORIES.contains(category) {
        OpClass::Write
    } else {
        OpClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_obj_is_a_read() {
        assert_eq!(classify("get_obj"), OpClass::Read);
    }

    #[test]
    fn put_obj_is_a_write() {
        assert_eq!(classify("put_obj"), OpClass::Write);
    }

    #[test]
    fn unrecognized_category_is_unknown_not_an_error() {
        assert_eq!(classify("some_future_op"), OpClass::Unknown);
    }
}
