//! Field-name escaping for MongoDB storage.
//!
//! MongoDB reserves `.` and `$` in field names and forbids NUL. Stored documents have
//! such characters in their keys escaped on the way in and restored on the way out.
//! Values and collection names are left untouched: dots in collection names are the
//! nested-collection convention.

use bson::{Bson, Document};

pub(crate) struct KeySanitizer;

impl KeySanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    pub(crate) fn sanitize_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (Self::sanitize_key(k), Self::sanitize_value(v)))
            .collect()
    }

    pub(crate) fn restore_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (Self::restore_key(k), Self::restore_value(v)))
            .collect()
    }

    fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(arr.iter().map(Self::sanitize_value).collect()),
            Bson::Document(doc) => Bson::Document(Self::sanitize_document(doc)),
            _ => value.clone(),
        }
    }

    fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(arr.iter().map(Self::restore_value).collect()),
            Bson::Document(doc) => Bson::Document(Self::restore_document(doc)),
            _ => value.clone(),
        }
    }

    fn sanitize_key(input: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .fold(input.to_string(), |key, (target, replacement)| key.replace(target, replacement))
    }

    fn restore_key(input: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .rev()
            .fold(input.to_string(), |key, (target, replacement)| key.replace(replacement, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_nested_keys_but_not_values() {
        let original = doc! {
            "_id": 1,
            "prices": { "v1.0": "$5.00" },
            "list": [{ "$ref": "x" }],
        };

        let sanitized = KeySanitizer::sanitize_document(&original);
        assert_eq!(
            sanitized,
            doc! {
                "_id": 1,
                "prices": { "v1__dot__0": "$5.00" },
                "list": [{ "__dollar__ref": "x" }],
            }
        );
        assert_eq!(KeySanitizer::restore_document(&sanitized), original);
    }
}
