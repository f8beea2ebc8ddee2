//! Document representation and value semantics.
//!
//! Documents are [`bson::Document`] maps addressed by an external string identifier.
//! This module defines the [`Record`] pairing flowing through the cursor pipeline and
//! the value rules every compiler shares: dotted field paths, numeric-aware equality,
//! the total order used by sorts, and the numeric coercion used by `$inc`.

use bson::{
    Bson,
    de::deserialize_from_bson,
    ser::serialize_to_bson,
};
use serde::{Serialize, de::DeserializeOwned};
use std::cmp::Ordering;

use crate::error::{DocumentStoreError, DocumentStoreResult};

pub use bson::Document;

/// Field name under which a projection embeds the external identifier.
pub const ID_FIELD: &str = "_id";

/// A document paired with the identifier it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The identifier naming the document within its store.
    pub id: String,
    /// The document body.
    pub document: Document,
}

impl Record {
    /// Creates a record from an identifier and a document.
    pub fn new(id: impl Into<String>, document: Document) -> Self {
        Self { id: id.into(), document }
    }
}

/// Extension trait converting serde types to and from documents.
///
/// Automatically implemented for every type that is both `Serialize` and
/// `DeserializeOwned`.
pub trait DocumentExt: Serialize + DeserializeOwned {
    /// Serializes this value into a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the value does not serialize
    /// to a BSON document (for example a bare string or number).
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Deserializes a value from a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the document does not match
    /// the shape of `Self`.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;
}

impl<T: Serialize + DeserializeOwned> DocumentExt for T {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::Serialization(format!(
                "expected a document, got {other}"
            ))),
        }
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

/// Resolves a dotted field path (`"a.b.c"`) against a document.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Assigns a value at a dotted field path, creating intermediate documents.
///
/// An intermediate segment holding a non-document value is replaced by an empty
/// document.
pub fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

/// Removes the value at a dotted field path, returning it if it was present.
pub fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(child)) => remove_path(child, rest),
            _ => None,
        },
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

// Integer pairs compare exactly; a double on either side compares as f64.
fn compare_numbers(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (integer(left), integer(right)) {
        return Some(a.cmp(&b));
    }

    let (a, b) = (numeric(left)?, numeric(right)?);
    Some(a.total_cmp(&b))
}

/// Equality used by conditions and `$pull`.
///
/// Integers and doubles compare by numeric value, arrays and documents compare
/// element-wise with the same rule, and everything else compares structurally.
/// Strings are never coerced to numbers.
pub fn values_equal(left: &Bson, right: &Bson) -> bool {
    if let (Some(a), Some(b)) = (integer(left), integer(right)) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
        return a == b;
    }

    match (left, right) {
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Bson::Document(a), Bson::Document(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => left == right,
    }
}

/// Tests whether the value at `path` equals `expected`.
///
/// A missing field equals an expected `null`.
pub fn field_matches(document: &Document, path: &str, expected: &Bson) -> bool {
    match get_path(document, path) {
        Some(value) => values_equal(value, expected),
        None => matches!(expected, Bson::Null),
    }
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None => 0,
        Some(Bson::Null | Bson::Undefined) => 1,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 2,
        Some(Bson::String(_) | Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

/// Total order over optional values used by sort specifications.
///
/// Missing sorts before `null`, which sorts before numbers, strings, documents,
/// arrays, booleans and dates, in that order. Values of other BSON types compare
/// equal among themselves.
pub fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Some(a), Some(b)) => {
            if let Some(ordering) = compare_numbers(a, b) {
                return ordering;
            }

            match (a, b) {
                (Bson::String(x), Bson::String(y)) => x.cmp(y),
                (Bson::Symbol(x), Bson::Symbol(y)) => x.cmp(y),
                (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
                (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
                (Bson::Array(x), Bson::Array(y)) => x
                    .iter()
                    .zip(y)
                    .map(|(p, q)| compare_values(Some(p), Some(q)))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or_else(|| x.len().cmp(&y.len())),
                (Bson::Document(x), Bson::Document(y)) => x
                    .iter()
                    .zip(y)
                    .map(|((kp, p), (kq, q))| {
                        kp.cmp(kq).then_with(|| compare_values(Some(p), Some(q)))
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or_else(|| x.len().cmp(&y.len())),
                _ => Ordering::Equal,
            }
        }
        _ => Ordering::Equal,
    }
}

/// Reads a value as a floating-point number, treating anything unparsable as zero.
///
/// Numeric strings (`"3"`, `" 2.5 "`) are parsed.
pub fn coerce_number(value: Option<&Bson>) -> f64 {
    let parsed = match value {
        Some(Bson::String(text)) => text.trim().parse::<f64>().ok(),
        Some(other) => numeric(other),
        None => None,
    };

    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Converts a number back into the narrowest BSON numeric type that holds it exactly.
pub fn number_to_bson(value: f64) -> Bson {
    if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Bson::Int32(value as i32)
    } else if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Bson::Int64(value as i64)
    } else {
        Bson::Double(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[test]
    fn paths_address_nested_documents() {
        let mut document = doc! { "a": { "b": 1 }, "c": 2 };

        assert_eq!(get_path(&document, "a.b"), Some(&Bson::Int32(1)));
        assert_eq!(get_path(&document, "c.d"), None);

        set_path(&mut document, "c.d", Bson::from("x"));
        assert_eq!(document, doc! { "a": { "b": 1 }, "c": { "d": "x" } });

        assert_eq!(remove_path(&mut document, "a.b"), Some(Bson::Int32(1)));
        assert_eq!(remove_path(&mut document, "a.zz"), None);
        assert_eq!(document.get_document("a").map(|a| a.len()).ok(), Some(0));
    }

    #[test]
    fn equality_is_numeric_aware_but_never_coerces_strings() {
        assert!(values_equal(&Bson::Int32(5), &Bson::Double(5.0)));
        assert!(values_equal(&Bson::Int64(5), &Bson::Int32(5)));
        assert!(!values_equal(&Bson::String("5".into()), &Bson::Int32(5)));
        assert!(values_equal(
            &Bson::Array(vec![Bson::Int32(1), Bson::from("a")]),
            &Bson::Array(vec![Bson::Double(1.0), Bson::from("a")]),
        ));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let low = Bson::Int64(9_007_199_254_740_992);
        let high = Bson::Int64(9_007_199_254_740_993);

        assert!(!values_equal(&low, &high));
        assert!(values_equal(&high, &Bson::Int64(9_007_199_254_740_993)));
        assert_eq!(compare_values(Some(&low), Some(&high)), Ordering::Less);
        assert_eq!(compare_values(Some(&Bson::Int32(-1)), Some(&Bson::Int64(i64::MAX))), Ordering::Less);
        assert!(field_matches(&doc! { "k": high.clone() }, "k", &high));
        assert!(!field_matches(&doc! { "k": low }, "k", &high));
    }

    #[test]
    fn null_expectation_matches_missing_field() {
        let document = doc! { "present": Bson::Null };

        assert!(field_matches(&document, "present", &Bson::Null));
        assert!(field_matches(&document, "absent", &Bson::Null));
        assert!(!field_matches(&document, "absent", &Bson::Int32(0)));
    }

    #[test]
    fn ordering_ranks_types_before_values() {
        let number = Bson::Int32(10);
        let string = Bson::from("a");

        assert_eq!(compare_values(None, Some(&Bson::Null)), Ordering::Less);
        assert_eq!(compare_values(Some(&number), Some(&string)), Ordering::Less);
        assert_eq!(
            compare_values(Some(&Bson::Double(2.5)), Some(&Bson::Int64(2))),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(Some(&Bson::from("b")), Some(&string)),
            Ordering::Greater
        );
    }

    #[test]
    fn coercion_parses_numeric_strings_and_defaults_to_zero() {
        assert_eq!(coerce_number(Some(&Bson::from("3"))), 3.0);
        assert_eq!(coerce_number(Some(&Bson::from("abc"))), 0.0);
        assert_eq!(coerce_number(Some(&Bson::Boolean(true))), 0.0);
        assert_eq!(coerce_number(None), 0.0);

        assert_eq!(number_to_bson(5.0), Bson::Int32(5));
        assert_eq!(number_to_bson(1.5), Bson::Double(1.5));
        assert_eq!(number_to_bson(5_000_000_000.0), Bson::Int64(5_000_000_000));
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        name: String,
        price: i32,
    }

    #[test]
    fn typed_values_convert_through_documents() {
        let item = Item { name: "pen".into(), price: 2 };
        let document = item.to_document().unwrap();

        assert_eq!(document, doc! { "name": "pen", "price": 2 });
        assert_eq!(Item::from_document(document).unwrap(), item);
        assert!(matches!(
            "bare".to_string().to_document(),
            Err(DocumentStoreError::Serialization(_))
        ));
    }
}
