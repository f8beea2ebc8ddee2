//! Condition, projection and sort-order compilers.
//!
//! Each specification is either structural (a document describing the intent), an
//! opaque function supplied by the caller, or a raw [`Bson`] value of unknown shape
//! as received from an outer layer. Compiling a specification validates it and
//! yields a pure function over documents:
//!
//! - [`Condition`] compiles to a [`Predicate`]
//! - [`Projection`] compiles to a [`Projector`]
//! - [`Order`] compiles to a [`Comparator`]
//!
//! # Example
//!
//! ```ignore
//! use quarry_core::query::{Condition, Order};
//! use bson::doc;
//!
//! let predicate = Condition::from(doc! { "status": "active" }).compile()?;
//! let comparator = Order::from(doc! { "price": 1, "stock": -1 }).compile()?;
//! ```

use bson::{Bson, Document};
use std::{cmp::Ordering, fmt, sync::Arc};

use crate::{
    document::{ID_FIELD, Record, compare_values, field_matches, get_path, remove_path, set_path},
    error::{DocumentStoreError, DocumentStoreResult},
};

type PredicateFn = Arc<dyn Fn(&Document) -> bool + Send + Sync>;
type TransformFn = Arc<dyn Fn(Document) -> Document + Send + Sync>;
type ComparatorFn = Arc<dyn Fn(&Document, &Document) -> Ordering + Send + Sync>;

/// Selects which documents a query returns.
#[derive(Clone, Default)]
pub enum Condition {
    /// Matches every document.
    #[default]
    All,
    /// Matches documents whose fields equal every listed value.
    Match(Document),
    /// Matches documents accepted by a caller-supplied function.
    Predicate(PredicateFn),
    /// An unvalidated value; `null` means [`Condition::All`] and a document means
    /// [`Condition::Match`]. Anything else fails to compile.
    Raw(Bson),
}

impl Condition {
    /// Creates a condition from a predicate function.
    pub fn predicate(f: impl Fn(&Document) -> bool + Send + Sync + 'static) -> Self {
        Condition::Predicate(Arc::new(f))
    }

    /// Returns `true` if the condition can be seen to match every document
    /// without compiling it.
    pub fn is_all(&self) -> bool {
        match self {
            Condition::All | Condition::Raw(Bson::Null) => true,
            Condition::Match(fields) | Condition::Raw(Bson::Document(fields)) => fields.is_empty(),
            _ => false,
        }
    }

    /// Returns the structural equality fields of this condition, if it has any.
    pub fn fields(&self) -> Option<&Document> {
        match self {
            Condition::Match(fields) | Condition::Raw(Bson::Document(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Compiles the condition into a predicate.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidCondition`] carrying the offending value
    /// if a raw condition is neither `null` nor a document.
    pub fn compile(&self) -> DocumentStoreResult<Predicate> {
        match self {
            Condition::All | Condition::Raw(Bson::Null) => Ok(Predicate::always()),
            Condition::Match(fields) | Condition::Raw(Bson::Document(fields)) => {
                Ok(Predicate::equal_fields(fields.clone()))
            }
            Condition::Predicate(f) => Ok(Predicate(f.clone())),
            Condition::Raw(other) => Err(DocumentStoreError::InvalidCondition(other.clone())),
        }
    }
}

impl From<Document> for Condition {
    fn from(fields: Document) -> Self {
        Condition::Match(fields)
    }
}

impl From<Bson> for Condition {
    fn from(value: Bson) -> Self {
        Condition::Raw(value)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::All => write!(f, "All"),
            Condition::Match(fields) => f.debug_tuple("Match").field(fields).finish(),
            Condition::Predicate(_) => write!(f, "Predicate(<function>)"),
            Condition::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
        }
    }
}

/// A compiled condition.
#[derive(Clone)]
pub struct Predicate(PredicateFn);

impl Predicate {
    /// A predicate accepting every document.
    pub fn always() -> Self {
        Predicate(Arc::new(|_| true))
    }

    fn equal_fields(fields: Document) -> Self {
        match fields.len() {
            0 => Predicate::always(),
            1 => match fields.into_iter().next() {
                Some((path, expected)) => Predicate(Arc::new(move |document| {
                    field_matches(document, &path, &expected)
                })),
                None => Predicate::always(),
            },
            _ => Predicate(Arc::new(move |document| {
                fields
                    .iter()
                    .all(|(path, expected)| field_matches(document, path, expected))
            })),
        }
    }

    /// Tests a document against the predicate.
    pub fn matches(&self, document: &Document) -> bool {
        (self.0)(document)
    }
}

/// Shapes the documents a query returns.
#[derive(Clone, Default)]
pub enum Projection {
    /// Returns documents unchanged.
    #[default]
    All,
    /// Retains, drops or renames fields.
    ///
    /// `1`/`true` includes a field, `0`/`false` excludes it, and a string `"$path"`
    /// computes the field from another path. Inclusion and exclusion cannot be
    /// mixed. `_id` is special: `_id: 1` embeds the external identifier and never
    /// decides between inclusion and exclusion.
    Fields(Document),
    /// Transforms documents with a caller-supplied function.
    Transform(TransformFn),
    /// An unvalidated value; `null` means [`Projection::All`] and a document means
    /// [`Projection::Fields`].
    Raw(Bson),
}

impl Projection {
    /// Creates a projection from a transform function.
    pub fn transform(f: impl Fn(Document) -> Document + Send + Sync + 'static) -> Self {
        Projection::Transform(Arc::new(f))
    }

    /// Returns `true` if the projection leaves documents untouched.
    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All | Projection::Raw(Bson::Null))
    }

    /// Compiles the projection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidProjection`] if a field rule is neither a
    /// flag nor a `"$path"` reference, if inclusion and exclusion are mixed, or if a
    /// raw projection is not a document.
    pub fn compile(&self) -> DocumentStoreResult<Projector> {
        match self {
            Projection::All | Projection::Raw(Bson::Null) => Ok(Projector::identity()),
            Projection::Fields(fields) | Projection::Raw(Bson::Document(fields)) => {
                Projector::fields(fields)
            }
            Projection::Transform(f) => {
                let f = f.clone();
                Ok(Projector(Arc::new(move |record: Record| Record {
                    document: f(record.document),
                    id: record.id,
                })))
            }
            Projection::Raw(other) => Err(DocumentStoreError::InvalidProjection(other.clone())),
        }
    }
}

impl From<Document> for Projection {
    fn from(fields: Document) -> Self {
        Projection::Fields(fields)
    }
}

impl From<Bson> for Projection {
    fn from(value: Bson) -> Self {
        Projection::Raw(value)
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::All => write!(f, "All"),
            Projection::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Projection::Transform(_) => write!(f, "Transform(<function>)"),
            Projection::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
        }
    }
}

enum FieldRule {
    Include(String),
    Exclude(String),
    Compute { field: String, source: String },
}

fn flag(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(n) => Some(*n != 0),
        Bson::Int64(n) => Some(*n != 0),
        Bson::Double(n) => Some(*n != 0.0),
        _ => None,
    }
}

/// A compiled projection.
#[derive(Clone)]
pub struct Projector(Arc<dyn Fn(Record) -> Record + Send + Sync>);

impl Projector {
    /// A projector returning records unchanged.
    pub fn identity() -> Self {
        Projector(Arc::new(|record| record))
    }

    fn fields(spec: &Document) -> DocumentStoreResult<Self> {
        let invalid = || DocumentStoreError::InvalidProjection(Bson::Document(spec.clone()));

        let mut embed_id = false;
        let mut rules = Vec::with_capacity(spec.len());

        for (field, value) in spec {
            if field == ID_FIELD {
                embed_id = flag(value).ok_or_else(invalid)?;
                continue;
            }

            let rule = match (flag(value), value) {
                (Some(true), _) => FieldRule::Include(field.clone()),
                (Some(false), _) => FieldRule::Exclude(field.clone()),
                (None, Bson::String(source)) if source.len() > 1 && source.starts_with('$') => {
                    FieldRule::Compute { field: field.clone(), source: source[1..].to_string() }
                }
                _ => return Err(invalid()),
            };
            rules.push(rule);
        }

        let excluding = rules
            .iter()
            .any(|rule| matches!(rule, FieldRule::Exclude(_)));
        let including = rules
            .iter()
            .any(|rule| !matches!(rule, FieldRule::Exclude(_)));

        if excluding && including {
            return Err(invalid());
        }

        Ok(Projector(Arc::new(move |record: Record| {
            let mut projected = Document::new();

            if embed_id {
                projected.insert(ID_FIELD, record.id.clone());
            }

            if including {
                for rule in &rules {
                    match rule {
                        FieldRule::Include(path) => {
                            if let Some(value) = get_path(&record.document, path) {
                                set_path(&mut projected, path, value.clone());
                            }
                        }
                        FieldRule::Compute { field, source } => {
                            if let Some(value) = get_path(&record.document, source) {
                                set_path(&mut projected, field, value.clone());
                            }
                        }
                        FieldRule::Exclude(_) => {}
                    }
                }
            } else {
                let mut remaining = record.document;
                for rule in &rules {
                    if let FieldRule::Exclude(path) = rule {
                        remove_path(&mut remaining, path);
                    }
                }
                for (key, value) in remaining {
                    if !(embed_id && key == ID_FIELD) {
                        projected.insert(key, value);
                    }
                }
            }

            Record { id: record.id, document: projected }
        })))
    }

    /// Applies the projection to a record.
    pub fn apply(&self, record: Record) -> Record {
        (self.0)(record)
    }
}

/// Orders the documents a query returns.
#[derive(Clone, Default)]
pub enum Order {
    /// Keeps the order in which documents arrive.
    #[default]
    Natural,
    /// Sorts by each listed field in turn; `1` is ascending and `-1` descending.
    /// Later fields break ties left by earlier ones.
    Fields(Document),
    /// Sorts with a caller-supplied comparator.
    Comparator(ComparatorFn),
    /// An unvalidated value; `null` means [`Order::Natural`] and a document means
    /// [`Order::Fields`].
    Raw(Bson),
}

impl Order {
    /// Creates an order from a comparator function.
    pub fn comparator(
        f: impl Fn(&Document, &Document) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Order::Comparator(Arc::new(f))
    }

    /// Compiles the order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidOrder`] if a direction is not a non-zero
    /// number or if a raw order is not a document.
    pub fn compile(&self) -> DocumentStoreResult<Comparator> {
        match self {
            Order::Natural | Order::Raw(Bson::Null) => Ok(Comparator::natural()),
            Order::Fields(fields) | Order::Raw(Bson::Document(fields)) => {
                Comparator::fields(fields)
            }
            Order::Comparator(f) => Ok(Comparator(f.clone())),
            Order::Raw(other) => Err(DocumentStoreError::InvalidOrder(other.clone())),
        }
    }
}

impl From<Document> for Order {
    fn from(fields: Document) -> Self {
        Order::Fields(fields)
    }
}

impl From<Bson> for Order {
    fn from(value: Bson) -> Self {
        Order::Raw(value)
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Natural => write!(f, "Natural"),
            Order::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Order::Comparator(_) => write!(f, "Comparator(<function>)"),
            Order::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
        }
    }
}

/// A compiled sort order.
#[derive(Clone)]
pub struct Comparator(ComparatorFn);

impl Comparator {
    /// A comparator treating all documents as equal.
    pub fn natural() -> Self {
        Comparator(Arc::new(|_, _| Ordering::Equal))
    }

    fn fields(spec: &Document) -> DocumentStoreResult<Self> {
        let keys = spec
            .iter()
            .map(|(path, direction)| {
                let ascending = match direction {
                    Bson::Int32(n) if *n != 0 => *n > 0,
                    Bson::Int64(n) if *n != 0 => *n > 0,
                    Bson::Double(n) if *n != 0.0 && !n.is_nan() => *n > 0.0,
                    _ => return Err(DocumentStoreError::InvalidOrder(Bson::Document(spec.clone()))),
                };
                Ok((path.clone(), ascending))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(Comparator(Arc::new(move |left, right| {
            for (path, ascending) in &keys {
                let ordering = compare_values(get_path(left, path), get_path(right, path));
                if ordering.is_ne() {
                    return if *ascending { ordering } else { ordering.reverse() };
                }
            }
            Ordering::Equal
        })))
    }

    /// Compares two documents.
    pub fn compare(&self, left: &Document, right: &Document) -> Ordering {
        (self.0)(left, right)
    }
}
