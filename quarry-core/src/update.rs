//! Update operator compiler.
//!
//! An update specification maps operator names to per-field arguments:
//!
//! ```ignore
//! doc! {
//!     "$set": { "status": "shipped" },
//!     "$inc": { "count": 1 },
//!     "$push": { "tags": "sale" },
//! }
//! ```
//!
//! [`Mutator::compile`] validates the specification once; [`Mutator::apply`] then
//! mutates documents. Operators always run in the order `$set`, `$unset`,
//! `$rename`, `$push`, `$pull`, `$inc` whatever order the specification lists them in.

use bson::{Bson, Document};
use std::collections::BTreeMap;

use crate::{
    document::{coerce_number, get_path, number_to_bson, remove_path, set_path, values_equal},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// The supported update operators, declared in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpdateOperator {
    /// Assigns a value, creating or overwriting the field.
    Set,
    /// Removes a field.
    Unset,
    /// Moves a field's value to a new name.
    Rename,
    /// Appends a value to a sequence field.
    Push,
    /// Removes every element equal to a value from a sequence field.
    Pull,
    /// Adds a number to a field.
    Inc,
}

impl UpdateOperator {
    /// Parses an operator key such as `"$set"`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$set" => Some(UpdateOperator::Set),
            "$unset" => Some(UpdateOperator::Unset),
            "$rename" => Some(UpdateOperator::Rename),
            "$push" => Some(UpdateOperator::Push),
            "$pull" => Some(UpdateOperator::Pull),
            "$inc" => Some(UpdateOperator::Inc),
            _ => None,
        }
    }

    /// Returns the operator key.
    pub fn key(&self) -> &'static str {
        match self {
            UpdateOperator::Set => "$set",
            UpdateOperator::Unset => "$unset",
            UpdateOperator::Rename => "$rename",
            UpdateOperator::Push => "$push",
            UpdateOperator::Pull => "$pull",
            UpdateOperator::Inc => "$inc",
        }
    }
}

/// A compiled update specification.
#[derive(Debug, Clone, Default)]
pub struct Mutator {
    operations: BTreeMap<UpdateOperator, Vec<(String, Bson)>>,
}

impl Mutator {
    /// Compiles an update specification.
    ///
    /// `null` and the empty document compile to a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidUpdateOperator`] naming the offending key
    /// if a top-level key is not a supported operator, if an operator's argument is
    /// not a document, or if a `$rename` target is not a string. A specification that
    /// is not a document at all is reported by its value.
    pub fn compile(spec: impl Into<Bson>) -> DocumentStoreResult<Self> {
        let spec = match spec.into() {
            Bson::Null => return Ok(Mutator::default()),
            Bson::Document(spec) => spec,
            other => return Err(DocumentStoreError::InvalidUpdateOperator(other.to_string())),
        };

        let mut operations = BTreeMap::new();

        for (key, arguments) in spec {
            let operator = UpdateOperator::from_key(&key)
                .ok_or_else(|| DocumentStoreError::InvalidUpdateOperator(key.clone()))?;
            let Bson::Document(arguments) = arguments else {
                return Err(DocumentStoreError::InvalidUpdateOperator(key));
            };

            if operator == UpdateOperator::Rename {
                if let Some((field, _)) = arguments
                    .iter()
                    .find(|(_, target)| !matches!(target, Bson::String(_)))
                {
                    return Err(DocumentStoreError::InvalidUpdateOperator(format!(
                        "{}.{field}",
                        operator.key()
                    )));
                }
            }

            operations.insert(operator, arguments.into_iter().collect());
        }

        Ok(Mutator { operations })
    }

    /// Returns `true` if applying the mutator never changes a document.
    pub fn is_noop(&self) -> bool {
        self.operations.values().all(Vec::is_empty)
    }

    /// Applies the mutator to an optional document.
    ///
    /// An absent document is returned unchanged.
    pub fn apply(&self, document: Option<Document>) -> Option<Document> {
        document.map(|mut document| {
            self.apply_to(&mut document);
            document
        })
    }

    /// Applies every operator to `document` in place.
    pub fn apply_to(&self, document: &mut Document) {
        for (operator, arguments) in &self.operations {
            for (field, argument) in arguments {
                match operator {
                    UpdateOperator::Set => set_path(document, field, argument.clone()),
                    UpdateOperator::Unset => {
                        remove_path(document, field);
                    }
                    UpdateOperator::Rename => {
                        if let (Bson::String(target), Some(value)) =
                            (argument, remove_path(document, field))
                        {
                            set_path(document, target, value);
                        }
                    }
                    UpdateOperator::Push => {
                        let pushed = match get_path(document, field) {
                            Some(Bson::Array(items)) => {
                                let mut items = items.clone();
                                items.push(argument.clone());
                                items
                            }
                            Some(scalar) => vec![scalar.clone(), argument.clone()],
                            None => vec![argument.clone()],
                        };
                        set_path(document, field, Bson::Array(pushed));
                    }
                    UpdateOperator::Pull => {
                        let pulled = match get_path(document, field) {
                            Some(Bson::Array(items)) => items
                                .iter()
                                .filter(|item| !values_equal(item, argument))
                                .cloned()
                                .collect(),
                            Some(scalar) if values_equal(scalar, argument) => Vec::new(),
                            _ => continue,
                        };
                        set_path(document, field, Bson::Array(pulled));
                    }
                    UpdateOperator::Inc => {
                        let sum = coerce_number(get_path(document, field))
                            + coerce_number(Some(argument));
                        set_path(document, field, number_to_bson(sum));
                    }
                }
            }
        }
    }
}
