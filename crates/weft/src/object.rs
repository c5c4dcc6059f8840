//! The bundled host data model for the native backend.
//!
//! [`Object`] is the variant value type [`DataBindings`] exposes to compiled
//! templates: a JSON-shaped, fully owned tree. Maps preserve insertion
//! order so that loop output is stable across runs and matches the order of
//! a deserialized JSON object.
//!
//! [`DataBindings`]: crate::bindings::DataBindings

use indexmap::IndexMap;

use crate::{error::RenderError, expressions::float_text};

/// A runtime value passed into or produced by a rendered template.
///
/// The serde representation is untagged, so an `Object` deserializes
/// naturally from JSON: `null`, booleans, numbers (integers stay integers),
/// strings, arrays and objects.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Object {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Object>),
    Map(IndexMap<String, Object>),
}

impl Object {
    /// The truthiness rule the bundled runtime applies to `if` conditions:
    /// null, zero, the empty string and empty containers are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::Str(v) => !v.is_empty(),
            Self::List(v) => !v.is_empty(),
            Self::Map(v) => !v.is_empty(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Appends the textual form of the value to `out`, as an interpolation
    /// of it would print. Containers are not printable.
    pub fn write_text(&self, out: &mut String) -> Result<(), RenderError> {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => {
                out.push_str(if *v { "true" } else { "false" });
                Ok(())
            }
            Self::Int(v) => {
                out.push_str(&v.to_string());
                Ok(())
            }
            Self::Float(v) => {
                out.push_str(&float_text(*v));
                Ok(())
            }
            Self::Str(v) => {
                out.push_str(v);
                Ok(())
            }
            Self::List(_) | Self::Map(_) => Err(RenderError::type_error(format!(
                "cannot print a value of type {}",
                self.type_name()
            ))),
        }
    }

    /// Iterates the value's entries as (key, value) pairs: map keys with
    /// their values, list indices with their elements. Anything else is an
    /// empty iteration.
    #[must_use]
    pub fn into_entries(self) -> ObjectIter {
        match self {
            Self::Map(map) => ObjectIter::Map(map.into_iter()),
            Self::List(list) => ObjectIter::List(list.into_iter().enumerate()),
            _ => ObjectIter::Empty,
        }
    }
}

impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Object {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Object {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Object {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<Object>> for Object {
    fn from(v: Vec<Object>) -> Self {
        Self::List(v)
    }
}

impl From<IndexMap<String, Object>> for Object {
    fn from(v: IndexMap<String, Object>) -> Self {
        Self::Map(v)
    }
}

/// Iterator over an [`Object`]'s entries, in the container's natural order.
pub enum ObjectIter {
    Map(indexmap::map::IntoIter<String, Object>),
    List(std::iter::Enumerate<std::vec::IntoIter<Object>>),
    Empty,
}

impl Iterator for ObjectIter {
    type Item = (Object, Object);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Map(entries) => entries.next().map(|(key, value)| (Object::Str(key), value)),
            Self::List(entries) => entries
                .next()
                .map(|(index, value)| (Object::Int(i64::try_from(index).unwrap_or(i64::MAX)), value)),
            Self::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Object::Null.truthy());
        assert!(!Object::Int(0).truthy());
        assert!(!Object::Str(String::new()).truthy());
        assert!(Object::Int(-1).truthy());
        assert!(Object::Str("x".to_owned()).truthy());
        assert!(!Object::List(vec![]).truthy());
    }

    #[test]
    fn map_entries_keep_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("b".to_owned(), Object::Int(1));
        map.insert("a".to_owned(), Object::Int(2));
        let keys: Vec<_> = Object::Map(map).into_entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Object::Str("b".to_owned()), Object::Str("a".to_owned())]);
    }

    #[test]
    fn list_entries_are_indexed() {
        let entries: Vec<_> = Object::List(vec![Object::Str("x".to_owned())]).into_entries().collect();
        assert_eq!(entries, vec![(Object::Int(0), Object::Str("x".to_owned()))]);
    }

    #[test]
    fn scalars_are_not_iterable() {
        assert_eq!(Object::Int(3).into_entries().count(), 0);
    }
}
