//! Information object values (X.681)

use super::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Setting of one field of an information object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectField {
    /// Value field (`&id 1`)
    Value(Value),
    /// Type field (`&Type INTEGER`), holding the name of the type
    Type(String),
}

impl fmt::Display for ObjectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectField::Value(value) => write!(f, "{}", value),
            ObjectField::Type(name) => f.write_str(name),
        }
    }
}

/// An information object: an unordered mapping from field name to setting
///
/// Equality, ordering and hashing never depend on insertion order. Objects
/// order by field count, then by their sorted field-name sets, then field by
/// field in name order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectValue {
    fields: HashMap<String, ObjectField>,
}

impl ObjectValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, field: ObjectField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn with_value(self, name: impl Into<String>, value: Value) -> Self {
        self.with_field(name, ObjectField::Value(value))
    }

    pub fn with_type(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.with_field(name, ObjectField::Type(type_name.into()))
    }

    pub fn insert(&mut self, name: impl Into<String>, field: ObjectField) -> Option<ObjectField> {
        self.fields.insert(name.into(), field)
    }

    pub fn field(&self, name: &str) -> Option<&ObjectField> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields sorted by name
    pub fn sorted_fields(&self) -> Vec<(&String, &ObjectField)> {
        let mut fields: Vec<_> = self.fields.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields
    }

    fn sorted_names(&self) -> Vec<&String> {
        let mut names: Vec<_> = self.fields.keys().collect();
        names.sort();
        names
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ObjectValue {}

impl PartialOrd for ObjectValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.sorted_names().cmp(&other.sorted_names()))
            .then_with(|| {
                let mine = self.sorted_fields();
                let theirs = other.sorted_fields();
                mine.iter()
                    .zip(theirs.iter())
                    .map(|(a, b)| a.1.cmp(b.1))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
    }
}

impl Hash for ObjectValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (name, field) in self.sorted_fields() {
            name.hash(state);
            field.hash(state);
        }
    }
}

impl fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .sorted_fields()
            .into_iter()
            .map(|(name, field)| format!("{} {}", name, field))
            .collect();
        write!(f, "{{ {} }}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &ObjectValue) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let a = ObjectValue::new()
            .with_value("&id", Value::Integer(1))
            .with_type("&Type", "INTEGER");
        let b = ObjectValue::new()
            .with_type("&Type", "INTEGER")
            .with_value("&id", Value::Integer(1));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.to_string(), "{ &Type INTEGER, &id 1 }");
    }

    #[test]
    fn test_order_by_count_first() {
        let small = ObjectValue::new().with_value("&z", Value::Integer(100));
        let large = ObjectValue::new()
            .with_value("&a", Value::Integer(0))
            .with_value("&b", Value::Integer(0));
        assert!(small < large);
    }

    #[test]
    fn test_order_by_name_set_then_fields() {
        let a = ObjectValue::new().with_value("&a", Value::Integer(9));
        let b = ObjectValue::new().with_value("&b", Value::Integer(1));
        assert!(a < b);

        let low = ObjectValue::new().with_value("&a", Value::Integer(1));
        let high = ObjectValue::new().with_value("&a", Value::Integer(2));
        assert!(low < high);
        assert_ne!(low, high);
    }
}
