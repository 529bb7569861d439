//! Ordered id -> name class vocabularies.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

/// Id reserved for the person class in every project vocabulary.
pub const PERSON_ID: u32 = 0;

/// Ordered mapping from small non-negative class ids to class names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
    classes: BTreeMap<u32, String>,
}

impl ClassMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from an ordered list, ids assigned by position.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (idx as u32, name.into()))
            .collect();
        Self { classes }
    }

    /// Normalizes a YAML class list, accepting either a sequence of names or
    /// a mapping keyed by integer or numeric-string ids.
    pub fn from_yaml_value(value: &Value) -> Option<Self> {
        match value {
            Value::Sequence(items) => {
                let names = items
                    .iter()
                    .map(|item| yaml_scalar_to_string(item))
                    .collect::<Option<Vec<_>>>()?;
                Some(Self::from_names(names))
            }
            Value::Mapping(mapping) => {
                let mut classes = BTreeMap::new();
                for (key, name) in mapping {
                    let id = match key {
                        Value::Number(n) => u32::try_from(n.as_u64()?).ok()?,
                        Value::String(s) => s.trim().parse().ok()?,
                        _ => return None,
                    };
                    classes.insert(id, yaml_scalar_to_string(name)?);
                }
                Some(Self { classes })
            }
            _ => None,
        }
    }

    pub fn insert(&mut self, id: u32, name: impl Into<String>) {
        self.classes.insert(id, name.into());
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.classes.get(&id).map(String::as_str)
    }

    /// Exact-name lookup.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.classes
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.classes.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.values().map(String::as_str)
    }

    /// True when ids run 0..len without gaps, as training expects.
    pub fn is_dense(&self) -> bool {
        self.classes
            .keys()
            .enumerate()
            .all(|(expected, id)| *id as usize == expected)
    }
}

fn yaml_scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl fmt::Display for ClassMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(id, name)| format!("[{id}] {name}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

// Ids are written as string keys, matching what training tooling reads back.
impl Serialize for ClassMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.classes.len()))?;
        for (id, name) in &self.classes {
            map.serialize_entry(&id.to_string(), name)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClassMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_yaml_value(&value).ok_or_else(|| {
            D::Error::custom("expected a list of class names or an id -> name mapping")
        })
    }
}
