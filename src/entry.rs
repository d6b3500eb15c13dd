//! Header to value mappings built from one table row.

use crate::value::Value;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use std::fmt;

static EMPTY: Value = Value::Empty;

/// One row seen through the table's header row.
///
/// Keys keep the position of their first insertion. Re-inserting an existing key
/// replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entry {
    fields: Vec<(String, Value)>,
}

/// Builds an entry by zipping headers with a row.
///
/// Cells missing at the end of a short row become [`Value::Empty`]. A header that
/// appears twice keeps the value of its later column.
pub fn materialize(headers: &[String], row: &[Value]) -> Entry {
    headers
        .iter()
        .enumerate()
        .fold(Entry::with_capacity(headers.len()), |mut entry, (index, header)| {
            entry.insert(header, row.get(index).cloned().unwrap_or_default());
            entry
        })
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Returns the value under `header`, or [`Value::Empty`] when absent.
    pub fn get(&self, header: &str) -> &Value {
        self.position(header)
            .map(|index| &self.fields[index].1)
            .unwrap_or(&EMPTY)
    }

    pub fn contains_key(&self, header: &str) -> bool {
        self.position(header).is_some()
    }

    /// Sets `header` to `value`, returning the previous value if the key existed.
    pub fn insert(&mut self, header: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let header = header.into();
        let value = value.into();
        match self.position(&header) {
            Some(index) => Some(std::mem::replace(&mut self.fields[index].1, value)),
            None => {
                self.fields.push((header, value));
                None
            }
        }
    }

    /// Keeps only the requested headers, in the requested order.
    /// Requested headers missing from this entry are present with an empty value.
    pub fn project<S: AsRef<str>>(&self, headers: &[S]) -> Entry {
        headers.iter().fold(Entry::with_capacity(headers.len()), |mut entry, header| {
            let header = header.as_ref();
            entry.insert(header, self.get(header).clone());
            entry
        })
    }

    /// Copies every field of `other` onto this entry; `other` wins on collisions.
    pub fn overlay(&mut self, other: &Entry) {
        for (header, value) in &other.fields {
            self.insert(header.as_str(), value.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(header, _)| header.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(header, value)| (header.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, header: &str) -> Option<usize> {
        self.fields.iter().position(|(key, _)| key == header)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Entry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entry = Entry::new();
        for (header, value) in iter {
            entry.insert(header, value);
        }
        entry
    }
}

impl Serialize for Entry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (header, value) in &self.fields {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = Entry;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object mapping headers to cell values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Entry, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entry = Entry::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((header, value)) = map.next_entry::<String, Value>()? {
                    entry.insert(header, value);
                }
                Ok(entry)
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}
