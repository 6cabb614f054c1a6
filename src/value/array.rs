use std::fmt;

use indexmap::IndexMap;

use super::Value;

/// Array key. Canonical decimal strings are stored as integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(String),
}

impl ArrayKey {
    /// Converts a string key, turning canonical integers such as `"12"` or
    /// `"-3"` into integer keys. `"012"`, `"+1"` and `"-0"` stay strings.
    pub fn from_string(key: &str) -> ArrayKey {
        let digits = key.strip_prefix('-').unwrap_or(key);
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'))
            && key != "-0";
        if canonical {
            if let Ok(value) = key.parse::<i64>() {
                return ArrayKey::Int(value);
            }
        }
        ArrayKey::Str(key.to_string())
    }
}

impl From<i64> for ArrayKey {
    fn from(value: i64) -> Self {
        ArrayKey::Int(value)
    }
}

impl From<i32> for ArrayKey {
    fn from(value: i32) -> Self {
        ArrayKey::Int(value.into())
    }
}

impl From<&str> for ArrayKey {
    fn from(value: &str) -> Self {
        ArrayKey::from_string(value)
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::Str(s) => f.write_str(s),
        }
    }
}

/// Ordered associative array.
#[derive(Clone, Debug, Default)]
pub struct PhpArray {
    entries: IndexMap<ArrayKey, Value>,
    next_index: i64,
    string_count: usize,
    max_int_key: Option<i64>,
}

impl PhpArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list with keys `0..n`.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut array = PhpArray::new();
        for value in values {
            array.push(value);
        }
        array
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries with string keys.
    pub fn string_count(&self) -> usize {
        self.string_count
    }

    pub fn int_count(&self) -> usize {
        self.entries.len() - self.string_count
    }

    /// Largest integer key ever inserted, or -1 when there is none.
    pub fn max_int_key(&self) -> i64 {
        self.max_int_key.unwrap_or(-1)
    }

    pub fn insert(&mut self, key: impl Into<ArrayKey>, value: Value) -> Option<Value> {
        let key = key.into();
        match &key {
            ArrayKey::Int(i) => {
                if *i >= self.next_index {
                    self.next_index = i.saturating_add(1);
                }
                if self.max_int_key.is_none_or(|max| *i > max) {
                    self.max_int_key = Some(*i);
                }
            }
            ArrayKey::Str(_) => {
                if !self.entries.contains_key(&key) {
                    self.string_count += 1;
                }
            }
        }
        self.entries.insert(key, value)
    }

    /// Appends under the next free integer key.
    pub fn push(&mut self, value: Value) {
        let key = self.next_index;
        self.insert(key, value);
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_int(&self, key: i64) -> Option<&Value> {
        self.entries.get(&ArrayKey::Int(key))
    }

    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries.get(&ArrayKey::from_string(key))
    }

    pub fn remove(&mut self, key: &ArrayKey) -> Option<Value> {
        let removed = self.entries.shift_remove(key);
        if removed.is_some() && matches!(key, ArrayKey::Str(_)) {
            self.string_count -= 1;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }
}

impl PartialEq for PhpArray {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_string_keys_normalize() {
        assert_eq!(ArrayKey::from("12"), ArrayKey::Int(12));
        assert_eq!(ArrayKey::from("-3"), ArrayKey::Int(-3));
        assert_eq!(ArrayKey::from("012"), ArrayKey::Str("012".into()));
        assert_eq!(ArrayKey::from("-0"), ArrayKey::Str("-0".into()));
        assert_eq!(ArrayKey::from("1.5"), ArrayKey::Str("1.5".into()));
    }

    #[test]
    fn tracks_string_keys_and_max_index() {
        let mut array = PhpArray::new();
        assert_eq!(array.max_int_key(), -1);
        array.insert(4, Value::Int(1));
        array.push(Value::Int(2));
        array.insert("name", Value::from("x"));
        array.insert("name", Value::from("y"));
        assert_eq!(array.max_int_key(), 5);
        assert_eq!(array.string_count(), 1);
        assert_eq!(array.int_count(), 2);

        array.remove(&ArrayKey::from("name"));
        assert_eq!(array.string_count(), 0);
        assert_eq!(array.get_int(5), Some(&Value::Int(2)));
    }
}
