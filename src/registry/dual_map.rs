use std::collections::HashMap;

use crate::name::fold_case;

/// Map with an exact-case primary index and a folded-case secondary index.
///
/// Every entry lives in the primary map under its declared spelling. Entries
/// inserted as case-insensitive are also indexed under their folded name in
/// the secondary map, remembering which primary key they came from.
#[derive(Debug, Clone)]
pub struct DualMap<V> {
    primary: HashMap<String, V>,
    secondary: HashMap<String, (String, V)>,
}

impl<V> Default for DualMap<V> {
    fn default() -> Self {
        Self {
            primary: HashMap::new(),
            secondary: HashMap::new(),
        }
    }
}

impl<V: Clone> DualMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A case-insensitive insert replaces the earlier
    /// case-insensitive entry of the same folded name whatever its spelling.
    /// A case-sensitive insert drops a folded alias that was created by an
    /// earlier case-insensitive entry of the same spelling.
    pub fn insert(&mut self, key: &str, value: V, ignore_case: bool) {
        let folded = fold_case(key).into_owned();
        if ignore_case {
            let replaced = self
                .secondary
                .insert(folded, (key.to_string(), value.clone()));
            if let Some((origin, _)) = replaced.filter(|(origin, _)| origin != key) {
                self.primary.remove(&origin);
            }
        } else if self
            .secondary
            .get(&folded)
            .is_some_and(|(origin, _)| origin == key)
        {
            self.secondary.remove(&folded);
        }
        self.primary.insert(key.to_string(), value);
    }

    /// Exact-case lookup first, then the folded index.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.primary
            .get(key)
            .or_else(|| self.secondary.get(fold_case(key).as_ref()).map(|(_, v)| v))
    }

    /// Exact-case lookup only.
    pub fn get_exact(&self, key: &str) -> Option<&V> {
        self.primary.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.primary.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_sensitive_entries_need_exact_spelling() {
        let mut map = DualMap::new();
        map.insert("PHP_EOL", 1, false);
        map.insert("True", 2, true);

        assert_eq!(map.get("PHP_EOL"), Some(&1));
        assert_eq!(map.get("php_eol"), None);
        assert_eq!(map.get("TRUE"), Some(&2));
        assert_eq!(map.get("true"), Some(&2));
        assert_eq!(map.get_exact("true"), None);
    }

    #[test]
    fn redeclaring_case_sensitive_drops_alias() {
        let mut map = DualMap::new();
        map.insert("Flag", 1, true);
        map.insert("Flag", 2, false);
        assert_eq!(map.get("Flag"), Some(&2));
        assert_eq!(map.get("FLAG"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn redeclaring_case_insensitive_replaces_every_spelling() {
        let mut map = DualMap::new();
        map.insert("Flag", 1, true);
        map.insert("FLAG", 2, true);
        for spelling in ["Flag", "flag", "FLAG"] {
            assert_eq!(map.get(spelling), Some(&2), "spelling {spelling}");
        }
        assert_eq!(map.get_exact("Flag"), None);
        assert_eq!(map.len(), 1);
    }
}
