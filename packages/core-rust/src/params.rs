use std::collections::BTreeMap;

/// OWS request parameters with case-insensitive keys.
///
/// Keys are stored upper-cased; values are kept verbatim. When a key is
/// inserted twice the first value wins, as QGIS Server does for query strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwsParams {
    values: BTreeMap<String, String>,
}

impl OwsParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter unless the key is already present.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .entry(key.to_ascii_uppercase())
            .or_insert_with(|| value.into());
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Lookup that treats blank values as absent.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for OwsParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k.as_ref(), v);
        }
        params
    }
}
