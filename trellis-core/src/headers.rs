//! Case-insensitive, multi-valued header collection.
//!
//! Request headers arrive already parsed; this type is what the argument
//! resolver reads from and what response envelopes carry. Storage is a
//! `SmallVec`, so typical requests (a dozen headers or fewer) never touch
//! the heap, and lookups are a linear scan with ASCII case folding.

use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Number of headers stored inline before spilling to the heap.
pub const INLINE_HEADERS: usize = 12;

#[derive(Clone, PartialEq, Eq)]
struct Header {
    name: String,
    value: String,
}

impl Header {
    #[inline]
    fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header collection with case-insensitive names.
///
/// A name may appear several times; `get` returns the first value and
/// `get_all` every value in insertion order.
///
/// ```rust
/// use trellis_core::headers::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.append("Accept", "text/html");
/// headers.append("accept", "application/json");
///
/// assert_eq!(headers.get("ACCEPT"), Some("text/html"));
/// assert_eq!(headers.get_all("Accept"), vec!["text/html", "application/json"]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: SmallVec<[Header; INLINE_HEADERS]>,
}

impl HeaderMap {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: SmallVec::new_const(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// First value for `name` (case-insensitive).
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
    }

    /// Every value for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|h| h.name_eq(name))
    }

    /// Set `name` to a single value, dropping any previous values.
    ///
    /// Returns the first value that was replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let previous = self.remove(&name);
        self.inner.push(Header {
            name,
            value: value.into(),
        });
        previous
    }

    /// Add another value for `name`, keeping existing ones.
    #[inline]
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Remove every value for `name`, returning the first.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let first = self
            .inner
            .iter()
            .position(|h| h.name_eq(name))
            .map(|pos| self.inner[pos].value.clone());
        if first.is_some() {
            self.inner.retain(|h| !h.name_eq(name));
        }
        first
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    /// Snapshot of `self` layered over `defaults`.
    ///
    /// Every name present in `self` keeps all of its live values; names only
    /// present in `defaults` are carried over. The result is always usable,
    /// even when both inputs are empty.
    pub fn merged_over(&self, defaults: &HeaderMap) -> HeaderMap {
        let mut merged = HeaderMap::with_capacity(self.len() + defaults.len());
        for h in defaults.inner.iter().filter(|d| !self.contains(&d.name)) {
            merged.inner.push(h.clone());
        }
        merged.inner.extend(self.inner.iter().cloned());
        merged
    }

    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.get("Content-Type")
    }

    pub fn to_hash_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::with_capacity(self.len());
        for h in self.inner.iter().rev() {
            map.insert(h.name.to_ascii_lowercase(), h.value.clone());
        }
        map
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.iter().map(|h| (&h.name, &h.value)))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

impl From<HashMap<String, String>> for HeaderMap {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}
