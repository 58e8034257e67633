//! PropertyMap: the ordered key-value map on relations.

use indexmap::IndexMap;
use super::Value;

/// A map of property names to values, kept in insertion order.
pub type PropertyMap = IndexMap<String, Value>;

/// Build a PropertyMap from `(key, value)` pairs.
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
