use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use serde_json::Value;
use crate::protocol::{DISABLED, ENABLED};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("cannot store {found} at `{path}`: expected string, bool, integer or object")]
    TypeMismatch { path: String, found: &'static str },
}

/// A dot-addressable key/value tree.
///
/// Leaves are kept flat, keyed by their full dotted path (`board.radio.0.name`),
/// in a sorted map. Lookups of a segment that is not present return an empty
/// store, so chained lookups never fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    entries: BTreeMap<String, String>,
}

/// Result of a lookup: either a leaf value or a (possibly empty) sub-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(String),
    Store(Store),
}

/// How a store iterates its top-level segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Contiguous numeric segments starting at `start` (0 or 1).
    List { start: usize },
    Map,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a flat store from `(key, value)` pairs. Later pairs win.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Decode an arbitrary JSON document. Arrays become 0-based index
    /// segments, numbers and bools keep their JSON text. `null` and empty
    /// containers are kept as an empty leaf so the key stays present.
    pub fn from_json(value: &Value) -> Self {
        let mut store = Self::new();
        store.absorb_json(String::new(), value);
        store
    }

    fn absorb_json(&mut self, path: String, value: &Value) {
        match value {
            Value::Null => self.mark_present(path),
            Value::Array(items) if items.is_empty() => self.mark_present(path),
            Value::Object(map) if map.is_empty() => self.mark_present(path),
            Value::String(s) => {
                self.entries.insert(path, s.clone());
            }
            Value::Bool(b) => {
                self.entries.insert(path, b.to_string());
            }
            Value::Number(n) => {
                self.entries.insert(path, n.to_string());
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.absorb_json(join(&path, &i.to_string()), item);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    self.absorb_json(join(&path, k), v);
                }
            }
        }
    }

    fn mark_present(&mut self, path: String) {
        if !path.is_empty() {
            self.entries.insert(path, String::new());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flat leaf keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Look up a single segment.
    pub fn get(&self, segment: &str) -> Node {
        if let Some(value) = self.entries.get(segment) {
            return Node::Scalar(value.clone());
        }
        Node::Store(self.subtree(segment))
    }

    /// Look up a sequence of segments, e.g. `["interfaces", "2", "wireless"]`.
    pub fn lookup<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Node {
        path.into_iter()
            .fold(Node::Store(self.clone()), |node, segment| node.get(segment))
    }

    /// Look up a dotted path, e.g. `"board.radio.0.antenna.0.gain"`.
    pub fn path(&self, dotted: &str) -> Node {
        self.lookup(dotted.split('.'))
    }

    fn subtree(&self, segment: &str) -> Store {
        let prefix = format!("{segment}.");
        let entries = self
            .entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
            .collect();
        Store { entries }
    }

    fn has_segment(&self, segment: &str) -> bool {
        let prefix = format!("{segment}.");
        self.entries.contains_key(segment)
            || self
                .entries
                .range(prefix.clone()..)
                .next()
                .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Decide how this store iterates. 0-based runs are checked before
    /// 1-based ones; anything else is a plain map.
    pub fn shape(&self) -> Shape {
        if self.has_segment("0") {
            Shape::List { start: 0 }
        } else if self.has_segment("1") {
            Shape::List { start: 1 }
        } else {
            Shape::Map
        }
    }

    /// Iterate top-level entries. Array-shaped stores yield their elements in
    /// index order up to the first gap; map-shaped stores yield their
    /// segments sorted.
    pub fn iter(&self) -> Iter<'_> {
        match self.shape() {
            Shape::List { start } => Iter::List { store: self, next: start },
            Shape::Map => {
                let segments: BTreeSet<String> = self
                    .entries
                    .keys()
                    .map(|k| k.split('.').next().unwrap_or_default().to_string())
                    .collect();
                Iter::Map {
                    store: self,
                    segments: segments.into_iter(),
                }
            }
        }
    }

    /// Replace every key starting with `path` by `value`, flattening
    /// objects into dotted keys. Bools are stored as `enabled`/`disabled`.
    ///
    /// The match is on the raw key text: changing `radio` also drops
    /// `radio-extra` and `radio2.mode`.
    pub fn change(&mut self, path: &str, value: &Value) -> Result<(), StoreError> {
        check_changeable(path, value)?;
        self.remove_prefixed(path);
        self.write_changed(path, value);
        Ok(())
    }

    fn remove_prefixed(&mut self, path: &str) {
        self.entries.retain(|k, _| !k.starts_with(path));
    }

    fn write_changed(&mut self, path: &str, value: &Value) {
        match value {
            Value::String(s) => {
                self.entries.insert(path.to_string(), s.clone());
            }
            Value::Bool(b) => {
                let token = if *b { ENABLED } else { DISABLED };
                self.entries.insert(path.to_string(), token.to_string());
            }
            Value::Number(n) => {
                self.entries.insert(path.to_string(), n.to_string());
            }
            Value::Object(map) => {
                for (k, v) in map {
                    let key = join(path, k);
                    self.remove_prefixed(&key);
                    self.write_changed(&key, v);
                }
            }
            // rejected by check_changeable
            Value::Null | Value::Array(_) => {}
        }
    }
}

fn check_changeable(path: &str, value: &Value) -> Result<(), StoreError> {
    let found = match value {
        Value::String(_) | Value::Bool(_) => return Ok(()),
        Value::Number(n) if n.is_i64() || n.is_u64() => return Ok(()),
        Value::Object(map) => {
            for (k, v) in map {
                check_changeable(&join(path, k), v)?;
            }
            return Ok(());
        }
        Value::Number(_) => "float",
        Value::Array(_) => "array",
        Value::Null => "null",
    };
    Err(StoreError::TypeMismatch {
        path: path.to_string(),
        found,
    })
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl Node {
    pub fn empty() -> Self {
        Node::Store(Store::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Node::Scalar(_) => false,
            Node::Store(store) => store.is_empty(),
        }
    }

    pub fn get(&self, segment: &str) -> Node {
        match self {
            Node::Scalar(_) => Node::empty(),
            Node::Store(store) => store.get(segment),
        }
    }

    pub fn lookup<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Node {
        path.into_iter().fold(self.clone(), |node, segment| node.get(segment))
    }

    pub fn path(&self, dotted: &str) -> Node {
        self.lookup(dotted.split('.'))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => Some(s),
            Node::Store(_) => None,
        }
    }

    /// Iterate a sub-tree; a scalar iterates as nothing.
    pub fn iter(&self) -> Iter<'_> {
        match self {
            Node::Scalar(_) => Iter::Empty,
            Node::Store(store) => store.iter(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Scalar(s) => f.write_str(s),
            Node::Store(store) => fmt::Display::fmt(store, f),
        }
    }
}

pub enum Iter<'a> {
    List { store: &'a Store, next: usize },
    Map {
        store: &'a Store,
        segments: std::collections::btree_set::IntoIter<String>,
    },
    Empty,
}

impl Iterator for Iter<'_> {
    type Item = (String, Node);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::List { store, next } => {
                let segment = next.to_string();
                let node = store.get(&segment);
                if node.is_empty() {
                    return None;
                }
                *next += 1;
                Some((segment, node))
            }
            Iter::Map { store, segments } => {
                let segment = segments.next()?;
                let node = store.get(&segment);
                Some((segment, node))
            }
            Iter::Empty => None,
        }
    }
}

impl<'a> IntoIterator for &'a Store {
    type Item = (String, Node);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segments(store: &Store) -> Vec<String> {
        store.iter().map(|(segment, _)| segment).collect()
    }

    #[test]
    fn test_missing_path_is_empty_store() {
        let store = Store::from_pairs([("a.b", "1")]);

        let missing = store.get("x").get("y").get("z");
        assert!(missing.is_empty());
        assert_eq!(missing.to_string(), "");
        assert_eq!(store.path("a.b").as_str(), Some("1"));
        assert!(store.path("a.b.c").is_empty(), "Scalars have no children");
    }

    #[test]
    fn test_zero_based_array() {
        let store = Store::from_pairs([("0.a", "x"), ("1.a", "y")]);

        assert_eq!(store.shape(), Shape::List { start: 0 });
        let values: Vec<String> = store
            .iter()
            .map(|(_, node)| node.get("a").to_string())
            .collect();
        assert_eq!(values, vec!["x", "y"]);
    }

    #[test]
    fn test_one_based_array() {
        let store = Store::from_pairs([("1.a", "x"), ("2.a", "y")]);

        assert_eq!(store.shape(), Shape::List { start: 1 });
        assert_eq!(segments(&store), vec!["1", "2"]);
    }

    #[test]
    fn test_array_stops_at_first_gap() {
        let store = Store::from_pairs([("0.a", "x"), ("1.a", "y"), ("3.a", "z")]);

        assert_eq!(store.iter().count(), 2);
        // restartable
        assert_eq!(store.iter().count(), 2);
    }

    #[test]
    fn test_zero_based_checked_before_one_based() {
        let store = Store::from_pairs([("1", "b"), ("0", "a"), ("2", "c")]);

        let values: Vec<String> = store.iter().map(|(_, node)| node.to_string()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_map_iterates_sorted_not_insertion_order() {
        let mut store = Store::new();
        store.change("zeta", &json!("1")).unwrap();
        store.change("alpha.x", &json!("2")).unwrap();
        store.change("alpha-beta", &json!("3")).unwrap();
        store.change("mid", &json!("4")).unwrap();

        assert_eq!(store.shape(), Shape::Map);
        assert_eq!(segments(&store), vec!["alpha", "alpha-beta", "mid", "zeta"]);
    }

    #[test]
    fn test_change_scalars_round_trip() {
        let mut store = Store::new();
        store.change("wireless.ssid", &json!("backhaul")).unwrap();
        store.change("wireless.enabled", &json!(true)).unwrap();
        store.change("wireless.hidden", &json!(false)).unwrap();
        store.change("wireless.channel", &json!(-42)).unwrap();

        assert_eq!(store.path("wireless.ssid").as_str(), Some("backhaul"));
        assert_eq!(store.lookup(["wireless", "enabled"]).as_str(), Some(ENABLED));
        assert_eq!(store.path("wireless.hidden").as_str(), Some(DISABLED));
        assert_eq!(store.path("wireless.channel").as_str(), Some("-42"));
    }

    #[test]
    fn test_change_replaces_subtree() {
        let mut store = Store::from_pairs([
            ("radio.name", "old"),
            ("radio.tx.power", "20"),
            ("status", "up"),
        ]);

        store.change("radio", &json!({"name": "new"})).unwrap();

        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["radio.name", "status"]);
        assert_eq!(store.path("radio.name").as_str(), Some("new"));
    }

    #[test]
    fn test_change_drops_every_key_sharing_the_prefix() {
        let mut store = Store::from_pairs([
            ("radio.name", "old"),
            ("radio-extra", "x"),
            ("radio2.mode", "ap"),
            ("mode", "sta"),
        ]);

        store.change("radio", &json!("new")).unwrap();

        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["mode", "radio"]);
        assert_eq!(store.get("radio").as_str(), Some("new"));
    }

    #[test]
    fn test_change_structured_is_idempotent() {
        let value = json!({
            "netmode": "bridge",
            "lan": {"dhcp": false, "mtu": 1500, "vlan": {"id": 10}},
        });
        let mut once = Store::from_pairs([("lan.stale", "x")]);
        once.change("net", &value).unwrap();

        let mut twice = once.clone();
        twice.change("net", &value).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.path("net.lan.vlan.id").as_str(), Some("10"));
        assert_eq!(once.path("net.lan.dhcp").as_str(), Some(DISABLED));
    }

    #[test]
    fn test_change_rejects_unsupported_values() {
        let mut store = Store::from_pairs([("a", "1")]);

        let err = store.change("a", &json!(1.5)).unwrap_err();
        assert_eq!(
            err,
            StoreError::TypeMismatch { path: "a".to_string(), found: "float" }
        );
        assert!(store.change("a", &json!([1, 2])).is_err());
        assert!(store.change("a", &json!({"b": null})).is_err());
        assert_eq!(store.path("a").as_str(), Some("1"), "Store untouched on error");
    }

    #[test]
    fn test_render_sorted_lines() {
        let store = Store::from_pairs([("b", "2"), ("a.y", "1"), ("a.x", "0")]);

        assert_eq!(store.to_string(), "a.x=0\na.y=1\nb=2");
        assert_eq!(Store::new().to_string(), "");
    }

    #[test]
    fn test_from_json_flattens_arrays() {
        let store = Store::from_json(&json!([
            {"mac": "00:27:22:00:00:01", "remote": {"hostname": "cpe-1"}, "ccq": 91},
            {"mac": "00:27:22:00:00:02", "stats": {"rx_bytes": 123}, "tx_latency": null},
        ]));

        assert_eq!(store.shape(), Shape::List { start: 0 });
        let peers: Vec<Node> = store.iter().map(|(_, node)| node).collect();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].path("remote.hostname").as_str(), Some("cpe-1"));
        assert_eq!(peers[0].get("ccq").as_str(), Some("91"));
        assert_eq!(peers[1].path("stats.rx_bytes").as_str(), Some("123"));
        assert_eq!(peers[1].get("tx_latency").as_str(), Some(""));
        assert!(peers[1].get("missing").is_empty());
    }

    #[test]
    fn test_from_json_keeps_empty_values_present() {
        let store = Store::from_json(&json!({"remote": {}, "tags": [], "note": null}));

        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["note", "remote", "tags"]);
        assert!(!store.get("remote").is_empty());
        assert!(store.path("remote.hostname").is_empty());
        assert!(Store::from_json(&json!(null)).is_empty());
    }
}
