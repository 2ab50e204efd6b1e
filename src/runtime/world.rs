//! The persistent state tree of a playthrough.
//!
//! A [`StateStore`] maps dotted paths to values. Every segment but the last
//! must resolve to a mapping; traversing through anything else is a path
//! error. Only `set` may create missing intermediate mappings.

use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::ast::value::{Value, ValueMap};
use crate::ast::BinaryOp;
use crate::atoms;
use crate::errors::ErrorKind;
use crate::runtime::context::Status;
use crate::runtime::path::Path;

// ============================================================================
// STATE STORE
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateStore {
    root: ValueMap,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(root: ValueMap) -> Self {
        Self { root }
    }

    /// Builds a store from a snapshot value, which must be a mapping.
    pub fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Map(root) => Ok(Self { root }),
            Value::Null => Ok(Self::new()),
            other => Err(ErrorKind::ExpectedKind {
                expected: "mapping".into(),
                actual: other.type_name().into(),
            }),
        }
    }

    pub fn as_map(&self) -> &ValueMap {
        &self.root
    }

    pub fn to_value(&self) -> Value {
        Value::Map(self.root.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn get(&self, path: &Path) -> Result<&Value, ErrorKind> {
        let head = self.root.get(path.head()).ok_or_else(|| ErrorKind::UndefinedPath {
            path: path.to_string(),
        })?;
        descend(head, path, 1)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_ok()
    }

    /// Assigns `value`, creating missing intermediate mappings.
    pub fn set(&mut self, path: &Path, value: Value) -> Result<(), ErrorKind> {
        let (parent, key) = self.slot(path, true)?;
        parent.insert(key.to_string(), value);
        Ok(())
    }

    /// Adds `delta` to an existing value using `+` semantics and returns the
    /// new value.
    pub fn add(&mut self, path: &Path, delta: &Value) -> Result<Value, ErrorKind> {
        let (parent, key) = self.slot(path, false)?;
        let current = parent.get_mut(key).ok_or_else(|| ErrorKind::UndefinedPath {
            path: path.to_string(),
        })?;
        let updated = atoms::apply_binary(BinaryOp::Plus, current, delta)?;
        *current = updated.clone();
        Ok(updated)
    }

    /// Flips a boolean or negates a number in place.
    pub fn invert(&mut self, path: &Path) -> Result<Value, ErrorKind> {
        let (parent, key) = self.slot(path, false)?;
        let current = parent.get_mut(key).ok_or_else(|| ErrorKind::UndefinedPath {
            path: path.to_string(),
        })?;
        let inverted = match current {
            Value::Bool(b) => Value::Bool(!*b),
            Value::Int(n) => Value::Int(n.checked_neg().ok_or_else(|| ErrorKind::InvalidValue {
                message: format!("cannot invert {n}: integer overflow"),
            })?),
            Value::Real(x) => Value::Real(-*x),
            other => {
                return Err(ErrorKind::TypeMismatch {
                    operation: "invert".into(),
                    operands: other.type_name().into(),
                })
            }
        };
        *current = inverted.clone();
        Ok(inverted)
    }

    pub fn remove(&mut self, path: &Path) -> Result<Option<Value>, ErrorKind> {
        let (parent, key) = self.slot(path, false)?;
        Ok(parent.shift_remove(key))
    }

    /// Finds the mapping that holds the last segment of `path`.
    fn slot<'p>(&mut self, path: &'p Path, create: bool) -> Result<(&mut ValueMap, &'p str), ErrorKind> {
        let segments = path.segments();
        let Some((last, intermediate)) = segments.split_last() else {
            return Err(ErrorKind::InvalidPath {
                path: path.to_string(),
            });
        };
        let mut current = &mut self.root;
        for (depth, segment) in intermediate.iter().enumerate() {
            if !current.contains_key(segment.as_str()) {
                if !create {
                    return Err(ErrorKind::UndefinedPath {
                        path: path.to_string(),
                    });
                }
                current.insert(segment.clone(), Value::Map(ValueMap::new()));
            }
            current = match current.get_mut(segment.as_str()) {
                Some(Value::Map(map)) => map,
                Some(other) => {
                    return Err(ErrorKind::NotAMapping {
                        path: path.to_string(),
                        segment: path.prefix(depth + 1),
                        found: other.type_name().into(),
                    })
                }
                None => {
                    return Err(ErrorKind::UndefinedPath {
                        path: path.to_string(),
                    })
                }
            };
        }
        Ok((current, last.as_str()))
    }
}

/// Resolves the segments of `path` from index `from` onward inside `value`,
/// which is the value stored at the first `from` segments.
pub fn descend<'v>(value: &'v Value, path: &Path, from: usize) -> Result<&'v Value, ErrorKind> {
    let mut current = value;
    for (i, segment) in path.segments().iter().enumerate().skip(from) {
        let Value::Map(map) = current else {
            return Err(ErrorKind::NotAMapping {
                path: path.to_string(),
                segment: path.prefix(i),
                found: current.type_name().into(),
            });
        };
        current = map.get(segment.as_str()).ok_or_else(|| ErrorKind::UndefinedPath {
            path: path.to_string(),
        })?;
    }
    Ok(current)
}

// ============================================================================
// WORLD: everything one playthrough owns
// ============================================================================

/// Per-playthrough state: the store, the visit table, the player's position
/// and a seedable PRNG. Sessions never share a `World`.
#[derive(Clone, Debug)]
pub struct World {
    pub store: StateStore,
    pub visits: IndexMap<String, u32>,
    pub current: Option<String>,
    pub status: Status,
    pub rng: Xoshiro256StarStar,
}

impl World {
    pub fn new(store: StateStore, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Xoshiro256StarStar::seed_from_u64(seed),
            None => Xoshiro256StarStar::from_entropy(),
        };
        Self {
            store,
            visits: IndexMap::new(),
            current: None,
            status: Status::default(),
            rng,
        }
    }

    pub fn visit_count(&self, node: &str) -> u32 {
        self.visits.get(node).copied().unwrap_or(0)
    }

    /// Records a visit and returns the new count.
    pub fn record_visit(&mut self, node: &str) -> u32 {
        let count = self.visits.entry(node.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// The visit table as the `_visited_` mapping.
    pub fn visited(&self) -> ValueMap {
        self.visits
            .iter()
            .map(|(node, count)| (node.clone(), Value::Int(i64::from(*count))))
            .collect()
    }

    /// Uniform integer in `lo..=hi`.
    pub fn random_between(&mut self, lo: i64, hi: i64) -> i64 {
        self.rng.gen_range(lo..=hi)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            store: self.store.clone(),
            visits: self.visits.clone(),
            current: self.current.clone(),
            status: self.status,
        }
    }

    /// Replaces everything but the PRNG with the snapshot's contents.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.store = snapshot.store;
        self.visits = snapshot.visits;
        self.current = snapshot.current;
        self.status = snapshot.status;
    }
}

/// Serializable play state, for hosts that persist playthroughs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub store: StateStore,
    #[serde(default)]
    pub visits: IndexMap<String, u32>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub status: Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut store = StateStore::new();
        store.set(&p("properties.turkey-tail"), Value::Int(2)).unwrap();
        assert_eq!(store.get(&p("properties.turkey-tail")).unwrap(), &Value::Int(2));
        assert!(store.get(&p("properties")).unwrap().as_map().is_some());
    }

    #[test]
    fn traversal_through_non_mapping_fails() {
        let mut store = StateStore::new();
        store.set(&p("a"), Value::Int(1)).unwrap();
        let err = store.set(&p("a.b"), Value::Int(2)).unwrap_err();
        assert!(matches!(err, ErrorKind::NotAMapping { ref segment, .. } if segment == "a"));
        assert!(matches!(store.get(&p("a.b")), Err(ErrorKind::NotAMapping { .. })));
    }

    #[test]
    fn add_and_invert_require_existing_values() {
        let mut store = StateStore::new();
        assert!(matches!(
            store.add(&p("x"), &Value::Int(1)),
            Err(ErrorKind::UndefinedPath { .. })
        ));
        assert!(matches!(store.invert(&p("x.y")), Err(ErrorKind::UndefinedPath { .. })));

        store.set(&p("x"), Value::Int(3)).unwrap();
        store.add(&p("x"), &Value::Int(5)).unwrap();
        store.add(&p("x"), &Value::Int(-5)).unwrap();
        assert_eq!(store.get(&p("x")).unwrap(), &Value::Int(3));

        store.invert(&p("x")).unwrap();
        assert_eq!(store.get(&p("x")).unwrap(), &Value::Int(-3));
        store.invert(&p("x")).unwrap();
        assert_eq!(store.get(&p("x")).unwrap(), &Value::Int(3));
    }

    #[test]
    fn invert_rejects_text() {
        let mut store = StateStore::new();
        store.set(&p("name"), Value::from("Ada")).unwrap();
        assert!(matches!(store.invert(&p("name")), Err(ErrorKind::TypeMismatch { .. })));
    }

    #[test]
    fn visits_and_snapshots() {
        let mut world = World::new(StateStore::new(), Some(7));
        assert_eq!(world.record_visit("hall"), 1);
        assert_eq!(world.record_visit("hall"), 2);
        assert_eq!(world.visited()["hall"], Value::Int(2));

        let saved = world.snapshot();
        world.record_visit("porch");
        world.store.set(&p("gold"), Value::Int(1)).unwrap();
        world.restore(saved.clone());
        assert_eq!(world.visit_count("porch"), 0);
        assert!(world.store.is_empty());
        assert_eq!(world.snapshot(), saved);
    }

    #[test]
    fn seeded_worlds_draw_the_same_numbers() {
        let mut a = World::new(StateStore::new(), Some(42));
        let mut b = World::new(StateStore::new(), Some(42));
        let xs: Vec<i64> = (0..8).map(|_| a.random_between(1, 6)).collect();
        let ys: Vec<i64> = (0..8).map(|_| b.random_between(1, 6)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (1..=6).contains(x)));
    }
}
