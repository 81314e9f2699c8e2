//! Tiered property paths: dotted navigation over object graphs and decoded
//! value trees, flat export, and unique-suffix matching.

use std::collections::BTreeMap;

use facet_core::{Def, Facet, Type, UserType};
use serde_json::Value;

use crate::descriptor::TypeDescriptor;
use crate::{Result, TierErrorKind, behavior, resolve};

/// The default tier separator.
pub const TIER_SEP: char = '.';

/// A flat mapping from fully-qualified dotted keys to leaf values, produced
/// by [`deep_tier_map`]. Lookup tries the exact key first; on a miss, suffix
/// matching bridges the two key spaces in either direction (bare query over
/// qualified keys, qualified query over bare keys).
#[derive(Debug, Clone, PartialEq)]
pub struct TierMap {
    entries: BTreeMap<String, Value>,
    sep: char,
}

impl TierMap {
    /// Looks a path up: exact match first. A separator-free query falls back
    /// to the unique key whose last segment equals the query; a qualified
    /// query over a flatter key space falls back to the bare key equal to
    /// its last segment.
    pub fn get(&self, path: &str) -> Result<&Value> {
        if let Some(value) = self.entries.get(path) {
            return Ok(value);
        }
        if path.contains(self.sep) {
            let leaf = path.rsplit(self.sep).next().unwrap_or(path);
            return self.entries.get(leaf).ok_or_else(|| {
                TierErrorKind::PathNotFound {
                    path: path.to_string(),
                }
                .into()
            });
        }

        let mut matches = self
            .entries
            .iter()
            .filter(|(key, _)| key.rsplit(self.sep).next() == Some(path));
        match (matches.next(), matches.next()) {
            (Some((_, value)), None) => Ok(value),
            (Some((first, _)), Some((second, _))) => {
                let mut candidates = vec![first.clone(), second.clone()];
                candidates.extend(matches.map(|(key, _)| key.clone()));
                Err(TierErrorKind::AmbiguousPath {
                    query: path.to_string(),
                    candidates,
                }
                .into())
            }
            (None, _) => Err(TierErrorKind::PathNotFound {
                path: path.to_string(),
            }
            .into()),
        }
    }

    /// The number of flattened leaves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff no leaves were flattened.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the fully-qualified keys and their leaves in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Consumes the map, yielding its underlying entries.
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.entries
    }
}

/// Flattens a decoded value tree into a [`TierMap`]: nested objects become
/// dotted keys, arrays and scalars are leaves.
pub fn deep_tier_map(tree: &Value) -> TierMap {
    deep_tier_map_with_sep(tree, TIER_SEP)
}

/// [`deep_tier_map`] with an explicit separator.
pub fn deep_tier_map_with_sep(tree: &Value, sep: char) -> TierMap {
    let mut entries = BTreeMap::new();
    flatten("", tree, sep, &mut entries);
    TierMap { entries, sep }
}

fn flatten(prefix: &str, tree: &Value, sep: char, out: &mut BTreeMap<String, Value>) {
    match tree {
        Value::Object(map) => {
            for (key, value) in map {
                let qualified = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}{sep}{key}")
                };
                flatten(&qualified, value, sep, out);
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), leaf.clone());
            }
        }
    }
}

/// Resolves a dotted path against a live object graph, one exact segment per
/// level; a query that misses falls back to suffix matching over the
/// flattened graph (bare leaf for a qualified key space, or the reverse).
pub fn resolve_path<'facet, T: Facet<'facet>>(root: &T, path: &str) -> Result<Value> {
    let tree = behavior::to_tree(root)?;
    resolve_tree(&tree, path, TIER_SEP)
}

/// [`resolve_path`] over an already-decoded value tree, with an explicit
/// separator.
pub fn resolve_tree(tree: &Value, path: &str, sep: char) -> Result<Value> {
    let mut current = tree;
    let mut missed = false;
    for segment in path.split(sep) {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(value) => current = value,
                None => {
                    missed = true;
                    break;
                }
            },
            _ => {
                missed = true;
                break;
            }
        }
    }
    if !missed {
        return Ok(current.clone());
    }

    // any miss falls back to the flattened key space, which covers both the
    // bare-leaf and qualified-query directions of suffix matching
    let flat = deep_tier_map_with_sep(tree, sep);
    flat.get(path).map(|value| value.clone())
}

/// Writes `value` at a dotted path and rebuilds the root: the exported tree
/// is navigated segment by segment, the addressed leaf replaced, and the
/// whole graph converted back into a `T`.
pub fn set_path<'facet, T: Facet<'facet>>(root: &T, path: &str, value: Value) -> Result<T> {
    let mut tree = behavior::to_tree_with_skipped(root)?;
    set_tree(&mut tree, path, TIER_SEP, value)?;
    resolve::from_tree(&tree)
}

fn set_tree(tree: &mut Value, path: &str, sep: char, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split(sep).collect();
    let Some((last, init)) = segments.split_last() else {
        return Err(TierErrorKind::PathNotFound {
            path: path.to_string(),
        }
        .into());
    };

    let mut current = tree;
    for segment in init {
        current = match current {
            Value::Object(map) => match map.get_mut(*segment) {
                Some(next) => next,
                None => {
                    return Err(TierErrorKind::PathNotFound {
                        path: path.to_string(),
                    }
                    .into());
                }
            },
            _ => {
                return Err(TierErrorKind::PathNotFound {
                    path: path.to_string(),
                }
                .into());
            }
        };
    }

    match current {
        Value::Object(map) if map.contains_key(*last) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        _ => Err(TierErrorKind::PathNotFound {
            path: path.to_string(),
        }
        .into()),
    }
}

/// Composes per-segment attribute resolution down a dotted path, yielding
/// the descriptor of the attribute the path addresses. A path into a keyed
/// mapping of collections exposes the element descriptor at
/// `next_pair_type().next()`.
pub fn type_at_path<'facet, T: Facet<'facet>>(path: &str) -> Result<&'static TypeDescriptor> {
    type_at_path_with_sep::<T>(path, TIER_SEP)
}

/// [`type_at_path`] with an explicit separator.
pub fn type_at_path_with_sep<'facet, T: Facet<'facet>>(
    path: &str,
    sep: char,
) -> Result<&'static TypeDescriptor> {
    let segments: Vec<&str> = path.split(sep).collect();
    let mut shape = T::SHAPE;
    for (i, segment) in segments.iter().enumerate() {
        let struct_def = match shape.ty {
            Type::User(UserType::Struct(struct_def)) => struct_def,
            _ => {
                return Err(TierErrorKind::PathNotFound {
                    path: path.to_string(),
                }
                .into());
            }
        };
        let field = struct_def
            .fields
            .iter()
            .find(|field| field.name == *segment)
            .ok_or_else(|| TierErrorKind::AttributeNotFound {
                attribute: segment.to_string(),
                shape,
            })?;
        shape = (field.shape)();
        // intermediate optional sites are descended through; the final
        // segment keeps its nullability on the descriptor
        if i + 1 < segments.len() {
            if let Def::Option(opt) = shape.def {
                shape = opt.t;
            }
        }
    }
    Ok(TypeDescriptor::resolve(shape))
}
