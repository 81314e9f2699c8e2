//! Category-dispatch behaviors: canonical stringification, deep hashing, and
//! deep equality, plus the object-to-tree export they share with the mapper.
//!
//! All of them run through one skeleton: [`apply`] classifies a value exactly
//! once and invokes exactly one handler of a [`Behavior`] implementation, so
//! the category switch is written once instead of per operation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, Utc};
use facet_core::{Def, Facet, FieldAttribute};
use facet_reflect::{Peek, ScalarType};
use serde_json::{Map, Number, Value};

use crate::{Category, Result};

/// The canonical rendering of a null value.
pub const NULL_STR: &str = "<null>";

/// Canonical timestamp-to-text format.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fixed rendering offset for calendar text (UTC+8).
pub(crate) const RENDER_OFFSET_SECS: i32 = 8 * 3600;

/// One handler per category. [`apply`] classifies the input once and calls
/// exactly one of these.
pub trait Behavior {
    /// The result every handler produces.
    type Output;

    /// A null value or absent optional.
    fn null(&mut self) -> Self::Output;
    /// `bool`, `char`, or a numeric primitive.
    fn primitive(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// A smart pointer to a primitive.
    fn boxed(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// Text.
    fn string(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// A calendar date/time.
    fn date(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// A 128-bit integer.
    fn big_integer(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// An arbitrary-precision decimal.
    fn big_decimal(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// An enum value.
    fn enumeration(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// A fixed-length array or slice.
    fn array(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// A variable-length sequence or set.
    fn collection(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// A keyed mapping.
    fn keyed_mapping(&mut self, peek: Peek<'_, '_>) -> Self::Output;
    /// Any remaining structured value.
    fn bean(&mut self, peek: Peek<'_, '_>) -> Self::Output;
}

/// Classifies `peek` once and dispatches to the matching handler.
///
/// Optionals are unwrapped first (`None` dispatches to [`Behavior::null`]);
/// smart pointers to non-primitives are seen through before dispatch.
pub fn apply<B: Behavior>(peek: Peek<'_, '_>, behavior: &mut B) -> B::Output {
    if let Ok(opt_peek) = peek.into_option() {
        return match opt_peek.value() {
            Some(inner) => apply(inner, behavior),
            None => behavior.null(),
        };
    }

    let category = Category::of_peek(peek);
    if matches!(peek.shape().def, Def::Pointer(_)) && category != Category::BoxedPrimitive {
        return apply(peek.innermost_peek(), behavior);
    }

    match category {
        Category::Null => behavior.null(),
        Category::Primitive => behavior.primitive(peek),
        Category::BoxedPrimitive => behavior.boxed(peek),
        Category::String => behavior.string(peek),
        Category::Date => behavior.date(peek),
        Category::BigInteger => behavior.big_integer(peek),
        Category::BigDecimal => behavior.big_decimal(peek),
        Category::Enum => behavior.enumeration(peek),
        Category::Array => behavior.array(peek),
        Category::Collection => behavior.collection(peek),
        Category::KeyedMapping => behavior.keyed_mapping(peek),
        Category::Bean => behavior.bean(peek),
    }
}

/// Exports any reflectable value as a decoded value tree: beans and keyed
/// mappings become objects (map keys are canonically stringified), sequences
/// become arrays, dates become epoch milliseconds, absent optionals become
/// null. Non-finite floats have no tree representation and export as null,
/// logged at warn level.
pub fn to_tree<'facet, T: Facet<'facet>>(value: &T) -> Result<Value> {
    tree_of(Peek::new(value))
}

pub(crate) fn tree_of(peek: Peek<'_, '_>) -> Result<Value> {
    apply(
        peek,
        &mut TreeExporter {
            include_skipped: false,
        },
    )
}

/// Like [`to_tree`], but skipped attributes are exported too, so a rebuild
/// from the tree carries their live values instead of resetting them.
pub(crate) fn to_tree_with_skipped<'facet, T: Facet<'facet>>(value: &T) -> Result<Value> {
    apply(
        Peek::new(value),
        &mut TreeExporter {
            include_skipped: true,
        },
    )
}

/// Renders any reflectable value canonically: `<null>` for null, literal text
/// for scalars, `[a, b]` for sequences, `{k=v, ...}` for keyed mappings, and
/// `TypeName{attribute=value, ...}` for beans, recursing structurally.
pub fn stringify<'facet, T: Facet<'facet>>(value: &T) -> Result<String> {
    render(Peek::new(value))
}

pub(crate) fn render(peek: Peek<'_, '_>) -> Result<String> {
    apply(peek, &mut Stringifier)
}

/// Computes a deep hash: sequences combine element hashes in iteration order,
/// keyed mappings combine value hashes only (order-insensitively, so the key
/// set never affects the result), and beans hash like the mapping they export.
///
/// Consistent with [`deep_eq`]: equal values hash equal.
pub fn deep_hash<'facet, T: Facet<'facet>>(value: &T) -> Result<u64> {
    Ok(hash_tree(&tree_of(Peek::new(value))?))
}

/// Deep equality by category: operands of different concrete shapes are
/// unequal (never an error), scalars compare by value, sequences compare
/// length then element-wise in order, keyed mappings compare size then
/// value-by-value per key, and beans compare by their exported mappings.
///
/// Any leaf inequality is logged at debug level with the offending path.
pub fn deep_eq<'facet, A: Facet<'facet>, B: Facet<'facet>>(a: &A, b: &B) -> Result<bool> {
    let peek_a = Peek::new(a);
    let peek_b = Peek::new(b);
    if !std::ptr::eq(peek_a.shape(), peek_b.shape()) {
        log::debug!(
            "shape mismatch: {} != {}",
            peek_a.shape().type_identifier,
            peek_b.shape().type_identifier
        );
        return Ok(false);
    }
    Ok(eq_trees("", &tree_of(peek_a)?, &tree_of(peek_b)?))
}

fn eq_trees(path: &str, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            if left.len() != right.len() {
                log::debug!("{path}: {} entries != {} entries", left.len(), right.len());
                return false;
            }
            left.iter().all(|(key, value)| match right.get(key) {
                Some(other) => eq_trees(&join_path(path, key), value, other),
                None => {
                    log::debug!("{path}: missing key '{key}'");
                    false
                }
            })
        }
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                log::debug!("{path}: {} elements != {} elements", left.len(), right.len());
                return false;
            }
            left.iter()
                .zip(right.iter())
                .enumerate()
                .all(|(i, (x, y))| eq_trees(&join_path(path, &i.to_string()), x, y))
        }
        _ => {
            let equal = a == b;
            if !equal {
                log::debug!("{path}: {a} != {b}");
            }
            equal
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

pub(crate) fn hash_tree(tree: &Value) -> u64 {
    match tree {
        Value::Null => hash_text(NULL_STR),
        Value::Bool(b) => hash_text(if *b { "true" } else { "false" }),
        Value::Number(n) => hash_text(&n.to_string()),
        Value::String(s) => hash_text(s),
        Value::Array(items) => {
            let mut hasher = DefaultHasher::new();
            for item in items {
                hash_tree(item).hash(&mut hasher);
            }
            hasher.finish()
        }
        // values only, order-insensitive
        Value::Object(entries) => entries
            .values()
            .fold(0u64, |acc, value| acc.wrapping_add(hash_tree(value))),
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

struct TreeExporter {
    include_skipped: bool,
}

impl Behavior for TreeExporter {
    type Output = Result<Value>;

    fn null(&mut self) -> Self::Output {
        Ok(Value::Null)
    }

    fn primitive(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let value = match peek.scalar_type() {
            Some(ScalarType::Bool) => Value::Bool(*peek.get::<bool>()?),
            Some(ScalarType::F32) => number_from_f64(*peek.get::<f32>()? as f64),
            Some(ScalarType::F64) => number_from_f64(*peek.get::<f64>()?),
            Some(ScalarType::I8) => Value::from(*peek.get::<i8>()?),
            Some(ScalarType::I16) => Value::from(*peek.get::<i16>()?),
            Some(ScalarType::I32) => Value::from(*peek.get::<i32>()?),
            Some(ScalarType::I64) => Value::from(*peek.get::<i64>()?),
            Some(ScalarType::U8) => Value::from(*peek.get::<u8>()?),
            Some(ScalarType::U16) => Value::from(*peek.get::<u16>()?),
            Some(ScalarType::U32) => Value::from(*peek.get::<u32>()?),
            Some(ScalarType::U64) => Value::from(*peek.get::<u64>()?),
            _ => Value::String(peek.to_string()),
        };
        Ok(value)
    }

    fn boxed(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        tree_of(peek.innermost_peek())
    }

    fn string(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        Ok(Value::String(peek.to_string()))
    }

    fn date(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        if let Ok(datetime) = peek.get::<DateTime<Utc>>() {
            return Ok(Value::from(datetime.timestamp_millis()));
        }
        // other date shapes export their textual rendering
        Ok(Value::String(peek.to_string()))
    }

    fn big_integer(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        if let Ok(v) = peek.get::<i128>() {
            return Ok(i64::try_from(*v)
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(v.to_string())));
        }
        if let Ok(v) = peek.get::<u128>() {
            return Ok(u64::try_from(*v)
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(v.to_string())));
        }
        Ok(Value::String(peek.to_string()))
    }

    fn big_decimal(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        Ok(Value::String(peek.to_string()))
    }

    fn enumeration(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let enum_peek = peek.into_enum()?;
        let variant_name = enum_peek.variant_name_active().map_err(|_| {
            crate::TierErrorKind::UnsupportedShape {
                shape: peek.shape(),
                reason: "enum value has no active variant".into(),
            }
        })?;
        Ok(Value::String(variant_name.to_string()))
    }

    fn array(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        self.collection(peek)
    }

    fn collection(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let list_peek = peek.into_list_like()?;
        let mut items = Vec::new();
        for item in list_peek.iter() {
            items.push(apply(item, self)?);
        }
        Ok(Value::Array(items))
    }

    fn keyed_mapping(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let map_peek = peek.into_map()?;
        let mut entries = Map::new();
        for (key, value) in map_peek.iter() {
            entries.insert(render(key)?, apply(value, self)?);
        }
        Ok(Value::Object(entries))
    }

    fn bean(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let struct_peek = peek.into_struct()?;
        let mut entries = Map::new();
        for (i, field) in struct_peek.ty().fields.iter().enumerate() {
            if !self.include_skipped
                && field.attributes.contains(&FieldAttribute::Arbitrary("skip"))
            {
                continue;
            }
            match struct_peek.field(i) {
                Ok(field_peek) => {
                    entries.insert(field.name.to_string(), apply(field_peek, self)?);
                }
                // one unreadable attribute never aborts the whole export
                Err(error) => log::debug!(
                    "skipping {}.{}: {error}",
                    peek.shape().type_identifier,
                    field.name
                ),
            }
        }
        Ok(Value::Object(entries))
    }
}

struct Stringifier;

impl Behavior for Stringifier {
    type Output = Result<String>;

    fn null(&mut self) -> Self::Output {
        Ok(NULL_STR.to_string())
    }

    fn primitive(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        Ok(peek.to_string())
    }

    fn boxed(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        render(peek.innermost_peek())
    }

    fn string(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        Ok(peek.to_string())
    }

    fn date(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        if let Ok(datetime) = peek.get::<DateTime<Utc>>() {
            let offset = FixedOffset::east_opt(RENDER_OFFSET_SECS).unwrap();
            return Ok(datetime.with_timezone(&offset).format(DATE_FORMAT).to_string());
        }
        Ok(peek.to_string())
    }

    fn big_integer(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        Ok(peek.to_string())
    }

    fn big_decimal(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        Ok(peek.to_string())
    }

    fn enumeration(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let enum_peek = peek.into_enum()?;
        let variant_name = enum_peek.variant_name_active().map_err(|_| {
            crate::TierErrorKind::UnsupportedShape {
                shape: peek.shape(),
                reason: "enum value has no active variant".into(),
            }
        })?;
        Ok(variant_name.to_string())
    }

    fn array(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        self.collection(peek)
    }

    fn collection(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let list_peek = peek.into_list_like()?;
        let mut rendered = Vec::new();
        for item in list_peek.iter() {
            rendered.push(apply(item, self)?);
        }
        Ok(format!("[{}]", rendered.join(", ")))
    }

    fn keyed_mapping(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let map_peek = peek.into_map()?;
        let mut rendered = Vec::new();
        for (key, value) in map_peek.iter() {
            rendered.push(format!("{}={}", apply(key, self)?, apply(value, self)?));
        }
        Ok(format!("{{{}}}", rendered.join(", ")))
    }

    fn bean(&mut self, peek: Peek<'_, '_>) -> Self::Output {
        let struct_peek = peek.into_struct()?;
        let mut rendered = Vec::new();
        for (i, field) in struct_peek.ty().fields.iter().enumerate() {
            if field.attributes.contains(&FieldAttribute::Arbitrary("skip")) {
                continue;
            }
            match struct_peek.field(i) {
                Ok(field_peek) => rendered.push(format!("{}={}", field.name, apply(field_peek, self)?)),
                Err(error) => log::debug!(
                    "skipping {}.{}: {error}",
                    peek.shape().type_identifier,
                    field.name
                ),
            }
        }
        Ok(format!(
            "{}{{{}}}",
            peek.shape().type_identifier,
            rendered.join(", ")
        ))
    }
}

fn number_from_f64(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None => {
            log::warn!("non-finite float {value} has no tree representation, exporting null");
            Value::Null
        }
    }
}
