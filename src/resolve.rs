//! The value resolver/converter: builds precisely-typed values from loosely
//! typed decoded value trees.
//!
//! Conversion recurses over the target shape the same way classification
//! does: optionals absorb null, smart pointers see through to their pointee,
//! dates accept epoch-millisecond integers or calendar text, containers
//! convert their elements/keys/values against the matching type arguments,
//! beans populate field-by-field with unset fields defaulted, and scalars
//! coerce through the auto-exchange rules (string/number/boolean).

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use facet_core::{Def, Facet, NumericType, PrimitiveType, Shape, ShapeLayout, StructType, Type, UserType};
use facet_reflect::{HeapValue, Partial};
use serde_json::Value;

use crate::behavior::DATE_FORMAT;
use crate::{Category, Result, TierError, TierErrorKind, is_date_shape};

/// Converts a decoded value tree into a `T`.
pub fn from_tree<'facet, T: Facet<'facet>>(tree: &Value) -> Result<T> {
    let mut wip = Partial::alloc::<T>()?;
    fill(wip.inner_mut(), tree)?;
    Ok(wip.build().map(|built| *built)?)
}

/// Decodes JSON text and converts the resulting tree into a `T`.
pub fn from_json_str<'facet, T: Facet<'facet>>(text: &str) -> Result<T> {
    let tree: Value =
        serde_json::from_str(text).map_err(|error| TierErrorKind::Json(error.to_string()))?;
    from_tree(&tree)
}

/// Descriptor-driven conversion: builds a heap value conforming to `shape`
/// from a candidate tree, without a compile-time target type.
pub fn resolve_shape<'facet>(
    shape: &'static Shape,
    tree: &Value,
) -> Result<HeapValue<'facet>> {
    let mut wip = Partial::alloc_shape(shape)?;
    fill(&mut wip, tree)?;
    Ok(wip.build()?)
}

pub(crate) fn fill(wip: &mut Partial<'_>, tree: &Value) -> Result<()> {
    let shape = wip.shape();
    log::trace!(
        "fill {} <- {}",
        shape.type_identifier,
        Category::of_tree(tree)
    );

    if let Def::Option(_) = shape.def {
        if tree.is_null() {
            wip.set_default()?;
            return Ok(());
        }
        wip.begin_some()?;
        fill(wip, tree)?;
        wip.end()?;
        return Ok(());
    }

    // only optionals absorb null
    if tree.is_null() {
        return Err(unresolvable(wip, tree));
    }

    if is_date_shape(shape) {
        return fill_date(wip, tree);
    }

    if let Def::Pointer(_) = shape.def {
        wip.begin_smart_ptr()?;
        fill(wip, tree)?;
        wip.end()?;
        return Ok(());
    }

    match shape.def {
        Def::List(_) => return fill_list(wip, tree),
        Def::Set(_) => return fill_set(wip, tree),
        Def::Map(_) => return fill_map(wip, tree),
        Def::Array(array_def) => return fill_array(wip, tree, array_def.n),
        _ => {}
    }

    match shape.ty {
        Type::User(UserType::Struct(struct_def)) => return fill_struct(wip, tree, struct_def),
        Type::User(UserType::Enum(_)) => return fill_enum(wip, tree),
        _ => {}
    }

    fill_scalar(wip, tree)
}

fn fill_struct(wip: &mut Partial<'_>, tree: &Value, struct_def: StructType) -> Result<()> {
    let Value::Object(entries) = tree else {
        // transparent wrappers take their inner value from a scalar candidate
        if wip.shape().inner.is_some() {
            wip.begin_inner()?;
            fill(wip, tree)?;
            wip.end()?;
            return Ok(());
        }
        return Err(unresolvable(wip, tree));
    };

    // skip-marked fields still fill when the tree names them; excluding them
    // from bulk sweeps is the mapper's concern, and rebuilds rely on named
    // entries to carry their live values through
    for (idx, field) in struct_def.fields.iter().enumerate() {
        let Some(value) = entries.get(field.name) else {
            continue;
        };
        wip.begin_nth_field(idx)?;
        fill(wip, value)?;
        wip.end()?;
    }

    for key in entries.keys() {
        if !struct_def.fields.iter().any(|field| field.name == key) {
            log::warn!(
                "no attribute matches source key '{key}' on {}",
                wip.shape().type_identifier
            );
        }
    }

    // unmentioned fields keep their defaults, as a freshly constructed
    // instance would; unmentioned bean fields default field-by-field so
    // nested types need no Default impl of their own
    for (idx, field) in struct_def.fields.iter().enumerate() {
        if wip.is_field_set(idx)? {
            continue;
        }
        let field_shape = (field.shape)();
        let is_plain_bean = !matches!(field_shape.def, Def::Option(_))
            && !is_date_shape(field_shape)
            && matches!(field_shape.ty, Type::User(UserType::Struct(_)))
            && Category::of_shape(field_shape) == Category::Bean;
        if is_plain_bean {
            wip.begin_nth_field(idx)?;
            fill(wip, &Value::Object(serde_json::Map::new()))?;
            wip.end()?;
        } else {
            wip.set_nth_field_to_default(idx)?;
        }
    }
    Ok(())
}

fn fill_enum(wip: &mut Partial<'_>, tree: &Value) -> Result<()> {
    match tree {
        Value::String(name) => {
            wip.select_variant_named(name)?;
            Ok(())
        }
        _ => Err(unresolvable(wip, tree)),
    }
}

fn fill_map(wip: &mut Partial<'_>, tree: &Value) -> Result<()> {
    let Value::Object(entries) = tree else {
        return Err(unresolvable(wip, tree));
    };
    wip.begin_map()?;
    for (key, value) in entries {
        wip.begin_key()?;
        // object keys arrive as text and convert against the key shape
        fill(wip, &Value::String(key.clone()))?;
        wip.end()?;
        wip.begin_value()?;
        fill(wip, value)?;
        wip.end()?;
    }
    Ok(())
}

fn fill_list(wip: &mut Partial<'_>, tree: &Value) -> Result<()> {
    let Value::Array(items) = tree else {
        return Err(unresolvable(wip, tree));
    };
    wip.begin_list()?;
    for item in items {
        wip.begin_list_item()?;
        fill(wip, item)?;
        wip.end()?;
    }
    Ok(())
}

fn fill_set(wip: &mut Partial<'_>, tree: &Value) -> Result<()> {
    let Value::Array(items) = tree else {
        return Err(unresolvable(wip, tree));
    };
    wip.begin_set()?;
    for item in items {
        wip.begin_set_item()?;
        fill(wip, item)?;
        wip.end()?;
    }
    Ok(())
}

fn fill_array(wip: &mut Partial<'_>, tree: &Value, len: usize) -> Result<()> {
    let Value::Array(items) = tree else {
        return Err(unresolvable(wip, tree));
    };
    if items.len() != len {
        return Err(TierErrorKind::UnsupportedShape {
            shape: wip.shape(),
            reason: format!("expected exactly {len} elements, got {}", items.len()),
        }
        .into());
    }
    for (idx, item) in items.iter().enumerate() {
        wip.begin_nth_field(idx)?;
        fill(wip, item)?;
        wip.end()?;
    }
    Ok(())
}

fn fill_date(wip: &mut Partial<'_>, tree: &Value) -> Result<()> {
    let shape = wip.shape();
    if shape.vtable.parse.is_none() {
        return Err(unresolvable(wip, tree));
    }
    match tree {
        // epoch milliseconds, per the date auto-exchange convention
        Value::Number(n) => {
            let millis = n.as_i64().ok_or_else(|| unresolvable(wip, tree))?;
            let datetime = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| unresolvable(wip, tree))?;
            wip.parse_from_str(&datetime.to_rfc3339())?;
            Ok(())
        }
        Value::String(text) => {
            if wip.parse_from_str(text).is_ok() {
                return Ok(());
            }
            // fall back to the canonical calendar rendering, fixed at UTC+8
            let parsed = NaiveDateTime::parse_from_str(text, DATE_FORMAT)
                .map_err(|_| unresolvable(wip, tree))?;
            let utc: DateTime<Utc> = (parsed - Duration::hours(8)).and_utc();
            wip.parse_from_str(&utc.to_rfc3339())?;
            Ok(())
        }
        _ => Err(unresolvable(wip, tree)),
    }
}

fn fill_scalar(wip: &mut Partial<'_>, tree: &Value) -> Result<()> {
    let shape = wip.shape();

    // transparent wrappers that are not themselves settable scalars
    if shape.inner.is_some() && !matches!(shape.ty, Type::Primitive(_)) && !shape.is_type::<String>()
    {
        wip.begin_inner()?;
        fill(wip, tree)?;
        wip.end()?;
        return Ok(());
    }

    match tree {
        Value::Bool(flag) => match shape.ty {
            Type::Primitive(PrimitiveType::Boolean) => {
                wip.set(*flag)?;
                Ok(())
            }
            _ if shape.is_type::<String>() => {
                wip.set(flag.to_string())?;
                Ok(())
            }
            _ => Err(unresolvable(wip, tree)),
        },
        Value::Number(number) => set_number(wip, number),
        Value::String(text) => set_string(wip, text),
        _ => Err(unresolvable(wip, tree)),
    }
}

fn set_number(wip: &mut Partial<'_>, number: &serde_json::Number) -> Result<()> {
    let shape = wip.shape();
    let at = wip.path();
    let size = match shape.layout {
        ShapeLayout::Sized(layout) => layout.size(),
        _ => 0,
    };

    match shape.ty {
        Type::Primitive(PrimitiveType::Numeric(NumericType::Integer { signed: true })) => {
            let v = number
                .as_i64()
                .ok_or_else(|| assignment(&at, shape, Category::Primitive))?;
            match size {
                1 => wip.set(i8::try_from(v).map_err(|_| assignment(&at, shape, Category::Primitive))?)?,
                2 => wip.set(i16::try_from(v).map_err(|_| assignment(&at, shape, Category::Primitive))?)?,
                4 => wip.set(i32::try_from(v).map_err(|_| assignment(&at, shape, Category::Primitive))?)?,
                8 => wip.set(v)?,
                16 => wip.set(v as i128)?,
                _ => return Err(unresolvable_at(at, shape, Category::Primitive)),
            };
            Ok(())
        }
        Type::Primitive(PrimitiveType::Numeric(NumericType::Integer { signed: false })) => {
            let v = number
                .as_u64()
                .ok_or_else(|| assignment(&at, shape, Category::Primitive))?;
            match size {
                1 => wip.set(u8::try_from(v).map_err(|_| assignment(&at, shape, Category::Primitive))?)?,
                2 => wip.set(u16::try_from(v).map_err(|_| assignment(&at, shape, Category::Primitive))?)?,
                4 => wip.set(u32::try_from(v).map_err(|_| assignment(&at, shape, Category::Primitive))?)?,
                8 => wip.set(v)?,
                16 => wip.set(v as u128)?,
                _ => return Err(unresolvable_at(at, shape, Category::Primitive)),
            };
            Ok(())
        }
        Type::Primitive(PrimitiveType::Numeric(NumericType::Float)) => {
            let v = number
                .as_f64()
                .ok_or_else(|| assignment(&at, shape, Category::Primitive))?;
            match size {
                4 => wip.set(v as f32)?,
                8 => wip.set(v)?,
                _ => return Err(unresolvable_at(at, shape, Category::Primitive)),
            };
            Ok(())
        }
        // number-to-string auto-exchange
        _ if shape.is_type::<String>() => {
            wip.set(number.to_string())?;
            Ok(())
        }
        _ => Err(unresolvable_at(at, shape, Category::Primitive)),
    }
}

fn set_string(wip: &mut Partial<'_>, text: &str) -> Result<()> {
    let shape = wip.shape();
    let at = wip.path();

    if shape.is_type::<String>() {
        wip.set(text.to_string())?;
        return Ok(());
    }

    match shape.ty {
        // string-to-boolean auto-exchange
        Type::Primitive(PrimitiveType::Boolean) => {
            return match text {
                "true" => {
                    wip.set(true)?;
                    Ok(())
                }
                "false" => {
                    wip.set(false)?;
                    Ok(())
                }
                _ => Err(assignment(&at, shape, Category::String)),
            };
        }
        // string-to-number auto-exchange
        Type::Primitive(PrimitiveType::Numeric(_)) => {
            let number: serde_json::Number = serde_json::from_str(text)
                .map_err(|_| assignment(&at, shape, Category::String))?;
            return set_number(wip, &number);
        }
        Type::Primitive(PrimitiveType::Textual(_)) if shape.is_type::<char>() => {
            let mut chars = text.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    wip.set(c)?;
                    Ok(())
                }
                _ => Err(assignment(&at, shape, Category::String)),
            };
        }
        _ => {}
    }

    if shape.vtable.parse.is_some() {
        wip.parse_from_str(text)?;
        return Ok(());
    }

    Err(unresolvable_at(at, shape, Category::String))
}

fn unresolvable(wip: &Partial<'_>, tree: &Value) -> TierError {
    unresolvable_at(wip.path(), wip.shape(), Category::of_tree(tree))
}

fn unresolvable_at(at: String, shape: &'static Shape, actual: Category) -> TierError {
    TierErrorKind::UnresolvableConversion {
        expected: shape,
        actual,
        at,
    }
    .into()
}

fn assignment(at: &str, shape: &'static Shape, actual: Category) -> TierError {
    TierErrorKind::ValueAssignment {
        attribute: at.to_string(),
        expected: shape,
        actual,
    }
    .into()
}
