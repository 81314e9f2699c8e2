#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{
    error::Error,
    fmt::{self, Display},
};

use facet_core::{Def, NumericType, PrimitiveType, Shape, ShapeLayout, Type, UserType};
use facet_reflect::{Peek, ReflectError};
use serde_json::Value;

mod behavior;
mod descriptor;
mod mapper;
mod resolve;
mod tier;

pub use behavior::{Behavior, NULL_STR, apply, deep_eq, deep_hash, stringify, to_tree};
pub use descriptor::TypeDescriptor;
pub use mapper::{
    AttributeDescriptor, ExchangeFn, FixtureSource, Mapper, MapperRules, SequenceFixture,
};
pub use resolve::{from_json_str, from_tree, resolve_shape};
pub use tier::{
    TIER_SEP, TierMap, deep_tier_map, deep_tier_map_with_sep, resolve_path, resolve_tree,
    set_path, type_at_path,
};

pub(crate) type Result<T, E = TierError> = std::result::Result<T, E>;

/// Error type for introspection, navigation, and conversion failures.
#[derive(Debug)]
pub struct TierError {
    kind: TierErrorKind,
}

impl TierError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &TierErrorKind {
        &self.kind
    }
}

impl Display for TierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}
impl Error for TierError {}

impl<K: Into<TierErrorKind>> From<K> for TierError {
    fn from(value: K) -> Self {
        let kind = value.into();
        TierError { kind }
    }
}

/// Detailed classification of introspection errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum TierErrorKind {
    /// Exact-name attribute lookup missed.
    AttributeNotFound {
        /// The queried attribute name.
        attribute: String,
        /// The shape that was searched.
        shape: &'static Shape,
    },
    /// No tier path matches the query.
    PathNotFound {
        /// The queried path.
        path: String,
    },
    /// A bare leaf name matches more than one fully-qualified path.
    AmbiguousPath {
        /// The queried leaf name.
        query: String,
        /// Every fully-qualified path ending in the queried segment.
        candidates: Vec<String>,
    },
    /// A value could not be assigned to an attribute of an incompatible shape.
    ValueAssignment {
        /// The attribute (or conversion frame path) being written.
        attribute: String,
        /// The attribute's declared shape.
        expected: &'static Shape,
        /// The category of the offending value.
        actual: Category,
    },
    /// The converter cannot bridge the candidate's shape to the target shape.
    UnresolvableConversion {
        /// The target shape.
        expected: &'static Shape,
        /// The category of the candidate value.
        actual: Category,
        /// The conversion frame path where the mismatch occurred.
        at: String,
    },
    /// An attribute exists but cannot be read from the introspected value.
    InaccessibleAttribute {
        /// The attribute name.
        attribute: String,
        /// The shape owning the attribute.
        shape: &'static Shape,
    },
    /// The operation does not apply to this shape.
    UnsupportedShape {
        /// The offending shape.
        shape: &'static Shape,
        /// What was expected instead.
        reason: String,
    },
    /// Error from the reflection system.
    Reflect(ReflectError),
    /// Failed to decode JSON text into a value tree.
    Json(String),
}

impl Display for TierErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierErrorKind::AttributeNotFound { attribute, shape } => {
                write!(
                    f,
                    "no attribute '{attribute}' on {}",
                    shape.type_identifier
                )
            }
            TierErrorKind::PathNotFound { path } => write!(f, "no tier path '{path}'"),
            TierErrorKind::AmbiguousPath { query, candidates } => {
                write!(
                    f,
                    "ambiguous leaf '{query}', matches: {}",
                    candidates.join(", ")
                )
            }
            TierErrorKind::ValueAssignment {
                attribute,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "cannot assign {actual} value to '{attribute}' declared as {}",
                    expected.type_identifier
                )
            }
            TierErrorKind::UnresolvableConversion {
                expected,
                actual,
                at,
            } => {
                write!(
                    f,
                    "cannot convert {actual} value into {} at {at}",
                    expected.type_identifier
                )
            }
            TierErrorKind::InaccessibleAttribute { attribute, shape } => {
                write!(
                    f,
                    "attribute '{attribute}' on {} is not accessible",
                    shape.type_identifier
                )
            }
            TierErrorKind::UnsupportedShape { shape, reason } => {
                write!(f, "unsupported shape {}: {reason}", shape.type_identifier)
            }
            TierErrorKind::Reflect(reflect_error) => write!(f, "{reflect_error}"),
            TierErrorKind::Json(msg) => write!(f, "invalid JSON: {msg}"),
        }
    }
}

impl From<ReflectError> for TierErrorKind {
    fn from(value: ReflectError) -> Self {
        Self::Reflect(value)
    }
}

/// The fixed set of shape categories every value and type site maps onto.
///
/// The declaration order is the classification precedence: null first, then
/// primitive/boxed-primitive, then string, then date and big numbers, then
/// enum, array, collection, keyed mapping, and finally bean as the catch-all
/// for remaining structured types. Every recursive operation in this crate
/// (convert, stringify, hash, equality) dispatches on this classification and
/// nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The null value, or an absent optional.
    Null,
    /// `bool`, `char`, and numeric primitives narrower than 128 bits.
    Primitive,
    /// A smart pointer whose pointee is a primitive.
    BoxedPrimitive,
    /// Owned or borrowed text.
    String,
    /// A calendar date/time shape.
    Date,
    /// A 128-bit integer.
    BigInteger,
    /// An arbitrary-precision decimal shape.
    BigDecimal,
    /// An enum.
    Enum,
    /// A fixed-length array or slice.
    Array,
    /// A variable-length sequence or set.
    Collection,
    /// A keyed mapping.
    KeyedMapping,
    /// Any remaining structured type.
    Bean,
}

impl Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Null => "null",
            Category::Primitive => "primitive",
            Category::BoxedPrimitive => "boxed primitive",
            Category::String => "string",
            Category::Date => "date",
            Category::BigInteger => "big integer",
            Category::BigDecimal => "big decimal",
            Category::Enum => "enum",
            Category::Array => "array",
            Category::Collection => "collection",
            Category::KeyedMapping => "keyed mapping",
            Category::Bean => "bean",
        };
        write!(f, "{name}")
    }
}

impl Category {
    /// Classifies a declared type site. `Option<T>` sites classify as their
    /// inner type; whether a site was optional is recorded on its
    /// [`TypeDescriptor`] instead.
    pub fn of_shape(shape: &'static Shape) -> Self {
        if let Def::Option(opt) = shape.def {
            return Self::of_shape(opt.t);
        }

        match shape.ty {
            Type::Primitive(PrimitiveType::Boolean) => return Self::Primitive,
            Type::Primitive(PrimitiveType::Numeric(numeric)) => {
                return Self::of_numeric(numeric, shape);
            }
            Type::Primitive(PrimitiveType::Textual(_)) => {
                return if shape.is_type::<char>() {
                    Self::Primitive
                } else {
                    Self::String
                };
            }
            _ => {}
        }

        if shape.is_type::<String>() || matches!(shape.type_identifier, "String" | "str") {
            return Self::String;
        }
        if is_date_shape(shape) {
            return Self::Date;
        }
        if matches!(shape.type_identifier, "Decimal" | "BigDecimal") {
            return Self::BigDecimal;
        }
        if matches!(shape.type_identifier, "BigInt" | "BigInteger" | "BigUint") {
            return Self::BigInteger;
        }

        if let Type::User(UserType::Enum(_)) = shape.ty {
            return Self::Enum;
        }

        match shape.def {
            Def::Array(_) => return Self::Array,
            Def::List(_) | Def::Set(_) => return Self::Collection,
            Def::Map(_) => return Self::KeyedMapping,
            // Cow and the other known pointers classify by their pointee, so
            // Cow<str> is text and Cow<[u8]> is a sequence
            Def::Pointer(ptr) => {
                if let Some(pointee) = ptr.pointee() {
                    let inner = Self::of_shape(pointee);
                    return if inner == Self::Primitive {
                        Self::BoxedPrimitive
                    } else {
                        inner
                    };
                }
                return Self::Bean;
            }
            _ => {}
        }

        if let Type::Sequence(_) = shape.ty {
            return Self::Array;
        }
        Self::Bean
    }

    fn of_numeric(numeric: NumericType, shape: &'static Shape) -> Self {
        if let NumericType::Integer { .. } = numeric {
            // 128-bit integers stand in for arbitrary-precision integers
            if let ShapeLayout::Sized(layout) = shape.layout {
                if layout.size() == 16 {
                    return Self::BigInteger;
                }
            }
        }
        Self::Primitive
    }

    /// Classifies a node of a decoded value tree.
    pub fn of_tree(tree: &Value) -> Self {
        match tree {
            Value::Null => Self::Null,
            Value::Bool(_) | Value::Number(_) => Self::Primitive,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Collection,
            Value::Object(_) => Self::KeyedMapping,
        }
    }

    /// Classifies a live value. An absent optional classifies as [`Null`];
    /// everything else classifies by its shape.
    ///
    /// [`Null`]: Category::Null
    pub fn of_peek(peek: Peek<'_, '_>) -> Self {
        if let Ok(opt_peek) = peek.into_option() {
            if opt_peek.is_none() {
                return Self::Null;
            }
        }
        Self::of_shape(peek.shape())
    }
}

// only the chrono calendar shapes: they carry the parse/format surface the
// epoch-millisecond round trip needs
pub(crate) fn is_date_shape(shape: &'static Shape) -> bool {
    matches!(
        shape.type_identifier,
        "DateTime" | "NaiveDateTime" | "NaiveDate"
    )
}
