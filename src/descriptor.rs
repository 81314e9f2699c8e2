//! Recursive type descriptors with a process-wide resolution registry.
//!
//! A [`TypeDescriptor`] captures the raw shape of a type site plus, for
//! generic container shapes, the descriptors of its type arguments in
//! declaration order (key then value for keyed mappings, element for
//! collections and arrays, pointee for smart pointers). Descriptors are
//! immutable once resolved and cached for the process lifetime: resolving
//! the same site twice returns the same reference. Racing resolutions of
//! one site are idempotent; the first inserted result wins.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use facet_core::{Def, Shape};

use crate::Category;

/// The resolved shape of a type occurring at some attribute site.
#[derive(Debug)]
pub struct TypeDescriptor {
    shape: &'static Shape,
    category: Category,
    nullable: bool,
    args: Vec<&'static TypeDescriptor>,
}

static REGISTRY: OnceLock<RwLock<HashMap<usize, &'static TypeDescriptor>>> = OnceLock::new();

impl TypeDescriptor {
    /// Resolves the descriptor for a type site, consulting the process-wide
    /// registry first.
    pub fn resolve(shape: &'static Shape) -> &'static TypeDescriptor {
        let key = shape as *const Shape as usize;
        let registry = REGISTRY.get_or_init(|| RwLock::new(HashMap::new()));

        if let Ok(cached) = registry.read() {
            if let Some(found) = cached.get(&key) {
                return found;
            }
        }

        let resolved: &'static TypeDescriptor = Box::leak(Box::new(Self::resolve_uncached(shape)));
        match registry.write() {
            Ok(mut cached) => *cached.entry(key).or_insert(resolved),
            // a poisoned registry degrades to uncached resolution
            Err(_) => resolved,
        }
    }

    fn resolve_uncached(shape: &'static Shape) -> TypeDescriptor {
        let mut nullable = false;
        let mut shape = shape;
        if let Def::Option(opt) = shape.def {
            nullable = true;
            shape = opt.t;
        }

        let args = match shape.def {
            Def::Map(map_def) => vec![Self::resolve(map_def.k()), Self::resolve(map_def.v())],
            Def::List(list_def) => vec![Self::resolve(list_def.t())],
            Def::Set(set_def) => vec![Self::resolve(set_def.t())],
            Def::Array(array_def) => vec![Self::resolve(array_def.t)],
            Def::Pointer(ptr_def) => match ptr_def.pointee() {
                Some(pointee) => vec![Self::resolve(pointee)],
                // an erased pointee leaves the arguments unknown, not scalar
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        log::trace!(
            "resolved {} as {} with {} argument(s)",
            shape.type_identifier,
            Category::of_shape(shape),
            args.len()
        );

        TypeDescriptor {
            shape,
            category: Category::of_shape(shape),
            nullable,
            args,
        }
    }

    /// The raw shape of this site, with any `Option` wrapper stripped.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// The classified category of the raw shape.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Whether the site was declared as `Option<...>`.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The type arguments in declaration order. Empty when the shape is not
    /// a generic container, or when its argument information is unavailable.
    pub fn args(&self) -> &[&'static TypeDescriptor] {
        &self.args
    }

    /// True iff this site has exactly two type arguments (a keyed mapping's
    /// key/value pair).
    pub fn is_pair(&self) -> bool {
        self.args.len() == 2
    }

    /// The descriptor of type argument `i`.
    pub fn arg(&self, i: usize) -> Option<&'static TypeDescriptor> {
        self.args.get(i).copied()
    }

    /// The descriptor of the first type argument: the element type of a
    /// collection or array, or the key type of a keyed mapping.
    pub fn next(&self) -> Option<&'static TypeDescriptor> {
        self.arg(0)
    }

    /// The value side of a pair shape, i.e. `arg(1)`.
    pub fn next_pair_type(&self) -> Option<&'static TypeDescriptor> {
        self.arg(1)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.shape, other.shape)
            && self.nullable == other.nullable
            && self.args.len() == other.args.len()
            && self.args.iter().zip(other.args.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for TypeDescriptor {}
