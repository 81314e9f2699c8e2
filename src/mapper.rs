//! The attribute accessor / object mapper.
//!
//! A [`Mapper`] introspects a struct's declared attributes once, then exposes
//! exact-name get/set, bulk export to a nested name→value mapping, and
//! population back from such a mapping (or from JSON text), honoring
//! per-session aliasing and value-exchange rules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use facet_core::{Def, EnumType, Facet, FieldAttribute, Shape, StructType, Type, UserType};
use facet_reflect::Peek;
use serde_json::{Map, Number, Value};

use crate::descriptor::TypeDescriptor;
use crate::{Category, Result, TierErrorKind, behavior, resolve};

/// A value-exchange function: rewrites a source value before assignment.
pub type ExchangeFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// The explicit rule set a mapping session carries: name aliases, value
/// exchanges, coercion and tracing flags, and the set of type-identifier
/// prefixes whose bean values are exported as their canonical rendering
/// instead of being recursively mapped.
#[derive(Clone)]
pub struct MapperRules {
    /// Target attribute name → source key name.
    pub aliases: BTreeMap<String, String>,
    /// Source key name → exchange function.
    pub exchanges: BTreeMap<String, ExchangeFn>,
    /// Coerce string/number/boolean/date candidates when no explicit
    /// exchange is registered. On by default.
    pub auto_exchange: bool,
    /// Type-identifier prefixes excluded from recursive bean export.
    pub excluded_prefixes: BTreeSet<String>,
    /// Log every get/set with old and new categories.
    pub trace: bool,
}

impl Default for MapperRules {
    fn default() -> Self {
        MapperRules {
            aliases: BTreeMap::new(),
            exchanges: BTreeMap::new(),
            auto_exchange: true,
            excluded_prefixes: BTreeSet::new(),
            trace: false,
        }
    }
}

impl fmt::Debug for MapperRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperRules")
            .field("aliases", &self.aliases)
            .field("exchanges", &self.exchanges.keys().collect::<Vec<_>>())
            .field("auto_exchange", &self.auto_exchange)
            .field("excluded_prefixes", &self.excluded_prefixes)
            .field("trace", &self.trace)
            .finish()
    }
}

/// One declared attribute of an introspected struct.
#[derive(Debug, Clone, Copy)]
pub struct AttributeDescriptor {
    name: &'static str,
    shape: &'static Shape,
    index: usize,
    skipped: bool,
}

impl AttributeDescriptor {
    /// The attribute's declared name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The attribute's declared shape.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// The attribute's position in the struct's field list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the attribute is marked `#[facet(skip)]` and therefore
    /// excluded from bulk export and population.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// The attribute's classified category.
    pub fn category(&self) -> Category {
        Category::of_shape(self.shape)
    }

    /// The attribute's recursive type descriptor.
    pub fn descriptor(&self) -> &'static TypeDescriptor {
        TypeDescriptor::resolve(self.shape)
    }
}

/// A collaborator that produces candidate values per attribute site, used by
/// [`Mapper::populate_with`] for test-fixture population.
pub trait FixtureSource {
    /// Produces a candidate value conforming to the descriptor's category.
    fn generate(&mut self, descriptor: &'static TypeDescriptor) -> Value;
}

/// An introspection session over one struct type, optionally holding a live
/// target value. Sessions are exclusively owned; share one across execution
/// contexts only behind external synchronization.
#[derive(Debug)]
pub struct Mapper<T> {
    target: Option<T>,
    attributes: Vec<AttributeDescriptor>,
    rules: MapperRules,
}

impl<T: Facet<'static>> Mapper<T> {
    /// Scans `value`'s declared attributes once and wraps it in a session.
    pub fn introspect(value: T) -> Result<Self> {
        let mut mapper = Self::of_type()?;
        mapper.target = Some(value);
        Ok(mapper)
    }

    /// A type-only session with no target value; traversal and population
    /// default-construct on demand.
    pub fn of_type() -> Result<Self> {
        let struct_def = struct_type_of(T::SHAPE)?;
        let attributes = struct_def
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| AttributeDescriptor {
                name: field.name,
                shape: (field.shape)(),
                index,
                skipped: field.attributes.contains(&FieldAttribute::Arbitrary("skip")),
            })
            .collect();
        Ok(Mapper {
            target: None,
            attributes,
            rules: MapperRules::default(),
        })
    }

    /// The cached attribute list, in declaration order.
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Exact-name attribute lookup.
    pub fn attribute(&self, name: &str) -> Result<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .ok_or_else(|| {
                TierErrorKind::AttributeNotFound {
                    attribute: name.to_string(),
                    shape: T::SHAPE,
                }
                .into()
            })
    }

    /// The live target value, if any.
    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }

    /// Takes the target value out of the session.
    pub fn take(&mut self) -> Option<T> {
        self.target.take()
    }

    /// Consumes the session, yielding the target value or a freshly
    /// default-constructed instance for a type-only session.
    pub fn build(mut self) -> Result<T> {
        match self.target.take() {
            Some(value) => Ok(value),
            None => resolve::from_tree(&Value::Object(Map::new())),
        }
    }

    /// The session's current rule set.
    pub fn rules(&self) -> &MapperRules {
        &self.rules
    }

    /// Replaces the session's rule set.
    pub fn set_rules(&mut self, rules: MapperRules) -> &mut Self {
        self.rules = rules;
        self
    }

    /// Registers a name alias: the attribute `target` populates from the
    /// source key `source_key`.
    pub fn alias(&mut self, target: &str, source_key: &str) -> &mut Self {
        self.rules
            .aliases
            .insert(target.to_string(), source_key.to_string());
        self
    }

    /// Registers a value-exchange function for a source key.
    pub fn exchange(
        &mut self,
        source_key: &str,
        exchange: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.rules
            .exchanges
            .insert(source_key.to_string(), Arc::new(exchange));
        self
    }

    /// Enables or disables built-in candidate coercion.
    pub fn auto_exchange(&mut self, on: bool) -> &mut Self {
        self.rules.auto_exchange = on;
        self
    }

    /// Excludes a type-identifier prefix from recursive bean export.
    pub fn excluded_prefix(&mut self, prefix: &str) -> &mut Self {
        self.rules.excluded_prefixes.insert(prefix.to_string());
        self
    }

    /// Enables or disables get/set tracing.
    pub fn trace(&mut self, on: bool) -> &mut Self {
        self.rules.trace = on;
        self
    }

    /// Reads an attribute by exact name, exported as a value tree.
    pub fn get(&self, name: &str) -> Result<Value> {
        let attribute = *self.attribute(name)?;
        let target = self.target.as_ref().ok_or_else(|| no_target(T::SHAPE))?;
        let peek = Peek::new(target);
        let struct_peek = peek.into_struct()?;
        let field_peek = struct_peek.field(attribute.index).map_err(|_| {
            TierErrorKind::InaccessibleAttribute {
                attribute: name.to_string(),
                shape: T::SHAPE,
            }
        })?;
        let value = behavior::tree_of(field_peek)?;
        if self.rules.trace {
            log::trace!(
                "get {}.{} = {} ({})",
                T::SHAPE.type_identifier,
                name,
                value,
                attribute.category()
            );
        }
        Ok(value)
    }

    /// Writes an attribute by exact name, converting the candidate against
    /// the attribute's declared shape.
    pub fn set(&mut self, name: &str, value: Value) -> Result<&mut Self> {
        let attribute = *self.attribute(name)?;
        if attribute.skipped {
            return Err(TierErrorKind::InaccessibleAttribute {
                attribute: name.to_string(),
                shape: T::SHAPE,
            }
            .into());
        }

        // reject incompatible candidates before touching the target
        resolve::resolve_shape(attribute.shape, &value).map_err(|_| {
            TierErrorKind::ValueAssignment {
                attribute: name.to_string(),
                expected: attribute.shape,
                actual: Category::of_tree(&value),
            }
        })?;

        let mut tree = self.rebuild_tree()?;
        if self.rules.trace {
            let old = tree.get(name).cloned().unwrap_or(Value::Null);
            log::trace!(
                "set {}.{} = {} ({}), was {} ({})",
                T::SHAPE.type_identifier,
                name,
                value,
                Category::of_tree(&value),
                old,
                Category::of_tree(&old)
            );
        }
        if let Value::Object(entries) = &mut tree {
            entries.insert(name.to_string(), value);
        }
        self.target = Some(resolve::from_tree(&tree)?);
        Ok(self)
    }

    /// Exports the target as a nested name→value mapping: non-bean attribute
    /// values are stored as exported, bean attributes recursively store their
    /// own mapping, and beans matching an excluded prefix are stored as their
    /// canonical rendering instead.
    pub fn as_tier_map(&self) -> Result<Map<String, Value>> {
        let tree = self.export_tree()?;
        let Value::Object(entries) = tree else {
            return Err(TierErrorKind::UnsupportedShape {
                shape: T::SHAPE,
                reason: "bean export did not produce a mapping".into(),
            }
            .into());
        };

        let mut out = Map::new();
        for attribute in &self.attributes {
            if attribute.skipped {
                continue;
            }
            let Some(value) = entries.get(attribute.name) else {
                continue;
            };
            if attribute.category() == Category::Bean && self.is_excluded(attribute.shape) {
                match self.render_attribute(attribute) {
                    Ok(rendered) => {
                        out.insert(attribute.name.to_string(), Value::String(rendered));
                    }
                    Err(error) => log::debug!(
                        "skipping {}.{}: {error}",
                        T::SHAPE.type_identifier,
                        attribute.name
                    ),
                }
                continue;
            }
            out.insert(attribute.name.to_string(), value.clone());
        }
        Ok(out)
    }

    /// Populates attributes from a source mapping, skipping `exclude`d
    /// names, using the session's rules.
    pub fn populate(&mut self, source: &Map<String, Value>, exclude: &[&str]) -> Result<&mut Self> {
        let rules = self.rules.clone();
        self.populate_with_rules(source, exclude, &rules)
    }

    /// Populates attributes from a source mapping under an explicit rule set.
    ///
    /// For each non-skipped attribute whose (possibly aliased) name is
    /// present and not excluded: a bean attribute with a mapping candidate
    /// recursively populates a default-constructed instance; any other
    /// candidate passes through the registered exchange for its source key,
    /// or through auto-exchange coercion, before assignment. Individual
    /// attribute failures are logged and skipped so one bad key never aborts
    /// the sweep.
    pub fn populate_with_rules(
        &mut self,
        source: &Map<String, Value>,
        exclude: &[&str],
        rules: &MapperRules,
    ) -> Result<&mut Self> {
        let mut tree = self.rebuild_tree()?;
        let Value::Object(entries) = &mut tree else {
            return Err(TierErrorKind::UnsupportedShape {
                shape: T::SHAPE,
                reason: "bean export did not produce a mapping".into(),
            }
            .into());
        };

        for attribute in &self.attributes {
            if attribute.skipped {
                continue;
            }
            let source_key = rules
                .aliases
                .get(attribute.name)
                .map(String::as_str)
                .unwrap_or(attribute.name);
            if exclude.contains(&source_key) || exclude.contains(&attribute.name) {
                continue;
            }
            let Some(raw) = source.get(source_key) else {
                continue;
            };

            let value = match rules.exchanges.get(source_key) {
                Some(exchange) => exchange(raw),
                None => {
                    if !rules.auto_exchange && !directly_assignable(attribute, raw) {
                        log::debug!(
                            "skipping {}.{}: {} not assignable to {} without auto-exchange",
                            T::SHAPE.type_identifier,
                            attribute.name,
                            Category::of_tree(raw),
                            attribute.category()
                        );
                        continue;
                    }
                    raw.clone()
                }
            };

            match resolve::resolve_shape(attribute.shape, &value) {
                Ok(_) => {
                    if rules.trace {
                        log::trace!(
                            "set {}.{} = {} ({})",
                            T::SHAPE.type_identifier,
                            attribute.name,
                            value,
                            attribute.category()
                        );
                    }
                    entries.insert(attribute.name.to_string(), value);
                }
                Err(error) => log::debug!(
                    "skipping {}.{}: {error}",
                    T::SHAPE.type_identifier,
                    attribute.name
                ),
            }
        }

        self.target = Some(resolve::from_tree(&tree)?);
        Ok(self)
    }

    /// Decodes JSON text and populates from the resulting top-level object.
    pub fn populate_json(&mut self, text: &str) -> Result<&mut Self> {
        let tree: Value =
            serde_json::from_str(text).map_err(|error| TierErrorKind::Json(error.to_string()))?;
        let Value::Object(entries) = tree else {
            return Err(TierErrorKind::Json("expected a top-level object".into()).into());
        };
        self.populate(&entries, &[])
    }

    /// Exports this session's tier map and populates a fresh `U` with it,
    /// carrying over this session's rules.
    pub fn copy_to<U: Facet<'static>>(&self) -> Result<U> {
        let source = self.as_tier_map()?;
        let mut destination = Mapper::<U>::of_type()?;
        destination.set_rules(self.rules.clone());
        destination.populate(&source, &[])?;
        destination.take().ok_or_else(|| no_target(U::SHAPE))
    }

    /// A deep copy of the target through export-and-populate.
    pub fn clones(&self) -> Result<T> {
        self.copy_to::<T>()
    }

    /// Fills every non-skipped attribute from a fixture source and populates
    /// the target with the result.
    pub fn populate_with(&mut self, fixture: &mut dyn FixtureSource) -> Result<&mut Self> {
        let mut source = Map::new();
        for attribute in &self.attributes {
            if attribute.skipped {
                continue;
            }
            source.insert(
                attribute.name.to_string(),
                fixture.generate(attribute.descriptor()),
            );
        }
        self.populate(&source, &[])
    }

    fn export_tree(&self) -> Result<Value> {
        match &self.target {
            Some(target) => behavior::to_tree(target),
            None => {
                let fresh: T = resolve::from_tree(&Value::Object(Map::new()))?;
                behavior::to_tree(&fresh)
            }
        }
    }

    // the tree a rebuild starts from: skipped attributes are carried through
    // so a write never resets their live values
    fn rebuild_tree(&self) -> Result<Value> {
        match &self.target {
            Some(target) => behavior::to_tree_with_skipped(target),
            None => {
                let fresh: T = resolve::from_tree(&Value::Object(Map::new()))?;
                behavior::to_tree_with_skipped(&fresh)
            }
        }
    }

    fn render_attribute(&self, attribute: &AttributeDescriptor) -> Result<String> {
        let target = self.target.as_ref().ok_or_else(|| no_target(T::SHAPE))?;
        let peek = Peek::new(target);
        let struct_peek = peek.into_struct()?;
        let field_peek = struct_peek.field(attribute.index).map_err(|_| {
            TierErrorKind::InaccessibleAttribute {
                attribute: attribute.name.to_string(),
                shape: T::SHAPE,
            }
        })?;
        behavior::render(field_peek)
    }

    fn is_excluded(&self, shape: &'static Shape) -> bool {
        self.rules
            .excluded_prefixes
            .iter()
            .any(|prefix| shape.type_identifier.starts_with(prefix.as_str()))
    }
}

fn struct_type_of(shape: &'static Shape) -> Result<StructType> {
    match shape.ty {
        Type::User(UserType::Struct(struct_def)) => Ok(struct_def),
        _ => Err(TierErrorKind::UnsupportedShape {
            shape,
            reason: "bean introspection requires a struct".into(),
        }
        .into()),
    }
}

fn no_target(shape: &'static Shape) -> crate::TierError {
    TierErrorKind::UnsupportedShape {
        shape,
        reason: "type-only session holds no target value".into(),
    }
    .into()
}

/// Whether a candidate's category lines up with an attribute's category
/// without any coercion.
fn directly_assignable(attribute: &AttributeDescriptor, raw: &Value) -> bool {
    let target = attribute.category();
    match Category::of_tree(raw) {
        // null clears optional attributes; the converter rejects the rest
        Category::Null => true,
        Category::Primitive => matches!(
            target,
            Category::Primitive
                | Category::BoxedPrimitive
                | Category::BigInteger
                | Category::BigDecimal
        ),
        Category::String => matches!(target, Category::String | Category::Enum),
        Category::Collection => matches!(target, Category::Array | Category::Collection),
        Category::KeyedMapping => matches!(target, Category::KeyedMapping | Category::Bean),
        _ => false,
    }
}

/// A small deterministic fixture source for test population: scalar values
/// follow a counter, containers get two elements, beans recurse per field.
pub struct SequenceFixture {
    counter: u64,
}

impl SequenceFixture {
    /// A fixture source starting at zero.
    pub fn new() -> Self {
        SequenceFixture { counter: 0 }
    }

    fn next(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }
}

impl Default for SequenceFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureSource for SequenceFixture {
    fn generate(&mut self, descriptor: &'static TypeDescriptor) -> Value {
        let shape = descriptor.shape();
        match descriptor.category() {
            Category::Null => Value::Null,
            Category::Primitive => {
                if shape.is_type::<bool>() {
                    Value::Bool(self.next() % 2 == 0)
                } else if shape.is_type::<char>() {
                    Value::String("x".to_string())
                } else if matches!(shape.ty, Type::Primitive(_)) && is_float_shape(shape) {
                    Number::from_f64(self.next() as f64 / 2.0)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                } else {
                    // stays within every integer width
                    Value::from(self.next() % 100)
                }
            }
            Category::BoxedPrimitive => match descriptor.next() {
                Some(inner) => self.generate(inner),
                None => Value::from(self.next() % 100),
            },
            Category::String => Value::String(format!("value-{}", self.next())),
            Category::Date => Value::from(1_400_000_000_000_i64 + self.next() as i64 * 1000),
            Category::BigInteger => Value::from(self.next()),
            Category::BigDecimal => Value::String(format!("{}.5", self.next())),
            Category::Enum => first_variant_name(shape)
                .map(|name| Value::String(name.to_string()))
                .unwrap_or(Value::Null),
            Category::Array => {
                let len = match shape.def {
                    Def::Array(array_def) => array_def.n,
                    _ => 0,
                };
                let items = (0..len)
                    .map(|_| match descriptor.next() {
                        Some(element) => self.generate(element),
                        None => Value::Null,
                    })
                    .collect();
                Value::Array(items)
            }
            Category::Collection => {
                let items = (0..2)
                    .map(|_| match descriptor.next() {
                        Some(element) => self.generate(element),
                        None => Value::Null,
                    })
                    .collect();
                Value::Array(items)
            }
            Category::KeyedMapping => {
                let mut entries = Map::new();
                for _ in 0..2 {
                    let key = match descriptor.next() {
                        Some(key_descriptor) => tree_as_key(self.generate(key_descriptor)),
                        None => self.next().to_string(),
                    };
                    let value = match descriptor.next_pair_type() {
                        Some(value_descriptor) => self.generate(value_descriptor),
                        None => Value::Null,
                    };
                    entries.insert(key, value);
                }
                Value::Object(entries)
            }
            Category::Bean => {
                let mut entries = Map::new();
                if let Type::User(UserType::Struct(struct_def)) = shape.ty {
                    for field in struct_def.fields {
                        if field.attributes.contains(&FieldAttribute::Arbitrary("skip")) {
                            continue;
                        }
                        let descriptor = TypeDescriptor::resolve((field.shape)());
                        entries.insert(field.name.to_string(), self.generate(descriptor));
                    }
                }
                Value::Object(entries)
            }
        }
    }
}

fn is_float_shape(shape: &'static Shape) -> bool {
    matches!(
        shape.ty,
        Type::Primitive(facet_core::PrimitiveType::Numeric(
            facet_core::NumericType::Float
        ))
    )
}

fn first_variant_name(shape: &'static Shape) -> Option<&'static str> {
    let enum_def: EnumType = match shape.ty {
        Type::User(UserType::Enum(enum_def)) => enum_def,
        _ => return None,
    };
    enum_def.variants.first().map(|variant| variant.name)
}

fn tree_as_key(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
