//! Type hint trees: the annotations wrappers are synthesized from.

mod parse;
mod protocol;

pub use parse::{parse_hint, HintParser};
pub use protocol::{
    builtin_protocol, Protocol, ProtocolRef, ITERABLE, SIZED, SUPPORTS_ABS, SUPPORTS_BYTES,
    SUPPORTS_COMPLEX, SUPPORTS_FLOAT, SUPPORTS_INDEX, SUPPORTS_INT, SUPPORTS_ROUND,
};

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::value::{ClassRef, Value, DICT, FROZENSET, LIST, SET, TYPE};

/// Container origin of a subscripted generic hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// `list[T]`
    List,
    /// `set[T]`
    Set,
    /// `frozenset[T]`
    FrozenSet,
    /// `dict[K, V]`
    Dict,
    /// `type[C]`
    Type,
}

impl Origin {
    /// The runtime class values of this origin are instances of.
    pub fn class(self) -> ClassRef {
        let class: &ClassRef = match self {
            Origin::List => &*LIST,
            Origin::Set => &*SET,
            Origin::FrozenSet => &*FROZENSET,
            Origin::Dict => &*DICT,
            Origin::Type => &*TYPE,
        };
        Arc::clone(class)
    }

    /// Number of type arguments this origin takes when subscripted.
    pub fn arity(self) -> usize {
        match self {
            Origin::Dict => 2,
            _ => 1,
        }
    }

    fn modern_name(self) -> &'static str {
        match self {
            Origin::List => "list",
            Origin::Set => "set",
            Origin::FrozenSet => "frozenset",
            Origin::Dict => "dict",
            Origin::Type => "type",
        }
    }

    fn legacy_name(self) -> &'static str {
        match self {
            Origin::List => "List",
            Origin::Set => "Set",
            Origin::FrozenSet => "FrozenSet",
            Origin::Dict => "Dict",
            Origin::Type => "Type",
        }
    }
}

/// A named predicate attached to an `Annotated` hint.
#[derive(Clone)]
pub struct Validator {
    name: Arc<str>,
    predicate: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Validator {
    /// Creates a validator; `name` is how it renders in hints and messages.
    pub fn new<F>(name: impl AsRef<str>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self { name: Arc::from(name.as_ref()), predicate: Arc::new(predicate) }
    }

    /// Validator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the predicate.
    pub fn validate(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.predicate) as *const () as usize
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Is[{}]", self.name)
    }
}

/// A module namespace forward references resolve against.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    entries: RwLock<HashMap<String, Hint>>,
    lookups: AtomicUsize,
}

impl Namespace {
    /// Creates an empty namespace.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        })
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds `name` to `hint`, replacing any previous binding.
    pub fn define(&self, name: impl Into<String>, hint: Hint) {
        self.entries.write().insert(name.into(), hint);
    }

    /// Binds a class under its own name.
    pub fn define_class(&self, class: &ClassRef) {
        self.define(class.name(), Hint::Class(Arc::clone(class)));
    }

    /// Looks up `name`.
    pub fn lookup(&self, name: &str) -> Option<Hint> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.entries.read().get(name).cloned()
    }

    /// Number of lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

/// A by-name reference to a hint not yet defined at decoration time.
///
/// Resolution happens once; every clone of the reference shares the result.
#[derive(Debug, Clone)]
pub struct ForwardRef {
    inner: Arc<ForwardRefInner>,
}

#[derive(Debug)]
struct ForwardRefInner {
    name: String,
    namespace: Arc<Namespace>,
    resolved: OnceCell<Hint>,
}

impl ForwardRef {
    /// Creates a reference to `name` in `namespace`.
    pub fn new(name: impl Into<String>, namespace: &Arc<Namespace>) -> Self {
        Self {
            inner: Arc::new(ForwardRefInner {
                name: name.into(),
                namespace: Arc::clone(namespace),
                resolved: OnceCell::new(),
            }),
        }
    }

    /// Referenced name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Namespace the name is resolved against.
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.inner.namespace
    }

    /// Whether resolution already happened.
    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.get().is_some()
    }

    /// Resolves the referent, memoizing the first success.
    pub fn resolve(&self) -> Result<&Hint> {
        self.inner.resolved.get_or_try_init(|| {
            log::trace!(
                "resolving forward reference {:?} in {:?}",
                self.inner.name,
                self.inner.namespace.name()
            );
            self.inner.namespace.lookup(&self.inner.name).ok_or_else(|| {
                Error::ForwardRefUnresolved {
                    name: self.inner.name.clone(),
                    module: self.inner.namespace.name().to_string(),
                }
            })
        })
    }
}

/// A type hint.
#[derive(Debug, Clone)]
pub enum Hint {
    /// `Any`: accepts everything.
    Any,
    /// `None`
    NoneType,
    /// A plain class.
    Class(ClassRef),
    /// `Union[A, B, ...]`; `Optional[A]` is `Union[A, None]`.
    Union(Vec<Hint>),
    /// A subscripted container such as `list[int]`.
    ///
    /// `legacy` marks the deprecated `typing` spelling (`List[int]`).
    Generic {
        /// Container origin.
        origin: Origin,
        /// Type arguments; empty for the bare origin.
        args: Vec<Hint>,
        /// Spelled through the `typing` aliases.
        legacy: bool,
    },
    /// `tuple[A, B]`, `tuple[A, ...]` or `tuple[()]`.
    Tuple {
        /// Item hints; exactly one when `variadic`.
        items: Vec<Hint>,
        /// `tuple[A, ...]`
        variadic: bool,
        /// Spelled through the `typing` aliases.
        legacy: bool,
    },
    /// A structural protocol.
    Protocol(ProtocolRef),
    /// A hint named by string, resolved lazily.
    ForwardRef(ForwardRef),
    /// `Annotated[H, Is[...], ...]`
    Annotated(Box<Hint>, Vec<Validator>),
    /// `Literal[a, b, ...]`
    Literal(Vec<Value>),
    /// `NoReturn`, only meaningful as a return hint.
    NoReturn,
    /// An annotation object nothing knows how to check.
    Opaque(String),
}

impl Hint {
    /// Hint for a plain class.
    pub fn of(class: &ClassRef) -> Self {
        Hint::Class(Arc::clone(class))
    }

    /// `list[item]`
    pub fn list(item: Hint) -> Self {
        Hint::Generic { origin: Origin::List, args: vec![item], legacy: false }
    }

    /// `set[item]`
    pub fn set(item: Hint) -> Self {
        Hint::Generic { origin: Origin::Set, args: vec![item], legacy: false }
    }

    /// `frozenset[item]`
    pub fn frozenset(item: Hint) -> Self {
        Hint::Generic { origin: Origin::FrozenSet, args: vec![item], legacy: false }
    }

    /// `dict[key, value]`
    pub fn dict(key: Hint, value: Hint) -> Self {
        Hint::Generic { origin: Origin::Dict, args: vec![key, value], legacy: false }
    }

    /// `type[class]`
    pub fn type_of(class: Hint) -> Self {
        Hint::Generic { origin: Origin::Type, args: vec![class], legacy: false }
    }

    /// `tuple[items...]`
    pub fn tuple(items: impl IntoIterator<Item = Hint>) -> Self {
        Hint::Tuple { items: items.into_iter().collect(), variadic: false, legacy: false }
    }

    /// `tuple[item, ...]`
    pub fn tuple_of(item: Hint) -> Self {
        Hint::Tuple { items: vec![item], variadic: true, legacy: false }
    }

    /// `Union[members...]`
    pub fn union(members: impl IntoIterator<Item = Hint>) -> Self {
        Hint::Union(members.into_iter().collect())
    }

    /// `Optional[hint]`
    pub fn optional(hint: Hint) -> Self {
        Hint::Union(vec![hint, Hint::NoneType])
    }

    /// `Annotated[hint, validators...]`
    pub fn annotated(hint: Hint, validators: impl IntoIterator<Item = Validator>) -> Self {
        Hint::Annotated(Box::new(hint), validators.into_iter().collect())
    }

    /// `Literal[values...]`
    pub fn literal(values: impl IntoIterator<Item = Value>) -> Self {
        Hint::Literal(values.into_iter().collect())
    }

    /// A forward reference to `name` in `namespace`.
    pub fn forward(name: impl Into<String>, namespace: &Arc<Namespace>) -> Self {
        Hint::ForwardRef(ForwardRef::new(name, namespace))
    }

    /// Switches a generic or tuple hint to its deprecated `typing` spelling.
    pub fn legacy(self) -> Self {
        match self {
            Hint::Generic { origin, args, .. } => Hint::Generic { origin, args, legacy: true },
            Hint::Tuple { items, variadic, .. } => Hint::Tuple { items, variadic, legacy: true },
            other => other,
        }
    }

    /// Structural hash; classes, protocols and validators hash by identity.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    Arc::as_ptr(&value.class()).hash(state);
    value.repr().hash(state);
}

impl Hash for Hint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Hint::Class(class) => Arc::as_ptr(class).hash(state),
            Hint::Union(members) => members.hash(state),
            Hint::Generic { origin, args, legacy } => {
                origin.hash(state);
                args.hash(state);
                legacy.hash(state);
            },
            Hint::Tuple { items, variadic, legacy } => {
                items.hash(state);
                variadic.hash(state);
                legacy.hash(state);
            },
            Hint::Protocol(protocol) => Arc::as_ptr(protocol).hash(state),
            Hint::ForwardRef(fref) => {
                fref.name().hash(state);
                Arc::as_ptr(fref.namespace()).hash(state);
            },
            Hint::Annotated(inner, validators) => {
                inner.hash(state);
                for validator in validators {
                    validator.identity().hash(state);
                }
            },
            Hint::Literal(values) => {
                for value in values {
                    hash_value(value, state);
                }
            },
            Hint::Opaque(repr) => repr.hash(state),
            Hint::Any | Hint::NoneType | Hint::NoReturn => (),
        }
    }
}

impl PartialEq for Hint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Hint::Any, Hint::Any)
            | (Hint::NoneType, Hint::NoneType)
            | (Hint::NoReturn, Hint::NoReturn) => true,
            (Hint::Class(a), Hint::Class(b)) => Arc::ptr_eq(a, b),
            (Hint::Union(a), Hint::Union(b)) => a == b,
            (
                Hint::Generic { origin: ao, args: aa, legacy: al },
                Hint::Generic { origin: bo, args: ba, legacy: bl },
            ) => ao == bo && aa == ba && al == bl,
            (
                Hint::Tuple { items: ai, variadic: av, legacy: al },
                Hint::Tuple { items: bi, variadic: bv, legacy: bl },
            ) => ai == bi && av == bv && al == bl,
            (Hint::Protocol(a), Hint::Protocol(b)) => Arc::ptr_eq(a, b),
            (Hint::ForwardRef(a), Hint::ForwardRef(b)) => {
                a.name() == b.name() && Arc::ptr_eq(a.namespace(), b.namespace())
            },
            (Hint::Annotated(ah, av), Hint::Annotated(bh, bv)) => {
                ah == bh
                    && av.len() == bv.len()
                    && av.iter().zip(bv).all(|(a, b)| a.identity() == b.identity())
            },
            (Hint::Literal(a), Hint::Literal(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x == y && Arc::ptr_eq(&x.class(), &y.class()))
            },
            (Hint::Opaque(a), Hint::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Hint {}

fn join(f: &mut fmt::Formatter<'_>, hints: &[Hint]) -> fmt::Result {
    for (i, hint) in hints.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", hint)?;
    }
    Ok(())
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::Any => f.write_str("Any"),
            Hint::NoneType => f.write_str("None"),
            Hint::Class(class) => write!(f, "{}", class.qualname()),
            Hint::Union(members) => {
                f.write_str("Union[")?;
                join(f, members)?;
                f.write_str("]")
            },
            Hint::Generic { origin, args, legacy } => {
                let name = if *legacy { origin.legacy_name() } else { origin.modern_name() };
                if args.is_empty() {
                    return f.write_str(name);
                }
                write!(f, "{}[", name)?;
                join(f, args)?;
                f.write_str("]")
            },
            Hint::Tuple { items, variadic, legacy } => {
                f.write_str(if *legacy { "Tuple[" } else { "tuple[" })?;
                if items.is_empty() {
                    f.write_str("()")?;
                } else {
                    join(f, items)?;
                }
                if *variadic {
                    f.write_str(", ...")?;
                }
                f.write_str("]")
            },
            Hint::Protocol(protocol) => f.write_str(protocol.name()),
            Hint::ForwardRef(fref) => write!(f, "'{}'", fref.name()),
            Hint::Annotated(inner, validators) => {
                write!(f, "Annotated[{}", inner)?;
                for validator in validators {
                    write!(f, ", Is[{}]", validator.name())?;
                }
                f.write_str("]")
            },
            Hint::Literal(values) => {
                f.write_str("Literal[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("]")
            },
            Hint::NoReturn => f.write_str("NoReturn"),
            Hint::Opaque(repr) => write!(f, "<opaque {}>", repr),
        }
    }
}
