//! Hint classification: reduces a hint to the shape the synthesizer dispatches on.

use crate::hint::{ForwardRef, Hint, Origin, ProtocolRef, Validator};
use crate::value::{ClassRef, Value, OBJECT};

/// What a hint asks the synthesizer to emit.
#[derive(Debug)]
pub enum Shape<'a> {
    /// Nothing can be checked; carries the reason.
    Unsupported(String),
    /// Everything satisfies the hint.
    Ignorable,
    /// `None`
    NoneType,
    /// `isinstance(pith, class)`
    Class(&'a ClassRef),
    /// Two or more distinct members, in declaration order.
    Union(Vec<&'a Hint>),
    /// A homogeneous list, set, frozenset or variadic tuple.
    ///
    /// `item` is `None` when the item hint is ignorable.
    Sequence {
        /// Container class.
        class: ClassRef,
        /// Item hint, if checkable.
        item: Option<&'a Hint>,
    },
    /// A dict; `None` sides are ignorable.
    Mapping {
        /// Key hint, if checkable.
        key: Option<&'a Hint>,
        /// Value hint, if checkable.
        value: Option<&'a Hint>,
    },
    /// A fixed-length tuple.
    FixedTuple(&'a [Hint]),
    /// `type[C]`: a class object subclassing `C`.
    SubclassOf(Option<&'a ClassRef>),
    /// A structural protocol.
    Protocol(&'a ProtocolRef),
    /// A forward reference.
    ForwardRef(&'a ForwardRef),
    /// A hint plus validators.
    Annotated(&'a Hint, &'a [Validator]),
    /// One of several literal values.
    Literal(&'a [Value]),
    /// The callable must never return.
    NoReturn,
}

/// Classifies `hint`.
///
/// Unsupported shapes win over everything, then ignorable ones, then
/// composite shapes with their children in order.
pub fn classify(hint: &Hint) -> Shape<'_> {
    match hint {
        Hint::Opaque(repr) => Shape::Unsupported(format!("{} is not a type hint", repr)),
        Hint::Any => Shape::Ignorable,
        Hint::NoneType => Shape::NoneType,
        Hint::NoReturn => Shape::NoReturn,
        Hint::Class(class) if std::ptr::eq(&**class, &**OBJECT) => Shape::Ignorable,
        Hint::Class(class) => Shape::Class(class),
        Hint::Union(members) => classify_union(members),
        Hint::Generic { origin, args, .. } => classify_generic(*origin, args),
        Hint::Tuple { items, variadic: true, .. } => match items.as_slice() {
            [item] => Shape::Sequence {
                class: std::sync::Arc::clone(&crate::value::TUPLE),
                item: checkable(item),
            },
            _ => Shape::Unsupported("tuple[T, ...] takes exactly one item hint".into()),
        },
        Hint::Tuple { items, .. } => Shape::FixedTuple(items),
        Hint::Protocol(protocol) => Shape::Protocol(protocol),
        Hint::ForwardRef(fref) => Shape::ForwardRef(fref),
        Hint::Annotated(_, validators) if validators.is_empty() => {
            Shape::Unsupported("Annotated requires at least one validator".into())
        },
        Hint::Annotated(inner, validators) => Shape::Annotated(inner, validators),
        Hint::Literal(values) if values.is_empty() => {
            Shape::Unsupported("Literal requires at least one value".into())
        },
        Hint::Literal(values) => Shape::Literal(values),
    }
}

/// Whether `hint` accepts every value.
pub fn is_ignorable(hint: &Hint) -> bool {
    matches!(classify(hint), Shape::Ignorable)
}

/// Whether `hint` uses a deprecated spelling.
pub fn is_deprecated(hint: &Hint) -> bool {
    matches!(hint, Hint::Generic { legacy: true, .. } | Hint::Tuple { legacy: true, .. })
}

/// Direct children of `hint`, in order.
pub fn children(hint: &Hint) -> Vec<&Hint> {
    match hint {
        Hint::Union(members) => members.iter().collect(),
        Hint::Generic { args, .. } => args.iter().collect(),
        Hint::Tuple { items, .. } => items.iter().collect(),
        Hint::Annotated(inner, _) => vec![&**inner],
        _ => Vec::new(),
    }
}

fn checkable(hint: &Hint) -> Option<&Hint> {
    if is_ignorable(hint) {
        None
    } else {
        Some(hint)
    }
}

fn flatten<'a>(members: &'a [Hint], out: &mut Vec<&'a Hint>) {
    for member in members {
        match member {
            Hint::Union(nested) => flatten(nested, out),
            other => {
                if !out.contains(&other) {
                    out.push(other);
                }
            },
        }
    }
}

/// The first reason `hint` or anything nested in it cannot be checked.
pub fn unsupported_within(hint: &Hint) -> Option<String> {
    match classify(hint) {
        Shape::Unsupported(reason) => Some(reason),
        Shape::NoReturn => Some("NoReturn is only valid as the whole return hint".into()),
        _ => children(hint).into_iter().find_map(unsupported_within),
    }
}

fn classify_union(members: &[Hint]) -> Shape<'_> {
    let mut flat = Vec::new();
    flatten(members, &mut flat);
    if let Some(reason) = flat.iter().find_map(|member| unsupported_within(member)) {
        return Shape::Unsupported(reason);
    }
    if flat.iter().any(|member| is_ignorable(member)) {
        return Shape::Ignorable;
    }
    match flat.as_slice() {
        // An empty union has nothing to test against.
        [] => Shape::Ignorable,
        [only] => classify(*only),
        _ => Shape::Union(flat),
    }
}

fn classify_generic(origin: Origin, args: &[Hint]) -> Shape<'_> {
    if !args.is_empty() && args.len() != origin.arity() {
        return Shape::Unsupported(format!(
            "{:?} takes {} type argument(s), got {}",
            origin,
            origin.arity(),
            args.len()
        ));
    }
    match (origin, args) {
        (Origin::Dict, []) => Shape::Mapping { key: None, value: None },
        (Origin::Dict, [key, value]) => {
            Shape::Mapping { key: checkable(key), value: checkable(value) }
        },
        (Origin::Type, []) => Shape::SubclassOf(None),
        (Origin::Type, [arg]) => match arg {
            Hint::Class(class) if std::ptr::eq(&**class, &**OBJECT) => Shape::SubclassOf(None),
            Hint::Class(class) => Shape::SubclassOf(Some(class)),
            Hint::Any => Shape::SubclassOf(None),
            other => Shape::Unsupported(format!("type[{}] must name a class", other)),
        },
        (origin, []) => Shape::Sequence { class: origin.class(), item: None },
        (origin, [item]) => Shape::Sequence { class: origin.class(), item: checkable(item) },
        _ => Shape::Unsupported("malformed generic".into()),
    }
}
