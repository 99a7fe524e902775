//! Dynamically typed runtime values: the objects wrappers type-check.

mod class;

pub use class::{
    Class, ClassBuilder, ClassRef, BOOL, BYTES, COMPLEX, DICT, FLOAT, FROZENSET, INT, LIST,
    NONE_TYPE, OBJECT, SET, STR, TUPLE, TYPE,
};

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// An instance of a user-defined class.
#[derive(Debug)]
pub struct Instance {
    /// Class of this instance.
    pub class: ClassRef,
    /// Instance attributes, in assignment order.
    pub attrs: IndexMap<String, Value>,
}

/// A runtime value.
///
/// Containers and instances are reference counted, so cloning a value never
/// copies its contents and [`Value::is_same`] can test identity.
#[derive(Debug, Clone)]
pub enum Value {
    /// `None`
    None,
    /// `bool`
    Bool(bool),
    /// `int`
    Int(i64),
    /// `float`
    Float(f64),
    /// `complex`
    Complex(f64, f64),
    /// `str`
    Str(Arc<str>),
    /// `bytes`
    Bytes(Arc<[u8]>),
    /// `list`
    List(Arc<Vec<Value>>),
    /// `tuple`
    Tuple(Arc<Vec<Value>>),
    /// `set`
    Set(Arc<Vec<Value>>),
    /// `frozenset`
    FrozenSet(Arc<Vec<Value>>),
    /// `dict`, insertion ordered.
    Dict(Arc<Vec<(Value, Value)>>),
    /// A class object.
    Type(ClassRef),
    /// An instance of a user-defined class.
    Instance(Arc<Instance>),
}

impl Value {
    /// Builds a `str`.
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    /// Builds a `list`.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Arc::new(items.into_iter().collect()))
    }

    /// Builds a `tuple`.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(Arc::new(items.into_iter().collect()))
    }

    /// Builds a `set`, dropping duplicate items.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Set(Arc::new(dedup(items)))
    }

    /// Builds a `frozenset`, dropping duplicate items.
    pub fn frozenset(items: impl IntoIterator<Item = Value>) -> Self {
        Self::FrozenSet(Arc::new(dedup(items)))
    }

    /// Builds a `dict`; later duplicate keys overwrite earlier ones.
    pub fn dict(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (k, v) in entries {
            match out.iter_mut().find(|(existing, _)| *existing == k) {
                Some(slot) => slot.1 = v,
                None => out.push((k, v)),
            }
        }
        Self::Dict(Arc::new(out))
    }

    /// Builds an instance of `class` with no attributes.
    pub fn instance(class: &ClassRef) -> Self {
        Self::Instance(Arc::new(Instance { class: Arc::clone(class), attrs: IndexMap::new() }))
    }

    /// The class of this value, i.e. `type(value)`.
    pub fn class(&self) -> ClassRef {
        let class: &ClassRef = match self {
            Value::None => &*NONE_TYPE,
            Value::Bool(_) => &*BOOL,
            Value::Int(_) => &*INT,
            Value::Float(_) => &*FLOAT,
            Value::Complex(..) => &*COMPLEX,
            Value::Str(_) => &*STR,
            Value::Bytes(_) => &*BYTES,
            Value::List(_) => &*LIST,
            Value::Tuple(_) => &*TUPLE,
            Value::Set(_) => &*SET,
            Value::FrozenSet(_) => &*FROZENSET,
            Value::Dict(_) => &*DICT,
            Value::Type(_) => &*TYPE,
            Value::Instance(inst) => &inst.class,
        };
        Arc::clone(class)
    }

    /// `isinstance(value, class)`.
    pub fn is_instance(&self, class: &Class) -> bool {
        self.class().is_subclass_of(class)
    }

    /// Object identity. Scalars compare by value, everything else by pointer.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b),
            (Value::Bytes(a), Value::Bytes(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b))
            | (Value::Tuple(a), Value::Tuple(b))
            | (Value::Set(a), Value::Set(b))
            | (Value::FrozenSet(a), Value::FrozenSet(b)) => Arc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Arc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => Arc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }

    /// Python `==`: `bool`, `int` and `float` compare by numeric value.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), _) => Value::Int(i64::from(*a)).py_eq(other),
            (_, Value::Bool(b)) => self.py_eq(&Value::Int(i64::from(*b))),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (a, b) => a == b,
        }
    }

    /// Number of items for sized containers, `None` otherwise.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(items)
            | Value::Tuple(items)
            | Value::Set(items)
            | Value::FrozenSet(items) => Some(items.len()),
            Value::Dict(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Item slice of a list, tuple, set or frozenset.
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items)
            | Value::Tuple(items)
            | Value::Set(items)
            | Value::FrozenSet(items) => Some(items),
            _ => None,
        }
    }

    /// Entry slice of a dict.
    pub fn entries(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Python-style `repr()`.
    pub fn repr(&self) -> String {
        self.to_string()
    }
}

/// Python `repr()` of a string. Single quotes unless the text has a `'` and no `"`.
pub(crate) fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        push_escaped(&mut out, c, quote);
    }
    out.push(quote);
    out
}

/// Appends `c` as it appears inside a `quote`-delimited Python string literal.
pub(crate) fn push_escaped(out: &mut String, c: char, quote: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        },
        c if c.is_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
        c => out.push(c),
    }
}

fn dedup(items: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Complex(ar, ai), Value::Complex(br, bi)) => ar == br && ai == bi,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) | (Value::FrozenSet(a), Value::FrozenSet(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            },
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(bk, bv)| k == bk && v == bv))
            },
            (Value::Type(a), Value::Type(b)) => Arc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Complex(re, im) => write!(f, "({}{:+}j)", re, im),
            Value::Str(s) => f.write_str(&str_repr(s)),
            Value::Bytes(b) => {
                f.write_str("b'")?;
                for byte in b.iter() {
                    match byte {
                        0x20..=0x7e if *byte != b'\'' && *byte != b'\\' => {
                            write!(f, "{}", *byte as char)?
                        },
                        _ => write!(f, "\\x{:02x}", byte)?,
                    }
                }
                f.write_str("'")
            },
            Value::List(items) => write_seq(f, "[", items, "]"),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Value::Tuple(items) => write_seq(f, "(", items, ")"),
            Value::Set(items) if items.is_empty() => f.write_str("set()"),
            Value::Set(items) => write_seq(f, "{", items, "}"),
            Value::FrozenSet(items) => write_seq(f, "frozenset({", items, "})"),
            Value::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            },
            Value::Type(class) => write!(f, "<class '{}'>", class.qualname()),
            Value::Instance(inst) => write!(f, "<{} object>", inst.class.qualname()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::dict(map.into_iter().map(|(k, v)| (Value::from(k), Value::from(v))))
            },
        }
    }
}
