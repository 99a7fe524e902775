//! Runtime classes and the builtin class singletons.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Shared handle to a runtime class. Identity is pointer identity.
pub type ClassRef = Arc<Class>;

/// A runtime class: name, bases and the member names its instances expose.
#[derive(Debug)]
pub struct Class {
    name: String,
    module: String,
    bases: Vec<ClassRef>,
    members: BTreeSet<String>,
}

impl Class {
    /// Creates a class deriving directly from `object`.
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            class: Class {
                name: name.into(),
                module: module.into(),
                bases: Vec::new(),
                members: BTreeSet::new(),
            },
        }
    }

    /// Unqualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the defining module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Direct base classes.
    pub fn bases(&self) -> &[ClassRef] {
        &self.bases
    }

    /// Whether `self` is `other` or inherits from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        if std::ptr::eq(self, other) || std::ptr::eq(other, &**OBJECT) {
            return true;
        }
        self.bases.iter().any(|base| base.is_subclass_of(other))
    }

    /// Whether instances expose `member`, directly or through a base.
    pub fn has_member(&self, member: &str) -> bool {
        self.members.contains(member) || self.bases.iter().any(|base| base.has_member(member))
    }

    /// Builtins render bare, everything else as `module.Name`.
    pub fn qualname(&self) -> String {
        if self.module == "builtins" {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualname())
    }
}

/// Builder returned by [`Class::new`].
pub struct ClassBuilder {
    class: Class,
}

impl ClassBuilder {
    /// Adds a base class.
    pub fn base(mut self, base: &ClassRef) -> Self {
        self.class.bases.push(Arc::clone(base));
        self
    }

    /// Adds a member (method or attribute) name.
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.class.members.insert(name.into());
        self
    }

    /// Adds several member names.
    pub fn members<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class.members.extend(names.into_iter().map(Into::into));
        self
    }

    /// Finishes the class.
    pub fn build(self) -> ClassRef {
        Arc::new(self.class)
    }
}

fn builtin(name: &str, members: &[&str]) -> ClassRef {
    Class::new(name, "builtins").members(members.iter().copied()).build()
}

const NUMBER_MEMBERS: &[&str] = &["__abs__", "__float__", "__int__", "__round__"];

/// `object`
pub static OBJECT: Lazy<ClassRef> = Lazy::new(|| builtin("object", &["__repr__", "__hash__"]));
/// `NoneType`
pub static NONE_TYPE: Lazy<ClassRef> = Lazy::new(|| builtin("NoneType", &[]));
/// `int`
pub static INT: Lazy<ClassRef> = Lazy::new(|| {
    Class::new("int", "builtins")
        .members(NUMBER_MEMBERS.iter().copied())
        .member("__index__")
        .build()
});
/// `bool`, a subclass of `int`.
pub static BOOL: Lazy<ClassRef> = Lazy::new(|| Class::new("bool", "builtins").base(&INT).build());
/// `float`
pub static FLOAT: Lazy<ClassRef> = Lazy::new(|| builtin("float", NUMBER_MEMBERS));
/// `complex`
pub static COMPLEX: Lazy<ClassRef> =
    Lazy::new(|| builtin("complex", &["__abs__", "__complex__"]));
/// `str`
pub static STR: Lazy<ClassRef> =
    Lazy::new(|| builtin("str", &["__len__", "__iter__", "__contains__", "__getitem__"]));
/// `bytes`
pub static BYTES: Lazy<ClassRef> = Lazy::new(|| {
    builtin("bytes", &["__len__", "__iter__", "__contains__", "__getitem__", "__bytes__"])
});
/// `list`
pub static LIST: Lazy<ClassRef> =
    Lazy::new(|| builtin("list", &["__len__", "__iter__", "__contains__", "__getitem__"]));
/// `tuple`
pub static TUPLE: Lazy<ClassRef> =
    Lazy::new(|| builtin("tuple", &["__len__", "__iter__", "__contains__", "__getitem__"]));
/// `dict`
pub static DICT: Lazy<ClassRef> =
    Lazy::new(|| builtin("dict", &["__len__", "__iter__", "__contains__", "__getitem__"]));
/// `set`
pub static SET: Lazy<ClassRef> =
    Lazy::new(|| builtin("set", &["__len__", "__iter__", "__contains__"]));
/// `frozenset`
pub static FROZENSET: Lazy<ClassRef> =
    Lazy::new(|| builtin("frozenset", &["__len__", "__iter__", "__contains__", "__hash__"]));
/// `type`
pub static TYPE: Lazy<ClassRef> = Lazy::new(|| builtin("type", &["__call__"]));
