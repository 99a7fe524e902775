//! Structural protocols, with a per-protocol memo of which classes satisfy them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::value::ClassRef;

/// Shared handle to a protocol. Identity is pointer identity.
pub type ProtocolRef = Arc<Protocol>;

/// A runtime-checkable protocol: a class satisfies it when it exposes every
/// required member.
pub struct Protocol {
    name: String,
    members: Vec<String>,
    // Keyed by class address; the `ClassRef` keeps that address from being reused.
    verdicts: Mutex<HashMap<usize, (ClassRef, bool)>>,
}

impl Protocol {
    /// Defines a protocol requiring `members`.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> ProtocolRef
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
            verdicts: Mutex::new(HashMap::new()),
        })
    }

    /// Protocol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required member names.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Whether instances of `class` satisfy this protocol.
    pub fn is_satisfied_by(&self, class: &ClassRef) -> bool {
        let key = Arc::as_ptr(class) as usize;
        if let Some((_, verdict)) = self.verdicts.lock().get(&key) {
            return *verdict;
        }
        let verdict = self.missing_members(class).is_empty();
        self.verdicts.lock().insert(key, (Arc::clone(class), verdict));
        verdict
    }

    /// Required members `class` does not expose.
    pub fn missing_members(&self, class: &ClassRef) -> Vec<&str> {
        self.members
            .iter()
            .filter(|member| !class.has_member(member))
            .map(String::as_str)
            .collect()
    }

    /// Number of classes with a memoized verdict.
    pub fn cached_verdicts(&self) -> usize {
        self.verdicts.lock().len()
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.name)
            .field("members", &self.members)
            .finish()
    }
}

/// `SupportsInt`
pub static SUPPORTS_INT: Lazy<ProtocolRef> =
    Lazy::new(|| Protocol::new("SupportsInt", ["__int__"]));
/// `SupportsFloat`
pub static SUPPORTS_FLOAT: Lazy<ProtocolRef> =
    Lazy::new(|| Protocol::new("SupportsFloat", ["__float__"]));
/// `SupportsComplex`
pub static SUPPORTS_COMPLEX: Lazy<ProtocolRef> =
    Lazy::new(|| Protocol::new("SupportsComplex", ["__complex__"]));
/// `SupportsBytes`
pub static SUPPORTS_BYTES: Lazy<ProtocolRef> =
    Lazy::new(|| Protocol::new("SupportsBytes", ["__bytes__"]));
/// `SupportsAbs`
pub static SUPPORTS_ABS: Lazy<ProtocolRef> =
    Lazy::new(|| Protocol::new("SupportsAbs", ["__abs__"]));
/// `SupportsIndex`
pub static SUPPORTS_INDEX: Lazy<ProtocolRef> =
    Lazy::new(|| Protocol::new("SupportsIndex", ["__index__"]));
/// `SupportsRound`
pub static SUPPORTS_ROUND: Lazy<ProtocolRef> =
    Lazy::new(|| Protocol::new("SupportsRound", ["__round__"]));
/// `Sized`
pub static SIZED: Lazy<ProtocolRef> = Lazy::new(|| Protocol::new("Sized", ["__len__"]));
/// `Iterable`
pub static ITERABLE: Lazy<ProtocolRef> = Lazy::new(|| Protocol::new("Iterable", ["__iter__"]));

/// Looks up a builtin protocol by its `typing` name.
pub fn builtin_protocol(name: &str) -> Option<ProtocolRef> {
    let protocol: &ProtocolRef = match name {
        "SupportsInt" => &*SUPPORTS_INT,
        "SupportsFloat" => &*SUPPORTS_FLOAT,
        "SupportsComplex" => &*SUPPORTS_COMPLEX,
        "SupportsBytes" => &*SUPPORTS_BYTES,
        "SupportsAbs" => &*SUPPORTS_ABS,
        "SupportsIndex" => &*SUPPORTS_INDEX,
        "SupportsRound" => &*SUPPORTS_ROUND,
        "Sized" => &*SIZED,
        "Iterable" => &*ITERABLE,
        _ => return None,
    };
    Some(Arc::clone(protocol))
}
