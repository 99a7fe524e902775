//! Violation reporting: explains why a value failed its hint.
//!
//! Reporting runs only after a check failed, so it can afford to walk the
//! hint tree again. It visits the same container items the check sampled.

use std::fmt;

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::classify::{classify, Shape};
use crate::conf::Conf;
use crate::error::{Error, Result};
use crate::func::FuncMeta;
use crate::hint::Hint;
use crate::synth::{accepted_classes, MAX_HINT_DEPTH};
use crate::value::{ClassRef, Value, DICT, TUPLE};

/// Display width reprs are truncated to.
pub const MAX_REPR_WIDTH: usize = 72;

/// Whether a parameter or the return value violated its hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    /// A passed parameter.
    Param,
    /// The returned value.
    Return,
}

/// A value implicated in a violation.
#[derive(Debug, Clone, Serialize)]
pub struct Culprit {
    /// Truncated repr.
    pub repr: String,
    /// The value itself.
    #[serde(skip)]
    pub value: Value,
}

impl Culprit {
    fn new(value: &Value) -> Self {
        Self { repr: truncate_repr(&value.repr()), value: value.clone() }
    }
}

/// A call-time type violation.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// Parameter or return.
    pub kind: ViolationKind,
    /// Qualified name of the decorated callable.
    pub func: String,
    /// Parameter name, or `return`.
    pub pith_name: String,
    /// Truncated repr of the offending value.
    pub pith_repr: String,
    /// The violated hint.
    pub hint: String,
    /// Innermost reason the value failed.
    pub cause: String,
    /// The offending value.
    #[serde(skip)]
    pub pith: Value,
    /// The offending value first, then each nested value that failed.
    pub culprits: Vec<Culprit>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::Param => write!(
                f,
                "Function {}() parameter {}={} violates type hint {}, as {}.",
                self.func, self.pith_name, self.pith_repr, self.hint, self.cause
            ),
            ViolationKind::Return => write!(
                f,
                "Function {}() return {} violates type hint {}, as {}.",
                self.func, self.pith_repr, self.hint, self.cause
            ),
        }
    }
}

impl std::error::Error for Violation {}

/// Truncates `repr` to [`MAX_REPR_WIDTH`] display columns at a grapheme boundary.
pub fn truncate_repr(repr: &str) -> String {
    if repr.width() <= MAX_REPR_WIDTH {
        return repr.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for grapheme in repr.graphemes(true) {
        let w = grapheme.width();
        if width + w > MAX_REPR_WIDTH - 3 {
            break;
        }
        out.push_str(grapheme);
        width += w;
    }
    out.push_str("...");
    out
}

/// `str 'x'`: class name then repr.
fn describe(value: &Value) -> String {
    match value {
        Value::None => "None".to_string(),
        value => format!("{} {}", value.class().name(), truncate_repr(&value.repr())),
    }
}

fn class_list(classes: &[ClassRef]) -> String {
    let names: Vec<String> = classes.iter().map(|class| class.qualname()).collect();
    match names.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
        None => String::new(),
    }
}

/// Why a value failed, plus the nested values that failed on the way down.
struct Cause {
    text: String,
    culprits: Vec<Value>,
}

impl Cause {
    fn leaf(text: String) -> Option<Self> {
        Some(Self { text, culprits: Vec::new() })
    }

    fn nested(prefix: String, item: &Value, inner: Cause) -> Self {
        let mut culprits = vec![item.clone()];
        culprits.extend(inner.culprits);
        Self { text: format!("{} {}", prefix, inner.text), culprits }
    }
}

struct CauseFinder<'a> {
    conf: &'a Conf,
    random: u32,
}

impl CauseFinder<'_> {
    /// `None` when `value` satisfies `hint`.
    fn find(&self, hint: &Hint, value: &Value, depth: usize) -> Result<Option<Cause>> {
        let shallow = depth > MAX_HINT_DEPTH;
        let cause = match classify(hint) {
            Shape::Unsupported(reason) => {
                return Err(Error::internal(
                    format!("reporting against unsupported hint {}: {}", hint, reason),
                    String::new(),
                ))
            },
            Shape::Ignorable => None,
            Shape::NoReturn => Cause::leaf(format!("{} returned despite NoReturn", describe(value))),
            Shape::NoneType => match value {
                Value::None => None,
                value => Cause::leaf(format!("{} not None", describe(value))),
            },
            Shape::Class(class) => self.instance(class, value),
            Shape::Union(members) => {
                let mut first = None;
                for member in &members {
                    match self.find(member, value, depth + 1)? {
                        None => return Ok(None),
                        // Prefer the first member whose origin the value matched.
                        Some(cause) if first.is_none() && !cause.culprits.is_empty() => {
                            first = Some(cause)
                        },
                        Some(_) => (),
                    }
                }
                first.or_else(|| {
                    let names: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                    Cause::leaf(format!("{} not {}", describe(value), names.join(", ")))
                })
            },
            Shape::Sequence { class, item } => match self.instance(&class, value) {
                Some(cause) => Some(cause),
                None if shallow => None,
                None => match item {
                    None => None,
                    Some(item) => {
                        let items = value.items().unwrap_or_default();
                        let mut found = None;
                        for index in self.conf.sample.indices(items.len(), self.random) {
                            if let Some(inner) = self.find(item, &items[index], depth + 1)? {
                                found = Some(Cause::nested(
                                    format!("{} index {} item", class.name(), index),
                                    &items[index],
                                    inner,
                                ));
                                break;
                            }
                        }
                        found
                    },
                },
            },
            Shape::Mapping { key, value: value_hint } => match self.instance(&DICT, value) {
                Some(cause) => Some(cause),
                None if shallow => None,
                None => {
                    let entries = value.entries().unwrap_or_default();
                    let mut found = None;
                    for index in self.conf.sample.indices(entries.len(), self.random) {
                        let (k, v) = &entries[index];
                        if let Some(hint) = key {
                            if let Some(inner) = self.find(hint, k, depth + 1)? {
                                found = Some(Cause::nested("dict key".to_string(), k, inner));
                                break;
                            }
                        }
                        if let Some(hint) = value_hint {
                            if let Some(inner) = self.find(hint, v, depth + 1)? {
                                let prefix = format!("dict key {} value", truncate_repr(&k.repr()));
                                found = Some(Cause::nested(prefix, v, inner));
                                break;
                            }
                        }
                    }
                    found
                },
            },
            Shape::FixedTuple(hints) => match self.instance(&TUPLE, value) {
                Some(cause) => Some(cause),
                None if shallow => None,
                None => {
                    let items = value.items().unwrap_or_default();
                    if items.len() != hints.len() {
                        Cause::leaf(format!(
                            "{} length {} != {}",
                            describe(value),
                            items.len(),
                            hints.len()
                        ))
                    } else {
                        let mut found = None;
                        for (index, (hint, item)) in hints.iter().zip(items).enumerate() {
                            if let Some(inner) = self.find(hint, item, depth + 1)? {
                                let prefix = format!("tuple index {} item", index);
                                found = Some(Cause::nested(prefix, item, inner));
                                break;
                            }
                        }
                        found
                    }
                },
            },
            Shape::SubclassOf(base) => match (value, base) {
                (Value::Type(_), None) => None,
                (Value::Type(class), Some(base)) if class.is_subclass_of(base) => None,
                (Value::Type(_), Some(base)) => Cause::leaf(format!(
                    "{} not subclass of {}",
                    describe(value),
                    base.qualname()
                )),
                (value, _) => Cause::leaf(format!("{} not class", describe(value))),
            },
            Shape::Protocol(protocol) => {
                let class = value.class();
                if protocol.is_satisfied_by(&class) {
                    None
                } else {
                    Cause::leaf(format!(
                        "{} not instance of protocol {} (missing {})",
                        describe(value),
                        protocol.name(),
                        protocol.missing_members(&class).join(", ")
                    ))
                }
            },
            Shape::ForwardRef(_) if shallow => None,
            Shape::ForwardRef(fref) => {
                let resolved = fref.resolve()?;
                self.find(resolved, value, depth + 1)?
            },
            Shape::Annotated(inner, _) if shallow => self.find(inner, value, depth)?,
            Shape::Annotated(inner, validators) => match self.find(inner, value, depth + 1)? {
                Some(cause) => Some(cause),
                None => validators.iter().find(|v| !v.validate(value)).and_then(|v| {
                    Cause::leaf(format!("{} violates validator Is[{}]", describe(value), v.name()))
                }),
            },
            Shape::Literal(values) => {
                if values.iter().any(|lit| value.py_eq(lit) && value.is_instance(&lit.class())) {
                    None
                } else {
                    Cause::leaf(format!("{} != any of {}", describe(value), hint))
                }
            },
        };
        Ok(cause)
    }

    fn instance(&self, class: &ClassRef, value: &Value) -> Option<Cause> {
        let accepted = accepted_classes(class, self.conf);
        if accepted.iter().any(|class| value.is_instance(class)) {
            return None;
        }
        Cause::leaf(format!("{} not instance of {}", describe(value), class_list(&accepted)))
    }
}

/// Builds the violation raised when `value` failed `hint`.
///
/// `random` must be the integer the failing check used, so sampled
/// containers are explained by the same items.
pub fn report(
    meta: &FuncMeta,
    conf: &Conf,
    kind: ViolationKind,
    pith_name: &str,
    hint: &Hint,
    value: &Value,
    random: u32,
) -> Result<Violation> {
    let finder = CauseFinder { conf, random };
    let cause = finder.find(hint, value, 0)?.unwrap_or_else(|| Cause {
        text: format!("{} failed a check no cause was found for", describe(value)),
        culprits: Vec::new(),
    });
    let mut culprits = vec![Culprit::new(value)];
    culprits.extend(cause.culprits.iter().map(Culprit::new));
    log::debug!("{}() {} violated {}: {}", meta.qualname, pith_name, hint, cause.text);
    Ok(Violation {
        kind,
        func: meta.qualname.clone(),
        pith_name: pith_name.to_string(),
        pith_repr: truncate_repr(&value.repr()),
        hint: hint.to_string(),
        cause: cause.text,
        pith: value.clone(),
        culprits,
    })
}
