//! Expression synthesis: turns a hint into a check expression plus the
//! closure that evaluates it.
//!
//! The expression text is what the generated wrapper source shows; the
//! closure is what actually runs. Both are built from the same shape
//! dispatch, so they describe one decision tree.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::classify::{classify, children, is_deprecated, is_ignorable, unsupported_within, Shape};
use crate::compile::{FragmentKey, Registry};
use crate::conf::{Conf, SamplePolicy};
use crate::error::{Error, HintWarning, Result};
use crate::hint::{ForwardRef, Hint, ProtocolRef, Validator};
use crate::snip::{
    indent, py_repr, render_locals, shift_locals, ARG_NAME_REGISTRY, CODE_TRUE,
    PITH_PLACEHOLDER, VAR_NAME_RANDOM_INT,
};
use crate::value::{ClassRef, Value, COMPLEX, DICT, FLOAT, INT, NONE_TYPE, TUPLE};

/// A compiled check: `(value, per-call random integer) -> satisfied?`.
///
/// Errors only surface from lazily resolved forward references.
pub type CheckFn = Arc<dyn Fn(&Value, u32) -> Result<bool> + Send + Sync>;

/// Nesting depth past which hints are only checked against their origin class.
pub const MAX_HINT_DEPTH: usize = 32;

/// A synthesized check expression.
#[derive(Clone)]
pub struct Fragment {
    code: String,
    locals: usize,
    needs_random: bool,
    requires: BTreeSet<String>,
    warnings: Vec<HintWarning>,
    check: CheckFn,
}

impl Fragment {
    fn new(code: impl Into<String>, check: CheckFn) -> Self {
        Self {
            code: code.into(),
            locals: 0,
            needs_random: false,
            requires: BTreeSet::new(),
            warnings: Vec::new(),
            check,
        }
    }

    fn always_true() -> Self {
        Self::new(CODE_TRUE, Arc::new(|_, _| Ok(true)))
    }

    /// Expression text with `{pith}` and `{pith_N}` placeholders.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Number of local pith names the expression binds.
    pub fn locals(&self) -> usize {
        self.locals
    }

    /// Whether the expression reads the per-call random integer.
    pub fn needs_random(&self) -> bool {
        self.needs_random
    }

    /// Registry entries the expression looks up by name.
    pub fn requires(&self) -> &BTreeSet<String> {
        &self.requires
    }

    /// Deprecation warnings raised while synthesizing.
    pub fn warnings(&self) -> &[HintWarning] {
        &self.warnings
    }

    /// Whether the expression accepts everything.
    pub fn is_always_true(&self) -> bool {
        self.code == CODE_TRUE
    }

    /// The closure evaluating this expression.
    pub fn check_fn(&self) -> &CheckFn {
        &self.check
    }

    /// Evaluates the check against `value`.
    pub fn check(&self, value: &Value, random: u32) -> Result<bool> {
        (self.check)(value, random)
    }

    /// Expression text for pith expression `pith`, with locals numbered from `offset`.
    pub fn render(&self, pith: &str, offset: usize) -> String {
        render_locals(&self.code, offset).replace(PITH_PLACEHOLDER, pith)
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("code", &self.code)
            .field("locals", &self.locals)
            .field("needs_random", &self.needs_random)
            .field("requires", &self.requires)
            .finish()
    }
}

/// Accumulates child fragments into a parent expression.
struct Composite {
    locals: usize,
    needs_random: bool,
    requires: BTreeSet<String>,
}

impl Composite {
    /// Starts a parent that binds `locals` names of its own (`{pith_0}` ...).
    fn new(locals: usize) -> Self {
        Self { locals, needs_random: false, requires: BTreeSet::new() }
    }

    /// Child text with its locals moved past every name allocated so far and
    /// its pith replaced by `pith`.
    fn embed(&mut self, child: &Fragment, pith: &str) -> String {
        let code = shift_locals(&child.code, self.locals).replace(PITH_PLACEHOLDER, pith);
        self.locals += child.locals;
        self.needs_random |= child.needs_random;
        self.requires.extend(child.requires.iter().cloned());
        code
    }

    fn finish(self, code: String, check: CheckFn) -> Fragment {
        Fragment {
            code,
            locals: self.locals,
            needs_random: self.needs_random,
            requires: self.requires,
            warnings: Vec::new(),
            check,
        }
    }
}

/// Classes an `isinstance` check against `class` accepts under `conf`.
///
/// Non-strict configurations apply the implicit numeric tower.
pub(crate) fn accepted_classes(class: &ClassRef, conf: &Conf) -> Vec<ClassRef> {
    let mut accepted = vec![Arc::clone(class)];
    if !conf.strict {
        if Arc::ptr_eq(class, &*FLOAT) {
            accepted.push(Arc::clone(&*INT));
        } else if Arc::ptr_eq(class, &*COMPLEX) {
            accepted.push(Arc::clone(&*FLOAT));
            accepted.push(Arc::clone(&*INT));
        }
    }
    accepted
}

/// How generated code names `class`. Non-builtins are looked up in the registry.
fn class_name(class: &ClassRef, requires: &mut BTreeSet<String>) -> String {
    if class.module() == "builtins" {
        return class.name().to_string();
    }
    let qualname = class.qualname();
    let name = format!("{}[{}]", ARG_NAME_REGISTRY, py_repr(&qualname));
    requires.insert(qualname);
    name
}

/// Synthesizes check fragments for one configuration.
pub struct Synthesizer {
    conf: Conf,
    registry: Weak<Registry>,
    label: String,
    root: String,
    warnings: Vec<HintWarning>,
}

impl Synthesizer {
    /// Creates a synthesizer caching into `registry`.
    pub fn new(conf: &Conf, registry: &Arc<Registry>) -> Self {
        Self {
            conf: conf.clone(),
            registry: Arc::downgrade(registry),
            label: "hint".to_string(),
            root: String::new(),
            warnings: Vec::new(),
        }
    }

    /// Sets how error positions name the hint being synthesized.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Synthesizes `hint` at indentation `level`, reusing a cached fragment
    /// when one exists for the same hint, checks configuration and level.
    pub fn synthesize(&mut self, hint: &Hint, level: usize) -> Result<Fragment> {
        let key = FragmentKey::new(hint, &self.conf, level);
        let registry = self.registry.upgrade();
        if let Some(fragment) = registry.as_ref().and_then(|registry| registry.fragment(&key, hint)) {
            log::debug!("fragment cache hit for {}", hint);
            return Ok(fragment);
        }
        log::debug!("fragment cache miss for {}", hint);
        let fragment = self.synthesize_at(hint, level, 0)?;
        if let Some(registry) = registry {
            registry.store_fragment(key, hint, fragment.clone());
        }
        Ok(fragment)
    }

    fn synthesize_at(&mut self, hint: &Hint, level: usize, depth: usize) -> Result<Fragment> {
        self.root = hint.to_string();
        self.warnings.clear();
        let mut fragment = self.node(hint, level, depth, &mut Vec::new())?;
        fragment.warnings = std::mem::take(&mut self.warnings);
        Ok(fragment)
    }

    fn unsupported(&self, hint: &Hint, path: &[usize], reason: impl Into<String>) -> Error {
        let indices: String = path.iter().map(|i| format!("[{}]", i)).collect();
        Error::hint_unsupported(
            hint.to_string(),
            format!("{} {}{}", self.label, self.root, indices),
            reason,
        )
    }

    /// Error for an unsupported `hint`, pointing at the nested hint at fault.
    fn unsupported_shape(&self, hint: &Hint, path: &[usize], reason: String) -> Error {
        let mut path = path.to_vec();
        let mut culprit = hint;
        while let Some((i, child)) = children(culprit)
            .into_iter()
            .enumerate()
            .find(|(_, child)| unsupported_within(child).is_some())
        {
            path.push(i);
            culprit = child;
        }
        let reason = match classify(culprit) {
            Shape::Unsupported(reason) => reason,
            Shape::NoReturn => "NoReturn is only valid as the whole return hint".to_string(),
            _ => reason,
        };
        self.unsupported(culprit, &path, reason)
    }

    fn node(
        &mut self,
        hint: &Hint,
        level: usize,
        depth: usize,
        path: &mut Vec<usize>,
    ) -> Result<Fragment> {
        if is_deprecated(hint) && self.conf.warn_on_deprecated_hints {
            self.warnings.push(HintWarning {
                hint: hint.to_string(),
                message: "deprecated typing alias; use the builtin generic instead".to_string(),
            });
        }
        if depth > MAX_HINT_DEPTH {
            return self.shallow(hint, level, path);
        }
        let shape = classify(hint);
        if let Some(fragment) = self.leaf(&shape) {
            return Ok(fragment);
        }
        match shape {
            Shape::Unsupported(reason) => Err(self.unsupported_shape(hint, path, reason)),
            Shape::NoReturn => Err(self.unsupported(
                hint,
                path,
                "NoReturn is only valid as the whole return hint",
            )),
            Shape::Union(members) => {
                let mut children = Vec::with_capacity(members.len());
                for (i, member) in members.iter().enumerate() {
                    path.push(i);
                    let child = self.node(member, level + 1, depth + 1, path);
                    path.pop();
                    children.push(child?);
                }
                Ok(any_of(children, level))
            },
            Shape::Sequence { class, item } => self.sequence(&class, item, level, depth, path),
            Shape::Mapping { key, value } => self.mapping(key, value, level, depth, path),
            Shape::FixedTuple(items) => self.fixed_tuple(items, level, depth, path),
            Shape::ForwardRef(fref) => Ok(self.forward_ref(fref, depth)),
            Shape::Annotated(inner, validators) => {
                self.annotated(inner, validators, level, depth, path)
            },
            _ => Err(Error::internal(format!("no synthesis rule for {}", hint), String::new())),
        }
    }

    /// Fragments for shapes without children.
    fn leaf(&self, shape: &Shape<'_>) -> Option<Fragment> {
        let fragment = match shape {
            Shape::Ignorable => Fragment::always_true(),
            Shape::NoneType => Fragment::new(
                format!("{} is None", PITH_PLACEHOLDER),
                Arc::new(|value, _| Ok(matches!(value, Value::None))),
            ),
            Shape::Class(class) => self.classes_check(std::slice::from_ref(*class)),
            Shape::Union(members) => {
                // A union of plain classes collapses into one isinstance test.
                let classes = members
                    .iter()
                    .map(|member| match member {
                        Hint::Class(class) => Some(Arc::clone(class)),
                        Hint::NoneType => Some(Arc::clone(&*NONE_TYPE)),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                self.classes_check(&classes)
            },
            Shape::SubclassOf(base) => subclass_check(*base),
            Shape::Protocol(protocol) => protocol_check(protocol),
            Shape::Literal(values) => literal_check(values),
            _ => return None,
        };
        Some(fragment)
    }

    fn classes_check(&self, classes: &[ClassRef]) -> Fragment {
        let mut accepted: Vec<ClassRef> = Vec::new();
        for class in classes {
            for class in accepted_classes(class, &self.conf) {
                if !accepted.iter().any(|seen| Arc::ptr_eq(seen, &class)) {
                    accepted.push(class);
                }
            }
        }
        let mut requires = BTreeSet::new();
        let names: Vec<String> =
            accepted.iter().map(|class| class_name(class, &mut requires)).collect();
        let code = match names.as_slice() {
            [name] => format!("isinstance({}, {})", PITH_PLACEHOLDER, name),
            names => format!("isinstance({}, ({}))", PITH_PLACEHOLDER, names.join(", ")),
        };
        let check: CheckFn =
            Arc::new(move |value, _| Ok(accepted.iter().any(|class| value.is_instance(class))));
        Fragment { requires, ..Fragment::new(code, check) }
    }

    /// Code reading sampled items (or entries) of `pith`.
    fn sampler(&self, pith: &str, entries: bool) -> String {
        let method = if entries { "sample_items" } else { "sample" };
        let count = match self.conf.sample {
            SamplePolicy::Full if entries => return format!("{}.items()", pith),
            SamplePolicy::Full => return pith.to_string(),
            SamplePolicy::One => 1,
            SamplePolicy::Count(n) => n,
        };
        format!("{}.{}({}, {}, {})", ARG_NAME_REGISTRY, method, pith, VAR_NAME_RANDOM_INT, count)
    }

    fn sequence(
        &mut self,
        class: &ClassRef,
        item: Option<&Hint>,
        level: usize,
        depth: usize,
        path: &mut Vec<usize>,
    ) -> Result<Fragment> {
        let origin = Arc::clone(class);
        let Some(item) = item else {
            return Ok(self.classes_check(&[origin]));
        };
        path.push(0);
        let child = self.node(item, level + 2, depth + 1, path);
        path.pop();
        let child = child?;

        let mut parts = Composite::new(1);
        let mut requires = BTreeSet::new();
        let name = class_name(class, &mut requires);
        let item_code = parts.embed(&child, "{pith_0}");
        parts.requires.extend(requires);
        parts.needs_random |= self.conf.sample.is_random();
        let code = format!(
            "(\n{i1}isinstance({pith}, {name}) and\n{i1}all(\n{i2}{item}\n{i2}for {local} in \
             {sampler}\n{i1})\n{i0})",
            i0 = indent(level),
            i1 = indent(level + 1),
            i2 = indent(level + 2),
            pith = PITH_PLACEHOLDER,
            name = name,
            item = item_code,
            local = "{pith_0}",
            sampler = self.sampler(PITH_PLACEHOLDER, false),
        );

        let policy = self.conf.sample;
        let item_check = Arc::clone(&child.check);
        let check: CheckFn = Arc::new(move |value, random| {
            if !value.is_instance(&origin) {
                return Ok(false);
            }
            let items = value.items().unwrap_or_default();
            for index in policy.indices(items.len(), random) {
                if !item_check(&items[index], random)? {
                    return Ok(false);
                }
            }
            Ok(true)
        });
        Ok(parts.finish(code, check))
    }

    fn mapping(
        &mut self,
        key: Option<&Hint>,
        value: Option<&Hint>,
        level: usize,
        depth: usize,
        path: &mut Vec<usize>,
    ) -> Result<Fragment> {
        if key.is_none() && value.is_none() {
            return Ok(self.classes_check(&[Arc::clone(&*DICT)]));
        }
        let mut children = [None, None];
        for (i, hint) in [key, value].into_iter().enumerate() {
            if let Some(hint) = hint {
                path.push(i);
                let child = self.node(hint, level + 2, depth + 1, path);
                path.pop();
                children[i] = Some(child?);
            }
        }

        let mut parts = Composite::new(2);
        let mut conditions = Vec::new();
        for (child, local) in children.iter().zip(["{pith_0}", "{pith_1}"]) {
            if let Some(child) = child {
                conditions.push(format!("{}{}", indent(level + 2), parts.embed(child, local)));
            }
        }
        parts.needs_random |= self.conf.sample.is_random();
        let code = format!(
            "(\n{i1}isinstance({pith}, dict) and\n{i1}all(\n{conditions}\n{i2}for {{pith_0}}, \
             {{pith_1}} in {sampler}\n{i1})\n{i0})",
            i0 = indent(level),
            i1 = indent(level + 1),
            i2 = indent(level + 2),
            pith = PITH_PLACEHOLDER,
            conditions = conditions.join(" and\n"),
            sampler = self.sampler(PITH_PLACEHOLDER, true),
        );

        let policy = self.conf.sample;
        let [key_check, value_check] = children.map(|child| child.map(|child| child.check));
        let check: CheckFn = Arc::new(move |pith, random| {
            let Some(entries) = pith.entries() else {
                return Ok(false);
            };
            for index in policy.indices(entries.len(), random) {
                let (key, value) = &entries[index];
                if let Some(check) = &key_check {
                    if !check(key, random)? {
                        return Ok(false);
                    }
                }
                if let Some(check) = &value_check {
                    if !check(value, random)? {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        });
        Ok(parts.finish(code, check))
    }

    fn fixed_tuple(
        &mut self,
        items: &[Hint],
        level: usize,
        depth: usize,
        path: &mut Vec<usize>,
    ) -> Result<Fragment> {
        let mut parts = Composite::new(0);
        let mut conditions = vec![
            format!("{}isinstance({}, tuple)", indent(level + 1), PITH_PLACEHOLDER),
            format!("{}len({}) == {}", indent(level + 1), PITH_PLACEHOLDER, items.len()),
        ];
        let mut checks = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if is_ignorable(item) {
                continue;
            }
            path.push(i);
            let child = self.node(item, level + 1, depth + 1, path);
            path.pop();
            let child = child?;
            let pith = format!("{}[{}]", PITH_PLACEHOLDER, i);
            conditions.push(format!("{}{}", indent(level + 1), parts.embed(&child, &pith)));
            checks.push((i, Arc::clone(&child.check)));
        }
        let code = format!("(\n{}\n{})", conditions.join(" and\n"), indent(level));

        let len = items.len();
        let check: CheckFn = Arc::new(move |value, random| {
            if !value.is_instance(&TUPLE) {
                return Ok(false);
            }
            let items = value.items().unwrap_or_default();
            if items.len() != len {
                return Ok(false);
            }
            for (i, check) in &checks {
                if !check(&items[*i], random)? {
                    return Ok(false);
                }
            }
            Ok(true)
        });
        Ok(parts.finish(code, check))
    }

    fn annotated(
        &mut self,
        inner: &Hint,
        validators: &[Validator],
        level: usize,
        depth: usize,
        path: &mut Vec<usize>,
    ) -> Result<Fragment> {
        path.push(0);
        let child = self.node(inner, level + 1, depth + 1, path);
        path.pop();
        let child = child?;

        let mut parts = Composite::new(0);
        let mut conditions = Vec::new();
        if !child.is_always_true() {
            conditions.push(format!("{}{}", indent(level + 1), parts.embed(&child, PITH_PLACEHOLDER)));
        }
        for validator in validators {
            let entry = format!("Is[{}]", validator.name());
            conditions.push(format!(
                "{}{}[{}]({})",
                indent(level + 1),
                ARG_NAME_REGISTRY,
                py_repr(&entry),
                PITH_PLACEHOLDER
            ));
            parts.requires.insert(entry);
        }
        let code = format!("(\n{}\n{})", conditions.join(" and\n"), indent(level));

        let inner_check = Arc::clone(&child.check);
        let validators = validators.to_vec();
        let check: CheckFn = Arc::new(move |value, random| {
            Ok(inner_check(value, random)? && validators.iter().all(|v| v.validate(value)))
        });
        Ok(parts.finish(code, check))
    }

    /// Check resolving `fref` on first use and memoizing the resolved check.
    fn forward_ref(&self, fref: &ForwardRef, depth: usize) -> Fragment {
        let code = format!(
            "{}.check_forward_ref({}, {}, {})",
            ARG_NAME_REGISTRY,
            py_repr(fref.name()),
            PITH_PLACEHOLDER,
            VAR_NAME_RANDOM_INT
        );
        let fref = fref.clone();
        let conf = self.conf.clone();
        let registry = self.registry.clone();
        let resolved: OnceCell<CheckFn> = OnceCell::new();
        let check: CheckFn = Arc::new(move |value, random| {
            let check = resolved.get_or_try_init(|| {
                let hint = fref.resolve()?;
                let mut synth = Synthesizer {
                    conf: conf.clone(),
                    registry: registry.clone(),
                    label: format!("forward reference '{}' ->", fref.name()),
                    root: String::new(),
                    warnings: Vec::new(),
                };
                synth.synthesize_at(hint, 0, depth + 1).map(|fragment| fragment.check)
            })?;
            check(value, random)
        });
        // The referent is unknown until first call, so assume it samples.
        Fragment { needs_random: true, ..Fragment::new(code, check) }
    }

    /// Origin-only check used past [`MAX_HINT_DEPTH`].
    fn shallow(&mut self, hint: &Hint, level: usize, path: &mut Vec<usize>) -> Result<Fragment> {
        log::debug!("{} nests deeper than {} levels; checking its origin only", hint, MAX_HINT_DEPTH);
        let shape = classify(hint);
        if let Some(fragment) = self.leaf(&shape) {
            return Ok(fragment);
        }
        match shape {
            Shape::Unsupported(reason) => Err(self.unsupported_shape(hint, path, reason)),
            Shape::NoReturn => Err(self.unsupported(
                hint,
                path,
                "NoReturn is only valid as the whole return hint",
            )),
            Shape::Sequence { class, .. } => Ok(self.classes_check(&[class])),
            Shape::Mapping { .. } => Ok(self.classes_check(&[Arc::clone(&*DICT)])),
            Shape::FixedTuple(_) => Ok(self.classes_check(&[Arc::clone(&*TUPLE)])),
            Shape::Annotated(inner, _) => self.shallow(inner, level, path),
            Shape::Union(members) => {
                let mut children = Vec::with_capacity(members.len());
                for member in members {
                    children.push(self.shallow(member, level + 1, path)?);
                }
                Ok(any_of(children, level))
            },
            _ => Ok(Fragment::always_true()),
        }
    }
}

/// Short-circuit OR of `children`, in order.
fn any_of(children: Vec<Fragment>, level: usize) -> Fragment {
    let mut parts = Composite::new(0);
    let mut lines = Vec::with_capacity(children.len());
    let mut checks = Vec::with_capacity(children.len());
    for child in &children {
        lines.push(format!("{}{}", indent(level + 1), parts.embed(child, PITH_PLACEHOLDER)));
        checks.push(Arc::clone(&child.check));
    }
    let code = format!("(\n{}\n{})", lines.join(" or\n"), indent(level));
    let check: CheckFn = Arc::new(move |value, random| {
        for check in &checks {
            if check(value, random)? {
                return Ok(true);
            }
        }
        Ok(false)
    });
    parts.finish(code, check)
}

fn subclass_check(base: Option<&ClassRef>) -> Fragment {
    let Some(base) = base else {
        return Fragment::new(
            format!("isinstance({}, type)", PITH_PLACEHOLDER),
            Arc::new(|value, _| Ok(matches!(value, Value::Type(_)))),
        );
    };
    let mut requires = BTreeSet::new();
    let code = format!(
        "(isinstance({pith}, type) and issubclass({pith}, {name}))",
        pith = PITH_PLACEHOLDER,
        name = class_name(base, &mut requires)
    );
    let base = Arc::clone(base);
    let check: CheckFn = Arc::new(move |value, _| {
        Ok(matches!(value, Value::Type(class) if class.is_subclass_of(&base)))
    });
    Fragment { requires, ..Fragment::new(code, check) }
}

fn protocol_check(protocol: &ProtocolRef) -> Fragment {
    let code = format!(
        "isinstance({}, {}[{}])",
        PITH_PLACEHOLDER,
        ARG_NAME_REGISTRY,
        py_repr(protocol.name())
    );
    let mut requires = BTreeSet::new();
    requires.insert(protocol.name().to_string());
    let protocol = Arc::clone(protocol);
    let check: CheckFn = Arc::new(move |value, _| Ok(protocol.is_satisfied_by(&value.class())));
    Fragment { requires, ..Fragment::new(code, check) }
}

/// Python expression evaluating to `value`. Strings go through [`py_repr`],
/// classes and instances through the registry.
fn literal_expr(value: &Value, requires: &mut BTreeSet<String>) -> String {
    let join = |items: &[Value], requires: &mut BTreeSet<String>| {
        items.iter().map(|item| literal_expr(item, requires)).collect::<Vec<_>>().join(", ")
    };
    match value {
        Value::Str(s) => py_repr(s),
        Value::Bytes(bytes) => {
            let mut out = String::from("b'");
            for &byte in bytes.iter() {
                match byte {
                    0x20..=0x7e if !matches!(byte, b'\'' | b'\\' | b'{' | b'}') => {
                        out.push(char::from(byte))
                    },
                    _ => out.push_str(&format!("\\x{:02x}", byte)),
                }
            }
            out.push('\'');
            out
        },
        Value::Float(x) if x.is_nan() => "float('nan')".to_string(),
        Value::Float(x) if x.is_infinite() && *x < 0.0 => "float('-inf')".to_string(),
        Value::Float(x) if x.is_infinite() => "float('inf')".to_string(),
        Value::List(items) => format!("[{}]", join(items, requires)),
        Value::Tuple(items) if items.len() == 1 => format!("({},)", literal_expr(&items[0], requires)),
        Value::Tuple(items) => format!("({})", join(items, requires)),
        Value::Set(items) if items.is_empty() => "set()".to_string(),
        Value::Set(items) => format!("{{{}}}", join(items, requires)),
        Value::FrozenSet(items) => format!("frozenset({{{}}})", join(items, requires)),
        Value::Dict(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", literal_expr(k, requires), literal_expr(v, requires)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        },
        Value::Type(class) => class_name(class, requires),
        Value::Instance(_) => {
            let repr = value.repr();
            let name = format!("{}[{}]", ARG_NAME_REGISTRY, py_repr(&repr));
            requires.insert(repr);
            name
        },
        other => other.to_string(),
    }
}

fn literal_check(values: &[Value]) -> Fragment {
    let mut requires = BTreeSet::new();
    let terms: Vec<String> = values
        .iter()
        .map(|value| {
            let literal = literal_expr(value, &mut requires);
            format!(
                "({pith} == {literal} and isinstance({pith}, {class}))",
                pith = PITH_PLACEHOLDER,
                literal = literal,
                class = class_name(&value.class(), &mut requires)
            )
        })
        .collect();
    let code = match terms.as_slice() {
        [term] => term.clone(),
        terms => format!("({})", terms.join(" or ")),
    };
    let values = values.to_vec();
    let check: CheckFn = Arc::new(move |pith, _| {
        Ok(values.iter().any(|value| pith.py_eq(value) && pith.is_instance(&value.class())))
    });
    Fragment { requires, ..Fragment::new(code, check) }
}
