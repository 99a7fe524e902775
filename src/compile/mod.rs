//! Compilation and memoization: validates assembled wrappers, binds them
//! into callables, and caches both whole wrappers and per-hint fragments.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::assemble::{AssembledWrapper, ParamCheck, ReturnCheck, WrapperPlan};
use crate::conf::Conf;
use crate::error::{Error, Result};
use crate::func::{Args, Body, Function, ParamKind, WrapperInfo};
use crate::hint::Hint;
use crate::report::{report, ViolationKind};
use crate::snip::{ARG_NAME_REGISTRY, PITH_PLACEHOLDER, PITH_ROOT_NAME_PLACEHOLDER};
use crate::synth::Fragment;
use crate::value::Value;

/// Key of the fragment cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    hint: u64,
    conf: u64,
    level: usize,
}

impl FragmentKey {
    /// Key for `hint` synthesized under `conf` at indentation `level`.
    pub fn new(hint: &Hint, conf: &Conf, level: usize) -> Self {
        Self { hint: hint.fingerprint(), conf: conf.check_fingerprint(), level }
    }
}

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::default()));

/// Caches of compiled wrappers and synthesized fragments.
///
/// Entries are never evicted. Concurrent misses both compute; the last
/// store wins.
#[derive(Default)]
pub struct Registry {
    wrappers: Mutex<HashMap<u64, Function>>,
    // The hint is kept so fingerprint collisions miss instead of aliasing.
    fragments: Mutex<HashMap<FragmentKey, (Hint, Fragment)>>,
}

impl Registry {
    /// A fresh, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Cached fragment for `hint` under `key`.
    pub fn fragment(&self, key: &FragmentKey, hint: &Hint) -> Option<Fragment> {
        self.fragments
            .lock()
            .get(key)
            .filter(|(cached, _)| cached == hint)
            .map(|(_, fragment)| fragment.clone())
    }

    /// Caches a fragment.
    pub fn store_fragment(&self, key: FragmentKey, hint: &Hint, fragment: Fragment) {
        self.fragments.lock().insert(key, (hint.clone(), fragment));
    }

    /// Cached wrapper under `key`.
    pub fn wrapper(&self, key: u64) -> Option<Function> {
        self.wrappers.lock().get(&key).cloned()
    }

    /// Caches a wrapper.
    pub fn store_wrapper(&self, key: u64, wrapper: Function) {
        self.wrappers.lock().insert(key, wrapper);
    }

    /// Number of cached fragments.
    pub fn fragment_count(&self) -> usize {
        self.fragments.lock().len()
    }

    /// Number of cached wrappers.
    pub fn wrapper_count(&self) -> usize {
        self.wrappers.lock().len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("wrappers", &self.wrapper_count())
            .field("fragments", &self.fragment_count())
            .finish()
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Names looked up as `__hc_registry['name']` in `source`.
fn registry_lookups(source: &str) -> Vec<String> {
    let marker = format!("{}['", ARG_NAME_REGISTRY);
    let mut names = Vec::new();
    for (at, _) in source.match_indices(&marker) {
        let mut name = String::new();
        let mut chars = source[at + marker.len()..].chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('n') => name.push('\n'),
                    Some('r') => name.push('\r'),
                    Some('t') => name.push('\t'),
                    Some('x') => {
                        let hex: String = chars.by_ref().take(2).collect();
                        name.extend(u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32));
                    },
                    Some(other) => name.push(other),
                    None => break,
                },
                '\'' => break,
                c => name.push(c),
            }
        }
        names.push(name);
    }
    names
}

/// Checks generated source for leftover placeholders, blocks without a
/// body, checks without a raise, and unbound registry names.
pub fn verify(source: &str, requires: &BTreeSet<String>) -> Result<()> {
    for placeholder in [
        PITH_PLACEHOLDER,
        "{pith_",
        PITH_ROOT_NAME_PLACEHOLDER,
        "{arg_index}",
        "{arg_name}",
        "{func_name}",
        "{random_int_if_any}",
    ] {
        if source.contains(placeholder) {
            return Err(Error::internal(
                format!("unsubstituted placeholder {:?}", placeholder),
                source,
            ));
        }
    }

    let lines: Vec<&str> = source
        .lines()
        .filter(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .collect();
    for (i, line) in lines.iter().enumerate() {
        if line.trim_end().ends_with(':') {
            let body_indented = lines.get(i + 1).map_or(false, |next| indent_of(next) > indent_of(line));
            if !body_indented {
                return Err(Error::internal(format!("block {:?} has no body", line.trim()), source));
            }
        }
        if line.trim_start().starts_with("if not ") {
            let raised = lines[i..]
                .iter()
                .position(|line| line.trim_end().ends_with(':'))
                .and_then(|end| lines.get(i + end + 1))
                .map_or(false, |next| next.trim_start().starts_with("raise "));
            if !raised {
                return Err(Error::internal(
                    format!("check {:?} is not closed by a raise", line.trim()),
                    source,
                ));
            }
        }
    }
    let terminated = lines.iter().any(|line| {
        indent_of(line) == 4 && (line.trim_start().starts_with("return ") || line.trim_start().starts_with("raise "))
    });
    if !terminated {
        return Err(Error::internal("wrapper neither returns nor raises", source));
    }

    for name in registry_lookups(source) {
        if !requires.contains(&name) {
            return Err(Error::internal(format!("registry name {:?} is never bound", name), source));
        }
    }
    Ok(())
}

/// The runtime half of a wrapper.
struct Wrapper {
    wrappee: Function,
    plan: WrapperPlan,
    conf: Conf,
}

impl Wrapper {
    fn violation(
        &self,
        kind: ViolationKind,
        name: &str,
        hint: &Hint,
        value: &Value,
        random: u32,
    ) -> Error {
        match report(self.wrappee.meta(), &self.conf, kind, name, hint, value, random) {
            Ok(violation) => violation.into(),
            Err(err) => err,
        }
    }

    fn check_param(&self, check: &ParamCheck, value: &Value, random: u32) -> Result<()> {
        if check.fragment.check(value, random)? {
            return Ok(());
        }
        Err(self.violation(ViolationKind::Param, &check.name, &check.hint, value, random))
    }

    fn call(&self, args: &Args) -> Result<Value> {
        let random = if self.plan.needs_random { self.conf.index_source.next_u32() } else { 0 };
        for check in &self.plan.params {
            match check.kind {
                ParamKind::PositionalOnly => {
                    if let Some(value) = args.positional.get(check.index) {
                        self.check_param(check, value, random)?;
                    }
                },
                ParamKind::PositionalOrKeyword => {
                    if let Some(value) = args.get(check.index, &check.name) {
                        self.check_param(check, value, random)?;
                    }
                },
                ParamKind::KeywordOnly => {
                    if let Some(value) = args.keywords.get(&check.name) {
                        self.check_param(check, value, random)?;
                    }
                },
                ParamKind::VarPositional => {
                    for value in args.positional.iter().skip(check.index) {
                        self.check_param(check, value, random)?;
                    }
                },
                ParamKind::VarKeyword => (),
            }
        }

        let value = self.wrappee.call(args)?;
        match &self.plan.ret {
            ReturnCheck::Unchecked => Ok(value),
            ReturnCheck::NoReturn => {
                Err(self.violation(ViolationKind::Return, "return", &Hint::NoReturn, &value, random))
            },
            ReturnCheck::Checked { hint, fragment } => {
                if fragment.check(&value, random)? {
                    Ok(value)
                } else {
                    Err(self.violation(ViolationKind::Return, "return", hint, &value, random))
                }
            },
        }
    }
}

/// Validates `assembled` and binds it into a callable wrapping `func`.
///
/// The wrapper shares `func`'s metadata and signature.
pub fn compile_wrapper(assembled: AssembledWrapper, func: &Function, conf: &Conf) -> Result<Function> {
    verify(&assembled.source, &assembled.requires)?;
    let AssembledWrapper { source, plan, warnings, .. } = assembled;

    let hints = conf.is_debug.then(|| {
        let mut hints: IndexMap<String, Hint> =
            plan.params.iter().map(|check| (check.name.clone(), check.hint.clone())).collect();
        match &plan.ret {
            ReturnCheck::Checked { hint, .. } => {
                hints.insert("return".to_string(), hint.clone());
            },
            ReturnCheck::NoReturn => {
                hints.insert("return".to_string(), Hint::NoReturn);
            },
            ReturnCheck::Unchecked => (),
        }
        hints
    });
    if conf.is_debug {
        log::debug!("compiled wrapper for {}():\n{}", func.meta().qualname, source);
    }

    let wrapper = Arc::new(Wrapper { wrappee: func.clone(), plan, conf: conf.clone() });
    let body: Body = Arc::new(move |args: &Args| wrapper.call(args));
    let info = WrapperInfo {
        wrappee: func.clone(),
        conf_fingerprint: conf.fingerprint(),
        source: conf.is_debug.then_some(source),
        hints,
        warnings,
    };
    Ok(Function::wrapped(
        func.meta().clone(),
        func.params().to_vec(),
        func.return_hint().cloned(),
        body,
        info,
    ))
}
