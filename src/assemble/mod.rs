//! Wrapper assembly: stitches parameter and return checks into one wrapper.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::classify::is_ignorable;
use crate::compile::Registry;
use crate::conf::Conf;
use crate::error::{Error, HintWarning, Result};
use crate::func::{FuncMeta, Param, ParamKind};
use crate::hint::Hint;
use crate::snip::{
    self, fill, py_repr, CODE_CHECK_NORETURN, CODE_HINT_ROOT_PREFIX, CODE_HINT_ROOT_SUFFIX,
    CODE_HINT_ROOT_SUFFIX_RANDOM_INT, CODE_INIT_ARGS_LEN, CODE_INIT_RANDOM_INT,
    CODE_RETURN_CHECK_PREFIX, CODE_RETURN_CHECK_SUFFIX, CODE_RETURN_UNCHECKED, CODE_SIGNATURE,
    PITH_ROOT_NAME_PLACEHOLDER, RESERVED_PREFIX, ROOT_INDENT, VAR_NAME_PITH_ROOT,
};
use crate::synth::{Fragment, Synthesizer};

/// One checked parameter.
#[derive(Debug, Clone)]
pub struct ParamCheck {
    /// Parameter name.
    pub name: String,
    /// How it is passed.
    pub kind: ParamKind,
    /// Position among positional parameters; for `*args`, the first index it collects.
    pub index: usize,
    /// Checked hint.
    pub hint: Hint,
    /// Its check.
    pub fragment: Fragment,
}

/// What happens to the return value.
#[derive(Debug, Clone)]
pub enum ReturnCheck {
    /// Passed through.
    Unchecked,
    /// Checked against `hint`.
    Checked {
        /// Return hint.
        hint: Hint,
        /// Its check.
        fragment: Fragment,
    },
    /// Returning at all is a violation.
    NoReturn,
}

/// The executable counterpart of the wrapper source.
#[derive(Debug, Clone)]
pub struct WrapperPlan {
    /// Checked parameters in declaration order.
    pub params: Vec<ParamCheck>,
    /// Return handling.
    pub ret: ReturnCheck,
    /// Whether a call must draw a random integer.
    pub needs_random: bool,
}

impl WrapperPlan {
    /// Whether the wrapper checks anything at all.
    pub fn is_noop(&self) -> bool {
        self.params.is_empty() && matches!(self.ret, ReturnCheck::Unchecked)
    }
}

/// Wrapper source plus plan, not yet validated.
#[derive(Debug, Clone)]
pub struct AssembledWrapper {
    /// Generated source.
    pub source: String,
    /// What the wrapper does.
    pub plan: WrapperPlan,
    /// Registry names the source looks up.
    pub requires: BTreeSet<String>,
    /// Deprecation warnings from every hint.
    pub warnings: Vec<HintWarning>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Rejects signatures the wrapper cannot reproduce.
pub fn validate(meta: &FuncMeta, params: &[Param]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut previous: Option<ParamKind> = None;
    for param in params {
        if !is_identifier(&param.name) {
            return Err(Error::param_name(&meta.qualname, &param.name, "not an identifier"));
        }
        if param.name.starts_with(RESERVED_PREFIX) {
            return Err(Error::param_name(
                &meta.qualname,
                &param.name,
                format!("names prefixed by {:?} are reserved", RESERVED_PREFIX),
            ));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(Error::param_name(&meta.qualname, &param.name, "duplicate parameter"));
        }
        if let Some(previous) = previous {
            let variadic = matches!(previous, ParamKind::VarPositional | ParamKind::VarKeyword);
            if param.kind < previous || (param.kind == previous && variadic) {
                return Err(Error::param_malformed(
                    &meta.qualname,
                    &param.name,
                    format!("{:?} parameter follows {:?} parameter", param.kind, previous),
                ));
            }
        }
        if param.kind == ParamKind::VarKeyword {
            if let Some(hint) = param.hint.as_ref().filter(|hint| !is_ignorable(hint)) {
                return Err(Error::param_malformed(
                    &meta.qualname,
                    &param.name,
                    format!("variadic keyword parameter hint {} cannot be checked", hint),
                ));
            }
        }
        previous = Some(param.kind);
    }
    Ok(())
}

/// `if not <check>: raise ...` for the root pith.
fn root_check(fragment: &Fragment, offset: usize, pith_name: &str) -> String {
    let random = if fragment.needs_random() { CODE_HINT_ROOT_SUFFIX_RANDOM_INT } else { "" };
    let suffix = fill(CODE_HINT_ROOT_SUFFIX, &[("random_int_if_any", random)])
        .replace(PITH_ROOT_NAME_PLACEHOLDER, pith_name);
    format!("{}{}{}", CODE_HINT_ROOT_PREFIX, fragment.render(VAR_NAME_PITH_ROOT, offset), suffix)
}

/// Accumulates checks while the wrapper body is built.
#[derive(Default)]
struct WrapperBody {
    code: String,
    offset: usize,
    needs_random: bool,
    requires: BTreeSet<String>,
    warnings: Vec<HintWarning>,
}

impl WrapperBody {
    fn push_check(&mut self, fragment: &Fragment, pith_name: &str) {
        self.code.push_str(&root_check(fragment, self.offset, pith_name));
        self.offset += fragment.locals();
        self.needs_random |= fragment.needs_random();
        self.requires.extend(fragment.requires().iter().cloned());
        self.warnings.extend(fragment.warnings().iter().cloned());
    }
}

/// Generates the wrapper source and plan for a callable.
///
/// Unhinted and ignorable parameters are skipped. Each checked hint gets its
/// own range of local pith names.
pub fn assemble(
    meta: &FuncMeta,
    params: &[Param],
    returns: Option<&Hint>,
    conf: &Conf,
    registry: &Arc<Registry>,
) -> Result<AssembledWrapper> {
    validate(meta, params)?;

    let mut body = WrapperBody::default();
    let mut checks = Vec::new();
    let mut uses_args_len = false;
    let mut position = 0;
    for param in params {
        let index = position;
        if matches!(param.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword) {
            position += 1;
        }
        let Some(hint) = param.hint.as_ref().filter(|hint| !is_ignorable(hint)) else {
            continue;
        };
        let Some(localize) = snip::localize(param.kind) else {
            continue;
        };
        let fragment = Synthesizer::new(conf, registry)
            .with_label(format!("parameter {}:", param.name))
            .synthesize(hint, ROOT_INDENT)?;

        uses_args_len |=
            matches!(param.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword);
        body.code.push_str(&fill(
            localize,
            &[("arg_index", index.to_string().as_str()), ("arg_name", py_repr(&param.name).as_str())],
        ));
        body.push_check(&fragment, &py_repr(&param.name));
        checks.push(ParamCheck {
            name: param.name.clone(),
            kind: param.kind,
            index,
            hint: hint.clone(),
            fragment,
        });
    }

    let ret = match returns {
        Some(Hint::NoReturn) => {
            body.code.push_str(CODE_CHECK_NORETURN);
            ReturnCheck::NoReturn
        },
        Some(hint) if !is_ignorable(hint) => {
            let fragment = Synthesizer::new(conf, registry)
                .with_label("return:")
                .synthesize(hint, ROOT_INDENT)?;
            body.code.push_str(CODE_RETURN_CHECK_PREFIX);
            body.push_check(&fragment, &py_repr("return"));
            body.code.push_str(CODE_RETURN_CHECK_SUFFIX);
            ReturnCheck::Checked { hint: hint.clone(), fragment }
        },
        _ => {
            body.code.push_str(CODE_RETURN_UNCHECKED);
            ReturnCheck::Unchecked
        },
    };

    let mut source = fill(CODE_SIGNATURE, &[("func_name", meta.name.as_str())]);
    if uses_args_len {
        source.push_str(CODE_INIT_ARGS_LEN);
    }
    if body.needs_random {
        source.push_str(CODE_INIT_RANDOM_INT);
    }
    source.push_str(&body.code);
    source.push('\n');

    for warning in &body.warnings {
        log::warn!("{}(): {}", meta.qualname, warning);
    }

    Ok(AssembledWrapper {
        source,
        plan: WrapperPlan { params: checks, ret, needs_random: body.needs_random },
        requires: body.requires,
        warnings: body.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hint::Namespace;
    use crate::value::{INT, STR};
    use pretty_assertions::assert_eq;

    fn meta() -> FuncMeta {
        FuncMeta {
            name: "muh_func".to_string(),
            qualname: "muh_func".to_string(),
            doc: None,
            module: Namespace::new("tests"),
        }
    }

    fn assemble_with(params: &[Param], returns: Option<&Hint>) -> Result<AssembledWrapper> {
        let registry = Arc::new(Registry::default());
        assemble(&meta(), params, returns, &Conf::default(), &registry)
    }

    #[test]
    fn test_param_and_return_source() {
        let params = [Param::positional("x", Hint::of(&INT))];
        let assembled = assemble_with(&params, Some(&Hint::of(&STR))).unwrap();
        let source = &assembled.source;
        assert!(source.starts_with("def muh_func(\n    *args,\n"));
        assert!(source.contains("__hc_args_len = len(args)"));
        assert!(source.contains("kwargs.get('x', __hc_registry)"));
        assert!(source.contains("if not isinstance(__hc_pith_root, int):"));
        assert!(source.contains("pith_name='x',"));
        assert!(source.contains("    if True:"));
        assert!(source.contains("if not isinstance(__hc_pith_root, str):"));
        assert!(source.trim_end().ends_with("return __hc_pith_root"));
        assert!(!source.contains("__hc_random_int"));
        assert_eq!(assembled.plan.params.len(), 1);
        assert!(matches!(assembled.plan.ret, ReturnCheck::Checked { .. }));
    }

    #[test]
    fn test_pith_locals_get_fresh_offsets() {
        let params = [
            Param::positional("a", Hint::list(Hint::of(&INT))),
            Param::positional("b", Hint::list(Hint::of(&STR))),
        ];
        let assembled = assemble_with(&params, None).unwrap();
        assert!(assembled.source.contains("for __hc_pith_0 in"));
        assert!(assembled.source.contains("for __hc_pith_1 in"));
        assert!(assembled.source.contains("random_int=__hc_random_int,"));
        assert!(assembled.plan.needs_random);
    }

    #[test]
    fn test_unhinted_and_ignorable_params_are_skipped() {
        let params = [
            Param::new("a", ParamKind::PositionalOrKeyword),
            Param::positional("b", Hint::Any),
            Param::positional("c", Hint::of(&INT)),
        ];
        let assembled = assemble_with(&params, None).unwrap();
        assert_eq!(assembled.plan.params.len(), 1);
        assert_eq!(assembled.plan.params[0].index, 2);
        assert!(assembled.source.contains("args[2] if __hc_args_len > 2 else"));
        assert!(assembled.source.trim_end().ends_with("return __hc_func(*args, **kwargs)"));
    }

    #[test]
    fn test_kinds_localize() {
        let params = [
            Param::new("a", ParamKind::PositionalOnly).hinted(Hint::of(&INT)),
            Param::new("rest", ParamKind::VarPositional).hinted(Hint::of(&INT)),
            Param::new("k", ParamKind::KeywordOnly).hinted(Hint::of(&STR)),
            Param::new("kw", ParamKind::VarKeyword),
        ];
        let assembled = assemble_with(&params, Some(&Hint::NoReturn)).unwrap();
        let source = &assembled.source;
        assert!(source.contains("if __hc_args_len > 0:"));
        assert!(source.contains("for __hc_pith_root in args[1:]:"));
        assert!(source.contains("__hc_pith_root = kwargs.get('k', __hc_registry)"));
        assert!(source.contains("pith_name='return',"));
        assert_eq!(assembled.plan.params[1].index, 1);
        assert!(matches!(assembled.plan.ret, ReturnCheck::NoReturn));
    }

    #[test]
    fn test_signature_errors() {
        let reserved = [Param::positional("__hc_func", Hint::of(&INT))];
        assert!(matches!(assemble_with(&reserved, None), Err(Error::ParamName { .. })));

        let duplicate = [Param::positional("x", Hint::of(&INT)), Param::positional("x", Hint::Any)];
        assert!(matches!(assemble_with(&duplicate, None), Err(Error::ParamName { .. })));

        let disordered = [
            Param::new("k", ParamKind::KeywordOnly),
            Param::new("a", ParamKind::PositionalOnly),
        ];
        assert!(matches!(assemble_with(&disordered, None), Err(Error::ParamMalformed { .. })));

        let hinted_kwargs = [Param::new("kw", ParamKind::VarKeyword).hinted(Hint::of(&INT))];
        assert!(matches!(assemble_with(&hinted_kwargs, None), Err(Error::ParamMalformed { .. })));
    }

    #[test]
    fn test_noreturn_inside_return_union_is_unsupported() {
        let hint = Hint::union([Hint::of(&INT), Hint::NoReturn]);
        assert!(matches!(assemble_with(&[], Some(&hint)), Err(Error::HintUnsupported { .. })));
    }

    #[test]
    fn test_warnings_are_collected() {
        let params = [Param::positional("x", Hint::list(Hint::of(&INT)).legacy())];
        let assembled = assemble_with(&params, None).unwrap();
        assert_eq!(assembled.warnings.len(), 1);
    }
}
