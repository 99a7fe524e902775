//! Code snippets: the text templates wrapper source is assembled from.
//!
//! Templates carry `{name}` placeholders filled by [`fill`]. Check
//! expressions additionally carry [`PITH_PLACEHOLDER`] for the value under
//! test and `{pith_N}` markers for the locals they bind; see
//! [`render_locals`].

use crate::func::ParamKind;
use crate::value::push_escaped;

/// Hidden wrapper parameter bound to the decorated callable.
pub const ARG_NAME_FUNC: &str = "__hc_func";

/// Hidden wrapper parameter bound to the registry. Doubles as the sentinel
/// for unpassed parameters, since no caller can pass it.
pub const ARG_NAME_REGISTRY: &str = "__hc_registry";

/// Number of positional arguments passed.
pub const VAR_NAME_ARGS_LEN: &str = "__hc_args_len";

/// The parameter or return value currently being checked.
pub const VAR_NAME_PITH_ROOT: &str = "__hc_pith_root";

/// The pseudo-random integer drawn once per call.
pub const VAR_NAME_RANDOM_INT: &str = "__hc_random_int";

/// Prefix of every local pith name.
pub const VAR_NAME_PITH_PREFIX: &str = "__hc_pith_";

/// Placeholder for the value a check expression tests.
pub const PITH_PLACEHOLDER: &str = "{pith}";

/// Placeholder for the root pith's label in the raise block.
pub const PITH_ROOT_NAME_PLACEHOLDER: &str = "?|PITH_ROOT_NAME`^";

/// Prefix reserved for generated names; parameters may not use it.
pub const RESERVED_PREFIX: &str = "__hc_";

/// One level of indentation.
pub const CODE_INDENT_1: &str = "    ";

/// Indentation level the root check expression is emitted at.
pub const ROOT_INDENT: usize = 2;

/// Expression that is always true.
pub const CODE_TRUE: &str = "True";

/// Wrapper signature. Fills `{func_name}`.
pub const CODE_SIGNATURE: &str = "def {func_name}(
    *args,
    __hc_func=__hc_func,
    __hc_registry=__hc_registry,
    **kwargs
):";

/// Localizes the positional argument count.
pub const CODE_INIT_ARGS_LEN: &str = "
    # Localize the number of passed positional arguments for efficiency.
    __hc_args_len = len(args)";

/// Draws the per-call random integer.
pub const CODE_INIT_RANDOM_INT: &str = "
    # Draw one pseudo-random integer shared by every sampled container check.
    __hc_random_int = __hc_registry.random_int()";

const CODE_LOCALIZE_POSITIONAL_ONLY: &str = "

    # If this positional-only parameter was passed...
    if __hc_args_len > {arg_index}:
        # Localize this positional-only parameter.
        __hc_pith_root = args[{arg_index}]";

const CODE_LOCALIZE_POSITIONAL_OR_KEYWORD: &str = "

    # Localize this positional or keyword parameter if passed *OR* to the
    # sentinel \"__hc_registry\" guaranteed to never be passed.
    __hc_pith_root = (
        args[{arg_index}] if __hc_args_len > {arg_index} else
        kwargs.get({arg_name}, __hc_registry)
    )

    # If this parameter was passed...
    if __hc_pith_root is not __hc_registry:";

const CODE_LOCALIZE_KEYWORD_ONLY: &str = "

    # Localize this keyword-only parameter if passed *OR* to the sentinel.
    __hc_pith_root = kwargs.get({arg_name}, __hc_registry)

    # If this parameter was passed...
    if __hc_pith_root is not __hc_registry:";

const CODE_LOCALIZE_VAR_POSITIONAL: &str = "

    # For all passed variadic positional parameters...
    for __hc_pith_root in args[{arg_index}:]:";

/// Opens the root check of one parameter or return value.
pub const CODE_HINT_ROOT_PREFIX: &str = "
        # Type-check this passed parameter or return value against this
        # type hint.
        if not ";

/// Closes the root check with the raise block. Fills `{random_int_if_any}`.
pub const CODE_HINT_ROOT_SUFFIX: &str = ":
            raise __hc_registry.raise_violation(
                func=__hc_func,
                pith_name=?|PITH_ROOT_NAME`^,
                pith_value=__hc_pith_root,{random_int_if_any}
            )";

/// Passes the random integer on to the reporter.
pub const CODE_HINT_ROOT_SUFFIX_RANDOM_INT: &str = "
                random_int=__hc_random_int,";

/// Calls the wrappee ahead of the return check.
pub const CODE_RETURN_CHECK_PREFIX: &str = "

    # Call this function with all passed parameters and localize the value
    # returned from this call.
    __hc_pith_root = __hc_func(*args, **kwargs)

    # Noop required to artificially increase indentation level.
    if True:";

/// Returns the checked value.
pub const CODE_RETURN_CHECK_SUFFIX: &str = "
    return __hc_pith_root";

/// Calls the wrappee and returns its value unchecked.
pub const CODE_RETURN_UNCHECKED: &str = "

    # Call this function with all passed parameters and return the value
    # returned from this call.
    return __hc_func(*args, **kwargs)";

/// Calls a `NoReturn` wrappee; any return raises.
pub const CODE_CHECK_NORETURN: &str = "

    # Call this function with all passed parameters. Returning at all
    # violates its NoReturn hint.
    __hc_pith_root = __hc_func(*args, **kwargs)
    raise __hc_registry.raise_violation(
        func=__hc_func,
        pith_name='return',
        pith_value=__hc_pith_root,
    )";

/// Localization snippet for a parameter kind, if that kind can be checked.
pub fn localize(kind: ParamKind) -> Option<&'static str> {
    match kind {
        ParamKind::PositionalOnly => Some(CODE_LOCALIZE_POSITIONAL_ONLY),
        ParamKind::PositionalOrKeyword => Some(CODE_LOCALIZE_POSITIONAL_OR_KEYWORD),
        ParamKind::KeywordOnly => Some(CODE_LOCALIZE_KEYWORD_ONLY),
        ParamKind::VarPositional => Some(CODE_LOCALIZE_VAR_POSITIONAL),
        ParamKind::VarKeyword => None,
    }
}

/// `level` indentation units.
pub fn indent(level: usize) -> String {
    CODE_INDENT_1.repeat(level)
}

/// Replaces each `{key}` in `template` with its value.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

/// Python string literal for `s`.
///
/// Braces are written as `\x7b` and `\x7d`, so user text spliced into a
/// template can never spell a placeholder.
pub fn py_repr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '{' => out.push_str("\\x7b"),
            '}' => out.push_str("\\x7d"),
            c => push_escaped(&mut out, c, '\''),
        }
    }
    out.push('\'');
    out
}

/// Rewrites every `{pith_N}` marker in `code` to `local(N)`.
pub fn map_locals(code: &str, local: impl Fn(usize) -> String) -> String {
    const MARKER: &str = "{pith_";
    let mut out = String::with_capacity(code.len());
    let mut rest = code;
    while let Some(at) = rest.find(MARKER) {
        let after = &rest[at + MARKER.len()..];
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        match (after[..digits].parse::<usize>(), after[digits..].starts_with('}')) {
            (Ok(n), true) => {
                out.push_str(&rest[..at]);
                out.push_str(&local(n));
                rest = &after[digits + 1..];
            },
            _ => {
                out.push_str(&rest[..at + MARKER.len()]);
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

/// Renumbers the local markers of `code` by `by`.
pub fn shift_locals(code: &str, by: usize) -> String {
    if by == 0 {
        return code.to_string();
    }
    map_locals(code, |n| format!("{{pith_{}}}", n + by))
}

/// Turns local markers into real names numbered from `offset`.
pub fn render_locals(code: &str, offset: usize) -> String {
    map_locals(code, |n| format!("{}{}", VAR_NAME_PITH_PREFIX, n + offset))
}
