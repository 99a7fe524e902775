//! Callables: what gets decorated, and how it is called.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{HintWarning, Result};
use crate::hint::{Hint, Namespace};
use crate::value::Value;

/// The body of a callable.
pub type Body = Arc<dyn Fn(&Args) -> Result<Value> + Send + Sync>;

/// How a parameter may be passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKind {
    /// Before `/`.
    PositionalOnly,
    /// The usual kind.
    PositionalOrKeyword,
    /// `*args`
    VarPositional,
    /// After `*` or `*args`.
    KeywordOnly,
    /// `**kwargs`
    VarKeyword,
}

/// A declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// How it is passed.
    pub kind: ParamKind,
    /// Its annotation, if any.
    pub hint: Option<Hint>,
}

impl Param {
    /// An unannotated parameter.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self { name: name.into(), kind, hint: None }
    }

    /// An annotated positional-or-keyword parameter.
    pub fn positional(name: impl Into<String>, hint: Hint) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword).hinted(hint)
    }

    /// Attaches an annotation.
    pub fn hinted(mut self, hint: Hint) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// Metadata a wrapper copies from the callable it wraps.
#[derive(Debug, Clone)]
pub struct FuncMeta {
    /// `__name__`
    pub name: String,
    /// `__qualname__`
    pub qualname: String,
    /// `__doc__`
    pub doc: Option<String>,
    /// Defining module; forward references resolve against it.
    pub module: Arc<Namespace>,
}

/// Arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    /// Positional arguments, in order.
    pub positional: Vec<Value>,
    /// Keyword arguments, in passing order.
    pub keywords: IndexMap<String, Value>,
}

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only positional arguments.
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self { positional: values.into_iter().collect(), keywords: IndexMap::new() }
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    /// The argument bound to the parameter at `index` named `name`.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| self.keywords.get(name))
    }
}

/// What a decorated function remembers about its decoration.
pub(crate) struct WrapperInfo {
    pub(crate) wrappee: Function,
    pub(crate) conf_fingerprint: u64,
    pub(crate) source: Option<String>,
    pub(crate) hints: Option<IndexMap<String, Hint>>,
    pub(crate) warnings: Vec<HintWarning>,
}

/// A callable with a signature.
#[derive(Clone)]
pub struct Function {
    meta: FuncMeta,
    params: Vec<Param>,
    returns: Option<Hint>,
    body: Body,
    wrapper: Option<Arc<WrapperInfo>>,
}

impl Function {
    /// A function named `name` defined in `module`.
    pub fn new<F>(name: impl Into<String>, module: &Arc<Namespace>, body: F) -> Self
    where
        F: Fn(&Args) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            meta: FuncMeta {
                qualname: name.clone(),
                name,
                doc: None,
                module: Arc::clone(module),
            },
            params: Vec::new(),
            returns: None,
            body: Arc::new(body),
            wrapper: None,
        }
    }

    /// Appends a parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Sets the return annotation.
    pub fn returns(mut self, hint: Hint) -> Self {
        self.returns = Some(hint);
        self
    }

    /// Sets the docstring.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.meta.doc = Some(doc.into());
        self
    }

    /// Sets the qualified name.
    pub fn qualname(mut self, qualname: impl Into<String>) -> Self {
        self.meta.qualname = qualname.into();
        self
    }

    pub(crate) fn wrapped(
        meta: FuncMeta,
        params: Vec<Param>,
        returns: Option<Hint>,
        body: Body,
        info: WrapperInfo,
    ) -> Self {
        Self { meta, params, returns, body, wrapper: Some(Arc::new(info)) }
    }

    /// Calls the function.
    pub fn call(&self, args: &Args) -> Result<Value> {
        (self.body)(args)
    }

    /// Calls the function with positional arguments only.
    pub fn call_with(&self, values: impl IntoIterator<Item = Value>) -> Result<Value> {
        self.call(&Args::positional(values))
    }

    /// Copied metadata.
    pub fn meta(&self) -> &FuncMeta {
        &self.meta
    }

    /// Declared parameters.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Return annotation.
    pub fn return_hint(&self) -> Option<&Hint> {
        self.returns.as_ref()
    }

    /// Whether this is a type-checking wrapper.
    pub fn is_wrapper(&self) -> bool {
        self.wrapper.is_some()
    }

    /// The callable this wrapper checks.
    pub fn wrappee(&self) -> Option<&Function> {
        self.wrapper.as_ref().map(|info| &info.wrappee)
    }

    /// Generated wrapper source, kept under `is_debug`.
    pub fn source(&self) -> Option<&str> {
        self.wrapper.as_ref().and_then(|info| info.source.as_deref())
    }

    /// Checked hints by parameter name (`return` for the return value), kept
    /// under `is_debug`.
    pub fn resolved_hints(&self) -> Option<&IndexMap<String, Hint>> {
        self.wrapper.as_ref().and_then(|info| info.hints.as_ref())
    }

    /// Warnings raised while decorating.
    pub fn warnings(&self) -> &[HintWarning] {
        self.wrapper.as_ref().map(|info| info.warnings.as_slice()).unwrap_or_default()
    }

    pub(crate) fn wrapper_info(&self) -> Option<&WrapperInfo> {
        self.wrapper.as_deref()
    }

    /// Identity of the body; equal for clones of one function.
    pub fn body_identity(&self) -> usize {
        Arc::as_ptr(&self.body) as *const () as usize
    }

    /// Whether `self` and `other` share a body.
    pub fn is_same(&self, other: &Function) -> bool {
        self.body_identity() == other.body_identity()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("qualname", &self.meta.qualname)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("is_wrapper", &self.is_wrapper())
            .finish()
    }
}
