//! The decorator: the entry point tying synthesis, assembly and compilation together.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::assemble::assemble;
use crate::classify::is_ignorable;
use crate::compile::{compile_wrapper, Registry};
use crate::conf::Conf;
use crate::error::Result;
use crate::func::Function;

/// Decorates callables under one configuration.
#[derive(Debug, Clone)]
pub struct Decorator {
    conf: Conf,
    registry: Arc<Registry>,
}

impl Decorator {
    /// A decorator caching into the process-wide registry.
    pub fn new(conf: Conf) -> Self {
        Self::with_registry(conf, Registry::global())
    }

    /// A decorator caching into `registry`.
    pub fn with_registry(conf: Conf, registry: Arc<Registry>) -> Self {
        Self { conf, registry }
    }

    /// The configuration.
    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    /// The registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Wraps `func` in a type-checking wrapper.
    ///
    /// Decorating a wrapper again under the same configuration returns it
    /// unchanged; under another configuration, the original callable is
    /// rewrapped. Callables with nothing to check are returned as is.
    pub fn decorate(&self, func: &Function) -> Result<Function> {
        if let Some(info) = func.wrapper_info() {
            if info.conf_fingerprint == self.conf.fingerprint() {
                log::debug!("{}() already decorated under this configuration", func.meta().qualname);
                return Ok(func.clone());
            }
            return self.decorate(&info.wrappee);
        }
        if !needs_checking(func) {
            log::debug!("{}() has no checkable hints; leaving it undecorated", func.meta().qualname);
            return Ok(func.clone());
        }

        let key = self.wrapper_key(func);
        if let Some(wrapper) = self.registry.wrapper(key) {
            log::debug!("wrapper cache hit for {}()", func.meta().qualname);
            return Ok(wrapper);
        }
        log::debug!("wrapper cache miss for {}()", func.meta().qualname);

        let assembled =
            assemble(func.meta(), func.params(), func.return_hint(), &self.conf, &self.registry)?;
        let wrapper = compile_wrapper(assembled, func, &self.conf)?;
        self.registry.store_wrapper(key, wrapper.clone());
        Ok(wrapper)
    }

    fn wrapper_key(&self, func: &Function) -> u64 {
        let mut hasher = DefaultHasher::new();
        func.body_identity().hash(&mut hasher);
        func.meta().qualname.hash(&mut hasher);
        for param in func.params() {
            param.name.hash(&mut hasher);
            param.kind.hash(&mut hasher);
            param.hint.hash(&mut hasher);
        }
        func.return_hint().hash(&mut hasher);
        self.conf.fingerprint().hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for Decorator {
    fn default() -> Self {
        Self::new(Conf::default())
    }
}

fn needs_checking(func: &Function) -> bool {
    func.params().iter().filter_map(|param| param.hint.as_ref()).any(|hint| !is_ignorable(hint))
        || func.return_hint().map_or(false, |hint| !is_ignorable(hint))
}

/// Decorates `func` under `conf` with the process-wide registry.
pub fn decorate(func: &Function, conf: &Conf) -> Result<Function> {
    Decorator::new(conf.clone()).decorate(func)
}
