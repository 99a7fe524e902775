//! hintcheck: runtime type checks synthesized once, at decoration time.
//!
//! A [`Function`](func::Function) carries a signature annotated with
//! [`Hint`](hint::Hint)s. [`decorate`](decor::decorate) classifies every hint,
//! synthesizes a check for it, assembles those checks into one wrapper and
//! caches the result, so each call only pays for the checks themselves.
//! Container checks sample items rather than walking whole containers.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod assemble;
pub mod classify;
pub mod compile;
pub mod conf;
pub mod decor;
pub mod error;
pub mod func;
pub mod hint;
pub mod report;
pub mod snip;
pub mod synth;
pub mod value;

/// Re-exports commonly used types and traits.
pub mod prelude {
    pub use crate::conf::{Conf, FixedSource, SamplePolicy, SeededSource};
    pub use crate::decor::{decorate, Decorator};
    pub use crate::error::{Error, HintWarning, Result};
    pub use crate::func::{Args, Function, Param, ParamKind};
    pub use crate::hint::{parse_hint, Hint, Namespace, Protocol, Validator};
    pub use crate::report::{Violation, ViolationKind};
    pub use crate::value::{Class, Value};
}
