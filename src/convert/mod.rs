//! Conversion of runtime values into statically typed host representations.
//!
//! Every conversion reports how faithful it was through
//! [`ConversionStrictness`]. Callers that pick between overloads compare the
//! strictness of each candidate; callers that only want a value check
//! [`ConversionStrictness::is_failed`].

mod engine;
pub mod number;
mod target;
pub mod to_host;

pub use engine::{BoundCallback, CallbackBinder, ConversionEngine, NoBinder};
pub use target::{DelegateSignature, HostRepr, HostType};

/// Quality of a conversion, best first. The ordering is total: a composite
/// conversion is as strict as its worst part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConversionStrictness {
    ExactMatch = 0,
    PrecisionLost,
    DomainChange,
    /// The value type provided its own conversion.
    Explicit,
    Failed,
}

impl ConversionStrictness {
    pub fn is_failed(self) -> bool {
        self == ConversionStrictness::Failed
    }

    pub fn worst(self, other: ConversionStrictness) -> ConversionStrictness {
        self.max(other)
    }
}

/// Value produced by a conversion together with its strictness. On
/// `Failed` the value is a best-effort fallback and must not be trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted<T> {
    pub value: T,
    pub strictness: ConversionStrictness,
}

impl<T> Converted<T> {
    pub fn new(value: T, strictness: ConversionStrictness) -> Self {
        Self { value, strictness }
    }

    pub fn exact(value: T) -> Self {
        Self::new(value, ConversionStrictness::ExactMatch)
    }

    pub fn failed(value: T) -> Self {
        Self::new(value, ConversionStrictness::Failed)
    }

    pub fn is_failed(&self) -> bool {
        self.strictness.is_failed()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Converted<U> {
        Converted::new(f(self.value), self.strictness)
    }

    /// Returns the value unless the conversion failed.
    pub fn ok(self) -> Option<T> {
        (!self.is_failed()).then_some(self.value)
    }
}
