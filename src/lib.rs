//! Runtime core of a PHP implementation hosted on a statically typed platform.
//!
//! The crate exposes the pieces every other runtime component leans on:
//!
//! * [`registry`] – the process-wide tables of declared types, functions and
//!   constants, seeded with the primitive pseudo-types and built-in classes.
//! * [`loader`] – library loading with per-identity deduplication, module
//!   locators and the script library database.
//! * [`context`] – [`ApplicationContext`], which ties a registry, a loader and
//!   an eval cache together and owns the default-context singleton.
//! * [`convert`] – strictness-ranked conversion of dynamic values into host
//!   representations, backed by a memoized per-target dispatch table.
//! * [`dynamic`] – the transient compilation store behind `eval`,
//!   `create_function` and `assert`, with dependency revalidation on reuse.
//!
//! Code generation is not part of this crate: the eval layer talks to a
//! [`dynamic::Compiler`] supplied by the embedder.

pub mod config;
pub mod context;
pub mod convert;
pub mod dynamic;
pub mod error;
pub mod loader;
pub mod name;
pub mod registry;
pub mod script;
pub mod value;

pub use config::RuntimeConfig;
pub use context::{ApplicationContext, ContextBuilder, HostingContext};
pub use convert::{ConversionEngine, ConversionStrictness, Converted, HostType};
pub use error::{RuntimeError, RuntimeResult};
pub use loader::{LibraryLoader, LoadTarget, Module, ModuleKind};
pub use name::Name;
pub use registry::TypeRegistry;
pub use script::ScriptContext;
pub use value::{HostValue, PhpArray, Value};
