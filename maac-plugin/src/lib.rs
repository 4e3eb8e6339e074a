//! MAAC Plugin System
//!
//! Provides the contract every statistical method implements:
//! - `MethodPlugin` + `MethodMeta`: the kernel and its self-description
//! - `MethodRegistry`: name lookup and the failure-isolating call wrapper
//! - `CallContext`: per-call seed and backend capabilities

mod context;
mod params;
mod registry;
mod traits;

pub use context::{CallContext, Capabilities, Capability};
pub use params::{parse, Params};
pub use registry::MethodRegistry;
pub use traits::{ArgMeta, Family, MethodMeta, MethodPlugin};

/// Re-export core types for method authors
pub mod prelude {
    pub use crate::{
        parse, ArgMeta, CallContext, Capabilities, Capability, Family, MethodMeta, MethodPlugin, MethodRegistry,
        Params,
    };
    pub use maac_core::prelude::*;
}
