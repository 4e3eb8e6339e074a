//! Plugin traits

use crate::{CallContext, Capability, Params};
use maac_core::{MethodResult, StatError};
use serde::Serialize;

/// Metadata about a method parameter
#[derive(Debug, Clone, Serialize)]
pub struct ArgMeta {
    pub name: &'static str,
    pub typ: &'static str,
    pub description: &'static str,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
}

impl ArgMeta {
    pub const fn required(name: &'static str, typ: &'static str, description: &'static str) -> Self {
        Self { name, typ, description, optional: false, default: None }
    }

    pub const fn optional(
        name: &'static str,
        typ: &'static str,
        description: &'static str,
        default: &'static str,
    ) -> Self {
        Self { name, typ, description, optional: true, default: Some(default) }
    }
}

/// Method family, used for catalogue grouping and capability gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Descriptive,
    Correlational,
    Hypothesis,
    Normality,
    EffectSize,
    Reliability,
    Bootstrap,
    Power,
    Factor,
    Multivariate,
    Framework,
    Robust,
    Mediation,
}

impl Family {
    pub const ALL: [Family; 13] = [
        Family::Descriptive,
        Family::Correlational,
        Family::Hypothesis,
        Family::Normality,
        Family::EffectSize,
        Family::Reliability,
        Family::Bootstrap,
        Family::Power,
        Family::Factor,
        Family::Multivariate,
        Family::Framework,
        Family::Robust,
        Family::Mediation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Descriptive => "descriptive",
            Family::Correlational => "correlational",
            Family::Hypothesis => "hypothesis",
            Family::Normality => "normality",
            Family::EffectSize => "effect_size",
            Family::Reliability => "reliability",
            Family::Bootstrap => "bootstrap",
            Family::Power => "power",
            Family::Factor => "factor",
            Family::Multivariate => "multivariate",
            Family::Framework => "framework",
            Family::Robust => "robust",
            Family::Mediation => "mediation",
        }
    }

    pub fn parse(name: &str) -> Option<Family> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    /// Optional backend this family depends on
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Family::Power => Some(Capability::Power),
            Family::Factor => Some(Capability::Factor),
            Family::Multivariate => Some(Capability::Multivariate),
            Family::Mediation => Some(Capability::Mediation),
            _ => None,
        }
    }
}

/// Metadata for a method plugin
#[derive(Debug, Clone, Serialize)]
pub struct MethodMeta {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub args: &'static [ArgMeta],
    pub returns: &'static str,
    pub family: Family,
    pub related: &'static [&'static str],
}

/// Statistical method plugin.
///
/// Implementations return `Err` for every expected edge case (too few
/// values, zero variance, bad parameters). The registry turns errors and
/// panics into an invalid `MethodResult`.
pub trait MethodPlugin: Send + Sync {
    fn meta(&self) -> MethodMeta;
    fn call(&self, params: &Params, ctx: &CallContext) -> Result<MethodResult, StatError>;
}
