//! MAAC Statistical Methods
//!
//! The method library behind the MAAC engine. Every method is a unit struct
//! implementing `MethodPlugin`; errors are returned as `StatError` and turned
//! into invalid results by the registry.

mod helpers;
mod distributions;
mod central;
mod dispersion;
mod position;
mod shape;
mod bivariate;
mod hypothesis;
mod normality;
mod effect_size;
mod reliability;
mod bootstrap;
mod power;
mod factor;
mod multivariate;
mod framework;
mod robust;
mod mediation;

use maac_plugin::MethodRegistry;

pub use reliability::alpha_grade;

/// Load every statistical method into `registry`
pub fn load_methods(registry: MethodRegistry) -> MethodRegistry {
    registry
        // Descriptive
        .with_method(central::Mean)
        .with_method(central::Median)
        .with_method(dispersion::Std)
        .with_method(dispersion::Var)
        .with_method(dispersion::Sem)
        .with_method(position::Minimum)
        .with_method(position::Maximum)
        .with_method(dispersion::Range)
        .with_method(shape::Skew)
        .with_method(shape::Kurtosis)
        .with_method(position::Percentile)
        .with_method(position::Quantiles)
        .with_method(dispersion::Iqr)
        .with_method(dispersion::Cv)
        .with_method(position::ZScores)

        // Correlational
        .with_method(bivariate::Pearson)
        .with_method(bivariate::Spearman)
        .with_method(bivariate::Kendall)
        .with_method(bivariate::CorrelationMatrix)
        .with_alias("corr_matrix", "correlation_matrix")

        // Hypothesis tests
        .with_method(hypothesis::OneSampleTTest)
        .with_method(hypothesis::IndependentTTest)
        .with_method(hypothesis::WelchTTest)
        .with_method(hypothesis::PairedTTest)
        .with_method(hypothesis::OneWayAnova)
        .with_method(hypothesis::KruskalWallis)
        .with_method(hypothesis::MannWhitney)
        .with_method(hypothesis::Wilcoxon)

        // Normality and assumptions
        .with_method(normality::ShapiroWilk)
        .with_alias("shapiro", "shapiro_wilk")
        .with_method(normality::NormalTest)
        .with_method(normality::JarqueBera)
        .with_method(normality::Levene)
        .with_method(normality::Bartlett)

        // Effect sizes
        .with_method(effect_size::CohensD)
        .with_method(effect_size::HedgesG)
        .with_method(effect_size::GlassDelta)
        .with_method(effect_size::EtaSquared)
        .with_method(effect_size::OmegaSquared)

        // Reliability
        .with_method(reliability::CronbachAlpha)
        .with_method(reliability::SplitHalf)
        .with_method(reliability::ItemTotalCorr)

        // Bootstrap
        .with_method(bootstrap::BootstrapCi)
        .with_method(bootstrap::BootstrapBca)

        // Power
        .with_method(power::PowerAnalysis)
        .with_method(power::PowerTTest)
        .with_method(power::PowerAnova)

        // Factor analysis
        .with_method(factor::Pca)
        .with_method(factor::Efa)
        .with_method(factor::Kmo)
        .with_method(factor::BartlettSphericity)
        .with_method(factor::Cfa)

        // Multivariate
        .with_method(multivariate::Manova)

        // MAAC framework
        .with_method(framework::ScoringValidation)
        .with_method(framework::DimensionalStatistics)
        .with_method(framework::FrameworkCoherence)
        .with_method(framework::MultivariateValidation)

        // Robust
        .with_method(robust::RobustMean)
        .with_method(robust::RobustStd)
        .with_method(robust::TrimmedMean)
        .with_method(robust::OutlierDetectionRobust)

        // Mediation
        .with_method(mediation::MediationAnalysis)
}

/// Registry with the full method catalogue
pub fn standard_registry() -> MethodRegistry {
    load_methods(MethodRegistry::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maac_plugin::{CallContext, Capabilities, Capability, Family};
    use serde_json::json;
    use std::collections::HashSet;

    fn params(v: serde_json::Value) -> maac_plugin::Params {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_catalogue_is_duplicate_free() {
        let registry = standard_registry();
        let names = registry.list();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(registry.len(), 62);
    }

    #[test]
    fn test_every_family_populated() {
        let registry = standard_registry();
        for family in Family::ALL {
            assert!(!registry.list_by_family(family).is_empty(), "{:?} is empty", family);
        }
    }

    #[test]
    fn test_aliases_resolve() {
        let registry = standard_registry();
        let ctx = CallContext::new();
        let a = registry.call("shapiro", &params(json!({"X": [1, 2, 3, 4, 9]})), &ctx);
        let b = registry.call("shapiro_wilk", &params(json!({"X": [1, 2, 3, 4, 9]})), &ctx);
        assert_eq!(a, b);
        let m = registry.call("corr_matrix", &params(json!({"X": [[1, 2], [2, 4], [3, 7]]})), &ctx);
        assert!(m.valid);
    }

    #[test]
    fn test_gated_methods_report_unavailable() {
        let registry = standard_registry();
        let ctx = CallContext::new()
            .with_capabilities(Capabilities::all().without(Capability::Power));
        let r = registry.call("power_ttest", &params(json!({"effect_size": 0.5, "nobs": 20})), &ctx);
        assert!(!r.valid);
        assert_eq!(r.code.as_deref(), Some(maac_core::codes::UNAVAILABLE));
        assert_eq!(r.error.as_deref(), Some("power backend not available"));
    }

    #[test]
    fn test_unknown_method_suggests() {
        let registry = standard_registry();
        let err = registry.unknown_method("pearsn");
        assert!(err.suggestion.unwrap_or_default().contains("pearson"));
    }
}
