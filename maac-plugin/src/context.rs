//! Call Context

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Optional numerical backend that can be switched off at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Factor,
    Power,
    Multivariate,
    Mediation,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Factor,
        Capability::Power,
        Capability::Multivariate,
        Capability::Mediation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Capability::Factor => "factor",
            Capability::Power => "power",
            Capability::Multivariate => "multivariate",
            Capability::Mediation => "mediation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|c| c.name()).collect();
                format!("unknown backend '{}' (expected one of: {})", s.trim(), known.join(", "))
            })
    }
}

/// Set of enabled backends. Everything is on by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    disabled: Vec<Capability>,
}

impl Capabilities {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn without(mut self, cap: Capability) -> Self {
        if !self.disabled.contains(&cap) {
            self.disabled.push(cap);
        }
        self
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        !self.disabled.contains(&cap)
    }

    pub fn disabled(&self) -> &[Capability] {
        &self.disabled
    }

    pub fn enabled(&self) -> Vec<Capability> {
        Capability::ALL.iter().copied().filter(|c| self.is_enabled(*c)).collect()
    }
}

/// Context passed to every method call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Seed for resampling methods; `None` draws from entropy
    pub seed: Option<u64>,
    pub capabilities: Capabilities,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Resolve the seed for one call: an explicit parameter wins over the
    /// context seed.
    pub fn seed_for(&self, explicit: Option<u64>) -> Option<u64> {
        explicit.or(self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parse() {
        assert_eq!("Factor".parse::<Capability>(), Ok(Capability::Factor));
        assert_eq!(" power ".parse::<Capability>(), Ok(Capability::Power));
        assert!("gpu".parse::<Capability>().is_err());
    }

    #[test]
    fn test_capabilities_without() {
        let caps = Capabilities::all().without(Capability::Power).without(Capability::Power);
        assert!(!caps.is_enabled(Capability::Power));
        assert!(caps.is_enabled(Capability::Factor));
        assert_eq!(caps.disabled().len(), 1);
        assert_eq!(caps.enabled().len(), 3);
    }

    #[test]
    fn test_seed_precedence() {
        let ctx = CallContext::new().with_seed(Some(7));
        assert_eq!(ctx.seed_for(None), Some(7));
        assert_eq!(ctx.seed_for(Some(1)), Some(1));
        assert_eq!(CallContext::new().seed_for(None), None);
    }
}
