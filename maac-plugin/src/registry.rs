//! Method Registry

use crate::{CallContext, Family, MethodMeta, MethodPlugin, Params};
use maac_core::{MethodResult, StatError};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Central method registry.
///
/// Built once at startup, then shared read-only behind an `Arc`.
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn MethodPlugin>>,
    aliases: HashMap<String, String>,
    order: Vec<String>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            aliases: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn with_method<M: MethodPlugin + 'static>(mut self, m: M) -> Self {
        debug_assert!(
            !self.contains(m.meta().name),
            "duplicate method name: {}",
            m.meta().name
        );
        self.register(Arc::new(m));
        self
    }

    /// Register `alias` as another name for the already registered `target`
    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        debug_assert!(self.methods.contains_key(target), "alias target missing: {}", target);
        debug_assert!(!self.contains(alias), "duplicate method name: {}", alias);
        if !self.contains(alias) {
            self.order.push(alias.to_string());
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        self
    }

    /// Insert or overwrite a method (last write wins)
    pub fn register(&mut self, plugin: Arc<dyn MethodPlugin>) {
        let name = plugin.meta().name.to_string();
        if !self.contains(&name) {
            self.order.push(name.clone());
        }
        self.aliases.remove(&name);
        self.methods.insert(name, plugin);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name) || self.aliases.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn MethodPlugin> {
        let target = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.methods.get(target).map(|m| m.as_ref())
    }

    /// All callable names in registration order, aliases included
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn list_by_family(&self, family: Family) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.get(name).map_or(false, |m| m.meta().family == family))
            .map(String::as_str)
            .collect()
    }

    /// Call a method by name. Never fails: unknown names, kernel errors,
    /// disabled backends and panics all become an invalid result.
    pub fn call(&self, name: &str, params: &Params, ctx: &CallContext) -> MethodResult {
        match self.get(name) {
            Some(method) => Self::invoke(method, params, ctx),
            None => MethodResult::failed(&self.unknown_method(name)),
        }
    }

    /// Failure-isolating wrapper around a single kernel invocation
    pub fn invoke(method: &dyn MethodPlugin, params: &Params, ctx: &CallContext) -> MethodResult {
        let meta = method.meta();

        if let Some(cap) = meta.family.capability() {
            if !ctx.capabilities.is_enabled(cap) {
                return MethodResult::failed(&StatError::unavailable(cap.name()).in_method(meta.name));
            }
        }

        match panic::catch_unwind(AssertUnwindSafe(|| method.call(params, ctx))) {
            Ok(Ok(result)) if result.valid => result,
            Ok(Ok(mut result)) => {
                result.payload.clear();
                result
            }
            Ok(Err(err)) => MethodResult::failed(&err.in_method(meta.name)),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic in kernel".to_string());
                MethodResult::failed(&StatError::kernel_fault(reason).in_method(meta.name))
            }
        }
    }

    /// Error for an unregistered name, with similar names as a suggestion
    pub fn unknown_method(&self, name: &str) -> StatError {
        let similar = self.find_similar_methods(name);
        let mut err = StatError::unknown_method(name);
        if !similar.is_empty() {
            let suggestions: Vec<&str> = similar.iter().take(5).map(|s| s.as_str()).collect();
            err = err.with_suggestion(format!(
                "Similar: {}. Use list_methods for full list.",
                suggestions.join(", ")
            ));
        }
        err
    }

    /// Registered names close to `name`, nearest first
    fn find_similar_methods(&self, name: &str) -> Vec<String> {
        let query = name.to_lowercase();
        let mut matches: Vec<(usize, &String)> = self
            .order
            .iter()
            .filter_map(|candidate| name_distance(&query, candidate).map(|d| (d, candidate)))
            .collect();

        // Stable sort keeps registration order among equal distances
        matches.sort_by_key(|(d, _)| *d);
        matches.into_iter().map(|(_, name)| name.clone()).collect()
    }

    /// Full metadata for one method (or alias)
    pub fn describe(&self, name: &str) -> Result<JsonValue, StatError> {
        let method = self.get(name).ok_or_else(|| self.unknown_method(name))?;
        let meta = method.meta();
        let aliases: Vec<&str> = self
            .order
            .iter()
            .filter(|n| self.aliases.get(*n).map_or(false, |t| t == meta.name))
            .map(String::as_str)
            .collect();

        let mut help = method_summary(&meta);
        if let JsonValue::Object(ref mut obj) = help {
            obj.insert("usage".to_string(), json!(meta.usage));
            obj.insert("returns".to_string(), json!(meta.returns));
            obj.insert("args".to_string(), json!(meta.args));
            obj.insert("related".to_string(), json!(meta.related));
            obj.insert("aliases".to_string(), json!(aliases));
            if let Some(cap) = meta.family.capability() {
                obj.insert("requires".to_string(), json!(cap.name()));
            }
            if name != meta.name {
                obj.insert("alias_of".to_string(), json!(meta.name));
            }
        }
        Ok(help)
    }

    /// Catalogue entries in registration order, optionally filtered by family
    pub fn list_methods(&self, family: Option<Family>) -> JsonValue {
        let entries: Vec<JsonValue> = self
            .order
            .iter()
            .filter_map(|name| {
                let meta = self.get(name)?.meta();
                if family.map_or(true, |f| meta.family == f) {
                    let mut entry = method_summary(&meta);
                    if let JsonValue::Object(ref mut obj) = entry {
                        obj.insert("name".to_string(), json!(name));
                    }
                    Some(entry)
                } else {
                    None
                }
            })
            .collect();
        JsonValue::Array(entries)
    }
}

fn method_summary(meta: &MethodMeta) -> JsonValue {
    json!({
        "name": meta.name,
        "family": meta.family,
        "description": meta.description,
    })
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// How far `candidate` is from a mistyped `query`, `None` when unrelated.
///
/// Prefix and substring hits rank first. Then comes edit distance within a
/// third of the query length. A shared `_`-separated segment (`alpha` for
/// `cronbach_alpha`) ranks last.
fn name_distance(query: &str, candidate: &str) -> Option<usize> {
    if query.is_empty() {
        return None;
    }
    if candidate.starts_with(query) {
        return Some(0);
    }
    if candidate.contains(query) {
        return Some(1);
    }
    let tolerance = (query.len() / 3).max(2);
    let distance = edit_distance(query, candidate);
    if distance <= tolerance {
        return Some(distance + 1);
    }
    let shares_segment = query
        .split('_')
        .filter(|seg| seg.len() > 2)
        .any(|seg| candidate.split('_').any(|c| c == seg));
    shares_segment.then_some(tolerance + 2)
}

/// Levenshtein distance over chars
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let next = (row[j + 1] + 1).min(row[j] + 1).min(diag + usize::from(ca != cb));
            diag = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgMeta, Capabilities, Capability};
    use maac_core::codes;
    use serde_json::json;

    struct Echo;
    struct Boom;
    struct Refuse;
    struct Gated;

    static X_ARG: [ArgMeta; 1] = [ArgMeta::required("X", "series", "Values")];

    fn meta(name: &'static str, family: Family) -> MethodMeta {
        MethodMeta {
            name,
            description: "test method",
            usage: "test(X)",
            args: &X_ARG,
            returns: "object",
            family,
            related: &[],
        }
    }

    impl MethodPlugin for Echo {
        fn meta(&self) -> MethodMeta {
            meta("echo", Family::Descriptive)
        }
        fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
            Ok(MethodResult::ok().with("n", params.len()))
        }
    }

    impl MethodPlugin for Boom {
        fn meta(&self) -> MethodMeta {
            meta("boom", Family::Descriptive)
        }
        fn call(&self, _params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
            panic!("index out of range")
        }
    }

    impl MethodPlugin for Refuse {
        fn meta(&self) -> MethodMeta {
            meta("refuse", Family::Descriptive)
        }
        fn call(&self, _params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
            Err(StatError::too_few("refuse", 3, 1))
        }
    }

    impl MethodPlugin for Gated {
        fn meta(&self) -> MethodMeta {
            meta("gated", Family::Factor)
        }
        fn call(&self, _params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
            Ok(MethodResult::ok())
        }
    }

    fn registry() -> MethodRegistry {
        MethodRegistry::new()
            .with_method(Echo)
            .with_method(Boom)
            .with_method(Refuse)
            .with_method(Gated)
            .with_alias("echo2", "echo")
    }

    fn params() -> Params {
        json!({"X": [1]}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_list_keeps_registration_order() {
        assert_eq!(registry().list(), vec!["echo", "boom", "refuse", "gated", "echo2"]);
        assert_eq!(registry().len(), 5);
    }

    #[test]
    fn test_alias_resolves() {
        let r = registry();
        let res = r.call("echo2", &params(), &CallContext::new());
        assert!(res.valid);
        assert_eq!(res.get_f64("n"), Some(1.0));
        assert_eq!(r.describe("echo2").unwrap()["alias_of"], json!("echo"));
        assert_eq!(r.describe("echo").unwrap()["aliases"], json!(["echo2"]));
    }

    #[test]
    fn test_panic_becomes_kernel_fault() {
        let res = registry().call("boom", &params(), &CallContext::new());
        assert!(!res.valid);
        assert_eq!(res.code.as_deref(), Some(codes::KERNEL_FAULT));
        assert!(res.error.unwrap().contains("index out of range"));
    }

    #[test]
    fn test_error_becomes_invalid_result() {
        let res = registry().call("refuse", &params(), &CallContext::new());
        assert!(!res.valid);
        assert!(res.payload.is_empty());
        assert_eq!(res.code.as_deref(), Some(codes::INAPPLICABLE_INPUT));
    }

    #[test]
    fn test_unknown_method_suggests() {
        let r = registry();
        let res = r.call("ech", &params(), &CallContext::new());
        assert_eq!(res.error.as_deref(), Some("Unknown method: ech"));
        let err = r.unknown_method("ech");
        assert!(err.suggestion.unwrap().contains("echo"));
    }

    #[test]
    fn test_name_distance_ranking() {
        assert_eq!(name_distance("ech", "echo"), Some(0));
        assert_eq!(name_distance("alpha", "cronbach_alpha"), Some(1));
        assert_eq!(edit_distance("pearsn", "pearson"), 1);
        assert_eq!(name_distance("pearsn", "pearson"), Some(2));
        assert_eq!(name_distance("cronbach_alfa", "cronbach_alpha"), Some(3));
        assert_eq!(name_distance("alpha_reliability", "cronbach_alpha"), Some(7));
        assert_eq!(name_distance("kurtosis", "mean"), None);
        assert_eq!(name_distance("", "mean"), None);
    }

    #[test]
    fn test_disabled_backend_is_unavailable() {
        let ctx = CallContext::new().with_capabilities(Capabilities::all().without(Capability::Factor));
        let res = registry().call("gated", &params(), &ctx);
        assert!(!res.valid);
        assert_eq!(res.code.as_deref(), Some(codes::UNAVAILABLE));
        assert_eq!(res.error.as_deref(), Some("factor backend not available"));
    }

    #[test]
    fn test_list_by_family() {
        assert_eq!(registry().list_by_family(Family::Factor), vec!["gated"]);
        let listed = registry().list_methods(Some(Family::Factor));
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }
}
