// ── Run parameters and provisioning context ──
//
// Params are the named external values a run is configured with (API URL,
// credentials, user-defined values referenced from payload templates).
// The provisioning context bundles them with the values only known once
// the run is under way: the organization id and the base URL.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::CoreError;
use crate::model::EntityId;

/// Named run parameters.
///
/// `Debug` lists names only: params routinely carry the account password.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(IndexMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// A boolean parameter; `"true"`/`"false"` strings are accepted too.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn require_str(&self, name: &str) -> Result<&str, CoreError> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(CoreError::InvalidParam {
                name: name.into(),
                reason: format!("expected a string, got {other}"),
            }),
            None => Err(CoreError::MissingParam { name: name.into() }),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Params {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

/// Values resolved during a run and threaded through every stage.
///
/// Built once the organization is known; payload templates are resolved
/// against it, so nothing is created before `organization_id` exists.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    pub organization_id: EntityId,
    pub base_url: Url,
    pub params: Params,
}

impl ProvisioningContext {
    pub fn new(organization_id: EntityId, base_url: Url, params: Params) -> Self {
        Self {
            organization_id,
            base_url,
            params,
        }
    }

    /// Look up a placeholder name: `organizationId`, `baseUrl`, or a param.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "organizationId" => Some(self.organization_id.into()),
            "baseUrl" => Some(Value::String(
                self.base_url.as_str().trim_end_matches('/').to_owned(),
            )),
            _ => self.params.get(name).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::*;

    #[test]
    fn debug_hides_values() {
        let params: Params = [("password", json!("hunter2")), ("slack_active", json!(true))]
            .into_iter()
            .collect();
        let rendered = format!("{params:?}");
        assert!(rendered.contains("password"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn get_bool_accepts_strings() {
        let params: Params = [("a", json!(true)), ("b", json!("false")), ("c", json!(1))]
            .into_iter()
            .collect();
        assert_eq!(params.get_bool("a"), Some(true));
        assert_eq!(params.get_bool("b"), Some(false));
        assert_eq!(params.get_bool("c"), None);
        assert_eq!(params.get_bool("missing"), None);
    }

    #[test]
    fn require_str_reports_missing_and_mistyped() {
        let params: Params = [("port", json!(8080))].into_iter().collect();
        assert!(matches!(
            params.require_str("email"),
            Err(CoreError::MissingParam { .. })
        ));
        assert!(matches!(
            params.require_str("port"),
            Err(CoreError::InvalidParam { .. })
        ));
    }

    #[test]
    fn lookup_prefers_builtins() {
        let params: Params = [("organizationId", json!("shadowed"))].into_iter().collect();
        let ctx = ProvisioningContext::new(
            EntityId::new(9),
            "http://localhost:3000/v1/".parse().unwrap(),
            params,
        );
        assert_eq!(ctx.lookup("organizationId"), Some(json!(9)));
        assert_eq!(ctx.lookup("baseUrl"), Some(json!("http://localhost:3000/v1")));
    }
}
