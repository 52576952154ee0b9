// ── Two-phase payloads ──
//
// An item's payload is declared as a JSON template and turned into the
// concrete request body by a resolver, once the provisioning context
// exists. The default resolver substitutes `{{name}}` placeholders.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::context::ProvisioningContext;
use crate::error::CoreError;

/// Turns a payload template into a concrete payload.
pub trait Resolve: Send + Sync {
    fn resolve(&self, template: &Value, ctx: &ProvisioningContext) -> Result<Value, CoreError>;
}

impl<F> Resolve for F
where
    F: Fn(&Value, &ProvisioningContext) -> Result<Value, CoreError> + Send + Sync,
{
    fn resolve(&self, template: &Value, ctx: &ProvisioningContext) -> Result<Value, CoreError> {
        self(template, ctx)
    }
}

/// Payload template plus the resolver that finalizes it.
#[derive(Clone)]
pub struct Payload {
    template: Value,
    resolver: Arc<dyn Resolve>,
}

impl Payload {
    /// A template resolved with [`Placeholders`].
    pub fn new(template: Value) -> Self {
        Self::with_resolver(template, Placeholders)
    }

    pub fn with_resolver(template: Value, resolver: impl Resolve + 'static) -> Self {
        Self {
            template,
            resolver: Arc::new(resolver),
        }
    }

    pub fn template(&self) -> &Value {
        &self.template
    }

    pub fn resolve(&self, ctx: &ProvisioningContext) -> Result<Value, CoreError> {
        self.resolver.resolve(&self.template, ctx)
    }
}

impl From<Value> for Payload {
    fn from(template: Value) -> Self {
        Self::new(template)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.template.serialize(serializer)
    }
}

// ── Placeholder substitution ────────────────────────────────────────

/// Default resolver: replaces `{{name}}` in every string of the template
/// with [`ProvisioningContext::lookup`].
///
/// A string that is exactly one placeholder takes the looked-up value
/// with its JSON type (`"{{slack_active}}"` may become `true`). Inside
/// longer strings, values are spliced in as text. Object keys are left
/// untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Placeholders;

impl Resolve for Placeholders {
    fn resolve(&self, template: &Value, ctx: &ProvisioningContext) -> Result<Value, CoreError> {
        substitute(template, ctx)
    }
}

fn substitute(value: &Value, ctx: &ProvisioningContext) -> Result<Value, CoreError> {
    match value {
        Value::String(s) => substitute_str(s, ctx),
        Value::Array(items) => items
            .iter()
            .map(|v| substitute(v, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), substitute(v, ctx)?)))
            .collect::<Result<serde_json::Map<_, _>, CoreError>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

fn substitute_str(s: &str, ctx: &ProvisioningContext) -> Result<Value, CoreError> {
    if let Some(name) = whole_placeholder(s) {
        return lookup(name, ctx);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + len].trim();
        match lookup(name, ctx)? {
            Value::String(text) => out.push_str(&text),
            other => out.push_str(&other.to_string()),
        }
        rest = &rest[start + 2 + len + 2..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

/// `Some(name)` if `s` is exactly `{{ name }}`.
fn whole_placeholder(s: &str) -> Option<&str> {
    let inner = s.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

fn lookup(name: &str, ctx: &ProvisioningContext) -> Result<Value, CoreError> {
    ctx.lookup(name)
        .ok_or_else(|| CoreError::UnresolvedPlaceholder { name: name.into() })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::context::Params;
    use crate::model::EntityId;

    fn ctx() -> ProvisioningContext {
        let params: Params = [
            ("publibike_url", json!("http://publibike.local:3001")),
            ("slack_active", json!(true)),
            ("schemas", json!("http://iflux.io/schemas")),
        ]
        .into_iter()
        .collect();
        ProvisioningContext::new(
            EntityId::new(5),
            "http://localhost:3000/v1".parse().unwrap(),
            params,
        )
    }

    #[test]
    fn substitutes_nested_strings() {
        let template = json!({
            "name": "PubliBike",
            "configuration": { "url": "{{publibike_url}}/configure" },
            "type": "{{ schemas }}/eventTypes/bikeStation",
            "tags": ["org-{{organizationId}}"]
        });

        let resolved = Payload::new(template).resolve(&ctx()).unwrap();

        assert_eq!(
            resolved,
            json!({
                "name": "PubliBike",
                "configuration": { "url": "http://publibike.local:3001/configure" },
                "type": "http://iflux.io/schemas/eventTypes/bikeStation",
                "tags": ["org-5"]
            })
        );
    }

    #[test]
    fn whole_placeholder_keeps_json_type() {
        let resolved = Payload::new(json!({ "active": "{{slack_active}}", "org": "{{organizationId}}" }))
            .resolve(&ctx())
            .unwrap();
        assert_eq!(resolved, json!({ "active": true, "org": 5 }));
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let err = Payload::new(json!({ "url": "{{nope}}/x" }))
            .resolve(&ctx())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnresolvedPlaceholder { ref name } if name == "nope"));
    }

    #[test]
    fn unterminated_braces_are_literal() {
        let resolved = Payload::new(json!("a {{ b")).resolve(&ctx()).unwrap();
        assert_eq!(resolved, json!("a {{ b"));
    }

    #[test]
    fn custom_resolver_replaces_template() {
        let payload = Payload::with_resolver(
            json!({ "name": "x" }),
            |_: &Value, ctx: &ProvisioningContext| -> Result<Value, CoreError> {
                Ok(json!({ "name": "computed", "base": ctx.base_url.as_str() }))
            },
        );
        assert_eq!(
            payload.resolve(&ctx()).unwrap(),
            json!({ "name": "computed", "base": "http://localhost:3000/v1" })
        );
    }
}
