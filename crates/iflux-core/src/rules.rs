// ── Rule preparation ──
//
// Rules point at entities created earlier in the chain (event sources,
// event types, action targets, action types). Those ids only exist once
// the earlier stages have run, so rules are prepared last, right before
// their stage: `{"$ref": "<kind>/<key>"}` objects anywhere in the payload
// are replaced by the referenced item's id.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SLACK_ACTIVE_PARAM;
use crate::context::ProvisioningContext;
use crate::error::CoreError;
use crate::model::{DataCollections, EntityKind};

const REF_KEY: &str = "$ref";

/// Resolve every writable rule payload, rewrite its references and apply
/// the slack toggle. Search-only rules are left as declared. Returns the
/// number of references left unresolved.
pub fn prepare_rules(
    collections: &mut DataCollections,
    ctx: &ProvisioningContext,
) -> Result<usize, CoreError> {
    let Some(rules) = collections.get_mut(EntityKind::Rules) else {
        return Ok(0);
    };

    for (key, item) in rules.iter_mut().filter(|(_, item)| !item.is_search_only()) {
        item.resolve(ctx).map_err(|e| CoreError::Payload {
            item: format!("{}/{key}", EntityKind::Rules),
            message: e.to_string(),
        })?;
    }

    let slack_active = ctx.params.get_bool(SLACK_ACTIVE_PARAM);
    let mut unresolved = 0;
    let keys: Vec<String> = rules
        .iter()
        .filter(|(_, item)| !item.is_search_only())
        .map(|(key, _)| key.to_owned())
        .collect();

    for key in keys {
        let Some(mut data) = collections
            .get(EntityKind::Rules)
            .and_then(|c| c.get(&key))
            .map(|item| item.data().clone())
        else {
            continue;
        };

        unresolved += rewrite_refs(&mut data, collections);
        if let Some(active) = slack_active {
            apply_slack_toggle(&key, &mut data, active);
        }

        if let Some(slot) = collections
            .get_mut(EntityKind::Rules)
            .and_then(|c| c.get_mut(&key))
            .and_then(|item| item.data_mut())
        {
            *slot = data;
        }
    }

    Ok(unresolved)
}

/// Replace `{"$ref": "<kind>/<key>"}` objects with the referenced id.
///
/// A reference to an unknown kind or to an item without an id becomes
/// `null` and is counted.
pub fn rewrite_refs(value: &mut Value, collections: &DataCollections) -> usize {
    if let Some(reference) = as_ref(value) {
        let id = lookup_ref(reference, collections);
        if id.is_none() {
            warn!(reference, "unresolved reference, sending null");
        }
        *value = id.map_or(Value::Null, Value::from);
        return usize::from(id.is_none());
    }

    match value {
        Value::Array(items) => items.iter_mut().map(|v| rewrite_refs(v, collections)).sum(),
        Value::Object(map) => map
            .values_mut()
            .map(|v| rewrite_refs(v, collections))
            .sum(),
        _ => 0,
    }
}

/// Every `<kind>/<key>` reference inside `value`, in document order.
pub fn collect_refs(value: &Value) -> Vec<&str> {
    let mut refs = Vec::new();
    walk_refs(value, &mut refs);
    refs
}

fn walk_refs<'v>(value: &'v Value, refs: &mut Vec<&'v str>) {
    if let Some(reference) = as_ref(value) {
        refs.push(reference);
        return;
    }
    match value {
        Value::Array(items) => items.iter().for_each(|v| walk_refs(v, refs)),
        Value::Object(map) => map.values().for_each(|v| walk_refs(v, refs)),
        _ => {}
    }
}

/// Split a reference into its kind and key.
pub fn parse_ref(reference: &str) -> Option<(EntityKind, &str)> {
    let (kind, key) = reference.split_once('/')?;
    Some((kind.parse().ok()?, key))
}

/// `Some("<kind>/<key>")` if `value` is a reference object.
fn as_ref(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(REF_KEY)?.as_str()
}

fn lookup_ref(reference: &str, collections: &DataCollections) -> Option<u64> {
    let (kind, key) = parse_ref(reference)?;
    let id = collections.id_of(kind, key)?;
    debug!(reference, %id, "reference resolved");
    Some(id.get())
}

/// Rules whose key mentions slack follow the `slack_active` param.
fn apply_slack_toggle(key: &str, data: &mut Value, active: bool) {
    if !key.to_lowercase().contains("slack") {
        return;
    }
    if let Value::Object(map) = data {
        map.insert("active".into(), Value::Bool(active));
    }
}
