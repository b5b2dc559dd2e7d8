//! Interpretation of action responses

use serde_json::Value;

use crate::error::AuraError;
use crate::results::DiscoveredNameSets;

const SUCCESS_MARKER: &str = "\"success\":true";
const INVALID_TYPE_MARKER: &str = "INVALID_TYPE";
const RULE: &str = "──────────────────";

/// First action of a response, checked for `SUCCESS`
fn first_successful_action(body: &str) -> Result<Value, AuraError> {
    let mut root: Value = serde_json::from_str(body)?;

    let action = root
        .get_mut("actions")
        .and_then(Value::as_array_mut)
        .filter(|actions| !actions.is_empty())
        .map(|actions| actions.swap_remove(0))
        .ok_or(AuraError::NoActions)?;

    let state = action.get("state").and_then(Value::as_str).unwrap_or_default();
    if state != "SUCCESS" {
        return Err(AuraError::ActionState(state.to_string()));
    }
    Ok(action)
}

/// Object names from a discovery response, split into standard and custom
pub fn parse_discovery_response(body: &str) -> Result<DiscoveredNameSets, AuraError> {
    let action = first_successful_action(body)?;
    let names = action
        .pointer("/returnValue/apiNamesToKeyPrefixes")
        .and_then(Value::as_object)
        .ok_or(AuraError::MissingField("apiNamesToKeyPrefixes"))?;

    Ok(names.keys().cloned().collect())
}

/// Quick check that an object request hit a real object
pub fn object_exists(body: &str) -> bool {
    body.contains(SUCCESS_MARKER) && !body.contains(INVALID_TYPE_MARKER)
}

/// Records returned for one object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecords {
    pub object: String,
    pub records: Vec<Value>,
}

impl ObjectRecords {
    /// Operator-facing payload stored under the object's name
    pub fn render(&self, request_id: usize, retrieved_at: &str) -> String {
        let header = format!("Request: {} | Retrieved: {}\n", request_id, retrieved_at);

        if self.records.is_empty() {
            return format!("{}No data found for object '{}'\nResult: []", header, self.object);
        }

        let json = serde_json::to_string_pretty(&self.records)
            .unwrap_or_else(|_| Value::Array(self.records.clone()).to_string());
        format!(
            "{}Records found: {}\n\nJSON Result Data:\n{}\n\n{}",
            header,
            self.records.len(),
            RULE,
            json
        )
    }
}

/// Records from an object listing response
pub fn parse_object_response(body: &str, object: &str) -> Result<ObjectRecords, AuraError> {
    let mut action = first_successful_action(body)?;
    let records = match action.pointer_mut("/returnValue/result").map(Value::take) {
        Some(Value::Array(records)) => records,
        _ => return Err(AuraError::MissingField("result")),
    };

    Ok(ObjectRecords {
        object: object.to_string(),
        records,
    })
}
