//! Typed model of the chat platform's webhook envelope.
//!
//! Interactive card clicks carry their state in `common.formInputs`, where every value is
//! a JSON document encoded as a string (`"{\"id\":3}"`). [`decode_selection`] is the one
//! place that second layer is parsed; a malformed item is dropped with a warning and the
//! remaining items are still processed.

use crate::model::OutcomeType;
use crate::tracker::OutcomeSelection;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Message,
    CardClicked,
    AddedToSpace,
    RemovedFromSpace,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub text: Option<String>,
    /// Message text with the bot @-mention stripped.
    #[serde(default)]
    pub argument_text: Option<String>,
    #[serde(default)]
    pub sender: Option<ChatUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionParameter {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardActionPayload {
    #[serde(default)]
    pub action_method_name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StringInputs {
    #[serde(default)]
    pub value: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInput {
    #[serde(default)]
    pub string_inputs: Option<StringInputs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonEventObject {
    #[serde(default)]
    pub invoked_function: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub form_inputs: HashMap<String, FormInput>,
}

/// Inbound event envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub user: Option<ChatUser>,
    #[serde(default)]
    pub action: Option<CardActionPayload>,
    #[serde(default)]
    pub common: Option<CommonEventObject>,
}

fn non_empty(s: Option<&String>) -> Option<&str> {
    s.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl ChatEvent {
    /// Sender email from the message, falling back to the event's user.
    pub fn sender_email(&self) -> Option<&str> {
        let from_message = self
            .message
            .as_ref()
            .and_then(|m| m.sender.as_ref())
            .and_then(|s| non_empty(s.email.as_ref()));
        from_message.or_else(|| self.user.as_ref().and_then(|u| non_empty(u.email.as_ref())))
    }

    pub fn sender_name(&self) -> Option<&str> {
        let from_message = self
            .message
            .as_ref()
            .and_then(|m| m.sender.as_ref())
            .and_then(|s| non_empty(s.display_name.as_ref()));
        from_message.or_else(|| {
            self.user
                .as_ref()
                .and_then(|u| non_empty(u.display_name.as_ref()))
        })
    }

    /// Trimmed message text, preferring the mention-free `argumentText`.
    pub fn message_text(&self) -> Option<&str> {
        let m = self.message.as_ref()?;
        non_empty(m.argument_text.as_ref()).or_else(|| non_empty(m.text.as_ref()))
    }

    /// Card action name from `action.actionMethodName` or `common.invokedFunction`.
    pub fn method_name(&self) -> Option<&str> {
        self.action
            .as_ref()
            .and_then(|a| non_empty(a.action_method_name.as_ref()))
            .or_else(|| {
                self.common
                    .as_ref()
                    .and_then(|c| non_empty(c.invoked_function.as_ref()))
            })
    }

    /// Action parameter by key; `action.parameters` wins over `common.parameters`.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.action
            .as_ref()
            .and_then(|a| a.parameters.iter().find(|p| p.key == key))
            .map(|p| p.value.as_str())
            .or_else(|| {
                self.common
                    .as_ref()
                    .and_then(|c| c.parameters.get(key))
                    .map(String::as_str)
            })
    }

    /// Raw string values of one form input.
    pub fn form_values(&self, name: &str) -> Vec<&str> {
        self.common
            .as_ref()
            .and_then(|c| c.form_inputs.get(name))
            .and_then(|f| f.string_inputs.as_ref())
            .map(|s| s.value.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Values of every form input whose name starts with `prefix`, in input-name order.
    pub fn form_values_with_prefix(&self, prefix: &str) -> Vec<&str> {
        let Some(common) = self.common.as_ref() else {
            return Vec::new();
        };
        let mut names: Vec<&String> = common
            .form_inputs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| self.form_values(name))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("form value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("outcome id {0:?} is not a number")]
    BadId(String),
    #[error("unknown outcome type {0:?}")]
    UnknownType(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdWire {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectionWire {
    Bare(i64),
    Existing {
        id: IdWire,
    },
    Custom {
        text: String,
        #[serde(default, rename = "type")]
        outcome_type: Option<String>,
    },
}

/// Decode one JSON-encoded form value into a selection.
///
/// Accepted shapes: `3`, `{"id":3}`, `{"id":"3"}` and
/// `{"text":"...","type":"Earning"}` (type defaults to `default_type`).
pub fn decode_selection(raw: &str, default_type: OutcomeType) -> Result<OutcomeSelection, SelectionError> {
    match serde_json::from_str::<SelectionWire>(raw.trim())? {
        SelectionWire::Bare(id) | SelectionWire::Existing { id: IdWire::Number(id) } => {
            Ok(OutcomeSelection::Existing(id))
        }
        SelectionWire::Existing { id: IdWire::Text(s) } => s
            .trim()
            .parse::<i64>()
            .map(OutcomeSelection::Existing)
            .map_err(|_| SelectionError::BadId(s)),
        SelectionWire::Custom { text, outcome_type } => {
            let outcome_type = match outcome_type {
                Some(label) => {
                    OutcomeType::parse(&label).ok_or(SelectionError::UnknownType(label))?
                }
                None => default_type,
            };
            Ok(OutcomeSelection::Custom { text, outcome_type })
        }
    }
}

/// Decode every value, dropping (and logging) the malformed ones.
pub fn decode_selections<'a>(
    values: impl IntoIterator<Item = &'a str>,
    default_type: OutcomeType,
) -> Vec<OutcomeSelection> {
    values
        .into_iter()
        .filter_map(|raw| match decode_selection(raw, default_type) {
            Ok(sel) => Some(sel),
            Err(e) => {
                tracing::warn!(value = raw, error = %e, "dropping malformed form value");
                None
            }
        })
        .collect()
}

/// Outcome ids only; custom selections are dropped.
pub fn decode_outcome_ids<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<i64> {
    decode_selections(values, OutcomeType::Earning)
        .into_iter()
        .filter_map(|sel| match sel {
            OutcomeSelection::Existing(id) => Some(id),
            OutcomeSelection::Custom { text, .. } => {
                tracing::warn!(text = %text, "custom outcome where an id was expected");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_event_fields() {
        let event: ChatEvent = serde_json::from_value(json!({
            "type": "MESSAGE",
            "message": {
                "text": "@StarApp  Progress ",
                "argumentText": " Progress ",
                "sender": { "email": "ada@example.com", "displayName": "Ada Lovelace" }
            }
        }))
        .expect("decode");
        assert_eq!(event.event_type, EventType::Message);
        assert_eq!(event.message_text(), Some("Progress"));
        assert_eq!(event.sender_email(), Some("ada@example.com"));
        assert_eq!(event.sender_name(), Some("Ada Lovelace"));
    }

    #[test]
    fn unknown_event_type_is_other() {
        let event: ChatEvent =
            serde_json::from_value(json!({ "type": "WIDGET_UPDATED" })).expect("decode");
        assert_eq!(event.event_type, EventType::Other);
        let empty: ChatEvent = serde_json::from_value(json!({})).expect("decode");
        assert_eq!(empty.event_type, EventType::Other);
    }

    #[test]
    fn card_click_reads_user_and_form_inputs() {
        let event: ChatEvent = serde_json::from_value(json!({
            "type": "CARD_CLICKED",
            "user": { "email": "ada@example.com" },
            "common": {
                "invokedFunction": "submitOutcomes",
                "formInputs": {
                    "outcomes_Learning": { "stringInputs": { "value": ["{\"id\":1}", "{\"id\":2}"] } },
                    "outcomes_Earning": { "stringInputs": { "value": ["{\"id\":4}"] } },
                    "customOutcome": { "stringInputs": { "value": ["Ship it"] } }
                }
            }
        }))
        .expect("decode");
        assert_eq!(event.sender_email(), Some("ada@example.com"));
        assert_eq!(event.method_name(), Some("submitOutcomes"));
        assert_eq!(event.form_values("customOutcome"), vec!["Ship it"]);
        assert_eq!(
            event.form_values_with_prefix("outcomes"),
            vec!["{\"id\":4}", "{\"id\":1}", "{\"id\":2}"]
        );
    }

    #[test]
    fn action_parameters_take_precedence() {
        let event: ChatEvent = serde_json::from_value(json!({
            "type": "CARD_CLICKED",
            "action": {
                "actionMethodName": "addEarningOutcome",
                "parameters": [{ "key": "text", "value": "from action" }]
            },
            "common": { "parameters": { "text": "from common", "other": "x" } }
        }))
        .expect("decode");
        assert_eq!(event.method_name(), Some("addEarningOutcome"));
        assert_eq!(event.parameter("text"), Some("from action"));
        assert_eq!(event.parameter("other"), Some("x"));
        assert_eq!(event.parameter("missing"), None);
    }

    #[test]
    fn selection_shapes() {
        assert_eq!(
            decode_selection("7", OutcomeType::Learning).expect("bare"),
            OutcomeSelection::Existing(7)
        );
        assert_eq!(
            decode_selection(r#"{"id":"12"}"#, OutcomeType::Learning).expect("string id"),
            OutcomeSelection::Existing(12)
        );
        assert_eq!(
            decode_selection(r#"{"text":"Pair on bugfix","type":"contribution"}"#, OutcomeType::Earning)
                .expect("custom"),
            OutcomeSelection::Custom {
                text: "Pair on bugfix".into(),
                outcome_type: OutcomeType::Contribution
            }
        );
        assert_eq!(
            decode_selection(r#"{"text":"Sell"}"#, OutcomeType::Earning).expect("default type"),
            OutcomeSelection::Custom {
                text: "Sell".into(),
                outcome_type: OutcomeType::Earning
            }
        );
    }

    #[test]
    fn malformed_items_are_dropped_individually() {
        let values = ["{\"id\":1}", "{not json", r#"{"id":"abc"}"#, r#"{"text":"x","type":"Fun"}"#, "3"];
        let decoded = decode_selections(values, OutcomeType::Earning);
        assert_eq!(
            decoded,
            vec![OutcomeSelection::Existing(1), OutcomeSelection::Existing(3)]
        );
    }

    #[test]
    fn outcome_ids_skip_custom_entries() {
        let ids = decode_outcome_ids(["{\"id\":5}", r#"{"text":"free"}"#, "[]"]);
        assert_eq!(ids, vec![5]);
    }
}
