//! Derivation of event type and data from an inbound message.

use log::*;
use serde_json::Value;

/// A message arriving from the processing pipeline, before it becomes an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    payload: String,
}

impl InboundMessage {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The message rendered as a string, used as event data when no builder
    /// is configured.
    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// The payload parsed as JSON, if it is JSON.
    pub fn as_json(&self) -> Option<Value> {
        serde_json::from_str(&self.payload).ok()
    }
}

/// Evaluates the event type and event data for an inbound message.
pub trait EventBuilder: Send + Sync {
    fn evaluate_event(&self, message: &InboundMessage) -> Option<String>;
    fn evaluate_data(&self, message: &InboundMessage) -> String;
}

/// A single attribute expression. Values starting with `/` are JSON pointers
/// resolved against the message payload; anything else is a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Literal(String),
    Pointer(String),
}

impl Expression {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with('/') {
            Expression::Pointer(raw.to_string())
        } else {
            Expression::Literal(raw.to_string())
        }
    }

    fn resolve(&self, message: &InboundMessage) -> Option<String> {
        match self {
            Expression::Literal(value) => Some(value.clone()),
            Expression::Pointer(pointer) => {
                let json = message.as_json()?;
                match json.pointer(pointer)? {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                }
            }
        }
    }
}

/// `EventBuilder` backed by JSON pointer or literal expressions.
///
/// An event expression that does not resolve yields no event type. A data
/// expression that does not resolve falls back to the whole payload.
#[derive(Debug, Clone, Default)]
pub struct PointerEventBuilder {
    event: Option<Expression>,
    data: Option<Expression>,
}

impl PointerEventBuilder {
    pub fn new(event: Option<&str>, data: Option<&str>) -> Self {
        Self {
            event: event.map(Expression::parse),
            data: data.map(Expression::parse),
        }
    }
}

impl EventBuilder for PointerEventBuilder {
    fn evaluate_event(&self, message: &InboundMessage) -> Option<String> {
        self.event.as_ref().and_then(|e| e.resolve(message))
    }

    fn evaluate_data(&self, message: &InboundMessage) -> String {
        match &self.data {
            Some(expression) => expression.resolve(message).unwrap_or_else(|| {
                debug!("Data expression {expression:?} did not resolve, publishing whole payload");
                message.as_str().to_string()
            }),
            None => message.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_parse_distinguishes_pointer_and_literal() {
        assert_eq!(
            Expression::parse("/type"),
            Expression::Pointer("/type".to_string())
        );
        assert_eq!(
            Expression::parse("push"),
            Expression::Literal("push".to_string())
        );
    }

    #[test]
    fn test_pointer_builder_resolves_string_fields() {
        let builder = PointerEventBuilder::new(Some("/kind"), Some("/body/text"));
        let message = InboundMessage::new(r#"{"kind":"push","body":{"text":"hi"}}"#);

        assert_eq!(builder.evaluate_event(&message), Some("push".to_string()));
        assert_eq!(builder.evaluate_data(&message), "hi");
    }

    #[test]
    fn test_pointer_builder_renders_non_string_values_as_json() {
        let builder = PointerEventBuilder::new(None, Some("/body"));
        let message = InboundMessage::new(r#"{"body":{"n":1}}"#);

        assert_eq!(builder.evaluate_data(&message), r#"{"n":1}"#);
    }

    #[test]
    fn test_pointer_builder_literal_event_type() {
        let builder = PointerEventBuilder::new(Some("update"), None);
        let message = InboundMessage::new("plain text");

        assert_eq!(builder.evaluate_event(&message), Some("update".to_string()));
        assert_eq!(builder.evaluate_data(&message), "plain text");
    }

    #[test]
    fn test_pointer_builder_unresolved_expressions() {
        let builder = PointerEventBuilder::new(Some("/missing"), Some("/missing"));
        let message = InboundMessage::new("not json");

        assert_eq!(builder.evaluate_event(&message), None);
        assert_eq!(builder.evaluate_data(&message), "not json");
    }

    #[test]
    fn test_pointer_builder_null_event_type_is_absent() {
        let builder = PointerEventBuilder::new(Some("/kind"), None);
        let message = InboundMessage::new(r#"{"kind":null}"#);

        assert_eq!(builder.evaluate_event(&message), None);
    }
}
