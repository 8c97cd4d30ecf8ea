//! Tool-call round trips through the host.
//!
//! When the model finishes streaming function-call arguments the coordinator
//! hands the call to a [`ToolCallBridge`] on a separate task. The bridge asks
//! the host to run the tool, converts the result to text content parts and
//! answers the model with a `function_call_output` item followed by
//! `response.create`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::host::{CMD_TOOL_CALL, Command, PROPERTY_TOOL_RESULT, SharedHost};
use crate::core::realtime::{
    ClientEvent, ConversationItem, RealtimeError, RealtimeResult, RequestSender, ToolDefinition,
};

/// Output sent to the model when a tool cannot be run.
pub const TOOL_FAILURE_OUTPUT: &str = r#"{"success":false}"#;

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToolCall {
    pub call_id: String,
    pub name: String,
    /// Raw JSON argument string as streamed by the model
    pub arguments: String,
}

/// One parameter of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// Tool description as registered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    /// JSON-schema tool definition for `session.update`.
    pub fn to_definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({ "type": param.param_type, "description": param.description }),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        ToolDefinition::function(
            self.name.clone(),
            Some(self.description.clone()),
            Some(json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            })),
        )
    }
}

/// Runs tool calls through the host.
#[derive(Clone)]
pub struct ToolCallBridge {
    host: SharedHost,
}

impl ToolCallBridge {
    pub fn new(host: SharedHost) -> Self {
        Self { host }
    }

    /// Execute a call and return the output string for the model.
    /// Every failure maps to [`TOOL_FAILURE_OUTPUT`].
    pub async fn invoke(&self, call: &PendingToolCall) -> String {
        match self.execute(call).await {
            Ok(output) => {
                info!("Tool {} ({}) finished", call.name, call.call_id);
                output
            }
            Err(e) => {
                warn!("Tool {} ({}) failed: {}", call.name, call.call_id, e);
                TOOL_FAILURE_OUTPUT.to_string()
            }
        }
    }

    /// Execute a call and send the output plus a new response request.
    pub async fn relay(&self, sender: &RequestSender, call: PendingToolCall) -> RealtimeResult<()> {
        let output = self.invoke(&call).await;
        sender
            .send_request(ClientEvent::item_create(ConversationItem::function_call_output(
                call.call_id,
                output,
            )))
            .await?;
        sender
            .send_request(ClientEvent::ResponseCreate { response: None })
            .await
    }

    async fn execute(&self, call: &PendingToolCall) -> RealtimeResult<String> {
        let arguments = match serde_json::from_str::<Value>(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                warn!("Tool {} arguments are not JSON ({}), passing raw", call.name, e);
                Value::String(call.arguments.clone())
            }
        };

        let cmd = Command::new(CMD_TOOL_CALL)
            .with_property("name", call.name.clone())
            .with_property("arguments", arguments);

        let result = self
            .host
            .send_cmd(cmd)
            .await
            .map_err(|e| RealtimeError::ToolExecution(e.to_string()))?;

        if !result.is_ok() {
            return Err(RealtimeError::ToolExecution(format!(
                "host returned {:?}",
                result.status
            )));
        }

        let payload = match result.property(PROPERTY_TOOL_RESULT) {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
                .map_err(|e| RealtimeError::ToolExecution(format!("malformed tool result: {e}")))?,
            Some(v) => v.clone(),
            None => {
                return Err(RealtimeError::ToolExecution(
                    "tool result missing".to_string(),
                ));
            }
        };

        let content = payload
            .get("content")
            .ok_or_else(|| RealtimeError::ToolExecution("tool result has no content".to_string()))?;
        let parts = to_text_parts(content)?;
        Ok(serde_json::to_string(&parts)?)
    }
}

/// Keep only text content. A bare string becomes one text part.
fn to_text_parts(content: &Value) -> RealtimeResult<Vec<Value>> {
    match content {
        Value::String(text) => Ok(vec![json!({ "type": "text", "text": text })]),
        Value::Array(parts) => Ok(parts
            .iter()
            .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
            .cloned()
            .collect()),
        other => Err(RealtimeError::ToolExecution(format!(
            "unsupported tool content: {other}"
        ))),
    }
}
