//! Query processing: one user utterance in, one composed answer out.

use std::sync::Arc;

use crate::model::{Backend, Message, ModelRequest, ToolCall, ToolChoice, ToolSpec};
use crate::repl::QueryHandler;
use crate::tools::ToolHost;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

/// Tuning for a [`QueryProcessor`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    /// Model calls per query. With `1` tool results are reported but never
    /// sent back to the model.
    pub max_tool_rounds: usize,
    /// Check decoded arguments against the tool's input schema.
    pub validate_arguments: bool,
    pub system_prompt: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_tool_rounds: 1,
            validate_arguments: true,
            system_prompt: None,
        }
    }
}

/// A tool call whose arguments decoded cleanly.
#[derive(Debug)]
struct PlannedCall {
    id: String,
    name: String,
    arguments: Map<String, Value>,
}

/// Drives one query through the model and the tool host.
pub struct QueryProcessor<B, H> {
    backend: B,
    tools: Arc<H>,
    specs: Vec<ToolSpec>,
    options: QueryOptions,
}

impl<B: Backend, H: ToolHost> QueryProcessor<B, H> {
    pub fn new(backend: B, tools: Arc<H>) -> Self {
        let specs = tools.catalog().specs();
        Self {
            backend,
            tools,
            specs,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = QueryOptions {
            max_tool_rounds: options.max_tool_rounds.max(1),
            ..options
        };
        self
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Answer a single query.
    ///
    /// Each exchange starts fresh; nothing carries over between queries.
    /// Answer lines follow encounter order: a choice's free text, then one
    /// `[Tool: ..| Args: ..]` block per executed call.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn process(&self, query: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &self.options.system_prompt {
            messages.push(Message::system(system.as_str()));
        }
        messages.push(Message::user(query));

        let mut answer = Vec::new();
        for round in 1..=self.options.max_tool_rounds {
            let response = self
                .backend
                .call(ModelRequest {
                    messages: &messages,
                    tools: &self.specs,
                    tool_choice: ToolChoice::Auto,
                })
                .await?;
            debug!(round, choices = response.choices.len(), "model answered");

            // Every call is decoded before any runs.
            let planned = response
                .choices
                .iter()
                .map(|choice| {
                    choice
                        .tool_calls
                        .iter()
                        .map(|call| self.decode(call))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;

            let mut executed = 0;
            for (choice, calls) in response.choices.into_iter().zip(planned) {
                if let Some(text) = choice.text() {
                    answer.push(text.to_string());
                }
                messages.push(choice);

                for call in calls {
                    let args = Value::Object(call.arguments.clone());
                    info!(tool = %call.name, %args, "calling tool");
                    let result = self.tools.execute(&call.name, call.arguments).await?;
                    let text = result.rendered();
                    answer.push(format!("[Tool: {} | Args: {args}]\nResult: {text}", call.name));
                    messages.push(Message::tool(call.id, call.name, text));
                    executed += 1;
                }
            }

            if executed == 0 {
                break;
            }
        }

        Ok(answer.join("\n"))
    }

    fn decode(&self, call: &ToolCall) -> Result<PlannedCall> {
        let malformed = |reason: String| Error::MalformedToolCall {
            name: call.name.clone(),
            reason,
        };

        let raw = call.arguments.trim();
        let value = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw)
                .map_err(|e| malformed(format!("arguments are not valid JSON: {e}")))?
        };
        let arguments = match value {
            Value::Object(arguments) => arguments,
            other => {
                return Err(malformed(format!("arguments must be a JSON object, got {other}")));
            }
        };

        // Unknown names are left for the provider to reject.
        if self.options.validate_arguments
            && let Some(tool) = self.tools.catalog().get(&call.name)
        {
            tool.validate_arguments(&arguments).map_err(malformed)?;
        }

        Ok(PlannedCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

impl<B: Backend, H: ToolHost> QueryHandler for QueryProcessor<B, H> {
    async fn handle(&self, query: &str) -> Result<String> {
        self.process(query).await
    }
}
