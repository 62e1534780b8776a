//! Block dispatch: runs one block against the current context.
//!
//! [`Dispatcher::execute`] returns a [`BlockResult`] describing the block's
//! output, the edges to follow next and any error. An `Err` return is a
//! thrown error (unresolvable placeholder, bad definition) and is always
//! fatal to the run. A result with `throws: true` is a fatal block failure;
//! with `throws: false` the error is recorded and the edges still followed.
//!
//! The dispatcher never recurses. Iterator bodies and `$vars` changes are
//! handed back to the engine through [`BlockResult::iterate`] and
//! [`BlockResult::vars`].

use std::sync::Arc;

use flowline_store::EntityStorage;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, trace, warn};

use crate::collaborators::{
    CompletionClient, CompletionRequest, EmailMessage, HttpClient, HttpRequest, Mailer,
};
use crate::condition::{evaluate_if, select_case};
use crate::context::RunContext;
use crate::error::{EngineError, Result};
use crate::graph::{Node, NodeId};
use crate::registry::{BlockKind, FieldType};
use crate::resolver::{TemplateResolver, lookup, single_placeholder, value_to_string};

/// Edge label of an iterator's per-item branch.
pub const LOOP_NEXT: &str = "loopNext";
/// Edge label followed once an iterator is exhausted.
pub const LOOP_END: &str = "loopEnd";

const CONTINUE_ON_ERROR: &str = "continueOnError";

/// Per-item body of an iterator block.
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    pub items: Vec<Value>,
    /// Targets of the `loopNext` edges, run once per item.
    pub body: Vec<NodeId>,
}

/// Outcome of dispatching one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockResult {
    pub output: Value,
    pub next: Vec<NodeId>,
    pub error: Option<String>,
    /// The error is fatal to the run.
    pub throws: bool,
    pub iterate: Option<Iteration>,
    /// Replacement `$vars` for the rest of the traversal.
    pub vars: Option<Map<String, Value>>,
}

impl BlockResult {
    pub fn ok(output: Value, next: Vec<NodeId>) -> Self {
        Self {
            output,
            next,
            error: None,
            throws: false,
            iterate: None,
            vars: None,
        }
    }

    /// A fatal failure.
    pub fn fatal(output: Value, error: impl Into<String>) -> Self {
        Self {
            output,
            next: Vec::new(),
            error: Some(error.into()),
            throws: true,
            iterate: None,
            vars: None,
        }
    }

    /// A failure that is recorded but does not stop the traversal.
    pub fn tolerated(output: Value, error: impl Into<String>, next: Vec<NodeId>) -> Self {
        Self {
            output,
            next,
            error: Some(error.into()),
            throws: false,
            iterate: None,
            vars: None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.error.is_some() && self.throws
    }
}

/// Collaborators the side-effect blocks call out to.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn TemplateResolver>,
    entities: Arc<dyn EntityStorage>,
    http: Arc<dyn HttpClient>,
    completions: Arc<dyn CompletionClient>,
    mailer: Arc<dyn Mailer>,
}

impl Dispatcher {
    pub fn new(
        resolver: Arc<dyn TemplateResolver>,
        entities: Arc<dyn EntityStorage>,
        http: Arc<dyn HttpClient>,
        completions: Arc<dyn CompletionClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            resolver,
            entities,
            http,
            completions,
            mailer,
        }
    }

    /// Execute one block.
    pub async fn execute(&self, node: &Node, ctx: &RunContext) -> Result<BlockResult> {
        debug!(block_id = %node.block.id, kind = %node.kind, "Dispatching block");

        match node.kind {
            BlockKind::ManualTrigger | BlockKind::EventTrigger | BlockKind::WaitForInput => {
                Ok(accept_payload(node, ctx))
            }
            BlockKind::If => {
                let result = evaluate_if(&node.block.condition_groups, ctx)?;
                let label = if result { "true" } else { "false" };
                let next = outcome_targets(node, label)?;
                Ok(BlockResult::ok(json!({ "result": result }), next))
            }
            BlockKind::Switch => {
                let case = select_case(&node.block.condition_groups, ctx)?;
                let next = outcome_targets(node, &case)?;
                Ok(BlockResult::ok(json!({ "case": case }), next))
            }
            BlockKind::HttpRequest => self.http_request(node, ctx).await,
            BlockKind::CreateRecord
            | BlockKind::GetRecord
            | BlockKind::UpdateRecord
            | BlockKind::DeleteRecord => self.record(node, ctx),
            BlockKind::SendEmail => self.send_email(node, ctx).await,
            BlockKind::AiCompletion => self.ai_completion(node, ctx).await,
            BlockKind::Iterator => iterator(node, ctx),
            BlockKind::Variable => self.variable(node, ctx),
            BlockKind::DoNothing | BlockKind::Log | BlockKind::AlertUser => {
                Ok(self.passive(node, ctx))
            }
        }
    }

    /// Resolve a block's input and parse it into its typed shape.
    ///
    /// Placeholder failures propagate as errors; a shape mismatch comes back
    /// as `Ok(Err(message))` so callers can honor `continueOnError`.
    fn typed_input<T: DeserializeOwned>(
        &self,
        node: &Node,
        ctx: &RunContext,
    ) -> Result<std::result::Result<T, String>> {
        let resolved = self.resolver.resolve_input(&node.block.input, ctx)?;
        Ok(serde_json::from_value(Value::Object(resolved))
            .map_err(|e| format!("invalid {} input: {}", node.kind, e)))
    }

    async fn http_request(&self, node: &Node, ctx: &RunContext) -> Result<BlockResult> {
        let input: HttpInput = match self.typed_input(node, ctx)? {
            Ok(input) => input,
            Err(message) => return Ok(failure(node, Value::Null, message)),
        };

        let request = HttpRequest {
            url: input.url,
            method: input.method,
            headers: input
                .headers
                .into_iter()
                .map(|(k, v)| (k, value_to_string(&v)))
                .collect(),
            body: input.body,
        };

        match self.http.send(request).await {
            Ok(response) => {
                let output = json!({
                    "statusCode": response.status_code,
                    "body": response.body,
                });
                if response.status_code >= 400 {
                    let message = format!("HTTP request failed with status {}", response.status_code);
                    Ok(failure(node, output, message))
                } else {
                    Ok(BlockResult::ok(output, node.all_targets()))
                }
            }
            Err(e) => Ok(failure(node, Value::Null, e.to_string())),
        }
    }

    fn record(&self, node: &Node, ctx: &RunContext) -> Result<BlockResult> {
        let input: RecordInput = match self.typed_input(node, ctx)? {
            Ok(input) => input,
            Err(message) => return Ok(failure(node, Value::Null, message)),
        };
        let entity = input.entity.as_str();
        let id = input.id.as_ref().map(value_to_string);

        let outcome = match (node.kind, id) {
            (BlockKind::CreateRecord, _) => match input.data {
                Some(data @ Value::Object(_)) => self
                    .entities
                    .create_row(entity, data)
                    .map(|row| Some(row_output(&row.id, row.data))),
                _ => return Ok(failure(node, Value::Null, "createRecord requires object 'data'")),
            },
            (BlockKind::GetRecord, Some(id)) => self
                .entities
                .get_row(entity, &id)
                .map(|row| row.map(|r| row_output(&r.id, r.data))),
            (BlockKind::UpdateRecord, Some(id)) => match input.data {
                Some(data @ Value::Object(_)) => self
                    .entities
                    .update_row(entity, &id, data)
                    .map(|row| row.map(|r| row_output(&r.id, r.data))),
                _ => return Ok(failure(node, Value::Null, "updateRecord requires object 'data'")),
            },
            (BlockKind::DeleteRecord, Some(id)) => self
                .entities
                .delete_row(entity, &id)
                .map(|deleted| deleted.then(|| json!({ "deleted": true }))),
            (kind, _) => {
                return Ok(failure(node, Value::Null, format!("{} requires 'id'", kind)));
            }
        };

        match outcome {
            Ok(Some(output)) => Ok(BlockResult::ok(output, node.all_targets())),
            Ok(None) => {
                let message = format!(
                    "record '{}' not found in '{}'",
                    input.id.as_ref().map(value_to_string).unwrap_or_default(),
                    entity
                );
                Ok(failure(node, Value::Null, message))
            }
            Err(e) => Ok(failure(node, Value::Null, e.to_string())),
        }
    }

    async fn send_email(&self, node: &Node, ctx: &RunContext) -> Result<BlockResult> {
        let input: EmailInput = match self.typed_input(node, ctx)? {
            Ok(input) => input,
            Err(message) => return Ok(failure(node, Value::Null, message)),
        };

        let message = EmailMessage {
            provider: input.provider,
            from: input.from,
            to: input.to.into_vec(),
            subject: input.subject,
            body: input.body,
            api_key: input.api_key,
        };
        if message.to.is_empty() {
            return Ok(failure(node, Value::Null, "sendEmail requires at least one recipient"));
        }

        match self.mailer.send(message).await {
            Ok(true) => Ok(BlockResult::ok(json!({ "sent": true }), node.all_targets())),
            Ok(false) => Ok(failure(
                node,
                json!({ "sent": false }),
                "email provider rejected the message",
            )),
            Err(e) => Ok(failure(node, Value::Null, e.to_string())),
        }
    }

    async fn ai_completion(&self, node: &Node, ctx: &RunContext) -> Result<BlockResult> {
        let input: AiInput = match self.typed_input(node, ctx)? {
            Ok(input) => input,
            Err(message) => return Ok(failure(node, Value::Null, message)),
        };

        let request = CompletionRequest {
            model: input.model,
            prompt: input.prompt,
            system: input.system,
            api_key: input.api_key,
        };

        match self.completions.complete(request).await {
            Ok(text) => Ok(BlockResult::ok(json!({ "text": text }), node.all_targets())),
            Err(e) => Ok(failure(node, Value::Null, e.to_string())),
        }
    }

    fn variable(&self, node: &Node, ctx: &RunContext) -> Result<BlockResult> {
        let input: VariableInput = match self.typed_input(node, ctx)? {
            Ok(input) => input,
            Err(message) => return Ok(failure(node, Value::Null, message)),
        };

        let mut vars = ctx.vars();
        match (input.set, input.name) {
            (Some(set), _) => vars.extend(set),
            (None, Some(name)) if !name.is_empty() => {
                vars.insert(name, input.value.unwrap_or(Value::Null));
            }
            _ => {
                return Ok(failure(
                    node,
                    Value::Null,
                    "variable block requires 'name' or 'set'",
                ));
            }
        }

        let mut result = BlockResult::ok(Value::Object(vars.clone()), node.all_targets());
        result.vars = Some(vars);
        Ok(result)
    }

    /// `doNothing`, `log` and `alertUser`. These never fail the run: an
    /// unresolvable input is recorded as a step error and the raw input used.
    fn passive(&self, node: &Node, ctx: &RunContext) -> BlockResult {
        let (input, resolve_error) = match self.resolver.resolve_input(&node.block.input, ctx) {
            Ok(resolved) => (resolved, None),
            Err(e) => (node.block.input.clone(), Some(e.to_string())),
        };

        let output = match node.kind {
            BlockKind::Log => emit_log(node, &input),
            BlockKind::AlertUser => emit_alert(node, &input),
            _ => Value::Object(input),
        };

        match resolve_error {
            Some(message) => BlockResult::tolerated(output, message, node.all_targets()),
            None => BlockResult::ok(output, node.all_targets()),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Family helpers
// ---------------------------------------------------------------------------

/// Whether a block downgrades its own failures.
///
/// Read from the unresolved input so a placeholder can't toggle it.
pub fn continue_on_error(node: &Node) -> bool {
    node.block
        .input
        .get(CONTINUE_ON_ERROR)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// A side-effect failure: fatal unless the block sets `continueOnError`.
fn failure(node: &Node, output: Value, message: impl Into<String>) -> BlockResult {
    let message = message.into();
    if continue_on_error(node) {
        debug!(block_id = %node.block.id, error = %message, "Tolerated block failure");
        BlockResult::tolerated(output, message, node.all_targets())
    } else {
        BlockResult::fatal(output, message)
    }
}

/// Triggers and `waitForInput`: validate `$params` and output it.
fn accept_payload(node: &Node, ctx: &RunContext) -> BlockResult {
    let payload = ctx.params().clone();
    match validate_fields(&node.block.input, &payload) {
        Ok(()) => BlockResult::ok(payload, node.all_targets()),
        Err(message) => BlockResult::fatal(Value::Null, message),
    }
}

#[derive(Debug, Deserialize)]
struct FieldDecl {
    name: String,
    #[serde(rename = "type", default)]
    field_type: FieldType,
    #[serde(default)]
    required: bool,
}

/// Check a payload against the optional `fields` declaration of a block.
pub fn validate_fields(input: &Map<String, Value>, payload: &Value) -> std::result::Result<(), String> {
    let Some(fields) = input.get("fields") else {
        return Ok(());
    };
    let fields: Vec<FieldDecl> = serde_json::from_value(fields.clone())
        .map_err(|e| format!("invalid field declaration: {}", e))?;
    if fields.is_empty() {
        return Ok(());
    }

    let empty = Map::new();
    let object = match payload {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err("payload must be a JSON object".into()),
    };

    for field in &fields {
        match object.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(format!("missing required field '{}'", field.name));
            }
            None | Some(Value::Null) => {}
            Some(value) if !field.field_type.accepts(value) => {
                return Err(format!(
                    "field '{}' must be of type {}",
                    field.name,
                    serde_json::to_value(field.field_type)
                        .map(|v| value_to_string(&v))
                        .unwrap_or_default()
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Targets of the edge labeled with a branching block's outcome.
fn outcome_targets(node: &Node, label: &str) -> Result<Vec<NodeId>> {
    let targets = node.targets_labeled(label);
    if targets.is_empty() {
        return Err(EngineError::Definition(format!(
            "{} block '{}' has no '{}' edge",
            node.kind, node.block.id, label
        )));
    }
    Ok(targets)
}

fn iterator(node: &Node, ctx: &RunContext) -> Result<BlockResult> {
    let body = node.targets_labeled(LOOP_NEXT);
    if body.is_empty() {
        return Err(EngineError::Definition(format!(
            "iterator block '{}' has no {} edge",
            node.block.id, LOOP_NEXT
        )));
    }

    let source = match node.block.input.get("array") {
        Some(Value::String(path)) => {
            let path = single_placeholder(path).unwrap_or(path.trim());
            lookup(ctx, path)?
        }
        Some(literal @ Value::Array(_)) => literal.clone(),
        _ => {
            return Err(EngineError::Definition(format!(
                "iterator block '{}' requires an 'array' path",
                node.block.id
            )));
        }
    };

    let items = match source {
        Value::Array(items) => items,
        other => {
            return Ok(BlockResult::fatal(
                Value::Null,
                format!("iterator source is not an array (got {})", type_name(&other)),
            ));
        }
    };

    let mut result = BlockResult::ok(
        json!({ "count": items.len() }),
        node.targets_labeled(LOOP_END),
    );
    result.iterate = Some(Iteration { items, body });
    Ok(result)
}

fn emit_log(node: &Node, input: &Map<String, Value>) -> Value {
    let message = input.get("message").map(value_to_string).unwrap_or_default();
    let level = input
        .get("level")
        .and_then(Value::as_str)
        .unwrap_or("info")
        .to_ascii_lowercase();
    let block_id = node.block.id.as_str();

    let level = match level.as_str() {
        "trace" => {
            trace!(block_id, "{}", message);
            "trace"
        }
        "debug" => {
            debug!(block_id, "{}", message);
            "debug"
        }
        "warn" | "warning" => {
            warn!(block_id, "{}", message);
            "warn"
        }
        "error" => {
            error!(block_id, "{}", message);
            "error"
        }
        _ => {
            info!(block_id, "{}", message);
            "info"
        }
    };
    json!({ "message": message, "level": level })
}

fn emit_alert(node: &Node, input: &Map<String, Value>) -> Value {
    let message = input.get("message").map(value_to_string).unwrap_or_default();
    let title = input.get("title").map(value_to_string);
    warn!(block_id = %node.block.id, title = ?title, alert = true, "{}", message);

    let mut output = json!({ "message": message, "level": "warning" });
    if let Some(title) = title {
        output["title"] = Value::String(title);
    }
    output
}

fn row_output(id: &str, data: Value) -> Value {
    json!({ "id": id, "data": data })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Typed inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HttpInput {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: Map<String, Value>,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize)]
struct RecordInput {
    entity: String,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailInput {
    #[serde(default = "default_provider")]
    provider: String,
    from: String,
    to: Recipients,
    subject: String,
    body: String,
    api_key: String,
}

fn default_provider() -> String {
    "resend".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    /// A single string may hold a comma-separated list.
    fn into_vec(self) -> Vec<String> {
        let list = match self {
            Recipients::One(s) => s.split(',').map(str::to_string).collect(),
            Recipients::Many(list) => list,
        };
        list.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiInput {
    model: String,
    prompt: String,
    api_key: String,
    #[serde(default)]
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VariableInput {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    set: Option<Map<String, Value>>,
}
