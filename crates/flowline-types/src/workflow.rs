//! Workflow definitions: blocks, edges and condition groups.
//!
//! Definitions serialize as camelCase JSON (`isTrigger`, `variableName`,
//! `conditionGroups`) so they can be imported from the editor's export format.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Id, Timestamp, now};

/// Errors found while validating a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("workflow '{0}' has no blocks")]
    Empty(Id),

    #[error("block ID cannot be empty")]
    EmptyBlockId,

    #[error("duplicate block ID: {0}")]
    DuplicateBlock(Id),

    #[error("workflow must have exactly one trigger block, found {0}")]
    TriggerCount(usize),

    #[error("edge from '{from}' targets unknown block '{to}'")]
    DanglingEdge { from: Id, to: Id },
}

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Live,
    Archived,
}

string_enum!(WorkflowStatus, "workflow status", {
    Draft => "draft",
    Live => "live",
    Archived => "archived",
});

/// A named example input used for manual test runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExample {
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

/// A workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: Id,
    pub name: String,
    /// Owning tenant. `None` marks a global/template workflow.
    #[serde(default)]
    pub tenant_id: Option<Id>,
    #[serde(default)]
    pub status: WorkflowStatus,
    /// Applies across all tenants (loads global variables and credentials too).
    #[serde(default)]
    pub is_global: bool,
    /// Blocks in creation order.
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub examples: Vec<WorkflowExample>,
    #[serde(default = "now")]
    pub created_at: Timestamp,
}

impl Workflow {
    /// The block marked `isTrigger`, if exactly one exists.
    pub fn trigger_block(&self) -> Option<&Block> {
        let mut triggers = self.blocks.iter().filter(|b| b.is_trigger);
        match (triggers.next(), triggers.next()) {
            (Some(block), None) => Some(block),
            _ => None,
        }
    }

    /// Look up a block by ID.
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Structural validation of the block graph.
    ///
    /// Block kinds are not checked here; the engine's registry owns that.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.blocks.is_empty() {
            return Err(DefinitionError::Empty(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for block in &self.blocks {
            if block.id.is_empty() {
                return Err(DefinitionError::EmptyBlockId);
            }
            if !seen.insert(block.id.as_str()) {
                return Err(DefinitionError::DuplicateBlock(block.id.clone()));
            }
        }

        let triggers = self.blocks.iter().filter(|b| b.is_trigger).count();
        if triggers != 1 {
            return Err(DefinitionError::TriggerCount(triggers));
        }

        for block in &self.blocks {
            for edge in &block.edges {
                if !seen.contains(edge.to_block_id.as_str()) {
                    return Err(DefinitionError::DanglingEdge {
                        from: block.id.clone(),
                        to: edge.to_block_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// A single node of the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: Id,
    #[serde(default)]
    pub workflow_id: Id,
    /// Selects the dispatcher handler and the registry schema.
    pub kind: String,
    /// Block configuration; string values may contain `{{...}}` placeholders.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Key under which this block's output is stored in the run context.
    pub variable_name: String,
    #[serde(default)]
    pub is_trigger: bool,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub condition_groups: Vec<ConditionGroup>,
}

impl Block {
    /// Edges carrying the given condition label.
    pub fn edges_labeled<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.condition.as_deref() == Some(label))
    }
}

/// A directed connection between two blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub from_block_id: Id,
    pub to_block_id: Id,
    /// Outcome label the source block must produce for this edge to be followed.
    #[serde(default)]
    pub condition: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<Id>, to: impl Into<Id>) -> Self {
        Self {
            from_block_id: from.into(),
            to_block_id: to.into(),
            condition: None,
        }
    }

    pub fn labeled(from: impl Into<Id>, to: impl Into<Id>, label: impl Into<String>) -> Self {
        Self {
            condition: Some(label.into()),
            ..Self::new(from, to)
        }
    }
}

/// Boolean combinator for a condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// An ordered, combinable set of comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    pub index: u32,
    #[serde(default)]
    pub combinator: Combinator,
    /// Pre-declared case label for switch-style blocks.
    #[serde(default)]
    pub case: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// An atomic comparison: resolved `variable` against a literal `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Template string, e.g. `{{$params.amount}}`.
    pub variable: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}
