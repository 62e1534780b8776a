//! Id-indexed arena of blocks and resolved edges.

use std::collections::HashMap;
use std::sync::Arc;

use flowline_types::{Block, Id, Workflow};

use crate::context::is_reserved;
use crate::error::{EngineError, Result};
use crate::registry::{BlockKind, Family};

/// Arena index of a node.
pub type NodeId = usize;

/// A block with its parsed kind and resolved outgoing edges.
#[derive(Debug)]
pub struct Node {
    pub block: Block,
    pub kind: BlockKind,
    /// `(label, target)` in declaration order.
    pub edges: Vec<(Option<String>, NodeId)>,
}

impl Node {
    /// Targets of every edge, labeled or not.
    pub fn all_targets(&self) -> Vec<NodeId> {
        self.edges.iter().map(|(_, target)| *target).collect()
    }

    /// Targets of edges carrying `label`.
    pub fn targets_labeled(&self, label: &str) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(l, _)| l.as_deref() == Some(label))
            .map(|(_, target)| *target)
            .collect()
    }
}

/// Immutable, shareable execution graph of one workflow.
#[derive(Debug)]
pub struct BlockGraph {
    pub workflow_id: Id,
    pub is_global: bool,
    nodes: Vec<Node>,
    index: HashMap<Id, NodeId>,
    trigger: NodeId,
}

impl BlockGraph {
    /// Validate a workflow and build its graph.
    ///
    /// Fails on structural errors, unknown kinds, a non-trigger kind marked
    /// `isTrigger`, reserved variable names, and unlabeled edges leaving
    /// `if`, `switch` or `iterator` blocks.
    pub fn build(workflow: &Workflow) -> Result<Arc<Self>> {
        workflow.validate()?;

        let index: HashMap<Id, NodeId> = workflow
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();

        let mut nodes = Vec::with_capacity(workflow.blocks.len());
        let mut trigger = None;

        for (i, block) in workflow.blocks.iter().enumerate() {
            let kind: BlockKind = block.kind.parse()?;

            if block.variable_name.is_empty() || is_reserved(&block.variable_name) {
                return Err(EngineError::Definition(format!(
                    "block '{}' has invalid variable name '{}'",
                    block.id, block.variable_name
                )));
            }

            if block.is_trigger {
                if kind.family() != Family::Trigger {
                    return Err(EngineError::Definition(format!(
                        "trigger block '{}' has non-trigger kind '{}'",
                        block.id, kind
                    )));
                }
                trigger = Some(i);
            }

            let mut edges = Vec::with_capacity(block.edges.len());
            for edge in &block.edges {
                if kind.requires_labeled_edges() && edge.condition.is_none() {
                    return Err(EngineError::Definition(format!(
                        "{} block '{}' has an unlabeled edge to '{}'",
                        kind, block.id, edge.to_block_id
                    )));
                }
                // validate() already rejected dangling targets
                let target = index.get(&edge.to_block_id).copied().ok_or_else(|| {
                    EngineError::Definition(format!("unknown edge target '{}'", edge.to_block_id))
                })?;
                edges.push((edge.condition.clone(), target));
            }

            nodes.push(Node {
                block: block.clone(),
                kind,
                edges,
            });
        }

        let trigger = trigger
            .ok_or_else(|| EngineError::Definition("workflow has no trigger block".into()))?;

        Ok(Arc::new(Self {
            workflow_id: workflow.id.clone(),
            is_global: workflow.is_global,
            nodes,
            index,
            trigger,
        }))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn find(&self, block_id: &str) -> Option<NodeId> {
        self.index.get(block_id).copied()
    }

    pub fn trigger(&self) -> NodeId {
        self.trigger
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
