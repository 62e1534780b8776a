//! Shared types for the Flowline workflow engine.
//!
//! Workflow definitions (blocks, edges, condition groups) are authored
//! elsewhere and only read by the engine. Runs and steps are the durable
//! execution trace the engine writes.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A status or trigger string that doesn't name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// `as_str`, `Display` and `FromStr` for a fieldless enum.
macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::UnknownVariant {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod execution;
pub mod secret;
pub mod workflow;

pub use execution::{Run, RunSnapshot, RunStatus, Session, Step, StepStatus, TriggerType};
pub use secret::{Credential, Variable};
pub use workflow::{
    Block, Combinator, Condition, ConditionGroup, DefinitionError, Edge, Operator, Workflow,
    WorkflowExample, WorkflowStatus,
};

/// Identifier type used for every record.
pub type Id = String;

/// Timestamp type used for every record.
pub type Timestamp = DateTime<Utc>;

/// Generate a fresh random identifier.
pub fn new_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time.
pub fn now() -> Timestamp {
    Utc::now()
}
