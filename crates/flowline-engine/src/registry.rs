//! Block type registry: the closed set of block kinds and their schemas.
//!
//! The catalog is static. It describes each kind's input and output shape
//! for editors and the `flowline blocks` command; the dispatcher's typed
//! input structs are what actually enforce the input shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Every block kind the dispatcher can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    ManualTrigger,
    EventTrigger,
    If,
    Switch,
    HttpRequest,
    CreateRecord,
    GetRecord,
    UpdateRecord,
    DeleteRecord,
    SendEmail,
    AiCompletion,
    Iterator,
    Variable,
    DoNothing,
    Log,
    AlertUser,
    WaitForInput,
}

/// Broad grouping used for dispatch and documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Family {
    Trigger,
    Conditional,
    SideEffect,
    FlowControl,
    WaitForInput,
}

impl BlockKind {
    pub const ALL: [BlockKind; 17] = [
        BlockKind::ManualTrigger,
        BlockKind::EventTrigger,
        BlockKind::If,
        BlockKind::Switch,
        BlockKind::HttpRequest,
        BlockKind::CreateRecord,
        BlockKind::GetRecord,
        BlockKind::UpdateRecord,
        BlockKind::DeleteRecord,
        BlockKind::SendEmail,
        BlockKind::AiCompletion,
        BlockKind::Iterator,
        BlockKind::Variable,
        BlockKind::DoNothing,
        BlockKind::Log,
        BlockKind::AlertUser,
        BlockKind::WaitForInput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::ManualTrigger => "manualTrigger",
            BlockKind::EventTrigger => "eventTrigger",
            BlockKind::If => "if",
            BlockKind::Switch => "switch",
            BlockKind::HttpRequest => "httpRequest",
            BlockKind::CreateRecord => "createRecord",
            BlockKind::GetRecord => "getRecord",
            BlockKind::UpdateRecord => "updateRecord",
            BlockKind::DeleteRecord => "deleteRecord",
            BlockKind::SendEmail => "sendEmail",
            BlockKind::AiCompletion => "aiCompletion",
            BlockKind::Iterator => "iterator",
            BlockKind::Variable => "variable",
            BlockKind::DoNothing => "doNothing",
            BlockKind::Log => "log",
            BlockKind::AlertUser => "alertUser",
            BlockKind::WaitForInput => "waitForInput",
        }
    }

    pub fn family(&self) -> Family {
        match self {
            BlockKind::ManualTrigger | BlockKind::EventTrigger => Family::Trigger,
            BlockKind::If | BlockKind::Switch => Family::Conditional,
            BlockKind::HttpRequest
            | BlockKind::CreateRecord
            | BlockKind::GetRecord
            | BlockKind::UpdateRecord
            | BlockKind::DeleteRecord
            | BlockKind::SendEmail
            | BlockKind::AiCompletion => Family::SideEffect,
            BlockKind::Iterator
            | BlockKind::Variable
            | BlockKind::DoNothing
            | BlockKind::Log
            | BlockKind::AlertUser => Family::FlowControl,
            BlockKind::WaitForInput => Family::WaitForInput,
        }
    }

    /// Whether edges leaving this kind must carry an outcome label.
    pub fn requires_labeled_edges(&self) -> bool {
        matches!(self, BlockKind::If | BlockKind::Switch | BlockKind::Iterator)
    }

    /// Static schema for this kind.
    pub fn spec(&self) -> &'static BlockSpec {
        // ALL and CATALOG share an order.
        &CATALOG[*self as usize]
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EngineError::Definition(format!("unknown block kind '{}'", s)))
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    #[default]
    Any,
}

impl FieldType {
    /// Whether a JSON value has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
            FieldType::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
}

const fn field(name: &'static str, field_type: FieldType, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required,
    }
}

/// Registry entry for one block kind.
#[derive(Debug, Serialize)]
pub struct BlockSpec {
    pub kind: BlockKind,
    pub description: &'static str,
    pub inputs: &'static [FieldSpec],
    pub outputs: &'static [FieldSpec],
    /// Edge labels the block can produce; empty means all edges are followed.
    pub labels: &'static [&'static str],
}

use FieldType::{Any, Array, Boolean, Number, Object, String as Str};

const CONTINUE_ON_ERROR: FieldSpec = field("continueOnError", Boolean, false);

static CATALOG: [BlockSpec; 17] = [
    BlockSpec {
        kind: BlockKind::ManualTrigger,
        description: "Starts a run from a manual or API call",
        inputs: &[field("fields", Array, false)],
        outputs: &[field("*", Any, false)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::EventTrigger,
        description: "Starts a run from an external event",
        inputs: &[field("event", Str, false), field("fields", Array, false)],
        outputs: &[field("*", Any, false)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::If,
        description: "Follows the true or false edge of one condition group",
        inputs: &[],
        outputs: &[field("result", Boolean, true)],
        labels: &["true", "false"],
    },
    BlockSpec {
        kind: BlockKind::Switch,
        description: "Follows the edge of the first matching condition group",
        inputs: &[],
        outputs: &[field("case", Str, true)],
        labels: &["case1..caseN", "<declared case>", "default"],
    },
    BlockSpec {
        kind: BlockKind::HttpRequest,
        description: "Calls an HTTP endpoint",
        inputs: &[
            field("url", Str, true),
            field("method", Str, false),
            field("headers", Object, false),
            field("body", Any, false),
            CONTINUE_ON_ERROR,
        ],
        outputs: &[field("statusCode", Number, true), field("body", Any, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::CreateRecord,
        description: "Creates a row in the entity store",
        inputs: &[
            field("entity", Str, true),
            field("data", Object, true),
            CONTINUE_ON_ERROR,
        ],
        outputs: &[field("id", Str, true), field("data", Object, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::GetRecord,
        description: "Reads a row from the entity store",
        inputs: &[
            field("entity", Str, true),
            field("id", Str, true),
            CONTINUE_ON_ERROR,
        ],
        outputs: &[field("id", Str, true), field("data", Object, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::UpdateRecord,
        description: "Merges fields into a row in the entity store",
        inputs: &[
            field("entity", Str, true),
            field("id", Str, true),
            field("data", Object, true),
            CONTINUE_ON_ERROR,
        ],
        outputs: &[field("id", Str, true), field("data", Object, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::DeleteRecord,
        description: "Deletes a row from the entity store",
        inputs: &[
            field("entity", Str, true),
            field("id", Str, true),
            CONTINUE_ON_ERROR,
        ],
        outputs: &[field("deleted", Boolean, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::SendEmail,
        description: "Sends an email through the configured provider",
        inputs: &[
            field("provider", Str, false),
            field("from", Str, true),
            field("to", Any, true),
            field("subject", Str, true),
            field("body", Str, true),
            field("apiKey", Str, true),
            CONTINUE_ON_ERROR,
        ],
        outputs: &[field("sent", Boolean, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::AiCompletion,
        description: "Generates text with a chat-completion model",
        inputs: &[
            field("model", Str, true),
            field("prompt", Str, true),
            field("apiKey", Str, true),
            field("system", Str, false),
            CONTINUE_ON_ERROR,
        ],
        outputs: &[field("text", Str, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::Iterator,
        description: "Runs the loopNext branch once per array element, then loopEnd",
        inputs: &[field("array", Str, true)],
        outputs: &[field("count", Number, true)],
        labels: &["loopNext", "loopEnd"],
    },
    BlockSpec {
        kind: BlockKind::Variable,
        description: "Sets $vars entries for the rest of the run",
        inputs: &[
            field("name", Str, false),
            field("value", Any, false),
            field("set", Object, false),
        ],
        outputs: &[field("*", Any, false)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::DoNothing,
        description: "Passes through",
        inputs: &[],
        outputs: &[],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::Log,
        description: "Writes a log line",
        inputs: &[field("message", Any, false), field("level", Str, false)],
        outputs: &[field("message", Str, true), field("level", Str, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::AlertUser,
        description: "Raises a user-facing alert",
        inputs: &[field("message", Any, false), field("title", Str, false)],
        outputs: &[field("message", Str, true), field("level", Str, true)],
        labels: &[],
    },
    BlockSpec {
        kind: BlockKind::WaitForInput,
        description: "Suspends the run until it is resumed with input",
        inputs: &[field("fields", Array, false)],
        outputs: &[field("*", Any, false)],
        labels: &[],
    },
];

/// The whole catalog in declaration order.
pub fn catalog() -> &'static [BlockSpec] {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_matches_kinds() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.spec().kind, kind);
        }
        assert_eq!(catalog().len(), BlockKind::ALL.len());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("httpRequest".parse::<BlockKind>().unwrap(), BlockKind::HttpRequest);
        assert_eq!("waitForInput".parse::<BlockKind>().unwrap(), BlockKind::WaitForInput);

        let err = "sendFax".parse::<BlockKind>().unwrap_err();
        assert!(err.to_string().contains("unknown block kind 'sendFax'"));
    }

    #[test]
    fn test_families() {
        assert_eq!(BlockKind::EventTrigger.family(), Family::Trigger);
        assert_eq!(BlockKind::Switch.family(), Family::Conditional);
        assert_eq!(BlockKind::AiCompletion.family(), Family::SideEffect);
        assert_eq!(BlockKind::AlertUser.family(), Family::FlowControl);
        assert!(BlockKind::Iterator.requires_labeled_edges());
        assert!(!BlockKind::Log.requires_labeled_edges());
    }

    #[test]
    fn test_side_effects_accept_continue_on_error() {
        for spec in catalog()
            .iter()
            .filter(|s| s.kind.family() == Family::SideEffect)
        {
            assert!(
                spec.inputs.iter().any(|f| f.name == "continueOnError"),
                "{} lacks continueOnError",
                spec.kind
            );
        }
    }

    #[test]
    fn test_field_type_accepts() {
        use serde_json::json;
        assert!(FieldType::Number.accepts(&json!(5)));
        assert!(!FieldType::Number.accepts(&json!("5")));
        assert!(FieldType::Array.accepts(&json!([])));
        assert!(FieldType::Any.accepts(&Value::Null));
        let parsed: FieldType = serde_json::from_value(json!("boolean")).unwrap();
        assert_eq!(parsed, FieldType::Boolean);
    }
}
