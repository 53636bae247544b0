//! Request/response messages for the operation request surface.
//!
//! Every line on the wire is one JSON object. Requests are wrapped in an
//! [`Envelope`] naming the owner; responses are plain [`Response`] values.
//!
//! ## Design rules
//!
//! 1. Every message is `Serialize + Deserialize` with snake_case JSON and a
//!    `type` tag.
//! 2. Coordinates travel as `{ "x", "y", "z" }` objects; region corners may be
//!    given in any order.
//! 3. Malformed percentages are not rejected: they fall back to
//!    [`DEFAULT_PERCENTAGE`] and the requester gets a `notice`.

use crate::block::ItemKind;
use crate::scheduler::{FinishedOperation, JournalSummary};
use crate::types::{Coord, EngineStats, JournalId, OperationId, OwnerId};
use serde::{Deserialize, Serialize};

/// Percentage used when none, or an unusable one, is given.
pub const DEFAULT_PERCENTAGE: u8 = 100;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A request together with who made it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub owner: OwnerId,
    #[serde(flatten)]
    pub request: Request,
}

impl Envelope {
    pub fn new(owner: OwnerId, request: Request) -> Self {
        Self { owner, request }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    RemoveBlock {
        from: Coord,
        to: Coord,
        block: ItemKind,
    },
    ReplaceBlock {
        from: Coord,
        to: Coord,
        from_block: ItemKind,
        to_block: ItemKind,
        /// Free-form so that bad input can be reported rather than rejected.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pct: Option<serde_json::Value>,
    },
    RemoveEntity {
        from: Coord,
        to: Coord,
        entity: String,
    },
    Scan {
        from: Coord,
        to: Coord,
        block: ItemKind,
    },
    Undo {
        id: JournalId,
    },
    Redo {
        id: JournalId,
    },
    /// Drop every queued operation of the owner.
    Close,
    History,
    Stats,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Accepted { operation: OperationId },
    Notice { message: String },
    Finished(FinishedOperation),
    History { entries: Vec<JournalSummary> },
    Stats(EngineStats),
    Closed { dropped: usize },
    Failed { error: String },
}

// ---------------------------------------------------------------------------
// Percentage parsing
// ---------------------------------------------------------------------------

/// Parse a completion percentage in `0..=100`.
///
/// Anything else yields [`DEFAULT_PERCENTAGE`] plus a notice for the requester.
pub fn parse_percentage(raw: &str) -> (u8, Option<String>) {
    match raw.trim().parse::<u8>() {
        Ok(pct) if pct <= 100 => (pct, None),
        _ => (
            DEFAULT_PERCENTAGE,
            Some(format!(
                "'{raw}' is not a percentage between 0 and 100, using {DEFAULT_PERCENTAGE}"
            )),
        ),
    }
}

/// [`parse_percentage`] over whatever JSON value the requester sent.
pub fn percentage_from_json(value: Option<&serde_json::Value>) -> (u8, Option<String>) {
    match value {
        None | Some(serde_json::Value::Null) => (DEFAULT_PERCENTAGE, None),
        Some(serde_json::Value::String(raw)) => parse_percentage(raw),
        Some(other) => parse_percentage(&other.to_string()),
    }
}
