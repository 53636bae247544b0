//! Cell contents: block states, their placeable item form, and entity snapshots.

use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// Name of the empty block.
pub const AIR: &str = "air";

/// Serialized block-entity payload stored next to a block (chest contents, sign text, …).
pub type BlockEntityData = serde_json::Value;

// ---------------------------------------------------------------------------
// Block state
// ---------------------------------------------------------------------------

/// Which part of a multi-cell object a cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellPart {
    #[default]
    Whole,
    /// Primary cell of a composite (lower door half, bed foot).
    Primary,
    /// Non-primary cell of a composite, handled through its primary.
    Secondary,
}

/// Full state of one cell.
///
/// Equality is structural: two states compare equal only if every property
/// matches, which is what the undo/redo guards rely on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub block: String,
    #[serde(default)]
    pub part: CellPart,
    /// Fluid held by the cell, either because the block is a fluid or because
    /// it is logged with one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluid: Option<String>,
    #[serde(default)]
    pub solid: bool,
    #[serde(default)]
    pub occluding: bool,
}

impl BlockState {
    pub fn air() -> Self {
        Self {
            block: AIR.into(),
            part: CellPart::Whole,
            fluid: None,
            solid: false,
            occluding: false,
        }
    }

    /// A full, opaque block.
    pub fn solid(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            part: CellPart::Whole,
            fluid: None,
            solid: true,
            occluding: true,
        }
    }

    /// A see-through block without collision (torch, flower, rail…).
    pub fn decoration(block: impl Into<String>) -> Self {
        Self {
            solid: false,
            occluding: false,
            ..Self::solid(block)
        }
    }

    /// A pure fluid cell such as `water`.
    pub fn fluid(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            block: name.clone(),
            part: CellPart::Whole,
            fluid: Some(name),
            solid: false,
            occluding: false,
        }
    }

    /// This block, logged with `fluid`.
    pub fn logged_with(mut self, fluid: impl Into<String>) -> Self {
        self.fluid = Some(fluid.into());
        self
    }

    pub fn with_part(mut self, part: CellPart) -> Self {
        self.part = part;
        self
    }

    // -----------------------------------------------------------------------
    // Capability queries
    // -----------------------------------------------------------------------

    pub fn is_air(&self) -> bool {
        self.block == AIR
    }

    /// True for the cell of a composite object that must not be processed on
    /// its own (the upper half of a door, the head of a bed).
    pub fn is_upper_half_of_multicell(&self) -> bool {
        self.part == CellPart::Secondary
    }

    /// True if a fluid can be drained from this cell.
    pub fn is_fluid_source(&self) -> bool {
        self.fluid.is_some()
    }

    /// True if the block itself is the fluid, as opposed to a logged block.
    pub fn is_fluid_block(&self) -> bool {
        self.fluid.as_deref() == Some(self.block.as_str())
    }

    pub fn is_solid(&self) -> bool {
        self.solid
    }

    pub fn can_occlude(&self) -> bool {
        self.occluding
    }

    /// The placeable representation of this cell.
    pub fn item(&self) -> ItemKind {
        if self.is_air() {
            ItemKind::Air
        } else {
            ItemKind::Block(self.block.clone())
        }
    }
}

impl std::fmt::Display for BlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.block)?;
        if let Some(fluid) = &self.fluid {
            if !self.is_fluid_block() {
                write!(f, "[{fluid}]")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// What a request names as the thing to remove or to place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum ItemKind {
    Air,
    Block(String),
    /// A bucket of the named fluid; matches any cell holding that fluid.
    Bucket(String),
}

impl ItemKind {
    pub fn block(name: impl Into<String>) -> Self {
        ItemKind::Block(name.into())
    }

    pub fn bucket(fluid: impl Into<String>) -> Self {
        ItemKind::Bucket(fluid.into())
    }

    pub fn is_bucket(&self) -> bool {
        matches!(self, ItemKind::Bucket(_))
    }

    /// Name of the block, fluid or entity kind this item refers to.
    pub fn name(&self) -> &str {
        match self {
            ItemKind::Air => AIR,
            ItemKind::Block(name) | ItemKind::Bucket(name) => name,
        }
    }

    /// Whether a cell in `state` is a valid target for this item.
    ///
    /// Buckets match by contained fluid, so both pure fluid cells and logged
    /// blocks qualify. `Air` matches only empty cells.
    pub fn matches(&self, state: &BlockState) -> bool {
        match self {
            ItemKind::Bucket(fluid) => state.fluid.as_deref() == Some(fluid.as_str()),
            ItemKind::Air | ItemKind::Block(_) => state.item() == *self,
        }
    }

    /// The state placing this item produces on an otherwise empty cell.
    pub fn placed_state(&self) -> BlockState {
        match self {
            ItemKind::Air => BlockState::air(),
            ItemKind::Block(name) => BlockState::solid(name.clone()),
            ItemKind::Bucket(fluid) => BlockState::fluid(fluid.clone()),
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Air => f.write_str(AIR),
            ItemKind::Block(name) => f.write_str(name),
            ItemKind::Bucket(fluid) => write!(f, "{fluid}_bucket"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Handle of a live entity inside one world.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Fully serialized entity, enough to recreate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub kind: String,
    pub position: Vec3,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EntitySnapshot {
    pub fn new(kind: impl Into<String>, position: Vec3) -> Self {
        Self {
            kind: kind.into(),
            position,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}
