//! Core engine types shared across all modules.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// Continuous position, used for entity placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// The grid cell containing this point.
    pub fn cell(&self) -> Coord {
        Coord::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn offset(&self, by: Coord) -> Self {
        Self::new(
            self.x + by.x as f32,
            self.y + by.y as f32,
            self.z + by.z as f32,
        )
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Grid coordinates
// ---------------------------------------------------------------------------

/// One addressable grid cell.
///
/// Ordered by `y`, then `x`, then `z`, which is also the order every bounded
/// scan visits a region in.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, by: Coord) -> Self {
        Self::new(self.x + by.x, self.y + by.y, self.z + by.z)
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y
            .cmp(&other.y)
            .then(self.x.cmp(&other.x))
            .then(self.z.cmp(&other.z))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// Inclusive box of cells with `start <= end` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    start: Coord,
    end: Coord,
}

impl Region {
    /// Build a region from any two corners.
    pub fn new(a: Coord, b: Coord) -> Self {
        Self {
            start: Coord::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            end: Coord::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn single(at: Coord) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> Coord {
        self.start
    }

    pub fn end(&self) -> Coord {
        self.end
    }

    pub fn contains(&self, at: Coord) -> bool {
        (self.start.x..=self.end.x).contains(&at.x)
            && (self.start.y..=self.end.y).contains(&at.y)
            && (self.start.z..=self.end.z).contains(&at.z)
    }

    /// Number of cells in the region.
    pub fn volume(&self) -> u64 {
        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as u64;
        span(self.start.x, self.end.x) * span(self.start.y, self.end.y) * span(self.start.z, self.end.z)
    }

    /// The cell visited after `at` in (Y, X, Z) scan order, or `None` once the
    /// region is exhausted.
    pub fn successor(&self, at: Coord) -> Option<Coord> {
        if at.z < self.end.z {
            return Some(Coord::new(at.x, at.y, at.z + 1));
        }
        if at.x < self.end.x {
            return Some(Coord::new(at.x + 1, at.y, self.start.z));
        }
        if at.y < self.end.y {
            return Some(Coord::new(self.start.x, at.y + 1, self.start.z));
        }
        None
    }

    /// Every cell in scan order.
    pub fn cells(&self) -> RegionCells {
        RegionCells {
            region: *self,
            next: Some(self.start),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Iterator returned by [`Region::cells`].
#[derive(Debug, Clone)]
pub struct RegionCells {
    region: Region,
    next: Option<Coord>,
}

impl Iterator for RegionCells {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        let current = self.next?;
        self.next = self.region.successor(current);
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Identity of one mutable world (a dimension, a level, …).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The player (or system actor) an operation and its journal belong to.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Owner used for operations no player requested.
    pub fn server() -> Self {
        Self("server".into())
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct JournalId(pub u64);

impl std::fmt::Display for JournalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "journal#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStats {
    pub queued_operations: usize,
    pub cached_journals: usize,
    pub total_ticks: u64,
    pub finished_operations: u64,
}
