//! Positions in the voxel world.
//!
//! [`Vec3`] is a continuous position (entities, the avatar); [`BlockPos`]
//! addresses one integer cell of the block grid.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A continuous position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vec3 {
    /// East-west axis.
    pub x: f64,
    /// Vertical axis.
    pub y: f64,
    /// North-south axis.
    pub z: f64,
}

impl Vec3 {
    /// Construct a position from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }

    /// Return this position shifted by the given deltas.
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The block cell containing this position.
    pub fn block(&self) -> BlockPos {
        BlockPos::new(floor_to_i32(self.x), floor_to_i32(self.y), floor_to_i32(self.z))
    }
}

impl core::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Integer coordinates of one block cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct BlockPos {
    /// East-west axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// North-south axis.
    pub z: i32,
}

impl BlockPos {
    /// Construct a cell position from its components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Return this cell shifted by the given deltas, saturating at the
    /// bounds of `i32`.
    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.z.saturating_add(dz),
        )
    }

    /// The cell directly below.
    pub const fn below(&self) -> Self {
        self.offset(0, -1, 0)
    }

    /// The lower corner of the cell as a continuous position.
    pub fn corner(&self) -> Vec3 {
        Vec3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }

    /// The center of the cell as a continuous position.
    pub fn center(&self) -> Vec3 {
        self.corner().offset(0.5, 0.5, 0.5)
    }

    /// Euclidean distance between the corners of two cells.
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.corner().distance_to(&other.corner())
    }
}

impl core::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Floor a coordinate to the containing cell index, clamping to `i32`.
#[allow(clippy::cast_possible_truncation)]
fn floor_to_i32(value: f64) -> i32 {
    let floored = value.floor();
    if floored.is_nan() {
        0
    } else {
        floored.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn negative_positions_floor_down() {
        let pos = Vec3::new(-0.5, 64.9, 2.0);
        assert_eq!(pos.block(), BlockPos::new(-1, 64, 2));
    }

    #[test]
    fn below_moves_down_one_cell() {
        assert_eq!(BlockPos::new(1, 5, 1).below(), BlockPos::new(1, 4, 1));
    }

    #[test]
    fn offset_saturates() {
        let edge = BlockPos::new(i32::MAX, 0, 0);
        assert_eq!(edge.offset(1, 0, 0).x, i32::MAX);
    }
}
