//! Axis-aligned bounding box with double precision for georeferenced data.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Double-precision axis-aligned bounding box.
///
/// The unset state is an inverted box (`min = +inf`, `max = -inf`), which is
/// distinct from a zero-volume box around a single point. Boxes only grow:
/// they are mutated by [`add_point`](Self::add_point) and
/// [`union`](Self::union) and never shrink.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl BoundingBox {
	/// Unset box, ready for encapsulation.
	pub const EMPTY: Self = Self {
		min: DVec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
		max: DVec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
	};

	/// Create a new box from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"BoundingBox min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Smallest box containing every point, `EMPTY` for no points.
	pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Self {
		let mut bounds = Self::EMPTY;
		for point in points {
			bounds.add_point(point);
		}
		bounds
	}

	/// True while no point has been added.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
	}

	/// Grow the box to include `point`.
	#[inline]
	pub fn add_point(&mut self, point: DVec3) {
		self.min = self.min.min(point);
		self.max = self.max.max(point);
	}

	/// Grow the box to include `other`. Unset boxes contribute nothing.
	#[inline]
	pub fn union(&mut self, other: &BoundingBox) {
		if other.is_empty() {
			return;
		}
		self.min = self.min.min(other.min);
		self.max = self.max.max(other.max);
	}

	/// By-value variant of [`union`](Self::union).
	#[inline]
	pub fn unioned(mut self, other: &BoundingBox) -> Self {
		self.union(other);
		self
	}

	/// Check if this box overlaps with another (touching counts).
	#[inline]
	pub fn overlaps(&self, other: &BoundingBox) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	/// Check if this box contains a point (boundary inclusive).
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.x >= self.min.x
			&& point.x <= self.max.x
			&& point.y >= self.min.y
			&& point.y <= self.max.y
			&& point.z >= self.min.z
			&& point.z <= self.max.z
	}

	/// Nearest point inside the box.
	#[inline]
	pub fn clamp_point(&self, point: DVec3) -> DVec3 {
		point.clamp(self.min, self.max)
	}

	/// Get the size of the box (max - min). Zero for an unset box.
	#[inline]
	pub fn size(&self) -> DVec3 {
		if self.is_empty() {
			return DVec3::ZERO;
		}
		self.max - self.min
	}

	/// Longest of the three axis lengths.
	#[inline]
	pub fn max_extent(&self) -> f64 {
		self.size().max_element()
	}

	/// Length of the main diagonal.
	#[inline]
	pub fn diagonal(&self) -> f64 {
		self.size().length()
	}

	/// Get the center of the box.
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Child box for an octant obtained by bisecting every axis at the center.
	///
	/// Octant bits: bit 0 = +X half, bit 1 = +Y half, bit 2 = +Z half.
	/// Child corners are taken verbatim from `min`, `center` and `max`, so the
	/// eight children tile the parent exactly.
	pub fn octant(&self, octant: u8) -> Self {
		let center = self.center();
		let pick = |bit: u8, lo: f64, mid: f64, hi: f64| {
			if octant & bit == 0 {
				(lo, mid)
			} else {
				(mid, hi)
			}
		};
		let (min_x, max_x) = pick(1, self.min.x, center.x, self.max.x);
		let (min_y, max_y) = pick(2, self.min.y, center.y, self.max.y);
		let (min_z, max_z) = pick(4, self.min.z, center.z, self.max.z);
		Self {
			min: DVec3::new(min_x, min_y, min_z),
			max: DVec3::new(max_x, max_y, max_z),
		}
	}

	/// Octant of this box a point falls in.
	///
	/// A coordinate equal to the center goes to the lower half on that axis.
	#[inline]
	pub fn octant_of(&self, point: DVec3) -> u8 {
		let center = self.center();
		let mut octant = 0u8;
		if point.x > center.x {
			octant |= 1;
		}
		if point.y > center.y {
			octant |= 2;
		}
		if point.z > center.z {
			octant |= 4;
		}
		octant
	}

	/// Corners as plain arrays (for serialization to tile metadata).
	pub fn to_arrays(&self) -> ([f64; 3], [f64; 3]) {
		(self.min.to_array(), self.max.to_array())
	}
}

impl Default for BoundingBox {
	fn default() -> Self {
		Self::EMPTY
	}
}
