//! Static geographic grid used to score the fault-domain diversity of
//! elected pools
//!
//! The earth is cut into [`PATCH_SIZE_DEG`] × [`PATCH_SIZE_DEG`] cells,
//! numbered row by row starting from the south-west corner.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use bincode::{Decode, Encode};
use convi::CastFrom as _;
use derive_more::From;

pub const PATCH_SIZE_DEG: i16 = 10;

const LAT_MIN: i16 = -90;
const LAT_MAX: i16 = 90;
const LON_MIN: i16 = -180;
const LON_MAX: i16 = 180;

#[derive(Encode, Decode, From, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct PatchId(u16);

impl PatchId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoPatch {
    pub id: PatchId,
    pub lat_range: RangeInclusive<f64>,
    pub lon_range: RangeInclusive<f64>,
}

impl GeoPatch {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.lat_range.contains(&lat) && self.lon_range.contains(&lon)
    }
}

static GRID: LazyLock<Vec<GeoPatch>> = LazyLock::new(build_grid);

fn build_grid() -> Vec<GeoPatch> {
    let mut patches = vec![];

    for lat in (LAT_MIN..LAT_MAX).step_by(usize::cast_from(PATCH_SIZE_DEG.unsigned_abs())) {
        for lon in (LON_MIN..LON_MAX).step_by(usize::cast_from(PATCH_SIZE_DEG.unsigned_abs())) {
            let id = u16::try_from(patches.len()).expect("Grid fits in u16");
            patches.push(GeoPatch {
                id: PatchId(id),
                lat_range: f64::from(lat)..=f64::from(lat + PATCH_SIZE_DEG),
                lon_range: f64::from(lon)..=f64::from(lon + PATCH_SIZE_DEG),
            });
        }
    }

    patches
}

/// The whole grid, computed on first use
pub fn grid() -> &'static [GeoPatch] {
    GRID.as_slice()
}

/// Find the patch containing the point
///
/// Points on a border belong to the first matching patch. Coordinates
/// outside the valid range (or `NaN`) yield `None`.
pub fn compute_patch(lat: f64, lon: f64) -> Option<PatchId> {
    grid()
        .iter()
        .find(|patch| patch.contains(lat, lon))
        .map(|patch| patch.id)
}

/// Distinct patches among `patches`
pub fn available_patches(patches: impl IntoIterator<Item = PatchId>) -> BTreeSet<PatchId> {
    patches.into_iter().collect()
}

/// Number of distinct patches an elected pool must span
pub fn required_patch_number(target: usize, patches: impl IntoIterator<Item = PatchId>) -> usize {
    available_patches(patches).len().min(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_the_earth() {
        assert_eq!(grid().len(), 18 * 36);
        assert_eq!(compute_patch(-90.0, -180.0), Some(PatchId::new(0)));
        assert_eq!(compute_patch(90.0, 180.0), Some(PatchId::new(18 * 36 - 1)));
        assert_eq!(compute_patch(-85.0, -175.0), Some(PatchId::new(0)));
        assert_eq!(compute_patch(-85.0, -165.0), Some(PatchId::new(1)));
        assert_eq!(compute_patch(-75.0, -175.0), Some(PatchId::new(36)));
    }

    #[test]
    fn border_points_go_to_first_patch() {
        assert_eq!(compute_patch(-80.0, -170.0), Some(PatchId::new(0)));
    }

    #[test]
    fn out_of_range_points_have_no_patch() {
        assert_eq!(compute_patch(91.0, 0.0), None);
        assert_eq!(compute_patch(0.0, -181.0), None);
        assert_eq!(compute_patch(f64::NAN, 0.0), None);
    }

    #[test]
    fn required_patches_capped_by_availability() {
        let patches = [1, 2, 2, 3].map(PatchId::new);
        assert_eq!(available_patches(patches).len(), 3);
        assert_eq!(required_patch_number(5, patches), 3);
        assert_eq!(required_patch_number(2, patches), 2);
        assert_eq!(required_patch_number(5, []), 0);
    }
}
