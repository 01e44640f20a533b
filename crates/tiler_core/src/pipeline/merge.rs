//! Bottom-up aggregation of child tiles into their parent.

use super::state::TileState;
use super::tile::{ContentRef, Refine, TileInfo, TileNode};
use crate::bounds::BoundingBox;

/// What a parent takes from its children once they all settled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Aggregate {
  pub bounds: BoundingBox,
  pub geometric_error: f64,
  pub partial: bool,
}

/// Fold settled children into a parent.
///
/// Only written children contribute bounds and error. A failed child, or a
/// child that is itself partial, marks the parent partial.
pub(crate) fn aggregate<'a>(
  own: &TileInfo,
  children: impl IntoIterator<Item = (&'a TileInfo, TileState, bool)>,
) -> Aggregate {
  let mut result = Aggregate {
    bounds: own.bounds,
    geometric_error: own.geometric_error,
    partial: false,
  };
  for (child, state, partial) in children {
    if state.is_written() {
      result.bounds.union(&child.bounds);
      result.geometric_error = result.geometric_error.max(child.geometric_error);
      result.partial |= partial;
    } else {
      result.partial = true;
    }
  }
  result
}

/// Combine independently built tile trees under one new root.
///
/// A single tree is returned as is. Otherwise tree `i` is re-addressed under
/// `"i"`, and the new root takes the union of the successful trees' bounds
/// with additive refinement.
pub fn merge_tiles(mut trees: Vec<TileNode>) -> TileNode {
  if trees.len() == 1 {
    if let Some(tree) = trees.pop() {
      return tree;
    }
  }
  for (i, tree) in trees.iter_mut().enumerate() {
    tree.readdress(&i.to_string());
  }
  join_trees(trees)
}

/// New `"root"` over trees whose addresses are already unique.
pub(crate) fn join_trees(trees: Vec<TileNode>) -> TileNode {
  let mut info = TileInfo {
    address: "root".to_string(),
    level: 0,
    bounds: BoundingBox::EMPTY,
    geometric_error: 0.0,
    refine: Refine::Add,
    content: ContentRef::None,
  };
  let merged = aggregate(&info, trees.iter().map(|t| (&t.info, t.state, t.partial)));
  info.bounds = merged.bounds;
  info.geometric_error = merged.geometric_error;

  TileNode {
    info,
    state: TileState::Merged,
    partial: merged.partial,
    failure: None,
    children: trees,
  }
}
