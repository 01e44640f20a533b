//! TilePipeline - drives one input through the tile state machine.
//!
//! ```text
//!   source ──▶ root: Loading ──▶ Processing ──▶ Partitioned
//!                                   │ weld + reduce   (mesh)
//!                                   │ partition       (points)
//!                                   ▼
//!              plan: one task per tile node ──▶ worker pool
//!                                   │ load content, write it
//!                                   ▼
//!              completions ──▶ join counters ──▶ merge parents bottom-up
//! ```
//!
//! Each node is processed end to end by one worker. The only wait in the
//! pipeline is a parent's join on its children; completions arrive on the
//! calling thread, which runs every merge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use web_time::Instant;

use super::merge::{aggregate, join_trees};
use super::source::{PointSource, SceneSource, TileSource};
use super::state::{TileEvent, TileState};
use super::tile::{prefixed, ContentRef, Refine, TileContent, TileInfo, TileNode};
use super::writer::TileWriter;
use crate::bounds::BoundingBox;
use crate::config::TilerConfig;
use crate::error::TilerError;
use crate::lod::{generate_lods, LodLevel};
use crate::octree::{partition, NodeId, PartitionedOctree};
use crate::point_store::PointStore;
use crate::report::{NodeFailure, RunReport};
use crate::threading::{TaskExecutor, TaskId};

/// Result of a build: the tile tree and what happened on the way.
#[derive(Clone, Debug)]
pub struct BuildOutput {
  /// Root of the tile tree; `None` when a batch had no readable input.
  pub root: Option<TileNode>,
  pub report: RunReport,
}

/// Builds tile trees from sources, writing every node through `W`.
pub struct TilePipeline<W: TileWriter + 'static> {
  config: Arc<TilerConfig>,
  writer: Arc<W>,
  executor: TaskExecutor<NodeOutcome>,
}

impl<W: TileWriter + 'static> TilePipeline<W> {
  /// Validate `config` and start the worker pool.
  pub fn new(config: Arc<TilerConfig>, writer: Arc<W>) -> Result<Self, TilerError> {
    config.validate()?;
    let executor = TaskExecutor::new(config.workers)?;
    Ok(Self {
      config,
      writer,
      executor,
    })
  }

  pub fn config(&self) -> &TilerConfig {
    &self.config
  }

  pub fn writer(&self) -> &Arc<W> {
    &self.writer
  }

  /// Build the tile tree of one input.
  ///
  /// Unreadable input and fatal errors are returned as `Err`. Anything else
  /// is recorded against the failing node and the build carries on.
  pub fn build_tile(&mut self, source: TileSource) -> Result<BuildOutput, TilerError> {
    self.build(source, None)
  }

  /// Build every input, skipping unreadable ones.
  ///
  /// With more than one input, input `i` is built under address `"i"` and
  /// the trees are joined under a new root. Stops at the first fatal error
  /// without starting later inputs.
  pub fn run_batch(&mut self, inputs: Vec<TileSource>) -> Result<BuildOutput, TilerError> {
    let start = Instant::now();
    let joined = inputs.len() > 1;
    let mut report = RunReport::default();
    let mut trees = Vec::with_capacity(inputs.len());

    for (i, source) in inputs.into_iter().enumerate() {
      let name = source.name().to_string();
      let prefix = i.to_string();
      match self.build(source, joined.then_some(prefix.as_str())) {
        Ok(output) => {
          report.absorb(output.report);
          trees.extend(output.root);
        }
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
          tracing::warn!("skipping input '{}': {}", name, err);
          report.skipped_inputs.push(NodeFailure::input(&name, &err));
        }
      }
    }

    let root = if !joined || trees.is_empty() {
      trees.pop()
    } else {
      let mut root = join_trees(trees);
      let children: Vec<TileInfo> = root
        .children
        .iter()
        .filter(|c| c.state.is_written())
        .map(|c| c.info.clone())
        .collect();
      match self.writer.write_refinement(&root.info, &children, root.partial) {
        Ok(()) => report.nodes_merged += 1,
        Err(err) => {
          tracing::warn!("writing batch root failed: {}", err);
          report.failures.push(NodeFailure::node("batch", "root", &err));
          root.state = TileState::Failed;
          root.failure = Some(err.to_string());
        }
      }
      Some(root)
    };

    report.elapsed = start.elapsed();
    Ok(BuildOutput { root, report })
  }

  fn build(&mut self, source: TileSource, prefix: Option<&str>) -> Result<BuildOutput, TilerError> {
    let start = Instant::now();
    let input = source.name().to_string();
    let refine = match &source {
      TileSource::Scene(_) => Refine::Replace,
      TileSource::Points(_) => Refine::Add,
    };
    tracing::info!("building tiles for '{}'", input);

    let mut report = RunReport::default();
    let mut state = TileState::Pending.apply(TileEvent::Start)?.state;
    let store_dir = self.store_dir();

    let prepared = match source {
      TileSource::Scene(mut scene) => self.prepare_scene(scene.as_mut(), &mut state, &mut report),
      TileSource::Points(mut points) => {
        self.prepare_points(points.as_mut(), &store_dir, &mut state, &mut report)
      }
    };

    let root = match prepared {
      Ok(mut plan) => {
        if let Some(prefix) = prefix {
          plan.readdress(prefix);
        }
        self.execute(&mut plan, &input, &mut report);
        plan.into_tree()
      }
      Err(err) if err.is_fatal() || matches!(err, TilerError::InputRead { .. }) => {
        remove_store_dir(&store_dir);
        return Err(err);
      }
      Err(err) => {
        let address = prefix.map_or_else(|| "root".to_string(), |p| p.to_string());
        Some(failed_root(&input, address, state, refine, err, &mut report))
      }
    };
    remove_store_dir(&store_dir);

    report.inputs_built = 1;
    report.elapsed = start.elapsed();
    tracing::info!(
      "'{}': {} tiles written, {} failed in {:.2?}",
      input,
      report.nodes_written,
      report.failures.len(),
      report.elapsed
    );
    Ok(BuildOutput { root, report })
  }

  // ===========================================================================
  // Root processing
  // ===========================================================================

  fn prepare_scene(
    &self,
    scene: &mut dyn SceneSource,
    state: &mut TileState,
    report: &mut RunReport,
  ) -> Result<Plan, TilerError> {
    let mesh = scene.load()?;
    *state = state.apply(TileEvent::Loaded)?.state;
    tracing::info!(
      "loaded '{}': {} vertices, {} triangles",
      scene.name(),
      mesh.vertices.len(),
      mesh.triangle_count()
    );

    let levels = generate_lods(&mesh, &self.config)?;
    *state = state.apply(TileEvent::Processed)?.state;
    report.reductions.extend(levels.iter().map(|l| l.stats));

    Ok(Plan::lod_chain(levels, *state))
  }

  fn prepare_points(
    &self,
    points: &mut dyn PointSource,
    store_dir: &Path,
    state: &mut TileState,
    report: &mut RunReport,
  ) -> Result<Plan, TilerError> {
    let name = points.name().to_string();
    let tree = partition(points, &self.config.octree, store_dir)?;
    *state = state.apply(TileEvent::Loaded)?.state;
    *state = state.apply(TileEvent::Processed)?.state;

    let stats = *tree.stats();
    tracing::info!(
      "partitioned '{}': {} of {} points kept in {} leaves",
      name,
      stats.accepted,
      stats.seen,
      stats.leaves
    );
    report.partitions.push(stats);

    Ok(Plan::octree(&tree, self.config.octree.sampling_percent, *state))
  }

  /// Fresh store directory for one build.
  fn store_dir(&self) -> PathBuf {
    static BUILD: AtomicU64 = AtomicU64::new(0);
    self.config.temp_root().join(format!(
      "tiler-{}-{}",
      std::process::id(),
      BUILD.fetch_add(1, Ordering::Relaxed)
    ))
  }

  // ===========================================================================
  // Node execution
  // ===========================================================================

  /// Run every node of `plan` on the pool and merge parents as their
  /// children settle. Returns once every node is `Merged` or `Failed`.
  fn execute(&self, plan: &mut Plan, input: &str, report: &mut RunReport) {
    let mut tasks: HashMap<TaskId, usize> = HashMap::with_capacity(plan.nodes.len());
    for (index, node) in plan.nodes.iter_mut().enumerate() {
      let Some(job) = node.job.take() else {
        continue;
      };
      let writer = Arc::clone(&self.writer);
      let info = node.info.clone();
      let state = node.state;
      let task = self
        .executor
        .spawn(move || run_node(writer.as_ref(), info, state, job));
      tasks.insert(task, index);
    }
    tracing::debug!("'{}': scheduled {} tile tasks", input, tasks.len());

    let mut join = Join::new(plan, self.writer.as_ref(), input, report);
    while let Some((task, result)) = self.executor.recv() {
      let Some(&index) = tasks.get(&task) else {
        continue;
      };
      join.complete(index, result);
    }
  }
}

/// Content source of one node.
enum NodeJob {
  Ready(TileContent),
  Store(PointStore),
}

impl NodeJob {
  fn load(self) -> Result<TileContent, TilerError> {
    match self {
      Self::Ready(content) => Ok(content),
      Self::Store(store) => Ok(TileContent::Points(store.load()?)),
    }
  }
}

/// What a worker reports back for one node.
struct NodeOutcome {
  info: TileInfo,
  state: TileState,
  error: Option<TilerError>,
}

fn run_node<W: TileWriter + ?Sized>(
  writer: &W,
  mut info: TileInfo,
  mut state: TileState,
  job: NodeJob,
) -> NodeOutcome {
  let result = write_node(writer, &mut info, &mut state, job);
  NodeOutcome {
    info,
    state,
    error: result.err(),
  }
}

/// Drive one node up to `Written`. The root arrives already `Partitioned`;
/// every other node starts `Pending`.
fn write_node<W: TileWriter + ?Sized>(
  writer: &W,
  info: &mut TileInfo,
  state: &mut TileState,
  job: NodeJob,
) -> Result<(), TilerError> {
  let scheduled = *state == TileState::Pending;
  if scheduled {
    *state = state.apply(TileEvent::Start)?.state;
  }
  let content = job.load()?;
  if scheduled {
    *state = state.apply(TileEvent::Loaded)?.state;
  }

  info.bounds = content.bounds();
  info.content = content.summary(info.level);
  if scheduled {
    *state = state.apply(TileEvent::Processed)?.state;
  }

  writer.write_content(info, &content)?;
  *state = state.apply(TileEvent::Flushed)?.state;
  tracing::trace!("wrote tile {} ({:?})", info.address, info.content);
  Ok(())
}

fn failed_root(
  input: &str,
  address: String,
  state: TileState,
  refine: Refine,
  err: TilerError,
  report: &mut RunReport,
) -> TileNode {
  let reason = err.to_string();
  tracing::warn!("'{}' failed: {}", input, reason);
  report.failures.push(NodeFailure::node(input, &address, &reason));
  TileNode {
    info: TileInfo {
      address,
      level: 0,
      bounds: BoundingBox::EMPTY,
      geometric_error: 0.0,
      refine,
      content: ContentRef::None,
    },
    state: state
      .apply(TileEvent::Fail)
      .map_or(TileState::Failed, |t| t.state),
    partial: false,
    failure: Some(reason),
    children: Vec::new(),
  }
}

fn remove_store_dir(dir: &Path) {
  if !dir.exists() {
    return;
  }
  if let Err(e) = std::fs::remove_dir_all(dir) {
    tracing::warn!("could not remove point stores in {}: {}", dir.display(), e);
  }
}

// =============================================================================
// Plan
// =============================================================================

struct PlanNode {
  info: TileInfo,
  state: TileState,
  parent: Option<usize>,
  children: Vec<usize>,
  job: Option<NodeJob>,
  partial: bool,
  failure: Option<String>,
}

/// Tile nodes of one input in an arena. Parents precede their children.
struct Plan {
  nodes: Vec<PlanNode>,
  root_state: TileState,
}

impl Plan {
  fn new(root_state: TileState) -> Self {
    Self {
      nodes: Vec::new(),
      root_state,
    }
  }

  fn push(&mut self, parent: Option<usize>, info: TileInfo, job: NodeJob) -> usize {
    let index = self.nodes.len();
    self.nodes.push(PlanNode {
      info,
      state: parent.map_or(self.root_state, |_| TileState::Pending),
      parent,
      children: Vec::new(),
      job: Some(job),
      partial: false,
      failure: None,
    });
    if let Some(parent) = parent {
      self.nodes[parent].children.push(index);
    }
    index
  }

  fn readdress(&mut self, prefix: &str) {
    for node in &mut self.nodes {
      node.info.address = prefixed(prefix, &node.info.address);
    }
  }

  /// Coarsest level at the root, each finer level its only child:
  /// `root` -> `0` -> `0_0` ...
  fn lod_chain(levels: Vec<LodLevel>, root_state: TileState) -> Self {
    let mut plan = Self::new(root_state);
    let mut parent = None;
    for (depth, level) in levels.into_iter().rev().enumerate() {
      let address = if depth == 0 {
        "root".to_string()
      } else {
        vec!["0"; depth].join("_")
      };
      let lod = level.level as u32;
      let content = TileContent::Mesh(level.mesh);
      let info = TileInfo {
        address,
        level: lod,
        bounds: content.bounds(),
        geometric_error: level.geometric_error,
        refine: Refine::Replace,
        content: content.summary(lod),
      };
      parent = Some(plan.push(parent, info, NodeJob::Ready(content)));
    }
    plan
  }

  /// One tile per octree node holding points. Leaves carry their store;
  /// internal nodes have no content of their own.
  fn octree(tree: &PartitionedOctree, sampling_percent: u8, root_state: TileState) -> Self {
    let density = 100.0 / sampling_percent.clamp(1, 100) as f64;
    let mut plan = Self::new(root_state);
    let mut stack: Vec<(NodeId, Option<usize>)> = vec![(NodeId::ROOT, None)];

    while let Some((id, parent)) = stack.pop() {
      let node = tree.node(id);
      let job = match tree.store(node) {
        Some(store) => NodeJob::Store(store.clone()),
        None => NodeJob::Ready(TileContent::Empty),
      };
      let geometric_error = if node.is_leaf() {
        0.0
      } else {
        node.bounds.diagonal() * density
      };
      let info = TileInfo {
        address: node.key.address(),
        level: node.depth(),
        bounds: node.bounds,
        geometric_error,
        refine: Refine::Add,
        content: ContentRef::None,
      };
      let index = plan.push(parent, info, job);

      if let Some(children) = node.children {
        for &child in children.iter().rev() {
          if tree.node(child).point_count > 0 {
            stack.push((child, Some(index)));
          }
        }
      }
    }
    plan
  }

  /// Assemble the finished tree. Content is already gone; only metadata
  /// remains.
  fn into_tree(self) -> Option<TileNode> {
    let mut built: Vec<Option<TileNode>> = vec![None; self.nodes.len()];
    for (index, node) in self.nodes.into_iter().enumerate().rev() {
      let children = node
        .children
        .iter()
        .filter_map(|&c| built[c].take())
        .collect();
      built[index] = Some(TileNode {
        info: node.info,
        state: node.state,
        partial: node.partial,
        failure: node.failure,
        children,
      });
    }
    built.into_iter().next().flatten()
  }
}

// =============================================================================
// Join
// =============================================================================

/// Per-node join counters for one execution.
///
/// A node settles once its own task completed and every child settled. It
/// then merges (or stays failed) and signals its parent exactly once.
struct Join<'a, W: ?Sized> {
  plan: &'a mut Plan,
  writer: &'a W,
  input: &'a str,
  report: &'a mut RunReport,
  /// Children not yet settled.
  waiting: Vec<usize>,
  /// Own task completed.
  done: Vec<bool>,
  /// Parent already signalled.
  signalled: Vec<bool>,
}

impl<'a, W: TileWriter + ?Sized> Join<'a, W> {
  fn new(plan: &'a mut Plan, writer: &'a W, input: &'a str, report: &'a mut RunReport) -> Self {
    let count = plan.nodes.len();
    let waiting = plan.nodes.iter().map(|n| n.children.len()).collect();
    Self {
      plan,
      writer,
      input,
      report,
      waiting,
      done: vec![false; count],
      signalled: vec![false; count],
    }
  }

  fn complete(&mut self, index: usize, result: Result<NodeOutcome, String>) {
    match result {
      Ok(outcome) => {
        let node = &mut self.plan.nodes[index];
        node.info = outcome.info;
        node.state = outcome.state;
        match outcome.error {
          None => self.report.nodes_written += 1,
          Some(err) => self.fail(index, err.to_string()),
        }
      }
      Err(panic) => self.fail(index, format!("worker panicked: {}", panic)),
    }
    self.done[index] = true;
    self.settle(index);
  }

  fn settle(&mut self, mut index: usize) {
    loop {
      if self.signalled[index] || !self.done[index] {
        return;
      }
      if self.plan.nodes[index].state != TileState::Failed {
        if self.waiting[index] > 0 {
          return;
        }
        self.merge(index);
      }
      self.signalled[index] = true;
      match self.plan.nodes[index].parent {
        Some(parent) => {
          self.waiting[parent] -= 1;
          index = parent;
        }
        None => return,
      }
    }
  }

  /// Fold settled children into a written node and move it to `Merged`.
  fn merge(&mut self, index: usize) {
    let nodes = &self.plan.nodes;
    let node = &nodes[index];
    let merged = aggregate(
      &node.info,
      node.children.iter().map(|&c| {
        let child = &nodes[c];
        (&child.info, child.state, child.partial)
      }),
    );
    let written: Vec<TileInfo> = node
      .children
      .iter()
      .map(|&c| &nodes[c])
      .filter(|c| c.state.is_written())
      .map(|c| c.info.clone())
      .collect();
    let has_children = !node.children.is_empty();

    let node = &mut self.plan.nodes[index];
    node.info.bounds = merged.bounds;
    node.info.geometric_error = merged.geometric_error;
    node.partial = merged.partial;
    if merged.partial {
      tracing::debug!("tile {} merged with missing children", node.info.address);
    }

    if has_children {
      if let Err(err) = self.writer.write_refinement(&node.info, &written, node.partial) {
        self.fail(index, err.to_string());
        return;
      }
    }
    match node.state.apply(TileEvent::ChildrenMerged) {
      Ok(transition) => {
        node.state = transition.state;
        self.report.nodes_merged += 1;
      }
      Err(err) => self.fail(index, err.to_string()),
    }
  }

  fn fail(&mut self, index: usize, reason: String) {
    let node = &mut self.plan.nodes[index];
    node.state = node
      .state
      .apply(TileEvent::Fail)
      .map_or(TileState::Failed, |t| t.state);
    tracing::warn!("tile {} of '{}' failed: {}", node.info.address, self.input, reason);
    self
      .report
      .failures
      .push(NodeFailure::node(self.input, &node.info.address, &reason));
    node.failure = Some(reason);
  }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod orchestrator_test;
