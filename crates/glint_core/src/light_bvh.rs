//! Light importance BVH.
//!
//! A flattened binary tree over every emitter primitive in the scene. Each
//! node stores the bounding box, merged directional bound and total power
//! of the primitives below it. Sampling walks from the root, choosing a
//! child by an importance estimate at each inner node, and returns the
//! exact probability of the primitive it lands on.
//!
//! The tree is built once, top-down, with a binned surface-area and
//! orientation heuristic. Sibling subtrees are built in parallel.

use crate::{DirectionalBound, Emitter, EmitterId, SceneError, SceneResult, Sampler};
use glint_math::{Aabb, Vec3};
use std::collections::HashMap;
use std::time::Instant;

/// Centroid bins evaluated per axis.
const BIN_COUNT: usize = 12;

/// Co-located primitives that may share one leaf.
const LEAF_MAX_SIZE: usize = 4;

/// Subtrees smaller than this are built on the current thread.
const PARALLEL_THRESHOLD: usize = 256;

/// Lower clamp on squared distances in the importance estimate.
const MIN_DISTANCE_SQUARED: f32 = 1e-6;

const NO_PARENT: u32 = u32::MAX;

/// Shading point a light is selected for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightQuery {
    pub p: Vec3,
    pub n: Vec3,
}

impl LightQuery {
    pub fn new(p: Vec3, n: Vec3) -> Self {
        Self { p, n }
    }
}

/// Result of sampling the light BVH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSelection {
    pub emitter: EmitterId,
    /// Primitive of `emitter` that was chosen
    pub primitive: u32,
    /// Discrete probability of choosing exactly this primitive
    pub pdf: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightNodeKind {
    /// `size` primitives starting at `start` in the index permutation.
    Leaf { start: u32, size: u32 },
    /// Left child is the next node; the right child sits at `right_child`.
    Inner { axis: u8, right_child: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightNode {
    pub kind: LightNodeKind,
    pub bbox: Aabb,
    pub bound: DirectionalBound,
    pub power: f32,
}

impl LightNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, LightNodeKind::Leaf { .. })
    }

    /// Simplified importance: inverse squared distance to the box center.
    fn importance(&self, query: &LightQuery) -> f32 {
        let d2 = (self.bbox.centroid() - query.p).length_squared();
        1.0 / d2.max(MIN_DISTANCE_SQUARED)
    }

    fn shift(&mut self, offset: u32) {
        if let LightNodeKind::Inner { right_child, .. } = &mut self.kind {
            *right_child += offset;
        }
    }
}

/// One emitter primitive as seen by the build.
#[derive(Debug, Clone, Copy)]
struct LightPrimitive {
    bbox: Aabb,
    centroid: Vec3,
    bound: DirectionalBound,
    power: f32,
}

/// Bounding data accumulated over a set of primitives.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    bbox: Aabb,
    bound: DirectionalBound,
    power: f32,
    count: usize,
}

impl Bounds {
    const EMPTY: Bounds = Bounds {
        bbox: Aabb::EMPTY,
        bound: DirectionalBound::INVALID,
        power: 0.0,
        count: 0,
    };

    fn add(&mut self, primitive: &LightPrimitive) {
        self.bbox = Aabb::surrounding(&self.bbox, &primitive.bbox);
        self.bound = self.bound.merge(&primitive.bound);
        self.power += primitive.power;
        self.count += 1;
    }

    fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            bbox: Aabb::surrounding(&self.bbox, &other.bbox),
            bound: self.bound.merge(&other.bound),
            power: self.power + other.power,
            count: self.count + other.count,
        }
    }

    /// Power-weighted surface area and orientation cost.
    fn cost(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.power * self.bbox.surface_area() * self.bound.orientation_cost()
    }
}

/// Light importance BVH over registered emitters.
///
/// Emitters are registered with [`add_emitter`](Self::add_emitter) and the
/// tree is frozen by [`build`](Self::build). The BVH only stores emitter
/// ids; the scene owns the emitters.
#[derive(Debug, Default)]
pub struct LightBvh {
    emitters: Vec<EmitterId>,
    slots: HashMap<EmitterId, u32>,
    /// Prefix sums of primitive counts, starting at 0
    offsets: Vec<u32>,
    primitives: Vec<LightPrimitive>,
    nodes: Vec<LightNode>,
    /// Permutation of flattened primitive indices referenced by leaves
    indices: Vec<u32>,
    parents: Vec<u32>,
    /// Leaf node holding each flattened primitive
    leaf_of: Vec<u32>,
    built: bool,
}

impl LightBvh {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            ..Default::default()
        }
    }

    /// Register an emitter and all of its primitives.
    pub fn add_emitter(&mut self, id: EmitterId, emitter: &dyn Emitter) -> SceneResult<()> {
        if self.built {
            return Err(SceneError::LightBvhFrozen);
        }
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }

        let slot = self.emitters.len() as u32;
        let count = emitter.primitive_count();
        for index in 0..count {
            let bbox = emitter.primitive_bounding_box(index);
            self.primitives.push(LightPrimitive {
                bbox,
                centroid: bbox.centroid(),
                bound: emitter.primitive_directional_bound(index),
                power: emitter.primitive_power(index),
            });
        }

        let last = self.offsets.last().copied().unwrap_or(0);
        self.offsets.push(last + count);
        self.emitters.push(id);
        self.slots.insert(id, slot);
        Ok(())
    }

    /// Build the tree. Calling it again is a no-op.
    pub fn build(&mut self) {
        if self.built {
            return;
        }
        self.built = true;
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }

        let count = self.primitives.len();
        if count == 0 {
            return;
        }

        let start = Instant::now();
        let mut indices: Vec<u32> = (0..count as u32).collect();
        self.nodes = build_subtree(&self.primitives, &mut indices, 0);
        self.indices = indices;

        self.parents = vec![NO_PARENT; self.nodes.len()];
        self.leaf_of = vec![0; count];
        for (index, node) in self.nodes.iter().enumerate() {
            match node.kind {
                LightNodeKind::Inner { right_child, .. } => {
                    self.parents[index + 1] = index as u32;
                    self.parents[right_child as usize] = index as u32;
                }
                LightNodeKind::Leaf { start, size } => {
                    for slot in start..start + size {
                        self.leaf_of[self.indices[slot as usize] as usize] = index as u32;
                    }
                }
            }
        }

        log::debug!(
            "Light BVH: {} emitters, {} primitives, {} nodes in {:.2?}",
            self.emitters.len(),
            count,
            self.nodes.len(),
            start.elapsed()
        );
    }

    /// Choose an emitter primitive for `query`.
    ///
    /// Returns `None` before [`build`](Self::build) or when no emitter is
    /// registered.
    pub fn sample(&self, query: &LightQuery, sampler: &mut dyn Sampler) -> Option<LightSelection> {
        if !self.built || self.nodes.is_empty() {
            return None;
        }

        let mut pdf = 1.0;
        let mut index = 0;
        loop {
            match self.nodes[index].kind {
                LightNodeKind::Inner { right_child, .. } => {
                    let p_left = self.left_probability(index, query);
                    if sampler.next_1d() < p_left {
                        pdf *= p_left;
                        index += 1;
                    } else {
                        pdf *= 1.0 - p_left;
                        index = right_child as usize;
                    }
                }
                LightNodeKind::Leaf { start, size } => {
                    let pick = ((sampler.next_1d() * size as f32) as u32).min(size - 1);
                    pdf /= size as f32;
                    let flat = self.indices[(start + pick) as usize];
                    let (emitter, primitive) = self.locate(flat);
                    return Some(LightSelection {
                        emitter,
                        primitive,
                        pdf,
                    });
                }
            }
        }
    }

    /// Probability that [`sample`](Self::sample) returns `primitive` of
    /// `emitter` for `query`.
    pub fn pdf(&self, query: &LightQuery, emitter: EmitterId, primitive: u32) -> f32 {
        if !self.built || self.nodes.is_empty() {
            return 0.0;
        }
        let Some(&slot) = self.slots.get(&emitter) else {
            return 0.0;
        };
        let slot = slot as usize;
        if primitive >= self.offsets[slot + 1] - self.offsets[slot] {
            return 0.0;
        }

        let flat = (self.offsets[slot] + primitive) as usize;
        let mut node = self.leaf_of[flat];
        let mut pdf = match self.nodes[node as usize].kind {
            LightNodeKind::Leaf { size, .. } => 1.0 / size as f32,
            LightNodeKind::Inner { .. } => return 0.0,
        };

        while self.parents[node as usize] != NO_PARENT {
            let parent = self.parents[node as usize] as usize;
            let p_left = self.left_probability(parent, query);
            pdf *= if node as usize == parent + 1 {
                p_left
            } else {
                1.0 - p_left
            };
            node = parent as u32;
        }
        pdf
    }

    /// Probability of descending into the left child of inner node `index`.
    fn left_probability(&self, index: usize, query: &LightQuery) -> f32 {
        let LightNodeKind::Inner { right_child, .. } = self.nodes[index].kind else {
            return 1.0;
        };
        let left = self.nodes[index + 1].importance(query);
        let right = self.nodes[right_child as usize].importance(query);
        let total = left + right;
        if total > 0.0 && total.is_finite() {
            left / total
        } else {
            0.5
        }
    }

    /// Map a flattened primitive index back to its emitter.
    fn locate(&self, flat: u32) -> (EmitterId, u32) {
        // Last offset not greater than `flat`; emitters without primitives
        // share their offset with the next one and are skipped.
        let slot = self.offsets.partition_point(|&offset| offset <= flat) - 1;
        (self.emitters[slot], flat - self.offsets[slot])
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    pub fn primitive_count(&self) -> u32 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn nodes(&self) -> &[LightNode] {
        &self.nodes
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn bounding_box(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |root| root.bbox)
    }

    pub fn directional_bound(&self) -> DirectionalBound {
        self.nodes
            .first()
            .map_or(DirectionalBound::INVALID, |root| root.bound)
    }
}

/// Build the subtree over `indices`, returning its nodes with the root
/// first. Child offsets are relative to the returned vector; leaf starts are
/// absolute (`start` is the position of `indices` in the full permutation).
fn build_subtree(primitives: &[LightPrimitive], indices: &mut [u32], start: u32) -> Vec<LightNode> {
    let mut bounds = Bounds::EMPTY;
    let mut centroids = Aabb::EMPTY;
    for &i in indices.iter() {
        let primitive = &primitives[i as usize];
        bounds.add(primitive);
        centroids = centroids.surrounding_point(primitive.centroid);
    }

    let n = indices.len();
    let extent = centroid_extent(&centroids);
    let coincident = extent.max_element() <= 0.0;

    if n == 1 || (coincident && n <= LEAF_MAX_SIZE) {
        return vec![LightNode {
            kind: LightNodeKind::Leaf {
                start,
                size: n as u32,
            },
            bbox: bounds.bbox,
            bound: bounds.bound,
            power: bounds.power,
        }];
    }

    let (axis, mid) = match find_split(primitives, indices, &bounds, &centroids, extent) {
        Some((axis, split)) => {
            let lo = centroids.min()[axis];
            let (left, _) = partition::partition(indices, |&i| {
                bin_of(primitives[i as usize].centroid[axis], lo, extent[axis]) < split
            });
            (axis, left.len())
        }
        None => {
            let axis = centroids.longest_axis();
            indices.sort_unstable_by(|&a, &b| {
                let ca = primitives[a as usize].centroid[axis];
                let cb = primitives[b as usize].centroid[axis];
                ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
            });
            (axis, n / 2)
        }
    };

    let (left_indices, right_indices) = indices.split_at_mut(mid);
    let right_start = start + mid as u32;
    let (left, right) = if n > PARALLEL_THRESHOLD {
        rayon::join(
            || build_subtree(primitives, left_indices, start),
            || build_subtree(primitives, right_indices, right_start),
        )
    } else {
        (
            build_subtree(primitives, left_indices, start),
            build_subtree(primitives, right_indices, right_start),
        )
    };

    let right_offset = 1 + left.len() as u32;
    let mut nodes = Vec::with_capacity(1 + left.len() + right.len());
    nodes.push(LightNode {
        kind: LightNodeKind::Inner {
            axis: axis as u8,
            right_child: right_offset,
        },
        bbox: bounds.bbox,
        bound: bounds.bound,
        power: bounds.power,
    });
    nodes.extend(left.into_iter().map(|mut node| {
        node.shift(1);
        node
    }));
    nodes.extend(right.into_iter().map(|mut node| {
        node.shift(right_offset);
        node
    }));
    nodes
}

/// Best binned split as `(axis, first right bin)`, or `None` when no axis
/// separates the primitives into two non-empty sides.
fn find_split(
    primitives: &[LightPrimitive],
    indices: &[u32],
    parent: &Bounds,
    centroids: &Aabb,
    extent: Vec3,
) -> Option<(usize, usize)> {
    let max_extent = extent.max_element();
    let parent_cost = parent.bbox.surface_area() * parent.bound.orientation_cost();
    let normalization = if parent_cost > 0.0 { parent_cost } else { 1.0 };

    let mut best: Option<(f32, usize, usize)> = None;
    for axis in 0..3 {
        if extent[axis] <= 0.0 {
            continue;
        }

        let lo = centroids.min()[axis];
        let mut bins = [Bounds::EMPTY; BIN_COUNT];
        for &i in indices {
            let primitive = &primitives[i as usize];
            bins[bin_of(primitive.centroid[axis], lo, extent[axis])].add(primitive);
        }

        let regularization = max_extent / extent[axis];
        for split in 1..BIN_COUNT {
            let left = bins[..split].iter().fold(Bounds::EMPTY, |acc, b| acc.union(b));
            let right = bins[split..].iter().fold(Bounds::EMPTY, |acc, b| acc.union(b));
            if left.count == 0 || right.count == 0 {
                continue;
            }

            let cost = regularization * (left.cost() + right.cost()) / normalization;
            if !cost.is_finite() {
                continue;
            }
            if best.map_or(true, |(best_cost, _, _)| cost < best_cost) {
                best = Some((cost, axis, split));
            }
        }
    }

    best.map(|(_, axis, split)| (axis, split))
}

fn centroid_extent(centroids: &Aabb) -> Vec3 {
    if centroids.is_empty() {
        Vec3::ZERO
    } else {
        (centroids.max() - centroids.min()).max(Vec3::ZERO)
    }
}

fn bin_of(value: f32, lo: f32, extent: f32) -> usize {
    let relative = (value - lo) / extent;
    ((relative * BIN_COUNT as f32) as usize).min(BIN_COUNT - 1)
}
