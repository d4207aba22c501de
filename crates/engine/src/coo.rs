//! Per-partition COO (coordinate list) edge storage, built in §4.3.

use log::info;
use rayon::prelude::*;
use std::time::Instant;

use crate::{
    config::{CooSortPolicy, PartitionDirection},
    index::Idx,
    numa::NodeId,
    partition::{direction_key, Partitioner},
    DirectedNeighborsWithValues, Graph,
};

/// A `(src, dst, weight)` triple, optionally carrying a cached Hilbert key.
#[derive(Debug, Clone, Copy)]
pub struct Edge<NI, EV> {
    pub src: NI,
    pub dst: NI,
    pub weight: EV,
}

impl<NI, EV> Edge<NI, EV> {
    pub fn new(src: NI, dst: NI, weight: EV) -> Self {
        Self { src, dst, weight }
    }
}

/// Rounds `x` up to the next power of two (`1` if `x == 0`).
fn next_pow2(x: u64) -> u64 {
    if x <= 1 {
        1
    } else {
        1u64 << (64 - (x - 1).leading_zeros())
    }
}

/// Rotates/reflects a quadrant, the standard step in the iterative Hilbert
/// `xy2d` construction.
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n - 1 - *x;
            *y = n - 1 - *y;
        }
        std::mem::swap(x, y);
    }
}

/// Maps `(x, y)` on an `n x n` grid (`n` a power of two) to its index along
/// the Hilbert space-filling curve.
pub fn xy2d(n: u64, mut x: u64, mut y: u64) -> u64 {
    let mut d = 0u64;
    let mut s = n / 2;
    while s > 0 {
        let rx = u64::from((x & s) > 0);
        let ry = u64::from((y & s) > 0);
        d += s * s * ((3 * rx) ^ ry);
        rotate(s, &mut x, &mut y, rx, ry);
        s /= 2;
    }
    d
}

/// A partition's COO edge list, allocated (conceptually) on `numa_node`.
#[derive(Debug)]
pub struct CooPartition<NI, EV> {
    numa_node: NodeId,
    edges: Box<[Edge<NI, EV>]>,
}

impl<NI, EV> CooPartition<NI, EV> {
    pub fn numa_node(&self) -> NodeId {
        self.numa_node
    }

    pub fn edges(&self) -> &[Edge<NI, EV>] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Builds one [`CooPartition`] per partition by scanning the whole graph's
/// out-edges once and bucketing each edge by `partitioner.partition_of_vertex`
/// of its source or destination, depending on `direction`.
pub fn build<NI, EV, G>(
    graph: &G,
    partitioner: &Partitioner,
    direction: PartitionDirection,
    sort: CooSortPolicy,
) -> Vec<CooPartition<NI, EV>>
where
    NI: Idx,
    EV: Copy + Send + Sync,
    G: Graph<NI> + DirectedNeighborsWithValues<NI, EV> + Sync,
{
    let start = Instant::now();
    let num_partitions = partitioner.num_partitions();
    let n = graph.node_count().index();

    let mut buckets: Vec<Vec<Edge<NI, EV>>> = (0..num_partitions).map(|_| Vec::new()).collect();
    for src in 0..n {
        let src_ni = NI::new(src);
        for target in graph.out_neighbors_with_values(src_ni) {
            let key = direction_key(direction, src, target.target.index());
            let part = partitioner.partition_of_vertex(key);
            buckets[part].push(Edge::new(src_ni, target.target, target.value));
        }
    }

    let grid = next_pow2(n as u64);

    let partitions = buckets
        .into_par_iter()
        .enumerate()
        .map(|(part, mut edges)| {
            match sort {
                CooSortPolicy::CsrSort => {
                    edges.sort_unstable_by_key(|e| (e.src.index(), e.dst.index()))
                }
                CooSortPolicy::HilbertSort => edges.sort_unstable_by_key(|e| {
                    xy2d(grid, e.src.index() as u64, e.dst.index() as u64)
                }),
            }
            CooPartition {
                numa_node: partitioner.numa_of(part),
                edges: edges.into_boxed_slice(),
            }
        })
        .collect::<Vec<_>>();

    info!(
        "Built {} COO partitions in {:?}",
        num_partitions,
        start.elapsed()
    );
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_pow2_rounds_up() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(5), 8);
        assert_eq!(next_pow2(8), 8);
    }

    #[test]
    fn xy2d_is_a_bijection_on_a_small_grid() {
        let n = 4u64;
        let mut seen = std::collections::HashSet::new();
        for x in 0..n {
            for y in 0..n {
                let d = xy2d(n, x, y);
                assert!(d < n * n);
                assert!(seen.insert(d), "duplicate hilbert index for ({x},{y})");
            }
        }
    }
}
