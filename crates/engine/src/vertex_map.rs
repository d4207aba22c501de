//! `vertex_map`/`vertex_filter`: per-vertex passes over a [`Frontier`] that
//! don't walk edges, §4.6.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::{
    edge_map::finish_dense, frontier::Frontier, index::Idx, partitioned_graph::PartitionedGraph,
};

/// Applies `f` to every active vertex of `frontier`, dispatching on its
/// representation: the all-active shortcut and the dense bitmap both scan
/// `[0, n)` in parallel, the sparse list iterates only its own entries.
pub fn vertex_map<NI, EV, F>(graph: &PartitionedGraph<NI, EV>, frontier: &Frontier<NI>, f: F)
where
    NI: Idx,
    EV: Copy + Send + Sync,
    F: Fn(NI) + Sync,
{
    let n = graph.n();
    if frontier.is_all() {
        (0..n).into_par_iter().map(NI::new).for_each(&f);
    } else if let Some(dense) = frontier.dense_bits() {
        (0..n)
            .into_par_iter()
            .filter(|&v| dense[v])
            .map(NI::new)
            .for_each(&f);
    } else if let Some(sparse) = frontier.sparse() {
        sparse.par_iter().for_each(|&v| f(v));
    }
}

/// Produces a new dense frontier `W` with `W[v] = pred(v)` for every active
/// `v` in `frontier`, `false` elsewhere, then runs the same `(d_m,
/// num_out_edges)` reduction as [`crate::edge_map::edge_map`].
pub fn vertex_filter<NI, EV, Pred>(
    graph: &PartitionedGraph<NI, EV>,
    frontier: &Frontier<NI>,
    pred: Pred,
) -> Frontier<NI>
where
    NI: Idx,
    EV: Copy + Send + Sync,
    Pred: Fn(NI) -> bool + Sync,
{
    let n = graph.n();
    let next: Vec<AtomicBool> = (0..n).map(|_| AtomicBool::new(false)).collect();

    vertex_map(graph, frontier, |v| {
        if pred(v) {
            next[v.index()].store(true, Ordering::Relaxed);
        }
    });

    finish_dense(graph, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::PartitionConfig, prelude::*};
    use std::sync::atomic::AtomicUsize;

    fn small_graph() -> PartitionedGraph<usize, ()> {
        let graph: DirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)])
            .build();
        let cfg = PartitionConfig {
            num_partitions: 2,
            num_numa_nodes: Some(1),
            ..Default::default()
        };
        PartitionedGraph::new(graph, &cfg).unwrap()
    }

    #[test]
    fn vertex_map_visits_every_vertex_in_an_all_active_frontier() {
        let graph = small_graph();
        let visited = AtomicUsize::new(0);
        let frontier = Frontier::all(graph.n(), graph.m());
        vertex_map(&graph, &frontier, |_| {
            visited.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(visited.load(Ordering::Relaxed), graph.n());
    }

    #[test]
    fn vertex_map_visits_only_sparse_entries() {
        let graph = small_graph();
        let frontier: Frontier<usize> = Frontier::singleton(2, graph.graph().out_degree(2).index());
        let seen: std::sync::Mutex<Vec<usize>> = std::sync::Mutex::new(Vec::new());
        vertex_map(&graph, &frontier, |v| seen.lock().unwrap().push(v));
        assert_eq!(seen.into_inner().unwrap(), vec![2]);
    }

    #[test]
    fn vertex_filter_produces_a_dense_frontier_matching_the_predicate() {
        let graph = small_graph();
        let frontier = Frontier::all(graph.n(), graph.m());
        let next = vertex_filter(&graph, &frontier, |v| v % 2 == 0);

        assert!(next.is_dense());
        for v in 0..graph.n() {
            assert_eq!(next.contains(v), v % 2 == 0);
        }
        assert_eq!(next.len(), (0..graph.n()).filter(|v| v % 2 == 0).count());
    }
}
