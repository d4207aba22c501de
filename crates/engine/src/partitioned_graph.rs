//! [`PartitionedGraph`]: a whole-graph CSR plus its per-partition CSC and
//! COO storage, optionally VEBO-relabeled first, §4.1-§4.3.

use log::info;
use rayon::prelude::*;
use std::time::Instant;

use crate::{
    config::{PartitionConfig, PartitionDirection, PartitionMetric},
    coo::{self, CooPartition},
    csc::{self, CscPartition},
    graph::csr::CsrLayout,
    index::Idx,
    partition::Partitioner,
    vebo, builder::GraphBuilder, DirectedCsrGraph, DirectedDegrees, DirectedNeighborsWithValues,
    Error, Graph,
};

/// A directed graph split into [`CscPartition`]s (destination-indexed
/// in-edges) and [`CooPartition`]s (coordinate edge lists), alongside the
/// whole-graph CSR it was built from.
///
/// If [`PartitionConfig::vebo`] is set, vertices are relabeled before
/// partitioning (§4.7) and [`PartitionedGraph::original_id`] translates a
/// relabeled id back to the id the caller's edges used.
#[derive(Debug)]
pub struct PartitionedGraph<NI: Idx, EV = ()> {
    graph: DirectedCsrGraph<NI, (), EV>,
    partitioner: Partitioner,
    csc: Vec<CscPartition<NI, EV>>,
    coo: Vec<CooPartition<NI, EV>>,
    direction: PartitionDirection,
    original_id: Option<Box<[NI]>>,
}

impl<NI, EV> PartitionedGraph<NI, EV>
where
    NI: Idx,
    EV: Copy + Send + Sync,
{
    /// Partitions `graph` according to `cfg`, applying a VEBO relabeling
    /// first when `cfg.vebo` is set.
    pub fn new(graph: DirectedCsrGraph<NI, (), EV>, cfg: &PartitionConfig) -> Result<Self, Error> {
        let start = Instant::now();

        let (graph, original_id) = if cfg.vebo {
            let relabeling = vebo::compute(&graph, cfg.num_partitions);
            let (relabeled, original_id) = relabel(&graph, &relabeling);
            (relabeled, Some(original_id))
        } else {
            (graph, None)
        };

        let n = graph.node_count().index();
        let partitioner = match cfg.metric {
            PartitionMetric::Vertex => Partitioner::by_vertex(n, cfg)?,
            PartitionMetric::Edge => {
                let degrees: Vec<NI> = (0..n)
                    .into_par_iter()
                    .map(|v| {
                        let v = NI::new(v);
                        match cfg.direction {
                            PartitionDirection::ByDestination => graph.in_degree(v),
                            PartitionDirection::BySource | PartitionDirection::ByVertex => {
                                graph.out_degree(v)
                            }
                        }
                    })
                    .collect();
                Partitioner::by_degree(&degrees, cfg)?
            }
        };

        let csc = csc::build(&graph, &partitioner);
        let coo = coo::build(&graph, &partitioner, cfg.direction, cfg.coo_sort);

        info!(
            "Partitioned graph ({} nodes, {} edges) in {:?}",
            graph.node_count().index(),
            graph.edge_count().index(),
            start.elapsed()
        );

        Ok(Self {
            graph,
            partitioner,
            csc,
            coo,
            direction: cfg.direction,
            original_id,
        })
    }

    /// The number of vertices.
    pub fn n(&self) -> usize {
        self.graph.node_count().index()
    }

    /// The number of edges.
    pub fn m(&self) -> usize {
        self.graph.edge_count().index()
    }

    /// The whole-graph CSR this partitioning was built from. If
    /// [`PartitionConfig::vebo`] was set, this is the *relabeled* graph, not
    /// the one passed to [`PartitionedGraph::new`].
    pub fn graph(&self) -> &DirectedCsrGraph<NI, (), EV> {
        &self.graph
    }

    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    pub fn direction(&self) -> PartitionDirection {
        self.direction
    }

    pub fn csc_partitions(&self) -> &[CscPartition<NI, EV>] {
        &self.csc
    }

    pub fn coo_partitions(&self) -> &[CooPartition<NI, EV>] {
        &self.coo
    }

    /// Translates a relabeled vertex id back to the id used by the edges
    /// passed into [`PartitionedGraph::new`]. A no-op (`v` unchanged) when no
    /// VEBO relabeling was applied.
    pub fn original_id(&self, v: NI) -> NI {
        match &self.original_id {
            Some(ids) => ids[v.index()],
            None => v,
        }
    }

    /// Whether a VEBO relabeling was applied.
    pub fn is_relabeled(&self) -> bool {
        self.original_id.is_some()
    }
}

/// Rebuilds a graph under the VEBO permutation in `relabeling`, returning the
/// relabeled graph and the inverse permutation (`original_id[new] == orig`).
fn relabel<NI, EV>(
    graph: &DirectedCsrGraph<NI, (), EV>,
    relabeling: &vebo::VeboRelabeling<NI>,
) -> (DirectedCsrGraph<NI, (), EV>, Box<[NI]>)
where
    NI: Idx,
    EV: Copy + Send + Sync,
{
    let n = graph.node_count().index();
    let new_id = &relabeling.new_id;

    let mut original_id = vec![NI::zero(); n];
    for (orig, &new) in new_id.iter().enumerate() {
        original_id[new.index()] = NI::new(orig);
    }

    let edges: Vec<(NI, NI, EV)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|orig_src| {
            let src = NI::new(orig_src);
            let new_src = new_id[orig_src];
            graph
                .out_neighbors_with_values(src)
                .map(move |t| (new_src, new_id[t.target.index()], t.value))
        })
        .collect();

    let relabeled = GraphBuilder::new()
        .csr_layout(CsrLayout::Unsorted)
        .edges_with_values(edges)
        .build::<DirectedCsrGraph<NI, (), EV>>();

    (relabeled, original_id.into_boxed_slice())
}
