pub use crate::builder::GraphBuilder;

pub use crate::graph::csr::CsrLayout;
pub use crate::graph::csr::DirectedCsrGraph;
pub use crate::graph::csr::Target;
pub use crate::graph::csr::UndirectedCsrGraph;

pub use crate::graph_ops::DegreePartitionOp;
pub use crate::graph_ops::DeserializeGraphOp;
pub use crate::graph_ops::ForEachNodeParallelByPartitionOp;
pub use crate::graph_ops::ForEachNodeParallelOp;
pub use crate::graph_ops::InDegreePartitionOp;
pub use crate::graph_ops::OutDegreePartitionOp;
pub use crate::graph_ops::RelabelByDegreeOp;
pub use crate::graph_ops::SerializeGraphOp;
pub use crate::graph_ops::ToUndirectedOp;

pub use crate::index::Idx;
pub use atomic::Atomic;

pub use crate::input::*;

pub use crate::DirectedDegrees;
pub use crate::DirectedNeighbors;
pub use crate::DirectedNeighborsWithValues;
pub use crate::Graph;
pub use crate::NodeValues;
pub use crate::UndirectedDegrees;
pub use crate::UndirectedNeighbors;
pub use crate::UndirectedNeighborsWithValues;

pub use crate::Error;

pub use crate::config::CooSortPolicy;
pub use crate::config::PartitionConfig;
pub use crate::config::PartitionDirection;
pub use crate::config::PartitionMetric;

pub use crate::frontier::Frontier;

pub use crate::partitioned_graph::PartitionedGraph;

pub use crate::edge_map::edge_map;
pub use crate::edge_map::EdgeMapOp;
pub use crate::edge_map::EdgeMapOptions;

pub use crate::vertex_map::vertex_filter;
pub use crate::vertex_map::vertex_map;

pub use crate::vebo::compute as vebo_relabeling;
pub use crate::vebo::VeboRelabeling;
