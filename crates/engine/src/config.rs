//! Partitioning and VEBO configuration surfaces.
//!
//! These mirror the `-c`/`-p`/`-P`/`-v`/`-o` flags of the algorithm drivers
//! (§6), kept here as plain `Copy` structs rather than parsed directly off
//! `std::env::args` so callers embedding this engine can construct them
//! programmatically. A `cli` feature derives `clap::Args` for binaries that
//! do want to parse them straight off the command line, and a `serde`
//! feature derives (de)serialization for callers that persist a
//! configuration alongside a partitioned graph.

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionDirection {
    /// Balance in-degree across partitions (`-P dest`, the default).
    ByDestination,
    /// Balance out-degree across partitions (`-P source`).
    BySource,
    /// Equal-sized vertex ranges, ignoring edge balance.
    ByVertex,
}

impl Default for PartitionDirection {
    fn default() -> Self {
        PartitionDirection::ByDestination
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMetric {
    /// Balance the number of edges per partition (`-v edge`, the default).
    Edge,
    /// Balance the number of vertices per partition (`-v vertex`).
    Vertex,
}

impl Default for PartitionMetric {
    fn default() -> Self {
        PartitionMetric::Edge
    }
}

/// Secondary sort key for a partition's COO edge list (§4.3).
///
/// Open question (see §9 of the design notes and `DESIGN.md`): the source
/// keeps this behind a compile-time flag and neither ordering dominates on
/// all graphs. [`PartitionConfig::default`] picks `CsrSort`, since it needs
/// no grid-size computation; `HilbertSort` remains an explicit opt-in for
/// callers who want space-filling-curve locality instead.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooSortPolicy {
    /// Primary key `src`, secondary key `dst`.
    CsrSort,
    /// Hilbert space-filling-curve key over `(src, dst)`.
    HilbertSort,
}

/// Partitioning and NUMA placement knobs, analogous to `-c`/`-p`/`-P`/`-v`/`-o`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[derive(Debug, Clone, Copy)]
pub struct PartitionConfig {
    /// Number of storage partitions (`-c`, default 384).
    #[cfg_attr(feature = "cli", arg(short = 'c', long, default_value_t = 384))]
    pub num_partitions: usize,
    /// Number of NUMA nodes to spread partitions across (`-p`, default
    /// auto-detected via [`crate::numa::node_count`]).
    #[cfg_attr(feature = "cli", arg(short = 'p', long))]
    pub num_numa_nodes: Option<usize>,
    /// Partitioning direction (`-P`, default `dest`).
    #[cfg_attr(feature = "cli", arg(short = 'P', long, value_enum, default_value_t = PartitionDirection::ByDestination))]
    pub direction: PartitionDirection,
    /// Partition balance metric (`-v`, default `edge`).
    #[cfg_attr(feature = "cli", arg(short = 'v', long, value_enum, default_value_t = PartitionMetric::Edge))]
    pub metric: PartitionMetric,
    /// Secondary COO sort order.
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub coo_sort: CooSortPolicy,
    /// Apply VEBO relabeling before partitioning (`-o`).
    #[cfg_attr(feature = "cli", arg(short = 'o', long, default_value_t = false))]
    pub vebo: bool,
}

impl PartitionConfig {
    pub fn num_numa_nodes(&self) -> usize {
        self.num_numa_nodes.unwrap_or_else(crate::numa::node_count)
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            num_partitions: 384,
            num_numa_nodes: None,
            direction: PartitionDirection::default(),
            metric: PartitionMetric::default(),
            coo_sort: CooSortPolicy::CsrSort,
            vebo: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_cli_defaults() {
        let cfg = PartitionConfig::default();
        assert_eq!(cfg.num_partitions, 384);
        assert_eq!(cfg.direction, PartitionDirection::ByDestination);
        assert_eq!(cfg.metric, PartitionMetric::Edge);
        assert!(!cfg.vebo);
    }
}
