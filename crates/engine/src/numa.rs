//! NUMA topology discovery and per-partition memory placement.
//!
//! Real NUMA binding needs an OS-level policy call (`mbind`/`libnuma`). Behind
//! the `numa` feature, topology discovery goes through `hwlocality`; without
//! it (or if discovery fails, e.g. inside a container with no topology
//! access), the allocator falls back to a documented single-node policy: it
//! first-touches every element of a freshly allocated buffer from the
//! calling thread (matching the "pages pre-faulted by the allocating thread"
//! policy from the concurrency model) without actually pinning pages to
//! `node`. Every partitioned type still carries a [`NodeId`] end to end so a
//! real NUMA-aware allocator can be substituted later without changing call
//! sites.

use std::sync::OnceLock;

/// Identifies a NUMA node. Partitions are assigned to nodes round-robin in
/// contiguous blocks by the [`crate::partition::Partitioner`].
pub type NodeId = usize;

#[cfg(feature = "numa")]
fn discover_node_count() -> Option<usize> {
    use hwlocality::object::types::ObjectType;
    use hwlocality::Topology;

    let topology = Topology::new().ok()?;
    let nodes = topology
        .objects_with_type(ObjectType::NUMANode)
        .count();
    Some(nodes).filter(|&n| n > 0)
}

#[cfg(not(feature = "numa"))]
fn discover_node_count() -> Option<usize> {
    None
}

/// Returns the number of NUMA nodes visible to this process.
///
/// Honors `GRAPH_ENGINE_NUMA_NODES` first, so deployments that know their
/// topology (or tests that want to exercise multi-node partitioning) can
/// always override discovery. Otherwise tries `hwlocality` behind the `numa`
/// feature, falling back to a single node when the feature is off or
/// discovery finds nothing.
pub fn node_count() -> usize {
    static NODES: OnceLock<usize> = OnceLock::new();
    *NODES.get_or_init(|| {
        std::env::var("GRAPH_ENGINE_NUMA_NODES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .or_else(discover_node_count)
            .unwrap_or(1)
    })
}

/// Allocates a buffer of `len` elements intended for partition `node`,
/// first-touching every element before returning it.
pub fn alloc_first_touch<T: Clone>(_node: NodeId, len: usize, init: T) -> Box<[T]> {
    vec![init; len].into_boxed_slice()
}
