//! The active-vertex set passed between [`edge_map`](crate::edge_map::edge_map)
//! calls, dual-represented as a dense bitmap or a sparse index list, §4.4.

use bitvec::prelude::*;
use rayon::prelude::*;

use crate::index::Idx;

/// A set of active vertices, either as a packed index list (cheap when few
/// vertices are active) or a bitmap (cheap to query, parallel to scan).
///
/// At least one of `dense`/`sparse` is populated at any time; `to_dense`/
/// `to_sparse` lazily produce the other representation and are idempotent.
#[derive(Debug, Clone)]
pub struct Frontier<NI> {
    dense: Option<BitBox>,
    sparse: Option<Vec<NI>>,
    d_m: usize,
    num_out_edges: usize,
    bit: bool,
}

impl<NI: Idx> Frontier<NI> {
    /// The empty frontier: no active vertices.
    pub fn empty() -> Self {
        Self {
            dense: None,
            sparse: Some(Vec::new()),
            d_m: 0,
            num_out_edges: 0,
            bit: false,
        }
    }

    /// A frontier containing exactly `v`, with `out_degree` pre-recorded so
    /// the driver can skip a degree lookup on the first iteration.
    pub fn singleton(v: NI, out_degree: usize) -> Self {
        Self {
            dense: None,
            sparse: Some(vec![v]),
            d_m: 1,
            num_out_edges: out_degree,
            bit: false,
        }
    }

    /// An empty, zeroed dense bitmap sized for `n` vertices.
    pub fn dense(n: usize) -> Self {
        Self {
            dense: Some(bitvec![0; n].into_boxed_bitslice()),
            sparse: None,
            d_m: 0,
            num_out_edges: 0,
            bit: false,
        }
    }

    /// The all-active shortcut: every vertex of the `n`-vertex, `m`-edge
    /// graph is active, without materializing a bitmap or index list.
    pub fn all(n: usize, m: usize) -> Self {
        Self {
            dense: None,
            sparse: None,
            d_m: n,
            num_out_edges: m,
            bit: true,
        }
    }

    /// Wraps an externally packed sparse index list with its already-known
    /// out-edge sum (§4.5.1 step 5).
    pub fn from_sparse(sparse: Vec<NI>, num_out_edges: usize) -> Self {
        let d_m = sparse.len();
        Self {
            dense: None,
            sparse: Some(sparse),
            d_m,
            num_out_edges,
            bit: false,
        }
    }

    /// Wraps an externally produced dense bitmap with its already-known
    /// active count and out-edge sum.
    pub fn boolean(dense: BitBox, d_m: usize, num_out_edges: usize) -> Self {
        debug_assert_eq!(dense.count_ones(), d_m);
        Self {
            dense: Some(dense),
            sparse: None,
            d_m,
            num_out_edges,
            bit: false,
        }
    }

    pub fn len(&self) -> usize {
        self.d_m
    }

    pub fn is_empty(&self) -> bool {
        self.d_m == 0 && !self.bit
    }

    pub fn num_out_edges(&self) -> usize {
        self.num_out_edges
    }

    /// True if every vertex is active (the `bits`/`all` shortcut).
    pub fn is_all(&self) -> bool {
        self.bit
    }

    pub fn is_dense(&self) -> bool {
        self.dense.is_some()
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse.is_some()
    }

    pub fn sparse(&self) -> Option<&[NI]> {
        self.sparse.as_deref()
    }

    pub fn dense_bits(&self) -> Option<&BitSlice> {
        self.dense.as_deref()
    }

    /// Returns whether `v` is active. `O(1)` regardless of representation
    /// (the all-active shortcut and the bitmap are both constant time; the
    /// sparse list falls back to a linear scan, so prefer `to_dense` first
    /// if many membership checks are coming).
    pub fn contains(&self, v: NI) -> bool {
        if self.bit {
            return true;
        }
        if let Some(dense) = &self.dense {
            return dense[v.index()];
        }
        if let Some(sparse) = &self.sparse {
            return sparse.contains(&v);
        }
        false
    }

    /// Ensures a dense bitmap is present, building one from the sparse list
    /// if necessary. Idempotent: a no-op if already dense or all-active.
    pub fn to_dense(&mut self, n: usize) {
        if self.dense.is_some() || self.bit {
            return;
        }
        let mut bits = bitvec![0; n].into_boxed_bitslice();
        if let Some(sparse) = &self.sparse {
            for &v in sparse {
                bits.set(v.index(), true);
            }
        }
        debug_assert_eq!(bits.count_ones(), self.d_m);
        self.dense = Some(bits);
    }

    /// Ensures a sparse index list is present, packing one from the dense
    /// bitmap (via a parallel filter) if necessary. Idempotent.
    pub fn to_sparse(&mut self) {
        if self.sparse.is_some() {
            return;
        }
        let sparse = if self.bit {
            unreachable!("all-active frontiers never need a materialized sparse list")
        } else if let Some(dense) = &self.dense {
            (0..dense.len())
                .into_par_iter()
                .filter(|&i| dense[i])
                .map(NI::new)
                .collect::<Vec<_>>()
        } else {
            Vec::new()
        };
        debug_assert_eq!(sparse.len(), self.d_m);
        self.sparse = Some(sparse);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frontier_has_no_active_vertices() {
        let f: Frontier<usize> = Frontier::empty();
        assert_eq!(f.len(), 0);
        assert!(f.is_empty());
        assert!(!f.contains(0));
    }

    #[test]
    fn singleton_reports_its_one_vertex() {
        let f: Frontier<usize> = Frontier::singleton(3, 2);
        assert_eq!(f.len(), 1);
        assert_eq!(f.num_out_edges(), 2);
        assert!(f.contains(3));
        assert!(!f.contains(0));
    }

    #[test]
    fn all_active_shortcut_contains_everything() {
        let f: Frontier<usize> = Frontier::all(10, 20);
        assert!(f.is_all());
        assert_eq!(f.len(), 10);
        assert_eq!(f.num_out_edges(), 20);
        assert!(f.contains(9));
    }

    #[test]
    fn to_dense_then_to_sparse_is_idempotent_and_round_trips() {
        let mut f: Frontier<usize> = Frontier::empty();
        f.sparse = Some(vec![1, 3, 4]);
        f.d_m = 3;

        f.to_dense(6);
        assert!(f.is_dense());
        assert_eq!(f.dense_bits().unwrap().count_ones(), 3);

        // idempotent: a second call leaves the bitmap untouched.
        let before = f.dense_bits().unwrap().to_bitvec();
        f.to_dense(6);
        assert_eq!(f.dense_bits().unwrap().to_bitvec(), before);

        f.sparse = None;
        f.to_sparse();
        let mut roundtrip = f.sparse().unwrap().to_vec();
        roundtrip.sort_unstable();
        assert_eq!(roundtrip, vec![1, 3, 4]);
    }

    #[test]
    fn dense_constructor_is_all_zero() {
        let f: Frontier<usize> = Frontier::dense(8);
        assert!(f.is_dense());
        assert_eq!(f.dense_bits().unwrap().count_ones(), 0);
        assert_eq!(f.len(), 0);
    }
}
