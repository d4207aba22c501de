use std::{convert::TryFrom, fs::File, marker::PhantomData, mem::size_of, path::Path};

use log::info;

use crate::{index::Idx, Error};

use super::{edgelist::EdgeList, InputCapabilities, InputPath};

/// Reads a graph from the Galois-derived binary format used by GraphGrind.
///
/// The format is a 4-word header `[version, weight_size, n, m]` followed by
/// `n` 64-bit end-offsets (the first start offset is implicitly zero, the
/// last entry equals `m`), `m` 32-bit destination ids padded to an even
/// count, and `m` edge weights of the declared width (`1` byte for an
/// unweighted graph, `4` bytes for a 32-bit weight).
pub struct GaloisBinaryInput<NI: Idx, EV = ()> {
    _idx: PhantomData<(NI, EV)>,
}

impl<NI: Idx, EV> Default for GaloisBinaryInput<NI, EV> {
    fn default() -> Self {
        Self { _idx: PhantomData }
    }
}

impl<NI: Idx, EV> InputCapabilities<NI> for GaloisBinaryInput<NI, EV> {
    type GraphInput = EdgeList<NI, EV>;
}

const HEADER_WORDS: usize = 4;
const HEADER_BYTES: usize = HEADER_WORDS * size_of::<u64>();

/// A value that can be read off the declared Galois weight width.
pub trait GaloisWeight: Sized {
    /// Number of bytes the format reserves per weight (`1` or `4`).
    const WIDTH: u64;

    fn from_bytes(bytes: &[u8]) -> Self;
}

impl GaloisWeight for () {
    const WIDTH: u64 = 1;

    fn from_bytes(_bytes: &[u8]) -> Self {}
}

impl GaloisWeight for u32 {
    const WIDTH: u64 = 4;

    fn from_bytes(bytes: &[u8]) -> Self {
        u32::from_ne_bytes(bytes.try_into().unwrap())
    }
}

impl GaloisWeight for i32 {
    const WIDTH: u64 = 4;

    fn from_bytes(bytes: &[u8]) -> Self {
        i32::from_ne_bytes(bytes.try_into().unwrap())
    }
}

impl GaloisWeight for f32 {
    const WIDTH: u64 = 4;

    fn from_bytes(bytes: &[u8]) -> Self {
        f32::from_ne_bytes(bytes.try_into().unwrap())
    }
}

impl<NI, P, EV> TryFrom<InputPath<P>> for EdgeList<NI, EV>
where
    P: AsRef<Path>,
    NI: Idx,
    EV: GaloisWeight + Copy + Send + Sync,
{
    type Error = Error;

    fn try_from(path: InputPath<P>) -> Result<Self, Self::Error> {
        let file = File::open(path.0.as_ref())?;
        let mmap = unsafe { memmap2::MmapOptions::new().populate().map(&file)? };
        read_galois_binary::<NI, EV>(mmap.as_ref())
    }
}

fn read_galois_binary<NI, EV>(bytes: &[u8]) -> Result<EdgeList<NI, EV>, Error>
where
    NI: Idx,
    EV: GaloisWeight + Copy + Send + Sync,
{
    let start = std::time::Instant::now();

    if bytes.len() < HEADER_BYTES {
        return Err(Error::InvalidIdType {
            expected: "at least a 4-word header".to_string(),
            actual: format!("{} bytes", bytes.len()),
        });
    }

    let words = |i: usize| -> u64 {
        let from = i * size_of::<u64>();
        u64::from_ne_bytes(bytes[from..from + size_of::<u64>()].try_into().unwrap())
    };

    let version = words(0);
    let weight_size = words(1);
    let n = words(2) as usize;
    let m = words(3) as usize;

    if version != 1 {
        return Err(Error::InvalidIdType {
            expected: "version 1".to_string(),
            actual: format!("version {version}"),
        });
    }

    if weight_size != EV::WIDTH {
        return Err(Error::InvalidIdType {
            expected: format!("{} byte weights", EV::WIDTH),
            actual: format!("{weight_size} byte weights"),
        });
    }

    let mut offset = HEADER_BYTES;

    // n 64-bit end-offsets; offsets[i] is the end index of vertex i's
    // out-neighbor run, offsets[n - 1] == m.
    let offsets_bytes = n * size_of::<u64>();
    let offsets = &bytes[offset..offset + offsets_bytes];
    offset += offsets_bytes;

    let targets_count = m + (m & 1);
    let targets_bytes = targets_count * size_of::<u32>();
    let targets = &bytes[offset..offset + targets_bytes];
    offset += targets_bytes;

    let weights_bytes = m * EV::WIDTH as usize;
    let weights = &bytes[offset..offset + weights_bytes];

    let mut edges = Vec::with_capacity(m);
    let mut prev = 0u64;
    for v in 0..n {
        let from = v * size_of::<u64>();
        let end = u64::from_ne_bytes(offsets[from..from + size_of::<u64>()].try_into().unwrap());
        for e in prev..end {
            let e = e as usize;
            let t_from = e * size_of::<u32>();
            let dst =
                u32::from_ne_bytes(targets[t_from..t_from + size_of::<u32>()].try_into().unwrap());
            let w_from = e * EV::WIDTH as usize;
            let w = EV::from_bytes(&weights[w_from..w_from + EV::WIDTH as usize]);
            edges.push((NI::new(v), NI::new(dst as usize), w));
        }
        prev = end;
    }

    let elapsed = start.elapsed();
    info!(
        "Read {} edges over {} nodes from Galois binary in {:?}",
        edges.len(),
        n,
        elapsed
    );

    Ok(EdgeList::new(edges))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::input::{Edges, InputPath};

    use super::*;

    fn resource(name: &str) -> PathBuf {
        [env!("CARGO_MANIFEST_DIR"), "resources", name]
            .iter()
            .collect()
    }

    #[test]
    fn reads_unweighted_galois_binary() {
        let edge_list =
            EdgeList::<usize, ()>::try_from(InputPath(resource("test.gbin").as_path())).unwrap();
        assert_eq!(edge_list.len(), 6);
        assert_eq!(edge_list.max_node_id(), 4);
    }

    #[test]
    fn reads_weighted_galois_binary() {
        let edge_list =
            EdgeList::<usize, i32>::try_from(InputPath(resource("test.wgbin").as_path()))
                .unwrap();
        assert_eq!(edge_list.len(), 6);
    }

    #[test]
    fn rejects_mismatched_weight_width() {
        let result = EdgeList::<usize, i32>::try_from(InputPath(resource("test.gbin").as_path()));
        assert!(matches!(result, Err(Error::InvalidIdType { .. })));
    }
}
