use std::ops::Range;

use crate::{
    constants::{NODE_SIZE, STORAGE_ALIGNMENT, WORKGROUP_SIZE},
    error::{SwarmError, SwarmResult},
};

/// One contiguous run of node records, held in its own set of device buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: u32,
    /// Global index of the first record held by this chunk.
    pub record_offset: u64,
    pub record_count: u32,
}

impl ChunkDescriptor {
    pub fn records(&self) -> Range<u64> {
        self.record_offset..(self.record_offset + self.record_count as u64)
    }

    /// Byte size of the node-state buffer.
    pub fn state_bytes(&self) -> u64 {
        aligned_size(self.record_count as u64 * NODE_SIZE)
    }

    /// Byte size of the visible-index buffer, one `u32` per record.
    pub fn index_bytes(&self) -> u64 {
        aligned_size(self.record_count as u64 * std::mem::size_of::<u32>() as u64)
    }
}

/// Rounds a byte size up to the storage buffer alignment.
pub fn aligned_size(bytes: u64) -> u64 {
    bytes.div_ceil(STORAGE_ALIGNMENT) * STORAGE_ALIGNMENT
}

/// The ordered chunks covering a node population.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    total_nodes: u64,
    capacity: u32,
    chunks: Vec<ChunkDescriptor>,
}

impl ChunkPlan {
    /// Splits `total_nodes` records into chunks of at most `capacity` records.
    ///
    /// Chunk `i` holds records `[i * capacity, min((i + 1) * capacity, total_nodes))`,
    /// so only the last chunk can be partially filled.
    ///
    /// Panics if `capacity` is zero or the plan would need more than
    /// `u32::MAX` chunks; [`ChunkPlan::bounded`] reports the latter instead.
    pub fn new(total_nodes: u64, capacity: u32) -> Self {
        assert!(capacity > 0, "chunk capacity must be positive");

        let cap = capacity as u64;
        let num_chunks = total_nodes.div_ceil(cap);
        assert!(
            num_chunks <= u32::MAX as u64,
            "{num_chunks} chunks overflow the chunk index"
        );
        let chunks = (0..num_chunks)
            .map(|idx| {
                let record_offset = idx * cap;
                ChunkDescriptor {
                    index: idx as u32,
                    record_offset,
                    record_count: (total_nodes - record_offset).min(cap) as u32,
                }
            })
            .collect();

        Self {
            total_nodes,
            capacity,
            chunks,
        }
    }

    /// Like [`ChunkPlan::new`], but refuses populations that need more than
    /// `max_chunks` chunks before any descriptor is built.
    pub fn bounded(total_nodes: u64, capacity: u32, max_chunks: u32) -> SwarmResult<Self> {
        if capacity == 0 {
            return Err(SwarmError::Config("chunk capacity must be positive".into()));
        }

        let num_chunks = total_nodes.div_ceil(capacity as u64);
        if num_chunks > max_chunks as u64 {
            return Err(SwarmError::AllocationExceeded {
                buffer: "node state".into(),
                bytes: total_nodes.checked_mul(NODE_SIZE).unwrap_or(u64::MAX),
                reason: format!(
                    "{total_nodes} nodes need {num_chunks} chunks, at most {max_chunks} are allowed"
                ),
            });
        }
        Ok(Self::new(total_nodes, capacity))
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Workgroups dispatched per chunk. The width follows the capacity, not the
    /// occupancy, so every chunk is dispatched the same way.
    pub fn workgroups_per_chunk(&self) -> u32 {
        self.capacity.div_ceil(WORKGROUP_SIZE)
    }

    /// Bytes of per-chunk storage the plan will allocate, uniforms excluded.
    pub fn chunk_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .map(|c| c.state_bytes() + c.index_bytes())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_CHUNK_CAPACITY, MAX_CHUNKS};

    fn counts(plan: &ChunkPlan) -> Vec<u32> {
        plan.chunks().iter().map(|c| c.record_count).collect()
    }

    #[test]
    fn zero_nodes_zero_chunks() {
        let plan = ChunkPlan::new(0, DEFAULT_CHUNK_CAPACITY);
        assert!(plan.is_empty());
        assert_eq!(plan.chunk_bytes(), 0);
    }

    #[test]
    fn exact_single_chunk() {
        let plan = ChunkPlan::new(500_000, 500_000);
        assert_eq!(counts(&plan), vec![500_000]);
    }

    #[test]
    fn exact_multiple() {
        let plan = ChunkPlan::new(2_000_000, 500_000);
        assert_eq!(counts(&plan), vec![500_000; 4]);
    }

    #[test]
    fn partial_last_chunk() {
        let plan = ChunkPlan::new(1_200_001, 500_000);
        assert_eq!(counts(&plan), vec![500_000, 500_000, 200_001]);
        assert_eq!(plan.chunks()[2].record_offset, 1_000_000);
        assert_eq!(plan.chunks()[2].records(), 1_000_000..1_200_001);
    }

    #[test]
    fn partition_properties() {
        for capacity in [1u32, 3, 7, 64, 1000, 500_000] {
            for total in [0u64, 1, 2, 6, 7, 8, 999, 1000, 1001, 123_457, 1_500_000] {
                let plan = ChunkPlan::new(total, capacity);
                assert_eq!(plan.len() as u64, total.div_ceil(capacity as u64));
                assert_eq!(
                    plan.chunks()
                        .iter()
                        .map(|c| c.record_count as u64)
                        .sum::<u64>(),
                    total
                );

                let mut next = 0;
                for (idx, chunk) in plan.chunks().iter().enumerate() {
                    assert_eq!(chunk.index as usize, idx);
                    assert_eq!(chunk.record_offset, next);
                    assert!(chunk.record_count > 0);
                    assert!(chunk.record_count <= capacity);
                    if idx + 1 < plan.len() {
                        assert_eq!(chunk.record_count, capacity);
                    }
                    next += chunk.record_count as u64;
                }
            }
        }
    }

    #[test]
    fn buffer_sizes_are_aligned() {
        for count in [1u32, 5, 6, 7, 64, 255, 256, 1000, 200_001, 500_000] {
            let chunk = ChunkDescriptor {
                index: 0,
                record_offset: 0,
                record_count: count,
            };
            let state = chunk.state_bytes();
            assert_eq!(state % STORAGE_ALIGNMENT, 0);
            assert!(state >= count as u64 * NODE_SIZE);
            assert!(state - count as u64 * NODE_SIZE < STORAGE_ALIGNMENT);

            let index = chunk.index_bytes();
            assert_eq!(index % STORAGE_ALIGNMENT, 0);
            assert!(index >= count as u64 * 4);
        }
    }

    #[test]
    fn dispatch_width_follows_capacity() {
        assert_eq!(ChunkPlan::new(10, 500_000).workgroups_per_chunk(), 7813);
        assert_eq!(ChunkPlan::new(10, 64).workgroups_per_chunk(), 1);
        assert_eq!(ChunkPlan::new(10, 65).workgroups_per_chunk(), 2);
    }

    #[test]
    fn bounded_rejects_extreme_populations() {
        assert!(matches!(
            ChunkPlan::bounded(u64::MAX, 500_000, MAX_CHUNKS),
            Err(SwarmError::AllocationExceeded {
                bytes: u64::MAX,
                ..
            })
        ));
        assert!(matches!(
            ChunkPlan::bounded(u64::MAX, 1, u32::MAX),
            Err(SwarmError::AllocationExceeded { .. })
        ));
        assert!(matches!(
            ChunkPlan::bounded(10, 0, MAX_CHUNKS),
            Err(SwarmError::Config(_))
        ));

        let plan = ChunkPlan::bounded(120_000_000, 500_000, MAX_CHUNKS).unwrap();
        assert_eq!(plan.len(), 240);
        assert_eq!(ChunkPlan::bounded(4, 1, 4).unwrap().len(), 4);
        assert!(ChunkPlan::bounded(5, 1, 4).is_err());
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        ChunkPlan::new(10, 0);
    }
}
