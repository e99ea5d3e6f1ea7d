use std::collections::BTreeMap;

use mcs_types::{CommonError, MaxSize, Offset, Range, SegmentId, Size};

use crate::error::Error;

use super::ChunkDescription;

/// `construct` parameters for the heap backend: a per-storage allocation
/// budget.
#[derive(Clone, Copy, Debug)]
pub struct HeapCreateParams {
    pub max_size: MaxSize,
}

/// `segment_create` parameters specific to the heap backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapSegmentCreateParams {
    /// Pin the allocation in physical memory for the segment's lifetime.
    pub mlock: bool,
}

struct HeapSegment {
    data: Box<[u8]>,
    mlocked: bool,
}

/// Segments are contiguous host-memory allocations (§4.A). Chunk
/// description encodes the allocation's address as an integer plus a
/// sub-range; materialization (`chunk.rs`) casts that integer back to a
/// pointer.
pub struct HeapBackend {
    max_size: MaxSize,
    used: Size,
    next_segment_id: SegmentId,
    segments: BTreeMap<SegmentId, HeapSegment>,
}

impl HeapBackend {
    pub fn construct(params: HeapCreateParams) -> Result<Self, Error> {
        Ok(HeapBackend {
            max_size: params.max_size,
            used: Size::ZERO,
            next_segment_id: SegmentId::new(0),
            segments: BTreeMap::new(),
        })
    }

    pub fn size_max(&self) -> MaxSize {
        self.max_size
    }

    pub fn size_used(&self) -> Size {
        self.used
    }

    pub fn segment_create(
        &mut self,
        size: Size,
        params: HeapSegmentCreateParams,
    ) -> Result<SegmentId, Error> {
        if !self.max_size.accommodates(self.used, size) {
            return Err(CommonError::BadAlloc {
                requested: size,
                used: self.used,
                max: self.max_size.limit(),
            }
            .into());
        }

        let mut data = vec![0u8; size.as_u64() as usize].into_boxed_slice();
        if params.mlock && !data.is_empty() {
            let rc = unsafe { libc::mlock(data.as_mut_ptr() as *const libc::c_void, data.len()) };
            if rc != 0 {
                return Err(Error::Io(std::io::Error::last_os_error()));
            }
        }

        let id = self.next_segment_id;
        self.next_segment_id = id.next();
        self.used = self.used + size;
        self.segments.insert(
            id,
            HeapSegment {
                data,
                mlocked: params.mlock,
            },
        );
        Ok(id)
    }

    pub fn segment_remove(&mut self, segment_id: SegmentId) -> Result<Size, Error> {
        let segment = self
            .segments
            .remove(&segment_id)
            .ok_or(Error::UnknownSegmentId(segment_id))?;
        let freed = Size::new(segment.data.len() as u64);
        if segment.mlocked && !segment.data.is_empty() {
            unsafe {
                libc::munlock(segment.data.as_ptr() as *const libc::c_void, segment.data.len());
            }
        }
        self.used = self.used - freed;
        Ok(freed)
    }

    pub fn chunk_description(
        &self,
        segment_id: SegmentId,
        range: Range,
    ) -> Result<ChunkDescription, Error> {
        let segment = self
            .segments
            .get(&segment_id)
            .ok_or(Error::UnknownSegmentId(segment_id))?;
        if range.end().as_u64() > segment.data.len() as u64 {
            return Err(CommonError::OutOfRange.into());
        }
        Ok(ChunkDescription::Heap {
            address: segment.data.as_ptr() as u64,
            size: segment.data.len() as u64,
            sub_begin: range.begin().as_u64(),
            sub_end: range.end().as_u64(),
        })
    }

    fn validate_copy(&self, segment_id: SegmentId, offset: Offset, range: Range) -> Result<&HeapSegment, Error> {
        let segment = self
            .segments
            .get(&segment_id)
            .ok_or(Error::UnknownSegmentId(segment_id))?;
        let end = offset.as_u64() + range.size().as_u64();
        if end > segment.data.len() as u64 {
            return Err(CommonError::OutOfRange.into());
        }
        Ok(segment)
    }

    /// Populates `[offset, offset+size(range))` of the segment from `path`.
    pub fn file_read(
        &mut self,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        let end = offset.as_u64() + range.size().as_u64();
        self.validate_copy(segment_id, offset, range)?;
        let bytes = std::fs::read(path)?;
        let len = range.size().as_u64() as usize;
        let segment = self.segments.get_mut(&segment_id).expect("validated above");
        let start = offset.as_u64() as usize;
        let copy_len = len.min(bytes.len());
        segment.data[start..start + copy_len].copy_from_slice(&bytes[..copy_len]);
        let _ = end;
        Ok(copy_len as u64)
    }

    /// Dumps `[offset, offset+size(range))` of the segment to `path`.
    pub fn file_write(
        &self,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        let segment = self.validate_copy(segment_id, offset, range)?;
        let start = offset.as_u64() as usize;
        let len = range.size().as_u64() as usize;
        std::fs::write(path, &segment.data[start..start + len])?;
        Ok(len as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_create_respects_limit() {
        let mut backend = HeapBackend::construct(HeapCreateParams {
            max_size: MaxSize::Limit(Size::new(16)),
        })
        .unwrap();
        backend
            .segment_create(Size::new(16), HeapSegmentCreateParams::default())
            .unwrap();
        let err = backend
            .segment_create(Size::new(1), HeapSegmentCreateParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::Common(CommonError::BadAlloc { .. })));
    }

    #[test]
    fn chunk_description_rejects_out_of_range() {
        let mut backend = HeapBackend::construct(HeapCreateParams {
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
        let id = backend
            .segment_create(Size::new(8), HeapSegmentCreateParams::default())
            .unwrap();
        let bad = Range::new(Offset::new(0), Offset::new(9)).unwrap();
        assert!(backend.chunk_description(id, bad).is_err());
    }
}
