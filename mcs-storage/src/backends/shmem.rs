use std::collections::BTreeMap;
use std::ffi::CString;
use std::os::unix::io::RawFd;

use mcs_types::{CommonError, MaxSize, Offset, Range, SegmentId, Size};

use crate::error::Error;

use super::ChunkDescription;

/// `construct` parameters for the shared-memory backend: the name prefix
/// used to derive each segment's POSIX shm object name.
#[derive(Clone, Debug)]
pub struct ShmemCreateParams {
    pub prefix: String,
    pub max_size: MaxSize,
}

struct ShmemSegment {
    size: u64,
}

fn object_name(prefix: &str, segment_id: SegmentId) -> String {
    format!("/{prefix}-{}", segment_id.as_u64())
}

/// Segments are named POSIX shared-memory objects (§4.A); the backend only
/// tracks bookkeeping (name, size) — mapping happens at chunk
/// materialization time, keyed off the description's `(prefix, segment_id)`.
pub struct ShmemBackend {
    prefix: String,
    max_size: MaxSize,
    used: Size,
    next_segment_id: SegmentId,
    segments: BTreeMap<SegmentId, ShmemSegment>,
}

impl ShmemBackend {
    pub fn construct(params: ShmemCreateParams) -> Result<Self, Error> {
        Ok(ShmemBackend {
            prefix: params.prefix,
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

    pub fn segment_create(&mut self, size: Size) -> Result<SegmentId, Error> {
        if !self.max_size.accommodates(self.used, size) {
            return Err(CommonError::BadAlloc {
                requested: size,
                used: self.used,
                max: self.max_size.limit(),
            }
            .into());
        }

        let id = self.next_segment_id;
        let name = object_name(&self.prefix, id);
        let cname = CString::new(name.clone()).expect("segment name has no NUL bytes");

        let fd: RawFd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        if fd < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        let rc = unsafe { libc::ftruncate(fd, size.as_u64() as libc::off_t) };
        unsafe {
            libc::close(fd);
        }
        if rc != 0 {
            unsafe {
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        self.next_segment_id = id.next();
        self.used = self.used + size;
        self.segments.insert(id, ShmemSegment { size: size.as_u64() });
        Ok(id)
    }

    pub fn segment_remove(&mut self, segment_id: SegmentId) -> Result<Size, Error> {
        let segment = self
            .segments
            .remove(&segment_id)
            .ok_or(Error::UnknownSegmentId(segment_id))?;
        let name = object_name(&self.prefix, segment_id);
        let cname = CString::new(name).expect("segment name has no NUL bytes");
        unsafe {
            libc::shm_unlink(cname.as_ptr());
        }
        let freed = Size::new(segment.size);
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
        if range.end().as_u64() > segment.size {
            return Err(CommonError::OutOfRange.into());
        }
        Ok(ChunkDescription::Shmem {
            prefix: self.prefix.clone(),
            segment_id,
            size: segment.size,
            sub_begin: range.begin().as_u64(),
            sub_end: range.end().as_u64(),
        })
    }

    fn open_for_copy(&self, segment_id: SegmentId, offset: Offset, range: Range) -> Result<(CString, u64), Error> {
        let segment = self
            .segments
            .get(&segment_id)
            .ok_or(Error::UnknownSegmentId(segment_id))?;
        let end = offset.as_u64() + range.size().as_u64();
        if end > segment.size {
            return Err(CommonError::OutOfRange.into());
        }
        let name = object_name(&self.prefix, segment_id);
        Ok((CString::new(name).expect("segment name has no NUL bytes"), segment.size))
    }

    /// Populates `[offset, offset+size(range))` of the segment from `path`.
    pub fn file_read(
        &mut self,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        let (cname, _) = self.open_for_copy(segment_id, offset, range)?;
        let bytes = std::fs::read(path)?;
        let len = (range.size().as_u64() as usize).min(bytes.len());

        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        let rc = unsafe {
            libc::pwrite(
                fd,
                bytes.as_ptr() as *const libc::c_void,
                len,
                offset.as_u64() as libc::off_t,
            )
        };
        unsafe {
            libc::close(fd);
        }
        if rc < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(rc as u64)
    }

    /// Dumps `[offset, offset+size(range))` of the segment to `path`.
    pub fn file_write(
        &self,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        let (cname, _) = self.open_for_copy(segment_id, offset, range)?;
        let len = range.size().as_u64() as usize;
        let mut buf = vec![0u8; len];

        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDONLY, 0) };
        if fd < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        let rc = unsafe {
            libc::pread(
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                len,
                offset.as_u64() as libc::off_t,
            )
        };
        unsafe {
            libc::close(fd);
        }
        if rc < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        let copied = rc as usize;
        std::fs::write(path, &buf[..copied])?;
        Ok(copied as u64)
    }
}
