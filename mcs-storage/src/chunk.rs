use std::ffi::CString;
use std::fs;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::os::unix::io::AsRawFd;

use mcs_types::{Access, Const, Mutable};

use crate::backends::ChunkDescription;
use crate::error::Error;

/// Either the chunk borrows straight into a heap backend's own allocation
/// (nothing to release — the segment, not the chunk, owns that memory), or
/// it owns an mmap plus the file handle that produced it, torn down
/// together on drop. Grounded on `fixed_index.rs`'s
/// `FixedIndexReader`/`FixedIndexWriter` mmap-and-unmap pattern.
enum Backing {
    Raw,
    Mmap {
        map_ptr: *mut std::ffi::c_void,
        len: usize,
        // kept open for the chunk's lifetime per §4.A: the file backend
        // does not keep per-segment handles, only per-chunk ones.
        _file: Option<fs::File>,
    },
}

/// A materialized view of `[sub_begin, sub_end)` of a segment. `bytes()`
/// is valid until the state is dropped; creation and destruction are
/// always paired (§4.C).
pub struct ChunkState<A: Access> {
    ptr: *mut u8,
    len: usize,
    backing: Backing,
    _marker: PhantomData<A>,
}

// The pointer is either into a heap allocation the kernel keeps alive for
// the storage's lifetime, or an mmap valid until `backing` is dropped;
// neither is thread-local.
unsafe impl<A: Access> Send for ChunkState<A> {}
unsafe impl<A: Access> Sync for ChunkState<A> {}

impl<A: Access> ChunkState<A> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl ChunkState<Mutable> {
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl<A: Access> Drop for ChunkState<A> {
    fn drop(&mut self) {
        if let Backing::Mmap { map_ptr, len, .. } = &self.backing {
            if let Err(err) = unsafe { nix::sys::mman::munmap(*map_ptr, *len) } {
                log::error!("chunk state: failed to unmap - {err}");
                std::process::abort();
            }
        }
    }
}

fn prot_flags<A: Access>() -> (nix::sys::mman::ProtFlags, nix::sys::mman::MapFlags) {
    use nix::sys::mman::{MapFlags, ProtFlags};
    match A::MODE {
        mcs_types::AccessMode::Const => (ProtFlags::PROT_READ, MapFlags::MAP_PRIVATE),
        mcs_types::AccessMode::Mutable => {
            (ProtFlags::PROT_READ | ProtFlags::PROT_WRITE, MapFlags::MAP_SHARED)
        }
    }
}

/// Materializes a chunk description into an addressable span (§4.C).
pub fn materialize<A: Access>(description: &ChunkDescription) -> Result<ChunkState<A>, Error> {
    match description {
        ChunkDescription::Heap {
            address,
            sub_begin,
            sub_end,
            ..
        } => {
            let base = *address as *mut u8;
            let ptr = unsafe { base.add(*sub_begin as usize) };
            Ok(ChunkState {
                ptr,
                len: (*sub_end - *sub_begin) as usize,
                backing: Backing::Raw,
                _marker: PhantomData,
            })
        }
        ChunkDescription::Shmem {
            prefix,
            segment_id,
            size,
            sub_begin,
            sub_end,
        } => {
            let name = format!("/{prefix}-{}", segment_id.as_u64());
            let cname = CString::new(name).expect("segment name has no NUL bytes");
            let (prot, flags) = prot_flags::<A>();
            let oflag = match A::MODE {
                mcs_types::AccessMode::Const => libc::O_RDONLY,
                mcs_types::AccessMode::Mutable => libc::O_RDWR,
            };
            let fd = unsafe { libc::shm_open(cname.as_ptr(), oflag, 0) };
            if fd < 0 {
                return Err(Error::Io(std::io::Error::last_os_error()));
            }
            let map_len = NonZeroUsize::new(*size as usize)
                .ok_or_else(|| Error::Common(mcs_types::CommonError::OutOfRange))?;
            let map_ptr = unsafe {
                nix::sys::mman::mmap(None, map_len, prot, flags, fd, 0)
            };
            unsafe {
                libc::close(fd);
            }
            let map_ptr = map_ptr?;
            let ptr = unsafe { (map_ptr as *mut u8).add(*sub_begin as usize) };
            Ok(ChunkState {
                ptr,
                len: (*sub_end - *sub_begin) as usize,
                backing: Backing::Mmap {
                    map_ptr,
                    len: *size as usize,
                    _file: None,
                },
                _marker: PhantomData,
            })
        }
        ChunkDescription::File {
            path,
            size,
            sub_begin,
            sub_end,
        } => {
            let (prot, flags) = prot_flags::<A>();
            let file = match A::MODE {
                mcs_types::AccessMode::Const => fs::OpenOptions::new().read(true).open(path)?,
                mcs_types::AccessMode::Mutable => {
                    fs::OpenOptions::new().read(true).write(true).open(path)?
                }
            };
            let map_len = NonZeroUsize::new(*size as usize)
                .ok_or_else(|| Error::Common(mcs_types::CommonError::OutOfRange))?;
            let map_ptr = unsafe {
                nix::sys::mman::mmap(None, map_len, prot, flags, file.as_raw_fd(), 0)
            }?;
            let ptr = unsafe { (map_ptr as *mut u8).add(*sub_begin as usize) };
            Ok(ChunkState {
                ptr,
                len: (*sub_end - *sub_begin) as usize,
                backing: Backing::Mmap {
                    map_ptr,
                    len: *size as usize,
                    _file: Some(file),
                },
                _marker: PhantomData,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{HeapBackend, HeapCreateParams, HeapSegmentCreateParams};
    use mcs_types::{MaxSize, Offset, Range, Size};

    /// Seed scenario (e).
    #[test]
    fn heap_chunk_round_trip() {
        let mut backend = HeapBackend::construct(HeapCreateParams {
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
        let count = 8usize;
        let segment_size = count * std::mem::size_of::<i32>();
        let segment_id = backend
            .segment_create(Size::new(segment_size as u64), HeapSegmentCreateParams::default())
            .unwrap();

        let whole = Range::new(Offset::new(0), Offset::new(segment_size as u64)).unwrap();
        let description = backend.chunk_description(segment_id, whole).unwrap();

        {
            let mut state = materialize::<Mutable>(&description).unwrap();
            let bytes = state.bytes_mut();
            for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
                chunk.copy_from_slice(&(i as i32).to_ne_bytes());
            }
        }

        let state = materialize::<Const>(&description).unwrap();
        let bytes = state.bytes();
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            let value = i32::from_ne_bytes(chunk.try_into().unwrap());
            assert_eq!(value, i as i32);
        }
    }
}
