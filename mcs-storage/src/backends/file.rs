use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mcs_types::{CommonError, MaxSize, Offset, Range, SegmentId, Size};

use crate::error::Error;

use super::ChunkDescription;

/// Whether `segment_remove` unlinks the backing file or leaves it for a
/// future recovery pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnRemove {
    Keep,
    Remove,
}

/// `construct` parameters for the file-backed backend: a directory prefix
/// holding one file per segment, named by decimal segment-id.
#[derive(Clone, Debug)]
pub struct FileCreateParams {
    pub prefix: PathBuf,
    pub max_size: MaxSize,
}

/// `segment_remove` parameters: `force_removal` overrides a segment's
/// `Keep` policy to `Remove`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSegmentRemoveParams {
    pub force_removal: bool,
}

struct FileSegment {
    size: u64,
    on_remove: OnRemove,
}

fn segment_path(prefix: &Path, segment_id: SegmentId) -> PathBuf {
    prefix.join(segment_id.as_u64().to_string())
}

/// A directory prefix; segments are regular files named by decimal
/// segment-id. On construction the directory is scanned: well-named files
/// become recovered segments (always with `on_remove = Keep`, since the
/// backend has no record of the policy the previous process chose), and
/// any file whose name does not parse as a segment-id is a hard failure
/// (§4.A "must tolerate... recovery").
pub struct FileBackend {
    prefix: PathBuf,
    max_size: MaxSize,
    used: Size,
    next_segment_id: SegmentId,
    segments: BTreeMap<SegmentId, FileSegment>,
}

fn reject_network_filesystem(prefix: &Path) -> Result<(), Error> {
    let stat = nix::sys::statfs::statfs(prefix)?;
    if stat.filesystem_type() == nix::sys::statfs::NFS_SUPER_MAGIC {
        return Err(Error::UnsupportedMount {
            path: prefix.to_path_buf(),
            reason: "network filesystem (NFS) prefixes are not supported".to_string(),
        });
    }
    Ok(())
}

impl FileBackend {
    pub fn construct(params: FileCreateParams) -> Result<Self, Error> {
        if !params.prefix.is_dir() {
            return Err(Error::PrefixDoesNotExist(params.prefix));
        }
        reject_network_filesystem(&params.prefix)?;

        let mut segments = BTreeMap::new();
        let mut used = Size::ZERO;
        let mut max_segment_id = None;

        for entry in fs::read_dir(&params.prefix)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let parsed: Option<u64> = name.parse().ok();
            let Some(raw_id) = parsed else {
                return Err(Error::PrefixContainsNonSegmentFile {
                    path: params.prefix.clone(),
                    entry: path,
                });
            };
            let segment_id = SegmentId::new(raw_id);
            let size = entry.metadata()?.len();
            used = used + Size::new(size);
            max_segment_id = Some(match max_segment_id {
                None => segment_id,
                Some(current) if segment_id > current => segment_id,
                Some(current) => current,
            });
            segments.insert(
                segment_id,
                FileSegment {
                    size,
                    on_remove: OnRemove::Keep,
                },
            );
        }

        let next_segment_id = match max_segment_id {
            Some(id) => id.next(),
            None => SegmentId::new(0),
        };

        Ok(FileBackend {
            prefix: params.prefix,
            max_size: params.max_size,
            used,
            next_segment_id,
            segments,
        })
    }

    pub fn size_max(&self) -> MaxSize {
        self.max_size
    }

    pub fn size_used(&self) -> Size {
        self.used
    }

    pub fn segment_create(&mut self, size: Size, on_remove: OnRemove) -> Result<SegmentId, Error> {
        if !self.max_size.accommodates(self.used, size) {
            return Err(CommonError::BadAlloc {
                requested: size,
                used: self.used,
                max: self.max_size.limit(),
            }
            .into());
        }

        let id = self.next_segment_id;
        let path = segment_path(&self.prefix, id);
        let file = fs::File::create(&path)?;
        file.set_len(size.as_u64())?;

        self.next_segment_id = id.next();
        self.used = self.used + size;
        self.segments.insert(
            id,
            FileSegment {
                size: size.as_u64(),
                on_remove,
            },
        );
        Ok(id)
    }

    pub fn segment_remove(
        &mut self,
        segment_id: SegmentId,
        params: FileSegmentRemoveParams,
    ) -> Result<Size, Error> {
        let segment = self
            .segments
            .get(&segment_id)
            .ok_or(Error::UnknownSegmentId(segment_id))?;
        let remove = params.force_removal || segment.on_remove == OnRemove::Remove;
        let freed = if remove {
            fs::remove_file(segment_path(&self.prefix, segment_id))?;
            Size::new(segment.size)
        } else {
            Size::ZERO
        };
        self.segments.remove(&segment_id);
        // `used` tracks accounted capacity, not bytes on disk: a kept file
        // still occupies its slot in the budget even though nothing was
        // freed on this call (§4.A `on_remove = Keep`).
        if remove {
            self.used = self.used - freed;
        }
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
        Ok(ChunkDescription::File {
            path: segment_path(&self.prefix, segment_id),
            size: segment.size,
            sub_begin: range.begin().as_u64(),
            sub_end: range.end().as_u64(),
        })
    }

    fn validate_copy(&self, segment_id: SegmentId, offset: Offset, range: Range) -> Result<&FileSegment, Error> {
        let segment = self
            .segments
            .get(&segment_id)
            .ok_or(Error::UnknownSegmentId(segment_id))?;
        let end = offset.as_u64() + range.size().as_u64();
        if end > segment.size {
            return Err(CommonError::OutOfRange.into());
        }
        Ok(segment)
    }

    /// Populates `[offset, offset+size(range))` of the segment's backing
    /// file from `path`.
    pub fn file_read(
        &mut self,
        segment_id: SegmentId,
        offset: Offset,
        path: &Path,
        range: Range,
    ) -> Result<u64, Error> {
        self.validate_copy(segment_id, offset, range)?;
        let bytes = fs::read(path)?;
        let len = (range.size().as_u64() as usize).min(bytes.len());

        use std::io::Write;
        use std::os::unix::fs::FileExt;
        let segment_file = fs::OpenOptions::new()
            .write(true)
            .open(segment_path(&self.prefix, segment_id))?;
        segment_file.write_at(&bytes[..len], offset.as_u64())?;
        let _ = Write::flush(&mut &segment_file);
        Ok(len as u64)
    }

    /// Dumps `[offset, offset+size(range))` of the segment's backing file
    /// to `path`.
    pub fn file_write(
        &self,
        segment_id: SegmentId,
        offset: Offset,
        path: &Path,
        range: Range,
    ) -> Result<u64, Error> {
        self.validate_copy(segment_id, offset, range)?;
        use std::os::unix::fs::FileExt;
        let len = range.size().as_u64() as usize;
        let mut buf = vec![0u8; len];
        let segment_file = fs::File::open(segment_path(&self.prefix, segment_id))?;
        segment_file.read_exact_at(&mut buf, offset.as_u64())?;
        fs::write(path, &buf)?;
        Ok(len as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_well_named_segments_and_rejects_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0"), vec![0u8; 16]).unwrap();
        fs::write(dir.path().join("3"), vec![0u8; 8]).unwrap();

        let backend = FileBackend::construct(FileCreateParams {
            prefix: dir.path().to_path_buf(),
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
        assert_eq!(backend.size_used(), Size::new(24));
        assert_eq!(backend.next_segment_id, SegmentId::new(4));
    }

    #[test]
    fn rejects_non_segment_filenames_on_recovery() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("not-a-segment"), b"x").unwrap();
        let err = FileBackend::construct(FileCreateParams {
            prefix: dir.path().to_path_buf(),
            max_size: MaxSize::Unlimited,
        })
        .unwrap_err();
        assert!(matches!(err, Error::PrefixContainsNonSegmentFile { .. }));
    }

    /// Seed scenario (f).
    #[test]
    fn keep_then_force_removal() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::construct(FileCreateParams {
            prefix: dir.path().to_path_buf(),
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
        let id = backend.segment_create(Size::new(16), OnRemove::Keep).unwrap();

        let freed = backend
            .segment_remove(id, FileSegmentRemoveParams::default())
            .unwrap();
        assert_eq!(freed, Size::ZERO);
        assert!(segment_path(dir.path(), id).exists());

        let mut backend = FileBackend::construct(FileCreateParams {
            prefix: dir.path().to_path_buf(),
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
        assert_eq!(backend.size_used(), Size::new(16));

        let freed = backend
            .segment_remove(id, FileSegmentRemoveParams { force_removal: true })
            .unwrap();
        assert_eq!(freed, Size::new(16));
        assert!(!segment_path(dir.path(), id).exists());
    }
}
