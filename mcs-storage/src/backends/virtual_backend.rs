use mcs_types::{MaxSize, Range, SegmentId, Size};

use crate::error::Error;

use super::ChunkDescription;

/// Stand-in for the C-ABI plugin contract (§4.A "ABI note"): a real
/// implementation would dispatch every operation through a `ChunkChannel`
/// to a `dlopen`'d plugin. Wiring an actual plugin is transport/deployment
/// work and stays out of scope here; this variant exists so the kernel's
/// dispatch keeps a fourth arm ready for it.
pub struct VirtualBackend {
    channel: Box<dyn ChunkChannel>,
}

/// The byte-channel contract a C-ABI plugin would implement. A call
/// succeeds iff `error_channel` stays empty; `bad_alloc` is signalled by
/// writing exactly `(requested, used, max)` to `bad_alloc_channel` while
/// leaving `error_channel` empty (§6).
pub trait ChunkChannel: Send + Sync {
    fn construct(&self) -> Result<(), Error>;
    fn size_max(&self) -> Result<MaxSize, Error>;
    fn size_used(&self) -> Result<Size, Error>;
    fn segment_create(&self, size: Size) -> Result<SegmentId, Error>;
    fn segment_remove(&self, segment_id: SegmentId) -> Result<Size, Error>;
    fn chunk_description(&self, segment_id: SegmentId, range: Range) -> Result<ChunkDescription, Error>;
}

/// A [`ChunkChannel`] with no plugin attached; every call fails with
/// [`Error::VirtualUnavailable`].
pub struct NoPlugin;

impl ChunkChannel for NoPlugin {
    fn construct(&self) -> Result<(), Error> {
        Err(Error::VirtualUnavailable("construct"))
    }
    fn size_max(&self) -> Result<MaxSize, Error> {
        Err(Error::VirtualUnavailable("size_max"))
    }
    fn size_used(&self) -> Result<Size, Error> {
        Err(Error::VirtualUnavailable("size_used"))
    }
    fn segment_create(&self, _size: Size) -> Result<SegmentId, Error> {
        Err(Error::VirtualUnavailable("segment_create"))
    }
    fn segment_remove(&self, _segment_id: SegmentId) -> Result<Size, Error> {
        Err(Error::VirtualUnavailable("segment_remove"))
    }
    fn chunk_description(&self, _segment_id: SegmentId, _range: Range) -> Result<ChunkDescription, Error> {
        Err(Error::VirtualUnavailable("chunk_description"))
    }
}

impl VirtualBackend {
    pub fn construct() -> Result<Self, Error> {
        Ok(VirtualBackend {
            channel: Box::new(NoPlugin),
        })
    }

    pub fn with_channel(channel: Box<dyn ChunkChannel>) -> Self {
        VirtualBackend { channel }
    }

    pub fn size_max(&self) -> MaxSize {
        self.channel.size_max().unwrap_or(MaxSize::Limit(Size::ZERO))
    }

    pub fn size_used(&self) -> Size {
        self.channel.size_used().unwrap_or(Size::ZERO)
    }

    pub fn segment_create(&mut self, size: Size) -> Result<SegmentId, Error> {
        self.channel.segment_create(size)
    }

    pub fn segment_remove(&mut self, segment_id: SegmentId) -> Result<Size, Error> {
        self.channel.segment_remove(segment_id)
    }

    pub fn chunk_description(
        &self,
        segment_id: SegmentId,
        range: Range,
    ) -> Result<ChunkDescription, Error> {
        self.channel.chunk_description(segment_id, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_plugin_reports_unavailable() {
        let mut backend = VirtualBackend::construct().unwrap();
        let err = backend.segment_create(Size::new(1)).unwrap_err();
        assert!(matches!(err, Error::VirtualUnavailable("segment_create")));
    }
}
