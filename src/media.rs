//! Types shared by the decode and stream sides

use std::fmt;
use std::ops::BitOr;

/// Flags attached to a compressed or decoded buffer
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const NONE: BufferFlags = BufferFlags(0);
    /// Buffer holds a sync frame
    pub const KEY_FRAME: BufferFlags = BufferFlags(1);
    /// Buffer holds codec configuration rather than media
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(1 << 1);
    /// Last buffer of the stream
    pub const END_OF_STREAM: BufferFlags = BufferFlags(1 << 2);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        BufferFlags(bits & 0b111)
    }

    pub fn contains(self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_key_frame(self) -> bool {
        self.contains(Self::KEY_FRAME)
    }

    pub fn is_end_of_stream(self) -> bool {
        self.contains(Self::END_OF_STREAM)
    }
}

impl BitOr for BufferFlags {
    type Output = BufferFlags;

    fn bitor(self, rhs: BufferFlags) -> BufferFlags {
        BufferFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for BufferFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.is_key_frame() {
            names.push("KEY_FRAME");
        }
        if self.contains(Self::CODEC_CONFIG) {
            names.push("CODEC_CONFIG");
        }
        if self.is_end_of_stream() {
            names.push("END_OF_STREAM");
        }
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Metadata of a buffer crossing a codec boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferInfo {
    /// Valid bytes in the buffer
    pub size: usize,
    /// Presentation timestamp in microseconds
    pub presentation_time_us: i64,
    pub flags: BufferFlags,
}

impl BufferInfo {
    pub fn new(size: usize, presentation_time_us: i64, flags: BufferFlags) -> Self {
        Self {
            size,
            presentation_time_us,
            flags,
        }
    }
}

/// One encoded frame handed over by an encoder callback.
///
/// The payload is borrowed for the duration of the dispatch call only.
#[derive(Debug, Clone, Copy)]
pub struct AccessUnit<'a> {
    pub payload: &'a [u8],
    pub info: BufferInfo,
    pub is_audio: bool,
}

impl<'a> AccessUnit<'a> {
    pub fn audio(payload: &'a [u8], presentation_time_us: i64) -> Self {
        Self {
            payload,
            info: BufferInfo::new(payload.len(), presentation_time_us, BufferFlags::NONE),
            is_audio: true,
        }
    }

    pub fn video(payload: &'a [u8], presentation_time_us: i64, flags: BufferFlags) -> Self {
        Self {
            payload,
            info: BufferInfo::new(payload.len(), presentation_time_us, flags),
            is_audio: false,
        }
    }

    pub fn is_key_frame(&self) -> bool {
        self.info.flags.is_key_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = BufferFlags::KEY_FRAME | BufferFlags::END_OF_STREAM;
        assert!(flags.is_key_frame());
        assert!(flags.is_end_of_stream());
        assert!(!flags.contains(BufferFlags::CODEC_CONFIG));
        assert_eq!(format!("{:?}", flags), "KEY_FRAME|END_OF_STREAM");
        assert_eq!(format!("{:?}", BufferFlags::NONE), "NONE");
        assert_eq!(BufferFlags::from_bits(0xFF), BufferFlags::from_bits(0b111));
    }

    #[test]
    fn test_access_unit_constructors() {
        let data = [1u8, 2, 3];
        let unit = AccessUnit::video(&data, 40_000, BufferFlags::KEY_FRAME);
        assert!(!unit.is_audio);
        assert!(unit.is_key_frame());
        assert_eq!(unit.info.size, 3);

        let unit = AccessUnit::audio(&data, 0);
        assert!(unit.is_audio);
        assert!(!unit.is_key_frame());
    }
}
