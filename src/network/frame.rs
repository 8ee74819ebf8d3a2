//! Owned frames queued for transmission and their header layout

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::media::{AccessUnit, BufferFlags};

/// What a queued frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameKind {
    /// Connect request with app, stream name and credentials
    Connect = 0,
    /// Stream metadata (audio and video parameters)
    Metadata = 1,
    /// SPS and PPS
    ParameterSets = 2,
    Audio = 3,
    Video = 4,
}

impl FrameKind {
    /// Media frames count toward sent/dropped statistics
    pub fn is_media(self) -> bool {
        matches!(self, FrameKind::Audio | FrameKind::Video)
    }
}

/// A frame owned by the network layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    pub kind: FrameKind,
    pub presentation_time_us: i64,
    pub flags: BufferFlags,
    pub payload: Bytes,
}

impl MediaFrame {
    /// Copy a borrowed access unit
    pub fn from_access_unit(unit: &AccessUnit<'_>) -> Self {
        let size = unit.info.size.min(unit.payload.len());
        Self {
            kind: if unit.is_audio { FrameKind::Audio } else { FrameKind::Video },
            presentation_time_us: unit.info.presentation_time_us,
            flags: unit.info.flags,
            payload: Bytes::copy_from_slice(&unit.payload[..size]),
        }
    }

    pub fn control(kind: FrameKind, payload: Bytes) -> Self {
        Self {
            kind,
            presentation_time_us: 0,
            flags: BufferFlags::CODEC_CONFIG,
            payload,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == FrameKind::Audio
    }

    /// Header followed by payload
    pub fn encode(&self) -> Result<Bytes, NetworkError> {
        let header = FrameHeader {
            kind: self.kind,
            flags: self.flags.bits() as u8,
            presentation_time_us: self.presentation_time_us,
            length: self.payload.len() as u32,
        };
        let header = bincode::serialize(&header)?;

        let mut out = BytesMut::with_capacity(header.len() + self.payload.len());
        out.put_slice(&header);
        out.put_slice(&self.payload);
        Ok(out.freeze())
    }
}

/// Fixed-size header preceding each payload on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub kind: FrameKind,
    pub flags: u8,
    pub presentation_time_us: i64,
    pub length: u32,
}

impl FrameHeader {
    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Parameters announced before any media
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub is_stereo: bool,
    pub sample_rate: u32,
    pub width: u32,
    pub height: u32,
    pub profile_iop: u8,
}

/// Body of a [`FrameKind::Connect`] frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub app: String,
    pub stream_name: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::BufferInfo;

    #[test]
    fn test_from_access_unit_copies_valid_bytes() {
        let data = [9u8; 10];
        let unit = AccessUnit {
            payload: &data,
            info: BufferInfo::new(4, 1234, BufferFlags::KEY_FRAME),
            is_audio: false,
        };
        let frame = MediaFrame::from_access_unit(&unit);
        assert_eq!(frame.kind, FrameKind::Video);
        assert_eq!(frame.payload.len(), 4);
        assert_eq!(frame.presentation_time_us, 1234);
        assert!(frame.flags.is_key_frame());
    }

    #[test]
    fn test_encoded_header_prefix() {
        let frame = MediaFrame {
            kind: FrameKind::Audio,
            presentation_time_us: -5,
            flags: BufferFlags::NONE,
            payload: Bytes::from_static(&[1, 2, 3]),
        };
        let encoded = frame.encode().unwrap();
        let header_len = encoded.len() - 3;

        let header = FrameHeader::decode(&encoded[..header_len]).unwrap();
        assert_eq!(header.kind, FrameKind::Audio);
        assert_eq!(header.length, 3);
        assert_eq!(header.presentation_time_us, -5);
        assert_eq!(&encoded[header_len..], &[1, 2, 3]);
    }

    #[test]
    fn test_media_kinds() {
        assert!(FrameKind::Audio.is_media());
        assert!(FrameKind::Video.is_media());
        assert!(!FrameKind::Metadata.is_media());
        assert!(!FrameKind::ParameterSets.is_media());
    }
}
