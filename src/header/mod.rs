//! GSE base header and per-variant tail codec.
//!
//! # Wire layout
//!
//! The mandatory 2-byte base header is packed bit-for-bit, **not** left to
//! compiler bit-field layout: the two bytes form one 16-bit big-endian word,
//! numbered MSB-first as `S E LT(2) GSE_Length(12)`.
//!
//! ```text
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +-+-+-+-+-----------------------+
//! |S|E|LT |      GSE_Length       |
//! +-+-+-+-+-----------------------+
//! ```
//!
//! This follows ETSI TS 102 606's own header diagram (MSB-first), which is
//! also the only interpretation under which `GSE_Length` packs cleanly into
//! the low 12 bits of the big-endian word.

pub(crate) mod extension;

pub use extension::{ExtensionBuilder, ExtensionHeader};

use bytes::{BufMut, BytesMut};

use crate::error::Error;

/// Maximum total length of a single GSE packet, in bytes — the largest value
/// representable by the 12-bit `GSE_Length` field (`0xFFF`) plus the 2
/// mandatory header bytes.
pub const GSE_MAX_PACKET_LENGTH: usize = 4097;

/// Minimum total length of any GSE packet accepted by this crate.
pub const GSE_MIN_PACKET_LENGTH: usize = 3;

/// Length, in bytes, of the mandatory base header.
pub const BASE_HEADER_LEN: usize = 2;

/// Length, in bytes, of the CRC32 trailer appended to a PDU's last fragment.
pub const CRC_LEN: usize = 4;

const LT_MASK: u16 = 0b11;

/// Label-type field of a GSE header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum LabelType {
    /// `00` — a full 6-byte label follows.
    SixBytes,
    /// `01` — a 3-byte label follows.
    ThreeBytes,
    /// `10` — no label is present.
    None,
    /// `11` — no label on the wire; re-use the label already recorded for
    /// this FragID's context. Only valid on subsequent/last fragments.
    Reuse,
}

impl LabelType {
    /// Number of label bytes carried directly in this packet's header.
    #[must_use]
    pub const fn on_wire_len(self) -> usize {
        match self {
            Self::SixBytes => 6,
            Self::ThreeBytes => 3,
            Self::None | Self::Reuse => 0,
        }
    }

    const fn bits(self) -> u16 {
        match self {
            Self::SixBytes => 0b00,
            Self::ThreeBytes => 0b01,
            Self::None => 0b10,
            Self::Reuse => 0b11,
        }
    }

    const fn from_bits(bits: u16) -> Self {
        match bits & LT_MASK {
            0b00 => Self::SixBytes,
            0b01 => Self::ThreeBytes,
            0b10 => Self::None,
            _ => Self::Reuse,
        }
    }
}

/// A label value as carried by a complete, or first-fragment, GSE header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Label {
    /// 6-byte label.
    SixBytes([u8; 6]),
    /// 3-byte label.
    ThreeBytes([u8; 3]),
    /// No label.
    None,
}

impl Label {
    /// The [`LabelType`] this label would be encoded with.
    #[must_use]
    pub const fn label_type(self) -> LabelType {
        match self {
            Self::SixBytes(_) => LabelType::SixBytes,
            Self::ThreeBytes(_) => LabelType::ThreeBytes,
            Self::None => LabelType::None,
        }
    }

    /// Raw label bytes, empty for [`Label::None`].
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::SixBytes(b) => b,
            Self::ThreeBytes(b) => b,
            Self::None => &[],
        }
    }

    fn decode(label_type: LabelType, data: &[u8]) -> Result<Self, Error> {
        match label_type {
            LabelType::SixBytes => {
                let arr: [u8; 6] = data.try_into().map_err(|_| Error::InvalidLabel)?;
                // 01:00:5E:00:00:00/24 and FF:FF:FF:FF:FF:FF are reserved
                // multicast/broadcast patterns the GSE spec forbids as
                // destination labels.
                if arr == [0xFF; 6] || arr[0..3] == [0x01, 0x00, 0x5E] {
                    return Err(Error::InvalidLabel);
                }
                Ok(Self::SixBytes(arr))
            }
            LabelType::ThreeBytes => {
                let arr: [u8; 3] = data.try_into().map_err(|_| Error::InvalidLabel)?;
                Ok(Self::ThreeBytes(arr))
            }
            LabelType::None | LabelType::Reuse => Ok(Self::None),
        }
    }
}

/// Which of the four GSE payload variants a header describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PayloadType {
    /// `S=1, E=1`: a complete PDU in a single packet.
    Complete,
    /// `S=1, E=0`: the first fragment of a multi-packet PDU.
    First,
    /// `S=0, E=0`: a middle fragment.
    Subsequent,
    /// `S=0, E=1`: the last fragment, whose payload ends with a CRC32.
    Last,
}

impl PayloadType {
    const fn from_se(s: bool, e: bool) -> Self {
        match (s, e) {
            (true, true) => Self::Complete,
            (true, false) => Self::First,
            (false, false) => Self::Subsequent,
            (false, true) => Self::Last,
        }
    }

    const fn se(self) -> (bool, bool) {
        match self {
            Self::Complete => (true, true),
            Self::First => (true, false),
            Self::Subsequent => (false, false),
            Self::Last => (false, true),
        }
    }

    /// Length, in bytes, of this variant's tail (everything after the base
    /// header and before the payload), for the given label type.
    #[must_use]
    pub const fn tail_len(self, label_type: LabelType) -> usize {
        match self {
            Self::Complete => 2 + label_type.on_wire_len(),
            Self::First => 1 + 2 + 2 + label_type.on_wire_len(),
            Self::Subsequent | Self::Last => 1,
        }
    }
}

/// Total length, in bytes, of the base header plus a variant's tail, for
/// the given label type. `label_type` is ignored for [`PayloadType::Subsequent`]
/// and [`PayloadType::Last`], whose tail never carries a label.
#[must_use]
pub const fn header_len(payload_type: PayloadType, label_type: LabelType) -> usize {
    BASE_HEADER_LEN + payload_type.tail_len(label_type)
}

/// A fully decoded GSE header, excluding the payload and (for a last
/// fragment) the CRC trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PacketHeader {
    /// Complete PDU.
    Complete {
        /// EtherType, or extension-chain-head marker, of the payload.
        protocol_type: u16,
        /// Destination label.
        label: Label,
    },
    /// First fragment.
    First {
        /// FragID tying this to its reassembly context (always equal to the
        /// sending QoS index).
        frag_id: u8,
        /// Total length, in bytes, of label + protocol type + PDU.
        total_length: u16,
        /// EtherType, or extension-chain-head marker.
        protocol_type: u16,
        /// Destination label.
        label: Label,
    },
    /// Subsequent fragment.
    Subsequent {
        /// FragID.
        frag_id: u8,
    },
    /// Last fragment.
    Last {
        /// FragID.
        frag_id: u8,
    },
}

impl PacketHeader {
    /// This header's [`PayloadType`].
    #[must_use]
    pub const fn payload_type(&self) -> PayloadType {
        match self {
            Self::Complete { .. } => PayloadType::Complete,
            Self::First { .. } => PayloadType::First,
            Self::Subsequent { .. } => PayloadType::Subsequent,
            Self::Last { .. } => PayloadType::Last,
        }
    }

    /// The FragID this header carries, or `None` for a complete-PDU header
    /// (which has no FragID on the wire).
    #[must_use]
    pub const fn frag_id(&self) -> Option<u8> {
        match self {
            Self::Complete { .. } => None,
            Self::First { frag_id, .. } | Self::Subsequent { frag_id } | Self::Last { frag_id } => {
                Some(*frag_id)
            }
        }
    }

    /// Length, in bytes, of this header's tail (base header excluded).
    #[must_use]
    pub fn tail_len(&self) -> usize {
        let label_type = match self {
            Self::Complete { label, .. } | Self::First { label, .. } => label.label_type(),
            Self::Subsequent { .. } | Self::Last { .. } => LabelType::Reuse,
        };
        self.payload_type().tail_len(label_type)
    }

    /// Encodes the base header plus this header's tail (but not the
    /// payload) into `out`.
    ///
    /// `gse_length` is the packet's total length minus the 2 mandatory base
    /// header bytes.
    pub fn encode(&self, gse_length: u16, out: &mut BytesMut) {
        let (s, e) = self.payload_type().se();
        // A Subsequent/Last header carries no label on the wire at all, so
        // its LT bits are unused by any decoder (see `tail_len`, which
        // returns 1 for this payload type regardless of `label_type`). We
        // emit `00` rather than the `11` "reuse" pattern: ETSI TS 102 606's
        // own worked examples (ground truth also reproduced in this crate's
        // tests) show `0x40`/`0x41` as the first header byte of a
        // Subsequent/Last packet, i.e. LT bits `00`.
        let label_type = match self {
            Self::Complete { label, .. } | Self::First { label, .. } => label.label_type(),
            Self::Subsequent { .. } | Self::Last { .. } => LabelType::SixBytes,
        };
        let word = (u16::from(s) << 15)
            | (u16::from(e) << 14)
            | (label_type.bits() << 12)
            | (gse_length & 0x0FFF);
        out.put_u16(word);

        match self {
            Self::Complete {
                protocol_type,
                label,
            } => {
                out.put_u16(*protocol_type);
                out.put_slice(label.as_bytes());
            }
            Self::First {
                frag_id,
                total_length,
                protocol_type,
                label,
            } => {
                out.put_u8(*frag_id);
                out.put_u16(*total_length);
                out.put_u16(*protocol_type);
                out.put_slice(label.as_bytes());
            }
            Self::Subsequent { frag_id } | Self::Last { frag_id } => {
                out.put_u8(*frag_id);
            }
        }
    }

    /// Decodes a base header plus tail from the front of `data`.
    ///
    /// On success, returns the header, whether the packet is padding, and
    /// how many bytes of `data` were consumed.
    ///
    /// # Errors
    ///
    /// [`Error::PacketTooSmall`] if `data` is too short for even the base
    /// header plus declared tail; [`Error::InvalidGseLength`] if the
    /// `GSE_Length` field disagrees with `data.len()`; [`Error::InvalidLt`]
    /// is never returned since all 4 bit patterns of `LT` are valid, but
    /// [`Error::InvalidLabel`] is if a decoded label is a reserved pattern.
    pub fn decode(data: &[u8]) -> Result<DecodeResult, Error> {
        if data.len() < GSE_MIN_PACKET_LENGTH {
            return Err(Error::PacketTooSmall {
                len: data.len(),
                min: GSE_MIN_PACKET_LENGTH,
            });
        }
        let word = u16::from_be_bytes([data[0], data[1]]);
        if word == 0 {
            return Ok(DecodeResult::Padding);
        }

        let s = word & 0x8000 != 0;
        let e = word & 0x4000 != 0;
        let label_type = LabelType::from_bits(word >> 12);
        let gse_length = word & 0x0FFF;

        if usize::from(gse_length) + BASE_HEADER_LEN != data.len() {
            return Err(Error::InvalidGseLength {
                implied: usize::from(gse_length) + BASE_HEADER_LEN,
                actual: data.len(),
            });
        }

        let payload_type = PayloadType::from_se(s, e);
        let tail_len = payload_type.tail_len(label_type);
        let rest = &data[BASE_HEADER_LEN..];
        if rest.len() < tail_len {
            return Err(Error::PacketTooSmall {
                len: data.len(),
                min: BASE_HEADER_LEN + tail_len,
            });
        }

        let header = match payload_type {
            PayloadType::Complete => {
                let protocol_type = u16::from_be_bytes([rest[0], rest[1]]);
                let label = Label::decode(label_type, &rest[2..tail_len])?;
                Self::Complete {
                    protocol_type,
                    label,
                }
            }
            PayloadType::First => {
                let frag_id = rest[0];
                let total_length = u16::from_be_bytes([rest[1], rest[2]]);
                let protocol_type = u16::from_be_bytes([rest[3], rest[4]]);
                let label = Label::decode(label_type, &rest[5..tail_len])?;
                Self::First {
                    frag_id,
                    total_length,
                    protocol_type,
                    label,
                }
            }
            PayloadType::Subsequent => Self::Subsequent { frag_id: rest[0] },
            PayloadType::Last => Self::Last { frag_id: rest[0] },
        };

        Ok(DecodeResult::Header {
            header,
            consumed: BASE_HEADER_LEN + tail_len,
        })
    }
}

/// Result of [`PacketHeader::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// The packet was an all-zero padding marker: decoding must stop for
    /// the remainder of the caller's byte block.
    Padding,
    /// A real header was decoded.
    Header {
        /// The decoded header.
        header: PacketHeader,
        /// Bytes of base header + tail consumed (payload follows).
        consumed: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_round_trips() {
        let header = PacketHeader::Complete {
            protocol_type: 0x2345,
            label: Label::SixBytes([0, 1, 2, 3, 4, 5]),
        };
        let mut buf = BytesMut::new();
        header.encode(48, &mut buf);
        assert_eq!(&[0xC0, 0x30, 0x23, 0x45, 0, 1, 2, 3, 4, 5], &buf[..]);

        let mut full = buf.clone();
        full.extend_from_slice(&[0x42; 40]);
        match PacketHeader::decode(&full).unwrap() {
            DecodeResult::Header { header: h, consumed } => {
                assert_eq!(header, h);
                assert_eq!(10, consumed);
            }
            DecodeResult::Padding => panic!("expected header"),
        }
    }

    #[test]
    fn first_fragment_round_trips() {
        let header = PacketHeader::First {
            frag_id: 0,
            total_length: 0x32,
            protocol_type: 0x2345,
            label: Label::SixBytes([0, 1, 2, 3, 4, 5]),
        };
        let mut buf = BytesMut::new();
        header.encode(30, &mut buf);
        assert_eq!(
            &[0x80, 0x1E, 0x00, 0x00, 0x32, 0x23, 0x45, 0, 1, 2, 3, 4, 5],
            &buf[..]
        );
    }

    #[test]
    fn last_fragment_header_is_one_byte_tail() {
        let header = PacketHeader::Last { frag_id: 7 };
        assert_eq!(1, header.tail_len());
        let mut buf = BytesMut::new();
        header.encode(25, &mut buf);
        assert_eq!(&[0x40, 0x19, 7], &buf[..]);
    }

    #[test]
    fn padding_detected() {
        let data = [0u8; 8];
        assert_eq!(DecodeResult::Padding, PacketHeader::decode(&data).unwrap());
    }

    #[test]
    fn wrong_gse_length_rejected() {
        let mut data = vec![0x40, 0x19, 7];
        data.extend_from_slice(&[0; 10]);
        assert!(matches!(
            PacketHeader::decode(&data).unwrap_err(),
            Error::InvalidGseLength { .. }
        ));
    }

    #[test]
    fn too_small_rejected() {
        assert!(matches!(
            PacketHeader::decode(&[0x40, 0x00]).unwrap_err(),
            Error::PacketTooSmall { .. }
        ));
    }

    #[test]
    fn broadcast_label_rejected() {
        let mut data = vec![0xC0u8, 0x0A, 0x06, 0x00];
        data.extend_from_slice(&[0xFF; 6]);
        assert_eq!(Error::InvalidLabel, PacketHeader::decode(&data).unwrap_err());
    }

    #[test]
    fn multicast_prefix_label_rejected() {
        let mut data = vec![0xC0u8, 0x0A, 0x06, 0x00];
        data.extend_from_slice(&[0x01, 0x00, 0x5E, 0x01, 0x02, 0x03]);
        assert_eq!(Error::InvalidLabel, PacketHeader::decode(&data).unwrap_err());
    }
}
