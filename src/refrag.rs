//! Refragmenter: splits one already-emitted GSE packet into two valid
//! successor packets at a caller-chosen boundary.
//!
//! # CRC migration
//!
//! On the wire, only a **last**-typed packet ever carries a CRC trailer — a
//! first fragment never does. This implementation migrates the CRC on the
//! case where a trailer actually exists on the incoming packet: **last →
//! subsequent + last**. A complete-PDU input has no existing CRC to migrate
//! either, so its successor last fragment gets a freshly computed one.

use bytes::BytesMut;

use crate::{
    crc,
    error::Error,
    header::{self, DecodeResult, Label, LabelType, PacketHeader, PayloadType, CRC_LEN, GSE_MAX_PACKET_LENGTH, GSE_MIN_PACKET_LENGTH},
    vfrag::VirtualFragment,
};

/// Splits `packet1` in place into two successor packets at `max_len`.
///
/// `packet1` is rewritten to become the first successor; the returned
/// fragment is a freshly allocated buffer holding the second.
///
/// `head_off`/`trail_off` size the slack `packet1` is repositioned into
/// before its new (possibly longer) header is written — the same
/// parameters [`VirtualFragment::reset`] takes.
///
/// # Errors
///
/// [`Error::LengthTooSmall`] / [`Error::LengthTooHigh`] if `max_len` is
/// outside `[3, 4097]` or too small to hold even one successor header plus
/// a payload byte; [`Error::RefragUnnecessary`] if `max_len` would not
/// actually shrink `packet1`; [`Error::FragIdMismatch`] if `packet1`
/// already carries a FragID that disagrees with `qos`.
pub fn refrag(
    packet1: &mut VirtualFragment,
    head_off: usize,
    trail_off: usize,
    qos: u8,
    max_len: usize,
) -> Result<VirtualFragment, Error> {
    if max_len < GSE_MIN_PACKET_LENGTH {
        return Err(Error::LengthTooSmall {
            len: max_len,
            min: GSE_MIN_PACKET_LENGTH,
        });
    }
    if max_len > GSE_MAX_PACKET_LENGTH {
        return Err(Error::LengthTooHigh {
            len: max_len,
            max: GSE_MAX_PACKET_LENGTH,
        });
    }

    let snapshot = packet1.bounds();
    match try_refrag(packet1, head_off, trail_off, qos, max_len) {
        Ok(packet2) => Ok(packet2),
        Err(e) => {
            packet1.restore(snapshot);
            Err(e)
        }
    }
}

fn try_refrag(
    packet1: &mut VirtualFragment,
    head_off: usize,
    trail_off: usize,
    qos: u8,
    max_len: usize,
) -> Result<VirtualFragment, Error> {
    let old_len = packet1.length();
    if max_len >= old_len {
        return Err(Error::RefragUnnecessary {
            max_len,
            len: old_len,
        });
    }

    let old_bytes = packet1.as_vec();
    let (decoded, consumed) = match PacketHeader::decode(&old_bytes)? {
        DecodeResult::Padding => {
            return Err(Error::InvalidGseLength {
                implied: 0,
                actual: old_bytes.len(),
            })
        }
        DecodeResult::Header { header, consumed } => (header, consumed),
    };

    if let Some(frag_id) = decoded.frag_id() {
        if frag_id != qos {
            return Err(Error::FragIdMismatch {
                expected: qos,
                actual: frag_id,
            });
        }
    }

    let payload = &old_bytes[consumed..];
    let (bytes1, bytes2) = split(decoded, payload, qos, max_len)?;

    packet1.reset(head_off, trail_off)?;
    packet1.copy_in(&bytes1)?;
    VirtualFragment::create_with_data(bytes2.len(), 0, 0, &bytes2)
}

fn split(
    header: PacketHeader,
    payload: &[u8],
    qos: u8,
    max_len: usize,
) -> Result<(Vec<u8>, Vec<u8>), Error> {
    match header {
        PacketHeader::Complete {
            protocol_type,
            label,
        } => split_complete(protocol_type, label, payload, qos, max_len),
        PacketHeader::First {
            total_length,
            protocol_type,
            label,
            ..
        } => split_first(total_length, protocol_type, label, payload, qos, max_len),
        PacketHeader::Subsequent { .. } => split_subsequent(payload, qos, max_len),
        PacketHeader::Last { .. } => split_last(payload, qos, max_len),
    }
}

/// How many payload bytes the first successor keeps, given it must leave at
/// least one payload byte in `packet1` and cannot keep more than the data
/// that exists.
fn data_len1(max_len: usize, header_len: usize, available: usize) -> Result<usize, Error> {
    if max_len <= header_len {
        return Err(Error::LengthTooSmall {
            len: max_len,
            min: header_len + 1,
        });
    }
    Ok((max_len - header_len).min(available))
}

fn encode_with_payload(header: &PacketHeader, payload: &[u8]) -> Result<Vec<u8>, Error> {
    let total = 2 + header.tail_len() + payload.len();
    let gse_length = u16::try_from(total - 2).map_err(|_| Error::LengthTooHigh {
        len: total,
        max: GSE_MAX_PACKET_LENGTH,
    })?;
    let mut bytes = BytesMut::with_capacity(total);
    header.encode(gse_length, &mut bytes);
    bytes.extend_from_slice(payload);
    Ok(bytes.to_vec())
}

fn split_complete(
    protocol_type: u16,
    label: Label,
    pdu: &[u8],
    qos: u8,
    max_len: usize,
) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let label_type = label.label_type();
    let h1 = header::header_len(PayloadType::First, label_type);
    let len1 = data_len1(max_len, h1, pdu.len())?;
    let (data1, data2) = pdu.split_at(len1);

    #[allow(clippy::cast_possible_truncation)]
    let total_length = (label_type.on_wire_len() + 2 + pdu.len()) as u16;
    let bytes1 = encode_with_payload(
        &PacketHeader::First {
            frag_id: qos,
            total_length,
            protocol_type,
            label,
        },
        data1,
    )?;

    let mut crc_input = Vec::with_capacity(4 + label.as_bytes().len() + pdu.len());
    crc_input.extend_from_slice(&total_length.to_be_bytes());
    crc_input.extend_from_slice(&protocol_type.to_be_bytes());
    crc_input.extend_from_slice(label.as_bytes());
    crc_input.extend_from_slice(pdu);
    let crc_bytes = crc::crc32(&crc_input).to_be_bytes();

    let mut data2_with_crc = Vec::with_capacity(data2.len() + CRC_LEN);
    data2_with_crc.extend_from_slice(data2);
    data2_with_crc.extend_from_slice(&crc_bytes);
    let bytes2 = encode_with_payload(&PacketHeader::Last { frag_id: qos }, &data2_with_crc)?;

    Ok((bytes1, bytes2))
}

fn split_first(
    total_length: u16,
    protocol_type: u16,
    label: Label,
    payload: &[u8],
    qos: u8,
    max_len: usize,
) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let label_type = label.label_type();
    let h1 = header::header_len(PayloadType::First, label_type);
    let len1 = data_len1(max_len, h1, payload.len())?;
    let (data1, data2) = payload.split_at(len1);

    let bytes1 = encode_with_payload(
        &PacketHeader::First {
            frag_id: qos,
            total_length,
            protocol_type,
            label,
        },
        data1,
    )?;
    let bytes2 = encode_with_payload(&PacketHeader::Subsequent { frag_id: qos }, data2)?;
    Ok((bytes1, bytes2))
}

fn split_subsequent(payload: &[u8], qos: u8, max_len: usize) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let h = header::header_len(PayloadType::Subsequent, LabelType::Reuse);
    let len1 = data_len1(max_len, h, payload.len())?;
    let (data1, data2) = payload.split_at(len1);
    let bytes1 = encode_with_payload(&PacketHeader::Subsequent { frag_id: qos }, data1)?;
    let bytes2 = encode_with_payload(&PacketHeader::Subsequent { frag_id: qos }, data2)?;
    Ok((bytes1, bytes2))
}

fn split_last(payload: &[u8], qos: u8, max_len: usize) -> Result<(Vec<u8>, Vec<u8>), Error> {
    if payload.len() < CRC_LEN {
        return Err(Error::CrcFragmented);
    }
    let pure_len = payload.len() - CRC_LEN;
    let pure_data = &payload[..pure_len];
    let crc_bytes = &payload[pure_len..];

    let h = header::header_len(PayloadType::Subsequent, LabelType::Reuse);
    let len1 = data_len1(max_len, h, pure_len)?;
    let (data1, data2) = pure_data.split_at(len1);

    let bytes1 = encode_with_payload(&PacketHeader::Subsequent { frag_id: qos }, data1)?;

    let mut data2_with_crc = Vec::with_capacity(data2.len() + CRC_LEN);
    data2_with_crc.extend_from_slice(data2);
    data2_with_crc.extend_from_slice(crc_bytes);
    let bytes2 = encode_with_payload(&PacketHeader::Last { frag_id: qos }, &data2_with_crc)?;

    Ok((bytes1, bytes2))
}

/// Outcome of [`write_streaming_crc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CrcOutcome {
    /// The accumulator's state was committed into the packet's CRC trailer.
    Written,
}

/// Commits a streaming CRC accumulator's state into the trailing 4 bytes of
/// an already-built last-fragment packet.
///
/// A first fragment's CRC is written eagerly, over whatever bytes sit in the
/// PDU buffer at the moment [`crate::encap::Encapsulator::get_packet`] emits
/// it. If a caller then rewrites those bytes — most notably, prefixing a
/// header extension chain onto a PDU whose first fragment already went out —
/// that eager CRC no longer covers the right bytes. The caller re-derives
/// the correct value incrementally with [`crate::crc::Crc32`] (seeding with
/// [`crate::crc::Crc32::with_seed`] from a previously observed partial state
/// if only a suffix of the PDU changed) and commits the final state here.
///
/// # Errors
///
/// [`Error::CrcFragmented`] if `packet` is shorter than the 4-byte trailer
/// this function needs to overwrite, or any error [`VirtualFragment::write_at`]
/// returns (e.g. `packet` still has another active window open on it).
pub fn write_streaming_crc(packet: &mut VirtualFragment, crc: crc::Crc32) -> Result<CrcOutcome, Error> {
    let len = packet.length();
    if len < CRC_LEN {
        return Err(Error::CrcFragmented);
    }
    let (start, _) = packet.bounds();
    packet.write_at(start + len - CRC_LEN, &crc.state().to_be_bytes())?;
    Ok(CrcOutcome::Written)
}
