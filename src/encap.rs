//! Encapsulator: accepts PDUs into per-QoS FIFOs and emits GSE packets of a
//! caller-requested length.
//!
//! [`Encapsulator::get_packet`] and [`Encapsulator::get_packet_copy`] share
//! the same decision tree over complete/first/subsequent/last emission and
//! differ only in how the resulting packet's bytes are materialized: the
//! former duplicates the source window (zero-copy, sharing its backing
//! buffer), the latter copies the bytes into a fresh allocation.
//!
//! Every mutating step of either call is attempted against a snapshot of the
//! head context's window bounds; any failure restores the snapshot before
//! returning, so a failed call never leaves the context partway through a
//! header prefix.

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::{
    crc,
    error::Error,
    fifo::Fifo,
    header::{
        self,
        extension::{build_chain, ExtensionBuilder},
        Label, LabelType, PacketHeader, PayloadType, CRC_LEN, GSE_MAX_PACKET_LENGTH,
        GSE_MIN_PACKET_LENGTH,
    },
    vfrag::VirtualFragment,
};

const ETHERTYPE_THRESHOLD: u16 = 0x0600;
const MAX_PDU_LENGTH: usize = 65535;

/// How an emitted packet's bytes are materialized out of the context's
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitMode {
    /// Duplicate the source window so the emitted packet shares the PDU's
    /// backing buffer (see [`VirtualFragment::duplicate`]).
    ZeroCopy,
    /// Copy the packet's bytes into a freshly allocated buffer, independent
    /// of the context's remaining window.
    Copy,
}

/// Carves `packet_len` bytes off the front of `ctx.vfrag` as the next
/// emitted packet, per `mode`, then advances the context's window past
/// those bytes.
fn finish_packet(
    ctx: &mut EncapContext,
    mode: EmitMode,
    packet_len: usize,
) -> Result<VirtualFragment, Error> {
    let packet = match mode {
        EmitMode::ZeroCopy => ctx.vfrag.duplicate(packet_len)?,
        EmitMode::Copy => {
            let bytes = ctx.vfrag.with_bytes(|window| window[..packet_len].to_vec());
            VirtualFragment::create_with_data(packet_len, 0, 0, &bytes)?
        }
    };
    ctx.vfrag
        .shift(isize::try_from(packet_len).map_err(|_| Error::PtrOutsideBuff)?, 0)?;
    Ok(packet)
}

/// Per-PDU state held in a QoS FIFO.
#[derive(Debug)]
struct EncapContext {
    vfrag: VirtualFragment,
    label: Label,
    label_type: LabelType,
    total_length: u16,
    protocol_type: u16,
    qos: u8,
    /// Number of fragments already emitted for this PDU. `0` means no
    /// packet has been produced yet (the PDU may still go out as a single
    /// complete packet); `> 0` means a first fragment already went out and
    /// only subsequent/last fragments remain.
    frag_count: u32,
}

/// Accepts PDUs and emits GSE packets, spread across `qos_count`
/// independently-locked FIFOs.
pub struct Encapsulator {
    fifos: Vec<Fifo<EncapContext>>,
    extension_builder: Mutex<Option<Box<dyn ExtensionBuilder + Send>>>,
}

impl Encapsulator {
    /// Creates an encapsulator with `qos_count` FIFOs, each holding up to
    /// `fifo_capacity` contexts.
    ///
    /// # Errors
    ///
    /// [`Error::FifoZeroQos`] if `qos_count == 0`; [`Error::FifoZeroSize`]
    /// if `fifo_capacity == 0`.
    pub fn new(qos_count: usize, fifo_capacity: usize) -> Result<Self, Error> {
        if qos_count == 0 {
            return Err(Error::FifoZeroQos);
        }
        let fifos = (0..qos_count)
            .map(|_| Fifo::new(fifo_capacity))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self {
            fifos,
            extension_builder: Mutex::new(None),
        })
    }

    /// Number of QoS FIFOs this encapsulator was configured with.
    #[must_use]
    pub fn qos_count(&self) -> usize {
        self.fifos.len()
    }

    /// Installs (or replaces) the extension builder invoked once, before
    /// the first packet of each PDU is emitted.
    pub fn set_extension_builder(&self, builder: impl ExtensionBuilder + Send + 'static) {
        *self.extension_builder.lock() = Some(Box::new(builder));
    }

    /// Removes any previously installed extension builder.
    pub fn clear_extension_builder(&self) {
        *self.extension_builder.lock() = None;
    }

    fn fifo(&self, qos: u8) -> Result<&Fifo<EncapContext>, Error> {
        self.fifos.get(usize::from(qos)).ok_or(Error::InvalidQos {
            qos,
            qos_count: self.fifos.len(),
        })
    }

    /// Accepts a PDU into the tail of `qos`'s FIFO.
    ///
    /// On any validation failure `pdu` is dropped and the error returned.
    ///
    /// # Errors
    ///
    /// [`Error::WrongProtocol`] if `protocol_type < 0x0600`;
    /// [`Error::PduLength`] if the PDU would not fit in a 16-bit
    /// `TotalLength`; [`Error::InvalidQos`]; [`Error::FifoFull`].
    pub fn receive_pdu(
        &self,
        pdu: VirtualFragment,
        label: Label,
        protocol_type: u16,
        qos: u8,
    ) -> Result<(), Error> {
        let fifo = self.fifo(qos)?;

        if protocol_type < ETHERTYPE_THRESHOLD {
            return Err(Error::WrongProtocol(protocol_type));
        }
        let label_type = label.label_type();
        let overhead = 2 + label_type.on_wire_len();
        let max_pdu_len = MAX_PDU_LENGTH - overhead;
        if pdu.length() > max_pdu_len {
            return Err(Error::PduLength {
                len: pdu.length(),
                max: max_pdu_len,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let total_length = (pdu.length() + overhead) as u16;
        fifo.push(EncapContext {
            vfrag: pdu,
            label,
            label_type,
            total_length,
            protocol_type,
            qos,
            frag_count: 0,
        })
    }

    /// Emits the next GSE packet of at most `desired_len` bytes for `qos`.
    ///
    /// `desired_len == 0` is treated as [`GSE_MAX_PACKET_LENGTH`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidQos`], [`Error::FifoEmpty`], [`Error::LengthTooSmall`],
    /// [`Error::LengthTooHigh`], and whatever [`ExtensionBuilder::build`]
    /// reports.
    pub fn get_packet(&self, desired_len: usize, qos: u8) -> Result<VirtualFragment, Error> {
        self.get_packet_with_mode(desired_len, qos, EmitMode::ZeroCopy)
    }

    /// Like [`Encapsulator::get_packet`], but the returned packet is a fresh
    /// allocation rather than a zero-copy window sharing the PDU's backing
    /// buffer.
    ///
    /// Prefer [`Encapsulator::get_packet`] unless the caller specifically
    /// needs the emitted packet to outlive, or be independently mutable
    /// from, the remaining unemitted source buffer.
    ///
    /// # Errors
    ///
    /// As [`Encapsulator::get_packet`].
    pub fn get_packet_copy(&self, desired_len: usize, qos: u8) -> Result<VirtualFragment, Error> {
        self.get_packet_with_mode(desired_len, qos, EmitMode::Copy)
    }

    fn get_packet_with_mode(
        &self,
        desired_len: usize,
        qos: u8,
        mode: EmitMode,
    ) -> Result<VirtualFragment, Error> {
        let fifo = self.fifo(qos)?;
        let desired_len = if desired_len == 0 {
            GSE_MAX_PACKET_LENGTH
        } else {
            desired_len
        };
        if desired_len < GSE_MIN_PACKET_LENGTH {
            return Err(Error::LengthTooSmall {
                len: desired_len,
                min: GSE_MIN_PACKET_LENGTH,
            });
        }
        if desired_len > GSE_MAX_PACKET_LENGTH {
            return Err(Error::LengthTooHigh {
                len: desired_len,
                max: GSE_MAX_PACKET_LENGTH,
            });
        }

        let (packet, exhausted) =
            fifo.with_head_mut(|ctx| self.emit_from_context(ctx, desired_len, mode))??;
        if exhausted {
            fifo.pop()?;
        }
        Ok(packet)
    }

    fn emit_from_context(
        &self,
        ctx: &mut EncapContext,
        desired_len: usize,
        mode: EmitMode,
    ) -> Result<(VirtualFragment, bool), Error> {
        if ctx.frag_count == 0 {
            self.maybe_apply_extensions(ctx)?;

            let remaining = ctx.vfrag.length();
            let h_complete = header::header_len(PayloadType::Complete, ctx.label_type);
            if desired_len >= remaining + h_complete {
                return self.emit_complete(ctx, remaining, h_complete, mode);
            }
            let h_first = header::header_len(PayloadType::First, ctx.label_type);
            if desired_len >= h_first + 1 {
                return self.emit_first(ctx, desired_len, h_first, remaining, mode);
            }
            return Err(Error::LengthTooSmall {
                len: desired_len,
                min: h_first + 1,
            });
        }

        let h_subs = header::header_len(PayloadType::Subsequent, LabelType::Reuse);
        let remaining_pdu = ctx.vfrag.length() - CRC_LEN;
        if desired_len >= remaining_pdu + h_subs + CRC_LEN {
            return self.emit_last(ctx, remaining_pdu, h_subs, mode);
        }
        // Once every PDU byte has gone out, only the trailing CRC is left in
        // the window: a Subsequent fragment would carry zero payload bytes,
        // which isn't a legal GSE fragment. The only packet left to emit is
        // the Last fragment.
        if remaining_pdu == 0 {
            return Err(Error::LengthTooSmall {
                len: desired_len,
                min: h_subs + CRC_LEN,
            });
        }
        if desired_len >= h_subs + 1 {
            return self.emit_subsequent(ctx, desired_len, h_subs, remaining_pdu, mode);
        }
        Err(Error::LengthTooSmall {
            len: desired_len,
            min: h_subs + 1,
        })
    }

    fn maybe_apply_extensions(&self, ctx: &mut EncapContext) -> Result<(), Error> {
        let extensions = {
            let mut guard = self.extension_builder.lock();
            let Some(builder) = guard.as_mut() else {
                return Ok(());
            };
            builder.build(ctx.protocol_type)?
        };
        if extensions.is_empty() {
            return Ok(());
        }
        let (head_word, trailing) = build_chain(&extensions, ctx.protocol_type)?;
        if trailing.is_empty() {
            ctx.protocol_type = head_word;
            return Ok(());
        }

        let snapshot = ctx.vfrag.bounds();
        let result = (|| {
            let delta = isize::try_from(trailing.len()).map_err(|_| Error::PtrOutsideBuff)?;
            ctx.vfrag.shift(-delta, 0)?;
            let (start, _) = ctx.vfrag.bounds();
            ctx.vfrag.write_at(start, &trailing)
        })();
        if let Err(e) = result {
            ctx.vfrag.restore(snapshot);
            return Err(e);
        }

        let extra =
            u16::try_from(trailing.len()).map_err(|_| Error::InvalidExtensions("extension chain too long"))?;
        ctx.total_length = ctx.total_length.checked_add(extra).ok_or(Error::PduLength {
            len: usize::from(ctx.total_length) + trailing.len(),
            max: usize::from(u16::MAX),
        })?;
        ctx.protocol_type = head_word;
        Ok(())
    }

    fn emit_complete(
        &self,
        ctx: &mut EncapContext,
        remaining: usize,
        header_len: usize,
        mode: EmitMode,
    ) -> Result<(VirtualFragment, bool), Error> {
        let snapshot = ctx.vfrag.bounds();
        match Self::try_emit_complete(ctx, remaining, header_len, mode) {
            Ok(packet) => Ok((packet, true)),
            Err(e) => {
                ctx.vfrag.restore(snapshot);
                Err(e)
            }
        }
    }

    fn try_emit_complete(
        ctx: &mut EncapContext,
        remaining: usize,
        header_len: usize,
        mode: EmitMode,
    ) -> Result<VirtualFragment, Error> {
        let delta = isize::try_from(header_len).map_err(|_| Error::PtrOutsideBuff)?;
        ctx.vfrag.shift(-delta, 0)?;
        let (start, _) = ctx.vfrag.bounds();
        let gse_length = length_field(header_len + remaining)?;
        let mut bytes = BytesMut::with_capacity(header_len);
        PacketHeader::Complete {
            protocol_type: ctx.protocol_type,
            label: ctx.label,
        }
        .encode(gse_length, &mut bytes);
        ctx.vfrag.write_at(start, &bytes)?;

        let total = header_len + remaining;
        finish_packet(ctx, mode, total)
    }

    fn emit_first(
        &self,
        ctx: &mut EncapContext,
        desired_len: usize,
        header_len: usize,
        remaining: usize,
        mode: EmitMode,
    ) -> Result<(VirtualFragment, bool), Error> {
        let snapshot = ctx.vfrag.bounds();
        match Self::try_emit_first(ctx, desired_len, header_len, remaining, mode) {
            Ok(packet) => Ok((packet, false)),
            Err(e) => {
                ctx.vfrag.restore(snapshot);
                Err(e)
            }
        }
    }

    fn try_emit_first(
        ctx: &mut EncapContext,
        desired_len: usize,
        header_len: usize,
        remaining: usize,
        mode: EmitMode,
    ) -> Result<VirtualFragment, Error> {
        let packet_len = non_crc_packet_len(desired_len, header_len, remaining);

        let head_delta = isize::try_from(header_len).map_err(|_| Error::PtrOutsideBuff)?;
        ctx.vfrag.shift(-head_delta, 4)?;
        let (start, _) = ctx.vfrag.bounds();

        let gse_length = length_field(packet_len)?;
        let mut bytes = BytesMut::with_capacity(header_len);
        PacketHeader::First {
            frag_id: ctx.qos,
            total_length: ctx.total_length,
            protocol_type: ctx.protocol_type,
            label: ctx.label,
        }
        .encode(gse_length, &mut bytes);
        ctx.vfrag.write_at(start, &bytes)?;

        let mut crc_input = Vec::with_capacity(4 + ctx.label.as_bytes().len() + remaining);
        crc_input.extend_from_slice(&ctx.total_length.to_be_bytes());
        crc_input.extend_from_slice(&ctx.protocol_type.to_be_bytes());
        crc_input.extend_from_slice(ctx.label.as_bytes());
        ctx.vfrag
            .with_bytes(|window| crc_input.extend_from_slice(&window[header_len..header_len + remaining]));
        let crc_bytes = crc::crc32(&crc_input).to_be_bytes();
        ctx.vfrag.write_at(start + header_len + remaining, &crc_bytes)?;

        let packet = finish_packet(ctx, mode, packet_len)?;
        ctx.frag_count += 1;
        Ok(packet)
    }

    fn emit_subsequent(
        &self,
        ctx: &mut EncapContext,
        desired_len: usize,
        header_len: usize,
        remaining_pdu: usize,
        mode: EmitMode,
    ) -> Result<(VirtualFragment, bool), Error> {
        let snapshot = ctx.vfrag.bounds();
        match Self::try_emit_subsequent(ctx, desired_len, header_len, remaining_pdu, mode) {
            Ok(packet) => Ok((packet, false)),
            Err(e) => {
                ctx.vfrag.restore(snapshot);
                Err(e)
            }
        }
    }

    fn try_emit_subsequent(
        ctx: &mut EncapContext,
        desired_len: usize,
        header_len: usize,
        remaining_pdu: usize,
        mode: EmitMode,
    ) -> Result<VirtualFragment, Error> {
        let packet_len = non_crc_packet_len(desired_len, header_len, remaining_pdu);

        let delta = isize::try_from(header_len).map_err(|_| Error::PtrOutsideBuff)?;
        ctx.vfrag.shift(-delta, 0)?;
        let (start, _) = ctx.vfrag.bounds();

        let gse_length = length_field(packet_len)?;
        let mut bytes = BytesMut::with_capacity(header_len);
        PacketHeader::Subsequent { frag_id: ctx.qos }.encode(gse_length, &mut bytes);
        ctx.vfrag.write_at(start, &bytes)?;

        let packet = finish_packet(ctx, mode, packet_len)?;
        ctx.frag_count += 1;
        Ok(packet)
    }

    fn emit_last(
        &self,
        ctx: &mut EncapContext,
        remaining_pdu: usize,
        header_len: usize,
        mode: EmitMode,
    ) -> Result<(VirtualFragment, bool), Error> {
        let snapshot = ctx.vfrag.bounds();
        match Self::try_emit_last(ctx, remaining_pdu, header_len, mode) {
            Ok(packet) => Ok((packet, true)),
            Err(e) => {
                ctx.vfrag.restore(snapshot);
                Err(e)
            }
        }
    }

    fn try_emit_last(
        ctx: &mut EncapContext,
        remaining_pdu: usize,
        header_len: usize,
        mode: EmitMode,
    ) -> Result<VirtualFragment, Error> {
        let packet_len = header_len + remaining_pdu + CRC_LEN;

        let delta = isize::try_from(header_len).map_err(|_| Error::PtrOutsideBuff)?;
        ctx.vfrag.shift(-delta, 0)?;
        let (start, _) = ctx.vfrag.bounds();

        let gse_length = length_field(packet_len)?;
        let mut bytes = BytesMut::with_capacity(header_len);
        PacketHeader::Last { frag_id: ctx.qos }.encode(gse_length, &mut bytes);
        ctx.vfrag.write_at(start, &bytes)?;

        finish_packet(ctx, mode, packet_len)
    }
}

/// Picks how many bytes (header included) a non-last fragment should carry,
/// applying the CRC non-split rule: never leave between 1 and 3 bytes of PDU
/// data dangling for the next call, since that would force a future fragment
/// to start partway into what should be a clean header/data/CRC split.
fn non_crc_packet_len(desired_len: usize, header_len: usize, remaining: usize) -> usize {
    let budget = header_len + remaining;
    let mut packet_len = desired_len.min(GSE_MAX_PACKET_LENGTH).min(budget);
    let leftover = budget - packet_len;
    if leftover > 0 && leftover < CRC_LEN {
        packet_len -= CRC_LEN - leftover;
    }
    packet_len
}

fn length_field(total_packet_len: usize) -> Result<u16, Error> {
    u16::try_from(total_packet_len - 2).map_err(|_| Error::LengthTooHigh {
        len: total_packet_len,
        max: GSE_MAX_PACKET_LENGTH,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{DecodeResult, GSE_MIN_PACKET_LENGTH as MIN_LEN};

    fn pdu(bytes: &[u8]) -> VirtualFragment {
        VirtualFragment::create_with_data(bytes.len(), 16, 4, bytes).unwrap()
    }

    #[test]
    fn zero_qos_rejected() {
        assert_eq!(Error::FifoZeroQos, Encapsulator::new(0, 4).unwrap_err());
    }

    #[test]
    fn receive_pdu_rejects_low_protocol() {
        let encap = Encapsulator::new(1, 4).unwrap();
        assert!(matches!(
            encap.receive_pdu(pdu(&[1, 2, 3]), Label::None, 0x0042, 0).unwrap_err(),
            Error::WrongProtocol(0x0042)
        ));
    }

    #[test]
    fn receive_pdu_rejects_bad_qos() {
        let encap = Encapsulator::new(1, 4).unwrap();
        assert_eq!(
            Error::InvalidQos { qos: 5, qos_count: 1 },
            encap.receive_pdu(pdu(&[1]), Label::None, 0x0800, 5).unwrap_err()
        );
    }

    #[test]
    fn small_pdu_emits_single_complete_packet() {
        let encap = Encapsulator::new(1, 4).unwrap();
        let data = [0x42u8; 40];
        let label = Label::SixBytes([0, 1, 2, 3, 4, 5]);
        encap.receive_pdu(pdu(&data), label, 0x2345, 0).unwrap();

        // 2-byte base header + 2-byte protocol type + 6-byte label + 40 PDU bytes.
        let packet = encap.get_packet(64, 0).unwrap();
        assert_eq!(50, packet.length());
        let bytes = packet.as_vec();
        assert_eq!(&[0xC0, 0x30, 0x23, 0x45, 0, 1, 2, 3, 4, 5], &bytes[..10]);
        assert_eq!(&data[..], &bytes[10..]);

        assert_eq!(Error::FifoEmpty, encap.get_packet(64, 0).unwrap_err());
    }

    #[test]
    fn undersized_pdu_splits_into_first_and_last() {
        let encap = Encapsulator::new(1, 4).unwrap();
        let data = [0x42u8; 40];
        let label = Label::SixBytes([0, 1, 2, 3, 4, 5]);
        encap.receive_pdu(pdu(&data), label, 0x2345, 0).unwrap();

        let first = encap.get_packet(32, 0).unwrap();
        assert_eq!(32, first.length());
        let first_bytes = first.as_vec();
        // FragID 0, TotalLength 0x0030 (= 6-byte label + 2-byte protocol + 40 PDU bytes).
        assert_eq!(
            &[0x80, 0x1E, 0x00, 0x00, 0x30, 0x23, 0x45, 0, 1, 2, 3, 4, 5],
            &first_bytes[..13]
        );

        // 3-byte header + 21 remaining PDU bytes + 4-byte CRC trailer.
        // GSE_Length = 28 - 2 = 26 = 0x01A, S=0, E=1, LT=00.
        let last = encap.get_packet(64, 0).unwrap();
        assert_eq!(28, last.length());
        let last_bytes = last.as_vec();
        assert_eq!(0x40, last_bytes[0]);
        assert_eq!(0, last_bytes[2]);

        assert_eq!(Error::FifoEmpty, encap.get_packet(64, 0).unwrap_err());
    }

    #[test]
    fn exhausted_pdu_rejects_small_length_instead_of_underflowing() {
        // A schedule that drives `remaining_pdu` to exactly 0 (only the CRC
        // trailer left) before the caller asks for a small `desired_len`
        // that would otherwise fall into the Subsequent branch and demand a
        // zero-payload fragment.
        let encap = Encapsulator::new(1, 4).unwrap();
        let data = [0x42u8; 40];
        encap.receive_pdu(pdu(&data), Label::None, 0x0800, 0).unwrap();

        encap.get_packet(30, 0).unwrap();
        encap.get_packet(21, 0).unwrap();

        assert_eq!(
            Error::LengthTooSmall { len: 5, min: 7 },
            encap.get_packet(5, 0).unwrap_err()
        );

        let last = encap.get_packet(7, 0).unwrap();
        assert_eq!(7, last.length());
        let last_bytes = last.as_vec();
        assert_eq!(0x40, last_bytes[0]);
        assert_eq!(0, last_bytes[2]);

        assert_eq!(Error::FifoEmpty, encap.get_packet(64, 0).unwrap_err());
    }

    #[test]
    fn fragments_round_trip_through_header_decode() {
        let encap = Encapsulator::new(1, 4).unwrap();
        let data: Vec<u8> = (0u8..200).collect();
        encap.receive_pdu(pdu(&data), Label::None, 0x0800, 0).unwrap();

        let mut packets = Vec::new();
        loop {
            match encap.get_packet(40, 0) {
                Ok(packet) => packets.push(packet),
                Err(Error::FifoEmpty) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(packets.len() > 1);
        for packet in &packets {
            let bytes = packet.as_vec();
            match PacketHeader::decode(&bytes).unwrap() {
                DecodeResult::Header { consumed, .. } => assert!(consumed < bytes.len()),
                DecodeResult::Padding => panic!("unexpected padding"),
            }
        }
    }

    #[test]
    fn get_packet_copy_matches_zero_copy_bytes_but_not_buffer() {
        let encap = Encapsulator::new(1, 4).unwrap();
        let data = [0x42u8; 40];
        let label = Label::SixBytes([0, 1, 2, 3, 4, 5]);
        encap.receive_pdu(pdu(&data), label, 0x2345, 0).unwrap();

        let packet = encap.get_packet_copy(64, 0).unwrap();
        assert_eq!(1, packet.active_windows());
        assert_eq!(50, packet.length());
        let bytes = packet.as_vec();
        assert_eq!(&[0xC0, 0x30, 0x23, 0x45, 0, 1, 2, 3, 4, 5], &bytes[..10]);
        assert_eq!(&data[..], &bytes[10..]);
    }

    #[test]
    fn desired_len_below_minimum_rejected() {
        let encap = Encapsulator::new(1, 4).unwrap();
        encap.receive_pdu(pdu(&[1, 2, 3]), Label::None, 0x0800, 0).unwrap();
        assert_eq!(
            Error::LengthTooSmall { len: 1, min: MIN_LEN },
            encap.get_packet(1, 0).unwrap_err()
        );
    }
}
