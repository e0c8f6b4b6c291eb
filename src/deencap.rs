//! De-encapsulator: reassembles PDUs from a stream of GSE packets, tracking
//! one reassembly context per FragID with a 256-BBFrame timeout.
//!
//! # The `assembled_length` check
//!
//! A naive reading of the protocol would check the last fragment's
//! `assembled_length` against `label_len + protocol_len + pdu_len + 4`. But
//! the bytes actually accumulated across a PDU's fragment *payloads* never
//! include the label or protocol type — those are only ever carried once, in
//! the first fragment's header tail, already split off by
//! [`crate::header::PacketHeader::decode`] before any payload reaches the
//! reassembly buffer. The check implemented here is `assembled_length ==
//! pdu_len + 4`, where `pdu_len = total_length − label_len − protocol_len` is
//! derived from the first fragment's own `TotalLength` field.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    crc,
    error::Error,
    header::{extension::parse_chain, DecodeResult, Label, LabelType, PacketHeader, CRC_LEN},
    vfrag::VirtualFragment,
};

const TIMEOUT_BBFRAMES: u32 = 256;

struct ReassemblyContext {
    vfrag: VirtualFragment,
    label_type: LabelType,
    label: Label,
    /// The real EtherType reported to the caller, resolved from the
    /// extension chain (if any) at first-fragment time.
    protocol_type: u16,
    /// The raw `ProtocolType` field exactly as it appeared on the wire —
    /// possibly an extension-chain head rather than a real EtherType. This,
    /// not [`Self::protocol_type`], is what the CRC trailer was computed
    /// over, since the emitter hashes the field before resolving it.
    wire_protocol_type: u16,
    total_length: u16,
    /// Bytes of extension chain prefixed onto the reassembled payload,
    /// stripped from the front before the PDU is handed back to the caller.
    ext_consumed: usize,
    /// Declared size of a complete reassembly (`pdu_len + CRC_LEN`), fixed
    /// at first-fragment time.
    expected_len: usize,
    bbframe_count: u32,
}

/// Resolves the dual-role `ProtocolType` field against `payload`: if it's
/// already a real EtherType, there's no chain to strip. Otherwise walks the
/// extension chain and returns the real EtherType plus how many leading
/// bytes of `payload` the chain occupies.
fn resolve_protocol(protocol_type: u16, payload: &[u8]) -> Result<(u16, usize), Error> {
    if protocol_type >= 0x0600 {
        return Ok((protocol_type, 0));
    }
    let (_chain, ethertype, consumed) = parse_chain(protocol_type, payload)?;
    Ok((ethertype, consumed))
}

/// Outcome of [`Deencapsulator::packet`]. Modelled as distinct variants of
/// `(label_type, label, protocol, pdu?, gse_length)` rather than one struct
/// with an optional field, so a caller can exhaustively match on what
/// actually happened.
#[derive(Debug)]
#[non_exhaustive]
pub enum DeencapEvent {
    /// The packet was an all-zero padding marker; the caller should stop
    /// decoding the rest of its BBFrame.
    Padding,
    /// A fragment was accepted into its reassembly context; the PDU is not
    /// yet complete.
    FragmentAccepted {
        /// Label type this PDU is being carried under.
        label_type: LabelType,
        /// Destination label.
        label: Label,
        /// Real EtherType of the PDU, resolved from the extension chain if
        /// one was present.
        protocol_type: u16,
        /// This packet's `GSE_Length` field.
        gse_length: u16,
    },
    /// A full PDU was assembled (or arrived as a single complete packet).
    PduReceived {
        /// Label type this PDU was carried under.
        label_type: LabelType,
        /// Destination label.
        label: Label,
        /// Real EtherType of the PDU, resolved from the extension chain if
        /// one was present.
        protocol_type: u16,
        /// The reassembled PDU.
        pdu: VirtualFragment,
        /// This packet's `GSE_Length` field.
        gse_length: u16,
    },
    /// A first fragment arrived for a FragID whose context was already
    /// active; the stale context was discarded and this first fragment was
    /// accepted in its place.
    DataOverwritten {
        /// Label type of the new PDU that overwrote the stale context.
        label_type: LabelType,
        /// Destination label of the new PDU.
        label: Label,
        /// Real EtherType of the new PDU, resolved from the extension chain if
        /// one was present.
        protocol_type: u16,
        /// This packet's `GSE_Length` field.
        gse_length: u16,
    },
}

/// Reassembles PDUs from GSE packets, across `qos_count` independently
/// locked FragID contexts.
pub struct Deencapsulator {
    contexts: Vec<Mutex<Option<ReassemblyContext>>>,
    head_off: Mutex<usize>,
    trail_off: Mutex<usize>,
}

impl Deencapsulator {
    /// Creates a de-encapsulator with one reassembly context slot per FragID
    /// in `0..qos_count`.
    ///
    /// # Errors
    ///
    /// [`Error::FifoZeroQos`] if `qos_count == 0`.
    pub fn new(qos_count: usize) -> Result<Self, Error> {
        if qos_count == 0 {
            return Err(Error::FifoZeroQos);
        }
        Ok(Self {
            contexts: (0..qos_count).map(|_| Mutex::new(None)).collect(),
            head_off: Mutex::new(0),
            trail_off: Mutex::new(0),
        })
    }

    /// Number of FragID context slots.
    #[must_use]
    pub fn qos_count(&self) -> usize {
        self.contexts.len()
    }

    /// Sets the head/trail offsets applied to the Virtual Buffer backing
    /// every PDU handed back by [`Deencapsulator::packet`] from now on.
    pub fn set_offsets(&self, head_off: usize, trail_off: usize) {
        *self.head_off.lock() = head_off;
        *self.trail_off.lock() = trail_off;
    }

    fn slot(&self, frag_id: u8) -> Result<&Mutex<Option<ReassemblyContext>>, Error> {
        self.contexts.get(usize::from(frag_id)).ok_or(Error::InvalidQos {
            qos: frag_id,
            qos_count: self.contexts.len(),
        })
    }

    /// Parses one GSE packet, routing its payload into (or completing) the
    /// reassembly context for its FragID.
    ///
    /// # Errors
    ///
    /// [`Error::PacketTooSmall`], [`Error::InvalidGseLength`],
    /// [`Error::InvalidLabel`] from header decoding; [`Error::InvalidQos`]
    /// if the FragID exceeds `qos_count`; [`Error::CtxNotInit`] for a
    /// subsequent/last fragment with no active context;
    /// [`Error::NoSpaceInBuff`] if a fragment overruns the declared PDU
    /// size; [`Error::CrcFragmented`], [`Error::InvalidDataLength`],
    /// [`Error::InvalidCrc`] while completing a last fragment.
    pub fn packet(&self, data: &VirtualFragment) -> Result<DeencapEvent, Error> {
        let bytes = data.as_vec();
        let (header, consumed) = match PacketHeader::decode(&bytes)? {
            DecodeResult::Padding => return Ok(DeencapEvent::Padding),
            DecodeResult::Header { header, consumed } => (header, consumed),
        };
        #[allow(clippy::cast_possible_truncation)]
        let gse_length = (bytes.len() - 2) as u16;
        let payload = &bytes[consumed..];

        match header {
            PacketHeader::Complete {
                protocol_type,
                label,
            } => {
                let (protocol_type, ext_consumed) = resolve_protocol(protocol_type, payload)?;
                let pdu = self.allocate_output(&payload[ext_consumed..])?;
                Ok(DeencapEvent::PduReceived {
                    label_type: label.label_type(),
                    label,
                    protocol_type,
                    pdu,
                    gse_length,
                })
            }
            PacketHeader::First {
                frag_id,
                total_length,
                protocol_type,
                label,
            } => self.accept_first(frag_id, total_length, protocol_type, label, payload, gse_length),
            PacketHeader::Subsequent { frag_id } => self.accept_subsequent(frag_id, payload, gse_length),
            PacketHeader::Last { frag_id } => self.accept_last(frag_id, payload, gse_length),
        }
    }

    fn allocate_output(&self, pdu_bytes: &[u8]) -> Result<VirtualFragment, Error> {
        let head_off = *self.head_off.lock();
        let trail_off = *self.trail_off.lock();
        VirtualFragment::create_with_data(pdu_bytes.len(), head_off, trail_off, pdu_bytes)
    }

    fn accept_first(
        &self,
        frag_id: u8,
        total_length: u16,
        protocol_type: u16,
        label: Label,
        payload: &[u8],
        gse_length: u16,
    ) -> Result<DeencapEvent, Error> {
        let label_type = label.label_type();
        let overhead = 2 + label_type.on_wire_len();
        let pdu_len = usize::from(total_length).checked_sub(overhead).ok_or(Error::InvalidDataLength {
            expected: overhead,
            actual: usize::from(total_length),
        })?;
        let expected_len = pdu_len + CRC_LEN;

        // The extension chain (if any) occupies leading bytes of the PDU's
        // byte stream, so it must be fully present in the first fragment's
        // own payload to resolve here — it's never split across fragments.
        let (resolved_protocol_type, ext_consumed) = resolve_protocol(protocol_type, payload)?;

        let mut vfrag = VirtualFragment::create_empty(expected_len, 0, 0)?;
        if payload.len() > expected_len {
            return Err(Error::NoSpaceInBuff(frag_id));
        }
        vfrag.append(payload)?;

        let slot = self.slot(frag_id)?;
        let mut guard = slot.lock();
        let overwritten = guard.is_some();
        if overwritten {
            warn!(frag_id, "de-encapsulation context overwritten by new first fragment");
        } else {
            debug!(frag_id, pdu_len, "de-encapsulation context created");
        }
        *guard = Some(ReassemblyContext {
            vfrag,
            label_type,
            label,
            protocol_type: resolved_protocol_type,
            wire_protocol_type: protocol_type,
            total_length,
            ext_consumed,
            expected_len,
            bbframe_count: 0,
        });

        if overwritten {
            Ok(DeencapEvent::DataOverwritten {
                label_type,
                label,
                protocol_type: resolved_protocol_type,
                gse_length,
            })
        } else {
            Ok(DeencapEvent::FragmentAccepted {
                label_type,
                label,
                protocol_type: resolved_protocol_type,
                gse_length,
            })
        }
    }

    fn accept_subsequent(&self, frag_id: u8, payload: &[u8], gse_length: u16) -> Result<DeencapEvent, Error> {
        let slot = self.slot(frag_id)?;
        let mut guard = slot.lock();
        let ctx = guard.as_mut().ok_or(Error::CtxNotInit(frag_id))?;
        if let Err(e) = ctx.vfrag.append(payload) {
            *guard = None;
            return Err(match e {
                Error::PtrOutsideBuff => Error::NoSpaceInBuff(frag_id),
                other => other,
            });
        }
        Ok(DeencapEvent::FragmentAccepted {
            label_type: ctx.label_type,
            label: ctx.label,
            protocol_type: ctx.protocol_type,
            gse_length,
        })
    }

    fn accept_last(&self, frag_id: u8, payload: &[u8], gse_length: u16) -> Result<DeencapEvent, Error> {
        if payload.len() < CRC_LEN {
            return Err(Error::CrcFragmented);
        }

        let slot = self.slot(frag_id)?;
        let mut guard = slot.lock();
        let ctx = guard.as_mut().ok_or(Error::CtxNotInit(frag_id))?;

        if let Err(e) = ctx.vfrag.append(payload) {
            *guard = None;
            return Err(match e {
                Error::PtrOutsideBuff => Error::NoSpaceInBuff(frag_id),
                other => other,
            });
        }

        let assembled = ctx.vfrag.as_vec();
        if assembled.len() != ctx.expected_len {
            let expected = ctx.expected_len;
            *guard = None;
            return Err(Error::InvalidDataLength {
                expected,
                actual: assembled.len(),
            });
        }

        let (pdu_bytes, crc_bytes) = assembled.split_at(assembled.len() - CRC_LEN);
        let mut crc_input = Vec::with_capacity(4 + ctx.label.as_bytes().len() + pdu_bytes.len());
        crc_input.extend_from_slice(&ctx.total_length.to_be_bytes());
        crc_input.extend_from_slice(&ctx.wire_protocol_type.to_be_bytes());
        crc_input.extend_from_slice(ctx.label.as_bytes());
        crc_input.extend_from_slice(pdu_bytes);
        let computed = crc::crc32(&crc_input);
        let expected = u32::from_be_bytes(crc_bytes.try_into().expect("slice is exactly 4 bytes"));
        if computed != expected {
            warn!(frag_id, computed, expected, "CRC mismatch on reassembled PDU");
            *guard = None;
            return Err(Error::InvalidCrc { computed, expected });
        }

        let label_type = ctx.label_type;
        let label = ctx.label;
        let protocol_type = ctx.protocol_type;
        let ext_consumed = ctx.ext_consumed;
        debug!(frag_id, "de-encapsulation context completed");
        *guard = None;

        let pdu = self.allocate_output(&pdu_bytes[ext_consumed..])?;
        Ok(DeencapEvent::PduReceived {
            label_type,
            label,
            protocol_type,
            pdu,
            gse_length,
        })
    }

    /// Advances every active context's BBFrame timeout counter by one,
    /// clearing any context that reaches the 256-BBFrame limit without
    /// completing. The next fragment received for a cleared FragID reports
    /// [`Error::CtxNotInit`].
    pub fn new_bbframe(&self) {
        for slot in &self.contexts {
            let mut guard = slot.lock();
            if let Some(ctx) = guard.as_mut() {
                ctx.bbframe_count += 1;
                if ctx.bbframe_count >= TIMEOUT_BBFRAMES {
                    warn!(bbframe_count = ctx.bbframe_count, "de-encapsulation context timed out");
                    *guard = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::encap::Encapsulator;

    fn raw_packet(bytes: impl AsRef<[u8]>) -> VirtualFragment {
        let bytes = bytes.as_ref();
        VirtualFragment::create_with_data(bytes.len(), 0, 0, bytes).unwrap()
    }

    #[test]
    fn zero_qos_rejected() {
        assert_eq!(Error::FifoZeroQos, Deencapsulator::new(0).unwrap_err());
    }

    #[test]
    fn padding_reported() {
        let deencap = Deencapsulator::new(1).unwrap();
        let packet = raw_packet(vec![0u8; 8]);
        assert!(matches!(deencap.packet(&packet).unwrap(), DeencapEvent::Padding));
    }

    #[test]
    fn complete_packet_yields_pdu() {
        let deencap = Deencapsulator::new(1).unwrap();
        let encap = Encapsulator::new(1, 4).unwrap();
        let data = [0x11u8; 20];
        encap
            .receive_pdu(
                VirtualFragment::create_with_data(data.len(), 16, 4, &data).unwrap(),
                Label::None,
                0x0800,
                0,
            )
            .unwrap();
        let packet = encap.get_packet(64, 0).unwrap();

        match deencap.packet(&packet).unwrap() {
            DeencapEvent::PduReceived { protocol_type, pdu, .. } => {
                assert_eq!(0x0800, protocol_type);
                assert_eq!(data.to_vec(), pdu.as_vec());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    struct FixedExtensions(Vec<crate::header::ExtensionHeader>);

    impl crate::header::ExtensionBuilder for FixedExtensions {
        fn build(&mut self, _ethertype: u16) -> Result<Vec<crate::header::ExtensionHeader>, Error> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn extension_chain_is_stripped_and_real_ethertype_reported() {
        let deencap = Deencapsulator::new(1).unwrap();
        let encap = Encapsulator::new(1, 4).unwrap();
        encap.set_extension_builder(FixedExtensions(vec![crate::header::ExtensionHeader {
            h_type: 0x07,
            data: vec![0xAA, 0xBB],
        }]));
        let data = [0x33u8; 30];
        encap
            .receive_pdu(
                VirtualFragment::create_with_data(data.len(), 16, 4, &data).unwrap(),
                Label::None,
                0x0800,
                0,
            )
            .unwrap();
        let packet = encap.get_packet(0, 0).unwrap();

        match deencap.packet(&packet).unwrap() {
            DeencapEvent::PduReceived { protocol_type, pdu, .. } => {
                assert_eq!(0x0800, protocol_type, "caller must see the real EtherType, not the chain head");
                assert_eq!(data.to_vec(), pdu.as_vec(), "extension bytes must be stripped from the PDU");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn fragmented_pdu_with_extensions_round_trips() {
        let deencap = Deencapsulator::new(1).unwrap();
        let encap = Encapsulator::new(1, 4).unwrap();
        encap.set_extension_builder(FixedExtensions(vec![crate::header::ExtensionHeader {
            h_type: 0x01,
            data: vec![1, 2, 3, 4, 5, 6],
        }]));
        let data: Vec<u8> = (0u8..150).collect();
        encap
            .receive_pdu(
                VirtualFragment::create_with_data(data.len(), 16, 4, &data).unwrap(),
                Label::None,
                0x86DD,
                0,
            )
            .unwrap();

        let mut last_event = None;
        let mut saw_fragment_accepted = false;
        loop {
            match encap.get_packet(32, 0) {
                Ok(packet) => {
                    let event = deencap.packet(&packet).unwrap();
                    if let DeencapEvent::FragmentAccepted { protocol_type, .. } = &event {
                        // The chain-head word stored on the wire is below
                        // 0x0600 and would never pass for a real EtherType;
                        // every event reports the resolved one instead.
                        assert_eq!(0x86DD, *protocol_type);
                        saw_fragment_accepted = true;
                    }
                    last_event = Some(event);
                }
                Err(Error::FifoEmpty) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(saw_fragment_accepted, "expected at least one intermediate fragment");

        match last_event.unwrap() {
            DeencapEvent::PduReceived { protocol_type, pdu, .. } => {
                assert_eq!(0x86DD, protocol_type);
                assert_eq!(data, pdu.as_vec());
            }
            other => panic!("unexpected final event: {other:?}"),
        }
    }

    #[test]
    fn subsequent_without_first_is_ctx_not_init() {
        let deencap = Deencapsulator::new(1).unwrap();
        let mut bytes = BytesMut::new();
        PacketHeader::Subsequent { frag_id: 0 }.encode(5, &mut bytes);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);
        let packet = raw_packet(bytes);
        assert_eq!(Error::CtxNotInit(0), deencap.packet(&packet).unwrap_err());
    }

    #[test]
    fn fragmented_pdu_round_trips_through_deencap() {
        let deencap = Deencapsulator::new(1).unwrap();
        let encap = Encapsulator::new(1, 4).unwrap();
        let data: Vec<u8> = (0u8..200).collect();
        let label = Label::ThreeBytes([9, 8, 7]);
        encap
            .receive_pdu(
                VirtualFragment::create_with_data(data.len(), 16, 4, &data).unwrap(),
                label,
                0x86DD,
                0,
            )
            .unwrap();

        let mut last_event = None;
        loop {
            match encap.get_packet(40, 0) {
                Ok(packet) => {
                    last_event = Some(deencap.packet(&packet).unwrap());
                }
                Err(Error::FifoEmpty) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        match last_event.unwrap() {
            DeencapEvent::PduReceived {
                label: got_label,
                protocol_type,
                pdu,
                ..
            } => {
                assert_eq!(label, got_label);
                assert_eq!(0x86DD, protocol_type);
                assert_eq!(data, pdu.as_vec());
            }
            other => panic!("unexpected final event: {other:?}"),
        }
    }

    #[test]
    fn overwritten_first_fragment_is_reported() {
        let deencap = Deencapsulator::new(1).unwrap();
        let mut bytes = BytesMut::new();
        PacketHeader::First {
            frag_id: 0,
            total_length: 6,
            protocol_type: 0x0800,
            label: Label::None,
        }
        .encode(7, &mut bytes);
        bytes.extend_from_slice(&[1, 2, 3]);
        let first = raw_packet(bytes);

        assert!(matches!(
            deencap.packet(&first).unwrap(),
            DeencapEvent::FragmentAccepted { .. }
        ));
        assert!(matches!(
            deencap.packet(&first).unwrap(),
            DeencapEvent::DataOverwritten { .. }
        ));
    }

    #[test]
    fn timeout_clears_context_after_256_bbframes() {
        let deencap = Deencapsulator::new(1).unwrap();
        let mut bytes = BytesMut::new();
        PacketHeader::First {
            frag_id: 0,
            total_length: 6,
            protocol_type: 0x0800,
            label: Label::None,
        }
        .encode(7, &mut bytes);
        bytes.extend_from_slice(&[1, 2, 3]);
        deencap.packet(&raw_packet(bytes)).unwrap();

        for _ in 0..256 {
            deencap.new_bbframe();
        }

        let mut last = BytesMut::new();
        PacketHeader::Last { frag_id: 0 }.encode(7, &mut last);
        last.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        assert_eq!(Error::CtxNotInit(0), deencap.packet(&raw_packet(last)).unwrap_err());
    }

    #[test]
    fn crc_mismatch_rejected() {
        let deencap = Deencapsulator::new(1).unwrap();
        let mut first_bytes = BytesMut::new();
        PacketHeader::First {
            frag_id: 0,
            total_length: 3,
            protocol_type: 0x0800,
            label: Label::None,
        }
        .encode(4, &mut first_bytes);
        first_bytes.extend_from_slice(&[9, 9, 9]);
        deencap.packet(&raw_packet(first_bytes)).unwrap();

        let mut last_bytes = BytesMut::new();
        PacketHeader::Last { frag_id: 0 }.encode(4, &mut last_bytes);
        last_bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(matches!(
            deencap.packet(&raw_packet(last_bytes)).unwrap_err(),
            Error::InvalidCrc { .. }
        ));
    }
}
