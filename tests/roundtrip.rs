//! End-to-end encapsulation/de-encapsulation and refragmentation scenarios,
//! exercised through the crate's public API rather than its internals.

use gse::{
    deencap::{DeencapEvent, Deencapsulator},
    encap::Encapsulator,
    header::{DecodeResult, Label, PacketHeader},
    refrag::refrag,
    vfrag::VirtualFragment,
    Error,
};

fn pdu(bytes: &[u8]) -> VirtualFragment {
    VirtualFragment::create_with_data(bytes.len(), 16, 4, bytes).unwrap()
}

#[test]
fn single_complete_pdu_round_trips() {
    let encap = Encapsulator::new(1, 4).unwrap();
    let deencap = Deencapsulator::new(1).unwrap();
    let data: Vec<u8> = (0u8..60).collect();
    let label = Label::SixBytes([0xAA; 6]);
    encap.receive_pdu(pdu(&data), label, 0x0800, 0).unwrap();

    let packet = encap.get_packet(0, 0).unwrap();
    match deencap.packet(&packet).unwrap() {
        DeencapEvent::PduReceived {
            label: got_label,
            protocol_type,
            pdu,
            ..
        } => {
            assert_eq!(label, got_label);
            assert_eq!(0x0800, protocol_type);
            assert_eq!(data, pdu.as_vec());
        }
        other => panic!("expected PduReceived, got {other:?}"),
    }
}

#[test]
fn fragmented_pdu_round_trips_across_many_small_packets() {
    let encap = Encapsulator::new(2, 4).unwrap();
    let deencap = Deencapsulator::new(2).unwrap();
    let data: Vec<u8> = (0u8..250).cycle().take(2000).collect();
    let label = Label::ThreeBytes([1, 2, 3]);
    encap.receive_pdu(pdu(&data), label, 0x86DD, 1).unwrap();

    let mut final_event = None;
    loop {
        match encap.get_packet(48, 1) {
            Ok(packet) => final_event = Some(deencap.packet(&packet).unwrap()),
            Err(Error::FifoEmpty) => break,
            Err(e) => panic!("unexpected encap error: {e}"),
        }
    }

    match final_event.expect("at least one packet must have been emitted") {
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
        other => panic!("expected PduReceived as final event, got {other:?}"),
    }
}

#[test]
fn refragmenting_a_complete_packet_still_reassembles_correctly() {
    let encap = Encapsulator::new(1, 4).unwrap();
    let deencap = Deencapsulator::new(1).unwrap();
    let data = [0x77u8; 80];
    encap.receive_pdu(pdu(&data), Label::None, 0x0800, 0).unwrap();

    let mut complete = encap.get_packet(0, 0).unwrap();
    assert!(complete.length() > 40);

    let second_half = refrag(&mut complete, 16, 4, 0, 40).unwrap();

    assert!(matches!(
        deencap.packet(&complete).unwrap(),
        DeencapEvent::FragmentAccepted { .. }
    ));
    match deencap.packet(&second_half).unwrap() {
        DeencapEvent::PduReceived {
            protocol_type, pdu, ..
        } => {
            assert_eq!(0x0800, protocol_type);
            assert_eq!(&data[..], pdu.as_vec().as_slice());
        }
        other => panic!("expected PduReceived, got {other:?}"),
    }
}

#[test]
fn padding_packets_are_reported_and_skipped() {
    let deencap = Deencapsulator::new(1).unwrap();
    let padding = VirtualFragment::create_with_data(6, 0, 0, &[0u8; 6]).unwrap();
    assert!(matches!(deencap.packet(&padding).unwrap(), DeencapEvent::Padding));
}

#[test]
fn crc_mismatch_on_last_fragment_is_rejected() {
    let encap = Encapsulator::new(1, 4).unwrap();
    let deencap = Deencapsulator::new(1).unwrap();
    let data = [0x11u8; 30];
    encap.receive_pdu(pdu(&data), Label::None, 0x0800, 0).unwrap();

    let first = encap.get_packet(20, 0).unwrap();
    assert!(matches!(
        deencap.packet(&first).unwrap(),
        DeencapEvent::FragmentAccepted { .. }
    ));

    let last = encap.get_packet(0, 0).unwrap();
    let mut bytes = last.as_vec();
    let last_idx = bytes.len() - 1;
    bytes[last_idx] ^= 0xFF;
    let tampered = VirtualFragment::create_with_data(bytes.len(), 0, 0, &bytes).unwrap();
    assert!(matches!(
        deencap.packet(&tampered).unwrap_err(),
        Error::InvalidCrc { .. }
    ));
}

#[test]
fn stale_reassembly_context_times_out_after_256_bbframes() {
    let encap = Encapsulator::new(1, 4).unwrap();
    let deencap = Deencapsulator::new(1).unwrap();
    let data: Vec<u8> = (0u8..100).collect();
    encap.receive_pdu(pdu(&data), Label::None, 0x0800, 0).unwrap();

    let first = encap.get_packet(30, 0).unwrap();
    assert!(matches!(
        deencap.packet(&first).unwrap(),
        DeencapEvent::FragmentAccepted { .. }
    ));

    for _ in 0..256 {
        deencap.new_bbframe();
    }

    let next = encap.get_packet(0, 0).unwrap();
    assert_eq!(Error::CtxNotInit(0), deencap.packet(&next).unwrap_err());
}

#[test]
fn get_packet_copy_yields_independent_buffer_with_identical_bytes() {
    let encap = Encapsulator::new(1, 4).unwrap();
    let data = [0x5Au8; 50];
    encap.receive_pdu(pdu(&data), Label::None, 0x0800, 0).unwrap();

    let copy = encap.get_packet_copy(0, 0).unwrap();
    assert_eq!(1, copy.active_windows());

    match PacketHeader::decode(&copy.as_vec()).unwrap() {
        DecodeResult::Header { header, .. } => {
            assert!(matches!(header, PacketHeader::Complete { .. }));
        }
        DecodeResult::Padding => panic!("expected a header"),
    }
}
