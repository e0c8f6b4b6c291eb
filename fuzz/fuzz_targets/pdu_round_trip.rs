#![no_main]

use arbitrary::Arbitrary;
use gse::{
    deencap::{DeencapEvent, Deencapsulator},
    encap::Encapsulator,
    header::Label,
    vfrag::VirtualFragment,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    pdu: Vec<u8>,
    label: Label,
    protocol_type: u16,
    packet_len: u16,
}

fuzz_target!(|input: Input| {
    if input.pdu.is_empty() || input.pdu.len() > 60_000 {
        return;
    }
    let protocol_type = input.protocol_type.max(0x0600);
    let packet_len = usize::from(input.packet_len).max(3);

    let Ok(vfrag) = VirtualFragment::create_with_data(input.pdu.len(), 16, 4, &input.pdu) else {
        return;
    };

    let encap = Encapsulator::new(1, 4).unwrap();
    let deencap = Deencapsulator::new(1).unwrap();
    if encap.receive_pdu(vfrag, input.label, protocol_type, 0).is_err() {
        return;
    }

    loop {
        let packet = match encap.get_packet(packet_len, 0) {
            Ok(packet) => packet,
            Err(_) => break,
        };
        match deencap.packet(&packet) {
            Ok(DeencapEvent::PduReceived {
                pdu,
                protocol_type: got_protocol,
                label: got_label,
                ..
            }) => {
                assert_eq!(input.pdu, pdu.as_vec());
                assert_eq!(protocol_type, got_protocol);
                assert_eq!(input.label, got_label);
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
});
