#![no_main]

use arbitrary::Arbitrary;
use gse::{encap::Encapsulator, header::Label, refrag::refrag, vfrag::VirtualFragment};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    pdu: Vec<u8>,
    label: Label,
    protocol_type: u16,
    split_at: u16,
}

fuzz_target!(|input: Input| {
    if input.pdu.is_empty() || input.pdu.len() > 60_000 {
        return;
    }
    let protocol_type = input.protocol_type.max(0x0600);

    let Ok(vfrag) = VirtualFragment::create_with_data(input.pdu.len(), 16, 4, &input.pdu) else {
        return;
    };

    let encap = Encapsulator::new(1, 4).unwrap();
    if encap.receive_pdu(vfrag, input.label, protocol_type, 0).is_err() {
        return;
    }
    let Ok(mut packet) = encap.get_packet(0, 0) else {
        return;
    };

    // Never panics, whatever split point is requested: `refrag` rejects
    // out-of-range points with an `Err`, leaving `packet` untouched.
    let _ = refrag(&mut packet, 16, 4, 0, usize::from(input.split_at));
});
