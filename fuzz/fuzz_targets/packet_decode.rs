#![no_main]

use gse::header::PacketHeader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = PacketHeader::decode(data);
});
