//! Arbitrary bytes as a read response PDU must never panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use plc_exporter::ModbusPdu;

#[derive(Debug, Arbitrary)]
struct Input {
    function: u8,
    quantity: u16,
    response: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Ok(pdu) = ModbusPdu::from_slice(&input.response) else {
        return;
    };
    if let Ok(words) = pdu.parse_registers(input.function, input.quantity) {
        assert_eq!(words.len(), input.quantity as usize);
    }
    if let Ok(bits) = pdu.parse_bits(input.function, input.quantity) {
        assert_eq!(bits.len(), input.quantity as usize);
    }
});
