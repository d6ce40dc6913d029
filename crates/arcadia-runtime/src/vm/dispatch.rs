//! Optimized instruction dispatch for the interpreter
//!
//! Uses a static lookup table for O(1) opcode decoding instead of
//! match-based dispatch, reducing branch mispredictions in the hot loop.

use crate::bytecode::Opcode;

/// Static dispatch table mapping byte values to optional Opcodes.
/// Indexed by the raw u8 opcode byte for O(1) lookup.
static OPCODE_TABLE: [Option<Opcode>; 256] = {
    let mut table: [Option<Opcode>; 256] = [None; 256];

    // Special (0x01)
    table[0x01] = Some(Opcode::Idle);

    // Arithmetic (0x10-0x14)
    table[0x10] = Some(Opcode::Add);
    table[0x11] = Some(Opcode::Subtract);
    table[0x12] = Some(Opcode::Multiply);
    table[0x13] = Some(Opcode::Divide);
    table[0x14] = Some(Opcode::Negate);

    // Logic (0x20-0x22)
    table[0x20] = Some(Opcode::And);
    table[0x21] = Some(Opcode::Or);
    table[0x22] = Some(Opcode::Not);

    // Strings (0x30)
    table[0x30] = Some(Opcode::Concatenate);

    // Comparison (0x40-0x45)
    table[0x40] = Some(Opcode::IsEqualTo);
    table[0x41] = Some(Opcode::IsNotEqualTo);
    table[0x42] = Some(Opcode::IsLowerThan);
    table[0x43] = Some(Opcode::IsLowerThanOrEqualTo);
    table[0x44] = Some(Opcode::IsGreaterThan);
    table[0x45] = Some(Opcode::IsGreaterThanOrEqualTo);

    // Calls (0x50-0x52)
    table[0x50] = Some(Opcode::Invoke);
    table[0x51] = Some(Opcode::Return);
    table[0x52] = Some(Opcode::Raise);

    table
};

/// Decode an opcode byte via the static table
#[inline(always)]
pub fn decode_opcode(byte: u8) -> Option<Opcode> {
    OPCODE_TABLE[byte as usize]
}
