//! Bytecode disassembler
//!
//! Converts a procedure body back to a human-readable assembly-like
//! listing. Used for debugging and tests.

use super::{Code, IndexKind, Opcode};
use crate::constants::ConstantPool;
use std::fmt::Write;

/// Disassemble one procedure body against the constant pool it references.
///
/// # Format
/// ```text
/// === Constants ===
/// 0: Integer64(2)
/// 1: Integer64(3)
///
/// === Instructions ===
/// 0000  Add r0, c0, c1
/// 0007  Return r0
/// ```
pub fn disassemble(code: &Code, constants: &ConstantPool) -> String {
    let mut output = String::new();

    if !constants.is_empty() {
        writeln!(output, "=== Constants ===").unwrap();
        for (index, constant) in constants.values().iter().enumerate() {
            writeln!(output, "{}: {:?}", index, constant).unwrap();
        }
        writeln!(output).unwrap();
    }

    writeln!(output, "=== Instructions ===").unwrap();
    let mut offset = 0;
    while offset < code.len() {
        let (line, resynchronized) = disassemble_instruction(code, &mut offset);
        writeln!(output, "{}", line).unwrap();
        if !resynchronized {
            // A malformed operand leaves no way to find the next
            // instruction boundary in a variable-length stream
            break;
        }
    }

    output
}

/// Disassemble a single instruction at `offset`, advancing it past the
/// instruction and its operands. The second return is false when the
/// stream could not be decoded further.
fn disassemble_instruction(code: &Code, offset: &mut usize) -> (String, bool) {
    let start_offset = *offset;

    let byte = code.as_bytes()[*offset];
    let opcode = match Opcode::try_from(byte) {
        Ok(op) => op,
        Err(_) => {
            return (
                format!("{:04}  <invalid opcode: {:#04x}>", start_offset, byte),
                false,
            )
        }
    };
    *offset += 1;

    let operands = match operand_listing(code, offset, opcode) {
        Ok(operands) => operands,
        Err(reason) => {
            return (
                format!("{:04}  {:?} <{}>", start_offset, opcode, reason),
                false,
            )
        }
    };

    if operands.is_empty() {
        (format!("{:04}  {:?}", start_offset, opcode), true)
    } else {
        (
            format!("{:04}  {:?} {}", start_offset, opcode, operands.join(", ")),
            true,
        )
    }
}

fn operand_listing(
    code: &Code,
    offset: &mut usize,
    opcode: Opcode,
) -> Result<Vec<String>, String> {
    let mut operands = Vec::new();
    match opcode {
        Opcode::Idle => {}
        Opcode::Negate | Opcode::Not => {
            operands.push(index_operand(code, offset)?);
            operands.push(index_operand(code, offset)?);
        }
        Opcode::Return | Opcode::Raise => {
            operands.push(index_operand(code, offset)?);
        }
        Opcode::Invoke => {
            operands.push(index_operand(code, offset)?);
            operands.push(index_operand(code, offset)?);
            let count = code
                .decode_count(offset)
                .map_err(|_| "truncated count".to_string())?;
            operands.push(format!("#{}", count));
            for _ in 0..count {
                operands.push(index_operand(code, offset)?);
            }
        }
        // Remaining opcodes are two-operand operations
        _ => {
            operands.push(index_operand(code, offset)?);
            operands.push(index_operand(code, offset)?);
            operands.push(index_operand(code, offset)?);
        }
    }
    Ok(operands)
}

fn index_operand(code: &Code, offset: &mut usize) -> Result<String, String> {
    let (kind, index) = code
        .decode_index(offset)
        .map_err(|_| "truncated operand".to_string())?;
    Ok(match kind {
        IndexKind::Register => format!("r{}", index),
        IndexKind::Constant => format!("c{}", index),
        IndexKind::Invalid => format!("invalid:{}", index),
        IndexKind::Reserved => format!("reserved:{}", index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disassemble_add_and_return() {
        let mut constants = ConstantPool::new();
        constants.get_or_create_integer64(2).unwrap();
        constants.get_or_create_integer64(3).unwrap();

        let mut code = Code::new();
        code.emit(Opcode::Add).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();
        code.append_index(IndexKind::Constant, 0).unwrap();
        code.append_index(IndexKind::Constant, 1).unwrap();
        code.emit(Opcode::Return).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();

        let listing = disassemble(&code, &constants);
        assert_eq!(
            listing,
            "=== Constants ===\n\
             0: Integer64(2)\n\
             1: Integer64(3)\n\
             \n\
             === Instructions ===\n\
             0000  Add r0, c0, c1\n\
             0004  Return r0\n"
        );
    }

    #[test]
    fn test_disassemble_invoke() {
        let constants = ConstantPool::new();
        let mut code = Code::new();
        code.emit(Opcode::Invoke).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();
        code.append_index(IndexKind::Register, 1).unwrap();
        code.append_count(2).unwrap();
        code.append_index(IndexKind::Register, 2).unwrap();
        code.append_index(IndexKind::Register, 3).unwrap();

        let listing = disassemble(&code, &constants);
        assert_eq!(
            listing,
            "=== Instructions ===\n0000  Invoke r0, r1, #2, r2, r3\n"
        );
    }

    #[test]
    fn test_disassemble_stops_at_corruption() {
        let constants = ConstantPool::new();
        let mut code = Code::new();
        code.append(&[0x7E, 0x01]).unwrap();

        let listing = disassemble(&code, &constants);
        assert_eq!(
            listing,
            "=== Instructions ===\n0000  <invalid opcode: 0x7e>\n"
        );
    }
}
