//! Bytecode validation
//!
//! Offline structural walk of one procedure body, for the trust boundary
//! where bytecode provenance is not guaranteed (loaded images, embedder
//! input). The interpreter's own accessors stay checked; this pass lets a
//! host reject a malformed body wholesale before registering it.
//!
//! Checks:
//! - every opcode byte is assigned
//! - every operand encoding is well-formed and in-bounds of the buffer
//! - register references are below the configured register count
//! - constant references are below the constant-pool size
//! - targets (including Invoke targets) reference registers
//! - no operand uses the Invalid or Reserved index kind

use super::{Code, IndexKind, Opcode};
use thiserror::Error;

/// Bounds the validator checks references against
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    /// Register-file size of the executing thread
    pub register_count: usize,
    /// Constant-pool size at validation time
    pub constant_count: usize,
}

/// Structural defect found in a procedure body
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown opcode byte {opcode:#04x} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    #[error("malformed operand at offset {offset}: {reason}")]
    MalformedOperand { offset: usize, reason: String },

    #[error("register index {index} at offset {offset} out of range ({limit} registers)")]
    RegisterOutOfRange {
        offset: usize,
        index: u32,
        limit: usize,
    },

    #[error("constant index {index} at offset {offset} out of range (pool holds {limit})")]
    ConstantOutOfRange {
        offset: usize,
        index: u32,
        limit: usize,
    },

    #[error("target operand at offset {offset} must reference a register, got {kind:?}")]
    TargetNotRegister { offset: usize, kind: IndexKind },

    #[error("operand at offset {offset} uses the {kind:?} index kind")]
    ReservedKind { offset: usize, kind: IndexKind },
}

/// Validate one procedure body against the given limits
pub fn validate(code: &Code, limits: &ValidationLimits) -> Result<(), ValidationError> {
    let mut cursor = 0;
    while cursor < code.len() {
        let instruction_offset = cursor;
        let byte = code.as_bytes()[cursor];
        let opcode = Opcode::try_from(byte).map_err(|_| ValidationError::UnknownOpcode {
            offset: instruction_offset,
            opcode: byte,
        })?;
        cursor += 1;

        match opcode {
            Opcode::Idle => {}

            Opcode::Negate | Opcode::Not => {
                check_target(code, &mut cursor, limits)?;
                check_operand(code, &mut cursor, limits)?;
            }

            Opcode::Invoke => {
                check_target(code, &mut cursor, limits)?;
                check_operand(code, &mut cursor, limits)?; // callee
                let count = decode_count(code, &mut cursor)?;
                for _ in 0..count {
                    check_operand(code, &mut cursor, limits)?;
                }
            }

            Opcode::Return | Opcode::Raise => {
                check_operand(code, &mut cursor, limits)?;
            }

            // Remaining opcodes are two-operand operations
            _ => {
                check_target(code, &mut cursor, limits)?;
                check_operand(code, &mut cursor, limits)?;
                check_operand(code, &mut cursor, limits)?;
            }
        }
    }
    Ok(())
}

fn decode_index(
    code: &Code,
    cursor: &mut usize,
) -> Result<(usize, IndexKind, u32), ValidationError> {
    let offset = *cursor;
    let (kind, index) =
        code.decode_index(cursor)
            .map_err(|error| ValidationError::MalformedOperand {
                offset,
                reason: error.to_string(),
            })?;
    Ok((offset, kind, index))
}

fn decode_count(code: &Code, cursor: &mut usize) -> Result<u32, ValidationError> {
    let offset = *cursor;
    code.decode_count(cursor)
        .map_err(|error| ValidationError::MalformedOperand {
            offset,
            reason: error.to_string(),
        })
}

/// A write target: must be a register, in range
fn check_target(
    code: &Code,
    cursor: &mut usize,
    limits: &ValidationLimits,
) -> Result<(), ValidationError> {
    let (offset, kind, index) = decode_index(code, cursor)?;
    if kind != IndexKind::Register {
        return Err(ValidationError::TargetNotRegister { offset, kind });
    }
    check_register(offset, index, limits)
}

/// A read operand: constant or register, in range
fn check_operand(
    code: &Code,
    cursor: &mut usize,
    limits: &ValidationLimits,
) -> Result<(), ValidationError> {
    let (offset, kind, index) = decode_index(code, cursor)?;
    match kind {
        IndexKind::Register => check_register(offset, index, limits),
        IndexKind::Constant => {
            if (index as usize) < limits.constant_count {
                Ok(())
            } else {
                Err(ValidationError::ConstantOutOfRange {
                    offset,
                    index,
                    limit: limits.constant_count,
                })
            }
        }
        IndexKind::Invalid | IndexKind::Reserved => {
            Err(ValidationError::ReservedKind { offset, kind })
        }
    }
}

fn check_register(
    offset: usize,
    index: u32,
    limits: &ValidationLimits,
) -> Result<(), ValidationError> {
    if (index as usize) < limits.register_count {
        Ok(())
    } else {
        Err(ValidationError::RegisterOutOfRange {
            offset,
            index,
            limit: limits.register_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIMITS: ValidationLimits = ValidationLimits {
        register_count: 16,
        constant_count: 2,
    };

    fn add_instruction() -> Code {
        let mut code = Code::new();
        code.emit(Opcode::Add).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();
        code.append_index(IndexKind::Constant, 0).unwrap();
        code.append_index(IndexKind::Constant, 1).unwrap();
        code
    }

    #[test]
    fn test_accepts_well_formed_body() {
        let mut code = add_instruction();
        code.emit(Opcode::Return).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();
        assert_eq!(validate(&code, &LIMITS), Ok(()));
    }

    #[test]
    fn test_accepts_invoke_shape() {
        let mut code = Code::new();
        code.emit(Opcode::Invoke).unwrap();
        code.append_index(IndexKind::Register, 1).unwrap();
        code.append_index(IndexKind::Constant, 0).unwrap();
        code.append_count(2).unwrap();
        code.append_index(IndexKind::Register, 2).unwrap();
        code.append_index(IndexKind::Register, 3).unwrap();
        assert_eq!(validate(&code, &LIMITS), Ok(()));
    }

    #[test]
    fn test_rejects_unknown_opcode() {
        let mut code = Code::new();
        code.append(&[0x7E]).unwrap();
        assert!(matches!(
            validate(&code, &LIMITS),
            Err(ValidationError::UnknownOpcode {
                offset: 0,
                opcode: 0x7E
            })
        ));
    }

    #[test]
    fn test_rejects_truncated_operand() {
        let mut code = Code::new();
        code.emit(Opcode::Return).unwrap();
        assert!(matches!(
            validate(&code, &LIMITS),
            Err(ValidationError::MalformedOperand { offset: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_constant_target() {
        let mut code = Code::new();
        code.emit(Opcode::Add).unwrap();
        code.append_index(IndexKind::Constant, 0).unwrap();
        code.append_index(IndexKind::Constant, 0).unwrap();
        code.append_index(IndexKind::Constant, 1).unwrap();
        assert!(matches!(
            validate(&code, &LIMITS),
            Err(ValidationError::TargetNotRegister { offset: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_references() {
        let mut code = Code::new();
        code.emit(Opcode::Not).unwrap();
        code.append_index(IndexKind::Register, 99).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();
        assert!(matches!(
            validate(&code, &LIMITS),
            Err(ValidationError::RegisterOutOfRange { index: 99, .. })
        ));

        let mut code = Code::new();
        code.emit(Opcode::Raise).unwrap();
        code.append_index(IndexKind::Constant, 5).unwrap();
        assert!(matches!(
            validate(&code, &LIMITS),
            Err(ValidationError::ConstantOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn test_rejects_reserved_kind() {
        let mut code = Code::new();
        code.emit(Opcode::Return).unwrap();
        code.append_index(IndexKind::Reserved, 0).unwrap();
        assert!(matches!(
            validate(&code, &LIMITS),
            Err(ValidationError::ReservedKind { .. })
        ));
    }
}
