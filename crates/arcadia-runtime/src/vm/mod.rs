//! Register-based interpreter
//!
//! Executes procedure bytecode with a per-thread register file and a
//! call-state stack. The loop fetches one opcode from the current frame's
//! code buffer at the frame's cursor, decodes its operands through the
//! variable-length codecs, and dispatches: arithmetic/comparison/logic
//! through the per-kind operation tables, calls by pushing native markers
//! or bytecode frames. Execution is synchronous and non-preemptive; the
//! only suspension point is a nested call.

pub mod dispatch;
mod frame;

pub use frame::CallState;

use crate::bytecode::{Code, IndexKind, Opcode};
use crate::ops::{self, BinaryOp, UnaryOp};
use crate::procedure::{Procedure, ProcedureBody};
use crate::process::Process;
use crate::value::{ForeignProcedure, RuntimeError, Value};
use arcadia_config::RuntimeConfig;
use std::sync::Arc;

/// One logical interpreter thread: a register file plus a call-state
/// stack, exclusively owned by the execution session driving it.
#[derive(Debug)]
pub struct Thread {
    /// Register file, all slots Void at creation
    registers: Vec<Value>,
    /// Call-state stack; the top frame is the current call
    calls: Vec<CallState>,
    /// Depth at which call-stack growth is refused
    max_call_depth: usize,
}

impl Thread {
    /// Create a thread sized per the runtime configuration
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            registers: vec![Value::Void; config.registers_per_thread],
            calls: Vec::new(),
            max_call_depth: config.max_call_depth,
        }
    }

    /// Number of register slots
    pub fn number_of_registers(&self) -> usize {
        self.registers.len()
    }

    /// Read a register.
    ///
    /// Register references decoded from bytecode are not trusted: an
    /// out-of-range index fails with a value error.
    pub fn register(&self, index: u32) -> Result<&Value, RuntimeError> {
        let count = self.registers.len();
        self.registers
            .get(index as usize)
            .ok_or_else(|| register_out_of_range(index, count))
    }

    /// Overwrite a register
    pub fn set_register(&mut self, index: u32, value: Value) -> Result<(), RuntimeError> {
        let count = self.registers.len();
        let slot = self
            .registers
            .get_mut(index as usize)
            .ok_or_else(|| register_out_of_range(index, count))?;
        *slot = value;
        Ok(())
    }

    // ── Call-state stack ─────────────────────────────────────────────────

    /// Current call-stack depth
    pub fn call_depth(&self) -> usize {
        self.calls.len()
    }

    /// The current call, or `None` when the thread is idle
    pub fn current_call(&self) -> Option<&CallState> {
        self.calls.last()
    }

    /// Push a native-procedure-in-progress marker.
    ///
    /// `return_ip` is the caller's resume position at the time of the call.
    pub fn begin_foreign_procedure_call(
        &mut self,
        return_ip: usize,
        name: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.push_call(CallState::Foreign {
            return_ip,
            name: name.into(),
        })
    }

    /// Push a bytecode frame; execution starts at the beginning of the
    /// callee's code.
    pub fn begin_procedure_call(
        &mut self,
        procedure: Arc<Procedure>,
        return_register: Option<u32>,
    ) -> Result<(), RuntimeError> {
        if procedure.code().is_none() {
            return Err(RuntimeError::TypeInvalid {
                msg: format!(
                    "procedure '{}' has no bytecode body",
                    procedure.unqualified_name()
                ),
            });
        }
        self.push_call(CallState::Procedure {
            procedure,
            ip: 0,
            return_register,
        })
    }

    /// Pop the top frame unconditionally
    pub fn end_call(&mut self) -> Option<CallState> {
        self.calls.pop()
    }

    fn push_call(&mut self, frame: CallState) -> Result<(), RuntimeError> {
        if self.calls.len() >= self.max_call_depth {
            return Err(RuntimeError::AllocationFailed {
                msg: format!("call stack depth limit {} reached", self.max_call_depth),
            });
        }
        self.calls
            .try_reserve(1)
            .map_err(|_| RuntimeError::AllocationFailed {
                msg: "call stack growth".to_string(),
            })?;
        self.calls.push(frame);
        Ok(())
    }

    // ── Execution ────────────────────────────────────────────────────────

    /// Execute one procedure to completion, including all calls it makes
    /// transitively.
    ///
    /// Arguments are copied into registers `0..n` for bytecode bodies.
    /// Returns the value delivered by a `Return` instruction in the entry
    /// frame, or Void when the entry frame's cursor reaches the end of its
    /// code. On failure every frame pushed by this session has been popped.
    pub fn execute_procedure(
        &mut self,
        process: &Process,
        procedure: &Arc<Procedure>,
        arguments: &[Value],
    ) -> Result<Value, RuntimeError> {
        if arguments.len() != procedure.arity() {
            return Err(RuntimeError::ArityInvalid {
                msg: format!(
                    "procedure '{}' expects {} arguments, got {}",
                    procedure.unqualified_name(),
                    procedure.arity(),
                    arguments.len()
                ),
            });
        }

        let entry_depth = self.calls.len();
        match procedure.body() {
            ProcedureBody::Foreign(foreign) => self.call_foreign(
                process,
                0,
                procedure.unqualified_name(),
                &foreign.clone(),
                arguments,
            ),
            ProcedureBody::Code(_) => {
                self.store_arguments(arguments)?;
                self.begin_procedure_call(Arc::clone(procedure), None)?;
                let result = self.dispatch_loop(process, entry_depth);
                if result.is_err() {
                    // Unwind: pop the frames this session pushed, once each
                    self.calls.truncate(entry_depth);
                }
                result
            }
        }
    }

    /// Fetch-decode-execute until the call stack returns to `entry_depth`
    fn dispatch_loop(
        &mut self,
        process: &Process,
        entry_depth: usize,
    ) -> Result<Value, RuntimeError> {
        loop {
            let (procedure, ip) = match self.calls.last() {
                Some(CallState::Procedure { procedure, ip, .. }) => (Arc::clone(procedure), *ip),
                Some(CallState::Foreign { name, .. }) => {
                    return Err(RuntimeError::StackCorruption {
                        msg: format!("current call is a native marker for '{}'", name),
                    })
                }
                None => {
                    return Err(RuntimeError::StackCorruption {
                        msg: "call stack is empty mid-session".to_string(),
                    })
                }
            };
            let code = procedure.code().ok_or_else(|| RuntimeError::StackCorruption {
                msg: "bytecode frame without a code body".to_string(),
            })?;

            // Frame completion: cursor reached the end of the body
            if ip >= code.len() {
                self.calls.pop();
                if self.calls.len() == entry_depth {
                    return Ok(Value::Void);
                }
                continue;
            }

            let mut cursor = ip;
            let byte = code.as_bytes()[cursor];
            let opcode =
                dispatch::decode_opcode(byte).ok_or_else(|| RuntimeError::ValueInvalid {
                    msg: format!("unrecognized opcode byte {:#04x} at offset {}", byte, cursor),
                })?;
            cursor += 1;

            match opcode {
                Opcode::Idle => {
                    self.set_current_ip(cursor);
                }

                Opcode::Negate | Opcode::Not => {
                    let op = unary_op(opcode).ok_or_else(|| bad_shape(opcode))?;
                    let target = decode_register_target(code, &mut cursor)?;
                    let (kind, index) = code.decode_index(&mut cursor)?;
                    let operand = self.resolve_operand(process, kind, index)?;
                    let value = ops::unary(op, &operand)?;
                    self.set_register(target, value)?;
                    self.set_current_ip(cursor);
                }

                Opcode::Invoke => {
                    let target = decode_register_target(code, &mut cursor)?;
                    let (callee_kind, callee_index) = code.decode_index(&mut cursor)?;
                    let callee = self.resolve_operand(process, callee_kind, callee_index)?;
                    let count = code.decode_count(&mut cursor)? as usize;
                    let mut arguments = Vec::new();
                    arguments
                        .try_reserve(count)
                        .map_err(|_| RuntimeError::AllocationFailed {
                            msg: format!("argument list of {} entries", count),
                        })?;
                    for _ in 0..count {
                        let (kind, index) = code.decode_index(&mut cursor)?;
                        arguments.push(self.resolve_operand(process, kind, index)?);
                    }
                    // The caller resumes after the whole instruction
                    self.set_current_ip(cursor);

                    match callee {
                        Value::Foreign(foreign) => {
                            let value = self.call_foreign(
                                process,
                                cursor,
                                "<foreign>",
                                &foreign,
                                &arguments,
                            )?;
                            self.set_register(target, value)?;
                        }
                        Value::Procedure(callee_procedure) => {
                            if arguments.len() != callee_procedure.arity() {
                                return Err(RuntimeError::ArityInvalid {
                                    msg: format!(
                                        "procedure '{}' expects {} arguments, got {}",
                                        callee_procedure.unqualified_name(),
                                        callee_procedure.arity(),
                                        arguments.len()
                                    ),
                                });
                            }
                            match callee_procedure.body() {
                                ProcedureBody::Foreign(foreign) => {
                                    let foreign = foreign.clone();
                                    let name =
                                        callee_procedure.unqualified_name().to_string();
                                    let value = self.call_foreign(
                                        process, cursor, &name, &foreign, &arguments,
                                    )?;
                                    self.set_register(target, value)?;
                                }
                                ProcedureBody::Code(_) => {
                                    self.store_arguments(&arguments)?;
                                    self.begin_procedure_call(
                                        Arc::clone(&callee_procedure),
                                        Some(target),
                                    )?;
                                    // Control transfer: the next iteration
                                    // begins executing the callee's code
                                }
                            }
                        }
                        other => {
                            return Err(RuntimeError::TypeInvalid {
                                msg: format!(
                                    "callee of kind {} is not invocable",
                                    other.kind_name()
                                ),
                            })
                        }
                    }
                }

                Opcode::Return => {
                    let (kind, index) = code.decode_index(&mut cursor)?;
                    let value = self.resolve_operand(process, kind, index)?;
                    let finished = self.calls.pop();
                    if self.calls.len() == entry_depth {
                        return Ok(value);
                    }
                    if let Some(CallState::Procedure {
                        return_register: Some(register),
                        ..
                    }) = finished
                    {
                        self.set_register(register, value)?;
                    }
                }

                Opcode::Raise => {
                    let (kind, index) = code.decode_index(&mut cursor)?;
                    let value = self.resolve_operand(process, kind, index)?;
                    return Err(RuntimeError::Raised {
                        message: value.to_string(),
                    });
                }

                other => {
                    let op = binary_op(other).ok_or_else(|| bad_shape(other))?;
                    let target = decode_register_target(code, &mut cursor)?;
                    let (kind1, index1) = code.decode_index(&mut cursor)?;
                    let (kind2, index2) = code.decode_index(&mut cursor)?;
                    let operand1 = self.resolve_operand(process, kind1, index1)?;
                    let operand2 = self.resolve_operand(process, kind2, index2)?;
                    let value = ops::binary(op, &operand1, &operand2)?;
                    self.set_register(target, value)?;
                    self.set_current_ip(cursor);
                }
            }
        }
    }

    /// Run a native procedure with the push/call/pop-exactly-once
    /// discipline, detecting frame-discipline violations.
    fn call_foreign(
        &mut self,
        process: &Process,
        return_ip: usize,
        name: &str,
        foreign: &ForeignProcedure,
        arguments: &[Value],
    ) -> Result<Value, RuntimeError> {
        self.begin_foreign_procedure_call(return_ip, name)?;
        let expected_depth = self.calls.len();
        let outcome = foreign.call(process, self, arguments);
        if self.calls.len() != expected_depth {
            self.calls.truncate(expected_depth.saturating_sub(1));
            return Err(RuntimeError::StackCorruption {
                msg: format!(
                    "native procedure '{}' returned with an unbalanced call stack",
                    name
                ),
            });
        }
        self.end_call();
        outcome
    }

    /// Resolve an operand reference to a value copy
    fn resolve_operand(
        &self,
        process: &Process,
        kind: IndexKind,
        index: u32,
    ) -> Result<Value, RuntimeError> {
        match kind {
            IndexKind::Constant => Ok(process.constants().get_at(index)?.clone()),
            IndexKind::Register => Ok(self.register(index)?.clone()),
            IndexKind::Invalid | IndexKind::Reserved => Err(RuntimeError::ValueInvalid {
                msg: format!("operand uses the {:?} index kind", kind),
            }),
        }
    }

    /// Copy call arguments into the low registers for a bytecode callee
    fn store_arguments(&mut self, arguments: &[Value]) -> Result<(), RuntimeError> {
        for (index, value) in arguments.iter().enumerate() {
            self.set_register(index as u32, value.clone())?;
        }
        Ok(())
    }

    fn set_current_ip(&mut self, cursor: usize) {
        if let Some(CallState::Procedure { ip, .. }) = self.calls.last_mut() {
            *ip = cursor;
        }
    }
}

/// Decode a target operand, which must reference a register
fn decode_register_target(code: &Code, cursor: &mut usize) -> Result<u32, RuntimeError> {
    let (kind, index) = code.decode_index(cursor)?;
    if kind != IndexKind::Register {
        return Err(RuntimeError::ArityInvalid {
            msg: format!("target operand must reference a register, got {:?}", kind),
        });
    }
    Ok(index)
}

fn binary_op(opcode: Opcode) -> Option<BinaryOp> {
    match opcode {
        Opcode::Add => Some(BinaryOp::Add),
        Opcode::Subtract => Some(BinaryOp::Subtract),
        Opcode::Multiply => Some(BinaryOp::Multiply),
        Opcode::Divide => Some(BinaryOp::Divide),
        Opcode::And => Some(BinaryOp::And),
        Opcode::Or => Some(BinaryOp::Or),
        Opcode::Concatenate => Some(BinaryOp::Concatenate),
        Opcode::IsEqualTo => Some(BinaryOp::EqualTo),
        Opcode::IsNotEqualTo => Some(BinaryOp::NotEqualTo),
        Opcode::IsLowerThan => Some(BinaryOp::LowerThan),
        Opcode::IsLowerThanOrEqualTo => Some(BinaryOp::LowerThanOrEqualTo),
        Opcode::IsGreaterThan => Some(BinaryOp::GreaterThan),
        Opcode::IsGreaterThanOrEqualTo => Some(BinaryOp::GreaterThanOrEqualTo),
        _ => None,
    }
}

fn unary_op(opcode: Opcode) -> Option<UnaryOp> {
    match opcode {
        Opcode::Negate => Some(UnaryOp::Negate),
        Opcode::Not => Some(UnaryOp::Not),
        _ => None,
    }
}

fn bad_shape(opcode: Opcode) -> RuntimeError {
    RuntimeError::ValueInvalid {
        msg: format!("opcode {:?} has no operand shape", opcode),
    }
}

fn register_out_of_range(index: u32, count: usize) -> RuntimeError {
    RuntimeError::ValueInvalid {
        msg: format!("register index {} out of range ({} registers)", index, count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small_thread() -> Thread {
        Thread::new(&RuntimeConfig {
            registers_per_thread: 8,
            max_call_depth: 4,
            validate_bytecode: true,
        })
    }

    #[test]
    fn test_registers_start_void() {
        let thread = small_thread();
        assert_eq!(thread.number_of_registers(), 8);
        for index in 0..8 {
            assert_eq!(thread.register(index).unwrap(), &Value::Void);
        }
    }

    #[test]
    fn test_register_bounds_checked() {
        let mut thread = small_thread();
        assert!(thread.register(8).is_err());
        assert!(thread.set_register(8, Value::Void).is_err());
        thread.set_register(3, Value::Integer64(1)).unwrap();
        assert_eq!(thread.register(3).unwrap(), &Value::Integer64(1));
    }

    #[test]
    fn test_call_stack_balance() {
        let mut thread = small_thread();
        assert_eq!(thread.call_depth(), 0);
        assert!(thread.current_call().is_none());

        thread.begin_foreign_procedure_call(0, "outer").unwrap();
        thread.begin_foreign_procedure_call(5, "inner").unwrap();
        assert_eq!(thread.call_depth(), 2);
        assert_eq!(thread.current_call().unwrap().name(), "inner");

        thread.end_call();
        assert_eq!(thread.current_call().unwrap().name(), "outer");
        thread.end_call();
        assert_eq!(thread.call_depth(), 0);
        assert!(thread.end_call().is_none());
    }

    #[test]
    fn test_call_depth_limit() {
        let mut thread = small_thread();
        for depth in 0..4 {
            thread
                .begin_foreign_procedure_call(depth, "nested")
                .unwrap();
        }
        let result = thread.begin_foreign_procedure_call(4, "overflow");
        assert!(matches!(
            result,
            Err(RuntimeError::AllocationFailed { .. })
        ));
        assert_eq!(thread.call_depth(), 4);
    }

    #[test]
    fn test_begin_procedure_call_requires_code_body() {
        let mut thread = small_thread();
        let native = Arc::new(Procedure::with_foreign(
            "native",
            vec![],
            ForeignProcedure::new(|_, _, _| Ok(Value::Void)),
        ));
        let result = thread.begin_procedure_call(native, None);
        assert!(matches!(result, Err(RuntimeError::TypeInvalid { .. })));
    }
}
