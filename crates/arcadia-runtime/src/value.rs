//! Runtime value representation
//!
//! Shared value representation for registers and the constant pool.
//! - Scalars (Void, Boolean, the integer kinds, Size, the real kinds):
//!   immediate values, copied by value
//! - Strings: heap-allocated, reference-counted (Arc<str>), immutable
//! - Procedures: shared handles to registered procedures
//! - Foreign: native procedure references (host closures)
//! - Objects: opaque shared handles into an externally managed heap,
//!   dispatching operations through the [`ObjectType`] trait

use crate::ops::{BinaryOp, UnaryOp};
use crate::procedure::Procedure;
use crate::process::Process;
use crate::vm::Thread;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Runtime error kinds raised by the codecs, the builders, and the
/// interpreter loop. Propagated as ordinary `Result`s; the call-state
/// frames pushed before a fallible operation are popped exactly once on
/// both the success and the failure path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// Wrong arity at a call site, or a target operand that resolved to a
    /// constant where a register was required
    #[error("Invalid number of arguments: {msg}")]
    ArityInvalid { msg: String },
    /// Operand or callee has a dynamic kind the opcode does not support
    #[error("Invalid argument type: {msg}")]
    TypeInvalid { msg: String },
    /// Malformed or out-of-range encoded value (index too large to encode,
    /// truncated buffer, unrecognized opcode byte)
    #[error("Invalid argument value: {msg}")]
    ValueInvalid { msg: String },
    /// Divisor operand is the zero value of its kind
    #[error("Division by zero")]
    DivisionByZero,
    /// A native call returned with an unbalanced call-state stack
    #[error("Call stack corrupted: {msg}")]
    StackCorruption { msg: String },
    /// Growth of a code buffer, the constant pool, or the call-state stack
    /// could not be satisfied
    #[error("Allocation failed: {msg}")]
    AllocationFailed { msg: String },
    /// A Raise instruction executed
    #[error("Raised: {message}")]
    Raised { message: String },
}

/// Native procedure callable from bytecode.
///
/// Receives the process context, the executing thread, and the resolved
/// argument values; the returned value is written to the invoke target by
/// the interpreter. A native may re-enter the interpreter through the
/// thread it is handed, but must return with the call-state stack at the
/// depth it was given.
#[derive(Clone)]
pub struct ForeignProcedure(
    Arc<dyn Fn(&Process, &mut Thread, &[Value]) -> Result<Value, RuntimeError> + Send + Sync>,
);

impl ForeignProcedure {
    pub fn new(
        function: impl Fn(&Process, &mut Thread, &[Value]) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self(Arc::new(function))
    }

    /// Invoke the native procedure
    pub fn call(
        &self,
        process: &Process,
        thread: &mut Thread,
        arguments: &[Value],
    ) -> Result<Value, RuntimeError> {
        (self.0)(process, thread, arguments)
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Operation slots for object values.
///
/// The interpreter consults the first operand's type for arithmetic,
/// comparison, and logic opcodes; for object operands that lookup is a
/// virtual call on this trait. A slot returning `None` is absent and the
/// opcode fails with a type error, mirroring a null table entry.
pub trait ObjectType: fmt::Debug + Send + Sync {
    /// Name of the object's dynamic type, used in error messages
    fn type_name(&self) -> &str;

    /// Binary operation slot. `other` is the already-resolved second operand.
    fn binary(&self, _op: BinaryOp, _other: &Value) -> Option<Result<Value, RuntimeError>> {
        None
    }

    /// Unary operation slot.
    fn unary(&self, _op: UnaryOp) -> Option<Result<Value, RuntimeError>> {
        None
    }
}

/// Shared handle to an externally managed object
pub type ObjectRef = Arc<dyn ObjectType>;

/// A runtime value: closed tagged union over the built-in scalar kinds
/// plus the shared-handle kinds.
#[derive(Clone)]
pub enum Value {
    Void,
    Boolean(bool),

    // Signed integers
    Integer8(i8),
    Integer16(i16),
    Integer32(i32),
    Integer64(i64),

    // Unsigned integers
    Natural8(u8),
    Natural16(u16),
    Natural32(u32),
    Natural64(u64),

    /// Unsigned machine-word size kind
    Size(usize),

    // Floating point
    Real32(f32),
    Real64(f64),

    /// Immutable shared string buffer
    String(Arc<str>),

    /// Handle to a registered procedure (native or bytecode body)
    Procedure(Arc<Procedure>),

    /// Native procedure reference
    Foreign(ForeignProcedure),

    /// Opaque object handle; operations dispatch through [`ObjectType`]
    Object(ObjectRef),
}

impl Value {
    /// Build a string value from any string-ish input
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Name of the value's dynamic kind, used in error messages
    pub fn kind_name(&self) -> &str {
        match self {
            Value::Void => "Void",
            Value::Boolean(_) => "Boolean",
            Value::Integer8(_) => "Integer8",
            Value::Integer16(_) => "Integer16",
            Value::Integer32(_) => "Integer32",
            Value::Integer64(_) => "Integer64",
            Value::Natural8(_) => "Natural8",
            Value::Natural16(_) => "Natural16",
            Value::Natural32(_) => "Natural32",
            Value::Natural64(_) => "Natural64",
            Value::Size(_) => "Size",
            Value::Real32(_) => "Real32",
            Value::Real64(_) => "Real64",
            Value::String(_) => "String",
            Value::Procedure(_) => "Procedure",
            Value::Foreign(_) => "ForeignProcedure",
            Value::Object(object) => object.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer8(a), Value::Integer8(b)) => a == b,
            (Value::Integer16(a), Value::Integer16(b)) => a == b,
            (Value::Integer32(a), Value::Integer32(b)) => a == b,
            (Value::Integer64(a), Value::Integer64(b)) => a == b,
            (Value::Natural8(a), Value::Natural8(b)) => a == b,
            (Value::Natural16(a), Value::Natural16(b)) => a == b,
            (Value::Natural32(a), Value::Natural32(b)) => a == b,
            (Value::Natural64(a), Value::Natural64(b)) => a == b,
            (Value::Size(a), Value::Size(b)) => a == b,
            (Value::Real32(a), Value::Real32(b)) => a == b,
            (Value::Real64(a), Value::Real64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // Handles compare by identity, not structure
            (Value::Procedure(a), Value::Procedure(b)) => Arc::ptr_eq(a, b),
            (Value::Foreign(a), Value::Foreign(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer8(n) => write!(f, "{}", n),
            Value::Integer16(n) => write!(f, "{}", n),
            Value::Integer32(n) => write!(f, "{}", n),
            Value::Integer64(n) => write!(f, "{}", n),
            Value::Natural8(n) => write!(f, "{}", n),
            Value::Natural16(n) => write!(f, "{}", n),
            Value::Natural32(n) => write!(f, "{}", n),
            Value::Natural64(n) => write!(f, "{}", n),
            Value::Size(n) => write!(f, "{}", n),
            Value::Real32(n) => write!(f, "{}", n),
            Value::Real64(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Procedure(p) => write!(f, "<procedure {}>", p.unqualified_name()),
            Value::Foreign(_) => write!(f, "<foreign procedure>"),
            Value::Object(object) => write!(f, "<{}>", object.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Integer8(n) => write!(f, "Integer8({})", n),
            Value::Integer16(n) => write!(f, "Integer16({})", n),
            Value::Integer32(n) => write!(f, "Integer32({})", n),
            Value::Integer64(n) => write!(f, "Integer64({})", n),
            Value::Natural8(n) => write!(f, "Natural8({})", n),
            Value::Natural16(n) => write!(f, "Natural16({})", n),
            Value::Natural32(n) => write!(f, "Natural32({})", n),
            Value::Natural64(n) => write!(f, "Natural64({})", n),
            Value::Size(n) => write!(f, "Size({})", n),
            Value::Real32(n) => write!(f, "Real32({})", n),
            Value::Real64(n) => write!(f, "Real64({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Procedure(p) => write!(f, "Procedure({:?})", p.unqualified_name()),
            Value::Foreign(_) => write!(f, "Foreign(<native>)"),
            Value::Object(object) => write!(f, "Object({:?})", object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_equality_is_by_value() {
        assert_eq!(Value::Integer64(42), Value::Integer64(42));
        assert_ne!(Value::Integer64(42), Value::Integer32(42));
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_eq!(Value::Void, Value::Void);
    }

    #[test]
    fn test_foreign_equality_is_by_identity() {
        let f = ForeignProcedure::new(|_, _, _| Ok(Value::Void));
        let g = ForeignProcedure::new(|_, _, _| Ok(Value::Void));
        assert_eq!(Value::Foreign(f.clone()), Value::Foreign(f));
        assert_ne!(
            Value::Foreign(ForeignProcedure::new(|_, _, _| Ok(Value::Void))),
            Value::Foreign(g)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Void.to_string(), "void");
        assert_eq!(Value::Natural8(7).to_string(), "7");
        assert_eq!(Value::string("hi").to_string(), "hi");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Size(0).kind_name(), "Size");
        assert_eq!(Value::Real64(0.0).kind_name(), "Real64");
    }
}
