//! Procedures
//!
//! A procedure pairs a name and parameter list with a body: either a
//! compiled [`Code`] buffer or a foreign (native) procedure reference.
//! Procedures are immutable once constructed and shared via `Arc` between
//! the symbol map, the call-state stack, and procedure-valued operands.

use crate::bytecode::Code;
use crate::value::ForeignProcedure;
use std::fmt;

/// Procedure body: native or compiled
#[derive(Clone)]
pub enum ProcedureBody {
    /// Implemented by the host, invoked through its calling convention
    Foreign(ForeignProcedure),
    /// Implemented in bytecode, executed by the interpreter loop
    Code(Code),
}

impl fmt::Debug for ProcedureBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureBody::Foreign(_) => write!(f, "Foreign(<native>)"),
            ProcedureBody::Code(code) => write!(f, "Code({} bytes)", code.len()),
        }
    }
}

/// An executable procedure
#[derive(Debug, Clone)]
pub struct Procedure {
    unqualified_name: String,
    parameter_names: Vec<String>,
    body: ProcedureBody,
}

impl Procedure {
    /// Create a bytecode procedure
    pub fn with_code(
        unqualified_name: impl Into<String>,
        parameter_names: Vec<String>,
        code: Code,
    ) -> Self {
        Self {
            unqualified_name: unqualified_name.into(),
            parameter_names,
            body: ProcedureBody::Code(code),
        }
    }

    /// Create a native procedure
    pub fn with_foreign(
        unqualified_name: impl Into<String>,
        parameter_names: Vec<String>,
        foreign: ForeignProcedure,
    ) -> Self {
        Self {
            unqualified_name: unqualified_name.into(),
            parameter_names,
            body: ProcedureBody::Foreign(foreign),
        }
    }

    pub fn unqualified_name(&self) -> &str {
        &self.unqualified_name
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Declared parameter count
    pub fn arity(&self) -> usize {
        self.parameter_names.len()
    }

    pub fn body(&self) -> &ProcedureBody {
        &self.body
    }

    /// The compiled body, if this is a bytecode procedure
    pub fn code(&self) -> Option<&Code> {
        match &self.body {
            ProcedureBody::Code(code) => Some(code),
            ProcedureBody::Foreign(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_procedure() {
        let procedure = Procedure::with_code("sum", vec!["a".into(), "b".into()], Code::new());
        assert_eq!(procedure.unqualified_name(), "sum");
        assert_eq!(procedure.arity(), 2);
        assert!(procedure.code().is_some());
    }

    #[test]
    fn test_foreign_procedure_has_no_code() {
        let foreign = ForeignProcedure::new(|_, _, _| Ok(Value::Void));
        let procedure = Procedure::with_foreign("host", vec![], foreign);
        assert!(procedure.code().is_none());
    }
}
