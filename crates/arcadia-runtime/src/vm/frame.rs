//! Call-state frames
//!
//! Each entry on a thread's call-state stack is one activation record:
//! either a marker for a native procedure in progress, or a bytecode frame
//! carrying its own instruction cursor. Stack order encodes the caller
//! chain: the frame below is always the caller.
//!
//! ## Lifecycle
//!
//! ```text
//! Invoke (foreign callee):   push Foreign -> native runs -> pop
//! Invoke (bytecode callee):  push Procedure(ip=0) -> loop executes it
//! Return / cursor at end:    pop Procedure, caller resumes at its cursor
//! failure unwind:            every frame pushed since session entry is
//!                            popped exactly once
//! ```

use crate::procedure::Procedure;
use std::sync::Arc;

/// One activation record on the call-state stack
#[derive(Debug, Clone)]
pub enum CallState {
    /// A native procedure is in progress.
    ///
    /// `return_ip` records the caller's resume position at the time of the
    /// call; the caller's own frame keeps the authoritative cursor, so this
    /// field exists for inspection (backtraces), not control flow.
    Foreign {
        return_ip: usize,
        /// Callee name for diagnostics, when known
        name: String,
    },

    /// A bytecode procedure frame.
    Procedure {
        /// The procedure being executed; its body is always `Code`
        procedure: Arc<Procedure>,
        /// Cursor into the procedure's code buffer; the frame is complete
        /// when this reaches the code length
        ip: usize,
        /// Register recorded by the matching Invoke to receive the value a
        /// Return instruction delivers; `None` for session entry frames
        return_register: Option<u32>,
    },
}

impl CallState {
    /// The executing procedure's name, for diagnostics
    pub fn name(&self) -> &str {
        match self {
            CallState::Foreign { name, .. } => name,
            CallState::Procedure { procedure, .. } => procedure.unqualified_name(),
        }
    }

    /// Whether this frame marks a native procedure in progress
    pub fn is_foreign(&self) -> bool {
        matches!(self, CallState::Foreign { .. })
    }
}
