//! Process context
//!
//! The process-wide state the interpreter reads: the constant pool and
//! the global symbol map, plus the runtime configuration threads are
//! sized from. An explicit context object passed to every entry point:
//! construction replaces the startup phase, `Drop` the shutdown phase,
//! and double initialization is unrepresentable.
//!
//! Mutation happens only while the front-end lowers and registers
//! procedures; execution borrows the process immutably, so the pool and
//! symbol map are read-only for the duration of a session.

use crate::bytecode::{validate, ProgramImage, ValidationLimits};
use crate::constants::ConstantPool;
use crate::procedure::{Procedure, ProcedureBody};
use crate::value::RuntimeError;
use crate::vm::Thread;
use arcadia_config::RuntimeConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide interpreter state
#[derive(Debug)]
pub struct Process {
    constants: ConstantPool,
    symbols: HashMap<String, Arc<Procedure>>,
    config: RuntimeConfig,
}

impl Process {
    /// Create a process with the given configuration
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            constants: ConstantPool::new(),
            symbols: HashMap::new(),
            config,
        }
    }

    /// Create a process with the default configuration
    pub fn with_defaults() -> Self {
        Self::new(RuntimeConfig::default())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The shared constant pool
    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    /// Mutable pool access for the lowering phase
    pub fn constants_mut(&mut self) -> &mut ConstantPool {
        &mut self.constants
    }

    /// Create a thread sized per this process's configuration
    pub fn create_thread(&self) -> Thread {
        Thread::new(&self.config)
    }

    /// Register a procedure into the global symbol map.
    ///
    /// Bytecode bodies are validated against the configured register count
    /// and the pool's current size when `validate_bytecode` is on.
    /// Registering a name twice is an error; the map is append-only.
    pub fn register_procedure(
        &mut self,
        procedure: Procedure,
    ) -> Result<Arc<Procedure>, RuntimeError> {
        if self.symbols.contains_key(procedure.unqualified_name()) {
            return Err(RuntimeError::ValueInvalid {
                msg: format!(
                    "procedure '{}' is already registered",
                    procedure.unqualified_name()
                ),
            });
        }

        if self.config.validate_bytecode {
            if let ProcedureBody::Code(code) = procedure.body() {
                let limits = ValidationLimits {
                    register_count: self.config.registers_per_thread,
                    constant_count: self.constants.len(),
                };
                validate(code, &limits).map_err(|error| RuntimeError::ValueInvalid {
                    msg: format!(
                        "procedure '{}' failed validation: {}",
                        procedure.unqualified_name(),
                        error
                    ),
                })?;
            }
        }

        let shared = Arc::new(procedure);
        self.symbols
            .insert(shared.unqualified_name().to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Look up a registered procedure by name
    pub fn lookup_procedure(&self, name: &str) -> Option<&Arc<Procedure>> {
        self.symbols.get(name)
    }

    /// Number of registered procedures
    pub fn procedure_count(&self) -> usize {
        self.symbols.len()
    }

    /// Capture the lowered program as a serializable image.
    ///
    /// Native procedures have no serializable body and are skipped; the
    /// loading side re-registers its own natives.
    pub fn capture_image(&self) -> ProgramImage {
        let mut procedures: Vec<_> = self
            .symbols
            .values()
            .filter_map(|procedure| {
                procedure.code().map(|code| crate::bytecode::ImageProcedure {
                    name: procedure.unqualified_name().to_string(),
                    parameter_names: procedure.parameter_names().to_vec(),
                    code: code.clone(),
                })
            })
            .collect();
        procedures.sort_by(|a, b| a.name.cmp(&b.name));
        ProgramImage {
            constants: self.constants.values().to_vec(),
            procedures,
        }
    }

    /// Install a loaded program image.
    ///
    /// The pool indices baked into the image's bytecode must stay valid,
    /// so an image only loads into a process whose pool and symbol map are
    /// still empty.
    pub fn load_image(&mut self, image: ProgramImage) -> Result<(), RuntimeError> {
        if !self.constants.is_empty() || !self.symbols.is_empty() {
            return Err(RuntimeError::ValueInvalid {
                msg: "an image can only load into an empty process".to_string(),
            });
        }

        self.constants = ConstantPool::from_values(image.constants)?;
        for procedure in image.procedures {
            self.register_procedure(Procedure::with_code(
                procedure.name,
                procedure.parameter_names,
                procedure.code,
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Code, IndexKind, Opcode};
    use crate::value::{ForeignProcedure, Value};
    use pretty_assertions::assert_eq;

    fn sum_procedure(process: &mut Process) -> Procedure {
        let two = process.constants_mut().get_or_create_integer64(2).unwrap();
        let three = process.constants_mut().get_or_create_integer64(3).unwrap();
        let mut code = Code::new();
        code.emit(Opcode::Add).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();
        code.append_index(IndexKind::Constant, two).unwrap();
        code.append_index(IndexKind::Constant, three).unwrap();
        code.emit(Opcode::Return).unwrap();
        code.append_index(IndexKind::Register, 0).unwrap();
        Procedure::with_code("sum", vec![], code)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut process = Process::with_defaults();
        let procedure = sum_procedure(&mut process);
        process.register_procedure(procedure).unwrap();
        assert!(process.lookup_procedure("sum").is_some());
        assert!(process.lookup_procedure("missing").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut process = Process::with_defaults();
        let procedure = sum_procedure(&mut process);
        process.register_procedure(procedure).unwrap();
        let duplicate = sum_procedure(&mut process);
        assert!(process.register_procedure(duplicate).is_err());
    }

    #[test]
    fn test_validation_rejects_corrupt_body() {
        let mut process = Process::with_defaults();
        let mut code = Code::new();
        code.append(&[0x7E]).unwrap();
        let result = process.register_procedure(Procedure::with_code("bad", vec![], code));
        assert!(matches!(result, Err(RuntimeError::ValueInvalid { .. })));
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let config = RuntimeConfig {
            validate_bytecode: false,
            ..Default::default()
        };
        let mut process = Process::new(config);
        let mut code = Code::new();
        code.append(&[0x7E]).unwrap();
        assert!(process
            .register_procedure(Procedure::with_code("bad", vec![], code))
            .is_ok());
    }

    #[test]
    fn test_image_round_trip_through_process() {
        let mut process = Process::with_defaults();
        let procedure = sum_procedure(&mut process);
        process.register_procedure(procedure).unwrap();
        // Natives are skipped by capture
        process
            .register_procedure(Procedure::with_foreign(
                "host",
                vec![],
                ForeignProcedure::new(|_, _, _| Ok(Value::Void)),
            ))
            .unwrap();

        let image = process.capture_image();
        assert_eq!(image.procedures.len(), 1);

        let bytes = image.to_bytes().unwrap();
        let mut restored = Process::with_defaults();
        restored
            .load_image(ProgramImage::from_bytes(&bytes).unwrap())
            .unwrap();

        assert_eq!(restored.constants().len(), process.constants().len());
        assert!(restored.lookup_procedure("sum").is_some());
    }

    #[test]
    fn test_image_requires_empty_process() {
        let mut process = Process::with_defaults();
        process.constants_mut().get_or_create_void().unwrap();
        let result = process.load_image(ProgramImage::default());
        assert!(result.is_err());
    }
}
