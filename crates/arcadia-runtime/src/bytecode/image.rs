//! Program image serialization
//!
//! A [`ProgramImage`] captures a lowered program (the constant pool plus
//! the bytecode procedures) in a binary form a host can persist and
//! reload. Only pool literals (void, booleans, integers, strings) are
//! serializable; procedure, foreign, and object values never enter the
//! pool through the interning surface.

use super::Code;
use crate::value::Value;

/// Current image format version
///
/// Incremented when the format changes in a backward-incompatible way;
/// images with a different version are rejected at load.
pub const IMAGE_VERSION: u16 = 1;

const MAGIC: &[u8; 4] = b"ARC\0";

// Constant tags
const TAG_VOID: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_INTEGER64: u8 = 0x02;
const TAG_STRING: u8 = 0x03;

/// One serialized procedure: name, parameter names, and body bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ImageProcedure {
    pub name: String,
    pub parameter_names: Vec<String>,
    pub code: Code,
}

/// A serializable lowered program
#[derive(Debug, Clone, Default)]
pub struct ProgramImage {
    /// Constant-pool values, in pool order
    pub constants: Vec<Value>,
    /// Bytecode procedures
    pub procedures: Vec<ImageProcedure>,
}

impl ProgramImage {
    /// Serialize to the binary image format
    ///
    /// Format:
    /// - Header: Magic "ARC\0" + version u16
    /// - Constants: count u32 + tagged values
    /// - Procedures: count u32 + (name + parameter names + code bytes) each
    ///
    /// All multi-byte fields are big-endian.
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&IMAGE_VERSION.to_be_bytes());

        bytes.extend_from_slice(&(self.constants.len() as u32).to_be_bytes());
        for value in &self.constants {
            serialize_constant(value, &mut bytes)?;
        }

        bytes.extend_from_slice(&(self.procedures.len() as u32).to_be_bytes());
        for procedure in &self.procedures {
            serialize_name(&procedure.name, &mut bytes)?;
            let parameter_count =
                u16::try_from(procedure.parameter_names.len()).map_err(|_| {
                    format!(
                        "procedure '{}' has too many parameters to serialize",
                        procedure.name
                    )
                })?;
            bytes.extend_from_slice(&parameter_count.to_be_bytes());
            for parameter in &procedure.parameter_names {
                serialize_name(parameter, &mut bytes)?;
            }
            bytes.extend_from_slice(&(procedure.code.len() as u32).to_be_bytes());
            bytes.extend_from_slice(procedure.code.as_bytes());
        }

        Ok(bytes)
    }

    /// Deserialize from the binary image format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 6 {
            return Err("invalid image: too short".to_string());
        }
        if &bytes[0..4] != MAGIC {
            return Err(
                "invalid image: bad magic number, this may not be an Arcadia image".to_string(),
            );
        }
        let version = u16::from_be_bytes([bytes[4], bytes[5]]);
        if version != IMAGE_VERSION {
            return Err(format!(
                "image version mismatch: file has version {}, this runtime supports version {}",
                version, IMAGE_VERSION
            ));
        }

        let mut offset = 6;

        let constant_count = read_u32(bytes, &mut offset, "constants section")? as usize;
        let mut constants = Vec::with_capacity(constant_count.min(1024));
        for _ in 0..constant_count {
            constants.push(deserialize_constant(bytes, &mut offset)?);
        }

        let procedure_count = read_u32(bytes, &mut offset, "procedures section")? as usize;
        let mut procedures = Vec::with_capacity(procedure_count.min(1024));
        for _ in 0..procedure_count {
            let name = read_name(bytes, &mut offset)?;
            let parameter_count = read_u16(bytes, &mut offset, "parameter count")? as usize;
            let mut parameter_names = Vec::with_capacity(parameter_count.min(256));
            for _ in 0..parameter_count {
                parameter_names.push(read_name(bytes, &mut offset)?);
            }
            let code_len = read_u32(bytes, &mut offset, "code length")? as usize;
            if offset + code_len > bytes.len() {
                return Err("invalid image: code section truncated".to_string());
            }
            let mut code = Code::new();
            code.append(&bytes[offset..offset + code_len])
                .map_err(|error| error.to_string())?;
            offset += code_len;
            procedures.push(ImageProcedure {
                name,
                parameter_names,
                code,
            });
        }

        if offset != bytes.len() {
            return Err(format!(
                "invalid image: {} trailing bytes after the procedures section",
                bytes.len() - offset
            ));
        }

        Ok(ProgramImage {
            constants,
            procedures,
        })
    }
}

fn serialize_constant(value: &Value, bytes: &mut Vec<u8>) -> Result<(), String> {
    match value {
        Value::Void => bytes.push(TAG_VOID),
        Value::Boolean(b) => {
            bytes.push(TAG_BOOLEAN);
            bytes.push(*b as u8);
        }
        Value::Integer64(n) => {
            bytes.push(TAG_INTEGER64);
            bytes.extend_from_slice(&n.to_be_bytes());
        }
        Value::String(s) => {
            bytes.push(TAG_STRING);
            let len = u32::try_from(s.len())
                .map_err(|_| "string constant too long to serialize".to_string())?;
            bytes.extend_from_slice(&len.to_be_bytes());
            bytes.extend_from_slice(s.as_bytes());
        }
        other => {
            return Err(format!(
                "constant of kind {} is not serializable",
                other.kind_name()
            ))
        }
    }
    Ok(())
}

fn deserialize_constant(bytes: &[u8], offset: &mut usize) -> Result<Value, String> {
    let tag = *bytes
        .get(*offset)
        .ok_or_else(|| "invalid image: constant tag truncated".to_string())?;
    *offset += 1;
    match tag {
        TAG_VOID => Ok(Value::Void),
        TAG_BOOLEAN => {
            let byte = *bytes
                .get(*offset)
                .ok_or_else(|| "invalid image: boolean constant truncated".to_string())?;
            *offset += 1;
            Ok(Value::Boolean(byte != 0))
        }
        TAG_INTEGER64 => {
            if *offset + 8 > bytes.len() {
                return Err("invalid image: integer constant truncated".to_string());
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[*offset..*offset + 8]);
            *offset += 8;
            Ok(Value::Integer64(i64::from_be_bytes(raw)))
        }
        TAG_STRING => {
            let len = read_u32(bytes, offset, "string constant")? as usize;
            if *offset + len > bytes.len() {
                return Err("invalid image: string constant truncated".to_string());
            }
            let text = std::str::from_utf8(&bytes[*offset..*offset + len])
                .map_err(|_| "invalid image: string constant is not UTF-8".to_string())?;
            *offset += len;
            Ok(Value::string(text))
        }
        _ => Err(format!("invalid image: unknown constant tag {:#04x}", tag)),
    }
}

fn serialize_name(name: &str, bytes: &mut Vec<u8>) -> Result<(), String> {
    let len =
        u16::try_from(name.len()).map_err(|_| format!("name '{}' too long to serialize", name))?;
    bytes.extend_from_slice(&len.to_be_bytes());
    bytes.extend_from_slice(name.as_bytes());
    Ok(())
}

fn read_name(bytes: &[u8], offset: &mut usize) -> Result<String, String> {
    let len = read_u16(bytes, offset, "name")? as usize;
    if *offset + len > bytes.len() {
        return Err("invalid image: name truncated".to_string());
    }
    let name = std::str::from_utf8(&bytes[*offset..*offset + len])
        .map_err(|_| "invalid image: name is not UTF-8".to_string())?;
    *offset += len;
    Ok(name.to_string())
}

fn read_u16(bytes: &[u8], offset: &mut usize, what: &str) -> Result<u16, String> {
    if *offset + 2 > bytes.len() {
        return Err(format!("invalid image: {} truncated", what));
    }
    let value = u16::from_be_bytes([bytes[*offset], bytes[*offset + 1]]);
    *offset += 2;
    Ok(value)
}

fn read_u32(bytes: &[u8], offset: &mut usize, what: &str) -> Result<u32, String> {
    if *offset + 4 > bytes.len() {
        return Err(format!("invalid image: {} truncated", what));
    }
    let value = u32::from_be_bytes([
        bytes[*offset],
        bytes[*offset + 1],
        bytes[*offset + 2],
        bytes[*offset + 3],
    ]);
    *offset += 4;
    Ok(value)
}
