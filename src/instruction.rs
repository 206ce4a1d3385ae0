//! Decoded instructions and the text format they are read from.
//!
//! Instruction streams are plain text, one instruction per line:
//!
//! ```text
//! RD <address>
//! WR <address> <value>
//! ```
//!
//! Blank lines are ignored. Core `i` executes the stream in `input_i.txt`
//! inside the input directory. Parsing is a collaborator concern: the
//! coherence engine itself only ever sees well-formed [`Instruction`]s.

use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::error::SimError;
use crate::main_memory::{Address, Value};

/// One decoded instruction from a core's stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Load the value at an address.
    Read(Address),
    /// Store a value to an address.
    Write(Address, Value),
}

impl Instruction {
    /// The address this instruction touches.
    pub fn address(self) -> Address {
        match self {
            Instruction::Read(addr) | Instruction::Write(addr, _) => addr,
        }
    }

    /// Whether this is a read or a write.
    pub fn kind(self) -> AccessKind {
        match self {
            Instruction::Read(_) => AccessKind::Read,
            Instruction::Write(..) => AccessKind::Write,
        }
    }
}

/// The kind of memory access an instruction performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    /// A load.
    Read,
    /// A store.
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessKind::Read => write!(f, "RD"),
            AccessKind::Write => write!(f, "WR"),
        }
    }
}

/// A malformed line in an instruction stream.
#[derive(Debug, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// One-based line number of the offending line.
    pub line: usize,
    /// What was wrong with it.
    pub reason: String,
}

/// Parse a whole instruction stream.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut program = Vec::new();
    for (number, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let inst = parse_line(line).map_err(|reason| ParseError {
            line: number + 1,
            reason,
        })?;
        program.push(inst);
    }
    Ok(program)
}

fn parse_line(line: &str) -> Result<Instruction, String> {
    let mut fields = line.split_whitespace();
    let op = match fields.next() {
        Some(op) => op,
        None => return Err("empty instruction".to_string()),
    };

    let inst = match op {
        "RD" => Instruction::Read(parse_operand(fields.next(), "address")?),
        "WR" => {
            let addr = parse_operand(fields.next(), "address")?;
            let value: usize = parse_operand(fields.next(), "value")?.0;
            let value = Value::try_from(value)
                .map_err(|_| format!("value {value} does not fit in a byte"))?;
            Instruction::Write(addr, value)
        }
        other => return Err(format!("unknown operation `{other}`")),
    };

    if let Some(extra) = fields.next() {
        return Err(format!("trailing field `{extra}`"));
    }
    Ok(inst)
}

fn parse_operand(field: Option<&str>, what: &str) -> Result<Address, String> {
    let field = field.ok_or_else(|| format!("missing {what}"))?;
    let n = field
        .parse::<usize>()
        .map_err(|_| format!("bad {what} `{field}`"))?;
    Ok(Address(n))
}

/// Load `input_0.txt` through `input_{num_cores - 1}.txt` from `dir`, one
/// program per core.
pub fn load_programs(dir: &Path, num_cores: usize) -> Result<Vec<Vec<Instruction>>, SimError> {
    (0..num_cores)
        .map(|core| {
            let path = dir.join(format!("input_{core}.txt"));
            let source = fs::read_to_string(&path).map_err(|source| SimError::InstructionFile {
                path: path.clone(),
                source,
            })?;
            parse_program(&source).map_err(|source| SimError::BadProgram { path, source })
        })
        .collect()
}

/// Count how many consecutive `input_i.txt` streams exist in `dir`, starting
/// from `input_0.txt`.
pub fn count_streams(dir: &Path) -> usize {
    (0..)
        .take_while(|i| dir.join(format!("input_{i}.txt")).is_file())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reads_and_writes() {
        let program = parse_program("RD 2\nWR 3 9\n\nRD 0\n").unwrap();
        assert_eq!(
            program,
            vec![
                Instruction::Read(Address(2)),
                Instruction::Write(Address(3), 9),
                Instruction::Read(Address(0)),
            ]
        );
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let program = parse_program("  RD 2  \n\tWR 1 4\n").unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn rejects_unknown_operation() {
        let err = parse_program("RD 1\nXX 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.contains("XX"));
    }

    #[test]
    fn rejects_missing_operands() {
        assert!(parse_program("RD\n").is_err());
        assert!(parse_program("WR 3\n").is_err());
    }

    #[test]
    fn rejects_trailing_fields() {
        assert!(parse_program("RD 1 2\n").is_err());
        assert!(parse_program("WR 1 2 3\n").is_err());
    }

    #[test]
    fn rejects_oversized_values() {
        assert!(parse_program("WR 1 256\n").is_err());
        assert!(parse_program("WR 1 255\n").is_ok());
    }

    #[test]
    fn rejects_non_numeric_operands() {
        let err = parse_program("RD abc\n").unwrap_err();
        assert!(err.reason.contains("abc"));
    }
}
