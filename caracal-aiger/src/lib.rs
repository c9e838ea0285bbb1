//! AIGER circuit reader for the caracal model checker.
//!
//! Parses both the ASCII (`aag`) and the binary (`aig`) AIGER format,
//! including the version 1.9 bad-state (`B`) and invariant-constraint (`C`)
//! sections. Justice and fairness properties are rejected as unsupported.
//! Symbol tables and comments are skipped.

use std::io;

use anyhow::Error;
use thiserror::Error;

/// A literal in AIGER encoding.
///
/// The variable index is the literal shifted right by one; the least
/// significant bit marks negation. Literal `0` is the constant false and
/// literal `1` the constant true.
pub type AigLit = u32;

/// Possible errors while parsing an AIGER file.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {}: invalid AIGER header: {}", line, header)]
    InvalidHeader { line: usize, header: String },
    #[error("line {}: expected an unsigned integer", line)]
    ExpectedInteger { line: usize },
    #[error("line {}: unexpected character '{}'", line, unexpected)]
    UnexpectedInput { line: usize, unexpected: char },
    #[error(
        "line {}: literal {} exceeds the declared maximum variable {}",
        line,
        literal,
        max_var
    )]
    LiteralOutOfRange {
        line: usize,
        literal: u64,
        max_var: u32,
    },
    #[error("line {}: malformed AND gate definition", line)]
    InvalidAndGate { line: usize },
    #[error("line {}: malformed latch definition", line)]
    InvalidLatch { line: usize },
    #[error("justice and fairness properties are not supported")]
    UnsupportedSection,
    #[error("unexpected end of file")]
    UnexpectedEof,
}

/// A state-holding element with a next-state function and a reset value.
///
/// `reset` is kept exactly as written in the file; the AIGER standard allows
/// `0`, `1` or the latch literal itself (uninitialized). Consumers decide
/// which reset values they accept.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Latch {
    pub lit: AigLit,
    pub next: AigLit,
    pub reset: u32,
}

/// A two-input AND gate. `lhs` is always a positive (even) literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AndGate {
    pub lhs: AigLit,
    pub rhs0: AigLit,
    pub rhs1: AigLit,
}

/// An And-Inverter Graph as read from an AIGER file.
#[derive(Default, Debug)]
pub struct Aig {
    pub max_var: u32,
    pub inputs: Vec<AigLit>,
    pub latches: Vec<Latch>,
    pub outputs: Vec<AigLit>,
    pub bad: Vec<AigLit>,
    pub constraints: Vec<AigLit>,
    pub ands: Vec<AndGate>,
}

impl Aig {
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_latches(&self) -> usize {
        self.latches.len()
    }

    /// The designated safety property: the first bad-state literal if the
    /// file has a `B` section, the first output otherwise.
    pub fn bad_literal(&self) -> Option<AigLit> {
        self.bad.first().or_else(|| self.outputs.first()).copied()
    }

    /// Reads an AIGER file in either format.
    pub fn parse(mut input: impl io::Read) -> Result<Aig, Error> {
        let mut bytes = vec![];
        input.read_to_end(&mut bytes)?;
        Ok(Aig::parse_bytes(&bytes)?)
    }

    /// Parses an in-memory AIGER file.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Aig, ParserError> {
        Parser::new(bytes).parse()
    }
}

/// Counts from the `aag`/`aig` header line.
#[derive(Copy, Clone, Debug)]
struct Header {
    binary: bool,
    max_var: u32,
    inputs: usize,
    latches: usize,
    outputs: usize,
    ands: usize,
    bad: usize,
    constraints: usize,
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8]) -> Parser<'a> {
        Parser {
            bytes,
            pos: 0,
            line: 1,
        }
    }

    fn parse(mut self) -> Result<Aig, ParserError> {
        let header = self.parse_header()?;

        let mut aig = Aig {
            max_var: header.max_var,
            ..Aig::default()
        };

        if header.binary {
            // Inputs are implicit in the binary format.
            for index in 0..header.inputs {
                aig.inputs.push(2 * (index as u32 + 1));
            }
            for index in 0..header.latches {
                let lit = 2 * (header.inputs + index + 1) as u32;
                aig.latches.push(self.parse_binary_latch(lit, &header)?);
            }
        } else {
            for _ in 0..header.inputs {
                let lit = self.parse_literal_line(&header)?;
                aig.inputs.push(lit);
            }
            for _ in 0..header.latches {
                aig.latches.push(self.parse_ascii_latch(&header)?);
            }
        }

        for _ in 0..header.outputs {
            let lit = self.parse_literal_line(&header)?;
            aig.outputs.push(lit);
        }
        for _ in 0..header.bad {
            let lit = self.parse_literal_line(&header)?;
            aig.bad.push(lit);
        }
        for _ in 0..header.constraints {
            let lit = self.parse_literal_line(&header)?;
            aig.constraints.push(lit);
        }

        if header.binary {
            for index in 0..header.ands {
                let lhs = 2 * (header.inputs + header.latches + index + 1) as u32;
                aig.ands.push(self.parse_binary_and(lhs)?);
            }
        } else {
            for _ in 0..header.ands {
                aig.ands.push(self.parse_ascii_and(&header)?);
            }
        }

        // Whatever follows (symbol table, comments) is ignored.
        Ok(aig)
    }

    fn parse_header(&mut self) -> Result<Header, ParserError> {
        let header_error = |line: usize, bytes: &[u8]| {
            let end = bytes
                .iter()
                .position(|&b| b == b'\n')
                .unwrap_or_else(|| bytes.len().min(40));
            ParserError::InvalidHeader {
                line,
                header: String::from_utf8_lossy(&bytes[..end]).into_owned(),
            }
        };

        let binary = if self.bytes.starts_with(b"aig ") {
            true
        } else if self.bytes.starts_with(b"aag ") {
            false
        } else {
            return Err(header_error(self.line, self.bytes));
        };
        self.pos += 4;

        let mut counts = vec![];
        loop {
            counts.push(self.read_uint()?);
            if self.skip_spaces() {
                break;
            }
        }
        self.expect_newline()?;

        if counts.len() < 5 || counts.len() > 9 {
            return Err(header_error(1, self.bytes));
        }
        // M I L O A B C J F: any listed justice or fairness count must be zero.
        if counts.len() > 7 && counts[7..].iter().any(|&c| c != 0) {
            return Err(ParserError::UnsupportedSection);
        }

        let max_var = counts[0] as u32;
        let header = Header {
            binary,
            max_var,
            inputs: counts[1] as usize,
            latches: counts[2] as usize,
            outputs: counts[3] as usize,
            ands: counts[4] as usize,
            bad: counts.get(5).copied().unwrap_or(0) as usize,
            constraints: counts.get(6).copied().unwrap_or(0) as usize,
        };

        if header.inputs + header.latches + header.ands > max_var as usize {
            return Err(header_error(1, self.bytes));
        }
        Ok(header)
    }

    fn parse_literal_line(&mut self, header: &Header) -> Result<AigLit, ParserError> {
        let lit = self.read_literal(header)?;
        self.skip_spaces();
        self.expect_newline()?;
        Ok(lit)
    }

    fn parse_ascii_latch(&mut self, header: &Header) -> Result<Latch, ParserError> {
        let line = self.line;
        let lit = self.read_literal(header)?;
        if lit % 2 != 0 || lit == 0 {
            return Err(ParserError::InvalidLatch { line });
        }
        if self.skip_spaces() {
            return Err(ParserError::InvalidLatch { line });
        }
        let next = self.read_literal(header)?;
        let reset = if self.skip_spaces() {
            0
        } else {
            self.read_literal(header)?
        };
        self.skip_spaces();
        self.expect_newline()?;
        Ok(Latch { lit, next, reset })
    }

    fn parse_binary_latch(&mut self, lit: AigLit, header: &Header) -> Result<Latch, ParserError> {
        let next = self.read_literal(header)?;
        let reset = if self.skip_spaces() {
            0
        } else {
            self.read_literal(header)?
        };
        self.skip_spaces();
        self.expect_newline()?;
        Ok(Latch { lit, next, reset })
    }

    fn parse_ascii_and(&mut self, header: &Header) -> Result<AndGate, ParserError> {
        let line = self.line;
        let lhs = self.read_literal(header)?;
        if lhs % 2 != 0 || lhs == 0 {
            return Err(ParserError::InvalidAndGate { line });
        }
        if self.skip_spaces() {
            return Err(ParserError::InvalidAndGate { line });
        }
        let rhs0 = self.read_literal(header)?;
        if self.skip_spaces() {
            return Err(ParserError::InvalidAndGate { line });
        }
        let rhs1 = self.read_literal(header)?;
        self.skip_spaces();
        self.expect_newline()?;
        Ok(AndGate { lhs, rhs0, rhs1 })
    }

    /// Decodes one delta-coded gate. The encoding stores `lhs - rhs0` and
    /// `rhs0 - rhs1` as LEB128 integers, exploiting `lhs > rhs0 >= rhs1`.
    fn parse_binary_and(&mut self, lhs: AigLit) -> Result<AndGate, ParserError> {
        let line = self.line;
        let delta0 = self.read_leb128()?;
        let delta1 = self.read_leb128()?;

        let rhs0 = u64::from(lhs)
            .checked_sub(delta0)
            .ok_or(ParserError::InvalidAndGate { line })?;
        let rhs1 = rhs0
            .checked_sub(delta1)
            .ok_or(ParserError::InvalidAndGate { line })?;
        if delta0 == 0 {
            return Err(ParserError::InvalidAndGate { line });
        }
        Ok(AndGate {
            lhs,
            rhs0: rhs0 as AigLit,
            rhs1: rhs1 as AigLit,
        })
    }

    fn read_leb128(&mut self) -> Result<u64, ParserError> {
        let mut rest = &self.bytes[self.pos..];
        let before = rest.len();
        let value =
            leb128::read::unsigned(&mut rest).map_err(|_| ParserError::UnexpectedEof)?;
        self.pos += before - rest.len();
        Ok(value)
    }

    fn read_literal(&mut self, header: &Header) -> Result<AigLit, ParserError> {
        let line = self.line;
        let value = self.read_uint()?;
        if value > 2 * u64::from(header.max_var) + 1 {
            return Err(ParserError::LiteralOutOfRange {
                line,
                literal: value,
                max_var: header.max_var,
            });
        }
        Ok(value as AigLit)
    }

    fn read_uint(&mut self) -> Result<u64, ParserError> {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(&byte) = self.bytes.get(self.pos) {
            match byte {
                b'0'..=b'9' => {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u64::from(byte - b'0')))
                        .ok_or(ParserError::ExpectedInteger { line: self.line })?;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(ParserError::ExpectedInteger { line: self.line });
        }
        Ok(value)
    }

    /// Skips a run of spaces. Returns true if the next byte ends the line.
    fn skip_spaces(&mut self) -> bool {
        while let Some(&b' ') | Some(&b'\r') = self.bytes.get(self.pos) {
            self.pos += 1;
        }
        matches!(self.bytes.get(self.pos), None | Some(&b'\n'))
    }

    fn expect_newline(&mut self) -> Result<(), ParserError> {
        match self.bytes.get(self.pos) {
            Some(b'\n') => {
                self.pos += 1;
                self.line += 1;
                Ok(())
            }
            Some(&byte) => Err(ParserError::UnexpectedInput {
                line: self.line,
                unexpected: byte as char,
            }),
            None => Err(ParserError::UnexpectedEof),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_toggle_latch() {
        let aig = Aig::parse_bytes(b"aag 1 0 1 1 0\n2 3\n2\n").unwrap();
        assert_eq!(aig.max_var, 1);
        assert_eq!(aig.latches, vec![Latch { lit: 2, next: 3, reset: 0 }]);
        assert_eq!(aig.outputs, vec![2]);
        assert_eq!(aig.bad_literal(), Some(2));
    }

    #[test]
    fn ascii_with_bad_and_constraint_sections() {
        let input = b"aag 3 1 1 0 1 1 1\n2\n4 6 0\n4\n2\n6 4 2\n";
        let aig = Aig::parse_bytes(input).unwrap();
        assert_eq!(aig.inputs, vec![2]);
        assert_eq!(aig.bad, vec![4]);
        assert_eq!(aig.constraints, vec![2]);
        assert_eq!(
            aig.ands,
            vec![AndGate { lhs: 6, rhs0: 4, rhs1: 2 }]
        );
        // A B section takes precedence over outputs.
        assert_eq!(aig.bad_literal(), Some(4));
    }

    #[test]
    fn ascii_latch_reset_values() {
        let aig = Aig::parse_bytes(b"aag 2 0 2 0 0\n2 3 1\n4 2 4\n").unwrap();
        assert_eq!(aig.latches[0].reset, 1);
        // An uninitialized latch carries its own literal as reset.
        assert_eq!(aig.latches[1].reset, 4);
    }

    #[test]
    fn binary_and_gates() {
        // Same circuit as: aag 3 2 0 1 1 / inputs 2 4 / output 6 / 6 = 4 & 2.
        let mut input = b"aig 3 2 0 1 1\n6\n".to_vec();
        input.extend_from_slice(&[2, 2]); // deltas 6-4, 4-2
        let aig = Aig::parse_bytes(&input).unwrap();
        assert_eq!(aig.inputs, vec![2, 4]);
        assert_eq!(aig.outputs, vec![6]);
        assert_eq!(
            aig.ands,
            vec![AndGate { lhs: 6, rhs0: 4, rhs1: 2 }]
        );
    }

    #[test]
    fn binary_latches_are_implicit() {
        // aig 2 1 1 1 0: one input (lit 2), one latch (lit 4) with next = 2.
        let aig = Aig::parse_bytes(b"aig 2 1 1 1 0\n2\n4\n").unwrap();
        assert_eq!(aig.inputs, vec![2]);
        assert_eq!(aig.latches, vec![Latch { lit: 4, next: 2, reset: 0 }]);
        assert_eq!(aig.outputs, vec![4]);
    }

    #[test]
    fn binary_multi_byte_delta() {
        // One gate with rhs0 = lhs - 200, exercising the continuation byte.
        let mut input = b"aig 300 150 0 0 1\n".to_vec();
        input.extend_from_slice(&[0xc8, 0x01, 1]); // 200 in LEB128, then 1
        let aig = Aig::parse_bytes(&input).unwrap();
        let lhs = 2 * 151;
        assert_eq!(
            aig.ands,
            vec![AndGate { lhs, rhs0: lhs - 200, rhs1: lhs - 201 }]
        );
    }

    #[test]
    fn symbol_table_is_skipped() {
        let input = b"aag 1 1 0 1 0\n2\n2\ni0 request\no0 grant\nc\na comment\n";
        let aig = Aig::parse_bytes(input).unwrap();
        assert_eq!(aig.inputs, vec![2]);
        assert_eq!(aig.outputs, vec![2]);
    }

    #[test]
    fn rejects_justice_sections() {
        let err = Aig::parse_bytes(b"aag 1 1 0 0 0 0 0 1\n").unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedSection));
    }

    #[test]
    fn rejects_odd_and_lhs() {
        let err = Aig::parse_bytes(b"aag 3 2 0 0 1\n2\n4\n5 4 2\n").unwrap_err();
        assert!(matches!(err, ParserError::InvalidAndGate { line: 4 }));
    }

    #[test]
    fn rejects_out_of_range_literal() {
        let err = Aig::parse_bytes(b"aag 1 1 0 1 0\n2\n9\n").unwrap_err();
        assert!(matches!(
            err,
            ParserError::LiteralOutOfRange { literal: 9, .. }
        ));
    }

    #[test]
    fn rejects_truncated_file() {
        let err = Aig::parse_bytes(b"aag 1 1 0 1 0\n2\n").unwrap_err();
        assert!(matches!(err, ParserError::ExpectedInteger { .. }));
    }
}
