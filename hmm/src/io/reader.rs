//! Text readers and writers for observation sequences.
//!
//! Each observation is terminated by a semicolon and each line holds one
//! sequence:
//!
//! ```text
//! 1.5; -2; 0.25;
//! [76 45. -2.23]; [1 2 3];
//! ```
//!
//! Everything after a `#` up to the end of the line is ignored.
use crate::error::{HmmError, Result};
use crate::observation::ObservationVector;
use std::fmt::Display;
use std::io::{BufRead, Write};

/// A lexical unit of the observation format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Token {
    /// A number such as `-2.23` or `45.`
    Number(f64),
    /// Any other non-blank character.
    Symbol(char),
    /// End of the line.
    End,
}

/// Splits one line of text into [`Token`]s.
#[derive(Clone, Debug)]
pub struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize `text`, reporting errors at the 1-based line `line`.
    #[must_use]
    pub fn new(text: &'a str, line: usize) -> Self {
        Self { text, pos: 0, line }
    }

    /// Line reported in errors.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Build a format error at the current line.
    pub fn error<S: Into<String>>(&self, message: S) -> HmmError {
        HmmError::format(self.line, message)
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_blanks(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        if trimmed.starts_with('#') {
            self.pos = self.text.len();
        }
    }

    /// Look at the next token without consuming it.
    ///
    /// # Errors
    /// `Format` when a number cannot be parsed.
    pub fn peek(&mut self) -> Result<Token> {
        let pos = self.pos;
        let token = self.next_token();
        self.pos = pos;
        token
    }

    /// Consume the text of a number if one starts here.
    fn scan_number(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let c = rest.chars().next()?;
        let starts_number = c.is_ascii_digit()
            || ((c == '-' || c == '+' || c == '.')
                && rest[1..].starts_with(|d: char| d.is_ascii_digit() || d == '.'));
        if !starts_number {
            return None;
        }

        let len = rest
            .char_indices()
            .skip(1)
            .find(|(_, d)| !(d.is_ascii_digit() || *d == '.'))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        Some(&rest[..len])
    }

    /// Consume the next token.
    ///
    /// # Errors
    /// `Format` when a number cannot be parsed.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_blanks();
        if let Some(text) = self.scan_number() {
            return text
                .parse::<f64>()
                .map(Token::Number)
                .map_err(|_| self.error(format!("malformed number '{text}'")));
        }
        match self.rest().chars().next() {
            Some(c) => {
                self.pos += c.len_utf8();
                Ok(Token::Symbol(c))
            }
            None => Ok(Token::End),
        }
    }

    /// Consume the next token and require it to be `symbol`.
    ///
    /// # Errors
    /// `Format` when another token is found.
    pub fn expect(&mut self, symbol: char) -> Result<()> {
        match self.next_token()? {
            Token::Symbol(c) if c == symbol => Ok(()),
            _ => Err(self.error(format!("'{symbol}' expected"))),
        }
    }

    /// Consume the next token and require it to be a number.
    ///
    /// # Errors
    /// `Format` when another token is found.
    pub fn number(&mut self) -> Result<f64> {
        match self.next_token()? {
            Token::Number(x) => Ok(x),
            _ => Err(self.error("number expected")),
        }
    }

    /// Consume the next token and require it to be a non-negative integer
    /// that fits in a `usize`.
    ///
    /// # Errors
    /// `Format` when another token is found or the integer is out of range.
    pub fn integer(&mut self) -> Result<usize> {
        self.skip_blanks();
        match self.scan_number() {
            Some(text) => text.parse::<usize>().map_err(|_| {
                self.error(format!(
                    "non-negative integer expected, found '{text}'"
                ))
            }),
            None => Err(self.error("integer expected")),
        }
    }
}

/// Parses one observation, including its terminating semicolon.
pub trait ObservationReader {
    /// Type of observation produced.
    type Observation;

    /// Read the next observation from `tokens`.
    ///
    /// # Errors
    /// `Format` if the text does not describe a valid observation.
    fn read(&self, tokens: &mut Tokenizer<'_>) -> Result<Self::Observation>;
}

/// Reads real observations such as `1.5;`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealReader;

impl ObservationReader for RealReader {
    type Observation = f64;

    fn read(&self, tokens: &mut Tokenizer<'_>) -> Result<f64> {
        let x = tokens.number()?;
        tokens.expect(';')?;
        Ok(x)
    }
}

/// Reads discrete symbols such as `3;`.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegerReader;

impl ObservationReader for IntegerReader {
    type Observation = usize;

    fn read(&self, tokens: &mut Tokenizer<'_>) -> Result<usize> {
        let x = tokens.integer()?;
        tokens.expect(';')?;
        Ok(x)
    }
}

/// Reads vector observations such as `[76 45. -2.23];`.
#[derive(Clone, Copy, Debug, Default)]
pub struct VectorReader {
    dimension: Option<usize>,
}

impl VectorReader {
    /// A reader accepting vectors of any dimension.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject vectors whose dimension is not `dimension`.
    ///
    /// # Errors
    /// `InvalidArgument` when `dimension` is zero.
    pub fn with_dimension(self, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(HmmError::invalid("dimension must be positive"));
        }
        Ok(Self {
            dimension: Some(dimension),
        })
    }

    /// Required dimension, if any.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

impl ObservationReader for VectorReader {
    type Observation = ObservationVector;

    fn read(&self, tokens: &mut Tokenizer<'_>) -> Result<ObservationVector> {
        tokens.expect('[')?;
        let mut values = Vec::new();
        loop {
            match tokens.next_token()? {
                Token::Number(x) => values.push(x),
                Token::Symbol(']') if values.is_empty() => {
                    return Err(tokens.error("empty vector found"))
                }
                Token::Symbol(']') => break,
                _ => return Err(tokens.error("number or ']' expected")),
            }
        }
        tokens.expect(';')?;

        match self.dimension {
            Some(d) if d != values.len() => Err(tokens.error(format!(
                "wrong dimension ({} instead of {d})",
                values.len()
            ))),
            _ => ObservationVector::new(&values)
                .map_err(|err| tokens.error(err.to_string())),
        }
    }
}

/// Read the sequence held by one line of text. `line` is the 1-based line
/// number used in error messages.
///
/// # Errors
/// `Format` if any observation is malformed.
pub fn read_sequence<R: ObservationReader>(
    reader: &R,
    text: &str,
    line: usize,
) -> Result<Vec<R::Observation>> {
    let mut tokens = Tokenizer::new(text, line);
    let mut sequence = Vec::new();
    while tokens.peek()? != Token::End {
        sequence.push(reader.read(&mut tokens)?);
    }
    Ok(sequence)
}

/// Read one sequence per line, skipping blank and comment lines.
///
/// # Errors
/// `Io` if `input` cannot be read, `Format` if an observation is malformed.
///
/// # Example
/// ```rust
/// use hmm::io::{read_sequences, RealReader};
///
/// let text = "1.5; 2; -0.5;\n\n# nothing here\n3.25;\n";
/// let seqs = read_sequences(&RealReader, text.as_bytes()).unwrap();
/// assert_eq!(seqs, vec![vec![1.5, 2.0, -0.5], vec![3.25]]);
/// ```
pub fn read_sequences<R: ObservationReader, B: BufRead>(
    reader: &R,
    input: B,
) -> Result<Vec<Vec<R::Observation>>> {
    let mut sequences = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let sequence = read_sequence(reader, &line?, i + 1)?;
        if !sequence.is_empty() {
            sequences.push(sequence);
        }
    }
    Ok(sequences)
}

/// Write one sequence per line in the format accepted by the readers.
///
/// # Errors
/// `Io` if `output` cannot be written.
pub fn write_sequences<O: Display, W: Write>(
    mut output: W,
    sequences: &[Vec<O>],
) -> Result<()> {
    for sequence in sequences {
        for o in sequence {
            write!(output, "{o}; ")?;
        }
        writeln!(output)?;
    }
    Ok(())
}
