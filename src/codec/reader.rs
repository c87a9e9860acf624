//! Wire text reader.
//!
//! Decodes one top-level value per call from a bounded region of a string.
//! Running out of input inside a value yields [`LichatError::Incomplete`],
//! which callers streaming partial buffers treat as "read more"; anything
//! else that does not fit the grammar yields [`LichatError::Parse`].
//!
//! A NUL character ends the input just like the end bound does.

use std::collections::HashMap;
use std::sync::Arc;

use super::WireValue;
use crate::error::{LichatError, Result};
use crate::symbol::{fold, SymbolTable, DEFAULT_NAMESPACE, KEYWORD_NAMESPACE};

/// Namespace written by pre-2.0 peers.
pub const LEGACY_NAMESPACE: &str = "lichat-protocol";

pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c')
}

pub(crate) fn is_delimiter(c: char) -> bool {
    is_whitespace(c) || matches!(c, '(' | ')' | '"' | ':' | '\0')
}

/// Bounded character cursor over the input.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        match self.input[self.pos..self.end].chars().next() {
            Some('\0') | None => None,
            c => c,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.bump();
        }
    }
}

/// Decoder from wire text to [`WireValue`]s.
///
/// Symbols are interned into the reader's [`SymbolTable`]. Namespace names
/// found in the remap table are replaced before interning; by default the
/// legacy `lichat-protocol` namespace maps to `lichat`.
pub struct Reader {
    symbols: Arc<SymbolTable>,
    namespace_remap: HashMap<String, String>,
}

impl Reader {
    /// Create a reader with the default namespace remap.
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        let mut namespace_remap = HashMap::new();
        namespace_remap.insert(LEGACY_NAMESPACE.to_string(), DEFAULT_NAMESPACE.to_string());
        Self {
            symbols,
            namespace_remap,
        }
    }

    /// Add or replace a namespace remap entry.
    pub fn with_namespace_remap(mut self, from: &str, to: &str) -> Self {
        self.namespace_remap.insert(fold(from), fold(to));
        self
    }

    /// Mutable access to the remap table, e.g. to clear it.
    pub fn namespace_remap_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.namespace_remap
    }

    /// The symbol table this reader interns into.
    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    /// Decode one value from `input[start..end]`.
    ///
    /// Returns the value and the byte offset right after it.
    pub fn decode(&self, input: &str, start: usize, end: usize) -> Result<(WireValue, usize)> {
        let end = end.min(input.len());
        if start > end || !input.is_char_boundary(start) || !input.is_char_boundary(end) {
            return Err(LichatError::parse(start, "bounds are not on character boundaries"));
        }

        let mut cursor = Cursor {
            input,
            pos: start,
            end,
        };
        let value = self.read_value(&mut cursor)?;
        Ok((value, cursor.pos))
    }

    /// Decode the first value of a whole string.
    pub fn decode_str(&self, input: &str) -> Result<WireValue> {
        self.decode(input, 0, input.len()).map(|(value, _)| value)
    }

    fn read_value(&self, cursor: &mut Cursor<'_>) -> Result<WireValue> {
        cursor.skip_whitespace();
        match cursor.peek() {
            None => Err(LichatError::Incomplete),
            Some('(') => self.read_list(cursor),
            Some(')') => Err(LichatError::parse(cursor.pos, "unexpected )")),
            Some('"') => read_string(cursor),
            Some(_) => self.read_token(cursor),
        }
    }

    fn read_list(&self, cursor: &mut Cursor<'_>) -> Result<WireValue> {
        cursor.bump();
        let mut items = Vec::new();
        loop {
            cursor.skip_whitespace();
            match cursor.peek() {
                None => return Err(LichatError::Incomplete),
                Some(')') => {
                    cursor.bump();
                    return Ok(WireValue::List(items));
                }
                Some(_) => items.push(self.read_value(cursor)?),
            }
        }
    }

    fn read_token(&self, cursor: &mut Cursor<'_>) -> Result<WireValue> {
        let start = cursor.pos;
        let (first, escaped) = read_run(cursor)?;

        if cursor.peek() == Some(':') {
            cursor.bump();
            let (name, _) = read_run(cursor)?;
            if name.is_empty() {
                return Err(LichatError::parse(start, "symbol name missing after ':'"));
            }
            let namespace = if first.is_empty() && !escaped {
                KEYWORD_NAMESPACE.to_string()
            } else {
                let folded = fold(&first);
                self.namespace_remap.get(&folded).cloned().unwrap_or(folded)
            };
            return Ok(WireValue::Symbol(self.symbols.intern(&name, &namespace)));
        }

        if first.is_empty() {
            return Err(LichatError::parse(start, "empty token"));
        }
        if !escaped {
            if let Some(number) = parse_number(&first, start)? {
                return Ok(number);
            }
            match fold(&first).as_str() {
                "t" => return Ok(WireValue::Bool(true)),
                "nil" => return Ok(WireValue::Bool(false)),
                _ => {}
            }
        }
        Ok(WireValue::Symbol(self.symbols.intern(&first, DEFAULT_NAMESPACE)))
    }
}

/// Read characters up to the next delimiter, honouring `\` escapes.
fn read_run(cursor: &mut Cursor<'_>) -> Result<(String, bool)> {
    let mut run = String::new();
    let mut escaped = false;
    while let Some(c) = cursor.peek() {
        if c == '\\' {
            cursor.bump();
            run.push(cursor.bump().ok_or(LichatError::Incomplete)?);
            escaped = true;
        } else if is_delimiter(c) {
            break;
        } else {
            run.push(c);
            cursor.bump();
        }
    }
    Ok((run, escaped))
}

fn read_string(cursor: &mut Cursor<'_>) -> Result<WireValue> {
    cursor.bump();
    let mut out = String::new();
    loop {
        match cursor.bump() {
            None => return Err(LichatError::Incomplete),
            Some('\\') => out.push(cursor.bump().ok_or(LichatError::Incomplete)?),
            Some('"') => return Ok(WireValue::String(out)),
            Some(c) => out.push(c),
        }
    }
}

/// Classify a bare token as integer or decimal, if it is one.
pub(crate) fn number_shape(token: &str) -> Option<bool> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match frac {
        None if all_digits(int) => Some(false),
        Some(frac) if all_digits(int) && all_digits(frac) => Some(true),
        _ => None,
    }
}

fn parse_number(token: &str, offset: usize) -> Result<Option<WireValue>> {
    match number_shape(token) {
        None => Ok(None),
        Some(false) => token
            .parse::<i64>()
            .map(|i| Some(WireValue::Integer(i)))
            .map_err(|e| LichatError::parse(offset, format!("integer {}: {}", token, e))),
        Some(true) => token
            .parse::<f64>()
            .map(|d| Some(WireValue::Decimal(d)))
            .map_err(|e| LichatError::parse(offset, format!("decimal {}: {}", token, e))),
    }
}
