//! S-expression reader (spec.md §4.1).
//!
//! The grammar is mutually recursive -- strings may embed S-expressions via
//! `~{...}` interpolation, lists and vectors embed them directly -- so each
//! production is its own method on [`Reader`] and they call each other
//! directly rather than through a single pattern-match chain (spec.md §9,
//! "Mutual recursion in the reader"). `Reader` is a pure function of its
//! input and cursor: every method takes `&mut self` only to advance `pos`,
//! never to record state outside the returned `Sexpr`.

use crate::error::CompileError;
use schemec_core::{Number, Sexpr};

/// Read every top-level form in `src`.
pub fn read_all(src: &str) -> Result<Vec<Sexpr>, CompileError> {
    let mut reader = Reader::new(src);
    let mut forms = Vec::new();
    loop {
        reader.skip_ws_and_comments()?;
        if reader.peek().is_none() {
            return Ok(forms);
        }
        forms.push(reader.read_sexpr()?);
    }
}

/// Read exactly one form, returning it along with the byte offset just past it.
pub fn read_one(src: &str) -> Result<(Sexpr, usize), CompileError> {
    let mut reader = Reader::new(src);
    reader.skip_ws_and_comments()?;
    let form = reader.read_sexpr()?;
    Ok((form, reader.pos))
}

/// Characters legal in a bare symbol (spec.md §4.1 "Symbols").
fn is_symbol_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!$^*_-+=<>?/".contains(&b)
}

/// Symbol chars plus `.`, the superset a numeric-or-symbol atom token scans
/// over (the dotted-pair separator is the one place a bare `.` appears, and
/// it is always delimited by whitespace so maximal munch still isolates it).
fn is_atom_char(b: u8) -> bool {
    is_symbol_char(b) || b == b'.'
}

struct Reader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Reader {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws_and_comments(&mut self) -> Result<(), CompileError> {
        loop {
            while self.peek().is_some_and(|b| b <= 0x20) {
                self.advance();
            }
            match self.peek() {
                Some(b';') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'{') => self.skip_paired_comment()?,
                Some(b'#') if self.peek_at(1) == Some(b';') => {
                    self.advance();
                    self.advance();
                    self.skip_ws_and_comments()?;
                    self.read_sexpr()?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// `{ ... }`, nesting; strings and characters inside are parsed (not
    /// scanned byte-by-byte) so an embedded `"}"` or `#\}` doesn't close the
    /// comment early (spec.md §4.1).
    fn skip_paired_comment(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        self.advance(); // consume '{'
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => return Err(CompileError::read(start, "unterminated paired comment")),
                Some(b'"') => {
                    self.read_string()?;
                }
                Some(b'#') if self.peek_at(1) == Some(b'\\') => {
                    self.read_char()?;
                }
                Some(b'{') => {
                    depth += 1;
                    self.advance();
                }
                Some(b'}') => {
                    depth -= 1;
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        Ok(())
    }

    fn read_sexpr(&mut self) -> Result<Sexpr, CompileError> {
        self.skip_ws_and_comments()?;
        match self.peek() {
            None => Err(CompileError::read(self.pos, "unexpected end of input")),
            Some(b'(') => self.read_list(),
            Some(b'#') => self.read_hash(),
            Some(b'"') => self.read_string(),
            Some(b'\'') => {
                self.advance();
                let inner = self.read_sexpr()?;
                Ok(quote_wrap("quote", inner))
            }
            Some(b'`') => {
                self.advance();
                let inner = self.read_sexpr()?;
                Ok(quote_wrap("quasiquote", inner))
            }
            Some(b',') => {
                self.advance();
                if self.peek() == Some(b'@') {
                    self.advance();
                    let inner = self.read_sexpr()?;
                    Ok(quote_wrap("unquote-splicing", inner))
                } else {
                    let inner = self.read_sexpr()?;
                    Ok(quote_wrap("unquote", inner))
                }
            }
            Some(b')') => Err(CompileError::read(self.pos, "unexpected ')'")),
            Some(b) if is_atom_char(b) => self.read_symbol_or_number(),
            Some(b) => Err(CompileError::read(
                self.pos,
                format!("unexpected character '{}'", b as char),
            )),
        }
    }

    fn read_list(&mut self) -> Result<Sexpr, CompileError> {
        let start = self.pos;
        self.advance(); // '('
        let mut items = Vec::new();
        let mut tail = Sexpr::Nil;
        loop {
            self.skip_ws_and_comments()?;
            match self.peek() {
                None => return Err(CompileError::read(start, "unterminated list")),
                Some(b')') => {
                    self.advance();
                    break;
                }
                Some(b'.') if self.peek_at(1).map_or(true, is_delimiter) => {
                    self.advance();
                    tail = self.read_sexpr()?;
                    self.skip_ws_and_comments()?;
                    if self.peek() != Some(b')') {
                        return Err(CompileError::read(
                            self.pos,
                            "expected ')' after dotted-list tail",
                        ));
                    }
                    self.advance();
                    break;
                }
                _ => items.push(self.read_sexpr()?),
            }
        }
        let mut out = tail;
        for item in items.into_iter().rev() {
            out = Sexpr::cons(item, out);
        }
        Ok(out)
    }

    fn read_hash(&mut self) -> Result<Sexpr, CompileError> {
        let start = self.pos;
        self.advance(); // '#'
        match self.peek() {
            Some(b'(') => {
                self.advance();
                self.read_vector_body()
            }
            Some(b'\\') => self.read_char(),
            Some(b't') | Some(b'T') => {
                self.advance();
                if self.peek().is_some_and(is_symbol_char) {
                    Err(CompileError::read(start, "malformed '#t'"))
                } else {
                    Ok(Sexpr::Bool(true))
                }
            }
            Some(b'f') | Some(b'F') => {
                self.advance();
                if self.peek().is_some_and(is_symbol_char) {
                    Err(CompileError::read(start, "malformed '#f'"))
                } else {
                    Ok(Sexpr::Bool(false))
                }
            }
            _ => {
                let word_start = self.pos;
                while self.peek().is_some_and(is_symbol_char) {
                    self.advance();
                }
                let word = &self.src[word_start..self.pos];
                if word.eq_ignore_ascii_case("void") {
                    Ok(Sexpr::Void)
                } else {
                    Err(CompileError::read(
                        start,
                        format!("unknown '#' syntax '#{word}'"),
                    ))
                }
            }
        }
    }

    fn read_vector_body(&mut self) -> Result<Sexpr, CompileError> {
        let start = self.pos;
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_comments()?;
            match self.peek() {
                None => return Err(CompileError::read(start, "unterminated vector")),
                Some(b')') => {
                    self.advance();
                    return Ok(Sexpr::vector(items));
                }
                _ => items.push(self.read_sexpr()?),
            }
        }
    }

    fn read_char(&mut self) -> Result<Sexpr, CompileError> {
        let start = self.pos;
        self.advance(); // '#'
        self.advance(); // '\\'
        let word_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
            self.advance();
        }
        let word = &self.src[word_start..self.pos];

        let value = if word.len() > 1 {
            if let Some(byte) = Sexpr::NAMED_CHARS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(word))
                .map(|(_, byte)| *byte)
            {
                byte
            } else if matches!(word.as_bytes()[0], b'x' | b'X')
                && word[1..].bytes().all(|b| b.is_ascii_hexdigit())
                && word.len() > 1
            {
                let v = u32::from_str_radix(&word[1..], 16)
                    .map_err(|_| CompileError::read(word_start, "invalid hex character escape"))?;
                if v > 255 {
                    return Err(CompileError::read(
                        word_start,
                        "character literal out of byte range",
                    ));
                }
                v as u8
            } else {
                return Err(CompileError::read(
                    start,
                    format!("unknown character name '#\\{word}'"),
                ));
            }
        } else if word.len() == 1 {
            word.as_bytes()[0]
        } else {
            match self.peek() {
                Some(b) if b > 0x20 => {
                    self.advance();
                    b
                }
                _ => return Err(CompileError::read(start, "empty character literal")),
            }
        };

        if self.peek().is_some_and(is_symbol_char) {
            return Err(CompileError::read(
                start,
                "character literal followed by a symbol character",
            ));
        }
        Ok(Sexpr::Char(value))
    }

    /// Strings desugar to a single literal when they contain no `~{...}`
    /// interpolation, and to `(string-append <part>...)` otherwise, with
    /// each dynamic part wrapped as `(format "~a" <sexpr>)` (spec.md §4.1).
    fn read_string(&mut self) -> Result<Sexpr, CompileError> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut parts: Vec<Sexpr> = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None => return Err(CompileError::read(start, "unterminated string literal")),
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    self.read_string_escape(&mut current)?;
                }
                Some(b'~') if self.peek_at(1) == Some(b'~') => {
                    current.push(b'~');
                    self.advance();
                    self.advance();
                }
                Some(b'~') if self.peek_at(1) == Some(b'{') => {
                    if !current.is_empty() {
                        parts.push(Sexpr::str(std::mem::take(&mut current)));
                    }
                    self.advance();
                    self.advance();
                    let inner = self.read_sexpr()?;
                    self.skip_ws_and_comments()?;
                    if self.peek() != Some(b'}') {
                        return Err(CompileError::read(
                            self.pos,
                            "expected '}' to close string interpolation",
                        ));
                    }
                    self.advance();
                    parts.push(Sexpr::list(vec![
                        Sexpr::symbol("format"),
                        Sexpr::str(b"~a".to_vec()),
                        inner,
                    ]));
                }
                Some(b) => {
                    current.push(b);
                    self.advance();
                }
            }
        }
        if !current.is_empty() {
            parts.push(Sexpr::str(current));
        }
        if parts.is_empty() {
            parts.push(Sexpr::str(Vec::new()));
        }
        if parts.len() == 1 {
            if let Sexpr::Str(_) = &parts[0] {
                return Ok(parts.into_iter().next().unwrap());
            }
        }
        let mut call = vec![Sexpr::symbol("string-append")];
        call.extend(parts);
        Ok(Sexpr::list(call))
    }

    fn read_string_escape(&mut self, current: &mut Vec<u8>) -> Result<(), CompileError> {
        match self.peek() {
            Some(b'\\') => {
                current.push(b'\\');
                self.advance();
            }
            Some(b'"') => {
                current.push(b'"');
                self.advance();
            }
            Some(b'n') => {
                current.push(b'\n');
                self.advance();
            }
            Some(b'r') => {
                current.push(b'\r');
                self.advance();
            }
            Some(b'f') => {
                current.push(0x0c);
                self.advance();
            }
            Some(b't') => {
                current.push(b'\t');
                self.advance();
            }
            Some(b'x') => {
                self.advance();
                let hex_start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                    self.advance();
                }
                let hex = &self.src[hex_start..self.pos];
                if hex.is_empty() {
                    return Err(CompileError::read(hex_start, "empty '\\x' escape"));
                }
                if self.peek() != Some(b';') {
                    return Err(CompileError::read(
                        self.pos,
                        "expected ';' to close '\\x' escape",
                    ));
                }
                self.advance();
                let value = u32::from_str_radix(hex, 16)
                    .map_err(|_| CompileError::read(hex_start, "invalid hex escape"))?;
                if value > 255 {
                    return Err(CompileError::read(hex_start, "'\\x' escape out of byte range"));
                }
                current.push(value as u8);
            }
            Some(other) => {
                return Err(CompileError::read(
                    self.pos,
                    format!("unknown string escape '\\{}'", other as char),
                ));
            }
            None => {
                return Err(CompileError::read(
                    self.pos,
                    "unterminated escape at end of string",
                ));
            }
        }
        Ok(())
    }

    fn read_symbol_or_number(&mut self) -> Result<Sexpr, CompileError> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }
        let token = &self.src[start..self.pos];
        if let Some(number) = try_parse_number(token) {
            return Ok(Sexpr::Number(number));
        }
        if token.contains('.') {
            return Err(CompileError::read(
                start,
                format!("'{token}' is not a valid number or symbol"),
            ));
        }
        Ok(Sexpr::symbol(token.to_ascii_lowercase()))
    }
}

fn is_delimiter(b: u8) -> bool {
    b <= 0x20 || b"()\";{}'`,".contains(&b)
}

fn quote_wrap(tag: &str, inner: Sexpr) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol(tag), inner])
}

/// Parse a numeric atom per spec.md §4.1: signed integer, reduced fraction
/// `N/M`, or one of the three float shapes (`IP.MANT[e±K]`, `.MANT[e±K]`,
/// `IP e±K`), with the exponent marker being `e`/`E`, `*10**`, or `*10^`.
fn try_parse_number(token: &str) -> Option<Number> {
    let bytes = token.as_bytes();
    let mut i = 0usize;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = &token[int_start..i];

    if i < bytes.len() && bytes[i] == b'/' && !int_digits.is_empty() {
        let denom_digits = &token[i + 1..];
        if denom_digits.is_empty() || !denom_digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let p: i64 = token[..i].parse().ok()?;
        let q: i64 = denom_digits.parse().ok()?;
        if q == 0 {
            return None;
        }
        return Some(Number::fraction(p, q));
    }

    let mut has_dot = false;
    let mut frac_digits = "";
    let mut after_mantissa = i;
    if i < bytes.len() && bytes[i] == b'.' {
        has_dot = true;
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        frac_digits = &token[frac_start..j];
        after_mantissa = j;
    }

    if has_dot && int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }
    if !has_dot && int_digits.is_empty() {
        return None;
    }

    let rest = &token[after_mantissa..];
    if rest.is_empty() {
        return if has_dot {
            token.parse::<f64>().ok().map(Number::Real)
        } else {
            token.parse::<i64>().ok().map(Number::Integer)
        };
    }

    let marker_len = if rest.starts_with("*10**") {
        5
    } else if rest.starts_with("*10^") {
        4
    } else if rest.starts_with('e') || rest.starts_with('E') {
        1
    } else {
        return None;
    };
    let exp_str = &rest[marker_len..];
    if exp_str.is_empty() {
        return None;
    }
    let exp_bytes = exp_str.as_bytes();
    let mut k = 0usize;
    if matches!(exp_bytes.first(), Some(b'+') | Some(b'-')) {
        k += 1;
    }
    if k == exp_bytes.len() || !exp_bytes[k..].iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let exp_val: i32 = exp_str.parse().ok()?;
    let mantissa_text = if has_dot {
        token[..after_mantissa].to_string()
    } else {
        format!("{}.0", &token[..after_mantissa])
    };
    format!("{mantissa_text}e{exp_val}").parse::<f64>().ok().map(Number::Real)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(src: &str) -> Sexpr {
        read_all(src).unwrap().into_iter().next().unwrap()
    }

    #[test]
    fn reads_void_booleans() {
        assert_eq!(read("#void"), Sexpr::Void);
        assert_eq!(read("#t"), Sexpr::Bool(true));
        assert_eq!(read("#F"), Sexpr::Bool(false));
    }

    #[test]
    fn rejects_void_followed_by_symbol_char() {
        assert!(read_all("#voidx").is_err());
    }

    #[test]
    fn reads_integers_and_fractions() {
        assert_eq!(read("42"), Sexpr::Number(Number::Integer(42)));
        assert_eq!(read("-7"), Sexpr::Number(Number::Integer(-7)));
        assert_eq!(read("4/8"), Sexpr::Number(Number::Fraction(1, 2)));
        assert_eq!(read("6/3"), Sexpr::Number(Number::Integer(2)));
    }

    #[test]
    fn reads_all_three_float_shapes() {
        assert_eq!(read("3.14"), Sexpr::Number(Number::Real(3.14)));
        assert_eq!(read(".5"), Sexpr::Number(Number::Real(0.5)));
        assert_eq!(read("1e3"), Sexpr::Number(Number::Real(1000.0)));
        assert_eq!(read("1*10**2"), Sexpr::Number(Number::Real(100.0)));
        assert_eq!(read("1*10^2"), Sexpr::Number(Number::Real(100.0)));
    }

    #[test]
    fn reads_symbols_lowercased() {
        assert_eq!(read("Foo-Bar?"), Sexpr::symbol("foo-bar?"));
    }

    #[test]
    fn reads_proper_and_improper_lists() {
        assert_eq!(read("(1 2 3)").to_string(), "(1 2 3)");
        assert_eq!(read("(1 . 2)").to_string(), "(1 . 2)");
        assert_eq!(read("()"), Sexpr::Nil);
    }

    #[test]
    fn reads_vectors() {
        assert_eq!(read("#(1 2 3)").to_string(), "#(1 2 3)");
    }

    #[test]
    fn reads_named_and_hex_chars() {
        assert_eq!(read("#\\newline"), Sexpr::Char(0x0a));
        assert_eq!(read("#\\x41"), Sexpr::Char(0x41));
        assert_eq!(read("#\\a"), Sexpr::Char(b'a'));
    }

    #[test]
    fn reads_quote_family() {
        assert_eq!(read("'x").to_string(), "(quote x)");
        assert_eq!(read("`x").to_string(), "(quasiquote x)");
        assert_eq!(read(",x").to_string(), "(unquote x)");
        assert_eq!(read(",@x").to_string(), "(unquote-splicing x)");
    }

    #[test]
    fn plain_string_collapses_to_literal() {
        assert_eq!(read("\"hello\""), Sexpr::str(b"hello".to_vec()));
    }

    #[test]
    fn interpolated_string_desugars_to_string_append() {
        let s = read("\"hello ~{(+ 1 2)} world\"");
        assert_eq!(
            s.to_string(),
            "(string-append \"hello \" (format \"~a\" (+ 1 2)) \" world\")"
        );
    }

    #[test]
    fn tilde_tilde_escapes_to_literal_tilde() {
        assert_eq!(read("\"a~~b\""), Sexpr::str(b"a~b".to_vec()));
    }

    #[test]
    fn line_comment_is_skipped() {
        assert_eq!(read("; comment\n42"), Sexpr::Number(Number::Integer(42)));
    }

    #[test]
    fn paired_comment_nests_and_respects_strings() {
        assert_eq!(read("{ a { b } \"}\" } 42"), Sexpr::Number(Number::Integer(42)));
    }

    #[test]
    fn sexpr_comment_discards_one_form() {
        assert_eq!(read("#;(1 2 3) 42"), Sexpr::Number(Number::Integer(42)));
    }

    #[test]
    fn reader_round_trip_on_closed_subset() {
        let cases = [
            "42",
            "-7",
            "3/4",
            "#t",
            "#f",
            "#void",
            "foo-bar",
            "(1 2 3)",
            "(1 . 2)",
            "#(1 2 3)",
            "#\\a",
            "#\\newline",
            "\"plain string\"",
            "\"a~~b\"",
        ];
        for case in cases {
            let first = read(case);
            let printed = first.to_string();
            let second = read(&printed);
            assert_eq!(first, second, "round-trip failed for {case:?} -> {printed:?}");
        }
    }
}
