//! The `Sexpr` tagged union (spec.md §3 "S-expression").
//!
//! `Sexpr` is deliberately a plain, cheaply-clonable value: the reader
//! builds it directly from source text, the tag parser pattern-matches on
//! it, and the constants table walks and structurally compares it. No stage
//! ever mutates an `Sexpr` in place -- the `set-car!`/`vector-set!`-style
//! mutation the generated program performs at run time is a property of the
//! *emitted assembly*, not of this compile-time data structure, so `Pair`
//! and `Vector` hold plain `Rc`-shared immutable contents rather than
//! `RefCell`s.

use crate::number::Number;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Sexpr {
    Void,
    Nil,
    Bool(bool),
    Char(u8),
    /// A byte string (spec.md §3: "string (byte sequence)").
    Str(Rc<Vec<u8>>),
    /// An interned symbol: two symbols are equal iff their names are equal
    /// (spec.md §3). Interning identity itself lives in the constants table,
    /// not here -- this is just the name.
    Symbol(Rc<str>),
    Number(Number),
    Vector(Rc<Vec<Sexpr>>),
    Pair(Rc<(Sexpr, Sexpr)>),
}

impl Sexpr {
    pub fn str(bytes: impl Into<Vec<u8>>) -> Sexpr {
        Sexpr::Str(Rc::new(bytes.into()))
    }

    pub fn symbol(name: impl Into<String>) -> Sexpr {
        Sexpr::Symbol(Rc::from(name.into()))
    }

    pub fn cons(car: Sexpr, cdr: Sexpr) -> Sexpr {
        Sexpr::Pair(Rc::new((car, cdr)))
    }

    pub fn vector(items: Vec<Sexpr>) -> Sexpr {
        Sexpr::Vector(Rc::new(items))
    }

    /// Build a proper list, right-nesting `cons` cells and terminating in `Nil`.
    pub fn list(items: impl IntoIterator<Item = Sexpr>) -> Sexpr {
        let items: Vec<Sexpr> = items.into_iter().collect();
        let mut out = Sexpr::Nil;
        for item in items.into_iter().rev() {
            out = Sexpr::cons(item, out);
        }
        out
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Sexpr::Nil)
    }

    pub fn as_pair(&self) -> Option<(&Sexpr, &Sexpr)> {
        match self {
            Sexpr::Pair(p) => Some((&p.0, &p.1)),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Sexpr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Is this a proper list (right-nested pairs terminating in `Nil`)?
    pub fn is_proper_list(&self) -> bool {
        let mut cur = self;
        loop {
            match cur {
                Sexpr::Nil => return true,
                Sexpr::Pair(p) => cur = &p.1,
                _ => return false,
            }
        }
    }

    /// Iterate the elements of a (possibly improper) list, returning the
    /// final tail (`Nil` for a proper list, the dotted tail otherwise).
    pub fn list_items(&self) -> (Vec<Sexpr>, Sexpr) {
        let mut items = Vec::new();
        let mut cur = self.clone();
        loop {
            match cur {
                Sexpr::Pair(p) => {
                    items.push(p.0.clone());
                    cur = p.1.clone();
                }
                tail => return (items, tail),
            }
        }
    }

    /// The byte-name table for `#\name` literals and their canonical print
    /// form (spec.md §4.1).
    pub const NAMED_CHARS: &'static [(&'static str, u8)] = &[
        ("nul", 0x00),
        ("alarm", 0x07),
        ("backspace", 0x08),
        ("page", 0x0c),
        ("space", 0x20),
        ("newline", 0x0a),
        ("return", 0x0d),
        ("tab", 0x09),
    ];

    pub fn char_name(byte: u8) -> Option<&'static str> {
        Self::NAMED_CHARS
            .iter()
            .find(|(_, b)| *b == byte)
            .map(|(name, _)| *name)
    }
}

impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Sexpr::Void, Sexpr::Void) => true,
            (Sexpr::Nil, Sexpr::Nil) => true,
            (Sexpr::Bool(a), Sexpr::Bool(b)) => a == b,
            (Sexpr::Char(a), Sexpr::Char(b)) => a == b,
            (Sexpr::Str(a), Sexpr::Str(b)) => a == b,
            (Sexpr::Symbol(a), Sexpr::Symbol(b)) => a == b,
            (Sexpr::Number(a), Sexpr::Number(b)) => a == b,
            (Sexpr::Vector(a), Sexpr::Vector(b)) => a == b,
            (Sexpr::Pair(a), Sexpr::Pair(b)) => a.0 == b.0 && a.1 == b.1,
            _ => false,
        }
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Void => write!(f, "#void"),
            Sexpr::Nil => write!(f, "()"),
            Sexpr::Bool(true) => write!(f, "#t"),
            Sexpr::Bool(false) => write!(f, "#f"),
            Sexpr::Char(b) => match Sexpr::char_name(*b) {
                Some(name) => write!(f, "#\\{name}"),
                None if (0x21..=0x7e).contains(b) => write!(f, "#\\{}", *b as char),
                None => write!(f, "#\\x{b:x}"),
            },
            Sexpr::Str(bytes) => {
                write!(f, "\"")?;
                for &b in bytes.iter() {
                    match b {
                        b'\\' => write!(f, "\\\\")?,
                        b'"' => write!(f, "\\\"")?,
                        b'\n' => write!(f, "\\n")?,
                        b'\r' => write!(f, "\\r")?,
                        0x0c => write!(f, "\\f")?,
                        b'\t' => write!(f, "\\t")?,
                        b'~' => write!(f, "~~")?,
                        0x20..=0x7e => write!(f, "{}", b as char)?,
                        _ => write!(f, "\\x{b:x};")?,
                    }
                }
                write!(f, "\"")
            }
            Sexpr::Symbol(s) => write!(f, "{s}"),
            Sexpr::Number(n) => write!(f, "{n}"),
            Sexpr::Vector(items) => {
                write!(f, "#(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Sexpr::Pair(_) => {
                write!(f, "(")?;
                let (items, tail) = self.list_items();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                if !tail.is_nil() {
                    write!(f, " . {tail}")?;
                }
                write!(f, ")")
            }
        }
    }
}
