//! The numeric tower subset this compiler supports: exact integers, reduced
//! fractions, and IEEE-754 doubles (spec.md §3, Non-goals).

use std::fmt;

/// A Scheme number: an exact integer, an exact reduced fraction, or a double.
///
/// `Fraction(p, q)` always satisfies `q > 1` and `gcd(|p|, q) == 1`; the sign
/// lives in `p`. Constructing a fraction whose reduced form collapses to an
/// integer (`q == 1`) or to zero (`p == 0`) yields `Integer` instead -- use
/// [`Number::fraction`] rather than the variant constructor directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Fraction(i64, i64),
    Real(f64),
}

impl Number {
    /// Build a number from a numerator and a nonzero denominator, reducing by
    /// gcd and collapsing to an integer per spec.md §3's fraction invariants.
    ///
    /// # Panics
    ///
    /// Panics if `q == 0`; callers (the reader) must reject `N/0` before
    /// calling this.
    pub fn fraction(p: i64, q: i64) -> Number {
        assert!(q != 0, "Number::fraction: zero denominator");
        let (p, q) = if q < 0 { (-p, -q) } else { (p, q) };
        if p == 0 {
            return Number::Integer(0);
        }
        let g = gcd(p.unsigned_abs(), q.unsigned_abs());
        let (p, q) = (p / g as i64, q / g as i64);
        if q == 1 {
            Number::Integer(p)
        } else {
            Number::Fraction(p, q)
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Number::Integer(_))
    }

    pub fn is_exact(&self) -> bool {
        !matches!(self, Number::Real(_))
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{n}"),
            Number::Fraction(p, q) => write!(f, "{p}/{q}"),
            Number::Real(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_by_gcd() {
        assert_eq!(Number::fraction(4, 8), Number::Fraction(1, 2));
        assert_eq!(Number::fraction(-4, 8), Number::Fraction(-1, 2));
        assert_eq!(Number::fraction(4, -8), Number::Fraction(-1, 2));
    }

    #[test]
    fn denominator_one_collapses_to_integer() {
        assert_eq!(Number::fraction(6, 3), Number::Integer(2));
    }

    #[test]
    fn zero_numerator_collapses_to_integer_zero() {
        assert_eq!(Number::fraction(0, 17), Number::Integer(0));
    }

    #[test]
    #[should_panic]
    fn zero_denominator_panics() {
        Number::fraction(1, 0);
    }

    #[test]
    fn display_matches_reader_grammar() {
        assert_eq!(Number::Integer(-5).to_string(), "-5");
        assert_eq!(Number::Fraction(3, 4).to_string(), "3/4");
    }
}
