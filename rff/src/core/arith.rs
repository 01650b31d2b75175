//! Exact arithmetic over `+ - * /` and parentheses.
//!
//! Values are reduced rationals so expressions like `12/(3-5/2)` compare exactly.
//! Only non-negative integer literals are accepted; unary minus is allowed.

use std::fmt;
use std::str::FromStr;

/// Reduced fraction with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i128,
    den: i128,
}

impl Rational {
    pub fn new(num: i128, den: i128) -> Result<Self, String> {
        if den == 0 {
            return Err("division by zero".to_string());
        }
        let g = gcd(checked(num.checked_abs())?, checked(den.checked_abs())?).max(1);
        let (num, den) = (num / g, den / g);
        if den < 0 {
            return Ok(Self {
                num: checked(num.checked_neg())?,
                den: checked(den.checked_neg())?,
            });
        }
        Ok(Self { num, den })
    }

    pub fn integer(value: i128) -> Self {
        Self { num: value, den: 1 }
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    fn add(self, rhs: Self) -> Result<Self, String> {
        let num = checked(self.num.checked_mul(rhs.den))?
            .checked_add(checked(rhs.num.checked_mul(self.den))?);
        Self::new(checked(num)?, checked(self.den.checked_mul(rhs.den))?)
    }

    fn neg(self) -> Result<Self, String> {
        Ok(Self {
            num: checked(self.num.checked_neg())?,
            den: self.den,
        })
    }

    fn mul(self, rhs: Self) -> Result<Self, String> {
        Self::new(
            checked(self.num.checked_mul(rhs.num))?,
            checked(self.den.checked_mul(rhs.den))?,
        )
    }

    fn div(self, rhs: Self) -> Result<Self, String> {
        if rhs.num == 0 {
            return Err("division by zero".to_string());
        }
        Self::new(
            checked(self.num.checked_mul(rhs.den))?,
            checked(self.den.checked_mul(rhs.num))?,
        )
    }
}

fn checked(value: Option<i128>) -> Result<i128, String> {
    value.ok_or_else(|| "arithmetic overflow".to_string())
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Parses any expression (so `"3/2"`, `"24"`, and `"(1+2)*8"` all work).
impl FromStr for Rational {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        evaluate(s).map(|eval| eval.value)
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub value: Rational,
    /// Integer literals in source order.
    pub literals: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Num(u64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                let value = digits
                    .parse::<u64>()
                    .map_err(|err| format!("bad number '{digits}': {err}"))?;
                tokens.push(Token::Num(value));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' | '−' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' | '×' | 'x' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' | '÷' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    literals: Vec<u64>,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Rational, String> {
        let mut acc = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.bump();
            let rhs = self.term()?;
            acc = if op == Token::Plus {
                acc.add(rhs)?
            } else {
                acc.add(rhs.neg()?)?
            };
        }
        Ok(acc)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Rational, String> {
        let mut acc = self.factor()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.bump();
            let rhs = self.factor()?;
            acc = if op == Token::Star {
                acc.mul(rhs)?
            } else {
                acc.div(rhs)?
            };
        }
        Ok(acc)
    }

    // factor := '-' factor | number | '(' expr ')'
    fn factor(&mut self) -> Result<Rational, String> {
        match self.bump() {
            Some(Token::Minus) => self.factor()?.neg(),
            Some(Token::Num(n)) => {
                self.literals.push(n);
                Ok(Rational::integer(i128::from(n)))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("unbalanced parentheses".to_string()),
                }
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Evaluate `input` exactly, collecting the integer literals it uses.
pub fn evaluate(input: &str) -> Result<Evaluation, String> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        literals: Vec::new(),
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "trailing input after position {} in '{}'",
            parser.pos,
            input.trim()
        ));
    }
    Ok(Evaluation {
        value,
        literals: parser.literals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_precedence_and_parentheses() {
        assert_eq!(evaluate("2+3*4").unwrap().value, Rational::integer(14));
        assert_eq!(evaluate("(2+3)*4").unwrap().value, Rational::integer(20));
        assert_eq!(evaluate("-(1-9)*3").unwrap().value, Rational::integer(24));
    }

    #[test]
    fn division_is_exact() {
        let eval = evaluate("12/(3-5/2)").unwrap();
        assert_eq!(eval.value, Rational::integer(24));
        assert_eq!(eval.literals, vec![12, 3, 5, 2]);
        assert_eq!(evaluate("3/2").unwrap().value.to_string(), "3/2");
    }

    #[test]
    fn rejects_garbage_and_zero_division() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(1+2").is_err());
        assert!(evaluate("4/(2-2)").is_err());
        assert!(evaluate("import os").is_err());
    }

    #[test]
    fn symbols_parse_back_to_values() {
        let half: Rational = "1/2".parse().unwrap();
        assert_eq!(half, Rational::new(2, 4).unwrap());
        assert!(!half.is_integer());
        assert!("24".parse::<Rational>().unwrap().is_integer());
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        let err = evaluate("-9223372036854775808*9223372036854775808*2").unwrap_err();
        assert_eq!(err, "arithmetic overflow");
        let err = evaluate("-(9223372036854775808*9223372036854775808*2)").unwrap_err();
        assert_eq!(err, "arithmetic overflow");
        assert!(Rational::new(i128::MIN, 1).is_err());
        assert!(Rational::new(1, i128::MIN).is_err());
        assert!(evaluate("99999999999999999999999").is_err());
    }
}
