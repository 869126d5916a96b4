//! Parser of the textual access policy language.
//!
//! ```text
//! expression := conjunction ( OR conjunction )*
//! conjunction := unary ( AND unary )*
//! unary      := NOT unary | '(' expression ')' | term
//! term       := token ':' token
//! AND := "and" | "&&"     OR := "or" | "||"     NOT := "not" | "!"
//! ```
//!
//! Keywords are case-insensitive and whitespace is not significant. Since a
//! term always starts with `token ':'`, keywords remain usable as attribute
//! names and values (`not:x`, `role:and`).

use super::{AccessPolicy, Attribute};
use crate::Error;

/// Maximum depth of a parsed expression tree.
pub const MAX_POLICY_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LeftParenthesis,
    RightParenthesis,
    Colon,
    And,
    Or,
    Not,
    Word(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::LeftParenthesis => "'('".to_string(),
            Self::RightParenthesis => "')'".to_string(),
            Self::Colon => "':'".to_string(),
            Self::And => "'&&'".to_string(),
            Self::Or => "'||'".to_string(),
            Self::Not => "'!'".to_string(),
            Self::Word(w) => format!("'{w}'"),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

/// Splits the expression into tokens, each with its character offset.
fn tokenize(expression: &str) -> Result<Vec<(usize, Token)>, Error> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::LeftParenthesis,
            ')' => Token::RightParenthesis,
            ':' => Token::Colon,
            '!' => Token::Not,
            '&' | '|' => {
                if chars.next_if(|&(_, next)| next == c).is_none() {
                    return Err(Error::Parse(format!(
                        "unknown combinator '{c}' at offset {offset}, expected '{c}{c}'"
                    )));
                }
                if c == '&' {
                    Token::And
                } else {
                    Token::Or
                }
            }
            c => {
                let mut word = String::from(c);
                while let Some((_, next)) = chars.next_if(|&(_, next)| {
                    !next.is_whitespace() && !matches!(next, '(' | ')' | ':' | '!' | '&' | '|')
                }) {
                    word.push(next);
                }
                Token::Word(word)
            }
        };
        tokens.push((offset, token));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    position: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(_, t)| t)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.position + 1).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn check_depth(depth: usize) -> Result<usize, Error> {
        if depth > MAX_POLICY_DEPTH {
            return Err(Error::Parse(format!(
                "expression nesting exceeds the maximum depth of {MAX_POLICY_DEPTH}"
            )));
        }
        Ok(depth)
    }

    fn is_or(&self) -> bool {
        self.peek()
            .is_some_and(|t| *t == Token::Or || t.is_keyword("or"))
    }

    fn is_and(&self) -> bool {
        self.peek()
            .is_some_and(|t| *t == Token::And || t.is_keyword("and"))
    }

    /// A `not` word is a negation unless it is the name of a term.
    fn is_not(&self) -> bool {
        match self.peek() {
            Some(Token::Not) => true,
            Some(t) if t.is_keyword("not") => self.peek_second() != Some(&Token::Colon),
            _ => false,
        }
    }

    fn expression(&mut self) -> Result<(AccessPolicy, usize), Error> {
        let (mut ap, mut depth) = self.conjunction()?;
        while self.is_or() {
            self.next();
            let (rhs, rhs_depth) = self.conjunction()?;
            depth = Self::check_depth(1 + depth.max(rhs_depth))?;
            ap = ap | rhs;
        }
        Ok((ap, depth))
    }

    fn conjunction(&mut self) -> Result<(AccessPolicy, usize), Error> {
        let (mut ap, mut depth) = self.unary()?;
        while self.is_and() {
            self.next();
            let (rhs, rhs_depth) = self.unary()?;
            depth = Self::check_depth(1 + depth.max(rhs_depth))?;
            ap = ap & rhs;
        }
        Ok((ap, depth))
    }

    fn unary(&mut self) -> Result<(AccessPolicy, usize), Error> {
        self.nesting += 1;
        Self::check_depth(self.nesting)?;
        let res = if self.is_not() {
            self.next();
            let (ap, depth) = self.unary()?;
            Ok((!ap, Self::check_depth(depth + 1)?))
        } else if self.peek() == Some(&Token::LeftParenthesis) {
            self.next();
            let res = self.expression()?;
            match self.next() {
                Some((_, Token::RightParenthesis)) => Ok(res),
                Some((offset, token)) => Err(Error::Parse(format!(
                    "expected ')' or a combinator at offset {offset}, found {}",
                    token.describe()
                ))),
                None => Err(Error::Parse(
                    "missing closing parenthesis at the end of the expression".to_string(),
                )),
            }
        } else {
            self.term().map(|ap| (ap, 1))
        };
        self.nesting -= 1;
        res
    }

    fn term(&mut self) -> Result<AccessPolicy, Error> {
        let name = match self.next() {
            Some((_, Token::Word(name))) => name,
            Some((offset, token)) => {
                return Err(Error::Parse(format!(
                    "expected a term at offset {offset}, found {}",
                    token.describe()
                )))
            }
            None => {
                return Err(Error::Parse(
                    "expected a term at the end of the expression".to_string(),
                ))
            }
        };
        match self.next() {
            Some((_, Token::Colon)) => {}
            Some((offset, token)) => {
                return Err(Error::Parse(format!(
                    "term '{name}' does not respect the format <name:value>: expected ':' at \
                     offset {offset}, found {}",
                    token.describe()
                )))
            }
            None => {
                return Err(Error::Parse(format!(
                    "term '{name}' does not respect the format <name:value>"
                )))
            }
        }
        match self.next() {
            Some((_, Token::Word(value))) => Ok(AccessPolicy::Term(Attribute::new(&name, &value))),
            Some((offset, token)) => Err(Error::Parse(format!(
                "term '{name}:' has no value: found {} at offset {offset}",
                token.describe()
            ))),
            None => Err(Error::Parse(format!("term '{name}:' has no value"))),
        }
    }
}

impl AccessPolicy {
    /// Converts a boolean expression into an `AccessPolicy`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cosmian_role_crypt::abe_policy::AccessPolicy;
    ///
    /// let ap = AccessPolicy::parse("(role: teacher) or (role: student)").unwrap();
    /// assert_eq!(
    ///     ap,
    ///     AccessPolicy::term("role", "teacher") | AccessPolicy::term("role", "student")
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// Fails with `Error::Parse` on unbalanced parentheses, unknown
    /// combinators, malformed terms, trailing input or a nesting deeper than
    /// `MAX_POLICY_DEPTH`.
    pub fn parse(expression: &str) -> Result<Self, Error> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(Error::Parse("empty policy expression".to_string()));
        }
        let mut parser = Parser {
            tokens,
            position: 0,
            nesting: 0,
        };
        let (ap, _) = parser.expression()?;
        match parser.next() {
            None => Ok(ap),
            Some((offset, Token::RightParenthesis)) => Err(Error::Parse(format!(
                "unbalanced parentheses: unexpected ')' at offset {offset}"
            ))),
            Some((offset, Token::Word(w))) => Err(Error::Parse(format!(
                "unknown combinator '{w}' at offset {offset}"
            ))),
            Some((offset, token)) => Err(Error::Parse(format!(
                "unexpected {} at offset {offset}",
                token.describe()
            ))),
        }
    }
}

impl TryFrom<&str> for AccessPolicy {
    type Error = Error;

    fn try_from(expression: &str) -> Result<Self, Self::Error> {
        Self::parse(expression)
    }
}
