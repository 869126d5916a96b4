use std::{
    fmt::{Debug, Display},
    ops::{BitAnd, BitOr, Not},
};

use super::{Attribute, AttributeSet};

/// An `AccessPolicy` is a boolean expression over attribute equality terms.
///
/// Trees are built by the parser (see `AccessPolicy::parse`) or in code with
/// the `&`, `|` and `!` operators:
/// ```
/// use cosmian_role_crypt::abe_policy::AccessPolicy;
///
/// let ap = AccessPolicy::term("role", "teacher")
///     | (AccessPolicy::term("role", "student") & !AccessPolicy::term("status", "suspended"));
/// assert_eq!(
///     ap.to_string(),
///     "role:teacher or role:student and not status:suspended"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessPolicy {
    Term(Attribute),
    And(Box<AccessPolicy>, Box<AccessPolicy>),
    Or(Box<AccessPolicy>, Box<AccessPolicy>),
    Not(Box<AccessPolicy>),
}

impl AccessPolicy {
    /// Creates an access policy based on a single attribute term.
    #[must_use]
    pub fn term(name: &str, value: &str) -> Self {
        Self::Term(Attribute::new(name, value))
    }

    /// Returns `true` if the given attribute set satisfies this policy.
    ///
    /// A term is satisfied iff the set binds its name to exactly its value.
    /// This is the only satisfaction function of the crate: encryption uses
    /// it to select the coordinates to encapsulate for and decryption uses
    /// it to accept or deny a key.
    #[must_use]
    pub fn evaluate(&self, attributes: &AttributeSet) -> bool {
        match self {
            Self::Term(attribute) => attributes.contains(attribute),
            Self::And(lhs, rhs) => lhs.evaluate(attributes) && rhs.evaluate(attributes),
            Self::Or(lhs, rhs) => lhs.evaluate(attributes) || rhs.evaluate(attributes),
            Self::Not(ap) => !ap.evaluate(attributes),
        }
    }

    /// Returns the attributes referenced by the policy terms, in order of
    /// appearance.
    #[must_use]
    pub fn attributes(&self) -> Vec<&Attribute> {
        match self {
            Self::Term(attribute) => vec![attribute],
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                [lhs.attributes(), rhs.attributes()].concat()
            }
            Self::Not(ap) => ap.attributes(),
        }
    }

    /// Depth of the expression tree, a single term having depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Term(_) => 1,
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => 1 + lhs.depth().max(rhs.depth()),
            Self::Not(ap) => 1 + ap.depth(),
        }
    }

    /// Binding strength used to place parentheses when printing.
    fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => 1,
            Self::And(..) => 2,
            Self::Not(_) | Self::Term(_) => 3,
        }
    }

    fn fmt_operand(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        parenthesize: bool,
    ) -> std::fmt::Result {
        if parenthesize {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Prints the canonical text form: parsing it back yields the same tree.
/// Binary operators are left-associative, so a right operand of the same
/// precedence is parenthesized.
impl Display for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Term(attribute) => write!(f, "{attribute}"),
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                let operator = if matches!(self, Self::And(..)) {
                    "and"
                } else {
                    "or"
                };
                lhs.fmt_operand(f, lhs.precedence() < self.precedence())?;
                write!(f, " {operator} ")?;
                rhs.fmt_operand(f, rhs.precedence() <= self.precedence())
            }
            Self::Not(ap) => {
                write!(f, "not ")?;
                ap.fmt_operand(f, ap.precedence() < self.precedence())
            }
        }
    }
}

// use A & B to construct And(A, B)
impl BitAnd for AccessPolicy {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

// use A | B to construct Or(A, B)
impl BitOr for AccessPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

// use !A to construct Not(A)
impl Not for AccessPolicy {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}
