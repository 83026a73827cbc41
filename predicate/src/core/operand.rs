use std::{cmp::Ordering, fmt};

/// Binary operator carried by [`Expr::Binary`](super::Expr::Binary) nodes.
///
/// `And`/`Or` evaluate both sides; `AndAlso`/`OrElse` short-circuit. Filter
/// translation treats each pair identically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    /// Equals (`=`).
    Equal,
    /// Not equals (`!=`).
    NotEqual,
    /// Greater than (`>`).
    GreaterThan,
    /// Greater than or equal to (`>=`).
    GreaterThanOrEqual,
    /// Less than (`<`).
    LessThan,
    /// Less than or equal to (`<=`).
    LessThanOrEqual,
    /// Non short-circuiting conjunction.
    And,
    /// Short-circuiting conjunction.
    AndAlso,
    /// Non short-circuiting disjunction.
    Or,
    /// Short-circuiting disjunction.
    OrElse,
}

impl BinaryOp {
    /// Returns true for the six comparison operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        !self.is_logical()
    }

    /// Returns true for `And`/`AndAlso`/`Or`/`OrElse`.
    #[must_use]
    pub fn is_logical(self) -> bool {
        self.is_conjunction() || self.is_disjunction()
    }

    /// Returns true for `And`/`AndAlso`.
    #[must_use]
    pub fn is_conjunction(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::AndAlso)
    }

    /// Returns true for `Or`/`OrElse`.
    #[must_use]
    pub fn is_disjunction(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::OrElse)
    }

    /// Native filter symbol for the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::And | BinaryOp::AndAlso => "and",
            BinaryOp::Or | BinaryOp::OrElse => "or",
        }
    }

    /// Returns the operator that swaps the left/right side of the comparison.
    ///
    /// Logical operators are symmetric and returned unchanged.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            BinaryOp::GreaterThan => BinaryOp::LessThan,
            BinaryOp::GreaterThanOrEqual => BinaryOp::LessThanOrEqual,
            BinaryOp::LessThan => BinaryOp::GreaterThan,
            BinaryOp::LessThanOrEqual => BinaryOp::GreaterThanOrEqual,
            other => other,
        }
    }

    /// Evaluates a comparison operator against an ordering.
    ///
    /// Always false for logical operators.
    #[must_use]
    pub fn test_ordering(self, ordering: Ordering) -> bool {
        match self {
            BinaryOp::Equal => ordering == Ordering::Equal,
            BinaryOp::NotEqual => ordering != Ordering::Equal,
            BinaryOp::LessThan => ordering == Ordering::Less,
            BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
            BinaryOp::GreaterThan => ordering == Ordering::Greater,
            BinaryOp::GreaterThanOrEqual => ordering != Ordering::Less,
            _ => false,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// String methods a predicate may call on a member value.
///
/// None of them have a native filter form; they only run client-side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// `value.contains(arg)`.
    Contains,
    /// `value.starts_with(arg)`.
    StartsWith,
    /// `value.ends_with(arg)`.
    EndsWith,
}

impl Method {
    /// Number of arguments the method takes.
    #[must_use]
    pub fn arity(self) -> usize {
        1
    }

    /// Method name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Method::Contains => "contains",
            Method::StartsWith => "starts_with",
            Method::EndsWith => "ends_with",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flipped_swaps_ordering_only() {
        assert_eq!(BinaryOp::LessThan.flipped(), BinaryOp::GreaterThan);
        assert_eq!(BinaryOp::GreaterThanOrEqual.flipped(), BinaryOp::LessThanOrEqual);
        assert_eq!(BinaryOp::Equal.flipped(), BinaryOp::Equal);
        assert_eq!(BinaryOp::OrElse.flipped(), BinaryOp::OrElse);
    }

    #[test]
    fn symbols_collapse_short_circuit_pairs() {
        assert_eq!(BinaryOp::And.symbol(), BinaryOp::AndAlso.symbol());
        assert_eq!(BinaryOp::Or.to_string(), "or");
        assert_eq!(BinaryOp::NotEqual.to_string(), "!=");
    }
}
