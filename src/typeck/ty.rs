use crate::parse::ast::{BinOp, UnOp};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BasicType {
    Int,
    Real,
    String,
    Bool,
    /// Absence of a value, or the poison type of an erroneous expression.
    Void,
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BasicType::Int => "Int",
            BasicType::Real => "Real",
            BasicType::String => "String",
            BasicType::Bool => "Bool",
            BasicType::Void => "Void",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub basic: BasicType,
    pub is_array: bool,
}

impl TypeInfo {
    pub const INT: TypeInfo = TypeInfo::scalar(BasicType::Int);
    pub const REAL: TypeInfo = TypeInfo::scalar(BasicType::Real);
    pub const STRING: TypeInfo = TypeInfo::scalar(BasicType::String);
    pub const BOOL: TypeInfo = TypeInfo::scalar(BasicType::Bool);
    pub const VOID: TypeInfo = TypeInfo::scalar(BasicType::Void);

    pub const fn scalar(basic: BasicType) -> Self {
        Self {
            basic,
            is_array: false,
        }
    }

    pub const fn array(basic: BasicType) -> Self {
        Self {
            basic,
            is_array: true,
        }
    }

    pub fn element(self) -> Self {
        Self::scalar(self.basic)
    }

    pub fn is_void(self) -> bool {
        self.basic == BasicType::Void
    }

    pub fn is_numeric(self) -> bool {
        !self.is_array && matches!(self.basic, BasicType::Int | BasicType::Real)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}[]", self.basic)
        } else {
            fmt::Display::fmt(&self.basic, f)
        }
    }
}

/// The type two scalar operands unify to under numeric widening.
pub fn common_type(a: TypeInfo, b: TypeInfo) -> Option<BasicType> {
    use BasicType::*;

    if a.is_array || b.is_array {
        return None;
    }
    match (a.basic, b.basic) {
        (Void, _) | (_, Void) => None,
        (Int, Real) | (Real, Int) => Some(Real),
        (x, y) if x == y => Some(x),
        _ => None,
    }
}

/// Operand type and result type of `left op right`, if the operator applies.
pub fn binary_result(op: BinOp, left: TypeInfo, right: TypeInfo) -> Option<(BasicType, TypeInfo)> {
    use BasicType::*;

    let common = common_type(left, right)?;
    if op.is_comparison() {
        return Some((common, TypeInfo::BOOL));
    }

    let operand = match (common, op) {
        (Int, BinOp::Div) => Real,
        (Int, BinOp::Add) | (Int, BinOp::Sub) | (Int, BinOp::Mul) | (Int, BinOp::Rem) => Int,
        (Real, BinOp::Add) | (Real, BinOp::Sub) | (Real, BinOp::Mul) | (Real, BinOp::Div) => Real,
        (String, BinOp::Add) => String,
        (Bool, BinOp::And) | (Bool, BinOp::Or) => Bool,
        _ => return None,
    };
    Some((operand, TypeInfo::scalar(operand)))
}

pub fn unary_result(op: UnOp, operand: TypeInfo) -> Option<TypeInfo> {
    match op {
        UnOp::Not if operand == TypeInfo::BOOL => Some(TypeInfo::BOOL),
        UnOp::Not => None,
    }
}

/// Whether a value of type `value` may be stored in a variable of type `target`.
pub fn assignable(target: TypeInfo, value: TypeInfo) -> bool {
    if target.is_array || value.is_array {
        return target == value;
    }
    common_type(target, value) == Some(target.basic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(TypeInfo::INT.to_string(), "Int");
        assert_eq!(TypeInfo::array(BasicType::String).to_string(), "String[]");
    }

    #[test]
    fn widening() {
        assert_eq!(common_type(TypeInfo::INT, TypeInfo::REAL), Some(BasicType::Real));
        assert_eq!(common_type(TypeInfo::BOOL, TypeInfo::INT), None);
        assert_eq!(
            common_type(TypeInfo::array(BasicType::Int), TypeInfo::array(BasicType::Int)),
            None
        );
        assert!(assignable(TypeInfo::REAL, TypeInfo::INT));
        assert!(!assignable(TypeInfo::INT, TypeInfo::REAL));
        assert!(!assignable(
            TypeInfo::array(BasicType::Real),
            TypeInfo::array(BasicType::Int)
        ));
    }

    #[test]
    fn operator_applicability() {
        assert_eq!(
            binary_result(BinOp::And, TypeInfo::BOOL, TypeInfo::BOOL),
            Some((BasicType::Bool, TypeInfo::BOOL))
        );
        assert_eq!(binary_result(BinOp::Rem, TypeInfo::INT, TypeInfo::REAL), None);
        assert_eq!(
            binary_result(BinOp::Add, TypeInfo::STRING, TypeInfo::STRING),
            Some((BasicType::String, TypeInfo::STRING))
        );
        assert_eq!(
            binary_result(BinOp::Lt, TypeInfo::STRING, TypeInfo::STRING),
            Some((BasicType::String, TypeInfo::BOOL))
        );
        assert_eq!(binary_result(BinOp::Sub, TypeInfo::STRING, TypeInfo::STRING), None);
        assert_eq!(binary_result(BinOp::Or, TypeInfo::INT, TypeInfo::INT), None);
    }

    #[test]
    fn integer_division_is_real() {
        assert_eq!(
            binary_result(BinOp::Div, TypeInfo::INT, TypeInfo::INT),
            Some((BasicType::Real, TypeInfo::REAL))
        );
        assert_eq!(
            binary_result(BinOp::Eq, TypeInfo::INT, TypeInfo::REAL),
            Some((BasicType::Real, TypeInfo::BOOL))
        );
    }

    #[test]
    fn not_needs_bool() {
        assert_eq!(unary_result(UnOp::Not, TypeInfo::BOOL), Some(TypeInfo::BOOL));
        assert_eq!(unary_result(UnOp::Not, TypeInfo::INT), None);
    }
}
