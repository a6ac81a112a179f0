//! Expression nodes.
//!
//! Every expression carries the type assigned by the checker; it is
//! `Type::Undefined` until the expression has been checked.

use crate::tree::NodeId;
use crate::types::{ConversionKind, Type};

/// Value of a literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// `none`; encoded as the undefined constant tag without payload.
    Null,
    Boolean(bool),
    Character(char),
    Integer(i64),
    Real(f32),
    LongReal(f64),
    /// `None` is `notext`.
    Text(Option<String>),
}

impl ConstValue {
    pub fn ty(&self) -> Type {
        match self {
            ConstValue::Null => Type::none(),
            ConstValue::Boolean(_) => Type::Boolean,
            ConstValue::Character(_) => Type::Character,
            ConstValue::Integer(_) => Type::Integer,
            ConstValue::Real(_) => Type::Real,
            ConstValue::LongReal(_) => Type::LongReal,
            ConstValue::Text(_) => Type::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BinaryOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    IntDiv = 4,
    Exp = 5,
    Lt = 6,
    Le = 7,
    Eq = 8,
    Ne = 9,
    Gt = 10,
    Ge = 11,
    RefEq = 12,
    RefNe = 13,
    And = 14,
    Or = 15,
    Imp = 16,
    Eqv = 17,
    Concat = 18,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 19] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::IntDiv,
        BinaryOp::Exp,
        BinaryOp::Lt,
        BinaryOp::Le,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Gt,
        BinaryOp::Ge,
        BinaryOp::RefEq,
        BinaryOp::RefNe,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Imp,
        BinaryOp::Eqv,
        BinaryOp::Concat,
    ];

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Exp
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Imp | BinaryOp::Eqv)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "//",
            BinaryOp::Exp => "**",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::RefEq => "==",
            BinaryOp::RefNe => "=/=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Imp => "imp",
            BinaryOp::Eqv => "eqv",
            BinaryOp::Concat => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnaryOp {
    Plus = 0,
    Minus = 1,
    Not = 2,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 3] = [UnaryOp::Plus, UnaryOp::Minus, UnaryOp::Not];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AssignOp {
    /// `:=`
    Value = 0,
    /// `:-`
    Reference = 1,
}

impl AssignOp {
    pub const ALL: [AssignOp; 2] = [AssignOp::Value, AssignOp::Reference];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelationOp {
    Is = 0,
    In = 1,
}

impl RelationOp {
    pub const ALL: [RelationOp; 2] = [RelationOp::Is, RelationOp::In];
}

pub const CONVERSION_KINDS: [ConversionKind; 4] = [
    ConversionKind::DirectAssignable,
    ConversionKind::ConvertValue,
    ConversionKind::ConvertRef,
    ConversionKind::Illegal,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: ConstValue,
    pub ty: Type,
}

impl Constant {
    pub fn new(value: ConstValue) -> Self {
        let ty = value.ty();
        Constant { value, ty }
    }
}

/// Identifier occurrence, possibly with actual parameters (call or
/// subscript).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub identifier: String,
    pub arguments: Vec<NodeId>,
    pub ty: Type,
}

impl Variable {
    pub fn new(identifier: impl Into<String>) -> Self {
        Variable {
            identifier: identifier.into(),
            arguments: Vec::new(),
            ty: Type::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperation {
    pub op: BinaryOp,
    pub lhs: NodeId,
    pub rhs: NodeId,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOperation {
    pub op: UnaryOp,
    pub operand: NodeId,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub op: AssignOp,
    pub lhs: NodeId,
    pub rhs: NodeId,
    pub ty: Type,
}

/// `new C(args)`
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGenerator {
    pub class_identifier: String,
    pub arguments: Vec<NodeId>,
    pub ty: Type,
}

/// `obj.attribute(args)`
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteVariable {
    pub object: NodeId,
    pub attribute: String,
    pub arguments: Vec<NodeId>,
    pub ty: Type,
}

/// `obj qua C`
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedObject {
    pub object: NodeId,
    pub class_identifier: String,
    pub ty: Type,
}

/// `obj is C` / `obj in C`
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRelation {
    pub op: RelationOp,
    pub object: NodeId,
    pub class_identifier: String,
    pub ty: Type,
}

/// Conversion inserted by the checker around an assigned value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeConversion {
    pub expression: NodeId,
    pub conversion: ConversionKind,
    pub ty: Type,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_tables_are_indexed_by_code() {
        for (i, op) in BinaryOp::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
        for (i, op) in UnaryOp::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
        for (i, op) in AssignOp::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
        for (i, op) in RelationOp::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
    }

    #[test]
    fn constants_know_their_type() {
        assert_eq!(Constant::new(ConstValue::Integer(7)).ty, Type::Integer);
        assert_eq!(Constant::new(ConstValue::Null).ty, Type::none());
        assert_eq!(Constant::new(ConstValue::Text(None)).ty, Type::Text);
    }
}
