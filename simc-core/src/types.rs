//! Type lattice of the language.
//!
//! This module defines the value and reference types, the conversion
//! classification used by assignments and parameter transmission, and the
//! common-type rule used by arithmetic and conditional expressions.
//! Questions about the class hierarchy are delegated to a [`ClassLookup`],
//! which the meaning resolver implements for a concrete scope.

use std::fmt;

use crate::tree::NodeId;

#[derive(Debug, Clone)]
pub enum Type {
    Undefined,
    Integer,
    Real,
    LongReal,
    Boolean,
    Character,
    Text,
    /// Reference qualified by a class identifier; `None` is the type of
    /// `none` and is a sub-reference of every reference type.
    Ref(Option<String>),
    Procedure,
    Label,
}

/// One-byte type tags used by the attribute file. Constant tags reuse them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    Undefined = 0,
    Boolean = 1,
    Character = 2,
    Integer = 3,
    Real = 4,
    LongReal = 5,
    Text = 6,
    Ref = 7,
    Procedure = 8,
    Label = 9,
}

impl TypeTag {
    pub fn from_byte(byte: u8) -> Option<TypeTag> {
        let tag = match byte {
            0 => TypeTag::Undefined,
            1 => TypeTag::Boolean,
            2 => TypeTag::Character,
            3 => TypeTag::Integer,
            4 => TypeTag::Real,
            5 => TypeTag::LongReal,
            6 => TypeTag::Text,
            7 => TypeTag::Ref,
            8 => TypeTag::Procedure,
            9 => TypeTag::Label,
            _ => return None,
        };
        Some(tag)
    }
}

impl Type {
    pub fn reference(class_identifier: impl Into<String>) -> Type {
        Type::Ref(Some(class_identifier.into()))
    }

    /// The type of `none`.
    pub fn none() -> Type {
        Type::Ref(None)
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Type::Undefined => TypeTag::Undefined,
            Type::Integer => TypeTag::Integer,
            Type::Real => TypeTag::Real,
            Type::LongReal => TypeTag::LongReal,
            Type::Boolean => TypeTag::Boolean,
            Type::Character => TypeTag::Character,
            Type::Text => TypeTag::Text,
            Type::Ref(_) => TypeTag::Ref,
            Type::Procedure => TypeTag::Procedure,
            Type::Label => TypeTag::Label,
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Type::Integer | Type::Real | Type::LongReal)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Ref(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Type::Undefined)
    }

    pub fn class_identifier(&self) -> Option<&str> {
        match self {
            Type::Ref(ident) => ident.as_deref(),
            _ => None,
        }
    }

    /// Position in integer < real < long real.
    fn arithmetic_rank(&self) -> Option<u8> {
        match self {
            Type::Integer => Some(0),
            Type::Real => Some(1),
            Type::LongReal => Some(2),
            _ => None,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Ref(a), Type::Ref(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            },
            _ => self.tag() == other.tag(),
        }
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Undefined => f.write_str("notype"),
            Type::Integer => f.write_str("integer"),
            Type::Real => f.write_str("real"),
            Type::LongReal => f.write_str("long real"),
            Type::Boolean => f.write_str("boolean"),
            Type::Character => f.write_str("character"),
            Type::Text => f.write_str("text"),
            Type::Ref(Some(ident)) => write!(f, "ref({ident})"),
            Type::Ref(None) => f.write_str("ref(NONE)"),
            Type::Procedure => f.write_str("procedure"),
            Type::Label => f.write_str("label"),
        }
    }
}

/// How a value of one type reaches a variable of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    DirectAssignable,
    /// Numeric widening or narrowing; narrowing may need a range check.
    ConvertValue,
    /// Reference downcast; needs a runtime qualification check.
    ConvertRef,
    Illegal,
}

/// Class hierarchy as seen from one resolution scope.
pub trait ClassLookup {
    /// Resolve a class identifier to the class declaration visible here.
    fn lookup_class(&self, identifier: &str) -> Option<NodeId>;

    /// Strict subclass test over the prefix chain.
    fn is_subclass(&self, sub: NodeId, sup: NodeId) -> bool;
}

/// `sub` is a sub-reference of `sup`.
///
/// NONE is a sub-reference of everything and nothing but NONE is a
/// sub-reference of NONE. Otherwise both qualifications are resolved and
/// the prefix chain decides; the relation is not reflexive.
pub fn is_sub_reference_of(classes: &impl ClassLookup, sub: &Type, sup: &Type) -> bool {
    let (Type::Ref(sub), Type::Ref(sup)) = (sub, sup) else {
        return false;
    };
    let Some(sub) = sub else {
        return true;
    };
    let Some(sup) = sup else {
        return false;
    };
    match (classes.lookup_class(sub), classes.lookup_class(sup)) {
        (Some(sub), Some(sup)) => classes.is_subclass(sub, sup),
        _ => false,
    }
}

pub fn is_convertible_to(classes: &impl ClassLookup, from: &Type, to: &Type) -> ConversionKind {
    if to.is_undefined() || from == to {
        ConversionKind::DirectAssignable
    } else if from.is_arithmetic() && to.is_arithmetic() {
        ConversionKind::ConvertValue
    } else if is_sub_reference_of(classes, from, to) {
        ConversionKind::DirectAssignable
    } else if is_sub_reference_of(classes, to, from) {
        ConversionKind::ConvertRef
    } else {
        ConversionKind::Illegal
    }
}

/// Common type of two operands, or `None` when they are incompatible.
///
/// Arithmetic operands yield the dominant of the two; reference operands
/// yield the more general one when one qualifies the other.
pub fn common_type(classes: &impl ClassLookup, a: &Type, b: &Type) -> Option<Type> {
    if a == b {
        return Some(a.clone());
    }
    if let (Some(ra), Some(rb)) = (a.arithmetic_rank(), b.arithmetic_rank()) {
        return Some(if ra >= rb { a.clone() } else { b.clone() });
    }
    if a.is_reference() && b.is_reference() {
        if is_sub_reference_of(classes, a, b) {
            return Some(b.clone());
        }
        if is_sub_reference_of(classes, b, a) {
            return Some(a.clone());
        }
    }
    None
}
