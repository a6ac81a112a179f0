//! Kind tags: the closed taxonomy of syntax nodes.
//!
//! The numeric values are part of the attribute file format. `Null` and
//! `ObjectReference` are stream sentinels and never name an in-memory node.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Kind {
    Null = 0,
    ObjectReference = 1,

    // Declarations and declaration scopes
    ExternalDeclaration = 2,
    Class = 3,
    Procedure = 4,
    Block = 5,
    SimpleVariable = 6,
    Array = 7,
    Parameter = 8,
    Label = 9,
    Hidden = 10,
    Protected = 11,
    Virtual = 12,
    ConnectionBlock = 13,

    // Statements
    StandaloneExpression = 14,
    If = 15,
    While = 16,
    Goto = 17,
    Labeled = 18,
    Compound = 19,
    Inspect = 20,
    Dummy = 21,

    // Expressions
    Constant = 22,
    Variable = 23,
    Binary = 24,
    Unary = 25,
    Assignment = 26,
    ObjectGenerator = 27,
    Remote = 28,
    QualifiedObject = 29,
    ObjectRelation = 30,
    TypeConversion = 31,
}

/// Every kind, indexed by its tag.
pub const ALL_KINDS: [Kind; 32] = [
    Kind::Null,
    Kind::ObjectReference,
    Kind::ExternalDeclaration,
    Kind::Class,
    Kind::Procedure,
    Kind::Block,
    Kind::SimpleVariable,
    Kind::Array,
    Kind::Parameter,
    Kind::Label,
    Kind::Hidden,
    Kind::Protected,
    Kind::Virtual,
    Kind::ConnectionBlock,
    Kind::StandaloneExpression,
    Kind::If,
    Kind::While,
    Kind::Goto,
    Kind::Labeled,
    Kind::Compound,
    Kind::Inspect,
    Kind::Dummy,
    Kind::Constant,
    Kind::Variable,
    Kind::Binary,
    Kind::Unary,
    Kind::Assignment,
    Kind::ObjectGenerator,
    Kind::Remote,
    Kind::QualifiedObject,
    Kind::ObjectRelation,
    Kind::TypeConversion,
];

impl Kind {
    pub const MAX_TAG: u8 = Kind::TypeConversion as u8;

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Kind> {
        ALL_KINDS.get(tag as usize).copied()
    }

    /// True for the two stream sentinels.
    pub fn is_sentinel(self) -> bool {
        matches!(self, Kind::Null | Kind::ObjectReference)
    }

    pub fn is_declaration(self) -> bool {
        (Kind::ExternalDeclaration..=Kind::ConnectionBlock).contains(&self)
    }

    pub fn is_statement(self) -> bool {
        (Kind::StandaloneExpression..=Kind::Dummy).contains(&self)
    }

    pub fn is_expression(self) -> bool {
        (Kind::Constant..=Kind::TypeConversion).contains(&self)
    }

    /// Only these may appear as the top-level module of an attribute file.
    pub fn is_module(self) -> bool {
        matches!(self, Kind::Class | Kind::Procedure)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "NULL",
            Kind::ObjectReference => "ObjectReference",
            Kind::ExternalDeclaration => "ExternalDeclaration",
            Kind::Class => "Class",
            Kind::Procedure => "Procedure",
            Kind::Block => "Block",
            Kind::SimpleVariable => "SimpleVariable",
            Kind::Array => "Array",
            Kind::Parameter => "Parameter",
            Kind::Label => "Label",
            Kind::Hidden => "Hidden",
            Kind::Protected => "Protected",
            Kind::Virtual => "Virtual",
            Kind::ConnectionBlock => "ConnectionBlock",
            Kind::StandaloneExpression => "StandaloneExpression",
            Kind::If => "If",
            Kind::While => "While",
            Kind::Goto => "Goto",
            Kind::Labeled => "Labeled",
            Kind::Compound => "Compound",
            Kind::Inspect => "Inspect",
            Kind::Dummy => "Dummy",
            Kind::Constant => "Constant",
            Kind::Variable => "Variable",
            Kind::Binary => "Binary",
            Kind::Unary => "Unary",
            Kind::Assignment => "Assignment",
            Kind::ObjectGenerator => "ObjectGenerator",
            Kind::Remote => "Remote",
            Kind::QualifiedObject => "QualifiedObject",
            Kind::ObjectRelation => "ObjectRelation",
            Kind::TypeConversion => "TypeConversion",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_tag() {
        for (index, kind) in ALL_KINDS.iter().enumerate() {
            assert_eq!(kind.tag() as usize, index, "{kind} out of place");
            assert_eq!(Kind::from_tag(index as u8), Some(*kind));
        }
        assert_eq!(Kind::MAX_TAG as usize, ALL_KINDS.len() - 1);
        assert_eq!(Kind::from_tag(Kind::MAX_TAG + 1), None);
    }

    #[test]
    fn categories_partition_node_kinds() {
        for kind in ALL_KINDS {
            let categories = [
                kind.is_sentinel(),
                kind.is_declaration(),
                kind.is_statement(),
                kind.is_expression(),
            ];
            assert_eq!(categories.iter().filter(|c| **c).count(), 1, "{kind}");
        }
        assert!(Kind::Class.is_module() && Kind::Procedure.is_module());
        assert!(!Kind::Block.is_module());
    }
}
