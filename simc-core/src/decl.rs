//! Declaration nodes and the two per-scope collections.
//!
//! Links to other nodes are plain [`NodeId`] handles. `declared_in`,
//! `prefix_class`, `protected_by` and `hidden_by` point back up or across
//! the tree and do not own their target.

use crate::kind::Kind;
use crate::options::same_identifier;
use crate::tree::NodeId;
use crate::types::Type;

/// Ordered, identifier-unique list of the declarations of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationList {
    entries: Vec<(String, NodeId)>,
}

impl DeclarationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` unless `identifier` is already present, in which case
    /// the existing declaration is returned and the list is unchanged.
    pub fn add(&mut self, identifier: &str, id: NodeId, case_sensitive: bool) -> Result<(), NodeId> {
        if let Some(existing) = self.find(identifier, case_sensitive) {
            return Err(existing);
        }
        self.entries.push((identifier.to_string(), id));
        Ok(())
    }

    pub fn find(&self, identifier: &str, case_sensitive: bool) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|(name, _)| same_identifier(name, identifier, case_sensitive))
            .map(|(_, id)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Labels declared in one scope.
///
/// The accumulated list (prefix labels first, then local ones) is computed
/// on demand by [`crate::tree::SyntaxTree::accumulated_labels`] and cached
/// here. Once the list is ready for coding no label may be added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelList {
    local: Vec<NodeId>,
    accumulated: Option<Vec<NodeId>>,
    ready_for_coding: bool,
}

impl LabelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(&self) -> &[NodeId] {
        &self.local
    }

    pub fn accumulated(&self) -> Option<&[NodeId]> {
        self.accumulated.as_deref()
    }

    pub fn is_ready_for_coding(&self) -> bool {
        self.ready_for_coding
    }

    pub fn mark_ready_for_coding(&mut self) {
        self.ready_for_coding = true;
    }

    /// Returns false once the list is ready for coding.
    pub(crate) fn push(&mut self, label: NodeId) -> bool {
        if self.ready_for_coding {
            return false;
        }
        self.local.push(label);
        self.accumulated = None;
        true
    }

    pub(crate) fn set_accumulated(&mut self, labels: Vec<NodeId>) {
        self.accumulated = Some(labels);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDeclaration {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    /// `Class` or `Procedure`.
    pub module_kind: Kind,
    /// Entry name of the attribute file holding the module.
    pub attribute_file: String,
    /// Loaded module; set by the attribute reader, never persisted.
    pub module: Option<NodeId>,
}

impl ExternalDeclaration {
    pub fn new(identifier: impl Into<String>, module_kind: Kind, attribute_file: impl Into<String>) -> Self {
        ExternalDeclaration {
            identifier: identifier.into(),
            declared_in: None,
            module_kind,
            attribute_file: attribute_file.into(),
            module: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDeclaration {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    /// Prefix identifier as written.
    pub prefix: Option<String>,
    /// Resolved prefix class.
    pub prefix_class: Option<NodeId>,
    pub parameters: Vec<NodeId>,
    pub virtuals: Vec<NodeId>,
    pub hidden: Vec<NodeId>,
    pub protected: Vec<NodeId>,
    pub declarations: DeclarationList,
    pub labels: LabelList,
    pub statements: Vec<NodeId>,
}

impl ClassDeclaration {
    pub fn new(identifier: impl Into<String>) -> Self {
        ClassDeclaration {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn prefixed(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDeclaration {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    /// Result type, `Undefined` for a proper procedure.
    pub ty: Type,
    pub parameters: Vec<NodeId>,
    pub declarations: DeclarationList,
    pub labels: LabelList,
    pub statements: Vec<NodeId>,
}

impl ProcedureDeclaration {
    pub fn new(identifier: impl Into<String>, ty: Type) -> Self {
        ProcedureDeclaration {
            identifier: identifier.into(),
            declared_in: None,
            ty,
            parameters: Vec::new(),
            declarations: DeclarationList::new(),
            labels: LabelList::new(),
            statements: Vec::new(),
        }
    }
}

/// Program main block or an inner block with declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockDeclaration {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    pub declarations: DeclarationList,
    pub labels: LabelList,
    pub statements: Vec<NodeId>,
}

impl BlockDeclaration {
    pub fn new(identifier: impl Into<String>) -> Self {
        BlockDeclaration {
            identifier: identifier.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleVariableDeclaration {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    pub ty: Type,
    /// Initial value of a constant declaration.
    pub constant: Option<NodeId>,
}

impl SimpleVariableDeclaration {
    pub fn new(identifier: impl Into<String>, ty: Type) -> Self {
        SimpleVariableDeclaration {
            identifier: identifier.into(),
            declared_in: None,
            ty,
            constant: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDeclaration {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    pub ty: Type,
    pub dimensions: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParameterMode {
    Default = 0,
    Value = 1,
    Name = 2,
}

impl ParameterMode {
    pub const ALL: [ParameterMode; 3] = [ParameterMode::Default, ParameterMode::Value, ParameterMode::Name];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParameterKind {
    Simple = 0,
    Array = 1,
    Procedure = 2,
    Label = 3,
}

impl ParameterKind {
    pub const ALL: [ParameterKind; 4] = [
        ParameterKind::Simple,
        ParameterKind::Array,
        ParameterKind::Procedure,
        ParameterKind::Label,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    pub ty: Type,
    pub mode: ParameterMode,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new(identifier: impl Into<String>, ty: Type) -> Self {
        Parameter {
            identifier: identifier.into(),
            declared_in: None,
            ty,
            mode: ParameterMode::Default,
            kind: ParameterKind::Simple,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelDeclaration {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    /// 1-based index in the accumulated label list; 0 until accumulated.
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HiddenSpecification {
    pub identifier: String,
    pub scope: Option<NodeId>,
    pub protected_by: Option<NodeId>,
}

impl HiddenSpecification {
    pub fn new(identifier: impl Into<String>) -> Self {
        HiddenSpecification {
            identifier: identifier.into(),
            scope: None,
            protected_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedSpecification {
    pub identifier: String,
    pub scope: Option<NodeId>,
    pub hidden_by: Option<NodeId>,
}

impl ProtectedSpecification {
    pub fn new(identifier: impl Into<String>) -> Self {
        ProtectedSpecification {
            identifier: identifier.into(),
            scope: None,
            hidden_by: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VirtualKind {
    Procedure = 0,
    Label = 1,
    Switch = 2,
}

impl VirtualKind {
    pub const ALL: [VirtualKind; 3] = [VirtualKind::Procedure, VirtualKind::Label, VirtualKind::Switch];
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualSpecification {
    pub identifier: String,
    pub declared_in: Option<NodeId>,
    pub kind: VirtualKind,
    pub ty: Type,
}

/// One `when` branch (or the plain `do` part) of an inspect statement.
///
/// Inside the block, attributes of the connected class are visible
/// without remote qualification.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionBlock {
    pub declared_in: Option<NodeId>,
    /// The inspected expression, shared with the inspect statement.
    pub inspected: Option<NodeId>,
    pub when_class: Option<String>,
    /// Class whose attributes are connected, resolved by the checker.
    pub class_declaration: Option<NodeId>,
    pub statement: Option<NodeId>,
}

impl ConnectionBlock {
    pub fn new(inspected: NodeId, when_class: Option<String>, statement: NodeId) -> Self {
        ConnectionBlock {
            declared_in: None,
            inspected: Some(inspected),
            when_class,
            class_declaration: None,
            statement: Some(statement),
        }
    }
}
