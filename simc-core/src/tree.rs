//! Arena of syntax nodes.
//!
//! Nodes are addressed by [`NodeId`] handles into one [`SyntaxTree`].
//! Cyclic relationships (a procedure pointing at its enclosing class, a
//! class pointing at its prefix) are just handles, so the tree can be
//! persisted and restored without any ownership gymnastics.

use std::fmt;

use crate::decl::{
    ArrayDeclaration, BlockDeclaration, ClassDeclaration, ConnectionBlock, DeclarationList,
    ExternalDeclaration, HiddenSpecification, LabelDeclaration, LabelList, Parameter,
    ProcedureDeclaration, ProtectedSpecification, SimpleVariableDeclaration, VirtualSpecification,
};
use crate::diagnostic::{Diagnostics, codes};
use crate::error::{CoreError, Result};
use crate::expr::{
    Assignment, BinaryOperation, Constant, ObjectGenerator, ObjectRelation, QualifiedObject,
    RemoteVariable, TypeConversion, UnaryOperation, Variable,
};
use crate::kind::Kind;
use crate::stmt::{
    CompoundStatement, GotoStatement, IfStatement, InspectStatement, LabeledStatement,
    StandaloneExpression, WhileStatement,
};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: u32) -> Self {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    /// 1-based source line.
    pub line: u32,
    pub data: NodeData,
}

/// One variant per node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// Allocated by the attribute reader, fields not read yet.
    Pending,

    External(ExternalDeclaration),
    Class(ClassDeclaration),
    Procedure(ProcedureDeclaration),
    Block(BlockDeclaration),
    SimpleVariable(SimpleVariableDeclaration),
    Array(ArrayDeclaration),
    Parameter(Parameter),
    Label(LabelDeclaration),
    Hidden(HiddenSpecification),
    Protected(ProtectedSpecification),
    Virtual(VirtualSpecification),
    Connection(ConnectionBlock),

    StandaloneExpression(StandaloneExpression),
    If(IfStatement),
    While(WhileStatement),
    Goto(GotoStatement),
    Labeled(LabeledStatement),
    Compound(CompoundStatement),
    Inspect(InspectStatement),
    Dummy,

    Constant(Constant),
    Variable(Variable),
    Binary(BinaryOperation),
    Unary(UnaryOperation),
    Assignment(Assignment),
    ObjectGenerator(ObjectGenerator),
    Remote(RemoteVariable),
    QualifiedObject(QualifiedObject),
    ObjectRelation(ObjectRelation),
    TypeConversion(TypeConversion),
}

impl NodeData {
    /// Kind tag of the node; `Null` while pending.
    pub fn kind(&self) -> Kind {
        match self {
            NodeData::Pending => Kind::Null,
            NodeData::External(_) => Kind::ExternalDeclaration,
            NodeData::Class(_) => Kind::Class,
            NodeData::Procedure(_) => Kind::Procedure,
            NodeData::Block(_) => Kind::Block,
            NodeData::SimpleVariable(_) => Kind::SimpleVariable,
            NodeData::Array(_) => Kind::Array,
            NodeData::Parameter(_) => Kind::Parameter,
            NodeData::Label(_) => Kind::Label,
            NodeData::Hidden(_) => Kind::Hidden,
            NodeData::Protected(_) => Kind::Protected,
            NodeData::Virtual(_) => Kind::Virtual,
            NodeData::Connection(_) => Kind::ConnectionBlock,
            NodeData::StandaloneExpression(_) => Kind::StandaloneExpression,
            NodeData::If(_) => Kind::If,
            NodeData::While(_) => Kind::While,
            NodeData::Goto(_) => Kind::Goto,
            NodeData::Labeled(_) => Kind::Labeled,
            NodeData::Compound(_) => Kind::Compound,
            NodeData::Inspect(_) => Kind::Inspect,
            NodeData::Dummy => Kind::Dummy,
            NodeData::Constant(_) => Kind::Constant,
            NodeData::Variable(_) => Kind::Variable,
            NodeData::Binary(_) => Kind::Binary,
            NodeData::Unary(_) => Kind::Unary,
            NodeData::Assignment(_) => Kind::Assignment,
            NodeData::ObjectGenerator(_) => Kind::ObjectGenerator,
            NodeData::Remote(_) => Kind::Remote,
            NodeData::QualifiedObject(_) => Kind::QualifiedObject,
            NodeData::ObjectRelation(_) => Kind::ObjectRelation,
            NodeData::TypeConversion(_) => Kind::TypeConversion,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        let ident = match self {
            NodeData::External(d) => &d.identifier,
            NodeData::Class(d) => &d.identifier,
            NodeData::Procedure(d) => &d.identifier,
            NodeData::Block(d) => &d.identifier,
            NodeData::SimpleVariable(d) => &d.identifier,
            NodeData::Array(d) => &d.identifier,
            NodeData::Parameter(d) => &d.identifier,
            NodeData::Label(d) => &d.identifier,
            NodeData::Hidden(d) => &d.identifier,
            NodeData::Protected(d) => &d.identifier,
            NodeData::Virtual(d) => &d.identifier,
            NodeData::Variable(e) => &e.identifier,
            _ => return None,
        };
        Some(ident)
    }

    fn identifier_mut(&mut self) -> Option<&mut String> {
        let ident = match self {
            NodeData::External(d) => &mut d.identifier,
            NodeData::Class(d) => &mut d.identifier,
            NodeData::Procedure(d) => &mut d.identifier,
            NodeData::Block(d) => &mut d.identifier,
            NodeData::SimpleVariable(d) => &mut d.identifier,
            NodeData::Array(d) => &mut d.identifier,
            NodeData::Parameter(d) => &mut d.identifier,
            NodeData::Label(d) => &mut d.identifier,
            NodeData::Hidden(d) => &mut d.identifier,
            NodeData::Protected(d) => &mut d.identifier,
            NodeData::Virtual(d) => &mut d.identifier,
            _ => return None,
        };
        Some(ident)
    }

    /// Enclosing scope of a declaration or connection block.
    pub fn declared_in(&self) -> Option<NodeId> {
        match self {
            NodeData::External(d) => d.declared_in,
            NodeData::Class(d) => d.declared_in,
            NodeData::Procedure(d) => d.declared_in,
            NodeData::Block(d) => d.declared_in,
            NodeData::SimpleVariable(d) => d.declared_in,
            NodeData::Array(d) => d.declared_in,
            NodeData::Parameter(d) => d.declared_in,
            NodeData::Label(d) => d.declared_in,
            NodeData::Virtual(d) => d.declared_in,
            NodeData::Connection(d) => d.declared_in,
            NodeData::Hidden(d) => d.scope,
            NodeData::Protected(d) => d.scope,
            _ => None,
        }
    }

    pub fn set_declared_in(&mut self, scope: Option<NodeId>) {
        match self {
            NodeData::External(d) => d.declared_in = scope,
            NodeData::Class(d) => d.declared_in = scope,
            NodeData::Procedure(d) => d.declared_in = scope,
            NodeData::Block(d) => d.declared_in = scope,
            NodeData::SimpleVariable(d) => d.declared_in = scope,
            NodeData::Array(d) => d.declared_in = scope,
            NodeData::Parameter(d) => d.declared_in = scope,
            NodeData::Label(d) => d.declared_in = scope,
            NodeData::Virtual(d) => d.declared_in = scope,
            NodeData::Connection(d) => d.declared_in = scope,
            NodeData::Hidden(d) => d.scope = scope,
            NodeData::Protected(d) => d.scope = scope,
            _ => {}
        }
    }

    pub fn declarations(&self) -> Option<&DeclarationList> {
        match self {
            NodeData::Class(d) => Some(&d.declarations),
            NodeData::Procedure(d) => Some(&d.declarations),
            NodeData::Block(d) => Some(&d.declarations),
            _ => None,
        }
    }

    fn declarations_mut(&mut self) -> Option<&mut DeclarationList> {
        match self {
            NodeData::Class(d) => Some(&mut d.declarations),
            NodeData::Procedure(d) => Some(&mut d.declarations),
            NodeData::Block(d) => Some(&mut d.declarations),
            _ => None,
        }
    }

    pub fn labels(&self) -> Option<&LabelList> {
        match self {
            NodeData::Class(d) => Some(&d.labels),
            NodeData::Procedure(d) => Some(&d.labels),
            NodeData::Block(d) => Some(&d.labels),
            _ => None,
        }
    }

    pub fn labels_mut(&mut self) -> Option<&mut LabelList> {
        match self {
            NodeData::Class(d) => Some(&mut d.labels),
            NodeData::Procedure(d) => Some(&mut d.labels),
            NodeData::Block(d) => Some(&mut d.labels),
            _ => None,
        }
    }

    pub fn parameters(&self) -> &[NodeId] {
        match self {
            NodeData::Class(d) => &d.parameters,
            NodeData::Procedure(d) => &d.parameters,
            _ => &[],
        }
    }

    pub fn statements(&self) -> &[NodeId] {
        match self {
            NodeData::Class(d) => &d.statements,
            NodeData::Procedure(d) => &d.statements,
            NodeData::Block(d) => &d.statements,
            NodeData::Compound(s) => &s.statements,
            _ => &[],
        }
    }

    fn statements_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            NodeData::Class(d) => Some(&mut d.statements),
            NodeData::Procedure(d) => Some(&mut d.statements),
            NodeData::Block(d) => Some(&mut d.statements),
            NodeData::Compound(s) => Some(&mut s.statements),
            _ => None,
        }
    }

    /// Type of the value denoted by a declaration.
    pub fn declared_type(&self) -> Type {
        match self {
            NodeData::SimpleVariable(d) => d.ty.clone(),
            NodeData::Array(d) => d.ty.clone(),
            NodeData::Parameter(d) => d.ty.clone(),
            NodeData::Procedure(d) => d.ty.clone(),
            NodeData::Virtual(d) => d.ty.clone(),
            NodeData::Label(_) => Type::Label,
            NodeData::Class(d) => Type::reference(d.identifier.clone()),
            _ => Type::Undefined,
        }
    }

    /// Type recorded on an expression node.
    pub fn expression_type(&self) -> Option<&Type> {
        let ty = match self {
            NodeData::Constant(e) => &e.ty,
            NodeData::Variable(e) => &e.ty,
            NodeData::Binary(e) => &e.ty,
            NodeData::Unary(e) => &e.ty,
            NodeData::Assignment(e) => &e.ty,
            NodeData::ObjectGenerator(e) => &e.ty,
            NodeData::Remote(e) => &e.ty,
            NodeData::QualifiedObject(e) => &e.ty,
            NodeData::ObjectRelation(e) => &e.ty,
            NodeData::TypeConversion(e) => &e.ty,
            _ => return None,
        };
        Some(ty)
    }

    pub fn set_expression_type(&mut self, ty: Type) {
        match self {
            NodeData::Constant(e) => e.ty = ty,
            NodeData::Variable(e) => e.ty = ty,
            NodeData::Binary(e) => e.ty = ty,
            NodeData::Unary(e) => e.ty = ty,
            NodeData::Assignment(e) => e.ty = ty,
            NodeData::ObjectGenerator(e) => e.ty = ty,
            NodeData::Remote(e) => e.ty = ty,
            NodeData::QualifiedObject(e) => e.ty = ty,
            NodeData::ObjectRelation(e) => e.ty = ty,
            NodeData::TypeConversion(e) => e.ty = ty,
            _ => {}
        }
    }

    /// Nodes reached through owning fields, in field order. Back-links
    /// (`declared_in`, `prefix_class`, specification pairings, resolved
    /// connection classes) are not children.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        match self {
            NodeData::Class(d) => {
                out.extend(&d.parameters);
                out.extend(&d.virtuals);
                out.extend(&d.hidden);
                out.extend(&d.protected);
                out.extend(d.declarations.iter());
                out.extend(d.labels.local());
                out.extend(&d.statements);
            }
            NodeData::Procedure(d) => {
                out.extend(&d.parameters);
                out.extend(d.declarations.iter());
                out.extend(d.labels.local());
                out.extend(&d.statements);
            }
            NodeData::Block(d) => {
                out.extend(d.declarations.iter());
                out.extend(d.labels.local());
                out.extend(&d.statements);
            }
            NodeData::SimpleVariable(d) => out.extend(d.constant),
            NodeData::Connection(d) => out.extend(d.statement),
            NodeData::StandaloneExpression(s) => out.push(s.expression),
            NodeData::If(s) => {
                out.push(s.condition);
                out.push(s.then_statement);
                out.extend(s.else_statement);
            }
            NodeData::While(s) => {
                out.push(s.condition);
                out.push(s.body);
            }
            NodeData::Goto(s) => out.push(s.target),
            NodeData::Labeled(s) => out.push(s.statement),
            NodeData::Compound(s) => out.extend(&s.statements),
            NodeData::Inspect(s) => {
                out.push(s.object);
                out.extend(&s.connections);
                out.extend(s.otherwise);
            }
            NodeData::Variable(e) => out.extend(&e.arguments),
            NodeData::Binary(e) => {
                out.push(e.lhs);
                out.push(e.rhs);
            }
            NodeData::Unary(e) => out.push(e.operand),
            NodeData::Assignment(e) => {
                out.push(e.lhs);
                out.push(e.rhs);
            }
            NodeData::ObjectGenerator(e) => out.extend(&e.arguments),
            NodeData::Remote(e) => {
                out.push(e.object);
                out.extend(&e.arguments);
            }
            NodeData::QualifiedObject(e) => out.push(e.object),
            NodeData::ObjectRelation(e) => out.push(e.object),
            NodeData::TypeConversion(e) => out.push(e.expression),
            _ => {}
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    case_sensitive: bool,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        SyntaxTree {
            nodes: Vec::new(),
            case_sensitive,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, line: u32, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SyntaxNode { line, data });
        id
    }

    pub(crate) fn add_pending(&mut self, line: u32) -> NodeId {
        self.add(line, NodeData::Pending)
    }

    pub fn get(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.index())
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()].data
    }

    pub(crate) fn set_data(&mut self, id: NodeId, data: NodeData) {
        self.nodes[id.index()].data = data;
    }

    pub fn kind(&self, id: NodeId) -> Kind {
        self.data(id).kind()
    }

    pub fn line(&self, id: NodeId) -> u32 {
        self.node(id).line
    }

    pub fn identifier(&self, id: NodeId) -> Option<&str> {
        self.data(id).identifier()
    }

    pub fn class(&self, id: NodeId) -> Option<&ClassDeclaration> {
        match self.data(id) {
            NodeData::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn class_mut(&mut self, id: NodeId) -> Option<&mut ClassDeclaration> {
        match self.data_mut(id) {
            NodeData::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn normalize(&self, identifier: &str) -> String {
        if self.case_sensitive {
            identifier.to_string()
        } else {
            identifier.to_ascii_uppercase()
        }
    }

    /// Adds `decl` to the declaration list of `scope`.
    ///
    /// The identifier is normalized and `declared_in` is set. A duplicate
    /// identifier is reported as a warning and the new declaration is left
    /// out of the list; returns whether it was added.
    pub fn declare(&mut self, scope: NodeId, decl: NodeId, diagnostics: &mut Diagnostics) -> bool {
        let case_sensitive = self.case_sensitive;
        let line = self.line(decl);
        let normalized = match self.data(decl).identifier() {
            Some(ident) => self.normalize(ident),
            None => {
                diagnostics.report(crate::diagnostic::Diagnostic::internal(
                    format!("{} cannot be declared", self.kind(decl)),
                    line,
                ));
                return false;
            }
        };
        {
            let data = self.data_mut(decl);
            if let Some(ident) = data.identifier_mut() {
                *ident = normalized.clone();
            }
            data.set_declared_in(Some(scope));
        }
        let Some(list) = self.data_mut(scope).declarations_mut() else {
            diagnostics.report(crate::diagnostic::Diagnostic::internal(
                "declaration added to a node without a declaration list",
                line,
            ));
            return false;
        };
        match list.add(&normalized, decl, case_sensitive) {
            Ok(()) => true,
            Err(_) => {
                diagnostics.warning(
                    line,
                    codes::DUPLICATE_DECLARATION,
                    format!("{normalized} is already declared in this scope"),
                );
                false
            }
        }
    }

    /// Adds a parameter to a class or procedure.
    pub fn add_parameter(&mut self, scope: NodeId, parameter: NodeId) -> Result<()> {
        let ident = self
            .identifier(parameter)
            .map(|i| self.normalize(i))
            .ok_or_else(|| CoreError::internal("parameter without identifier"))?;
        if let NodeData::Parameter(p) = self.data_mut(parameter) {
            p.identifier = ident;
            p.declared_in = Some(scope);
        }
        match self.data_mut(scope) {
            NodeData::Class(c) => c.parameters.push(parameter),
            NodeData::Procedure(p) => p.parameters.push(parameter),
            other => {
                return Err(CoreError::internal(format!(
                    "{} has no parameter list",
                    other.kind()
                )));
            }
        }
        Ok(())
    }

    /// Adds a hidden, protected or virtual specification to a class.
    pub fn add_specification(&mut self, class: NodeId, spec: NodeId) -> Result<()> {
        let ident = self
            .identifier(spec)
            .map(|i| self.normalize(i))
            .ok_or_else(|| CoreError::internal("specification without identifier"))?;
        let kind = self.kind(spec);
        {
            let data = self.data_mut(spec);
            if let Some(slot) = data.identifier_mut() {
                *slot = ident;
            }
            data.set_declared_in(Some(class));
        }
        let c = self
            .class_mut(class)
            .ok_or_else(|| CoreError::internal("specifications belong to classes"))?;
        match kind {
            Kind::Hidden => c.hidden.push(spec),
            Kind::Protected => c.protected.push(spec),
            Kind::Virtual => c.virtuals.push(spec),
            other => return Err(CoreError::internal(format!("{other} is not a specification"))),
        }
        Ok(())
    }

    pub fn add_statement(&mut self, scope: NodeId, statement: NodeId) -> Result<()> {
        let kind = self.kind(scope);
        self.data_mut(scope)
            .statements_mut()
            .ok_or_else(|| CoreError::internal(format!("{kind} has no statement list")))?
            .push(statement);
        Ok(())
    }

    /// Declares a label in `scope`.
    ///
    /// Fails once the scope's label list is ready for coding.
    pub fn add_label(&mut self, scope: NodeId, identifier: &str, line: u32) -> Result<NodeId> {
        let ready = self
            .data(scope)
            .labels()
            .map(LabelList::is_ready_for_coding)
            .ok_or_else(|| CoreError::internal(format!("{} has no label list", self.kind(scope))))?;
        if ready {
            return Err(CoreError::internal(format!(
                "label {identifier} added after the label list was ready for coding"
            )));
        }
        let label = self.add(
            line,
            NodeData::Label(LabelDeclaration {
                identifier: self.normalize(identifier),
                declared_in: Some(scope),
                index: 0,
            }),
        );
        if let Some(labels) = self.data_mut(scope).labels_mut() {
            labels.push(label);
        }
        Ok(label)
    }

    pub fn prefix_class(&self, id: NodeId) -> Option<NodeId> {
        self.class(id).and_then(|c| c.prefix_class)
    }

    /// `class` followed by its prefix classes, innermost first.
    ///
    /// The walk is bounded by the arena size so a corrupt cyclic chain
    /// cannot hang the caller.
    pub fn prefix_chain(&self, class: NodeId) -> Vec<NodeId> {
        let mut chain = vec![class];
        let mut current = self.prefix_class(class);
        while let Some(prefix) = current {
            if chain.len() > self.nodes.len() || chain.contains(&prefix) {
                break;
            }
            chain.push(prefix);
            current = self.prefix_class(prefix);
        }
        chain
    }

    /// Strict subclass test.
    pub fn is_subclass(&self, sub: NodeId, sup: NodeId) -> bool {
        self.prefix_chain(sub).iter().skip(1).any(|c| *c == sup)
    }

    /// Labels of `scope` and of all its prefix classes, outermost ancestor
    /// first. Each label receives its 1-based index in this list; the result
    /// is cached in the scope's label list.
    pub fn accumulated_labels(&mut self, scope: NodeId) -> Result<Vec<NodeId>> {
        if let Some(cached) = self.data(scope).labels().and_then(LabelList::accumulated) {
            return Ok(cached.to_vec());
        }
        let mut owners = match self.kind(scope) {
            Kind::Class => self.prefix_chain(scope),
            _ => vec![scope],
        };
        owners.reverse();

        let mut accumulated = Vec::new();
        for owner in owners {
            let labels = self
                .data(owner)
                .labels()
                .ok_or_else(|| CoreError::internal(format!("{} has no label list", self.kind(owner))))?;
            accumulated.extend_from_slice(labels.local());
        }
        if accumulated.len() > u16::MAX as usize {
            return Err(CoreError::Range(accumulated.len() as i64));
        }
        for (position, label) in accumulated.iter().enumerate() {
            if let NodeData::Label(l) = self.data_mut(*label) {
                l.index = position as u16 + 1;
            }
        }
        if let Some(labels) = self.data_mut(scope).labels_mut() {
            labels.set_accumulated(accumulated.clone());
        }
        Ok(accumulated)
    }
}
