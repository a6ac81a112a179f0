//! Identity-preserving serialization of syntax node graphs.
//!
//! The first time a node is written it receives a sequence number and its
//! full payload is emitted; every later occurrence in the same stream is an
//! `ObjectReference` tag followed by that number. The reader registers each
//! node's number before reading its fields, so fields may point back at an
//! enclosing node that is still being read.
//!
//! Per-kind field layouts live in [`NODE_CODECS`], indexed by kind tag.

use std::collections::{HashMap, HashSet};

use log::{trace, warn};

use crate::codec::{AttributeInput, AttributeOutput};
use crate::decl::{
    ArrayDeclaration, BlockDeclaration, ClassDeclaration, ConnectionBlock, DeclarationList,
    ExternalDeclaration, HiddenSpecification, LabelDeclaration, LabelList, Parameter,
    ParameterKind, ParameterMode, ProcedureDeclaration, ProtectedSpecification,
    SimpleVariableDeclaration, VirtualKind, VirtualSpecification,
};
use crate::error::{CoreError, Result};
use crate::expr::{
    AssignOp, Assignment, BinaryOp, BinaryOperation, CONVERSION_KINDS, Constant, ObjectGenerator,
    ObjectRelation, QualifiedObject, RelationOp, RemoteVariable, TypeConversion, UnaryOp,
    UnaryOperation, Variable,
};
use crate::kind::Kind;
use crate::stmt::{
    CompoundStatement, GotoStatement, IfStatement, InspectStatement, LabeledStatement,
    StandaloneExpression, WhileStatement,
};
use crate::tree::{NodeData, NodeId, SyntaxTree};

pub type WriteFn = fn(&mut ObjectWriter<'_>, &NodeData) -> Result<()>;
pub type ReadFn = fn(&mut ObjectReader<'_, '_>) -> Result<NodeData>;

/// Reader and writer of one node kind.
pub struct NodeCodec {
    pub kind: Kind,
    pub write: WriteFn,
    pub read: ReadFn,
}

/// Looks up the codec of a kind tag.
pub fn codec_for(kind: Kind) -> &'static NodeCodec {
    &NODE_CODECS[kind.tag() as usize]
}

pub struct ObjectWriter<'t> {
    out: AttributeOutput<Vec<u8>>,
    tree: &'t SyntaxTree,
    numbers: HashMap<NodeId, i16>,
    detached: HashSet<NodeId>,
    next_sequence: i16,
}

impl<'t> ObjectWriter<'t> {
    pub fn new(tree: &'t SyntaxTree, first_sequence: i16) -> Self {
        ObjectWriter {
            out: AttributeOutput::new(Vec::new()),
            tree,
            numbers: HashMap::new(),
            detached: HashSet::new(),
            next_sequence: first_sequence,
        }
    }

    pub fn output(&mut self) -> &mut AttributeOutput<Vec<u8>> {
        &mut self.out
    }

    /// Writes `id` as null from now on. Used for the scope enclosing a
    /// module, which lives outside the attribute file.
    pub fn detach(&mut self, id: NodeId) {
        self.detached.insert(id);
    }

    /// Sequence number given to `id` in this stream, if it was written.
    pub fn sequence_of(&self, id: NodeId) -> Option<i16> {
        self.numbers.get(&id).copied()
    }

    /// Returns the bytes and the next unused sequence number.
    pub fn finish(self) -> (Vec<u8>, i16) {
        (self.out.into_inner(), self.next_sequence)
    }

    pub fn write_obj(&mut self, node: Option<NodeId>) -> Result<()> {
        let Some(id) = node.filter(|id| !self.detached.contains(id)) else {
            return self.out.write_kind(Kind::Null);
        };
        if let Some(&seq) = self.numbers.get(&id) {
            self.out.write_kind(Kind::ObjectReference)?;
            return self.out.write_short(seq.into());
        }

        let tree = self.tree;
        let node = tree
            .get(id)
            .ok_or_else(|| CoreError::internal(format!("node {id} is not in the tree")))?;
        let kind = node.data.kind();
        if kind.is_sentinel() {
            return Err(CoreError::internal(format!("node {id} has not been materialized")));
        }

        let seq = self.next_sequence;
        self.next_sequence = seq
            .checked_add(1)
            .ok_or(CoreError::Range(i64::from(seq) + 1))?;
        self.numbers.insert(id, seq);
        trace!("write {kind} #{seq} (line {})", node.line);

        self.out.write_kind(kind)?;
        self.out.write_short(seq.into())?;
        self.out.write_count(stored_line(node.line))?;
        (codec_for(kind).write)(self, &node.data)
    }

    pub fn write_node(&mut self, node: NodeId) -> Result<()> {
        self.write_obj(Some(node))
    }

    fn list(&mut self, nodes: &[NodeId]) -> Result<()> {
        self.out.write_count(nodes.len())?;
        for node in nodes {
            self.write_node(*node)?;
        }
        Ok(())
    }

    fn identifier(&mut self, identifier: &str) -> Result<()> {
        self.out.write_string(Some(identifier))
    }

    fn declarations(&mut self, list: &DeclarationList) -> Result<()> {
        let ids: Vec<NodeId> = list.iter().collect();
        self.list(&ids)
    }

    fn labels(&mut self, labels: &LabelList) -> Result<()> {
        self.list(labels.local())?;
        self.out.write_bool(labels.is_ready_for_coding())
    }
}

/// Line numbers above the short range are stored as the largest short.
fn stored_line(line: u32) -> usize {
    let max = i16::MAX as u32;
    if line > max {
        warn!("line {line} stored as {max} in attribute file");
    }
    line.min(max) as usize
}

pub struct ObjectReader<'t, 'b> {
    inp: AttributeInput<&'b [u8]>,
    tree: &'t mut SyntaxTree,
    objects: HashMap<i16, NodeId>,
}

impl<'t, 'b> ObjectReader<'t, 'b> {
    pub fn new(tree: &'t mut SyntaxTree, bytes: &'b [u8]) -> Self {
        ObjectReader {
            inp: AttributeInput::new(bytes),
            tree,
            objects: HashMap::new(),
        }
    }

    pub fn input(&mut self) -> &mut AttributeInput<&'b [u8]> {
        &mut self.inp
    }

    pub fn tree(&self) -> &SyntaxTree {
        &*self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SyntaxTree {
        &mut *self.tree
    }

    pub fn read_obj(&mut self) -> Result<Option<NodeId>> {
        let kind = self.inp.read_kind()?;
        self.read_obj_tagged(kind)
    }

    /// Continues reading an object whose kind tag was already consumed.
    pub fn read_obj_tagged(&mut self, kind: Kind) -> Result<Option<NodeId>> {
        match kind {
            Kind::Null => Ok(None),
            Kind::ObjectReference => {
                let seq = self.inp.read_short()?;
                self.objects.get(&seq).copied().map(Some).ok_or(CoreError::Linkage(seq))
            }
            _ => {
                let seq = self.inp.read_short()?;
                let line = self.inp.read_count()? as u32;
                let id = self.tree.add_pending(line);
                if self.objects.insert(seq, id).is_some() {
                    return Err(CoreError::protocol(format!("sequence number #{seq} used twice")));
                }
                trace!("read {kind} #{seq} (line {line})");
                let data = (codec_for(kind).read)(self)?;
                self.tree.set_data(id, data);
                Ok(Some(id))
            }
        }
    }

    fn node(&mut self, what: &str) -> Result<NodeId> {
        self.read_obj()?
            .ok_or_else(|| CoreError::protocol(format!("{what} must not be null")))
    }

    fn list(&mut self, what: &str) -> Result<Vec<NodeId>> {
        let count = self.inp.read_count()?;
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(self.node(what)?);
        }
        Ok(nodes)
    }

    fn identifier(&mut self) -> Result<String> {
        self.inp
            .read_string()?
            .ok_or_else(|| CoreError::protocol("identifier must not be null"))
    }

    fn declarations(&mut self) -> Result<DeclarationList> {
        let case_sensitive = self.tree.case_sensitive();
        let mut list = DeclarationList::new();
        for id in self.list("declaration")? {
            let identifier = self
                .tree
                .identifier(id)
                .ok_or_else(|| CoreError::protocol(format!("{} in a declaration list", self.tree.kind(id))))?
                .to_string();
            list.add(&identifier, id, case_sensitive)
                .map_err(|_| CoreError::protocol(format!("{identifier} declared twice")))?;
        }
        Ok(list)
    }

    fn labels(&mut self) -> Result<LabelList> {
        let mut labels = LabelList::new();
        for label in self.list("label")? {
            labels.push(label);
        }
        if self.inp.read_bool()? {
            labels.mark_ready_for_coding();
        }
        Ok(labels)
    }

    fn scalar<T: Copy>(&mut self, all: &[T], what: &str) -> Result<T> {
        let byte = self.inp.read_byte()?;
        all.get(byte as usize)
            .copied()
            .ok_or_else(|| CoreError::protocol(format!("{what} code {byte}")))
    }
}

fn mismatch(expected: Kind, data: &NodeData) -> CoreError {
    CoreError::internal(format!("{expected} codec called on {}", data.kind()))
}

fn write_sentinel(_: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    Err(CoreError::internal(format!("{} has no payload", data.kind())))
}

fn read_sentinel(_: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Err(CoreError::internal("sentinel kind dispatched to a node reader"))
}

fn write_external(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::External(d) = data else {
        return Err(mismatch(Kind::ExternalDeclaration, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_kind(d.module_kind)?;
    w.out.write_string(Some(&d.attribute_file))?;
    w.write_obj(d.declared_in)
}

fn read_external(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    let identifier = r.identifier()?;
    let module_kind = r.inp.read_kind()?;
    if !module_kind.is_module() {
        return Err(CoreError::protocol(format!("external {identifier} names a {module_kind}")));
    }
    let attribute_file = r.identifier()?;
    let declared_in = r.read_obj()?;
    Ok(NodeData::External(ExternalDeclaration {
        identifier,
        declared_in,
        module_kind,
        attribute_file,
        module: None,
    }))
}

fn write_class(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Class(d) = data else {
        return Err(mismatch(Kind::Class, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_string(d.prefix.as_deref())?;
    w.write_obj(d.declared_in)?;
    w.write_obj(d.prefix_class)?;
    w.list(&d.parameters)?;
    w.list(&d.virtuals)?;
    w.list(&d.hidden)?;
    w.list(&d.protected)?;
    w.declarations(&d.declarations)?;
    w.labels(&d.labels)?;
    w.list(&d.statements)
}

fn read_class(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Class(ClassDeclaration {
        identifier: r.identifier()?,
        prefix: r.inp.read_string()?,
        declared_in: r.read_obj()?,
        prefix_class: r.read_obj()?,
        parameters: r.list("parameter")?,
        virtuals: r.list("virtual specification")?,
        hidden: r.list("hidden specification")?,
        protected: r.list("protected specification")?,
        declarations: r.declarations()?,
        labels: r.labels()?,
        statements: r.list("statement")?,
    }))
}

fn write_procedure(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Procedure(d) = data else {
        return Err(mismatch(Kind::Procedure, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_type(&d.ty)?;
    w.write_obj(d.declared_in)?;
    w.list(&d.parameters)?;
    w.declarations(&d.declarations)?;
    w.labels(&d.labels)?;
    w.list(&d.statements)
}

fn read_procedure(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Procedure(ProcedureDeclaration {
        identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        declared_in: r.read_obj()?,
        parameters: r.list("parameter")?,
        declarations: r.declarations()?,
        labels: r.labels()?,
        statements: r.list("statement")?,
    }))
}

fn write_block(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Block(d) = data else {
        return Err(mismatch(Kind::Block, data));
    };
    w.identifier(&d.identifier)?;
    w.write_obj(d.declared_in)?;
    w.declarations(&d.declarations)?;
    w.labels(&d.labels)?;
    w.list(&d.statements)
}

fn read_block(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Block(BlockDeclaration {
        identifier: r.identifier()?,
        declared_in: r.read_obj()?,
        declarations: r.declarations()?,
        labels: r.labels()?,
        statements: r.list("statement")?,
    }))
}

fn write_simple_variable(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::SimpleVariable(d) = data else {
        return Err(mismatch(Kind::SimpleVariable, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_type(&d.ty)?;
    w.write_obj(d.declared_in)?;
    w.write_obj(d.constant)
}

fn read_simple_variable(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::SimpleVariable(SimpleVariableDeclaration {
        identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        declared_in: r.read_obj()?,
        constant: r.read_obj()?,
    }))
}

fn write_array(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Array(d) = data else {
        return Err(mismatch(Kind::Array, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_type(&d.ty)?;
    w.out.write_byte(d.dimensions)?;
    w.write_obj(d.declared_in)
}

fn read_array(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Array(ArrayDeclaration {
        identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        dimensions: r.inp.read_byte()?,
        declared_in: r.read_obj()?,
    }))
}

fn write_parameter(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Parameter(d) = data else {
        return Err(mismatch(Kind::Parameter, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_type(&d.ty)?;
    w.out.write_byte(d.mode as u8)?;
    w.out.write_byte(d.kind as u8)?;
    w.write_obj(d.declared_in)
}

fn read_parameter(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Parameter(Parameter {
        identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        mode: r.scalar(&ParameterMode::ALL, "parameter mode")?,
        kind: r.scalar(&ParameterKind::ALL, "parameter kind")?,
        declared_in: r.read_obj()?,
    }))
}

fn write_label(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Label(d) = data else {
        return Err(mismatch(Kind::Label, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_count(usize::from(d.index))?;
    w.write_obj(d.declared_in)
}

fn read_label(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Label(LabelDeclaration {
        identifier: r.identifier()?,
        index: r.inp.read_count()? as u16,
        declared_in: r.read_obj()?,
    }))
}

fn write_hidden(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Hidden(d) = data else {
        return Err(mismatch(Kind::Hidden, data));
    };
    w.identifier(&d.identifier)?;
    w.write_obj(d.scope)?;
    w.write_obj(d.protected_by)
}

fn read_hidden(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Hidden(HiddenSpecification {
        identifier: r.identifier()?,
        scope: r.read_obj()?,
        protected_by: r.read_obj()?,
    }))
}

fn write_protected(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Protected(d) = data else {
        return Err(mismatch(Kind::Protected, data));
    };
    w.identifier(&d.identifier)?;
    w.write_obj(d.scope)?;
    w.write_obj(d.hidden_by)
}

fn read_protected(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Protected(ProtectedSpecification {
        identifier: r.identifier()?,
        scope: r.read_obj()?,
        hidden_by: r.read_obj()?,
    }))
}

fn write_virtual(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Virtual(d) = data else {
        return Err(mismatch(Kind::Virtual, data));
    };
    w.identifier(&d.identifier)?;
    w.out.write_byte(d.kind as u8)?;
    w.out.write_type(&d.ty)?;
    w.write_obj(d.declared_in)
}

fn read_virtual(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Virtual(VirtualSpecification {
        identifier: r.identifier()?,
        kind: r.scalar(&VirtualKind::ALL, "virtual kind")?,
        ty: r.inp.read_type()?,
        declared_in: r.read_obj()?,
    }))
}

fn write_connection(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Connection(d) = data else {
        return Err(mismatch(Kind::ConnectionBlock, data));
    };
    w.out.write_string(d.when_class.as_deref())?;
    w.write_obj(d.declared_in)?;
    w.write_obj(d.inspected)?;
    w.write_obj(d.class_declaration)?;
    w.write_obj(d.statement)
}

fn read_connection(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Connection(ConnectionBlock {
        when_class: r.inp.read_string()?,
        declared_in: r.read_obj()?,
        inspected: r.read_obj()?,
        class_declaration: r.read_obj()?,
        statement: r.read_obj()?,
    }))
}

fn write_standalone(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::StandaloneExpression(s) = data else {
        return Err(mismatch(Kind::StandaloneExpression, data));
    };
    w.write_node(s.expression)
}

fn read_standalone(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::StandaloneExpression(StandaloneExpression {
        expression: r.node("expression")?,
    }))
}

fn write_if(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::If(s) = data else {
        return Err(mismatch(Kind::If, data));
    };
    w.write_node(s.condition)?;
    w.write_node(s.then_statement)?;
    w.write_obj(s.else_statement)
}

fn read_if(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::If(IfStatement {
        condition: r.node("condition")?,
        then_statement: r.node("then branch")?,
        else_statement: r.read_obj()?,
    }))
}

fn write_while(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::While(s) = data else {
        return Err(mismatch(Kind::While, data));
    };
    w.write_node(s.condition)?;
    w.write_node(s.body)
}

fn read_while(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::While(WhileStatement {
        condition: r.node("condition")?,
        body: r.node("loop body")?,
    }))
}

fn write_goto(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Goto(s) = data else {
        return Err(mismatch(Kind::Goto, data));
    };
    w.write_node(s.target)
}

fn read_goto(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Goto(GotoStatement {
        target: r.node("goto target")?,
    }))
}

fn write_labeled(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Labeled(s) = data else {
        return Err(mismatch(Kind::Labeled, data));
    };
    w.out.write_count(s.labels.len())?;
    for label in &s.labels {
        w.identifier(label)?;
    }
    w.write_node(s.statement)
}

fn read_labeled(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    let count = r.inp.read_count()?;
    let mut labels = Vec::with_capacity(count);
    for _ in 0..count {
        labels.push(r.identifier()?);
    }
    Ok(NodeData::Labeled(LabeledStatement {
        labels,
        statement: r.node("labeled statement")?,
    }))
}

fn write_compound(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Compound(s) = data else {
        return Err(mismatch(Kind::Compound, data));
    };
    w.list(&s.statements)
}

fn read_compound(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Compound(CompoundStatement {
        statements: r.list("statement")?,
    }))
}

fn write_inspect(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Inspect(s) = data else {
        return Err(mismatch(Kind::Inspect, data));
    };
    w.write_node(s.object)?;
    w.list(&s.connections)?;
    w.write_obj(s.otherwise)
}

fn read_inspect(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Inspect(InspectStatement {
        object: r.node("inspected object")?,
        connections: r.list("connection block")?,
        otherwise: r.read_obj()?,
    }))
}

fn write_dummy(_: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    match data {
        NodeData::Dummy => Ok(()),
        other => Err(mismatch(Kind::Dummy, other)),
    }
}

fn read_dummy(_: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Dummy)
}

fn write_constant(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Constant(e) = data else {
        return Err(mismatch(Kind::Constant, data));
    };
    w.out.write_type(&e.ty)?;
    w.out.write_constant(&e.value)
}

fn read_constant(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Constant(Constant {
        ty: r.inp.read_type()?,
        value: r.inp.read_constant()?,
    }))
}

fn write_variable(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Variable(e) = data else {
        return Err(mismatch(Kind::Variable, data));
    };
    w.identifier(&e.identifier)?;
    w.out.write_type(&e.ty)?;
    w.list(&e.arguments)
}

fn read_variable(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Variable(Variable {
        identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        arguments: r.list("argument")?,
    }))
}

fn write_binary(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Binary(e) = data else {
        return Err(mismatch(Kind::Binary, data));
    };
    w.out.write_byte(e.op as u8)?;
    w.out.write_type(&e.ty)?;
    w.write_node(e.lhs)?;
    w.write_node(e.rhs)
}

fn read_binary(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Binary(BinaryOperation {
        op: r.scalar(&BinaryOp::ALL, "binary operator")?,
        ty: r.inp.read_type()?,
        lhs: r.node("left operand")?,
        rhs: r.node("right operand")?,
    }))
}

fn write_unary(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Unary(e) = data else {
        return Err(mismatch(Kind::Unary, data));
    };
    w.out.write_byte(e.op as u8)?;
    w.out.write_type(&e.ty)?;
    w.write_node(e.operand)
}

fn read_unary(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Unary(UnaryOperation {
        op: r.scalar(&UnaryOp::ALL, "unary operator")?,
        ty: r.inp.read_type()?,
        operand: r.node("operand")?,
    }))
}

fn write_assignment(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Assignment(e) = data else {
        return Err(mismatch(Kind::Assignment, data));
    };
    w.out.write_byte(e.op as u8)?;
    w.out.write_type(&e.ty)?;
    w.write_node(e.lhs)?;
    w.write_node(e.rhs)
}

fn read_assignment(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Assignment(Assignment {
        op: r.scalar(&AssignOp::ALL, "assignment operator")?,
        ty: r.inp.read_type()?,
        lhs: r.node("assignment target")?,
        rhs: r.node("assigned value")?,
    }))
}

fn write_object_generator(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::ObjectGenerator(e) = data else {
        return Err(mismatch(Kind::ObjectGenerator, data));
    };
    w.identifier(&e.class_identifier)?;
    w.out.write_type(&e.ty)?;
    w.list(&e.arguments)
}

fn read_object_generator(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::ObjectGenerator(ObjectGenerator {
        class_identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        arguments: r.list("argument")?,
    }))
}

fn write_remote(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::Remote(e) = data else {
        return Err(mismatch(Kind::Remote, data));
    };
    w.identifier(&e.attribute)?;
    w.out.write_type(&e.ty)?;
    w.write_node(e.object)?;
    w.list(&e.arguments)
}

fn read_remote(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::Remote(RemoteVariable {
        attribute: r.identifier()?,
        ty: r.inp.read_type()?,
        object: r.node("remote object")?,
        arguments: r.list("argument")?,
    }))
}

fn write_qualified(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::QualifiedObject(e) = data else {
        return Err(mismatch(Kind::QualifiedObject, data));
    };
    w.identifier(&e.class_identifier)?;
    w.out.write_type(&e.ty)?;
    w.write_node(e.object)
}

fn read_qualified(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::QualifiedObject(QualifiedObject {
        class_identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        object: r.node("qualified object")?,
    }))
}

fn write_relation(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::ObjectRelation(e) = data else {
        return Err(mismatch(Kind::ObjectRelation, data));
    };
    w.out.write_byte(e.op as u8)?;
    w.identifier(&e.class_identifier)?;
    w.out.write_type(&e.ty)?;
    w.write_node(e.object)
}

fn read_relation(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::ObjectRelation(ObjectRelation {
        op: r.scalar(&RelationOp::ALL, "object relation")?,
        class_identifier: r.identifier()?,
        ty: r.inp.read_type()?,
        object: r.node("tested object")?,
    }))
}

fn write_conversion(w: &mut ObjectWriter<'_>, data: &NodeData) -> Result<()> {
    let NodeData::TypeConversion(e) = data else {
        return Err(mismatch(Kind::TypeConversion, data));
    };
    w.out.write_byte(e.conversion as u8)?;
    w.out.write_type(&e.ty)?;
    w.write_node(e.expression)
}

fn read_conversion(r: &mut ObjectReader<'_, '_>) -> Result<NodeData> {
    Ok(NodeData::TypeConversion(TypeConversion {
        conversion: r.scalar(&CONVERSION_KINDS, "conversion kind")?,
        ty: r.inp.read_type()?,
        expression: r.node("converted expression")?,
    }))
}

/// Field layouts of every node kind, indexed by kind tag.
pub static NODE_CODECS: [NodeCodec; 32] = [
    NodeCodec { kind: Kind::Null, write: write_sentinel, read: read_sentinel },
    NodeCodec { kind: Kind::ObjectReference, write: write_sentinel, read: read_sentinel },
    NodeCodec { kind: Kind::ExternalDeclaration, write: write_external, read: read_external },
    NodeCodec { kind: Kind::Class, write: write_class, read: read_class },
    NodeCodec { kind: Kind::Procedure, write: write_procedure, read: read_procedure },
    NodeCodec { kind: Kind::Block, write: write_block, read: read_block },
    NodeCodec { kind: Kind::SimpleVariable, write: write_simple_variable, read: read_simple_variable },
    NodeCodec { kind: Kind::Array, write: write_array, read: read_array },
    NodeCodec { kind: Kind::Parameter, write: write_parameter, read: read_parameter },
    NodeCodec { kind: Kind::Label, write: write_label, read: read_label },
    NodeCodec { kind: Kind::Hidden, write: write_hidden, read: read_hidden },
    NodeCodec { kind: Kind::Protected, write: write_protected, read: read_protected },
    NodeCodec { kind: Kind::Virtual, write: write_virtual, read: read_virtual },
    NodeCodec { kind: Kind::ConnectionBlock, write: write_connection, read: read_connection },
    NodeCodec { kind: Kind::StandaloneExpression, write: write_standalone, read: read_standalone },
    NodeCodec { kind: Kind::If, write: write_if, read: read_if },
    NodeCodec { kind: Kind::While, write: write_while, read: read_while },
    NodeCodec { kind: Kind::Goto, write: write_goto, read: read_goto },
    NodeCodec { kind: Kind::Labeled, write: write_labeled, read: read_labeled },
    NodeCodec { kind: Kind::Compound, write: write_compound, read: read_compound },
    NodeCodec { kind: Kind::Inspect, write: write_inspect, read: read_inspect },
    NodeCodec { kind: Kind::Dummy, write: write_dummy, read: read_dummy },
    NodeCodec { kind: Kind::Constant, write: write_constant, read: read_constant },
    NodeCodec { kind: Kind::Variable, write: write_variable, read: read_variable },
    NodeCodec { kind: Kind::Binary, write: write_binary, read: read_binary },
    NodeCodec { kind: Kind::Unary, write: write_unary, read: read_unary },
    NodeCodec { kind: Kind::Assignment, write: write_assignment, read: read_assignment },
    NodeCodec { kind: Kind::ObjectGenerator, write: write_object_generator, read: read_object_generator },
    NodeCodec { kind: Kind::Remote, write: write_remote, read: read_remote },
    NodeCodec { kind: Kind::QualifiedObject, write: write_qualified, read: read_qualified },
    NodeCodec { kind: Kind::ObjectRelation, write: write_relation, read: read_relation },
    NodeCodec { kind: Kind::TypeConversion, write: write_conversion, read: read_conversion },
];
