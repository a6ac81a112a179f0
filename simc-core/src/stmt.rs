//! Statement nodes.

use crate::tree::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneExpression {
    pub expression: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: NodeId,
    pub then_statement: NodeId,
    pub else_statement: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GotoStatement {
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStatement {
    pub labels: Vec<String>,
    pub statement: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundStatement {
    pub statements: Vec<NodeId>,
}

/// `inspect obj when C do ... otherwise ...`
#[derive(Debug, Clone, PartialEq)]
pub struct InspectStatement {
    pub object: NodeId,
    /// Connection blocks, one per `when` clause or a single `do` block.
    pub connections: Vec<NodeId>,
    pub otherwise: Option<NodeId>,
}
