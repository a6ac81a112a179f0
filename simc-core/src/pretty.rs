//! Indented outline of a syntax tree.
//!
//! Every node is printed once as `#<index> <kind> ...`; later occurrences
//! of the same node print as `-> #<index>`, so shared sub-expressions and
//! cycles terminate.
//!
//! ```
//! use simc_core::decl::ClassDeclaration;
//! use simc_core::pretty::render;
//! use simc_core::tree::{NodeData, SyntaxTree};
//!
//! let mut tree = SyntaxTree::new();
//! let class = tree.add(1, NodeData::Class(ClassDeclaration::new("Shape")));
//! assert_eq!(render(&tree, class), "#0 Class Shape (line 1)\n");
//! ```

use std::collections::HashSet;
use std::fmt::Write;

use crate::expr::ConstValue;
use crate::tree::{NodeData, NodeId, SyntaxTree};

const INDENT_WIDTH: usize = 2;

#[must_use]
pub fn render(tree: &SyntaxTree, root: NodeId) -> String {
    let mut printer = PrettyPrinter {
        tree,
        output: String::new(),
        indent_level: 0,
        printed: HashSet::new(),
    };
    printer.print(root);
    printer.output
}

struct PrettyPrinter<'t> {
    tree: &'t SyntaxTree,
    output: String,
    indent_level: usize,
    printed: HashSet<NodeId>,
}

impl PrettyPrinter<'_> {
    fn print(&mut self, id: NodeId) {
        let indent = " ".repeat(self.indent_level * INDENT_WIDTH);
        if !self.printed.insert(id) {
            let _ = writeln!(self.output, "{indent}-> #{}", id.index());
            return;
        }

        let node = self.tree.node(id);
        let data = &node.data;
        let _ = write!(self.output, "{indent}#{} {}", id.index(), data.kind().name());
        self.describe(data);
        let _ = write!(self.output, " (line {})", node.line);
        if let Some(ty) = data.expression_type().filter(|t| !t.is_undefined()) {
            let _ = write!(self.output, " : {ty}");
        }
        self.output.push('\n');

        self.indent_level += 1;
        for child in data.children() {
            self.print(child);
        }
        self.indent_level -= 1;
    }

    fn describe(&mut self, data: &NodeData) {
        if let Some(identifier) = data.identifier() {
            let _ = write!(self.output, " {identifier}");
        }
        let _ = match data {
            NodeData::Class(c) => match &c.prefix {
                Some(prefix) => write!(self.output, " prefix {prefix}"),
                None => Ok(()),
            },
            NodeData::External(e) => write!(self.output, " {} from {}", e.module_kind.name(), e.attribute_file),
            NodeData::SimpleVariable(v) => write!(self.output, " {}", v.ty),
            NodeData::Constant(c) => match &c.value {
                ConstValue::Null => write!(self.output, " none"),
                ConstValue::Boolean(b) => write!(self.output, " {b}"),
                ConstValue::Character(c) => write!(self.output, " '{c}'"),
                ConstValue::Integer(n) => write!(self.output, " {n}"),
                ConstValue::Real(r) => write!(self.output, " {r}"),
                ConstValue::LongReal(r) => write!(self.output, " {r}"),
                ConstValue::Text(Some(t)) => write!(self.output, " {t:?}"),
                ConstValue::Text(None) => write!(self.output, " notext"),
            },
            NodeData::Binary(b) => write!(self.output, " {}", b.op.symbol()),
            NodeData::Remote(r) => write!(self.output, " .{}", r.attribute),
            NodeData::ObjectGenerator(g) => write!(self.output, " new {}", g.class_identifier),
            NodeData::QualifiedObject(q) => write!(self.output, " qua {}", q.class_identifier),
            NodeData::ObjectRelation(r) => write!(self.output, " {:?} {}", r.op, r.class_identifier),
            NodeData::Connection(c) => match &c.when_class {
                Some(class) => write!(self.output, " when {class}"),
                None => Ok(()),
            },
            _ => Ok(()),
        };
    }
}
