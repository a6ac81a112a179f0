//! Semantic checking of one module.
//!
//! Phases, in order:
//!
//! 1. resolve class prefixes and cut circular prefix chains,
//! 2. pair hidden with protected specifications,
//! 3. type statements and expressions, inserting conversions,
//! 4. accumulate the labels of every scope and freeze them for coding.
//!
//! User errors are reported to [`Diagnostics`] and a placeholder type is
//! used in place of the broken construct. Only internal failures end the
//! pass early.

use std::collections::HashSet;

use log::debug;

use crate::diagnostic::{Diagnostics, codes};
use crate::error::{CoreError, Result};
use crate::expr::{AssignOp, BinaryOp, TypeConversion, UnaryOp};
use crate::kind::Kind;
use crate::meaning::{
    ScopeClasses, enclosing_class, find_protected, is_protected, lookup_local,
    resolve_or_report, resolve_remote,
};
use crate::tree::{NodeData, NodeId, SyntaxTree};
use crate::types::{ClassLookup, ConversionKind, Type, common_type, is_convertible_to};

pub struct Checker<'a> {
    tree: &'a mut SyntaxTree,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Checker<'a> {
    pub fn new(tree: &'a mut SyntaxTree, diagnostics: &'a mut Diagnostics) -> Self {
        Checker { tree, diagnostics }
    }

    pub fn check(&mut self, module: NodeId) -> Result<()> {
        let classes = self.collect_classes(module);
        debug!("checking {} with {} classes", module, classes.len());
        for class in &classes {
            self.resolve_prefix(*class);
        }
        for class in &classes {
            self.cut_prefix_cycle(*class);
        }
        for class in &classes {
            self.pair_specifications(*class);
        }
        self.check_scope(module)
    }

    fn collect_classes(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        let mut classes = Vec::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if self.tree.kind(id) == Kind::Class {
                classes.push(id);
            }
            let mut children = self.tree.data(id).children();
            children.reverse();
            stack.extend(children);
        }
        classes
    }

    fn resolve_prefix(&mut self, class: NodeId) {
        let Some(c) = self.tree.class(class) else {
            return;
        };
        let (Some(prefix), None) = (c.prefix.clone(), c.prefix_class) else {
            return;
        };
        let scope = c.declared_in.unwrap_or(class);
        let line = self.tree.line(class);
        let meaning = resolve_or_report(self.tree, scope, &prefix, line, self.diagnostics);
        let Some(found) = meaning.declaration else {
            return;
        };
        if self.tree.class(found).is_none() {
            self.diagnostics.error(
                line,
                codes::PREFIX_NOT_A_CLASS,
                format!("prefix {prefix} is not a class"),
            );
            return;
        }
        if let Some(c) = self.tree.class_mut(class) {
            c.prefix_class = Some(found);
        }
    }

    fn cut_prefix_cycle(&mut self, class: NodeId) {
        let mut current = self.tree.prefix_class(class);
        let mut steps = 0;
        while let Some(c) = current {
            steps += 1;
            if c == class {
                let name = self.tree.identifier(class).unwrap_or("?").to_string();
                self.diagnostics.error(
                    self.tree.line(class),
                    codes::CIRCULAR_PREFIX,
                    format!("circular prefix chain through {name}"),
                );
                if let Some(c) = self.tree.class_mut(class) {
                    c.prefix_class = None;
                }
                return;
            }
            if steps > self.tree.len() {
                return;
            }
            current = self.tree.prefix_class(c);
        }
    }

    fn pair_specifications(&mut self, class: NodeId) {
        let Some(c) = self.tree.class(class) else {
            return;
        };
        let hidden = c.hidden.clone();
        let protected = c.protected.clone();

        for h in hidden {
            let identifier = self.tree.identifier(h).unwrap_or_default().to_string();
            match find_protected(self.tree, class, &identifier) {
                Some(p) => {
                    if let NodeData::Hidden(spec) = self.tree.data_mut(h) {
                        spec.protected_by = Some(p);
                    }
                    if let NodeData::Protected(spec) = self.tree.data_mut(p) {
                        spec.hidden_by = Some(h);
                    }
                }
                None => self.diagnostics.error(
                    self.tree.line(h),
                    codes::HIDDEN_WITHOUT_PROTECTED,
                    format!("{identifier} specified HIDDEN without being PROTECTED"),
                ),
            }
        }

        for p in protected {
            let identifier = self.tree.identifier(p).unwrap_or_default().to_string();
            let declared = self
                .tree
                .prefix_chain(class)
                .into_iter()
                .any(|c| lookup_local(self.tree, c, &identifier).is_some());
            if !declared {
                self.diagnostics.error(
                    self.tree.line(p),
                    codes::PROTECTED_NOT_DECLARED,
                    format!("{identifier} specified PROTECTED but not declared"),
                );
            }
        }
    }

    fn check_scope(&mut self, scope: NodeId) -> Result<()> {
        let data = self.tree.data(scope);
        let declarations: Vec<NodeId> = data.declarations().map(|d| d.iter().collect()).unwrap_or_default();
        let statements = data.statements().to_vec();

        for decl in declarations {
            match self.tree.kind(decl) {
                Kind::Class | Kind::Procedure | Kind::Block => self.check_scope(decl)?,
                Kind::SimpleVariable => self.check_constant_declaration(decl, scope),
                _ => {}
            }
        }
        for stmt in statements {
            self.check_statement(stmt, scope)?;
        }

        if self.tree.data(scope).labels().is_some() {
            self.tree.accumulated_labels(scope)?;
            if let Some(labels) = self.tree.data_mut(scope).labels_mut() {
                labels.mark_ready_for_coding();
            }
        }
        Ok(())
    }

    fn check_constant_declaration(&mut self, decl: NodeId, scope: NodeId) {
        let NodeData::SimpleVariable(v) = self.tree.data(decl) else {
            return;
        };
        let Some(constant) = v.constant else {
            return;
        };
        let declared = v.ty.clone();
        let actual = self.type_expr(constant, scope);
        self.require_assignable(&actual, &declared, scope, self.tree.line(decl));
    }

    fn check_statement(&mut self, stmt: NodeId, scope: NodeId) -> Result<()> {
        let data = self.tree.data(stmt).clone();
        match data {
            NodeData::StandaloneExpression(s) => {
                self.type_expr(s.expression, scope);
            }
            NodeData::If(s) => {
                self.check_condition(s.condition, scope);
                self.check_statement(s.then_statement, scope)?;
                if let Some(e) = s.else_statement {
                    self.check_statement(e, scope)?;
                }
            }
            NodeData::While(s) => {
                self.check_condition(s.condition, scope);
                self.check_statement(s.body, scope)?;
            }
            NodeData::Goto(s) => {
                self.type_expr(s.target, scope);
            }
            NodeData::Labeled(s) => self.check_statement(s.statement, scope)?,
            NodeData::Compound(s) => {
                for inner in s.statements {
                    self.check_statement(inner, scope)?;
                }
            }
            NodeData::Inspect(s) => {
                let object_type = self.type_expr(s.object, scope);
                for connection in s.connections {
                    self.check_connection(connection, &object_type, scope)?;
                }
                if let Some(otherwise) = s.otherwise {
                    self.check_statement(otherwise, scope)?;
                }
            }
            NodeData::Block(_) | NodeData::Class(_) | NodeData::Procedure(_) => {
                if self.tree.data(stmt).declared_in().is_none() {
                    self.tree.data_mut(stmt).set_declared_in(Some(scope));
                }
                self.check_scope(stmt)?;
            }
            NodeData::Dummy => {}
            other if other.kind().is_expression() => {
                self.type_expr(stmt, scope);
            }
            other => {
                return Err(CoreError::internal(format!(
                    "{} in statement position",
                    other.kind()
                )));
            }
        }
        Ok(())
    }

    fn check_condition(&mut self, condition: NodeId, scope: NodeId) {
        let ty = self.type_expr(condition, scope);
        if ty != Type::Boolean && !ty.is_undefined() {
            self.diagnostics.error(
                self.tree.line(condition),
                codes::CONDITION_NOT_BOOLEAN,
                format!("condition must be of type boolean, found {ty}"),
            );
        }
    }

    fn check_connection(&mut self, connection: NodeId, object_type: &Type, scope: NodeId) -> Result<()> {
        let NodeData::Connection(cb) = self.tree.data(connection) else {
            return Err(CoreError::internal("inspect without a connection block"));
        };
        let when_class = cb.when_class.clone();
        let statement = cb.statement;
        let line = self.tree.line(connection);

        let class = match (&when_class, object_type) {
            (Some(name), _) => {
                let found = ScopeClasses::new(self.tree, scope).lookup_class(name);
                if found.is_none() {
                    self.diagnostics.error(line, codes::UNDEFINED_IDENTIFIER, format!("undefined class {name}"));
                }
                found
            }
            (None, Type::Ref(Some(name))) => ScopeClasses::new(self.tree, scope).lookup_class(name),
            (None, Type::Undefined) | (None, Type::Ref(None)) => None,
            (None, other) => {
                self.diagnostics.error(
                    line,
                    codes::REMOTE_NON_REFERENCE,
                    format!("cannot inspect a value of type {other}"),
                );
                None
            }
        };

        if let NodeData::Connection(cb) = self.tree.data_mut(connection) {
            cb.class_declaration = class;
            if cb.declared_in.is_none() {
                cb.declared_in = Some(scope);
            }
        }
        if let Some(statement) = statement {
            self.check_statement(statement, connection)?;
        }
        Ok(())
    }

    fn incompatible(&mut self, line: u32, a: &Type, b: &Type) {
        self.diagnostics.error(
            line,
            codes::INCOMPATIBLE_TYPES,
            format!("incompatible types {a} and {b}"),
        );
    }

    /// Reports when `from` cannot be assigned to `to`; returns the conversion.
    fn require_assignable(&mut self, from: &Type, to: &Type, scope: NodeId, line: u32) -> ConversionKind {
        if from.is_undefined() {
            return ConversionKind::DirectAssignable;
        }
        let conversion = is_convertible_to(&ScopeClasses::new(self.tree, scope), from, to);
        if conversion == ConversionKind::Illegal {
            self.incompatible(line, from, to);
        }
        conversion
    }

    fn class_type(&mut self, identifier: &str, scope: NodeId, line: u32) -> Type {
        match ScopeClasses::new(self.tree, scope).lookup_class(identifier) {
            Some(class) => Type::reference(self.tree.identifier(class).unwrap_or(identifier)),
            None => {
                self.diagnostics.error(
                    line,
                    codes::UNDEFINED_IDENTIFIER,
                    format!("undefined class {identifier}"),
                );
                Type::Undefined
            }
        }
    }

    fn type_arguments(&mut self, arguments: &[NodeId], scope: NodeId) {
        for argument in arguments {
            self.type_expr(*argument, scope);
        }
    }

    /// Types `expr`, stores the result in the node and returns it.
    fn type_expr(&mut self, expr: NodeId, scope: NodeId) -> Type {
        let line = self.tree.line(expr);
        let data = self.tree.data(expr).clone();
        let ty = match data {
            NodeData::Constant(c) => c.value.ty(),
            NodeData::Variable(v) => {
                self.type_arguments(&v.arguments, scope);
                let meaning = resolve_or_report(self.tree, scope, &v.identifier, line, self.diagnostics);
                meaning
                    .declaration
                    .map(|d| self.tree.data(d).declared_type())
                    .unwrap_or(Type::Undefined)
            }
            NodeData::Binary(b) => {
                let lhs = self.type_expr(b.lhs, scope);
                let rhs = self.type_expr(b.rhs, scope);
                self.type_binary(b.op, &lhs, &rhs, scope, line)
            }
            NodeData::Unary(u) => {
                let operand = self.type_expr(u.operand, scope);
                match u.op {
                    UnaryOp::Not => {
                        if operand != Type::Boolean && !operand.is_undefined() {
                            self.incompatible(line, &operand, &Type::Boolean);
                        }
                        Type::Boolean
                    }
                    UnaryOp::Plus | UnaryOp::Minus => {
                        if !operand.is_arithmetic() && !operand.is_undefined() {
                            self.incompatible(line, &operand, &Type::Integer);
                            Type::Undefined
                        } else {
                            operand
                        }
                    }
                }
            }
            NodeData::Assignment(a) => {
                let target = self.type_expr(a.lhs, scope);
                let value = self.type_expr(a.rhs, scope);
                self.type_assignment(expr, a.op, a.rhs, &target, &value, scope, line)
            }
            NodeData::ObjectGenerator(g) => {
                self.type_arguments(&g.arguments, scope);
                self.class_type(&g.class_identifier, scope, line)
            }
            NodeData::Remote(r) => {
                let object = self.type_expr(r.object, scope);
                self.type_arguments(&r.arguments, scope);
                self.type_remote(&object, &r.attribute, scope, line)
            }
            NodeData::QualifiedObject(q) => {
                let object = self.type_expr(q.object, scope);
                let target = self.class_type(&q.class_identifier, scope, line);
                self.check_reference_conversion(&object, &target, scope, line, "qua");
                target
            }
            NodeData::ObjectRelation(r) => {
                let object = self.type_expr(r.object, scope);
                let target = self.class_type(&r.class_identifier, scope, line);
                self.check_reference_conversion(&object, &target, scope, line, "is/in");
                Type::Boolean
            }
            NodeData::TypeConversion(c) => {
                self.type_expr(c.expression, scope);
                c.ty
            }
            _ => Type::Undefined,
        };
        self.tree.data_mut(expr).set_expression_type(ty.clone());
        ty
    }

    fn type_binary(&mut self, op: BinaryOp, lhs: &Type, rhs: &Type, scope: NodeId, line: u32) -> Type {
        if lhs.is_undefined() || rhs.is_undefined() {
            return if op.is_arithmetic() { Type::Undefined } else { Type::Boolean };
        }
        let classes = ScopeClasses::new(self.tree, scope);
        match op {
            BinaryOp::IntDiv => {
                if *lhs != Type::Integer || *rhs != Type::Integer {
                    self.incompatible(line, lhs, rhs);
                }
                Type::Integer
            }
            _ if op.is_arithmetic() => {
                if !lhs.is_arithmetic() || !rhs.is_arithmetic() {
                    self.incompatible(line, lhs, rhs);
                    return Type::Undefined;
                }
                let common = common_type(&classes, lhs, rhs).unwrap_or(Type::Undefined);
                if op == BinaryOp::Div && common == Type::Integer {
                    Type::Real
                } else {
                    common
                }
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Imp | BinaryOp::Eqv => {
                if *lhs != Type::Boolean || *rhs != Type::Boolean {
                    self.incompatible(line, lhs, rhs);
                }
                Type::Boolean
            }
            BinaryOp::Concat => {
                if *lhs != Type::Text || *rhs != Type::Text {
                    self.incompatible(line, lhs, rhs);
                }
                Type::Text
            }
            BinaryOp::RefEq | BinaryOp::RefNe => {
                let comparable = (lhs.is_reference() || *lhs == Type::Text) && common_type(&classes, lhs, rhs).is_some();
                if !comparable {
                    self.incompatible(line, lhs, rhs);
                }
                Type::Boolean
            }
            _ => {
                if common_type(&classes, lhs, rhs).is_none() {
                    self.incompatible(line, lhs, rhs);
                }
                Type::Boolean
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn type_assignment(
        &mut self,
        assignment: NodeId,
        op: AssignOp,
        rhs: NodeId,
        target: &Type,
        value: &Type,
        scope: NodeId,
        line: u32,
    ) -> Type {
        if value.is_undefined() || target.is_undefined() {
            return target.clone();
        }
        let conversion = is_convertible_to(&ScopeClasses::new(self.tree, scope), value, target);
        match (conversion, op) {
            (ConversionKind::Illegal, AssignOp::Reference) => {
                self.diagnostics.error(
                    line,
                    codes::ILLEGAL_REF_CONVERSION,
                    format!("illegal reference conversion from {value} to {target}"),
                );
            }
            (ConversionKind::Illegal, AssignOp::Value) => self.incompatible(line, value, target),
            (ConversionKind::ConvertValue | ConversionKind::ConvertRef, _) => {
                let converted = self.tree.add(
                    line,
                    NodeData::TypeConversion(TypeConversion {
                        expression: rhs,
                        conversion,
                        ty: target.clone(),
                    }),
                );
                if let NodeData::Assignment(a) = self.tree.data_mut(assignment) {
                    a.rhs = converted;
                }
            }
            (ConversionKind::DirectAssignable, _) => {}
        }
        target.clone()
    }

    fn type_remote(&mut self, object: &Type, attribute: &str, scope: NodeId, line: u32) -> Type {
        let name = match object {
            Type::Ref(Some(name)) => name.clone(),
            Type::Undefined => return Type::Undefined,
            other => {
                self.diagnostics.error(
                    line,
                    codes::REMOTE_NON_REFERENCE,
                    format!("remote access to {attribute} through a value of type {other}"),
                );
                return Type::Undefined;
            }
        };
        let Some(class) = ScopeClasses::new(self.tree, scope).lookup_class(&name) else {
            self.diagnostics.error(line, codes::UNDEFINED_IDENTIFIER, format!("undefined class {name}"));
            return Type::Undefined;
        };
        let meaning = resolve_remote(self.tree, scope, class, attribute);
        let (Some(declaration), Some(declarer)) = (meaning.declaration, meaning.declared_in) else {
            self.diagnostics.error(
                line,
                codes::UNDEFINED_IDENTIFIER,
                format!("undefined identifier {attribute} in {name}"),
            );
            return Type::Undefined;
        };
        if is_protected(self.tree, class, declarer, attribute)
            && !self.inside_subclass_of(scope, declarer)
        {
            self.diagnostics.error(
                line,
                codes::PROTECTED_ACCESS,
                format!("{attribute} is protected and not visible here"),
            );
        }
        self.tree.data(declaration).declared_type()
    }

    /// Some class enclosing `scope` has `class` on its prefix chain.
    fn inside_subclass_of(&self, scope: NodeId, class: NodeId) -> bool {
        let mut current = enclosing_class(self.tree, scope);
        let mut steps = 0;
        while let Some(c) = current {
            steps += 1;
            if steps > self.tree.len() {
                return false;
            }
            if self.tree.prefix_chain(c).contains(&class) {
                return true;
            }
            current = self.tree.data(c).declared_in().and_then(|s| enclosing_class(self.tree, s));
        }
        false
    }

    fn check_reference_conversion(&mut self, object: &Type, target: &Type, scope: NodeId, line: u32, what: &str) {
        if object.is_undefined() || target.is_undefined() {
            return;
        }
        let conversion = is_convertible_to(&ScopeClasses::new(self.tree, scope), object, target);
        if conversion == ConversionKind::Illegal || !object.is_reference() {
            self.diagnostics.error(
                line,
                codes::ILLEGAL_REF_CONVERSION,
                format!("illegal reference conversion ({what}) from {object} to {target}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{
        BlockDeclaration, ClassDeclaration, ConnectionBlock, HiddenSpecification,
        ProcedureDeclaration, ProtectedSpecification, SimpleVariableDeclaration,
    };
    use crate::expr::{
        AssignOp, Assignment, BinaryOperation, ConstValue, Constant, ObjectGenerator,
        QualifiedObject, RemoteVariable, Variable,
    };
    use crate::meaning::resolve;
    use crate::stmt::{IfStatement, InspectStatement, StandaloneExpression};

    struct Program {
        tree: SyntaxTree,
        diags: Diagnostics,
        main: NodeId,
    }

    impl Program {
        fn new() -> Self {
            let mut tree = SyntaxTree::new();
            let main = tree.add(1, NodeData::Block(BlockDeclaration::new("main")));
            Program {
                tree,
                diags: Diagnostics::new(),
                main,
            }
        }

        fn class(&mut self, name: &str, prefix: Option<&str>) -> NodeId {
            let mut decl = ClassDeclaration::new(name);
            decl.prefix = prefix.map(str::to_string);
            let id = self.tree.add(2, NodeData::Class(decl));
            self.tree.declare(self.main, id, &mut self.diags);
            id
        }

        fn var(&mut self, scope: NodeId, name: &str, ty: Type) -> NodeId {
            let id = self
                .tree
                .add(3, NodeData::SimpleVariable(SimpleVariableDeclaration::new(name, ty)));
            self.tree.declare(scope, id, &mut self.diags);
            id
        }

        fn spec(&mut self, class: NodeId, data: NodeData) -> NodeId {
            let id = self.tree.add(4, data);
            self.tree.add_specification(class, id).unwrap();
            id
        }

        fn expr(&mut self, line: u32, data: NodeData) -> NodeId {
            self.tree.add(line, data)
        }

        fn name(&mut self, line: u32, identifier: &str) -> NodeId {
            self.expr(line, NodeData::Variable(Variable::new(identifier)))
        }

        fn stmt(&mut self, scope: NodeId, line: u32, data: NodeData) -> NodeId {
            let e = self.expr(line, data);
            let s = self
                .tree
                .add(line, NodeData::StandaloneExpression(StandaloneExpression { expression: e }));
            self.tree.add_statement(scope, s).unwrap();
            e
        }

        fn assign(&mut self, scope: NodeId, line: u32, op: AssignOp, lhs: NodeId, rhs: NodeId) -> NodeId {
            self.stmt(
                scope,
                line,
                NodeData::Assignment(Assignment {
                    op,
                    lhs,
                    rhs,
                    ty: Type::Undefined,
                }),
            )
        }

        fn check(&mut self) {
            Checker::new(&mut self.tree, &mut self.diags).check(self.main).unwrap();
        }
    }

    #[test]
    fn prefixes_are_resolved_lexically() {
        let mut p = Program::new();
        let a = p.class("A", None);
        let b = p.class("B", Some("a"));
        p.check();
        assert!(!p.diags.has_errors());
        assert_eq!(p.tree.prefix_class(b), Some(a));
    }

    #[test]
    fn bad_prefixes_are_reported() {
        let mut p = Program::new();
        p.var(p.main, "n", Type::Integer);
        p.class("B", Some("n"));
        p.class("C", Some("Missing"));
        p.check();
        assert_eq!(p.diags.count_code(codes::PREFIX_NOT_A_CLASS), 1);
        assert_eq!(p.diags.count_code(codes::UNDEFINED_IDENTIFIER), 1);
    }

    #[test]
    fn circular_prefix_is_cut_and_reported_once() {
        let mut p = Program::new();
        let a = p.class("A", Some("B"));
        let b = p.class("B", Some("A"));
        p.check();
        assert_eq!(p.diags.count_code(codes::CIRCULAR_PREFIX), 1);
        assert!(p.tree.prefix_class(a).is_none() || p.tree.prefix_class(b).is_none());
    }

    #[test]
    fn hidden_is_paired_with_protected() {
        let mut p = Program::new();
        let a = p.class("A", None);
        let b = p.class("B", Some("A"));
        p.var(a, "x", Type::Integer);
        let prot = p.spec(a, NodeData::Protected(ProtectedSpecification::new("x")));
        let hid = p.spec(b, NodeData::Hidden(HiddenSpecification::new("x")));
        p.check();

        assert!(!p.diags.has_errors());
        let NodeData::Hidden(h) = p.tree.data(hid) else { panic!() };
        assert_eq!(h.protected_by, Some(prot));
        let NodeData::Protected(pr) = p.tree.data(prot) else { panic!() };
        assert_eq!(pr.hidden_by, Some(hid));
    }

    #[test]
    fn hidden_without_protected_is_reported_exactly_once() {
        let mut p = Program::new();
        let a = p.class("A", None);
        let b = p.class("B", Some("A"));
        p.var(a, "x", Type::Integer);
        p.spec(b, NodeData::Hidden(HiddenSpecification::new("x")));
        p.check();
        assert_eq!(p.diags.count_code(codes::HIDDEN_WITHOUT_PROTECTED), 1);
        assert_eq!(p.diags.error_count(), 1);
        let message = &p.diags.entries()[0].message;
        assert!(message.contains("specified HIDDEN without being PROTECTED"));
    }

    #[test]
    fn protected_must_name_an_attribute() {
        let mut p = Program::new();
        let a = p.class("A", None);
        p.spec(a, NodeData::Protected(ProtectedSpecification::new("ghost")));
        p.check();
        assert_eq!(p.diags.count_code(codes::PROTECTED_NOT_DECLARED), 1);
    }

    #[test]
    fn value_assignment_inserts_a_conversion() {
        let mut p = Program::new();
        p.var(p.main, "r", Type::Real);
        let lhs = p.name(5, "r");
        let rhs = p.expr(5, NodeData::Constant(Constant::new(ConstValue::Integer(2))));
        let assign = p.assign(p.main, 5, AssignOp::Value, lhs, rhs);
        p.check();

        assert!(!p.diags.has_errors());
        let NodeData::Assignment(a) = p.tree.data(assign) else { panic!() };
        assert_eq!(a.ty, Type::Real);
        let NodeData::TypeConversion(c) = p.tree.data(a.rhs) else {
            panic!("expected a conversion around the value");
        };
        assert_eq!(c.conversion, ConversionKind::ConvertValue);
        assert_eq!(c.expression, rhs);
    }

    #[test]
    fn reference_assignment_checks_the_class_lattice() {
        let mut p = Program::new();
        p.class("Vehicle", None);
        p.class("Car", Some("Vehicle"));
        p.class("Animal", None);
        p.var(p.main, "v", Type::reference("Vehicle"));
        p.var(p.main, "c", Type::reference("Car"));
        p.var(p.main, "pet", Type::reference("Animal"));

        let (l, r) = (p.name(6, "v"), p.name(6, "c"));
        let upcast = p.assign(p.main, 6, AssignOp::Reference, l, r);
        let (l, r) = (p.name(7, "c"), p.name(7, "v"));
        let downcast = p.assign(p.main, 7, AssignOp::Reference, l, r);
        let (l, r) = (p.name(8, "pet"), p.name(8, "v"));
        p.assign(p.main, 8, AssignOp::Reference, l, r);
        p.check();

        let NodeData::Assignment(a) = p.tree.data(upcast) else { panic!() };
        assert_eq!(p.tree.kind(a.rhs), Kind::Variable);
        let NodeData::Assignment(a) = p.tree.data(downcast) else { panic!() };
        assert_eq!(p.tree.kind(a.rhs), Kind::TypeConversion);
        assert_eq!(p.diags.count_code(codes::ILLEGAL_REF_CONVERSION), 1);
        assert_eq!(p.diags.entries()[0].line, 8);
    }

    #[test]
    fn incompatible_value_assignment_is_reported() {
        let mut p = Program::new();
        p.var(p.main, "n", Type::Integer);
        let lhs = p.name(4, "n");
        let rhs = p.expr(4, NodeData::Constant(Constant::new(ConstValue::Text(Some("x".into())))));
        p.assign(p.main, 4, AssignOp::Value, lhs, rhs);
        p.check();
        assert_eq!(p.diags.count_code(codes::INCOMPATIBLE_TYPES), 1);
    }

    #[test]
    fn undefined_identifiers_do_not_cascade() {
        let mut p = Program::new();
        p.var(p.main, "n", Type::Integer);
        let lhs = p.name(4, "n");
        let rhs = p.name(4, "nothing");
        let sum = p.expr(
            4,
            NodeData::Binary(BinaryOperation {
                op: BinaryOp::Add,
                lhs: rhs,
                rhs: lhs,
                ty: Type::Undefined,
            }),
        );
        let target = p.name(4, "n");
        p.assign(p.main, 4, AssignOp::Value, target, sum);
        p.check();
        assert_eq!(p.diags.error_count(), 1);
        assert_eq!(p.diags.count_code(codes::UNDEFINED_IDENTIFIER), 1);
    }

    #[test]
    fn conditions_must_be_boolean() {
        let mut p = Program::new();
        let cond = p.expr(9, NodeData::Constant(Constant::new(ConstValue::Integer(1))));
        let then = p.tree.add(9, NodeData::Dummy);
        let stmt = p.tree.add(
            9,
            NodeData::If(IfStatement {
                condition: cond,
                then_statement: then,
                else_statement: None,
            }),
        );
        p.tree.add_statement(p.main, stmt).unwrap();
        p.check();
        assert_eq!(p.diags.count_code(codes::CONDITION_NOT_BOOLEAN), 1);
    }

    #[test]
    fn remote_access_respects_protection() {
        let mut p = Program::new();
        let a = p.class("A", None);
        p.var(a, "secret", Type::Integer);
        p.var(a, "open", Type::Text);
        p.spec(a, NodeData::Protected(ProtectedSpecification::new("secret")));
        p.var(p.main, "obj", Type::reference("A"));
        p.var(p.main, "n", Type::Integer);

        let obj = p.name(10, "obj");
        let open = p.stmt(
            p.main,
            10,
            NodeData::Remote(RemoteVariable {
                object: obj,
                attribute: "open".into(),
                arguments: Vec::new(),
                ty: Type::Undefined,
            }),
        );
        let obj = p.name(11, "obj");
        p.stmt(
            p.main,
            11,
            NodeData::Remote(RemoteVariable {
                object: obj,
                attribute: "secret".into(),
                arguments: Vec::new(),
                ty: Type::Undefined,
            }),
        );
        let n = p.name(12, "n");
        p.stmt(
            p.main,
            12,
            NodeData::Remote(RemoteVariable {
                object: n,
                attribute: "open".into(),
                arguments: Vec::new(),
                ty: Type::Undefined,
            }),
        );
        p.check();

        assert_eq!(p.tree.data(open).expression_type(), Some(&Type::Text));
        assert_eq!(p.diags.count_code(codes::PROTECTED_ACCESS), 1);
        assert_eq!(p.diags.count_code(codes::REMOTE_NON_REFERENCE), 1);
    }

    #[test]
    fn qua_between_unrelated_classes_is_illegal() {
        let mut p = Program::new();
        p.class("Vehicle", None);
        p.class("Animal", None);
        let generated = p.expr(
            3,
            NodeData::ObjectGenerator(ObjectGenerator {
                class_identifier: "Vehicle".into(),
                arguments: Vec::new(),
                ty: Type::Undefined,
            }),
        );
        let qua = p.stmt(
            p.main,
            3,
            NodeData::QualifiedObject(QualifiedObject {
                object: generated,
                class_identifier: "Animal".into(),
                ty: Type::Undefined,
            }),
        );
        p.check();
        assert_eq!(p.tree.data(generated).expression_type(), Some(&Type::reference("VEHICLE")));
        assert_eq!(p.tree.data(qua).expression_type(), Some(&Type::reference("ANIMAL")));
        assert_eq!(p.diags.count_code(codes::ILLEGAL_REF_CONVERSION), 1);
    }

    #[test]
    fn inspect_connects_the_when_class() {
        let mut p = Program::new();
        let a = p.class("A", None);
        p.var(a, "len", Type::Integer);
        p.var(p.main, "obj", Type::reference("A"));

        let object = p.name(20, "obj");
        let inner = p.name(21, "len");
        let body = p
            .tree
            .add(21, NodeData::StandaloneExpression(StandaloneExpression { expression: inner }));
        let cb = p.tree.add(21, NodeData::Connection(ConnectionBlock::new(object, Some("A".into()), body)));
        let inspect = p.tree.add(
            20,
            NodeData::Inspect(InspectStatement {
                object,
                connections: vec![cb],
                otherwise: None,
            }),
        );
        p.tree.add_statement(p.main, inspect).unwrap();
        p.check();

        assert!(!p.diags.has_errors());
        let NodeData::Connection(c) = p.tree.data(cb) else { panic!() };
        assert_eq!(c.class_declaration, Some(a));
        assert_eq!(p.tree.data(inner).expression_type(), Some(&Type::Integer));
    }

    #[test]
    fn labels_are_accumulated_and_frozen() {
        let mut p = Program::new();
        let a = p.class("A", None);
        let b = p.class("B", Some("A"));
        p.tree.add_label(a, "top", 2).unwrap();
        p.tree.add_label(b, "next", 3).unwrap();
        let proc = p
            .tree
            .add(4, NodeData::Procedure(ProcedureDeclaration::new("p", Type::Undefined)));
        p.tree.declare(b, proc, &mut p.diags);
        p.check();

        assert_eq!(p.tree.accumulated_labels(b).unwrap().len(), 2);
        assert!(p.tree.data(b).labels().unwrap().is_ready_for_coding());
        assert!(p.tree.data(proc).labels().unwrap().is_ready_for_coding());
        assert!(p.tree.add_label(b, "late", 9).is_err());
        assert_eq!(resolve(&p.tree, proc, "TOP").declaration.map(|l| p.tree.kind(l)), Some(Kind::Label));
    }
}
