//! Identifier resolution.
//!
//! A lookup walks the lexical scopes outward from the scope of the
//! occurrence. Class scopes are searched through their prefix chain, where
//! `hidden` specifications of prefix levels make the search tunnel behind
//! the matching `protected` declarer. Connection blocks search the
//! attributes of the connected class as if accessed remotely.

use crate::diagnostic::{Diagnostics, codes};
use crate::options::same_identifier;
use crate::tree::{NodeData, NodeId, SyntaxTree};
use crate::types::ClassLookup;

/// Result of one resolution query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meaning {
    /// `None` for the placeholder substituted after an undefined identifier.
    pub declaration: Option<NodeId>,
    /// Scope the search started in.
    pub search_scope: NodeId,
    /// Lexical scope (class, procedure, block or connection block) in
    /// which the search succeeded.
    pub found_in: Option<NodeId>,
    /// Scope whose declaration list holds the declaration.
    pub declared_in: Option<NodeId>,
    /// The declaration was reached by tunneling behind a hidden attribute.
    pub found_behind_invisible: bool,
    /// Found among the attributes of a connected object.
    pub connected: bool,
}

impl Meaning {
    pub fn undefined(search_scope: NodeId) -> Self {
        Meaning {
            declaration: None,
            search_scope,
            found_in: None,
            declared_in: None,
            found_behind_invisible: false,
            connected: false,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.declaration.is_some()
    }
}

/// An attribute located in a class or one of its prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub declaration: NodeId,
    /// Class on the prefix chain that declares it.
    pub class: NodeId,
    pub behind_invisible: bool,
}

fn matches(tree: &SyntaxTree, id: NodeId, identifier: &str) -> bool {
    tree.identifier(id)
        .is_some_and(|i| same_identifier(i, identifier, tree.case_sensitive()))
}

fn find_in(tree: &SyntaxTree, ids: &[NodeId], identifier: &str) -> Option<NodeId> {
    ids.iter().copied().find(|id| matches(tree, *id, identifier))
}

/// Declarations, parameters, labels and virtual specifications of one scope.
pub fn lookup_local(tree: &SyntaxTree, scope: NodeId, identifier: &str) -> Option<NodeId> {
    let data = tree.data(scope);
    if let Some(found) = data
        .declarations()
        .and_then(|d| d.find(identifier, tree.case_sensitive()))
    {
        return Some(found);
    }
    if let Some(found) = find_in(tree, data.parameters(), identifier) {
        return Some(found);
    }
    if let Some(found) = data.labels().and_then(|l| find_in(tree, l.local(), identifier)) {
        return Some(found);
    }
    match data {
        NodeData::Class(c) => find_in(tree, &c.virtuals, identifier),
        _ => None,
    }
}

pub fn hidden_spec(tree: &SyntaxTree, class: NodeId, identifier: &str) -> Option<NodeId> {
    tree.class(class).and_then(|c| find_in(tree, &c.hidden, identifier))
}

pub fn protected_spec(tree: &SyntaxTree, class: NodeId, identifier: &str) -> Option<NodeId> {
    tree.class(class).and_then(|c| find_in(tree, &c.protected, identifier))
}

/// Finds the protected specification a `hidden` specification of
/// `identifier` in `class` refers to.
///
/// The class itself is searched first, then its prefixes. A prefix that
/// hides the same identifier again is skipped together with everything up
/// to its own protected declarer.
pub fn find_protected(tree: &SyntaxTree, class: NodeId, identifier: &str) -> Option<NodeId> {
    find_protected_bounded(tree, class, identifier, tree.len())
}

fn find_protected_bounded(tree: &SyntaxTree, class: NodeId, identifier: &str, budget: usize) -> Option<NodeId> {
    if let Some(spec) = protected_spec(tree, class, identifier) {
        return Some(spec);
    }
    let mut budget = budget;
    let mut current = tree.prefix_class(class);
    while let Some(prefix) = current {
        budget = budget.checked_sub(1)?;
        if hidden_spec(tree, prefix, identifier).is_some() {
            let declarer = find_protected_bounded(tree, prefix, identifier, budget)?;
            current = tree
                .data(declarer)
                .declared_in()
                .and_then(|c| tree.prefix_class(c));
            continue;
        }
        if let Some(spec) = protected_spec(tree, prefix, identifier) {
            return Some(spec);
        }
        current = tree.prefix_class(prefix);
    }
    None
}

/// Class that declares the protected specification paired with the hidden
/// specification of `identifier` in `class`.
fn protected_declarer(tree: &SyntaxTree, class: NodeId, hidden: NodeId, identifier: &str) -> Option<NodeId> {
    let paired = match tree.data(hidden) {
        NodeData::Hidden(h) => h.protected_by,
        _ => None,
    };
    paired
        .or_else(|| find_protected(tree, class, identifier))
        .and_then(|p| tree.data(p).declared_in())
}

/// Searches `class` and its prefix chain for `identifier`.
///
/// Hidden specifications apply on every prefix level, and on the class
/// itself when `remote` is set. A hidden identifier continues the search
/// behind the class of its protected declarer.
pub fn find_attribute(tree: &SyntaxTree, class: NodeId, identifier: &str, remote: bool) -> Option<Attribute> {
    let mut current = Some(class);
    let mut behind_invisible = false;
    let mut first = true;
    let mut steps = 0;
    while let Some(c) = current {
        steps += 1;
        if steps > tree.len() {
            return None;
        }
        if remote || !first {
            if let Some(hidden) = hidden_spec(tree, c, identifier) {
                behind_invisible = true;
                first = false;
                current = match protected_declarer(tree, c, hidden, identifier) {
                    Some(declarer) => tree.prefix_class(declarer),
                    None => tree.prefix_class(c),
                };
                continue;
            }
        }
        if let Some(declaration) = lookup_local(tree, c, identifier) {
            return Some(Attribute {
                declaration,
                class: c,
                behind_invisible,
            });
        }
        first = false;
        current = tree.prefix_class(c);
    }
    None
}

/// A protected specification of `identifier` on the prefix chain of
/// `class`, up to and including `declarer`.
pub fn is_protected(tree: &SyntaxTree, class: NodeId, declarer: NodeId, identifier: &str) -> bool {
    for c in tree.prefix_chain(class) {
        if protected_spec(tree, c, identifier).is_some() {
            return true;
        }
        if c == declarer {
            break;
        }
    }
    false
}

/// Follows an external declaration to the module it loaded.
fn effective_declaration(tree: &SyntaxTree, declaration: NodeId) -> NodeId {
    match tree.data(declaration) {
        NodeData::External(e) => e.module.unwrap_or(declaration),
        _ => declaration,
    }
}

/// Resolves `identifier` as seen from `scope`.
pub fn resolve(tree: &SyntaxTree, scope: NodeId, identifier: &str) -> Meaning {
    let mut current = Some(scope);
    let mut steps = 0;
    while let Some(s) = current {
        steps += 1;
        if steps > tree.len() {
            break;
        }
        let data = tree.data(s);
        let found = match data {
            NodeData::Connection(cb) => cb
                .class_declaration
                .and_then(|class| find_attribute(tree, class, identifier, true))
                .map(|a| (a, true)),
            NodeData::Class(_) => find_attribute(tree, s, identifier, false).map(|a| (a, false)),
            _ => lookup_local(tree, s, identifier).map(|declaration| {
                (
                    Attribute {
                        declaration,
                        class: s,
                        behind_invisible: false,
                    },
                    false,
                )
            }),
        };
        if let Some((attribute, connected)) = found {
            return Meaning {
                declaration: Some(effective_declaration(tree, attribute.declaration)),
                search_scope: scope,
                found_in: Some(s),
                declared_in: Some(attribute.class),
                found_behind_invisible: attribute.behind_invisible,
                connected,
            };
        }
        current = data.declared_in();
    }
    Meaning::undefined(scope)
}

/// Like [`resolve`], reporting an undefined identifier and returning the
/// placeholder meaning.
pub fn resolve_or_report(
    tree: &SyntaxTree,
    scope: NodeId,
    identifier: &str,
    line: u32,
    diagnostics: &mut Diagnostics,
) -> Meaning {
    let meaning = resolve(tree, scope, identifier);
    if !meaning.is_defined() {
        diagnostics.error(
            line,
            codes::UNDEFINED_IDENTIFIER,
            format!("undefined identifier {identifier}"),
        );
    }
    meaning
}

/// Resolves `object.identifier` where the object is qualified by `class`.
pub fn resolve_remote(tree: &SyntaxTree, scope: NodeId, class: NodeId, identifier: &str) -> Meaning {
    match find_attribute(tree, class, identifier, true) {
        Some(a) => Meaning {
            declaration: Some(effective_declaration(tree, a.declaration)),
            search_scope: scope,
            found_in: Some(class),
            declared_in: Some(a.class),
            found_behind_invisible: a.behind_invisible,
            connected: false,
        },
        None => Meaning::undefined(scope),
    }
}

/// Innermost class enclosing `scope`, including `scope` itself.
pub fn enclosing_class(tree: &SyntaxTree, scope: NodeId) -> Option<NodeId> {
    let mut current = Some(scope);
    let mut steps = 0;
    while let Some(s) = current {
        steps += 1;
        if steps > tree.len() {
            return None;
        }
        if tree.class(s).is_some() {
            return Some(s);
        }
        current = tree.data(s).declared_in();
    }
    None
}

/// The class hierarchy as seen from one scope.
pub struct ScopeClasses<'a> {
    tree: &'a SyntaxTree,
    scope: NodeId,
}

impl<'a> ScopeClasses<'a> {
    pub fn new(tree: &'a SyntaxTree, scope: NodeId) -> Self {
        ScopeClasses { tree, scope }
    }
}

impl ClassLookup for ScopeClasses<'_> {
    fn lookup_class(&self, identifier: &str) -> Option<NodeId> {
        resolve(self.tree, self.scope, identifier)
            .declaration
            .filter(|d| self.tree.class(*d).is_some())
    }

    fn is_subclass(&self, sub: NodeId, sup: NodeId) -> bool {
        self.tree.is_subclass(sub, sup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{
        BlockDeclaration, ClassDeclaration, ConnectionBlock, ExternalDeclaration,
        HiddenSpecification, ProcedureDeclaration, ProtectedSpecification, SimpleVariableDeclaration,
    };
    use crate::kind::Kind;
    use crate::types::{Type, is_sub_reference_of};

    struct Fixture {
        tree: SyntaxTree,
        diags: Diagnostics,
        main: NodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut tree = SyntaxTree::new();
            let main = tree.add(1, NodeData::Block(BlockDeclaration::new("main")));
            Fixture {
                tree,
                diags: Diagnostics::new(),
                main,
            }
        }

        fn class(&mut self, name: &str, prefix: Option<NodeId>) -> NodeId {
            let mut decl = ClassDeclaration::new(name);
            decl.prefix_class = prefix;
            let id = self.tree.add(1, NodeData::Class(decl));
            self.tree.declare(self.main, id, &mut self.diags);
            id
        }

        fn var(&mut self, scope: NodeId, name: &str) -> NodeId {
            let id = self
                .tree
                .add(2, NodeData::SimpleVariable(SimpleVariableDeclaration::new(name, Type::Integer)));
            self.tree.declare(scope, id, &mut self.diags);
            id
        }

        fn protect(&mut self, class: NodeId, name: &str) -> NodeId {
            let id = self.tree.add(3, NodeData::Protected(ProtectedSpecification::new(name)));
            self.tree.add_specification(class, id).unwrap();
            id
        }

        fn hide(&mut self, class: NodeId, name: &str) -> NodeId {
            let id = self.tree.add(3, NodeData::Hidden(HiddenSpecification::new(name)));
            self.tree.add_specification(class, id).unwrap();
            id
        }
    }

    #[test]
    fn resolves_outward_through_lexical_scopes() {
        let mut f = Fixture::new();
        let x = f.var(f.main, "x");
        let proc = f.tree.add(4, NodeData::Procedure(ProcedureDeclaration::new("p", Type::Undefined)));
        f.tree.declare(f.main, proc, &mut f.diags);
        let inner = f.tree.add(5, NodeData::Block(BlockDeclaration::new("inner")));
        f.tree.declare(proc, inner, &mut f.diags);

        let m = resolve(&f.tree, inner, "X");
        assert_eq!(m.declaration, Some(x));
        assert_eq!(m.search_scope, inner);
        assert_eq!(m.found_in, Some(f.main));
        assert!(!m.found_behind_invisible);
    }

    #[test]
    fn undefined_identifier_yields_a_placeholder() {
        let mut f = Fixture::new();
        let m = resolve_or_report(&f.tree, f.main, "nowhere", 7, &mut f.diags);
        assert!(!m.is_defined());
        assert_eq!(f.diags.count_code(codes::UNDEFINED_IDENTIFIER), 1);
        assert_eq!(f.diags.entries()[0].line, 7);
    }

    #[test]
    fn class_attributes_come_from_the_prefix_chain() {
        let mut f = Fixture::new();
        let a = f.class("A", None);
        let b = f.class("B", Some(a));
        let x = f.var(a, "x");

        let m = resolve(&f.tree, b, "x");
        assert_eq!(m.declaration, Some(x));
        assert_eq!(m.found_in, Some(b));
        assert_eq!(m.declared_in, Some(a));
    }

    #[test]
    fn hidden_attribute_is_invisible_below_the_hiding_class() {
        let mut f = Fixture::new();
        let a = f.class("A", None);
        let b = f.class("B", Some(a));
        let c = f.class("C", Some(b));
        let x = f.var(a, "x");
        f.protect(a, "x");
        f.hide(b, "x");

        // inside B the attribute is still visible
        assert_eq!(resolve(&f.tree, b, "x").declaration, Some(x));
        // from the subclass the search tunnels behind A
        let m = resolve(&f.tree, c, "x");
        assert!(!m.is_defined());
        // remote access through ref(B) is hidden as well
        assert!(!resolve_remote(&f.tree, f.main, b, "x").is_defined());
        assert_eq!(resolve_remote(&f.tree, f.main, a, "x").declaration, Some(x));
    }

    #[test]
    fn search_behind_a_hidden_boundary_is_flagged() {
        let mut f = Fixture::new();
        let z = f.class("Z", None);
        let a = f.class("A", Some(z));
        let b = f.class("B", Some(a));
        let c = f.class("C", Some(b));
        let outer_x = f.var(z, "x");
        f.var(a, "x");
        f.protect(a, "x");
        f.hide(b, "x");

        let m = resolve(&f.tree, c, "x");
        assert_eq!(m.declaration, Some(outer_x));
        assert_eq!(m.declared_in, Some(z));
        assert!(m.found_behind_invisible);
    }

    #[test]
    fn protected_pairing_skips_nested_hidden_re_exports() {
        let mut f = Fixture::new();
        let a = f.class("A", None);
        let b = f.class("B", Some(a));
        let c = f.class("C", Some(b));
        let d = f.class("D", Some(c));
        f.var(a, "x");
        let pa = f.protect(a, "x");
        f.var(b, "x");
        let pb = f.protect(b, "x");
        f.hide(c, "x");
        f.hide(d, "x");

        assert_eq!(find_protected(&f.tree, c, "x"), Some(pb));
        // D's own search must skip C's hidden x together with B's protected
        assert_eq!(find_protected(&f.tree, d, "x"), Some(pa));
        assert_eq!(find_protected(&f.tree, a, "y"), None);
    }

    #[test]
    fn connection_block_sees_the_connected_class() {
        let mut f = Fixture::new();
        let a = f.class("A", None);
        let len = f.var(a, "len");
        let obj = f.tree.add(6, NodeData::Dummy);
        let body = f.tree.add(6, NodeData::Dummy);
        let mut cb = ConnectionBlock::new(obj, Some("A".into()), body);
        cb.declared_in = Some(f.main);
        cb.class_declaration = Some(a);
        let cb = f.tree.add(6, NodeData::Connection(cb));

        let m = resolve(&f.tree, cb, "len");
        assert_eq!(m.declaration, Some(len));
        assert!(m.connected);
        assert_eq!(m.found_in, Some(cb));

        // identifiers not in the class fall through to the lexical scope
        let y = f.var(f.main, "y");
        let m = resolve(&f.tree, cb, "y");
        assert_eq!(m.declaration, Some(y));
        assert!(!m.connected);
    }

    #[test]
    fn external_declarations_resolve_to_their_module() {
        let mut f = Fixture::new();
        let module = f.tree.add(1, NodeData::Class(ClassDeclaration::new("SHAPE")));
        let mut ext = ExternalDeclaration::new("Shape", Kind::Class, "simula/user/SHAPE.atr");
        ext.module = Some(module);
        let ext = f.tree.add(1, NodeData::External(ext));
        f.tree.declare(f.main, ext, &mut f.diags);

        let classes = ScopeClasses::new(&f.tree, f.main);
        assert_eq!(classes.lookup_class("shape"), Some(module));
        assert_eq!(enclosing_class(&f.tree, f.main), None);
    }

    #[test]
    fn scope_classes_drive_the_type_lattice() {
        let mut f = Fixture::new();
        let a = f.class("Vehicle", None);
        let b = f.class("Car", Some(a));
        f.var(f.main, "Vehicle2");
        let classes = ScopeClasses::new(&f.tree, b);
        assert!(is_sub_reference_of(&classes, &Type::reference("Car"), &Type::reference("Vehicle")));
        assert!(!is_sub_reference_of(&classes, &Type::reference("Vehicle"), &Type::reference("Car")));
        assert_eq!(classes.lookup_class("Vehicle2"), None);
        assert_eq!(enclosing_class(&f.tree, b), Some(b));
    }

    #[test]
    fn protection_is_seen_up_to_the_declarer() {
        let mut f = Fixture::new();
        let a = f.class("A", None);
        let b = f.class("B", Some(a));
        f.var(a, "x");
        f.protect(a, "x");
        assert!(is_protected(&f.tree, b, a, "x"));
        assert!(!is_protected(&f.tree, b, a, "y"));
    }
}
