//! Attribute files: the persisted declaration tree of one separately
//! compiled class or procedure.
//!
//! Layout:
//!
//! 1. version string,
//! 2. class hierarchy quadruples `(sub package, sub name, super package,
//!    super name)` up to [`HIERARCHY_END`],
//! 3. external declaration records, each followed by loading the attribute
//!    file it names,
//! 4. exactly one module record (`Class` or `Procedure`).
//!
//! Links from the module into the graph of an external module (a resolved
//! prefix, a connection's class, a hidden attribute's protector) are
//! written as null and resolved again when the module is checked after
//! loading.

use std::collections::HashSet;

use log::debug;

use crate::error::{CoreError, Result};
use crate::hierarchy::{ClassHierarchy, ClassIdentity};
use crate::kind::Kind;
use crate::object_codec::{ObjectReader, ObjectWriter};
use crate::tree::{NodeData, NodeId, SyntaxTree};

pub const ATTRIBUTE_FILE_VERSION: &str = "SIMC-ATR 1.0";
pub const HIERARCHY_END: &str = "%%END-HIERARCHY";

/// What a reader needs from the surrounding session.
pub trait AttributeContext {
    fn register_edge(&mut self, sub: ClassIdentity, sup: ClassIdentity);

    /// Loads the module named by the external declaration `external` into
    /// `tree` and returns it.
    fn load_external(&mut self, tree: &mut SyntaxTree, external: NodeId) -> Result<NodeId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub module: NodeId,
    pub externals: Vec<NodeId>,
}

/// Serializes `module` and the external declarations it depends on,
/// numbering objects from `first_sequence`.
///
/// Returns the bytes and the next unused sequence number.
pub fn write_attribute_file(
    tree: &SyntaxTree,
    module: NodeId,
    externals: &[NodeId],
    hierarchy: &ClassHierarchy,
    first_sequence: i16,
) -> Result<(Vec<u8>, i16)> {
    let kind = tree.kind(module);
    if !kind.is_module() {
        return Err(CoreError::internal(format!("a {kind} cannot be written as a module")));
    }

    let mut writer = ObjectWriter::new(tree, first_sequence);
    for id in externals.iter().chain([&module]) {
        if let Some(scope) = tree.data(*id).declared_in() {
            writer.detach(scope);
        }
    }
    for id in external_graph(tree, externals) {
        writer.detach(id);
    }

    let out = writer.output();
    out.write_string(Some(ATTRIBUTE_FILE_VERSION))?;
    for (sub, sup) in hierarchy.edges() {
        out.write_string(Some(&sub.package))?;
        out.write_string(Some(&sub.name))?;
        out.write_string(Some(&sup.package))?;
        out.write_string(Some(&sup.name))?;
    }
    out.write_string(Some(HIERARCHY_END))?;

    for external in externals {
        let kind = tree.kind(*external);
        if kind != Kind::ExternalDeclaration {
            return Err(CoreError::internal(format!("{kind} in the external declaration list")));
        }
        writer.write_node(*external)?;
    }
    writer.write_node(module)?;

    let (bytes, next) = writer.finish();
    debug!(
        "wrote attribute file for {} ({} bytes, sequence {first_sequence}..{next})",
        tree.identifier(module).unwrap_or("?"),
        bytes.len()
    );
    Ok((bytes, next))
}

/// Reads an attribute file into `tree`.
pub fn read_attribute_file(
    tree: &mut SyntaxTree,
    bytes: &[u8],
    context: &mut impl AttributeContext,
) -> Result<LoadedModule> {
    let mut reader = ObjectReader::new(tree, bytes);

    let version = reader.input().read_string()?;
    if version.as_deref() != Some(ATTRIBUTE_FILE_VERSION) {
        return Err(CoreError::Format(format!(
            "version {version:?}, expected {ATTRIBUTE_FILE_VERSION:?}"
        )));
    }

    loop {
        let sub_package = header_string(&mut reader)?;
        if sub_package == HIERARCHY_END {
            break;
        }
        let sub_name = header_string(&mut reader)?;
        let sup_package = header_string(&mut reader)?;
        let sup_name = header_string(&mut reader)?;
        context.register_edge(
            ClassIdentity::new(sub_package, sub_name),
            ClassIdentity::new(sup_package, sup_name),
        );
    }

    let mut externals = Vec::new();
    let mut kind = reader.input().read_kind()?;
    while kind == Kind::ExternalDeclaration {
        let external = reader
            .read_obj_tagged(kind)?
            .ok_or_else(|| CoreError::internal("external declaration read as null"))?;
        let module = context.load_external(reader.tree_mut(), external)?;
        if let NodeData::External(e) = reader.tree_mut().data_mut(external) {
            e.module = Some(module);
        }
        externals.push(external);
        kind = reader.input().read_kind()?;
    }

    if !kind.is_module() {
        return Err(CoreError::internal(format!(
            "{kind} where the module record was expected"
        )));
    }
    let module = reader
        .read_obj_tagged(kind)?
        .ok_or_else(|| CoreError::internal("module read as null"))?;
    debug!(
        "read attribute file for {} ({} externals)",
        reader.tree().identifier(module).unwrap_or("?"),
        externals.len()
    );
    Ok(LoadedModule { module, externals })
}

/// Every node of the modules loaded for `externals`, including the
/// modules their classes are prefixed by.
fn external_graph(tree: &SyntaxTree, externals: &[NodeId]) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<NodeId> = externals
        .iter()
        .filter_map(|id| match tree.data(*id) {
            NodeData::External(e) => e.module,
            _ => None,
        })
        .collect();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        stack.extend(tree.data(id).children());
        stack.extend(tree.prefix_class(id));
    }
    seen
}

fn header_string(reader: &mut ObjectReader<'_, '_>) -> Result<String> {
    reader
        .input()
        .read_string()?
        .ok_or_else(|| CoreError::Format("null string in the class hierarchy header".into()))
}
