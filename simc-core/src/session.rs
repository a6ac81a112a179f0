//! State shared by the phases of one compilation session.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::attribute_file::{AttributeContext, LoadedModule, read_attribute_file, write_attribute_file};
use crate::checker::Checker;
use crate::decl::BlockDeclaration;
use crate::diagnostic::Diagnostics;
use crate::error::{CoreError, Result};
use crate::hierarchy::{ClassHierarchy, ClassIdentity};
use crate::kind::Kind;
use crate::library::{AttributeLibrary, Packager, attribute_entry, code_unit_entry};
use crate::loader::{ClassLoader, PendingClass, load_incrementally};
use crate::options::CompilerOptions;
use crate::tree::{NodeData, NodeId, SyntaxTree};

#[derive(Debug)]
pub struct CompilationSession {
    options: CompilerOptions,
    hierarchy: ClassHierarchy,
    diagnostics: Diagnostics,
    /// Attribute files already read into the session's tree.
    loaded: BTreeMap<String, LoadedModule>,
}

impl CompilationSession {
    pub fn new(options: CompilerOptions) -> Self {
        CompilationSession {
            options,
            hierarchy: ClassHierarchy::new(),
            diagnostics: Diagnostics::new(),
            loaded: BTreeMap::new(),
        }
    }

    pub fn reset(&mut self) {
        self.hierarchy.clear();
        self.diagnostics.clear();
        self.loaded.clear();
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn hierarchy_mut(&mut self) -> &mut ClassHierarchy {
        &mut self.hierarchy
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// An empty tree following the session's case rule.
    pub fn new_tree(&self) -> SyntaxTree {
        SyntaxTree::with_case_sensitivity(self.options.case_sensitive)
    }

    /// Runs the semantic checker over `module`.
    pub fn check(&mut self, tree: &mut SyntaxTree, module: NodeId) -> Result<()> {
        Checker::new(tree, &mut self.diagnostics).check(module)?;
        let errors = self.diagnostics.error_count();
        if errors > 0 {
            return Err(CoreError::Aborted { phase: "check", errors });
        }
        Ok(())
    }

    pub fn class_identity(&self, tree: &SyntaxTree, id: NodeId) -> ClassIdentity {
        ClassIdentity::new(self.options.package.clone(), tree.identifier(id).unwrap_or_default())
    }

    /// Records the super-class of every class in `module`, and of the module
    /// itself when it is a procedure.
    pub fn register_module_classes(&mut self, tree: &SyntaxTree, module: NodeId) {
        let mut seen = HashSet::new();
        let mut stack = vec![module];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            match tree.kind(id) {
                Kind::Class => {
                    let sup = match tree.prefix_class(id) {
                        Some(prefix) => self.class_identity(tree, prefix),
                        None => ClassIdentity::rts_class(),
                    };
                    self.hierarchy.register_edge(self.class_identity(tree, id), sup);
                }
                Kind::Procedure if id == module => {
                    self.hierarchy
                        .register_edge(self.class_identity(tree, id), ClassIdentity::rts_procedure());
                }
                _ => {}
            }
            stack.extend(tree.data(id).children());
        }
    }

    /// Writes the attribute file of `module` and stages it; returns the
    /// entry name. Every file is numbered from the configured sequence base.
    pub fn emit_attribute_file(
        &mut self,
        tree: &SyntaxTree,
        module: NodeId,
        externals: &[NodeId],
        packager: &mut impl Packager,
    ) -> Result<String> {
        self.register_module_classes(tree, module);
        let (bytes, _) = write_attribute_file(tree, module, externals, &self.hierarchy, self.options.sequence_base)?;
        let identifier = tree.identifier(module).unwrap_or_default();
        let entry = attribute_entry(&self.options.package, identifier);
        packager.stage(&entry, Some(bytes))?;
        info!("emitted {entry}");
        Ok(entry)
    }

    pub fn stage_code_unit(
        &mut self,
        identity: &ClassIdentity,
        bytes: Vec<u8>,
        packager: &mut impl Packager,
    ) -> Result<String> {
        let entry = code_unit_entry(&identity.package, &identity.name);
        packager.stage(&entry, Some(bytes))?;
        Ok(entry)
    }

    /// Reads the attribute file `entry` and the externals it names.
    ///
    /// Each entry is read at most once per session; a file that names
    /// itself through its externals is malformed.
    pub fn load_attribute_file(
        &mut self,
        tree: &mut SyntaxTree,
        entry: &str,
        library: &impl AttributeLibrary,
    ) -> Result<LoadedModule> {
        let mut context = SessionContext {
            hierarchy: &mut self.hierarchy,
            library,
            loaded: &mut self.loaded,
            in_progress: Vec::new(),
        };
        context.load(tree, entry)
    }

    /// Declares a loaded module and its externals in a fresh block so the
    /// module can be checked again.
    pub fn enclose(&mut self, tree: &mut SyntaxTree, loaded: &LoadedModule) -> NodeId {
        let block = tree.add(0, NodeData::Block(BlockDeclaration::new("library")));
        for id in loaded.externals.iter().chain([&loaded.module]) {
            tree.declare(block, *id, &mut self.diagnostics);
        }
        block
    }

    /// Loads generated classes in hierarchy order. Interfaces among them
    /// are recorded first; they never wait for a super.
    pub fn load_classes(
        &mut self,
        pending: Vec<PendingClass>,
        loader: &mut impl ClassLoader,
    ) -> Result<Vec<ClassIdentity>> {
        for class in pending.iter().filter(|p| p.interface) {
            self.hierarchy.register_interface(class.identity.clone());
        }
        load_incrementally(&self.hierarchy, pending, loader, self.options.max_load_passes)
    }
}

struct SessionContext<'s, L> {
    hierarchy: &'s mut ClassHierarchy,
    library: &'s L,
    loaded: &'s mut BTreeMap<String, LoadedModule>,
    in_progress: Vec<String>,
}

impl<L: AttributeLibrary> SessionContext<'_, L> {
    fn load(&mut self, tree: &mut SyntaxTree, entry: &str) -> Result<LoadedModule> {
        if let Some(loaded) = self.loaded.get(entry) {
            debug!("{entry} already loaded");
            return Ok(loaded.clone());
        }
        if self.in_progress.iter().any(|e| e == entry) {
            return Err(CoreError::Format(format!(
                "{entry} refers to itself through its external declarations"
            )));
        }
        let bytes = self.library.open(entry)?;
        self.in_progress.push(entry.to_string());
        let loaded = read_attribute_file(tree, &bytes, self)?;
        self.in_progress.pop();
        debug!("loaded {entry}");
        self.loaded.insert(entry.to_string(), loaded.clone());
        Ok(loaded)
    }
}

impl<L: AttributeLibrary> AttributeContext for SessionContext<'_, L> {
    fn register_edge(&mut self, sub: ClassIdentity, sup: ClassIdentity) {
        self.hierarchy.register_edge(sub, sup);
    }

    fn load_external(&mut self, tree: &mut SyntaxTree, external: NodeId) -> Result<NodeId> {
        let NodeData::External(e) = tree.data(external) else {
            return Err(CoreError::internal(format!("{external} is not an external declaration")));
        };
        let entry = e.attribute_file.clone();
        let module_kind = e.module_kind;
        let loaded = self.load(tree, &entry)?;
        let found = tree.kind(loaded.module);
        if found != module_kind {
            return Err(CoreError::Format(format!("{entry} holds a {found}, expected a {module_kind}")));
        }
        Ok(loaded.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{ClassDeclaration, ExternalDeclaration, SimpleVariableDeclaration};
    use crate::diagnostic::codes;
    use crate::library::MemoryPackage;
    use crate::loader::LoadFailure;
    use crate::meaning::{ScopeClasses, resolve};
    use crate::types::{Type, is_sub_reference_of};

    fn program(session: &CompilationSession) -> (SyntaxTree, NodeId) {
        let mut tree = session.new_tree();
        let main = tree.add(1, NodeData::Block(BlockDeclaration::new("main")));
        (tree, main)
    }

    fn class(tree: &mut SyntaxTree, scope: NodeId, name: &str, prefix: Option<&str>) -> NodeId {
        let mut decl = ClassDeclaration::new(name);
        decl.prefix = prefix.map(str::to_string);
        let id = tree.add(2, NodeData::Class(decl));
        tree.declare(scope, id, &mut Diagnostics::new());
        id
    }

    fn external(tree: &mut SyntaxTree, scope: NodeId, name: &str, entry: &str) -> NodeId {
        let id = tree.add(1, NodeData::External(ExternalDeclaration::new(name, Kind::Class, entry)));
        tree.declare(scope, id, &mut Diagnostics::new());
        id
    }

    #[test]
    fn emitted_files_load_in_a_later_session() {
        let mut package = MemoryPackage::new();
        let mut first = CompilationSession::new(CompilerOptions::default());
        let (mut tree, main) = program(&first);
        let vehicle = class(&mut tree, main, "Vehicle", None);
        let wheels = tree.add(3, NodeData::SimpleVariable(SimpleVariableDeclaration::new("wheels", Type::Integer)));
        tree.declare(vehicle, wheels, &mut Diagnostics::new());
        first.check(&mut tree, main).unwrap();

        let entry = first.emit_attribute_file(&tree, vehicle, &[], &mut package).unwrap();
        assert_eq!(entry, "simula/user/VEHICLE.atr");

        let (mut tree, main) = program(&first);
        let ext = external(&mut tree, main, "Vehicle", &entry);
        let car = class(&mut tree, main, "Car", Some("Vehicle"));
        let car_entry = first.emit_attribute_file(&tree, car, &[ext], &mut package).unwrap();

        let mut second = CompilationSession::new(CompilerOptions::default());
        let mut copy = second.new_tree();
        let loaded = second.load_attribute_file(&mut copy, &car_entry, &package).unwrap();
        assert_eq!(loaded.externals.len(), 1);
        assert_eq!(
            second.hierarchy().get_super(&ClassIdentity::new("simula/user", "VEHICLE")),
            Some(&ClassIdentity::rts_class())
        );

        let block = second.enclose(&mut copy, &loaded);
        second.check(&mut copy, block).unwrap();
        let vehicle = resolve(&copy, block, "vehicle").declaration.unwrap();
        assert_eq!(copy.prefix_class(loaded.module), Some(vehicle));
        assert_eq!(copy.kind(vehicle), Kind::Class);
    }

    #[test]
    fn checked_prefix_links_the_external_module_after_reloading() {
        let mut package = MemoryPackage::new();
        let mut session = CompilationSession::new(CompilerOptions::default());
        let (mut tree, main) = program(&session);
        let vehicle = class(&mut tree, main, "Vehicle", None);
        session.check(&mut tree, main).unwrap();
        let vehicle_entry = session.emit_attribute_file(&tree, vehicle, &[], &mut package).unwrap();

        // Car is checked against the loaded Vehicle before it is emitted.
        let (mut tree, main) = program(&session);
        let loaded = session.load_attribute_file(&mut tree, &vehicle_entry, &package).unwrap();
        let ext = external(&mut tree, main, "Vehicle", &vehicle_entry);
        if let NodeData::External(e) = tree.data_mut(ext) {
            e.module = Some(loaded.module);
        }
        let car = class(&mut tree, main, "Car", Some("Vehicle"));
        session.check(&mut tree, main).unwrap();
        assert_eq!(tree.prefix_class(car), Some(loaded.module));
        let car_entry = session.emit_attribute_file(&tree, car, &[ext], &mut package).unwrap();

        let mut second = CompilationSession::new(CompilerOptions::default());
        let mut copy = second.new_tree();
        let loaded = second.load_attribute_file(&mut copy, &car_entry, &package).unwrap();
        let block = second.enclose(&mut copy, &loaded);
        second.check(&mut copy, block).unwrap();

        let vehicle = resolve(&copy, block, "VEHICLE").declaration.unwrap();
        assert_eq!(copy.prefix_class(loaded.module), Some(vehicle));
        let classes = ScopeClasses::new(&copy, block);
        assert!(is_sub_reference_of(&classes, &Type::reference("Car"), &Type::reference("Vehicle")));
    }

    #[test]
    fn every_file_is_numbered_from_the_sequence_base() {
        let options = CompilerOptions {
            sequence_base: 32_000,
            ..CompilerOptions::default()
        };
        let mut package = MemoryPackage::new();
        let mut session = CompilationSession::new(options);
        let (mut tree, main) = program(&session);
        let big = class(&mut tree, main, "Big", None);
        for i in 0..500 {
            let v = tree.add(3, NodeData::SimpleVariable(SimpleVariableDeclaration::new(format!("v{i}"), Type::Integer)));
            tree.declare(big, v, &mut Diagnostics::new());
        }

        let entry = session.emit_attribute_file(&tree, big, &[], &mut package).unwrap();
        let first = package.get(&entry).unwrap().to_vec();
        session.emit_attribute_file(&tree, big, &[], &mut package).unwrap();
        assert_eq!(package.get(&entry).unwrap(), first.as_slice());
    }

    #[test]
    fn shared_externals_load_once() {
        let mut package = MemoryPackage::new();
        let mut session = CompilationSession::new(CompilerOptions::default());
        let (mut tree, main) = program(&session);
        let shape = class(&mut tree, main, "Shape", None);
        session.emit_attribute_file(&tree, shape, &[], &mut package).unwrap();

        for name in ["Circle", "Square"] {
            let (mut tree, main) = program(&session);
            let ext = external(&mut tree, main, "Shape", "simula/user/SHAPE.atr");
            let c = class(&mut tree, main, name, Some("Shape"));
            session.emit_attribute_file(&tree, c, &[ext], &mut package).unwrap();
        }

        let mut copy = session.new_tree();
        let circle = session
            .load_attribute_file(&mut copy, "simula/user/CIRCLE.atr", &package)
            .unwrap();
        let before = copy.len();
        let square = session
            .load_attribute_file(&mut copy, "simula/user/SQUARE.atr", &package)
            .unwrap();
        let module_of = |tree: &SyntaxTree, ext: NodeId| match tree.data(ext) {
            NodeData::External(e) => e.module,
            _ => None,
        };
        assert_eq!(
            module_of(&copy, circle.externals[0]),
            module_of(&copy, square.externals[0])
        );
        // the square class and its external; the shape file is not read again
        assert_eq!(copy.len() - before, 2);

        let again = session
            .load_attribute_file(&mut copy, "simula/user/CIRCLE.atr", &package)
            .unwrap();
        assert_eq!(again, circle);
    }

    #[test]
    fn self_referencing_externals_are_rejected() {
        let mut package = MemoryPackage::new();
        let mut session = CompilationSession::new(CompilerOptions::default());
        for (name, other) in [("A", "B"), ("B", "A")] {
            let (mut tree, main) = program(&session);
            let ext = external(&mut tree, main, other, &format!("simula/user/{other}.atr"));
            let c = class(&mut tree, main, name, None);
            session.emit_attribute_file(&tree, c, &[ext], &mut package).unwrap();
        }

        let mut copy = session.new_tree();
        let err = session
            .load_attribute_file(&mut copy, "simula/user/A.atr", &package)
            .unwrap_err();
        assert!(matches!(err, CoreError::Format(ref m) if m.contains("A.atr")));
    }

    #[test]
    fn external_of_the_wrong_kind_is_rejected() {
        let mut package = MemoryPackage::new();
        let mut session = CompilationSession::new(CompilerOptions::default());
        let (mut tree, main) = program(&session);
        let shape = class(&mut tree, main, "Shape", None);
        session.emit_attribute_file(&tree, shape, &[], &mut package).unwrap();

        let (mut tree, main) = program(&session);
        let ext = tree.add(
            1,
            NodeData::External(ExternalDeclaration::new("Shape", Kind::Procedure, "simula/user/SHAPE.atr")),
        );
        tree.declare(main, ext, &mut Diagnostics::new());
        let user = class(&mut tree, main, "User", None);
        session.emit_attribute_file(&tree, user, &[ext], &mut package).unwrap();

        let mut copy = session.new_tree();
        let err = session
            .load_attribute_file(&mut copy, "simula/user/USER.atr", &package)
            .unwrap_err();
        assert!(matches!(err, CoreError::Format(_)));
    }

    #[test]
    fn check_aborts_on_errors() {
        let mut session = CompilationSession::new(CompilerOptions::default());
        let (mut tree, main) = program(&session);
        class(&mut tree, main, "Orphan", Some("Missing"));
        let err = session.check(&mut tree, main).unwrap_err();
        assert!(matches!(err, CoreError::Aborted { phase: "check", errors: 1 }));
        assert_eq!(session.diagnostics().count_code(codes::UNDEFINED_IDENTIFIER), 1);

        session.reset();
        assert!(!session.diagnostics().has_errors());
    }

    struct Runtime {
        loaded: Vec<ClassIdentity>,
    }

    impl ClassLoader for Runtime {
        fn is_loaded(&self, identity: &ClassIdentity) -> bool {
            self.loaded.contains(identity)
        }

        fn load(&mut self, qualified_name: &str, _bytes: &[u8]) -> Result<(), LoadFailure> {
            self.loaded.push(ClassIdentity::parse(qualified_name));
            Ok(())
        }
    }

    #[test]
    fn generated_classes_load_in_hierarchy_order() {
        let mut package = MemoryPackage::new();
        let mut session = CompilationSession::new(CompilerOptions::default());
        let (mut tree, main) = program(&session);
        let vehicle = class(&mut tree, main, "Vehicle", None);
        class(&mut tree, main, "Car", Some("Vehicle"));
        session.check(&mut tree, main).unwrap();
        session.register_module_classes(&tree, main);

        let car = ClassIdentity::new("simula/user", "CAR");
        let vehicle_id = session.class_identity(&tree, vehicle);
        let entry = session
            .stage_code_unit(&car, vec![0xca, 0xfe], &mut package)
            .unwrap();
        assert_eq!(entry, "simula/user/CAR.class");

        let pending = vec![
            PendingClass::new(car.clone(), vec![1]),
            PendingClass::new(vehicle_id.clone(), vec![2]),
        ];
        let mut runtime = Runtime { loaded: Vec::new() };
        let order = session.load_classes(pending, &mut runtime).unwrap();
        assert_eq!(order, vec![vehicle_id, car]);
    }

    #[test]
    fn interfaces_load_without_waiting_for_a_super() {
        let mut session = CompilationSession::new(CompilerOptions::default());
        let printable = ClassIdentity::new("simula/user", "PRINTABLE");
        session
            .hierarchy_mut()
            .register_edge(printable.clone(), ClassIdentity::new("simula/user", "NEVER_LOADED"));

        let mut runtime = Runtime { loaded: Vec::new() };
        let order = session
            .load_classes(vec![PendingClass::interface(printable.clone(), vec![3])], &mut runtime)
            .unwrap();
        assert_eq!(order, vec![printable.clone()]);
        assert!(session.hierarchy().is_interface(&printable));
    }
}
