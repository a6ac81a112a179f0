//! Sub-class to super-class links of the classes generated in a session.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const RUNTIME_PACKAGE: &str = "simula/runtime";
/// Synthetic root of every generated class.
pub const RTS_CLASS: &str = "RTS_CLASS";
/// Synthetic root of every generated procedure.
pub const RTS_PROCEDURE: &str = "RTS_PROCEDURE";

/// Package-qualified name of a generated class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassIdentity {
    pub package: String,
    pub name: String,
}

impl ClassIdentity {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        ClassIdentity {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn rts_class() -> Self {
        Self::new(RUNTIME_PACKAGE, RTS_CLASS)
    }

    pub fn rts_procedure() -> Self {
        Self::new(RUNTIME_PACKAGE, RTS_PROCEDURE)
    }

    pub fn is_runtime_root(&self) -> bool {
        self.package == RUNTIME_PACKAGE && (self.name == RTS_CLASS || self.name == RTS_PROCEDURE)
    }

    /// Splits `pkg/sub/Name` at the last slash.
    pub fn parse(qualified: &str) -> Self {
        match qualified.rsplit_once('/') {
            Some((package, name)) => Self::new(package, name),
            None => Self::new("", qualified),
        }
    }

    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.package, self.name)
        }
    }
}

impl fmt::Display for ClassIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHierarchy {
    class_to_super: BTreeMap<ClassIdentity, ClassIdentity>,
    interfaces: BTreeSet<ClassIdentity>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sub -> sup`, replacing any earlier super of `sub`.
    pub fn register_edge(&mut self, sub: ClassIdentity, sup: ClassIdentity) {
        self.class_to_super.insert(sub, sup);
    }

    pub fn register_interface(&mut self, identity: ClassIdentity) {
        self.interfaces.insert(identity);
    }

    pub fn is_interface(&self, identity: &ClassIdentity) -> bool {
        self.interfaces.contains(identity)
    }

    pub fn get_super(&self, sub: &ClassIdentity) -> Option<&ClassIdentity> {
        self.class_to_super.get(sub)
    }

    /// The registered super of `sub`, unless it is one of the synthetic
    /// runtime roots.
    pub fn get_real_super(&self, sub: &ClassIdentity) -> Option<&ClassIdentity> {
        self.get_super(sub).filter(|sup| !sup.is_runtime_root())
    }

    /// Interfaces are always ready; a class is ready once its real super
    /// is loaded.
    pub fn is_ready(&self, identity: &ClassIdentity, is_loaded: impl Fn(&ClassIdentity) -> bool) -> bool {
        if self.is_interface(identity) {
            return true;
        }
        match self.get_real_super(identity) {
            None => true,
            Some(sup) => is_loaded(sup),
        }
    }

    /// Edges in identity order.
    pub fn edges(&self) -> impl Iterator<Item = (&ClassIdentity, &ClassIdentity)> {
        self.class_to_super.iter()
    }

    pub fn len(&self) -> usize {
        self.class_to_super.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_to_super.is_empty()
    }

    pub fn clear(&mut self) {
        self.class_to_super.clear();
        self.interfaces.clear();
    }
}
