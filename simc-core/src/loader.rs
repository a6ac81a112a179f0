//! Incremental loading of generated classes.
//!
//! Classes produced one at a time must reach the class-loading service
//! after their super-class. The worklist is scanned repeatedly; each entry
//! whose real super is already loaded is offered to the loader, and
//! entries the loader rejects for a missing dependency stay queued for the
//! next pass.

use log::debug;

use crate::error::{CoreError, Result};
use crate::hierarchy::{ClassHierarchy, ClassIdentity};

/// Why the class-loading service refused a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// A type the class refers to is not available yet.
    DependencyMissing(String),
    /// Any other refusal; fatal.
    Rejected(String),
}

pub trait ClassLoader {
    fn is_loaded(&self, identity: &ClassIdentity) -> bool;

    fn load(&mut self, qualified_name: &str, bytes: &[u8]) -> Result<(), LoadFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClass {
    pub identity: ClassIdentity,
    pub bytes: Vec<u8>,
    pub interface: bool,
}

impl PendingClass {
    pub fn new(identity: ClassIdentity, bytes: Vec<u8>) -> Self {
        PendingClass {
            identity,
            bytes,
            interface: false,
        }
    }

    pub fn interface(identity: ClassIdentity, bytes: Vec<u8>) -> Self {
        PendingClass {
            identity,
            bytes,
            interface: true,
        }
    }
}

/// Drains `pending` into `loader` in an order compatible with `hierarchy`.
///
/// Returns the identities in load order. Fails with an internal error when
/// entries are still queued after `max_passes` passes.
pub fn load_incrementally(
    hierarchy: &ClassHierarchy,
    pending: Vec<PendingClass>,
    loader: &mut impl ClassLoader,
    max_passes: usize,
) -> Result<Vec<ClassIdentity>> {
    let mut worklist = pending;
    let mut order = Vec::with_capacity(worklist.len());
    let mut pass = 0;

    while !worklist.is_empty() {
        if pass == max_passes {
            let unresolved: Vec<String> = worklist.iter().map(|p| p.identity.to_string()).collect();
            return Err(CoreError::internal(format!(
                "class loading gave up after {max_passes} passes; unresolved: {}",
                unresolved.join(", ")
            )));
        }
        pass += 1;

        let mut remaining = Vec::with_capacity(worklist.len());
        for entry in worklist {
            if !hierarchy.is_ready(&entry.identity, |sup| loader.is_loaded(sup)) {
                remaining.push(entry);
                continue;
            }
            match loader.load(&entry.identity.qualified_name(), &entry.bytes) {
                Ok(()) => order.push(entry.identity),
                Err(LoadFailure::DependencyMissing(missing)) => {
                    debug!("{} waits for {missing}", entry.identity);
                    remaining.push(entry);
                }
                Err(LoadFailure::Rejected(message)) => {
                    return Err(CoreError::ClassLoad {
                        class: entry.identity.to_string(),
                        message,
                    });
                }
            }
        }
        debug!("class loading pass {pass}: {} loaded, {} queued", order.len(), remaining.len());
        worklist = remaining;
    }
    Ok(order)
}
