//! Where attribute files and generated code units go, and where
//! precompiled attribute files come from.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

pub const ATTRIBUTE_EXTENSION: &str = "atr";
pub const CODE_UNIT_EXTENSION: &str = "class";

/// Packaging service: receives every generated entry.
///
/// `bytes == None` stages a directory entry.
pub trait Packager {
    fn stage(&mut self, entry: &str, bytes: Option<Vec<u8>>) -> Result<()>;
}

/// Source of precompiled attribute files, keyed by entry name.
pub trait AttributeLibrary {
    fn open(&self, entry: &str) -> Result<Vec<u8>>;
}

/// Entry name of the attribute file of `identifier` in `package`.
pub fn attribute_entry(package: &str, identifier: &str) -> String {
    format!("{package}/{identifier}.{ATTRIBUTE_EXTENSION}")
}

pub fn code_unit_entry(package: &str, name: &str) -> String {
    format!("{package}/{name}.{CODE_UNIT_EXTENSION}")
}

/// In-memory package; also serves what it staged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryPackage {
    entries: BTreeMap<String, Option<Vec<u8>>>,
}

impl MemoryPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entry: &str) -> Option<&[u8]> {
        self.entries.get(entry).and_then(|b| b.as_deref())
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Packager for MemoryPackage {
    fn stage(&mut self, entry: &str, bytes: Option<Vec<u8>>) -> Result<()> {
        self.entries.insert(entry.to_string(), bytes);
        Ok(())
    }
}

impl AttributeLibrary for MemoryPackage {
    fn open(&self, entry: &str) -> Result<Vec<u8>> {
        self.get(entry)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| CoreError::MissingAttributeFile(entry.to_string()))
    }
}

/// A directory tree of attribute files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDirectory {
    root: PathBuf,
}

impl AttributeDirectory {
    /// Opens an existing library directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CoreError::MissingLibrary(root.to_path_buf()));
        }
        Ok(AttributeDirectory {
            root: root.to_path_buf(),
        })
    }

    /// Uses `root` for output, creating it when needed.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry names of every attribute file below the root, sorted.
    pub fn attribute_entries(&self) -> Vec<String> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ATTRIBUTE_EXTENSION) {
                let relative = path.strip_prefix(&self.root).unwrap_or(path);
                entries.push(entry_name(relative));
            }
        }
        entries.sort();
        entries
    }

    fn path_of(&self, entry: &str) -> PathBuf {
        entry.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }
}

/// `/`-separated entry name of a relative path.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl Packager for AttributeDirectory {
    fn stage(&mut self, entry: &str, bytes: Option<Vec<u8>>) -> Result<()> {
        let path = self.path_of(entry);
        match bytes {
            None => fs::create_dir_all(&path)?,
            Some(bytes) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, bytes)?;
            }
        }
        debug!("staged {}", path.display());
        Ok(())
    }
}

impl AttributeLibrary for AttributeDirectory {
    fn open(&self, entry: &str) -> Result<Vec<u8>> {
        let path = self.path_of(entry);
        if path.is_file() {
            return Ok(fs::read(path)?);
        }
        // Entries may be named without their package.
        let suffix = format!("/{entry}");
        let found = self
            .attribute_entries()
            .into_iter()
            .find(|e| e.ends_with(&suffix));
        match found {
            Some(e) => Ok(fs::read(self.path_of(&e))?),
            None => Err(CoreError::MissingAttributeFile(entry.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_package_serves_what_it_staged() {
        let mut package = MemoryPackage::new();
        package.stage("simula/user", None).unwrap();
        package
            .stage(&attribute_entry("simula/user", "SHAPE"), Some(vec![1, 2, 3]))
            .unwrap();

        assert_eq!(package.len(), 2);
        assert_eq!(package.open("simula/user/SHAPE.atr").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            package.open("simula/user"),
            Err(CoreError::MissingAttributeFile(_))
        ));
        assert!(matches!(
            package.open("simula/user/NONE.atr"),
            Err(CoreError::MissingAttributeFile(_))
        ));
    }

    #[test]
    fn directory_writes_and_indexes_attribute_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = AttributeDirectory::create(dir.path().join("lib")).unwrap();
        library
            .stage(&attribute_entry("simula/user", "SHAPE"), Some(vec![7]))
            .unwrap();
        library
            .stage(&code_unit_entry("simula/user", "SHAPE"), Some(vec![0xca, 0xfe]))
            .unwrap();
        library.stage("simula/empty", None).unwrap();

        assert!(dir.path().join("lib/simula/user/SHAPE.atr").is_file());
        assert!(dir.path().join("lib/simula/empty").is_dir());
        assert_eq!(library.attribute_entries(), vec!["simula/user/SHAPE.atr".to_string()]);
        assert_eq!(library.open("simula/user/SHAPE.atr").unwrap(), vec![7]);
        assert_eq!(library.open("SHAPE.atr").unwrap(), vec![7]);
        assert!(matches!(
            library.open("CIRCLE.atr"),
            Err(CoreError::MissingAttributeFile(_))
        ));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere");
        let err = AttributeDirectory::open(&missing).unwrap_err();
        assert!(matches!(err, CoreError::MissingLibrary(ref p) if *p == missing));
    }
}
