//! Module import: search-path resolution and extension holders.
//!
//! `import NAME` walks the instance's search path, directory by directory.
//! Within one directory a script package (`.csp`) wins over a pre-compiled
//! extension (`.cse`); across directories, earlier entries win. A resolved
//! `.csp` is compiled and interpreted as a child instance whose declared
//! package name must match the requested module name; the child lands on
//! the importer's `refers` list so the exported scope stays valid.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::process;
use crate::storage::DomainRef;
use crate::ast::Value;

/// A first-class module value: either the global scope exported by a script
/// package, or a handle to a pre-compiled extension file. The binary format
/// of `.cse` files is opaque here; their symbol tables come from the
/// out-of-tree native loader.
#[derive(Debug, Clone)]
pub enum Extension {
    Package { name: String, global: DomainRef },
    Native { path: PathBuf },
}

impl Extension {
    /// Look up an exported member.
    pub fn member(&self, field: &str) -> Result<Value> {
        match self {
            Extension::Package { name, global } => global
                .borrow()
                .get(field)
                .cloned()
                .ok_or_else(|| {
                    Error::runtime(format!("package '{name}' has no member '{field}'"))
                }),
            Extension::Native { path } => Err(Error::runtime(format!(
                "extension '{}' requires the native extension loader",
                path.display()
            ))),
        }
    }
}

impl PartialEq for Extension {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Extension::Package { global: a, .. },
                Extension::Package { global: b, .. },
            ) => std::rc::Rc::ptr_eq(a, b),
            (Extension::Native { path: a }, Extension::Native { path: b }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extension::Package { name, .. } => write!(f, "[package: {name}]"),
            Extension::Native { path } => write!(f, "[extension: {}]", path.display()),
        }
    }
}

/// A resolved import candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Script(PathBuf),
    Binary(PathBuf),
}

impl Candidate {
    pub fn path(&self) -> &Path {
        match self {
            Candidate::Script(p) | Candidate::Binary(p) => p,
        }
    }
}

/// Split a search-path string at the platform delimiter, preserving empty
/// entries.
pub fn split_search_path(path: &str) -> Vec<String> {
    path.split(process::PATH_DELIMITER)
        .map(str::to_string)
        .collect()
}

/// Walk the search path for a module, probing `<dir>/<name>.csp` then
/// `<dir>/<name>.cse` in each directory.
pub fn resolve(import_path: &str, name: &str) -> Option<Candidate> {
    for dir in split_search_path(import_path) {
        let base = Path::new(&dir).join(name);
        let script = base.with_extension("csp");
        // File::open doubles as the readability probe.
        if File::open(&script).is_ok() {
            return Some(Candidate::Script(script));
        }
        let binary = base.with_extension("cse");
        if File::open(&binary).is_ok() {
            return Some(Candidate::Binary(binary));
        }
    }
    None
}

/// Resolve and load a module on behalf of an importing instance.
pub fn import(inst: &mut Instance, name: &str) -> Result<Extension> {
    let candidate = resolve(inst.import_path(), name)
        .ok_or_else(|| Error::fatal("No such file or directory."))?;
    match candidate {
        Candidate::Script(path) => import_script(inst, name, &path),
        Candidate::Binary(path) => Ok(Extension::Native { path }),
    }
}

fn import_script(inst: &mut Instance, name: &str, path: &Path) -> Result<Extension> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !inst.begin_loading(&canonical) {
        return Err(Error::runtime("Cyclic import."));
    }
    let mut child = inst.child();
    let loaded = child
        .compile(&path.to_string_lossy())
        .and_then(|_| child.interpret());
    inst.finish_loading(&canonical);
    loaded?;

    let package_name = child.context.package_name();
    if package_name.is_empty() {
        return Err(Error::runtime("Target file is not a package."));
    }
    if package_name != name {
        return Err(Error::runtime(
            "Package name is different from file name.",
        ));
    }
    let extension = Extension::Package {
        name: name.to_string(),
        global: child.storage.get_global(),
    };
    tracing::debug!(module = name, path = %path.display(), "loaded package");
    inst.add_refer(child);
    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_preserves_empty_entries() {
        let delim = process::PATH_DELIMITER;
        let parts = split_search_path(&format!("a{delim}{delim}b"));
        assert_eq!(parts, ["a", "", "b"]);
    }

    #[test]
    fn split_single_entry() {
        assert_eq!(split_search_path("."), ["."]);
    }
}
