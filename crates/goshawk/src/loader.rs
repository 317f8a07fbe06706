//! On-demand package objects and their cache.
//!
//! One [`PackageObj`] exists per import path for the lifetime of an engine.
//! Loading the underlying [`PackageInfo`] deliberately bypasses the scan
//! policy: signatures of out-of-policy packages must stay queryable even
//! when their bodies are never descended into.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use ahash::AHashMap;
use tracing::debug;

use crate::{
    error::EvalError,
    scan::{PackageInfo, Scanner},
    scope::{Scope, ScopeRef},
};

/// A reference to a scanned (or shell) package.
///
/// A *shell* package is one whose source could not be scanned; selectors on
/// it resolve to unresolved-symbol placeholders so analysis can continue.
pub struct PackageObj {
    /// Import path.
    pub path: String,
    /// Package-level bindings; a child of the universe scope.
    pub scope: ScopeRef,
    /// Scan record, absent for shell packages.
    pub info: RefCell<Option<Rc<PackageInfo>>>,
    /// Whether top-level declarations have been bound into `scope` yet.
    /// Population is deferred to the first selector or identifier miss.
    pub populated: Cell<bool>,
}

impl PackageObj {
    /// Package name for qualified display names: the scanned name when
    /// known, otherwise the final import path segment.
    pub fn name(&self) -> String {
        if let Some(info) = self.info.borrow().as_ref() {
            return info.name.clone();
        }
        self.path.rsplit('/').next().unwrap_or(&self.path).to_string()
    }

    pub fn info(&self) -> Option<Rc<PackageInfo>> {
        self.info.borrow().clone()
    }
}

// The scope reaches back to this package's own function objects; keep Debug
// shallow.
impl fmt::Debug for PackageObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageObj")
            .field("path", &self.path)
            .field("scanned", &self.info.borrow().is_some())
            .field("populated", &self.populated.get())
            .finish()
    }
}

/// Cache of package objects, one per import path.
pub struct PackageStore<S: Scanner> {
    scanner: Rc<S>,
    universe: ScopeRef,
    cache: RefCell<AHashMap<String, Rc<PackageObj>>>,
}

impl<S: Scanner> PackageStore<S> {
    pub fn new(scanner: Rc<S>, universe: ScopeRef) -> Self {
        Self {
            scanner,
            universe,
            cache: RefCell::new(AHashMap::new()),
        }
    }

    /// The package object for `path`, if one was already created.
    pub fn cached(&self, path: &str) -> Option<Rc<PackageObj>> {
        self.cache.borrow().get(path).cloned()
    }

    /// Loads the package object for `path`, scanning on first use. Fails
    /// when the scanner cannot provide the package.
    pub fn load(&self, path: &str) -> Result<Rc<PackageObj>, EvalError> {
        if let Some(pkg) = self.cached(path) {
            return Ok(pkg);
        }
        let info = self.scanner.scan_package(path)?;
        Ok(self.insert(path, Some(info)))
    }

    /// Loads the package object for `path`, falling back to a shell object
    /// when scanning fails. Used on the selector path, where a missing
    /// package must degrade to unresolved-symbol placeholders rather than
    /// abort the traversal.
    pub fn load_or_shell(&self, path: &str) -> Rc<PackageObj> {
        if let Some(pkg) = self.cached(path) {
            return pkg;
        }
        match self.scanner.scan_package(path) {
            Ok(info) => self.insert(path, Some(info)),
            Err(err) => {
                debug!(path, %err, "package scan failed, creating shell package");
                self.insert(path, None)
            }
        }
    }

    fn insert(&self, path: &str, info: Option<Rc<PackageInfo>>) -> Rc<PackageObj> {
        debug!(path, scanned = info.is_some(), "package object created");
        let pkg = Rc::new(PackageObj {
            path: path.to_string(),
            scope: Scope::child(&self.universe),
            info: RefCell::new(info),
            populated: Cell::new(false),
        });
        self.cache.borrow_mut().insert(path.to_string(), Rc::clone(&pkg));
        pkg
    }
}

impl<S: Scanner> fmt::Debug for PackageStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageStore")
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}
