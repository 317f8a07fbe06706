//! Declaration records produced by a Scanner, and the [`Scanner`] trait
//! itself.
//!
//! A Scanner is the external collaborator that turns Go source into
//! [`PackageInfo`] records: top-level functions, type declarations,
//! constants, and package-level variables, with every type expression
//! pre-resolved into a [`FieldType`]. The engine consumes these records and
//! never reads Go text.

use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::ast::{Block, Expr, Pos};

/// A syntactic type as written in a signature or declaration.
///
/// Named types are fully qualified by the scanner: `pkg_path` is the import
/// path of the declaring package, or empty for universe types (`int`,
/// `string`, `error`, ...). Import aliases never survive into records.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FieldType {
    Named { pkg_path: String, name: String },
    Pointer(Box<FieldType>),
    Slice(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    Chan(Box<FieldType>),
    Func {
        params: Vec<FieldType>,
        results: Vec<FieldType>,
    },
}

impl FieldType {
    /// A universe (builtin) type such as `int` or `string`.
    pub fn basic(name: impl Into<String>) -> Self {
        Self::Named {
            pkg_path: String::new(),
            name: name.into(),
        }
    }

    pub fn named(pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named {
            pkg_path: pkg_path.into(),
            name: name.into(),
        }
    }

    pub fn pointer(elem: Self) -> Self {
        Self::Pointer(Box::new(elem))
    }

    pub fn slice(elem: Self) -> Self {
        Self::Slice(Box::new(elem))
    }

    pub fn map(key: Self, value: Self) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn chan(elem: Self) -> Self {
        Self::Chan(Box::new(elem))
    }

    /// The named type at the base of any pointer wrapping, if there is one.
    pub fn base_named(&self) -> Option<(&str, &str)> {
        match self {
            Self::Named { pkg_path, name } => Some((pkg_path, name)),
            Self::Pointer(elem) => elem.base_named(),
            _ => None,
        }
    }

    /// Whether the outermost constructor is a pointer.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { pkg_path, name } if pkg_path.is_empty() => write!(f, "{name}"),
            Self::Named { pkg_path, name } => {
                // Display with the final path segment, the way Go renders
                // qualified names in diagnostics.
                let short = pkg_path.rsplit('/').next().unwrap_or(pkg_path);
                write!(f, "{short}.{name}")
            }
            Self::Pointer(elem) => write!(f, "*{elem}"),
            Self::Slice(elem) => write!(f, "[]{elem}"),
            Self::Map(k, v) => write!(f, "map[{k}]{v}"),
            Self::Chan(elem) => write!(f, "chan {elem}"),
            Self::Func { params, results } => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")?;
                match results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", results[0]),
                    _ => {
                        write!(f, " (")?;
                        for (i, r) in results.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{r}")?;
                        }
                        write!(f, ")")
                    }
                }
            }
        }
    }
}

/// The kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeKind {
    /// A universe type (`int`, `string`, `bool`, ...).
    Basic,
    Struct,
    Interface,
    /// A named type whose underlying type is not a struct or interface
    /// (`type Miles int`, `type Handler func()`).
    Named,
}

/// A struct field or a method receiver.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub ty: FieldType,
    /// Embedded (anonymous) field. For embedded fields `name` is the type's
    /// base name, as in `go/types`.
    pub embedded: bool,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: false,
        }
    }

    pub fn embedded(ty: FieldType) -> Self {
        let name = ty.base_named().map(|(_, n)| n.to_string()).unwrap_or_default();
        Self { name, ty, embedded: true }
    }
}

/// A named parameter or result slot. Unnamed results use an empty name.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub ty: FieldType,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty }
    }

    pub fn unnamed(ty: FieldType) -> Self {
        Self {
            name: String::new(),
            ty,
        }
    }
}

/// One method of an interface declaration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    pub variadic: bool,
}

impl MethodInfo {
    /// A method record with an unknown signature, used for synthetic
    /// interface methods invented at selector sites.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            results: Vec::new(),
            variadic: false,
        }
    }
}

/// A declared type.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypeInfo {
    /// Import path of the declaring package; empty for universe types.
    pub pkg_path: String,
    /// Package name used in qualified display names (`main.Dog`).
    pub pkg_name: String,
    pub name: String,
    pub kind: TypeKind,
    /// Struct fields, in declaration order (embedded fields included).
    pub fields: Vec<FieldInfo>,
    /// Interface methods declared directly on this interface.
    pub methods: Vec<Rc<MethodInfo>>,
    /// Interfaces embedded in this interface.
    pub embeds: Vec<FieldType>,
    /// Union terms of a constraint interface (`Dog | Cat`), in source order.
    pub union_terms: Vec<FieldType>,
    /// Underlying type of a `Named` kind.
    pub underlying: Option<FieldType>,
}

impl TypeInfo {
    pub fn basic(name: impl Into<String>) -> Self {
        Self {
            pkg_path: String::new(),
            pkg_name: String::new(),
            name: name.into(),
            kind: TypeKind::Basic,
            fields: Vec::new(),
            methods: Vec::new(),
            embeds: Vec::new(),
            union_terms: Vec::new(),
            underlying: None,
        }
    }

    /// `pkg.Name` for declared types, bare name for universe types.
    pub fn qualified_name(&self) -> String {
        if self.pkg_name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.pkg_name, self.name)
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Whether this is a constraint-union interface.
    pub fn is_union(&self) -> bool {
        !self.union_terms.is_empty()
    }
}

/// The value of a declared constant, as far as the scanner could fold it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ConstValue {
    Int(i64),
    Str(String),
    Bool(bool),
    /// A kind the engine does not materialize (iota arithmetic on custom
    /// types, floats, complex).
    Opaque,
}

/// A package-level constant.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConstantInfo {
    pub name: String,
    pub ty: Option<FieldType>,
    pub value: ConstValue,
}

/// A package-level variable. The initializer is evaluated lazily on first
/// read.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VarInfo {
    pub name: String,
    pub ty: Option<FieldType>,
    pub init: Option<Expr>,
}

/// A top-level function or method declaration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// Method receiver, when this is a method.
    pub receiver: Option<FieldInfo>,
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    pub variadic: bool,
    /// `None` for bodyless declarations (assembly stubs, interface records
    /// synthesized by the accessor).
    pub body: Option<Rc<Block>>,
    pub pos: Pos,
}

impl FunctionInfo {
    /// The receiver's base type name with any leading `*` stripped.
    pub fn receiver_base_name(&self) -> Option<&str> {
        self.receiver
            .as_ref()
            .and_then(|r| r.ty.base_named())
            .map(|(_, name)| name)
    }
}

/// Everything the scanner extracted from one package.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PackageInfo {
    /// Import path (`example.com/mod/pkg`).
    pub path: String,
    /// Package name (`pkg`, `main`).
    pub name: String,
    /// Import table: short name to import path, merged across files.
    pub imports: IndexMap<String, String>,
    pub functions: Vec<Rc<FunctionInfo>>,
    pub types: Vec<Rc<TypeInfo>>,
    pub constants: Vec<ConstantInfo>,
    pub vars: Vec<VarInfo>,
}

impl PackageInfo {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            imports: IndexMap::new(),
            functions: Vec::new(),
            types: Vec::new(),
            constants: Vec::new(),
            vars: Vec::new(),
        }
    }

    /// Finds a top-level function (not a method) by name.
    pub fn function(&self, name: &str) -> Option<&Rc<FunctionInfo>> {
        self.functions
            .iter()
            .find(|f| f.receiver.is_none() && f.name == name)
    }

    /// Finds a method by receiver base type name and method name.
    pub fn method(&self, recv_base: &str, name: &str) -> Option<&Rc<FunctionInfo>> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.receiver_base_name() == Some(recv_base))
    }

    pub fn type_named(&self, name: &str) -> Option<&Rc<TypeInfo>> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantInfo> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn var(&self, name: &str) -> Option<&VarInfo> {
        self.vars.iter().find(|v| v.name == name)
    }
}

/// Error returned by [`Scanner::scan_package`].
#[derive(Debug, Clone)]
pub struct ScanError {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot scan package {}: {}", self.path, self.reason)
    }
}

impl std::error::Error for ScanError {}

/// The external collaborator that provides parsed packages on demand.
///
/// Implementations may cache internally; the engine additionally keeps one
/// package *object* per import path, so `scan_package` is called at most a
/// handful of times per path. Scanning deliberately ignores the engine's
/// scan policy: signatures of out-of-policy packages must stay queryable.
pub trait Scanner {
    fn scan_package(&self, import_path: &str) -> Result<Rc<PackageInfo>, ScanError>;

    /// The module path of the main module under analysis, used by the
    /// default scan policy.
    fn module_path(&self) -> &str;
}
