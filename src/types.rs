//! Shared data model: item kinds, type shapes and decoded symbols.

use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::fmt;

/// DO NOT add doc comments to individual variants - this causes schemars to generate
/// `oneOf` schemas instead of simple `enum` arrays, breaking MCP client enum handling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Function,
    Struct,
    Enum,
    Interface,
    Module,
    Macro,
    Const,
    Static,
}

impl ItemKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Function,
        Self::Struct,
        Self::Enum,
        Self::Interface,
        Self::Module,
        Self::Macro,
        Self::Const,
        Self::Static,
    ];

    /// Decode a wire kind code. Codes follow rustdoc's item-type numbering.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Module),
            3 => Some(Self::Struct),
            4 => Some(Self::Enum),
            5 => Some(Self::Function),
            7 => Some(Self::Static),
            8 => Some(Self::Interface),
            14 => Some(Self::Macro),
            17 => Some(Self::Const),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Module => 0,
            Self::Struct => 3,
            Self::Enum => 4,
            Self::Function => 5,
            Self::Static => 7,
            Self::Interface => 8,
            Self::Macro => 14,
            Self::Const => 17,
        }
    }

    /// Parse a query filter such as `fn` or `trait`.
    pub fn from_filter(filter: &str) -> Option<Self> {
        match filter {
            "fn" | "function" | "method" => Some(Self::Function),
            "struct" => Some(Self::Struct),
            "enum" => Some(Self::Enum),
            "trait" | "interface" => Some(Self::Interface),
            "mod" | "module" => Some(Self::Module),
            "macro" => Some(Self::Macro),
            "const" | "constant" => Some(Self::Const),
            "static" => Some(Self::Static),
            _ => None,
        }
    }

    /// Short display name, matching rustdoc's filter names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "fn",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Interface => "trait",
            Self::Module => "mod",
            Self::Macro => "macro",
            Self::Const => "const",
            Self::Static => "static",
        }
    }

    /// Whether the item can be called, which ranks it above data and containers.
    pub const fn is_callable(self) -> bool {
        match self {
            Self::Function | Self::Macro => true,
            Self::Struct
            | Self::Enum
            | Self::Interface
            | Self::Module
            | Self::Const
            | Self::Static => false,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural type descriptor: base name plus generic arguments.
///
/// Only the last path segment is kept, so `std::vec::Vec<T>` and `Vec<T>` have the
/// same shape. Generic names (`T`, `U2`, `_`) are placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeShape {
    pub name: String,
    pub args: Vec<TypeShape>,
}

impl TypeShape {
    /// Name of the slice shape `[T]`.
    pub const SLICE: &'static str = "[]";
    /// Name of the unit shape `()`.
    pub const UNIT: &'static str = "()";

    pub fn new(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Whether this shape is a generic placeholder that matches any type.
    pub fn is_placeholder(&self) -> bool {
        self.args.is_empty() && is_placeholder_name(&self.name)
    }

    /// Lowercased base name, used as the type-bucket key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// `_`, or one ASCII uppercase letter optionally followed by digits.
pub fn is_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some('_') => name.len() == 1,
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == Self::SLICE {
            f.write_str("[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            return f.write_str("]");
        }
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Function signature as ordered parameter shapes plus an optional return shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<TypeShape>,
    pub ret: Option<TypeShape>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        if let Some(ret) = &self.ret {
            write!(f, " -> {}", ret)?;
        }
        Ok(())
    }
}

/// A decoded, searchable documentation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    /// Record position within its shard; unique per `(package, shard_index)`.
    pub id: u32,
    pub package: String,
    pub shard_index: u32,
    /// Segments of the enclosing container, starting with the crate.
    pub path: Vec<String>,
    pub name: String,
    pub kind: ItemKind,
    pub signature: Option<Signature>,
    pub doc_summary: String,
    /// Enclosing symbol in the same shard, e.g. the trait of a method.
    pub parent_id: Option<u32>,
}

impl SymbolEntry {
    /// `path::name`, the canonical display path.
    pub fn full_path(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.path.join("::"), self.name)
        }
    }

    pub fn key(&self) -> SymbolKey {
        SymbolKey {
            package: self.package.clone(),
            shard_index: self.shard_index,
            id: self.id,
        }
    }
}

/// Globally unique symbol identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    pub package: String,
    pub shard_index: u32,
    pub id: u32,
}

/// A ranked match as returned to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub path: String,
    pub kind: ItemKind,
    pub doc_summary: String,
    pub score: f64,
    pub package: String,
}
