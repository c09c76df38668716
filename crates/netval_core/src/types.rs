//! Host type descriptors
//!
//! Types are immutable once built and shared through [`TypePtr`]. Two values
//! have the same type when their descriptors are the same allocation or are
//! structurally equal.

use crate::attr::Attrs;
use crate::error::ValueError;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a type descriptor.
pub type TypePtr = Rc<HostType>;

#[derive(Debug, Clone, PartialEq)]
pub enum HostType {
    Bool,
    Int,
    Count,
    Double,
    /// Absolute time in seconds since the epoch.
    Time,
    /// Duration in seconds.
    Interval,
    String,
    Addr,
    Subnet,
    Port,
    Enum(EnumType),
    Record(RecordType),
    Table(TableType),
    Vector(TypePtr),
}

impl HostType {
    pub fn into_ptr(self) -> TypePtr {
        Rc::new(self)
    }

    /// Table type mapping `key` to `value`.
    pub fn table(key: TypePtr, value: TypePtr) -> Result<TypePtr, ValueError> {
        Ok(HostType::Table(TableType::new(key, Some(value))?).into_ptr())
    }

    /// Set of `key` values (a table with no yield type).
    pub fn set(key: TypePtr) -> Result<TypePtr, ValueError> {
        Ok(HostType::Table(TableType::new(key, None)?).into_ptr())
    }

    pub fn vector(elem: TypePtr) -> TypePtr {
        HostType::Vector(elem).into_ptr()
    }

    pub fn enumeration<I, S>(name: &str, variants: I) -> TypePtr
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HostType::Enum(EnumType {
            name: name.to_string(),
            variants: variants.into_iter().map(Into::into).collect(),
        })
        .into_ptr()
    }

    /// Short name of the type's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostType::Bool => "bool",
            HostType::Int => "int",
            HostType::Count => "count",
            HostType::Double => "double",
            HostType::Time => "time",
            HostType::Interval => "interval",
            HostType::String => "string",
            HostType::Addr => "addr",
            HostType::Subnet => "subnet",
            HostType::Port => "port",
            HostType::Enum(_) => "enum",
            HostType::Record(_) => "record",
            HostType::Table(t) if t.is_set() => "set",
            HostType::Table(_) => "table",
            HostType::Vector(_) => "vector",
        }
    }

    /// Types usable as table keys.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            HostType::Bool
                | HostType::Int
                | HostType::Count
                | HostType::String
                | HostType::Addr
                | HostType::Subnet
                | HostType::Port
                | HostType::Enum(_)
        )
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            HostType::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableType> {
        match self {
            HostType::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            HostType::Enum(e) => Some(e),
            _ => None,
        }
    }
}

/// Identity first, then structure.
pub fn same_type(a: &TypePtr, b: &TypePtr) -> bool {
    Rc::ptr_eq(a, b) || **a == **b
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Enum(e) => write!(f, "enum {}", e.name),
            HostType::Record(r) => write!(f, "record {}", r.name),
            HostType::Table(t) => match &t.yield_ty {
                Some(v) => write!(f, "table[{}] of {}", t.key, v),
                None => write!(f, "set[{}]", t.key),
            },
            HostType::Vector(elem) => write!(f, "vector of {elem}"),
            other => f.write_str(other.kind_name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    name: String,
    variants: Vec<String>,
}

impl EnumType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn variant_index(&self, variant: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == variant)
    }

    pub fn variant_name(&self, index: usize) -> Option<&str> {
        self.variants.get(index).map(String::as_str)
    }
}

/// A record field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypePtr,
    pub attrs: Attrs,
}

/// Ordered record layout. Field offsets are positions in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldDecl>,
}

impl RecordType {
    pub fn builder(name: &str) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, offset: usize) -> Option<&FieldDecl> {
        self.fields.get(offset)
    }

    /// Linear scan. Callers on hot paths should memoize this.
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

pub struct RecordTypeBuilder {
    name: String,
    fields: Vec<FieldDecl>,
}

impl RecordTypeBuilder {
    pub fn field(mut self, name: &str, ty: TypePtr, attrs: Attrs) -> Self {
        self.fields.push(FieldDecl {
            name: name.to_string(),
            ty,
            attrs,
        });
        self
    }

    pub fn build(self) -> TypePtr {
        HostType::Record(RecordType {
            name: self.name,
            fields: self.fields,
        })
        .into_ptr()
    }
}

/// Table layout. Without a yield type the table is a set.
#[derive(Debug, Clone, PartialEq)]
pub struct TableType {
    key: TypePtr,
    yield_ty: Option<TypePtr>,
}

impl TableType {
    pub fn new(key: TypePtr, yield_ty: Option<TypePtr>) -> Result<Self, ValueError> {
        if !key.is_atomic() {
            return Err(ValueError::InvalidKeyType(key.to_string()));
        }
        Ok(Self { key, yield_ty })
    }

    pub fn key(&self) -> &TypePtr {
        &self.key
    }

    pub fn yield_type(&self) -> Option<&TypePtr> {
        self.yield_ty.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.yield_ty.is_none()
    }
}
