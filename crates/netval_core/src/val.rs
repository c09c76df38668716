//! Reference-counted host values
//!
//! Scalars are immutable. Records, tables and vectors mutate in place through
//! interior mutability so every holder of a [`ValPtr`] observes the change.

use crate::error::ValueError;
use crate::net::{Port, Subnet};
use crate::types::{same_type, HostType, RecordType, TableType, TypePtr};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::rc::Rc;

/// Shared handle to a host value. Cloning acquires a reference.
pub type ValPtr = Rc<Val>;

/// Ordered index form of an atomic value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKey {
    Bool(bool),
    Int(i64),
    Count(u64),
    String(String),
    Addr(IpAddr),
    Subnet(Subnet),
    Port(Port),
    Enum(usize),
}

impl TableKey {
    pub fn from_val(val: &Val) -> Result<Self, ValueError> {
        Ok(match &val.data {
            ValData::Bool(b) => TableKey::Bool(*b),
            ValData::Int(i) => TableKey::Int(*i),
            ValData::Count(c) => TableKey::Count(*c),
            ValData::String(s) => TableKey::String(s.clone()),
            ValData::Addr(a) => TableKey::Addr(*a),
            ValData::Subnet(s) => TableKey::Subnet(*s),
            ValData::Port(p) => TableKey::Port(*p),
            ValData::Enum(i) => TableKey::Enum(*i),
            _ => return Err(ValueError::InvalidKeyType(val.ty.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub key: ValPtr,
    /// `None` for set members.
    pub value: Option<ValPtr>,
}

type Slots = RefCell<Vec<Option<ValPtr>>>;
type Entries = RefCell<BTreeMap<TableKey, TableEntry>>;

#[derive(Debug, PartialEq)]
pub enum ValData {
    Bool(bool),
    Int(i64),
    Count(u64),
    Double(f64),
    Time(f64),
    Interval(f64),
    String(String),
    Addr(IpAddr),
    Subnet(Subnet),
    Port(Port),
    /// Variant index into the enum type.
    Enum(usize),
    /// One slot per declared field; `None` is unset.
    Record(Slots),
    Table(Entries),
    Vector(Slots),
}

impl ValData {
    fn kind_name(&self) -> &'static str {
        match self {
            ValData::Bool(_) => "bool",
            ValData::Int(_) => "int",
            ValData::Count(_) => "count",
            ValData::Double(_) => "double",
            ValData::Time(_) => "time",
            ValData::Interval(_) => "interval",
            ValData::String(_) => "string",
            ValData::Addr(_) => "addr",
            ValData::Subnet(_) => "subnet",
            ValData::Port(_) => "port",
            ValData::Enum(_) => "enum",
            ValData::Record(_) => "record",
            ValData::Table(_) => "table",
            ValData::Vector(_) => "vector",
        }
    }
}

/// A typed host value.
#[derive(Debug, PartialEq)]
pub struct Val {
    ty: TypePtr,
    data: ValData,
}

impl Val {
    /// Pair `data` with `ty`, rejecting data of a different kind.
    pub fn new(ty: TypePtr, data: ValData) -> Result<ValPtr, ValueError> {
        let matches = match (&*ty, &data) {
            (HostType::Bool, ValData::Bool(_))
            | (HostType::Int, ValData::Int(_))
            | (HostType::Count, ValData::Count(_))
            | (HostType::Double, ValData::Double(_))
            | (HostType::Time, ValData::Time(_))
            | (HostType::Interval, ValData::Interval(_))
            | (HostType::String, ValData::String(_))
            | (HostType::Addr, ValData::Addr(_))
            | (HostType::Subnet, ValData::Subnet(_))
            | (HostType::Port, ValData::Port(_))
            | (HostType::Table(_), ValData::Table(_))
            | (HostType::Vector(_), ValData::Vector(_)) => true,
            (HostType::Enum(e), ValData::Enum(index)) => {
                if e.variant_name(*index).is_none() {
                    return Err(ValueError::UnknownVariant {
                        name: e.name().to_string(),
                        variant: index.to_string(),
                    });
                }
                true
            }
            (HostType::Record(r), ValData::Record(slots)) => {
                slots.borrow().len() == r.num_fields()
            }
            _ => false,
        };
        if !matches {
            return Err(ValueError::WrongKind {
                expected: ty.kind_name(),
                actual: data.kind_name().to_string(),
            });
        }
        Ok(Rc::new(Val { ty, data }))
    }

    fn scalar(ty: HostType, data: ValData) -> ValPtr {
        Rc::new(Val {
            ty: ty.into_ptr(),
            data,
        })
    }

    pub fn bool(v: bool) -> ValPtr {
        Self::scalar(HostType::Bool, ValData::Bool(v))
    }

    pub fn int(v: i64) -> ValPtr {
        Self::scalar(HostType::Int, ValData::Int(v))
    }

    pub fn count(v: u64) -> ValPtr {
        Self::scalar(HostType::Count, ValData::Count(v))
    }

    pub fn double(v: f64) -> ValPtr {
        Self::scalar(HostType::Double, ValData::Double(v))
    }

    pub fn time(secs: f64) -> ValPtr {
        Self::scalar(HostType::Time, ValData::Time(secs))
    }

    pub fn interval(secs: f64) -> ValPtr {
        Self::scalar(HostType::Interval, ValData::Interval(secs))
    }

    pub fn string(v: impl Into<String>) -> ValPtr {
        Self::scalar(HostType::String, ValData::String(v.into()))
    }

    pub fn addr(v: IpAddr) -> ValPtr {
        Self::scalar(HostType::Addr, ValData::Addr(v))
    }

    pub fn subnet(v: Subnet) -> ValPtr {
        Self::scalar(HostType::Subnet, ValData::Subnet(v))
    }

    pub fn port(v: Port) -> ValPtr {
        Self::scalar(HostType::Port, ValData::Port(v))
    }

    pub fn enum_val(ty: &TypePtr, variant: &str) -> Result<ValPtr, ValueError> {
        let e = ty.as_enum().ok_or_else(|| ValueError::WrongKind {
            expected: "enum",
            actual: ty.to_string(),
        })?;
        let index = e
            .variant_index(variant)
            .ok_or_else(|| ValueError::UnknownVariant {
                name: e.name().to_string(),
                variant: variant.to_string(),
            })?;
        Val::new(ty.clone(), ValData::Enum(index))
    }

    /// A record of type `ty` with every field unset.
    pub fn record(ty: &TypePtr) -> Result<ValPtr, ValueError> {
        let n = ty.as_record().map(RecordType::num_fields).unwrap_or(0);
        Val::new(ty.clone(), ValData::Record(RefCell::new(vec![None; n])))
    }

    pub fn table(ty: &TypePtr) -> Result<ValPtr, ValueError> {
        Val::new(ty.clone(), ValData::Table(RefCell::new(BTreeMap::new())))
    }

    pub fn vector(ty: &TypePtr) -> Result<ValPtr, ValueError> {
        Val::new(ty.clone(), ValData::Vector(RefCell::new(Vec::new())))
    }

    pub fn ty(&self) -> &TypePtr {
        &self.ty
    }

    pub fn data(&self) -> &ValData {
        &self.data
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.data {
            ValData::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.data {
            ValData::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self.data {
            ValData::Count(c) => Some(c),
            _ => None,
        }
    }

    /// Doubles, times and intervals.
    pub fn as_double(&self) -> Option<f64> {
        match self.data {
            ValData::Double(d) | ValData::Time(d) | ValData::Interval(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            ValData::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_addr(&self) -> Option<IpAddr> {
        match self.data {
            ValData::Addr(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_port(&self) -> Option<Port> {
        match self.data {
            ValData::Port(p) => Some(p),
            _ => None,
        }
    }

    pub fn enum_name(&self) -> Option<&str> {
        match (&*self.ty, &self.data) {
            (HostType::Enum(e), ValData::Enum(index)) => e.variant_name(*index),
            _ => None,
        }
    }

    fn record_parts(&self) -> Result<(&RecordType, &Slots), ValueError> {
        match (&*self.ty, &self.data) {
            (HostType::Record(r), ValData::Record(slots)) => Ok((r, slots)),
            _ => Err(self.wrong_kind("record")),
        }
    }

    fn table_parts(&self) -> Result<(&TableType, &Entries), ValueError> {
        match (&*self.ty, &self.data) {
            (HostType::Table(t), ValData::Table(entries)) => Ok((t, entries)),
            _ => Err(self.wrong_kind("table")),
        }
    }

    fn wrong_kind(&self, expected: &'static str) -> ValueError {
        ValueError::WrongKind {
            expected,
            actual: self.ty.to_string(),
        }
    }

    /// Field at `offset`, `None` when unset.
    pub fn field(&self, offset: usize) -> Result<Option<ValPtr>, ValueError> {
        let (rt, slots) = self.record_parts()?;
        slots
            .borrow()
            .get(offset)
            .cloned()
            .ok_or_else(|| ValueError::BadOffset {
                record: rt.name().to_string(),
                offset,
            })
    }

    /// Store `value` at `offset`. `None` clears the field, which only
    /// optional fields allow.
    pub fn set_field(&self, offset: usize, value: Option<ValPtr>) -> Result<(), ValueError> {
        let (rt, slots) = self.record_parts()?;
        let decl = rt.field(offset).ok_or_else(|| ValueError::BadOffset {
            record: rt.name().to_string(),
            offset,
        })?;
        match &value {
            Some(v) if !same_type(v.ty(), &decl.ty) => {
                return Err(ValueError::FieldType {
                    record: rt.name().to_string(),
                    field: decl.name.clone(),
                    expected: decl.ty.to_string(),
                    actual: v.ty().to_string(),
                })
            }
            None if !decl.attrs.is_optional() => {
                return Err(ValueError::RequiredField {
                    record: rt.name().to_string(),
                    field: decl.name.clone(),
                })
            }
            _ => {}
        }
        slots.borrow_mut()[offset] = value;
        Ok(())
    }

    pub fn field_by_name(&self, name: &str) -> Result<Option<ValPtr>, ValueError> {
        let offset = self.offset_of(name)?;
        self.field(offset)
    }

    pub fn set_field_by_name(&self, name: &str, value: Option<ValPtr>) -> Result<(), ValueError> {
        let offset = self.offset_of(name)?;
        self.set_field(offset, value)
    }

    fn offset_of(&self, name: &str) -> Result<usize, ValueError> {
        let (rt, _) = self.record_parts()?;
        rt.field_offset(name)
            .ok_or_else(|| ValueError::UnknownField {
                record: rt.name().to_string(),
                field: name.to_string(),
            })
    }

    fn table_key(&self, table: &TableType, key: &Val) -> Result<TableKey, ValueError> {
        if !same_type(key.ty(), table.key()) {
            return Err(ValueError::TypeMismatch {
                expected: table.key().to_string(),
                actual: key.ty().to_string(),
            });
        }
        TableKey::from_val(key)
    }

    pub fn table_len(&self) -> Result<usize, ValueError> {
        let (_, entries) = self.table_parts()?;
        Ok(entries.borrow().len())
    }

    pub fn table_contains(&self, key: &Val) -> Result<bool, ValueError> {
        let (tt, entries) = self.table_parts()?;
        let key = self.table_key(tt, key)?;
        Ok(entries.borrow().contains_key(&key))
    }

    /// Yield value stored under `key`. Set members have none.
    pub fn table_lookup(&self, key: &Val) -> Result<Option<ValPtr>, ValueError> {
        let (tt, entries) = self.table_parts()?;
        let key = self.table_key(tt, key)?;
        Ok(entries.borrow().get(&key).and_then(|e| e.value.clone()))
    }

    /// Insert or replace. Tables need `Some(value)`, sets need `None`.
    pub fn table_assign(&self, key: ValPtr, value: Option<ValPtr>) -> Result<(), ValueError> {
        let (tt, entries) = self.table_parts()?;
        let index = self.table_key(tt, &key)?;
        match (tt.yield_type(), &value) {
            (Some(expected), Some(v)) if !same_type(v.ty(), expected) => {
                return Err(ValueError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: v.ty().to_string(),
                })
            }
            (Some(_), Some(_)) | (None, None) => {}
            _ => return Err(ValueError::YieldMismatch),
        }
        tracing::trace!("assign {} in {}", key, self.ty);
        entries.borrow_mut().insert(index, TableEntry { key, value });
        Ok(())
    }

    pub fn table_remove(&self, key: &Val) -> Result<bool, ValueError> {
        let (tt, entries) = self.table_parts()?;
        let key = self.table_key(tt, key)?;
        Ok(entries.borrow_mut().remove(&key).is_some())
    }

    /// Keys in table order, copied at call time.
    pub fn table_keys(&self) -> Result<Vec<ValPtr>, ValueError> {
        let (_, entries) = self.table_parts()?;
        Ok(entries.borrow().values().map(|e| e.key.clone()).collect())
    }

    pub fn table_entries(&self) -> Result<Vec<TableEntry>, ValueError> {
        let (_, entries) = self.table_parts()?;
        Ok(entries.borrow().values().cloned().collect())
    }

    pub fn vector_items(&self) -> Result<Vec<Option<ValPtr>>, ValueError> {
        match &self.data {
            ValData::Vector(items) => Ok(items.borrow().clone()),
            _ => Err(self.wrong_kind("vector")),
        }
    }

    pub fn vector_push(&self, item: ValPtr) -> Result<(), ValueError> {
        match (&*self.ty, &self.data) {
            (HostType::Vector(elem), ValData::Vector(items)) => {
                if !same_type(item.ty(), elem) {
                    return Err(ValueError::TypeMismatch {
                        expected: elem.to_string(),
                        actual: item.ty().to_string(),
                    });
                }
                items.borrow_mut().push(Some(item));
                Ok(())
            }
            _ => Err(self.wrong_kind("vector")),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ValData::Bool(b) => f.write_str(if *b { "T" } else { "F" }),
            ValData::Int(i) => write!(f, "{i}"),
            ValData::Count(c) => write!(f, "{c}"),
            ValData::Double(d) | ValData::Time(d) | ValData::Interval(d) => write!(f, "{d}"),
            ValData::String(s) => f.write_str(s),
            ValData::Addr(a) => write!(f, "{a}"),
            ValData::Subnet(s) => write!(f, "{s}"),
            ValData::Port(p) => write!(f, "{p}"),
            ValData::Enum(_) => f.write_str(self.enum_name().unwrap_or("<invalid>")),
            ValData::Record(slots) => {
                let names = self.ty.as_record().map(RecordType::fields).unwrap_or(&[]);
                f.write_str("[")?;
                for (i, (decl, slot)) in names.iter().zip(slots.borrow().iter()).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match slot {
                        Some(v) => write!(f, "{}={}", decl.name, v)?,
                        None => write!(f, "{}=<uninitialized>", decl.name)?,
                    }
                }
                f.write_str("]")
            }
            ValData::Table(entries) => {
                f.write_str("{")?;
                for (i, entry) in entries.borrow().values().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match &entry.value {
                        Some(v) => write!(f, "{} -> {}", entry.key, v)?,
                        None => write!(f, "{}", entry.key)?,
                    }
                }
                f.write_str("}")
            }
            ValData::Vector(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Some(v) => write!(f, "{v}")?,
                        None => f.write_str("<uninitialized>")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Attrs;
    use crate::net::Proto;

    fn info_type() -> TypePtr {
        RecordType::builder("info")
            .field("uid", HostType::String.into_ptr(), Attrs::LOG)
            .field("hits", HostType::Count.into_ptr(), Attrs::LOG | Attrs::OPTIONAL)
            .field("note", HostType::String.into_ptr(), Attrs::OPTIONAL)
            .build()
    }

    #[test]
    fn record_fields_start_unset() {
        let rec = Val::record(&info_type()).unwrap();
        assert_eq!(rec.field(0).unwrap(), None);
        assert_eq!(rec.field_by_name("hits").unwrap(), None);
        assert!(matches!(rec.field(3), Err(ValueError::BadOffset { offset: 3, .. })));
    }

    #[test]
    fn set_field_checks_declared_type() {
        let rec = Val::record(&info_type()).unwrap();
        rec.set_field_by_name("uid", Some(Val::string("C1"))).unwrap();
        let err = rec.set_field_by_name("uid", Some(Val::count(1))).unwrap_err();
        assert!(matches!(err, ValueError::FieldType { .. }));
        assert_eq!(rec.field(0).unwrap().unwrap().as_str(), Some("C1"));
    }

    #[test]
    fn only_optional_fields_clear() {
        let rec = Val::record(&info_type()).unwrap();
        rec.set_field_by_name("note", Some(Val::string("x"))).unwrap();
        rec.set_field_by_name("note", None).unwrap();
        assert_eq!(rec.field_by_name("note").unwrap(), None);
        assert!(matches!(
            rec.set_field_by_name("uid", None),
            Err(ValueError::RequiredField { .. })
        ));
    }

    #[test]
    fn table_assign_lookup_remove() {
        let ty = HostType::table(HostType::Addr.into_ptr(), HostType::Count.into_ptr()).unwrap();
        let table = Val::table(&ty).unwrap();
        let key = Val::addr("10.0.0.1".parse().unwrap());
        table.table_assign(key.clone(), Some(Val::count(3))).unwrap();
        assert_eq!(table.table_lookup(&key).unwrap().unwrap().as_count(), Some(3));
        assert_eq!(table.table_len().unwrap(), 1);
        assert!(table.table_remove(&key).unwrap());
        assert!(!table.table_contains(&key).unwrap());
    }

    #[test]
    fn table_rejects_wrong_key_and_value_types() {
        let ty = HostType::table(HostType::Addr.into_ptr(), HostType::Count.into_ptr()).unwrap();
        let table = Val::table(&ty).unwrap();
        assert!(table.table_assign(Val::string("x"), Some(Val::count(1))).is_err());
        assert!(table
            .table_assign(Val::addr("::1".parse().unwrap()), Some(Val::int(1)))
            .is_err());
        assert_eq!(
            table.table_assign(Val::addr("::1".parse().unwrap()), None),
            Err(ValueError::YieldMismatch)
        );
        assert_eq!(table.table_len().unwrap(), 0);
    }

    #[test]
    fn table_keys_are_a_snapshot() {
        let ty = HostType::set(HostType::Port.into_ptr()).unwrap();
        let set = Val::table(&ty).unwrap();
        set.table_assign(Val::port(Port::new(80, Proto::Tcp)), None).unwrap();
        let keys = set.table_keys().unwrap();
        set.table_assign(Val::port(Port::new(53, Proto::Udp)), None).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(set.table_len().unwrap(), 2);
    }

    #[test]
    fn enum_values_resolve_names() {
        let ty = HostType::enumeration("transport_proto", ["unknown_transport", "tcp", "udp"]);
        let v = Val::enum_val(&ty, "udp").unwrap();
        assert_eq!(v.enum_name(), Some("udp"));
        assert!(Val::enum_val(&ty, "sctp").is_err());
    }

    #[test]
    fn display_renders_composites() {
        let rec = Val::record(&info_type()).unwrap();
        rec.set_field_by_name("uid", Some(Val::string("C1"))).unwrap();
        rec.set_field_by_name("hits", Some(Val::count(2))).unwrap();
        assert_eq!(rec.to_string(), "[uid=C1, hits=2, note=<uninitialized>]");
    }

    #[test]
    fn new_rejects_mismatched_data() {
        let err = Val::new(HostType::Count.into_ptr(), ValData::Int(1)).unwrap_err();
        assert_eq!(
            err,
            ValueError::WrongKind {
                expected: "count",
                actual: "int".to_string()
            }
        );
    }
}
