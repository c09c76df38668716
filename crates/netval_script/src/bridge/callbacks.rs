//! Proxy traps for records and tables
//!
//! Every proxy the bridge creates shares one handler object. Each trap
//! resolves the [`ValueWrap`](super::ValueWrap) behind its target and
//! dispatches on the wrap's [`ProxyKind`]. The traps capture nothing; the
//! bridge is reached through the wrap's back-reference.
//!
//! Definitions route through the same conversion as assignments, and the
//! target can never be frozen, so the engine's proxy invariants always hold
//! against an empty, extensible target.
//!
//! A target that is not a live wrap of a live bridge makes reads return
//! `undefined` and writes throw.

use super::convert::{json_snapshot, key_from_index, key_from_name};
use super::wrap::{wrap_class, ProxyKind};
use super::ValueBridge;
use crate::error::ConversionError;
use netval_core::{AttrMask, FieldDecl, ValPtr};
use rquickjs::{Array, Ctx, Exception, Function, Object, Value};

const TO_JSON: &str = "toJSON";

/// A trap's view of its target.
struct Receiver {
    bridge: ValueBridge,
    value: ValPtr,
    mask: AttrMask,
    kind: ProxyKind,
}

impl Receiver {
    fn of(target: &Object<'_>) -> Option<Self> {
        let class = wrap_class(target)?;
        let wrap = class.borrow();
        let receiver = Receiver {
            bridge: ValueBridge::upgrade(wrap.bridge())?,
            value: wrap.value()?.clone(),
            mask: wrap.mask(),
            kind: wrap.kind(),
        };
        Some(receiver)
    }

    fn type_name(&self) -> String {
        self.value.ty().to_string()
    }
}

/// Property key as seen by a trap.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PropKey {
    Symbol,
    /// Canonical array index such as `"0"` or `"17"`.
    Index(u32),
    Name(String),
}

impl PropKey {
    fn classify(key: &Value<'_>) -> rquickjs::Result<Self> {
        let Some(text) = key.as_string() else {
            return Ok(PropKey::Symbol);
        };
        let name = text.to_string()?;
        Ok(match canonical_index(&name) {
            Some(index) => PropKey::Index(index),
            None => PropKey::Name(name),
        })
    }

    fn name(&self) -> String {
        match self {
            PropKey::Symbol => String::new(),
            PropKey::Index(index) => index.to_string(),
            PropKey::Name(name) => name.clone(),
        }
    }
}

fn canonical_index(name: &str) -> Option<u32> {
    let index: u32 = name.parse().ok()?;
    (index != u32::MAX && index.to_string() == name).then_some(index)
}

fn undefined<'js>(ctx: &Ctx<'js>) -> Value<'js> {
    Value::new_undefined(ctx.clone())
}

fn type_error(ctx: &Ctx<'_>, message: &str) -> rquickjs::Error {
    Exception::throw_type(ctx, message)
}

fn not_a_host_value(ctx: &Ctx<'_>) -> rquickjs::Error {
    type_error(ctx, "receiver is not a live host value")
}

fn descriptor<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Value<'js>> {
    let desc = Object::new(ctx.clone())?;
    desc.set("value", value)?;
    desc.set("writable", true)?;
    desc.set("enumerable", true)?;
    desc.set("configurable", true)?;
    Ok(desc.into_value())
}

fn to_json<'js>(ctx: &Ctx<'js>, receiver: &Receiver) -> rquickjs::Result<Value<'js>> {
    let value = receiver.value.clone();
    let mask = receiver.mask;
    let func = Function::new(ctx.clone(), move |ctx: Ctx<'js>| {
        json_snapshot(&ctx, &value, mask)
    })?;
    Ok(func.into_value())
}

/// Build the shared handler object.
pub(crate) fn handler<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let handler = Object::new(ctx.clone())?;
    handler.set(
        "get",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, target: Object<'js>, key: Value<'js>| trap_get(&ctx, target, key),
        )?,
    )?;
    handler.set(
        "set",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, target: Object<'js>, key: Value<'js>, value: Value<'js>| {
                trap_set(&ctx, target, key, value)
            },
        )?,
    )?;
    handler.set(
        "has",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, target: Object<'js>, key: Value<'js>| trap_has(&ctx, target, key),
        )?,
    )?;
    handler.set(
        "deleteProperty",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, target: Object<'js>, key: Value<'js>| trap_delete(&ctx, target, key),
        )?,
    )?;
    handler.set(
        "ownKeys",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, target: Object<'js>| {
            trap_own_keys(&ctx, target)
        })?,
    )?;
    handler.set(
        "getOwnPropertyDescriptor",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, target: Object<'js>, key: Value<'js>| {
                trap_descriptor(&ctx, target, key)
            },
        )?,
    )?;
    handler.set(
        "defineProperty",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, target: Object<'js>, key: Value<'js>, desc: Object<'js>| {
                trap_define(&ctx, target, key, desc)
            },
        )?,
    )?;
    handler.set(
        "preventExtensions",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, _target: Object<'js>| {
            trap_prevent_extensions(&ctx)
        })?,
    )?;
    Ok(handler)
}

fn trap_get<'js>(ctx: &Ctx<'js>, target: Object<'js>, key: Value<'js>) -> rquickjs::Result<Value<'js>> {
    let Some(receiver) = Receiver::of(&target) else {
        return Ok(undefined(ctx));
    };
    let prop = PropKey::classify(&key)?;
    if prop == PropKey::Symbol {
        if receiver.bridge.is_tag(ctx, &key)? {
            return Ok(target.into_value());
        }
        return target.get(key);
    }
    match receiver.kind {
        ProxyKind::Record => record_get(ctx, &receiver, &target, &prop),
        ProxyKind::Table => table_get(ctx, &receiver, &target, &prop),
        ProxyKind::Opaque => Ok(undefined(ctx)),
    }
}

fn trap_set<'js>(
    ctx: &Ctx<'js>,
    target: Object<'js>,
    key: Value<'js>,
    value: Value<'js>,
) -> rquickjs::Result<bool> {
    let receiver = Receiver::of(&target).ok_or_else(|| not_a_host_value(ctx))?;
    let prop = PropKey::classify(&key)?;
    if prop == PropKey::Symbol {
        return Err(type_error(ctx, "symbol properties cannot be assigned on host values"));
    }
    match receiver.kind {
        ProxyKind::Record => record_set(ctx, &receiver, &prop, &value),
        ProxyKind::Table => table_set(ctx, &receiver, &prop, &value),
        ProxyKind::Opaque => Err(not_a_host_value(ctx)),
    }
}

/// Data descriptors with a value are stored like a plain assignment. The
/// target itself never receives own properties.
fn trap_define<'js>(
    ctx: &Ctx<'js>,
    target: Object<'js>,
    key: Value<'js>,
    desc: Object<'js>,
) -> rquickjs::Result<bool> {
    if desc.contains_key("get")? || desc.contains_key("set")? {
        return Err(type_error(ctx, "accessor properties cannot be defined on host values"));
    }
    for flag in ["configurable", "writable", "enumerable"] {
        let value: Value = desc.get(flag)?;
        if value.as_bool() == Some(false) {
            return Err(type_error(
                ctx,
                &format!("host value properties cannot be made non-{}", flag),
            ));
        }
    }
    if !desc.contains_key("value")? {
        return Err(type_error(ctx, "property definitions on host values need a value"));
    }
    let value: Value = desc.get("value")?;
    trap_set(ctx, target, key, value)
}

fn trap_prevent_extensions(ctx: &Ctx<'_>) -> rquickjs::Result<bool> {
    Err(type_error(ctx, "host values cannot be frozen, sealed or made non-extensible"))
}

fn trap_has<'js>(ctx: &Ctx<'js>, target: Object<'js>, key: Value<'js>) -> rquickjs::Result<bool> {
    let Some(receiver) = Receiver::of(&target) else {
        return Ok(false);
    };
    let prop = PropKey::classify(&key)?;
    if prop == PropKey::Symbol {
        return Ok(false);
    }
    match receiver.kind {
        ProxyKind::Record => Ok(record_has(&receiver, &prop)),
        ProxyKind::Table => table_has(ctx, &receiver, &prop),
        ProxyKind::Opaque => Ok(false),
    }
}

fn trap_delete<'js>(ctx: &Ctx<'js>, target: Object<'js>, key: Value<'js>) -> rquickjs::Result<bool> {
    let receiver = Receiver::of(&target).ok_or_else(|| not_a_host_value(ctx))?;
    let prop = PropKey::classify(&key)?;
    if prop == PropKey::Symbol {
        return Ok(true);
    }
    match receiver.kind {
        ProxyKind::Record => record_delete(ctx, &receiver, &prop),
        ProxyKind::Table => table_delete(ctx, &receiver, &prop),
        ProxyKind::Opaque => Err(not_a_host_value(ctx)),
    }
}

fn trap_own_keys<'js>(ctx: &Ctx<'js>, target: Object<'js>) -> rquickjs::Result<Array<'js>> {
    let names = match Receiver::of(&target) {
        Some(receiver) => match receiver.kind {
            ProxyKind::Record => record_keys(&receiver),
            ProxyKind::Table => table_keys(ctx, &receiver)?,
            ProxyKind::Opaque => Vec::new(),
        },
        None => Vec::new(),
    };
    let array = Array::new(ctx.clone())?;
    for (index, name) in names.into_iter().enumerate() {
        array.set(index, name)?;
    }
    Ok(array)
}

fn trap_descriptor<'js>(
    ctx: &Ctx<'js>,
    target: Object<'js>,
    key: Value<'js>,
) -> rquickjs::Result<Value<'js>> {
    let Some(receiver) = Receiver::of(&target) else {
        return Ok(undefined(ctx));
    };
    let prop = PropKey::classify(&key)?;
    if prop == PropKey::Symbol {
        return Ok(undefined(ctx));
    }
    match receiver.kind {
        ProxyKind::Record => record_descriptor(ctx, &receiver, &prop),
        ProxyKind::Table => table_descriptor(ctx, &receiver, &prop),
        ProxyKind::Opaque => Ok(undefined(ctx)),
    }
}

// Records

/// Offset and declaration of `name` if the receiver's mask exposes it.
fn exposed_field<'r>(receiver: &'r Receiver, name: &str) -> Option<(usize, &'r FieldDecl)> {
    let ty = receiver.value.ty();
    let offset = receiver.bridge.record_field_offset(ty, name)?;
    let decl = ty.as_record()?.field(offset)?;
    receiver.mask.exposes(decl.attrs).then_some((offset, decl))
}

fn record_get<'js>(
    ctx: &Ctx<'js>,
    receiver: &Receiver,
    target: &Object<'js>,
    prop: &PropKey,
) -> rquickjs::Result<Value<'js>> {
    let name = prop.name();
    let Some((offset, _)) = exposed_field(receiver, &name) else {
        if name == TO_JSON {
            return to_json(ctx, receiver);
        }
        return target.get(name.as_str());
    };
    match receiver.value.field(offset) {
        Ok(Some(field)) => receiver.bridge.wrap(ctx, &field, receiver.mask),
        _ => Ok(undefined(ctx)),
    }
}

fn record_set<'js>(
    ctx: &Ctx<'js>,
    receiver: &Receiver,
    prop: &PropKey,
    value: &Value<'js>,
) -> rquickjs::Result<bool> {
    let name = prop.name();
    let Some((offset, decl)) = exposed_field(receiver, &name) else {
        return Err(type_error(
            ctx,
            &format!("{} has no field '{}'", receiver.type_name(), name),
        ));
    };
    let host = if value.is_undefined() || value.is_null() {
        None
    } else {
        let converted = receiver
            .bridge
            .to_host_value(ctx, value, &decl.ty)
            .map_err(|err| type_error(ctx, &err.in_field(&name).to_string()))?;
        Some(converted)
    };
    receiver
        .value
        .set_field(offset, host)
        .map_err(|err| type_error(ctx, &err.to_string()))?;
    Ok(true)
}

/// Clears an optional field. Names outside the exposed schema are ignored.
fn record_delete(ctx: &Ctx<'_>, receiver: &Receiver, prop: &PropKey) -> rquickjs::Result<bool> {
    let Some((offset, _)) = exposed_field(receiver, &prop.name()) else {
        return Ok(true);
    };
    receiver
        .value
        .set_field(offset, None)
        .map_err(|err| type_error(ctx, &err.to_string()))?;
    Ok(true)
}

fn record_has(receiver: &Receiver, prop: &PropKey) -> bool {
    exposed_field(receiver, &prop.name())
        .is_some_and(|(offset, _)| matches!(receiver.value.field(offset), Ok(Some(_))))
}

fn record_keys(receiver: &Receiver) -> Vec<String> {
    let Some(record) = receiver.value.ty().as_record() else {
        return Vec::new();
    };
    record
        .fields()
        .iter()
        .filter(|decl| receiver.mask.exposes(decl.attrs))
        .map(|decl| decl.name.clone())
        .collect()
}

fn record_descriptor<'js>(
    ctx: &Ctx<'js>,
    receiver: &Receiver,
    prop: &PropKey,
) -> rquickjs::Result<Value<'js>> {
    let Some((offset, _)) = exposed_field(receiver, &prop.name()) else {
        return Ok(undefined(ctx));
    };
    let value = match receiver.value.field(offset) {
        Ok(Some(field)) => receiver.bridge.wrap(ctx, &field, receiver.mask)?,
        _ => undefined(ctx),
    };
    descriptor(ctx, value)
}

// Tables and sets

fn table_key(receiver: &Receiver, prop: &PropKey) -> Result<ValPtr, ConversionError> {
    let ty = receiver.value.ty();
    let table = ty
        .as_table()
        .ok_or_else(|| ConversionError::mismatch("table", &ty.to_string()))?;
    match prop {
        PropKey::Index(index) => key_from_index(*index, table.key()),
        other => key_from_name(&other.name(), table.key()),
    }
}

fn is_set(receiver: &Receiver) -> bool {
    receiver.value.ty().as_table().is_some_and(|t| t.is_set())
}

fn table_get<'js>(
    ctx: &Ctx<'js>,
    receiver: &Receiver,
    target: &Object<'js>,
    prop: &PropKey,
) -> rquickjs::Result<Value<'js>> {
    let name = prop.name();
    let Ok(key) = table_key(receiver, prop) else {
        if name == TO_JSON {
            return to_json(ctx, receiver);
        }
        return target.get(name.as_str());
    };
    if is_set(receiver) {
        if receiver.value.table_contains(&key).unwrap_or(false) {
            return Ok(Value::new_bool(ctx.clone(), true));
        }
    } else if let Ok(Some(item)) = receiver.value.table_lookup(&key) {
        return receiver.bridge.wrap(ctx, &item, receiver.mask);
    }
    if name == TO_JSON {
        return to_json(ctx, receiver);
    }
    Ok(undefined(ctx))
}

fn table_set<'js>(
    ctx: &Ctx<'js>,
    receiver: &Receiver,
    prop: &PropKey,
    value: &Value<'js>,
) -> rquickjs::Result<bool> {
    let name = prop.name();
    let key = table_key(receiver, prop).map_err(|err| {
        type_error(
            ctx,
            &format!("invalid key for {}: {}", receiver.type_name(), err.in_key(&name)),
        )
    })?;
    let host_error = |err: netval_core::ValueError| type_error(ctx, &err.to_string());

    if is_set(receiver) {
        match value.as_bool() {
            Some(true) => receiver.value.table_assign(key, None).map_err(host_error)?,
            Some(false) => {
                receiver.value.table_remove(&key).map_err(host_error)?;
            }
            None => {
                return Err(type_error(
                    ctx,
                    &format!("set membership must be a boolean, got {}", value.type_name()),
                ))
            }
        }
        return Ok(true);
    }

    if value.is_undefined() || value.is_null() {
        receiver.value.table_remove(&key).map_err(host_error)?;
        return Ok(true);
    }
    let yield_ty = receiver
        .value
        .ty()
        .as_table()
        .and_then(|t| t.yield_type().cloned())
        .ok_or_else(|| not_a_host_value(ctx))?;
    let item = receiver
        .bridge
        .to_host_value(ctx, value, &yield_ty)
        .map_err(|err| type_error(ctx, &err.in_key(&name).to_string()))?;
    receiver
        .value
        .table_assign(key, Some(item))
        .map_err(host_error)?;
    Ok(true)
}

fn table_has(ctx: &Ctx<'_>, receiver: &Receiver, prop: &PropKey) -> rquickjs::Result<bool> {
    let Ok(key) = table_key(receiver, prop) else {
        return Ok(false);
    };
    receiver
        .value
        .table_contains(&key)
        .map_err(|err| type_error(ctx, &err.to_string()))
}

fn table_delete(ctx: &Ctx<'_>, receiver: &Receiver, prop: &PropKey) -> rquickjs::Result<bool> {
    if let Ok(key) = table_key(receiver, prop) {
        receiver
            .value
            .table_remove(&key)
            .map_err(|err| type_error(ctx, &err.to_string()))?;
    }
    Ok(true)
}

fn table_keys(ctx: &Ctx<'_>, receiver: &Receiver) -> rquickjs::Result<Vec<String>> {
    let keys = receiver
        .value
        .table_keys()
        .map_err(|err| type_error(ctx, &err.to_string()))?;
    Ok(keys.iter().map(|key| key.to_string()).collect())
}

fn table_descriptor<'js>(
    ctx: &Ctx<'js>,
    receiver: &Receiver,
    prop: &PropKey,
) -> rquickjs::Result<Value<'js>> {
    let Ok(key) = table_key(receiver, prop) else {
        return Ok(undefined(ctx));
    };
    if is_set(receiver) {
        if receiver.value.table_contains(&key).unwrap_or(false) {
            return descriptor(ctx, Value::new_bool(ctx.clone(), true));
        }
        return Ok(undefined(ctx));
    }
    match receiver.value.table_lookup(&key) {
        Ok(Some(item)) => {
            let value = receiver.bridge.wrap(ctx, &item, receiver.mask)?;
            descriptor(ctx, value)
        }
        _ => Ok(undefined(ctx)),
    }
}
