//! Conversions between host values and script values
//!
//! Host to script: scalars become JS primitives, counts become BigInt, ports
//! become `{port, proto}` objects, records and tables become lazy proxies and
//! vectors become arrays.
//!
//! Script to host: type-directed and validated. A value the target type
//! cannot represent is a [`ConversionError`], never a silent coercion.

use super::ValueBridge;
use crate::error::ConversionError;
use netval_core::{same_type, AttrMask, HostType, Port, Proto, TypePtr, Val, ValData, ValPtr};
use rquickjs::{Array, BigInt, Coerced, Ctx, Object, Value};
use std::str::FromStr;

/// Largest integer a JS number represents exactly.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

// 2^63 as a double; i64 covers [-2^63, 2^63).
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn string_value<'js>(ctx: &Ctx<'js>, text: &str) -> rquickjs::Result<Value<'js>> {
    Ok(rquickjs::String::from_str(ctx.clone(), text)?.into_value())
}

fn port_object<'js>(ctx: &Ctx<'js>, port: Port) -> rquickjs::Result<Value<'js>> {
    let object = Object::new(ctx.clone())?;
    object.set("port", i32::from(port.number))?;
    object.set("proto", port.proto.as_str())?;
    Ok(object.into_value())
}

fn int_value<'js>(ctx: &Ctx<'js>, value: i64) -> rquickjs::Result<Value<'js>> {
    if value.unsigned_abs() <= MAX_SAFE_INTEGER as u64 {
        Ok(Value::new_number(ctx.clone(), value as f64))
    } else {
        Ok(BigInt::from_i64(ctx.clone(), value)?.into_value())
    }
}

/// Scalars that map the same way everywhere.
fn plain_scalar<'js>(ctx: &Ctx<'js>, value: &Val) -> rquickjs::Result<Value<'js>> {
    Ok(match value.data() {
        ValData::Bool(b) => Value::new_bool(ctx.clone(), *b),
        ValData::Double(d) | ValData::Time(d) | ValData::Interval(d) => {
            Value::new_number(ctx.clone(), *d)
        }
        ValData::String(s) => string_value(ctx, s)?,
        ValData::Port(port) => port_object(ctx, *port)?,
        _ => string_value(ctx, &value.to_string())?,
    })
}

pub(crate) fn to_script<'js>(
    bridge: &ValueBridge,
    ctx: &Ctx<'js>,
    value: &ValPtr,
    mask: AttrMask,
) -> rquickjs::Result<Value<'js>> {
    match value.data() {
        ValData::Int(i) => int_value(ctx, *i),
        ValData::Count(c) => Ok(bridge.big_int(ctx, *c)?.into_value()),
        ValData::Record(_) | ValData::Table(_) => {
            Ok(bridge.wrap_as_object(ctx, value, mask)?.into_value())
        }
        ValData::Vector(items) => {
            let items = items.borrow().clone();
            let array = Array::new(ctx.clone())?;
            for (index, item) in items.iter().enumerate() {
                let element = match item {
                    Some(item) => to_script(bridge, ctx, item, mask)?,
                    None => Value::new_undefined(ctx.clone()),
                };
                array.set(index, element)?;
            }
            Ok(array.into_value())
        }
        _ => plain_scalar(ctx, value),
    }
}

/// Plain data copy of `value` for `JSON.stringify`.
///
/// Ints and counts become numbers while they fit the safe integer range and
/// decimal strings beyond it, so no digits are lost.
pub(crate) fn json_snapshot<'js>(
    ctx: &Ctx<'js>,
    value: &ValPtr,
    mask: AttrMask,
) -> rquickjs::Result<Value<'js>> {
    const SAFE: u64 = MAX_SAFE_INTEGER as u64;
    match (&**value.ty(), value.data()) {
        (_, ValData::Int(i)) if i.unsigned_abs() <= SAFE => {
            Ok(Value::new_number(ctx.clone(), *i as f64))
        }
        (_, ValData::Count(c)) if *c <= SAFE => Ok(Value::new_number(ctx.clone(), *c as f64)),
        (_, ValData::Int(i)) => string_value(ctx, &i.to_string()),
        (_, ValData::Count(c)) => string_value(ctx, &c.to_string()),
        (HostType::Record(record), ValData::Record(slots)) => {
            let object = Object::new(ctx.clone())?;
            let slots = slots.borrow().clone();
            for (decl, slot) in record.fields().iter().zip(slots) {
                if !mask.exposes(decl.attrs) {
                    continue;
                }
                if let Some(field) = slot {
                    object.set(decl.name.as_str(), json_snapshot(ctx, &field, mask)?)?;
                }
            }
            Ok(object.into_value())
        }
        (HostType::Table(table), ValData::Table(entries)) => {
            let entries: Vec<_> = entries.borrow().values().cloned().collect();
            if table.is_set() {
                let array = Array::new(ctx.clone())?;
                for (index, entry) in entries.iter().enumerate() {
                    array.set(index, json_snapshot(ctx, &entry.key, mask)?)?;
                }
                return Ok(array.into_value());
            }
            let object = Object::new(ctx.clone())?;
            for entry in entries {
                if let Some(item) = &entry.value {
                    object.set(entry.key.to_string(), json_snapshot(ctx, item, mask)?)?;
                }
            }
            Ok(object.into_value())
        }
        (_, ValData::Vector(items)) => {
            let items = items.borrow().clone();
            let array = Array::new(ctx.clone())?;
            for (index, item) in items.iter().enumerate() {
                let element = match item {
                    Some(item) => json_snapshot(ctx, item, mask)?,
                    None => Value::new_null(ctx.clone()),
                };
                array.set(index, element)?;
            }
            Ok(array.into_value())
        }
        _ => plain_scalar(ctx, value),
    }
}

fn text_of(value: &Value<'_>, expected: &str) -> Result<String, ConversionError> {
    match value.as_string() {
        Some(text) => Ok(text.to_string()?),
        None => Err(ConversionError::mismatch(expected, value.type_name())),
    }
}

fn parse_text<T: FromStr>(value: &Value<'_>, expected: &str) -> Result<T, ConversionError> {
    let text = text_of(value, expected)?;
    text.parse()
        .map_err(|_| ConversionError::invalid(expected, &text))
}

fn big_int_text(value: &Value<'_>) -> Result<String, ConversionError> {
    Ok(value.get::<Coerced<String>>()?.0)
}

fn integral(value: &Value<'_>, expected: &str) -> Result<Option<f64>, ConversionError> {
    let Some(number) = value.as_number() else {
        return Ok(None);
    };
    if !number.is_finite() || number.fract() != 0.0 {
        return Err(ConversionError::invalid(expected, &number.to_string()));
    }
    Ok(Some(number))
}

fn to_int(value: &Value<'_>) -> Result<i64, ConversionError> {
    if let Some(number) = integral(value, "integer")? {
        if !(-I64_BOUND..I64_BOUND).contains(&number) {
            return Err(ConversionError::OutOfRange {
                target: "int",
                value: number.to_string(),
            });
        }
        return Ok(number as i64);
    }
    if value.as_big_int().is_some() {
        let text = big_int_text(value)?;
        return text.parse().map_err(|_| ConversionError::OutOfRange {
            target: "int",
            value: text,
        });
    }
    Err(ConversionError::mismatch("integer", value.type_name()))
}

fn to_count(value: &Value<'_>) -> Result<u64, ConversionError> {
    if let Some(number) = integral(value, "non-negative integer")? {
        if number < 0.0 || number > MAX_SAFE_INTEGER as f64 {
            return Err(ConversionError::OutOfRange {
                target: "count",
                value: number.to_string(),
            });
        }
        return Ok(number as u64);
    }
    if value.as_big_int().is_some() {
        let text = big_int_text(value)?;
        return text.parse().map_err(|_| ConversionError::OutOfRange {
            target: "count",
            value: text,
        });
    }
    Err(ConversionError::mismatch("non-negative integer", value.type_name()))
}

fn to_number(value: &Value<'_>) -> Result<f64, ConversionError> {
    value
        .as_number()
        .ok_or_else(|| ConversionError::mismatch("number", value.type_name()))
}

const PORT_EXPECTED: &str = "port string like '80/tcp' or {port, proto} object";

fn to_port(value: &Value<'_>) -> Result<Port, ConversionError> {
    if value.as_string().is_some() {
        return parse_text(value, PORT_EXPECTED);
    }
    let object = plain_object(value, PORT_EXPECTED)?;
    let number: Value = object.get("port")?;
    let number = match integral(&number, "port number")? {
        Some(n) if (0.0..=u16::MAX as f64).contains(&n) => n as u16,
        Some(n) => {
            return Err(ConversionError::OutOfRange {
                target: "port",
                value: n.to_string(),
            })
        }
        None => return Err(ConversionError::mismatch("port number", number.type_name())),
    };
    let proto: Proto = parse_text(&object.get::<_, Value>("proto")?, "transport protocol")?;
    Ok(Port::new(number, proto))
}

/// Non-array, non-function object.
fn plain_object<'a, 'js>(
    value: &'a Value<'js>,
    expected: &str,
) -> Result<&'a Object<'js>, ConversionError> {
    match value.as_object() {
        Some(object) if !value.is_array() && !value.is_function() => Ok(object),
        _ => Err(ConversionError::mismatch(expected, value.type_name())),
    }
}

/// Table key from a property name.
pub(crate) fn key_from_name(name: &str, key_ty: &TypePtr) -> Result<ValPtr, ConversionError> {
    let data = match &**key_ty {
        HostType::Bool => match name {
            "T" | "true" => ValData::Bool(true),
            "F" | "false" => ValData::Bool(false),
            _ => return Err(ConversionError::invalid("boolean key", name)),
        },
        HostType::Int => ValData::Int(
            name.parse()
                .map_err(|_| ConversionError::invalid("integer key", name))?,
        ),
        HostType::Count => ValData::Count(
            name.parse()
                .map_err(|_| ConversionError::invalid("count key", name))?,
        ),
        HostType::String => ValData::String(name.to_string()),
        HostType::Addr => ValData::Addr(
            name.parse()
                .map_err(|_| ConversionError::invalid("IP address string", name))?,
        ),
        HostType::Subnet => ValData::Subnet(
            name.parse()
                .map_err(|_| ConversionError::invalid("subnet string", name))?,
        ),
        HostType::Port => ValData::Port(
            name.parse()
                .map_err(|_| ConversionError::invalid(PORT_EXPECTED, name))?,
        ),
        HostType::Enum(e) => ValData::Enum(e.variant_index(name).ok_or_else(|| {
            ConversionError::invalid(format!("variant of enum {}", e.name()), name)
        })?),
        other => return Err(ConversionError::mismatch("atomic key type", &other.to_string())),
    };
    Ok(Val::new(key_ty.clone(), data)?)
}

/// Table key from an array index; integer keys skip the string round trip.
pub(crate) fn key_from_index(index: u32, key_ty: &TypePtr) -> Result<ValPtr, ConversionError> {
    match &**key_ty {
        HostType::Count => Ok(Val::new(key_ty.clone(), ValData::Count(index.into()))?),
        HostType::Int => Ok(Val::new(key_ty.clone(), ValData::Int(index.into()))?),
        _ => key_from_name(&index.to_string(), key_ty),
    }
}

fn key_from_value<'js>(
    bridge: &ValueBridge,
    ctx: &Ctx<'js>,
    value: &Value<'js>,
    key_ty: &TypePtr,
) -> Result<ValPtr, ConversionError> {
    match value.as_string() {
        Some(text) => key_from_name(&text.to_string()?, key_ty),
        None => to_host(bridge, ctx, value, key_ty),
    }
}

pub(crate) fn to_host<'js>(
    bridge: &ValueBridge,
    ctx: &Ctx<'js>,
    value: &Value<'js>,
    target: &TypePtr,
) -> Result<ValPtr, ConversionError> {
    if let Some(object) = value.as_object() {
        if let Some(wrapped) = bridge.unwrap_value(object) {
            if same_type(wrapped.ty(), target) {
                return Ok(wrapped);
            }
        }
    }

    let data = match &**target {
        HostType::Bool => ValData::Bool(
            value
                .as_bool()
                .ok_or_else(|| ConversionError::mismatch("boolean", value.type_name()))?,
        ),
        HostType::Int => ValData::Int(to_int(value)?),
        HostType::Count => ValData::Count(to_count(value)?),
        HostType::Double => ValData::Double(to_number(value)?),
        HostType::Time => ValData::Time(to_number(value)?),
        HostType::Interval => ValData::Interval(to_number(value)?),
        HostType::String => ValData::String(text_of(value, "string")?),
        HostType::Addr => ValData::Addr(parse_text(value, "IP address string")?),
        HostType::Subnet => ValData::Subnet(parse_text(value, "subnet string")?),
        HostType::Port => ValData::Port(to_port(value)?),
        HostType::Enum(e) => {
            let expected = format!("variant of enum {}", e.name());
            let name = text_of(value, &expected)?;
            ValData::Enum(
                e.variant_index(&name)
                    .ok_or_else(|| ConversionError::invalid(expected, &name))?,
            )
        }
        HostType::Record(_) => return to_record(bridge, ctx, value, target),
        HostType::Table(_) => return to_table(bridge, ctx, value, target),
        HostType::Vector(elem) => return to_vector(bridge, ctx, value, target, elem),
    };
    Ok(Val::new(target.clone(), data)?)
}

fn to_record<'js>(
    bridge: &ValueBridge,
    ctx: &Ctx<'js>,
    value: &Value<'js>,
    target: &TypePtr,
) -> Result<ValPtr, ConversionError> {
    let record_ty = target
        .as_record()
        .ok_or_else(|| ConversionError::mismatch("record type", &target.to_string()))?;
    let object = plain_object(value, "object")?;
    let record = Val::record(target)?;
    for (offset, decl) in record_ty.fields().iter().enumerate() {
        let field: Value = object.get(decl.name.as_str())?;
        if field.is_undefined() || field.is_null() {
            if decl.attrs.is_optional() {
                continue;
            }
            return Err(ConversionError::MissingField {
                record: record_ty.name().to_string(),
                field: decl.name.clone(),
            });
        }
        let converted =
            to_host(bridge, ctx, &field, &decl.ty).map_err(|err| err.in_field(&decl.name))?;
        record.set_field(offset, Some(converted))?;
    }
    Ok(record)
}

fn to_table<'js>(
    bridge: &ValueBridge,
    ctx: &Ctx<'js>,
    value: &Value<'js>,
    target: &TypePtr,
) -> Result<ValPtr, ConversionError> {
    let table_ty = target
        .as_table()
        .ok_or_else(|| ConversionError::mismatch("table type", &target.to_string()))?;
    let table = Val::table(target)?;

    let Some(yield_ty) = table_ty.yield_type() else {
        let array = value
            .as_array()
            .ok_or_else(|| ConversionError::mismatch("array", value.type_name()))?;
        for (index, item) in array.iter::<Value>().enumerate() {
            let key = key_from_value(bridge, ctx, &item?, table_ty.key())
                .map_err(|err| err.in_element(index))?;
            table.table_assign(key, None)?;
        }
        return Ok(table);
    };

    let object = plain_object(value, "object")?;
    for name in object.keys::<String>() {
        let name = name?;
        let key = key_from_name(&name, table_ty.key()).map_err(|err| err.in_key(&name))?;
        let item: Value = object.get(name.as_str())?;
        let item = to_host(bridge, ctx, &item, yield_ty).map_err(|err| err.in_key(&name))?;
        table.table_assign(key, Some(item))?;
    }
    Ok(table)
}

fn to_vector<'js>(
    bridge: &ValueBridge,
    ctx: &Ctx<'js>,
    value: &Value<'js>,
    target: &TypePtr,
    elem: &TypePtr,
) -> Result<ValPtr, ConversionError> {
    let array = value
        .as_array()
        .ok_or_else(|| ConversionError::mismatch("array", value.type_name()))?;
    let vector = Val::vector(target)?;
    for (index, item) in array.iter::<Value>().enumerate() {
        let item = to_host(bridge, ctx, &item?, elem).map_err(|err| err.in_element(index))?;
        vector.vector_push(item)?;
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{conn_id_type, sample_conn};
    use crate::ScriptRuntime;
    use netval_core::{Attrs, RecordType, Subnet};
    use std::rc::Rc;

    fn eval<'js>(ctx: &Ctx<'js>, source: &str) -> Value<'js> {
        ctx.eval(source).unwrap()
    }

    #[test]
    fn scalars_cross_as_primitives() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let b = bridge.wrap(&ctx, &Val::bool(true), AttrMask::ALL).unwrap();
            assert_eq!(b.as_bool(), Some(true));

            let s = bridge.wrap(&ctx, &Val::string("hello"), AttrMask::ALL).unwrap();
            assert_eq!(s.as_string().unwrap().to_string().unwrap(), "hello");

            let d = bridge.wrap(&ctx, &Val::double(1.5), AttrMask::ALL).unwrap();
            assert_eq!(d.as_number(), Some(1.5));

            let a = bridge
                .wrap(&ctx, &Val::addr("192.168.1.1".parse().unwrap()), AttrMask::ALL)
                .unwrap();
            assert_eq!(a.as_string().unwrap().to_string().unwrap(), "192.168.1.1");
        });
    }

    #[test]
    fn ints_switch_to_big_int_outside_safe_range() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let small = bridge.wrap(&ctx, &Val::int(-42), AttrMask::ALL).unwrap();
            assert_eq!(small.as_number(), Some(-42.0));

            let large = bridge.wrap(&ctx, &Val::int(i64::MIN), AttrMask::ALL).unwrap();
            assert!(large.as_big_int().is_some());
            assert_eq!(to_int(&large).unwrap(), i64::MIN);
        });
    }

    #[test]
    fn counts_cross_as_big_int() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let value = bridge.wrap(&ctx, &Val::count(u64::MAX), AttrMask::ALL).unwrap();
            assert!(value.as_big_int().is_some());
            let back = bridge
                .to_host_value(&ctx, &value, &HostType::Count.into_ptr())
                .unwrap();
            assert_eq!(back.as_count(), Some(u64::MAX));
        });
    }

    #[test]
    fn primitives_round_trip() {
        let runtime = ScriptRuntime::new().unwrap();
        let samples = [
            Val::bool(false),
            Val::int(-7),
            Val::count(80),
            Val::double(0.25),
            Val::time(1_700_000_000.5),
            Val::interval(3.0),
            Val::string("GET /"),
            Val::addr("2001:db8::1".parse().unwrap()),
            Val::subnet("10.0.0.0/8".parse().unwrap()),
            Val::port(Port::new(53, Proto::Udp)),
        ];
        runtime.with(|ctx, bridge| {
            for sample in &samples {
                let script = bridge.wrap(&ctx, sample, AttrMask::ALL).unwrap();
                let back = bridge.to_host_value(&ctx, &script, sample.ty()).unwrap();
                assert_eq!(back, *sample);
            }
        });
    }

    #[test]
    fn invalid_address_is_a_conversion_error() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let addr = HostType::Addr.into_ptr();
            let err = bridge
                .to_host_value(&ctx, &eval(&ctx, "'not-an-address'"), &addr)
                .unwrap_err();
            assert!(!err.to_string().is_empty());
            assert_eq!(
                err,
                ConversionError::InvalidLiteral {
                    expected: "IP address string".to_string(),
                    literal: "not-an-address".to_string(),
                }
            );

            let err = bridge.to_host_value(&ctx, &eval(&ctx, "({})"), &addr).unwrap_err();
            assert_eq!(err.to_string(), "expected IP address string, got object");
        });
    }

    #[test]
    fn numeric_ranges_are_enforced() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let count = HostType::Count.into_ptr();
            assert!(matches!(
                bridge.to_host_value(&ctx, &eval(&ctx, "-1"), &count),
                Err(ConversionError::OutOfRange { target: "count", .. })
            ));
            assert!(matches!(
                bridge.to_host_value(&ctx, &eval(&ctx, "1.5"), &count),
                Err(ConversionError::InvalidLiteral { .. })
            ));
            assert!(matches!(
                bridge.to_host_value(&ctx, &eval(&ctx, "2n ** 64n"), &count),
                Err(ConversionError::OutOfRange { target: "count", .. })
            ));
            assert!(matches!(
                bridge.to_host_value(&ctx, &eval(&ctx, "-(2n ** 63n) - 1n"), &HostType::Int.into_ptr()),
                Err(ConversionError::OutOfRange { target: "int", .. })
            ));
            let ok = bridge
                .to_host_value(&ctx, &eval(&ctx, "9007199254740991"), &count)
                .unwrap();
            assert_eq!(ok.as_count(), Some(MAX_SAFE_INTEGER as u64));
        });
    }

    #[test]
    fn ports_accept_strings_and_objects() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let port = HostType::Port.into_ptr();
            let from_text = bridge.to_host_value(&ctx, &eval(&ctx, "'443/tcp'"), &port).unwrap();
            assert_eq!(from_text.as_port(), Some(Port::new(443, Proto::Tcp)));

            let from_object = bridge
                .to_host_value(&ctx, &eval(&ctx, "({ port: 53, proto: 'udp' })"), &port)
                .unwrap();
            assert_eq!(from_object.as_port(), Some(Port::new(53, Proto::Udp)));

            assert!(bridge
                .to_host_value(&ctx, &eval(&ctx, "({ port: 70000, proto: 'tcp' })"), &port)
                .is_err());
        });
    }

    #[test]
    fn records_build_from_plain_objects() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let source = eval(
                &ctx,
                "({ orig_h: '10.0.0.1', orig_p: '1234/tcp', resp_h: '10.0.0.2', resp_p: { port: 80, proto: 'tcp' } })",
            );
            let id = bridge.to_host_value(&ctx, &source, &conn_id_type()).unwrap();
            assert_eq!(
                id.field_by_name("resp_p").unwrap().unwrap().as_port(),
                Some(Port::new(80, Proto::Tcp))
            );
        });
    }

    #[test]
    fn records_report_missing_and_bad_fields() {
        let runtime = ScriptRuntime::new().unwrap();
        let ty = RecordType::builder("note")
            .field("msg", HostType::String.into_ptr(), Attrs::LOG)
            .field("src", HostType::Addr.into_ptr(), Attrs::LOG | Attrs::OPTIONAL)
            .build();
        runtime.with(|ctx, bridge| {
            let err = bridge.to_host_value(&ctx, &eval(&ctx, "({})"), &ty).unwrap_err();
            assert!(matches!(err, ConversionError::MissingField { .. }));

            let err = bridge
                .to_host_value(&ctx, &eval(&ctx, "({ msg: 'x', src: 'nope' })"), &ty)
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "field 'src': expected IP address string, got 'nope'"
            );

            let ok = bridge
                .to_host_value(&ctx, &eval(&ctx, "({ msg: 'x' })"), &ty)
                .unwrap();
            assert_eq!(ok.field_by_name("src").unwrap(), None);
        });
    }

    #[test]
    fn wrapped_values_pass_through_without_copy() {
        let runtime = ScriptRuntime::new().unwrap();
        let conn = sample_conn();
        runtime.with(|ctx, bridge| {
            let proxy = bridge.wrap(&ctx, &conn, AttrMask::ALL).unwrap();
            let back = bridge.to_host_value(&ctx, &proxy, conn.ty()).unwrap();
            assert!(Rc::ptr_eq(&back, &conn));
        });
    }

    #[test]
    fn tables_sets_and_vectors_from_script() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.with(|ctx, bridge| {
            let table_ty =
                HostType::table(HostType::Subnet.into_ptr(), HostType::String.into_ptr()).unwrap();
            let table = bridge
                .to_host_value(&ctx, &eval(&ctx, "({ '10.0.0.0/8': 'lan' })"), &table_ty)
                .unwrap();
            let key = Val::subnet("10.0.0.0/8".parse::<Subnet>().unwrap());
            assert_eq!(table.table_lookup(&key).unwrap().unwrap().as_str(), Some("lan"));

            let set_ty = HostType::set(HostType::Count.into_ptr()).unwrap();
            let set = bridge
                .to_host_value(&ctx, &eval(&ctx, "[1, 2n, '3']"), &set_ty)
                .unwrap();
            assert_eq!(set.table_len().unwrap(), 3);

            let vec_ty = HostType::vector(HostType::String.into_ptr());
            let err = bridge
                .to_host_value(&ctx, &eval(&ctx, "['a', 1]"), &vec_ty)
                .unwrap_err();
            assert_eq!(err.to_string(), "element 1: expected string, got int");
        });
    }

    #[test]
    fn vectors_become_arrays() {
        let runtime = ScriptRuntime::new().unwrap();
        let ty = HostType::vector(HostType::String.into_ptr());
        let vector = Val::vector(&ty).unwrap();
        vector.vector_push(Val::string("a")).unwrap();
        vector.vector_push(Val::string("b")).unwrap();
        runtime.with(|ctx, bridge| {
            let array = bridge.wrap(&ctx, &vector, AttrMask::ALL).unwrap();
            ctx.globals().set("v", array).unwrap();
            let joined: String = ctx.eval("globalThis.v.join(',')").unwrap();
            assert_eq!(joined, "a,b");
        });
    }

    #[test]
    fn snapshots_keep_large_integers_exact() {
        let runtime = ScriptRuntime::new().unwrap();
        let ty = RecordType::builder("totals")
            .field("small", HostType::Count.into_ptr(), Attrs::LOG)
            .field("large", HostType::Count.into_ptr(), Attrs::LOG)
            .field("negative", HostType::Int.into_ptr(), Attrs::LOG)
            .build();
        let totals = Val::record(&ty).unwrap();
        totals.set_field_by_name("small", Some(Val::count(MAX_SAFE_INTEGER as u64))).unwrap();
        totals.set_field_by_name("large", Some(Val::count(u64::MAX - 1))).unwrap();
        totals.set_field_by_name("negative", Some(Val::int(i64::MIN))).unwrap();
        runtime.expose("totals", &totals, AttrMask::ALL).unwrap();

        let json = runtime.evaluate("totals").unwrap();
        assert_eq!(json["small"], serde_json::json!(9_007_199_254_740_991u64));
        assert_eq!(json["large"], serde_json::json!("18446744073709551614"));
        assert_eq!(json["negative"], serde_json::json!("-9223372036854775808"));
    }

    #[test]
    fn keys_parse_from_property_names() {
        let addr = HostType::Addr.into_ptr();
        assert_eq!(
            key_from_name("10.1.1.1", &addr).unwrap().as_addr(),
            Some("10.1.1.1".parse().unwrap())
        );
        assert!(key_from_name("nope", &addr).is_err());
        let count = HostType::Count.into_ptr();
        assert_eq!(key_from_index(7, &count).unwrap().as_count(), Some(7));
        let string = HostType::String.into_ptr();
        assert_eq!(key_from_index(7, &string).unwrap().as_str(), Some("7"));
        let flag = HostType::Bool.into_ptr();
        assert_eq!(key_from_name("T", &flag).unwrap().as_bool(), Some(true));
    }
}
