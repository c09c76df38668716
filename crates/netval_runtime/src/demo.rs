//! Demo connection record handed to scripts by the `netval` binary

use anyhow::Result;
use netval_core::{Attrs, HostType, Port, Proto, RecordType, TypePtr, Val, ValPtr};

pub fn conn_type() -> Result<TypePtr> {
    let id = RecordType::builder("conn_id")
        .field("orig_h", HostType::Addr.into_ptr(), Attrs::LOG)
        .field("orig_p", HostType::Port.into_ptr(), Attrs::LOG)
        .field("resp_h", HostType::Addr.into_ptr(), Attrs::LOG)
        .field("resp_p", HostType::Port.into_ptr(), Attrs::LOG)
        .build();
    let state = HostType::enumeration("Conn::State", ["S0", "S1", "SF", "REJ"]);
    Ok(RecordType::builder("Conn::Info")
        .field("ts", HostType::Time.into_ptr(), Attrs::LOG)
        .field("uid", HostType::String.into_ptr(), Attrs::LOG)
        .field("id", id, Attrs::LOG)
        .field("duration", HostType::Interval.into_ptr(), Attrs::LOG | Attrs::OPTIONAL)
        .field("orig_bytes", HostType::Count.into_ptr(), Attrs::LOG | Attrs::OPTIONAL)
        .field("conn_state", state, Attrs::LOG | Attrs::OPTIONAL)
        .field("history", HostType::String.into_ptr(), Attrs::OPTIONAL)
        .field(
            "tags",
            HostType::set(HostType::String.into_ptr())?,
            Attrs::LOG | Attrs::OPTIONAL,
        )
        .field(
            "bytes_by_host",
            HostType::table(HostType::Addr.into_ptr(), HostType::Count.into_ptr())?,
            Attrs::OPTIONAL,
        )
        .build())
}

fn field_type(ty: &TypePtr, name: &str) -> Option<TypePtr> {
    let record = ty.as_record()?;
    let offset = record.field_offset(name)?;
    record.field(offset).map(|decl| decl.ty.clone())
}

pub fn sample_conn() -> Result<ValPtr> {
    let ty = conn_type()?;
    let conn = Val::record(&ty)?;

    let id_ty = field_type(&ty, "id").ok_or_else(|| anyhow::anyhow!("conn has no id"))?;
    let id = Val::record(&id_ty)?;
    id.set_field_by_name("orig_h", Some(Val::addr("10.0.0.7".parse()?)))?;
    id.set_field_by_name("orig_p", Some(Val::port(Port::new(51234, Proto::Tcp))))?;
    id.set_field_by_name("resp_h", Some(Val::addr("93.184.216.34".parse()?)))?;
    id.set_field_by_name("resp_p", Some(Val::port(Port::new(443, Proto::Tcp))))?;

    conn.set_field_by_name("ts", Some(Val::time(1_700_000_000.5)))?;
    conn.set_field_by_name("uid", Some(Val::string("CjhGID4nQcgTWjvg4c")))?;
    conn.set_field_by_name("id", Some(id))?;
    conn.set_field_by_name("duration", Some(Val::interval(2.75)))?;
    conn.set_field_by_name("orig_bytes", Some(Val::count(1834)))?;
    let state_ty =
        field_type(&ty, "conn_state").ok_or_else(|| anyhow::anyhow!("conn has no conn_state"))?;
    conn.set_field_by_name("conn_state", Some(Val::enum_val(&state_ty, "SF")?))?;
    conn.set_field_by_name("history", Some(Val::string("ShADadFf")))?;

    let tags_ty = field_type(&ty, "tags").ok_or_else(|| anyhow::anyhow!("conn has no tags"))?;
    let tags = Val::table(&tags_ty)?;
    tags.table_assign(Val::string("tls"), None)?;
    conn.set_field_by_name("tags", Some(tags))?;

    let hosts_ty = field_type(&ty, "bytes_by_host")
        .ok_or_else(|| anyhow::anyhow!("conn has no bytes_by_host"))?;
    let hosts = Val::table(&hosts_ty)?;
    hosts.table_assign(Val::addr("10.0.0.7".parse()?), Some(Val::count(1834)))?;
    hosts.table_assign(Val::addr("93.184.216.34".parse()?), Some(Val::count(5120)))?;
    conn.set_field_by_name("bytes_by_host", Some(hosts))?;

    Ok(conn)
}
