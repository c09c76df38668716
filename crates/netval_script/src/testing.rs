//! Shared fixtures for bridge tests

use netval_core::{Attrs, HostType, Port, Proto, RecordType, TypePtr, Val, ValPtr};

pub(crate) fn conn_id_type() -> TypePtr {
    RecordType::builder("conn_id")
        .field("orig_h", HostType::Addr.into_ptr(), Attrs::LOG)
        .field("orig_p", HostType::Port.into_ptr(), Attrs::LOG)
        .field("resp_h", HostType::Addr.into_ptr(), Attrs::LOG)
        .field("resp_p", HostType::Port.into_ptr(), Attrs::LOG)
        .build()
}

/// `ts`, `id` and `uid` are required; `history` and `tags` are not logged.
pub(crate) fn conn_type() -> TypePtr {
    let tags = HostType::set(HostType::String.into_ptr()).unwrap();
    RecordType::builder("Conn::Info")
        .field("ts", HostType::Time.into_ptr(), Attrs::LOG)
        .field("id", conn_id_type(), Attrs::LOG)
        .field("uid", HostType::String.into_ptr(), Attrs::LOG)
        .field("service", HostType::String.into_ptr(), Attrs::LOG | Attrs::OPTIONAL)
        .field("orig_bytes", HostType::Count.into_ptr(), Attrs::LOG | Attrs::OPTIONAL)
        .field("history", HostType::String.into_ptr(), Attrs::OPTIONAL)
        .field("tags", tags, Attrs::OPTIONAL)
        .build()
}

pub(crate) fn sample_id() -> ValPtr {
    let id = Val::record(&conn_id_type()).unwrap();
    id.set_field_by_name("orig_h", Some(Val::addr("10.0.0.1".parse().unwrap())))
        .unwrap();
    id.set_field_by_name("orig_p", Some(Val::port(Port::new(49152, Proto::Tcp))))
        .unwrap();
    id.set_field_by_name("resp_h", Some(Val::addr("192.168.1.1".parse().unwrap())))
        .unwrap();
    id.set_field_by_name("resp_p", Some(Val::port(Port::new(80, Proto::Tcp))))
        .unwrap();
    id
}

/// A connection with every required field set, `service` and `history`
/// set, `orig_bytes` unset and one tag.
pub(crate) fn sample_conn() -> ValPtr {
    let ty = conn_type();
    let conn = Val::record(&ty).unwrap();
    conn.set_field_by_name("ts", Some(Val::time(1_700_000_000.25))).unwrap();
    conn.set_field_by_name("id", Some(sample_id())).unwrap();
    conn.set_field_by_name("uid", Some(Val::string("CHhAvVGS1DHFjwGM9")))
        .unwrap();
    conn.set_field_by_name("service", Some(Val::string("http"))).unwrap();
    conn.set_field_by_name("history", Some(Val::string("ShADadFf"))).unwrap();

    let tags_ty = ty.as_record().unwrap().field(6).unwrap().ty.clone();
    let tags = Val::table(&tags_ty).unwrap();
    tags.table_assign(Val::string("web"), None).unwrap();
    conn.set_field_by_name("tags", Some(tags)).unwrap();
    conn
}

/// `table[addr] of count` with two entries.
pub(crate) fn sample_counts() -> ValPtr {
    let ty = HostType::table(HostType::Addr.into_ptr(), HostType::Count.into_ptr()).unwrap();
    let counts = Val::table(&ty).unwrap();
    counts
        .table_assign(Val::addr("10.0.0.1".parse().unwrap()), Some(Val::count(3)))
        .unwrap();
    counts
        .table_assign(Val::addr("10.0.0.2".parse().unwrap()), Some(Val::count(5)))
        .unwrap();
    counts
}
