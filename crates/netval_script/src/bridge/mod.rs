//! Host value bridge
//!
//! Exposes host values to scripts and converts script values back.
//!
//! ## Architecture
//!
//! - **Conversion:** scalars cross as JS primitives; records and tables cross
//!   as lazy `Proxy` objects that read and write the live host value
//! - **Wraps:** each proxy targets a [`ValueWrap`] class instance holding one
//!   host reference, released when the engine collects it
//! - **Caches:** record field offsets and small BigInts, owned per bridge
//!
//! A bridge belongs to one context and holds persistent engine handles, so it
//! must be dropped before the runtime it was created in. Only
//! [`crate::ScriptRuntime`] creates and owns bridges; callers get borrows
//! bound to the runtime, and wraps reach their bridge through a `Weak`.

mod bigint;
mod callbacks;
mod convert;
mod offsets;
mod wrap;

pub use bigint::CACHE_RANGE;
pub use convert::MAX_SAFE_INTEGER;
pub use offsets::FieldOffsetCache;
pub use wrap::{ProxyKind, ValueWrap, WrapState};

use crate::error::ConversionError;
use netval_core::{AttrMask, TypePtr, ValPtr};
use rquickjs::class::JsClass;
use rquickjs::function::Constructor;
use rquickjs::{BigInt, Class, Ctx, Function, Object, Persistent, Symbol, Value};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use bigint::BigIntCache;
use wrap::wrap_class;

/// Engine objects shared by every proxy of one bridge.
struct Templates {
    proxy: Persistent<Constructor<'static>>,
    handler: Persistent<Object<'static>>,
    tag: Persistent<Symbol<'static>>,
}

impl Templates {
    fn new<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Self> {
        let globals = ctx.globals();
        let proxy: Constructor = globals.get("Proxy")?;
        let symbol: Function = globals.get("Symbol")?;
        let tag: Symbol = symbol.call((ValueWrap::NAME,))?;
        Ok(Self {
            proxy: Persistent::save(ctx, proxy),
            handler: Persistent::save(ctx, callbacks::handler(ctx)?),
            tag: Persistent::save(ctx, tag),
        })
    }
}

#[derive(Default)]
pub(crate) struct StatCells {
    created: Cell<u64>,
    released: Cell<u64>,
}

impl StatCells {
    pub(crate) fn wrap_created(&self) {
        self.created.set(self.created.get() + 1);
    }

    pub(crate) fn wrap_released(&self) {
        self.released.set(self.released.get() + 1);
    }
}

/// Snapshot of a bridge's counters.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BridgeStats {
    pub wraps_created: u64,
    pub wraps_released: u64,
    pub cached_record_types: usize,
    pub cached_big_ints: usize,
}

impl BridgeStats {
    pub fn live_wraps(&self) -> u64 {
        self.wraps_created - self.wraps_released
    }
}

pub(crate) struct BridgeInner {
    templates: Templates,
    offsets: RefCell<FieldOffsetCache>,
    ints: RefCell<BigIntCache>,
    pub(crate) stats: StatCells,
}

/// Converts between host values and script values for one context.
///
/// Not `Clone`: the only owner is the [`crate::ScriptRuntime`], and a handle
/// cannot outlive it.
///
/// ```compile_fail
/// let runtime = netval_script::ScriptRuntime::new().unwrap();
/// let bridge = runtime.bridge();
/// drop(runtime);
/// bridge.stats();
/// ```
pub struct ValueBridge {
    inner: Rc<BridgeInner>,
}

impl ValueBridge {
    pub(crate) fn new(ctx: &Ctx<'_>) -> rquickjs::Result<Self> {
        Ok(Self {
            inner: Rc::new(BridgeInner {
                templates: Templates::new(ctx)?,
                offsets: RefCell::new(FieldOffsetCache::new()),
                ints: RefCell::new(BigIntCache::new()),
                stats: StatCells::default(),
            }),
        })
    }

    pub(crate) fn upgrade(weak: &Weak<BridgeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Script value for `value`. Records and tables become proxies that
    /// expose only fields passing `mask`.
    pub fn wrap<'js>(
        &self,
        ctx: &Ctx<'js>,
        value: &ValPtr,
        mask: AttrMask,
    ) -> rquickjs::Result<Value<'js>> {
        convert::to_script(self, ctx, value, mask)
    }

    /// Wrap `value` in a new [`ValueWrap`]. Records and tables get a proxy
    /// around it; any other value gets the bare wrap object, which scripts
    /// can only pass back.
    pub fn wrap_as_object<'js>(
        &self,
        ctx: &Ctx<'js>,
        value: &ValPtr,
        mask: AttrMask,
    ) -> rquickjs::Result<Object<'js>> {
        let wrap = ValueWrap::new(value.clone(), mask, Rc::downgrade(&self.inner));
        let kind = wrap.kind();
        let class = Class::instance(ctx.clone(), wrap)?;
        class.borrow().mark_live();
        tracing::trace!("wrapped {} as {:?}", value.ty(), kind);

        let target = class.into_inner();
        if kind == ProxyKind::Opaque {
            return Ok(target);
        }
        let handler = self.inner.templates.handler.clone().restore(ctx)?;
        let proxy = self.inner.templates.proxy.clone().restore(ctx)?;
        proxy.construct((target, handler))
    }

    /// The wrap behind `object` if this bridge produced it. Works on proxies
    /// and on bare wrap objects.
    pub fn unwrap<'js>(&self, object: &Object<'js>) -> Option<Class<'js, ValueWrap>> {
        let class = match wrap_class(object) {
            Some(class) => class,
            None => {
                let tag = self.inner.templates.tag.clone().restore(object.ctx()).ok()?;
                let target = match object.get::<_, Option<Object>>(tag.into_value()) {
                    Ok(target) => target?,
                    Err(_) => {
                        let _ = object.ctx().catch();
                        return None;
                    }
                };
                wrap_class(&target)?
            }
        };
        let owned = class.borrow().belongs_to(Rc::as_ptr(&self.inner));
        owned.then_some(class)
    }

    /// Host value behind a wrapped `object`.
    pub fn unwrap_value(&self, object: &Object<'_>) -> Option<ValPtr> {
        let class = self.unwrap(object)?;
        let value = class.borrow().value().cloned();
        value
    }

    /// Convert `value` to a host value of type `target`.
    pub fn to_host_value<'js>(
        &self,
        ctx: &Ctx<'js>,
        value: &Value<'js>,
        target: &TypePtr,
    ) -> Result<ValPtr, ConversionError> {
        convert::to_host(self, ctx, value, target)
            .inspect_err(|err| tracing::debug!("conversion to {} failed: {}", target, err))
    }

    pub fn record_field_offset(&self, ty: &TypePtr, field: &str) -> Option<usize> {
        self.inner.offsets.borrow_mut().lookup(ty, field)
    }

    pub fn big_int<'js>(&self, ctx: &Ctx<'js>, value: u64) -> rquickjs::Result<BigInt<'js>> {
        self.inner.ints.borrow_mut().get(ctx, value)
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            wraps_created: self.inner.stats.created.get(),
            wraps_released: self.inner.stats.released.get(),
            cached_record_types: self.inner.offsets.borrow().len(),
            cached_big_ints: self.inner.ints.borrow().len(),
        }
    }

    /// Whether `key` is this bridge's private tag.
    pub(crate) fn is_tag<'js>(&self, ctx: &Ctx<'js>, key: &Value<'js>) -> rquickjs::Result<bool> {
        if !key.is_symbol() {
            return Ok(false);
        }
        let tag = self.inner.templates.tag.clone().restore(ctx)?;
        Ok(tag.as_value() == key)
    }
}
