//! Value wraps
//!
//! A [`ValueWrap`] is the Rust half of every object the bridge hands to a
//! script. It lives inside a QuickJS class instance, which is also the target
//! of the proxy built around it, and holds one reference to the host value.
//! The engine finalizes the class instance once nothing in the script heap
//! reaches it; that finalizer is the only place a wrap is released.
//!
//! Lifecycle:
//! ```text
//! Constructed --(attached to a class instance)--> Live --(finalized)--> Released
//! ```
//! Release happens at most once. The finalizer runs inside the garbage
//! collector, so it touches only Rust state: it drops the host reference and
//! updates the owning bridge's counters.

use super::BridgeInner;
use netval_core::{AttrMask, HostType, ValPtr};
use rquickjs::class::{JsClass, Readable, Trace, Tracer};
use rquickjs::{Class, Ctx, JsLifetime, Object};
use std::cell::Cell;
use std::rc::Weak;

/// Which proxy handler a wrapped value is served by.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProxyKind {
    Record,
    /// Tables and sets.
    Table,
    /// No proxy; the class instance itself is handed out.
    Opaque,
}

impl ProxyKind {
    pub fn of(ty: &HostType) -> Self {
        match ty {
            HostType::Record(_) => ProxyKind::Record,
            HostType::Table(_) => ProxyKind::Table,
            _ => ProxyKind::Opaque,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WrapState {
    Constructed,
    Live,
    Released,
}

pub struct ValueWrap {
    value: Option<ValPtr>,
    mask: AttrMask,
    kind: ProxyKind,
    state: Cell<WrapState>,
    bridge: Weak<BridgeInner>,
}

impl ValueWrap {
    pub(crate) fn new(value: ValPtr, mask: AttrMask, bridge: Weak<BridgeInner>) -> Self {
        let kind = ProxyKind::of(value.ty());
        Self {
            value: Some(value),
            mask,
            kind,
            state: Cell::new(WrapState::Constructed),
            bridge,
        }
    }

    /// The wrapped host value. Always present while the wrap is reachable.
    pub fn value(&self) -> Option<&ValPtr> {
        self.value.as_ref()
    }

    pub fn mask(&self) -> AttrMask {
        self.mask
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn state(&self) -> WrapState {
        self.state.get()
    }

    pub(crate) fn bridge(&self) -> &Weak<BridgeInner> {
        &self.bridge
    }

    /// Whether this wrap was produced by the bridge behind `inner`.
    pub(crate) fn belongs_to(&self, inner: *const BridgeInner) -> bool {
        std::ptr::eq(self.bridge.as_ptr(), inner)
    }

    pub(crate) fn mark_live(&self) {
        if self.state.get() == WrapState::Constructed {
            self.state.set(WrapState::Live);
            if let Some(bridge) = self.bridge.upgrade() {
                bridge.stats.wrap_created();
            }
        }
    }

    /// Drop the host reference. Returns false if already released.
    fn release(&mut self) -> bool {
        let previous = self.state.replace(WrapState::Released);
        if previous == WrapState::Released {
            return false;
        }
        if let Some(value) = self.value.take() {
            tracing::trace!("releasing wrap of {}", value.ty());
        }
        if previous == WrapState::Live {
            if let Some(bridge) = self.bridge.upgrade() {
                bridge.stats.wrap_released();
            }
        }
        true
    }
}

impl Drop for ValueWrap {
    fn drop(&mut self) {
        self.release();
    }
}

// A wrap holds no script values, so there is nothing to trace.
impl<'js> Trace<'js> for ValueWrap {
    fn trace<'a>(&self, _tracer: Tracer<'a, 'js>) {}
}

unsafe impl<'js> JsLifetime<'js> for ValueWrap {
    type Changed<'to> = ValueWrap;
}

impl<'js> JsClass<'js> for ValueWrap {
    const NAME: &'static str = "HostValue";

    type Mutable = Readable;

    fn constructor(_ctx: &Ctx<'js>) -> rquickjs::Result<Option<rquickjs::function::Constructor<'js>>> {
        Ok(None)
    }
}

/// The wrap class behind `object`, if it is one.
///
/// QuickJS raises a TypeError when an object of another class is probed, so
/// that exception is cleared before returning `None`.
pub(crate) fn wrap_class<'js>(object: &Object<'js>) -> Option<Class<'js, ValueWrap>> {
    let class = Class::<ValueWrap>::from_object(object);
    if class.is_none() {
        let _ = object.ctx().catch();
    }
    class
}
