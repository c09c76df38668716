//! Netval Scripting Bridge
//!
//! Hands host values to JavaScript running in QuickJS and converts script
//! values back into typed host values.
//!
//! ## Architecture
//!
//! - **Bridge:** [`ValueBridge`] maps host values to script values; records
//!   and tables become lazy proxies over the live host value
//! - **Runtime:** [`ScriptRuntime`] owns the engine, one context and its bridge
//! - **Settings:** [`BridgeSettings`] carries engine limits and the default
//!   exposure mask, loadable from JSON

pub mod bridge;
pub mod error;
pub mod runtime;
pub mod settings;

#[cfg(test)]
mod testing;

pub use bridge::{BridgeStats, ProxyKind, ValueBridge, ValueWrap, WrapState};
pub use error::{ConversionError, ScriptError};
pub use runtime::ScriptRuntime;
pub use settings::{BridgeSettings, EngineSettings, ExposureSettings};

pub use rquickjs;
