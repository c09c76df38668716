//! Script runtime management
//!
//! Owns one QuickJS runtime, one context and the value bridge bound to it.

use crate::bridge::ValueBridge;
use crate::error::ScriptError;
use crate::settings::BridgeSettings;
use netval_core::{AttrMask, TypePtr, ValPtr};
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Function, Runtime, Value};
use std::path::Path;

/// Script execution context
pub struct ScriptRuntime {
    // Field order is drop order: the bridge holds persistent handles that
    // must be released before the runtime goes away.
    bridge: ValueBridge,
    context: Context,
    runtime: Runtime,
    settings: BridgeSettings,
}

fn caught(err: CaughtError<'_>) -> ScriptError {
    match err {
        CaughtError::Error(err) => ScriptError::Engine(err),
        other => ScriptError::Exception(other.to_string()),
    }
}

fn parse_result(text: &str) -> Result<serde_json::Value, ScriptError> {
    serde_json::from_str(text).map_err(ScriptError::ResultJson)
}

impl ScriptRuntime {
    pub fn new() -> Result<Self, ScriptError> {
        Self::with_settings(BridgeSettings::default())
    }

    pub fn with_settings(settings: BridgeSettings) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()?;
        let engine = &settings.engine;
        if let Some(limit) = engine.memory_limit_bytes {
            runtime.set_memory_limit(limit);
        }
        if let Some(threshold) = engine.gc_threshold_bytes {
            runtime.set_gc_threshold(threshold);
        }
        if let Some(stack) = engine.max_stack_size_bytes {
            runtime.set_max_stack_size(stack);
        }

        let context = Context::full(&runtime)?;
        let bridge = context.with(|ctx| ValueBridge::new(&ctx))?;
        tracing::debug!(
            "script runtime ready (memory limit {:?}, loggable only {})",
            engine.memory_limit_bytes,
            settings.exposure.loggable_only
        );

        Ok(Self {
            bridge,
            context,
            runtime,
            settings,
        })
    }

    pub fn bridge(&self) -> &ValueBridge {
        &self.bridge
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Run `f` inside the context with access to the bridge.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: for<'js> FnOnce(Ctx<'js>, &ValueBridge) -> R,
    {
        self.context.with(|ctx| f(ctx, &self.bridge))
    }

    pub fn execute_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.execute(&source)
    }

    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            ctx.eval::<(), _>(source).catch(&ctx).map_err(caught)
        })
    }

    /// Evaluate `source` and return its completion value as JSON.
    ///
    /// Wrapped records and tables serialize through their `toJSON` snapshot.
    /// `undefined` and functions come back as `null`.
    pub fn evaluate(&self, source: &str) -> Result<serde_json::Value, ScriptError> {
        let text = self.context.with(|ctx| {
            let value: Value = ctx.eval(source).catch(&ctx).map_err(caught)?;
            let text = ctx.json_stringify(value).catch(&ctx).map_err(caught)?;
            text.map(|text| text.to_string())
                .transpose()
                .map_err(ScriptError::Engine)
        })?;
        match text {
            Some(text) => parse_result(&text),
            None => Ok(serde_json::Value::Null),
        }
    }

    /// Convert the global `name` to a host value of type `ty`.
    ///
    /// A proxy over a host value of that type yields the same host value.
    pub fn read_global(&self, name: &str, ty: &TypePtr) -> Result<ValPtr, ScriptError> {
        self.context.with(|ctx| {
            let value: Value = ctx.globals().get(name)?;
            Ok(self.bridge.to_host_value(&ctx, &value, ty)?)
        })
    }

    /// Call a JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            let func: Function = ctx.globals().get(name)?;
            func.call::<_, ()>(()).catch(&ctx).map_err(caught)
        })
    }

    /// Bind `value` to the global `name` with an explicit attribute mask.
    pub fn expose(&self, name: &str, value: &ValPtr, mask: AttrMask) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            let script = self.bridge.wrap(&ctx, value, mask)?;
            ctx.globals().set(name, script)?;
            tracing::debug!("exposed {} as '{}'", value.ty(), name);
            Ok(())
        })
    }

    /// Bind `value` to the global `name` using the configured default mask.
    pub fn expose_default(&self, name: &str, value: &ValPtr) -> Result<(), ScriptError> {
        self.expose(name, value, self.settings.default_mask())
    }

    /// Force a full collection. Unreachable wraps release their host
    /// references before this returns.
    pub fn run_gc(&self) {
        self.runtime.run_gc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{conn_id_type, sample_conn};
    use serde_json::json;

    #[test]
    fn execute_reports_exceptions() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime.execute("globalThis.answer = 42;").unwrap();
        let err = runtime.execute("throw new TypeError('boom')").unwrap_err();
        assert!(matches!(err, ScriptError::Exception(ref msg) if msg.contains("boom")));
    }

    #[test]
    fn evaluate_returns_json() {
        let runtime = ScriptRuntime::new().unwrap();
        assert_eq!(runtime.evaluate("({ a: [1, 'x'] })").unwrap(), json!({ "a": [1, "x"] }));
        assert_eq!(runtime.evaluate("undefined").unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn malformed_results_are_not_settings_errors() {
        let err = parse_result("{ not json").unwrap_err();
        assert!(matches!(err, ScriptError::ResultJson(_)));
        assert!(err.to_string().starts_with("script result is not valid JSON"));

        let err = BridgeSettings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ScriptError::Settings(_)));
    }

    #[test]
    fn read_global_converts_script_values() {
        let runtime = ScriptRuntime::new().unwrap();
        let conn = sample_conn();
        runtime.expose("conn", &conn, AttrMask::ALL).unwrap();
        runtime
            .execute("globalThis.endpoint = { orig_h: '10.1.1.1', orig_p: '22/tcp', resp_h: '10.1.1.2', resp_p: '2222/tcp' };")
            .unwrap();

        let same = runtime.read_global("conn", conn.ty()).unwrap();
        assert!(std::rc::Rc::ptr_eq(&same, &conn));

        let id = runtime.read_global("endpoint", &conn_id_type()).unwrap();
        assert_eq!(
            id.field_by_name("orig_h").unwrap().unwrap().to_string(),
            "10.1.1.1"
        );

        runtime.execute("endpoint.orig_h = 'nowhere';").unwrap();
        let err = runtime.read_global("endpoint", &conn_id_type()).unwrap_err();
        assert!(matches!(err, ScriptError::Conversion(_)));
        assert!(err.to_string().contains("field 'orig_h'"));
    }

    #[test]
    fn call_function_runs_globals() {
        let runtime = ScriptRuntime::new().unwrap();
        runtime
            .execute("globalThis.hits = 0; function bump() { hits += 1; }")
            .unwrap();
        runtime.call_function("bump").unwrap();
        runtime.call_function("bump").unwrap();
        assert_eq!(runtime.evaluate("hits").unwrap(), json!(2));
        assert!(runtime.call_function("missing").is_err());
    }

    #[test]
    fn execute_file_reports_missing_path() {
        let runtime = ScriptRuntime::new().unwrap();
        let err = runtime
            .execute_file(Path::new("/nonexistent/netval/script.js"))
            .unwrap_err();
        assert!(matches!(err, ScriptError::Io { .. }));
    }

    #[test]
    fn expose_default_honors_loggable_only() {
        let settings =
            BridgeSettings::from_json(r#"{ "exposure": { "loggable_only": true } }"#).unwrap();
        let runtime = ScriptRuntime::with_settings(settings).unwrap();
        runtime.expose_default("conn", &sample_conn()).unwrap();
        let keys = runtime.evaluate("Object.keys(conn)").unwrap();
        assert_eq!(keys, json!(["ts", "id", "uid", "service", "orig_bytes"]));
        assert_eq!(runtime.evaluate("conn.history").unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn memory_limit_is_applied() {
        let settings = BridgeSettings::from_json(
            r#"{ "engine": { "memory_limit_bytes": 4194304 } }"#,
        )
        .unwrap();
        let runtime = ScriptRuntime::with_settings(settings).unwrap();
        let result = runtime.execute("let a = []; for (;;) a.push(new Array(10000).fill(1));");
        assert!(result.is_err());
    }
}
