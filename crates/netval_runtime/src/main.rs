//! Netval Runtime
//!
//! Minimal binary that exposes a demo connection record to a script
//!
//! Usage: `netval [--settings <path>] <script.js>`

mod demo;

use anyhow::{bail, Context as _, Result};
use netval_script::rquickjs::function::Rest;
use netval_script::rquickjs::{Coerced, Function, Object};
use netval_script::{BridgeSettings, ScriptRuntime};
use std::path::PathBuf;

struct Args {
    settings: Option<PathBuf>,
    script: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut settings = None;
    let mut script = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let path = args.next().context("--settings needs a path")?;
                settings = Some(PathBuf::from(path));
            }
            _ if script.is_none() => script = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument '{}'", arg),
        }
    }
    let script = script.context("usage: netval [--settings <path>] <script.js>")?;
    Ok(Args { settings, script })
}

/// Route `console.log` to tracing.
fn install_console(runtime: &ScriptRuntime) -> Result<()> {
    runtime.with(|ctx, _bridge| {
        let console = Object::new(ctx.clone())?;
        let log = Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            let line: Vec<String> = args.0.into_iter().map(|arg| arg.0).collect();
            tracing::info!(target: "script", "{}", line.join(" "));
        })?;
        console.set("log", log)?;
        ctx.globals().set("console", console)?;
        Ok::<_, netval_script::rquickjs::Error>(())
    })?;
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Netval v{}", netval_core::VERSION);
    let args = parse_args()?;

    let settings = match &args.settings {
        Some(path) => BridgeSettings::load(path)?,
        None => BridgeSettings::default(),
    };
    let runtime = ScriptRuntime::with_settings(settings)?;
    install_console(&runtime)?;

    let conn = demo::sample_conn()?;
    runtime.expose_default("conn", &conn)?;

    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read {}", args.script.display()))?;
    let result = runtime.evaluate(&source)?;
    tracing::info!("script result: {}", serde_json::to_string_pretty(&result)?);

    tracing::info!("conn after script: {}", conn);
    runtime.run_gc();
    let stats = runtime.bridge().stats();
    tracing::info!(
        "wraps created {}, released {}, live {}",
        stats.wraps_created,
        stats.wraps_released,
        stats.live_wraps()
    );

    Ok(())
}
