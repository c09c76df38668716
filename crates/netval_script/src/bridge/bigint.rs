//! Unsigned integer bridge
//!
//! Counts are 64-bit unsigned and can exceed the range a JS number holds
//! exactly, so they cross as BigInt. Small values are frequent (ports,
//! packet counts, flags) and are memoized per context.

use rquickjs::{BigInt, Ctx, Persistent};
use std::collections::HashMap;

/// Values below this bound are cached.
pub const CACHE_RANGE: u64 = 1 << 16;

#[derive(Default)]
pub(crate) struct BigIntCache {
    entries: HashMap<u16, Persistent<BigInt<'static>>>,
}

impl BigIntCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// BigInt for `value`. Cached values are built on first request and
    /// kept for the life of the cache; larger values are built fresh.
    pub fn get<'js>(&mut self, ctx: &Ctx<'js>, value: u64) -> rquickjs::Result<BigInt<'js>> {
        if value >= CACHE_RANGE {
            return BigInt::from_u64(ctx.clone(), value);
        }
        let slot = value as u16;
        if let Some(cached) = self.entries.get(&slot) {
            return cached.clone().restore(ctx);
        }
        let fresh = BigInt::from_u64(ctx.clone(), value)?;
        self.entries.insert(slot, Persistent::save(ctx, fresh.clone()));
        Ok(fresh)
    }

    /// Number of materialized entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
