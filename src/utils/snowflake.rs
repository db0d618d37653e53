//! Connection id allocation
//!
//! Ids are snowflake-style: milliseconds since a configurable epoch in the
//! high bits, then a 10-bit node id, then a 12-bit per-millisecond sequence.

use chrono::{NaiveDate, Utc};
use std::sync::{Mutex, PoisonError};

use crate::error::ServerError;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

/// 2022-07-07T00:00:00Z
pub const DEFAULT_EPOCH_MS: i64 = 1_657_152_000_000;
pub const DEFAULT_NODE_ID: u16 = 1;

/// Source of connection ids. Must be safe to call from any task.
pub trait IdAllocator: Send + Sync {
    fn next_id(&self) -> i64;
}

struct State {
    last_ms: i64,
    sequence: i64,
}

pub struct Snowflake {
    epoch_ms: i64,
    node: i64,
    state: Mutex<State>,
}

impl Snowflake {
    pub fn new(epoch_ms: i64, node: u16) -> Result<Self, ServerError> {
        if node > MAX_NODE_ID {
            return Err(ServerError::InvalidConfig(format!(
                "node id {} exceeds {}",
                node, MAX_NODE_ID
            )));
        }
        if epoch_ms > Utc::now().timestamp_millis() {
            return Err(ServerError::InvalidConfig(
                "id epoch cannot be in the future".into(),
            ));
        }

        Ok(Self {
            epoch_ms,
            node: i64::from(node),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    /// Builds a generator from an epoch given as `YYYY-MM-DD` (UTC midnight).
    pub fn from_date(epoch: &str, node: u16) -> Result<Self, ServerError> {
        Self::new(parse_epoch(epoch)?, node)
    }

    pub fn node(&self) -> u16 {
        self.node as u16
    }

    fn elapsed_ms(&self) -> i64 {
        Utc::now().timestamp_millis() - self.epoch_ms
    }
}

impl Default for Snowflake {
    fn default() -> Self {
        Self {
            epoch_ms: DEFAULT_EPOCH_MS,
            node: i64::from(DEFAULT_NODE_ID),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }
}

impl IdAllocator for Snowflake {
    fn next_id(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let mut now = self.elapsed_ms();
        if now <= state.last_ms {
            // Same millisecond, or the wall clock stepped back.
            now = state.last_ms;
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                now += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        (now << (NODE_BITS + SEQUENCE_BITS)) | (self.node << SEQUENCE_BITS) | state.sequence
    }
}

/// Parses `YYYY-MM-DD` into milliseconds since the Unix epoch.
pub fn parse_epoch(epoch: &str) -> Result<i64, ServerError> {
    let date = NaiveDate::parse_from_str(epoch.trim(), "%Y-%m-%d")
        .map_err(|e| ServerError::InvalidConfig(format!("bad id epoch {:?}: {}", epoch, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ServerError::InvalidConfig(format!("bad id epoch {:?}", epoch)))?;
    Ok(midnight.and_utc().timestamp_millis())
}
