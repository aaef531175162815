//! Transaction outputs and the decay value model

use crate::settings::ProtocolSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    address: String,
    is_yielding: bool,
    #[serde(rename = "value")]
    initial_value: u64,
}

impl Output {
    pub fn new(address: impl Into<String>, is_yielding: bool, initial_value: u64) -> Self {
        Self {
            address: address.into(),
            is_yielding,
            initial_value,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_yielding(&self) -> bool {
        self.is_yielding
    }

    pub fn initial_value(&self) -> u64 {
        self.initial_value
    }

    /// Value at `now` of this output created at `created_at`.
    ///
    /// A non-yielding output decays toward zero with the configured half-life.
    /// A yielding output converges toward the income limit from either side.
    /// Before or at creation time the initial value is returned unchanged.
    pub fn value_at(&self, created_at: i64, now: i64, settings: &ProtocolSettings) -> u64 {
        let elapsed = now.saturating_sub(created_at);
        let half_life = settings.half_life_ns();
        if elapsed <= 0 || !(half_life > 0.) {
            return self.initial_value;
        }
        let decay = (-(elapsed as f64) / half_life).exp2();
        let initial_value = self.initial_value as f64;
        let value = if self.is_yielding {
            let limit = settings.income_limit as f64;
            limit + (initial_value - limit) * decay
        } else {
            initial_value * decay
        };
        // f64 to u64 casts saturate, negative rounding noise maps to 0
        value.round() as u64
    }
}
