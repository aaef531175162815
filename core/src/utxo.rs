use crate::output::Output;
use crate::settings::ProtocolSettings;
use crate::transaction::InputInfo;
use serde::{Deserialize, Serialize};

/// Unspent output, stamped with the timestamp it was applied at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    input_info: InputInfo,
    output: Output,
    timestamp: i64,
}

impl Utxo {
    pub fn new(input_info: InputInfo, output: Output, timestamp: i64) -> Self {
        Self {
            input_info,
            output,
            timestamp,
        }
    }

    pub fn input_info(&self) -> &InputInfo {
        &self.input_info
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn address(&self) -> &str {
        self.output.address()
    }

    pub fn is_yielding(&self) -> bool {
        self.output.is_yielding()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Spendable value at `now`
    pub fn value(&self, now: i64, settings: &ProtocolSettings) -> u64 {
        self.output.value_at(self.timestamp, now, settings)
    }
}

/// UTXO as returned to wallets, valued at the request time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoResponse {
    pub output_index: u16,
    pub transaction_id: String,
    pub address: String,
    pub is_yielding: bool,
    pub value: u64,
}

impl UtxoResponse {
    pub fn new(utxo: &Utxo, now: i64, settings: &ProtocolSettings) -> Self {
        Self {
            output_index: utxo.input_info.output_index(),
            transaction_id: utxo.input_info.transaction_id().to_string(),
            address: utxo.address().to_string(),
            is_yielding: utxo.is_yielding(),
            value: utxo.value(now, settings),
        }
    }
}
