//! Transaction structures and types
//!
//! A transaction id is the SHA-256 of its JSON content, so deserialization
//! recomputes it and rejects any transaction whose declared id differs.

use crate::error::LedgerError;
use crate::output::Output;
use halflife_crypto::{hash_sha256_hex, public_key_to_address, KeyPair};
use serde::{Deserialize, Serialize};

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputInfo {
    output_index: u16,
    transaction_id: String,
}

impl InputInfo {
    pub fn new(output_index: u16, transaction_id: impl Into<String>) -> Self {
        Self {
            output_index,
            transaction_id: transaction_id.into(),
        }
    }

    pub fn output_index(&self) -> u16 {
        self.output_index
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Bytes covered by the input signature
    pub fn signing_payload(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Signed spending of a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    output_index: u16,
    public_key: String,
    signature: String,
    transaction_id: String,
}

impl Input {
    /// Sign the reference to a UTXO owned by `key_pair`
    pub fn sign(key_pair: &KeyPair, info: InputInfo) -> Result<Self, LedgerError> {
        let signature = key_pair.sign_hex(&info.signing_payload()?);
        Ok(Self {
            output_index: info.output_index,
            public_key: key_pair.public_key_hex(),
            signature,
            transaction_id: info.transaction_id,
        })
    }

    pub fn from_parts(info: InputInfo, public_key: String, signature: String) -> Self {
        Self {
            output_index: info.output_index,
            public_key,
            signature,
            transaction_id: info.transaction_id,
        }
    }

    pub fn info(&self) -> InputInfo {
        InputInfo::new(self.output_index, self.transaction_id.clone())
    }

    pub fn output_index(&self) -> u16 {
        self.output_index
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Address of the UTXO owner, derived from the public key
    pub fn address(&self) -> Result<String, LedgerError> {
        Ok(public_key_to_address(&self.public_key)?)
    }

    pub fn verify_signature(&self) -> Result<(), LedgerError> {
        let payload = self.info().signing_payload()?;
        KeyPair::verify_hex(&self.public_key, &payload, &self.signature)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct TransactionContent<'a> {
    inputs: &'a [Input],
    outputs: &'a [Output],
    timestamp: i64,
}

#[derive(Deserialize)]
struct TransactionDto {
    id: String,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransactionDto")]
pub struct Transaction {
    id: String,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    timestamp: i64,
}

impl Transaction {
    pub fn new(
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        timestamp: i64,
    ) -> Result<Self, LedgerError> {
        if inputs.is_empty() {
            check_reward_outputs(&outputs)?;
        }
        let id = Self::generate_id(&inputs, &outputs, timestamp)?;
        Ok(Self {
            id,
            inputs,
            outputs,
            timestamp,
        })
    }

    /// Transaction paying a block reward to the validator
    pub fn reward(
        address: impl Into<String>,
        is_yielding: bool,
        timestamp: i64,
        value: u64,
    ) -> Result<Self, LedgerError> {
        Self::new(
            Vec::new(),
            vec![Output::new(address, is_yielding, value)],
            timestamp,
        )
    }

    fn generate_id(
        inputs: &[Input],
        outputs: &[Output],
        timestamp: i64,
    ) -> Result<String, LedgerError> {
        let content = TransactionContent {
            inputs,
            outputs,
            timestamp,
        };
        Ok(hash_sha256_hex(&serde_json::to_vec(&content)?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// A transaction without inputs only carries a block reward
    pub fn is_reward(&self) -> bool {
        self.inputs.is_empty() && self.outputs.len() == 1
    }

    pub fn reward_recipient(&self) -> Option<&str> {
        self.reward_output().map(Output::address)
    }

    pub fn reward_value(&self) -> Option<u64> {
        self.reward_output().map(Output::initial_value)
    }

    fn reward_output(&self) -> Option<&Output> {
        if self.is_reward() {
            self.outputs.first()
        } else {
            None
        }
    }

    pub fn verify_signatures(&self) -> Result<(), LedgerError> {
        self.inputs.iter().try_for_each(Input::verify_signature)
    }
}

fn check_reward_outputs(outputs: &[Output]) -> Result<(), LedgerError> {
    match outputs.len() {
        0 => Err(LedgerError::NoOutput),
        1 => Ok(()),
        _ => Err(LedgerError::MultipleRewards),
    }
}

impl TryFrom<TransactionDto> for Transaction {
    type Error = LedgerError;

    fn try_from(dto: TransactionDto) -> Result<Self, Self::Error> {
        let transaction = Transaction::new(dto.inputs, dto.outputs, dto.timestamp)?;
        if transaction.id != dto.id {
            return Err(LedgerError::InvalidTransactionId {
                expected: transaction.id,
                actual: dto.id,
            });
        }
        Ok(transaction)
    }
}

/// Envelope exchanged between nodes when a transaction is relayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub transaction: Transaction,
    pub transaction_broadcaster_target: String,
}

impl TransactionRequest {
    pub fn new(transaction: Transaction, transaction_broadcaster_target: impl Into<String>) -> Self {
        Self {
            transaction,
            transaction_broadcaster_target: transaction_broadcaster_target.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
