/// Transaction types for the gamma ledger
use crate::crypto::{recover_address, Address, Hash};
use crate::error::{Result, ValidationError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::ser::SerializeStruct;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Flat fee charged per transfer before the fork.
pub const TX_FEE: u64 = 50;
/// Gas units every transfer must carry once the fork is active.
pub const TX_GAS: u64 = 21;
/// Minimum gas price once the fork is active.
pub const TX_GAS_PRICE_DEFAULT: u64 = 1;
/// Data tag marking a mint pseudo-transfer.
pub const MINT_DATA: &str = "mint";

/// Unsigned transfer.
///
/// Serialization is the canonical encoding: `gas` and `gasPrice` are left out
/// whenever `gas` is zero so hashes of pre-fork transactions never change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tx {
    pub from: Address,
    pub to: Address,
    #[serde(default)]
    pub gas: u64,
    #[serde(rename = "gasPrice", default)]
    pub gas_price: u64,
    pub value: u64,
    pub nonce: u64,
    #[serde(default)]
    pub data: String,
    pub time: u64,
}

impl Tx {
    pub fn new(
        from: Address,
        to: Address,
        gas: u64,
        gas_price: u64,
        value: u64,
        nonce: u64,
        data: impl Into<String>,
    ) -> Self {
        Tx {
            from,
            to,
            gas,
            gas_price,
            value,
            nonce,
            data: data.into(),
            time: chrono::Utc::now().timestamp() as u64,
        }
    }

    /// A transfer carrying the fork-era gas defaults.
    pub fn new_base(from: Address, to: Address, value: u64, nonce: u64, data: impl Into<String>) -> Self {
        Self::new(from, to, TX_GAS, TX_GAS_PRICE_DEFAULT, value, nonce, data)
    }

    /// A pre-fork transfer with no gas fields.
    pub fn new_legacy(from: Address, to: Address, value: u64, nonce: u64, data: impl Into<String>) -> Self {
        Self::new(from, to, 0, 0, value, nonce, data)
    }

    pub fn with_time(mut self, time: u64) -> Self {
        self.time = time;
        self
    }

    pub fn is_mint(&self) -> bool {
        self.data == MINT_DATA
    }

    /// `gas * gas_price`, or `None` if it does not fit in a `u64`.
    pub fn gas_cost(&self) -> Option<u64> {
        self.gas.checked_mul(self.gas_price)
    }

    /// Total debit for the sender. Mint transactions report it but never pay it.
    /// `None` when the amount overflows.
    pub fn cost(&self, fork_active: bool) -> Option<u64> {
        if fork_active {
            self.gas_cost().and_then(|gas| self.value.checked_add(gas))
        } else {
            self.value.checked_add(TX_FEE)
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn hash(&self) -> Result<Hash> {
        Ok(Hash::digest(&self.encode()?))
    }

    fn serialize_fields<S: SerializeStruct>(&self, state: &mut S) -> std::result::Result<(), S::Error> {
        state.serialize_field("from", &self.from)?;
        state.serialize_field("to", &self.to)?;
        if self.gas != 0 {
            state.serialize_field("gas", &self.gas)?;
            state.serialize_field("gasPrice", &self.gas_price)?;
        }
        state.serialize_field("value", &self.value)?;
        state.serialize_field("nonce", &self.nonce)?;
        state.serialize_field("data", &self.data)?;
        state.serialize_field("time", &self.time)
    }

    fn field_count(&self) -> usize {
        if self.gas != 0 {
            8
        } else {
            6
        }
    }
}

impl Serialize for Tx {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Tx", self.field_count())?;
        self.serialize_fields(&mut state)?;
        state.end()
    }
}

/// A transaction plus an optional recoverable signature.
///
/// Without a signature the transaction is trusted: its authenticity check
/// always passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    tx: Tx,
    signature: Option<Vec<u8>>,
}

impl SignedTx {
    pub fn new(tx: Tx, signature: Vec<u8>) -> Self {
        SignedTx {
            tx,
            signature: Some(signature),
        }
    }

    pub fn trusted(tx: Tx) -> Self {
        SignedTx { tx, signature: None }
    }

    pub fn inner(&self) -> &Tx {
        &self.tx
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn from(&self) -> Address {
        self.tx.from
    }

    pub fn to(&self) -> Address {
        self.tx.to
    }

    pub fn value(&self) -> u64 {
        self.tx.value
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }

    pub fn gas(&self) -> u64 {
        self.tx.gas
    }

    pub fn gas_price(&self) -> u64 {
        self.tx.gas_price
    }

    pub fn data(&self) -> &str {
        &self.tx.data
    }

    pub fn time(&self) -> u64 {
        self.tx.time
    }

    pub fn is_mint(&self) -> bool {
        self.tx.is_mint()
    }

    pub fn gas_cost(&self) -> Option<u64> {
        self.tx.gas_cost()
    }

    pub fn cost(&self, fork_active: bool) -> Option<u64> {
        self.tx.cost(fork_active)
    }

    /// Encoding including the signature, as stored in block payloads.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn hash(&self) -> Result<Hash> {
        Ok(Hash::digest(&self.encode()?))
    }

    /// Recovers the signer from the signature over the unsigned payload hash
    /// and requires it to equal `from`.
    pub fn verify_authenticity(&self) -> Result<()> {
        let Some(signature) = &self.signature else {
            return Ok(());
        };

        let tx_hash = self.tx.hash()?;
        let signer = recover_address(&tx_hash, signature)?;
        if signer != self.tx.from {
            return Err(ValidationError::Forged { from: self.tx.from }.into());
        }
        Ok(())
    }

    pub fn is_authentic(&self) -> bool {
        self.verify_authenticity().is_ok()
    }
}

impl Serialize for SignedTx {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = self.tx.field_count() + usize::from(self.signature.is_some());
        let mut state = serializer.serialize_struct("SignedTx", fields)?;
        self.tx.serialize_fields(&mut state)?;
        if let Some(signature) = &self.signature {
            state.serialize_field("signature", &BASE64.encode(signature))?;
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct SignedTxRecord {
    from: Address,
    to: Address,
    #[serde(default)]
    gas: u64,
    #[serde(rename = "gasPrice", default)]
    gas_price: u64,
    value: u64,
    nonce: u64,
    #[serde(default)]
    data: String,
    time: u64,
    #[serde(default)]
    signature: Option<String>,
}

impl<'de> Deserialize<'de> for SignedTx {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = SignedTxRecord::deserialize(deserializer)?;
        let signature = record
            .signature
            .map(|s| BASE64.decode(s.as_bytes()))
            .transpose()
            .map_err(|e| de::Error::custom(format!("invalid signature encoding: {}", e)))?;

        Ok(SignedTx {
            tx: Tx {
                from: record.from,
                to: record.to,
                gas: record.gas,
                gas_price: record.gas_price,
                value: record.value,
                nonce: record.nonce,
                data: record.data,
                time: record.time,
            },
            signature,
        })
    }
}
