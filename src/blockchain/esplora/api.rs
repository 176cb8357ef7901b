//! structs from the esplora API
//!
//! see: <https://github.com/Blockstream/esplora/blob/master/API.md>
//!
//! Only the fields a [`Transaction`] is built from are decoded, the rest is ignored.
use crate::types::{Transaction, TxInput, TxOutput};

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PrevOut {
    // None for non-standard scripts
    pub scriptpubkey_address: Option<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Vin {
    // None if coinbase
    pub prevout: Option<PrevOut>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Vout {
    pub value: u64,
    pub scriptpubkey_address: Option<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct TxStatus {
    pub confirmed: bool,
    pub block_time: Option<u64>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Tx {
    pub txid: String,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    pub status: TxStatus,
}

impl Tx {
    pub fn into_transaction(self) -> Transaction {
        Transaction {
            id: self.txid,
            confirmed_at: self.status.block_time,
            confirmed: self.status.confirmed,
            inputs: self
                .vin
                .into_iter()
                .map(|vin| TxInput {
                    source_address: vin.prevout.and_then(|po| po.scriptpubkey_address),
                })
                .collect(),
            outputs: self
                .vout
                .into_iter()
                .map(|vout| TxOutput {
                    destination_address: vout.scriptpubkey_address,
                    amount: vout.value,
                })
                .collect(),
        }
    }
}
