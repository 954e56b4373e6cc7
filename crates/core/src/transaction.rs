//! Transaction wire types, canonical encoding, ids and signing.
//!
//! Transactions are encoded as canonical msgpack: a map whose keys are in
//! lexicographic order, with zero/empty fields omitted and byte strings as
//! `bin`. Struct fields below are declared in key order so that
//! `rmp_serde::to_vec_named` produces the canonical form directly.

use std::fmt;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::ByteBuf;

use crate::account::{sha512_256, Address, TransactionSigner};
use crate::error::{ClaimError, Result};

/// Domain separation prefix for transaction ids and signatures.
const TX_PREFIX: &[u8] = b"TX";
/// Domain separation prefix for group ids.
const TX_GROUP_PREFIX: &[u8] = b"TG";
/// Bytes a signature adds to an encoded transaction, used for fee estimation.
const SIGNATURE_OVERHEAD: usize = 75;
/// Last valid round offset from the suggested first valid round.
pub const VALIDITY_WINDOW: u64 = 1_000;
/// Maximum number of transactions in an atomic group.
pub const MAX_GROUP_SIZE: usize = 16;

/// Network parameters every transaction needs, fetched fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedParams {
    /// Fee per byte, or the absolute fee when `flat_fee` is set.
    pub fee: u64,
    pub min_fee: u64,
    pub flat_fee: bool,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
}

impl SuggestedParams {
    /// Replace the suggested fee with an absolute one.
    pub fn with_flat_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self.flat_fee = true;
        self
    }
}

/// Transaction kinds used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    AssetTransfer,
    ApplicationCall,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::AssetTransfer => "axfer",
            TransactionType::ApplicationCall => "appl",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransactionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "axfer" => Ok(TransactionType::AssetTransfer),
            "appl" => Ok(TransactionType::ApplicationCall),
            other => Err(serde::de::Error::unknown_variant(other, &["axfer", "appl"])),
        }
    }
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// An unsigned transaction. Field order matches canonical key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "aamt", default, skip_serializing_if = "is_zero")]
    pub asset_amount: u64,
    #[serde(rename = "apaa", default, skip_serializing_if = "Vec::is_empty")]
    pub app_args: Vec<ByteBuf>,
    /// On-completion action; 0 is NoOp.
    #[serde(rename = "apan", default, skip_serializing_if = "is_zero")]
    pub on_complete: u64,
    #[serde(rename = "apas", default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_assets: Vec<u64>,
    #[serde(rename = "apid", default, skip_serializing_if = "is_zero")]
    pub app_id: u64,
    #[serde(rename = "arcv", default, skip_serializing_if = "Option::is_none")]
    pub asset_receiver: Option<Address>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fee: u64,
    #[serde(rename = "fv", default, skip_serializing_if = "is_zero")]
    pub first_valid: u64,
    #[serde(rename = "gen", default, skip_serializing_if = "String::is_empty")]
    pub genesis_id: String,
    #[serde(rename = "gh", with = "serde_bytes")]
    pub genesis_hash: [u8; 32],
    #[serde(
        rename = "grp",
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub group: Option<[u8; 32]>,
    #[serde(rename = "lv", default, skip_serializing_if = "is_zero")]
    pub last_valid: u64,
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<u8>,
    #[serde(rename = "snd")]
    pub sender: Address,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    #[serde(rename = "xaid", default, skip_serializing_if = "is_zero")]
    pub asset_id: u64,
}

impl Transaction {
    fn base(tx_type: TransactionType, sender: Address, params: &SuggestedParams) -> Self {
        Self {
            asset_amount: 0,
            app_args: Vec::new(),
            on_complete: 0,
            foreign_assets: Vec::new(),
            app_id: 0,
            asset_receiver: None,
            fee: 0,
            first_valid: params.first_valid,
            genesis_id: params.genesis_id.clone(),
            genesis_hash: params.genesis_hash,
            group: None,
            last_valid: params.last_valid,
            note: Vec::new(),
            sender,
            tx_type,
            asset_id: 0,
        }
    }

    /// Zero-amount transfer of `asset_id` from `sender` to itself.
    pub fn asset_opt_in(sender: Address, asset_id: u64, params: &SuggestedParams) -> Result<Self> {
        let mut txn = Self::base(TransactionType::AssetTransfer, sender, params);
        txn.asset_id = asset_id;
        txn.asset_receiver = Some(sender);
        txn.apply_fee(params)?;
        Ok(txn)
    }

    /// NoOp call of `app_id` with already-encoded arguments.
    pub fn app_call(
        sender: Address,
        app_id: u64,
        app_args: Vec<Vec<u8>>,
        foreign_assets: Vec<u64>,
        params: &SuggestedParams,
    ) -> Result<Self> {
        let mut txn = Self::base(TransactionType::ApplicationCall, sender, params);
        txn.app_id = app_id;
        txn.app_args = app_args.into_iter().map(ByteBuf::from).collect();
        txn.foreign_assets = foreign_assets;
        txn.apply_fee(params)?;
        Ok(txn)
    }

    fn apply_fee(&mut self, params: &SuggestedParams) -> Result<()> {
        if params.flat_fee {
            self.fee = params.fee;
            return Ok(());
        }
        let per_byte = params.fee.saturating_mul(self.estimate_size()? as u64);
        self.fee = per_byte.max(params.min_fee);
        Ok(())
    }

    /// Size of the transaction once signed.
    pub fn estimate_size(&self) -> Result<usize> {
        Ok(self.encode()?.len() + SIGNATURE_OVERHEAD)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// `"TX" || encode()`: the payload that gets hashed and signed.
    pub fn bytes_to_sign(&self) -> Result<Vec<u8>> {
        let encoded = self.encode()?;
        let mut payload = Vec::with_capacity(TX_PREFIX.len() + encoded.len());
        payload.extend_from_slice(TX_PREFIX);
        payload.extend_from_slice(&encoded);
        Ok(payload)
    }

    pub fn raw_id(&self) -> Result<[u8; 32]> {
        Ok(sha512_256(&[&self.bytes_to_sign()?]))
    }

    /// Base32 transaction id as reported by the ledger.
    pub fn id(&self) -> Result<String> {
        Ok(BASE32_NOPAD.encode(&self.raw_id()?))
    }

    pub fn sign(self, signer: &dyn TransactionSigner) -> Result<SignedTransaction> {
        let signature = signer.sign(&self.bytes_to_sign()?);
        Ok(SignedTransaction {
            signature,
            transaction: self,
        })
    }
}

/// A transaction together with its ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(rename = "sig", with = "serde_bytes")]
    pub signature: [u8; 64],
    #[serde(rename = "txn")]
    pub transaction: Transaction,
}

impl SignedTransaction {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn id(&self) -> Result<String> {
        self.transaction.id()
    }

    /// Split a submission payload (concatenated signed transactions).
    pub fn decode_stream(bytes: &[u8]) -> Result<Vec<Self>> {
        let mut deserializer = rmp_serde::Deserializer::new(std::io::Cursor::new(bytes));
        let mut signed = Vec::new();
        while (deserializer.get_ref().position() as usize) < bytes.len() {
            let txn = Self::deserialize(&mut deserializer)
                .map_err(|e| ClaimError::Decode(e.to_string()))?;
            signed.push(txn);
        }
        Ok(signed)
    }
}

#[derive(Serialize)]
struct TxGroup {
    #[serde(rename = "txlist")]
    tx_list: Vec<ByteBuf>,
}

/// Hash of the member transaction ids, shared by every member of a group.
pub fn compute_group_id(txns: &[Transaction]) -> Result<[u8; 32]> {
    if txns.len() > MAX_GROUP_SIZE {
        return Err(ClaimError::GroupTooLarge {
            max: MAX_GROUP_SIZE,
        });
    }
    let tx_list = txns
        .iter()
        .map(|txn| txn.raw_id().map(|id| ByteBuf::from(id.to_vec())))
        .collect::<Result<Vec<_>>>()?;
    let encoded = rmp_serde::to_vec_named(&TxGroup { tx_list })?;
    Ok(sha512_256(&[TX_GROUP_PREFIX, &encoded]))
}

/// Stamp the group id on every transaction. Single transactions stay ungrouped.
pub fn assign_group_id(txns: &mut [Transaction]) -> Result<()> {
    if txns.len() < 2 {
        return Ok(());
    }
    for txn in txns.iter_mut() {
        txn.group = None;
    }
    let group = compute_group_id(txns)?;
    for txn in txns.iter_mut() {
        txn.group = Some(group);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::account::Account;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    pub(crate) fn test_params() -> SuggestedParams {
        SuggestedParams {
            fee: 0,
            min_fee: 1_000,
            flat_fee: false,
            first_valid: 1_000,
            last_valid: 1_000 + VALIDITY_WINDOW,
            genesis_id: "testnet-v1.0".to_string(),
            genesis_hash: [7u8; 32],
        }
    }

    fn position_of(haystack: &[u8], key: &str) -> Option<usize> {
        // msgpack fixstr header followed by the key bytes
        let mut needle = vec![0xa0 | key.len() as u8];
        needle.extend_from_slice(key.as_bytes());
        haystack.windows(needle.len()).position(|w| w == needle.as_slice())
    }

    #[test]
    fn test_opt_in_is_zero_amount_self_transfer() {
        let account = Account::from_seed(&[1u8; 32]);
        let txn = Transaction::asset_opt_in(account.address(), 42, &test_params()).unwrap();
        assert_eq!(txn.tx_type, TransactionType::AssetTransfer);
        assert_eq!(txn.asset_amount, 0);
        assert_eq!(txn.asset_receiver, Some(account.address()));
        assert_eq!(txn.asset_id, 42);
        assert_eq!(txn.fee, 1_000);
    }

    #[test]
    fn test_canonical_key_order_and_omission() {
        let account = Account::from_seed(&[1u8; 32]);
        let txn = Transaction::asset_opt_in(account.address(), 42, &test_params()).unwrap();
        let bytes = txn.encode().unwrap();

        // Map header: fixmap with 9 entries
        assert_eq!(bytes[0], 0x80 | 9);
        let keys = ["arcv", "fee", "fv", "gen", "gh", "lv", "snd", "type", "xaid"];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| position_of(&bytes, k).unwrap_or_else(|| panic!("missing {k}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        for omitted in ["aamt", "apaa", "apas", "apid", "grp", "note"] {
            assert!(position_of(&bytes, omitted).is_none(), "{omitted} present");
        }
    }

    #[test]
    fn test_per_byte_fee_above_minimum() {
        let account = Account::from_seed(&[1u8; 32]);
        let mut params = test_params();
        params.fee = 10;
        let txn = Transaction::asset_opt_in(account.address(), 42, &params).unwrap();
        assert!(txn.fee > 1_000);
        assert_eq!(txn.fee % 10, 0);
    }

    #[test]
    fn test_flat_fee_is_used_verbatim() {
        let account = Account::from_seed(&[1u8; 32]);
        let params = test_params().with_flat_fee(6_000);
        let txn =
            Transaction::app_call(account.address(), 9, vec![vec![1, 2, 3, 4]], vec![42], &params)
                .unwrap();
        assert_eq!(txn.fee, 6_000);
        assert_eq!(txn.tx_type, TransactionType::ApplicationCall);
        assert_eq!(txn.foreign_assets, vec![42]);
    }

    #[test]
    fn test_id_is_base32_of_prefixed_hash() {
        let account = Account::from_seed(&[1u8; 32]);
        let txn = Transaction::asset_opt_in(account.address(), 42, &test_params()).unwrap();
        let id = txn.id().unwrap();
        assert_eq!(id.len(), 52);
        assert_eq!(
            BASE32_NOPAD.decode(id.as_bytes()).unwrap(),
            sha512_256(&[b"TX", &txn.encode().unwrap()]).to_vec()
        );
    }

    #[test]
    fn test_signature_covers_prefixed_bytes() {
        let account = Account::from_seed(&[1u8; 32]);
        let txn = Transaction::asset_opt_in(account.address(), 42, &test_params()).unwrap();
        let payload = txn.bytes_to_sign().unwrap();
        let signed = txn.sign(&account).unwrap();

        let key = VerifyingKey::from_bytes(account.address().as_bytes()).unwrap();
        assert!(key
            .verify(&payload, &Signature::from_bytes(&signed.signature))
            .is_ok());
    }

    #[test]
    fn test_decode_stream_splits_group_payload() {
        let account = Account::from_seed(&[1u8; 32]);
        let first = Transaction::asset_opt_in(account.address(), 1, &test_params())
            .unwrap()
            .sign(&account)
            .unwrap();
        let second = Transaction::app_call(account.address(), 5, vec![], vec![2], &test_params())
            .unwrap()
            .sign(&account)
            .unwrap();

        let mut payload = first.encode().unwrap();
        payload.extend(second.encode().unwrap());

        let decoded = SignedTransaction::decode_stream(&payload).unwrap();
        assert_eq!(decoded, vec![first, second]);
    }

    #[test]
    fn test_group_id_assigned_only_to_multi_transaction_groups() {
        let account = Account::from_seed(&[1u8; 32]);
        let mut single =
            vec![Transaction::asset_opt_in(account.address(), 1, &test_params()).unwrap()];
        assign_group_id(&mut single).unwrap();
        assert!(single[0].group.is_none());

        let mut pair = vec![
            Transaction::asset_opt_in(account.address(), 1, &test_params()).unwrap(),
            Transaction::asset_opt_in(account.address(), 2, &test_params()).unwrap(),
        ];
        assign_group_id(&mut pair).unwrap();
        assert!(pair[0].group.is_some());
        assert_eq!(pair[0].group, pair[1].group);
    }

    #[test]
    fn test_group_too_large() {
        let account = Account::from_seed(&[1u8; 32]);
        let txns: Vec<Transaction> = (0..=MAX_GROUP_SIZE as u64)
            .map(|i| Transaction::asset_opt_in(account.address(), i + 1, &test_params()).unwrap())
            .collect();
        assert!(matches!(
            compute_group_id(&txns),
            Err(ClaimError::GroupTooLarge { .. })
        ));
    }
}
