//! Account keys, addresses and the 25-word mnemonic format.
//!
//! ```text
//! address  = base32_nopad(pubkey || sha512_256(pubkey)[28..32])   (58 chars)
//! mnemonic = 24 x 11-bit words over seed (little-endian bit order)
//!            + 1 checksum word = wordlist[u16le(sha512_256(seed)[0..2]) & 0x7ff]
//! ```

use std::fmt;
use std::str::FromStr;

use bip39::Language;
use data_encoding::BASE32_NOPAD;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use zeroize::Zeroizing;

use crate::error::{ClaimError, Result};

const PUBLIC_KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;
const ADDRESS_TEXT_LEN: usize = 58;

const MNEMONIC_WORDS: usize = 25;
const BITS_PER_WORD: u32 = 11;
const WORD_MASK: u32 = 0x7ff;

/// SHA-512/256 over the concatenation of `parts`.
pub fn sha512_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

// =============================================================================
// Address
// =============================================================================

/// An account address: the raw ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; PUBLIC_KEY_LEN]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let digest = sha512_256(&[&self.0]);
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&digest[32 - CHECKSUM_LEN..]);
        checksum
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = [0u8; PUBLIC_KEY_LEN + CHECKSUM_LEN];
        raw[..PUBLIC_KEY_LEN].copy_from_slice(&self.0);
        raw[PUBLIC_KEY_LEN..].copy_from_slice(&self.checksum());
        f.write_str(&BASE32_NOPAD.encode(&raw))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != ADDRESS_TEXT_LEN {
            return Err(ClaimError::InvalidAddress(format!(
                "expected {ADDRESS_TEXT_LEN} characters, got {}",
                s.len()
            )));
        }
        let raw = BASE32_NOPAD
            .decode(s.as_bytes())
            .map_err(|e| ClaimError::InvalidAddress(e.to_string()))?;
        if raw.len() != PUBLIC_KEY_LEN + CHECKSUM_LEN {
            return Err(ClaimError::InvalidAddress(format!(
                "decoded to {} bytes",
                raw.len()
            )));
        }
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(&raw[..PUBLIC_KEY_LEN]);
        let address = Address(key);
        if address.checksum()[..] != raw[PUBLIC_KEY_LEN..] {
            return Err(ClaimError::InvalidAddress("checksum mismatch".to_string()));
        }
        Ok(address)
    }
}

// Msgpack wire form is a 32-byte `bin`.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let buf = serde_bytes::ByteBuf::deserialize(deserializer)?;
        let key: [u8; PUBLIC_KEY_LEN] = buf.as_slice().try_into().map_err(|_| {
            serde::de::Error::invalid_length(buf.len(), &"32 address bytes")
        })?;
        Ok(Address(key))
    }
}

// =============================================================================
// Mnemonic
// =============================================================================

fn checksum_word_index(seed: &[u8; 32]) -> u16 {
    let digest = sha512_256(&[seed]);
    ((u32::from(digest[0]) | (u32::from(digest[1]) << 8)) & WORD_MASK) as u16
}

/// Decode a 25-word mnemonic into the 32-byte ed25519 seed.
pub fn seed_from_mnemonic(phrase: &str) -> Result<Zeroizing<[u8; 32]>> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.len() != MNEMONIC_WORDS {
        return Err(ClaimError::InvalidMnemonic(format!(
            "expected {MNEMONIC_WORDS} words, got {}",
            words.len()
        )));
    }

    let list = Language::English.word_list();
    let mut indices = Vec::with_capacity(MNEMONIC_WORDS);
    for word in &words {
        let lower = word.to_lowercase();
        let index = list
            .iter()
            .position(|candidate| *candidate == lower)
            .ok_or_else(|| ClaimError::InvalidMnemonic(format!("unknown word `{word}`")))?;
        indices.push(index as u16);
    }

    let (data_words, checksum_word) = indices.split_at(MNEMONIC_WORDS - 1);

    // 24 * 11 = 264 bits: 32 seed bytes plus one byte that must be zero.
    let mut bytes = Zeroizing::new(Vec::with_capacity(33));
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;
    for &index in data_words {
        acc |= u32::from(index) << acc_bits;
        acc_bits += BITS_PER_WORD;
        while acc_bits >= 8 {
            bytes.push((acc & 0xff) as u8);
            acc >>= 8;
            acc_bits -= 8;
        }
    }
    if bytes.len() != 33 || bytes[32] != 0 {
        return Err(ClaimError::InvalidMnemonic(
            "trailing bits are not zero".to_string(),
        ));
    }

    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&bytes[..32]);
    if checksum_word_index(&seed) != checksum_word[0] {
        return Err(ClaimError::InvalidMnemonic("checksum mismatch".to_string()));
    }
    Ok(seed)
}

/// Encode a 32-byte seed as a 25-word mnemonic.
pub fn mnemonic_from_seed(seed: &[u8; 32]) -> Zeroizing<String> {
    let list = Language::English.word_list();
    let mut indices: Vec<u16> = Vec::with_capacity(MNEMONIC_WORDS);
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;
    for &byte in seed {
        acc |= u32::from(byte) << acc_bits;
        acc_bits += 8;
        if acc_bits >= BITS_PER_WORD {
            indices.push((acc & WORD_MASK) as u16);
            acc >>= BITS_PER_WORD;
            acc_bits -= BITS_PER_WORD;
        }
    }
    if acc_bits > 0 {
        indices.push(acc as u16);
    }
    indices.push(checksum_word_index(seed));

    let words: Vec<&str> = indices.iter().map(|&i| list[usize::from(i)]).collect();
    Zeroizing::new(words.join(" "))
}

// =============================================================================
// Signing
// =============================================================================

/// Anything that can sign transaction payloads on behalf of one address.
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Ed25519 signature over the already-prefixed payload.
    fn sign(&self, payload: &[u8]) -> [u8; 64];
}

/// A single account derived from a mnemonic. Lives in memory only.
pub struct Account {
    signing_key: SigningKey,
    address: Address,
}

impl Account {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let address = Address(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let seed = seed_from_mnemonic(phrase)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn to_mnemonic(&self) -> Zeroizing<String> {
        mnemonic_from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl TransactionSigner for Account {
    fn address(&self) -> Address {
        self.address
    }

    fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.signing_key.sign(payload).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn test_account() -> Account {
        // Deterministic key for tests
        Account::from_seed(&[42u8; 32])
    }

    #[test]
    fn test_address_text_form() {
        let account = test_account();
        let text = account.address().to_string();
        assert_eq!(text.len(), ADDRESS_TEXT_LEN);
        assert!(text.chars().all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c)));

        let parsed: Address = text.parse().unwrap();
        assert_eq!(parsed, account.address());
    }

    #[test]
    fn test_zero_address_text() {
        assert_eq!(
            Address::default().to_string(),
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ"
        );
    }

    #[test]
    fn test_address_bad_checksum() {
        let mut text = test_account().address().to_string();
        // Flip the last character
        let last = text.pop().unwrap();
        text.push(if last == 'A' { 'B' } else { 'A' });
        assert!(matches!(
            text.parse::<Address>(),
            Err(ClaimError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_address_wrong_length() {
        assert!("ABC".parse::<Address>().is_err());
    }

    #[test]
    fn test_mnemonic_restores_account() {
        let account = test_account();
        let phrase = account.to_mnemonic();
        assert_eq!(phrase.split_whitespace().count(), MNEMONIC_WORDS);

        let restored = Account::from_mnemonic(&phrase).unwrap();
        assert_eq!(restored.address(), account.address());
    }

    #[test]
    fn test_zero_seed_mnemonic_shape() {
        let phrase = mnemonic_from_seed(&[0u8; 32]);
        let words: Vec<&str> = phrase.split_whitespace().collect();
        assert_eq!(words.len(), 25);
        assert!(words[..24].iter().all(|w| *w == "abandon"));
    }

    #[test]
    fn test_mnemonic_wrong_word_count() {
        let err = seed_from_mnemonic("abandon abandon").unwrap_err();
        assert!(matches!(err, ClaimError::InvalidMnemonic(_)));
    }

    #[test]
    fn test_mnemonic_unknown_word() {
        let phrase = test_account().to_mnemonic();
        let mut words: Vec<&str> = phrase.split_whitespace().collect();
        words[3] = "notaword";
        assert!(seed_from_mnemonic(&words.join(" ")).is_err());
    }

    #[test]
    fn test_mnemonic_checksum_mismatch() {
        let phrase = test_account().to_mnemonic();
        let mut words: Vec<String> = phrase.split_whitespace().map(str::to_string).collect();
        let list = Language::English.word_list();
        let current = list.iter().position(|w| *w == words[24]).unwrap();
        words[24] = list[(current + 1) % 2048].to_string();
        let err = seed_from_mnemonic(&words.join(" ")).unwrap_err();
        assert!(matches!(err, ClaimError::InvalidMnemonic(msg) if msg.contains("checksum")));
    }

    #[test]
    fn test_mnemonic_is_case_insensitive() {
        let account = test_account();
        let upper = account.to_mnemonic().to_uppercase();
        let restored = Account::from_mnemonic(&upper).unwrap();
        assert_eq!(restored.address(), account.address());
    }

    #[test]
    fn test_signature_verifies() {
        let account = test_account();
        let sig = account.sign(b"TXpayload");
        let key = VerifyingKey::from_bytes(account.address().as_bytes()).unwrap();
        assert!(key
            .verify(b"TXpayload", &Signature::from_bytes(&sig))
            .is_ok());
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", test_account());
        assert!(rendered.contains("address"));
        assert!(!rendered.contains("signing_key"));
    }
}
