//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode over ordered maps)
//! - Fixed-point money arithmetic (no floating point)
//! - Memory safety (no unsafe code)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed-point currency amount: `value + subunit/100`.
///
/// Arithmetic never renormalizes `subunit` into `[0, 100)`; validity of a
/// balance is judged solely by [`Amount::is_positive`] after application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Whole units
    pub value: i64,

    /// Hundredths of a unit
    pub subunit: i8,
}

impl Amount {
    /// Create a new amount
    pub fn new(value: i64, subunit: i8) -> Self {
        Self { value, subunit }
    }

    /// Zero amount
    pub const ZERO: Amount = Amount { value: 0, subunit: 0 };

    /// Subtract another amount componentwise, borrowing one whole unit
    /// when the subunit rolls over.
    ///
    /// Wrapping arithmetic keeps every replica in lockstep on pathological
    /// inputs instead of panicking mid-replay.
    pub fn subtract(self, other: Amount) -> Amount {
        let subunit = self.subunit.wrapping_sub(other.subunit) % 100;
        let mut value = self.value.wrapping_sub(other.value);
        if subunit > self.subunit {
            value = value.wrapping_sub(1);
        }
        Amount { value, subunit }
    }

    /// Additive inverse: both fields negated
    pub fn inverse(self) -> Amount {
        Amount {
            value: self.value.wrapping_neg(),
            subunit: self.subunit.wrapping_neg(),
        }
    }

    /// Both fields non-negative.
    ///
    /// This is the sole post-condition check used to detect invalid
    /// balances; it does not renormalize.
    pub fn is_positive(self) -> bool {
        self.value >= 0 && self.subunit >= 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.value, self.subunit)
    }
}

/// Opaque currency identifier. Empty identifiers are always invalid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty (never a valid currency)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Fixed-size ed25519 public key identifying one wallet owner
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PublicKey([u8; PublicKey::LEN]);

impl PublicKey {
    /// Key length in bytes
    pub const LEN: usize = 32;

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; PublicKey::LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a full-length hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| Error::InvalidAddress(format!("not valid hex: {}", e)))?;
        let bytes: [u8; PublicKey::LEN] = raw.as_slice().try_into().map_err(|_| {
            Error::InvalidAddress(format!(
                "expected {} bytes, got {}",
                PublicKey::LEN,
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; PublicKey::LEN] {
        &self.0
    }

    /// Full hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex prefix for display (first 6 bytes)
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Ed25519 signature over a transaction's signable bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature bytes (64 bytes)
    #[serde(with = "serde_bytes")]
    bytes: [u8; 64],
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

/// One identity's balances, one entry per currency ever touched.
///
/// Backed by an ordered map so that serializing the same balances always
/// yields the same bytes on every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account(BTreeMap<Currency, Amount>);

impl Account {
    /// Empty account
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Account holding a single currency, used to express one transfer
    pub fn single(currency: Currency, amount: Amount) -> Self {
        let mut map = BTreeMap::new();
        map.insert(currency, amount);
        Self(map)
    }

    /// Balance in the given currency; absent means zero
    pub fn balance(&self, currency: &Currency) -> Amount {
        self.0.get(currency).copied().unwrap_or(Amount::ZERO)
    }

    /// Set the balance for a currency
    pub fn insert(&mut self, currency: Currency, amount: Amount) {
        self.0.insert(currency, amount);
    }

    /// Iterate over (currency, amount) pairs in currency order
    pub fn iter(&self) -> impl Iterator<Item = (&Currency, &Amount)> {
        self.0.iter()
    }

    /// Number of currencies touched
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no currency has ever been touched
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Subtract another account piecewise, producing the union of touched
    /// currencies. Currencies present only in `other` come out inverted.
    pub fn subtract(&self, other: &Account) -> Account {
        let mut out = BTreeMap::new();

        for (currency, amount) in &self.0 {
            let result = match other.0.get(currency) {
                Some(theirs) => amount.subtract(*theirs),
                None => *amount,
            };
            out.insert(currency.clone(), result);
        }

        for (currency, amount) in &other.0 {
            if !out.contains_key(currency) {
                out.insert(currency.clone(), amount.inverse());
            }
        }

        Account(out)
    }

    /// Per-currency additive inverse
    pub fn inverse(&self) -> Account {
        Account(
            self.0
                .iter()
                .map(|(c, a)| (c.clone(), a.inverse()))
                .collect(),
        )
    }

    /// An account is valid iff every amount is positive and every subunit
    /// lies inside its band (`subunit == subunit % 100`)
    pub fn is_valid(&self) -> bool {
        self.0
            .values()
            .all(|a| a.is_positive() && a.subunit == a.subunit % 100)
    }
}

impl FromIterator<(Currency, Amount)> for Account {
    fn from_iter<T: IntoIterator<Item = (Currency, Amount)>>(iter: T) -> Self {
        Account(iter.into_iter().collect())
    }
}
