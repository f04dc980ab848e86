//! Signed transfer and currency-creation records
//!
//! A transaction becomes authoritative only once delivered through the
//! commit feed; until then it is a proposal. Every replica re-derives the
//! signable bytes and re-verifies the signature at apply time, so the
//! signable encoding must be bit-identical wherever it is computed.

use crate::crypto::{self, KeyPair};
use crate::types::{Amount, Currency, PublicKey, Signature};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A transfer between identities, or a privileged creation record minting
/// currency into a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender; absent on creation records
    pub src: Option<PublicKey>,

    /// Receiver, always present
    pub dest: PublicKey,

    /// Signature over [`Transaction::signable_bytes`]; absent on creation
    /// records and before signing
    pub signature: Option<Signature>,

    /// Currency being moved
    pub currency: Currency,

    /// Amount being moved
    pub amount: Amount,

    /// Whether this record mints currency instead of debiting a sender
    pub create: bool,
}

/// The exact projection of a transaction covered by its signature:
/// signature and creation flag are excluded.
#[derive(Serialize)]
struct Signable<'a> {
    src: &'a Option<PublicKey>,
    dest: &'a PublicKey,
    currency: &'a Currency,
    amount: &'a Amount,
}

impl Transaction {
    /// Construct a transaction, unsigned.
    ///
    /// Fails with [`Error::InvalidAddress`] when the destination is
    /// missing, or when a non-creation has no source. A creation carrying
    /// a source is a caller bug and fails with [`Error::InvalidOperation`].
    pub fn new(
        src: Option<PublicKey>,
        dest: Option<PublicKey>,
        currency: Currency,
        amount: Amount,
        create: bool,
    ) -> Result<Self> {
        let dest = dest.ok_or_else(|| {
            Error::InvalidAddress("no destination address provided".to_string())
        })?;

        if !create && src.is_none() {
            return Err(Error::InvalidAddress(
                "no source address provided".to_string(),
            ));
        }
        if create && src.is_some() {
            return Err(Error::InvalidOperation(
                "creation records carry no source".to_string(),
            ));
        }

        Ok(Self {
            src,
            dest,
            signature: None,
            currency,
            amount,
            create,
        })
    }

    /// Canonical byte encoding of `{src, dest, currency, amount}`.
    ///
    /// Order-stable and bit-identical across nodes; every replica
    /// recomputes it for verification.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&Signable {
            src: &self.src,
            dest: &self.dest,
            currency: &self.currency,
            amount: &self.amount,
        })?)
    }

    /// Sign the transaction with the sender's key.
    ///
    /// Creation records are never sender-signed; their authority comes
    /// from whatever gate admitted them at the submission layer.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        if self.create {
            return Err(Error::InvalidOperation(
                "cannot sign a creation record".to_string(),
            ));
        }

        let message = self.signable_bytes()?;
        self.signature = Some(keypair.sign(&message));
        Ok(())
    }

    /// Whether the transaction is admissible: creations are trusted as-is,
    /// transfers must carry a signature verifying against `src`.
    pub fn is_verified(&self) -> bool {
        if self.create {
            return true;
        }

        let (Some(src), Some(signature)) = (self.src, self.signature) else {
            return false;
        };

        match self.signable_bytes() {
            Ok(message) => crypto::verify_signature(&message, &signature, &src),
            Err(_) => false,
        }
    }

    /// Serialize for the consensus log
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from a commit entry
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
