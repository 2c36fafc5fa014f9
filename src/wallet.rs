use std::fmt;

use bip39::Mnemonic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xrpl::core::addresscodec::is_valid_classic_address;
use xrpl::core::keypairs::{derive_classic_address, derive_keypair, generate_seed};

use crate::error::LedgerError;

const MNEMONIC_WORDS: usize = 12;

/// Wallet keys as persisted on the device. The seed is the secret.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub seed: String,
    pub public_key: String,
    #[serde(default)]
    pub mnemonic: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Generate a new wallet with a 12-word recovery phrase.
    pub fn generate() -> Result<Self, LedgerError> {
        let mnemonic = Mnemonic::generate(MNEMONIC_WORDS)
            .map_err(|e| LedgerError::validation(format!("Failed to generate mnemonic: {}", e)))?;
        Self::from_bip39(&mnemonic)
    }

    /// Restore from an XRPL family seed (`s...`).
    pub fn from_seed(seed: &str) -> Result<Self, LedgerError> {
        let (public_key, _private_key) = derive_keypair(seed.trim(), false)
            .map_err(|e| LedgerError::validation(format!("Invalid seed: {:?}", e)))?;
        let address = derive_classic_address(&public_key)
            .map_err(|e| LedgerError::validation(format!("Failed to derive address: {:?}", e)))?;

        Ok(Self {
            address,
            seed: seed.trim().to_string(),
            public_key,
            mnemonic: None,
            created_at: Utc::now(),
        })
    }

    /// Restore from the recovery phrase produced by [`Wallet::generate`].
    pub fn from_mnemonic(phrase: &str) -> Result<Self, LedgerError> {
        let mnemonic = Mnemonic::parse(phrase.trim())
            .map_err(|e| LedgerError::validation(format!("Invalid seed phrase: {}", e)))?;
        Self::from_bip39(&mnemonic)
    }

    fn from_bip39(mnemonic: &Mnemonic) -> Result<Self, LedgerError> {
        let entropy: [u8; 16] = mnemonic.to_entropy().try_into().map_err(|_| {
            LedgerError::validation(format!("Seed phrase must have {} words", MNEMONIC_WORDS))
        })?;
        let seed = generate_seed(Some(entropy), None)
            .map_err(|e| LedgerError::validation(format!("Failed to encode seed: {:?}", e)))?;

        let mut wallet = Self::from_seed(&seed)?;
        wallet.mnemonic = Some(
            mnemonic
                .to_string()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        );
        Ok(wallet)
    }

    pub fn seed_phrase(&self) -> Option<String> {
        self.mnemonic.as_ref().map(|words| words.join(" "))
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("seed", &"<redacted>")
            .field("has_mnemonic", &self.mnemonic.is_some())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address: {}\nPublic Key: {}", self.address, self.public_key)
    }
}

/// Reject anything that is not a well-formed classic `r...` address.
pub fn validate_address(address: &str) -> Result<(), LedgerError> {
    if is_valid_classic_address(address) {
        Ok(())
    } else {
        Err(LedgerError::validation(format!("invalid XRPL address '{}'", address)))
    }
}
