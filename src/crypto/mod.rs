use anyhow::{Context, Result};
use bip39::Mnemonic;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use slip10_ed25519::derive_ed25519_private_key;

use crate::error::DaError;
use crate::types::SignedSubmission;

/// Context string for `//Name` development seeds
const DEV_SEED_CONTEXT: &str = "da-poster 2024 development seed";

/// Signing identity owned by a connected session
pub struct Identity {
    signing_key: SigningKey,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("address", &self.address()).finish()
    }
}

impl Identity {
    /// Parses a seed in any of the accepted forms:
    /// - `//Name` development URI
    /// - 32-byte hex secret, with or without `0x`
    /// - BIP39 mnemonic phrase
    pub fn from_seed(seed: &str) -> Result<Self, DaError> {
        let seed = seed.trim();
        let secret = if let Some(name) = seed.strip_prefix("//") {
            if name.is_empty() {
                return Err(DaError::connection("malformed signing seed: empty dev URI"));
            }
            blake3::derive_key(DEV_SEED_CONTEXT, name.as_bytes())
        } else if is_hex_secret(seed) {
            let stripped = seed.strip_prefix("0x").unwrap_or(seed);
            validate_private_key_hex(stripped)
                .map_err(|e| DaError::connection(format!("malformed signing seed: {e:#}")))?;
            let mut out = [0u8; 32];
            hex::decode_to_slice(stripped, &mut out)
                .map_err(|e| DaError::connection(format!("malformed signing seed: {e}")))?;
            out
        } else {
            mnemonic_to_private_key(seed)
                .map_err(|e| DaError::connection(format!("malformed signing seed: {e:#}")))?
        };

        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// `0x`-hex ed25519 public key
    pub fn address(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.verifying_key().as_bytes()))
    }

    pub fn sign_submission(&self, app_id: u32, data: Vec<u8>) -> SignedSubmission {
        let message = submission_message(app_id, &data);
        let signature = self.signing_key.sign(message.as_bytes());
        SignedSubmission {
            app_id,
            data,
            signer: self.address(),
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

/// Checks a submission's signature against its claimed signer address
pub fn verify_submission(tx: &SignedSubmission) -> bool {
    let Some(key_bytes) = decode_fixed::<32>(tx.signer.strip_prefix("0x").unwrap_or(&tx.signer)) else {
        return false;
    };
    let Some(sig_bytes) = decode_fixed::<64>(&tx.signature) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    key.verify(submission_message(tx.app_id, &tx.data).as_bytes(), &signature)
        .is_ok()
}

fn submission_message(app_id: u32, data: &[u8]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&app_id.to_le_bytes());
    hasher.update(data);
    hasher.finalize()
}

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).ok()?;
    Some(out)
}

fn is_hex_secret(s: &str) -> bool {
    let s = s.strip_prefix("0x").unwrap_or(s);
    !s.contains(char::is_whitespace) && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Derives a private key from a mnemonic phrase
///
/// Uses BIP39 for mnemonic → seed, then SLIP-10 (ed25519) along
/// m/44'/709'/0'/0'/0' (709 = Avail coin type).
pub fn mnemonic_to_private_key(mnemonic_str: &str) -> Result<[u8; 32]> {
    let mnemonic = Mnemonic::parse(mnemonic_str)
        .context("Failed to parse mnemonic. Ensure it's a valid BIP39 mnemonic phrase.")?;

    let seed = mnemonic.to_seed("");

    derive_da_key(&seed, 0, 0, 0)
}

/// SLIP-10 only defines hardened derivation for ed25519, so every level is hardened
fn derive_da_key(seed: &[u8], account: u32, change: u32, index: u32) -> Result<[u8; 32]> {
    const HARDENED: u32 = 0x80000000;

    let path = [
        HARDENED | 44,
        HARDENED | 709,
        HARDENED | account,
        HARDENED | change,
        HARDENED | index,
    ];

    Ok(derive_ed25519_private_key(seed, &path))
}

/// Validates that a hex string is a valid private key (32 bytes)
pub fn validate_private_key_hex(hex_str: &str) -> Result<()> {
    let bytes = hex::decode(hex_str)
        .context("Invalid hex string")?;

    if bytes.len() != 32 {
        anyhow::bail!("Private key must be exactly 32 bytes (64 hex characters), got {} bytes", bytes.len());
    }

    Ok(())
}
