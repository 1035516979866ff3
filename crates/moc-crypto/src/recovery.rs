//! BIP-39 mnemonic view of the master key
//!
//! The master key is a display/recovery artifact. Its 256 bits map directly
//! onto a 24-word mnemonic, so the words are the key: no KDF and no salt.
//! The mnemonic is shown to the user once and never stored digitally.

use bip39::Mnemonic;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::MasterKey;
use crate::KEY_SIZE;

/// Encode a master key as a 24-word English BIP-39 mnemonic.
pub fn master_key_to_mnemonic(master: &MasterKey) -> CryptoResult<String> {
    let mnemonic = Mnemonic::from_entropy(master.as_bytes())
        .map_err(|e| CryptoError::InvalidMnemonic(format!("encoding master key: {e}")))?;
    Ok(mnemonic.to_string())
}

/// Recover the exact master key from its 24-word mnemonic.
pub fn mnemonic_to_master_key(words: &str) -> CryptoResult<MasterKey> {
    let mnemonic: Mnemonic = words
        .trim()
        .parse()
        .map_err(|e| CryptoError::InvalidMnemonic(format!("{e}")))?;

    let (mut entropy, len) = mnemonic.to_entropy_array();
    if len != KEY_SIZE {
        entropy.zeroize();
        return Err(CryptoError::InvalidMnemonic(format!(
            "expected 24 words ({KEY_SIZE} bytes of entropy), got {len} bytes"
        )));
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&entropy[..KEY_SIZE]);
    entropy.zeroize();
    Ok(MasterKey::from_bytes(bytes))
}
