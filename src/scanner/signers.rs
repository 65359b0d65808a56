//! Signer recovery.
//!
//! TRON transactions are signed over the SHA-256 of the raw transaction,
//! which is also the transaction id, so the id doubles as the recovery
//! prehash. Signatures are 65 bytes (`r || s || v`).

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

/// TRON mainnet address version byte.
const ADDRESS_PREFIX: u8 = 0x41;

/// Recovers the signer addresses for a transaction, in signature order.
/// Signatures that fail recovery are skipped rather than failing the
/// transaction.
#[must_use]
pub fn recover_signers(tx_id: &str, signatures: &[String]) -> Vec<String> {
    let Ok(prehash) = hex::decode(tx_id) else {
        return Vec::new();
    };
    if prehash.len() != 32 {
        return Vec::new();
    }

    signatures
        .iter()
        .filter_map(|signature| recover_one(&prehash, signature))
        .collect()
}

fn recover_one(prehash: &[u8], signature_hex: &str) -> Option<String> {
    let bytes = hex::decode(signature_hex).ok()?;
    if bytes.len() != 65 {
        return None;
    }

    // v is 0/1, or 27/28 from older wallets.
    let mut v = bytes[64];
    if v >= 27 {
        v -= 27;
    }

    let recovery_id = RecoveryId::try_from(v).ok()?;
    let signature = Signature::from_slice(&bytes[..64]).ok()?;
    let key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id).ok()?;
    Some(address_from_key(&key))
}

/// Derives the Base58Check TRON address for a public key: the last 20
/// bytes of the Keccak-256 of the uncompressed point, version-prefixed.
#[must_use]
pub fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);

    let mut address = [0u8; 21];
    address[0] = ADDRESS_PREFIX;
    address[1..].copy_from_slice(&digest[12..]);
    base58check_address(&address)
}

/// Base58Check-encodes a raw address. Accepts the 21-byte prefixed form or
/// a bare 20-byte body.
#[must_use]
pub(crate) fn base58check_address(raw: &[u8]) -> String {
    match raw.len() {
        21 => bs58::encode(raw).with_check().into_string(),
        20 => {
            let mut prefixed = [0u8; 21];
            prefixed[0] = ADDRESS_PREFIX;
            prefixed[1..].copy_from_slice(raw);
            bs58::encode(prefixed).with_check().into_string()
        }
        _ => hex::encode(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[0x11; 32]).unwrap()
    }

    #[test]
    fn recovers_signer_from_valid_signature() {
        let key = test_key();
        let prehash = [0xabu8; 32];
        let (signature, recovery_id) = key.sign_prehash_recoverable(&prehash).unwrap();

        let mut raw = signature.to_bytes().to_vec();
        raw.push(recovery_id.to_byte());

        let signers = recover_signers(&hex::encode(prehash), &[hex::encode(&raw)]);
        assert_eq!(signers, vec![address_from_key(key.verifying_key())]);
    }

    #[test]
    fn legacy_v_values_are_normalized() {
        let key = test_key();
        let prehash = [0xcdu8; 32];
        let (signature, recovery_id) = key.sign_prehash_recoverable(&prehash).unwrap();

        let mut raw = signature.to_bytes().to_vec();
        raw.push(recovery_id.to_byte() + 27);

        let signers = recover_signers(&hex::encode(prehash), &[hex::encode(&raw)]);
        assert_eq!(signers, vec![address_from_key(key.verifying_key())]);
    }

    #[test]
    fn garbage_signatures_are_skipped() {
        let signers = recover_signers(
            &hex::encode([0u8; 32]),
            &["zz".to_string(), hex::encode([0u8; 10])],
        );
        assert!(signers.is_empty());
    }

    #[test]
    fn invalid_tx_id_yields_no_signers() {
        let signers = recover_signers("not-hex", &[hex::encode([0u8; 65])]);
        assert!(signers.is_empty());
    }

    #[test]
    fn addresses_are_base58check_with_t_prefix() {
        let address = address_from_key(test_key().verifying_key());
        // 0x41-prefixed payloads always encode to a leading 'T'.
        assert!(address.starts_with('T'), "got {address}");
    }
}
