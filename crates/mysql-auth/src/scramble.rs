//! Password scramble computations shared by the built-in plugins.

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Compute the `mysql_native_password` response.
///
/// `SHA1(password) XOR SHA1(scramble + SHA1(SHA1(password)))`, 20 bytes.
/// An empty password produces an empty response.
#[must_use]
pub fn native_password(password: &str, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    // Servers send a 20-byte scramble, sometimes with a trailing nul.
    let seed = if scramble.len() > 20 {
        &scramble[..20]
    } else {
        scramble
    };

    let stage1: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();

    let mut hasher = Sha1::new();
    hasher.update(seed);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    stage1
        .iter()
        .zip(stage3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// Compute the `caching_sha2_password` fast-auth response.
///
/// `XOR(SHA256(password), SHA256(SHA256(SHA256(password)) + scramble))`,
/// 32 bytes. An empty password produces an empty response.
#[must_use]
pub fn sha2_password(password: &str, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    // Strip the trailing nul the server appends to its 20-byte nonce.
    let seed = if scramble.len() == 21 && scramble.last() == Some(&0) {
        &scramble[..20]
    } else {
        scramble
    };

    let hash1: [u8; 32] = Sha256::digest(password.as_bytes()).into();
    let hash2: [u8; 32] = Sha256::digest(hash1).into();

    let mut hasher = Sha256::new();
    hasher.update(hash2);
    hasher.update(seed);
    let hash3: [u8; 32] = hasher.finalize().into();

    hash1.iter().zip(hash3.iter()).map(|(a, b)| a ^ b).collect()
}

/// Nul-terminate a password and XOR it with the scramble, repeating the
/// scramble as needed. This obfuscated form is what gets RSA-encrypted
/// during full authentication.
#[must_use]
pub fn xor_with_scramble(password: &str, scramble: &[u8]) -> Vec<u8> {
    let mut bytes = password.as_bytes().to_vec();
    bytes.push(0);
    if scramble.is_empty() {
        return bytes;
    }
    for (i, b) in bytes.iter_mut().enumerate() {
        *b ^= scramble[i % scramble.len()];
    }
    bytes
}

/// Encrypt an XOR-obfuscated password with the server's RSA public key.
///
/// The key arrives as PEM text; both PKCS#8 (`BEGIN PUBLIC KEY`) and
/// PKCS#1 (`BEGIN RSA PUBLIC KEY`) encodings occur in the wild. MySQL
/// 8.0.5+ expects OAEP padding for `caching_sha2_password`; older servers
/// and `sha256_password` use PKCS#1 v1.5.
pub fn rsa_encrypt_password(
    password: &str,
    scramble: &[u8],
    public_key_pem: &[u8],
    oaep: bool,
) -> Result<Vec<u8>, AuthError> {
    let obfuscated = xor_with_scramble(password, scramble);

    let pem = std::str::from_utf8(public_key_pem)
        .map_err(|e| AuthError::Rsa(format!("public key is not UTF-8 PEM: {e}")))?;

    let key = RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| AuthError::Rsa(format!("failed to parse public key: {e}")))?;

    let encrypted = if oaep {
        key.encrypt(&mut OsRng, rsa::Oaep::new::<Sha1>(), &obfuscated)
    } else {
        key.encrypt(&mut OsRng, rsa::Pkcs1v15Encrypt, &obfuscated)
    }
    .map_err(|e| AuthError::Rsa(format!("encryption failed: {e}")))?;

    Ok(encrypted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: [u8; 20] = [
        0x3D, 0x4C, 0x5E, 0x2F, 0x1A, 0x0B, 0x7C, 0x8D, 0x9E, 0xAF, 0x10, 0x21, 0x32, 0x43, 0x54,
        0x65, 0x76, 0x87, 0x98, 0xA9,
    ];

    #[test]
    fn test_native_password_shape() {
        let response = native_password("p@ssw0rd", &SEED);
        assert_eq!(response.len(), 20);
        assert_eq!(response, native_password("p@ssw0rd", &SEED));
        assert_ne!(response, native_password("other", &SEED));
    }

    #[test]
    fn test_native_password_empty() {
        assert!(native_password("", &SEED).is_empty());
    }

    #[test]
    fn test_sha2_password_shape() {
        let response = sha2_password("p@ssw0rd", &SEED);
        assert_eq!(response.len(), 32);
        assert_eq!(response, sha2_password("p@ssw0rd", &SEED));
    }

    #[test]
    fn test_sha2_password_ignores_trailing_nul() {
        let mut seed_nul = SEED.to_vec();
        seed_nul.push(0);
        assert_eq!(sha2_password("secret", &seed_nul), sha2_password("secret", &SEED));
    }

    #[test]
    fn test_xor_with_scramble_reversible() {
        let obfuscated = xor_with_scramble("test", &SEED[..8]);
        assert_eq!(obfuscated.len(), 5);
        let recovered: Vec<u8> = obfuscated
            .iter()
            .enumerate()
            .map(|(i, &b)| b ^ SEED[i % 8])
            .collect();
        assert_eq!(&recovered[..4], b"test");
        assert_eq!(recovered[4], 0);
    }

    #[test]
    fn test_rsa_rejects_garbage_key() {
        let result = rsa_encrypt_password("pw", &SEED, b"not a pem", true);
        assert!(matches!(result, Err(AuthError::Rsa(_))));
    }
}
