//! AES-256-GCM encryption of the payload under the encapsulated key.
//!
//! The payload is `nonce || ciphertext || mac`.

use cosmian_crypto_core::{
    reexport::rand_core::CryptoRngCore, Aes256Gcm, Dem, FixedSizeCBytes, Instantiable, Nonce,
    RandomFixedSizeCBytes, SymmetricKey,
};
use zeroize::Zeroizing;

use super::SYM_KEY_LENGTH;
use crate::Error;

/// Encrypts the plaintext with a fresh random nonce, authenticating the
/// given associated data.
pub fn encrypt(
    rng: &mut impl CryptoRngCore,
    key: &SymmetricKey<SYM_KEY_LENGTH>,
    ptx: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, Error> {
    let nonce = Nonce::<{ Aes256Gcm::NONCE_LENGTH }>::new(&mut *rng);
    let ciphertext = Aes256Gcm::new(key)
        .encrypt(&nonce, ptx, Some(aad))
        .map_err(|e| Error::Encryption(e.to_string()))?;
    Ok([nonce.as_bytes(), &ciphertext].concat())
}

/// Decrypts the given payload. Nothing is released unless the MAC over the
/// ciphertext and the associated data verifies.
pub fn decrypt(
    key: &SymmetricKey<SYM_KEY_LENGTH>,
    ctx: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, Error> {
    if ctx.len() < Aes256Gcm::NONCE_LENGTH + Aes256Gcm::MAC_LENGTH {
        return Err(Error::CorruptCiphertext);
    }
    let nonce = Nonce::<{ Aes256Gcm::NONCE_LENGTH }>::try_from_slice(
        &ctx[..Aes256Gcm::NONCE_LENGTH],
    )
    .map_err(|_| Error::CorruptCiphertext)?;
    Aes256Gcm::new(key)
        .decrypt(&nonce, &ctx[Aes256Gcm::NONCE_LENGTH..], Some(aad))
        .map(Zeroizing::new)
        .map_err(|_| Error::CorruptCiphertext)
}

#[cfg(test)]
mod tests {
    use cosmian_crypto_core::{reexport::rand_core::SeedableRng, CsRng};

    use super::*;

    #[test]
    fn test_dem() -> Result<(), Error> {
        let mut rng = CsRng::from_entropy();
        let key = SymmetricKey::<SYM_KEY_LENGTH>::new(&mut rng);
        let ptx = b"grades of the second semester";

        let ctx = encrypt(&mut rng, &key, ptx, b"aad")?;
        assert_eq!(
            ctx.len(),
            Aes256Gcm::NONCE_LENGTH + ptx.len() + Aes256Gcm::MAC_LENGTH
        );
        assert_eq!(&**decrypt(&key, &ctx, b"aad")?, ptx);

        // wrong associated data
        assert_eq!(decrypt(&key, &ctx, b"aae"), Err(Error::CorruptCiphertext));
        // wrong key
        let other_key = SymmetricKey::<SYM_KEY_LENGTH>::new(&mut rng);
        assert_eq!(decrypt(&other_key, &ctx, b"aad"), Err(Error::CorruptCiphertext));
        // truncated
        assert_eq!(
            decrypt(&key, &ctx[..Aes256Gcm::NONCE_LENGTH], b"aad"),
            Err(Error::CorruptCiphertext)
        );
        Ok(())
    }

    #[test]
    fn test_empty_plaintext() -> Result<(), Error> {
        let mut rng = CsRng::from_entropy();
        let key = SymmetricKey::<SYM_KEY_LENGTH>::new(&mut rng);
        let ctx = encrypt(&mut rng, &key, b"", b"")?;
        assert!(decrypt(&key, &ctx, b"")?.is_empty());
        Ok(())
    }
}
