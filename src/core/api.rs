use std::sync::{Mutex, MutexGuard, PoisonError};

use cosmian_crypto_core::{
    reexport::rand_core::{RngCore, SeedableRng},
    CsRng,
};
use zeroize::Zeroizing;

use super::{
    associated_data, dem, epoch_to_hex,
    primitives::{decaps, encaps, keygen, setup, verify_key},
    AttributeSecretKey, Ciphertext, MasterSecretKey, PublicParameters,
};
use crate::{
    abe_policy::{AccessPolicy, AttributeSet, Namespace},
    bytes_ser_de::Serializable,
    Error,
};

/// Entry point of the scheme.
///
/// Owns the random number generator shared by all the operations consuming
/// randomness. Epoch material is passed explicitly to each call, so several
/// epochs can be used side by side with the same instance.
#[derive(Debug)]
pub struct RoleCrypt {
    rng: Mutex<CsRng>,
}

impl Default for RoleCrypt {
    fn default() -> Self {
        Self {
            rng: Mutex::new(CsRng::from_entropy()),
        }
    }
}

impl RoleCrypt {
    /// Creates an instance drawing its randomness from the given seed.
    ///
    /// Two instances created from the same seed produce the same epochs and
    /// keys: only use this for tests and benchmarks.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: Mutex::new(CsRng::from_seed(seed)),
        }
    }

    // A panic while holding the lock cannot leave the generator in an
    // inconsistent state.
    fn rng(&self) -> MutexGuard<'_, CsRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a generator seeded from the shared one. The lock is only held
    /// for the seed draw, so concurrent operations do not wait on each other.
    fn fork(&self) -> CsRng {
        let mut seed = Zeroizing::new([0; 32]);
        self.rng().fill_bytes(&mut *seed);
        CsRng::from_seed(*seed)
    }

    /// Starts a new epoch: generates its public parameters and master secret
    /// key for the given namespace.
    pub fn setup(
        &self,
        namespace: &Namespace,
    ) -> Result<(PublicParameters, MasterSecretKey), Error> {
        let (pp, msk) = setup(&mut self.fork(), namespace)?;
        tracing::info!(
            epoch = %epoch_to_hex(pp.epoch()),
            coordinates = pp.count(),
            "new epoch"
        );
        Ok((pp, msk))
    }

    /// Issues a key bound to the given attributes.
    pub fn generate_key(
        &self,
        msk: &MasterSecretKey,
        attributes: &AttributeSet,
    ) -> Result<AttributeSecretKey, Error> {
        let key = keygen(&mut self.fork(), msk, attributes)?;
        tracing::debug!(epoch = %epoch_to_hex(msk.epoch()), ?attributes, "key issued");
        Ok(key)
    }

    /// Checks the given key was issued under the given master secret key and
    /// was not altered since.
    pub fn verify_key(&self, msk: &MasterSecretKey, key: &AttributeSecretKey) -> Result<(), Error> {
        verify_key(msk, key)
    }

    /// Encrypts the plaintext for all the attribute sets satisfying the given
    /// policy.
    ///
    /// # Errors
    ///
    /// Fails with `Error::Encryption` if the policy references attributes
    /// outside the namespace, cannot be satisfied or if the random source
    /// fails.
    pub fn encrypt(
        &self,
        pp: &PublicParameters,
        policy: &AccessPolicy,
        plaintext: &[u8],
    ) -> Result<Ciphertext, Error> {
        let mut rng = self.fork();
        let (sym_key, encapsulation) = encaps(&mut rng, pp, policy)?;
        let payload = dem::encrypt(
            &mut rng,
            &sym_key,
            plaintext,
            &associated_data(pp.epoch(), policy),
        )?;
        tracing::debug!(
            epoch = %epoch_to_hex(pp.epoch()),
            %policy,
            coordinates = encapsulation.count(),
            "encrypted"
        );
        Ok(Ciphertext {
            epoch: pp.epoch,
            policy: policy.clone(),
            encapsulation,
            payload,
        })
    }

    /// Decrypts the ciphertext with the given key.
    ///
    /// # Errors
    ///
    /// - `Error::AccessDenied` if the key comes from another epoch or its
    ///   attributes do not satisfy the ciphertext policy;
    /// - `Error::CorruptCiphertext` if the encapsulation or the payload do
    ///   not verify.
    pub fn decrypt(
        &self,
        key: &AttributeSecretKey,
        ciphertext: &Ciphertext,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        if key.epoch != ciphertext.epoch || !ciphertext.policy.evaluate(&key.attributes) {
            return Err(Error::AccessDenied);
        }
        let sym_key = decaps(key, &ciphertext.encapsulation)?;
        dem::decrypt(
            &sym_key,
            &ciphertext.payload,
            &associated_data(&ciphertext.epoch, &ciphertext.policy),
        )
    }

    /// Decodes and decrypts the given ciphertext bytes. A ciphertext that
    /// cannot be decoded is reported as `Error::CorruptCiphertext`.
    pub fn decrypt_bytes(
        &self,
        key: &AttributeSecretKey,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let ciphertext =
            Ciphertext::deserialize(ciphertext).map_err(|_| Error::CorruptCiphertext)?;
        self.decrypt(key, &ciphertext)
    }
}
