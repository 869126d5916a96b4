//! Implements the cryptographic primitives of the scheme: setup, key
//! generation and the key encapsulation mechanism.
//!
//! Each non-empty coordinate `c` of the namespace gets a secret `x_c` and a
//! public subkey `H_c = h * x_c`, where `h = g * s`. A key for the attribute
//! set `c` holds `x_c` and a fresh pair `(a, b)` with `a * s1 + b * s2 = s`,
//! so that `(c1 * a + c2 * b) * x_c = H_c * r` for any encapsulation
//! `(c1, c2) = (g1 * r, g2 * r)`.

use std::collections::BTreeMap;

use cosmian_crypto_core::{
    kdf256,
    reexport::rand_core::{CryptoRngCore, RngCore, SeedableRng},
    CsRng, FixedSizeCBytes, R25519PrivateKey, R25519PublicKey, RandomFixedSizeCBytes,
    SymmetricKey,
};
use zeroize::Zeroizing;

use super::{
    AttributeSecretKey, Encapsulation, EpochId, KmacSignature, MasterSecretKey, PublicParameters,
    EPOCH_ID_LENGTH, KMAC_KEY_LENGTH, KMAC_LENGTH, SYM_KEY_LENGTH, TAG_LENGTH,
};
use crate::{
    abe_policy::{AccessPolicy, AttributeSet, Namespace, MAX_POLICY_DEPTH},
    bytes_ser_de::Serializable,
    Error,
};

/// Additional information to generate symmetric key using the KDF.
pub(crate) const KEY_GEN_INFO: &[u8] = b"key generation info";

/// Xor the two given byte arrays in place.
fn xor_in_place<const LENGTH: usize>(a: &mut [u8; LENGTH], b: &[u8; LENGTH]) {
    for (a_i, b_i) in a.iter_mut().zip(b.iter()) {
        *a_i ^= b_i;
    }
}

/// Draws a seed from the given source and returns a generator seeded with
/// it. This is the only draw that can fail.
fn fork_rng(rng: &mut impl CryptoRngCore) -> Result<CsRng, String> {
    let mut seed = Zeroizing::new([0; 32]);
    rng.try_fill_bytes(&mut *seed)
        .map_err(|e| format!("random source failure: {e}"))?;
    Ok(CsRng::from_seed(*seed))
}

/// Computes the signature of the given key.
fn compute_key_kmac(
    msk: &MasterSecretKey,
    key: &AttributeSecretKey,
) -> Result<KmacSignature, Error> {
    let attributes = key.attributes.serialize()?;
    Ok(kmac!(
        KMAC_LENGTH,
        &msk.kmac_key,
        &key.epoch,
        &attributes,
        &key.a.to_bytes(),
        &key.b.to_bytes(),
        &key.x.to_bytes()
    ))
}

/// Generates the public parameters and the master secret key of a new epoch
/// for the given namespace.
///
/// # Parameters
///
/// - `rng`         : random number generator
/// - `namespace`   : attribute namespace of the epoch
pub fn setup(
    rng: &mut impl CryptoRngCore,
    namespace: &Namespace,
) -> Result<(PublicParameters, MasterSecretKey), Error> {
    if namespace.is_empty() {
        return Err(Error::Setup(
            "the namespace declares no attribute".to_string(),
        ));
    }
    let mut rng = fork_rng(rng).map_err(Error::Setup)?;

    let mut epoch: EpochId = [0; EPOCH_ID_LENGTH];
    rng.fill_bytes(&mut epoch);

    let s = R25519PrivateKey::new(&mut rng);
    let s1 = R25519PrivateKey::new(&mut rng);
    let s2 = R25519PrivateKey::new(&mut rng);
    let h = R25519PublicKey::from(&s);
    let g1 = R25519PublicKey::from(&s1);
    let g2 = R25519PublicKey::from(&s2);

    let mut sub_sk = BTreeMap::new();
    let mut sub_pk = BTreeMap::new();
    for coordinate in namespace.coordinates() {
        let x_i = R25519PrivateKey::new(&mut rng);
        sub_pk.insert(coordinate.clone(), &h * &x_i);
        sub_sk.insert(coordinate, x_i);
    }

    let kmac_key = SymmetricKey::<KMAC_KEY_LENGTH>::new(&mut rng);

    Ok((
        PublicParameters {
            epoch,
            namespace: namespace.clone(),
            g1,
            g2,
            subkeys: sub_pk,
        },
        MasterSecretKey {
            epoch,
            namespace: namespace.clone(),
            s,
            s1,
            s2,
            subkeys: sub_sk,
            kmac_key,
        },
    ))
}

/// Generates a key for the given attribute set, signed with the KMAC key of
/// the master secret key.
///
/// # Parameters
///
/// - `rng`         : random number generator
/// - `msk`         : master secret key
/// - `attributes`  : attributes the key is bound to
pub fn keygen(
    rng: &mut impl CryptoRngCore,
    msk: &MasterSecretKey,
    attributes: &AttributeSet,
) -> Result<AttributeSecretKey, Error> {
    if attributes.is_empty() {
        return Err(Error::KeyGeneration(
            "a key needs at least one attribute".to_string(),
        ));
    }
    msk.namespace
        .check_attributes(attributes)
        .map_err(|attribute| {
            Error::KeyGeneration(format!("attribute {attribute} is not declared"))
        })?;
    let x = msk.subkeys.get(attributes).cloned().ok_or_else(|| {
        Error::KeyGeneration("master secret key and namespace are not in sync".to_string())
    })?;

    let mut rng = fork_rng(rng).map_err(Error::KeyGeneration)?;
    let a = R25519PrivateKey::new(&mut rng);
    let b = &(&msk.s - &(&a * &msk.s1)) / &msk.s2;

    let mut key = AttributeSecretKey {
        epoch: msk.epoch,
        attributes: attributes.clone(),
        a,
        b,
        x,
        kmac: [0; KMAC_LENGTH],
    };
    key.kmac = compute_key_kmac(msk, &key)?;
    Ok(key)
}

/// Checks the given key was issued with this master secret key and was not
/// altered since.
///
/// # Errors
///
/// Fails with `Error::AccessDenied` on a key from another epoch or a key
/// whose signature does not match.
pub fn verify_key(msk: &MasterSecretKey, key: &AttributeSecretKey) -> Result<(), Error> {
    if key.epoch != msk.epoch {
        return Err(Error::AccessDenied);
    }
    if compute_key_kmac(msk, key)? != key.kmac {
        return Err(Error::AccessDenied);
    }
    Ok(())
}

/// Generates an encapsulation of a random symmetric key for every coordinate
/// satisfying the given access policy. Returns both the symmetric key and its
/// encapsulation.
///
/// # Parameters
///
/// - `rng`     : secure random number generator
/// - `pp`      : public parameters
/// - `policy`  : access policy
pub fn encaps(
    rng: &mut impl CryptoRngCore,
    pp: &PublicParameters,
    policy: &AccessPolicy,
) -> Result<(SymmetricKey<SYM_KEY_LENGTH>, Encapsulation), Error> {
    pp.namespace.check_policy(policy).map_err(|attribute| {
        Error::Encryption(format!("attribute {attribute} is not declared"))
    })?;
    // The policy text is embedded in the ciphertext and must parse back.
    if policy.depth() > MAX_POLICY_DEPTH {
        return Err(Error::Encryption(format!(
            "policy nesting exceeds the maximum depth of {MAX_POLICY_DEPTH}"
        )));
    }
    let targets = pp
        .subkeys
        .iter()
        .filter(|(coordinate, _)| policy.evaluate(coordinate))
        .map(|(_, h_i)| h_i)
        .collect::<Vec<_>>();
    if targets.is_empty() {
        return Err(Error::Encryption(format!(
            "no attribute set satisfies the policy {policy}"
        )));
    }

    let mut rng = fork_rng(rng).map_err(Error::Encryption)?;
    let mut seed = Zeroizing::new([0; SYM_KEY_LENGTH]);
    rng.fill_bytes(&mut *seed);

    let r = R25519PrivateKey::new(&mut rng);
    let c1 = &pp.g1 * &r;
    let c2 = &pp.g2 * &r;
    let encs = targets
        .into_iter()
        .map(|h_i| {
            let mut e_i = [0; SYM_KEY_LENGTH];
            kdf256!(&mut e_i, &(h_i * &r).to_bytes());
            xor_in_place(&mut e_i, &*seed);
            e_i
        })
        .collect();
    let (tag, key) = eakem_hash!(TAG_LENGTH, SYM_KEY_LENGTH, &*seed, KEY_GEN_INFO)
        .map_err(|e| Error::Encryption(e.to_string()))?;
    Ok((key, Encapsulation { c1, c2, tag, encs }))
}

/// Tries to open the given encapsulation with the given key. Returns the
/// encapsulated symmetric key.
///
/// # Error
///
/// Fails with `Error::CorruptCiphertext` if no encapsulation opens under the
/// key.
///
/// # Parameters
///
/// - `key`             : attribute secret key
/// - `encapsulation`   : symmetric key encapsulation
pub fn decaps(
    key: &AttributeSecretKey,
    encapsulation: &Encapsulation,
) -> Result<SymmetricKey<SYM_KEY_LENGTH>, Error> {
    let precomp = &(&encapsulation.c1 * &key.a) + &(&encapsulation.c2 * &key.b);
    let mut mask = Zeroizing::new([0; SYM_KEY_LENGTH]);
    kdf256!(&mut *mask, &(&precomp * &key.x).to_bytes());
    for e_i in &encapsulation.encs {
        let mut seed = Zeroizing::new(*e_i);
        xor_in_place(&mut *seed, &*mask);
        let (tag, sym_key) = eakem_hash!(TAG_LENGTH, SYM_KEY_LENGTH, &*seed, KEY_GEN_INFO)?;
        if tag == encapsulation.tag {
            return Ok(sym_key);
        }
    }
    Err(Error::CorruptCiphertext)
}
