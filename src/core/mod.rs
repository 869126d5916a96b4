//! Implements the core functionalities of the role-based encryption scheme.

use std::{collections::BTreeMap, fmt::Debug};

use cosmian_crypto_core::{R25519PrivateKey, R25519PublicKey, SymmetricKey};

use crate::abe_policy::{AccessPolicy, AttributeSet, Namespace};

#[macro_use]
pub mod macros;

pub mod api;
pub mod dem;
pub mod primitives;
pub mod serialization;


/// Length of the random identifier of a setup epoch.
pub const EPOCH_ID_LENGTH: usize = 16;
pub type EpochId = [u8; EPOCH_ID_LENGTH];

/// The symmetric key is 32 bytes long to provide 128 bits of post-quantum
/// security.
pub const SYM_KEY_LENGTH: usize = 32;

/// The length of the KMAC key.
pub const KMAC_KEY_LENGTH: usize = 16;

/// The length of the KMAC output.
const KMAC_LENGTH: usize = 32;
type KmacSignature = [u8; KMAC_LENGTH];

/// Length of the encapsulation tag
const TAG_LENGTH: usize = 16;
type Tag = [u8; TAG_LENGTH];

/// Hexadecimal form of an epoch identifier, used in logs.
#[must_use]
pub fn epoch_to_hex(epoch: &EpochId) -> String {
    epoch.iter().map(|b| format!("{b:02x}")).collect()
}

/// Public material of an epoch, needed to encrypt.
///
/// Holds one public subkey per non-empty coordinate of the namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicParameters {
    epoch: EpochId,
    namespace: Namespace,
    g1: R25519PublicKey,
    g2: R25519PublicKey,
    subkeys: BTreeMap<AttributeSet, R25519PublicKey>,
}

impl PublicParameters {
    #[must_use]
    pub fn epoch(&self) -> &EpochId {
        &self.epoch
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Number of coordinates data can be encrypted for.
    #[must_use]
    pub fn count(&self) -> usize {
        self.subkeys.len()
    }
}

/// Secret material of an epoch, needed to issue keys. It has no binary
/// encoding and never leaves the process that created it.
#[derive(PartialEq, Eq)]
pub struct MasterSecretKey {
    epoch: EpochId,
    namespace: Namespace,
    s: R25519PrivateKey,
    s1: R25519PrivateKey,
    s2: R25519PrivateKey,
    subkeys: BTreeMap<AttributeSet, R25519PrivateKey>,
    kmac_key: SymmetricKey<KMAC_KEY_LENGTH>,
}

impl MasterSecretKey {
    #[must_use]
    pub fn epoch(&self) -> &EpochId {
        &self.epoch
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl Debug for MasterSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecretKey")
            .field("epoch", &epoch_to_hex(&self.epoch))
            .field("coordinates", &self.subkeys.len())
            .finish_non_exhaustive()
    }
}

/// A decryption key bound to one attribute set and one epoch.
#[derive(Clone, PartialEq, Eq)]
pub struct AttributeSecretKey {
    epoch: EpochId,
    attributes: AttributeSet,
    a: R25519PrivateKey,
    b: R25519PrivateKey,
    x: R25519PrivateKey,
    kmac: KmacSignature,
}

impl AttributeSecretKey {
    #[must_use]
    pub fn epoch(&self) -> &EpochId {
        &self.epoch
    }

    #[must_use]
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }
}

impl Debug for AttributeSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeSecretKey")
            .field("epoch", &epoch_to_hex(&self.epoch))
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// Encapsulation of a session key for every coordinate satisfying a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encapsulation {
    c1: R25519PublicKey,
    c2: R25519PublicKey,
    tag: Tag,
    encs: Vec<[u8; SYM_KEY_LENGTH]>,
}

impl Encapsulation {
    /// Number of coordinates the session key is encapsulated for.
    #[must_use]
    pub fn count(&self) -> usize {
        self.encs.len()
    }
}

/// Data encrypted under an access policy.
///
/// The policy travels in clear and is authenticated together with the epoch
/// as associated data of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    epoch: EpochId,
    policy: AccessPolicy,
    encapsulation: Encapsulation,
    payload: Vec<u8>,
}

impl Ciphertext {
    #[must_use]
    pub fn epoch(&self) -> &EpochId {
        &self.epoch
    }

    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    #[must_use]
    pub fn encapsulation(&self) -> &Encapsulation {
        &self.encapsulation
    }
}

/// Associated data binding a payload to its epoch and policy.
fn associated_data(epoch: &EpochId, policy: &AccessPolicy) -> Vec<u8> {
    [epoch.as_slice(), policy.to_string().as_bytes()].concat()
}
