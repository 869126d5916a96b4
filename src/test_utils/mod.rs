//! Fixtures shared by the tests of this crate.

use std::num::NonZeroU32;

use cosmian_crypto_core::reexport::rand_core::{self, CryptoRng, RngCore};

use crate::{
    abe_policy::{gen_namespace, AttributeSet},
    core::{api::RoleCrypt, AttributeSecretKey, MasterSecretKey, PublicParameters},
    Error,
};

/// Starts an epoch over the test namespace.
pub fn gen_epoch(rc: &RoleCrypt) -> Result<(PublicParameters, MasterSecretKey), Error> {
    rc.setup(&gen_namespace()?)
}

/// Issues a key for the given role only.
pub fn gen_role_key(
    rc: &RoleCrypt,
    msk: &MasterSecretKey,
    role: &str,
) -> Result<AttributeSecretKey, Error> {
    rc.generate_key(msk, &AttributeSet::try_from_pairs([("role", role)])?)
}

/// A random source refusing every fallible draw.
#[derive(Debug, Default)]
pub struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand_core::Error> {
        Err(rand_core::Error::from(NonZeroU32::MIN))
    }
}

impl CryptoRng for FailingRng {}
