//! Implements the serialization methods of the public parameters, the keys
//! and the ciphertexts.

use std::collections::{BTreeMap, BTreeSet};

use cosmian_crypto_core::{FixedSizeCBytes, R25519PrivateKey, R25519PublicKey};

use super::{
    AttributeSecretKey, Ciphertext, Encapsulation, PublicParameters, EPOCH_ID_LENGTH,
    KMAC_LENGTH, SYM_KEY_LENGTH, TAG_LENGTH,
};
use crate::{
    abe_policy::{AccessPolicy, AttributeSet, Namespace, MAX_COORDINATES},
    bytes_ser_de::{to_leb128_len, Deserializer, Serializable, Serializer},
    Error,
};

fn read_public_key(de: &mut Deserializer) -> Result<R25519PublicKey, Error> {
    Ok(R25519PublicKey::try_from_bytes(
        de.read_array::<{ R25519PublicKey::LENGTH }>()?,
    )?)
}

fn read_private_key(de: &mut Deserializer) -> Result<R25519PrivateKey, Error> {
    Ok(R25519PrivateKey::try_from_bytes(
        de.read_array::<{ R25519PrivateKey::LENGTH }>()?,
    )?)
}

impl Serializable for PublicParameters {
    fn length(&self) -> usize {
        EPOCH_ID_LENGTH
            + self.namespace.length()
            + 2 * R25519PublicKey::LENGTH
            + to_leb128_len(self.subkeys.len())
            + self
                .subkeys
                .keys()
                .map(|coordinate| coordinate.length() + R25519PublicKey::LENGTH)
                .sum::<usize>()
    }

    fn write(&self, ser: &mut Serializer) -> Result<usize, Error> {
        let mut n = ser.write_array(&self.epoch)?;
        n += ser.write(&self.namespace)?;
        n += ser.write_array(&self.g1.to_bytes())?;
        n += ser.write_array(&self.g2.to_bytes())?;
        n += ser.write_leb128_u64(self.subkeys.len() as u64)?;
        for (coordinate, h_i) in &self.subkeys {
            n += ser.write(coordinate)?;
            n += ser.write_array(&h_i.to_bytes())?;
        }
        Ok(n)
    }

    fn read(de: &mut Deserializer) -> Result<Self, Error> {
        let epoch = de.read_array::<EPOCH_ID_LENGTH>()?;
        let namespace = de.read::<Namespace>()?;
        let g1 = read_public_key(de)?;
        let g2 = read_public_key(de)?;
        let n_coordinates = de.read_count(MAX_COORDINATES)?;
        let mut subkeys = BTreeMap::new();
        for _ in 0..n_coordinates {
            let coordinate = de.read::<AttributeSet>()?;
            let h_i = read_public_key(de)?;
            subkeys.insert(coordinate, h_i);
        }
        let expected = namespace.coordinates().into_iter().collect::<BTreeSet<_>>();
        if !subkeys.keys().eq(expected.iter()) {
            return Err(Error::Marshal(
                "public subkeys do not match the namespace coordinates".to_string(),
            ));
        }
        Ok(Self {
            epoch,
            namespace,
            g1,
            g2,
            subkeys,
        })
    }
}

impl Serializable for AttributeSecretKey {
    fn length(&self) -> usize {
        EPOCH_ID_LENGTH + self.attributes.length() + 3 * R25519PrivateKey::LENGTH + KMAC_LENGTH
    }

    fn write(&self, ser: &mut Serializer) -> Result<usize, Error> {
        let mut n = ser.write_array(&self.epoch)?;
        n += ser.write(&self.attributes)?;
        n += ser.write_array(&self.a.to_bytes())?;
        n += ser.write_array(&self.b.to_bytes())?;
        n += ser.write_array(&self.x.to_bytes())?;
        n += ser.write_array(&self.kmac)?;
        Ok(n)
    }

    fn read(de: &mut Deserializer) -> Result<Self, Error> {
        let epoch = de.read_array::<EPOCH_ID_LENGTH>()?;
        let attributes = de.read::<AttributeSet>()?;
        if attributes.is_empty() {
            return Err(Error::Marshal("a key needs at least one attribute".to_string()));
        }
        let a = read_private_key(de)?;
        let b = read_private_key(de)?;
        let x = read_private_key(de)?;
        let kmac = de.read_array::<KMAC_LENGTH>()?;
        Ok(Self {
            epoch,
            attributes,
            a,
            b,
            x,
            kmac,
        })
    }
}

impl Serializable for Encapsulation {
    fn length(&self) -> usize {
        2 * R25519PublicKey::LENGTH
            + TAG_LENGTH
            + to_leb128_len(self.encs.len())
            + self.encs.len() * SYM_KEY_LENGTH
    }

    fn write(&self, ser: &mut Serializer) -> Result<usize, Error> {
        let mut n = ser.write_array(&self.c1.to_bytes())?;
        n += ser.write_array(&self.c2.to_bytes())?;
        n += ser.write_array(&self.tag)?;
        n += ser.write_leb128_u64(self.encs.len() as u64)?;
        for e_i in &self.encs {
            n += ser.write_array(e_i)?;
        }
        Ok(n)
    }

    fn read(de: &mut Deserializer) -> Result<Self, Error> {
        let c1 = read_public_key(de)?;
        let c2 = read_public_key(de)?;
        let tag = de.read_array::<TAG_LENGTH>()?;
        let n_encs = de.read_count(MAX_COORDINATES)?;
        if n_encs == 0 {
            return Err(Error::Marshal("empty encapsulation".to_string()));
        }
        let encs = (0..n_encs)
            .map(|_| de.read_array::<SYM_KEY_LENGTH>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { c1, c2, tag, encs })
    }
}

impl Serializable for Ciphertext {
    fn length(&self) -> usize {
        let policy_len = self.policy.to_string().len();
        EPOCH_ID_LENGTH
            + to_leb128_len(policy_len)
            + policy_len
            + self.encapsulation.length()
            + to_leb128_len(self.payload.len())
            + self.payload.len()
    }

    fn write(&self, ser: &mut Serializer) -> Result<usize, Error> {
        let mut n = ser.write_array(&self.epoch)?;
        n += ser.write_vec(self.policy.to_string().as_bytes())?;
        n += ser.write(&self.encapsulation)?;
        n += ser.write_vec(&self.payload)?;
        Ok(n)
    }

    fn read(de: &mut Deserializer) -> Result<Self, Error> {
        let epoch = de.read_array::<EPOCH_ID_LENGTH>()?;
        let text = de.read_string()?;
        let policy =
            AccessPolicy::parse(&text).map_err(|e| Error::Marshal(e.to_string()))?;
        // Only the canonical form is accepted: any other spelling of the same
        // policy is a modified ciphertext.
        if policy.to_string() != text {
            return Err(Error::Marshal(
                "the policy is not in canonical form".to_string(),
            ));
        }
        let encapsulation = de.read::<Encapsulation>()?;
        let payload = de.read_vec()?;
        Ok(Self {
            epoch,
            policy,
            encapsulation,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abe_policy::{gen_namespace, AccessPolicy, AttributeSet},
        core::api::RoleCrypt,
    };

    #[test]
    fn test_public_parameters_serialization() -> Result<(), Error> {
        let rc = RoleCrypt::default();
        let (pp, _msk) = rc.setup(&gen_namespace()?)?;
        let bytes = pp.serialize()?;
        assert_eq!(bytes.len(), pp.length());
        assert_eq!(PublicParameters::deserialize(&bytes)?, pp);
        Ok(())
    }

    #[test]
    fn test_key_serialization() -> Result<(), Error> {
        let rc = RoleCrypt::default();
        let (_pp, msk) = rc.setup(&gen_namespace()?)?;
        let key = rc.generate_key(
            &msk,
            &AttributeSet::try_from_pairs([("role", "teacher"), ("dept", "math")])?,
        )?;
        let bytes = key.serialize()?;
        assert_eq!(bytes.len(), key.length());
        let decoded = AttributeSecretKey::deserialize(&bytes)?;
        assert_eq!(decoded, key);
        rc.verify_key(&msk, &decoded)?;
        Ok(())
    }

    #[test]
    fn test_ciphertext_serialization() -> Result<(), Error> {
        let rc = RoleCrypt::default();
        let (pp, _msk) = rc.setup(&gen_namespace()?)?;
        let policy = AccessPolicy::parse("role:teacher || (role:student && not dept:math)")?;
        let ciphertext = rc.encrypt(&pp, &policy, b"exam subjects")?;
        let bytes = ciphertext.serialize()?;
        assert_eq!(bytes.len(), ciphertext.length());
        assert_eq!(Ciphertext::deserialize(&bytes)?, ciphertext);

        // trailing data
        let mut extended = bytes.to_vec();
        extended.push(0);
        assert!(Ciphertext::deserialize(&extended).is_err());

        // non-canonical spelling of the same policy
        let mut ser = Serializer::new();
        ser.write_array(ciphertext.epoch())?;
        ser.write_vec(b"role:teacher OR (role:student AND NOT dept:math)")?;
        ser.write(ciphertext.encapsulation())?;
        ser.write_vec(&ciphertext.payload)?;
        assert!(Ciphertext::deserialize(&ser.finalize()).is_err());
        Ok(())
    }

    #[test]
    fn test_truncated_inputs_are_rejected() -> Result<(), Error> {
        let rc = RoleCrypt::default();
        let (pp, msk) = rc.setup(&gen_namespace()?)?;
        let key = rc.generate_key(&msk, &AttributeSet::try_from_pairs([("role", "admin")])?)?;
        let ciphertext = rc.encrypt(&pp, &AccessPolicy::term("role", "admin"), b"")?;

        let key_bytes = key.serialize()?;
        for i in 0..key_bytes.len() {
            assert!(AttributeSecretKey::deserialize(&key_bytes[..i]).is_err());
        }
        let ciphertext_bytes = ciphertext.serialize()?;
        for i in 0..ciphertext_bytes.len() {
            assert!(Ciphertext::deserialize(&ciphertext_bytes[..i]).is_err());
        }
        let pp_bytes = pp.serialize()?;
        assert!(PublicParameters::deserialize(&pp_bytes[..pp_bytes.len() - 1]).is_err());
        Ok(())
    }
}
