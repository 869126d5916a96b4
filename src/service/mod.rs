//! HTTP gateway over the scheme.
//!
//! The gateway holds the current epoch, issues role keys, encrypts under the
//! registered policies only and decrypts with caller-provided keys.

use std::sync::{Arc, PoisonError, RwLock};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroizing;

use crate::{
    abe_policy::{AccessPolicy, AttributeSet, Namespace, PolicyRegistry},
    bytes_ser_de::Serializable,
    core::epoch_to_hex,
    AttributeSecretKey, EpochId, Error, MasterSecretKey, PublicParameters, RoleCrypt,
};

mod config;
mod routes;

pub use config::{ConfigLoader, ServiceConfig, CONFIG_FILE_NAME};
pub use routes::router;

/// Name of the attribute set by the key generation route.
pub const ROLE_ATTRIBUTE: &str = "role";

/// The material of one setup.
#[derive(Debug)]
pub struct Epoch {
    pub pp: PublicParameters,
    pub msk: MasterSecretKey,
}

impl Epoch {
    #[must_use]
    pub fn id(&self) -> &EpochId {
        self.pp.epoch()
    }
}

/// State shared by the request handlers.
pub struct Service {
    rc: RoleCrypt,
    namespace: Namespace,
    registry: PolicyRegistry,
    epoch: RwLock<Arc<Epoch>>,
    admin_token: Option<String>,
    cors_allow_all: bool,
}

impl Service {
    /// Validates the configured namespace and policies and starts the first
    /// epoch.
    pub fn new(config: &ServiceConfig) -> Result<Self, Error> {
        Self::with_crypto(RoleCrypt::default(), config)
    }

    /// Same as `new`, drawing randomness from the given instance.
    pub fn with_crypto(rc: RoleCrypt, config: &ServiceConfig) -> Result<Self, Error> {
        let namespace = Namespace::try_from(config.namespace.clone())?;
        if namespace.dimension(ROLE_ATTRIBUTE).is_none() {
            return Err(Error::Setup(format!(
                "the namespace must declare the {ROLE_ATTRIBUTE} attribute"
            )));
        }
        let registry = PolicyRegistry::new(&namespace, config.policies.iter().cloned())?;
        let (pp, msk) = rc.setup(&namespace)?;
        tracing::info!(
            epoch = %epoch_to_hex(pp.epoch()),
            policies = registry.len(),
            "gateway ready"
        );
        Ok(Self {
            rc,
            namespace,
            registry,
            epoch: RwLock::new(Arc::new(Epoch { pp, msk })),
            admin_token: config.admin_token.clone(),
            cors_allow_all: config.cors_allow_all,
        })
    }

    /// The epoch new keys and ciphertexts are created in. Requests holding
    /// it keep using it after a rotation.
    #[must_use]
    pub fn current_epoch(&self) -> Arc<Epoch> {
        self.epoch
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Looks a registered policy up by its identifier.
    #[must_use]
    pub fn policy(&self, id: &str) -> Option<&AccessPolicy> {
        self.registry.get(id)
    }

    pub(crate) fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    pub(crate) fn cors_allow_all(&self) -> bool {
        self.cors_allow_all
    }

    /// Issues a key for the given role, encoded in base64. Roles outside the
    /// configured namespace are refused with `Error::KeyGeneration`.
    pub fn generate_key(&self, role: &str) -> Result<String, Error> {
        let attributes = AttributeSet::try_from_pairs([(ROLE_ATTRIBUTE, role)])?;
        let epoch = self.current_epoch();
        let key = self.rc.generate_key(&epoch.msk, &attributes)?;
        Ok(STANDARD.encode(&*key.serialize()?))
    }

    /// Encrypts the data under the given policy. Returns the base64 encoding
    /// of the ciphertext.
    pub fn encrypt(&self, policy: &AccessPolicy, data: &[u8]) -> Result<String, Error> {
        let epoch = self.current_epoch();
        let ciphertext = self.rc.encrypt(&epoch.pp, policy, data)?;
        Ok(STANDARD.encode(&*ciphertext.serialize()?))
    }

    /// Decrypts the given encoded ciphertext with the given encoded key.
    ///
    /// The key must have been issued in the current epoch and be unaltered.
    pub fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let key = AttributeSecretKey::deserialize(key)?;
        let epoch = self.current_epoch();
        self.rc.verify_key(&epoch.msk, &key)?;
        self.rc.decrypt_bytes(&key, ciphertext)
    }

    /// Base64 encoding of the current public parameters.
    pub fn public_parameters(&self) -> Result<String, Error> {
        Ok(STANDARD.encode(&*self.current_epoch().pp.serialize()?))
    }

    /// Starts a new epoch. Keys and ciphertexts of the previous epochs stop
    /// being usable with this gateway.
    pub fn rotate(&self) -> Result<EpochId, Error> {
        let (pp, msk) = self.rc.setup(&self.namespace)?;
        let id = *pp.epoch();
        *self.epoch.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Epoch { pp, msk });
        tracing::info!(epoch = %epoch_to_hex(&id), "epoch rotated");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abe_policy::{DimensionBuilder, NamedPolicy};

    fn service() -> Service {
        Service::new(&ServiceConfig::default()).expect("default configuration is valid")
    }

    fn decode(data: &str) -> Vec<u8> {
        STANDARD.decode(data).expect("valid base64")
    }

    #[test]
    fn test_teacher_admin_scenario() -> Result<(), Error> {
        let service = service();
        let teacher = decode(&service.generate_key("teacher")?);
        let admin = decode(&service.generate_key("admin")?);

        let policy_2 = service.policy("2").expect("policy 2 is registered").clone();
        let ciphertext = decode(&service.encrypt(&policy_2, b"marks")?);
        assert_eq!(&**service.decrypt(&teacher, &ciphertext)?, b"marks");
        assert_eq!(service.decrypt(&admin, &ciphertext), Err(Error::AccessDenied));

        let policy_1 = service.policy("1").expect("policy 1 is registered").clone();
        let ciphertext = decode(&service.encrypt(&policy_1, b"calendar")?);
        assert_eq!(&**service.decrypt(&admin, &ciphertext)?, b"calendar");
        Ok(())
    }

    #[test]
    fn test_unknown_role() {
        let service = service();
        assert!(matches!(
            service.generate_key("janitor"),
            Err(Error::KeyGeneration(_))
        ));
        assert!(matches!(
            service.generate_key("not a token"),
            Err(Error::KeyGeneration(_))
        ));
    }

    #[test]
    fn test_altered_keys() -> Result<(), Error> {
        let service = service();
        let key = decode(&service.generate_key("teacher")?);
        let policy = service.policy("2").expect("policy 2 is registered").clone();
        let ciphertext = decode(&service.encrypt(&policy, b"marks")?);

        for length in 0..key.len() {
            assert!(matches!(
                service.decrypt(&key[..length], &ciphertext),
                Err(Error::Marshal(_))
            ));
        }
        for position in 0..key.len() {
            let mut altered = key.clone();
            altered[position] ^= 0x40;
            assert!(service.decrypt(&altered, &ciphertext).is_err());
        }
        assert_eq!(&**service.decrypt(&key, &ciphertext)?, b"marks");
        Ok(())
    }

    #[test]
    fn test_rotation() -> Result<(), Error> {
        let service = service();
        let before = service.current_epoch();
        let key = decode(&service.generate_key("student")?);
        let policy = service.policy("2").expect("policy 2 is registered").clone();
        let ciphertext = decode(&service.encrypt(&policy, b"old")?);

        let id = service.rotate()?;
        assert_ne!(&id, before.id());
        assert_eq!(service.current_epoch().id(), &id);

        // The previous epoch is still usable by whoever holds it.
        let old_key = AttributeSecretKey::deserialize(&key)?;
        let in_flight = service.rc.encrypt(&before.pp, &policy, b"in flight")?;
        assert_eq!(&**service.rc.decrypt(&old_key, &in_flight)?, b"in flight");

        assert_eq!(service.decrypt(&key, &ciphertext), Err(Error::AccessDenied));
        let new_key = decode(&service.generate_key("student")?);
        assert_eq!(
            service.decrypt(&new_key, &ciphertext),
            Err(Error::AccessDenied)
        );
        Ok(())
    }

    #[test]
    fn test_invalid_configurations() {
        let mut config = ServiceConfig::default();
        config.policies.push(NamedPolicy::new("3", "role:janitor"));
        assert!(matches!(Service::new(&config), Err(Error::Setup(_))));

        let mut config = ServiceConfig::default();
        config.policies.push(NamedPolicy::new("3", "role:"));
        assert!(matches!(Service::new(&config), Err(Error::Parse(_))));

        let config = ServiceConfig {
            namespace: vec![DimensionBuilder::new("grade", vec!["A", "B"])],
            policies: vec![NamedPolicy::new("1", "grade:A")],
            ..ServiceConfig::default()
        };
        assert!(matches!(Service::new(&config), Err(Error::Setup(_))));
    }
}
