//! This crate implements ciphertext-policy attribute-based encryption over
//! role attributes, which allows to:
//! - issue decryption keys bound to a set of attributes (e.g. `role:teacher`);
//! - encrypt data under a boolean access policy over these attributes (e.g.
//!   `(role:teacher) or (role:student)`);
//! - decrypt data only with a key whose attributes satisfy its policy.
//!
//! Keys and ciphertexts belong to the setup epoch that produced them and are
//! useless against any other epoch.
//!
//! The `core::api` module exposes the `RoleCrypt` entry point. The `service`
//! module, behind the default `server` feature, exposes the HTTP gateway.
//!
//! # Example
//!
//! ```
//! use cosmian_role_crypt::{
//!     abe_policy::{AccessPolicy, AttributeSet, DimensionBuilder, Namespace},
//!     Error, RoleCrypt,
//! };
//!
//! let mut namespace = Namespace::new();
//! namespace.add_dimension(DimensionBuilder::new("role", vec!["admin", "teacher", "student"]))?;
//!
//! let rc = RoleCrypt::default();
//! let (pp, msk) = rc.setup(&namespace)?;
//! let key = rc.generate_key(&msk, &AttributeSet::try_from_pairs([("role", "teacher")])?)?;
//!
//! let policy = AccessPolicy::parse("(role:teacher) or (role:student)")?;
//! let ciphertext = rc.encrypt(&pp, &policy, b"grades")?;
//! assert_eq!(&**rc.decrypt(&key, &ciphertext)?, b"grades");
//! # Ok::<(), Error>(())
//! ```

mod error;

pub mod abe_policy;
pub mod bytes_ser_de;
pub mod core;
#[cfg(feature = "server")]
pub mod service;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use error::Error;

pub use self::core::{
    api::RoleCrypt, AttributeSecretKey, Ciphertext, EpochId, MasterSecretKey, PublicParameters,
};
