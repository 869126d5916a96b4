mod access_policy;
mod attribute;
mod dimension;
mod parser;
mod registry;


pub use access_policy::AccessPolicy;
pub use attribute::{Attribute, AttributeSet, MAX_ATTRIBUTES};
pub use dimension::{Dimension, DimensionBuilder, Namespace, MAX_COORDINATES};
pub use parser::MAX_POLICY_DEPTH;
pub use registry::{NamedPolicy, PolicyRegistry};

#[cfg(any(test, feature = "test_utils"))]
pub use tests::{gen_namespace, gen_registry};
