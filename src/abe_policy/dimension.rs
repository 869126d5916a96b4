use std::{collections::BTreeMap, fmt::Debug};

use serde::{Deserialize, Serialize};

use super::{attribute::is_valid_token, AccessPolicy, Attribute, AttributeSet};
use crate::{
    bytes_ser_de::{to_leb128_len, Deserializer, Serializable, Serializer},
    Error,
};

/// Maximum number of points of a namespace universe, hence of subkeys
/// generated by a setup.
pub const MAX_COORDINATES: usize = 4096;

/// Defines an attribute dimension by its name and the values a principal
/// may hold for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionBuilder {
    pub name: String,
    pub values: Vec<String>,
}

impl DimensionBuilder {
    #[must_use]
    pub fn new(name: &str, values: Vec<&str>) -> Self {
        Self {
            name: name.to_string(),
            values: values.into_iter().map(ToString::to_string).collect(),
        }
    }
}

/// The declared values of one attribute name, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    values: Vec<String>,
}

impl Dimension {
    #[must_use]
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The attribute namespace of a deployment: the attribute names keys can be
/// issued for and the values allowed for each of them.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Namespace {
    dimensions: BTreeMap<String, Dimension>,
}

impl Namespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the given dimension.
    ///
    /// # Errors
    ///
    /// Fails with `Error::Setup` if the dimension already exists, has no
    /// value, repeats a value, uses an invalid token or makes the universe
    /// larger than `MAX_COORDINATES`.
    pub fn add_dimension(&mut self, dimension: DimensionBuilder) -> Result<(), Error> {
        if !is_valid_token(&dimension.name) {
            return Err(Error::Setup(format!(
                "invalid attribute name '{}'",
                dimension.name
            )));
        }
        if self.dimensions.contains_key(&dimension.name) {
            return Err(Error::Setup(format!(
                "dimension {} already exists",
                dimension.name
            )));
        }
        if dimension.values.is_empty() {
            return Err(Error::Setup(format!(
                "dimension {} declares no value",
                dimension.name
            )));
        }
        let mut values = Vec::with_capacity(dimension.values.len());
        for value in dimension.values {
            if !is_valid_token(&value) {
                return Err(Error::Setup(format!(
                    "invalid value '{value}' in dimension {}",
                    dimension.name
                )));
            }
            if values.contains(&value) {
                return Err(Error::Setup(format!(
                    "value {value} declared twice in dimension {}",
                    dimension.name
                )));
            }
            values.push(value);
        }

        let universe = self.universe_size_with(values.len());
        if universe > MAX_COORDINATES {
            return Err(Error::Setup(format!(
                "adding dimension {} would create {universe} coordinates, the maximum is \
                 {MAX_COORDINATES}",
                dimension.name
            )));
        }
        self.dimensions.insert(dimension.name, Dimension { values });
        Ok(())
    }

    /// Number of non-empty coordinates if a dimension of `n_values` values
    /// were added. Saturates on overflow.
    fn universe_size_with(&self, n_values: usize) -> usize {
        self.dimensions
            .values()
            .fold(n_values.saturating_add(1), |acc, d| {
                acc.saturating_mul(d.len() + 1)
            })
            - 1
    }

    #[must_use]
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.get(name)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = (&str, &Dimension)> {
        self.dimensions.iter().map(|(name, d)| (name.as_str(), d))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Returns `true` if the attribute is declared in this namespace.
    #[must_use]
    pub fn declares(&self, attribute: &Attribute) -> bool {
        self.dimensions
            .get(&attribute.name)
            .is_some_and(|d| d.contains(&attribute.value))
    }

    /// Checks every attribute of the given set is declared.
    ///
    /// # Errors
    ///
    /// Returns the first undeclared attribute.
    pub fn check_attributes(&self, attributes: &AttributeSet) -> Result<(), Attribute> {
        attributes
            .iter()
            .find(|a| !self.declares(a))
            .map_or(Ok(()), Err)
    }

    /// Checks every term of the given access policy is declared.
    ///
    /// # Errors
    ///
    /// Returns the first undeclared attribute.
    pub fn check_policy(&self, ap: &AccessPolicy) -> Result<(), Attribute> {
        ap.attributes()
            .into_iter()
            .find(|a| !self.declares(a))
            .map_or(Ok(()), |a| Err(a.clone()))
    }

    /// Enumerates all non-empty coordinates of this namespace: every way of
    /// picking, for each dimension, either one of its values or no value.
    #[must_use]
    pub fn coordinates(&self) -> Vec<AttributeSet> {
        let mut coordinates = vec![AttributeSet::new()];
        for (name, dimension) in &self.dimensions {
            let mut extended =
                Vec::with_capacity(coordinates.len() * (dimension.len() + 1));
            for coordinate in &coordinates {
                extended.push(coordinate.clone());
                for value in dimension.values() {
                    let mut c = coordinate.clone();
                    // Dimension names are unique and values are valid tokens.
                    if c.insert(Attribute::new(name, value)).is_ok() {
                        extended.push(c);
                    }
                }
            }
            coordinates = extended;
        }
        coordinates.retain(|c| !c.is_empty());
        coordinates
    }
}

impl Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.dimensions.iter().map(|(name, d)| (name, &d.values)))
            .finish()
    }
}

impl TryFrom<Vec<DimensionBuilder>> for Namespace {
    type Error = Error;

    fn try_from(dimensions: Vec<DimensionBuilder>) -> Result<Self, Self::Error> {
        let mut namespace = Self::new();
        for dimension in dimensions {
            namespace.add_dimension(dimension)?;
        }
        Ok(namespace)
    }
}

impl Serializable for Namespace {
    fn length(&self) -> usize {
        to_leb128_len(self.dimensions.len())
            + self
                .dimensions
                .iter()
                .map(|(name, d)| {
                    to_leb128_len(name.len())
                        + name.len()
                        + to_leb128_len(d.len())
                        + d.values
                            .iter()
                            .map(|v| to_leb128_len(v.len()) + v.len())
                            .sum::<usize>()
                })
                .sum::<usize>()
    }

    fn write(&self, ser: &mut Serializer) -> Result<usize, Error> {
        let mut n = ser.write_leb128_u64(self.dimensions.len() as u64)?;
        for (name, dimension) in &self.dimensions {
            n += ser.write_vec(name.as_bytes())?;
            n += ser.write_leb128_u64(dimension.len() as u64)?;
            for value in &dimension.values {
                n += ser.write_vec(value.as_bytes())?;
            }
        }
        Ok(n)
    }

    fn read(de: &mut Deserializer) -> Result<Self, Error> {
        let n_dimensions = de.read_count(MAX_COORDINATES)?;
        let mut namespace = Self::new();
        for _ in 0..n_dimensions {
            let name = de.read_string()?;
            let n_values = de.read_count(MAX_COORDINATES)?;
            let values = (0..n_values)
                .map(|_| de.read_string())
                .collect::<Result<Vec<_>, _>>()?;
            namespace
                .add_dimension(DimensionBuilder { name, values })
                .map_err(|e| Error::Marshal(e.to_string()))?;
        }
        Ok(namespace)
    }
}
