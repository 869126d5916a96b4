use std::{
    collections::BTreeMap,
    fmt::{Debug, Display},
};

use crate::{
    bytes_ser_de::{to_leb128_len, Deserializer, Serializable, Serializer},
    Error,
};

/// Maximum number of attributes an attribute set may hold.
pub const MAX_ATTRIBUTES: usize = 64;

/// Returns `true` if the given string is a valid attribute name or value:
/// non-empty, without whitespace nor any of the policy syntax characters.
#[must_use]
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, ':' | '(' | ')' | '&' | '|' | '!'))
}

/// An attribute is characterized by its name (e.g. `role`) and the value a
/// principal holds for it (e.g. `teacher`).
#[derive(Hash, PartialEq, Eq, Clone, PartialOrd, Ord)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    /// Create an attribute.
    ///
    /// - `name`    : attribute name
    /// - `value`   : attribute value
    #[must_use]
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }
}

impl Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}:{}", &self.name, &self.value))
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// The identity claims held by a principal.
///
/// Attributes are kept ordered by name and names are unique: a principal
/// holds at most one value per attribute name.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeSet(BTreeMap<String, String>);

impl AttributeSet {
    /// Creates an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an attribute set from the given `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Fails with `Error::KeyGeneration` on duplicate names, invalid tokens
    /// or more than `MAX_ATTRIBUTES` pairs.
    pub fn try_from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, Error> {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.insert(Attribute::new(name, value))?;
        }
        Ok(set)
    }

    /// Adds the given attribute.
    ///
    /// # Errors
    ///
    /// Fails with `Error::KeyGeneration` if the name is already bound to a
    /// value or the attribute is not made of valid tokens.
    pub fn insert(&mut self, attribute: Attribute) -> Result<(), Error> {
        if !is_valid_token(&attribute.name) || !is_valid_token(&attribute.value) {
            return Err(Error::KeyGeneration(format!(
                "invalid attribute '{attribute}'"
            )));
        }
        if self.0.len() >= MAX_ATTRIBUTES {
            return Err(Error::KeyGeneration(format!(
                "an attribute set holds at most {MAX_ATTRIBUTES} attributes"
            )));
        }
        if self.0.contains_key(&attribute.name) {
            return Err(Error::KeyGeneration(format!(
                "duplicate attribute name '{}'",
                attribute.name
            )));
        }
        self.0.insert(attribute.name, attribute.value);
        Ok(())
    }

    /// Returns `true` if this set binds `attribute.name` to exactly
    /// `attribute.value`.
    #[must_use]
    pub fn contains(&self, attribute: &Attribute) -> bool {
        self.0
            .get(&attribute.name)
            .is_some_and(|value| value == &attribute.value)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.0
            .iter()
            .map(|(name, value)| Attribute::new(name, value))
    }
}

impl Debug for AttributeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serializable for AttributeSet {
    fn length(&self) -> usize {
        to_leb128_len(self.0.len())
            + self
                .0
                .iter()
                .map(|(name, value)| {
                    to_leb128_len(name.len()) + name.len() + to_leb128_len(value.len()) + value.len()
                })
                .sum::<usize>()
    }

    fn write(&self, ser: &mut Serializer) -> Result<usize, Error> {
        let mut n = ser.write_leb128_u64(self.0.len() as u64)?;
        for (name, value) in &self.0 {
            n += ser.write_vec(name.as_bytes())?;
            n += ser.write_vec(value.as_bytes())?;
        }
        Ok(n)
    }

    fn read(de: &mut Deserializer) -> Result<Self, Error> {
        let n_attributes = de.read_count(MAX_ATTRIBUTES)?;
        let mut set = Self::new();
        for _ in 0..n_attributes {
            let name = de.read_string()?;
            let value = de.read_string()?;
            set.insert(Attribute::new(&name, &value))
                .map_err(|e| Error::Marshal(e.to_string()))?;
        }
        Ok(set)
    }
}
