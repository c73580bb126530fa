//! Object names and name patterns.
//!
//! Manageable objects are addressed by a domain and a set of key properties,
//! written `domain:key=value,key=value`. The canonical form orders the
//! properties by key so two spellings of the same name compare equal.
//!
//! A [`NamePattern`] uses the same form but may contain `*` and `?`
//! wildcards in the domain and may end its property list with a `*` entry,
//! meaning "any further properties". Property values always match exactly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use glob::Pattern;
use thiserror::Error;

const DOMAIN_SEPARATOR: char = ':';
const PROPERTY_SEPARATOR: char = ',';
const ASSIGNMENT: char = '=';
const PROPERTY_WILDCARD: &str = "*";

/// Errors raised while parsing object names and patterns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name was empty or only whitespace.
    #[error("object name is empty")]
    Empty,

    /// The `:` between domain and properties was missing.
    #[error("object name '{name}' is missing the domain separator ':'")]
    MissingDomainSeparator {
        /// Offending input.
        name: String,
    },

    /// The domain part was empty.
    #[error("object name '{name}' has an empty domain")]
    EmptyDomain {
        /// Offending input.
        name: String,
    },

    /// No key properties were supplied.
    #[error("object name '{name}' has no key properties")]
    MissingProperties {
        /// Offending input.
        name: String,
    },

    /// A property was not of the form `key=value`.
    #[error("object name '{name}' has a malformed property '{property}'")]
    MalformedProperty {
        /// Offending input.
        name: String,
        /// The property that failed to parse.
        property: String,
    },

    /// The same key appeared twice.
    #[error("object name '{name}' repeats the key '{key}'")]
    DuplicateKey {
        /// Offending input.
        name: String,
        /// Repeated key.
        key: String,
    },

    /// The domain of a pattern did not compile to a glob.
    #[error("object name '{name}' has an invalid domain pattern: {message}")]
    InvalidDomainPattern {
        /// Offending input.
        name: String,
        /// Glob compiler diagnostic.
        message: String,
    },

    /// A wildcard appeared where an exact name was required.
    #[error("object name '{name}' contains a wildcard")]
    Wildcard {
        /// Offending input.
        name: String,
    },
}

/// Exact, canonical name of a manageable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    // Canonical text first so the derived ordering is by canonical name.
    canonical: String,
    domain: String,
    properties: BTreeMap<String, String>,
}

impl ObjectName {
    /// Parses an exact object name.
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] when the name is malformed or contains a
    /// wildcard.
    pub fn parse(input: &str) -> Result<Self, NameError> {
        let parsed = ParsedName::parse(input)?;
        if parsed.property_wildcard || has_wildcard(&parsed.domain) {
            return Err(NameError::Wildcard {
                name: input.trim().to_owned(),
            });
        }
        Ok(Self::from_parts(parsed.domain, parsed.properties))
    }

    fn from_parts(domain: String, properties: BTreeMap<String, String>) -> Self {
        let canonical = format!("{domain}{DOMAIN_SEPARATOR}{}", join_properties(&properties));
        Self {
            canonical,
            domain,
            properties,
        }
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.domain.as_str()
    }

    /// Returns the value of a key property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns the canonical property list, for example `name=a,type=b`.
    #[must_use]
    pub fn property_list(&self) -> String {
        join_properties(&self.properties)
    }

    /// Returns the canonical textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.canonical.as_str()
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.canonical)
    }
}

impl FromStr for ObjectName {
    type Err = NameError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

/// Pattern selecting zero or more object names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    domain: String,
    domain_matcher: DomainMatcher,
    properties: BTreeMap<String, String>,
    property_wildcard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DomainMatcher {
    Exact,
    Any,
    Glob(Pattern),
}

impl DomainMatcher {
    fn compile(name: &str, domain: &str) -> Result<Self, NameError> {
        if domain.chars().all(|c| c == '*') {
            return Ok(Self::Any);
        }
        if !has_wildcard(domain) {
            return Ok(Self::Exact);
        }
        // Only `*` and `?` are wildcards; brackets stay literal and runs of
        // `*` collapse so glob never sees a recursive `**`.
        let mut escaped = String::with_capacity(domain.len());
        for c in domain.chars() {
            match c {
                '[' | ']' => escaped.extend(['[', c, ']']),
                '*' if escaped.ends_with('*') => {}
                other => escaped.push(other),
            }
        }
        Pattern::new(&escaped)
            .map(Self::Glob)
            .map_err(|error| NameError::InvalidDomainPattern {
                name: name.to_owned(),
                message: error.msg.to_owned(),
            })
    }
}

impl NamePattern {
    /// Parses a name pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] when the pattern is malformed.
    pub fn parse(input: &str) -> Result<Self, NameError> {
        let parsed = ParsedName::parse(input)?;
        let domain_matcher = DomainMatcher::compile(input.trim(), &parsed.domain)?;
        Ok(Self {
            domain: parsed.domain,
            domain_matcher,
            properties: parsed.properties,
            property_wildcard: parsed.property_wildcard,
        })
    }

    /// Pattern matching every object (`*:*`).
    #[must_use]
    pub fn any() -> Self {
        Self {
            domain: String::from("*"),
            domain_matcher: DomainMatcher::Any,
            properties: BTreeMap::new(),
            property_wildcard: true,
        }
    }

    /// Returns `true` when the pattern can match more than one name.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.property_wildcard || self.domain_matcher != DomainMatcher::Exact
    }

    /// Returns the exact name when the pattern contains no wildcards.
    #[must_use]
    pub fn as_exact(&self) -> Option<ObjectName> {
        (!self.is_pattern())
            .then(|| ObjectName::from_parts(self.domain.clone(), self.properties.clone()))
    }

    /// Returns `true` when `name` is selected by this pattern.
    #[must_use]
    pub fn matches(&self, name: &ObjectName) -> bool {
        let domain_match = match &self.domain_matcher {
            DomainMatcher::Exact => self.domain == name.domain(),
            DomainMatcher::Any => true,
            DomainMatcher::Glob(pattern) => pattern.matches(name.domain()),
        };
        if !domain_match {
            return false;
        }
        let required_match = self
            .properties
            .iter()
            .all(|(key, value)| name.property(key) == Some(value.as_str()));
        required_match
            && (self.property_wildcard || name.properties.len() == self.properties.len())
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}{DOMAIN_SEPARATOR}", self.domain)?;
        let properties = join_properties(&self.properties);
        match (properties.is_empty(), self.property_wildcard) {
            (true, _) => formatter.write_str(PROPERTY_WILDCARD),
            (false, true) => write!(formatter, "{properties}{PROPERTY_SEPARATOR}{PROPERTY_WILDCARD}"),
            (false, false) => formatter.write_str(&properties),
        }
    }
}

impl FromStr for NamePattern {
    type Err = NameError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl From<ObjectName> for NamePattern {
    fn from(name: ObjectName) -> Self {
        Self {
            domain: name.domain,
            domain_matcher: DomainMatcher::Exact,
            properties: name.properties,
            property_wildcard: false,
        }
    }
}

impl From<&ObjectName> for NamePattern {
    fn from(name: &ObjectName) -> Self {
        Self::from(name.clone())
    }
}

struct ParsedName {
    domain: String,
    properties: BTreeMap<String, String>,
    property_wildcard: bool,
}

impl ParsedName {
    fn parse(input: &str) -> Result<Self, NameError> {
        let name = input.trim();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        let (domain, property_list) =
            name.split_once(DOMAIN_SEPARATOR)
                .ok_or_else(|| NameError::MissingDomainSeparator {
                    name: name.to_owned(),
                })?;
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(NameError::EmptyDomain {
                name: name.to_owned(),
            });
        }

        let mut properties = BTreeMap::new();
        let mut property_wildcard = false;
        for property in property_list
            .split(PROPERTY_SEPARATOR)
            .map(str::trim)
            .filter(|property| !property.is_empty())
        {
            if property == PROPERTY_WILDCARD {
                property_wildcard = true;
                continue;
            }
            let (key, value) = parse_property(name, property)?;
            if properties.insert(key.clone(), value).is_some() {
                return Err(NameError::DuplicateKey {
                    name: name.to_owned(),
                    key,
                });
            }
        }

        if properties.is_empty() && !property_wildcard {
            return Err(NameError::MissingProperties {
                name: name.to_owned(),
            });
        }

        Ok(Self {
            domain: domain.to_owned(),
            properties,
            property_wildcard,
        })
    }
}

fn parse_property(name: &str, property: &str) -> Result<(String, String), NameError> {
    let malformed = || NameError::MalformedProperty {
        name: name.to_owned(),
        property: property.to_owned(),
    };
    let (key, value) = property.split_once(ASSIGNMENT).ok_or_else(malformed)?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() || has_wildcard(key) || has_wildcard(value) {
        return Err(malformed());
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn join_properties(properties: &BTreeMap<String, String>) -> String {
    properties
        .iter()
        .map(|(key, value)| format!("{key}{ASSIGNMENT}{value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn has_wildcard(text: &str) -> bool {
    text.contains(['*', '?'])
}
