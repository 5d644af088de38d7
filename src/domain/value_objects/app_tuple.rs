//! AppTuple value object - the key that selects an application plugin

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a tuple component is empty or malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupleError {
    #[error("app tuple {field} must not be empty")]
    EmptyComponent { field: &'static str },

    #[error("app tuple {field} '{value}' contains '{found}': only letters, digits, '-', '_' and '.' are allowed")]
    InvalidCharacter {
        field: &'static str,
        value: String,
        found: char,
    },

    #[error("invalid app tuple '{input}': expected 'app/infra/flavor'")]
    Malformed { input: String },
}

/// Characters a tuple component may carry. Excluding `/` keeps `slug`
/// injective, so distinct tuples never share a ledger key or namespace.
fn is_component_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Plugin key for applications: (application type, infrastructure type, flavor).
///
/// All three components must match exactly for a registry lookup to hit;
/// there is no partial or wildcard matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppTuple {
    app: String,
    infra: String,
    flavor: String,
}

impl AppTuple {
    /// Create a tuple, rejecting empty components and characters outside
    /// `[A-Za-z0-9._-]`
    pub fn new(
        app: impl Into<String>,
        infra: impl Into<String>,
        flavor: impl Into<String>,
    ) -> Result<Self, TupleError> {
        let tuple = Self {
            app: app.into(),
            infra: infra.into(),
            flavor: flavor.into(),
        };

        for (field, value) in [
            ("application type", &tuple.app),
            ("infrastructure type", &tuple.infra),
            ("infrastructure flavor", &tuple.flavor),
        ] {
            if value.trim().is_empty() {
                return Err(TupleError::EmptyComponent { field });
            }
            if let Some(found) = value.chars().find(|c| !is_component_char(*c)) {
                return Err(TupleError::InvalidCharacter {
                    field,
                    value: value.clone(),
                    found,
                });
            }
        }

        Ok(tuple)
    }

    /// Tuple from literal components known to be non-empty
    pub(crate) fn from_static(app: &'static str, infra: &'static str, flavor: &'static str) -> Self {
        debug_assert!([app, infra, flavor]
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(is_component_char)));
        Self {
            app: app.to_string(),
            infra: infra.to_string(),
            flavor: flavor.to_string(),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn infra(&self) -> &str {
        &self.infra
    }

    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    /// Path-like form used for store namespaces and directory names
    pub fn slug(&self) -> String {
        format!("{}/{}/{}", self.app, self.infra, self.flavor)
    }
}

impl fmt::Display for AppTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.app, self.infra, self.flavor)
    }
}

impl FromStr for AppTuple {
    type Err = TupleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [app, infra, flavor] => Self::new(*app, *infra, *flavor),
            _ => Err(TupleError::Malformed {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn tuple_rejects_empty_components() {
        let err = AppTuple::new("web", "", "small").unwrap_err();
        assert_eq!(
            err,
            TupleError::EmptyComponent {
                field: "infrastructure type"
            }
        );
        assert!(AppTuple::new("  ", "cloudX", "small").is_err());
    }

    #[test]
    fn tuple_equality_is_structural() {
        let a = AppTuple::new("web", "cloudX", "small").unwrap();
        let b = AppTuple::new("web", "cloudX", "small").unwrap();
        let c = AppTuple::new("web", "cloudX", "large").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
        assert_eq!(map.get(&c), None);
    }

    #[test]
    fn tuple_parses_slash_form() {
        let tuple: AppTuple = "web/cloudX/small".parse().unwrap();
        assert_eq!(tuple.app(), "web");
        assert_eq!(tuple.infra(), "cloudX");
        assert_eq!(tuple.flavor(), "small");
        assert_eq!(tuple.slug(), "web/cloudX/small");
        assert_eq!(tuple.to_string(), "(web, cloudX, small)");
    }

    #[test]
    fn tuple_rejects_separator_in_components() {
        let err = AppTuple::new("a/b", "c", "d").unwrap_err();
        assert_eq!(
            err,
            TupleError::InvalidCharacter {
                field: "application type",
                value: "a/b".to_string(),
                found: '/',
            }
        );
        assert!(AppTuple::new("a", "b/c", "d").is_err());
        assert!(AppTuple::new("a", "b", "c d").is_err());
        assert!(AppTuple::new("web", "aws.ec2", "t3_small-x").is_ok());
    }

    #[test]
    fn distinct_tuples_have_distinct_slugs() {
        let a = AppTuple::new("a.b", "c", "d").unwrap();
        let b = AppTuple::new("a", "b.c", "d").unwrap();
        assert_ne!(a, b);
        assert_ne!(a.slug(), b.slug());
    }

    #[test]
    fn tuple_parse_rejects_wrong_arity() {
        assert!(matches!(
            "web/cloudX".parse::<AppTuple>(),
            Err(TupleError::Malformed { .. })
        ));
        assert!("web/cloudX/small/extra".parse::<AppTuple>().is_err());
    }
}
