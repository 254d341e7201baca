//! CLI verbs and their parameter schemas.
//!
//! The tool exposes a closed set of six verbs. Each verb declares the
//! parameters it requires in a static [`VerbSchema`]; a [`ParamMap`] is
//! checked against that schema once, producing [`ValidatedParams`] that the
//! orchestrator consumes without further checks.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, ValidationError};

/// Parameter naming the topology file.
pub const PARAM_FILE: &str = "file";

/// Parameter naming the instance (workload) to operate on.
pub const PARAM_INSTANCE: &str = "instance";

/// Parameter carrying a comma-separated list of database names.
pub const PARAM_DBNAMES: &str = "dbnames";

/// A lifecycle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verb {
    /// Provision and start a cluster from a topology file.
    CreateInstance,
    /// Delete the workload and its data directories.
    DeleteInstance,
    /// Provision tenant databases on the primary.
    AddDatabase,
    /// Drop tenant databases from the primary.
    RemoveDatabase,
    /// Bring a stopped cluster back up.
    StartInstance,
    /// Stop every member and scale the workload to zero.
    StopInstance,
}

impl Verb {
    /// All verbs, in help order.
    pub const ALL: [Verb; 6] = [
        Verb::CreateInstance,
        Verb::DeleteInstance,
        Verb::AddDatabase,
        Verb::RemoveDatabase,
        Verb::StartInstance,
        Verb::StopInstance,
    ];

    /// Returns the command-line name of the verb.
    pub fn name(&self) -> &'static str {
        self.schema().name
    }

    /// Returns the parameter schema of the verb.
    pub fn schema(&self) -> &'static VerbSchema {
        SCHEMAS
            .iter()
            .find(|schema| schema.verb == *self)
            .unwrap_or(&SCHEMAS[0])
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Verb {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        SCHEMAS
            .iter()
            .find(|schema| schema.name == s)
            .map(|schema| schema.verb)
            .ok_or_else(|| ValidationError::UnknownCommand(s.to_string()))
    }
}

/// Parameter schema of one verb.
#[derive(Debug, PartialEq, Eq)]
pub struct VerbSchema {
    /// The verb.
    pub verb: Verb,
    /// Command-line name.
    pub name: &'static str,
    /// Parameters that must be present and non-blank.
    pub mandatory: &'static [&'static str],
    /// Parameters that may be present.
    pub optional: &'static [&'static str],
}

static SCHEMAS: [VerbSchema; 6] = [
    VerbSchema {
        verb: Verb::CreateInstance,
        name: "create-db-instance",
        mandatory: &[PARAM_FILE],
        optional: &[],
    },
    VerbSchema {
        verb: Verb::DeleteInstance,
        name: "delete-db-instance",
        mandatory: &[PARAM_INSTANCE],
        optional: &[],
    },
    VerbSchema {
        verb: Verb::AddDatabase,
        name: "add-database",
        mandatory: &[PARAM_INSTANCE, PARAM_DBNAMES],
        optional: &[],
    },
    VerbSchema {
        verb: Verb::RemoveDatabase,
        name: "remove-database",
        mandatory: &[PARAM_INSTANCE, PARAM_DBNAMES],
        optional: &[],
    },
    VerbSchema {
        verb: Verb::StartInstance,
        name: "start-db-instance",
        mandatory: &[PARAM_INSTANCE],
        optional: &[PARAM_FILE],
    },
    VerbSchema {
        verb: Verb::StopInstance,
        name: "stop-db-instance",
        mandatory: &[PARAM_INSTANCE],
        optional: &[],
    },
];

/// Unvalidated command parameters.
///
/// A flag may be present without a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap(BTreeMap<String, Option<String>>);

impl ParamMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `-flag value` pairs.
    ///
    /// A token starting with `-` names a flag, with every dash stripped. The
    /// following token is its value unless it is missing or is itself a flag.
    /// Tokens that are neither a flag nor a flag's value are ignored.
    ///
    /// ```
    /// use gauss_core::command::ParamMap;
    ///
    /// let params = ParamMap::from_args(["-instance", "orders", "-force"]);
    /// assert_eq!(params.get("instance"), Some("orders"));
    /// assert!(params.contains("force"));
    /// assert_eq!(params.get("force"), None);
    /// ```
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut map = BTreeMap::new();

        for (index, token) in tokens.iter().enumerate() {
            if !token.starts_with('-') {
                continue;
            }
            let flag = token.replace('-', "");
            let value = tokens
                .get(index + 1)
                .filter(|next| !next.starts_with('-'))
                .cloned();
            map.insert(flag, value);
        }

        Self(map)
    }

    /// Sets a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(name.into(), Some(value.into()));
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value of a parameter, if present with a value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_deref())
    }

    /// Returns true if the flag is present, with or without a value.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Checks the map against the schema of `verb`.
    pub fn validate(&self, verb: Verb) -> Result<ValidatedParams> {
        let schema = verb.schema();
        let mut values = BTreeMap::new();

        for name in schema.mandatory {
            if !self.contains(name) {
                return Err(ValidationError::missing(*name));
            }
            match self.get(name) {
                Some(value) if !value.trim().is_empty() => {
                    values.insert(*name, value.to_string());
                }
                _ => return Err(ValidationError::blank(*name)),
            }
        }
        for name in schema.optional {
            if let Some(value) = self.get(name).filter(|v| !v.trim().is_empty()) {
                values.insert(*name, value.to_string());
            }
        }

        if values.contains_key(PARAM_DBNAMES) {
            DatabaseNames::parse(&values[PARAM_DBNAMES])?;
        }

        Ok(ValidatedParams { verb, values })
    }
}

/// Parameters that passed schema validation for one verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedParams {
    verb: Verb,
    values: BTreeMap<&'static str, String>,
}

impl ValidatedParams {
    /// The verb these parameters were validated for.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Returns a validated parameter value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The `instance` parameter.
    pub fn instance(&self) -> Result<&str> {
        self.get(PARAM_INSTANCE)
            .ok_or_else(|| ValidationError::missing(PARAM_INSTANCE))
    }

    /// The `file` parameter, when given.
    pub fn topology_path(&self) -> Option<PathBuf> {
        self.get(PARAM_FILE).map(PathBuf::from)
    }

    /// The `dbnames` parameter, parsed.
    pub fn database_names(&self) -> Result<DatabaseNames> {
        let raw = self
            .get(PARAM_DBNAMES)
            .ok_or_else(|| ValidationError::missing(PARAM_DBNAMES))?;
        DatabaseNames::parse(raw)
    }
}

/// A non-empty list of database names.
///
/// Names are used verbatim as SQL identifiers, so each must match
/// `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseNames(Vec<String>);

impl DatabaseNames {
    /// Parses a comma-separated list.
    pub fn parse(raw: &str) -> Result<Self> {
        let names: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).collect();
        if names.iter().any(|name| !is_identifier(name)) {
            return Err(ValidationError::InvalidDatabaseName(raw.to_string()));
        }
        Ok(Self(names))
    }

    /// Iterates the names in input order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false once parsed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DatabaseNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_round_trip_names() {
        for verb in Verb::ALL {
            assert_eq!(verb.name().parse::<Verb>().unwrap(), verb);
        }
        assert_eq!(
            "drop-everything".parse::<Verb>().unwrap_err(),
            ValidationError::UnknownCommand("drop-everything".into())
        );
    }

    #[test]
    fn test_legacy_args() {
        let params = ParamMap::from_args(["-file", "a.json", "--instance", "db", "-x", "-y"]);

        assert_eq!(params.get("file"), Some("a.json"));
        assert_eq!(params.get("instance"), Some("db"));
        assert!(params.contains("x"));
        assert_eq!(params.get("x"), None);
        assert!(params.contains("y"));
    }

    #[test]
    fn test_validate_missing_and_blank() {
        let err = ParamMap::new().validate(Verb::StopInstance).unwrap_err();
        assert_eq!(err, ValidationError::missing("instance"));

        let err = ParamMap::from_args(["-instance"])
            .validate(Verb::StopInstance)
            .unwrap_err();
        assert_eq!(err, ValidationError::blank("instance"));

        let err = ParamMap::new()
            .with("instance", "db")
            .validate(Verb::AddDatabase)
            .unwrap_err();
        assert_eq!(err, ValidationError::missing("dbnames"));
    }

    #[test]
    fn test_validate_optional_file() {
        let params = ParamMap::new()
            .with("instance", "db")
            .validate(Verb::StartInstance)
            .unwrap();
        assert_eq!(params.instance().unwrap(), "db");
        assert_eq!(params.topology_path(), None);

        let params = ParamMap::new()
            .with("instance", "db")
            .with("file", "db.json")
            .validate(Verb::StartInstance)
            .unwrap();
        assert_eq!(params.topology_path(), Some(PathBuf::from("db.json")));
    }

    #[test]
    fn test_database_names() {
        let names = DatabaseNames::parse("alpha,beta_2").unwrap();
        assert_eq!(names.iter().collect::<Vec<_>>(), vec!["alpha", "beta_2"]);
        assert_eq!(names.to_string(), "alpha,beta_2");

        for bad in ["", "a,,b", "1abc", "a;drop", "a b"] {
            assert!(
                DatabaseNames::parse(bad).is_err(),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_validate_rejects_bad_dbnames() {
        let err = ParamMap::new()
            .with("instance", "db")
            .with("dbnames", "ok,bad-name")
            .validate(Verb::RemoveDatabase)
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidDatabaseName("ok,bad-name".into()));
    }
}
