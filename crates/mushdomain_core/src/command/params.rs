//! Typed parameter set handed to every command handler.
//!
//! # Invariants
//! - A register (named parameter) wins over the positional argument at the
//!   same slot.
//! - Register names are case-insensitive.
//! - List-valued registers are split on whitespace; positional lists take
//!   every argument from their start index on.

use super::error::{CommandError, CommandResult};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Positional arguments plus host-supplied registers for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    positional: Vec<String>,
    registers: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a parameter set from positional arguments only.
    pub fn positional<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positional: args.into_iter().map(Into::into).collect(),
            registers: BTreeMap::new(),
        }
    }

    /// Adds one named register, replacing an earlier value of the same name.
    pub fn with_register(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_register(name, value);
        self
    }

    pub fn set_register(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.registers
            .insert(normalize_register_name(name.as_ref()), value.into());
    }

    pub fn positional_args(&self) -> &[String] {
        &self.positional
    }

    pub fn register(&self, name: &str) -> Option<&str> {
        self.registers
            .get(&normalize_register_name(name))
            .map(String::as_str)
    }

    /// Value at `index`, or the register called `name`.
    pub fn optional(&self, index: usize, name: &str) -> Option<&str> {
        self.register(name)
            .or_else(|| self.positional.get(index).map(String::as_str))
    }

    /// Like [`Params::optional`], failing with `MissingParameter`.
    pub fn required(&self, index: usize, name: &'static str) -> CommandResult<&str> {
        self.optional(index, name)
            .ok_or(CommandError::MissingParameter(name))
    }

    /// Parses a required parameter with `FromStr`.
    pub fn parse<T: FromStr>(&self, index: usize, name: &'static str) -> CommandResult<T> {
        let raw = self.required(index, name)?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| CommandError::InvalidParameter {
                name,
                value: raw.to_string(),
            })
    }

    /// Parses an optional `1/0/true/false/yes/no` flag.
    pub fn flag(&self, index: usize, name: &'static str, default: bool) -> CommandResult<bool> {
        let Some(raw) = self.optional(index, name) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(CommandError::InvalidParameter {
                name,
                value: raw.to_string(),
            }),
        }
    }

    /// List value: the whitespace-split register, or positionals from `start`.
    pub fn list(&self, start: usize, name: &str) -> Vec<String> {
        if let Some(raw) = self.register(name) {
            return raw.split_whitespace().map(str::to_string).collect();
        }
        self.positional.iter().skip(start).cloned().collect()
    }
}

/// Parses a `NAME=VALUE` register specification.
pub fn parse_register_spec(spec: &str) -> Result<(String, String), String> {
    let Some((name, value)) = spec.split_once('=') else {
        return Err(format!("register `{spec}` must look like NAME=VALUE"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("register `{spec}` has an empty name"));
    }
    Ok((normalize_register_name(name), value.to_string()))
}

fn normalize_register_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{parse_register_spec, Params};
    use crate::command::error::CommandError;

    #[test]
    fn register_overrides_positional_slot() {
        let params = Params::positional(["#1", "#2"]).with_register("Sphere", "#9");
        assert_eq!(params.required(0, "owner").unwrap(), "#1");
        assert_eq!(params.required(1, "sphere").unwrap(), "#9");
    }

    #[test]
    fn missing_parameter_names_the_slot() {
        let err = Params::new().required(3, "room").unwrap_err();
        assert!(matches!(err, CommandError::MissingParameter("room")));
    }

    #[test]
    fn list_prefers_whitespace_split_register() {
        let positional = Params::positional(["#1", "Tower", "#5", "#6"]);
        assert_eq!(positional.list(2, "members"), vec!["#5", "#6"]);

        let registered = positional.with_register("members", " #7  #8 ");
        assert_eq!(registered.list(2, "members"), vec!["#7", "#8"]);
    }

    #[test]
    fn flag_accepts_numeric_and_word_forms() {
        let params = Params::positional(["1", "false", "maybe"]);
        assert!(params.flag(0, "validated", false).unwrap());
        assert!(!params.flag(1, "acknowledged", true).unwrap());
        assert!(params.flag(5, "private", true).unwrap());
        assert!(matches!(
            params.flag(2, "private", false).unwrap_err(),
            CommandError::InvalidParameter { name: "private", .. }
        ));
    }

    #[test]
    fn parse_reports_the_raw_value() {
        let params = Params::positional(["twelve"]);
        match params.parse::<i64>(0, "id").unwrap_err() {
            CommandError::InvalidParameter { name, value } => {
                assert_eq!(name, "id");
                assert_eq!(value, "twelve");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn register_spec_requires_name_and_equals_sign() {
        assert_eq!(
            parse_register_spec("Value=a=b c").unwrap(),
            ("value".to_string(), "a=b c".to_string())
        );
        assert!(parse_register_spec("novalue").is_err());
        assert!(parse_register_spec("=x").is_err());
    }
}
