//! Configuration entries with provenance.
//!
//! An [`Entry`] is a single configurable field. It is either unset (and
//! inherits from the next level), holds a system-supplied default, or holds
//! a value that was explicitly set at this level. The literal string
//! [`UNSET`] is only meaningful at the parsing boundary: assigning it returns
//! the entry to [`Entry::Unset`].

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};

/// Sentinel that clears an entry when passed to [`Entry::set`].
pub const UNSET: &str = "UNSET";

/// Tokens the caller boundary treats as "true" for boolean-intent flags.
const TRUTHY: [&str; 4] = ["yes", "y", "1", "true"];

/// Tokens accepted as "false" by strict boolean parsing.
const FALSY: [&str; 4] = ["no", "n", "0", "false"];

/// Provenance of an entry's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Unset,
    Default,
    Set,
}

/// A configuration field with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entry<T> {
    /// No value; resolution falls through to the next level.
    Unset,
    /// System-supplied value with the lowest precedence.
    Default(T),
    /// Explicitly assigned at this level.
    Set(T),
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Entry::Unset
    }
}

/// Value types an [`Entry`] can hold.
pub trait EntryValue: Clone + Default + PartialEq {
    /// Parse a raw command-line token into the value type.
    fn parse_raw(raw: &str) -> std::result::Result<Self, String>;
}

impl EntryValue for String {
    fn parse_raw(raw: &str) -> std::result::Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl EntryValue for bool {
    fn parse_raw(raw: &str) -> std::result::Result<Self, String> {
        let lowered = raw.trim().to_ascii_lowercase();
        if TRUTHY.contains(&lowered.as_str()) {
            Ok(true)
        } else if FALSY.contains(&lowered.as_str()) {
            Ok(false)
        } else {
            Err("expected one of yes/y/1/true or no/n/0/false".to_string())
        }
    }
}

impl EntryValue for Vec<String> {
    /// A single token is split on commas, matching how list flags are given.
    fn parse_raw(raw: &str) -> std::result::Result<Self, String> {
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl<T: EntryValue> Entry<T> {
    /// Current value, or the type's zero value when unset.
    pub fn get(&self) -> T {
        self.value().cloned().unwrap_or_default()
    }

    /// Borrow the value if there is one.
    pub fn value(&self) -> Option<&T> {
        match self {
            Entry::Unset => None,
            Entry::Default(v) | Entry::Set(v) => Some(v),
        }
    }

    pub fn state(&self) -> EntryState {
        match self {
            Entry::Unset => EntryState::Unset,
            Entry::Default(_) => EntryState::Default,
            Entry::Set(_) => EntryState::Set,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Entry::Set(_))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Entry::Unset)
    }

    /// Parse `raw` and assign it; [`UNSET`] clears the entry.
    ///
    /// On a parse failure the entry is left untouched.
    pub fn set(&mut self, field: &str, raw: &str) -> Result<()> {
        if raw == UNSET {
            *self = Entry::Unset;
            return Ok(());
        }
        let value = T::parse_raw(raw).map_err(|reason| ProvisionError::Parse {
            field: field.to_string(),
            value: raw.to_string(),
            reason,
        })?;
        *self = Entry::Set(value);
        Ok(())
    }

    /// Assign an already-typed value.
    pub fn set_value(&mut self, value: T) {
        *self = Entry::Set(value);
    }

    /// Install a default; an explicit value is never downgraded.
    pub fn set_default(&mut self, value: T) {
        if !self.is_set() {
            *self = Entry::Default(value);
        }
    }

    pub fn unset(&mut self) {
        *self = Entry::Unset;
    }
}

impl Entry<Vec<String>> {
    /// Replace the whole sequence. `["UNSET"]` clears the entry.
    pub fn set_slice(&mut self, values: &[String]) {
        if values.len() == 1 && values[0] == UNSET {
            *self = Entry::Unset;
        } else {
            *self = Entry::Set(values.to_vec());
        }
    }
}

/// Lenient boolean normalisation used for `yes/no` style flags.
///
/// Anything outside the truthy set is false.
pub fn parse_flag_bool(raw: &str) -> bool {
    TRUTHY.contains(&raw)
}
