use std::fmt;

use serde::{Deserialize, Serialize};

/// Human-facing application number: exactly six ASCII digits, zero padded, starting at `000001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApplicationReference(String);

impl ApplicationReference {
    pub const WIDTH: usize = 6;
    const MAX: u32 = 999_999;

    pub fn first() -> Self {
        Self("000001".to_string())
    }

    pub fn from_number(number: u32) -> Option<Self> {
        (1..=Self::MAX)
            .contains(&number)
            .then(|| Self(format!("{number:0width$}", width = Self::WIDTH)))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != Self::WIDTH || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse::<u32>().ok().and_then(Self::from_number)
    }

    pub fn number(&self) -> u32 {
        self.0.parse().unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference following the numerically largest purely-numeric value in `existing`.
    ///
    /// Values that are not purely numeric are ignored; with nothing usable the sequence
    /// starts over at `000001`. Returns `None` once the six-digit space is exhausted.
    pub fn next_after<'a, I>(existing: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current = existing
            .into_iter()
            .filter(|raw| !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|raw| raw.parse::<u64>().ok())
            .max();

        match current {
            None => Some(Self::first()),
            Some(max) => max
                .checked_add(1)
                .and_then(|next| u32::try_from(next).ok())
                .and_then(Self::from_number),
        }
    }
}

impl fmt::Display for ApplicationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ApplicationReference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("'{value}' is not a six-digit reference"))
    }
}

impl From<ApplicationReference> for String {
    fn from(value: ApplicationReference) -> Self {
        value.0
    }
}
