//! User profile table (demographics).
//!
//! Profiles decide which users enter attribution (only users with gender and
//! income on file, unless configured otherwise) and supply the demographic
//! columns joined onto the output.

use std::collections::BTreeMap;
use std::io::BufRead;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::IngestError;
use crate::model::UserId;

/// Demographics for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub income: Option<f64>,
    pub became_member_on: Option<NaiveDate>,
}

impl Profile {
    /// Gender and income are both on file.
    #[must_use]
    pub const fn has_demographics(&self) -> bool {
        self.gender.is_some() && self.income.is_some()
    }
}

/// Expand single-letter gender codes word by word (`F` → `Female`).
#[must_use]
pub fn expand_gender(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| match part {
            "F" => "Female",
            "M" => "Male",
            "O" => "Other",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Profiles keyed by user id.
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    profiles: BTreeMap<UserId, Profile>,
}

impl ProfileTable {
    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    #[must_use]
    pub fn get(&self, user_id: &UserId) -> Option<&Profile> {
        self.profiles.get(user_id)
    }

    /// True when the user has a profile with gender and income.
    #[must_use]
    pub fn is_eligible(&self, user_id: &UserId) -> bool {
        self.get(user_id).is_some_and(Profile::has_demographics)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<Profile> for ProfileTable {
    fn from_iter<I: IntoIterator<Item = Profile>>(iter: I) -> Self {
        let mut table = Self::default();
        for profile in iter {
            table.insert(profile);
        }
        table
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    age: Option<u32>,
    #[serde(default)]
    income: Option<f64>,
    #[serde(default)]
    became_member_on: Option<Value>,
}

/// Read the profile JSON Lines table.
///
/// `became_member_on` is accepted as a `YYYYMMDD` integer or string.
///
/// # Errors
///
/// Fails on unreadable or unparsable lines and on invalid membership dates.
pub fn parse_profiles<R: BufRead>(reader: R) -> Result<ProfileTable, IngestError> {
    let mut table = ProfileTable::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let raw = line?;
        if raw.trim().is_empty() {
            continue;
        }

        let row: ProfileRow = serde_json::from_str(&raw).map_err(|source| IngestError::Json {
            line: line_no,
            source,
        })?;
        let became_member_on = row
            .became_member_on
            .as_ref()
            .map(|value| parse_member_date(value, line_no))
            .transpose()?
            .flatten();

        table.insert(Profile {
            user_id: UserId::new(row.id),
            gender: row.gender.as_deref().map(expand_gender),
            age: row.age,
            income: row.income,
            became_member_on,
        });
    }

    debug!(profiles = table.len(), "parsed profiles");
    Ok(table)
}

fn parse_member_date(value: &Value, line: usize) -> Result<Option<NaiveDate>, IngestError> {
    let raw = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(IngestError::Malformed {
                line,
                reason: format!("became_member_on must be YYYYMMDD, got {other}"),
            });
        }
    };

    NaiveDate::parse_from_str(&raw, "%Y%m%d")
        .map(Some)
        .map_err(|err| IngestError::Malformed {
            line,
            reason: format!("invalid became_member_on '{raw}': {err}"),
        })
}
