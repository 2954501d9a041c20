// SPDX-License-Identifier: Apache-2.0
//! Fixture reader (§6): the flat `key=value` format used by the
//! determinism regression harness, sharing [`crate::kv::parse_flat_kv`]
//! with [`crate::config`] rather than parsing its own dialect.
//!
//! This module only reads fixture descriptors; it has no opinion on where
//! fixtures live or how a graph/context pair is built from one — that
//! wiring belongs to the binary or test crate that owns the fixture
//! corpus, consuming [`Fixture::parse`] as a building block.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::kv::parse_flat_kv;

/// Error parsing a fixture descriptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixtureError {
    /// A required key was absent from the source text.
    #[error("fixture missing required key: {0}")]
    MissingKey(&'static str),
    /// A present key's value could not be parsed into its field's type.
    #[error("fixture key {key} has an invalid value: {value}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// The raw value that failed to parse.
        value: String,
    },
}

/// A parsed fixture descriptor: per-category task counts, phase/shard
/// counts, resource budgets, and the expected commit hashes a regression
/// run must reproduce. Unknown keys in the source are ignored; comment
/// lines (`#`-prefixed) are skipped by the shared tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fixture {
    /// Identifies this fixture within the regression corpus.
    pub fixture_id: String,
    /// Number of `Strict`-determinism-class tasks the fixture's graph
    /// should contain.
    pub strict_count: u64,
    /// Number of `Ordered`-determinism-class tasks.
    pub ordered_count: u64,
    /// Number of `Commutative`-determinism-class tasks.
    pub commutative_count: u64,
    /// Number of `Derived`-determinism-class tasks.
    pub derived_count: u64,
    /// Number of distinct phases the fixture's graph spans.
    pub phase_count: u64,
    /// Number of shards the fixture's registry declares.
    pub shard_count: u64,
    /// Remaining budget fields (`cpu_budget_*`, `memory_budget_*`,
    /// `event_budget`, `bandwidth_budget`), kept as raw strings since the
    /// budget layer that interprets them is outside this core (§1).
    pub budgets: BTreeMap<String, String>,
    /// Expected FNV-1a 64 commit hash (§4.4) for a full-fidelity run.
    pub expected_hash: u64,
    /// Expected commit hash for a degraded (law-transformed) run, if the
    /// fixture exercises fidelity downgrade.
    pub expected_degraded_hash: Option<u64>,
}

const REQUIRED_KEYS: &[&str] = &[
    "fixture_id",
    "strict_count",
    "ordered_count",
    "commutative_count",
    "derived_count",
    "phase_count",
    "shard_count",
    "expected_hash",
];

const BUDGET_KEYS: &[&str] = &[
    "cpu_budget_",
    "memory_budget_",
    "event_budget",
    "bandwidth_budget",
];

fn parse_u64(map: &BTreeMap<String, String>, key: &'static str) -> Result<u64, FixtureError> {
    let raw = map.get(key).ok_or(FixtureError::MissingKey(key))?;
    raw.parse().map_err(|_| FixtureError::InvalidValue {
        key: key.to_string(),
        value: raw.clone(),
    })
}

fn parse_hash(map: &BTreeMap<String, String>, key: &'static str) -> Result<u64, FixtureError> {
    let raw = map.get(key).ok_or(FixtureError::MissingKey(key))?;
    parse_hash_value(key, raw)
}

fn parse_hash_value(key: &str, raw: &str) -> Result<u64, FixtureError> {
    let trimmed = raw.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16)
        .or_else(|_| raw.parse())
        .map_err(|_| FixtureError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

impl Fixture {
    /// Parses a fixture descriptor from its flat `key=value` text source.
    ///
    /// # Errors
    /// Returns [`FixtureError::MissingKey`] if a required key is absent, or
    /// [`FixtureError::InvalidValue`] if a present key's value does not
    /// parse into its field's type.
    pub fn parse(text: &str) -> Result<Self, FixtureError> {
        let map = parse_flat_kv(text);
        for key in REQUIRED_KEYS {
            if !map.contains_key(*key) {
                return Err(FixtureError::MissingKey(key));
            }
        }

        let expected_degraded_hash = match map.get("expected_degraded_hash") {
            Some(raw) => Some(parse_hash_value("expected_degraded_hash", raw)?),
            None => None,
        };

        let budgets = map
            .iter()
            .filter(|(key, _)| BUDGET_KEYS.iter().any(|prefix| key.starts_with(prefix)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            fixture_id: map
                .get("fixture_id")
                .ok_or(FixtureError::MissingKey("fixture_id"))?
                .clone(),
            strict_count: parse_u64(&map, "strict_count")?,
            ordered_count: parse_u64(&map, "ordered_count")?,
            commutative_count: parse_u64(&map, "commutative_count")?,
            derived_count: parse_u64(&map, "derived_count")?,
            phase_count: parse_u64(&map, "phase_count")?,
            shard_count: parse_u64(&map, "shard_count")?,
            budgets,
            expected_hash: parse_hash(&map, "expected_hash")?,
            expected_degraded_hash,
        })
    }

    /// Total task count the fixture's graph should contain, the sum of its
    /// four per-determinism-class counts.
    #[must_use]
    pub fn total_task_count(&self) -> u64 {
        self.strict_count + self.ordered_count + self.commutative_count + self.derived_count
    }
}
