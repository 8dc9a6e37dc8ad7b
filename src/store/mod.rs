//! File-backed storage for user credits and saved property queries.
//!
//! Layout under the data directory:
//!
//! ```text
//! users/<user_id>/profile.json
//! users/<user_id>/queries/<query_id>.json
//! ```

use crate::models::{Estimate, Observation, PropertyQuery, UserProfile};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PROFILE_FILE: &str = "profile.json";
const QUERIES_DIR: &str = "queries";

/// Errors from the query store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The user does not have enough credits for an estimate.
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u64, available: u64 },

    /// No profile exists for the user.
    #[error("User profile not found: {0} (create it with --add-credits)")]
    ProfileNotFound(String),

    /// The user id cannot be used as a directory name.
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("Storage IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A new query to persist.
#[derive(Debug, Clone)]
pub struct NewQuery<'a> {
    pub address: &'a str,
    pub locality: &'a str,
    pub zip_code: Option<&'a str>,
    pub comparables: &'a [Observation],
    pub estimate: &'a Estimate,
}

/// Result of persisting an estimate for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedQuery {
    pub id: String,
    /// Credit balance after the charge.
    pub remaining_credits: u64,
}

/// Stores profiles and queries as JSON files.
#[derive(Debug, Clone)]
pub struct QueryStore {
    root: PathBuf,
}

impl QueryStore {
    /// Open a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.root.join("users").join(user_id))
    }

    /// Load a user's profile.
    pub fn load_profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let path = self.user_dir(user_id)?.join(PROFILE_FILE);
        if !path.exists() {
            return Err(StoreError::ProfileNotFound(user_id.to_string()));
        }

        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write a user's profile, creating directories as needed.
    pub fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<(), StoreError> {
        let dir = self.user_dir(user_id)?;
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(PROFILE_FILE), serde_json::to_string_pretty(profile)?)?;
        Ok(())
    }

    /// Fail unless the user holds at least `min_credits`.
    pub fn ensure_credits(&self, user_id: &str, min_credits: u64) -> Result<UserProfile, StoreError> {
        let profile = self.load_profile(user_id)?;
        if profile.credits < min_credits {
            return Err(StoreError::InsufficientCredits {
                required: min_credits,
                available: profile.credits,
            });
        }
        Ok(profile)
    }

    /// Add `amount` credits, creating the profile if it does not exist.
    /// Returns the new balance.
    pub fn add_credits(&self, user_id: &str, amount: u64) -> Result<u64, StoreError> {
        let mut profile = match self.load_profile(user_id) {
            Ok(profile) => profile,
            Err(StoreError::ProfileNotFound(_)) => {
                info!("Creating profile for {}", user_id);
                UserProfile::default()
            }
            Err(e) => return Err(e),
        };
        profile.credits = profile.credits.saturating_add(amount);
        self.save_profile(user_id, &profile)?;

        info!("User {} now has {} credits", user_id, profile.credits);
        Ok(profile.credits)
    }

    /// Subtract `amount` credits, stopping at zero. Returns the new balance.
    pub fn decrease_credits(&self, user_id: &str, amount: u64) -> Result<u64, StoreError> {
        let mut profile = self.load_profile(user_id)?;
        profile.credits = profile.credits.saturating_sub(amount);
        self.save_profile(user_id, &profile)?;

        info!("User {} has {} credits left", user_id, profile.credits);
        Ok(profile.credits)
    }

    /// Persist a query and return its id.
    pub fn save_query(&self, user_id: &str, query: NewQuery<'_>) -> Result<String, StoreError> {
        let dir = self.user_dir(user_id)?.join(QUERIES_DIR);
        fs::create_dir_all(&dir)?;

        let created_at = Utc::now();
        let id = format!(
            "{}-{}",
            created_at.format("%Y%m%d%H%M%S%3f"),
            slugify(query.address)
        );

        let record = PropertyQuery {
            id: id.clone(),
            address: query.address.to_string(),
            locality: query.locality.to_string(),
            zip_code: query.zip_code.map(String::from),
            target_area: query.estimate.target_area,
            comparables: query.comparables.to_vec(),
            estimate: query.estimate.clone(),
            created_at,
        };

        let path = dir.join(format!("{}.json", id));
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        debug!("Saved query to {}", path.display());

        Ok(id)
    }

    /// Save `query` and charge `cost` credits. Without a query (no
    /// estimate was produced) nothing is written and nothing is charged.
    pub fn record_estimate(
        &self,
        user_id: &str,
        query: Option<NewQuery<'_>>,
        cost: u64,
    ) -> Result<Option<SavedQuery>, StoreError> {
        let Some(query) = query else {
            debug!("No estimate for {}, nothing saved or charged", user_id);
            return Ok(None);
        };

        let id = self.save_query(user_id, query)?;
        let remaining_credits = self.decrease_credits(user_id, cost)?;
        Ok(Some(SavedQuery {
            id,
            remaining_credits,
        }))
    }

    /// Load one saved query.
    #[allow(dead_code)] // Utility for single-query lookups
    pub fn load_query(&self, user_id: &str, query_id: &str) -> Result<PropertyQuery, StoreError> {
        let path = self
            .user_dir(user_id)?
            .join(QUERIES_DIR)
            .join(format!("{}.json", query_id));
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All saved queries for a user, newest first. Unreadable files are skipped.
    pub fn list_queries(&self, user_id: &str) -> Result<Vec<PropertyQuery>, StoreError> {
        let dir = self.user_dir(user_id)?.join(QUERIES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut queries = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let parsed = fs::read_to_string(path)
                .map_err(StoreError::from)
                .and_then(|c| serde_json::from_str::<PropertyQuery>(&c).map_err(StoreError::from));
            match parsed {
                Ok(query) => queries.push(query),
                Err(e) => warn!("Skipping unreadable query {}: {}", path.display(), e),
            }
        }

        queries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(queries)
    }
}

/// Lowercase, ASCII-alphanumeric slug for file names.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "query".to_string()
    } else {
        slug.chars().take(48).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::build_estimate;
    use crate::models::EstimateInput;
    use tempfile::TempDir;

    fn sample_estimate(comparables: &[Observation]) -> Estimate {
        build_estimate(&EstimateInput {
            observations: comparables.to_vec(),
            target_area: Some(5.0),
            locality: "Austin".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("12 Oak Rd, Austin, TX 78701"), "12-oak-rd-austin-tx-78701");
        assert_eq!(slugify("!!!"), "query");
    }

    #[test]
    fn test_invalid_user_id() {
        let temp = TempDir::new().unwrap();
        let store = QueryStore::new(temp.path());
        let err = store.load_profile("../escape").unwrap_err();
        assert!(matches!(err, StoreError::InvalidUserId(_)));
    }

    #[test]
    fn test_missing_profile() {
        let temp = TempDir::new().unwrap();
        let store = QueryStore::new(temp.path());
        let err = store.ensure_credits("alice", 50).unwrap_err();
        assert!(matches!(err, StoreError::ProfileNotFound(_)));
    }

    #[test]
    fn test_credit_gate_and_decrease() {
        let temp = TempDir::new().unwrap();
        let store = QueryStore::new(temp.path());
        store
            .save_profile("alice", &UserProfile { credits: 60 })
            .unwrap();

        assert!(store.ensure_credits("alice", 50).is_ok());
        assert_eq!(store.decrease_credits("alice", 50).unwrap(), 10);

        let err = store.ensure_credits("alice", 50).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientCredits {
                required: 50,
                available: 10
            }
        ));

        assert_eq!(store.decrease_credits("alice", 50).unwrap(), 0);
    }

    #[test]
    fn test_save_and_list_queries() {
        let temp = TempDir::new().unwrap();
        let store = QueryStore::new(temp.path());
        let comparables = vec![
            Observation::new(100000.0, 10.0).with_label("1 Main St"),
            Observation::new(105000.0, 10.0),
        ];
        let estimate = sample_estimate(&comparables);

        let id = store
            .save_query(
                "alice",
                NewQuery {
                    address: "12 Oak Rd",
                    locality: "Austin",
                    zip_code: Some("78701"),
                    comparables: &comparables,
                    estimate: &estimate,
                },
            )
            .unwrap();
        assert!(id.ends_with("12-oak-rd"));

        let loaded = store.load_query("alice", &id).unwrap();
        assert_eq!(loaded.comparables, comparables);
        assert_eq!(loaded.estimate.cluster_size, estimate.cluster_size);
        assert!((loaded.estimate.projected_price - estimate.projected_price).abs() < 1e-6);
        assert_eq!(loaded.zip_code.as_deref(), Some("78701"));

        fs::write(
            store.user_dir("alice").unwrap().join(QUERIES_DIR).join("broken.json"),
            "{",
        )
        .unwrap();

        let listed = store.list_queries("alice").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert!(store.list_queries("bob").unwrap().is_empty());
    }

    #[test]
    fn test_add_credits_creates_and_tops_up_profile() {
        let temp = TempDir::new().unwrap();
        let store = QueryStore::new(temp.path());

        assert_eq!(store.add_credits("alice", 500).unwrap(), 500);
        assert_eq!(store.load_profile("alice").unwrap().credits, 500);
        assert_eq!(store.add_credits("alice", 1250).unwrap(), 1750);

        assert!(store.ensure_credits("alice", 50).is_ok());
        assert!(matches!(
            store.add_credits("../bob", 10).unwrap_err(),
            StoreError::InvalidUserId(_)
        ));
    }

    #[test]
    fn test_record_estimate_without_estimate_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = QueryStore::new(temp.path());
        store.add_credits("alice", 120).unwrap();

        let saved = store.record_estimate("alice", None, 50).unwrap();
        assert_eq!(saved, None);
        assert_eq!(store.load_profile("alice").unwrap().credits, 120);
        assert!(!store.user_dir("alice").unwrap().join(QUERIES_DIR).exists());
        assert!(store.list_queries("alice").unwrap().is_empty());
    }

    #[test]
    fn test_record_estimate_charges_once() {
        let temp = TempDir::new().unwrap();
        let store = QueryStore::new(temp.path());
        store.add_credits("alice", 120).unwrap();

        let comparables = vec![
            Observation::new(100000.0, 10.0),
            Observation::new(110000.0, 10.0),
        ];
        let estimate = sample_estimate(&comparables);
        let saved = store
            .record_estimate(
                "alice",
                Some(NewQuery {
                    address: "12 Oak Rd",
                    locality: "Austin",
                    zip_code: None,
                    comparables: &comparables,
                    estimate: &estimate,
                }),
                50,
            )
            .unwrap()
            .unwrap();

        assert_eq!(saved.remaining_credits, 70);
        assert_eq!(store.load_profile("alice").unwrap().credits, 70);

        let listed = store.list_queries("alice").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
    }
}
