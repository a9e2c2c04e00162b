//! Scheduling policy and the provider that loads it.
//!
//! The policy document is a human-edited YAML file. It keeps the layout the
//! school already maintains (`constraints.subject` and
//! `preferences.teacher_free_days`) and adds an optional `scheduling`
//! section for the remaining knobs. Every key is optional; anything missing
//! falls back to [`Policy::default`]. A missing, empty or malformed document
//! is not an error: the scheduler runs with the defaults and a warning is
//! logged.
//!
//! ```yaml
//! constraints:
//!   subject:
//!     allow_multiple_per_day_if_more_than: 5
//! preferences:
//!   teacher_free_days:
//!     "Samer Jadea": [thursday]
//! scheduling:
//!   flexible_subject_tokens: [physical education, life skills]
//!   teacher_global_double_budget: 3
//! ```

use log::{debug, warn};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_saphyr as saphyr;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Same-day cap for a (classroom, subject) pair when the teacher is exempt
/// or the subject is flexible.
pub const RELAXED_PER_DAY_CAP: usize = 4;
/// Same-day cap for every other (classroom, subject) pair.
pub const DEFAULT_PER_DAY_CAP: usize = 2;

/// Thresholds, name tokens and budgets steering the placement phases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Policy {
    /// Weekly counts strictly above this permit unlimited same-day repeats.
    pub multi_per_day_threshold: u32,
    /// Substrings matched case-insensitively against teacher full names.
    pub exempt_teacher_tokens: Vec<String>,
    /// Substrings matched case-insensitively against subject names.
    pub flexible_subject_tokens: Vec<String>,
    /// Subjects pushed toward the end of the day during backfill.
    pub late_subject_tokens: Vec<String>,
    /// Greedy-phase same-day doubles per (teacher, classroom, subject).
    pub teacher_double_budget: u32,
    /// Per-teacher budget gating the adjacent-period preference.
    pub teacher_adjacency_budget: u32,
    /// Backfill-phase same-day doubles per teacher, across all assignments.
    pub teacher_global_double_budget: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            multi_per_day_threshold: 5,
            exempt_teacher_tokens: Vec::new(),
            flexible_subject_tokens: Vec::new(),
            late_subject_tokens: default_late_subject_tokens(),
            teacher_double_budget: 1,
            teacher_adjacency_budget: 2,
            teacher_global_double_budget: 3,
        }
    }
}

fn default_late_subject_tokens() -> Vec<String> {
    vec!["life skills".to_string(), "مهارات حياتية".to_string()]
}

impl Policy {
    pub fn allows_unlimited_repeats(&self, weekly_count: u32) -> bool {
        weekly_count > self.multi_per_day_threshold
    }

    pub fn is_exempt_teacher(&self, full_name: &str) -> bool {
        matches_any(full_name, &self.exempt_teacher_tokens)
    }

    pub fn is_flexible_subject(&self, subject_name: &str) -> bool {
        matches_any(subject_name, &self.flexible_subject_tokens)
    }

    pub fn is_late_subject(&self, subject_name: &str) -> bool {
        matches_any(subject_name, &self.late_subject_tokens)
    }

    /// Fixed same-day cap; not configurable through the document.
    pub fn per_day_cap(&self, relaxed: bool) -> usize {
        if relaxed {
            RELAXED_PER_DAY_CAP
        } else {
            DEFAULT_PER_DAY_CAP
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn matches_any(name: &str, tokens: &[String]) -> bool {
    let name = normalize(name);
    if name.is_empty() {
        return false;
    }
    tokens
        .iter()
        .map(|t| normalize(t))
        .any(|t| !t.is_empty() && name.contains(&t))
}

/// Source of the scheduling policy. Loading never fails.
pub trait RulesProvider {
    fn load(&self) -> Policy;
}

impl RulesProvider for Policy {
    fn load(&self) -> Policy {
        self.clone()
    }
}

#[derive(Debug, Deserialize)]
struct RulesDocument {
    constraints: Option<Constraints>,
    preferences: Option<Preferences>,
    scheduling: Option<SchedulingRules>,
}

#[derive(Debug, Deserialize)]
struct Constraints {
    subject: Option<SubjectConstraints>,
}

#[derive(Debug, Deserialize)]
struct SubjectConstraints {
    allow_multiple_per_day_if_more_than: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Preferences {
    /// Only the teacher names matter here; their free days are not scheduled on.
    teacher_free_days: Option<BTreeMap<String, IgnoredAny>>,
}

#[derive(Debug, Deserialize)]
struct SchedulingRules {
    exempt_teacher_tokens: Option<Vec<String>>,
    flexible_subject_tokens: Option<Vec<String>>,
    late_subject_tokens: Option<Vec<String>>,
    teacher_double_budget: Option<u32>,
    teacher_adjacency_budget: Option<u32>,
    teacher_global_double_budget: Option<u32>,
}

impl RulesDocument {
    fn into_policy(self) -> Policy {
        let mut policy = Policy::default();

        if let Some(threshold) = self
            .constraints
            .and_then(|c| c.subject)
            .and_then(|s| s.allow_multiple_per_day_if_more_than)
        {
            policy.multi_per_day_threshold = threshold;
        }
        if let Some(free_days) = self.preferences.and_then(|p| p.teacher_free_days) {
            policy.exempt_teacher_tokens.extend(free_days.into_keys());
        }

        let Some(scheduling) = self.scheduling else {
            return policy;
        };
        if let Some(tokens) = scheduling.exempt_teacher_tokens {
            policy.exempt_teacher_tokens.extend(tokens);
        }
        if let Some(tokens) = scheduling.flexible_subject_tokens {
            policy.flexible_subject_tokens = tokens;
        }
        if let Some(tokens) = scheduling.late_subject_tokens {
            policy.late_subject_tokens = tokens;
        }
        if let Some(n) = scheduling.teacher_double_budget {
            policy.teacher_double_budget = n;
        }
        if let Some(n) = scheduling.teacher_adjacency_budget {
            policy.teacher_adjacency_budget = n;
        }
        if let Some(n) = scheduling.teacher_global_double_budget {
            policy.teacher_global_double_budget = n;
        }
        policy
    }
}

/// Parses a YAML policy document.
pub fn parse_policy(text: &str) -> Result<Policy, saphyr::Error> {
    let document: RulesDocument = saphyr::from_str(text)?;
    Ok(document.into_policy())
}

/// Reads the policy document from a YAML file.
#[derive(Debug, Clone)]
pub struct FileRulesProvider {
    path: PathBuf,
}

impl FileRulesProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RulesProvider for FileRulesProvider {
    fn load(&self) -> Policy {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Rules document {} unavailable ({}); using default policy.",
                    self.path.display(),
                    e
                );
                return Policy::default();
            }
        };
        if text.trim().is_empty() {
            debug!("Rules document {} is empty.", self.path.display());
            return Policy::default();
        }
        match parse_policy(&text) {
            Ok(policy) => {
                debug!("Loaded policy from {}: {:?}", self.path.display(), policy);
                policy
            }
            Err(e) => {
                warn!(
                    "Rules document {} is malformed ({}); using default policy.",
                    self.path.display(),
                    e
                );
                Policy::default()
            }
        }
    }
}
