//! Catalog, progress, and session types.
//!
//! Catalog documents come in two tiers: lightweight metadata (categories,
//! skill summaries, the dependency graph) and heavy per-category detail
//! (levels and exercises). Both tiers derive Serialize/Deserialize for YAML.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Metadata tier
// ============================================================================

/// Root metadata document: every category with its skill summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub categories: Vec<CategoryMeta>,
}

impl Metadata {
    pub fn category(&self, id: &str) -> Option<&CategoryMeta> {
        self.categories.iter().find(|c| c.id == id)
    }
}

/// A training discipline as listed in the metadata tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMeta {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Skill summaries in catalog order (the recommendation priority).
    #[serde(default)]
    pub skills: Vec<SkillSummary>,
}

impl CategoryMeta {
    pub fn skill(&self, id: &str) -> Option<&SkillSummary> {
        self.skills.iter().find(|s| s.id == id)
    }
}

/// Lightweight skill entry: name, graph edges, rewards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub difficulty: Difficulty,

    /// Stat points awarded on completion, e.g. `strength: 3`.
    #[serde(default)]
    pub stats: IndexMap<String, u32>,

    /// Skills that must be completed before this one unlocks.
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Inverse edges of `prerequisites`.
    #[serde(default)]
    pub unlocks: Vec<String>,

    pub total_levels: u32,

    /// Entry point of the category; may be force-unlocked by an override.
    #[serde(default)]
    pub root: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Elite,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
            Self::Elite => write!(f, "elite"),
        }
    }
}

// ============================================================================
// Detail tier
// ============================================================================

/// Per-category detail partition holding levels and exercises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDetail {
    pub id: String,

    #[serde(default)]
    pub skills: Vec<SkillDetail>,
}

impl CategoryDetail {
    pub fn skill(&self, id: &str) -> Option<&SkillDetail> {
        self.skills.iter().find(|s| s.id == id)
    }
}

/// Detail entry for one skill. `Some` fields override the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDetail {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub difficulty: Option<Difficulty>,

    #[serde(default)]
    pub levels: Vec<Level>,
}

/// One ordinal stage of a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: String,

    /// 1..N, sequential, no gaps.
    pub ordinal: u32,

    pub name: String,

    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub exercises: Vec<Exercise>,

    #[serde(default)]
    pub xp: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,

    /// Hold or work duration for timed exercises.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_secs: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============================================================================
// Merged catalog
// ============================================================================

/// A skill with both tiers merged. Partial when built from metadata alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub difficulty: Difficulty,
    pub stats: IndexMap<String, u32>,
    pub prerequisites: Vec<String>,
    pub unlocks: Vec<String>,
    pub total_levels: u32,
    pub root: bool,
    /// Sorted by ordinal. Empty for a partial skill.
    pub levels: Vec<Level>,
    detail_loaded: bool,
}

impl Skill {
    /// Build a metadata-only skill.
    pub fn partial(summary: &SkillSummary) -> Self {
        Self {
            id: summary.id.clone(),
            name: summary.name.clone(),
            description: summary.description.clone(),
            difficulty: summary.difficulty,
            stats: summary.stats.clone(),
            prerequisites: summary.prerequisites.clone(),
            unlocks: summary.unlocks.clone(),
            total_levels: summary.total_levels,
            root: summary.root,
            levels: Vec::new(),
            detail_loaded: false,
        }
    }

    /// Merge both tiers; detail fields win on collision.
    pub fn merge(summary: &SkillSummary, detail: &SkillDetail) -> Self {
        let mut skill = Self::partial(summary);
        if let Some(ref name) = detail.name {
            skill.name.clone_from(name);
        }
        if detail.description.is_some() {
            skill.description.clone_from(&detail.description);
        }
        if let Some(difficulty) = detail.difficulty {
            skill.difficulty = difficulty;
        }
        let mut levels = detail.levels.clone();
        levels.sort_by_key(|l| l.ordinal);
        skill.levels = levels;
        skill.detail_loaded = true;
        skill
    }

    /// True when no detail tier was available for this skill.
    pub fn is_partial(&self) -> bool {
        !self.detail_loaded
    }

    pub fn level(&self, ordinal: u32) -> Option<&Level> {
        self.levels.iter().find(|l| l.ordinal == ordinal)
    }

    /// Level count, preferring the loaded levels over the summary count.
    pub fn level_count(&self) -> u32 {
        if self.detail_loaded {
            self.levels.len() as u32
        } else {
            self.total_levels
        }
    }
}

/// A category with full skills.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub skills: Vec<Skill>,
}

impl Category {
    /// Merge a metadata entry with its detail partition.
    ///
    /// Skills listed only in the detail partition are ignored: the metadata
    /// tier owns the graph. Skills with no detail entry stay partial.
    pub fn merge(meta: &CategoryMeta, detail: &CategoryDetail) -> Self {
        let skills = meta
            .skills
            .iter()
            .map(|summary| match detail.skill(&summary.id) {
                Some(d) => Skill::merge(summary, d),
                None => Skill::partial(summary),
            })
            .collect();
        Self {
            id: meta.id.clone(),
            name: meta.name.clone(),
            icon: meta.icon.clone(),
            color: meta.color.clone(),
            description: meta.description.clone(),
            skills,
        }
    }

    pub fn skill(&self, id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == id)
    }
}

/// Pre-loaded categories handed to the session queue generator.
pub type Catalog = IndexMap<String, Arc<Category>>;

// ============================================================================
// User progress
// ============================================================================

/// Per-skill progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillProgress {
    #[serde(default)]
    pub completed_levels: BTreeSet<u32>,

    /// Smallest ordinal not in `completed_levels`.
    #[serde(default = "default_current_level")]
    pub current_level: u32,
}

impl Default for SkillProgress {
    fn default() -> Self {
        Self {
            completed_levels: BTreeSet::new(),
            current_level: 1,
        }
    }
}

fn default_current_level() -> u32 {
    1
}

/// Per-user, per-category progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCategoryProgress {
    #[serde(default)]
    pub xp: u64,

    #[serde(default = "default_aggregate_level")]
    pub level: u32,

    #[serde(default)]
    pub completed_skills: BTreeSet<String>,

    #[serde(default)]
    pub skill_progress: BTreeMap<String, SkillProgress>,
}

impl Default for UserCategoryProgress {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            completed_skills: BTreeSet::new(),
            skill_progress: BTreeMap::new(),
        }
    }
}

fn default_aggregate_level() -> u32 {
    1
}

/// Persisted per-user progress document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressDocument {
    pub user: String,

    /// Active programs in selection order.
    #[serde(default)]
    pub active_categories: Vec<String>,

    #[serde(default)]
    pub categories: IndexMap<String, UserCategoryProgress>,
}

// ============================================================================
// Resolution and sessions
// ============================================================================

/// Lifecycle state of a skill for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillState {
    Locked,
    Unlocked,
    InProgress,
    Completed,
}

impl SkillState {
    /// Unlocked or in progress.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Unlocked | Self::InProgress)
    }
}

impl fmt::Display for SkillState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "LOCKED"),
            Self::Unlocked => write!(f, "UNLOCKED"),
            Self::InProgress => write!(f, "IN-PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// A synthesized recommendation for one (skill, level) pair. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub category_id: String,
    pub category_name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub skill_id: String,
    pub skill_name: String,
    pub level: u32,
    pub level_name: String,
    pub subtitle: Option<String>,
    pub xp: u32,
    pub exercises: Vec<Exercise>,
}

// ============================================================================
// Progress events
// ============================================================================

/// Progress event for the JSONL event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    ProgramSelected {
        user: String,
        category: String,
    },
    ProgramDeselected {
        user: String,
        category: String,
    },
    LevelCompleted {
        user: String,
        category: String,
        skill: String,
        level: u32,
        xp: u32,
    },
    SkillCompleted {
        user: String,
        category: String,
        skill: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

// ============================================================================
// Tests
// ============================================================================
