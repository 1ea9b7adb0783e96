//! Progress documents: load, save (atomic), completion recording, program
//! selection.

use super::error::StateError;
use super::parser::is_safe_id;
use super::types::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Programs a user may follow at once.
pub const MAX_ACTIVE_CATEGORIES: usize = 2;

/// XP per aggregate category level.
pub const XP_PER_LEVEL: u64 = 1000;

/// The per-user directory under the progress root. User ids are path
/// components, so anything that is not a plain id is rejected.
pub fn user_dir(progress_dir: &Path, user: &str) -> Result<PathBuf, StateError> {
    if !is_safe_id(user) {
        return Err(StateError::InvalidUser(user.to_string()));
    }
    Ok(progress_dir.join(user))
}

/// Derive the progress document path for a user within the progress directory.
pub fn progress_path(progress_dir: &Path, user: &str) -> Result<PathBuf, StateError> {
    Ok(user_dir(progress_dir, user)?.join("progress.yaml"))
}

/// Load a user's progress document. Returns None if the file doesn't exist.
pub fn load_progress(
    progress_dir: &Path,
    user: &str,
) -> Result<Option<ProgressDocument>, StateError> {
    let path = progress_path(progress_dir, user)?;
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|source| StateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let doc: ProgressDocument =
        serde_yaml_ng::from_str(&content).map_err(|source| StateError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Some(doc))
}

/// Load a user's progress, or start a fresh document.
pub fn load_or_new(progress_dir: &Path, user: &str) -> Result<ProgressDocument, StateError> {
    Ok(load_progress(progress_dir, user)?.unwrap_or_else(|| new_progress(user)))
}

/// Save a progress document atomically (write to temp, then rename).
pub fn save_progress(progress_dir: &Path, doc: &ProgressDocument) -> Result<(), StateError> {
    let path = progress_path(progress_dir, &doc.user)?;
    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source| StateError::Io { path, source }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let yaml = serde_yaml_ng::to_string(doc)?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml).map_err(io_err(&tmp_path))?;
    std::fs::rename(&tmp_path, &path).map_err(io_err(&path))?;

    Ok(())
}

/// Create an empty progress document for a user.
pub fn new_progress(user: &str) -> ProgressDocument {
    ProgressDocument {
        user: user.to_string(),
        active_categories: Vec::new(),
        categories: indexmap::IndexMap::new(),
    }
}

/// Smallest ordinal (from 1) not in `completed_levels`.
pub fn current_level(completed_levels: &BTreeSet<u32>) -> u32 {
    let mut level = 1;
    while completed_levels.contains(&level) {
        level += 1;
    }
    level
}

/// Aggregate category level for an XP total.
pub fn aggregate_level(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL)
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}

/// Record completion of one level.
///
/// Marks the level, advances `current_level`, awards `xp`, and marks the
/// skill complete once every level is done. Recording a level that is already
/// complete changes nothing and returns no events.
pub fn record_level_complete(
    doc: &mut ProgressDocument,
    category: &Category,
    skill_id: &str,
    level: u32,
    xp: u32,
) -> Result<Vec<ProgressEvent>, StateError> {
    let unknown = || StateError::UnknownLevel {
        skill: skill_id.to_string(),
        level,
    };
    let skill = category.skill(skill_id).ok_or_else(unknown)?;
    let level_count = skill.level_count();
    if level == 0 || level > level_count {
        return Err(unknown());
    }

    let user = doc.user.clone();
    let cp = doc.categories.entry(category.id.clone()).or_default();
    let sp = cp.skill_progress.entry(skill_id.to_string()).or_default();
    if !sp.completed_levels.insert(level) {
        return Ok(Vec::new());
    }
    sp.current_level = current_level(&sp.completed_levels);
    let skill_done = sp.completed_levels.len() as u32 >= level_count;

    cp.xp += u64::from(xp);
    cp.level = aggregate_level(cp.xp);

    let mut events = vec![ProgressEvent::LevelCompleted {
        user: user.clone(),
        category: category.id.clone(),
        skill: skill_id.to_string(),
        level,
        xp,
    }];

    if skill_done && cp.completed_skills.insert(skill_id.to_string()) {
        info!("{}: '{}' completed skill '{}'", category.id, user, skill_id);
        events.push(ProgressEvent::SkillCompleted {
            user,
            category: category.id.clone(),
            skill: skill_id.to_string(),
        });
    }

    Ok(events)
}

/// Activate a program. Selecting an already active program is a no-op.
pub fn select_program(
    doc: &mut ProgressDocument,
    category_id: &str,
) -> Result<Option<ProgressEvent>, StateError> {
    if doc.active_categories.iter().any(|c| c == category_id) {
        return Ok(None);
    }
    if doc.active_categories.len() >= MAX_ACTIVE_CATEGORIES {
        return Err(StateError::TooManyPrograms {
            max: MAX_ACTIVE_CATEGORIES,
            active: doc.active_categories.join(", "),
        });
    }
    doc.active_categories.push(category_id.to_string());
    doc.categories.entry(category_id.to_string()).or_default();
    Ok(Some(ProgressEvent::ProgramSelected {
        user: doc.user.clone(),
        category: category_id.to_string(),
    }))
}

/// Deactivate a program. Its progress is kept.
pub fn deselect_program(doc: &mut ProgressDocument, category_id: &str) -> Option<ProgressEvent> {
    let before = doc.active_categories.len();
    doc.active_categories.retain(|c| c != category_id);
    (doc.active_categories.len() != before).then(|| ProgressEvent::ProgramDeselected {
        user: doc.user.clone(),
        category: category_id.to_string(),
    })
}
