//! Session queue generation: the next actionable level per eligible skill.
//!
//! Walks skills in catalog order, resolves each against the user's progress,
//! and emits one session for the first incomplete level of every skill that
//! is unlocked or in progress. Deterministic for identical inputs; no I/O.

use super::resolver::Resolver;
use super::types::*;
use indexmap::IndexMap;
use tracing::{info, warn};

/// Sessions emitted per category unless configured otherwise.
pub const DEFAULT_MAX_PER_CATEGORY: usize = 2;

/// Sessions emitted across all active categories unless configured otherwise.
pub const DEFAULT_MAX_TOTAL: usize = 4;

/// Builds session queues from a pre-loaded catalog.
#[derive(Debug, Clone, Copy)]
pub struct QueueGenerator<'a> {
    catalog: &'a Catalog,
    override_unlock_root: bool,
}

impl<'a> QueueGenerator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            override_unlock_root: false,
        }
    }

    /// Force `root` skills to at least `Unlocked`.
    pub fn with_root_override(mut self, enabled: bool) -> Self {
        self.override_unlock_root = enabled;
        self
    }

    pub fn generate_for_category(
        &self,
        category: &Category,
        progress: &UserCategoryProgress,
        max_per_category: usize,
    ) -> Vec<Session> {
        category_sessions(category, progress, max_per_category, self.override_unlock_root)
    }

    /// Sessions across the user's active categories, in active order,
    /// truncated to `max_total`.
    ///
    /// A category missing from the catalog or with no skills contributes
    /// nothing. Missing progress is treated as a fresh start.
    pub fn generate_for_user(
        &self,
        active_category_ids: &[String],
        progress_by_category: &IndexMap<String, UserCategoryProgress>,
        max_per_category: usize,
        max_total: usize,
    ) -> Vec<Session> {
        let fresh = UserCategoryProgress::default();
        let mut sessions = Vec::new();

        for category_id in active_category_ids {
            if sessions.len() >= max_total {
                break;
            }
            let Some(category) = self.catalog.get(category_id) else {
                info!("category '{}' not loaded, no sessions", category_id);
                continue;
            };
            let progress = progress_by_category.get(category_id).unwrap_or(&fresh);
            sessions.extend(self.generate_for_category(category, progress, max_per_category));
        }

        sessions.truncate(max_total);
        sessions
    }
}

/// Sessions for one category with no administrative override.
pub fn generate_for_category(
    category: &Category,
    progress: &UserCategoryProgress,
    max_per_category: usize,
) -> Vec<Session> {
    category_sessions(category, progress, max_per_category, false)
}

fn category_sessions(
    category: &Category,
    progress: &UserCategoryProgress,
    max_per_category: usize,
    override_unlock_root: bool,
) -> Vec<Session> {
    if category.skills.is_empty() {
        info!("category '{}' has no skills, no sessions", category.id);
        return Vec::new();
    }

    let resolver = Resolver::for_category(category);
    let mut sessions = Vec::new();

    for skill in &category.skills {
        if sessions.len() >= max_per_category {
            break;
        }
        if progress.completed_skills.contains(&skill.id) {
            continue;
        }

        let skill_progress = progress.skill_progress.get(&skill.id);
        let state = resolver.resolve(
            skill,
            &progress.completed_skills,
            skill_progress,
            override_unlock_root,
        );
        if !state.is_actionable() {
            continue;
        }

        if skill.is_partial() {
            warn!(
                "{}: skill '{}' has no level detail, skipping",
                category.id, skill.id
            );
            continue;
        }

        // The declared level count bounds the skill even when the detail
        // partition defines extra levels.
        let completed = skill_progress.map_or(0, |p| p.completed_levels.len());
        if completed >= skill.total_levels as usize {
            warn!(
                "{}: skill '{}' has {} of {} levels completed but is not marked complete, skipping",
                category.id, skill.id, completed, skill.total_levels
            );
            continue;
        }

        let target = skill.levels.iter().find(|level| {
            skill_progress.is_none_or(|p| !p.completed_levels.contains(&level.ordinal))
        });
        let Some(level) = target else {
            warn!(
                "{}: skill '{}' has every level completed but is not marked complete",
                category.id, skill.id
            );
            continue;
        };

        sessions.push(build_session(category, skill, level));
    }

    sessions
}

fn build_session(category: &Category, skill: &Skill, level: &Level) -> Session {
    Session {
        category_id: category.id.clone(),
        category_name: category.name.clone(),
        icon: category.icon.clone(),
        color: category.color.clone(),
        skill_id: skill.id.clone(),
        skill_name: skill.name.clone(),
        level: level.ordinal,
        level_name: level.name.clone(),
        subtitle: level.subtitle.clone(),
        xp: level.xp,
        exercises: level.exercises.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    /// Merged category from `(skill, prerequisites, level count)` triples.
    fn category(id: &str, skills: &[(&str, &[&str], u32)]) -> Category {
        let mut meta_skills = String::new();
        let mut detail_skills = String::new();
        for (skill, prereqs, levels) in skills {
            meta_skills.push_str(&format!(
                "  - {{ id: {}, name: {}, total_levels: {}, prerequisites: [{}] }}\n",
                skill,
                skill.to_uppercase(),
                levels,
                prereqs.join(", ")
            ));
            detail_skills.push_str(&format!("  - id: {}\n    levels:\n", skill));
            for n in 1..=*levels {
                detail_skills.push_str(&format!(
                    "      - {{ id: {s}{n}, ordinal: {n}, name: {s} level {n}, xp: {xp} }}\n",
                    s = skill,
                    n = n,
                    xp = n * 10
                ));
            }
        }
        if skills.is_empty() {
            meta_skills.push_str("  []\n");
            detail_skills.push_str("  []\n");
        }
        let meta_yaml = format!("id: {}\nname: {}\nskills:\n{}", id, id.to_uppercase(), meta_skills);
        let detail_yaml = format!("id: {}\nskills:\n{}", id, detail_skills);
        let meta: CategoryMeta = serde_yaml_ng::from_str(&meta_yaml).unwrap();
        let detail: CategoryDetail = serde_yaml_ng::from_str(&detail_yaml).unwrap();
        Category::merge(&meta, &detail)
    }

    fn street() -> Category {
        category("street", &[("a", &[], 2), ("b", &["a"], 1)])
    }

    fn progress_with(skill: &str, completed: &[u32]) -> UserCategoryProgress {
        let mut p = UserCategoryProgress::default();
        let completed_levels: BTreeSet<u32> = completed.iter().copied().collect();
        let current_level = crate::core::state::current_level(&completed_levels);
        p.skill_progress.insert(
            skill.to_string(),
            SkillProgress {
                completed_levels,
                current_level,
            },
        );
        p
    }

    fn catalog_of(categories: Vec<Category>) -> Catalog {
        categories
            .into_iter()
            .map(|c| (c.id.clone(), Arc::new(c)))
            .collect()
    }

    #[test]
    fn test_end_to_end_example() {
        let street = street();
        let progress = progress_with("a", &[1]);

        let resolver = Resolver::for_category(&street);
        let states = resolver.resolve_category(&street, &progress, false);
        assert_eq!(
            states,
            vec![
                ("a".to_string(), SkillState::InProgress),
                ("b".to_string(), SkillState::Locked)
            ]
        );

        let sessions = generate_for_category(&street, &progress, DEFAULT_MAX_PER_CATEGORY);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].skill_id, "a");
        assert_eq!(sessions[0].level, 2);
        assert_eq!(sessions[0].xp, 20);
        assert_eq!(sessions[0].category_name, "STREET");
    }

    #[test]
    fn test_sequential_gating() {
        let cat = category("c", &[("s", &[], 3)]);
        let sessions = generate_for_category(&cat, &progress_with("s", &[1]), 5);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].level, 2);
    }

    #[test]
    fn test_gap_targets_first_incomplete_level() {
        let cat = category("c", &[("s", &[], 3)]);
        let sessions = generate_for_category(&cat, &progress_with("s", &[1, 3]), 5);
        assert_eq!(sessions[0].level, 2);
    }

    #[test]
    fn test_fully_completed_levels_skipped_without_completed_skill() {
        let cat = category("c", &[("s", &[], 2)]);
        let sessions = generate_for_category(&cat, &progress_with("s", &[1, 2]), 5);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_declared_level_count_bounds_extra_detail_levels() {
        let meta: CategoryMeta = serde_yaml_ng::from_str(
            "id: c\nname: C\nskills:\n  - { id: s, name: S, total_levels: 2 }\n",
        )
        .unwrap();
        let detail: CategoryDetail = serde_yaml_ng::from_str(
            r#"
id: c
skills:
  - id: s
    levels:
      - { id: s1, ordinal: 1, name: S1 }
      - { id: s2, ordinal: 2, name: S2 }
      - { id: s3, ordinal: 3, name: S3 }
"#,
        )
        .unwrap();
        let cat = Category::merge(&meta, &detail);

        let sessions = generate_for_category(&cat, &progress_with("s", &[1]), 5);
        assert_eq!(sessions[0].level, 2);
        assert!(generate_for_category(&cat, &progress_with("s", &[1, 2]), 5).is_empty());
    }

    #[test]
    fn test_empty_category_yields_nothing() {
        let empty = category("empty", &[]);
        assert!(generate_for_category(&empty, &UserCategoryProgress::default(), 2).is_empty());
        let catalog = Catalog::new();
        let forced = QueueGenerator::new(&catalog).with_root_override(true);
        assert!(forced
            .generate_for_category(&empty, &UserCategoryProgress::default(), 2)
            .is_empty());
    }

    #[test]
    fn test_completed_skill_unlocks_dependent() {
        let street = street();
        let mut progress = progress_with("a", &[1, 2]);
        progress.completed_skills.insert("a".to_string());
        let sessions = generate_for_category(&street, &progress, 5);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].skill_id, "b");
        assert_eq!(sessions[0].level, 1);
    }

    #[test]
    fn test_per_category_cap_keeps_catalog_order() {
        let cat = category("c", &[("x", &[], 1), ("y", &[], 1), ("z", &[], 1)]);
        let sessions = generate_for_category(&cat, &UserCategoryProgress::default(), 2);
        let ids: Vec<_> = sessions.iter().map(|s| s.skill_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_cap_enforcement_across_categories() {
        let one = category("one", &[("a", &[], 1), ("b", &[], 1), ("c", &[], 1)]);
        let two = category("two", &[("d", &[], 1), ("e", &[], 1), ("f", &[], 1)]);
        let catalog = catalog_of(vec![one, two]);
        let active = vec!["one".to_string(), "two".to_string()];

        let sessions =
            QueueGenerator::new(&catalog).generate_for_user(&active, &IndexMap::new(), 3, 4);
        let ids: Vec<_> = sessions.iter().map(|s| s.skill_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_missing_and_empty_categories_yield_nothing() {
        let empty = category("empty", &[]);
        let catalog = catalog_of(vec![empty, street()]);
        let active = vec![
            "ghost".to_string(),
            "empty".to_string(),
            "street".to_string(),
        ];
        let sessions = QueueGenerator::new(&catalog).generate_for_user(
            &active,
            &IndexMap::new(),
            DEFAULT_MAX_PER_CATEGORY,
            DEFAULT_MAX_TOTAL,
        );
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].category_id, "street");
    }

    #[test]
    fn test_idempotent_output() {
        let catalog = catalog_of(vec![street()]);
        let mut progress = IndexMap::new();
        progress.insert("street".to_string(), progress_with("a", &[1]));
        let active = vec!["street".to_string()];
        let generator = QueueGenerator::new(&catalog);

        let first = generator.generate_for_user(&active, &progress, 2, 4);
        let second = generator.generate_for_user(&active, &progress, 2, 4);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_root_override() {
        let meta: CategoryMeta = serde_yaml_ng::from_str(
            r#"
id: c
name: C
skills:
  - { id: gate, name: Gate, root: true, total_levels: 1, prerequisites: [missing] }
"#,
        )
        .unwrap();
        let detail: CategoryDetail = serde_yaml_ng::from_str(
            "id: c\nskills:\n  - id: gate\n    levels: [{ id: g1, ordinal: 1, name: G1 }]\n",
        )
        .unwrap();
        let catalog = catalog_of(vec![Category::merge(&meta, &detail)]);
        let active = vec!["c".to_string()];

        let plain = QueueGenerator::new(&catalog);
        assert!(plain
            .generate_for_user(&active, &IndexMap::new(), 2, 4)
            .is_empty());

        let forced = plain.with_root_override(true);
        assert_eq!(
            forced
                .generate_for_user(&active, &IndexMap::new(), 2, 4)
                .len(),
            1
        );
    }

    #[test]
    fn test_partial_skill_skipped() {
        let meta: CategoryMeta = serde_yaml_ng::from_str(
            "id: c\nname: C\nskills:\n  - { id: s, name: S, total_levels: 2 }\n",
        )
        .unwrap();
        let detail = CategoryDetail {
            id: "c".to_string(),
            skills: vec![],
        };
        let cat = Category::merge(&meta, &detail);
        assert!(generate_for_category(&cat, &UserCategoryProgress::default(), 2).is_empty());
    }

    #[test]
    fn test_inputs_not_mutated() {
        let street = street();
        let progress = progress_with("a", &[1]);
        let before = progress.clone();
        let _ = generate_for_category(&street, &progress, 2);
        assert_eq!(progress, before);
    }
}
