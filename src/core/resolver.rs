//! Skill state resolution and dependency DAG ordering.
//!
//! Resolution is pure: it reads a skill, the user's completed skills and the
//! skill's progress record, and returns a [`SkillState`]. The unlock order is
//! a topological sort over prerequisite edges using Kahn's algorithm with
//! deterministic (alphabetical) tie-breaking.

use super::types::*;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Resolves skill states against one category's dependency graph.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    /// Ids a prerequisite may reference. `None` trusts every id.
    known: Option<HashSet<String>>,
}

impl Resolver {
    /// A resolver that treats prerequisites naming ids outside `known` as
    /// unsatisfiable.
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: Some(known.into_iter().map(Into::into).collect()),
        }
    }

    pub fn for_category(category: &Category) -> Self {
        Self::new(category.skills.iter().map(|s| s.id.as_str()))
    }

    fn is_known(&self, id: &str) -> bool {
        self.known.as_ref().is_none_or(|k| k.contains(id))
    }

    /// Compute a skill's state.
    ///
    /// `override_unlock_root` lifts a `root` skill to at least `Unlocked`
    /// regardless of its prerequisites.
    pub fn resolve(
        &self,
        skill: &Skill,
        completed_skills: &BTreeSet<String>,
        progress: Option<&SkillProgress>,
        override_unlock_root: bool,
    ) -> SkillState {
        if completed_skills.contains(&skill.id) {
            return SkillState::Completed;
        }

        if let Some(p) = progress {
            if p.current_level > 1 || (skill.root && !p.completed_levels.is_empty()) {
                return SkillState::InProgress;
            }
        }

        let satisfied = skill
            .prerequisites
            .iter()
            .all(|id| self.is_known(id) && completed_skills.contains(id));
        if satisfied || (override_unlock_root && skill.root) {
            return SkillState::Unlocked;
        }

        SkillState::Locked
    }

    /// Resolve every skill of a category, in catalog order.
    pub fn resolve_category(
        &self,
        category: &Category,
        progress: &UserCategoryProgress,
        override_unlock_root: bool,
    ) -> Vec<(String, SkillState)> {
        category
            .skills
            .iter()
            .map(|skill| {
                let state = self.resolve(
                    skill,
                    &progress.completed_skills,
                    progress.skill_progress.get(&skill.id),
                    override_unlock_root,
                );
                (skill.id.clone(), state)
            })
            .collect()
    }
}

/// Build a topological unlock order from prerequisite edges.
///
/// Errors name unknown prerequisites or the members of a cycle.
pub fn unlock_order(skills: &[SkillSummary]) -> Result<Vec<String>, String> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for skill in skills {
        in_degree.insert(skill.id.as_str(), 0);
        adjacency.insert(skill.id.as_str(), Vec::new());
    }

    for skill in skills {
        for dep in &skill.prerequisites {
            let Some(edges) = adjacency.get_mut(dep.as_str()) else {
                return Err(format!(
                    "skill '{}' requires unknown '{}'",
                    skill.id, dep
                ));
            };
            edges.push(skill.id.as_str());
            if let Some(degree) = in_degree.get_mut(skill.id.as_str()) {
                *degree += 1;
            }
        }
    }

    let mut zero_degree: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| *id)
        .collect();
    zero_degree.sort_unstable();
    let mut queue: VecDeque<&str> = zero_degree.into_iter().collect();

    let mut order = Vec::new();
    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());

        let mut next_ready: Vec<&str> = Vec::new();
        if let Some(neighbors) = adjacency.get(current) {
            for &neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(neighbor);
                    }
                }
            }
        }
        next_ready.sort_unstable();
        queue.extend(next_ready);
    }

    if order.len() != in_degree.len() {
        let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut cycle_members: Vec<&str> = in_degree
            .keys()
            .filter(|id| !ordered.contains(*id))
            .copied()
            .collect();
        cycle_members.sort_unstable();
        return Err(format!(
            "dependency cycle detected involving: {}",
            cycle_members.join(", ")
        ));
    }

    Ok(order)
}
