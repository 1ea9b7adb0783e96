//! CLI subcommands: init, validate, status, sessions, complete, select, audit.

use crate::core::config::{self, EngineConfig, DEFAULT_CONFIG_FILE};
use crate::core::loader::Loader;
use crate::core::queue::QueueGenerator;
use crate::core::resolver::Resolver;
use crate::core::{parser, state};
use crate::ledger::{digest, drift, eventlog};
use crate::source::{DirSource, Retrying};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a config file, a sample catalog and a progress directory
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Parse the catalog and check its dependency graph
    Validate,

    /// Show skill states for a user
    Status {
        #[arg(short, long)]
        user: String,

        /// Only this category (default: active programs)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show the next sessions across a user's active programs
    Sessions {
        #[arg(short, long)]
        user: String,

        /// Print sessions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a completed level
    Complete {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        category: String,

        #[arg(short, long)]
        skill: String,

        #[arg(short, long)]
        level: u32,
    },

    /// Activate (or with --remove, deactivate) a program
    Select {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        category: String,

        #[arg(long)]
        remove: bool,
    },

    /// Audit a user's progress against the catalog
    Audit {
        #[arg(short, long)]
        user: String,

        /// Exit non-zero on any finding
        #[arg(long)]
        strict: bool,
    },
}

/// Dispatch a CLI command.
pub async fn dispatch(config_path: &Path, cmd: Commands) -> Result<(), String> {
    if let Commands::Init { path } = cmd {
        return cmd_init(&path);
    }
    let config = config::load_config(config_path).map_err(|e| e.to_string())?;
    run(&config, cmd).await
}

async fn run(config: &EngineConfig, cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate => cmd_validate(config),
        Commands::Status { user, category } => cmd_status(config, &user, category.as_deref()).await,
        Commands::Sessions { user, json } => cmd_sessions(config, &user, json).await,
        Commands::Complete {
            user,
            category,
            skill,
            level,
        } => cmd_complete(config, &user, &category, &skill, level).await,
        Commands::Select {
            user,
            category,
            remove,
        } => cmd_select(config, &user, &category, remove).await,
        Commands::Audit { user, strict } => cmd_audit(config, &user, strict).await,
    }
}

fn build_loader(config: &EngineConfig) -> Loader {
    let source = Retrying::new(DirSource::new(&config.catalog_dir), config.retry.clone());
    Loader::new(source).strict(config.strict_catalog)
}

const SAMPLE_METADATA: &str = r##"categories:
  - id: street
    name: Street Workout
    icon: bar
    color: "#ff6600"
    description: Bodyweight strength on bars and rings.
    skills:
      - id: pull-up
        name: Pull-up
        difficulty: beginner
        root: true
        total_levels: 2
        stats: { strength: 2, control: 1 }
        unlocks: [muscle-up]
      - id: muscle-up
        name: Muscle-up
        difficulty: advanced
        prerequisites: [pull-up]
        total_levels: 1
        stats: { strength: 3, power: 2 }
"##;

const SAMPLE_STREET: &str = r#"id: street
skills:
  - id: pull-up
    levels:
      - id: pull-up-1
        ordinal: 1
        name: Negatives
        subtitle: Control the descent
        xp: 50
        exercises:
          - { id: negative, name: Slow negative, sets: 3, reps: 5, rest_secs: 90 }
          - { id: dead-hang, name: Dead hang, sets: 3, duration_secs: 30 }
      - id: pull-up-2
        ordinal: 2
        name: Full range
        xp: 80
        exercises:
          - { id: strict-pull-up, name: Strict pull-up, sets: 4, reps: 6, rest_secs: 120 }
  - id: muscle-up
    levels:
      - id: muscle-up-1
        ordinal: 1
        name: Transition
        xp: 150
        exercises:
          - { id: high-pull, name: Explosive high pull, sets: 5, reps: 3 }
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    let defaults = EngineConfig::default();
    let categories_dir = path.join(&defaults.catalog_dir).join("categories");
    let progress_dir = path.join(&defaults.progress_dir);
    for dir in [&categories_dir, &progress_dir] {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
    }

    let template = serde_yaml_ng::to_string(&defaults).map_err(|e| e.to_string())?;
    let files = [
        (config_path.clone(), template.as_str()),
        (path.join(&defaults.catalog_dir).join("metadata.yaml"), SAMPLE_METADATA),
        (categories_dir.join("street.yaml"), SAMPLE_STREET),
    ];
    for (file, content) in &files {
        std::fs::write(file, content)
            .map_err(|e| format!("cannot write {}: {}", file.display(), e))?;
    }

    println!("Initialized ascend project at {}", path.display());
    for (file, _) in &files {
        println!("  Created: {}", file.display());
    }
    println!("  Created: {}/", progress_dir.display());
    Ok(())
}

fn cmd_validate(config: &EngineConfig) -> Result<(), String> {
    let source = DirSource::new(&config.catalog_dir);
    let metadata = parser::parse_metadata_file(&source.metadata_path())?;
    let mut errors = parser::validate_metadata(&metadata);

    let mut skills = 0;
    for category in &metadata.categories {
        skills += category.skills.len();
        let path = source.category_path(&category.id);
        if !path.exists() {
            errors.push(parser::ValidationError {
                message: format!("{}: no detail partition at {}", category.id, path.display()),
            });
            continue;
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let detail = parser::parse_category_detail(&content)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        errors.extend(parser::validate_detail(category, &detail));
    }

    if errors.is_empty() {
        let digest = digest::catalog_digest(&config.catalog_dir)?;
        println!(
            "OK: {} categories, {} skills ({})",
            metadata.categories.len(),
            skills,
            digest
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

async fn cmd_status(
    config: &EngineConfig,
    user: &str,
    category_filter: Option<&str>,
) -> Result<(), String> {
    let doc = state::load_or_new(&config.progress_dir, user).map_err(|e| e.to_string())?;
    let ids: Vec<String> = match category_filter {
        Some(c) => vec![c.to_string()],
        None => doc.active_categories.clone(),
    };
    if ids.is_empty() {
        println!("No active programs for {}. Run `ascend select` first.", user);
        return Ok(());
    }

    let catalog = build_loader(config)
        .load_catalog(&ids)
        .await
        .map_err(|e| e.to_string())?;

    let fresh = Default::default();
    for id in &ids {
        let Some(category) = catalog.get(id) else {
            println!("{}: not available", id);
            continue;
        };
        let progress = doc.categories.get(id).unwrap_or(&fresh);
        println!(
            "{} ({}): {} XP, level {}",
            category.name, category.id, progress.xp, progress.level
        );

        let resolver = Resolver::for_category(category);
        let states = resolver.resolve_category(category, progress, config.override_unlock_root);
        for (skill, (skill_id, skill_state)) in category.skills.iter().zip(states) {
            let done = progress
                .skill_progress
                .get(&skill_id)
                .map(|p| p.completed_levels.len())
                .unwrap_or(0);
            println!(
                "  {:<20} {:<12} {}/{}",
                skill_id,
                skill_state.to_string(),
                done,
                skill.level_count()
            );
        }
    }
    Ok(())
}

async fn cmd_sessions(config: &EngineConfig, user: &str, json: bool) -> Result<(), String> {
    let doc = state::load_or_new(&config.progress_dir, user).map_err(|e| e.to_string())?;
    let catalog = build_loader(config)
        .load_catalog(&doc.active_categories)
        .await
        .map_err(|e| e.to_string())?;

    let sessions = QueueGenerator::new(&catalog)
        .with_root_override(config.override_unlock_root)
        .generate_for_user(
            &doc.active_categories,
            &doc.categories,
            config.max_per_category,
            config.max_total,
        );
    let digest = digest::session_digest(&sessions).map_err(|e| e.to_string())?;

    if json {
        let out = serde_json::to_string_pretty(&sessions).map_err(|e| e.to_string())?;
        println!("{}", out);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions available.");
    }
    for s in &sessions {
        println!(
            "{} / {}: level {} {} (+{} XP)",
            s.category_name, s.skill_name, s.level, s.level_name, s.xp
        );
        for ex in &s.exercises {
            let dose = match (ex.sets, ex.reps, ex.duration_secs) {
                (Some(sets), Some(reps), _) => format!("{}x{}", sets, reps),
                (Some(sets), None, Some(secs)) => format!("{}x{}s", sets, secs),
                (None, _, Some(secs)) => format!("{}s", secs),
                _ => String::new(),
            };
            println!("    - {} {}", ex.name, dose);
        }
    }
    println!("Queue: {} session(s) ({})", sessions.len(), digest);
    Ok(())
}

async fn cmd_complete(
    config: &EngineConfig,
    user: &str,
    category_id: &str,
    skill_id: &str,
    level: u32,
) -> Result<(), String> {
    let category = build_loader(config)
        .get_category(category_id)
        .await
        .map_err(|e| e.to_string())?;
    let xp = category
        .skill(skill_id)
        .and_then(|s| s.level(level))
        .map(|l| l.xp)
        .unwrap_or(0);

    let mut doc = state::load_or_new(&config.progress_dir, user).map_err(|e| e.to_string())?;
    let events = state::record_level_complete(&mut doc, &category, skill_id, level, xp)
        .map_err(|e| e.to_string())?;
    if events.is_empty() {
        println!("{} level {} already completed.", skill_id, level);
        return Ok(());
    }

    state::save_progress(&config.progress_dir, &doc).map_err(|e| e.to_string())?;
    eventlog::append_events(&config.progress_dir, user, events.clone())
        .map_err(|e| e.to_string())?;

    println!("Completed {} level {} (+{} XP)", skill_id, level, xp);
    if events.len() > 1 {
        println!("Skill {} complete!", skill_id);
    }
    Ok(())
}

async fn cmd_select(
    config: &EngineConfig,
    user: &str,
    category_id: &str,
    remove: bool,
) -> Result<(), String> {
    let mut doc = state::load_or_new(&config.progress_dir, user).map_err(|e| e.to_string())?;

    let event = if remove {
        state::deselect_program(&mut doc, category_id)
    } else {
        let metadata = build_loader(config)
            .get_metadata()
            .await
            .map_err(|e| e.to_string())?;
        if metadata.category(category_id).is_none() {
            return Err(format!("unknown category: {}", category_id));
        }
        state::select_program(&mut doc, category_id).map_err(|e| e.to_string())?
    };

    let Some(event) = event else {
        println!("No change.");
        return Ok(());
    };
    state::save_progress(&config.progress_dir, &doc).map_err(|e| e.to_string())?;
    eventlog::append_events(&config.progress_dir, user, [event]).map_err(|e| e.to_string())?;
    println!("Active programs: {}", doc.active_categories.join(", "));
    Ok(())
}

async fn cmd_audit(config: &EngineConfig, user: &str, strict: bool) -> Result<(), String> {
    let Some(doc) = state::load_progress(&config.progress_dir, user).map_err(|e| e.to_string())?
    else {
        println!("No progress recorded for {}.", user);
        return Ok(());
    };
    let ids: Vec<String> = doc.categories.keys().cloned().collect();
    let catalog = build_loader(config)
        .load_catalog(&ids)
        .await
        .map_err(|e| e.to_string())?;

    let findings = drift::detect_drift(&doc, &catalog);
    if findings.is_empty() {
        println!("No drift detected.");
        return Ok(());
    }
    for f in &findings {
        let subject = match &f.skill {
            Some(skill) => format!("{}/{}", f.category, skill),
            None => f.category.clone(),
        };
        println!("  DRIFTED: {} [{}] {}", subject, f.kind, f.detail);
    }
    println!();
    println!("Drift detected: {} finding(s)", findings.len());
    if strict {
        return Err(format!("{} drift finding(s)", findings.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SkillState;

    fn project() -> (tempfile::TempDir, EngineConfig) {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        let config = config::load_config(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        (dir, config)
    }

    #[test]
    fn test_init() {
        let (dir, config) = project();
        assert!(dir.path().join("ascend.yaml").exists());
        assert!(dir.path().join("progress").is_dir());
        assert_eq!(config.catalog_dir, dir.path().join("catalog"));
        assert_eq!(config.max_total, 4);
    }

    #[test]
    fn test_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ascend.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_sample_catalog_validates() {
        let (_dir, config) = project();
        cmd_validate(&config).unwrap();
    }

    #[test]
    fn test_validate_reports_broken_graph() {
        let (_dir, config) = project();
        let meta = config.catalog_dir.join("metadata.yaml");
        let broken = SAMPLE_METADATA.replace("unlocks: [muscle-up]", "unlocks: []");
        std::fs::write(&meta, broken).unwrap();
        let err = cmd_validate(&config).unwrap_err();
        assert_eq!(err, "1 validation error(s)");
    }

    #[tokio::test]
    async fn test_select_complete_flow() {
        let (_dir, config) = project();

        cmd_select(&config, "ana", "street", false).await.unwrap();
        let doc = state::load_progress(&config.progress_dir, "ana")
            .unwrap()
            .unwrap();
        assert_eq!(doc.active_categories, vec!["street"]);

        cmd_complete(&config, "ana", "street", "pull-up", 1).await.unwrap();
        cmd_complete(&config, "ana", "street", "pull-up", 2).await.unwrap();
        let doc = state::load_progress(&config.progress_dir, "ana")
            .unwrap()
            .unwrap();
        let street = &doc.categories["street"];
        assert_eq!(street.xp, 130);
        assert!(street.completed_skills.contains("pull-up"));

        let events = eventlog::read_events(&config.progress_dir, "ana").unwrap();
        assert_eq!(events.len(), 4);

        cmd_sessions(&config, "ana", false).await.unwrap();
        cmd_status(&config, "ana", None).await.unwrap();
        cmd_audit(&config, "ana", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_select_unknown_category() {
        let (_dir, config) = project();
        let err = cmd_select(&config, "ana", "yoga", false).await.unwrap_err();
        assert!(err.contains("yoga"));
    }

    #[tokio::test]
    async fn test_complete_unknown_level() {
        let (_dir, config) = project();
        let err = cmd_complete(&config, "ana", "street", "pull-up", 9)
            .await
            .unwrap_err();
        assert!(err.contains("no level 9"));
    }

    #[tokio::test]
    async fn test_complete_rejects_traversing_user() {
        let (dir, config) = project();
        let err = cmd_complete(&config, "../x", "street", "pull-up", 1)
            .await
            .unwrap_err();
        assert!(err.contains("invalid user id '../x'"));
        assert!(!config.progress_dir.join("../x").exists());
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_audit_strict_fails_on_drift() {
        let (_dir, config) = project();
        let mut doc = state::new_progress("ana");
        doc.categories
            .entry("street".to_string())
            .or_default()
            .completed_skills
            .insert("pull-up".to_string());
        state::save_progress(&config.progress_dir, &doc).unwrap();

        cmd_audit(&config, "ana", false).await.unwrap();
        assert!(cmd_audit(&config, "ana", true).await.is_err());
    }

    #[tokio::test]
    async fn test_status_states_match_resolver() {
        let (_dir, config) = project();
        let catalog = build_loader(&config)
            .load_catalog(&["street".to_string()])
            .await
            .unwrap();
        let street = &catalog["street"];
        let states = Resolver::for_category(street).resolve_category(
            street,
            &Default::default(),
            false,
        );
        assert_eq!(states[0].1, SkillState::Unlocked);
        assert_eq!(states[1].1, SkillState::Locked);
        cmd_status(&config, "nobody", Some("street")).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let err = dispatch(&dir.path().join("ascend.yaml"), Commands::Validate)
            .await
            .unwrap_err();
        assert!(err.contains("metadata.yaml"));
    }
}
