use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

use crate::schema::Scene;

pub const SEED_ENV_VAR: &str = "GLYPHDECK_SEED";

#[derive(Debug, Clone, Default)]
pub struct SceneLoadOptions {
    /// Seed from the command line; wins over the environment and the file.
    pub seed: Option<u64>,
    /// Raw value of [`SEED_ENV_VAR`], if set.
    pub seed_env: Option<String>,
}

impl SceneLoadOptions {
    pub fn from_env(seed: Option<u64>) -> Self {
        Self {
            seed,
            seed_env: std::env::var(SEED_ENV_VAR).ok(),
        }
    }
}

/// Resolve the seed from CLI and env. CLI wins over env; an unparsable env
/// value is an error rather than silently ignored.
pub fn resolve_seed(cli_arg: Option<u64>, env_var: Option<&str>) -> Result<Option<u64>> {
    if cli_arg.is_some() {
        return Ok(cli_arg);
    }
    match env_var.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|error| anyhow!("{SEED_ENV_VAR}='{raw}' is not a valid seed: {error}")),
    }
}

pub fn load_and_validate_scene(path: &Path) -> Result<Scene> {
    load_and_validate_scene_with_options(path, &SceneLoadOptions::default())
}

pub fn load_and_validate_scene_with_options(
    path: &Path,
    options: &SceneLoadOptions,
) -> Result<Scene> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    let mut scene: Scene = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;

    if let Some(seed) = resolve_seed(options.seed, options.seed_env.as_deref())? {
        scene.seed = seed;
    }

    validate_scene(&mut scene, path)?;
    Ok(scene)
}

fn validate_scene(scene: &mut Scene, scene_path: &Path) -> Result<()> {
    scene.validate()?;

    let mut seen_ids = HashSet::with_capacity(scene.sections.len());
    for section in &scene.sections {
        if section.id.trim().is_empty() {
            bail!("section id cannot be empty");
        }
        if !seen_ids.insert(section.id.as_str()) {
            bail!("duplicate section id '{}'", section.id);
        }
    }

    let mut unknown_tints = scene
        .tints
        .keys()
        .filter(|id| !seen_ids.contains(id.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if !unknown_tints.is_empty() {
        unknown_tints.sort();
        bail!(
            "tints reference unknown section(s): {}. Define them under sections",
            unknown_tints.join(", ")
        );
    }

    if let Some(font) = &scene.font {
        let scene_dir = scene_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        scene.font = Some(resolve_and_validate_font_path(&scene_dir, font)?);
    }

    // Stable, so inputs sharing a timestamp keep their file order.
    scene.tape.sort_by_key(|event| event.at_ms);
    Ok(())
}

fn resolve_and_validate_font_path(scene_dir: &Path, font: &Path) -> Result<PathBuf> {
    let resolved = if font.is_absolute() {
        font.to_path_buf()
    } else {
        scene_dir.join(font)
    };

    if !resolved.exists() {
        bail!("font does not exist: {}", resolved.display());
    }
    if !resolved.is_file() {
        bail!("font is not a file: {}", resolved.display());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{load_and_validate_scene, load_and_validate_scene_with_options, resolve_seed};
    use super::SceneLoadOptions;

    const SCENE: &str = r#"
viewport: { width: 640, height: 360 }
duration: { frames: 4 }
seed: 5
sections:
  - { id: a, side: left }
  - { id: b, side: right }
tape:
  - { at_ms: 300, kind: wheel, delta_y: 10 }
  - { at_ms: 100, kind: wheel, delta_y: 20 }
"#;

    #[test]
    fn cli_seed_wins_over_env() {
        assert_eq!(resolve_seed(Some(3), Some("9")).expect("seed"), Some(3));
        assert_eq!(resolve_seed(None, Some("9")).expect("seed"), Some(9));
        assert_eq!(resolve_seed(None, None).expect("seed"), None);
        assert!(resolve_seed(None, Some("nope")).is_err());
    }

    #[test]
    fn tape_is_sorted_and_seed_overridden() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("scene.yaml");
        fs::write(&path, SCENE).expect("scene should write");

        let scene = load_and_validate_scene(&path).expect("scene should load");
        assert_eq!(scene.seed, 5);
        assert_eq!(scene.tape[0].at_ms, 100);

        let scene = load_and_validate_scene_with_options(
            &path,
            &SceneLoadOptions {
                seed: None,
                seed_env: Some("77".to_owned()),
            },
        )
        .expect("scene should load");
        assert_eq!(scene.seed, 77);
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("scene.yaml");
        fs::write(
            &path,
            r#"
viewport: { width: 640, height: 360 }
duration: { frames: 1 }
sections:
  - { id: a, side: left }
  - { id: a, side: right }
"#,
        )
        .expect("scene should write");

        let error = load_and_validate_scene(&path).expect_err("duplicate should fail");
        assert!(error.to_string().contains("duplicate section id 'a'"));
    }

    #[test]
    fn tint_for_unknown_section_is_rejected() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("scene.yaml");
        fs::write(
            &path,
            r#"
viewport: { width: 640, height: 360 }
duration: { frames: 1 }
sections:
  - { id: a, side: left }
tints:
  ghost: { r: 1, g: 2, b: 3 }
"#,
        )
        .expect("scene should write");

        let error = load_and_validate_scene(&path).expect_err("unknown tint should fail");
        assert!(error.to_string().contains("ghost"));
    }

    #[test]
    fn missing_font_is_rejected() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("scene.yaml");
        fs::write(
            &path,
            r#"
viewport: { width: 640, height: 360 }
duration: { frames: 1 }
font: fonts/missing.ttf
"#,
        )
        .expect("scene should write");

        let error = load_and_validate_scene(&path).expect_err("missing font should fail");
        assert!(error.to_string().contains("font does not exist"));
    }
}
