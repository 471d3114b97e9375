use crate::builder::spec::{BuildSpec, CopyStep, Instruction};
use crate::dockerignore::DockerIgnore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const PLAN_DIR: &str = ".berth";
const PLAN_FILE: &str = "layers.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub instruction: String,
    pub key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    Cached,
    Rebuilt,
}

/// Cache keys for every layer of an image build. Each key covers its parent
/// key, so a changed layer changes every key after it.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct LayerPlan {
    pub layers: Vec<Layer>,
}

impl LayerPlan {
    pub fn compute(spec: &BuildSpec, context_dir: &Path, ignore: &DockerIgnore) -> io::Result<Self> {
        let mut parent = blake3::Hash::from([0u8; 32]);
        let mut layers = Vec::new();

        for instruction in spec.instructions() {
            let text = instruction.to_string();
            let mut hasher = blake3::Hasher::new();
            hasher.update(parent.as_bytes());
            hasher.update(text.as_bytes());
            if let Instruction::Copy(step) = &instruction {
                hasher.update(content_digest(step, context_dir, ignore)?.as_bytes());
            }

            parent = hasher.finalize();
            layers.push(Layer {
                instruction: text,
                key: parent.to_hex().to_string(),
            });
        }

        Ok(LayerPlan { layers })
    }

    /// Pairs each layer with whether `previous` already produced it. Once a
    /// layer is rebuilt, every later layer is too.
    pub fn compare<'a>(&'a self, previous: Option<&LayerPlan>) -> Vec<(&'a Layer, LayerState)> {
        let mut cached = previous.is_some();
        self.layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                cached = cached
                    && previous
                        .and_then(|p| p.layers.get(i))
                        .map(|old| old.key == layer.key)
                        .unwrap_or(false);
                let state = if cached {
                    LayerState::Cached
                } else {
                    LayerState::Rebuilt
                };
                (layer, state)
            })
            .collect()
    }

    fn path(context_dir: &Path) -> PathBuf {
        context_dir.join(PLAN_DIR).join(PLAN_FILE)
    }

    /// The plan recorded by the last successful build, if any.
    pub fn load(context_dir: &Path) -> Option<Self> {
        let contents = fs::read_to_string(Self::path(context_dir)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn save(&self, context_dir: &Path) -> io::Result<()> {
        let path = Self::path(context_dir);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, contents)
    }
}

/// Whether `name` (context-relative) lies in berth's own state directory,
/// which never counts as build input.
fn is_plan_path(name: &str) -> bool {
    name.split('/').next() == Some(PLAN_DIR)
}

fn relative_name(context_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(context_dir).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    Some(parts.join("/"))
}

fn collect_files(
    context_dir: &Path,
    path: &Path,
    ignore: &DockerIgnore,
    files: &mut Vec<(String, PathBuf)>,
) -> io::Result<()> {
    let name = relative_name(context_dir, path).unwrap_or_default();
    if !name.is_empty() && (is_plan_path(&name) || ignore.ignores(&name)) {
        return Ok(());
    }

    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        for entry in fs::read_dir(path)? {
            collect_files(context_dir, &entry?.path(), ignore, files)?;
        }
    } else if metadata.is_file() {
        files.push((name, path.to_path_buf()));
    }
    Ok(())
}

/// Digest of the files a copy source selects: each file's context-relative
/// path and bytes, in path order. Sources may be glob patterns.
pub fn content_digest(step: &CopyStep, context_dir: &Path, ignore: &DockerIgnore) -> io::Result<blake3::Hash> {
    let mut files = Vec::new();

    if step.is_full_source() {
        collect_files(context_dir, context_dir, ignore, &mut files)?;
    } else {
        let pattern = context_dir.join(&step.source);
        let pattern = pattern.to_string_lossy();
        let matches = glob::glob(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        for entry in matches {
            let path = entry.map_err(|e| io::Error::other(e.to_string()))?;
            collect_files(context_dir, &path, ignore, &mut files)?;
        }
    }

    files.sort();
    files.dedup();

    let mut hasher = blake3::Hasher::new();
    for (name, path) in &files {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(&fs::read(path)?);
        hasher.update(&[0]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::spec::tests::python_spec;
    use std::fs;
    use tempfile::TempDir;

    const INSTALL: &str = "RUN pip install --no-cache-dir -r requirements.txt";

    fn context() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("requirements.txt"), "fastapi==0.110.0\n").unwrap();
        fs::write(dir.path().join("main.py"), "app = None\n").unwrap();
        fs::create_dir(dir.path().join("static")).unwrap();
        fs::write(dir.path().join("static/index.html"), "<html></html>").unwrap();
        dir
    }

    fn key<'a>(plan: &'a LayerPlan, instruction: &str) -> &'a str {
        let layer = plan.layers.iter().find(|layer| layer.instruction == instruction);
        &layer.unwrap().key
    }

    fn plan(dir: &TempDir) -> LayerPlan {
        LayerPlan::compute(&python_spec(), dir.path(), &DockerIgnore::load(dir.path())).unwrap()
    }

    fn states(current: &LayerPlan, previous: &LayerPlan) -> Vec<LayerState> {
        current
            .compare(Some(previous))
            .into_iter()
            .map(|(_, state)| state)
            .collect()
    }

    #[test]
    fn unchanged_inputs_give_identical_plans() {
        let dir = context();
        let first = plan(&dir);
        assert_eq!(first.layers.len(), 7);
        assert_eq!(plan(&dir), first);
        assert!(states(&plan(&dir), &first)
            .iter()
            .all(|s| *s == LayerState::Cached));
    }

    #[test]
    fn source_edit_keeps_install_layer() {
        let dir = context();
        let before = plan(&dir);
        fs::write(dir.path().join("main.py"), "app = 'changed'\n").unwrap();
        let after = plan(&dir);

        assert_eq!(key(&after, INSTALL), key(&before, INSTALL));
        assert_ne!(key(&after, "COPY . ."), key(&before, "COPY . ."));
        assert_eq!(
            states(&after, &before),
            vec![
                LayerState::Cached,
                LayerState::Cached,
                LayerState::Cached,
                LayerState::Cached,
                LayerState::Rebuilt,
                LayerState::Rebuilt,
                LayerState::Rebuilt,
            ]
        );
    }

    #[test]
    fn manifest_edit_invalidates_install_layer() {
        let dir = context();
        let before = plan(&dir);
        fs::write(dir.path().join("requirements.txt"), "fastapi==0.111.0\n").unwrap();
        let after = plan(&dir);

        assert_ne!(key(&after, INSTALL), key(&before, INSTALL));
        assert_eq!(states(&after, &before)[2], LayerState::Rebuilt);
        assert_eq!(states(&after, &before)[3], LayerState::Rebuilt);
    }

    #[test]
    fn ignored_files_do_not_affect_keys() {
        let dir = context();
        fs::write(dir.path().join(".dockerignore"), ".berth\n*.log\n").unwrap();
        let before = plan(&dir);
        fs::write(dir.path().join("debug.log"), "noise").unwrap();
        before.save(dir.path()).unwrap();
        assert_eq!(plan(&dir), before);
    }

    #[test]
    fn saving_the_plan_does_not_invalidate_it() {
        let dir = context();
        assert!(!dir.path().join(".dockerignore").exists());

        let first = plan(&dir);
        first.save(dir.path()).unwrap();
        let second = plan(&dir);
        assert_eq!(second, first);

        second.save(dir.path()).unwrap();
        let previous = LayerPlan::load(dir.path()).unwrap();
        assert!(states(&plan(&dir), &previous)
            .iter()
            .all(|s| *s == LayerState::Cached));
        assert!(is_plan_path(".berth/layers.json"));
        assert!(!is_plan_path("src/.berth"));
    }

    #[test]
    fn saved_plan_round_trips_and_first_build_rebuilds_everything() {
        let dir = context();
        assert!(LayerPlan::load(dir.path()).is_none());

        let current = plan(&dir);
        assert!(current
            .compare(None)
            .iter()
            .all(|(_, state)| *state == LayerState::Rebuilt));

        current.save(dir.path()).unwrap();
        assert_eq!(LayerPlan::load(dir.path()), Some(current));
    }
}
