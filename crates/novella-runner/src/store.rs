//! JSON-file stores.
//!
//! Layout under the resource root:
//!
//! ```text
//! environment/scene_###.json   one scene per file, keyed by its identifier
//! character/*.json             one actor per file
//! outline/outline.json         the narrative outline
//! novel/<n>.txt                one chapter per file
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use novella_core::narrative::ChapterSink;
use novella_core::store::{ActorStore, SceneStore, StoreError};
use novella_types::{Actor, Outline, SceneId, WorldState};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound {
                what: path.display().to_string(),
            }
        } else {
            io_error(path, source)
        }
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    let raw = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, raw).map_err(|source| io_error(path, source))
}

/// Files in `dir` with the given extension, sorted by name.
fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| io_error(dir, source))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|source| io_error(dir, source))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Scenes
// ---------------------------------------------------------------------------

/// Scenes stored as `<dir>/<scene_id>.json`.
#[derive(Debug, Clone)]
pub struct FileSceneStore {
    dir: PathBuf,
}

impl FileSceneStore {
    /// A store rooted at `dir`.
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, id: &SceneId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl SceneStore for FileSceneStore {
    fn load(&self, id: &SceneId) -> Result<WorldState, StoreError> {
        let path = self.path_for(id);
        let world: WorldState = read_json(&path)?;
        if world.scene_id != *id {
            return Err(StoreError::Invalid {
                reason: format!("{} holds scene {}", path.display(), world.scene_id),
            });
        }
        debug!(scene_id = %id, path = %path.display(), "scene loaded");
        Ok(world)
    }

    fn latest(&self) -> Result<SceneId, StoreError> {
        files_with_extension(&self.dir, "json")?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str())
            .map(SceneId::new)
            .filter_map(|id| id.number().ok().map(|number| (number, id)))
            .max_by_key(|(number, _)| *number)
            .map(|(_, id)| id)
            .ok_or_else(|| StoreError::NotFound {
                what: format!("any scene in {}", self.dir.display()),
            })
    }

    fn save(&self, world: &WorldState) -> Result<(), StoreError> {
        let path = self.path_for(&world.scene_id);
        write_json(&path, world)?;
        debug!(scene_id = %world.scene_id, path = %path.display(), "scene saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// Actors stored one per `<dir>/*.json` file.
///
/// Actors are written back to the file they were loaded from; actors
/// without one get `<dir>/<name>.json`.
#[derive(Debug)]
pub struct FileActorStore {
    dir: PathBuf,
    files: Mutex<HashMap<String, PathBuf>>,
}

impl FileActorStore {
    /// A store rooted at `dir`.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: Mutex::new(HashMap::new()),
        }
    }

    fn file_names(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, PathBuf>>, StoreError> {
        self.files.lock().map_err(|e| StoreError::Invalid {
            reason: format!("actor file index poisoned: {e}"),
        })
    }
}

impl ActorStore for FileActorStore {
    fn load_all(&self) -> Result<Vec<Actor>, StoreError> {
        let mut actors = Vec::new();
        let mut files = self.file_names()?;
        for path in files_with_extension(&self.dir, "json")? {
            let actor: Actor = read_json(&path)?;
            files.insert(actor.name.clone(), path);
            actors.push(actor);
        }
        drop(files);
        debug!(dir = %self.dir.display(), actors = actors.len(), "actors loaded");
        Ok(actors)
    }

    fn save_all(&self, actors: &[Actor]) -> Result<(), StoreError> {
        let mut files = self.file_names()?;
        for actor in actors {
            let path = files
                .entry(actor.name.clone())
                .or_insert_with(|| self.dir.join(format!("{}.json", actor.name)));
            write_json(path, actor)?;
        }
        drop(files);
        debug!(dir = %self.dir.display(), actors = actors.len(), "actors saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chapters and outline
// ---------------------------------------------------------------------------

/// Chapters stored as `<dir>/<n>.txt`, numbered from 1.
#[derive(Debug, Clone)]
pub struct FileChapterSink {
    dir: PathBuf,
}

impl FileChapterSink {
    /// A sink writing into `dir`.
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The highest chapter number present, 0 when there is none.
    fn last_chapter(&self) -> Result<u32, StoreError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let last = files_with_extension(&self.dir, "txt")?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str()?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(last)
    }
}

impl ChapterSink for FileChapterSink {
    fn write_chapter(&self, text: &str) -> Result<u32, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        let number = self.last_chapter()?.checked_add(1).ok_or_else(|| StoreError::Invalid {
            reason: "chapter numbers exhausted".to_owned(),
        })?;
        let path = self.dir.join(format!("{number}.txt"));
        fs::write(&path, text).map_err(|source| io_error(&path, source))?;
        Ok(number)
    }
}

/// Load and validate the outline at `path`.
///
/// # Errors
///
/// Fails when the file is missing or malformed, or when its ending
/// description is blank.
pub fn load_outline(path: &Path) -> Result<Outline, StoreError> {
    let outline: Outline = read_json(path)?;
    outline.validate().map_err(|e| StoreError::Invalid {
        reason: format!("{}: {e}", path.display()),
    })?;
    Ok(outline)
}
