//! Effect catalog
//!
//! Named, reusable device patterns persisted as a pretty-printed JSON array.
//! Callers look an effect up by name and push its pattern onto the effect
//! stack; the catalog knows nothing about the stack itself.
//!
//! A missing catalog file is seeded with a handful of built-in effects on
//! first load. Seed effects can be updated but not deleted.

mod error;

pub use error::{CatalogError, Result};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Duration applied when an effect is saved without one
pub const DEFAULT_DURATION_MS: u64 = 10_000;

/// Names of the built-in effects
pub const SEED_EFFECT_NAMES: [&str; 5] = [
    "rainbow",
    "policeLights",
    "breathingGreen",
    "pipelineDemo",
    "ipDisplay",
];

/// A named device pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub name: String,
    pub description: String,
    /// Device query sent when the effect plays
    pub pattern: String,
    /// Milliseconds before the effect expires on its own
    #[serde(default)]
    pub duration: u64,
    /// Runs until stopped, ignoring `duration`
    #[serde(default)]
    pub perpetual: bool,
}

impl Effect {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        pattern: impl Into<String>,
        duration: u64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            pattern: pattern.into(),
            duration,
            perpetual: false,
        }
    }

    pub fn perpetual(mut self) -> Self {
        self.perpetual = true;
        self
    }

    pub fn is_seed(&self) -> bool {
        is_seed_effect(&self.name)
    }
}

pub fn is_seed_effect(name: &str) -> bool {
    SEED_EFFECT_NAMES.contains(&name)
}

/// Names must be non-empty ASCII letters, digits and underscores
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CatalogError::EmptyName);
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn seed_effects() -> Vec<Effect> {
    vec![
        Effect::new("rainbow", "Slow moving rainbow", "effect=rainbow", 15_000),
        Effect::new(
            "policeLights",
            "Realistic police light bar with rotating red/blue",
            "top_init=1&bottom_init=1\
             &top=10|1|ffffff&top=0|1|0000ff&top=1|1|000080&top=2|1|000040&top=3|1|000020\
             &top=4|1|000010&top=5|1|000008&top=6|1|000004&top_whirl=252\
             &bottom=4|1|ffffff&bottom=15|1|ff0000&bottom=14|1|800000&bottom=13|1|400000\
             &bottom=12|1|200000&bottom=11|1|100000&bottom=10|1|080000&bottom=9|1|040000\
             &bottom_whirl=250|ccw",
            30_000,
        ),
        Effect::new(
            "breathingGreen",
            "Fade in/out green",
            "top_init=1&bottom_init=1&top=00ff00&bottom=00ff00&top_morph=fade&bottom_morph=fade",
            15_000,
        ),
        Effect::new(
            "pipelineDemo",
            "Blog demo two-stage colours",
            "top_init=1&bottom_init=1&top=ffaa00&bottom=00aaff",
            10_000,
        ),
        Effect::new("ipDisplay", "Spell IP address", "effect=ip", 30_000),
    ]
}

/// Thread-safe catalog backed by a JSON file
#[derive(Debug)]
pub struct EffectStore {
    path: PathBuf,
    effects: RwLock<BTreeMap<String, Effect>>,
}

impl EffectStore {
    /// Create an empty store; call [`load`](Self::load) to read the file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            effects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store and load it in one step
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the catalog file, seeding and writing it if it does not exist
    pub fn load(&self) -> Result<()> {
        let mut effects = self.effects.write();

        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No effects file at {}, writing seed effects", self.path.display());
                *effects = seed_effects()
                    .into_iter()
                    .map(|effect| (effect.name.clone(), effect))
                    .collect();
                return self.write_file(&effects);
            }
            Err(e) => return Err(e.into()),
        };

        let loaded: Vec<Effect> = serde_json::from_str(&data)?;
        *effects = loaded
            .into_iter()
            .map(|effect| (effect.name.clone(), effect))
            .collect();

        tracing::debug!("Loaded {} effects from {}", effects.len(), self.path.display());
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let effects = self.effects.read();
        self.write_file(&effects)
    }

    /// Apply `change` to a copy, persist it, then swap it in
    ///
    /// The in-memory catalog is left untouched when the write fails.
    fn commit<F>(&self, effects: &mut BTreeMap<String, Effect>, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, Effect>),
    {
        let mut staged = effects.clone();
        change(&mut staged);
        self.write_file(&staged)?;
        *effects = staged;
        Ok(())
    }

    fn write_file(&self, effects: &BTreeMap<String, Effect>) -> Result<()> {
        let list: Vec<&Effect> = effects.values().collect();
        let data = serde_json::to_string_pretty(&list)?;

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, data)?;
        Ok(())
    }

    /// All effects sorted by name
    pub fn list(&self) -> Vec<Effect> {
        self.effects.read().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Effect> {
        self.effects.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.effects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.read().is_empty()
    }

    /// Add a new effect and persist the catalog
    ///
    /// A zero duration is replaced by [`DEFAULT_DURATION_MS`].
    pub fn add(&self, mut effect: Effect) -> Result<()> {
        validate_name(&effect.name)?;

        let mut effects = self.effects.write();
        if effects.contains_key(&effect.name) {
            return Err(CatalogError::AlreadyExists(effect.name));
        }

        if effect.duration == 0 {
            effect.duration = DEFAULT_DURATION_MS;
        }
        self.commit(&mut effects, |staged| {
            staged.insert(effect.name.clone(), effect);
        })
    }

    /// Replace an existing effect and persist the catalog
    pub fn update(&self, mut effect: Effect) -> Result<()> {
        if effect.name.is_empty() {
            return Err(CatalogError::EmptyName);
        }

        let mut effects = self.effects.write();
        if !effects.contains_key(&effect.name) {
            return Err(CatalogError::NotFound(effect.name));
        }

        if effect.duration == 0 {
            effect.duration = DEFAULT_DURATION_MS;
        }
        self.commit(&mut effects, |staged| {
            staged.insert(effect.name.clone(), effect);
        })
    }

    /// Remove a custom effect and persist the catalog
    pub fn delete(&self, name: &str) -> Result<Effect> {
        let mut effects = self.effects.write();
        if !effects.contains_key(name) {
            return Err(CatalogError::NotFound(name.to_string()));
        }
        if is_seed_effect(name) {
            return Err(CatalogError::SeedEffect(name.to_string()));
        }

        let mut removed = None;
        self.commit(&mut effects, |staged| removed = staged.remove(name))?;
        removed.ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("ufo-effects-{}", uuid::Uuid::new_v4()))
            .join("effects.json")
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_missing_file_is_seeded() {
        let path = temp_path();
        let store = EffectStore::open(&path).unwrap();

        assert_eq!(store.len(), SEED_EFFECT_NAMES.len());
        assert!(path.exists());
        assert!(store.get("rainbow").unwrap().is_seed());

        let names: Vec<String> = store.list().into_iter().map(|e| e.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        cleanup(&path);
    }

    #[test]
    fn test_changes_survive_reload() {
        let path = temp_path();
        let store = EffectStore::open(&path).unwrap();
        store
            .add(Effect::new("alert", "Red alert", "top_init=1&top=0|15|ff0000", 0))
            .unwrap();
        store
            .update(Effect::new("rainbow", "Faster rainbow", "effect=rainbow", 5000).perpetual())
            .unwrap();

        let reloaded = EffectStore::open(&path).unwrap();
        let alert = reloaded.get("alert").unwrap();
        assert_eq!(alert.duration, DEFAULT_DURATION_MS);
        assert!(reloaded.get("rainbow").unwrap().perpetual);
        assert_eq!(reloaded.len(), SEED_EFFECT_NAMES.len() + 1);

        cleanup(&path);
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let path = temp_path();
        let store = EffectStore::open(&path).unwrap();
        let err = store
            .add(Effect::new("rainbow", "again", "effect=rainbow", 1000))
            .unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists(name) if name == "rainbow"));
        cleanup(&path);
    }

    #[test]
    fn test_update_missing_effect() {
        let store = EffectStore::new(temp_path());
        let err = store.update(Effect::new("ghost", "", "dim=1", 0)).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn test_delete_custom_but_not_seed() {
        let path = temp_path();
        let store = EffectStore::open(&path).unwrap();
        store.add(Effect::new("custom_1", "", "dim=10", 1000)).unwrap();

        assert_eq!(store.delete("custom_1").unwrap().name, "custom_1");
        assert!(matches!(store.delete("custom_1"), Err(CatalogError::NotFound(_))));
        assert!(matches!(store.delete("rainbow"), Err(CatalogError::SeedEffect(_))));
        assert!(store.get("rainbow").is_some());

        cleanup(&path);
    }

    #[test]
    fn test_failed_write_leaves_catalog_unchanged() {
        let path = temp_path();
        let store = EffectStore::open(&path).unwrap();
        store.add(Effect::new("custom_1", "", "dim=10", 1000)).unwrap();

        // A directory where the file should be makes every write fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(
            store.add(Effect::new("alert", "", "dim=1", 1000)),
            Err(CatalogError::Io(_))
        ));
        assert!(store.get("alert").is_none());

        assert!(store.update(Effect::new("rainbow", "changed", "dim=2", 1000)).is_err());
        assert_eq!(store.get("rainbow").unwrap().description, "Slow moving rainbow");

        assert!(store.delete("custom_1").is_err());
        assert!(store.get("custom_1").is_some());

        cleanup(&path);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let err = EffectStore::open(&path).unwrap_err();
        assert!(matches!(err, CatalogError::Json(_)));

        cleanup(&path);
    }

    #[rstest]
    #[case("rainbow", true)]
    #[case("alert_2", true)]
    #[case("", false)]
    #[case("two words", false)]
    #[case("dash-name", false)]
    #[case("émoji", false)]
    fn test_name_validation(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(validate_name(name).is_ok(), valid);
    }
}
