use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::catalog::{ProductEpics, PRODUCTS};
use crate::config::Config;
use crate::models::Epic;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(100);

/// Per-product epic storage.
///
/// Each product's epics live in `<data_dir>/<key_prefix>-<product_id>.json` as a
/// JSON array. A sibling `.lock` file guards concurrent access from several
/// processes.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    key_prefix: String,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(data_dir: P, key_prefix: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.data_dir, config.key_prefix.clone())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Storage key of a product's epic collection
    pub fn key(&self, product_id: &str) -> String {
        format!("{}-{}", self.key_prefix, product_id)
    }

    /// File holding a product's epics
    pub fn path(&self, product_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.key(product_id)))
    }

    fn lock_path(&self, product_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json.lock", self.key(product_id)))
    }

    fn acquire_write_lock(&self, product_id: &str) -> Result<File> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;

        let lock_path = self.lock_path(product_id);
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to create lock file: {:?}", lock_path))?;

        wait_for_lock(&lock_file, &lock_path, <File as FileExt>::try_lock_exclusive)?;
        Ok(lock_file)
    }

    fn acquire_read_lock(&self, product_id: &str) -> Result<Option<File>> {
        let lock_path = self.lock_path(product_id);
        if !lock_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        wait_for_lock(&lock_file, &lock_path, <File as FileExt>::try_lock_shared)?;
        Ok(Some(lock_file))
    }

    /// Loads a product's epics; a product that was never saved has none
    pub fn load(&self, product_id: &str) -> Result<Vec<Epic>> {
        let path = self.path(product_id);
        if !path.exists() {
            debug!(product = product_id, "no stored epics");
            return Ok(Vec::new());
        }

        let _lock = self.acquire_read_lock(product_id)?;
        let epics = read_epics(&path)?;
        debug!(product = product_id, count = epics.len(), "loaded epics");
        Ok(epics)
    }

    /// Replaces a product's stored epics
    pub fn save(&self, product_id: &str, epics: &[Epic]) -> Result<()> {
        let mut lock_file = self.acquire_write_lock(product_id)?;
        write_lock_owner(&mut lock_file);

        let path = self.path(product_id);
        write_epics(&path, epics)?;
        debug!(product = product_id, count = epics.len(), "saved epics");
        Ok(())
    }

    /// Reloads, applies `update_fn` and saves while holding the write lock.
    /// Nothing is written when `update_fn` fails.
    pub fn update_atomically<F>(&self, product_id: &str, update_fn: F) -> Result<Vec<Epic>>
    where
        F: FnOnce(&mut Vec<Epic>) -> Result<()>,
    {
        let mut lock_file = self.acquire_write_lock(product_id)?;
        write_lock_owner(&mut lock_file);

        let path = self.path(product_id);
        let mut epics = if path.exists() { read_epics(&path)? } else { Vec::new() };
        update_fn(&mut epics)?;
        write_epics(&path, &epics)?;
        Ok(epics)
    }

    /// Removes a product's stored epics
    pub fn clear(&self, product_id: &str) -> Result<()> {
        let _lock = self.acquire_write_lock(product_id)?;
        let path = self.path(product_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }

    /// Every catalog product with its epics, in catalog order.
    ///
    /// A product whose file cannot be read shows up empty rather than failing
    /// the whole portfolio.
    pub fn load_portfolio(&self) -> Vec<ProductEpics> {
        PRODUCTS
            .iter()
            .map(|product| {
                let epics = self.load(product.id).unwrap_or_else(|e| {
                    warn!(product = product.id, error = %e, "skipping unreadable product");
                    Vec::new()
                });
                ProductEpics { product, epics }
            })
            .collect()
    }
}

fn wait_for_lock<F>(lock_file: &File, lock_path: &Path, try_lock: F) -> Result<()>
where
    F: Fn(&File) -> io::Result<()>,
{
    let start = Instant::now();
    loop {
        match try_lock(lock_file) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if start.elapsed() > LOCK_TIMEOUT {
                    anyhow::bail!(
                        "Timeout waiting for file lock - another process may be writing: {:?}",
                        lock_path
                    );
                }
                std::thread::sleep(LOCK_RETRY);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to acquire lock on {:?}", lock_path))
            }
        }
    }
}

fn write_lock_owner(lock_file: &mut File) {
    let _ = writeln!(
        lock_file,
        "Locked by PID {} at {}",
        std::process::id(),
        chrono::Utc::now().to_rfc3339()
    );
}

fn read_epics(path: &Path) -> Result<Vec<Epic>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse epics from {:?}", path))
}

/// Writes to a sibling temp file and renames it over `path`, so readers see
/// either the old or the new array
fn write_epics(path: &Path, epics: &[Epic]) -> Result<()> {
    let json = serde_json::to_string_pretty(epics)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quarter, StoryStatus, UserStory};
    use tempfile::TempDir;

    fn storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path(), "roadmap-epics");
        (dir, storage)
    }

    #[test]
    fn test_key_and_path() {
        let (dir, storage) = storage();
        assert_eq!(storage.key("horizon"), "roadmap-epics-horizon");
        assert_eq!(
            storage.path("horizon"),
            dir.path().join("roadmap-epics-horizon.json")
        );
    }

    #[test]
    fn test_missing_product_is_empty() {
        let (_dir, storage) = storage();
        assert!(storage.load("horizon").unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, storage) = storage();
        let mut epic = Epic::new("horizon", "Risk Engine".into(), Quarter::Q2);
        epic.start_date = Some("2026-04-01".into());
        let mut story = UserStory::new(epic.id, "Calibrate".into());
        story.status = StoryStatus::InProgress;
        epic.stories.push(story);

        storage.save("horizon", &[epic.clone()]).unwrap();
        let loaded = storage.load("horizon").unwrap();
        assert_eq!(loaded, vec![epic]);

        // Other products stay untouched
        assert!(storage.load("pulse-sdg").unwrap().is_empty());
    }

    #[test]
    fn test_persisted_format_is_camel_case() {
        let (_dir, storage) = storage();
        let mut epic = Epic::new("horizon", "E".into(), Quarter::Q1);
        epic.stories.push(UserStory::new(epic.id, "S".into()));
        storage.save("horizon", &[epic]).unwrap();

        let raw = fs::read_to_string(storage.path("horizon")).unwrap();
        assert!(raw.contains("\"productId\""));
        assert!(raw.contains("\"storyPoints\""));
        assert!(raw.contains("\"Draft\""));
    }

    #[test]
    fn test_update_atomically() {
        let (_dir, storage) = storage();
        storage
            .update_atomically("horizon", |epics| {
                epics.push(Epic::new("horizon", "A".into(), Quarter::Q1));
                Ok(())
            })
            .unwrap();
        let epics = storage
            .update_atomically("horizon", |epics| {
                epics.push(Epic::new("horizon", "B".into(), Quarter::Q2));
                Ok(())
            })
            .unwrap();
        assert_eq!(epics.len(), 2);
        assert_eq!(storage.load("horizon").unwrap().len(), 2);
    }

    #[test]
    fn test_failed_update_leaves_file_untouched() {
        let (_dir, storage) = storage();
        storage
            .save("horizon", &[Epic::new("horizon", "A".into(), Quarter::Q1)])
            .unwrap();

        let result = storage.update_atomically("horizon", |epics| {
            epics.push(Epic::new("horizon", "B".into(), Quarter::Q2));
            anyhow::bail!("rejected")
        });

        assert!(result.is_err());
        let stored = storage.load("horizon").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "A");
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let (dir, storage) = storage();
        storage
            .save("horizon", &[Epic::new("horizon", "A".into(), Quarter::Q1)])
            .unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{:?}", names);
    }

    #[test]
    fn test_clear() {
        let (_dir, storage) = storage();
        storage
            .save("horizon", &[Epic::new("horizon", "A".into(), Quarter::Q1)])
            .unwrap();
        storage.clear("horizon").unwrap();
        assert!(storage.load("horizon").unwrap().is_empty());
        // Clearing twice is fine
        storage.clear("horizon").unwrap();
    }

    #[test]
    fn test_portfolio_tolerates_corrupt_product() {
        let (_dir, storage) = storage();
        storage
            .save("horizon", &[Epic::new("horizon", "A".into(), Quarter::Q1)])
            .unwrap();
        fs::write(storage.path("pulse-sdg"), "{not json").unwrap();

        let portfolio = storage.load_portfolio();
        assert_eq!(portfolio.len(), PRODUCTS.len());
        assert_eq!(portfolio[0].product.id, "horizon");
        assert_eq!(portfolio[0].epics.len(), 1);
        assert!(portfolio[1].epics.is_empty());
    }
}
