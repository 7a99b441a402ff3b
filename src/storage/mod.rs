use crate::models::SoldProperty;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Holds an advisory lock for as long as it lives; unlocks on every exit path.
struct LockedFile {
    file: File,
}

impl LockedFile {
    fn shared(file: File) -> std::io::Result<Self> {
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }

    fn exclusive(file: File) -> std::io::Result<Self> {
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }

    fn read_records(&mut self) -> Result<Vec<SoldProperty>> {
        let mut text = String::new();
        self.file.read_to_string(&mut text)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Replace the whole file with `bytes`. Truncation happens only once the
    /// new content is fully serialized.
    fn replace_contents(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.set_len(0)?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        self.file.sync_all()
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn to_pretty_json(records: &[SoldProperty]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(records).context("Failed to serialize records")?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Read a record file under a shared lock. A missing file reads as empty.
fn read_locked(path: &Path) -> Result<Vec<SoldProperty>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
    };
    let mut locked = LockedFile::shared(file)
        .with_context(|| format!("Failed to lock {} for reading", path.display()))?;
    locked
        .read_records()
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Write a record file wholesale under an exclusive lock.
fn write_locked(path: &Path, records: &[SoldProperty]) -> Result<()> {
    let bytes = to_pretty_json(records)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut locked = LockedFile::exclusive(file)
        .with_context(|| format!("Failed to lock {} for writing", path.display()))?;
    locked
        .replace_contents(&bytes)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// One JSON file per area under a directory
#[derive(Debug, Clone)]
pub struct AreaStore {
    dir: PathBuf,
}

impl AreaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, area: &str) -> PathBuf {
        self.dir.join(format!("{}.json", area))
    }

    pub fn load(&self, area: &str) -> Result<Vec<SoldProperty>> {
        read_locked(&self.path_for(area))
    }

    /// Replace the area file with `records`
    pub fn save(&self, area: &str, records: &[SoldProperty]) -> Result<()> {
        let path = self.path_for(area);
        write_locked(&path, records)?;
        info!("  Saved {} properties to {}", records.len(), path.display());
        Ok(())
    }

    /// Add records whose URL is not yet in the area file; returns how many
    /// were added. The read and the write happen under one exclusive lock.
    pub fn append(&self, area: &str, records: &[SoldProperty]) -> Result<usize> {
        let path = self.path_for(area);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut locked = LockedFile::exclusive(file)
            .with_context(|| format!("Failed to lock {} for writing", path.display()))?;

        let mut existing = locked
            .read_records()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut seen: HashSet<String> = existing.iter().map(|p| p.listing_url.clone()).collect();

        let fresh: Vec<SoldProperty> = records
            .iter()
            .filter(|p| p.has_url() && seen.insert(p.listing_url.clone()))
            .cloned()
            .collect();
        let added = fresh.len();
        if added == 0 {
            return Ok(0);
        }

        existing.extend(fresh);
        let bytes = to_pretty_json(&existing)?;
        locked
            .replace_contents(&bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Appended {} properties to {}", added, path.display());
        Ok(added)
    }

    /// Area files in lexicographic order
    pub fn area_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Merge every area file into `output`, first-seen URL wins.
    /// Returns the number of records written.
    pub fn combine(&self, output: &Path) -> Result<usize> {
        let output_name = output.file_name();
        let same_dir = output
            .parent()
            .map(|p| same_path(p, &self.dir))
            .unwrap_or(false);

        let mut combined = Vec::new();
        let mut seen = HashSet::new();
        for path in self.area_files()? {
            if same_dir && path.file_name() == output_name {
                continue;
            }
            let records = read_locked(&path)?;
            debug!("{}: {} records", path.display(), records.len());
            combined.extend(
                records
                    .into_iter()
                    .filter(|p| p.has_url() && seen.insert(p.listing_url.clone())),
            );
        }

        write_locked(output, &combined)?;
        Ok(combined.len())
    }
}

/// Write a record file out as CSV, one row per record with the JSON keys as
/// headers. Returns the number of rows written.
pub fn export_csv(source: &Path, output: &Path) -> Result<usize> {
    let records = read_locked(source)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    for record in &records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Saved {} properties to {}", records.len(), output.display());
    Ok(records.len())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(url: &str) -> SoldProperty {
        SoldProperty {
            address: format!("{} Test St", url),
            listing_url: url.to_string(),
            ..Default::default()
        }
    }

    fn urls(records: &[SoldProperty]) -> Vec<&str> {
        records.iter().map(|p| p.listing_url.as_str()).collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path());
        assert!(store.load("nowhere").unwrap().is_empty());
    }

    #[test]
    fn save_replaces_wholesale() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path().join("output"));

        store.save("paddington", &[record("u1"), record("u2")]).unwrap();
        store.save("paddington", &[record("u3")]).unwrap();

        let loaded = store.load("paddington").unwrap();
        assert_eq!(urls(&loaded), vec!["u3"]);
    }

    #[test]
    fn saved_file_is_pretty_json_with_original_keys() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path());
        store.save("paddington", &[record("u1")]).unwrap();

        let text = fs::read_to_string(store.path_for("paddington")).unwrap();
        assert!(text.starts_with("[\n  {"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["listing_url"], "u1");
        assert!(value[0]["land_size_sqm"].is_null());
        assert!(value[0].get("suburb").is_some());
    }

    #[test]
    fn append_adds_only_new_urls() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path());
        store.save("a", &[record("u1")]).unwrap();

        let added = store.append("a", &[record("u1"), record("u2")]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(urls(&store.load("a").unwrap()), vec!["u1", "u2"]);

        let again = store.append("a", &[record("u2")]).unwrap();
        assert_eq!(again, 0);
        assert_eq!(store.load("a").unwrap().len(), 2);
    }

    #[test]
    fn append_to_missing_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path().join("fresh"));

        let added = store.append("a", &[record("u1"), record(""), record("u1")]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(urls(&store.load("a").unwrap()), vec!["u1"]);
    }

    #[test]
    fn combine_dedups_across_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"[{"listing_url": "u1"}, {"listing_url": "u2"}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"[{"listing_url": "u2", "address": "later copy"}, {"listing_url": "u3"}]"#,
        )
        .unwrap();
        let store = AreaStore::new(dir.path());
        let output = dir.path().join("combined").join("all.json");

        let count = store.combine(&output).unwrap();
        assert_eq!(count, 3);

        let combined = read_locked(&output).unwrap();
        assert_eq!(urls(&combined), vec!["u1", "u2", "u3"]);
        assert_eq!(combined[1].address, "");
    }

    #[test]
    fn combine_is_byte_stable() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path().join("output"));
        store.save("b", &[record("u2"), record("u3")]).unwrap();
        store.save("a", &[record("u1"), record("u2")]).unwrap();
        let output = dir.path().join("combined.json");

        store.combine(&output).unwrap();
        let first = fs::read(&output).unwrap();
        store.combine(&output).unwrap();
        let second = fs::read(&output).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn combine_skips_its_own_output_in_same_dir() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path());
        store.save("a", &[record("u1")]).unwrap();
        let output = dir.path().join("z-combined.json");

        assert_eq!(store.combine(&output).unwrap(), 1);
        assert_eq!(store.combine(&output).unwrap(), 1);
    }

    #[test]
    fn csv_export_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path().join("output"));
        let full = SoldProperty {
            address: "12 Example St, Paddington QLD 4064".to_string(),
            suburb: "Paddington".to_string(),
            postcode: "4064".to_string(),
            sale_price: Some(1_480_000),
            sale_date: Some("23 Dec 2025".to_string()),
            bedrooms: Some(3),
            bathrooms: Some(2),
            parking: Some(1),
            land_size_sqm: Some(607),
            property_type: "House".to_string(),
            description: "Character home, \"renovated\"\non a quiet street".to_string(),
            listing_url: "u1".to_string(),
            agent_name: Some("Jo Smith".to_string()),
            agency_name: Some("Example Realty".to_string()),
        };
        store.save("a", &[full.clone(), record("u2")]).unwrap();
        let combined = dir.path().join("combined.json");
        store.combine(&combined).unwrap();

        let csv_path = dir.path().join("export").join("combined.csv");
        assert_eq!(export_csv(&combined, &csv_path).unwrap(), 2);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec![
                "address",
                "suburb",
                "postcode",
                "sale_price",
                "sale_date",
                "bedrooms",
                "bathrooms",
                "parking",
                "land_size_sqm",
                "property_type",
                "description",
                "listing_url",
                "agent_name",
                "agency_name",
            ]
        );
        let rows: Vec<SoldProperty> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows, vec![full, record("u2")]);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = AreaStore::new(dir.path());
        let writers = 8;

        std::thread::scope(|scope| {
            for i in 0..writers {
                let store = store.clone();
                scope.spawn(move || {
                    let added = store.append("a", &[record(&format!("u{i}"))]).unwrap();
                    assert_eq!(added, 1);
                });
            }
        });

        let saved = store.load("a").unwrap();
        assert_eq!(saved.len(), writers);
        let mut found = urls(&saved);
        found.sort();
        let mut expected: Vec<String> = (0..writers).map(|i| format!("u{i}")).collect();
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "[{").unwrap();
        let store = AreaStore::new(dir.path());

        assert!(store.load("bad").is_err());
        assert!(store.combine(&dir.path().join("out").join("all.json")).is_err());
    }
}
