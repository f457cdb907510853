use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rkyv::{rancor::Error as RkyvError, to_bytes};
use serde::Deserialize;
use zstd::bulk::compress as zstd_compress;

#[path = "src/data.rs"]
mod data_model;
use data_model::{
    CreatureRecord, DataStore, DatasetRecord, PackedStrings, PageScopeRecord, Range, StringId,
};

const ARCHIVE_COMPRESSION_LEVEL: i32 = 9;
const MAX_DIFFICULTY: u8 = 4;
const MAX_THUMBNAILS: usize = 20;
const PAGE_SCOPES: &[&str] = &["gallery", "taxonomy", "sites"];

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    let creatures = load_creatures(&manifest_dir)?;
    let pages = load_pages(&manifest_dir)?;

    let mut builder = DataBuilder::default();
    for (dataset, rows) in creatures {
        builder.add_dataset(dataset, rows)?;
    }
    for &scope in PAGE_SCOPES {
        let titles = pages.get(scope).cloned().unwrap_or_default();
        builder.add_page_scope(scope, titles);
    }

    let store = builder.finish();
    let bytes = to_bytes::<RkyvError>(&store)
        .map_err(|err| format!("Failed to serialize data store: {err}"))?
        .into_vec();
    let compressed = zstd_compress(&bytes, ARCHIVE_COMPRESSION_LEVEL)?;

    let data_path = out_dir.join("detective_data.rkyv");
    fs::write(&data_path, compressed)?;
    println!("cargo:rustc-env=DETECTIVE_DATA={}", data_path.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CreatureJson {
    dataset: String,
    name: String,
    taxonomy: String,
    #[serde(default)]
    difficulty: u8,
    #[serde(default)]
    thumbnails: Vec<String>,
}

fn load_creatures(
    manifest_dir: &Path,
) -> Result<BTreeMap<String, Vec<CreatureJson>>, Box<dyn Error>> {
    let path = manifest_dir.join("data/creatures.jsonl");
    println!("cargo:rerun-if-changed={}", path.display());
    if !path.exists() {
        panic!("Missing {}.", path.display());
    }

    let file = BufReader::new(File::open(&path)?);
    let mut datasets: BTreeMap<String, Vec<CreatureJson>> = BTreeMap::new();
    for (line_idx, line_res) in file.lines().enumerate() {
        let line = line_res?;
        if line.trim().is_empty() {
            continue;
        }
        let creature: CreatureJson = serde_json::from_str(&line)
            .map_err(|err| format!("Failed to parse JSON line {}: {err}", line_idx + 1))?;
        if creature.difficulty > MAX_DIFFICULTY {
            return Err(format!(
                "Creature {:?} has difficulty {} (max {MAX_DIFFICULTY})",
                creature.name, creature.difficulty
            )
            .into());
        }
        if creature.taxonomy.trim().is_empty() {
            return Err(format!("Creature {:?} has no taxonomy", creature.name).into());
        }
        datasets
            .entry(creature.dataset.clone())
            .or_default()
            .push(creature);
    }
    Ok(datasets)
}

fn load_pages(manifest_dir: &Path) -> Result<HashMap<String, Vec<String>>, Box<dyn Error>> {
    let path = manifest_dir.join("data/pages.tsv");
    println!("cargo:rerun-if-changed={}", path.display());
    if !path.exists() {
        panic!("Missing {}.", path.display());
    }

    let file = BufReader::new(File::open(&path)?);
    let mut pages: HashMap<String, Vec<String>> = HashMap::new();
    for (idx, line_res) in file.lines().enumerate() {
        let line = line_res?;
        if idx == 0 && line.starts_with("scope") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (scope, title) = line
            .split_once('\t')
            .ok_or_else(|| format!("Missing title in line {}", idx + 1))?;
        if !PAGE_SCOPES.contains(&scope) {
            return Err(format!("Unknown page scope {scope:?} in line {}", idx + 1).into());
        }
        pages
            .entry(scope.to_owned())
            .or_default()
            .push(title.to_owned());
    }
    Ok(pages)
}

#[derive(Default)]
struct DataBuilder {
    strings: StringTable,
    datasets: Vec<DatasetRecord>,
    creatures: Vec<CreatureRecord>,
    creature_thumbnails: Vec<StringId>,
    page_scopes: Vec<PageScopeRecord>,
    page_titles: Vec<StringId>,
}

impl DataBuilder {
    fn add_dataset(
        &mut self,
        name: String,
        mut rows: Vec<CreatureJson>,
    ) -> Result<(), Box<dyn Error>> {
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        {
            let mut seen = HashSet::new();
            for row in &rows {
                if !seen.insert(row.name.as_str()) {
                    return Err(
                        format!("Duplicate creature {:?} in dataset {name:?}", row.name).into(),
                    );
                }
            }
        }

        let start = self.creatures.len() as u32;
        for row in rows {
            let name_id = self.strings.intern_owned(row.name);
            let taxonomy = self.strings.intern_owned(row.taxonomy);
            let thumbnails = push_strings(
                &mut self.strings,
                &mut self.creature_thumbnails,
                row.thumbnails.into_iter().take(MAX_THUMBNAILS),
            );
            self.creatures.push(CreatureRecord {
                name: name_id,
                taxonomy,
                difficulty: row.difficulty,
                thumbnails,
            });
        }
        let name = self.strings.intern_owned(name);
        self.datasets.push(DatasetRecord {
            name,
            creatures: Range::new(start, self.creatures.len() as u32 - start),
        });
        Ok(())
    }

    fn add_page_scope(&mut self, scope: &str, titles: Vec<String>) {
        let scope = self.strings.intern_owned(scope.to_owned());
        let titles = push_strings(&mut self.strings, &mut self.page_titles, titles);
        self.page_scopes.push(PageScopeRecord { scope, titles });
    }

    fn finish(self) -> DataStore {
        DataStore {
            strings: self.strings.into_store(),
            datasets: self.datasets,
            creatures: self.creatures,
            creature_thumbnails: self.creature_thumbnails,
            page_scopes: self.page_scopes,
            page_titles: self.page_titles,
        }
    }
}

#[derive(Default)]
struct StringTable {
    map: HashMap<Box<str>, StringId>,
    offsets: Vec<u32>,
    lengths: Vec<u32>,
    data: Vec<u8>,
}

impl StringTable {
    fn intern_owned(&mut self, value: String) -> StringId {
        if let Some(&id) = self.map.get(value.as_str()) {
            return id;
        }
        let id = self.offsets.len() as u32;
        self.offsets.push(self.data.len() as u32);
        self.lengths.push(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
        self.map.insert(value.into_boxed_str(), id);
        id
    }

    fn into_store(self) -> PackedStrings {
        PackedStrings {
            offsets: self.offsets,
            lengths: self.lengths,
            data: self.data,
        }
    }
}

fn push_strings<I>(table: &mut StringTable, target: &mut Vec<StringId>, iter: I) -> Range
where
    I: IntoIterator<Item = String>,
{
    let start = target.len() as u32;
    for value in iter {
        target.push(table.intern_owned(value));
    }
    Range::new(start, target.len() as u32 - start)
}
