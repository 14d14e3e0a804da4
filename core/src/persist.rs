//! On-disk layout of an [`IndexSet`]: one artifact per index.
//!
//! Index artifacts are JSON so other tools can read them; the document lookup
//! table is bincode. Every artifact maps to one [`ArtifactSlot`], and the slot
//! fixes the artifact's shape ([`ArtifactKind`]) before a byte is read.
//!
//! A save builds the whole directory next to the target and renames it into
//! place, so a reader sees either the previous build or the new one. A load
//! checks that every artifact describes the same documents as `docs.bin` and
//! `meta.json`, and that `meta.json` did not change while it was reading.

use crate::error::{Result, SearchError};
use crate::{
    DocKey, DocMeta, DocumentLengthTable, FeatureIndex, Field, FieldIndex, IndexSet, PositionalIndex, ReviewIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{create_dir_all, remove_dir_all, rename, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    /// Unique per save. A load fails if it changes while the load is reading.
    #[serde(default)]
    pub build_id: String,
    /// feature name -> artifact file under `features/`
    #[serde(default)]
    pub features: BTreeMap<String, String>,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn features_dir(&self) -> PathBuf { self.root.join("features") }
    pub fn artifact(&self, slot: &ArtifactSlot) -> PathBuf {
        match slot {
            ArtifactSlot::Feature { file, .. } => self.features_dir().join(file),
            other => self.root.join(other.file_name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    DocumentSet,
    Positional,
    Value,
    Reviews,
    Lengths,
}

/// A decoded artifact, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexArtifact {
    DocumentSet(FieldIndex),
    Positional(PositionalIndex),
    Value(FeatureIndex),
    Reviews(ReviewIndex),
    Lengths(DocumentLengthTable),
}

impl IndexArtifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            IndexArtifact::DocumentSet(_) => ArtifactKind::DocumentSet,
            IndexArtifact::Positional(_) => ArtifactKind::Positional,
            IndexArtifact::Value(_) => ArtifactKind::Value,
            IndexArtifact::Reviews(_) => ArtifactKind::Reviews,
            IndexArtifact::Lengths(_) => ArtifactKind::Lengths,
        }
    }

    /// A document key the artifact refers to that is not in `docs`.
    pub fn unknown_key<'a>(&'a self, docs: &HashMap<DocKey, DocMeta>) -> Option<&'a DocKey> {
        let unknown = |key: &&DocKey| !docs.contains_key(*key);
        match self {
            IndexArtifact::DocumentSet(index) | IndexArtifact::Value(index) => index.values().flatten().find(unknown),
            IndexArtifact::Positional(index) => index.values().flat_map(|postings| postings.keys()).find(unknown),
            IndexArtifact::Reviews(reviews) => reviews.keys().find(unknown),
            IndexArtifact::Lengths(lengths) => lengths.keys().find(unknown),
        }
    }

    pub fn decode(kind: ArtifactKind, bytes: &[u8]) -> serde_json::Result<Self> {
        Ok(match kind {
            ArtifactKind::DocumentSet => IndexArtifact::DocumentSet(serde_json::from_slice(bytes)?),
            ArtifactKind::Positional => IndexArtifact::Positional(serde_json::from_slice(bytes)?),
            ArtifactKind::Value => IndexArtifact::Value(serde_json::from_slice(bytes)?),
            ArtifactKind::Reviews => IndexArtifact::Reviews(serde_json::from_slice(bytes)?),
            ArtifactKind::Lengths => IndexArtifact::Lengths(serde_json::from_slice(bytes)?),
        })
    }
}

/// Where an artifact lives in the [`IndexSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSlot {
    Field(Field),
    Positions(Field),
    Feature { name: String, file: String },
    Reviews,
    Lengths,
}

impl ArtifactSlot {
    pub fn file_name(&self) -> String {
        match self {
            ArtifactSlot::Field(field) => format!("{field}_index.json"),
            ArtifactSlot::Positions(field) => format!("positional_{field}_index.json"),
            ArtifactSlot::Feature { file, .. } => file.clone(),
            ArtifactSlot::Reviews => "review_index.json".into(),
            ArtifactSlot::Lengths => "doc_lengths.json".into(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactSlot::Field(_) => ArtifactKind::DocumentSet,
            ArtifactSlot::Positions(_) => ArtifactKind::Positional,
            ArtifactSlot::Feature { .. } => ArtifactKind::Value,
            ArtifactSlot::Reviews => ArtifactKind::Reviews,
            ArtifactSlot::Lengths => ArtifactKind::Lengths,
        }
    }

    /// Core artifacts fail the load when absent; the rest load as empty.
    pub fn required(&self) -> bool {
        match self {
            ArtifactSlot::Field(field) | ArtifactSlot::Positions(field) => field.is_primary(),
            ArtifactSlot::Lengths => true,
            ArtifactSlot::Feature { .. } | ArtifactSlot::Reviews => false,
        }
    }

    /// Every slot of an index directory described by `meta`.
    pub fn all(meta: &MetaFile) -> Vec<ArtifactSlot> {
        let mut slots: Vec<ArtifactSlot> = Field::ALL.into_iter().map(ArtifactSlot::Field).collect();
        slots.extend(Field::ALL.into_iter().map(ArtifactSlot::Positions));
        slots.push(ArtifactSlot::Reviews);
        slots.push(ArtifactSlot::Lengths);
        slots.extend(
            meta.features
                .iter()
                .map(|(name, file)| ArtifactSlot::Feature { name: name.clone(), file: file.clone() }),
        );
        slots
    }

    fn name(&self) -> String {
        match self {
            ArtifactSlot::Feature { name, .. } => format!("feature:{name}"),
            other => other.file_name(),
        }
    }
}

/// File name for a feature artifact. The ordinal keeps names that slug to the
/// same text ("size/fit" / "size_fit") apart.
pub fn feature_file_name(ordinal: usize, feature: &str) -> String {
    let slug: String = feature
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{ordinal:04}_{slug}_index.json")
}

fn corrupt(name: impl Into<String>, path: &Path, reason: impl ToString) -> SearchError {
    SearchError::CorruptArtifact { name: name.into(), path: path.to_path_buf(), reason: reason.to_string() }
}

fn read_required(name: &str, path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(SearchError::MissingArtifact { name: name.into(), path: path.to_path_buf() });
    }
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut w, value).map_err(std::io::Error::from)?;
    w.flush()?;
    Ok(())
}

/// Load one artifact. `Ok(None)` means an optional artifact is absent.
pub fn load_artifact(paths: &IndexPaths, slot: &ArtifactSlot) -> Result<Option<IndexArtifact>> {
    let path = paths.artifact(slot);
    if !path.exists() && !slot.required() {
        tracing::debug!(artifact = %slot.name(), "optional artifact absent, using empty index");
        return Ok(None);
    }
    let bytes = read_required(&slot.name(), &path)?;
    let artifact = IndexArtifact::decode(slot.kind(), &bytes).map_err(|e| corrupt(slot.name(), &path, e))?;
    Ok(Some(artifact))
}

fn place(set: &mut IndexSet, slot: ArtifactSlot, artifact: IndexArtifact, path: &Path) -> Result<()> {
    match (slot, artifact) {
        (ArtifactSlot::Field(field), IndexArtifact::DocumentSet(index)) => {
            set.fields.insert(field, index);
        }
        (ArtifactSlot::Positions(field), IndexArtifact::Positional(index)) => {
            set.positions.insert(field, index);
        }
        (ArtifactSlot::Feature { name, .. }, IndexArtifact::Value(index)) => {
            set.features.insert(name, index);
        }
        (ArtifactSlot::Reviews, IndexArtifact::Reviews(reviews)) => set.reviews = reviews,
        (ArtifactSlot::Lengths, IndexArtifact::Lengths(lengths)) => set.doc_lengths = lengths,
        (slot, artifact) => {
            return Err(corrupt(slot.name(), path, format!("unexpected {:?} artifact", artifact.kind())));
        }
    }
    Ok(())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta).map_err(std::io::Error::from)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let bytes = read_required("meta.json", &path)?;
    serde_json::from_slice(&bytes).map_err(|e| corrupt("meta.json", &path, e))
}

pub fn save_docs(paths: &IndexPaths, docs: &HashMap<DocKey, DocMeta>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.docs())?;
    let bytes = bincode::serialize(docs).map_err(|e| corrupt("docs.bin", &paths.docs(), e))?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_docs(paths: &IndexPaths) -> Result<HashMap<DocKey, DocMeta>> {
    let path = paths.docs();
    let bytes = read_required("docs.bin", &path)?;
    bincode::deserialize(&bytes).map_err(|e| corrupt("docs.bin", &path, e))
}

/// `root` with a usable file name: `.` and friends are resolved first.
fn resolved_root(root: &Path) -> Result<PathBuf> {
    if root.file_name().is_some() {
        Ok(root.to_path_buf())
    } else {
        Ok(root.canonicalize()?)
    }
}

/// A hidden directory next to `root`, e.g. `.index.staging` for `index`.
fn sibling(root: &Path, tag: &str) -> PathBuf {
    let name = root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "index".into());
    root.with_file_name(format!(".{name}.{tag}"))
}

fn build_id(created_at: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{created_at}/{}/{nanos}", std::process::id())
}

/// Write every artifact of `set`, then `docs.bin`, then `meta.json`.
fn write_artifacts(paths: &IndexPaths, set: &IndexSet, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    if !meta.features.is_empty() {
        create_dir_all(paths.features_dir())?;
    }
    let empty_field = FieldIndex::new();
    let empty_positions = PositionalIndex::new();
    for slot in ArtifactSlot::all(meta) {
        let path = paths.artifact(&slot);
        match &slot {
            ArtifactSlot::Field(field) => write_json(&path, set.fields.get(field).unwrap_or(&empty_field))?,
            ArtifactSlot::Positions(field) => {
                write_json(&path, set.positions.get(field).unwrap_or(&empty_positions))?
            }
            ArtifactSlot::Feature { name, .. } => write_json(&path, &set.features[name])?,
            ArtifactSlot::Reviews => write_json(&path, &set.reviews)?,
            ArtifactSlot::Lengths => write_json(&path, &set.doc_lengths)?,
        }
    }
    save_docs(paths, &set.docs)?;
    save_meta(paths, meta)
}

/// Move the finished `staging` directory to `root`, retiring whatever was
/// there. `root` is briefly absent between the two renames; a load in that
/// window fails on the missing `meta.json` instead of reading a mix.
fn publish(staging: &Path, root: &Path) -> Result<()> {
    if root.exists() {
        let retired = sibling(root, "retired");
        if retired.exists() {
            remove_dir_all(&retired)?;
        }
        rename(root, &retired)?;
        rename(staging, root)?;
        remove_dir_all(&retired)?;
    } else {
        rename(staging, root)?;
    }
    Ok(())
}

/// Write a complete index directory for `set` at `paths.root`, replacing any
/// previous build as a whole.
pub fn save_index_set(paths: &IndexPaths, set: &IndexSet, created_at: String) -> Result<MetaFile> {
    let root = resolved_root(&paths.root)?;
    let features: BTreeMap<String, String> = set
        .features
        .keys()
        .enumerate()
        .map(|(i, name)| (name.clone(), feature_file_name(i, name)))
        .collect();
    let meta = MetaFile {
        num_docs: set.num_docs,
        build_id: build_id(&created_at),
        created_at,
        version: FORMAT_VERSION,
        features,
    };

    let staging = sibling(&root, "staging");
    if staging.exists() {
        remove_dir_all(&staging)?;
    }
    if let Err(e) = write_artifacts(&IndexPaths::new(&staging), set, &meta) {
        let _ = remove_dir_all(&staging);
        return Err(e);
    }
    publish(&staging, &root)?;
    tracing::info!(root = %root.display(), num_docs = meta.num_docs, features = meta.features.len(), "index set saved");
    Ok(meta)
}

/// Every artifact must describe exactly the documents of `docs.bin`, and
/// there must be as many of those as `meta.json` says.
fn check_counts(paths: &IndexPaths, set: &IndexSet) -> Result<()> {
    let expected = set.num_docs as usize;
    if set.docs.len() != expected {
        let reason = format!("holds {} documents, meta.json says {expected}", set.docs.len());
        return Err(corrupt("docs.bin", &paths.docs(), reason));
    }
    if set.doc_lengths.len() != expected {
        let reason = format!("holds {} documents, meta.json says {expected}", set.doc_lengths.len());
        let slot = ArtifactSlot::Lengths;
        return Err(corrupt(slot.name(), &paths.artifact(&slot), reason));
    }
    Ok(())
}

/// Load a whole index directory. Fails on any missing core artifact, any
/// unreadable artifact, or artifacts that do not belong to the same build;
/// absent optional artifacts load as empty.
pub fn load_index_set(paths: &IndexPaths) -> Result<IndexSet> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        return Err(corrupt("meta.json", &paths.meta(), format!("unsupported version {}", meta.version)));
    }
    let mut set = IndexSet { docs: load_docs(paths)?, num_docs: meta.num_docs, ..IndexSet::default() };
    for slot in ArtifactSlot::all(&meta) {
        let path = paths.artifact(&slot);
        if let Some(artifact) = load_artifact(paths, &slot)? {
            if let Some(key) = artifact.unknown_key(&set.docs) {
                return Err(corrupt(slot.name(), &path, format!("refers to unknown document {key}")));
            }
            place(&mut set, slot, artifact, &path)?;
        }
    }
    check_counts(paths, &set)?;
    if load_meta(paths)? != meta {
        return Err(corrupt("meta.json", &paths.meta(), "index directory was replaced while loading"));
    }
    tracing::info!(root = %paths.root.display(), num_docs = set.num_docs, features = set.features.len(), "index set loaded");
    Ok(set)
}
