//! Directory index of identity folders and their images.
//!
//! [`IndexBuilder`] performs the two scans over the dataset root (images two
//! levels down, identity folders one level down) and freezes the result into
//! an [`IdentityIndex`], which only exposes read accessors.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{
    config::{FaceDatasetConfig, JunkPolicy},
    error::{DatasetError, DatasetResult},
    identity::{self, FolderIdentity, IdentityKey},
};

/// Builder performing the directory scans.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    root: PathBuf,
    database_name: String,
    image_extension: String,
    cur_id: usize,
    junk_policy: JunkPolicy,
    progress: bool,
}

impl IndexBuilder {
    const PROGRESS_TEMPLATE: &'static str =
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} identities ({per_sec})";

    /// Start a builder for `root` with GlintAsia defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            database_name: "GlintAsia".to_string(),
            image_extension: "jpg".to_string(),
            cur_id: 0,
            junk_policy: JunkPolicy::Skip,
            progress: false,
        }
    }

    /// Builder carrying the indexing fields of a dataset configuration.
    pub fn from_config(config: &FaceDatasetConfig) -> Self {
        Self::new(&config.image_root)
            .database_name(&config.database_name)
            .image_extension(&config.image_extension)
            .cur_id(config.cur_id)
            .junk_policy(config.junk_policy.clone())
            .progress(config.show_progress)
    }

    /// Prefix of every identity key.
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Extension of indexed image files, without the dot.
    pub fn image_extension(mut self, extension: impl Into<String>) -> Self {
        self.image_extension = extension.into();
        self
    }

    /// Offset of the first label.
    pub fn cur_id(mut self, cur_id: usize) -> Self {
        self.cur_id = cur_id;
        self
    }

    /// Handling of images inside junk folders.
    pub fn junk_policy(mut self, policy: JunkPolicy) -> Self {
        self.junk_policy = policy;
        self
    }

    /// Draw a progress bar on stderr while identity folders are parsed.
    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Scan the root and freeze the index.
    ///
    /// # Errors
    ///
    /// Fails when the root is missing, a directory cannot be read, or any
    /// identity folder name is malformed.
    pub fn build(self) -> DatasetResult<IdentityIndex> {
        if !self.root.is_dir() {
            return Err(DatasetError::RootNotFound { path: self.root });
        }

        info!(
            database = %self.database_name,
            root = %self.root.display(),
            "Loading images"
        );

        let mut samples = self.scan_samples()?;
        let identities = self.scan_identities()?;

        let labels: HashMap<IdentityKey, usize> = identities
            .iter()
            .enumerate()
            .map(|(position, key)| (key.clone(), position + self.cur_id))
            .collect();

        let mut skipped_junk = 0;
        if self.junk_policy == JunkPolicy::Skip {
            let mut kept = Vec::with_capacity(samples.len());
            for path in samples {
                match identity::parse_sample(&self.database_name, &path)? {
                    FolderIdentity::Junk => skipped_junk += 1,
                    FolderIdentity::Registered(_) => kept.push(path),
                }
            }
            samples = kept;
        }

        if samples.is_empty() {
            warn!(root = %self.root.display(), "No images indexed");
        }
        info!(
            samples = samples.len(),
            classes = identities.len(),
            skipped_junk,
            "Indexed {} dataset",
            self.database_name
        );

        Ok(IdentityIndex {
            root: self.root,
            database_name: self.database_name,
            cur_id: self.cur_id,
            identities,
            labels,
            samples,
            skipped_junk,
        })
    }

    /// Collect `root/*/*.<ext>` in path order.
    fn scan_samples(&self) -> DatasetResult<Vec<PathBuf>> {
        let mut samples = Vec::new();
        // No min_depth: the predicate must see identity folders to prune hidden ones.
        let walker = WalkDir::new(&self.root)
            .max_depth(2)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry.map_err(|source| self.read_failed(source))?;
            if entry.depth() != 2 || !entry.file_type().is_file() {
                continue;
            }
            let matches_extension = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == self.image_extension);
            if matches_extension {
                samples.push(entry.into_path());
            }
        }

        Ok(samples)
    }

    /// Register identities from the immediate sub-folders, sorted by name.
    fn scan_identities(&self) -> DatasetResult<Vec<IdentityKey>> {
        let folders = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry))
            .filter(|entry| entry.as_ref().map_or(true, |e| e.file_type().is_dir()))
            .collect::<Result<Vec<DirEntry>, _>>()
            .map_err(|source| self.read_failed(source))?;

        let bar = self.progress_bar(folders.len());
        let mut identities: Vec<IdentityKey> = Vec::new();
        let mut seen: HashSet<IdentityKey> = HashSet::new();

        for entry in &folders {
            bar.inc(1);
            let folder = entry
                .file_name()
                .to_str()
                .ok_or_else(|| DatasetError::InvalidUtf8Path {
                    path: entry.path().to_path_buf(),
                })?;

            match identity::parse_folder(&self.database_name, folder)? {
                FolderIdentity::Junk => debug!(folder, "Skipping junk identity folder"),
                FolderIdentity::Registered(key) => {
                    if seen.insert(key.clone()) {
                        identities.push(key);
                    }
                }
            }
        }

        bar.finish_and_clear();
        Ok(identities)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        match ProgressStyle::with_template(Self::PROGRESS_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(err) => debug!(error = %err, "Falling back to the default progress style"),
        }
        bar
    }

    fn read_failed(&self, source: walkdir::Error) -> DatasetError {
        DatasetError::DirectoryReadFailed {
            path: source
                .path()
                .map_or_else(|| self.root.clone(), Path::to_path_buf),
            source,
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Immutable index of samples and identity labels.
#[derive(Debug, Clone)]
pub struct IdentityIndex {
    root: PathBuf,
    database_name: String,
    cur_id: usize,
    identities: Vec<IdentityKey>,
    labels: HashMap<IdentityKey, usize>,
    samples: Vec<PathBuf>,
    skipped_junk: usize,
}

impl IdentityIndex {
    /// Number of indexed images.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no image was indexed.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of labelled identities.
    pub fn class_count(&self) -> usize {
        self.identities.len()
    }

    /// Identity keys in label order.
    pub fn identities(&self) -> &[IdentityKey] {
        &self.identities
    }

    /// Label assigned to `key`, if registered.
    pub fn label_of(&self, key: &IdentityKey) -> Option<usize> {
        self.labels.get(key).copied()
    }

    /// All indexed image paths.
    pub fn samples(&self) -> &[PathBuf] {
        &self.samples
    }

    /// Path of sample `index`.
    pub fn sample_path(&self, index: usize) -> Option<&Path> {
        self.samples.get(index).map(PathBuf::as_path)
    }

    /// Label of sample `index`, derived from its parent folder name.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` past the end, `UnregisteredIdentity` for images of
    /// junk folders (only reachable with [`JunkPolicy::FailFast`]).
    pub fn label_for_sample(&self, index: usize) -> DatasetResult<usize> {
        let path = self
            .sample_path(index)
            .ok_or(DatasetError::IndexOutOfBounds {
                index,
                len: self.len(),
            })?;

        let unregistered = |identity: String| DatasetError::UnregisteredIdentity {
            path: path.to_path_buf(),
            identity,
        };

        match identity::parse_sample(&self.database_name, path)? {
            FolderIdentity::Registered(key) => self
                .label_of(&key)
                .ok_or_else(|| unregistered(key.to_string())),
            FolderIdentity::Junk => Err(unregistered(format!(
                "{}_{}",
                self.database_name,
                identity::JUNK_ID
            ))),
        }
    }

    /// Dataset root the index was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Prefix of the identity keys.
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Offset of the first label.
    pub const fn cur_id(&self) -> usize {
        self.cur_id
    }

    /// Images dropped because they belong to junk folders.
    pub const fn skipped_junk(&self) -> usize {
        self.skipped_junk
    }
}
