use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cache::{StalenessCache, SweepReport};
use crate::compositing::{Compositor, SheetOutcome};
use crate::config::SheetConfig;
use crate::descriptor::{ImageDescriptor, ImageParams};
use crate::error::{Result, SheetPackerError};
use crate::group::SheetGroup;
use crate::model::PlacementRecord;
use crate::packer::pack_group;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outcome of [`PackingEngine::add_directory`].
#[derive(Debug, Default)]
pub struct RegisterReport {
    /// Keys of the registered images, in walk order.
    pub added: Vec<String>,
    /// Files whose extension is not accepted; never opened.
    pub skipped: Vec<PathBuf>,
    /// Per-file failures. The walk continues past each of them.
    pub rejected: Vec<SheetPackerError>,
}

/// Packed groups without any file output.
#[derive(Debug, Default)]
pub struct Layout {
    pub groups: Vec<SheetGroup>,
    pub placements: Vec<PlacementRecord>,
    pub errors: Vec<SheetPackerError>,
}

/// Output of a full [`PackingEngine::process`] run.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub sheets: Vec<SheetOutcome>,
    /// Packing-capacity errors plus per-group I/O failures.
    pub errors: Vec<SheetPackerError>,
    pub sweep: SweepReport,
    /// Group keys skipped because the deadline passed.
    pub incomplete: Vec<String>,
}

impl ProcessOutput {
    pub fn placements(&self) -> impl Iterator<Item = &PlacementRecord> {
        self.sheets.iter().flat_map(|s| s.placements.iter())
    }

    /// Number of sheets encoded this run (fresh cached sheets excluded).
    pub fn written(&self) -> usize {
        self.sheets.iter().filter(|s| s.written).count()
    }
}

enum GroupRun {
    Skipped(String),
    Done {
        sheet: Option<SheetOutcome>,
        errors: Vec<SheetPackerError>,
    },
}

/// Drives registration, then sort, pack, composite and sweep over every group.
pub struct PackingEngine {
    config: SheetConfig,
    cache: StalenessCache,
    groups: BTreeMap<String, SheetGroup>,
}

impl PackingEngine {
    /// Fails with `InvalidConfig` before anything is registered.
    pub fn new(config: SheetConfig) -> Result<Self> {
        config.validate()?;
        let cache = StalenessCache::from_config(&config);
        Ok(Self {
            config,
            cache,
            groups: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    pub fn cache(&self) -> &StalenessCache {
        &self.cache
    }

    pub fn groups(&self) -> impl Iterator<Item = &SheetGroup> {
        self.groups.values()
    }

    pub fn group(&self, key: &str) -> Option<&SheetGroup> {
        self.groups.get(key)
    }

    /// Validates and registers one source file; returns its key.
    ///
    /// A failed registration leaves the engine unchanged.
    pub fn add_image(&mut self, path: impl AsRef<Path>, params: &ImageParams) -> Result<String> {
        let descriptor = ImageDescriptor::open(path.as_ref(), params, &self.config)?;
        let key = descriptor.key().to_string();
        self.add_descriptor(descriptor)?;
        debug!(%key, "registered image");
        Ok(key)
    }

    /// Registers an already-built descriptor into the group matching its key.
    pub fn add_descriptor(&mut self, descriptor: ImageDescriptor) -> Result<()> {
        match self.groups.get_mut(descriptor.group_key()) {
            Some(group) => group.add_image(descriptor),
            None => {
                let mut group = SheetGroup::for_descriptor(&descriptor);
                group.add_image(descriptor)?;
                self.groups.insert(group.key().to_string(), group);
                Ok(())
            }
        }
    }

    /// Recursively registers every accepted file under `dir`, in file-name order.
    /// Version-control directories and `.DS_Store` files are ignored.
    #[instrument(skip_all)]
    pub fn add_directory(
        &mut self,
        dir: impl AsRef<Path>,
        params: &ImageParams,
    ) -> Result<RegisterReport> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SheetPackerError::InvalidInput(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        let mut report = RegisterReport::default();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_ignored(e));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "directory walk error");
                    report.rejected.push(SheetPackerError::Io(e.into()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let accepted = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.config.accepts(e));
            if !accepted {
                report.skipped.push(path.to_path_buf());
                continue;
            }
            match self.add_image(path, params) {
                Ok(key) => report.added.push(key),
                Err(e) => {
                    warn!(error = %e, "image rejected");
                    report.rejected.push(e);
                }
            }
        }
        info!(
            added = report.added.len(),
            skipped = report.skipped.len(),
            rejected = report.rejected.len(),
            "directory registered"
        );
        Ok(report)
    }

    /// Sorted and packed copy of `group`. Unplaceable images are reported and dropped.
    fn pack_one(&self, group: &SheetGroup) -> (SheetGroup, Vec<SheetPackerError>) {
        let mut packed = group.clone();
        packed.prepare();
        let order = self.config.sorter.strategy().order(packed.images());
        packed.apply_order(&order);
        let errors = pack_group(&mut packed, self.config.packer, self.config.bounding_box_size);
        debug!(
            group = packed.key(),
            placed = packed.len(),
            failed = errors.len(),
            "packed group"
        );
        (packed, errors)
    }

    /// Packs every group without touching the filesystem.
    #[instrument(skip_all, fields(groups = self.groups.len()))]
    pub fn layout(&self) -> Layout {
        let compositor = Compositor::new(&self.config, &self.cache);
        let mut layout = Layout::default();
        for group in self.groups.values() {
            let (packed, errors) = self.pack_one(group);
            layout.errors.extend(errors);
            if packed.is_empty() {
                continue;
            }
            let (relative, _) = compositor.sheet_paths(&packed);
            layout.placements.extend(packed.placement_records(&relative));
            layout.groups.push(packed);
        }
        layout
    }

    /// Full run: pack and composite every group, then sweep expired outputs.
    ///
    /// Groups are independent; a failure in one never stops the others. With the
    /// `parallel` feature and `config.parallel`, groups run on the rayon pool.
    #[instrument(skip_all, fields(groups = self.groups.len()))]
    pub fn process(&self) -> ProcessOutput {
        let start = Instant::now();
        let deadline = self.config.deadline_ms.map(Duration::from_millis);
        let compositor = Compositor::new(&self.config, &self.cache);
        let groups: Vec<&SheetGroup> = self.groups.values().collect();

        let run = |group: &SheetGroup| -> GroupRun {
            if deadline.is_some_and(|d| start.elapsed() >= d) {
                return GroupRun::Skipped(group.key().to_string());
            }
            let (packed, mut errors) = self.pack_one(group);
            if packed.is_empty() {
                return GroupRun::Done {
                    sheet: None,
                    errors,
                };
            }
            let sheet = match compositor.composite(&packed) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(group = packed.key(), error = %e, "sheet generation failed");
                    errors.push(e);
                    None
                }
            };
            GroupRun::Done { sheet, errors }
        };

        #[cfg(feature = "parallel")]
        let runs: Vec<GroupRun> = if self.config.parallel {
            groups.par_iter().map(|g| run(*g)).collect()
        } else {
            groups.iter().map(|g| run(*g)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let runs: Vec<GroupRun> = groups.iter().map(|g| run(*g)).collect();

        let mut out = ProcessOutput::default();
        for r in runs {
            match r {
                GroupRun::Skipped(key) => out.incomplete.push(key),
                GroupRun::Done { sheet, errors } => {
                    out.sheets.extend(sheet);
                    out.errors.extend(errors);
                }
            }
        }
        if !out.incomplete.is_empty() {
            warn!(remaining = out.incomplete.len(), "deadline exceeded");
            out.errors.push(SheetPackerError::DeadlineExceeded {
                remaining: out.incomplete.len(),
            });
        }
        out.sweep = self.sweep();
        info!(
            sheets = out.sheets.len(),
            written = out.written(),
            errors = out.errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "processing finished"
        );
        out
    }

    /// Removes expired files from the output directories.
    pub fn sweep(&self) -> SweepReport {
        self.cache.sweep(&self.config.output_dirs())
    }
}

/// Version-control directories below the walk root and `.DS_Store` files.
pub(crate) fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        entry.depth() > 0 && (name == ".git" || name == ".svn")
    } else {
        name == ".DS_Store"
    }
}
