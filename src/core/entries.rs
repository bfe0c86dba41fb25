use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Local file header, end of central directory and spanned archive markers.
const ZIP_SIGNATURES: [[u8; 4]; 3] = [*b"PK\x03\x04", *b"PK\x05\x06", *b"PK\x07\x08"];

/// Number of leading bytes inspected when sniffing an archive.
const SIGNATURE_PROBE_LEN: usize = 8;

/// One item of a tree that is being filtered: a file or a directory of the
/// source root, or an entry of an archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entry {
    /// Location as reported to callers (absolute for files on disk, the entry
    /// name for archives).
    pub path: PathBuf,
    /// Location relative to the root of the tree; globs are matched against it.
    pub relative: PathBuf,
    pub is_dir: bool,
}

/// Abstraction over a tree of named entries with readable content.
/// Implemented for a directory on disk, an explicit path list and a zip archive.
pub trait EntrySource {
    /// Every entry of the tree, directories included, in traversal order.
    fn entries(&self) -> Result<Vec<Entry>>;

    /// Opens the content of a file entry.
    fn open(&self, entry: &Entry) -> Result<Box<dyn Read + '_>>;
}

/// A directory tree on the local filesystem.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl EntrySource for FsSource {
    fn entries(&self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for item in WalkDir::new(&self.root).sort_by_file_name() {
            let item = match item {
                Ok(item) => item,
                Err(err) if err.depth() == 0 => {
                    return Err(err).with_context(|| {
                        format!("Failed to read source root {}", self.root.display())
                    });
                }
                Err(err) => {
                    log::warn!("Error walking entry: {}", err);
                    continue;
                }
            };
            let relative = item
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(item.path())
                .to_path_buf();
            if relative.as_os_str().is_empty() {
                continue;
            }
            entries.push(Entry {
                path: item.path().to_path_buf(),
                relative,
                is_dir: item.file_type().is_dir(),
            });
        }
        Ok(entries)
    }

    fn open(&self, entry: &Entry) -> Result<Box<dyn Read + '_>> {
        let file = File::open(&entry.path)
            .with_context(|| format!("Failed to open {}", entry.path.display()))?;
        Ok(Box::new(file))
    }
}

/// An explicit list of files below a root, e.g. the output of a previous
/// filter run.
pub struct PathListSource {
    root: PathBuf,
    paths: Vec<PathBuf>,
}

impl PathListSource {
    pub fn new<P: AsRef<Path>>(root: P, paths: Vec<PathBuf>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            paths,
        }
    }
}

impl EntrySource for PathListSource {
    fn entries(&self) -> Result<Vec<Entry>> {
        Ok(self
            .paths
            .iter()
            .map(|path| {
                let full = if path.is_absolute() {
                    path.clone()
                } else {
                    self.root.join(path)
                };
                Entry {
                    relative: full.strip_prefix(&self.root).unwrap_or(path).to_path_buf(),
                    is_dir: full.is_dir(),
                    path: full,
                }
            })
            .collect())
    }

    fn open(&self, entry: &Entry) -> Result<Box<dyn Read + '_>> {
        let file = File::open(&entry.path)
            .with_context(|| format!("Failed to open {}", entry.path.display()))?;
        Ok(Box::new(file))
    }
}

/// A zip archive read in place. Entry content is decompressed on demand.
pub struct ZipSource<R: Read + Seek> {
    archive: RefCell<ZipArchive<R>>,
}

impl ZipSource<File> {
    pub fn open_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open archive {}", path.display()))?;
        Self::new(file).with_context(|| format!("Failed to read archive {}", path.display()))
    }
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader).context("Failed to read zip central directory")?;
        Ok(Self {
            archive: RefCell::new(archive),
        })
    }

    /// Raw entry names, in central directory order.
    pub fn entry_names(&self) -> Result<Vec<String>> {
        let mut archive = self.archive.borrow_mut();
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            names.push(file.name().to_string());
        }
        Ok(names)
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn entries(&self) -> Result<Vec<Entry>> {
        let mut archive = self.archive.borrow_mut();
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            let name = PathBuf::from(file.name());
            entries.push(Entry {
                path: name.clone(),
                relative: name,
                is_dir: file.is_dir(),
            });
        }
        Ok(entries)
    }

    fn open(&self, entry: &Entry) -> Result<Box<dyn Read + '_>> {
        let name = entry.relative.to_string_lossy();
        let mut archive = self.archive.borrow_mut();
        let mut file = archive
            .by_name(&name)
            .with_context(|| format!("Entry {} not found in archive", name))?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .with_context(|| format!("Failed to read archive entry {}", name))?;
        Ok(Box::new(Cursor::new(content)))
    }
}

/// Reports whether the stream starts like a zip archive: one of the three
/// archive signatures within its first eight bytes.
pub fn is_zip_archive<R: Read>(mut reader: R) -> io::Result<bool> {
    let mut header = [0u8; SIGNATURE_PROBE_LEN];
    let mut filled = 0;
    while filled < header.len() {
        let read = reader.read(&mut header[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(header[..filled]
        .windows(4)
        .any(|window| ZIP_SIGNATURES.iter().any(|sig| window == sig)))
}

/// Same as [`is_zip_archive`] for a file on disk.
pub fn is_zip_file(path: &Path) -> Result<bool> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(is_zip_archive(file)?)
}

/// Entry names of an archive, each prefixed with the archive's own file name,
/// ready for the name-tree validator.
pub fn prefixed_entry_names(archive_path: &Path) -> Result<BTreeSet<String>> {
    let archive_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let source = ZipSource::open_path(archive_path)?;
    Ok(source
        .entry_names()?
        .into_iter()
        .map(|name| format!("{}/{}", archive_name, name))
        .collect())
}
