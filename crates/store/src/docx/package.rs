//! Package store - the zip container holding a document's parts
//!
//! A [`Package`] is an in-memory set of named parts. Opening reads every zip
//! entry under per-part and total size limits. Saving writes a fresh archive
//! to a sibling temporary file and renames it over the destination, so a
//! failed save never leaves a truncated file behind.

use crate::docx::error::{DocxError, DocxResult};
use crate::options::Compression;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Name of the content types part
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Default cap on one inflated part
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Default cap on all inflated parts together
pub const MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

// =============================================================================
// Part Names
// =============================================================================

/// A normalized part name: no leading slash, forward slashes, no `.`/`..`
/// segments. Case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartName(String);

impl PartName {
    /// Normalize a part name such as `/word/document.xml` or `word\styles.xml`
    pub fn new(name: &str) -> DocxResult<Self> {
        let mut segments: Vec<&str> = Vec::new();
        let unified = name.replace('\\', "/");
        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(DocxError::CorruptPackage(format!(
                            "part name '{name}' escapes the package root"
                        )));
                    }
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Err(DocxError::CorruptPackage(format!("empty part name '{name}'")));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory holding this part, without trailing slash (`""` at the root)
    pub fn directory(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[..i],
            None => "",
        }
    }

    /// File name portion
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// Lowercased extension, if any
    pub fn extension(&self) -> Option<String> {
        let file = self.file_name();
        file.rfind('.').map(|i| file[i + 1..].to_ascii_lowercase())
    }

    /// Resolve a relationship target. `source` is the owning part, or `None`
    /// for the package root. Absolute targets (leading `/`) ignore the source.
    pub fn resolve(source: Option<&PartName>, target: &str) -> DocxResult<Self> {
        if target.starts_with('/') {
            return Self::new(target);
        }
        match source.map(PartName::directory) {
            Some(dir) if !dir.is_empty() => Self::new(&format!("{dir}/{target}")),
            _ => Self::new(target),
        }
    }

    /// Relationship target for this part as seen from `source`.
    /// Only parts below the source's directory get a relative target.
    pub fn relative_to(&self, source: Option<&PartName>) -> String {
        let dir = source.map(PartName::directory).unwrap_or("");
        if dir.is_empty() {
            return self.0.clone();
        }
        match self.0.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/')) {
            Some(rest) => rest.to_string(),
            None => format!("/{}", self.0),
        }
    }

    /// The relationships part for this part, e.g. `word/_rels/document.xml.rels`
    pub fn rels_part(&self) -> PartName {
        let dir = self.directory();
        if dir.is_empty() {
            PartName(format!("_rels/{}.rels", self.file_name()))
        } else {
            PartName(format!("{dir}/_rels/{}.rels", self.file_name()))
        }
    }

    /// The root relationships part `_rels/.rels`
    pub fn root_rels() -> PartName {
        PartName("_rels/.rels".to_string())
    }

    /// True for `*.rels` parts
    pub fn is_relationships(&self) -> bool {
        self.extension().as_deref() == Some("rels")
    }
}

impl fmt::Display for PartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Package
// =============================================================================

/// Size limits applied while reading an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: MAX_PART_BYTES,
            max_total_bytes: MAX_TOTAL_BYTES,
        }
    }
}

/// A single part: name, bytes and, when known, its declared content type
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: PartName,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// An OPC package held in memory
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<PartName, Part>,
}

impl Package {
    /// An empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a package from disk with default limits
    pub fn open(path: impl AsRef<Path>) -> DocxResult<Self> {
        Self::open_with_limits(path, PackageLimits::default())
    }

    /// Open a package from disk
    pub fn open_with_limits(path: impl AsRef<Path>, limits: PackageLimits) -> DocxResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocxError::FileNotFound(path.to_path_buf()),
            _ => DocxError::Io(e),
        })?;
        Self::from_reader(file, limits)
    }

    /// Read a package from an in-memory archive
    pub fn from_bytes(bytes: &[u8], limits: PackageLimits) -> DocxResult<Self> {
        Self::from_reader(Cursor::new(bytes), limits)
    }

    /// Read a package from any seekable source
    pub fn from_reader<R: Read + Seek>(reader: R, limits: PackageLimits) -> DocxResult<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| DocxError::CorruptPackage(format!("not a zip archive: {e}")))?;

        let mut package = Self::new();
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(DocxError::from_zip_read)?;
            if file.is_dir() {
                continue;
            }
            let raw_name = file.name().to_string();
            let name = PartName::new(&raw_name)?;

            if file.size() > limits.max_part_bytes {
                return Err(DocxError::CorruptPackage(format!(
                    "part '{name}' inflates to {} bytes, over the {} byte limit",
                    file.size(),
                    limits.max_part_bytes
                )));
            }

            // The declared size can lie; cap the actual read as well.
            let mut data = Vec::new();
            (&mut file)
                .take(limits.max_part_bytes + 1)
                .read_to_end(&mut data)
                .map_err(|e| DocxError::CorruptPackage(format!("part '{name}' is truncated or damaged: {e}")))?;
            if data.len() as u64 > limits.max_part_bytes {
                return Err(DocxError::CorruptPackage(format!(
                    "part '{name}' exceeds the {} byte limit",
                    limits.max_part_bytes
                )));
            }

            total += data.len() as u64;
            if total > limits.max_total_bytes {
                return Err(DocxError::CorruptPackage(format!(
                    "package inflates beyond the {} byte limit",
                    limits.max_total_bytes
                )));
            }

            if package.parts.contains_key(&name) {
                tracing::warn!(part = %name, "duplicate zip entry ignored");
                continue;
            }
            package.parts.insert(
                name.clone(),
                Part {
                    name,
                    data,
                    content_type: None,
                },
            );
        }

        tracing::debug!(parts = package.len(), bytes = total, "package read");
        Ok(package)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        PartName::new(name).is_ok_and(|n| self.parts.contains_key(&n))
    }

    /// Look up a part
    pub fn get(&self, name: &str) -> Option<&Part> {
        PartName::new(name).ok().and_then(|n| self.parts.get(&n))
    }

    /// Bytes of a part
    pub fn part(&self, name: &str) -> DocxResult<&[u8]> {
        self.get(name)
            .map(|p| p.data.as_slice())
            .ok_or_else(|| DocxError::PartNotFound(name.to_string()))
    }

    /// A part decoded as UTF-8 text, byte-order mark removed
    pub fn part_string(&self, name: &str) -> DocxResult<String> {
        let bytes = self.part(name)?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec()).map_err(|e| DocxError::parse(name, format!("invalid UTF-8: {e}")))
    }

    /// Add or replace a part
    pub fn add_part(&mut self, name: &str, data: Vec<u8>, content_type: Option<&str>) -> DocxResult<()> {
        let name = PartName::new(name)?;
        self.parts.insert(
            name.clone(),
            Part {
                name,
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Record the declared content type of an existing part
    pub fn set_content_type(&mut self, name: &PartName, content_type: &str) {
        if let Some(part) = self.parts.get_mut(name) {
            part.content_type = Some(content_type.to_string());
        }
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Part> {
        let name = PartName::new(name).ok()?;
        self.parts.remove(&name)
    }

    /// Part names in sorted order
    pub fn part_names(&self) -> impl Iterator<Item = &PartName> {
        self.parts.keys()
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Write the archive to `writer`. `[Content_Types].xml` goes first.
    pub fn write_to<W: Write + Seek>(&self, writer: W, compression: Compression) -> DocxResult<W> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(compression.method());

        let content_types = self.parts.values().filter(|p| p.name.as_str() == CONTENT_TYPES_PART);
        let rest = self.parts.values().filter(|p| p.name.as_str() != CONTENT_TYPES_PART);
        for part in content_types.chain(rest) {
            zip.start_file(part.name.as_str(), options)
                .map_err(DocxError::from_zip_write)?;
            zip.write_all(&part.data)?;
        }

        zip.finish().map_err(DocxError::from_zip_write)
    }

    /// Serialize the archive into memory
    pub fn to_bytes(&self, compression: Compression) -> DocxResult<Vec<u8>> {
        if self.is_empty() {
            return Err(DocxError::Encode("no parts to save".into()));
        }
        let cursor = self.write_to(Cursor::new(Vec::new()), compression)?;
        Ok(cursor.into_inner())
    }

    /// Save atomically: write a sibling temporary file, sync it, then rename
    /// it over `path`. The temporary file is removed on failure.
    pub fn save_to_file(&self, path: impl AsRef<Path>, compression: Compression) -> DocxResult<()> {
        if self.is_empty() {
            return Err(DocxError::Encode("no parts to save".into()));
        }
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .ok_or_else(|| DocxError::Encode(format!("invalid output path: {}", path.display())))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let temp_path = dir.join(format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let result = self
            .write_temp(&temp_path, compression)
            .and_then(|()| fs::rename(&temp_path, path).map_err(DocxError::from));
        if let Err(e) = &result {
            tracing::warn!(path = %path.display(), error = %e, "save failed, removing temporary file");
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn write_temp(&self, temp_path: &Path, compression: Compression) -> DocxResult<()> {
        let file = OpenOptions::new().write(true).create_new(true).open(temp_path)?;
        let writer = self.write_to(BufWriter::new(file), compression)?;
        let file = writer.into_inner().map_err(|e| DocxError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }
}
