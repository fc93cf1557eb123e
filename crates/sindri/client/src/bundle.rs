//! Project bundling.
//!
//! A project is uploaded as a single gzip compressed tarball whose entries live under a root
//! directory named after the `name` field of the project manifest (`sindri.json`). Bundles are
//! deterministic: entries are sorted by relative path and every header is normalized, so the
//! same project always produces the same bytes.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
};

use flate2::{Compression, write::GzEncoder};
use ignore::WalkBuilder;
use serde_json::{Map, Value};
use tar::{EntryType, Header};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Name of the project manifest.
pub const MANIFEST_FILENAME: &str = "sindri.json";

/// Name of the per project ignore file, using gitignore syntax.
pub const IGNORE_FILENAME: &str = ".sindriignore";

/// Archive extensions accepted for pre-packaged projects, matched case-insensitively.
pub const ARCHIVE_EXTENSIONS: [&str; 3] = [".tar.gz", ".tgz", ".zip"];

/// An in-memory project file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    /// Path of the file relative to the project root, using `/` as separator.
    pub name: String,
    /// File contents.
    pub contents: Vec<u8>,
}

impl ProjectFile {
    /// Creates a new in-memory file.
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Where the files of a circuit project come from.
#[derive(Debug, Clone)]
pub enum ProjectSource {
    /// A project directory with `sindri.json` at its root.
    Directory(PathBuf),
    /// An already packaged `.tar.gz`, `.tgz` or `.zip` archive, uploaded as is.
    Archive(PathBuf),
    /// In-memory files, one of which must be `sindri.json`.
    Files(Vec<ProjectFile>),
}

impl ProjectSource {
    /// Classifies an existing path as a project directory or an archive.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.is_dir() {
            Ok(Self::Directory(path))
        } else if path.exists() {
            Ok(Self::Archive(path))
        } else {
            Err(Error::PathNotFound { path })
        }
    }
}

impl From<Vec<ProjectFile>> for ProjectSource {
    fn from(files: Vec<ProjectFile>) -> Self {
        Self::Files(files)
    }
}

/// Parsed project manifest. Only `name` is interpreted, other fields are kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Name of the circuit.
    pub name: String,
    /// The whole manifest object.
    pub fields: Map<String, Value>,
}

impl Manifest {
    /// Reads and parses the manifest at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path).map_err(Error::io(path))?;
        Self::parse(&bytes, path)
    }

    /// Parses manifest bytes, `path` is only used in error messages.
    pub fn parse(bytes: &[u8], path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fields: Map<String, Value> =
            serde_json::from_slice(bytes).map_err(|source| Error::InvalidManifest {
                path: path.to_path_buf(),
                source,
            })?;
        let Some(Value::String(name)) = fields.get("name") else {
            return Err(Error::MissingManifestName {
                path: path.to_path_buf(),
            });
        };
        Ok(Self {
            name: name.clone(),
            fields,
        })
    }
}

/// A packaged project ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Circuit name from the manifest. `None` for pre-packaged archives, whose manifest is left
    /// to the server to validate.
    pub name: Option<String>,
    /// File name used for the multipart upload.
    pub filename: String,
    /// Archive bytes.
    pub bytes: Vec<u8>,
}

/// A file to be written into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the archive root, using `/` as separator.
    pub path: String,
    /// File contents.
    pub contents: Vec<u8>,
    /// Whether any execute bit was set on the source file.
    pub executable: bool,
}

/// Writes project files into a compressed archive.
pub trait ArchiveWriter: Send + Sync {
    /// Writes `entries`, in the given order, under the `root` directory.
    fn write(&self, root: &str, entries: &[ArchiveEntry]) -> Result<Vec<u8>>;
}

/// Gzip compressed GNU tarball with normalized headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzWriter;

impl ArchiveWriter for TarGzWriter {
    fn write(&self, root: &str, entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        let archive_path = format!("{root}.tar.gz");
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for entry in entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(entry.contents.len() as u64);
            header.set_mode(if entry.executable { 0o755 } else { 0o644 });
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            builder
                .append_data(
                    &mut header,
                    format!("{root}/{}", entry.path),
                    entry.contents.as_slice(),
                )
                .map_err(Error::io(&entry.path))?;
        }
        let mut encoder = builder.into_inner().map_err(Error::io(&archive_path))?;
        encoder.flush().map_err(Error::io(&archive_path))?;
        encoder.finish().map_err(Error::io(&archive_path))
    }
}

/// Packages `source` with `writer`.
pub fn bundle_project(source: &ProjectSource, writer: &dyn ArchiveWriter) -> Result<Bundle> {
    match source {
        ProjectSource::Directory(dir) => bundle_directory(dir, writer),
        ProjectSource::Archive(path) => read_archive(path),
        ProjectSource::Files(files) => bundle_files(files, writer),
    }
}

fn bundle_directory(dir: &Path, writer: &dyn ArchiveWriter) -> Result<Bundle> {
    if !dir.exists() {
        return Err(Error::PathNotFound {
            path: dir.to_path_buf(),
        });
    }
    let manifest_path = manifest_in(dir).ok_or_else(|| Error::ManifestNotFound {
        path: dir.join(MANIFEST_FILENAME),
    })?;
    let manifest = Manifest::load(&manifest_path)?;

    let mut entries = Vec::new();
    for relative in collect_project_files(dir)? {
        let path = dir.join(&relative);
        let contents = fs::read(&path).map_err(Error::io(&path))?;
        entries.push(ArchiveEntry {
            executable: is_executable(&path)?,
            path: relative,
            contents,
        });
    }
    debug!(name = %manifest.name, files = entries.len(), "Bundling project directory");

    Ok(Bundle {
        bytes: writer.write(&manifest.name, &entries)?,
        filename: format!("{}.tar.gz", manifest.name),
        name: Some(manifest.name),
    })
}

fn read_archive(path: &Path) -> Result<Bundle> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lowercase = filename.to_ascii_lowercase();
    if !ARCHIVE_EXTENSIONS.iter().any(|ext| lowercase.ends_with(ext)) {
        return Err(Error::UnsupportedArchive {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(Error::PathNotFound {
            path: path.to_path_buf(),
        });
    }

    Ok(Bundle {
        name: None,
        bytes: fs::read(path).map_err(Error::io(path))?,
        filename,
    })
}

fn bundle_files(files: &[ProjectFile], writer: &dyn ArchiveWriter) -> Result<Bundle> {
    let mut sorted = BTreeMap::new();
    for file in files {
        validate_file_name(&file.name)?;
        if sorted.insert(file.name.as_str(), file).is_some() {
            return Err(Error::InvalidProjectFile {
                name: file.name.clone(),
                reason: "duplicate file name",
            });
        }
    }

    let Some(manifest) = sorted.get(MANIFEST_FILENAME) else {
        return Err(Error::ManifestNotFound {
            path: PathBuf::from(MANIFEST_FILENAME),
        });
    };
    let manifest = Manifest::parse(&manifest.contents, MANIFEST_FILENAME)?;

    let entries = sorted
        .into_values()
        .map(|file| ArchiveEntry {
            path: file.name.clone(),
            contents: file.contents.clone(),
            executable: false,
        })
        .collect::<Vec<_>>();

    Ok(Bundle {
        bytes: writer.write(&manifest.name, &entries)?,
        filename: format!("{}.tar.gz", manifest.name),
        name: Some(manifest.name),
    })
}

fn validate_file_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.starts_with('/') || Path::new(name).is_absolute() {
        "name must be a relative path"
    } else if Path::new(name)
        .components()
        .any(|component| component == Component::ParentDir)
    {
        "name must not contain '..'"
    } else {
        return Ok(());
    };
    Err(Error::InvalidProjectFile {
        name: name.to_string(),
        reason,
    })
}

/// Lists the files of the project at `root`, as sorted `/` separated relative paths.
///
/// Rules from `.sindriignore` files are honored, symlinks are followed and `.git` directories
/// are always skipped. The manifest is included even when ignored.
pub fn collect_project_files(root: &Path) -> Result<Vec<String>> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(true)
        .add_custom_ignore_filename(IGNORE_FILENAME)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut files = BTreeSet::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(error) => {
                warn!(error = %error, "Skipping unreadable project entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|file_type| file_type.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(relative);
    }

    let manifest = manifest_in(root)
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()));
    if let Some(manifest) = manifest
        && files.insert(manifest.clone())
    {
        debug!(%manifest, "Including manifest despite ignore rules");
    }

    Ok(files.into_iter().collect())
}

/// Finds `sindri.json` (matched case-insensitively) in `start` or the nearest ancestor.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().ok()?;
    start.ancestors().find_map(manifest_in)
}

/// The manifest directly inside `dir`, preferring the exact file name.
fn manifest_in(dir: &Path) -> Option<PathBuf> {
    let exact = dir.join(MANIFEST_FILENAME);
    if exact.is_file() {
        return Some(exact);
    }
    fs::read_dir(dir).ok()?.flatten().find_map(|entry| {
        let is_manifest = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.eq_ignore_ascii_case(MANIFEST_FILENAME));
        (is_manifest && entry.path().is_file()).then(|| entry.path())
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(Error::io(path))?;
    Ok(metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> Result<bool> {
    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    use super::*;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Returns `(path, mode, mtime, uid, contents)` for each tarball entry.
    fn unpack(bytes: &[u8]) -> Vec<(String, u32, u64, u64, String)> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let header = entry.header().clone();
                let mut contents = String::new();
                entry.read_to_string(&mut contents).unwrap();
                (
                    entry.path().unwrap().to_string_lossy().into_owned(),
                    header.mode().unwrap(),
                    header.mtime().unwrap(),
                    header.uid().unwrap(),
                    contents,
                )
            })
            .collect()
    }

    fn sample_project() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        write(dir.path(), "sindri.json", r#"{"name": "multiplier2"}"#);
        write(dir.path(), "circuit.circom", "template Multiplier2() {}");
        write(dir.path(), "lib/b.circom", "b");
        write(dir.path(), "lib/a.circom", "a");
        dir
    }

    #[test]
    fn test_directory_bundle_layout() {
        let dir = sample_project();
        let bundle =
            bundle_project(&ProjectSource::Directory(dir.path().into()), &TarGzWriter).unwrap();

        assert_eq!(bundle.name.as_deref(), Some("multiplier2"));
        assert_eq!(bundle.filename, "multiplier2.tar.gz");

        let entries = unpack(&bundle.bytes);
        let paths = entries.iter().map(|e| e.0.as_str()).collect::<Vec<_>>();
        assert_eq!(
            paths,
            [
                "multiplier2/circuit.circom",
                "multiplier2/lib/a.circom",
                "multiplier2/lib/b.circom",
                "multiplier2/sindri.json",
            ]
        );
        for (_, _, mtime, uid, _) in &entries {
            assert_eq!((*mtime, *uid), (0, 0));
        }
        assert_eq!(entries[1].4, "a");
    }

    #[test]
    fn test_directory_bundle_is_deterministic() {
        let first = sample_project();
        let second = sample_project();
        // Rewriting a file with the same contents only changes its mtime.
        write(second.path(), "lib/a.circom", "a");

        let a = bundle_project(&ProjectSource::Directory(first.path().into()), &TarGzWriter)
            .unwrap();
        let b = bundle_project(&ProjectSource::Directory(first.path().into()), &TarGzWriter)
            .unwrap();
        let c = bundle_project(&ProjectSource::Directory(second.path().into()), &TarGzWriter)
            .unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.bytes, c.bytes);
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_mode_is_normalized() {
        use std::os::unix::fs::PermissionsExt;

        let dir = sample_project();
        write(dir.path(), "build.sh", "#!/bin/sh");
        fs::set_permissions(dir.path().join("build.sh"), fs::Permissions::from_mode(0o700))
            .unwrap();
        fs::set_permissions(
            dir.path().join("circuit.circom"),
            fs::Permissions::from_mode(0o600),
        )
        .unwrap();

        let bundle =
            bundle_project(&ProjectSource::Directory(dir.path().into()), &TarGzWriter).unwrap();
        let modes = unpack(&bundle.bytes)
            .into_iter()
            .map(|(path, mode, ..)| (path, mode))
            .collect::<BTreeMap<_, _>>();
        assert_eq!(modes["multiplier2/build.sh"], 0o755);
        assert_eq!(modes["multiplier2/circuit.circom"], 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_followed() {
        let dir = sample_project();
        let shared = tempdir().unwrap();
        write(shared.path(), "lib.circom", "shared");
        write(shared.path(), "sub/skipped.circom", "skipped");
        write(dir.path(), ".sindriignore", "sub/\n");
        std::os::unix::fs::symlink(shared.path(), dir.path().join("linked")).unwrap();

        let files = collect_project_files(dir.path()).unwrap();
        assert!(files.contains(&"linked/lib.circom".to_string()), "{files:?}");
        assert!(!files.iter().any(|file| file.contains("skipped")), "{files:?}");

        let bundle =
            bundle_project(&ProjectSource::Directory(dir.path().into()), &TarGzWriter).unwrap();
        let entries = unpack(&bundle.bytes);
        let linked = entries
            .iter()
            .find(|entry| entry.0 == "multiplier2/linked/lib.circom")
            .unwrap();
        assert_eq!(linked.4, "shared");
    }

    #[test]
    fn test_ignore_rules() {
        let dir = sample_project();
        write(dir.path(), ".sindriignore", "*.log\nsindri.json\nbuild/\n");
        write(dir.path(), "debug.log", "noise");
        write(dir.path(), "build/out.r1cs", "binary");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), "lib/.git/config", "nested");
        write(dir.path(), ".hidden", "kept");

        let files = collect_project_files(dir.path()).unwrap();
        assert_eq!(
            files,
            [
                ".hidden",
                ".sindriignore",
                "circuit.circom",
                "lib/a.circom",
                "lib/b.circom",
                "sindri.json",
            ]
        );
    }

    #[test]
    fn test_directory_manifest_errors() {
        let dir = tempdir().unwrap();
        let source = ProjectSource::Directory(dir.path().into());
        assert!(matches!(
            bundle_project(&source, &TarGzWriter),
            Err(Error::ManifestNotFound { .. })
        ));

        write(dir.path(), "sindri.json", "{not json");
        assert!(matches!(
            bundle_project(&source, &TarGzWriter),
            Err(Error::InvalidManifest { .. })
        ));

        write(dir.path(), "sindri.json", r#"{"name": 7}"#);
        assert!(matches!(
            bundle_project(&source, &TarGzWriter),
            Err(Error::MissingManifestName { .. })
        ));
    }

    #[test]
    fn test_archive_source() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("Project.TGZ");
        fs::write(&archive, b"opaque bytes").unwrap();

        let bundle = bundle_project(&ProjectSource::from_path(&archive).unwrap(), &TarGzWriter)
            .unwrap();
        assert_eq!(bundle.name, None);
        assert_eq!(bundle.filename, "Project.TGZ");
        assert_eq!(bundle.bytes, b"opaque bytes");

        let other = dir.path().join("project.rar");
        fs::write(&other, b"").unwrap();
        assert!(matches!(
            bundle_project(&ProjectSource::from_path(&other).unwrap(), &TarGzWriter),
            Err(Error::UnsupportedArchive { .. })
        ));

        assert!(matches!(
            ProjectSource::from_path(dir.path().join("missing.tar.gz")),
            Err(Error::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_in_memory_files() {
        let files = vec![
            ProjectFile::new("src/main.nr", "fn main() {}"),
            ProjectFile::new("sindri.json", r#"{"name": "noir-circuit"}"#),
            ProjectFile::new("Nargo.toml", "[package]"),
        ];
        let bundle = bundle_project(&files.into(), &TarGzWriter).unwrap();

        assert_eq!(bundle.name.as_deref(), Some("noir-circuit"));
        let paths = unpack(&bundle.bytes)
            .into_iter()
            .map(|entry| entry.0)
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            [
                "noir-circuit/Nargo.toml",
                "noir-circuit/sindri.json",
                "noir-circuit/src/main.nr",
            ]
        );
    }

    #[test]
    fn test_in_memory_file_errors() {
        let bundle = |files: Vec<ProjectFile>| bundle_project(&files.into(), &TarGzWriter);

        assert!(matches!(
            bundle(vec![ProjectFile::new("main.nr", "")]),
            Err(Error::ManifestNotFound { .. })
        ));
        assert!(matches!(
            bundle(vec![ProjectFile::new("sindri.json", "{}")]),
            Err(Error::MissingManifestName { .. })
        ));
        for name in ["", "/etc/passwd", "../escape", "a/../../b"] {
            assert!(
                matches!(
                    bundle(vec![ProjectFile::new(name, "")]),
                    Err(Error::InvalidProjectFile { .. })
                ),
                "{name:?}"
            );
        }
        assert!(matches!(
            bundle(vec![
                ProjectFile::new("sindri.json", r#"{"name": "x"}"#),
                ProjectFile::new("sindri.json", r#"{"name": "y"}"#),
            ]),
            Err(Error::InvalidProjectFile { reason: "duplicate file name", .. })
        ));
    }

    #[test]
    fn test_directory_manifest_name_is_case_insensitive() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Sindri.json", r#"{"name": "upper"}"#);
        write(dir.path(), ".sindriignore", "*.json\n");

        let bundle =
            bundle_project(&ProjectSource::Directory(dir.path().into()), &TarGzWriter).unwrap();
        assert_eq!(bundle.name.as_deref(), Some("upper"));
        let paths = unpack(&bundle.bytes)
            .into_iter()
            .map(|entry| entry.0)
            .collect::<Vec<_>>();
        assert_eq!(paths, ["upper/.sindriignore", "upper/Sindri.json"]);
    }

    #[test]
    fn test_find_manifest_searches_ancestors() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Sindri.JSON", r#"{"name": "x"}"#);
        write(dir.path(), "src/nested/file.txt", "");

        let found = find_manifest(&dir.path().join("src/nested")).unwrap();
        assert_eq!(found, dir.path().canonicalize().unwrap().join("Sindri.JSON"));

        let empty = tempdir().unwrap();
        // Only fails when no ancestor of the temp dir holds a manifest either.
        if let Some(found) = find_manifest(empty.path()) {
            assert!(!found.starts_with(empty.path().canonicalize().unwrap()));
        }
    }
}
