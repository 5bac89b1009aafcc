use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rdfo_crypto::{Checksum, ChecksumAlgorithm};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::backend::ByteStore;
use crate::error::{StoreError, StoreResult};

/// Marker file written at the root of every store directory.
pub const STORE_MARKER: &str = "rdfo_store_version0_1";

const PAIRTREE_ROOT: &str = "pairtree_root";
const OBJECT_DIR: &str = "obj";
const HIGH_WATER_FILE: &str = ".high_water";
const WRITE_CHUNK: usize = 64 * 1024;

/// Directory-tree byte store.
///
/// Layout:
///
/// ```text
/// <root>/rdfo_store_version0_1
/// <root>/pairtree_root/<c1>/<c2>/.../obj/<part>/<part><prefix><n>
/// ```
///
/// Object ids are cleaned (`/` to `=`, `:` to `+`, `.` to `,`, other
/// unsafe bytes to `^hh`) and split into chunks of `shorty_length`
/// characters. Streams are written to a temporary file in the part
/// directory and renamed into place, so readers see whole streams or
/// nothing.
pub struct FsByteStore {
    root: PathBuf,
    shorty_length: usize,
    algorithm: ChecksumAlgorithm,
}

impl FsByteStore {
    /// Open the store at `root`, initializing it if the directory is
    /// missing or empty.
    ///
    /// A non-empty directory without the store marker is refused with
    /// `NotAStore`.
    pub fn open(
        root: impl Into<PathBuf>,
        shorty_length: usize,
        algorithm: ChecksumAlgorithm,
    ) -> StoreResult<Self> {
        if !(1..=2).contains(&shorty_length) {
            return Err(StoreError::InvalidConfig(format!(
                "shorty_length must be 1 or 2, got {shorty_length}"
            )));
        }
        let root = root.into();
        if !root.join(STORE_MARKER).is_file() {
            if root.exists() {
                if !root.is_dir() || fs::read_dir(&root)?.next().is_some() {
                    return Err(StoreError::NotAStore(root));
                }
            } else {
                fs::create_dir_all(&root)?;
            }
            fs::write(root.join(STORE_MARKER), b"rdfo store 0.1\n")?;
            info!(root = %root.display(), "initialized store directory");
        }
        fs::create_dir_all(root.join(PAIRTREE_ROOT))?;
        Ok(Self {
            root,
            shorty_length,
            algorithm,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shorty_length(&self) -> usize {
        self.shorty_length
    }

    fn pairtree_root(&self) -> PathBuf {
        self.root.join(PAIRTREE_ROOT)
    }

    /// Directory holding the parts of `object_id`.
    pub fn object_dir(&self, object_id: &str) -> PathBuf {
        let encoded = encode_id(object_id);
        let mut path = self.pairtree_root();
        // The cleaned id is ASCII, so byte chunks are char chunks.
        for chunk in encoded.as_bytes().chunks(self.shorty_length) {
            path.push(String::from_utf8_lossy(chunk).as_ref());
        }
        path.push(OBJECT_DIR);
        path
    }

    fn existing_object_dir(&self, object_id: &str) -> StoreResult<PathBuf> {
        let dir = self.object_dir(object_id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::ObjectNotFound(object_id.to_string()))
        }
    }

    fn existing_part_dir(&self, object_id: &str, part_id: &str) -> StoreResult<PathBuf> {
        let dir = self.existing_object_dir(object_id)?.join(part_id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::PartNotFound {
                object_id: object_id.to_string(),
                part_id: part_id.to_string(),
            })
        }
    }

    /// Remove empty chunk directories left behind by a deleted object.
    fn prune_empty_parents(&self, from: &Path) -> io::Result<()> {
        let stop = self.pairtree_root();
        let mut current = from.parent();
        while let Some(dir) = current {
            if dir == stop || !dir.starts_with(&stop) {
                break;
            }
            if fs::read_dir(dir)?.next().is_some() {
                break;
            }
            fs::remove_dir(dir)?;
            current = dir.parent();
        }
        Ok(())
    }

    fn write_atomically(
        &self,
        dir: &Path,
        name: &str,
        bytes: &[u8],
    ) -> StoreResult<Checksum> {
        let mut hasher = self.algorithm.hasher();
        let mut tmp = tempfile::Builder::new().prefix(".tmp").tempfile_in(dir)?;
        for chunk in bytes.chunks(WRITE_CHUNK) {
            hasher.update(chunk);
            tmp.write_all(chunk)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(dir.join(name)).map_err(|e| StoreError::Io(e.error))?;
        Ok(hasher.finalize())
    }
}

fn stream_not_found(object_id: &str, part_id: &str, name: &str) -> StoreError {
    StoreError::StreamNotFound {
        object_id: object_id.to_string(),
        part_id: part_id.to_string(),
        name: name.to_string(),
    }
}

fn sorted_names(dir: &Path, want_dirs: bool) -> StoreResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() != want_dirs {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if name.starts_with('.') => {}
            Ok(name) => names.push(name),
            Err(raw) => warn!(path = ?raw, "skipping non-UTF-8 entry"),
        }
    }
    names.sort();
    Ok(names)
}

impl ByteStore for FsByteStore {
    fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    fn exists(&self, object_id: &str) -> StoreResult<bool> {
        Ok(self.object_dir(object_id).is_dir())
    }

    fn create_object(&self, object_id: &str) -> StoreResult<()> {
        let dir = self.object_dir(object_id);
        if dir.is_dir() {
            return Err(StoreError::ObjectAlreadyExists(object_id.to_string()));
        }
        fs::create_dir_all(&dir)?;
        debug!(object_id, path = %dir.display(), "created object directory");
        Ok(())
    }

    fn delete_object(&self, object_id: &str) -> StoreResult<()> {
        let dir = self.existing_object_dir(object_id)?;
        fs::remove_dir_all(&dir)?;
        self.prune_empty_parents(&dir)?;
        debug!(object_id, "removed object directory");
        Ok(())
    }

    fn put_stream(
        &self,
        object_id: &str,
        part_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> StoreResult<Checksum> {
        let part_dir = self.existing_object_dir(object_id)?.join(part_id);
        fs::create_dir_all(&part_dir)?;
        self.write_atomically(&part_dir, name, bytes)
    }

    fn get_stream(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<Vec<u8>> {
        let path = self.existing_object_dir(object_id)?.join(part_id).join(name);
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => stream_not_found(object_id, part_id, name),
            _ => StoreError::Io(e),
        })
    }

    fn stream_exists(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<bool> {
        Ok(self.object_dir(object_id).join(part_id).join(name).is_file())
    }

    fn delete_stream(&self, object_id: &str, part_id: &str, name: &str) -> StoreResult<()> {
        let path = self.existing_object_dir(object_id)?.join(part_id).join(name);
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => stream_not_found(object_id, part_id, name),
            _ => StoreError::Io(e),
        })
    }

    fn delete_part(&self, object_id: &str, part_id: &str) -> StoreResult<()> {
        let dir = self.existing_part_dir(object_id, part_id)?;
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    fn list_parts(&self, object_id: &str) -> StoreResult<Vec<String>> {
        sorted_names(&self.existing_object_dir(object_id)?, true)
    }

    fn list_part_versions(&self, object_id: &str, part_id: &str) -> StoreResult<Vec<String>> {
        sorted_names(&self.existing_part_dir(object_id, part_id)?, false)
    }

    fn list_ids(&self) -> StoreResult<Vec<String>> {
        let base = self.pairtree_root();
        let mut ids = Vec::new();
        let mut walker = WalkDir::new(&base).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_dir() || entry.file_name() != OBJECT_DIR {
                continue;
            }
            walker.skip_current_dir();
            let Some(rel) = entry.path().parent().and_then(|p| p.strip_prefix(&base).ok()) else {
                continue;
            };
            let encoded: String = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            match decode_id(&encoded) {
                Some(id) => ids.push(id),
                None => warn!(path = %entry.path().display(), "skipping undecodable object path"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn high_water(&self, object_id: &str, part_id: &str) -> StoreResult<u32> {
        let path = self.object_dir(object_id).join(part_id).join(HIGH_WATER_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        match text.trim().parse() {
            Ok(v) => Ok(v),
            Err(_) => {
                warn!(path = %path.display(), "ignoring corrupt version high-water mark");
                Ok(0)
            }
        }
    }

    fn set_high_water(&self, object_id: &str, part_id: &str, version: u32) -> StoreResult<()> {
        let current = self.high_water(object_id, part_id)?;
        if version <= current {
            return Ok(());
        }
        let part_dir = self.existing_object_dir(object_id)?.join(part_id);
        fs::create_dir_all(&part_dir)?;
        self.write_atomically(&part_dir, HIGH_WATER_FILE, version.to_string().as_bytes())?;
        Ok(())
    }
}

impl std::fmt::Debug for FsByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsByteStore")
            .field("root", &self.root)
            .field("shorty_length", &self.shorty_length)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Clean an object id into a single path-safe token.
pub fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b'/' => out.push('='),
            b':' => out.push('+'),
            b'.' => out.push(','),
            b'"' | b'*' | b'+' | b',' | b'<' | b'=' | b'>' | b'?' | b'\\' | b'^' | b'|' => {
                out.push_str(&format!("^{b:02x}"))
            }
            0x21..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("^{b:02x}")),
        }
    }
    out
}

/// Inverse of [`encode_id`]. `None` for malformed escapes or non-UTF-8.
pub fn decode_id(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'=' => out.push(b'/'),
            b'+' => out.push(b':'),
            b',' => out.push(b'.'),
            b'^' => {
                let hex = encoded.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}
