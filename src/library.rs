//! Persisted unit store.
//!
//! Lowered units are serialized into a small binary container -- magic,
//! format version, payload length, bincode payload -- and served back on
//! demand during evaluation. A library maps to a directory and a unit to a
//! `<name>.rcu` file inside it; package bodies live next to their package
//! under the `-body` suffix.
//!
//! # File format
//!
//! ```text
//! +-------------------+
//! | Magic (4 bytes)   |  "RCEV"
//! +-------------------+
//! | Version (4 bytes) |  u32 little-endian format version
//! +-------------------+
//! | Length (4 bytes)  |  u32 little-endian payload length
//! +-------------------+
//! | Payload (N bytes) |  bincode-serialized unit
//! +-------------------+
//! ```

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ir::Unit;

/// Magic bytes identifying a serialized unit file.
pub const MAGIC: &[u8; 4] = b"RCEV";

/// Current container format version.
pub const VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a serialized unit file (bad magic)")]
    InvalidMagic,
    #[error("unsupported unit format version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),
    #[error("truncated unit file")]
    Truncated,
    #[error("corrupt unit file: {0}")]
    Corrupt(String),
}

/// Serves persisted units on demand. Implementations must be idempotent:
/// the evaluator may request the same unit more than once across folds.
pub trait UnitLibrary {
    /// Load `unit` from `lib`, or `Ok(None)` when it does not exist there.
    fn load(&self, lib: &str, unit: &str) -> Result<Option<Unit>, LibraryError>;
}

/// Split a fully-qualified unit name into library and unit parts at the
/// first dot: `"work.pkg.f"` names unit `"pkg.f"` in library `"work"`.
pub fn split_name(name: &str) -> Option<(&str, &str)> {
    let (lib, unit) = name.split_once('.')?;
    if lib.is_empty() || unit.is_empty() {
        return None;
    }
    Some((lib, unit))
}

/// Serialize a unit into its container format.
pub fn write_unit(unit: &Unit, writer: &mut impl Write) -> Result<(), LibraryError> {
    let payload =
        bincode::serialize(unit).map_err(|e| LibraryError::Corrupt(e.to_string()))?;
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    Ok(())
}

/// Deserialize a unit from its container format.
pub fn read_unit(reader: &mut impl Read) -> Result<Unit, LibraryError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(map_eof)?;
    if &magic != MAGIC {
        return Err(LibraryError::InvalidMagic);
    }

    let mut word = [0u8; 4];
    reader.read_exact(&mut word).map_err(map_eof)?;
    let version = u32::from_le_bytes(word);
    if version != VERSION {
        return Err(LibraryError::UnsupportedVersion(version));
    }

    reader.read_exact(&mut word).map_err(map_eof)?;
    let length = u32::from_le_bytes(word) as usize;
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).map_err(map_eof)?;

    bincode::deserialize(&payload).map_err(|e| LibraryError::Corrupt(e.to_string()))
}

fn map_eof(err: std::io::Error) -> LibraryError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        LibraryError::Truncated
    } else {
        LibraryError::Io(err)
    }
}

/// File-backed unit library rooted at a directory of per-library
/// subdirectories.
#[derive(Debug)]
pub struct FileLibrary {
    root: PathBuf,
}

impl FileLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn unit_path(&self, lib: &str, unit: &str) -> PathBuf {
        self.root.join(lib).join(format!("{}.rcu", unit))
    }

    /// Persist `unit` under this library, creating the library directory if
    /// needed. The on-disk name is derived from the unit's qualified name.
    pub fn store(&self, unit: &Unit) -> Result<(), LibraryError> {
        let (lib, unit_name) = split_name(&unit.name)
            .ok_or_else(|| LibraryError::Corrupt(format!("unqualified unit name {}", unit.name)))?;
        let dir = self.root.join(lib);
        std::fs::create_dir_all(&dir)?;
        let mut file = File::create(self.unit_path(lib, unit_name))?;
        write_unit(unit, &mut file)
    }
}

impl UnitLibrary for FileLibrary {
    fn load(&self, lib: &str, unit: &str) -> Result<Option<Unit>, LibraryError> {
        let path = self.unit_path(lib, unit);
        if !Path::new(&path).exists() {
            return Ok(None);
        }
        let mut file = File::open(path)?;
        read_unit(&mut file).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::build::UnitBuilder;
    use crate::ir::Op;
    use crate::types::Type;

    fn sample_unit() -> Unit {
        let mut b = UnitBuilder::function("work.f", false).result(Type::universal_int());
        let r = b.const_int(42);
        b.push(Op::Return { src: Some(r) });
        b.finish()
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("work.f"), Some(("work", "f")));
        assert_eq!(split_name("work.pkg.f"), Some(("work", "pkg.f")));
        assert_eq!(split_name("unqualified"), None);
        assert_eq!(split_name(".f"), None);
        assert_eq!(split_name("work."), None);
    }

    #[test]
    fn test_container_round_trip() {
        let unit = sample_unit();
        let mut buf = Vec::new();
        write_unit(&unit, &mut buf).unwrap();
        assert_eq!(&buf[0..4], MAGIC);
        let loaded = read_unit(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded, unit);
    }

    #[test]
    fn test_read_rejects_bad_magic() {
        let mut buf = Vec::new();
        write_unit(&sample_unit(), &mut buf).unwrap();
        buf[0] = b'X';
        assert!(matches!(
            read_unit(&mut buf.as_slice()),
            Err(LibraryError::InvalidMagic)
        ));
    }

    #[test]
    fn test_read_rejects_future_version() {
        let mut buf = Vec::new();
        write_unit(&sample_unit(), &mut buf).unwrap();
        buf[4..8].copy_from_slice(&(VERSION + 1).to_le_bytes());
        assert!(matches!(
            read_unit(&mut buf.as_slice()),
            Err(LibraryError::UnsupportedVersion(v)) if v == VERSION + 1
        ));
    }

    #[test]
    fn test_read_rejects_truncated_file() {
        let mut buf = Vec::new();
        write_unit(&sample_unit(), &mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(matches!(
            read_unit(&mut buf.as_slice()),
            Err(LibraryError::Truncated)
        ));
    }

    #[test]
    fn test_file_library_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let library = FileLibrary::new(dir.path());
        library.store(&sample_unit()).unwrap();
        let loaded = library.load("work", "f").unwrap().unwrap();
        assert_eq!(loaded.name, "work.f");
        assert_eq!(library.load("work", "missing").unwrap(), None);
        assert_eq!(library.load("other", "f").unwrap(), None);
    }
}
