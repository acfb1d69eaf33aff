//! Package I/O plumbing: magic tags, item sources, and temp storage for
//! the payload body.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::types::{PackageError, Result};

/// Where an item's plaintext comes from. File opens are deferred to write
/// time so a writer can be assembled without holding descriptors.
pub enum ItemSource {
    Memory(Vec<u8>),
    File(PathBuf),
    Reader(Box<dyn Read>),
}

impl ItemSource {
    pub fn open(self) -> Result<Box<dyn Read>> {
        Ok(match self {
            ItemSource::Memory(bytes) => Box::new(Cursor::new(bytes)),
            ItemSource::File(path) => Box::new(File::open(path)?),
            ItemSource::Reader(r) => r,
        })
    }
}

/// Temp storage the writer multiplexes into before the manifest (which
/// needs every item's tag and length) can be emitted.
pub enum TempStorage {
    Memory,
    File(PathBuf),
}

impl Default for TempStorage {
    fn default() -> Self {
        TempStorage::Memory
    }
}

/// Live temp sink: written during multiplexing, then replayed into the
/// output. File-backed temps are removed afterwards.
pub enum TempSink {
    Memory(Vec<u8>),
    File { file: File, path: PathBuf },
}

impl TempSink {
    pub fn open(storage: &TempStorage) -> Result<Self> {
        Ok(match storage {
            TempStorage::Memory => TempSink::Memory(Vec::new()),
            TempStorage::File(path) => TempSink::File {
                file: File::options()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?,
                path: path.clone(),
            },
        })
    }

    /// Replay the captured payload into `out`, then release the temp.
    pub fn replay<W: Write>(self, out: &mut W) -> Result<u64> {
        match self {
            TempSink::Memory(buf) => {
                out.write_all(&buf)?;
                Ok(buf.len() as u64)
            }
            TempSink::File { mut file, path } => {
                file.flush()?;
                file.seek(SeekFrom::Start(0))?;
                let copied = io::copy(&mut file, out)?;
                drop(file);
                let _ = std::fs::remove_file(&path);
                Ok(copied)
            }
        }
    }
}

impl Write for TempSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TempSink::Memory(v) => v.write(buf),
            TempSink::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TempSink::Memory(_) => Ok(()),
            TempSink::File { file, .. } => file.flush(),
        }
    }
}

pub fn write_magic<W: Write>(w: &mut W, tag: &[u8; 8]) -> Result<()> {
    w.write_all(tag)?;
    Ok(())
}

pub fn read_magic<R: Read>(r: &mut R, expected: &[u8; 8], what: &str) -> Result<()> {
    let mut tag = [0u8; 8];
    r.read_exact(&mut tag)
        .map_err(|_| PackageError::FormatInvalid(format!("missing package {}", what)))?;
    if &tag != expected {
        return Err(PackageError::FormatInvalid(format!(
            "bad package {}",
            what
        )));
    }
    Ok(())
}
