//! File-backed channel
//!
//! Blocks are written append-style, so the on-disk length always equals
//! the logical length. Nothing is preallocated and nothing needs
//! truncating at close.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::{Channel, ChannelFactory, Mode};

/// A block file opened through `std::fs::File`
#[derive(Debug)]
pub struct FileChannel {
    /// `None` once closed
    file: Option<File>,

    /// Path the channel was opened on (for diagnostics)
    path: PathBuf,

    /// Bytes written or read since open
    position: u64,
}

impl FileChannel {
    /// Create (or truncate) a block file for writing
    ///
    /// Missing parent directories are created.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self::from_file(file, path))
    }

    /// Open an existing block file for reading
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_file(file, path))
    }

    fn from_file(file: File, path: &Path) -> Self {
        Self {
            file: Some(file),
            path: path.to_path_buf(),
            position: 0,
        }
    }

    /// Path of the underlying block file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(closed_error(&self.path)),
        }
    }
}

impl Channel for FileChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file_mut()?.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.file_mut()?.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file_mut()?.sync_data()
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the File releases the descriptor
        self.file.take();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn size(&self) -> io::Result<u64> {
        match self.file.as_ref() {
            Some(file) => Ok(file.metadata()?.len()),
            None => Err(closed_error(&self.path)),
        }
    }

    fn position(&self) -> u64 {
        self.position
    }
}

fn closed_error(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("channel for {} is closed", path.display()),
    )
}

/// Default factory: plain files on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileChannelFactory;

impl ChannelFactory for FileChannelFactory {
    type Channel = FileChannel;

    fn open(&self, path: &Path, mode: Mode) -> io::Result<FileChannel> {
        match mode {
            Mode::Write => FileChannel::create(path),
            Mode::Read => FileChannel::open(path),
        }
    }

    fn discard(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
