// File facade: stream-style file access with explicit EOF and error indicators
//
// Counts are returned from read/write the way a buffered stream reports them;
// a short count alone does not say whether the end of the file or an error
// stopped the transfer, `eof()` and `error()` do.
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    ReadOnly,
    #[default]
    ReadWriteExisting,
    /// Create or truncate
    ReadWriteNew,
}

impl AccessMode {
    /// Map an fopen-style mode string ("r", "r+", "w", "w+", optional "b").
    pub fn from_mode_str(mode: &str) -> Option<Self> {
        match mode.replace('b', "").as_str() {
            "r" => Some(AccessMode::ReadOnly),
            "r+" => Some(AccessMode::ReadWriteExisting),
            "w" | "w+" => Some(AccessMode::ReadWriteNew),
            _ => None,
        }
    }

    fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            AccessMode::ReadOnly => options.read(true),
            AccessMode::ReadWriteExisting => options.read(true).write(true),
            AccessMode::ReadWriteNew => options.read(true).write(true).create(true).truncate(true),
        };
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekOrigin {
    Start,
    End,
    #[default]
    Current,
}

#[derive(Debug)]
pub struct File {
    inner: fs::File,
    eof: bool,
    error: bool,
}

impl File {
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> io::Result<Self> {
        Ok(File {
            inner: mode.options().open(path)?,
            eof: false,
            error: false,
        })
    }

    /// Read up to `buf.len()` bytes. Stops early at end of file or on error.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.error {
            return 0;
        }
        let mut total = 0;
        while total < buf.len() {
            match self.inner.read(&mut buf[total..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    self.error = true;
                    break;
                }
            }
        }
        total
    }

    pub fn write(&mut self, buf: &[u8]) -> usize {
        if self.error {
            return 0;
        }
        let mut total = 0;
        while total < buf.len() {
            match self.inner.write(&buf[total..]) {
                Ok(0) => {
                    self.error = true;
                    break;
                }
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    self.error = true;
                    break;
                }
            }
        }
        total
    }

    /// Single byte, None at end of file or on error.
    pub fn getc(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte) {
            1 => Some(byte[0]),
            _ => None,
        }
    }

    /// Reposition; a successful seek clears the end-of-file indicator.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> io::Result<u64> {
        let target = match origin {
            SeekOrigin::Start => {
                let offset = u64::try_from(offset).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "negative offset from start")
                })?;
                SeekFrom::Start(offset)
            }
            SeekOrigin::End => SeekFrom::End(offset),
            SeekOrigin::Current => SeekFrom::Current(offset),
        };
        let pos = self.inner.seek(target)?;
        self.eof = false;
        Ok(pos)
    }

    pub fn tell(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn size(&self) -> io::Result<u64> {
        Ok(self.inner.metadata()?.len())
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn clear_error(&mut self) {
        self.eof = false;
        self.error = false;
    }
}

pub fn path_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

pub fn is_directory(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

/// Remove a file or an empty directory.
pub fn path_delete(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

pub fn path_move(from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
    fs::rename(from, to)
}

/// Fails when the directory already exists.
pub fn directory_create(path: impl AsRef<Path>) -> io::Result<()> {
    fs::create_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("wilc-fileops-{}-{}", std::process::id(), name));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(&path);
        path
    }

    #[test]
    fn mode_strings() {
        assert_eq!(AccessMode::from_mode_str("rb"), Some(AccessMode::ReadOnly));
        assert_eq!(AccessMode::from_mode_str("r+"), Some(AccessMode::ReadWriteExisting));
        assert_eq!(AccessMode::from_mode_str("w+b"), Some(AccessMode::ReadWriteNew));
        assert_eq!(AccessMode::from_mode_str("a"), None);
    }

    #[test]
    fn short_read_sets_eof_not_error() {
        let path = scratch("eof");
        let mut file = File::open(&path, AccessMode::ReadWriteNew).unwrap();
        assert_eq!(file.write(b"abc"), 3);
        file.flush().unwrap();
        assert_eq!(file.tell().unwrap(), 3);
        assert_eq!(file.size().unwrap(), 3);

        file.seek(0, SeekOrigin::Start).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf), 3);
        assert!(file.eof());
        assert!(!file.error());

        file.seek(-1, SeekOrigin::End).unwrap();
        assert!(!file.eof());
        assert_eq!(file.getc(), Some(b'c'));
        assert_eq!(file.getc(), None);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_on_read_only_sets_error_until_cleared() {
        let path = scratch("ro");
        fs::write(&path, b"data").unwrap();
        let mut file = File::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(file.write(b"x"), 0);
        assert!(file.error());

        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf), 0);
        file.clear_error();
        assert_eq!(file.read(&mut buf), 4);
        assert_eq!(&buf, b"data");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn seek_from_start_rejects_negative_offsets() {
        let path = scratch("seek");
        let mut file = File::open(&path, AccessMode::ReadWriteNew).unwrap();
        assert!(file.seek(-1, SeekOrigin::Start).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn existing_mode_requires_the_file() {
        let path = scratch("missing");
        assert!(File::open(&path, AccessMode::ReadWriteExisting).is_err());
    }

    #[test]
    fn path_helpers() {
        let dir = scratch("dir");
        directory_create(&dir).unwrap();
        assert!(directory_create(&dir).is_err());
        assert!(is_directory(&dir));

        let file = dir.join("a");
        let moved = dir.join("b");
        fs::write(&file, b"1").unwrap();
        path_move(&file, &moved).unwrap();
        assert!(!path_exists(&file));
        assert!(path_exists(&moved));

        path_delete(&moved).unwrap();
        path_delete(&dir).unwrap();
        assert!(!path_exists(&dir));
    }
}
