use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use tracing::debug;

pub const CACHE_DIR_NAME: &str = "fbview";

/// Longest record read back from disk.
const MAX_RECORD_LEN: u64 = 16;

/// The last page read for one document, kept as a bare decimal number.
#[derive(Debug, Clone)]
pub struct PageCache {
    path: PathBuf,
}

impl PageCache {
    /// Cache for `document` under the current user's home directory.
    pub fn for_document(document: &Path) -> Result<Self> {
        let dirs = BaseDirs::new().ok_or_else(|| anyhow!("unable to resolve home directory"))?;
        Self::under_home(dirs.home_dir(), document)
    }

    /// Cache file `<home>/.cache/fbview/<stem>`; creates the directory.
    pub fn under_home(home: &Path, document: &Path) -> Result<Self> {
        let path = derive_path(home, document)
            .ok_or_else(|| anyhow!("cannot derive cache name from {:?}", document))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create cache directory {:?}", dir))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored page, or `None` when nothing usable was recorded.
    pub fn load(&self) -> Result<Option<usize>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open {:?}", self.path))
            }
        };
        let mut buf = Vec::new();
        file.take(MAX_RECORD_LEN)
            .read_to_end(&mut buf)
            .with_context(|| format!("failed to read {:?}", self.path))?;
        let page = parse_page(&buf);
        debug!(path = %self.path.display(), ?page, "loaded page cache");
        Ok(page)
    }

    /// Replaces the record with `page` and syncs it to disk.
    pub fn store(&self, page: usize) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {:?} for writing", self.path))?;
        write!(file, "{page}").with_context(|| format!("failed to write {:?}", self.path))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {:?}", self.path))?;
        debug!(path = %self.path.display(), page, "stored page cache");
        Ok(())
    }
}

pub fn derive_path(home: &Path, document: &Path) -> Option<PathBuf> {
    let stem = document.file_stem()?;
    Some(home.join(".cache").join(CACHE_DIR_NAME).join(stem))
}

/// Leading decimal digits of the record; zero counts as absent.
fn parse_page(buf: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(buf).ok()?.trim_start();
    let digits = text
        .find(|c: char| !c.is_ascii_digit())
        .map_or(text, |end| &text[..end]);
    digits.parse().ok().filter(|&page: &usize| page != 0)
}
