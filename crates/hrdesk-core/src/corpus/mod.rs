//! Policy corpus loading.
//!
//! [`CorpusLoader::open`] validates the corpus directory up front and lists
//! its `.txt` files (non-recursive, sorted by name so chunk ids are
//! reproducible). [`CorpusLoader::chunks`] then reads one file at a time
//! and yields its chunks lazily.

mod splitter;

pub use splitter::{SentenceSplitter, TextChunk};

use crate::config::CORPUS_FILE_EXTENSION;
use crate::error::CorpusError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A chunk together with the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusChunk {
    pub text: String,
    /// File name relative to the corpus directory
    pub source_file: String,
}

/// Lists and reads the policy corpus.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    dir: PathBuf,
    files: Vec<PathBuf>,
    splitter: SentenceSplitter,
}

impl CorpusLoader {
    /// Lists the corpus directory.
    ///
    /// # Errors
    ///
    /// Fails fast when the directory is missing, is not a directory, or
    /// cannot be listed. A directory without `.txt` files is not an error.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CorpusError> {
        Self::with_splitter(dir, SentenceSplitter::default())
    }

    pub fn with_splitter(
        dir: impl AsRef<Path>,
        splitter: SentenceSplitter,
    ) -> Result<Self, CorpusError> {
        let dir = dir.as_ref().to_path_buf();
        let dir_label = dir.display().to_string();

        let metadata = std::fs::metadata(&dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CorpusError::DirectoryNotFound(dir_label.clone()),
            _ => CorpusError::DirectoryRead {
                path: dir_label.clone(),
                source: e,
            },
        })?;
        if !metadata.is_dir() {
            return Err(CorpusError::NotADirectory(dir_label));
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| CorpusError::DirectoryRead {
            path: dir_label.clone(),
            source: e,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CorpusError::DirectoryRead {
                path: dir_label.clone(),
                source: e,
            })?;
            let path = entry.path();
            let is_txt = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == CORPUS_FILE_EXTENSION);
            if is_txt && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        info!(dir = %dir_label, files = files.len(), "Opened policy corpus");

        Ok(Self {
            dir,
            files,
            splitter,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Corpus files in the order they are read.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Lazily reads every file and yields its chunks in order.
    ///
    /// A file that can't be read (permissions, invalid UTF-8) yields one
    /// `Err` in its place.
    pub fn chunks(&self) -> CorpusChunks<'_> {
        CorpusChunks {
            loader: self,
            next_file: 0,
            pending: Vec::new().into_iter(),
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<CorpusChunk>, CorpusError> {
        let text = std::fs::read_to_string(path).map_err(|e| CorpusError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        let source_file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let chunks: Vec<CorpusChunk> = self
            .splitter
            .split(&text)
            .into_iter()
            .map(|chunk| CorpusChunk {
                text: chunk.text,
                source_file: source_file.clone(),
            })
            .collect();

        debug!(file = %source_file, chunks = chunks.len(), "Split corpus file");
        Ok(chunks)
    }
}

/// Iterator returned by [`CorpusLoader::chunks`].
pub struct CorpusChunks<'a> {
    loader: &'a CorpusLoader,
    next_file: usize,
    pending: std::vec::IntoIter<CorpusChunk>,
}

impl Iterator for CorpusChunks<'_> {
    type Item = Result<CorpusChunk, CorpusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.pending.next() {
                return Some(Ok(chunk));
            }

            let path = self.loader.files.get(self.next_file)?;
            self.next_file += 1;

            match self.loader.read_file(path) {
                Ok(chunks) => self.pending = chunks.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
