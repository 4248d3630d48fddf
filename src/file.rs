use crate::document::{Document, WriteOptions};
use crate::error::{Error, Result};
use crate::operator::ConfigOperator;
use std::path::{Path, PathBuf};
use tracing::info;

/// A configuration file, parsed once when opened.
///
/// Changes made through [`ConfigFile::operator`] stay in memory until
/// [`ConfigFile::save`] writes them back. The file is never reloaded.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    document: Document,
    write_opts: WriteOptions,
}

impl ConfigFile {
    /// # Errors
    ///
    /// - [`Error::NotAFile`]: `path` does not point to a regular file.
    /// - Any error of [`Document::parse_file`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ConfigFile> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }
        let document = Document::parse_file(path)?;
        info!(path = %path.display(), "opened config file");
        Ok(ConfigFile {
            path: path.to_path_buf(),
            document,
            write_opts: WriteOptions::default(),
        })
    }

    /// Options used by [`ConfigFile::save`] and [`ConfigFile::save_as`].
    pub fn with_write_opts(mut self, opts: WriteOptions) -> ConfigFile {
        self.write_opts = opts;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn operator(&mut self) -> ConfigOperator<'_> {
        self.document.operator()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Write the document back to the file it was opened from.
    ///
    /// # Errors
    ///
    /// - [`Error::Persist`]
    pub fn save(&self) -> Result<()> {
        self.document.save_with_opts(&self.path, &self.write_opts)
    }

    /// Write the document to `dest`. Later saves still go to the original path.
    ///
    /// # Errors
    ///
    /// - [`Error::Persist`]
    pub fn save_as<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        self.document.save_with_opts(dest, &self.write_opts)
    }
}
