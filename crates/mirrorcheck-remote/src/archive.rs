use crate::RemoteError;
use std::borrow::Cow;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Local file header signature every zip archive starts with.
pub const ZIP_MAGIC: &[u8] = b"PK";

pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// One file read out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub contents: Vec<u8>,
}

impl ArchiveEntry {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }
}

fn open(data: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, RemoteError> {
    if !is_zip(data) {
        return Err(RemoteError::NotAZipArchive);
    }
    ZipArchive::new(Cursor::new(data)).map_err(|e| RemoteError::CorruptArchive(e.to_string()))
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
) -> Result<ArchiveEntry, RemoteError> {
    let mut file = archive
        .by_index(index)
        .map_err(|e| RemoteError::CorruptArchive(e.to_string()))?;
    let name = file.name().to_owned();
    let mut contents = Vec::new();
    // Reading to the end verifies the entry CRC.
    file.read_to_end(&mut contents)
        .map_err(|e| RemoteError::CorruptArchive(format!("{name}: {e}")))?;
    Ok(ArchiveEntry { name, contents })
}

/// Read every entry of an in-memory archive, in archive order.
pub fn read_entries(data: &[u8]) -> Result<Vec<ArchiveEntry>, RemoteError> {
    let mut archive = open(data)?;
    (0..archive.len())
        .map(|i| read_entry(&mut archive, i))
        .collect()
}

/// Read the only entry of an archive; any other entry count is an error.
pub fn single_entry(data: &[u8]) -> Result<ArchiveEntry, RemoteError> {
    let mut archive = open(data)?;
    let count = archive.len();
    if count != 1 {
        return Err(RemoteError::ArchiveContainsUnexpectedFileCount { count });
    }
    read_entry(&mut archive, 0)
}

/// Extract the manifest text of a single-entry archive whose entry must be
/// named `expected_name`.
pub fn manifest_text_from_archive(data: &[u8], expected_name: &str) -> Result<String, RemoteError> {
    let entry = single_entry(data)?;
    if entry.name != expected_name {
        return Err(RemoteError::UnexpectedArchiveEntry {
            expected: expected_name.to_owned(),
            actual: entry.name,
        });
    }
    Ok(entry.text().into_owned())
}

fn write_entries<W: Write + Seek>(
    writer: W,
    entries: &[(&str, &[u8])],
) -> Result<W, RemoteError> {
    let mut zip = ZipWriter::new(writer);
    for (name, contents) in entries {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(*name, options)
            .map_err(|e| RemoteError::CorruptArchive(e.to_string()))?;
        zip.write_all(contents)?;
    }
    zip.finish()
        .map_err(|e| RemoteError::CorruptArchive(e.to_string()))
}

/// Build a deflated archive in memory.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Result<Vec<u8>, RemoteError> {
    Ok(write_entries(Cursor::new(Vec::new()), entries)?.into_inner())
}

/// Write a deflated archive holding one file to `path`; returns the archive size.
pub fn write_single_file_zip(
    path: &Path,
    entry_name: &str,
    contents: &[u8],
) -> Result<u64, RemoteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let file = write_entries(file, &[(entry_name, contents)])?;
    Ok(file.metadata()?.len())
}
