use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::collection::COLLECTION_FILENAME;
use crate::error::{ColvaultError, Result};

/// Stream `source` into `dest` as a single-entry archive. Returns the number
/// of bytes copied.
pub fn write_collection(source: &Path, dest: &File) -> Result<u64> {
    let input = File::open(source)
        .map_err(|e| ColvaultError::message(format!("open {}: {}", source.display(), e)))?;
    let size = input.metadata()?.len();
    let mut reader = BufReader::new(input);

    let mut writer = ZipWriter::new(BufWriter::new(dest));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(size >= u64::from(u32::MAX));
    writer.start_file(COLLECTION_FILENAME, options)?;
    let copied = io::copy(&mut reader, &mut writer)
        .map_err(|e| ColvaultError::message(format!("copy {}: {}", source.display(), e)))?;
    let mut buffered = writer.finish()?;
    buffered.flush()?;
    drop(buffered);
    dest.sync_all()?;
    Ok(copied)
}

/// Uncompressed size of the collection entry in `archive`.
pub fn entry_size(archive: &Path) -> Result<u64> {
    let file = File::open(archive)
        .map_err(|e| ColvaultError::message(format!("open {}: {}", archive.display(), e)))?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;
    let entry = zip.by_name(COLLECTION_FILENAME)?;
    Ok(entry.size())
}

/// Extract the collection entry of `archive` into `dest`.
pub fn extract_collection(archive: &Path, dest: &File) -> Result<u64> {
    let file = File::open(archive)
        .map_err(|e| ColvaultError::message(format!("open {}: {}", archive.display(), e)))?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;
    let mut entry = zip.by_name(COLLECTION_FILENAME)?;
    let mut writer = BufWriter::new(dest);
    let copied = io::copy(&mut entry, &mut writer)
        .map_err(|e| ColvaultError::message(format!("extract {}: {}", archive.display(), e)))?;
    writer.flush()?;
    drop(writer);
    dest.sync_all()?;
    Ok(copied)
}
