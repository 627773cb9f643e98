//! Binary backend

use crate::buffer::Entry;
use crate::error::Result;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

/// Write each chunk at its offset, or at the end when it has none
///
/// The file stays open for the whole flush.
pub fn flush<I>(path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = Entry>,
{
    let chunks: Vec<(Vec<u8>, Option<u64>)> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Bytes { data, seek } => Some((data, seek)),
            other => {
                log::trace!("binary output ignores {:?}", other);
                None
            }
        })
        .collect();
    if chunks.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    for (data, seek) in chunks {
        match seek {
            Some(offset) => file.seek(SeekFrom::Start(offset))?,
            None => file.seek(SeekFrom::End(0))?,
        };
        file.write_all(&data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        let entries = vec![
            Entry::Bytes {
                data: b"hello".to_vec(),
                seek: None,
            },
            Entry::Bytes {
                data: b" world".to_vec(),
                seek: None,
            },
            Entry::Bytes {
                data: b"J".to_vec(),
                seek: Some(0),
            },
        ];
        flush(&path, entries).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"Jello world");
    }
}
