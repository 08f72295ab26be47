use std::io::{Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::{ParseSource, Result, SpmError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Streams tar(.gz) archives held entirely in memory; gzip is detected by
/// magic bytes so a caller never needs to know ahead of time whether a
/// tarball arrived compressed.
pub struct ArchiveReader;

impl ArchiveReader {
    /// Extracts the single entry named `filename` after stripping `strip_n`
    /// leading path components from every entry's header name. Every entry's
    /// data stream is consumed even when it isn't a match, so the underlying
    /// decoder can advance past it.
    pub fn read_one_file(buf: &[u8], filename: &str, strip_n: usize) -> Result<Vec<u8>> {
        let mut archive = Archive::new(open(buf)?);
        let entries = archive.entries().map_err(|e| SpmError::Parse {
            context: "tar entries".to_string(),
            source: ParseSource::Io(e),
        })?;

        for entry in entries {
            let mut entry = entry.map_err(|e| SpmError::Parse {
                context: "tar entry".to_string(),
                source: ParseSource::Io(e),
            })?;

            let header_name = entry
                .path()
                .map_err(|e| SpmError::Parse {
                    context: "tar entry path".to_string(),
                    source: ParseSource::Io(e),
                })?
                .to_string_lossy()
                .into_owned();

            let stripped = strip_path(&header_name, strip_n);

            match stripped {
                Some(name) if name == filename => {
                    let mut contents = Vec::new();
                    entry.read_to_end(&mut contents).map_err(|e| SpmError::Parse {
                        context: filename.to_string(),
                        source: ParseSource::Io(e),
                    })?;
                    return Ok(contents);
                }
                _ => {
                    // Drain the entry so the reader position advances even
                    // when this entry isn't the one we want.
                    let mut sink = std::io::sink();
                    std::io::copy(&mut entry, &mut sink).ok();
                }
            }
        }

        Err(SpmError::NotFoundInArchive {
            file: filename.to_string(),
        })
    }

    /// Writes every entry under `target_dir`, applying the same path-stripping
    /// transform to the header name. Entries whose stripped name is empty are
    /// skipped silently.
    pub fn extract_all(buf: &[u8], target_dir: &Path, strip_n: usize) -> Result<()> {
        let mut archive = Archive::new(open(buf)?);
        let entries = archive.entries().map_err(|e| SpmError::Parse {
            context: "tar entries".to_string(),
            source: ParseSource::Io(e),
        })?;

        for entry in entries {
            let mut entry = entry.map_err(|e| SpmError::Parse {
                context: "tar entry".to_string(),
                source: ParseSource::Io(e),
            })?;

            let header_name = entry
                .path()
                .map_err(|e| SpmError::Parse {
                    context: "tar entry path".to_string(),
                    source: ParseSource::Io(e),
                })?
                .to_string_lossy()
                .into_owned();

            let stripped = match strip_path(&header_name, strip_n) {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };

            let dest = target_dir.join(&stripped);

            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SpmError::io(parent, e))?;
            }

            entry.unpack(&dest).map_err(|e| SpmError::io(dest.clone(), e))?;
        }

        Ok(())
    }
}

/// Wraps `buf` in a gzip decoder when its magic bytes say it's compressed,
/// otherwise passes the bytes through unchanged.
fn open(buf: &[u8]) -> Result<Box<dyn Read + Send>> {
    if buf.len() >= 2 && buf[0..2] == GZIP_MAGIC {
        Ok(Box::new(GzDecoder::new(Cursor::new(buf.to_vec()))))
    } else {
        Ok(Box::new(Cursor::new(buf.to_vec())))
    }
}

/// Removes leading slashes, then removes exactly the first `strip_n`
/// `/`-delimited components. Returns `None` when fewer than `strip_n`
/// components exist (the entry is considered unmatched/skipped).
fn strip_path(header_name: &str, strip_n: usize) -> Option<String> {
    let trimmed = header_name.trim_start_matches('/');
    let mut components: Vec<&str> = trimmed.split('/').collect();

    if components.len() < strip_n {
        return None;
    }

    components.drain(0..strip_n);
    Some(components.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tar::{Builder, Header};

    fn build_tarball(entries: &[(&str, &[u8])], gzip: bool) -> Vec<u8> {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_bytes);
            for (name, data) in entries {
                let mut header = Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, *data).unwrap();
            }
            builder.finish().unwrap();
        }

        if gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&tar_bytes).unwrap();
            encoder.finish().unwrap()
        } else {
            tar_bytes
        }
    }

    #[test]
    fn strips_leading_package_component() {
        assert_eq!(strip_path("package/package.json", 1).as_deref(), Some("package.json"));
    }

    #[test]
    fn strip_n_zero_keeps_name() {
        assert_eq!(strip_path("a/b.txt", 0).as_deref(), Some("a/b.txt"));
    }

    #[test]
    fn exact_component_count_yields_empty_string() {
        assert_eq!(strip_path("package", 1).as_deref(), Some(""));
    }

    #[test]
    fn too_few_components_is_unmatched() {
        assert_eq!(strip_path("package", 2), None);
    }

    #[test]
    fn read_one_file_finds_entry_in_gzipped_archive() {
        let tarball = build_tarball(
            &[("package/package.json", b"{\"name\":\"a\"}"), ("package/index.js", b"x")],
            true,
        );
        let found = ArchiveReader::read_one_file(&tarball, "package.json", 1).unwrap();
        assert_eq!(found, b"{\"name\":\"a\"}");
    }

    #[test]
    fn read_one_file_passes_through_uncompressed() {
        let tarball = build_tarball(&[("package/package.json", b"{}")], false);
        let found = ArchiveReader::read_one_file(&tarball, "package.json", 1).unwrap();
        assert_eq!(found, b"{}");
    }

    #[test]
    fn read_one_file_not_found_is_distinguishable() {
        let tarball = build_tarball(&[("package/index.js", b"x")], true);
        let err = ArchiveReader::read_one_file(&tarball, "package.json", 1).unwrap_err();
        assert!(matches!(err, SpmError::NotFoundInArchive { file } if file == "package.json"));
    }

    #[test]
    fn extract_all_round_trips_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = build_tarball(
            &[("a.txt", b"hello"), ("nested/b.txt", b"world")],
            true,
        );
        ArchiveReader::extract_all(&tarball, dir.path(), 0).unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hello");
        assert_eq!(std::fs::read(dir.path().join("nested/b.txt")).unwrap(), b"world");
    }

    #[test]
    fn extract_all_skips_entries_with_empty_stripped_name() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = build_tarball(&[("package", b""), ("package/file.txt", b"x")], true);
        ArchiveReader::extract_all(&tarball, dir.path(), 1).unwrap();

        assert_eq!(std::fs::read(dir.path().join("file.txt")).unwrap(), b"x");
    }
}
