//! Training/test set sources: `subjectID imagePath` manifests and
//! per-subject directory databases.

use crate::face::{FaceError, FaceImage};
use crate::types::{SubjectId, UNKNOWN_SUBJECT};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {reason}")]
    Malformed {
        path: String,
        line: usize,
        reason: String,
    },
    #[error(transparent)]
    Face(#[from] FaceError),
}

/// One `(subject, image path)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub subject: SubjectId,
    pub path: PathBuf,
}

/// A decoded face with its label. Dropped once projected.
#[derive(Debug, Clone)]
pub struct TrainingImage {
    pub subject: SubjectId,
    pub face: FaceImage,
}

/// Parse manifest text. Relative image paths resolve against `base_dir`.
///
/// Lines are `subjectID imagePath`; the reversed `imagePath subjectID`
/// layout of test lists is accepted too. `origin` is only used in error
/// messages.
pub fn parse_manifest(
    text: &str,
    base_dir: &Path,
    origin: &str,
) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = |reason: String| ManifestError::Malformed {
            path: origin.to_string(),
            line: idx + 1,
            reason,
        };

        let (id_str, rest) = split_labeled_line(line)
            .ok_or_else(|| malformed("expected `subjectID imagePath`".into()))?;

        let subject: SubjectId = id_str
            .parse()
            .map_err(|_| malformed(format!("invalid subject id `{id_str}`")))?;
        if subject == UNKNOWN_SUBJECT {
            return Err(malformed("subject id 0 is reserved for unknown faces".into()));
        }

        let image = rest.trim();
        if image.is_empty() {
            return Err(malformed("missing image path".into()));
        }

        let path = Path::new(image);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };

        entries.push(ManifestEntry { subject, path });
    }

    Ok(entries)
}

/// Split a line into `(id, path)`, whichever side the id is on.
///
/// A leading id wins when both ends are numeric. When neither is, the
/// leading token is returned so the caller reports it.
fn split_labeled_line(line: &str) -> Option<(&str, &str)> {
    let (first, rest) = line.split_once(char::is_whitespace)?;
    if first.parse::<SubjectId>().is_ok() {
        return Some((first, rest));
    }
    match line.rsplit_once(char::is_whitespace) {
        Some((head, last)) if last.parse::<SubjectId>().is_ok() => Some((last, head)),
        _ => Some((first, rest)),
    }
}

/// Read and parse a manifest file.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_manifest(&text, base_dir, &path.display().to_string())
}

/// Enumerate a directory database.
///
/// Each immediate subdirectory named by a positive integer is a subject;
/// every file inside with `extension` (case-insensitive) is one face.
pub fn scan_directory(root: &Path, extension: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let io_err = |path: &Path, source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut subject_dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .map_err(|e| io_err(root, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    subject_dirs.sort();

    let wanted = extension.trim_start_matches('.');
    let mut entries = Vec::new();

    for dir in subject_dirs {
        let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let subject = match name.parse::<SubjectId>() {
            Ok(id) if id != UNKNOWN_SUBJECT => id,
            _ => {
                tracing::warn!(dir = %dir.display(), "skipping directory without a positive numeric subject id");
                continue;
            }
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
            })
            .collect();
        files.sort();

        tracing::debug!(subject, faces = files.len(), "scanned subject directory");
        entries.extend(files.into_iter().map(|path| ManifestEntry { subject, path }));
    }

    Ok(entries)
}

/// Decode every image listed in `entries`.
pub fn load_images(entries: &[ManifestEntry]) -> Result<Vec<TrainingImage>, ManifestError> {
    entries
        .iter()
        .map(|entry| {
            let face = FaceImage::load(&entry.path)?;
            Ok(TrainingImage {
                subject: entry.subject,
                face,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_basic() {
        let text = "1 a.pgm\n2   faces/b.pgm\n";
        let entries = parse_manifest(text, Path::new("/data"), "m.txt").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject, 1);
        assert_eq!(entries[0].path, PathBuf::from("/data/a.pgm"));
        assert_eq!(entries[1].path, PathBuf::from("/data/faces/b.pgm"));
    }

    #[test]
    fn test_parse_manifest_skips_comments_and_blanks() {
        let text = "# header\n\n  \n3 x.pgm\n";
        let entries = parse_manifest(text, Path::new("."), "m.txt").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subject, 3);
    }

    #[test]
    fn test_parse_manifest_keeps_spaces_in_path() {
        let entries = parse_manifest("4 my face.pgm", Path::new("/d"), "m").unwrap();
        assert_eq!(entries[0].path, PathBuf::from("/d/my face.pgm"));
    }

    #[test]
    fn test_parse_manifest_absolute_path_untouched() {
        let entries = parse_manifest("4 /abs/f.pgm", Path::new("/d"), "m").unwrap();
        assert_eq!(entries[0].path, PathBuf::from("/abs/f.pgm"));
    }

    #[test]
    fn test_parse_manifest_path_then_id() {
        let text = "faces/a.pgm 3\n/abs/my face.pgm   12\n";
        let entries = parse_manifest(text, Path::new("/d"), "m").unwrap();
        assert_eq!(
            entries,
            vec![
                ManifestEntry { subject: 3, path: PathBuf::from("/d/faces/a.pgm") },
                ManifestEntry { subject: 12, path: PathBuf::from("/abs/my face.pgm") },
            ]
        );
    }

    #[test]
    fn test_parse_manifest_leading_id_preferred() {
        let entries = parse_manifest("5 7", Path::new("/d"), "m").unwrap();
        assert_eq!(entries[0].subject, 5);
        assert_eq!(entries[0].path, PathBuf::from("/d/7"));
    }

    #[test]
    fn test_parse_manifest_trailing_zero_rejected() {
        assert!(parse_manifest("a.pgm 0", Path::new("."), "m").is_err());
    }

    #[test]
    fn test_parse_manifest_bad_id_reports_line() {
        let err = parse_manifest("1 a.pgm\nbob b.pgm", Path::new("."), "m.txt").unwrap_err();
        match err {
            ManifestError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_manifest_rejects_missing_path() {
        assert!(parse_manifest("7", Path::new("."), "m").is_err());
    }

    #[test]
    fn test_parse_manifest_rejects_unknown_subject() {
        assert!(parse_manifest("0 a.pgm", Path::new("."), "m").is_err());
    }

    #[test]
    fn test_scan_directory() {
        let root = tempfile::tempdir().unwrap();
        for (dir, files) in [("2", vec!["b.PGM", "a.pgm", "notes.txt"]), ("1", vec!["x.pgm"])] {
            let d = root.path().join(dir);
            std::fs::create_dir(&d).unwrap();
            for f in files {
                std::fs::write(d.join(f), b"").unwrap();
            }
        }
        std::fs::create_dir(root.path().join("misc")).unwrap();
        std::fs::create_dir(root.path().join("0")).unwrap();

        let entries = scan_directory(root.path(), "pgm").unwrap();
        let summary: Vec<(SubjectId, String)> = entries
            .iter()
            .map(|e| (e.subject, e.path.file_name().unwrap().to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "x.pgm".to_string()),
                (2, "a.pgm".to_string()),
                (2, "b.PGM".to_string()),
            ]
        );
    }

    #[test]
    fn test_scan_missing_directory() {
        let err = scan_directory(Path::new("/nonexistent/eigenface"), "pgm").unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
