//! Expansion of `--midi` arguments into the files that go on an image.

use glob::{glob_with, MatchOptions, Pattern};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

#[derive(Debug)]
pub enum SourceError {
    NoMatches { pattern: String },
    BadPattern { pattern: String, source: glob::PatternError },
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NoMatches { pattern } => write!(f, "no matches found for '{pattern}'"),
            SourceError::BadPattern { pattern, .. } => write!(f, "invalid pattern '{pattern}'"),
            SourceError::Io { path, .. } => write!(f, "cannot access {}", path.display()),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::NoMatches { .. } => None,
            SourceError::BadPattern { source, .. } => Some(source),
            SourceError::Io { source, .. } => Some(source),
        }
    }
}

/// One input file, described before any of its contents are read.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl SourceFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
            path,
        })
    }

    pub fn display_name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn open(&self) -> io::Result<fs::File> {
        fs::File::open(&self.path)
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn is_pattern(arg: &str) -> bool {
    arg.contains(['*', '?'])
}

fn glob_files(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let paths = glob_with(pattern, MATCH_OPTIONS).map_err(|source| SourceError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| SourceError::Io {
            path: err.path().to_path_buf(),
            source: err.into(),
        })?;
        if !path.is_dir() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Paths named by one `--midi` argument: a wildcard pattern, a directory
/// (all of its `.mid` files) or a single file.
pub fn expand_midi_arg(arg: &str) -> Result<Vec<PathBuf>, SourceError> {
    let path = Path::new(arg);
    let files = if is_pattern(arg) {
        glob_files(arg)?
    } else if path.is_dir() {
        let pattern = Path::new(&Pattern::escape(arg)).join("*.mid");
        glob_files(&pattern.to_string_lossy())?
    } else if path.exists() {
        vec![path.to_path_buf()]
    } else {
        Vec::new()
    };

    if files.is_empty() {
        return Err(SourceError::NoMatches {
            pattern: arg.to_string(),
        });
    }
    log::debug!("'{arg}' matched {} file(s)", files.len());
    Ok(files)
}

/// All sources named by `args`, in argument order then match order.
pub fn collect_sources<S: AsRef<str>>(args: &[S]) -> Result<Vec<SourceFile>, SourceError> {
    let mut sources = Vec::new();
    for arg in args {
        for path in expand_midi_arg(arg.as_ref())? {
            sources.push(SourceFile::from_path(path)?);
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pianodisc-sources-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn directory_expands_to_mid_files() {
        let dir = scratch_dir("dir");
        fs::write(dir.join("b.mid"), b"bb").unwrap();
        fs::write(dir.join("a.MID"), b"a").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.join("sub.mid")).unwrap();

        let files = expand_midi_arg(dir.to_str().unwrap()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MID", "b.mid"]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn patterns_and_single_files() {
        let dir = scratch_dir("pattern");
        fs::write(dir.join("one.mid"), b"1").unwrap();
        fs::write(dir.join("two.mid"), b"22").unwrap();

        let pattern = format!("{}/t*.mid", dir.display());
        assert_eq!(expand_midi_arg(&pattern).unwrap(), vec![dir.join("two.mid")]);

        let single = dir.join("one.mid");
        let sources = collect_sources(&[single.to_str().unwrap(), pattern.as_str()]).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].len, 1);
        assert_eq!(sources[1].len, 2);
        assert!(sources[1].modified.is_some());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_inputs_are_reported() {
        let dir = scratch_dir("missing");
        let missing = dir.join("nothing.mid");
        let err = expand_midi_arg(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, SourceError::NoMatches { .. }));

        let err = expand_midi_arg(&format!("{}/*.mid", dir.display())).unwrap_err();
        assert!(err.to_string().starts_with("no matches found"));

        fs::remove_dir_all(dir).unwrap();
    }
}
