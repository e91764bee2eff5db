//! Legacy 8.3 names: synthesis from arbitrary file names and collision
//! resolution against a root directory.

use super::RootDir;
use std::fmt;

const BASE_LEN: usize = 8;
const EXT_LEN: usize = 3;

/// An 11-byte space-padded 8.3 name with no stored dot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName(pub [u8; BASE_LEN + EXT_LEN]);

impl ShortName {
    pub fn base(&self) -> &[u8] {
        &self.0[..BASE_LEN]
    }

    pub fn extension(&self) -> &[u8] {
        &self.0[BASE_LEN..]
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = String::from_utf8_lossy(self.base());
        let ext = String::from_utf8_lossy(self.extension());
        let (base, ext) = (base.trim_end(), ext.trim_end());
        if ext.is_empty() {
            write!(f, "{base}")
        } else {
            write!(f, "{base}.{ext}")
        }
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName({:?})", String::from_utf8_lossy(&self.0))
    }
}

#[inline]
fn is_allowed(c: char) -> bool {
    c > ' ' && c <= '~' && !matches!(c, '/' | '\\' | '"' | '<' | '>' | ':' | '|' | '?' | '*')
}

fn fill(field: &mut [u8], part: &str) {
    let kept = part
        .chars()
        .filter(|&c| is_allowed(c))
        .map(|c| c.to_ascii_uppercase() as u8);
    for (slot, byte) in field.iter_mut().zip(kept) {
        *slot = byte;
    }
}

/// Canonical 8.3 name for `source`, which may carry a directory prefix with
/// either separator.
pub fn to_short_name(source: &str) -> ShortName {
    let file_name = source.rsplit(['/', '\\']).next().unwrap_or(source);
    let (base, ext) = match file_name.rfind('.') {
        Some(dot) => (&file_name[..dot], &file_name[dot + 1..]),
        None => (file_name, ""),
    };

    let mut name = [b' '; BASE_LEN + EXT_LEN];
    fill(&mut name[..BASE_LEN], base);
    fill(&mut name[BASE_LEN..], ext);
    if name[0] == b' ' {
        name[0] = b'0';
    }
    ShortName(name)
}

/// Advances the base of `name` like a fixed-width decimal counter whose last
/// digit is the eighth character.
fn increment(name: &mut ShortName) {
    for c in name.0[..BASE_LEN].iter_mut().rev() {
        match *c {
            b'0'..=b'8' => {
                *c += 1;
                return;
            }
            b'9' => *c = b'0',
            _ => {
                *c = b'0';
                return;
            }
        }
    }
}

/// `candidate`, or the first counter variant of it no active entry of `dir`
/// already uses.
pub fn uniquify(mut candidate: ShortName, dir: &RootDir) -> ShortName {
    while dir.contains(&candidate) {
        for c in candidate.0[..BASE_LEN].iter_mut() {
            if *c == b' ' {
                *c = b'-';
            }
        }
        increment(&mut candidate);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floppy::{DirEntry, FatTimestamp, DIR_ENTRY_SIZE, ROOT_DIR_ENTRIES};

    fn short(raw: &[u8; 11]) -> ShortName {
        ShortName(*raw)
    }

    #[test]
    fn strips_windows_and_unix_prefixes() {
        assert_eq!(to_short_name("C:\\songs\\Fantasie.mid"), short(b"FANTASIEMID"));
        assert_eq!(to_short_name("/home/pi/songs/fantasie.mid"), short(b"FANTASIEMID"));
    }

    #[test]
    fn empty_base_becomes_zero() {
        assert_eq!(to_short_name("***.mid"), short(b"0       MID"));
        assert_eq!(to_short_name(".mid"), short(b"0       MID"));
    }

    #[test]
    fn filters_and_truncates() {
        assert_eq!(to_short_name("My Song (live).midi"), short(b"MYSONG(LMID"));
        assert_eq!(to_short_name("a|b?c"), short(b"ABC        "));
        assert_eq!(to_short_name("clair.de.lune.mid"), short(b"CLAIR.DEMID"));
        assert_eq!(to_short_name("Für Elise.mid"), short(b"FRELISE MID"));
    }

    #[test]
    fn increments_like_a_counter() {
        let mut name = short(b"FOO-----MID");
        increment(&mut name);
        assert_eq!(name, short(b"FOO----0MID"));
        increment(&mut name);
        assert_eq!(name, short(b"FOO----1MID"));

        let mut name = short(b"FOO---09MID");
        increment(&mut name);
        assert_eq!(name, short(b"FOO---10MID"));

        let mut name = short(b"FOO----9MID");
        increment(&mut name);
        assert_eq!(name, short(b"FOO---00MID"));
    }

    #[test]
    fn uniquify_resolves_collisions_and_is_idempotent() {
        let mut region = vec![0u8; ROOT_DIR_ENTRIES * DIR_ENTRY_SIZE];
        let mut dir = RootDir::new(&mut region);
        let stamp = FatTimestamp::default();

        let mut names = Vec::new();
        for index in 0..12 {
            let name = uniquify(to_short_name("foo.mid"), &dir);
            dir.write(index, &DirEntry::file(name, stamp, 2, 0));
            names.push(name);
        }

        assert_eq!(names[0], short(b"FOO     MID"));
        assert_eq!(names[1], short(b"FOO----0MID"));
        assert_eq!(names[2], short(b"FOO----1MID"));
        assert_eq!(names[10], short(b"FOO----9MID"));
        assert_eq!(names[11], short(b"FOO---00MID"));

        let mut sorted = names.clone();
        sorted.sort_by_key(|n| n.0);
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());

        let fresh = uniquify(to_short_name("bar.mid"), &dir);
        assert_eq!(uniquify(fresh, &dir), fresh);
    }

    #[test]
    fn uniquify_ignores_entries_after_terminator() {
        let mut region = vec![0u8; ROOT_DIR_ENTRIES * DIR_ENTRY_SIZE];
        let mut dir = RootDir::new(&mut region);
        dir.write(2, &DirEntry::file(short(b"FOO     MID"), FatTimestamp::default(), 2, 0));
        assert_eq!(uniquify(short(b"FOO     MID"), &dir), short(b"FOO     MID"));
    }

    #[test]
    fn displays_with_dot() {
        assert_eq!(short(b"FANTASIEMID").to_string(), "FANTASIE.MID");
        assert_eq!(short(b"README     ").to_string(), "README");
    }
}
