//! Shared helpers: exact byte reads, path separator normalisation, and
//! `~/` expansion for user-configured paths.

use std::{
    io::{self, Read},
    path::PathBuf,
};

/// Read exactly `len` bytes from the stream.
pub fn read_bytes(file: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read exactly `N` bytes from the stream into a fixed array.
#[inline]
pub fn read_exact_array<R: Read, const N: usize>(stream: &mut R) -> io::Result<[u8; N]> {
    let mut bytes = [0; N];
    stream.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Normalise a repository-relative path to forward slashes and strip any
/// trailing separator. Git stores paths with `/` regardless of platform.
pub fn to_repo_slashes(path: &str) -> String {
    let mut normalised = path.replace('\\', "/");
    while normalised.ends_with('/') {
        normalised.pop();
    }
    normalised
}

/// Expand a leading `~/` against the user's home directory.
///
/// Honours `HOME`, falling back to `HOMEDRIVE`+`HOMEPATH`; no other
/// environment variables are consulted. Paths without the prefix are
/// returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let Some(rest) = path.strip_prefix("~/").or_else(|| {
        (path == "~").then_some("")
    }) else {
        return PathBuf::from(path);
    };
    let home = std::env::var("HOME").ok().filter(|h| !h.is_empty()).or_else(|| {
        let drive = std::env::var("HOMEDRIVE").ok()?;
        let dir = std::env::var("HOMEPATH").ok()?;
        Some(format!("{drive}{dir}"))
    });
    match home {
        Some(home) => PathBuf::from(home).join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::{expand_home, read_bytes, read_exact_array, to_repo_slashes};

    /// Exact reads return the requested span and fail on short input.
    #[test]
    fn test_read_bytes() {
        let mut cursor = std::io::Cursor::new(vec![1u8, 2, 3]);
        assert_eq!(read_bytes(&mut cursor, 2).unwrap(), vec![1, 2]);
        assert!(read_bytes(&mut cursor, 5).is_err());

        let mut cursor = std::io::Cursor::new(vec![9u8, 8]);
        let arr: [u8; 2] = read_exact_array(&mut cursor).unwrap();
        assert_eq!(arr, [9, 8]);
    }

    /// Backslashes become slashes; trailing separators are stripped.
    #[test]
    fn test_to_repo_slashes() {
        assert_eq!(to_repo_slashes("a\\b\\c"), "a/b/c");
        assert_eq!(to_repo_slashes("dir/"), "dir");
        assert_eq!(to_repo_slashes("dir//"), "dir");
        assert_eq!(to_repo_slashes("plain"), "plain");
    }

    /// `~/` expands against HOME; other paths pass through untouched.
    #[test]
    fn test_expand_home() {
        // SAFETY: test-local env mutation, no concurrent readers of HOME here.
        unsafe { std::env::set_var("HOME", "/home/alice") };
        assert_eq!(
            expand_home("~/repos/x"),
            std::path::PathBuf::from("/home/alice/repos/x")
        );
        assert_eq!(expand_home("/abs/path"), std::path::PathBuf::from("/abs/path"));
    }
}
