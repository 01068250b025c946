//! Path Parts
//!
//! Lexical split of a path into drive, directory, basename and extension.
//! Both `\` and `/` are accepted as separators so Windows-style catalog paths
//! parse the same on every platform.

use std::fmt;

use super::complex::SEPARATOR;

/// A path split into its four lexical components.
///
/// Concatenating the parts in order gives back the original text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParts {
    /// `C:`, `\\server\share`, `\\?\C:` or empty
    pub drive: String,
    /// Directory including its trailing separator, e.g. `\Images\`
    pub dir: String,
    /// File name without extension
    pub basename: String,
    /// Extension including the dot, e.g. `.jpg`, or empty
    pub extension: String,
}

impl PathParts {
    /// Split `path` into its parts
    pub fn parse(path: &str) -> Self {
        let drive_len = prefix_len(path);
        let (drive, rest) = path.split_at(drive_len);

        let name_start = rest.rfind(is_separator).map(|i| i + 1).unwrap_or(0);
        let (dir, name) = rest.split_at(name_start);

        // A leading dot marks a hidden file, not an extension
        let (basename, extension) = match name.rfind('.') {
            Some(dot) if dot > 0 => name.split_at(dot),
            _ => (name, ""),
        };

        Self {
            drive: drive.to_string(),
            dir: dir.to_string(),
            basename: basename.to_string(),
            extension: extension.to_string(),
        }
    }

    /// Basename plus extension
    pub fn file_name(&self) -> String {
        format!("{}{}", self.basename, self.extension)
    }

    /// True if the path carries a drive or share prefix
    pub fn has_drive(&self) -> bool {
        !self.drive.is_empty()
    }
}

impl fmt::Display for PathParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", self.drive, self.dir, self.basename, self.extension)
    }
}

pub(crate) fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// Byte length of the drive or share prefix of `path`.
///
/// Recognized forms:
/// - `C:`
/// - `\\server\share` (and `//server/share`)
/// - `\\?\C:` and `\\?\UNC\server\share`
pub(crate) fn prefix_len(path: &str) -> usize {
    let bytes = path.as_bytes();

    if bytes.len() >= 4
        && is_separator(bytes[0] as char)
        && is_separator(bytes[1] as char)
        && bytes[2] == b'?'
        && is_separator(bytes[3] as char)
    {
        let rest = &path[4..];
        let is_unc = rest.get(..3).is_some_and(|s| s.eq_ignore_ascii_case("UNC"))
            && rest.as_bytes().get(3).is_some_and(|&b| is_separator(b as char));
        if is_unc {
            return 8 + share_len(&path[8..]);
        }
        return 4 + drive_letter_len(rest);
    }

    if bytes.len() >= 2 && is_separator(bytes[0] as char) && is_separator(bytes[1] as char) {
        return 2 + share_len(&path[2..]);
    }

    drive_letter_len(path)
}

fn drive_letter_len(path: &str) -> usize {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        2
    } else {
        0
    }
}

/// Length of `server\share` at the start of `rest`, ending at the next
/// slash or complex-path separator
fn share_len(rest: &str) -> usize {
    let ends_share = |c: char| is_separator(c) || c == SEPARATOR;
    let Some(server_end) = rest.find(ends_share) else {
        return rest.len();
    };
    if rest[server_end..].starts_with(SEPARATOR) {
        return server_end;
    }
    let share = &rest[server_end + 1..];
    let share_end = share.find(ends_share).unwrap_or(share.len());
    server_end + 1 + share_end
}
