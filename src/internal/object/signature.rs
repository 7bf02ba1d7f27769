//! Git signature lines (`author`, `committer`, `tagger`).
//!
//! The serialised form is `{marker} {name} [<{email}>] {unix-seconds}
//! {±HHMM}`. The e-mail part is optional in repositories written by some
//! tools, so it decodes to an `Option`. Timestamps carry a minute-granular
//! UTC offset; sub-second precision is truncated on construction.

use std::fmt::Display;

use bstr::ByteSlice;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::GitError;

/// Which header line a signature came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    Author,
    Committer,
    Tagger,
}

impl SignatureKind {
    pub fn marker(&self) -> &'static str {
        match self {
            SignatureKind::Author => "author",
            SignatureKind::Committer => "committer",
            SignatureKind::Tagger => "tagger",
        }
    }

    fn from_marker(marker: &str) -> Result<SignatureKind, GitError> {
        match marker {
            "author" => Ok(SignatureKind::Author),
            "committer" => Ok(SignatureKind::Committer),
            "tagger" => Ok(SignatureKind::Tagger),
            _ => Err(GitError::InvalidSignature(marker.to_string())),
        }
    }
}

/// A person plus the moment they acted, as recorded in commit and tag
/// objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub kind: SignatureKind,
    pub name: String,
    pub email: Option<String>,
    pub when: DateTime<FixedOffset>,
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{}>", self.name, email)?,
            None => write!(f, "{}", self.name)?,
        }
        write!(
            f,
            " {} {}",
            self.when.timestamp(),
            format_offset(self.when.offset())
        )
    }
}

fn format_offset(offset: &FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    format!("{sign}{:02}{:02}", abs / 3600, (abs % 3600) / 60)
}

fn parse_offset(text: &str) -> Result<FixedOffset, GitError> {
    let bytes = text.as_bytes();
    if bytes.len() != 5 || (bytes[0] != b'+' && bytes[0] != b'-') {
        return Err(GitError::InvalidSignature(text.to_string()));
    }
    let hours: i32 = text[1..3]
        .parse()
        .map_err(|_| GitError::InvalidSignature(text.to_string()))?;
    let minutes: i32 = text[3..5]
        .parse()
        .map_err(|_| GitError::InvalidSignature(text.to_string()))?;
    let mut secs = (hours * 60 + minutes) * 60;
    if bytes[0] == b'-' {
        secs = -secs;
    }
    FixedOffset::east_opt(secs).ok_or_else(|| GitError::InvalidSignature(text.to_string()))
}

impl Signature {
    /// Construct a signature, truncating sub-second precision.
    pub fn new(
        kind: SignatureKind,
        name: impl Into<String>,
        email: Option<String>,
        when: DateTime<FixedOffset>,
    ) -> Signature {
        let truncated = DateTime::<Utc>::from_timestamp(when.timestamp(), 0)
            .expect("unix seconds in range")
            .with_timezone(when.offset());
        Signature {
            kind,
            name: name.into(),
            email,
            when: truncated,
        }
    }

    /// Parse a whole signature line including its marker, e.g.
    /// `author Alice <alice@example.com> 1700000000 +0100`.
    pub fn from_data(data: Vec<u8>) -> Result<Signature, GitError> {
        let line = data.to_str().map_err(|_| {
            GitError::InvalidSignature(String::from_utf8_lossy(&data).into_owned())
        })?;
        let (marker, rest) = line
            .split_once(' ')
            .ok_or_else(|| GitError::InvalidSignature(line.to_string()))?;
        let kind = SignatureKind::from_marker(marker)?;
        Self::parse_person(kind, rest)
    }

    /// Parse the person part (everything after the marker).
    pub fn parse_person(kind: SignatureKind, rest: &str) -> Result<Signature, GitError> {
        let rest = rest.trim_end();
        let (rest, tz_text) = rest
            .rsplit_once(' ')
            .ok_or_else(|| GitError::InvalidSignature(rest.to_string()))?;
        let (person, secs_text) = rest
            .rsplit_once(' ')
            .ok_or_else(|| GitError::InvalidSignature(rest.to_string()))?;

        let secs: i64 = secs_text
            .parse()
            .map_err(|_| GitError::InvalidSignature(secs_text.to_string()))?;
        let offset = parse_offset(tz_text)?;
        let when = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| GitError::InvalidSignature(secs_text.to_string()))?
            .with_timezone(&offset);

        let person = person.trim_end();
        let (name, email) = match person.strip_suffix('>').and_then(|p| p.rsplit_once('<')) {
            Some((name, email)) => (name.trim_end().to_string(), Some(email.to_string())),
            None => (person.to_string(), None),
        };

        Ok(Signature {
            kind,
            name,
            email,
            when,
        })
    }

    /// Re-encode as a full header line.
    pub fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(format!("{} {}", self.kind.marker(), self).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};

    use super::{Signature, SignatureKind};

    /// A standard author line round-trips byte-for-byte.
    #[test]
    fn parse_format_round_trip() {
        let line = b"author benjamin.747 <benjamin.747@outlook.com> 1757467768 +0800".to_vec();
        let sig = Signature::from_data(line.clone()).unwrap();
        assert_eq!(sig.kind, SignatureKind::Author);
        assert_eq!(sig.name, "benjamin.747");
        assert_eq!(sig.email.as_deref(), Some("benjamin.747@outlook.com"));
        assert_eq!(sig.when.timestamp(), 1757467768);
        assert_eq!(sig.to_data().unwrap(), line);
    }

    /// Negative offsets keep their sign through the round trip.
    #[test]
    fn negative_offset() {
        let line = b"committer Jane Doe <jane@example.com> 1700000000 -0430".to_vec();
        let sig = Signature::from_data(line.clone()).unwrap();
        assert_eq!(sig.when.offset().local_minus_utc(), -(4 * 3600 + 30 * 60));
        assert_eq!(sig.to_data().unwrap(), line);
    }

    /// The e-mail part is optional.
    #[test]
    fn missing_email() {
        let sig =
            Signature::from_data(b"tagger buildbot 1600000000 +0000".to_vec()).unwrap();
        assert_eq!(sig.kind, SignatureKind::Tagger);
        assert_eq!(sig.name, "buildbot");
        assert_eq!(sig.email, None);
        assert_eq!(
            sig.to_data().unwrap(),
            b"tagger buildbot 1600000000 +0000".to_vec()
        );
    }

    /// Names containing spaces and angle noise still parse.
    #[test]
    fn spaced_name() {
        let sig = Signature::from_data(
            b"author Erik the Red <erik@sea.example> 1234567890 +0000".to_vec(),
        )
        .unwrap();
        assert_eq!(sig.name, "Erik the Red");
        assert_eq!(sig.email.as_deref(), Some("erik@sea.example"));
    }

    /// Sub-second precision is truncated on construction.
    #[test]
    fn subsecond_truncated() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let when = offset.timestamp_opt(1700000000, 0).unwrap()
            + chrono::Duration::milliseconds(750);
        let sig = Signature::new(SignatureKind::Author, "x", None, when);
        assert_eq!(sig.when.timestamp(), 1700000000);
        assert_eq!(sig.when.timestamp_subsec_millis(), 0);
    }

    /// Bad markers and malformed offsets are rejected.
    #[test]
    fn malformed_lines_rejected() {
        assert!(Signature::from_data(b"gpgsig something".to_vec()).is_err());
        assert!(Signature::from_data(b"author x <a@b> 170 +08".to_vec()).is_err());
        assert!(Signature::from_data(b"author x <a@b> notasecond +0800".to_vec()).is_err());
    }
}
