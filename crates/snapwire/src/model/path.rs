//! Property paths addressing a location in a component's state tree.
//!
//! Paths are written the way the client binds them: dotted segments with
//! optional bracketed indices (`author.posts.0.title`, `items[2].name`).

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::limits::{MAX_PATH_LEN, MAX_PATH_SEGMENTS};

/// A single step in a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A named key (property, attribute, map key).
    Key(String),
    /// A positional index into an ordered container.
    Index(usize),
}

impl Segment {
    /// Returns the segment as a positional index, parsing numeric keys.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(k) => parse_index(k),
        }
    }

    /// Returns the segment as a key string.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            Segment::Key(k) => Cow::Borrowed(k),
            Segment::Index(i) => Cow::Owned(i.to_string()),
        }
    }

    /// Returns true for index segments.
    pub fn is_index(&self) -> bool {
        matches!(self, Segment::Index(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        match parse_index(s) {
            Some(i) => Segment::Index(i),
            None => Segment::Key(s.to_string()),
        }
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        match parse_index(&s) {
            Some(i) => Segment::Index(i),
            None => Segment::Key(s),
        }
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Index(i)
    }
}

fn parse_index(s: &str) -> Option<usize> {
    // "007" stays a key so that it round-trips through Display unchanged
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    s.parse().ok()
}

/// A sequence of segments addressing a location in the live object graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<Segment>);

impl Path {
    /// The empty path (the component itself).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses a dotted/bracketed path.
    pub fn parse(input: &str) -> Result<Self, Error> {
        if input.len() > MAX_PATH_LEN {
            return Err(Error::LengthExceedsLimit {
                field: "path",
                len: input.len(),
                max: MAX_PATH_LEN,
            });
        }
        if input.is_empty() {
            return Err(Error::InvalidPath {
                path: input.to_string(),
                reason: "empty path",
            });
        }

        let invalid = |reason| Error::InvalidPath {
            path: input.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        for part in input.split('.') {
            let (head, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if head.is_empty() && (rest.is_empty() || segments.is_empty()) {
                return Err(invalid("empty segment"));
            }
            if !head.is_empty() {
                if head.contains(']') {
                    return Err(invalid("unbalanced bracket"));
                }
                segments.push(Segment::from(head));
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unbalanced bracket"))?;
                let inner = &rest[1..close];
                if inner.is_empty() {
                    return Err(invalid("empty index"));
                }
                segments.push(Segment::from(inner));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after index"));
                }
            }
        }

        if segments.len() > MAX_PATH_SEGMENTS {
            return Err(Error::LengthExceedsLimit {
                field: "path segments",
                len: segments.len(),
                max: MAX_PATH_SEGMENTS,
            });
        }
        Ok(Self(segments))
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(segment.into());
        Self(segments)
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }

    /// Returns the path without its last segment.
    pub fn parent(&self) -> Option<Self> {
        match self.0.split_last() {
            Some((_, init)) => Some(Self(init.to_vec())),
            None => None,
        }
    }

    /// Splits off the first segment (the component property name).
    pub fn split_first(&self) -> Option<(&Segment, &[Segment])> {
        self.0.split_first()
    }

    /// Returns the last segment.
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Returns true if `prefix` is an ancestor of, or equal to, this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Dotted form with every index segment replaced by `*`.
    ///
    /// This is the form rule tables are keyed by (`author.posts.*.title`).
    pub fn normalized(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match seg.as_index() {
                Some(_) => out.push('*'),
                None => out.push_str(&seg.as_key()),
            }
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            fmt::Display::fmt(seg, f)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl From<&[Segment]> for Path {
    fn from(segments: &[Segment]) -> Self {
        Self(segments.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        let path = Path::parse("author.posts.0.title").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("author".to_string()),
                Segment::Key("posts".to_string()),
                Segment::Index(0),
                Segment::Key("title".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "author.posts.0.title");
    }

    #[test]
    fn test_parse_brackets() {
        let dotted = Path::parse("items.2.name").unwrap();
        let bracketed = Path::parse("items[2].name").unwrap();
        assert_eq!(dotted, bracketed);

        let nested = Path::parse("grid[1][3]").unwrap();
        assert_eq!(nested.to_string(), "grid.1.3");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "a..b", ".a", "a.", "a[1", "a[]", "a]b", "a[1]x"] {
            assert!(
                matches!(Path::parse(bad), Err(Error::InvalidPath { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_limits() {
        let long = vec!["a"; MAX_PATH_SEGMENTS + 1].join(".");
        assert!(matches!(
            Path::parse(&long),
            Err(Error::LengthExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_leading_zero_stays_key() {
        let path = Path::parse("codes.007").unwrap();
        assert_eq!(path.last(), Some(&Segment::Key("007".to_string())));
        assert_eq!(path.to_string(), "codes.007");
    }

    #[test]
    fn test_normalized() {
        let path = Path::parse("author.posts.3.comments.12.body").unwrap();
        assert_eq!(path.normalized(), "author.posts.*.comments.*.body");
    }

    #[test]
    fn test_child_and_parent() {
        let path = Path::parse("a.b").unwrap();
        let child = path.child(4usize);
        assert_eq!(child.to_string(), "a.b.4");
        assert_eq!(child.parent(), Some(path.clone()));
        assert!(child.starts_with(&path));
        assert_eq!(Path::root().parent(), None);
    }
}
