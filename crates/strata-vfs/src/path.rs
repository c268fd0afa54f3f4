use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Separators accepted when parsing. Paths always render with `/`.
const SEPARATORS: [char; 2] = ['/', '\\'];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path `{0}` contains an empty segment")]
    EmptySegment(String),
    #[error("path `{path}` contains a `{segment}` segment")]
    DotSegment { path: String, segment: String },
    #[error("`{0}` is not a valid path segment")]
    InvalidSegment(String),
    #[error("host path `{0}` cannot be represented as a VFS path")]
    NotRepresentable(String),
}

/// A normalized path in the VFS namespace.
///
/// A path is a list of non-empty segments plus a rooted flag. Rooted paths
/// (`/textures/grass.png`) address the whole namespace; relative paths
/// (`textures/grass.png`) are what content sources see after the mount prefix
/// has been stripped.
///
/// Segments never contain a separator and are never `.` or `..`, so a path can
/// not escape the directory it is joined onto. Comparison and hashing are
/// case-sensitive.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsPath {
    rooted: bool,
    segments: Vec<String>,
}

impl VfsPath {
    /// The namespace root, `/`.
    pub fn root() -> Self {
        Self {
            rooted: true,
            segments: Vec::new(),
        }
    }

    /// The empty relative path; the root of a content source.
    pub fn empty() -> Self {
        Self {
            rooted: false,
            segments: Vec::new(),
        }
    }

    /// Parses a `/`- or `\`-separated path.
    ///
    /// A leading separator makes the path rooted. A single trailing separator
    /// is tolerated. Empty interior segments and `.`/`..` are rejected.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let rooted = input.starts_with(SEPARATORS);
        let body = if rooted { &input[1..] } else { input };
        let body = body.strip_suffix(SEPARATORS).unwrap_or(body);

        let mut segments = Vec::new();
        if !body.is_empty() {
            for segment in body.split(SEPARATORS) {
                check_segment(input, segment)?;
                segments.push(segment.to_owned());
            }
        }

        Ok(Self { rooted, segments })
    }

    /// Builds a relative path from individual segments.
    pub fn relative<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::empty();
        for segment in segments {
            path.push(segment)?;
        }
        Ok(path)
    }

    /// Converts a relative host path (as produced by stripping a directory
    /// root) into a relative VFS path.
    pub fn from_native(path: &Path) -> Result<Self, PathError> {
        let not_representable = || PathError::NotRepresentable(path.display().to_string());

        let mut out = Self::empty();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(not_representable)?;
                    out.push(segment).map_err(|_| not_representable())?;
                }
                Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                    return Err(not_representable());
                }
            }
        }
        Ok(out)
    }

    /// Renders the segments as a relative host path.
    ///
    /// The rooted flag is dropped: the result is meant to be joined onto a
    /// directory source's root.
    pub fn to_native(&self) -> PathBuf {
        self.segments.iter().collect()
    }

    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    pub fn is_root(&self) -> bool {
        self.rooted && self.segments.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Segments in root-to-leaf order.
    pub fn segments(
        &self,
    ) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator + Clone + '_ {
        self.segments.iter().map(String::as_str)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Extension of the last segment, without the dot. Dot-files such as
    /// `.gitkeep` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            rooted: self.rooted,
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `prefix`'s segments are a prefix of this path's segments.
    ///
    /// Both paths must agree on rootedness.
    pub fn starts_with(&self, prefix: &VfsPath) -> bool {
        self.rooted == prefix.rooted && self.segments.starts_with(&prefix.segments)
    }

    /// Returns the part of this path below `prefix`, as a relative path.
    ///
    /// `None` when the path is not contained in `prefix`; during overlay
    /// resolution that is the common case, not an error.
    pub fn relative_to(&self, prefix: &VfsPath) -> Option<VfsPath> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            rooted: false,
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }

    /// Appends `relative`'s segments. The result keeps `self`'s rootedness.
    pub fn join(&self, relative: &VfsPath) -> VfsPath {
        debug_assert!(!relative.rooted, "joining rooted path {relative}");
        let mut segments = Vec::with_capacity(self.segments.len() + relative.segments.len());
        segments.extend(self.segments.iter().cloned());
        segments.extend(relative.segments.iter().cloned());
        Self {
            rooted: self.rooted,
            segments,
        }
    }

    /// Appends a single segment.
    pub fn push(&mut self, segment: impl Into<String>) -> Result<(), PathError> {
        let segment = segment.into();
        if segment.is_empty() || segment.contains(SEPARATORS) {
            return Err(PathError::InvalidSegment(segment));
        }
        if segment == "." || segment == ".." {
            return Err(PathError::InvalidSegment(segment));
        }
        self.segments.push(segment);
        Ok(())
    }

    /// Returns a rooted copy of this path.
    pub fn to_rooted(&self) -> VfsPath {
        Self {
            rooted: true,
            segments: self.segments.clone(),
        }
    }
}

fn check_segment(input: &str, segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment(input.to_owned()));
    }
    if segment == "." || segment == ".." {
        return Err(PathError::DotSegment {
            path: input.to_owned(),
            segment: segment.to_owned(),
        });
    }
    Ok(())
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rooted {
            f.write_str("/")?;
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VfsPath({:?})", self.to_string())
    }
}

impl FromStr for VfsPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for VfsPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl Serialize for VfsPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VfsPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    #[test]
    fn parse_infers_rootedness() {
        assert!(p("/a/b").is_rooted());
        assert!(!p("a/b").is_rooted());
        assert!(p("/").is_root());
        assert!(p("").is_empty());
        assert!(!p("").is_rooted());
    }

    #[test]
    fn parse_accepts_both_separators() {
        assert_eq!(p("\\textures\\grass.png"), p("/textures/grass.png"));
        assert_eq!(p("a\\b/c").segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_tolerates_single_trailing_separator() {
        assert_eq!(p("/audio/"), p("/audio"));
        assert_eq!(p("audio/").to_string(), "audio");
    }

    #[test]
    fn parse_rejects_empty_and_dot_segments() {
        assert_eq!(
            VfsPath::parse("/a//b"),
            Err(PathError::EmptySegment("/a//b".to_owned()))
        );
        assert!(matches!(
            VfsPath::parse("/a/../b"),
            Err(PathError::DotSegment { .. })
        ));
        assert!(matches!(
            VfsPath::parse("./a"),
            Err(PathError::DotSegment { .. })
        ));
    }

    #[test]
    fn display_round_trips() {
        for raw in ["/", "", "/a", "a/b/c", "/maps/level 1.map"] {
            assert_eq!(p(raw).to_string(), raw);
        }
    }

    #[test]
    fn equality_is_case_sensitive() {
        assert_ne!(p("/Icon.png"), p("/icon.png"));
        assert_ne!(p("/a"), p("a"));
    }

    #[test]
    fn segments_are_restartable() {
        let path = p("/a/b/c");
        let segments = path.segments();
        assert_eq!(segments.clone().count(), 3);
        assert_eq!(segments.collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(path.segments().rev().next(), Some("c"));
    }

    #[test]
    fn relative_to_compares_whole_segments() {
        let path = p("/audio/music/theme.ogg");
        assert_eq!(path.relative_to(&p("/audio")), Some(p("music/theme.ogg")));
        assert_eq!(path.relative_to(&p("/")), Some(p("audio/music/theme.ogg")));
        assert_eq!(path.relative_to(&path), Some(VfsPath::empty()));
        assert_eq!(path.relative_to(&p("/aud")), None);
        assert_eq!(path.relative_to(&p("/audio/sfx")), None);
        assert_eq!(path.relative_to(&p("audio")), None);
    }

    #[test]
    fn join_restores_relative_to() {
        let prefix = p("/dlc");
        let path = p("/dlc/maps/level1.map");
        let rel = path.relative_to(&prefix).unwrap();
        assert!(!rel.is_rooted());
        assert_eq!(prefix.join(&rel), path);
    }

    #[test]
    fn parent_file_name_and_extension() {
        let path = p("/textures/grass.PNG");
        assert_eq!(path.parent(), Some(p("/textures")));
        assert_eq!(path.file_name(), Some("grass.PNG"));
        assert_eq!(path.extension(), Some("PNG"));
        assert_eq!(p("/.gitkeep").extension(), None);
        assert_eq!(VfsPath::root().parent(), None);
        assert_eq!(p("/a").parent(), Some(VfsPath::root()));
    }

    #[test]
    fn native_conversion() {
        let native = p("/textures/grass.png").to_native();
        assert_eq!(native, Path::new("textures").join("grass.png"));
        assert_eq!(VfsPath::from_native(&native).unwrap(), p("textures/grass.png"));
        assert!(VfsPath::from_native(Path::new("../x")).is_err());
    }

    #[test]
    fn push_rejects_separators() {
        let mut path = VfsPath::root();
        path.push("a").unwrap();
        assert!(path.push("b/c").is_err());
        assert!(path.push("..").is_err());
        assert!(path.push("").is_err());
        assert_eq!(path, p("/a"));
    }

    #[test]
    fn serde_uses_string_form() {
        let path = p("/audio/beep.ogg");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/audio/beep.ogg\"");
        let back: VfsPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<VfsPath>("\"/a/../b\"").is_err());
    }
}
