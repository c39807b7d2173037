//! Container image reference types based loosely on [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go),
//! adjusted to a narrower grammar:
//!
//! ```txt
//! reference      := [ registry "/" ] repo-component ( "/" repo-component )* [ ":" tag ] [ "@" digest ]
//! registry       := component ( "." component )* [ ":" port ]
//! repo-component := component
//! component      := [a-zA-Z0-9]+([._-][a-zA-Z0-9]+)*
//! tag            := component
//! digest         := "sha256:" <64 lowercase hex>
//! port           := [0-9]+
//! ```
//!
//! A leading segment is only recognised as `registry` if it contains a `.` somewhere (a
//! multi-component domain) or is followed by an explicit `:port` -- otherwise `foo/bar` would be
//! ambiguous between "registry `foo`, path `bar`" and "path `foo/bar`". This mirrors how real
//! registries disambiguate the leading path segment.

use std::{borrow::Cow, ops::Range, str::FromStr, sync::LazyLock};

#[cfg(feature = "serde")]
use ::serde::{Deserialize, Deserializer, Serialize, Serializer};
use regex::Regex;

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidImageRefMarker;

impl std::error::Error for InvalidImageRefMarker {}

impl std::fmt::Display for InvalidImageRefMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("not a valid image ref")
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidImageRef(String);

impl std::error::Error for InvalidImageRef {}

impl std::fmt::Display for InvalidImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not a valid image ref: {:?}", self.0)
    }
}

const REGISTRY_SUFFIX: char = '/';
const PORT_PREFIX: char = ':';
const TAG_PREFIX: char = ':';
const DIGEST_PREFIX: char = '@';
const DIGEST_HEX_PREFIX: char = ':';

#[derive(Copy, Clone)]
struct IndicesRegistry {
    port_start: Option<usize>,
}

#[derive(Copy, Clone)]
struct Indices {
    registry_start: Option<IndicesRegistry>,
    path_start: usize,
    tag_start: Option<usize>,
    digest_start: Option<usize>,
}

impl Indices {
    #[inline]
    fn domain_range(&self) -> Option<Range<usize>> {
        self.registry_start.map(|registry_start| {
            0..registry_start
                .port_start
                .map(|x| x.wrapping_sub(PORT_PREFIX.len_utf8()))
                .unwrap_or_else(|| self.path_start.wrapping_sub(REGISTRY_SUFFIX.len_utf8()))
        })
    }

    #[inline]
    fn domain<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        self.domain_range().map(|range| &buffer[range])
    }

    #[inline]
    fn port_range(&self) -> Option<Range<usize>> {
        self.registry_start
            .and_then(|registry_start| registry_start.port_start)
            .map(|port_start| port_start..self.path_start.wrapping_sub(REGISTRY_SUFFIX.len_utf8()))
    }

    #[inline]
    fn port<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        self.port_range().map(|range| &buffer[range])
    }

    #[inline]
    fn registry_range(&self) -> Option<Range<usize>> {
        self.registry_start
            .map(|_| 0..self.path_start.wrapping_sub(REGISTRY_SUFFIX.len_utf8()))
    }

    #[inline]
    fn registry<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        self.registry_range().map(|range| &buffer[range])
    }

    #[inline]
    fn path_range(&self, buffer_len: usize) -> Range<usize> {
        self.path_start
            ..self
                .tag_start
                .map(|x| x.wrapping_sub(TAG_PREFIX.len_utf8()))
                .or(self
                    .digest_start
                    .map(|x| x.wrapping_sub(DIGEST_PREFIX.len_utf8())))
                .unwrap_or(buffer_len)
    }

    #[inline]
    fn path<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.path_range(buffer.len())]
    }

    #[inline]
    fn tag_range(&self, buffer_len: usize) -> Option<Range<usize>> {
        self.tag_start.map(|tag_start| {
            tag_start
                ..self
                    .digest_start
                    .map(|x| x.wrapping_sub(DIGEST_PREFIX.len_utf8()))
                    .unwrap_or(buffer_len)
        })
    }

    #[inline]
    fn tag<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        self.tag_range(buffer.len()).map(|range| &buffer[range])
    }

    #[inline]
    fn digest_hex_range(&self, buffer_len: usize) -> Option<Range<usize>> {
        self.digest_start.map(|digest_start| {
            digest_start + "sha256".len() + DIGEST_HEX_PREFIX.len_utf8()..buffer_len
        })
    }

    #[inline]
    fn digest_hex<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        self.digest_hex_range(buffer.len())
            .map(|range| &buffer[range])
    }

    #[inline]
    fn digest_range(&self, buffer_len: usize) -> Option<Range<usize>> {
        self.digest_start.map(|digest_start| digest_start..buffer_len)
    }

    #[inline]
    fn digest<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        self.digest_range(buffer.len()).map(|range| &buffer[range])
    }
}

impl FromStr for Indices {
    type Err = InvalidImageRefMarker;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static COMPONENT: &str = r"[a-zA-Z0-9]+(?:[._-][a-zA-Z0-9]+)*";
        static IMAGE_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(&format!(
                concat!(
                    r"^",
                    r"(?:",
                    r"(?P<registry_dotted>{component}(?:\.{component})+)(?::(?P<port_a>[0-9]+))?",
                    r"|",
                    r"(?P<registry_simple>{component}):(?P<port_b>[0-9]+)",
                    r")/",
                    r")?",
                    r"(?P<path>{component}(?:/{component})*)",
                    r"(?::(?P<tag>{component}))?",
                    r"(?:@sha256:(?P<hex>[0-9a-f]{{64}}))?",
                    r"$",
                ),
                component = COMPONENT
            ))
            .unwrap()
        });

        let captures = IMAGE_REF_REGEX.captures(s).ok_or(InvalidImageRefMarker)?;

        let registry_start = if let Some(m) = captures.name("registry_dotted") {
            debug_assert_eq!(m.start(), 0);
            Some(IndicesRegistry {
                port_start: captures.name("port_a").map(|m| m.start()),
            })
        } else {
            captures.name("registry_simple").map(|m| {
                debug_assert_eq!(m.start(), 0);
                IndicesRegistry {
                    port_start: captures.name("port_b").map(|m| m.start()),
                }
            })
        };

        Ok(Self {
            registry_start,
            path_start: captures
                .name("path")
                .map(|m| m.start())
                .ok_or(InvalidImageRefMarker)?,
            tag_start: captures.name("tag").map(|m| m.start()),
            digest_start: captures.name("hex").map(|m| {
                m.start() - "sha256".len() - DIGEST_HEX_PREFIX.len_utf8() - DIGEST_PREFIX.len_utf8()
            }),
        })
    }
}

macro_rules! impl_image_ref_common {
    ($T:ident $(<$lt:tt>)?) => {
        impl$(<$lt>)? $T$(<$lt>)? {
            /// Returns the `<domain>` section, e.g. `reg.io` in `reg.io:5000/x`.
            pub fn domain(&self) -> Option<&$($lt)? str> {
                self.indices.domain(&self.buffer)
            }

            /// Returns the `<port>` section, e.g. `5000` in `reg.io:5000/x`.
            pub fn port(&self) -> Option<&$($lt)? str> {
                self.indices.port(&self.buffer)
            }

            /// Returns the `<domain>(:<port>)?` section.
            pub fn registry(&self) -> Option<&$($lt)? str> {
                self.indices.registry(&self.buffer)
            }

            /// Returns the `<path>` section. The only section required to be present.
            pub fn path(&self) -> &$($lt)? str {
                self.indices.path(&self.buffer)
            }

            /// Returns the `<tag>` section.
            pub fn tag(&self) -> Option<&$($lt)? str> {
                self.indices.tag(&self.buffer)
            }

            /// Returns the 64-character lowercase hex digest, without the `sha256:` prefix.
            pub fn digest_hex(&self) -> Option<&$($lt)? str> {
                self.indices.digest_hex(&self.buffer)
            }

            /// Returns the `sha256:<hex>` section.
            pub fn digest(&self) -> Option<&$($lt)? str> {
                self.indices.digest(&self.buffer)
            }
        }

        impl$(<$lt>)? ::core::cmp::PartialEq for $T$(<$lt>)? {
            fn eq(&self, other: &Self) -> bool {
                self.buffer == other.buffer
            }
        }

        impl$(<$lt>)? ::core::cmp::Eq for $T$(<$lt>)? {}

        impl$(<$lt>)? ::core::hash::Hash for $T$(<$lt>)? {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.buffer.hash(state);
            }
        }

        impl$(<$lt>)? ::core::ops::Deref for $T$(<$lt>)? {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.buffer
            }
        }

        impl$(<$lt>)? ::std::fmt::Debug for $T$(<$lt>)? {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                (**self).fmt(f)
            }
        }

        impl$(<$lt>)? ::std::fmt::Display for $T$(<$lt>)? {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                (**self).fmt(f)
            }
        }
    };
}

/// An owned, parsed image reference.
#[derive(Clone)]
pub struct ImageRef {
    buffer: String,
    indices: Indices,
}

impl ImageRef {
    pub fn new(value: String) -> Result<Self, InvalidImageRef> {
        let indices = match value.parse() {
            Ok(indices) => indices,
            Err(InvalidImageRefMarker) => return Err(InvalidImageRef(value)),
        };
        Ok(Self {
            indices,
            buffer: value,
        })
    }

    pub fn builder<'a>(path: impl Into<Cow<'a, str>>) -> ImageRefBuilder<'a> {
        ImageRefBuilder::new(path)
    }

    pub fn as_ref(&self) -> ImageRefView<'_> {
        ImageRefView {
            buffer: &self.buffer[..],
            indices: self.indices,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl_image_ref_common!(ImageRef);

impl FromStr for ImageRef {
    type Err = InvalidImageRefMarker;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageRefView::new(s).map(ImageRefView::to_owned)
    }
}

impl TryFrom<String> for ImageRef {
    type Error = InvalidImageRef;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageRef> for String {
    fn from(value: ImageRef) -> Self {
        value.buffer
    }
}

#[cfg(feature = "serde")]
impl Serialize for ImageRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.buffer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::new(Deserialize::deserialize(deserializer)?).map_err(::serde::de::Error::custom)
    }
}

/// A borrowed version of [`ImageRef`].
#[derive(Copy, Clone)]
pub struct ImageRefView<'a> {
    buffer: &'a str,
    indices: Indices,
}

impl<'a> ImageRefView<'a> {
    pub fn new(value: &'a str) -> Result<Self, InvalidImageRefMarker> {
        Ok(Self {
            buffer: value,
            indices: value.parse()?,
        })
    }

    pub fn to_owned(self) -> ImageRef {
        ImageRef {
            buffer: self.buffer.to_owned(),
            indices: self.indices,
        }
    }

    pub fn as_str(self) -> &'a str {
        self.buffer
    }
}

impl_image_ref_common!(ImageRefView<'a>);

impl<'a> TryFrom<&'a str> for ImageRefView<'a> {
    type Error = InvalidImageRefMarker;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

pub struct ImageRefBuilder<'a> {
    registry: Option<Cow<'a, str>>,
    path: Cow<'a, str>,
    tag: Option<Cow<'a, str>>,
    digest_hex: Option<Cow<'a, str>>,
}

impl<'a> ImageRefBuilder<'a> {
    fn new(path: impl Into<Cow<'a, str>>) -> Self {
        Self {
            registry: None,
            path: path.into(),
            tag: None,
            digest_hex: None,
        }
    }

    pub fn with_registry(mut self, registry: impl Into<Cow<'a, str>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<Cow<'a, str>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_digest_hex(mut self, hex: impl Into<Cow<'a, str>>) -> Self {
        self.digest_hex = Some(hex.into());
        self
    }

    pub fn build(self) -> Result<ImageRef, InvalidImageRef> {
        let mut buffer = String::new();
        if let Some(registry) = &self.registry {
            buffer.push_str(registry);
            buffer.push(REGISTRY_SUFFIX);
        }
        buffer.push_str(&self.path);
        if let Some(tag) = &self.tag {
            buffer.push(TAG_PREFIX);
            buffer.push_str(tag);
        }
        if let Some(hex) = &self.digest_hex {
            buffer.push(DIGEST_PREFIX);
            buffer.push_str("sha256");
            buffer.push(DIGEST_HEX_PREFIX);
            buffer.push_str(hex);
        }
        ImageRef::new(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_path() {
        let r = ImageRefView::new("alpine").unwrap();
        assert_eq!(r.registry(), None);
        assert_eq!(r.path(), "alpine");
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest(), None);
    }

    #[test]
    fn parses_path_with_tag() {
        let r = ImageRefView::new("alpine:latest").unwrap();
        assert_eq!(r.registry(), None);
        assert_eq!(r.path(), "alpine");
        assert_eq!(r.tag(), Some("latest"));
    }

    #[test]
    fn single_segment_before_slash_without_dot_is_not_a_registry() {
        let r = ImageRefView::new("library/alpine").unwrap();
        assert_eq!(r.registry(), None);
        assert_eq!(r.path(), "library/alpine");
    }

    #[test]
    fn dotted_leading_segment_is_a_registry() {
        let r = ImageRefView::new("reg.io/org-name/img-name:latest").unwrap();
        assert_eq!(r.domain(), Some("reg.io"));
        assert_eq!(r.port(), None);
        assert_eq!(r.registry(), Some("reg.io"));
        assert_eq!(r.path(), "org-name/img-name");
        assert_eq!(r.tag(), Some("latest"));
    }

    #[test]
    fn leading_segment_with_port_is_a_registry_even_without_a_dot() {
        let r = ImageRefView::new("myregistry:5000/img-name").unwrap();
        assert_eq!(r.domain(), Some("myregistry"));
        assert_eq!(r.port(), Some("5000"));
        assert_eq!(r.registry(), Some("myregistry:5000"));
        assert_eq!(r.path(), "img-name");
    }

    #[test]
    fn parses_digest() {
        let digest = "0".repeat(64);
        let r = ImageRefView::new(&format!("reg.io/org/img@sha256:{digest}")).unwrap();
        assert_eq!(r.registry(), Some("reg.io"));
        assert_eq!(r.path(), "org/img");
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest_hex(), Some(digest.as_str()));
        assert_eq!(r.digest(), Some(format!("sha256:{digest}").as_str()));
    }

    #[test]
    fn rejects_short_digest() {
        assert_eq!(
            ImageRefView::new("a@sha256:1234").unwrap_err(),
            InvalidImageRefMarker
        );
    }

    #[test]
    fn rejects_uppercase_digest_hex() {
        let digest = "A".repeat(64);
        assert_eq!(
            ImageRefView::new(&format!("a@sha256:{digest}")).unwrap_err(),
            InvalidImageRefMarker
        );
    }

    #[test]
    fn rejects_embedded_whitespace() {
        assert_eq!(
            ImageRefView::new("docker.io/library/ubuntu linux:tag").unwrap_err(),
            InvalidImageRefMarker
        );
    }

    #[test]
    fn rejects_empty_string() {
        assert_eq!(ImageRefView::new("").unwrap_err(), InvalidImageRefMarker);
    }

    #[test]
    fn builder_roundtrips() {
        let built = ImageRef::builder("org/img")
            .with_registry("reg.io")
            .with_tag("v1")
            .build()
            .unwrap();
        assert_eq!(built.as_str(), "reg.io/org/img:v1");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_roundtrips() {
        let parsed = ImageRef::new("org/img".to_string()).unwrap();
        let json = r#""org/img""#;
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
        assert_eq!(serde_json::from_str::<ImageRef>(json).unwrap(), parsed);
    }
}
