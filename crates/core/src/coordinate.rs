//! Package coordinate parsing and canonicalization.
//!
//! Coordinates follow the package-URL grammar:
//! `pkg:type/namespace/name@version?qualifiers#subpath`.
//! The canonical rendering is the key under which metadata records are stored,
//! so every input that denotes the same package must render identically.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const SCHEME: &str = "pkg:";

/// A parsed package coordinate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PackageCoordinate {
    ty: String,
    namespace: Option<String>,
    name: String,
    version: Option<String>,
    qualifiers: BTreeMap<String, String>,
    subpath: Option<String>,
}

impl PackageCoordinate {
    /// Parse and canonicalize a coordinate string.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let input = input.trim();
        let rest = match input.get(..SCHEME.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &input[SCHEME.len()..],
            _ => return Err(invalid(format!("must start with '{SCHEME}': {input}"))),
        };
        let rest = rest.trim_start_matches('/');

        let (rest, subpath) = match rest.rsplit_once('#') {
            Some((head, sub)) => (head, parse_subpath(sub)?),
            None => (rest, None),
        };

        let (rest, qualifiers) = match rest.rsplit_once('?') {
            Some((head, q)) => (head, parse_qualifiers(q)?),
            None => (rest, BTreeMap::new()),
        };

        let (ty, path) = rest
            .split_once('/')
            .ok_or_else(|| invalid(format!("missing name: {input}")))?;
        let ty = ty.to_ascii_lowercase();
        validate_type(&ty)?;

        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last = segments
            .pop()
            .ok_or_else(|| invalid(format!("missing name: {input}")))?;

        let (raw_name, raw_version) = match last.rsplit_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (last, None),
        };

        let mut name = percent_decode(raw_name)?;
        if name.is_empty() {
            return Err(invalid(format!("empty name: {input}")));
        }

        let mut namespace = if segments.is_empty() {
            None
        } else {
            let decoded = segments
                .iter()
                .map(|s| percent_decode(s))
                .collect::<crate::Result<Vec<_>>>()?;
            Some(decoded.join("/"))
        };

        let version = match raw_version {
            Some(v) if !v.is_empty() => Some(percent_decode(v)?),
            _ => None,
        };

        normalize_for_type(&ty, &mut namespace, &mut name);

        Ok(Self {
            ty,
            namespace,
            name,
            version,
            qualifiers,
            subpath,
        })
    }

    /// Package type (ecosystem), lower-cased.
    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn qualifiers(&self) -> &BTreeMap<String, String> {
        &self.qualifiers
    }

    pub fn subpath(&self) -> Option<&str> {
        self.subpath.as_deref()
    }

    /// Canonical rendering used as the metadata store key.
    pub fn canonical(&self) -> String {
        let mut out = self.coordinates();
        if !self.qualifiers.is_empty() {
            out.push('?');
            let rendered: Vec<String> = self
                .qualifiers
                .iter()
                .map(|(k, v)| format!("{k}={}", percent_encode(v)))
                .collect();
            out.push_str(&rendered.join("&"));
        }
        if let Some(subpath) = &self.subpath {
            out.push('#');
            let rendered: Vec<String> = subpath.split('/').map(percent_encode).collect();
            out.push_str(&rendered.join("/"));
        }
        out
    }

    /// Canonical rendering without qualifiers and subpath.
    ///
    /// Tracked components are matched against metadata on this form.
    pub fn coordinates(&self) -> String {
        let mut out = String::with_capacity(64);
        out.push_str(SCHEME);
        out.push_str(&self.ty);
        out.push('/');
        if let Some(namespace) = &self.namespace {
            for segment in namespace.split('/') {
                out.push_str(&percent_encode(segment));
                out.push('/');
            }
        }
        out.push_str(&percent_encode(&self.name));
        if let Some(version) = &self.version {
            out.push('@');
            out.push_str(&percent_encode(version));
        }
        out
    }
}

impl fmt::Debug for PackageCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageCoordinate({self})")
    }
}

impl fmt::Display for PackageCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl std::str::FromStr for PackageCoordinate {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PackageCoordinate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for PackageCoordinate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn invalid(msg: String) -> crate::Error {
    crate::Error::InvalidCoordinate(msg)
}

fn validate_type(ty: &str) -> crate::Result<()> {
    let mut chars = ty.chars();
    match chars.next() {
        None => return Err(invalid("empty type".to_string())),
        Some(c) if c.is_ascii_digit() => {
            return Err(invalid(format!("type must not start with a digit: {ty}")));
        }
        _ => {}
    }
    if let Some(c) = ty
        .chars()
        .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '.' | '+' | '-'))
    {
        return Err(invalid(format!("invalid character in type: {c}")));
    }
    Ok(())
}

fn parse_qualifiers(raw: &str) -> crate::Result<BTreeMap<String, String>> {
    let mut qualifiers = BTreeMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("qualifier without value: {pair}")))?;
        let key = key.to_ascii_lowercase();
        if key.is_empty() {
            return Err(invalid(format!("empty qualifier key: {pair}")));
        }
        let value = percent_decode(value)?;
        // Empty values are equivalent to an absent qualifier.
        if value.is_empty() {
            continue;
        }
        qualifiers.insert(key, value);
    }
    Ok(qualifiers)
}

fn parse_subpath(raw: &str) -> crate::Result<Option<String>> {
    let segments = raw
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(percent_decode)
        .collect::<crate::Result<Vec<_>>>()?;
    Ok((!segments.is_empty()).then(|| segments.join("/")))
}

fn normalize_for_type(ty: &str, namespace: &mut Option<String>, name: &mut String) {
    match ty {
        "github" | "bitbucket" | "npm" => {
            if let Some(ns) = namespace.as_mut() {
                *ns = ns.to_lowercase();
            }
            *name = name.to_lowercase();
        }
        "pypi" => {
            *name = name.to_lowercase().replace('_', "-");
        }
        _ => {}
    }
}

/// Characters left unescaped when rendering a coordinate component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~')
    .remove(b':');

fn percent_decode(raw: &str) -> crate::Result<String> {
    let bytes = raw.as_bytes();
    let malformed = bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !bytes
                .get(i + 1..i + 3)
                .is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit))
    });
    if malformed {
        return Err(invalid(format!("malformed percent-escape in: {raw}")));
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| invalid(format!("percent-escape is not UTF-8: {raw}")))
}

fn percent_encode(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_maven() {
        let c = PackageCoordinate::parse("pkg:maven/com.acme/acme-lib@1.0.0").unwrap();
        assert_eq!(c.ty(), "maven");
        assert_eq!(c.namespace(), Some("com.acme"));
        assert_eq!(c.name(), "acme-lib");
        assert_eq!(c.version(), Some("1.0.0"));
        assert_eq!(c.canonical(), "pkg:maven/com.acme/acme-lib@1.0.0");
    }

    #[test]
    fn test_scheme_and_type_are_case_insensitive() {
        let a = PackageCoordinate::parse("PKG:Maven/foo/bar@1.2.3").unwrap();
        let b = PackageCoordinate::parse("pkg:maven/foo/bar@1.2.3").unwrap();
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_qualifier_order_does_not_matter() {
        let a = PackageCoordinate::parse("pkg:maven/foo/bar@1.2.3?type=jar&classifier=sources")
            .unwrap();
        let b = PackageCoordinate::parse("pkg:maven/foo/bar@1.2.3?Classifier=sources&type=jar")
            .unwrap();
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(
            a.canonical(),
            "pkg:maven/foo/bar@1.2.3?classifier=sources&type=jar"
        );
    }

    #[test]
    fn test_empty_qualifiers_are_dropped() {
        let c = PackageCoordinate::parse("pkg:npm/left-pad@1.3.0?foo=&bar=").unwrap();
        assert!(c.qualifiers().is_empty());
        assert_eq!(c.canonical(), "pkg:npm/left-pad@1.3.0");
    }

    #[test]
    fn test_scoped_npm_package() {
        let c = PackageCoordinate::parse("pkg:npm/%40Angular/Core@16.0.0").unwrap();
        assert_eq!(c.namespace(), Some("@angular"));
        assert_eq!(c.name(), "core");
        assert_eq!(c.canonical(), "pkg:npm/%40angular/core@16.0.0");

        let unencoded = PackageCoordinate::parse("pkg:npm/@angular/core@16.0.0").unwrap();
        assert_eq!(unencoded.canonical(), c.canonical());
    }

    #[test]
    fn test_pypi_name_normalization() {
        let c = PackageCoordinate::parse("pkg:pypi/Django_Rest@3.0").unwrap();
        assert_eq!(c.name(), "django-rest");
    }

    #[test]
    fn test_versionless_and_subpath() {
        let c = PackageCoordinate::parse("pkg:golang/github.com/gorilla/mux#./api/../v2").unwrap();
        assert_eq!(c.namespace(), Some("github.com/gorilla"));
        assert_eq!(c.name(), "mux");
        assert_eq!(c.version(), None);
        assert_eq!(c.subpath(), Some("api/v2"));
        assert_eq!(c.coordinates(), "pkg:golang/github.com/gorilla/mux");
    }

    #[test]
    fn test_coordinates_strip_qualifiers() {
        let c = PackageCoordinate::parse("pkg:maven/foo/bar@1.2.3?foo=bar").unwrap();
        assert_eq!(c.coordinates(), "pkg:maven/foo/bar@1.2.3");
    }

    #[test]
    fn test_reject_malformed() {
        assert!(PackageCoordinate::parse("maven/foo/bar@1.0").is_err());
        assert!(PackageCoordinate::parse("pkg:maven").is_err());
        assert!(PackageCoordinate::parse("pkg:/foo/bar").is_err());
        assert!(PackageCoordinate::parse("pkg:1maven/foo/bar").is_err());
        assert!(PackageCoordinate::parse("pkg:maven/foo/%zz@1.0").is_err());
        assert!(PackageCoordinate::parse("pkg:maven/foo/@1.0").is_err());
        assert!(PackageCoordinate::parse("").is_err());
    }

    #[test]
    fn test_reject_non_ascii_scheme() {
        // Multibyte characters straddling the scheme boundary.
        assert!(PackageCoordinate::parse("péé/foo").is_err());
        assert!(PackageCoordinate::parse("pkgé:npm/x").is_err());
        assert!(PackageCoordinate::parse("€").is_err());
        assert!(PackageCoordinate::parse("pkg:€/x@1.0").is_err());
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let c: PackageCoordinate = serde_json::from_str("\"pkg:NPM/Lodash@4.17.21\"").unwrap();
        assert_eq!(
            serde_json::to_string(&c).unwrap(),
            "\"pkg:npm/lodash@4.17.21\""
        );
    }
}
