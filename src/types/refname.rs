use std::fmt;

use crate::error::{Error, Result};

/// prefix of the legacy appstream branch
pub const APPSTREAM_PREFIX: &str = "appstream/";
/// prefix of the current appstream branch
pub const APPSTREAM2_PREFIX: &str = "appstream2/";

/// kind of installable ref
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefKind {
    App,
    Runtime,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::App => "app",
            RefKind::Runtime => "runtime",
        }
    }
}

/// a decomposed `KIND/ID/ARCH/BRANCH` ref
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageRef {
    pub kind: RefKind,
    pub id: String,
    pub arch: String,
    pub branch: String,
}

impl PackageRef {
    pub fn new(
        kind: RefKind,
        id: impl Into<String>,
        arch: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            arch: arch.into(),
            branch: branch.into(),
        }
    }

    /// parse `app/org.foo.Bar/x86_64/stable` style refs
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidRef(format!(
                "expected KIND/ID/ARCH/BRANCH: {}",
                name
            )));
        }

        let kind = match parts[0] {
            "app" => RefKind::App,
            "runtime" => RefKind::Runtime,
            other => {
                return Err(Error::InvalidRef(format!("unknown ref kind '{}': {}", other, name)))
            }
        };

        if parts[1..].iter().any(|p| p.is_empty()) {
            return Err(Error::InvalidRef(format!("empty ref component: {}", name)));
        }

        Ok(Self::new(kind, parts[1], parts[2], parts[3]))
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.kind.as_str(), self.id, self.arch, self.branch)
    }
}

/// is this an app or runtime ref
pub fn is_package_ref(name: &str) -> bool {
    PackageRef::parse(name).is_ok()
}

/// is this one of the refs whose commits carry flatpak metadata
/// (apps, runtimes and both appstream branches)
pub fn is_payload_ref(name: &str) -> bool {
    is_package_ref(name) || appstream_tail(name).is_some()
}

/// the `[SUBSET-]ARCH` part of an appstream ref
fn appstream_tail(name: &str) -> Option<&str> {
    name.strip_prefix(APPSTREAM_PREFIX)
        .or_else(|| name.strip_prefix(APPSTREAM2_PREFIX))
        .filter(|tail| !tail.is_empty() && !tail.contains('/'))
}

/// split an appstream ref into (subset, arch); subset is None for the plain branch
pub fn appstream_subset(name: &str) -> Option<(Option<&str>, &str)> {
    let tail = appstream_tail(name)?;
    match tail.rsplit_once('-') {
        Some((subset, arch)) if !subset.is_empty() && !arch.is_empty() => {
            Some((Some(subset), arch))
        }
        _ => Some((None, tail)),
    }
}

/// is this an appstream ref for a named subset, e.g. `appstream2/locale-x86_64`
pub fn is_subset_appstream_ref(name: &str) -> bool {
    matches!(appstream_subset(name), Some((Some(_), _)))
}

/// architecture encoded in a ref, if it has one
pub fn ref_arch(name: &str) -> Option<&str> {
    if let Some((_, arch)) = appstream_subset(name) {
        return Some(arch);
    }
    let mut parts = name.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("app" | "runtime"), Some(_), Some(arch), Some(_), None) if !arch.is_empty() => {
            Some(arch)
        }
        _ => None,
    }
}

/// 32-bit arch that a 64-bit arch can also run
pub fn compat_arch(arch: &str) -> Option<&'static str> {
    match arch {
        "x86_64" => Some("i386"),
        "aarch64" => Some("arm"),
        _ => None,
    }
}

/// arch filter for a partition: the arch itself plus its compat arch
pub fn partition_arches(arch: &str) -> Vec<String> {
    let mut arches = vec![arch.to_string()];
    if let Some(compat) = compat_arch(arch) {
        arches.push(compat.to_string());
    }
    arches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_ref() {
        let r = PackageRef::parse("app/org.foo.Bar/x86_64/stable").unwrap();
        assert_eq!(r.kind, RefKind::App);
        assert_eq!(r.id, "org.foo.Bar");
        assert_eq!(r.arch, "x86_64");
        assert_eq!(r.branch, "stable");
        assert_eq!(r.to_string(), "app/org.foo.Bar/x86_64/stable");

        let r = PackageRef::parse("runtime/org.foo.Platform/aarch64/1.0").unwrap();
        assert_eq!(r.kind, RefKind::Runtime);
    }

    #[test]
    fn test_parse_invalid_refs() {
        assert!(PackageRef::parse("app/org.foo.Bar/x86_64").is_err());
        assert!(PackageRef::parse("thing/org.foo.Bar/x86_64/stable").is_err());
        assert!(PackageRef::parse("app//x86_64/stable").is_err());
        assert!(PackageRef::parse("app/a/b/c/d").is_err());
    }

    #[test]
    fn test_ref_arch() {
        assert_eq!(ref_arch("app/org.foo.Bar/x86_64/stable"), Some("x86_64"));
        assert_eq!(ref_arch("runtime/org.foo.Platform/i386/1.0"), Some("i386"));
        assert_eq!(ref_arch("appstream/x86_64"), Some("x86_64"));
        assert_eq!(ref_arch("appstream2/aarch64"), Some("aarch64"));
        assert_eq!(ref_arch("appstream2/locale-x86_64"), Some("x86_64"));
        assert_eq!(ref_arch("ostree-metadata"), None);
        assert_eq!(ref_arch("random/ref"), None);
    }

    #[test]
    fn test_appstream_subset() {
        assert_eq!(appstream_subset("appstream2/x86_64"), Some((None, "x86_64")));
        assert_eq!(
            appstream_subset("appstream2/locale-x86_64"),
            Some((Some("locale"), "x86_64"))
        );
        assert_eq!(
            appstream_subset("appstream/my-subset-arm"),
            Some((Some("my-subset"), "arm"))
        );
        assert_eq!(appstream_subset("app/org.foo.Bar/x86_64/stable"), None);

        assert!(is_subset_appstream_ref("appstream2/locale-x86_64"));
        assert!(!is_subset_appstream_ref("appstream2/x86_64"));
    }

    #[test]
    fn test_payload_refs() {
        assert!(is_payload_ref("app/org.foo.Bar/x86_64/stable"));
        assert!(is_payload_ref("appstream/x86_64"));
        assert!(is_payload_ref("appstream2/locale-x86_64"));
        assert!(!is_payload_ref("ostree-metadata"));
        assert!(!is_payload_ref("appstream2/"));
    }

    #[test]
    fn test_partition_arches() {
        assert_eq!(partition_arches("x86_64"), vec!["x86_64", "i386"]);
        assert_eq!(partition_arches("aarch64"), vec!["aarch64", "arm"]);
        assert_eq!(partition_arches("riscv64"), vec!["riscv64"]);
    }
}
