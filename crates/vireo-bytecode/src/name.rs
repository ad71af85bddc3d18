//! Qualified names and multinames
//!
//! A script's global namespace binds values under *qualified keys*: the
//! plain name for the public namespace, `"uri::name"` otherwise. A
//! [`Multiname`] is either already fully qualified or carries a namespace
//! set that must be matched against a namespace object to pick the one
//! qualifying key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespace, identified by its URI. The public namespace is the empty
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace(pub String);

impl Namespace {
    /// The public (unnamed) namespace.
    pub fn public() -> Self {
        Namespace(String::new())
    }

    /// Whether this is the public namespace.
    pub fn is_public(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_public() {
            write!(f, "public")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A fully qualified name: a namespace plus a local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    /// The qualifying namespace.
    pub ns: Namespace,
    /// The local name.
    pub name: String,
}

impl QName {
    /// Create a qualified name in the given namespace.
    pub fn new(ns: Namespace, name: impl Into<String>) -> Self {
        Self {
            ns,
            name: name.into(),
        }
    }

    /// Create a qualified name in the public namespace.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new(Namespace::public(), name)
    }

    /// The key this name occupies in a global namespace object.
    pub fn qualified_key(&self) -> String {
        qualified_key(&self.ns, &self.name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_key())
    }
}

/// Render the global-namespace key for a name in a namespace.
pub fn qualified_key(ns: &Namespace, name: &str) -> String {
    if ns.is_public() {
        name.to_string()
    } else {
        format!("{}::{}", ns.0, name)
    }
}

/// A name as it appears at a reference site: either fully qualified, or a
/// local name with a set of candidate namespaces that must be matched
/// against a namespace object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiname {
    /// A fully qualified name.
    QName(QName),
    /// An ambiguous name with a candidate namespace set.
    Multi {
        /// Candidate namespaces, probed in order.
        ns_set: Vec<Namespace>,
        /// The local name.
        name: String,
    },
}

impl Multiname {
    /// Whether this name is already fully qualified.
    pub fn is_qname(&self) -> bool {
        matches!(self, Multiname::QName(_))
    }

    /// The qualified key, if this name is fully qualified.
    pub fn qualified_key(&self) -> Option<String> {
        match self {
            Multiname::QName(qname) => Some(qname.qualified_key()),
            Multiname::Multi { .. } => None,
        }
    }

    /// The local name, regardless of qualification.
    pub fn local_name(&self) -> &str {
        match self {
            Multiname::QName(qname) => &qname.name,
            Multiname::Multi { name, .. } => name,
        }
    }

    /// Parse a simple dotted/qualified string form into a qualified name.
    ///
    /// `"Q::Foo"` splits on the last `"::"` into namespace `Q` and local
    /// name `Foo`; a bare `"Foo"` is public.
    pub fn from_simple_name(simple: &str) -> Self {
        match simple.rfind("::") {
            Some(pos) => Multiname::QName(QName::new(
                Namespace(simple[..pos].to_string()),
                &simple[pos + 2..],
            )),
            None => Multiname::QName(QName::public(simple)),
        }
    }
}

impl fmt::Display for Multiname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Multiname::QName(qname) => write!(f, "{}", qname),
            Multiname::Multi { ns_set, name } => {
                write!(f, "{{")?;
                for (i, ns) in ns_set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ns)?;
                }
                write!(f, "}}::{}", name)
            }
        }
    }
}

impl From<QName> for Multiname {
    fn from(qname: QName) -> Self {
        Multiname::QName(qname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_qualified_key() {
        let qname = QName::public("Foo");
        assert_eq!(qname.qualified_key(), "Foo");
    }

    #[test]
    fn test_namespaced_qualified_key() {
        let qname = QName::new(Namespace("flash.display".to_string()), "Sprite");
        assert_eq!(qname.qualified_key(), "flash.display::Sprite");
    }

    #[test]
    fn test_from_simple_name_bare() {
        let mn = Multiname::from_simple_name("Foo");
        assert!(mn.is_qname());
        assert_eq!(mn.qualified_key().unwrap(), "Foo");
    }

    #[test]
    fn test_from_simple_name_qualified() {
        let mn = Multiname::from_simple_name("Q::Foo");
        match &mn {
            Multiname::QName(qname) => {
                assert_eq!(qname.ns, Namespace("Q".to_string()));
                assert_eq!(qname.name, "Foo");
            }
            _ => panic!("Expected QName"),
        }
        assert_eq!(mn.qualified_key().unwrap(), "Q::Foo");
    }

    #[test]
    fn test_from_simple_name_nested_namespace() {
        // Split is on the last separator
        let mn = Multiname::from_simple_name("a::b::C");
        match &mn {
            Multiname::QName(qname) => {
                assert_eq!(qname.ns, Namespace("a::b".to_string()));
                assert_eq!(qname.name, "C");
            }
            _ => panic!("Expected QName"),
        }
    }

    #[test]
    fn test_multi_is_not_qname() {
        let mn = Multiname::Multi {
            ns_set: vec![Namespace::public(), Namespace("Q".to_string())],
            name: "Foo".to_string(),
        };
        assert!(!mn.is_qname());
        assert!(mn.qualified_key().is_none());
        assert_eq!(mn.local_name(), "Foo");
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(QName::public("Foo").to_string(), "Foo");
        assert_eq!(
            Multiname::from_simple_name("Q::Foo").to_string(),
            "Q::Foo"
        );
        let mn = Multiname::Multi {
            ns_set: vec![Namespace::public(), Namespace("Q".to_string())],
            name: "Foo".to_string(),
        };
        assert_eq!(mn.to_string(), "{public, Q}::Foo");
    }
}
