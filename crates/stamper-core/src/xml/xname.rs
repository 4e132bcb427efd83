use std::fmt;

/// Expanded XML name: namespace URI plus local part. Prefixes are a
/// serialization concern and never stored here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct XName {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl XName {
    pub fn new(namespace: &str, local_name: &str) -> Self {
        Self {
            namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
            local_name: local_name.to_string(),
        }
    }

    pub fn local(local_name: &str) -> Self {
        Self {
            namespace: None,
            local_name: local_name.to_string(),
        }
    }

    /// True when this name is `local` in namespace `ns`.
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.local_name == local && self.namespace.as_deref() == Some(ns)
    }

    pub fn in_namespace(&self, ns: &str) -> bool {
        self.namespace.as_deref() == Some(ns)
    }
}

impl fmt::Display for XName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XAttribute {
    pub name: XName,
    pub value: String,
}

impl XAttribute {
    pub fn new(name: XName, value: &str) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }

    /// Namespace declarations (`xmlns`, `xmlns:p`) travel as attributes.
    pub fn is_namespace_declaration(&self) -> bool {
        match &self.name.namespace {
            None => self.name.local_name == "xmlns",
            Some(ns) => ns == super::namespaces::XMLNS::NS,
        }
    }
}
