use rcgen::SanType;

/// DNS names listed in the Subject Alternative Name extension.
///
/// Entries are not checked for DNS syntax; the CA decides what it accepts.
/// A list built with [`From`] or [`AltNames::push`] ends up in the request
/// exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AltNames(Vec<String>);

impl AltNames {
    /// Builds the list used for a server certificate: `fqdn` first, then
    /// `additional`. Entries are trimmed, empty ones and duplicates dropped.
    pub fn for_fqdn<I, S>(fqdn: &str, additional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = Self::default();
        names.push_unique(fqdn);
        for name in additional {
            names.push_unique(name);
        }
        names
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    fn push_unique(&mut self, name: impl Into<String>) {
        let name = name.into();
        let name = name.trim();
        if !name.is_empty() && !self.0.iter().any(|known| known == name) {
            self.0.push(name.to_owned());
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_san_type(self) -> Vec<SanType> {
        self.0.into_iter().map(SanType::DnsName).collect()
    }
}

impl From<Vec<String>> for AltNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl<'a> IntoIterator for &'a AltNames {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
