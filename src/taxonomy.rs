use std::borrow::Borrow;
use std::fmt;

const GENUS_PREFIX: &str = "g__";

/// A full taxonomic lineage used as the primary key of a genus
///
/// Lineages are semicolon-delimited strings ending in the genus token,
/// e.g. `k__Bacteria;p__Firmicutes;...;g__Blautia`. The string is kept
/// verbatim and compared as an opaque key; all parsing of its parts lives here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lineage(String);

impl Lineage {
    pub fn new(lineage: impl Into<String>) -> Self {
        Self(lineage.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last rank of the lineage, including its `g__` prefix
    pub fn genus_token(&self) -> &str {
        self.0
            .rsplit(';')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }

    /// Returns the genus name for display, without the rank prefix
    ///
    /// Falls back to the raw token when the lineage does not end in a genus rank.
    pub fn genus_name(&self) -> &str {
        let token = self.genus_token();
        token.strip_prefix(GENUS_PREFIX).unwrap_or(token)
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Lineage {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Lineage {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Lineage {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genus_name() {
        let lineage = Lineage::new("k__Bacteria;p__Firmicutes;c__Clostridia;g__Blautia");
        assert_eq!(lineage.genus_token(), "g__Blautia");
        assert_eq!(lineage.genus_name(), "Blautia");
    }

    #[test]
    fn test_genus_name_without_prefix() {
        let lineage = Lineage::new("k__Bacteria;p__Firmicutes;unclassified");
        assert_eq!(lineage.genus_name(), "unclassified");
    }

    #[test]
    fn test_single_token_lineage() {
        let lineage = Lineage::new("g__Prevotella");
        assert_eq!(lineage.genus_name(), "Prevotella");
        assert_eq!(lineage.as_str(), "g__Prevotella");
    }
}
