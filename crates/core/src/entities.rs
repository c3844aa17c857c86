//! Place and preference entities shared across crates

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

/// A city or town that can appear in search results and on a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    /// Quality rating on a 0-5 scale
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub coastal: bool,
}

impl City {
    /// Minimal city with only a name and country, as returned by free-text sources
    pub fn named(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            region: None,
            coordinates: None,
            rating: 0.0,
            description: String::new(),
            tags: Vec::new(),
            highlights: Vec::new(),
            coastal: false,
        }
    }

    /// Key used to merge the same place reported by several sources
    pub fn identity_key(&self) -> String {
        normalize_name(&self.name)
    }

    /// Case-insensitive name comparison
    pub fn matches_name(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    /// Whether any tag equals `tag`, ignoring case
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Lowercased description, tags and highlights, used for term scanning
    pub fn searchable_text(&self) -> String {
        let mut text = self.description.to_lowercase();
        for part in self.tags.iter().chain(self.highlights.iter()) {
            text.push(' ');
            text.push_str(&part.to_lowercase());
        }
        text
    }
}

/// Lowercase, trim and collapse inner whitespace
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A preference inferred from conversation (e.g. `pace = slow`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub key: String,
    pub value: String,
    pub recorded_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_normalizes() {
        let a = City::named("  San   Sebastián ", "Spain");
        let b = City::named("san sebastián", "Spain");
        assert_eq!(a.identity_key(), b.identity_key());
        assert!(a.matches_name("SAN SEBASTIÁN"));
    }

    #[test]
    fn test_searchable_text_includes_all_fields() {
        let mut city = City::named("Comporta", "Portugal");
        city.description = "Quiet Coastal village".to_string();
        city.tags = vec!["Beach".to_string()];
        city.highlights = vec!["Rice fields".to_string()];
        let text = city.searchable_text();
        assert!(text.contains("coastal"));
        assert!(text.contains("beach"));
        assert!(text.contains("rice fields"));
    }

    #[test]
    fn test_has_tag_ignores_case() {
        let mut city = City::named("Ghent", "Belgium");
        city.tags = vec!["Culture".to_string()];
        assert!(city.has_tag("culture"));
        assert!(!city.has_tag("beach"));
    }
}
