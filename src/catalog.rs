use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One character entry from the catalog. Fields absent in the JSON
/// deserialize to empty strings, which simply never match a filter.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct Character {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub game: String,
    /// "f" or "m"
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub lang: String,
    /// Directory relative to the catalog's source_base.
    #[serde(default)]
    pub source: String,
}

impl Character {
    /// Standardized dataset ID: `{game}_{char}_{gender}_{lang}`, with the
    /// character name lowercased and spaces removed.
    pub fn std_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.game,
            self.name.to_lowercase().replace(' ', ""),
            self.gender,
            self.lang
        )
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct Catalog {
    #[serde(default)]
    pub source_base: String,
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        Ok(catalog)
    }

    pub fn find(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }
}

#[derive(Default, Clone, Debug)]
pub struct CharacterFilter {
    pub gender: Option<String>,
    pub game: Option<String>,
    pub lang: Option<String>,
    pub ids: Option<Vec<String>>,
    pub limit: Option<usize>,
}

/// Returns the ordered sub-sequence of characters matching every supplied
/// filter. Absent filters impose no constraint.
pub fn filter_characters(characters: &[Character], filter: &CharacterFilter) -> Vec<Character> {
    let mut filtered: Vec<Character> = characters
        .iter()
        .filter(|c| filter.gender.as_ref().map_or(true, |g| &c.gender == g))
        .filter(|c| filter.game.as_ref().map_or(true, |g| &c.game == g))
        .filter(|c| filter.lang.as_ref().map_or(true, |l| &c.lang == l))
        .filter(|c| filter.ids.as_ref().map_or(true, |ids| ids.contains(&c.id)))
        .cloned()
        .collect();

    if let Some(limit) = filter.limit {
        filtered.truncate(limit);
    }
    filtered
}
