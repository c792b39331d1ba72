//! Card-board export: one card per recipe, ingredients kept in checklists.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{normalizer::RawRecipe, schema::Label};

#[derive(Debug, Error)]
pub enum CardError {
    #[error("could not read card export: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed card export: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardExport {
    pub cards: Vec<Card>,
}

impl CardExport {
    pub fn from_json(json: &str) -> Result<Self, CardError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn open_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| !card.closed)
    }
}

/// Loads an export file, leaving out closed cards.
pub fn load_cards(path: impl AsRef<Path>) -> Result<Vec<Card>, CardError> {
    let data = fs::read_to_string(path)?;
    let export = CardExport::from_json(&data)?;

    let total = export.cards.len();
    let open: Vec<Card> = export.cards.into_iter().filter(|card| !card.closed).collect();
    log::debug!("Loaded {} open cards of {}", open.len(), total);

    Ok(open)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    pub desc: String,
    pub url: String,
    pub checklists: Vec<Checklist>,
    pub labels: Vec<CardLabel>,
    pub attachments: Vec<Attachment>,
    pub cover: Option<Cover>,
    pub closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Checklist {
    pub name: String,
    pub check_items: Vec<CheckItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckItem {
    pub name: String,
    pub checked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardLabel {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cover {
    pub id_attachment: Option<String>,
}

impl Card {
    /// Items of every checklist whose name mentions ingredients.
    pub fn ingredient_lines(&self) -> Vec<String> {
        self.checklists
            .iter()
            .filter(|checklist| checklist.name.to_lowercase().contains("ingredient"))
            .flat_map(|checklist| checklist.check_items.iter())
            .map(|item| item.name.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    pub fn cover_url(&self) -> Option<&str> {
        let id = self.cover.as_ref()?.id_attachment.as_deref()?;
        self.attachments
            .iter()
            .find(|attachment| attachment.id == id)
            .map(|attachment| attachment.url.as_str())
    }
}

impl From<&Card> for RawRecipe {
    fn from(card: &Card) -> Self {
        let ingredient_lines = card.ingredient_lines();

        Self {
            name: card.name.clone(),
            description: card.desc.clone(),
            url: card.url.clone(),
            // No checklist means the description is scanned instead
            ingredient_lines: (!ingredient_lines.is_empty()).then_some(ingredient_lines),
            step_lines: None,
            labels: card
                .labels
                .iter()
                .filter(|label| !label.name.trim().is_empty())
                .map(|label| Label::named(&label.name, label.color.as_deref().unwrap_or("")))
                .collect(),
            photos: card
                .attachments
                .iter()
                .map(|attachment| attachment.url.clone())
                .filter(|url| !url.trim().is_empty())
                .collect(),
            main_photo: card.cover_url().map(str::to_string),
        }
    }
}
