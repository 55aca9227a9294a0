//! services/api/src/adapters/verse_api.rs
//!
//! This module contains the adapter for the verse lookup API (a bible-api.com
//! style service). It implements the `VerseProvider` port from the `core` crate.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use verse_companion_core::domain::{VerseContent, DEFAULT_TRANSLATION};
use verse_companion_core::ports::{PortError, PortResult, VerseProvider};

/// Shown when a searched reference does not resolve to a passage.
pub const VERSE_NOT_FOUND_MESSAGE: &str =
    "Could not find that verse. Try using a format like \"John 3:16\" or \"Psalm 23\".";

//=========================================================================================
// Wire Types
//=========================================================================================

/// The provider's response envelope, shared by `/random` and `/{reference}`.
#[derive(Debug, Deserialize)]
struct PassageResponse {
    reference: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    translation_name: Option<String>,
    #[serde(default)]
    verses: Option<Vec<VerseLine>>,
}

#[derive(Debug, Deserialize)]
struct VerseLine {
    verse: u32,
    text: String,
}

impl PassageResponse {
    fn translation(&self) -> String {
        self.translation_name
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TRANSLATION)
            .to_string()
    }

    /// The whole passage as a single verse entry. A blank reference or body
    /// is an error, same as a missing `text`.
    fn into_single(self) -> PortResult<VerseContent> {
        let translation = self.translation();
        let text = self
            .text
            .ok_or_else(|| PortError::Unexpected("Verse API response contained no text".to_string()))?;
        let reference = self.reference.trim().to_string();
        let text = text.trim().to_string();
        if reference.is_empty() || text.is_empty() {
            return Err(PortError::Unexpected(
                "Verse API response contained an empty reference or text".to_string(),
            ));
        }
        Ok(VerseContent {
            reference,
            text,
            translation,
        })
    }

    /// One entry per verse when the passage spans several, each labeled
    /// `"{reference} ({n})"`; otherwise the single-passage form.
    fn into_results(mut self) -> PortResult<Vec<VerseContent>> {
        let translation = self.translation();
        match self.verses.take() {
            Some(lines) if !lines.is_empty() => Ok(lines
                .into_iter()
                .map(|line| VerseContent {
                    reference: format!("{} ({})", self.reference, line.verse),
                    text: line.text.trim().to_string(),
                    translation: translation.clone(),
                })
                .collect()),
            _ => self.into_single().map(|content| vec![content]),
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `VerseProvider` port against a
/// bible-api.com style HTTP API.
#[derive(Clone)]
pub struct BibleApiAdapter {
    client: Client,
    base_url: String,
}

impl BibleApiAdapter {
    /// Creates a new `BibleApiAdapter`.
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds `{base}/{segment}` with the segment percent-encoded, so
    /// references like "John 3:16" stay a single path segment.
    fn endpoint(&self, segment: &str) -> PortResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PortError::Unexpected(format!("Invalid verse API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|()| PortError::Unexpected("Verse API base URL cannot have paths".to_string()))?
            .push(segment);
        Ok(url)
    }

    async fn fetch_passage(&self, url: Url) -> PortResult<PassageResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Verse API request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(PortError::NotFound(VERSE_NOT_FOUND_MESSAGE.to_string())),
            status if !status.is_success() => Err(PortError::Unexpected(format!(
                "Verse API returned status {}",
                status
            ))),
            _ => response
                .json::<PassageResponse>()
                .await
                .map_err(|e| PortError::Unexpected(format!("Verse API response malformed: {}", e))),
        }
    }
}

//=========================================================================================
// `VerseProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl VerseProvider for BibleApiAdapter {
    async fn random_verse(&self) -> PortResult<VerseContent> {
        let url = self.endpoint("random")?;
        self.fetch_passage(url).await?.into_single()
    }

    async fn search_passage(&self, query: &str) -> PortResult<Vec<VerseContent>> {
        let url = self.endpoint(query)?;
        self.fetch_passage(url).await?.into_results()
    }
}
