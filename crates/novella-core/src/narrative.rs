//! Chapter rendering.
//!
//! The renderer turns the scene's best decision and a background snapshot
//! into prose and hands it to a [`ChapterSink`], which assigns the chapter
//! its number.

use std::future::Future;

use novella_types::{Background, Decision};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SimulationError;
use crate::oracle::{OracleContext, TextOracle, is_failure};
use crate::prompt::Template;
use crate::store::StoreError;

/// Persists rendered chapters.
pub trait ChapterSink {
    /// Store `text` as the next chapter and return its number.
    ///
    /// Numbers start at 1 and increase by one per chapter.
    fn write_chapter(&self, text: &str) -> Result<u32, StoreError>;
}

/// Renders a scene's outcome into prose.
pub trait NarrativeRenderer {
    /// Render and persist a chapter for `decision`.
    ///
    /// Returns the chapter number, or `None` when nothing was written.
    fn render(
        &self,
        decision: &Decision,
        background: &Background,
    ) -> impl Future<Output = Result<Option<u32>, SimulationError>>;
}

#[derive(Debug, Serialize)]
struct NarrativePrompt<'a> {
    decision: &'a Decision,
    background: &'a Background,
}

/// [`NarrativeRenderer`] asking the text oracle and writing to a sink.
#[derive(Debug)]
pub struct OracleNarrator<'a, O, K> {
    ctx: OracleContext<'a, O>,
    sink: &'a K,
}

impl<'a, O: TextOracle, K: ChapterSink> OracleNarrator<'a, O, K> {
    /// A narrator asking through `ctx` and writing to `sink`.
    pub const fn new(ctx: OracleContext<'a, O>, sink: &'a K) -> Self {
        Self { ctx, sink }
    }
}

impl<O: TextOracle, K: ChapterSink> NarrativeRenderer for OracleNarrator<'_, O, K> {
    async fn render(
        &self,
        decision: &Decision,
        background: &Background,
    ) -> Result<Option<u32>, SimulationError> {
        let scene_id = &background.world.scene_id;
        let prompt = NarrativePrompt {
            decision,
            background,
        };
        let text = self.ctx.ask(Template::Narrative, &prompt).await?;
        if is_failure(&text) || text.trim().is_empty() {
            warn!(scene_id = %scene_id, response = %text, "chapter generation failed, skipping chapter");
            return Ok(None);
        }
        let chapter = self
            .sink
            .write_chapter(&text)
            .map_err(|source| SimulationError::store("chapter", source))?;
        info!(scene_id = %scene_id, chapter, "chapter written");
        Ok(Some(chapter))
    }
}
