//! Speech recognition sessions fed from a logical stream.
//!
//! Recognition providers are external. The router only needs to start a
//! session per (recognizer, locale) and push every frame into it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use voicegate_audio::opusrt::CompressedFrame;

use crate::error::RecognizeError;
use crate::logger::Logger;
use crate::stream::LogicalStream;
use crate::{log_debug, log_warn};

/// A recognition provider.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn start(
        &self,
        stream: &LogicalStream,
        locale: &str,
    ) -> Result<Box<dyn RecognitionSession>, RecognizeError>;
}

/// A running recognition session for one locale.
#[async_trait]
pub trait RecognitionSession: Send {
    fn locale(&self) -> &str;

    async fn push(&mut self, frame: &CompressedFrame) -> Result<(), RecognizeError>;

    async fn finish(&mut self) -> Result<(), RecognizeError>;
}

/// The live sessions of one stream, keyed by (recognizer, locale).
#[derive(Default)]
pub struct SessionSet {
    sessions: BTreeMap<(String, String), Box<dyn RecognitionSession>>,
}

impl SessionSet {
    /// Starts a session for every recognizer and locale. Failures are logged
    /// and skipped.
    pub async fn start(
        recognizers: &[Arc<dyn Recognizer>],
        stream: &LogicalStream,
        locales: &[String],
        logger: &Arc<dyn Logger>,
    ) -> Self {
        let mut sessions = BTreeMap::new();
        for rec in recognizers {
            for locale in locales {
                match rec.start(stream, locale).await {
                    Ok(session) => {
                        log_debug!(logger, "{}: {} session started ({})", stream.id, rec.name(), locale);
                        sessions.insert((rec.name().to_string(), locale.clone()), session);
                    }
                    Err(e) => {
                        log_warn!(logger, "{}: {} session for {} failed: {}", stream.id, rec.name(), locale, e);
                    }
                }
            }
        }
        Self { sessions }
    }

    /// Pushes `frame` into every session, removing any that fail.
    pub async fn push(&mut self, frame: &CompressedFrame, logger: &Arc<dyn Logger>) {
        let mut failed = Vec::new();
        for (key, session) in self.sessions.iter_mut() {
            if let Err(e) = session.push(frame).await {
                log_warn!(logger, "{} ({}) session dropped: {}", key.0, key.1, e);
                failed.push(key.clone());
            }
        }
        for key in failed {
            self.sessions.remove(&key);
        }
    }

    /// Finishes and removes every session.
    pub async fn finish(&mut self, logger: &Arc<dyn Logger>) {
        for ((name, locale), mut session) in std::mem::take(&mut self.sessions) {
            if let Err(e) = session.finish().await {
                log_warn!(logger, "{} ({}) finish failed: {}", name, locale, e);
            }
        }
    }

    /// Number of live sessions.
    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }
}
