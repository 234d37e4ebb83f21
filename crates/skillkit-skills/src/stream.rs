use futures::Stream;
use skillkit_core::Result;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Sending half of a [`TextStream`].
pub type TextSender = mpsc::Sender<Result<String>>;

/// A lazy, finite sequence of text chunks produced by a skill.
///
/// The stream can be consumed once. Dropping it closes the channel, and the
/// producer stops at its next send.
pub struct TextStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl TextStream {
    pub fn channel(capacity: usize) -> (TextSender, TextStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, TextStream { rx })
    }

    /// A stream that yields `text` once (nothing when empty) and ends.
    pub fn once(text: impl Into<String>) -> TextStream {
        let text = text.into();
        let (tx, stream) = Self::channel(1);
        if !text.is_empty() {
            let _ = tx.try_send(Ok(text));
        }
        stream
    }

    /// Next chunk, or `None` once the producer is finished.
    pub async fn next_chunk(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }

    /// Drain the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(chunk) = self.next_chunk().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream").finish_non_exhaustive()
    }
}
