use skillkit_core::SkillkitError;
use skillkit_llm::StreamChunk;
use skillkit_skills::TextStream;
use tokio::sync::mpsc;
use tracing::debug;

/// Forward the text deltas of an LLM stream into a [`TextStream`].
///
/// A mid-stream provider error becomes the final `Err` item. Dropping the
/// returned stream drops the provider receiver too, which stops the request.
pub fn text_stream(mut rx: mpsc::Receiver<StreamChunk>) -> TextStream {
    let (tx, stream) = TextStream::channel(64);
    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::TextDelta(text) if text.is_empty() => {}
                StreamChunk::TextDelta(text) => {
                    if tx.send(Ok(text)).await.is_err() {
                        debug!("text stream consumer went away");
                        return;
                    }
                }
                StreamChunk::Usage(usage) => {
                    debug!(
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        total = usage.total_tokens(),
                        "stream usage"
                    );
                }
                StreamChunk::Done(reason) => {
                    debug!(?reason, "stream finished");
                    return;
                }
                StreamChunk::Error(e) => {
                    let _ = tx.send(Err(SkillkitError::LlmProvider(e))).await;
                    return;
                }
            }
        }
    });
    stream
}
