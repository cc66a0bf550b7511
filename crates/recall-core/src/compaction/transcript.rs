//! Transcript rendering and the summarization prompt.

use crate::session::Turn;

/// Render turns chronologically, one timestamped line per speaker.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| {
            let time = t.timestamp.format("%H:%M:%S");
            format!(
                "[{time}] User: {}\n[{time}] Assistant: {}",
                t.user_message, t.assistant_response
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap a transcript with the extraction instructions sent to the summarizer.
pub fn summary_prompt(transcript: &str) -> String {
    format!(
        "Summarize this conversation segment, preserving key information:\n\n\
         {transcript}\n\n\
         Extract:\n\
         1. Main topics discussed\n\
         2. Important decisions or conclusions\n\
         3. URLs or resources mentioned\n\
         4. Key facts or data points\n\
         5. Action items or next steps\n\n\
         Provide a structured summary that maintains searchable context."
    )
}
