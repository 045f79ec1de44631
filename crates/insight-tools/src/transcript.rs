use async_trait::async_trait;
use insight_core::{InsightError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::Tool;

const DEFAULT_ENDPOINT: &str = "https://www.youtube.com/api/timedtext";
const DEFAULT_LANGUAGE: &str = "en";

/// Fetches the caption track of a YouTube video and flattens it into a
/// single transcript string.
#[derive(Debug, Clone)]
pub struct TranscriptTool {
    http: reqwest::Client,
    endpoint: String,
    default_language: String,
}

impl TranscriptTool {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Caption language used when the caller does not pass one.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }
}

impl Default for TranscriptTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptArgs {
    video_id: String,
    #[serde(default)]
    language: Option<String>,
}

/// Shape of the `fmt=json3` timedtext payload. Caption events without text
/// segments (window definitions and the like) deserialize to empty vectors.
#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(default)]
    events: Vec<CaptionEvent>,
}

#[derive(Debug, Deserialize)]
struct CaptionEvent {
    #[serde(default)]
    segs: Vec<CaptionSegment>,
}

#[derive(Debug, Deserialize)]
struct CaptionSegment {
    #[serde(default)]
    utf8: String,
}

/// Concatenate every segment of every caption event, in track order.
fn format_transcript(track: &CaptionTrack) -> String {
    let mut snippets: Vec<&str> = Vec::new();
    for event in &track.events {
        for seg in &event.segs {
            snippets.push(seg.utf8.as_str());
        }
    }
    snippets.concat()
}

#[async_trait]
impl Tool for TranscriptTool {
    fn name(&self) -> &str {
        "fetch_youtube_transcript"
    }

    fn description(&self) -> &str {
        "Fetch the transcript of a YouTube video given its video id"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "video_id": {
                    "type": "string",
                    "description": "Video id, e.g. for https://www.youtube.com/watch?v=12345 the id is 12345"
                },
                "language": {
                    "type": "string",
                    "description": "Caption language code (default: en)"
                }
            },
            "required": ["video_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let args: TranscriptArgs = serde_json::from_value(args).map_err(|e| {
            InsightError::tool(self.name(), format!("Invalid arguments: {e}"))
        })?;

        if args.video_id.trim().is_empty() {
            return Err(InsightError::tool(self.name(), "video_id cannot be empty"));
        }
        let language = args
            .language
            .unwrap_or_else(|| self.default_language.clone());

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("v", args.video_id.as_str()),
                ("lang", language.as_str()),
                ("fmt", "json3"),
            ])
            .send()
            .await
            .map_err(|e| {
                InsightError::tool(self.name(), format!("Transcript request failed: {e}"))
            })?
            .error_for_status()
            .map_err(|e| InsightError::tool(self.name(), format!("Transcript API error: {e}")))?;

        let body = response.text().await.map_err(|e| {
            InsightError::tool(self.name(), format!("Failed to read transcript body: {e}"))
        })?;

        // The endpoint answers 200 with an empty body when no track exists.
        if body.trim().is_empty() {
            return Err(InsightError::tool(
                self.name(),
                format!("No transcript available for video '{}'", args.video_id),
            ));
        }

        let track: CaptionTrack = serde_json::from_str(&body).map_err(|e| {
            InsightError::tool(self.name(), format!("Invalid transcript payload: {e}"))
        })?;

        let transcript = format_transcript(&track);
        if transcript.is_empty() {
            return Err(InsightError::tool(
                self.name(),
                format!("Transcript for video '{}' is empty", args.video_id),
            ));
        }

        debug!(
            "Fetched transcript for video '{}' ({} chars)",
            args.video_id,
            transcript.len()
        );

        Ok(Value::String(transcript))
    }
}
