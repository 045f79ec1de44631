//! Prompts advertised by the agent's tool server

use insight_core::{InsightError, Result};
use insight_mcp::types::PromptArgument;
use insight_mcp::Prompt;
use std::collections::HashMap;

/// Analysis prompt for business-focused YouTube videos. Pairs with the
/// `fetch_youtube_transcript` and `web_search` tools.
pub struct BusinessInsightPrompt;

impl Prompt for BusinessInsightPrompt {
    fn name(&self) -> &str {
        "business_insight"
    }

    fn description(&self) -> &str {
        "Analyze a business-focused YouTube video and produce a comprehensive report"
    }

    fn arguments(&self) -> Vec<PromptArgument> {
        vec![PromptArgument {
            name: "video_link".to_string(),
            description: Some("Link to the YouTube video to analyze".to_string()),
            required: Some(true),
        }]
    }

    fn render(&self, args: &HashMap<String, String>) -> Result<String> {
        let video_link = args.get("video_link").ok_or_else(|| {
            InsightError::prompt(self.name(), "Missing required argument 'video_link'")
        })?;

        Ok(format!(
            "You are an expert at distilling the important points discussed in a \
transcript and extracting the main business idea behind it. You will be given the \
transcript of a YouTube video focused on business discussions.

As a shrewd business expert, do the following:

1) Understand the business context being discussed and derive a title for your response.
2) Summarize the content presented to you and extract the key insights.
3) If the given context does not discuss any business, or is entirely unrelated, use \
the tools at your disposal to suggest ideas the user can explore instead.
4) Once the title, summary, and insights are settled, search the internet to supplement \
your understanding with additional information about the business.
5) Identify the competitors in the space, the initial investment, and the operational \
costs involved.
6) Finally, give a comprehensive and exhaustive report on the business idea covering \
edge cases, risks, and profit opportunities.

Note: the context comes from a YouTube video and you are given its link.

The link of the YouTube video is: {video_link}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_link_substituted() {
        let mut args = HashMap::new();
        args.insert(
            "video_link".to_string(),
            "https://www.youtube.com/watch?v=abc123".to_string(),
        );

        let text = BusinessInsightPrompt.render(&args).unwrap();
        assert!(text.ends_with("https://www.youtube.com/watch?v=abc123"));
        assert!(text.contains("business expert"));
    }

    #[test]
    fn missing_link_is_an_error() {
        let err = BusinessInsightPrompt.render(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("video_link"));
    }
}
