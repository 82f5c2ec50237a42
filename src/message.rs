//! Slack Block Kit reply formatting.
//!
//! Builds the message posted back to the channel: the answer, a trace-id
//! context line, the source list, and 👍/👎 feedback buttons whose values
//! carry `{trace_id}|{helpful}` for the feedback endpoint.

use serde_json::{json, Value};

pub fn build_slack_message(answer: &str, sources: &[String], trace_id: &str) -> Value {
    let src_text = if sources.is_empty() {
        "• (no sources)".to_string()
    } else {
        sources
            .iter()
            .map(|s| format!("• `{}`", s))
            .collect::<Vec<_>>()
            .join("\n")
    };

    json!({
        "blocks": [
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": answer }
            },
            {
                "type": "context",
                "elements": [
                    { "type": "mrkdwn", "text": format!("*trace_id:* `{}`", trace_id) }
                ]
            },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*Sources:*\n{}", src_text) }
            },
            {
                "type": "actions",
                "elements": [
                    {
                        "type": "button",
                        "text": { "type": "plain_text", "text": "👍 Helpful" },
                        "value": format!("{}|true", trace_id),
                        "action_id": "feedback_yes"
                    },
                    {
                        "type": "button",
                        "text": { "type": "plain_text", "text": "👎 Not helpful" },
                        "value": format!("{}|false", trace_id),
                        "action_id": "feedback_no"
                    }
                ]
            }
        ]
    })
}
