//! Model reply → review comments.
//!
//! The model is asked for JSON but tends to wrap it in prose or code fences,
//! so the object between the first `{` and the last `}` is parsed.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ReplyError;

/// Comment suggested by the model: a display line of one file's section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewComment {
    pub path: String,
    pub display_line: u32,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    #[serde(default, alias = "file", alias = "path")]
    filename: Option<String>,
    #[serde(default)]
    comments: Vec<ReplyComment>,
}

#[derive(Debug, Deserialize)]
struct ReplyComment {
    #[serde(default, alias = "filename", alias = "file")]
    path: Option<String>,
    line: u32,
    #[serde(alias = "body")]
    comment: String,
}

/// Parse one model reply. Comments without a path inherit the top-level
/// `filename`, then `default_path`; comments with none of those are dropped.
pub fn parse_model_reply(
    reply: &str,
    default_path: Option<&str>,
) -> Result<Vec<ReviewComment>, ReplyError> {
    let start = reply.find('{').ok_or(ReplyError::NoJsonObject)?;
    let end = reply.rfind('}').ok_or(ReplyError::NoJsonObject)?;
    if end < start {
        return Err(ReplyError::NoJsonObject);
    }
    let envelope: ReplyEnvelope = serde_json::from_str(&reply[start..=end])?;

    let fallback = envelope.filename.as_deref().or(default_path);
    let mut out = Vec::with_capacity(envelope.comments.len());
    for c in envelope.comments {
        let Some(path) = c.path.as_deref().or(fallback) else {
            warn!("feedback: comment at line {} has no file, dropped", c.line);
            continue;
        };
        out.push(ReviewComment {
            path: path.to_string(),
            display_line: c.line,
            body: c.comment,
        });
    }
    debug!("feedback: parsed {} comments", out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_wrapped_in_prose() {
        let reply = "Sure! ```json\n{\"filename\": \"a.rs\", \"chunk\": 1, \"comments\": [{\"line\": 2, \"comment\": \"Use ?\"}]}\n```";
        let out = parse_model_reply(reply, None).unwrap();
        assert_eq!(
            out,
            vec![ReviewComment {
                path: "a.rs".into(),
                display_line: 2,
                body: "Use ?".into()
            }]
        );
    }

    #[test]
    fn per_comment_path_wins() {
        let reply = r#"{"comments": [{"path": "b.rs", "line": 7, "body": "x"}, {"line": 1, "comment": "y"}]}"#;
        let out = parse_model_reply(reply, Some("a.rs")).unwrap();
        assert_eq!(out[0].path, "b.rs");
        assert_eq!(out[1].path, "a.rs");
    }

    #[test]
    fn pathless_comments_are_dropped() {
        let reply = r#"{"comments": [{"line": 1, "comment": "y"}]}"#;
        assert!(parse_model_reply(reply, None).unwrap().is_empty());
    }

    #[test]
    fn malformed_replies_are_errors() {
        assert!(matches!(
            parse_model_reply("no json here", None),
            Err(ReplyError::NoJsonObject)
        ));
        assert!(matches!(
            parse_model_reply("} oops {", None),
            Err(ReplyError::NoJsonObject)
        ));
        assert!(matches!(
            parse_model_reply("{\"comments\": [{\"line\": \"x\"}]}", None),
            Err(ReplyError::Serde(_))
        ));
    }
}
