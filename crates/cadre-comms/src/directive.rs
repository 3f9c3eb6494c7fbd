//! Send-directive parsing out of free-form plan text.
//!
//! Worker plans are prose, but any line of the shape
//! `<Email|Chat|Reply> at HH:MM to <target>[ cc <t>, ..][ bcc <t>, ..]: <content>`
//! is a send directive. Email content is `subject | body`; chat and reply
//! content is the body alone. Replies address a prior message by id:
//! `Reply at HH:MM to [<message-id>]: <body>`.
//!
//! Parsing is strict. Lines that start with a directive verb but do not
//! match the grammar are rejected with a typed error rather than guessed
//! at; lines that do not start with a verb are ordinary prose and ignored.

use cadre_types::MessageId;
use uuid::Uuid;

use crate::error::DirectiveError;

/// The directive verb, determining channel and threading behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveVerb {
    /// Send an email (content carries `subject | body`).
    Email,
    /// Send a chat message.
    Chat,
    /// Reply to a previously received message on its original channel.
    Reply,
}

/// The addressee of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveTarget {
    /// A worker name or group keyword, resolved at dispatch time.
    Name(String),
    /// The message being replied to.
    ReplyTo(MessageId),
}

/// One parsed send directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// The verb this line started with.
    pub verb: DirectiveVerb,
    /// Hour of the simulated day (0-23).
    pub hour: u8,
    /// Minute of the hour (0-59).
    pub minute: u8,
    /// Who the message goes to.
    pub target: DirectiveTarget,
    /// Carbon-copied targets (email only; ignored for chat).
    pub cc: Vec<String>,
    /// Blind carbon-copied targets (email only; ignored for chat).
    pub bcc: Vec<String>,
    /// Email subject; `None` for chat and replies.
    pub subject: Option<String>,
    /// Message body.
    pub body: String,
}

/// A directive line that failed to parse, kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    /// The offending line, verbatim.
    pub line: String,
    /// Why it was rejected.
    pub error: DirectiveError,
}

/// The outcome of scanning one plan text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDirectives {
    /// Directives that matched the grammar, in plan order.
    pub accepted: Vec<Directive>,
    /// Lines that started with a verb but were malformed.
    pub rejected: Vec<RejectedLine>,
}

/// Scan plan text for send directives.
///
/// Prose lines are skipped. A line beginning with `Email`, `Chat`, or
/// `Reply` (optionally behind a `-` or `*` bullet) must match the grammar
/// exactly or it lands in [`ParsedDirectives::rejected`].
pub fn parse_plan_text(text: &str) -> ParsedDirectives {
    let mut out = ParsedDirectives::default();
    for line in text.lines() {
        let trimmed = strip_bullet(line.trim());
        let Some(verb) = leading_verb(trimmed) else {
            continue;
        };
        match parse_directive_line(verb, trimmed) {
            Ok(directive) => out.accepted.push(directive),
            Err(error) => out.rejected.push(RejectedLine {
                line: line.to_string(),
                error,
            }),
        }
    }
    out
}

/// Strip a leading `- ` or `* ` list bullet.
fn strip_bullet(line: &str) -> &str {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line)
        .trim_start()
}

/// Identify the directive verb a line starts with, if any.
///
/// Matching is case-insensitive on the first word only; everything after
/// the verb is parsed strictly.
fn leading_verb(line: &str) -> Option<DirectiveVerb> {
    let first = line.split_whitespace().next()?;
    match first.to_ascii_lowercase().as_str() {
        "email" => Some(DirectiveVerb::Email),
        "chat" => Some(DirectiveVerb::Chat),
        "reply" => Some(DirectiveVerb::Reply),
        _ => None,
    }
}

/// Parse a full directive line whose verb has already been identified.
fn parse_directive_line(verb: DirectiveVerb, line: &str) -> Result<Directive, DirectiveError> {
    // Consume the verb word.
    let rest = line
        .split_once(char::is_whitespace)
        .map(|(_, r)| r.trim_start())
        .ok_or_else(|| DirectiveError::BadTime(line.to_string()))?;

    // `at HH:MM`
    let rest = rest
        .strip_prefix("at ")
        .ok_or_else(|| DirectiveError::BadTime(line.to_string()))?
        .trim_start();
    let (time_token, rest) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| DirectiveError::BadTime(line.to_string()))?;
    let (hour, minute) = parse_time(time_token)?;

    // `to <addressing>: <content>`
    let rest = rest
        .trim_start()
        .strip_prefix("to ")
        .ok_or_else(|| DirectiveError::MissingTarget(line.to_string()))?;
    let (addressing, content) = rest
        .split_once(':')
        .ok_or_else(|| DirectiveError::MissingContent(line.to_string()))?;

    let (target_str, cc, bcc) = parse_addressing(addressing, line)?;
    let target = parse_target(verb, target_str, line)?;
    let (subject, body) = parse_content(verb, content, line)?;

    Ok(Directive {
        verb,
        hour,
        minute,
        target,
        cc,
        bcc,
        subject,
        body,
    })
}

/// Parse `HH:MM` into a validated (hour, minute) pair.
fn parse_time(token: &str) -> Result<(u8, u8), DirectiveError> {
    let bad = || DirectiveError::BadTime(token.to_string());
    let (h, m) = token.split_once(':').ok_or_else(bad)?;
    let hour: u8 = h.parse().map_err(|_| bad())?;
    let minute: u8 = m.parse().map_err(|_| bad())?;
    if hour > 23 || minute > 59 {
        return Err(bad());
    }
    Ok((hour, minute))
}

/// Split the addressing clause into target, cc list, and bcc list.
fn parse_addressing<'a>(
    addressing: &'a str,
    line: &str,
) -> Result<(&'a str, Vec<String>, Vec<String>), DirectiveError> {
    let (rest, bcc) = match addressing.split_once(" bcc ") {
        Some((before, list)) => (before, split_target_list(list)),
        None => (addressing, Vec::new()),
    };
    let (target, cc) = match rest.split_once(" cc ") {
        Some((before, list)) => (before, split_target_list(list)),
        None => (rest, Vec::new()),
    };
    let target = target.trim();
    if target.is_empty() {
        return Err(DirectiveError::MissingTarget(line.to_string()));
    }
    Ok((target, cc, bcc))
}

/// Split a comma-separated target list, dropping empty entries.
fn split_target_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interpret the target for the given verb.
///
/// Replies must address a bracketed message id; the other verbs take a
/// name or group keyword, resolved later against the directory.
fn parse_target(
    verb: DirectiveVerb,
    target: &str,
    line: &str,
) -> Result<DirectiveTarget, DirectiveError> {
    if verb == DirectiveVerb::Reply {
        let inner = target
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .ok_or_else(|| DirectiveError::BadReplyId(line.to_string()))?;
        let id = Uuid::parse_str(inner.trim())
            .map_err(|_| DirectiveError::BadReplyId(line.to_string()))?;
        Ok(DirectiveTarget::ReplyTo(MessageId::from(id)))
    } else {
        Ok(DirectiveTarget::Name(target.to_string()))
    }
}

/// Split content into subject and body according to the verb.
fn parse_content(
    verb: DirectiveVerb,
    content: &str,
    line: &str,
) -> Result<(Option<String>, String), DirectiveError> {
    let content = content.trim();
    if verb == DirectiveVerb::Email {
        let (subject, body) = content
            .split_once('|')
            .ok_or_else(|| DirectiveError::MissingSubject(line.to_string()))?;
        let subject = subject.trim();
        let body = body.trim();
        if subject.is_empty() || body.is_empty() {
            return Err(DirectiveError::MissingContent(line.to_string()));
        }
        Ok((Some(subject.to_string()), body.to_string()))
    } else {
        if content.is_empty() {
            return Err(DirectiveError::MissingContent(line.to_string()));
        }
        Ok((None, content.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_email_directive() {
        let parsed = parse_plan_text(
            "Email at 09:30 to Dana Voss: Sprint check-in | Can we sync on the rollout today?",
        );
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.accepted.len(), 1);
        let d = &parsed.accepted[0];
        assert_eq!(d.verb, DirectiveVerb::Email);
        assert_eq!(d.hour, 9);
        assert_eq!(d.minute, 30);
        assert_eq!(d.target, DirectiveTarget::Name(String::from("Dana Voss")));
        assert_eq!(d.subject.as_deref(), Some("Sprint check-in"));
        assert_eq!(d.body, "Can we sync on the rollout today?");
    }

    #[test]
    fn parses_cc_and_bcc_lists() {
        let parsed = parse_plan_text(
            "Email at 14:00 to Dana Voss cc Priya Nair, Tom Okafor bcc Mia Chen: Q3 roadmap | Draft attached.",
        );
        let d = &parsed.accepted[0];
        assert_eq!(d.cc, vec!["Priya Nair", "Tom Okafor"]);
        assert_eq!(d.bcc, vec!["Mia Chen"]);
        assert_eq!(d.subject.as_deref(), Some("Q3 roadmap"));
    }

    #[test]
    fn parses_chat_without_subject() {
        let parsed = parse_plan_text("Chat at 11:05 to alpha team: standup in five");
        let d = &parsed.accepted[0];
        assert_eq!(d.verb, DirectiveVerb::Chat);
        assert_eq!(d.subject, None);
        assert_eq!(d.body, "standup in five");
    }

    #[test]
    fn parses_reply_with_message_id() {
        let id = Uuid::now_v7();
        let parsed =
            parse_plan_text(&format!("Reply at 10:15 to [{id}]: Works for me, see you then."));
        let d = &parsed.accepted[0];
        assert_eq!(d.verb, DirectiveVerb::Reply);
        assert_eq!(d.target, DirectiveTarget::ReplyTo(MessageId::from(id)));
    }

    #[test]
    fn ignores_prose_lines() {
        let parsed = parse_plan_text(
            "Morning: review the deploy checklist.\n\
             Afternoon: pair with Priya on the migration.\n\
             Chat at 13:00 to Priya Nair: ready when you are",
        );
        assert_eq!(parsed.accepted.len(), 1);
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn strips_list_bullets() {
        let parsed = parse_plan_text("- Chat at 08:45 to Dana Voss: quick question about the design doc");
        assert_eq!(parsed.accepted.len(), 1);
    }

    #[test]
    fn rejects_email_without_subject_separator() {
        let parsed = parse_plan_text("Email at 09:00 to Dana Voss: no subject split here");
        assert!(parsed.accepted.is_empty());
        assert_eq!(parsed.rejected.len(), 1);
        assert!(matches!(
            parsed.rejected[0].error,
            DirectiveError::MissingSubject(_)
        ));
    }

    #[test]
    fn rejects_out_of_range_time() {
        let parsed = parse_plan_text("Chat at 25:00 to Dana Voss: hello");
        assert!(matches!(parsed.rejected[0].error, DirectiveError::BadTime(_)));
    }

    #[test]
    fn rejects_missing_to_clause() {
        let parsed = parse_plan_text("Chat at 10:00 Dana Voss: hello");
        assert!(matches!(
            parsed.rejected[0].error,
            DirectiveError::MissingTarget(_)
        ));
    }

    #[test]
    fn rejects_reply_without_bracketed_id() {
        let parsed = parse_plan_text("Reply at 10:00 to Dana Voss: sure");
        assert!(matches!(
            parsed.rejected[0].error,
            DirectiveError::BadReplyId(_)
        ));
    }

    #[test]
    fn rejects_empty_body() {
        let parsed = parse_plan_text("Chat at 10:00 to Dana Voss:   ");
        assert!(matches!(
            parsed.rejected[0].error,
            DirectiveError::MissingContent(_)
        ));
    }

    #[test]
    fn preserves_plan_order() {
        let parsed = parse_plan_text(
            "Chat at 09:00 to Dana Voss: first\n\
             Chat at 09:00 to Priya Nair: second",
        );
        assert_eq!(parsed.accepted[0].body, "first");
        assert_eq!(parsed.accepted[1].body, "second");
    }
}
