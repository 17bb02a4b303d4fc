//! PII redaction for text that leaves the process (LLM prompts).
//!
//! Usernames are acceptable; e-mail addresses and phone numbers are not.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Comment, ContentItem};

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w.%+-]+@[\w.-]+\.[A-Za-z]{2,}\b").unwrap());

static RE_PHONES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").unwrap(),
        Regex::new(r"\(\d{3}\)\s*\d{3}[-.]?\d{4}\b").unwrap(),
        Regex::new(r"\+\d{1,3}[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}\b").unwrap(),
        Regex::new(r"\b\d{10,15}\b").unwrap(),
    ]
});

/// Replace e-mail addresses and phone numbers with redaction placeholders.
pub fn redact_pii(text: &str) -> String {
    let mut out = RE_EMAIL.replace_all(text, "[EMAIL_REDACTED]").into_owned();
    for re in RE_PHONES.iter() {
        out = re.replace_all(&out, "[PHONE_REDACTED]").into_owned();
    }
    out
}

/// Copy of a comment with its body redacted.
pub fn redact_comment(comment: &Comment) -> Comment {
    Comment {
        body: redact_pii(&comment.body),
        ..comment.clone()
    }
}

/// Copy of an item with title and text redacted.
pub fn redact_item(item: &ContentItem) -> ContentItem {
    ContentItem {
        title: redact_pii(&item.title),
        text: item.text.as_deref().map(redact_pii),
        ..item.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_email_addresses() {
        let out = redact_pii("contact me at jane.doe+work@example.co.uk for details");
        assert_eq!(out, "contact me at [EMAIL_REDACTED] for details");
    }

    #[test]
    fn redacts_phone_numbers() {
        assert_eq!(redact_pii("call 555-123-4567 now"), "call [PHONE_REDACTED] now");
        assert_eq!(redact_pii("call (555) 123-4567"), "call [PHONE_REDACTED]");
        assert!(redact_pii("+44 20 7946 0958").contains("[PHONE_REDACTED]"));
    }

    #[test]
    fn leaves_clean_text_alone() {
        let text = "no personal data here, just opinions";
        assert_eq!(redact_pii(text), text);
    }

    #[test]
    fn redacts_comment_body_but_keeps_author() {
        let comment = Comment {
            id: "c1".to_string(),
            body: "email me: a@b.io".to_string(),
            score: 3,
            author: "someone".to_string(),
        };
        let clean = redact_comment(&comment);
        assert_eq!(clean.body, "email me: [EMAIL_REDACTED]");
        assert_eq!(clean.author, "someone");
    }
}
