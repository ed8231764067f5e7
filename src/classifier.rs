//! Rule-based sensitivity classification.
//!
//! Pure and total: every input gets a verdict, no I/O, no model calls. The
//! router uses the verdict to pin sensitive exchanges to the local tier.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Verdict for one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_sensitive: bool,
    /// Sorted, deduplicated flag categories.
    pub flags: Vec<&'static str>,
    /// Rule names that fired, in rule-table order.
    pub matched_rules: Vec<&'static str>,
    /// 0.25 per matched rule, capped at 1.0; 0.0 when clean.
    pub confidence: f64,
}

struct Rule {
    flag: &'static str,
    name: &'static str,
    pattern: &'static Lazy<Regex>,
}

// unwrap is fine here: the patterns are literals, exercised by tests.
macro_rules! rule_re {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pattern).unwrap());
    };
}

// PII
rule_re!(
    EMAIL_RE,
    r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
);
rule_re!(
    PHONE_RE,
    r"(?:\+1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}"
);
rule_re!(SSN_RE, r"\b\d{3}-\d{2}-\d{4}\b");
rule_re!(NAMED_PERSON_RE, r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][a-z]+");
rule_re!(
    ADDRESS_RE,
    r"\b\d{1,5}\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\s+(?:St|Ave|Blvd|Dr|Ln|Rd|Way|Ct|Pl)\b"
);

// Financial
rule_re!(
    CC_RE,
    r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2}|6011)[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b"
);
rule_re!(LARGE_DOLLAR_RE, r"\$\s?\d{1,3}(?:,\d{3})+(?:\.\d{2})?");
static BANK_KEYWORDS_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"\b(?:routing\s*number|account\s*number|bank\s*account|wire\s*transfer|SWIFT|IBAN)\b",
    )
    .case_insensitive(true)
    .build()
    .unwrap()
});
rule_re!(ROUTING_NUMBER_RE, r"\b\d{9}\b");

// Email content
static EMAIL_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"^(?:From|To|Subject|Cc|Bcc):\s+")
        .multi_line(true)
        .build()
        .unwrap()
});
static FORWARDED_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"(?:------\s*Forwarded\s*message|Begin\s*forwarded\s*message)")
        .case_insensitive(true)
        .build()
        .unwrap()
});

// File/code content
rule_re!(
    FILE_PATH_RE,
    r"(?:/Users/\S+|/home/\S+|[A-Z]:\\\S+)"
);
static CODE_PATTERN_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"(?:^|\s)(?:def\s+\w+|import\s+\w+|from\s+\w+\s+import|function\s+\w+|class\s+\w+)",
    )
    .multi_line(true)
    .build()
    .unwrap()
});

static RULES: &[Rule] = &[
    Rule { flag: "pii", name: "email_address", pattern: &EMAIL_RE },
    Rule { flag: "pii", name: "phone_number", pattern: &PHONE_RE },
    Rule { flag: "pii", name: "ssn", pattern: &SSN_RE },
    Rule { flag: "pii", name: "named_person", pattern: &NAMED_PERSON_RE },
    Rule { flag: "pii", name: "street_address", pattern: &ADDRESS_RE },
    Rule { flag: "financial", name: "credit_card", pattern: &CC_RE },
    Rule { flag: "financial", name: "large_dollar_amount", pattern: &LARGE_DOLLAR_RE },
    Rule { flag: "financial", name: "bank_keyword", pattern: &BANK_KEYWORDS_RE },
    Rule { flag: "financial", name: "routing_number", pattern: &ROUTING_NUMBER_RE },
    Rule { flag: "email_content", name: "email_header", pattern: &EMAIL_HEADER_RE },
    Rule { flag: "email_content", name: "forwarded_message", pattern: &FORWARDED_RE },
    Rule { flag: "file_content", name: "file_path", pattern: &FILE_PATH_RE },
    Rule { flag: "file_content", name: "code_pattern", pattern: &CODE_PATTERN_RE },
];

/// Classify text for sensitivity. Deterministic; same input, same verdict.
pub fn classify(text: &str) -> Classification {
    let mut flags: Vec<&'static str> = Vec::new();
    let mut matched_rules: Vec<&'static str> = Vec::new();

    for rule in RULES {
        if rule.pattern.is_match(text) {
            if !flags.contains(&rule.flag) {
                flags.push(rule.flag);
            }
            matched_rules.push(rule.name);
        }
    }

    flags.sort_unstable();
    let is_sensitive = !flags.is_empty();
    let confidence = if is_sensitive {
        (matched_rules.len() as f64 * 0.25).min(1.0)
    } else {
        0.0
    };

    Classification {
        is_sensitive,
        flags,
        matched_rules,
        confidence,
    }
}
