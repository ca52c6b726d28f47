use once_cell::sync::Lazy;
use regex::Regex;

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?i)(apikey|api[_-]?key|service[_-]?role|token|secret|password)\s*[:=]\s*["']?([A-Za-z0-9_\-\.]{6,})["']?"#)
            .expect("valid regex"),
        Regex::new(r"(?i)\b(bearer)\s+([A-Za-z0-9_\-\.=]{6,})").expect("valid regex"),
        Regex::new(r"\b(eyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+)\b").expect("valid regex"),
        Regex::new(r"\b(sb_(?:publishable|secret)_[A-Za-z0-9_\-]{16,})\b").expect("valid regex"),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionResult {
    pub content: String,
    pub redaction_count: usize,
}

/// Masks store credentials in text bound for logs. Store error bodies and
/// request descriptions can echo the api key back.
#[derive(Debug, Default, Clone)]
pub struct Redactor {
    aggressive: bool,
}

impl Redactor {
    pub fn new(aggressive: bool) -> Self {
        Self { aggressive }
    }

    pub fn redact(&self, input: &str) -> RedactionResult {
        if input.is_empty() {
            return RedactionResult {
                content: String::new(),
                redaction_count: 0,
            };
        }

        let mut result = input.to_string();
        let mut redaction_count = 0usize;

        for pattern in SECRET_PATTERNS.iter() {
            let matches = pattern.find_iter(&result).count();
            if matches == 0 {
                continue;
            }

            redaction_count += matches;
            result = pattern
                .replace_all(&result, |caps: &regex::Captures<'_>| {
                    if caps.len() > 2 {
                        let key = caps
                            .get(1)
                            .map(|m| m.as_str())
                            .unwrap_or("secret")
                            .to_ascii_lowercase();
                        format!("{}=[REDACTED]", key)
                    } else {
                        "[REDACTED_KEY]".to_string()
                    }
                })
                .to_string();
        }

        if self.aggressive {
            result = result
                .split(' ')
                .map(|token| {
                    if token.len() > 48 && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                        redaction_count += 1;
                        "[REDACTED_LONG_TOKEN]".to_string()
                    } else {
                        token.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
        }

        RedactionResult {
            content: result,
            redaction_count,
        }
    }

    pub fn scrub(&self, input: &str) -> String {
        self.redact(input).content
    }
}
