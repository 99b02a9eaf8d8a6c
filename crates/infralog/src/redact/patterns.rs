//! Built-in redaction patterns.
//!
//! Attribute patterns match attribute and map key names; value patterns
//! match string contents regardless of where they appear.

use regex::Regex;

/// A compiled redaction pattern.
#[derive(Debug, Clone)]
pub struct RedactPattern {
    /// Name of the pattern for identification.
    pub name: String,

    /// Description of what this pattern matches.
    pub description: &'static str,

    regex: Regex,
}

impl RedactPattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern is invalid.
    pub fn new(
        name: impl Into<String>,
        description: &'static str,
        pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            description,
            regex: Regex::new(pattern)?,
        })
    }

    /// Check if the text matches this pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

const ATTRIBUTE_PATTERNS: &[(&str, &str, &str)] = &[
    (
        "password",
        "Passwords and passphrases",
        r"(?i)(password|passwd|passphrase)",
    ),
    ("secret", "Secrets and client secrets", r"(?i)secret"),
    ("token", "Access, auth and API tokens", r"(?i)token"),
    ("private_key", "Private key material", r"(?i)private[_-]?key"),
    ("api_key", "API keys", r"(?i)api[_-]?key"),
    (
        "connection_string",
        "Connection strings with embedded credentials",
        r"(?i)connection[_-]?string",
    ),
];

const VALUE_PATTERNS: &[(&str, &str, &str)] = &[
    (
        "pem_private_key",
        "PEM-encoded private keys",
        r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----",
    ),
    (
        "credential_url",
        "Database URLs with a user and password",
        r"(?i)(mongodb|postgres|postgresql|mysql|redis)://[^:/]+:[^@]+@",
    ),
    (
        "aws_secret",
        "AWS secret access key assignments",
        r#"(?i)aws[_-]?secret[_-]?access[_-]?key\s*[:=]\s*['"]?[A-Za-z0-9/+=]{40}"#,
    ),
];

fn compile(table: &[(&str, &'static str, &str)]) -> Vec<RedactPattern> {
    table
        .iter()
        .filter_map(|(name, description, pattern)| {
            RedactPattern::new(*name, description, pattern).ok()
        })
        .collect()
}

/// Patterns applied to attribute names.
#[must_use]
pub fn builtin_attribute_patterns() -> Vec<RedactPattern> {
    compile(ATTRIBUTE_PATTERNS)
}

/// Patterns applied to string values.
#[must_use]
pub fn builtin_value_patterns() -> Vec<RedactPattern> {
    compile(VALUE_PATTERNS)
}
