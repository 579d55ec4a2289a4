use crate::errors::{WalletError, WalletResult};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_ACCOUNT_NAME_LEN: usize = 50;
const MAX_URL_LEN: usize = 2048;

static PRIVATE_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("static regex"));

static NODE_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9.\-]+(:\d{1,5})?(/[A-Za-z0-9._~%/\-]*)?$")
        .expect("static regex")
});

// Common malicious patterns to block
static MALICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"<script",
        r"javascript:",
        r"data:text/html",
        r"vbscript:",
        r"onload=",
        r"onerror=",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static regex"))
    .collect()
});

/// Input checks applied before any value reaches storage.
pub struct InputValidator;

impl InputValidator {
    /// Account display name: non-blank, bounded, no markup.
    pub fn validate_account_name(name: &str) -> WalletResult<()> {
        check_basic_security(name)?;

        if name.trim().is_empty() {
            return Err(WalletError::ValidationError(
                "Account name cannot be empty".to_string(),
            ));
        }

        if name.chars().count() > MAX_ACCOUNT_NAME_LEN {
            return Err(WalletError::ValidationError(
                "Account name too long".to_string(),
            ));
        }

        if name.chars().any(|c| c.is_control()) {
            return Err(WalletError::ValidationError(
                "Account name contains control characters".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_node_url(url: &str) -> WalletResult<()> {
        check_basic_security(url)?;

        if url.len() > MAX_URL_LEN {
            return Err(WalletError::ValidationError("Node URL too long".to_string()));
        }

        if !NODE_URL_PATTERN.is_match(url) {
            return Err(WalletError::ValidationError(format!(
                "Node URL '{}' is not a valid http(s) URL",
                url
            )));
        }

        Ok(())
    }

    /// Raw 32-byte private key in hex.
    pub fn validate_private_key(private_key: &str) -> WalletResult<()> {
        if !PRIVATE_KEY_PATTERN.is_match(private_key.trim()) {
            return Err(WalletError::ValidationError(
                "Private key must be 64 hexadecimal characters".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_mnemonic_word_count(mnemonic: &str) -> WalletResult<()> {
        let words = mnemonic.split_whitespace().count();
        if !matches!(words, 12 | 15 | 18 | 21 | 24) {
            return Err(WalletError::ValidationError(format!(
                "Mnemonic must have 12, 15, 18, 21 or 24 words, got {}",
                words
            )));
        }
        Ok(())
    }

    pub fn validate_account_count(count: u32) -> WalletResult<()> {
        if count == 0 || count > 100 {
            return Err(WalletError::ValidationError(format!(
                "Accounts per network must be between 1 and 100, got {}",
                count
            )));
        }
        Ok(())
    }
}

fn check_basic_security(input: &str) -> WalletResult<()> {
    if input.len() > 4096 {
        return Err(WalletError::ValidationError("Input too long".to_string()));
    }

    let lowered = input.to_lowercase();
    if MALICIOUS_PATTERNS.iter().any(|pattern| pattern.is_match(&lowered)) {
        return Err(WalletError::ValidationError(
            "Input contains potentially malicious content".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_names() {
        assert!(InputValidator::validate_account_name("Savings 2").is_ok());
        assert!(InputValidator::validate_account_name("Épargne").is_ok());
        assert!(InputValidator::validate_account_name("   ").is_err());
        assert!(InputValidator::validate_account_name(&"x".repeat(51)).is_err());
        assert!(InputValidator::validate_account_name("<script>alert(1)").is_err());
    }

    #[test]
    fn node_urls() {
        assert!(InputValidator::validate_node_url("https://node.example.org:3001").is_ok());
        assert!(InputValidator::validate_node_url("http://10.0.0.5/api").is_ok());
        assert!(InputValidator::validate_node_url("ftp://node.example.org").is_err());
        assert!(InputValidator::validate_node_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn private_keys_and_mnemonics() {
        assert!(InputValidator::validate_private_key(&"ab".repeat(32)).is_ok());
        assert!(InputValidator::validate_private_key("abc").is_err());
        assert!(InputValidator::validate_mnemonic_word_count(&"word ".repeat(24)).is_ok());
        assert!(InputValidator::validate_mnemonic_word_count("one two three").is_err());
    }
}
