use once_cell::sync::Lazy;
use regex::Regex;

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?i)\b(password|pwd)\s*=\s*([^;"'\s]+)"#).expect("valid regex"),
        Regex::new(r#"(?i)\b(api[_-]?key|token|secret)\s*[:=]\s*["']?([A-Za-z0-9_\-\.]{4,})["']?"#)
            .expect("valid regex"),
    ]
});

/// Masks credential segments of an ADO-style connection string so DSNs can
/// be logged and shown on the admin page.
pub fn mask_connection_string(input: &str) -> String {
    redact_message(input)
}

/// Scrubs secrets from any message leaving the process. Driver errors
/// sometimes echo the connection string back, so every outbound
/// connection/SQL failure message passes through here.
pub fn redact_message(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let mut result = input.to_string();
    for pattern in SECRET_PATTERNS.iter() {
        if pattern.find(&result).is_none() {
            continue;
        }
        result = pattern
            .replace_all(&result, |caps: &regex::Captures<'_>| {
                let key = caps.get(1).map(|m| m.as_str()).unwrap_or("secret");
                format!("{}=[REDACTED]", key)
            })
            .to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{mask_connection_string, redact_message};

    #[test]
    fn masks_password_segment() {
        let masked =
            mask_connection_string("Server=p21.local;Database=P21;User Id=sa;Password=hunter2");
        assert!(masked.contains("Password=[REDACTED]"));
        assert!(!masked.contains("hunter2"));
        assert!(masked.contains("User Id=sa"));
    }

    #[test]
    fn masks_pwd_shorthand_case_insensitively() {
        let masked = mask_connection_string("SERVER=x;PWD=s3cret;UID=admin");
        assert!(masked.contains("PWD=[REDACTED]"));
        assert!(!masked.contains("s3cret"));
    }

    #[test]
    fn leaves_plain_messages_alone() {
        let message = "connection refused: p21.local:1433";
        assert_eq!(redact_message(message), message);
    }

    #[test]
    fn scrubs_secrets_echoed_in_driver_errors() {
        let message = "login failed for connection string Password=topsecret (code 18456)";
        let scrubbed = redact_message(message);
        assert!(!scrubbed.contains("topsecret"));
    }
}
