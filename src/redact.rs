/// Secret redaction for logging
///
/// Masks API tokens and user keys so logs stay useful for debugging
/// without leaking credentials.

/// Redact a token, keeping only the last 4 characters visible.
/// Example: "uQiRzpo4DXghDmr9QzzfQu27cmVRsG" -> "**************************VRsG"
pub fn token(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();

    if chars.len() <= 8 {
        // Too short to reveal anything safely
        return "*".repeat(chars.len());
    }

    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

/// Redact an optional secret for a config summary line
pub fn optional_token(secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => token(s),
        _ => "(not set)".to_string(),
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// Proves: short secrets are fully masked
    #[kani::proof]
    #[kani::unwind(10)]
    fn short_token_fully_masked() {
        let mut s = String::new();
        for _ in 0..8 {
            let c: u8 = kani::any();
            kani::assume(c.is_ascii_alphanumeric());
            s.push(c as char);
        }
        let result = token(&s);
        for c in result.chars() {
            kani::assert(c == '*', "short tokens must be fully masked");
        }
    }
}
