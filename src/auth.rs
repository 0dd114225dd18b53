use std::fmt;

/// API token wrapper that keeps the secret out of debug output.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_secret() {
        let token = Token::from("glpat-supersecret");
        assert_eq!(format!("{token:?}"), "Token(***)");
    }

    #[test]
    fn exposes_the_raw_value_for_request_building() {
        assert_eq!(Token::from("abc").as_str(), "abc");
    }
}
