use crate::error::ServiceError;

/// How a service failure affects the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Key invalid, permission denied, billing: disable the key and move on
    Credential,
    /// Network, timeout, rate limit, overload: retry
    Transient,
    /// The request itself is unacceptable; retrying cannot help
    Fatal,
}

/// Maps backend failures onto the retry taxonomy
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &ServiceError) -> FailureClass;
}

/// Status-code and phrase based classification
///
/// Rate-limit and server statuses are always transient, whatever the body
/// says: quota replies mention billing. Phrase lists are then matched
/// case-insensitively against the rendered error. Credential phrases are
/// checked before fatal ones since some backends report a bad key as a 400.
#[derive(Debug, Clone)]
pub struct PhraseClassifier {
    pub credential_phrases: Vec<String>,
    pub transient_phrases: Vec<String>,
    pub fatal_phrases: Vec<String>,
}

impl Default for PhraseClassifier {
    fn default() -> Self {
        let owned = |phrases: &[&str]| -> Vec<String> { phrases.iter().map(|p| p.to_string()).collect() };
        Self {
            credential_phrases: owned(&[
                "api key not valid",
                "api_key_invalid",
                "api key expired",
                "permission denied",
                "permission_denied",
                "unauthenticated",
                "billing",
            ]),
            transient_phrases: owned(&[
                "429",
                "503",
                "overloaded",
                "resource_exhausted",
                "rate limit",
                "unavailable",
                "deadline exceeded",
                "network error",
            ]),
            fatal_phrases: owned(&[
                "user location is not supported",
                "invalid_argument",
                "is not found for api version",
            ]),
        }
    }
}

impl PhraseClassifier {
    fn matches(phrases: &[String], text: &str) -> bool {
        phrases.iter().any(|p| text.contains(p.as_str()))
    }
}

impl ErrorClassifier for PhraseClassifier {
    fn classify(&self, error: &ServiceError) -> FailureClass {
        if let ServiceError::Api {
            status: 408 | 429 | 500..=599,
            ..
        } = error
        {
            return FailureClass::Transient;
        }

        let text = error.to_string().to_lowercase();

        if Self::matches(&self.credential_phrases, &text) {
            return FailureClass::Credential;
        }
        if Self::matches(&self.transient_phrases, &text) {
            return FailureClass::Transient;
        }

        match error {
            ServiceError::Api { status, .. } => match *status {
                401 | 403 => FailureClass::Credential,
                _ if Self::matches(&self.fatal_phrases, &text) => FailureClass::Fatal,
                400 | 404 => FailureClass::Fatal,
                _ => FailureClass::Transient,
            },
            ServiceError::Network(_)
            | ServiceError::Transport(_)
            | ServiceError::Timeout(_)
            | ServiceError::EmptyResponse(_) => FailureClass::Transient,
        }
    }
}
