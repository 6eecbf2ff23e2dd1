//! Tri-state result for optional remote collaborators

use std::fmt;

/// Result of a call against a collaborator that may be unconfigured
///
/// `Skipped` means the collaborator has no credentials and was never contacted;
/// `Failed` means it was contacted and the call did not succeed. Neither is a
/// `BotError`: callers decide how to degrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Ok(T),
    Skipped(String),
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn failed(reason: impl fmt::Display) -> Self {
        Outcome::Failed(reason.to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    /// `ok`, `skipped` or `error`
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Ok(_) => "ok",
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "error",
        }
    }

    /// Reason for a non-ok outcome, empty for `Ok`
    pub fn reason(&self) -> &str {
        match self {
            Outcome::Ok(_) => "",
            Outcome::Skipped(reason) | Outcome::Failed(reason) => reason,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
            Outcome::Failed(reason) => Outcome::Failed(reason),
        }
    }
}

impl<T, E: fmt::Display> From<std::result::Result<T, E>> for Outcome<T> {
    fn from(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) => Outcome::failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_reasons() {
        let ok: Outcome<u8> = Outcome::Ok(1);
        assert_eq!(ok.label(), "ok");
        assert_eq!(ok.reason(), "");

        let skipped: Outcome<u8> = Outcome::skipped("not configured");
        assert_eq!(skipped.label(), "skipped");
        assert_eq!(skipped.reason(), "not configured");

        let failed: Outcome<u8> = Err::<u8, _>("boom").into();
        assert_eq!(failed.label(), "error");
        assert_eq!(failed.map(|v| v + 1).reason(), "boom");
    }
}
