use serde::Serialize;
use std::fmt;

/// Terminal outcome of fetching a URL, as kept in the fetch ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Failed,
}

impl FetchStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_status_strings() {
        assert_eq!(FetchStatus::Success.to_db_string(), "success");
        assert_eq!(
            FetchStatus::from_db_string("failed"),
            Some(FetchStatus::Failed)
        );
        assert_eq!(FetchStatus::from_db_string("pending"), None);
    }
}
