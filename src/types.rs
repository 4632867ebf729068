//! Common types used throughout Solidafy Scrape

use serde::{Deserialize, Serialize};

/// How a listing endpoint receives its parameters
///
/// `GET` puts them in the query string, `POST` sends them as a urlencoded
/// form body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
        }
    }
}

/// Growth of the wait between fetch retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Same wait every time
    Constant,
    /// Wait grows by the initial backoff each attempt
    Linear,
    /// Wait doubles each attempt
    #[default]
    Exponential,
}

/// Treat an empty extracted value as missing
pub trait OptionStringExt {
    /// `None` for `None` and for `Some("")`
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}
