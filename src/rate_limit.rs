//! Throttling hints read from response headers.
//!
//! When a post-response middleware retries a throttled response, the pipeline
//! waits for the delay the server asked for instead of the client's
//! [`RetryStrategy`](crate::RetryStrategy) delay, bounded by
//! [`RateLimitConfig::max_wait`].

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RESET_HEADERS: [&str; 2] = ["x-ratelimit-reset", "ratelimit-reset"];

/// Throttling information parsed from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// When the current window resets (`X-RateLimit-Reset` / `RateLimit-Reset`).
    pub reset_at: Option<SystemTime>,

    /// How long the server asked us to wait (`Retry-After`).
    pub retry_after: Option<Duration>,

    /// Requests left in the current window (`X-RateLimit-Remaining`).
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Reads the throttling headers of a response.
    ///
    /// `Retry-After` accepts both delay-seconds and an HTTP date.
    ///
    /// # Examples
    ///
    /// ```
    /// use reqflow::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "60".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert!(info.is_rate_limited());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            reset_at: RESET_HEADERS
                .iter()
                .find_map(|name| header_u64(headers, name))
                .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs))),
            retry_after: header_str(headers, "retry-after").and_then(parse_retry_after),
            remaining: header_u64(headers, "x-ratelimit-remaining"),
        }
    }

    /// Same as [`from_headers`](Self::from_headers) but returns `None` unless
    /// the headers describe an active limit.
    pub fn throttled(headers: &HeaderMap) -> Option<Self> {
        let info = Self::from_headers(headers);
        info.is_rate_limited().then_some(info)
    }

    /// The delay to honour before the next attempt, capped at `max_wait`.
    ///
    /// `Retry-After` wins over the reset timestamp; a reset time in the past
    /// yields `None`.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        let wait = match (self.retry_after, self.reset_at) {
            (Some(retry_after), _) => retry_after,
            (None, Some(reset_at)) => reset_at.duration_since(SystemTime::now()).ok()?,
            (None, None) => return None,
        };
        Some(wait.min(max_wait))
    }

    /// `true` when a `Retry-After` is present or no requests remain.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }
}

/// How the pipeline reacts to throttling hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Parse throttling headers and honour them before a retry. Defaults to `true`.
    pub enabled: bool,

    /// Upper bound for a server-requested delay. Defaults to 5 minutes.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    /// A configuration that ignores throttling headers.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Returns a copy with a different `max_wait`.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Delay requested by `headers`, or `None` when disabled or not throttled.
    pub(crate) fn delay_for(&self, headers: &HeaderMap) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        RateLimitInfo::throttled(headers)?.delay(self.max_wait)
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name)?.parse().ok()
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    // a date in the past means "retry now"
    Some(at.duration_since(SystemTime::now()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn retry_after_seconds() {
        let info = RateLimitInfo::from_headers(&headers(&[("retry-after", "60")]));
        assert_eq!(info.retry_after, Some(Duration::from_secs(60)));
        assert!(info.is_rate_limited());
    }

    #[test]
    fn retry_after_http_date_in_the_past_is_zero() {
        let info = RateLimitInfo::from_headers(&headers(&[(
            "retry-after",
            "Wed, 21 Oct 2015 07:28:00 GMT",
        )]));
        assert_eq!(info.retry_after, Some(Duration::ZERO));
    }

    #[test]
    fn reset_header_fallback() {
        let reset = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 120;
        let info = RateLimitInfo::from_headers(&headers(&[
            ("ratelimit-reset", &reset.to_string()),
            ("x-ratelimit-remaining", "0"),
        ]));
        assert!(info.reset_at.is_some());
        assert_eq!(info.remaining, Some(0));

        let delay = info.delay(Duration::from_secs(300)).unwrap();
        assert!(delay > Duration::from_secs(100) && delay <= Duration::from_secs(120));
    }

    #[test]
    fn unrepresentable_reset_is_ignored() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("x-ratelimit-reset", "18446744073709551615"),
            ("x-ratelimit-remaining", "0"),
        ]));
        assert!(info.reset_at.is_none());
        assert!(info.is_rate_limited());
        assert_eq!(info.delay(Duration::from_secs(30)), None);
    }

    #[test]
    fn delay_is_capped() {
        let info = RateLimitInfo {
            reset_at: None,
            retry_after: Some(Duration::from_secs(600)),
            remaining: None,
        };
        assert_eq!(
            info.delay(Duration::from_secs(30)),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn remaining_without_limit_is_not_throttled() {
        let map = headers(&[("x-ratelimit-remaining", "42")]);
        assert!(RateLimitInfo::throttled(&map).is_none());
        assert_eq!(RateLimitConfig::default().delay_for(&map), None);
    }

    #[test]
    fn disabled_config_ignores_headers() {
        let map = headers(&[("retry-after", "5")]);
        assert_eq!(RateLimitConfig::disabled().delay_for(&map), None);
        assert_eq!(
            RateLimitConfig::default().delay_for(&map),
            Some(Duration::from_secs(5))
        );
    }
}
