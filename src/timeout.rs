//! Timeout specification and normalization.
//!
//! Callers may express a timeout as a number of seconds, a [`Duration`], a duration-like
//! string (`"120"`, `"30s"`, `"1500ms"`, `"2m"`) or a structured set of
//! connect/read/write/pool durations. [`normalize`] turns any of these into the
//! [`BackendTimeout`] shape a given provider accepts. It never fails: anything unusable
//! becomes [`DEFAULT_TIMEOUT`], and anything longer than [`MAX_TIMEOUT`] is cut to it.

use crate::registry::ProviderDescriptor;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Ten minutes, the fallback for an absent or unusable timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// One day. Longer values are clamped so a deadline computed from them cannot overflow.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Independent per-phase timeouts. Absent phases are left to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StructuredTimeout {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
    pub pool: Option<Duration>,
}

impl StructuredTimeout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same value for every phase.
    pub fn uniform(d: Duration) -> Self {
        Self {
            connect: Some(d),
            read: Some(d),
            write: Some(d),
            pool: Some(d),
        }
    }

    pub fn connect(mut self, d: Duration) -> Self {
        self.connect = Some(d);
        self
    }

    pub fn read(mut self, d: Duration) -> Self {
        self.read = Some(d);
        self
    }

    pub fn write(mut self, d: Duration) -> Self {
        self.write = Some(d);
        self
    }

    pub fn pool(mut self, d: Duration) -> Self {
        self.pool = Some(d);
        self
    }

    fn sanitized(self) -> Self {
        let keep = |d: Option<Duration>| d.filter(|d| !d.is_zero()).map(|d| d.min(MAX_TIMEOUT));
        Self {
            connect: keep(self.connect),
            read: keep(self.read),
            write: keep(self.write),
            pool: keep(self.pool),
        }
    }
}

/// A timeout as supplied by a caller, a defaults file or an environment variable.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeoutSpec {
    Seconds(f64),
    Duration(Duration),
    /// Duration-like text, parsed during normalization.
    Text(String),
    Structured(StructuredTimeout),
}

impl From<f64> for TimeoutSpec {
    fn from(secs: f64) -> Self {
        TimeoutSpec::Seconds(secs)
    }
}

impl From<u64> for TimeoutSpec {
    fn from(secs: u64) -> Self {
        TimeoutSpec::Seconds(secs as f64)
    }
}

impl From<Duration> for TimeoutSpec {
    fn from(d: Duration) -> Self {
        TimeoutSpec::Duration(d)
    }
}

impl From<StructuredTimeout> for TimeoutSpec {
    fn from(s: StructuredTimeout) -> Self {
        TimeoutSpec::Structured(s)
    }
}

impl From<&str> for TimeoutSpec {
    fn from(s: &str) -> Self {
        TimeoutSpec::Text(s.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeoutSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Phase {
            Seconds(f64),
            Text(String),
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Input {
            // Shorthand: timeout: 120 / timeout: "30s"
            Seconds(f64),
            Text(String),
            // Full form
            Obj {
                #[serde(default)]
                connect: Option<Phase>,
                #[serde(default)]
                read: Option<Phase>,
                #[serde(default)]
                write: Option<Phase>,
                #[serde(default)]
                pool: Option<Phase>,
            },
        }

        let phase = |p: Option<Phase>| match p {
            Some(Phase::Seconds(s)) => secs_to_duration(s),
            Some(Phase::Text(t)) => parse_duration(&t),
            None => None,
        };

        match Input::deserialize(deserializer)? {
            Input::Seconds(s) => Ok(TimeoutSpec::Seconds(s)),
            Input::Text(t) => Ok(TimeoutSpec::Text(t)),
            Input::Obj {
                connect,
                read,
                write,
                pool,
            } => Ok(TimeoutSpec::Structured(StructuredTimeout {
                connect: phase(connect),
                read: phase(read),
                write: phase(write),
                pool: phase(pool),
            })),
        }
    }
}

/// Timeout in the shape a backend accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendTimeout {
    Scalar(Duration),
    Structured(StructuredTimeout),
}

impl BackendTimeout {
    /// Upper bound for one request attempt. Structured timeouts use the read phase.
    pub fn total(&self) -> Duration {
        match self {
            BackendTimeout::Scalar(d) => *d,
            BackendTimeout::Structured(s) => s.read.unwrap_or(DEFAULT_TIMEOUT),
        }
    }

    pub fn seconds(&self) -> f64 {
        self.total().as_secs_f64()
    }

    pub fn connect(&self) -> Option<Duration> {
        match self {
            BackendTimeout::Scalar(_) => None,
            BackendTimeout::Structured(s) => s.connect,
        }
    }

    pub fn pool_idle(&self) -> Option<Duration> {
        match self {
            BackendTimeout::Scalar(_) => None,
            BackendTimeout::Structured(s) => s.pool,
        }
    }
}

impl Default for BackendTimeout {
    fn default() -> Self {
        BackendTimeout::Scalar(DEFAULT_TIMEOUT)
    }
}

/// Normalize `spec` for the provider described by `descriptor`.
pub fn normalize(spec: Option<&TimeoutSpec>, descriptor: &ProviderDescriptor) -> BackendTimeout {
    normalize_with(spec, descriptor.supports_structured_timeout)
}

/// Normalization keyed only on whether the backend understands structured timeouts.
pub fn normalize_with(spec: Option<&TimeoutSpec>, supports_structured: bool) -> BackendTimeout {
    match spec {
        None => BackendTimeout::default(),
        Some(TimeoutSpec::Structured(s)) => {
            let s = s.sanitized();
            if supports_structured {
                BackendTimeout::Structured(s)
            } else {
                // Collapse to the read phase; connect/write/pool have no scalar meaning.
                BackendTimeout::Scalar(s.read.unwrap_or(DEFAULT_TIMEOUT))
            }
        }
        Some(TimeoutSpec::Seconds(secs)) => {
            BackendTimeout::Scalar(secs_to_duration(*secs).unwrap_or(DEFAULT_TIMEOUT))
        }
        Some(TimeoutSpec::Duration(d)) => {
            BackendTimeout::Scalar(match *d {
                d if d.is_zero() => DEFAULT_TIMEOUT,
                d => d.min(MAX_TIMEOUT),
            })
        }
        Some(TimeoutSpec::Text(text)) => {
            BackendTimeout::Scalar(parse_duration(text).unwrap_or(DEFAULT_TIMEOUT))
        }
    }
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    if secs >= MAX_TIMEOUT.as_secs_f64() {
        return Some(MAX_TIMEOUT);
    }
    Duration::try_from_secs_f64(secs).ok().filter(|d| !d.is_zero())
}

/// Parse `"120"`, `"1.5"`, `"30s"`, `"1500ms"`, `"2m"` or `"1h"`.
pub(crate) fn parse_duration(text: &str) -> Option<Duration> {
    let t = text.trim().to_ascii_lowercase();
    let (number, to_secs): (&str, fn(f64) -> f64) = if let Some(n) = t.strip_suffix("ms") {
        (n, |v| v / 1000.0)
    } else if let Some(n) = t.strip_suffix('s') {
        (n, |v| v)
    } else if let Some(n) = t.strip_suffix('m') {
        (n, |v| v * 60.0)
    } else if let Some(n) = t.strip_suffix('h') {
        (n, |v| v * 3600.0)
    } else {
        (t.as_str(), |v| v)
    };
    let value: f64 = number.trim().parse().ok()?;
    secs_to_duration(to_secs(value))
}
