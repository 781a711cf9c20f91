//! Raw event records and channel descriptors.
//!
//! A [`RawEvent`] is one validated row from the event store: a page view, a
//! click, a purchase. Events that carry a UTM source are *channel-bearing* and
//! become touchpoints once they are grouped into journeys.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder used for a missing medium or campaign.
pub const NOT_SET: &str = "(none)";

/// Default currency when a row does not carry one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Marketing channel descriptor built from UTM parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Channel {
    /// Traffic source (e.g. "google", "facebook").
    pub source: String,

    /// Traffic medium (e.g. "cpc", "email").
    pub medium: String,

    /// Campaign name.
    pub campaign: String,
}

impl Channel {
    /// Create a channel, normalizing a missing medium or campaign to `(none)`.
    pub fn new(source: impl Into<String>, medium: Option<&str>, campaign: Option<&str>) -> Self {
        let normalize = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(NOT_SET)
                .to_string()
        };

        Self {
            source: source.into(),
            medium: normalize(medium),
            campaign: normalize(campaign),
        }
    }

    /// The `source|medium|campaign` key used by channel aggregation.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.source, self.medium, self.campaign)
    }

    /// Node label for graph-based models under the given grouping.
    pub fn label(&self, grouping: ChannelGrouping) -> String {
        match grouping {
            ChannelGrouping::Source => self.source.clone(),
            ChannelGrouping::SourceMedium => format!("{}/{}", self.source, self.medium),
            ChannelGrouping::Full => self.key(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// How touchpoints are collapsed into nodes for the Markov, Shapley and lift models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelGrouping {
    /// One node per source.
    #[default]
    Source,
    /// One node per source/medium pair.
    SourceMedium,
    /// One node per source|medium|campaign triple.
    Full,
}

/// Event type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Page view
    PageView,
    /// Click
    Click,
    /// Add to cart
    AddToCart,
    /// Checkout started
    Checkout,
    /// Purchase (conversion)
    Purchase,
    /// Generic conversion
    Conversion,
    /// Account signup
    Signup,
    /// Login
    Login,
    /// Subscription start
    Subscription,
    /// File download
    Download,
    /// Video play
    VideoPlay,
    /// Form submission
    FormSubmit,
    /// Scroll depth event
    Scroll,
    /// Any other event name, kept verbatim
    Other(String),
}

impl EventType {
    /// Returns the canonical snake_case name.
    pub fn name(&self) -> &str {
        match self {
            Self::PageView => "page_view",
            Self::Click => "click",
            Self::AddToCart => "add_to_cart",
            Self::Checkout => "checkout",
            Self::Purchase => "purchase",
            Self::Conversion => "conversion",
            Self::Signup => "signup",
            Self::Login => "login",
            Self::Subscription => "subscription",
            Self::Download => "download",
            Self::VideoPlay => "video_play",
            Self::FormSubmit => "form_submit",
            Self::Scroll => "scroll",
            Self::Other(name) => name,
        }
    }

    /// Parse an event name (case-insensitive).
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "page_view" => Self::PageView,
            "click" => Self::Click,
            "add_to_cart" => Self::AddToCart,
            "checkout" => Self::Checkout,
            "purchase" => Self::Purchase,
            "conversion" => Self::Conversion,
            "signup" => Self::Signup,
            "login" => Self::Login,
            "subscription" => Self::Subscription,
            "download" => Self::Download,
            "video_play" => Self::VideoPlay,
            "form_submit" => Self::FormSubmit,
            "scroll" => Self::Scroll,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    /// Whether this event closes a conversion path.
    pub const fn is_conversion(&self) -> bool {
        matches!(self, Self::Purchase | Self::Conversion)
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A validated event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event identifier
    pub event_id: String,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Event type
    pub event_type: EventType,
    /// Monetary value in platform currency minor units
    #[serde(default)]
    pub event_value: f64,
    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Resolved (logged-in) identity
    #[serde(default)]
    pub user_id: Option<String>,
    /// Anonymous (cookie/device) identifier
    #[serde(default)]
    pub anonymous_id: Option<String>,
    /// Session identifier
    #[serde(default)]
    pub session_id: Option<String>,
    /// UTM source
    #[serde(default)]
    pub utm_source: Option<String>,
    /// UTM medium
    #[serde(default)]
    pub utm_medium: Option<String>,
    /// UTM campaign
    #[serde(default)]
    pub utm_campaign: Option<String>,
    /// Page the event fired on
    #[serde(default)]
    pub page_url: Option<String>,
    /// Device type
    #[serde(default)]
    pub device_type: Option<String>,
    /// Browser
    #[serde(default)]
    pub browser: Option<String>,
    /// Country code
    #[serde(default)]
    pub country: Option<String>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl RawEvent {
    /// Create an event with only the required fields set.
    pub fn new(event_id: impl Into<String>, timestamp: DateTime<Utc>, event_type: EventType) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            event_type,
            event_value: 0.0,
            currency: default_currency(),
            user_id: None,
            anonymous_id: None,
            session_id: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            page_url: None,
            device_type: None,
            browser: None,
            country: None,
        }
    }

    /// Set the identity id.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the anonymous id.
    pub fn with_anonymous(mut self, anonymous_id: impl Into<String>) -> Self {
        self.anonymous_id = Some(anonymous_id.into());
        self
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the UTM parameters.
    pub fn with_utm(mut self, source: &str, medium: Option<&str>, campaign: Option<&str>) -> Self {
        self.utm_source = Some(source.to_string());
        self.utm_medium = medium.map(str::to_string);
        self.utm_campaign = campaign.map(str::to_string);
        self
    }

    /// Set the event value.
    pub fn with_value(mut self, value: f64) -> Self {
        self.event_value = value;
        self
    }

    /// Whether this event closes a conversion path.
    pub const fn is_conversion(&self) -> bool {
        self.event_type.is_conversion()
    }

    /// Whether this event carries a UTM source.
    pub fn is_channel_bearing(&self) -> bool {
        self.utm_source
            .as_deref()
            .is_some_and(|source| !source.trim().is_empty())
    }

    /// The channel descriptor, if the event is channel-bearing.
    pub fn channel(&self) -> Option<Channel> {
        let source = self.utm_source.as_deref().map(str::trim)?;
        if source.is_empty() {
            return None;
        }
        Some(Channel::new(
            source,
            self.utm_medium.as_deref(),
            self.utm_campaign.as_deref(),
        ))
    }
}

/// Parse an event timestamp.
///
/// Accepts RFC 3339 (`2024-05-01T10:00:00Z`, `+02:00` offsets) and naive
/// `YYYY-MM-DD[T ]HH:MM:SS[.f]` or `YYYY-MM-DD`, which are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = value.trim_end_matches(" UTC").trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
