//! Sample event generator.
//!
//! Produces realistic-looking event streams for demos, load tests and
//! benchmarks: either independent random events spread over a date range, or
//! complete user journeys that walk the purchase funnel. A seed makes the
//! output reproducible.

use crate::event::{EventType, RawEvent};
use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::VecDeque;

/// Event types drawn for random events.
pub const EVENT_TYPES: &[&str] = &[
    "page_view",
    "add_to_cart",
    "checkout",
    "purchase",
    "signup",
    "login",
    "subscription",
    "download",
    "video_play",
    "form_submit",
    "click",
    "scroll",
];

/// UTM sources.
pub const UTM_SOURCES: &[&str] = &[
    "google", "facebook", "twitter", "linkedin", "instagram", "email", "direct", "organic",
    "referral", "youtube",
];

/// UTM mediums.
pub const UTM_MEDIUMS: &[&str] = &[
    "cpc", "cpm", "social", "email", "organic", "referral", "display", "video", "affiliate",
];

/// UTM campaigns.
pub const UTM_CAMPAIGNS: &[&str] = &[
    "summer_sale",
    "black_friday",
    "new_product",
    "brand_awareness",
    "retargeting",
    "newsletter",
    "webinar",
    "ebook_download",
];

const DEVICE_TYPES: &[&str] = &["desktop", "mobile", "tablet", "tv", "wearable"];

const BROWSERS: &[&str] = &[
    "Chrome",
    "Safari",
    "Firefox",
    "Edge",
    "Opera",
    "Samsung Internet",
    "UC Browser",
    "Mobile Safari",
];

const COUNTRIES: &[&str] = &[
    "US", "GB", "CA", "AU", "DE", "FR", "JP", "BR", "IN", "CN", "MX", "ES", "IT", "NL", "SE", "KR",
];

const CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "JPY", "CAD", "AUD"];

const USER_POOL_SIZE: usize = 100;
const SESSION_POOL_SIZE: usize = 50;

/// Funnel walked by a generated journey: (event type, minutes after previous step).
const JOURNEY: &[(&str, i64)] = &[
    ("page_view", 0),
    ("click", 1),
    ("page_view", 2),
    ("add_to_cart", 5),
    ("checkout", 8),
    ("purchase", 10),
];

/// Seeded generator of sample events.
#[derive(Debug)]
pub struct EventGenerator {
    rng: StdRng,
    user_pool: Vec<String>,
    session_pool: VecDeque<String>,
    counter: u64,
}

impl EventGenerator {
    /// Create a generator; `None` seeds from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let user_pool = (0..USER_POOL_SIZE)
            .map(|_| format!("user_{:08x}", rng.gen_range(0..u32::MAX)))
            .collect();

        Self {
            rng,
            user_pool,
            session_pool: VecDeque::new(),
            counter: 0,
        }
    }

    fn pick(&mut self, pool: &[&'static str]) -> &'static str {
        pool.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn next_event_id(&mut self) -> String {
        self.counter += 1;
        let mut bytes = [0u8; 16];
        self.rng.fill(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
    }

    fn new_session_id(&mut self) -> String {
        format!("session_{:012x}", self.rng.gen_range(0..(1u64 << 48)))
    }

    /// Value in minor units for a given event type.
    fn value_for(&mut self, event_type: &EventType) -> f64 {
        let range = match event_type {
            EventType::Purchase => 1_000..=50_000,
            EventType::Subscription | EventType::Checkout => 2_000..=20_000,
            EventType::AddToCart => 500..=10_000,
            _ => return 0.0,
        };
        f64::from(self.rng.gen_range(range))
    }

    fn decorate(&mut self, mut event: RawEvent) -> RawEvent {
        if self.rng.gen_bool(0.8) {
            let source = self.pick(UTM_SOURCES);
            let medium = self.pick(UTM_MEDIUMS);
            let campaign = if self.rng.gen_bool(0.6) {
                Some(self.pick(UTM_CAMPAIGNS))
            } else {
                None
            };
            event = event.with_utm(source, Some(medium), campaign);
        }

        if self.rng.gen_bool(0.9) {
            event.device_type = Some(self.pick(DEVICE_TYPES).to_string());
            event.browser = Some(self.pick(BROWSERS).to_string());
        }

        if self.rng.gen_bool(0.95) {
            event.country = Some(self.pick(COUNTRIES).to_string());
        }

        event
    }

    /// Generate one random event within the hour starting at `base_time`.
    pub fn generate_event(&mut self, base_time: DateTime<Utc>) -> RawEvent {
        let event_type = EventType::parse(self.pick(EVENT_TYPES));
        let value = self.value_for(&event_type);

        let user_id = self
            .user_pool
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();

        // 70% chance of continuing an existing session
        let session_id = if !self.session_pool.is_empty() && self.rng.gen_bool(0.7) {
            let index = self.rng.gen_range(0..self.session_pool.len());
            self.session_pool[index].clone()
        } else {
            let session_id = self.new_session_id();
            self.session_pool.push_back(session_id.clone());
            if self.session_pool.len() > SESSION_POOL_SIZE {
                self.session_pool.pop_front();
            }
            session_id
        };

        let timestamp = base_time
            + Duration::minutes(self.rng.gen_range(0..60))
            + Duration::seconds(self.rng.gen_range(0..60));

        let event_id = self.next_event_id();
        let currency = if value > 0.0 {
            self.pick(CURRENCIES)
        } else {
            "USD"
        };

        let mut event = RawEvent::new(event_id, timestamp, event_type)
            .with_value(value)
            .with_user(user_id)
            .with_session(session_id);
        event.currency = currency.to_string();

        self.decorate(event)
    }

    /// Generate `count` random events spread hour by hour over `[start, end)`.
    pub fn generate_events(
        &mut self,
        count: usize,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<RawEvent> {
        let hours = (end - start).num_hours().max(1) as usize;
        let per_hour = (count / hours).max(1) as i64;

        let mut events = Vec::with_capacity(count);
        let mut current = start;
        while events.len() < count && current < end {
            let remaining = (count - events.len()) as i64;
            let hour_events = (per_hour + self.rng.gen_range(-5..=10)).max(1).min(remaining);
            for _ in 0..hour_events {
                events.push(self.generate_event(current));
            }
            current += Duration::hours(1);
        }

        events
    }

    /// Generate one funnel journey for a user.
    ///
    /// 40% of journeys stop after two to four steps and never purchase.
    pub fn generate_journey(
        &mut self,
        user_id: &str,
        session_id: &str,
        start: DateTime<Utc>,
    ) -> Vec<RawEvent> {
        let steps = if self.rng.gen_bool(0.4) {
            self.rng.gen_range(2..=4)
        } else {
            JOURNEY.len()
        };

        let mut current = start;
        let mut events = Vec::with_capacity(steps);
        for &(name, minutes_later) in &JOURNEY[..steps] {
            current += Duration::minutes(minutes_later) + Duration::seconds(self.rng.gen_range(0..60));

            let event_type = EventType::parse(name);
            let value = self.value_for(&event_type);
            let event_id = self.next_event_id();
            let event = RawEvent::new(event_id, current, event_type)
                .with_value(value)
                .with_user(user_id)
                .with_session(session_id);
            events.push(self.decorate(event));
        }

        events
    }

    /// Generate journeys for fresh users with start times uniform over `[start, end]`.
    pub fn generate_journeys(
        &mut self,
        journeys: usize,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<RawEvent> {
        let span = (end - start).num_seconds().max(1);
        let mut events = Vec::new();

        for _ in 0..journeys {
            let journey_start = start + Duration::seconds(self.rng.gen_range(0..=span));
            let user_id = format!("user_{:08x}", self.rng.gen_range(0..u32::MAX));
            let session_id = self.new_session_id();
            events.extend(self.generate_journey(&user_id, &session_id, journey_start));
        }

        events
    }

    /// Number of events generated so far.
    pub const fn generated(&self) -> u64 {
        self.counter
    }
}
