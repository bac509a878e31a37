//! Advisory recommendations.
//!
//! Wraps a hosted text-generation service that turns the current reading
//! into flood-management recommendations. Two independent guards sit in
//! front of the upstream call, composed in fixed order:
//!
//! 1. cache guard  - recommendations are cached by (risk band,
//!    probability decile) with a fixed TTL; a fresh entry short-circuits
//!    everything else;
//! 2. rate guard   - a minimum interval between upstream calls; inside
//!    the interval the caller gets the static fallback.
//!
//! The upstream call itself is bounded by a timeout; a timeout or any
//! upstream error degrades to a static, locally generated recommendation
//! of the same shape. The advisor never fails its caller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::logging::{self, Component};
use crate::model::{Factor, RiskLevel, SensorReading};
use crate::risk;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Bound on one upstream call. Past this the call is a failure.
pub const DEFAULT_ADVISORY_TIMEOUT_SECS: u64 = 10;

/// How long a cached recommendation stays fresh.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Minimum spacing between two upstream calls.
pub const DEFAULT_MIN_CALL_INTERVAL_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Recommendation shape
// ---------------------------------------------------------------------------

/// Structured advisory output. The fallback produces exactly this shape
/// too, so consumers never need to care where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub generated_at: DateTime<Utc>,
    pub risk_level: String,
    pub probability_pct: f64,
    pub priority: String,
    pub summary: String,
    pub advisory_text: String,
    pub immediate_actions: Vec<String>,
    pub short_term_actions: Vec<String>,
    pub monitoring_priorities: Vec<String>,
    /// True when this came from the static fallback rather than the
    /// hosted service.
    pub from_fallback: bool,
}

/// Where the monitored city is and who lives there; folded into the
/// upstream prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationContext {
    pub city: String,
    pub state: String,
    pub population: u64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationContext {
    fn default() -> Self {
        LocationContext {
            city: "Dehradun".to_string(),
            state: "Uttarakhand".to_string(),
            population: 700_000,
            latitude: 30.3165,
            longitude: 78.0322,
        }
    }
}

/// Condensed local infrastructure notes quoted in the prompt so the
/// upstream service can name real assets.
const INFRASTRUCTURE_NOTES: &str = "\
Dams: Tehri Dam (42 km upstream), Asan Barrage (25 km NW), Khodri Dam (15 km S).
Pump stations: Rispana (2500 m3/hr), Bindal (1800 m3/hr), Tons confluence (3200 m3/hr), Asan basin (2100 m3/hr).
Critical areas: Clock Tower, Railway Station, ISBT Bus Stand, Paltan Bazaar.
Drainage: Rispana Nallah, Bindal River Canal, Eastern Drainage Canal, Western Bypass Drainage.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum AdvisoryError {
    /// Transport failure, including the timeout.
    Http(String),
    /// Non-2xx upstream status.
    Status(u16),
    /// Response parsed but carried no usable text.
    MissingContent,
}

impl std::fmt::Display for AdvisoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisoryError::Http(msg) => write!(f, "advisory request failed: {}", msg),
            AdvisoryError::Status(code) => write!(f, "advisory service returned {}", code),
            AdvisoryError::MissingContent => write!(f, "advisory response had no content"),
        }
    }
}

impl std::error::Error for AdvisoryError {}

// ---------------------------------------------------------------------------
// Cache key
// ---------------------------------------------------------------------------

/// Decile bucket of a probability (0..=10). Nearby probabilities share a
/// cache entry; the exact value is carried on the recommendation itself.
pub fn probability_decile(probability: f64) -> u8 {
    (risk::clamp_probability(probability) * 10.0).floor() as u8
}

/// Cache key: risk band plus probability decile.
pub type CacheKey = (RiskLevel, u8);

struct CachedEntry {
    stored_at: DateTime<Utc>,
    recommendation: Recommendation,
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

pub struct FloodAdvisor {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    cache_ttl_secs: i64,
    min_call_interval_secs: i64,
    cache: Mutex<HashMap<CacheKey, CachedEntry>>,
    last_upstream_call: Mutex<Option<DateTime<Utc>>>,
}

impl FloodAdvisor {
    pub fn new(
        api_url: &str,
        api_key: &str,
        timeout_secs: u64,
        cache_ttl_secs: i64,
        min_call_interval_secs: i64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(timeout_secs))
            .build()?;
        Ok(FloodAdvisor {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            cache_ttl_secs,
            min_call_interval_secs,
            cache: Mutex::new(HashMap::new()),
            last_upstream_call: Mutex::new(None),
        })
    }

    /// Produces a recommendation for the current reading: cache guard,
    /// then rate guard, then the upstream call, then the fallback.
    pub fn recommend_at(
        &self,
        reading: &SensorReading,
        location: &LocationContext,
        now: DateTime<Utc>,
    ) -> Recommendation {
        let risk_level = risk::classify(reading.probability);
        let key = (risk_level, probability_decile(reading.probability));

        if let Some(cached) = self.cached_at(key, now) {
            logging::debug(
                Component::Advisory,
                None,
                &format!("using cached recommendation for {} decile {}", key.0, key.1),
            );
            return cached;
        }

        if self.rate_limited_at(now) {
            logging::debug(
                Component::Advisory,
                None,
                "upstream call interval not elapsed - using fallback",
            );
            return fallback_recommendation(reading, risk_level, now);
        }

        match self.call_upstream(reading, location, risk_level, now) {
            Ok(recommendation) => {
                self.record_upstream(key, recommendation.clone(), now);
                recommendation
            }
            Err(e) => {
                logging::warn(
                    Component::Advisory,
                    None,
                    &format!("{} - using fallback recommendation", e),
                );
                fallback_recommendation(reading, risk_level, now)
            }
        }
    }

    pub fn recommend(&self, reading: &SensorReading, location: &LocationContext) -> Recommendation {
        self.recommend_at(reading, location, Utc::now())
    }

    /// Cache guard: a stored recommendation younger than the TTL.
    pub fn cached_at(&self, key: CacheKey, now: DateTime<Utc>) -> Option<Recommendation> {
        let cache = self.cache.lock().unwrap();
        let entry = cache.get(&key)?;
        if now - entry.stored_at < Duration::seconds(self.cache_ttl_secs) {
            Some(entry.recommendation.clone())
        } else {
            None
        }
    }

    /// Rate guard: true while the minimum upstream-call interval has not
    /// elapsed since the previous call.
    pub fn rate_limited_at(&self, now: DateTime<Utc>) -> bool {
        match *self.last_upstream_call.lock().unwrap() {
            None => false,
            Some(at) => now - at < Duration::seconds(self.min_call_interval_secs),
        }
    }

    /// Records a successful upstream result: caches it under `key` and
    /// stamps the rate guard.
    pub fn record_upstream(&self, key: CacheKey, recommendation: Recommendation, now: DateTime<Utc>) {
        self.cache.lock().unwrap().insert(
            key,
            CachedEntry {
                stored_at: now,
                recommendation,
            },
        );
        *self.last_upstream_call.lock().unwrap() = Some(now);
    }

    fn call_upstream(
        &self,
        reading: &SensorReading,
        location: &LocationContext,
        risk_level: RiskLevel,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, AdvisoryError> {
        let prompt = build_prompt(reading, location, risk_level);
        let url = format!("{}?key={}", self.api_url, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .map_err(|e| AdvisoryError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdvisoryError::Status(response.status().as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| AdvisoryError::Http(e.to_string()))?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or(AdvisoryError::MissingContent)?;

        Ok(structure_advisory(&text, reading, risk_level, now))
    }
}

// ---------------------------------------------------------------------------
// Upstream wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

// ---------------------------------------------------------------------------
// Prompt and response structuring
// ---------------------------------------------------------------------------

/// Section headers the structurer scans for. The prompt asks for exactly
/// these so parsing stays a line scan, not NLP.
const SECTION_HEADERS: [(&str, usize); 4] = [
    ("IMMEDIATE ACTIONS", 0),
    ("SHORT-TERM ACTIONS", 1),
    ("MONITORING PRIORITIES", 2),
    ("RISK ASSESSMENT", 3),
];

pub fn build_prompt(
    reading: &SensorReading,
    location: &LocationContext,
    risk_level: RiskLevel,
) -> String {
    format!(
        "You are a flood management advisor for {city}, {state}, India \
         (population {population}, {lat:.4} N {lon:.4} E).\n\
         Current situation: flood risk {pct:.1}% ({risk}), monsoon intensity {monsoon}/16, \
         drainage systems {drainage}/16, landslide factor {landslides}/16, scenario '{scenario}'.\n\
         Local infrastructure:\n{infra}\n\
         Provide specific, actionable recommendations as short bullet lists under exactly \
         these headers: IMMEDIATE ACTIONS, SHORT-TERM ACTIONS, MONITORING PRIORITIES, \
         RISK ASSESSMENT. Name real assets and keep each bullet under 120 characters.",
        city = location.city,
        state = location.state,
        population = location.population,
        lat = location.latitude,
        lon = location.longitude,
        pct = reading.probability * 100.0,
        risk = risk_level,
        monsoon = reading.factor(Factor::MonsoonIntensity),
        drainage = reading.factor(Factor::DrainageSystems),
        landslides = reading.factor(Factor::Landslides),
        scenario = reading.scenario,
        infra = INFRASTRUCTURE_NOTES,
    )
}

/// Splits upstream text into the bullet lists under each known header.
pub fn extract_sections(text: &str) -> [Vec<String>; 4] {
    let mut sections: [Vec<String>; 4] = Default::default();
    let mut current: Option<usize> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let upper = line.to_uppercase();
        if let Some(&(_, index)) = SECTION_HEADERS
            .iter()
            .find(|(header, _)| upper.contains(header))
        {
            current = Some(index);
            continue;
        }
        if let Some(index) = current {
            let is_bullet = line.starts_with('-')
                || line.starts_with('*')
                || line.chars().next().is_some_and(|c| c.is_ascii_digit());
            if is_bullet {
                let cleaned = line
                    .trim_start_matches(|c: char| {
                        c == '-' || c == '*' || c == '.' || c.is_ascii_digit() || c.is_whitespace()
                    })
                    .to_string();
                if !cleaned.is_empty() {
                    sections[index].push(cleaned);
                }
            }
        }
    }
    sections
}

fn structure_advisory(
    text: &str,
    reading: &SensorReading,
    risk_level: RiskLevel,
    now: DateTime<Utc>,
) -> Recommendation {
    let pct = reading.probability * 100.0;
    let [immediate, short_term, monitoring, _risk_notes] = extract_sections(text);
    Recommendation {
        generated_at: now,
        risk_level: risk_level.as_str().to_string(),
        probability_pct: pct,
        priority: priority_for(pct).to_string(),
        summary: summary_for(risk_level, pct),
        advisory_text: text.to_string(),
        immediate_actions: immediate,
        short_term_actions: short_term,
        monitoring_priorities: monitoring,
        from_fallback: false,
    }
}

// ---------------------------------------------------------------------------
// Static fallback
// ---------------------------------------------------------------------------

pub fn priority_for(probability_pct: f64) -> &'static str {
    if probability_pct >= 80.0 {
        "CRITICAL - Immediate Action Required"
    } else if probability_pct >= 60.0 {
        "HIGH - Urgent Response Needed"
    } else if probability_pct >= 40.0 {
        "MEDIUM - Precautionary Measures"
    } else {
        "LOW - Monitor and Prepare"
    }
}

fn summary_for(risk_level: RiskLevel, pct: f64) -> String {
    match risk_level {
        RiskLevel::Severe => format!(
            "CRITICAL FLOOD SITUATION: {:.1}% risk requires immediate evacuation and emergency response.",
            pct
        ),
        RiskLevel::High => format!(
            "HIGH FLOOD RISK: {:.1}% probability requires urgent preventive measures.",
            pct
        ),
        RiskLevel::Mild => format!(
            "MODERATE FLOOD RISK: {:.1}% probability requires monitoring and precaution.",
            pct
        ),
        RiskLevel::Low => format!(
            "LOW FLOOD RISK: {:.1}% probability - continue routine monitoring.",
            pct
        ),
    }
}

/// Locally generated recommendation used whenever the hosted service is
/// unavailable, throttled, or too slow. Same shape as the remote result.
pub fn fallback_recommendation(
    reading: &SensorReading,
    risk_level: RiskLevel,
    now: DateTime<Utc>,
) -> Recommendation {
    let pct = reading.probability * 100.0;

    let (immediate, short_term) = if pct >= 80.0 {
        (
            vec![
                "Activate emergency response teams immediately".to_string(),
                "Open Tehri Dam spillways for controlled release".to_string(),
                "Activate all Rispana and Bindal pump stations".to_string(),
                "Issue evacuation orders for Clock Tower and Railway Station areas".to_string(),
            ],
            vec![
                "Coordinate Asan Barrage operations for downstream management".to_string(),
                "Prepare district hospitals and shelters".to_string(),
                "Activate emergency broadcast systems".to_string(),
            ],
        )
    } else if pct >= 60.0 {
        (
            vec![
                "Deploy emergency response teams on high alert".to_string(),
                "Activate Bindal and Rispana pump stations".to_string(),
                "Issue flood warnings for vulnerable areas".to_string(),
            ],
            vec![
                "Monitor Asan Barrage water levels closely".to_string(),
                "Position emergency vehicles at key locations".to_string(),
            ],
        )
    } else if pct >= 40.0 {
        (
            vec![
                "Increase monitoring of all water bodies".to_string(),
                "Test pump station operations".to_string(),
                "Alert emergency services to standby".to_string(),
            ],
            vec![
                "Check drainage systems in flood-prone areas".to_string(),
                "Prepare public warning systems".to_string(),
            ],
        )
    } else {
        (
            vec![
                "Continue routine monitoring".to_string(),
                "Inspect drainage channels".to_string(),
            ],
            vec![
                "Review emergency protocols".to_string(),
                "Track weather forecasts".to_string(),
            ],
        )
    };

    let monitoring = vec![
        format!(
            "Monsoon intensity (current {}/16)",
            reading.factor(Factor::MonsoonIntensity)
        ),
        format!(
            "Drainage system load (current {}/16)",
            reading.factor(Factor::DrainageSystems)
        ),
        "River levels at Tons, Asan and Song".to_string(),
    ];

    Recommendation {
        generated_at: now,
        risk_level: risk_level.as_str().to_string(),
        probability_pct: pct,
        priority: priority_for(pct).to_string(),
        summary: summary_for(risk_level, pct),
        advisory_text: format!(
            "Offline flood management guidance for {} risk ({:.1}%): standard protocols applied.",
            risk_level, pct
        ),
        immediate_actions: immediate,
        short_term_actions: short_term,
        monitoring_priorities: monitoring,
        from_fallback: true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
