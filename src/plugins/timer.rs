//! Timer plugin: scheduled reminders driven by in-text tags
//!
//! The model sets, lists and removes timers through self-closing tags in
//! its reply text:
//!
//! ```xml
//! <set-timer time="in 5 minutes" reason="check email" repeat="once" />
//! <list-timers />
//! <remove-timer id="timer-id" />
//! ```
//!
//! Tags are replaced with confirmation strings by a reply handler at
//! priority 50. Timers persist as a JSON object keyed by id (default
//! `~/.ye-linghua/timers.json`, parent created on demand, atomic at the
//! file-replace level). A single cooperative scheduler task wakes every
//! 30 seconds, fires due timers through a registered callback, removes
//! one-shot timers and advances repeating ones.

use super::{Plugin, PluginContext, PluginKind, PluginMetadata, ReplyHandler};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use uuid::Uuid;

const PLUGIN_ID: &str = "timer";
const SCHEDULER_INTERVAL_SECS: u64 = 30;

/// Timer repeat strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatStrategy {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatStrategy {
    /// Parse a tag attribute value. Unknown strings fall back to `Once`
    /// with a warning rather than dropping the whole tag.
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "once" => RepeatStrategy::Once,
            "daily" => RepeatStrategy::Daily,
            "weekly" => RepeatStrategy::Weekly,
            "monthly" => RepeatStrategy::Monthly,
            other => {
                log::warn!("unknown repeat strategy '{other}', defaulting to once");
                RepeatStrategy::Once
            }
        }
    }

    /// The interval added after a repeating timer fires. Monthly uses a
    /// flat 30-day approximation.
    fn interval(&self) -> Option<ChronoDuration> {
        match self {
            RepeatStrategy::Once => None,
            RepeatStrategy::Daily => Some(ChronoDuration::days(1)),
            RepeatStrategy::Weekly => Some(ChronoDuration::weeks(1)),
            RepeatStrategy::Monthly => Some(ChronoDuration::days(30)),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RepeatStrategy::Once => "once",
            RepeatStrategy::Daily => "daily",
            RepeatStrategy::Weekly => "weekly",
            RepeatStrategy::Monthly => "monthly",
        }
    }
}

/// One scheduled timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerTask {
    /// Stored as the key of the persistence map, not in the value.
    #[serde(skip)]
    pub id: String,
    pub trigger_time: DateTime<Local>,
    pub reason: String,
    pub repeat: RepeatStrategy,
    pub context_summary: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Local>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

// ============================================================================
// STORAGE
// ============================================================================

/// JSON-file backed store of timers, keyed by id.
#[derive(Debug)]
pub struct TimerStorage {
    path: PathBuf,
    timers: HashMap<String, TimerTask>,
}

impl TimerStorage {
    /// Open (or create) the store at `path`, loading any existing timers.
    /// Entries that fail to parse are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut timers = HashMap::new();

        if path.exists() {
            let loaded = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    serde_json::from_str::<HashMap<String, TimerTask>>(&raw)
                        .map_err(|e| e.to_string())
                });
            match loaded {
                Ok(loaded) => {
                    for (id, mut timer) in loaded {
                        timer.id = id.clone();
                        timers.insert(id, timer);
                    }
                }
                Err(e) => log::warn!("could not load timer store {}: {e}", path.display()),
            }
        }

        Self { path, timers }
    }

    /// The default store location: `~/.ye-linghua/timers.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ye-linghua")
            .join("timers.json")
    }

    /// Persist the store: write a sibling temp file, then rename over the
    /// target so readers never observe a partial file.
    fn save(&self) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let data = serde_json::to_string_pretty(&self.timers)?;
            let tmp = self.path.with_extension("json.tmp");
            std::fs::write(&tmp, data)?;
            std::fs::rename(&tmp, &self.path)?;
            Ok(())
        };
        if let Err(e) = write() {
            log::warn!("could not save timer store {}: {e}", self.path.display());
        }
    }

    pub fn add(&mut self, timer: TimerTask) {
        self.timers.insert(timer.id.clone(), timer);
        self.save();
    }

    pub fn remove(&mut self, timer_id: &str) -> bool {
        let removed = self.timers.remove(timer_id).is_some();
        if removed {
            self.save();
        }
        removed
    }

    pub fn get(&self, timer_id: &str) -> Option<&TimerTask> {
        self.timers.get(timer_id)
    }

    pub fn all(&self) -> Vec<TimerTask> {
        self.timers.values().cloned().collect()
    }

    /// Enabled timers whose trigger time has passed.
    pub fn due(&self, now: DateTime<Local>) -> Vec<TimerTask> {
        self.timers
            .values()
            .filter(|t| t.enabled && t.trigger_time <= now)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

// ============================================================================
// CORE (shared between plugin, handler and scheduler)
// ============================================================================

/// Callback invoked when a timer fires.
pub type TimerCallback =
    Arc<dyn Fn(TimerTask) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct TimerCore {
    storage: Mutex<TimerStorage>,
    callback: Mutex<Option<TimerCallback>>,
}

impl TimerCore {
    fn set_timer(&self, time_str: &str, reason: &str, repeat: RepeatStrategy, context: &PluginContext) -> String {
        let trigger_time = parse_time_string(time_str);
        let id = Uuid::new_v4().to_string();

        let timer = TimerTask {
            id: id.clone(),
            trigger_time,
            reason: reason.to_string(),
            repeat,
            context_summary: context.message_summary(),
            platform: context.platform.clone(),
            user_id: context.user_id.clone(),
            created_at: Local::now(),
            enabled: true,
        };

        self.storage.lock().expect("timer storage poisoned").add(timer);
        log::info!("set timer {id} for {trigger_time}");
        id
    }

    /// Remove by id prefix, matching the short ids shown in confirmations.
    fn remove_timer(&self, prefix: &str) -> bool {
        let mut storage = self.storage.lock().expect("timer storage poisoned");
        let full_id = storage
            .all()
            .into_iter()
            .map(|t| t.id)
            .find(|id| id.starts_with(prefix));
        match full_id {
            Some(id) => storage.remove(&id),
            None => false,
        }
    }

    fn list_timers(&self) -> String {
        let mut timers = self.storage.lock().expect("timer storage poisoned").all();
        if timers.is_empty() {
            return "📋 No active timers".to_string();
        }
        timers.sort_by_key(|t| t.trigger_time);

        let mut lines = vec!["📋 Active timers:".to_string()];
        for timer in timers {
            let status = if timer.enabled { "✅" } else { "❌" };
            lines.push(format!(
                "{status} [{}] {} - {} ({})",
                &timer.id[..8.min(timer.id.len())],
                timer.trigger_time.format("%Y-%m-%d %H:%M:%S"),
                timer.reason,
                timer.repeat.as_str(),
            ));
        }
        lines.join("\n")
    }

    /// One scheduler sweep: fire every due timer through the callback, then
    /// remove one-shot timers and advance repeating ones.
    async fn sweep_due(&self, now: DateTime<Local>) {
        let due = self.storage.lock().expect("timer storage poisoned").due(now);
        if due.is_empty() {
            return;
        }

        let callback = self.callback.lock().expect("timer callback poisoned").clone();

        for timer in due {
            if let Some(callback) = &callback {
                callback(timer.clone()).await;
            }

            let mut storage = self.storage.lock().expect("timer storage poisoned");
            match timer.repeat.interval() {
                None => {
                    storage.remove(&timer.id);
                }
                Some(interval) => {
                    let mut advanced = timer.clone();
                    advanced.trigger_time += interval;
                    storage.add(advanced);
                }
            }
        }
    }
}

// ============================================================================
// TIME PARSING
// ============================================================================

/// Parse a tag time attribute into a local trigger time. Accepts relative
/// times (`"in 5 minutes"`), RFC 3339 / ISO 8601, and a handful of common
/// absolute formats; anything else defaults to one hour from now.
fn parse_time_string(time_str: &str) -> DateTime<Local> {
    let time_str = time_str.trim();
    let lowered = time_str.to_lowercase();
    let now = Local::now();

    // Relative: "in N {minute|hour|day|week}(s)"
    if let Some(rest) = lowered.strip_prefix("in ") {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() >= 2 {
            if let Ok(amount) = parts[0].parse::<i64>() {
                let unit = parts[1];
                let delta = if unit.contains("minute") {
                    Some(ChronoDuration::minutes(amount))
                } else if unit.contains("hour") {
                    Some(ChronoDuration::hours(amount))
                } else if unit.contains("day") {
                    Some(ChronoDuration::days(amount))
                } else if unit.contains("week") {
                    Some(ChronoDuration::weeks(amount))
                } else {
                    None
                };
                if let Some(delta) = delta {
                    return now + delta;
                }
            }
        }
    }

    // ISO 8601 with offset
    if let Ok(parsed) = DateTime::parse_from_rfc3339(time_str) {
        return parsed.with_timezone(&Local);
    }

    // Naive formats, interpreted in local time
    const FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M",
        "%d/%m/%Y %H:%M",
    ];
    for format in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(time_str, format) {
            if let Some(local) = Local.from_local_datetime(&naive).single() {
                return local;
            }
        }
    }

    log::warn!("could not parse time string '{time_str}', defaulting to 1 hour from now");
    now + ChronoDuration::hours(1)
}

// ============================================================================
// REPLY HANDLER
// ============================================================================

fn set_timer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<set-timer\s+time=["']([^"']+)["']\s+reason=["']([^"']+)["'](?:\s+repeat=["']([^"']+)["'])?\s*/?>"#,
        )
        .expect("set-timer pattern")
    })
}

fn list_timers_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<list-timers\s*/?>").expect("list-timers pattern"))
}

fn remove_timer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<remove-timer\s+id=["']([^"']+)["']\s*/?>"#).expect("remove-timer pattern")
    })
}

struct TimerReplyHandler {
    core: Arc<TimerCore>,
}

#[async_trait]
impl ReplyHandler for TimerReplyHandler {
    fn plugin_id(&self) -> &str {
        PLUGIN_ID
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn handle(&self, text: &str, context: &PluginContext) -> (String, bool) {
        let mut output = text.to_string();

        for captures in set_timer_re().captures_iter(text) {
            let time_str = &captures[1];
            let reason = &captures[2];
            let repeat = captures
                .get(3)
                .map(|m| RepeatStrategy::parse(m.as_str()))
                .unwrap_or(RepeatStrategy::Once);

            let id = self.core.set_timer(time_str, reason, repeat, context);
            let confirmation = format!("✅ Timer set (ID: {})", &id[..8]);
            output = output.replace(&captures[0], &confirmation);
        }

        for captures in list_timers_re().captures_iter(text) {
            let listing = self.core.list_timers();
            output = output.replace(&captures[0], &listing);
        }

        for captures in remove_timer_re().captures_iter(text) {
            let id = &captures[1];
            let confirmation = if self.core.remove_timer(id) {
                format!("✅ Removed timer {id}")
            } else {
                format!("❌ No timer found: {id}")
            };
            output = output.replace(&captures[0], &confirmation);
        }

        (output, true)
    }
}

// ============================================================================
// PLUGIN
// ============================================================================

/// The timer plugin: tag handler, persistent store and scheduler task.
pub struct TimerPlugin {
    metadata: PluginMetadata,
    core: Arc<TimerCore>,
    scheduler: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TimerPlugin {
    /// Create a timer plugin persisting at the default store path.
    pub fn new() -> Self {
        Self::with_storage(TimerStorage::default_path())
    }

    /// Create a timer plugin persisting at a specific path.
    pub fn with_storage(path: impl Into<PathBuf>) -> Self {
        let mut metadata =
            PluginMetadata::new(PLUGIN_ID, "Timer Plugin", "1.0.0", "Scheduled tasks and reminders");
        metadata.kind = PluginKind::Native;

        Self {
            metadata,
            core: Arc::new(TimerCore {
                storage: Mutex::new(TimerStorage::open(path)),
                callback: Mutex::new(None),
            }),
            scheduler: Mutex::new(None),
        }
    }

    /// Register the callback invoked when a timer fires.
    pub fn set_callback<F, Fut>(&self, callback: F)
    where
        F: Fn(TimerTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.core.callback.lock().expect("timer callback poisoned") =
            Some(Arc::new(move |timer| Box::pin(callback(timer))));
    }

    /// Number of stored timers (all states).
    pub fn timer_count(&self) -> usize {
        self.core.storage.lock().expect("timer storage poisoned").len()
    }

    /// Run one scheduler sweep immediately. The background task calls this
    /// every 30 seconds; tests and embedders can call it directly.
    pub async fn sweep_now(&self) {
        self.core.sweep_due(Local::now()).await;
    }
}

impl Default for TimerPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for TimerPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn initialise(&self) -> Result<()> {
        let core = self.core.clone();
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(SCHEDULER_INTERVAL_SECS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                core.sweep_due(Local::now()).await;
            }
        });
        *self.scheduler.lock().expect("timer scheduler poisoned") = Some(handle);
        log::info!("timer plugin initialised");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = self.scheduler.lock().expect("timer scheduler poisoned").take() {
            handle.abort();
        }
        log::info!("timer plugin shut down");
        Ok(())
    }

    async fn prompt_extension(&self, _context: &PluginContext) -> String {
        r#"## Timers

You can manage reminders with these tags:

1. Set a timer:
   <set-timer time="in 5 minutes" reason="check email" repeat="once" />
   - time: "in N minutes/hours/days/weeks" or an absolute time
   - reason: what to remind about
   - repeat: once, daily, weekly, monthly

2. List all timers:
   <list-timers />

3. Remove a timer:
   <remove-timer id="timer-id-here" />

The tags are processed automatically and replaced with their results."#
            .to_string()
    }

    fn reply_handlers(&self) -> Vec<Arc<dyn ReplyHandler>> {
        vec![Arc::new(TimerReplyHandler {
            core: self.core.clone(),
        })]
    }
}
