use std::env;

/// Runtime configuration for the orchestrator. Defaults mirror what the
/// admin console exposes; every knob can be overridden through the
/// environment.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on items selected per execution when the workflow does
    /// not override it.
    pub article_num: usize,
    /// Byline placed into rendered artifacts.
    pub author: String,
    /// Parallel execution slots shared by all workflows.
    pub worker_count: usize,
    /// Scheduler timer resolution in seconds.
    pub tick_secs: u64,
    /// Per-call timeout for connector fetches.
    pub fetch_timeout_secs: u64,
    /// Per-call timeout for publisher deliveries.
    pub publish_timeout_secs: u64,
    /// Timeout for data-source connectivity probes.
    pub probe_timeout_secs: u64,
    /// Transient-failure retries inside a single connector fetch.
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Oldest log entries are evicted past this count.
    pub log_retention: usize,
    pub firecrawl_api_base: String,
    pub firecrawl_api_key: String,
    pub twitter_api_base: String,
    pub twitter_bearer_token: String,
    pub weixin_api_base: String,
    pub weixin_app_id: String,
    pub weixin_app_secret: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            article_num: 10,
            author: "AI Assistant".to_string(),
            worker_count: 4,
            tick_secs: 30,
            fetch_timeout_secs: 30,
            publish_timeout_secs: 60,
            probe_timeout_secs: 10,
            max_retries: 3,
            retry_delay_secs: 5,
            log_retention: 1000,
            firecrawl_api_base: "https://api.firecrawl.dev".to_string(),
            firecrawl_api_key: String::new(),
            twitter_api_base: "https://api.twitterapi.io".to_string(),
            twitter_bearer_token: String::new(),
            weixin_api_base: "https://api.weixin.qq.com".to_string(),
            weixin_app_id: String::new(),
            weixin_app_secret: String::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Build a configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            article_num: env_parse("ARTICLE_NUM", defaults.article_num),
            author: env_or("AUTHOR", defaults.author),
            worker_count: env_parse("WORKER_COUNT", defaults.worker_count),
            tick_secs: env_parse("SCHEDULER_TICK_SECS", defaults.tick_secs),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
            publish_timeout_secs: env_parse("PUBLISH_TIMEOUT_SECS", defaults.publish_timeout_secs),
            probe_timeout_secs: env_parse("PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
            max_retries: env_parse("FETCH_MAX_RETRIES", defaults.max_retries),
            retry_delay_secs: env_parse("FETCH_RETRY_DELAY_SECS", defaults.retry_delay_secs),
            log_retention: env_parse("LOG_RETENTION", defaults.log_retention),
            firecrawl_api_base: env_or("FIRECRAWL_API_BASE", defaults.firecrawl_api_base),
            firecrawl_api_key: env_or("FIRECRAWL_API_KEY", defaults.firecrawl_api_key),
            twitter_api_base: env_or("TWITTER_API_BASE", defaults.twitter_api_base),
            twitter_bearer_token: env_or("TWITTER_BEARER_TOKEN", defaults.twitter_bearer_token),
            weixin_api_base: env_or("WEIXIN_API_BASE", defaults.weixin_api_base),
            weixin_app_id: env_or("WEIXIN_APP_ID", defaults.weixin_app_id),
            weixin_app_secret: env_or("WEIXIN_APP_SECRET", defaults.weixin_app_secret),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
