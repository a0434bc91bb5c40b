use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    /// Workload ceiling for the scorer's capacity term.
    pub max_workload: u32,
    /// How many ranked candidates an unassigned createTask returns.
    pub suggestion_count: usize,
    pub caller_cache_capacity: usize,
    pub caller_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let max_workload = env::var("MAX_WORKLOAD")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(crate::scorer::MAX_WORKLOAD);
        let suggestion_count = env::var("SUGGESTION_COUNT")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(crate::scorer::DEFAULT_TOP_K);
        let caller_cache_capacity = env::var("CALLER_CACHE_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .unwrap_or(256);
        let caller_cache_ttl_secs = env::var("CALLER_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        Self {
            mongo_uri: env::var("MONGO_URI").expect("MONGO_URI must be set"),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "task_assignment".to_string()),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            max_workload,
            suggestion_count,
            caller_cache_capacity,
            caller_cache_ttl_secs,
        }
    }

    pub fn caller_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.caller_cache_ttl_secs)
    }
}
