use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub requests: RequestConfig,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    /// Shared secret for verifying session tokens issued by the auth service.
    pub secret: String,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

#[derive(Clone, Debug)]
pub struct RequestConfig {
    /// Upper bound on spots_needed for a single request.
    pub max_spots: u32,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_or_parse("PORT", 3000),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:3000,http://localhost:8080")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            jwt: JwtConfig {
                secret: env_or("JWT_SECRET", "change-me-to-a-secure-random-string"),
            },
            rate_limit: RateLimitConfig {
                window_secs: env_or_parse("RATE_LIMIT_WINDOW_SECS", 60),
                max_requests: env_or_parse("RATE_LIMIT_MAX", 100),
            },
            requests: RequestConfig {
                max_spots: env_or_parse("REQUEST_MAX_SPOTS", 3),
            },
        }
    }
}
