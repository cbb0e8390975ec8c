use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // S3-compatible storage endpoint URL (MinIO in local).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // Bucket receiving product image uploads.
    pub s3_bucket: String,
    // Runtime environment marker. Controls the dev bypass and log format.
    pub env: Env,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued session token and its cookie, in seconds.
    pub session_max_age_secs: i64,
    // Work factor handed to bcrypt when hashing passwords.
    pub bcrypt_cost: u32,
    // Optional bootstrap account created at startup when missing.
    pub superadmin_seed: Option<SuperadminSeed>,
}

/// Env
///
/// Defines the runtime context, used to switch between development utilities
/// (MinIO, in-memory store, header bypass) and hardened production settings.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// Credentials for the superadmin account provisioned on first boot.
#[derive(Clone, Debug)]
pub struct SuperadminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_BCRYPT_COST: u32 = 10;
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    /// The bcrypt cost is the library minimum so that tests hashing passwords stay fast.
    fn default() -> Self {
        Self {
            db_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "shop-test".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
            bcrypt_cost: 4,
            superadmin_seed: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and implements the **fail-fast**
    /// principle.
    ///
    /// # Panics
    /// Panics if a variable required for the current runtime environment is missing
    /// (production requires `DATABASE_URL`, `JWT_SECRET` and the S3 credentials), or if
    /// a numeric setting cannot be parsed.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let session_max_age_secs = env::var("SESSION_MAX_AGE_SECS")
            .map(|v| {
                v.parse::<i64>()
                    .expect("FATAL: SESSION_MAX_AGE_SECS must be an integer")
            })
            .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECS);

        let bcrypt_cost = env::var("BCRYPT_COST")
            .map(|v| v.parse::<u32>().expect("FATAL: BCRYPT_COST must be an integer"))
            .unwrap_or(DEFAULT_BCRYPT_COST);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let superadmin_seed = match (env::var("SUPERADMIN_EMAIL"), env::var("SUPERADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(SuperadminSeed {
                email,
                password,
                name: env::var("SUPERADMIN_NAME").unwrap_or_else(|_| "Super Admin".to_string()),
            }),
            _ => None,
        };

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Without a database the service runs on the in-memory store.
                db_url: env::var("DATABASE_URL").ok(),
                bind_addr,
                s3_endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                s3_region: "us-east-1".to_string(),
                s3_key: "admin".to_string(),
                s3_secret: "password".to_string(),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "shop-uploads".to_string()),
                jwt_secret,
                session_max_age_secs,
                bcrypt_cost,
                superadmin_seed,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                bind_addr,
                s3_endpoint: env::var("S3_ENDPOINT").expect("FATAL: S3_ENDPOINT required in prod"),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_key: env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required in prod"),
                s3_secret: env::var("S3_SECRET_KEY")
                    .expect("FATAL: S3_SECRET_KEY required in prod"),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "shop-uploads".to_string()),
                jwt_secret,
                session_max_age_secs,
                bcrypt_cost,
                superadmin_seed,
            },
        }
    }
}
