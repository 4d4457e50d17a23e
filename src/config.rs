// config.rs
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    // Object storage configuration
    pub s3_bucket: String,
    pub s3_region: String,
    // Upload constraints
    pub max_upload_bytes: usize,
    pub max_files_per_ticket: usize,
    // Explicit timeouts (the drivers have none we want to rely on)
    pub db_acquire_timeout_secs: u64,
    pub storage_timeout_secs: u64,
    pub signed_url_expiry_secs: u64,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");
        let s3_bucket = std::env::var("S3_BUCKET").expect("S3_BUCKET must be set");

        let s3_region = std::env::var("AWS_REGION")
            .unwrap_or_else(|_| "us-east-1".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);
        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(5 * 1024 * 1024);
        let max_files_per_ticket = std::env::var("MAX_FILES_PER_TICKET")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(5);
        let db_acquire_timeout_secs = std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);
        let storage_timeout_secs = std::env::var("STORAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15);
        let signed_url_expiry_secs = std::env::var("SIGNED_URL_EXPIRY_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300);

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().unwrap(),
            port,
            s3_bucket,
            s3_region,
            max_upload_bytes,
            max_files_per_ticket,
            db_acquire_timeout_secs,
            storage_timeout_secs,
            signed_url_expiry_secs,
        }
    }
}
