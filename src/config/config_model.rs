#[derive(Debug, Clone, PartialEq)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub port: u16,
    /// Request body limit in MiB.
    pub body_limit: u64,
    /// Request timeout in seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}
