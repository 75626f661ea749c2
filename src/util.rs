const AGENT_PORT: &str = "AGENT_PORT";

const DEFAULT_AGENT_PORT: u16 = 51243;

pub fn get_default_agent_port() -> u16 {
    let port_from_env = std::env::var(AGENT_PORT);
    port_from_env.map_or(DEFAULT_AGENT_PORT, |res| {
        res.parse().unwrap_or(DEFAULT_AGENT_PORT)
    })
}

const AGENT_SECRET: &str = "AGENT_SECRET";

pub fn get_agent_secret() -> Option<String> {
    let secret_from_env = std::env::var(AGENT_SECRET);
    secret_from_env.ok()
}

const BACKEND_PASSWORD: &str = "BACKEND_PASSWORD";

pub fn get_backend_password() -> Option<String> {
    let password_from_env = std::env::var(BACKEND_PASSWORD);
    password_from_env.ok()
}

const INFLUX_TOKEN: &str = "INFLUX_TOKEN";

pub fn get_influx_token() -> Option<String> {
    let token_from_env = std::env::var(INFLUX_TOKEN);
    token_from_env.ok()
}
