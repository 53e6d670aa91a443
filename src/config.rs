use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_id: String,
    pub response_role: String,
    pub max_model_len: usize,
    /// Sampling defaults applied when the request leaves them unset.
    pub temperature: f32,
    pub top_p: f32,
    /// Bearer token expected on `/v1/chat/completions`. `None` disables auth.
    pub api_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".into())
            .parse()
            .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080));

        let model_id =
            env::var("MODEL_ID").unwrap_or_else(|_| "mistralai/Mistral-7B-Instruct-v0.2".into());
        let response_role = env::var("RESPONSE_ROLE").unwrap_or_else(|_| "assistant".into());

        let max_model_len = env::var("MAX_MODEL_LEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4096);
        let temperature = env::var("TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.7);
        let top_p = env::var("TOP_P")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.95);

        let api_token = env::var("API_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Self {
            listen_addr,
            model_id,
            response_role,
            max_model_len,
            temperature,
            top_p,
            api_token,
        })
    }
}
