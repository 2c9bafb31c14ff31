use reqwest::Client;
use std::time::Duration;
use anyhow::Result;
use tracing::info;

use crate::config::pipeline_config::FetchConfig;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// RSS 抓取用的 Client：固定超时 + 机器人 UA
    /// 超时是整条流水线里唯一的时间约束，失败不重试
    pub fn create_feed(fetch: &FetchConfig) -> Result<Client> {
        let builder = Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .connect_timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(fetch.user_agent.clone())
            .pool_idle_timeout(Duration::from_secs(90));

        info!("🌐 [Http Client] Feed client ready (timeout {}s)", fetch.timeout_secs);

        let client = builder.build()?;
        Ok(client)
    }

    /// 长连接 Client (用于 LLM chat completions)
    /// 大 prompt + 慢推理，总超时放宽
    pub fn create_llm() -> Result<Client> {
        let builder = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            // 强制 HTTP/1.1，避免部分云网络下 HTTP/2 断流
            .http1_only();

        let client = builder.build()?;
        Ok(client)
    }
}
