use crate::error::{LlmError, Result};
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// 发送 JSON 请求并反序列化响应；非 2xx 状态码转为 [`LlmError::ApiError`]
pub async fn post<Req, Resp>(
    client: &Client,
    request_body: &Req,
    header_map: HeaderMap,
    url: &str,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    debug!(url, "POST");
    let response = client
        .post(url)
        .headers(header_map)
        .json(request_body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(LlmError::ApiError {
            status,
            message: error_text,
        }
        .into());
    }

    let parsed = response
        .json::<Resp>()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    Ok(parsed)
}
