//! Websocket transport, optionally tunnelled through an HTTP proxy

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{GatewayError, GatewayResult};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MAX_PROXY_RESPONSE: usize = 8 * 1024;

/// Gateway endpoint with protocol version and encoding
pub(crate) fn endpoint(base: &str) -> String {
    format!("{}/?v=10&encoding=json", base.trim_end_matches('/'))
}

pub(crate) async fn connect(url: &str, proxy: Option<&str>) -> GatewayResult<WsStream> {
    let Some(proxy) = proxy else {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        return Ok(stream);
    };

    let (host, port) = host_and_port(url)?;
    let (proxy_host, proxy_port) = host_and_port(proxy)?;
    tracing::debug!(proxy = %proxy_host, target = %host, "Tunnelling gateway connection");

    let mut tcp = TcpStream::connect((proxy_host.as_str(), proxy_port)).await?;
    tunnel(&mut tcp, &host, port).await?;
    let (stream, _) = tokio_tungstenite::client_async_tls(url, tcp).await?;
    Ok(stream)
}

fn host_and_port(url: &str) -> GatewayResult<(String, u16)> {
    let uri: Uri = url.parse().map_err(|_| GatewayError::InvalidUrl(url.to_string()))?;
    let host = uri
        .host()
        .ok_or_else(|| GatewayError::InvalidUrl(url.to_string()))?
        .to_string();
    let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("wss" | "https") => 443,
        _ => 80,
    });
    Ok((host, port))
}

/// Issue `CONNECT host:port` and consume the proxy's response head
async fn tunnel<S>(stream: &mut S, host: &str, port: u16) -> GatewayResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            return Err(GatewayError::Proxy("connection closed during CONNECT".into()));
        }
        head.push(byte[0]);
        if head.len() > MAX_PROXY_RESPONSE {
            return Err(GatewayError::Proxy("response head too large".into()));
        }
    }

    let head = String::from_utf8_lossy(&head);
    let status_line = head.lines().next().unwrap_or_default();
    match status_line.split_whitespace().nth(1) {
        Some("200") => Ok(()),
        _ => Err(GatewayError::Proxy(status_line.to_string())),
    }
}
