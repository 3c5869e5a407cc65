use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("telegram request timed out")]
    Timeout,
    #[error("telegram transport error: {0}")]
    Transport(String),
    #[error("telegram api returned {status}: {body}")]
    Api { status: u16, body: String },
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else {
            // the request url embeds the bot token
            NotifyError::Transport(err.without_url().to_string())
        }
    }
}

/// Delivers a chat message to a Telegram user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, recipient_id: i64, text: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

/// Bot API client. Every request is bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, bot_token: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), bot_token);
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, recipient_id: i64, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: recipient_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(recipient_id, "telegram message delivered");
        Ok(())
    }
}

/// Used when no bot token is configured: messages are only logged.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, recipient_id: i64, text: &str) -> Result<(), NotifyError> {
        tracing::info!(recipient_id, text, "notification (delivery disabled)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    use super::*;

    type Received = Arc<Mutex<Vec<(String, Value)>>>;

    async fn record(
        State(received): State<Received>,
        axum::extract::Path(bot): axum::extract::Path<String>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        received.lock().unwrap().push((bot, body));
        StatusCode::OK
    }

    async fn slow() -> StatusCode {
        tokio::time::sleep(Duration::from_secs(5)).await;
        StatusCode::OK
    }

    async fn spawn_api() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/:bot/sendMessage", post(record))
            .route("/slow/:bot/sendMessage", post(slow))
            .route("/broken/:bot/sendMessage", post(|| async { (StatusCode::BAD_REQUEST, "chat not found") }))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), received)
    }

    #[tokio::test]
    async fn posts_html_message_to_bot_endpoint() {
        let (base, received) = spawn_api().await;
        let notifier = TelegramNotifier::new(&base, "TOKEN", Duration::from_secs(2)).unwrap();

        notifier.send_message(42, "<b>hi</b>").await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "botTOKEN");
        assert_eq!(received[0].1["chat_id"], 42);
        assert_eq!(received[0].1["text"], "<b>hi</b>");
        assert_eq!(received[0].1["parse_mode"], "HTML");
    }

    #[tokio::test]
    async fn slow_api_times_out() {
        let (base, _) = spawn_api().await;
        let notifier = TelegramNotifier::new(&format!("{base}/slow"), "TOKEN", Duration::from_millis(200)).unwrap();

        let err = notifier.send_message(42, "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Timeout), "{err:?}");
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_bot_token() {
        // bind and drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = TelegramNotifier::new(&format!("http://{addr}"), "123456:SECRET", Duration::from_secs(2)).unwrap();

        let err = notifier.send_message(42, "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)), "{err:?}");
        assert!(!err.to_string().contains("SECRET"), "token leaked: {err}");
        assert!(!format!("{err:?}").contains("SECRET"), "token leaked: {err:?}");
    }

    #[tokio::test]
    async fn api_errors_carry_status() {
        let (base, _) = spawn_api().await;
        let notifier = TelegramNotifier::new(&format!("{base}/broken"), "TOKEN", Duration::from_secs(2)).unwrap();

        match notifier.send_message(42, "hi").await {
            Err(NotifyError::Api { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "chat not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
