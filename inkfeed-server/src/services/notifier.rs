//! Group-chat webhook notifier
//!
//! Posts a link card (title, description, image) to a WeCom group robot. The
//! robot answers HTTP 200 even on failure; success is `errcode == 0` in the
//! body. One attempt only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WebhookSettings;

/// Notification errors; the display text is shown to the teacher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("未配置群机器人地址")]
    NotConfigured,

    #[error("请求超时")]
    Timeout,

    #[error("网络错误: {0}")]
    Network(String),

    /// Vendor rejected the message; carries `errmsg`
    #[error("{0}")]
    Rejected(String),

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),
}

/// What gets announced for one submission
#[derive(Debug, Clone, PartialEq)]
pub struct ClassroomPost {
    pub image_url: String,
    pub class_name: String,
    pub student_name: String,
    pub comment: String,
}

impl ClassroomPost {
    pub fn title(&self) -> String {
        format!("【课堂记录】{} ({})", self.student_name, self.class_name)
    }
}

/// Announces a finished submission
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, post: &ClassroomPost) -> Result<(), NotifyError>;
}

/// `{"msgtype": "news", "news": {"articles": [...]}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsMessage {
    pub msgtype: String,
    pub news: News,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct News {
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub url: String,
    pub picurl: String,
}

impl NewsMessage {
    pub fn link_card(post: &ClassroomPost) -> Self {
        Self {
            msgtype: "news".to_string(),
            news: News {
                articles: vec![Article {
                    title: post.title(),
                    description: post.comment.clone(),
                    url: post.image_url.clone(),
                    picurl: post.image_url.clone(),
                }],
            },
        }
    }
}

/// Webhook reply; absent `errcode` is treated as failure
#[derive(Debug, Deserialize)]
struct WebhookReply {
    errcode: Option<i64>,
    errmsg: Option<String>,
}

/// WeCom group robot client
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(settings: WebhookSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: settings.url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, post: &ClassroomPost) -> Result<(), NotifyError> {
        if self.url.trim().is_empty() {
            tracing::error!("Webhook URL not configured");
            return Err(NotifyError::NotConfigured);
        }

        tracing::info!(student = %post.student_name, class_name = %post.class_name, "Posting to group chat");

        let message = NewsMessage::link_card(post);
        let response = self
            .http_client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                let err = if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Network(e.to_string())
                };
                tracing::error!(error = %err, "Webhook request failed");
                err
            })?;

        let reply: WebhookReply = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Webhook reply is not valid JSON");
            NotifyError::InvalidResponse(e.to_string())
        })?;

        match reply.errcode {
            Some(0) => {
                tracing::info!("Group chat notified");
                Ok(())
            }
            code => {
                let errmsg = reply.errmsg.unwrap_or_else(|| "未知错误".to_string());
                tracing::error!(errcode = ?code, errmsg = %errmsg, "Webhook rejected message");
                Err(NotifyError::Rejected(errmsg))
            }
        }
    }
}
