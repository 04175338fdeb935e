use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;

use super::{GravatarError, GravatarLookup};

const AVATAR_BASE: &str = "https://www.gravatar.com/avatar";

/// Hex MD5 of the trimmed, lower-cased address.
pub fn email_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.trim().to_lowercase().as_bytes()))
}

/// `d=404` makes Gravatar answer 404 instead of serving a default image.
pub fn avatar_url(email: &str) -> String {
    format!("{AVATAR_BASE}/{}?d=404", email_hash(email))
}

pub struct HttpGravatar {
    client: reqwest::Client,
}

impl HttpGravatar {
    pub fn new(timeout: Duration) -> Result<Self, GravatarError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mailverify/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|source| GravatarError::Http { source })?;
        Ok(Self { client })
    }
}

impl GravatarLookup for HttpGravatar {
    fn has_avatar<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<bool, GravatarError>> {
        async move {
            let response = self
                .client
                .head(avatar_url(email))
                .send()
                .await
                .map_err(|source| GravatarError::Http { source })?;
            match response.status() {
                StatusCode::OK => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                other => {
                    tracing::debug!(status = other.as_u16(), "unexpected gravatar status");
                    Err(GravatarError::UnexpectedStatus(other.as_u16()))
                }
            }
        }
        .boxed()
    }
}
