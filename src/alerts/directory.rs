use crate::error::{AlertError, AlertResult};
use crate::models::location::LocationKey;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Lookup of the users an alert concerns.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users who marked the location as a favorite.
    async fn users_favoriting_location(&self, location_id: Uuid) -> AlertResult<Vec<i64>>;

    /// Users whose home address is in the location.
    async fn users_residing_at(&self, key: &LocationKey) -> AlertResult<Vec<i64>>;
}

/// Directory backed by the user service's REST API.
pub struct HttpUserDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> AlertResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_ids(&self, request: reqwest::RequestBuilder) -> AlertResult<Vec<i64>> {
        let response = request
            .send()
            .await
            .map_err(|e| AlertError::DirectoryLookupFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::DirectoryLookupFailed(format!(
                "user service returned {}",
                status
            )));
        }
        response
            .json::<Vec<i64>>()
            .await
            .map_err(|e| AlertError::DirectoryLookupFailed(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn users_favoriting_location(&self, location_id: Uuid) -> AlertResult<Vec<i64>> {
        let url = format!(
            "{}/api/user/favorites/location/{}/users",
            self.base_url, location_id
        );
        self.fetch_ids(self.http.get(url)).await
    }

    async fn users_residing_at(&self, key: &LocationKey) -> AlertResult<Vec<i64>> {
        let url = format!("{}/api/user/location", self.base_url);
        let request = self.http.get(url).query(&[
            ("city", key.city()),
            ("stateCode", key.region()),
            ("countryCode", key.country()),
        ]);
        self.fetch_ids(request).await
    }
}
