/// Push aggregated window medians to the remote API
use log::{info, warn};
use std::time::Duration;
use time::OffsetDateTime;
use url::Url;

use crate::api::transport::{HttpTransport, PostRequest, Transport};
use crate::error::{ReportError, TransportError};
use crate::models::{AirQualityReport, Credentials, WindowMedians};
use crate::utils::format_timestamp_utc;

pub const API_PATH: &str = "/api/airQuality";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);
pub const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// `<base_url>/api/airQuality`, tolerating a trailing slash on the base
pub fn endpoint(base_url: &str) -> Result<Url, ReportError> {
    let joined = format!("{}{}", base_url.trim_end_matches('/'), API_PATH);
    Url::parse(&joined).map_err(|source| ReportError::Endpoint {
        url: base_url.to_string(),
        source,
    })
}

pub struct Reporter<T: Transport> {
    transport: T,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Reporter<HttpTransport> {
    /// Reporter over a real HTTP client with the 4 second request timeout
    pub fn http() -> Result<Self, TransportError> {
        Ok(Reporter::new(HttpTransport::new(REQUEST_TIMEOUT)?))
    }
}

impl<T: Transport> Reporter<T> {
    pub fn new(transport: T) -> Self {
        Reporter {
            transport,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the request for one report timestamped `now`
    pub fn build_request(
        &self,
        medians: &WindowMedians,
        base_url: &str,
        credentials: &Credentials,
        now: OffsetDateTime,
    ) -> Result<PostRequest, ReportError> {
        let report = AirQualityReport {
            eco2: medians.eco2,
            humidity: medians.humidity,
            temperature: medians.temperature,
            date_time_utc: format_timestamp_utc(now)?,
        };

        Ok(PostRequest {
            url: endpoint(base_url)?,
            headers: vec![
                ("PiSecret", credentials.secret.clone()),
                ("PiID", credentials.id.clone()),
                ("Content-Type", "application/json".to_string()),
            ],
            body: serde_json::to_string(&report)?,
        })
    }

    /// POST the medians, retrying transport failures up to the attempt
    /// budget. A non-200 answer is final for this cycle.
    pub async fn send(
        &self,
        medians: &WindowMedians,
        base_url: &str,
        credentials: &Credentials,
    ) -> Result<(), ReportError> {
        let request =
            self.build_request(medians, base_url, credentials, OffsetDateTime::now_utc())?;

        info!(
            "Push to server: eCO2 = {:.2} ppm, temperature = {:.2} °C, humidity = {:.2} % ({} samples)",
            medians.eco2, medians.temperature, medians.humidity, medians.samples
        );

        let mut attempt = 1;
        loop {
            match self.transport.post(&request).await {
                Ok(response) if response.status == 200 => {
                    info!("Request successful");
                    return Ok(());
                }
                Ok(response) => {
                    return Err(ReportError::Rejected {
                        status: response.status,
                        body: response.body,
                    });
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        "Attempt {}/{} to {} failed: {}",
                        attempt, self.max_attempts, request.url, e
                    );
                }
                Err(source) => {
                    return Err(ReportError::Transport {
                        attempts: attempt,
                        source,
                    });
                }
            }

            attempt += 1;
            if !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }
}
