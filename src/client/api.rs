use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use super::ClientError;
use crate::record::{Record, RecordPatch};
use crate::validation::FieldError;

const RECORDS_PATH: &str = "api/records";

/// The envelope every records response arrives in.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

/// Talks to the records API of a registry server.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    /// `base` is where the server is mounted, e.g. `http://localhost:5000/`.
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        ApiClient {
            http: Client::new(),
            base,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub async fn list(&self) -> Result<Vec<Record>, ClientError> {
        let request = self.http.get(self.records_url()?);

        self.send(request).await?.data.ok_or(ClientError::MissingData)
    }

    pub async fn create(&self, patch: &RecordPatch) -> Result<Record, ClientError> {
        let request = with_body(self.http.post(self.records_url()?), patch)?;

        self.send(request).await?.data.ok_or(ClientError::MissingData)
    }

    pub async fn retrieve(&self, id: &Uuid) -> Result<Record, ClientError> {
        let request = self.http.get(self.record_url(id)?);

        self.send(request).await?.data.ok_or(ClientError::MissingData)
    }

    pub async fn update(&self, id: &Uuid, patch: &RecordPatch) -> Result<Record, ClientError> {
        let request = with_body(self.http.patch(self.record_url(id)?), patch)?;

        self.send(request).await?.data.ok_or(ClientError::MissingData)
    }

    pub async fn delete(&self, id: &Uuid) -> Result<(), ClientError> {
        let request = self.http.delete(self.record_url(id)?);

        self.send::<serde_json::Value>(request).await?;

        Ok(())
    }

    fn records_url(&self) -> Result<Url, ClientError> {
        Ok(self.base.join(RECORDS_PATH)?)
    }

    fn record_url(&self, id: &Uuid) -> Result<Url, ClientError> {
        Ok(self.base.join(&format!("{}/{}", RECORDS_PATH, id))?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Envelope<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
            status: status.as_u16(),
            source,
        })?;

        if status.is_success() && envelope.success {
            Ok(envelope)
        } else {
            Err(ClientError::Rejected {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("HTTP error! status: {}", status)),
                errors: envelope.errors,
            })
        }
    }
}

fn with_body(request: RequestBuilder, patch: &RecordPatch) -> Result<RequestBuilder, ClientError> {
    let body = serde_json::to_vec(patch).map_err(ClientError::Encode)?;

    Ok(request.header(CONTENT_TYPE, "application/json").body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_under_the_base() {
        let client = ApiClient::new(Url::parse("http://localhost:5000/registry").unwrap());
        let id = Uuid::nil();

        assert_eq!(client.base().as_str(), "http://localhost:5000/registry/");
        assert_eq!(
            client.records_url().unwrap().as_str(),
            "http://localhost:5000/registry/api/records"
        );
        assert_eq!(
            client.record_url(&id).unwrap().as_str(),
            "http://localhost:5000/registry/api/records/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn failure_envelopes_decode_without_data() {
        let body = br#"{
            "success": false,
            "message": "Validation failed",
            "errors": [{ "path": "carNumber", "msg": "Car number is required" }]
        }"#;

        let envelope: Envelope<Record> = serde_json::from_slice(body).unwrap();

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors[0].path, crate::validation::Field::CarNumber);
    }
}
