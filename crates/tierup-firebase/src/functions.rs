//! Callable Cloud Functions client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::AuthClient;
use crate::error::{FunctionsError, FunctionsResult};

#[derive(Serialize)]
struct CallRequest<'a, T: ?Sized> {
    data: &'a T,
}

#[derive(Deserialize)]
struct CallError {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Invokes HTTPS callable functions as the signed-in user.
#[derive(Clone)]
pub struct FunctionsClient {
    http: Client,
    origin: String,
    auth: AuthClient,
}

impl FunctionsClient {
    /// `origin` is `https://{region}-{project}.cloudfunctions.net` or an
    /// emulator URL.
    pub fn new(
        origin: impl Into<String>,
        auth: AuthClient,
        timeout: Duration,
    ) -> FunctionsResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tierup-firebase/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            origin: origin.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Call `name` with `data` and decode its result.
    pub async fn call<Req, Resp>(&self, name: &str, data: &Req) -> FunctionsResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.origin, name);
        let token = self
            .auth
            .id_token()
            .await
            .map_err(|e| FunctionsError::Auth(e.to_string()))?;

        let mut request = self.http.post(&url).json(&CallRequest { data });
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        debug!(function = %name, "Calling function");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: Result<serde_json::Map<String, serde_json::Value>, _> =
            serde_json::from_str(&text);
        let envelope = match parsed {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(FunctionsError::Http {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(FunctionsError::InvalidResponse(e.to_string())),
        };

        if let Some(error) = envelope.get("error") {
            let error: CallError = serde_json::from_value(error.clone())?;
            let err = FunctionsError::Function {
                status: error.status.unwrap_or_else(|| "UNKNOWN".to_string()),
                message: error.message.unwrap_or_default(),
            };
            warn!(function = %name, "Function returned an error: {}", err);
            return Err(err);
        }

        if !status.is_success() {
            return Err(FunctionsError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        // A present `null` result is valid; a missing one is not.
        match envelope.get("result") {
            Some(result) => Ok(serde_json::from_value(result.clone())?),
            None => Err(FunctionsError::InvalidResponse(
                "response has neither result nor error".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthEndpoints;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FunctionsClient {
        let auth = AuthClient::new(
            "api-key",
            AuthEndpoints::emulator(&server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        FunctionsClient::new(format!("{}/", server.uri()), auth, Duration::from_secs(5)).unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Rank {
        rank: u32,
    }

    #[tokio::test]
    async fn test_call_wraps_data_and_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/leaderboardRank"))
            .and(body_json(json!({"data": {"category": "trader"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"rank": 3}})))
            .expect(1)
            .mount(&server)
            .await;

        let functions = client_for(&server);
        let rank: Rank = functions
            .call("leaderboardRank", &json!({"category": "trader"}))
            .await
            .unwrap();
        assert_eq!(rank, Rank { rank: 3 });
    }

    #[tokio::test]
    async fn test_anonymous_call_has_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ping"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "authed"})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "anonymous"})))
            .expect(1)
            .mount(&server)
            .await;

        let who: String = client_for(&server).call("ping", &()).await.unwrap();
        assert_eq!(who, "anonymous");
    }

    #[tokio::test]
    async fn test_null_result_is_valid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fireAndForget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null})))
            .mount(&server)
            .await;

        let result: Option<u32> = client_for(&server)
            .call("fireAndForget", &json!(null))
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_error_envelope_maps_to_function_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/awardXp"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"status": "INVALID_ARGUMENT", "message": "amount must be set"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .call::<_, serde_json::Value>("awardXp", &json!({}))
            .await
            .unwrap_err();

        match err {
            FunctionsError::Function { status, message } => {
                assert_eq!(status, "INVALID_ARGUMENT");
                assert_eq!(message, "amount must be set");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_failure_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/missing"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .call::<_, serde_json::Value>("missing", &json!(null))
            .await
            .unwrap_err();
        assert!(matches!(err, FunctionsError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_success_without_result_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/odd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": 1})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .call::<_, serde_json::Value>("odd", &json!(null))
            .await
            .unwrap_err();
        assert!(matches!(err, FunctionsError::InvalidResponse(_)));
    }
}
