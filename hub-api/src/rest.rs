use std::{
    borrow::Cow,
    time::{Duration, Instant},
};

use bytes::Bytes;
use http::{
    HeaderMap, Method, StatusCode,
    header::{CONTENT_TYPE, HeaderName, HeaderValue},
};
use hub_std::{backoff, fmt::DisplayMs};
use reqwest::IntoUrl;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{Instrument, debug, field, info_span, warn};

use crate::{
    error::{
        CommonApiError, CommonErrorKind, ErrorCode, ErrorResponse, HubApiError,
    },
    types::CsrfToken,
};

/// The tracing target for all client request logs.
pub const TARGET: &str = "http";

/// The header the Hub's CSRF middleware reads the token from.
pub static CSRF_HEADER_NAME: HeaderName =
    HeaderName::from_static("x-csrf-token");

pub static CONTENT_TYPE_JSON: HeaderValue =
    HeaderValue::from_static("application/json");

// Closing a channel with an offline peer can take a while.
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Avoid `Method::` prefix. Associated constants can't be imported
pub const GET: Method = Method::GET;
pub const POST: Method = Method::POST;
pub const DELETE: Method = Method::DELETE;

/// A generic RestClient which conforms to the Hub's API conventions.
///
/// The underlying [`reqwest::Client`] keeps a cookie store, so the session
/// cookie the Hub sets alongside the CSRF token is replayed on every request
/// made through the same [`RestClient`] (or its clones).
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    /// The process that this [`RestClient`] is being called from, e.g.
    /// "console"
    from: Cow<'static, str>,
    /// The service that this [`RestClient`] is calling, e.g. "hub"
    to: &'static str,
}

impl RestClient {
    /// Builds a new [`RestClient`] with a cookie store and the given request
    /// timeout.
    ///
    /// The `from` and `to` fields are logged on every request, and `from` is
    /// also sent as the user agent.
    pub fn new(
        from: impl Into<Cow<'static, str>>,
        to: &'static str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let from = from.into();
        let client = Self::client_builder(&from, timeout).build()?;
        Ok(Self { client, from, to })
    }

    /// Get a [`reqwest::ClientBuilder`] with some defaults set.
    pub fn client_builder(
        from: impl AsRef<str>,
        timeout: Duration,
    ) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(from.as_ref())
            .cookie_store(true)
            .timeout(timeout)
    }

    #[inline]
    pub fn user_agent(&self) -> &Cow<'static, str> {
        &self.from
    }

    // --- RequestBuilder helpers --- //

    /// A body-less `GET`. The Hub's read endpoints take no query params.
    #[inline]
    pub fn get<U: IntoUrl>(&self, url: U) -> reqwest::RequestBuilder {
        self.builder(GET, url)
    }

    #[inline]
    pub fn post<U, T>(&self, url: U, data: &T) -> reqwest::RequestBuilder
    where
        U: IntoUrl,
        T: Serialize + ?Sized,
    {
        self.builder(POST, url).json(data)
    }

    /// A `POST` with no request body, e.g. `POST /api/stop`.
    #[inline]
    pub fn post_empty<U: IntoUrl>(&self, url: U) -> reqwest::RequestBuilder {
        self.builder(POST, url)
    }

    #[inline]
    pub fn delete<U: IntoUrl>(&self, url: U) -> reqwest::RequestBuilder {
        self.builder(DELETE, url)
    }

    /// A clean slate [`reqwest::RequestBuilder`] for non-standard requests.
    /// Otherwise prefer to use the ready-made `get`, `post`, ..., etc helpers.
    pub fn builder(
        &self,
        method: Method,
        url: impl IntoUrl,
    ) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    // --- Request send/recv --- //

    fn request_span(&self, req: &reqwest::Request) -> tracing::Span {
        info_span!(
            target: TARGET,
            "(http)(cli)",
            from = %self.from,
            to = %self.to,
            method = %req.method(),
            url = %req.url().path(),
            // the "attempts left" is set in the span later on
            attempts_left = field::Empty,
        )
    }

    /// Sends the built HTTP request once. Tries to JSON deserialize the
    /// response body to `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request_builder: reqwest::RequestBuilder,
    ) -> Result<T, HubApiError> {
        let request = request_builder.build().map_err(CommonApiError::from)?;
        let span = self.request_span(&request);
        let response = self.send_inner(request).instrument(span).await;
        let bytes = Self::map_response_errors(response)?;
        Self::json_deserialize(bytes)
    }

    /// Sends the built HTTP request, retrying up to `retries` times. Tries to
    /// JSON deserialize the response body to `T`.
    ///
    /// If one of the request attempts yields an error code in `stop_codes`, we
    /// will immediately stop retrying and return that error.
    ///
    /// Only use this for idempotent requests.
    ///
    /// See also: [`RestClient::send`]
    pub async fn send_with_retries<T: DeserializeOwned>(
        &self,
        request_builder: reqwest::RequestBuilder,
        retries: usize,
        stop_codes: &[ErrorCode],
    ) -> Result<T, HubApiError> {
        let request = request_builder.build().map_err(CommonApiError::from)?;
        let span = self.request_span(&request);
        let response = self
            .send_with_retries_inner(request, retries, stop_codes)
            .instrument(span)
            .await;
        let bytes = Self::map_response_errors(response)?;
        Self::json_deserialize(bytes)
    }

    // the `send_inner` and `send_with_retries_inner` intentionally use zero
    // generics in their function signatures to minimize code bloat.

    async fn send_with_retries_inner(
        &self,
        request: reqwest::Request,
        retries: usize,
        stop_codes: &[ErrorCode],
    ) -> Result<Result<Bytes, HubApiError>, CommonApiError> {
        let mut attempts_left = retries + 1;

        // Do the 'retries' first.
        for wait in backoff::get_backoff_iter().take(retries) {
            tracing::Span::current().record("attempts_left", attempts_left);

            // We only get None if the request body is streamed, in which case
            // we can't send more than once.
            let request_clone = match request.try_clone() {
                Some(request_clone) => request_clone,
                None => break,
            };

            // send the request and look for any error codes in the response
            // that we should bail on and stop retrying.
            match self.send_inner(request_clone).await {
                Ok(Ok(bytes)) => return Ok(Ok(bytes)),
                Ok(Err(api_error)) =>
                    if stop_codes.contains(&api_error.kind.to_code()) {
                        return Ok(Err(api_error));
                    },
                Err(common_error) =>
                    if stop_codes.contains(&common_error.kind.to_code()) {
                        return Err(common_error);
                    },
            }

            // sleep for a bit before next retry
            tokio::time::sleep(wait).await;
            attempts_left -= 1;
        }

        // We ran out of retries; return the result of the 'main' attempt.
        tracing::Span::current().record("attempts_left", attempts_left);
        self.send_inner(request).await
    }

    async fn send_inner(
        &self,
        request: reqwest::Request,
    ) -> Result<Result<Bytes, HubApiError>, CommonApiError> {
        let start = Instant::now();
        debug!(target: TARGET, "New client request");

        // send the request, await the response headers
        let resp = self.client.execute(request).await.inspect_err(|e| {
            let req_time = DisplayMs(start.elapsed());
            warn!(
                target: TARGET,
                %req_time,
                "Done (error)(sending) Error sending request: {e:#}"
            );
        })?;

        let status = resp.status();

        // Both success and error bodies are small JSON documents, so read
        // them in full either way.
        let bytes = resp.bytes().await.inspect_err(|e| {
            let req_time = DisplayMs(start.elapsed());
            warn!(
                target: TARGET,
                %req_time,
                status = status.as_u16(),
                "Done (error)(receiving) \
                 Couldn't receive response body: {e:#}",
            );
        })?;

        let req_time = DisplayMs(start.elapsed());
        if status.is_success() {
            debug!(
                target: TARGET,
                %req_time,
                status = status.as_u16(),
                "Done (success)"
            );
            Ok(Ok(bytes))
        } else {
            let error = error_from_body(status, &bytes);
            warn!(
                target: TARGET,
                %req_time,
                status = status.as_u16(),
                error_kind = %error.kind.to_name(),
                error_msg = %error.msg,
                "Done (error)(response) Hub returned error response",
            );
            Ok(Err(error))
        }
    }

    /// Flattens the [`Result<Result<T, HubApiError>, CommonApiError>`]
    /// returned by [`Self::send_inner`].
    fn map_response_errors<T>(
        response: Result<Result<T, HubApiError>, CommonApiError>,
    ) -> Result<T, HubApiError> {
        match response {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(err_api)) => Err(err_api),
            Err(err_client) => Err(HubApiError::from(err_client)),
        }
    }

    /// JSON-deserializes the REST response bytes.
    ///
    /// Some Hub handlers reply with an empty body or `null` on success. Those
    /// are treated as `{}` so they decode into [`Empty`](crate::types::Empty).
    fn json_deserialize<T: DeserializeOwned>(
        bytes: Bytes,
    ) -> Result<T, HubApiError> {
        let trimmed = bytes.trim_ascii();
        let body = if trimmed.is_empty() || trimmed == b"null" {
            b"{}".as_slice()
        } else {
            trimmed
        };

        serde_json::from_slice::<T>(body).map_err(|err| {
            let kind = CommonErrorKind::Decode;
            let mut msg = format!("JSON deserialization failed: {err:#}");

            // If we're in debug, append the response str to the error msg.
            if cfg!(any(debug_assertions, test, feature = "test-utils")) {
                let resp_msg = String::from_utf8_lossy(body);
                msg.push_str(&format!(": '{resp_msg}'"));
            }

            HubApiError::from(CommonApiError::new(kind, msg))
        })
    }
}

/// Builds a [`HubApiError`] from a non-success response.
///
/// The Hub normally sends `{"message": ".."}`, but proxies and panicking
/// handlers may send plain text or nothing at all.
fn error_from_body(status: StatusCode, body: &[u8]) -> HubApiError {
    let resp = match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(resp) => resp,
        Err(_) => ErrorResponse {
            message: String::from_utf8_lossy(body).trim().to_owned(),
        },
    };
    HubApiError::from_response(status, resp)
}

// -- impl RequestBuilderExt -- //

/// Extension trait on [`reqwest::RequestBuilder`] for easily modifying requests
/// as they're constructed.
pub trait RequestBuilderExt: Sized {
    /// Attach the CSRF token the Hub requires on mutating requests, along
    /// with a JSON content type.
    fn csrf(self, token: &CsrfToken) -> Result<Self, HubApiError>;
}

impl RequestBuilderExt for reqwest::RequestBuilder {
    fn csrf(self, token: &CsrfToken) -> Result<Self, HubApiError> {
        let token = HeaderValue::from_str(token.as_str())
            .map_err(|_| HubApiError::building("Invalid CSRF token"))?;

        // `headers` replaces existing values, so this doesn't duplicate the
        // content type `RequestBuilder::json` may have already set.
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(CSRF_HEADER_NAME.clone(), token);
        headers.insert(CONTENT_TYPE, CONTENT_TYPE_JSON.clone());
        Ok(self.headers(headers))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::HubErrorKind, models::Channel, types::Empty};

    fn client() -> RestClient {
        RestClient::new("console", "hub", API_REQUEST_TIMEOUT).unwrap()
    }

    #[test]
    fn empty_and_null_bodies_decode_as_empty() {
        for body in ["", "  \n", "null", "{}"] {
            let empty =
                RestClient::json_deserialize::<Empty>(Bytes::from(body))
                    .unwrap();
            assert_eq!(empty, Empty {});
        }
    }

    #[test]
    fn bad_json_is_a_decode_error() {
        let err = RestClient::json_deserialize::<Vec<Channel>>(Bytes::from(
            r#"{"not":"a list"}"#,
        ))
        .unwrap_err();
        assert_eq!(err.kind, HubErrorKind::Decode);
        assert!(err.msg.contains("not"), "{err}");
    }

    #[test]
    fn error_bodies() {
        let json = br#"{"message":"Failed to close channel: peer offline"}"#;
        let err = error_from_body(StatusCode::INTERNAL_SERVER_ERROR, json);
        assert_eq!(err.kind, HubErrorKind::Server);
        assert_eq!(err.msg, "Failed to close channel: peer offline");

        let err = error_from_body(StatusCode::BAD_GATEWAY, b"upstream down\n");
        assert_eq!(err.kind, HubErrorKind::Unknown(502));
        assert_eq!(err.msg, "upstream down");

        let err = error_from_body(StatusCode::FORBIDDEN, b"");
        assert_eq!(err.kind, HubErrorKind::Forbidden);
        assert_eq!(err.msg, StatusCode::FORBIDDEN.to_string());
    }

    #[test]
    fn csrf_headers() {
        let client = client();
        let token = CsrfToken::new("tok3n");
        let request = client
            .post("http://localhost:8080/api/channels/close", &Empty {})
            .csrf(&token)
            .unwrap()
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers.get(&CSRF_HEADER_NAME).unwrap(), "tok3n");
        let content_types = headers.get_all(CONTENT_TYPE).iter().count();
        assert_eq!(content_types, 1);
        assert_eq!(request.method(), POST);
    }

    #[test]
    fn invalid_csrf_token_is_rejected() {
        let client = client();
        let token = CsrfToken::new("bad\ntoken");
        let result = client
            .post_empty("http://localhost:8080/api/stop")
            .csrf(&token);
        let err = result.map(|_| ()).unwrap_err();
        assert_eq!(err.kind, HubErrorKind::Building);
    }
}
