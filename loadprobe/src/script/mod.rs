//! The probe script: one GET request against the target url, followed by a pause.

use std::time::Duration;

use rama::{
    Service,
    error::{BoxError, ErrorContext as _},
    http::{Request, Response, service::client::HttpClientExt as _},
    telemetry::tracing,
};

use crate::config::ScriptEnv;

/// Pause at the end of every iteration, regardless of its outcome.
pub const ITERATION_PAUSE: Duration = Duration::from_secs(1);

/// Run a single iteration of the probe script.
///
/// The target url is resolved from the env on every call,
/// after which exactly one GET request is sent to it using the given client.
/// The outcome of that request is returned as-is once the [`ITERATION_PAUSE`] passed.
///
/// No retries, timeouts, nor any kind of response inspection happens here.
pub async fn default_iteration<S>(client: &S, env: &ScriptEnv) -> Result<Response, BoxError>
where
    S: Service<Request, Output = Response, Error = BoxError>,
{
    let url = env.target_url();
    let result = get(client, &url).await;
    tokio::time::sleep(ITERATION_PAUSE).await;
    result
}

async fn get<S>(client: &S, url: &str) -> Result<Response, BoxError>
where
    S: Service<Request, Output = Response, Error = BoxError>,
{
    tracing::trace!(%url, "send GET request");
    let resp = client
        .get(url)
        .send()
        .await
        .context("send GET request")
        .with_context_debug_field("url", || url.to_owned())?;
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rama::{
        http::{Method, StatusCode, Uri, service::web::response::IntoResponse as _},
        service::service_fn,
    };
    use tokio::time::{self, Instant};

    use super::*;
    use crate::config::TARGET_URL_ENV_KEY;

    use rama::telemetry::tracing;
    use tracing_test::traced_test;

    type SeenRequests = Arc<Mutex<Vec<(Method, Uri)>>>;

    fn recording_client(
        status: StatusCode,
    ) -> (
        impl Service<Request, Output = Response, Error = BoxError> + Clone,
        SeenRequests,
    ) {
        let seen = SeenRequests::default();
        let client = service_fn({
            let seen = seen.clone();
            move |req: Request| {
                let seen = seen.clone();
                async move {
                    seen.lock()
                        .unwrap()
                        .push((req.method().clone(), req.uri().clone()));
                    Ok::<_, BoxError>(status.into_response())
                }
            }
        });
        (client, seen)
    }

    fn env_with_target_url(url: &str) -> ScriptEnv {
        ScriptEnv::isolated([(TARGET_URL_ENV_KEY.to_owned(), url.to_owned())])
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_default_iteration_sends_one_get_to_target_url() {
        time::pause();

        let (client, seen) = recording_client(StatusCode::OK);
        let env = env_with_target_url("http://example.test/health");

        let resp = default_iteration(&client, &env).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Method::GET);
        assert_eq!(seen[0].1.to_string(), "http://example.test/health");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_default_iteration_pauses_after_request() {
        time::pause();

        let (client, _) = recording_client(StatusCode::OK);
        let env = env_with_target_url("http://example.test/health");

        let start = Instant::now();
        default_iteration(&client, &env).await.unwrap();
        assert!(start.elapsed() >= ITERATION_PAUSE);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_default_iteration_does_not_inspect_status() {
        time::pause();

        let (client, seen) = recording_client(StatusCode::INTERNAL_SERVER_ERROR);
        let env = env_with_target_url("http://example.test/health");

        let resp = default_iteration(&client, &env).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_default_iteration_empty_target_url_fails_and_still_pauses() {
        time::pause();

        let (client, _) = recording_client(StatusCode::OK);
        let env = ScriptEnv::isolated([]);

        let start = Instant::now();
        let result = default_iteration(&client, &env).await;
        assert!(result.is_err());
        assert!(start.elapsed() >= ITERATION_PAUSE);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_default_iteration_surfaces_client_error() {
        time::pause();

        let client = service_fn(|_req: Request| async {
            Err::<Response, BoxError>(BoxError::from("connection refused"))
        });
        let env = env_with_target_url("http://example.test/health");

        let start = Instant::now();
        let err = default_iteration(&client, &env).await.unwrap_err();
        assert!(format!("{err:?}").contains("connection refused"));
        assert!(start.elapsed() >= ITERATION_PAUSE);
    }

    #[traced_test]
    #[tokio::test(flavor = "current_thread")]
    async fn test_default_iteration_reads_target_url_per_call() {
        time::pause();

        let (client, seen) = recording_client(StatusCode::OK);

        default_iteration(&client, &env_with_target_url("http://a.example.test/"))
            .await
            .unwrap();
        default_iteration(&client, &env_with_target_url("http://b.example.test/"))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1.host(), Some("a.example.test"));
        assert_eq!(seen[1].1.host(), Some("b.example.test"));

        assert!(logs_contain("send GET request"));
    }
}
