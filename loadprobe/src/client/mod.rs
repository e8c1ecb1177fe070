//! centralized (web) client creation
//!
//! All traffic of the probe script goes through the client created here,
//! which is also where the http debug options of the script are honoured.

use std::sync::Arc;

use rama::{
    Layer as _, Service,
    error::{BoxError, ErrorContext as _},
    http::{
        HeaderValue, Request, Response,
        client::EasyHttpWebClient,
        header::USER_AGENT,
        layer::{
            set_header::SetRequestHeaderLayer,
            traffic_writer::{BidirectionalWriter, RequestWriterLayer, ResponseWriterLayer},
        },
    },
    layer::MapErrLayer,
    rt::Executor,
    telemetry::tracing,
};

use crate::{
    config::{HttpDebug, Options},
    utils::env,
};

/// Create a new web client that can be cloned and shared between virtual users.
///
/// In case http debugging is enabled in the given [`Options`]
/// all requests and responses are dumped to stdout.
pub fn new_web_client(
    exec: Executor,
    options: Options,
) -> Result<impl Service<Request, Output = Response, Error = BoxError> + Clone, BoxError> {
    let inner = EasyHttpWebClient::connector_builder()
        .with_default_transport_connector()
        .without_tls_proxy_support()
        .without_proxy_support()
        .with_tls_support_using_boringssl(None)
        .with_default_http_connector(exec.clone())
        .try_with_default_connection_pool()
        .context("create connection pool for probe web client")?
        .build_client();

    let writer_layers = traffic_writer_layers(&exec, options.http_debug);
    Ok(layered_web_client(inner, writer_layers))
}

type TrafficWriterLayers = (
    RequestWriterLayer<BidirectionalWriter>,
    ResponseWriterLayer<BidirectionalWriter>,
);

/// Request and response dump layers, `None` when http debugging is off.
fn traffic_writer_layers(
    exec: &Executor,
    http_debug: Option<HttpDebug>,
) -> Option<TrafficWriterLayers> {
    let http_debug = http_debug?;
    tracing::debug!(%http_debug, "http debug enabled: dump traffic to stdout");

    let mode = http_debug.writer_mode();
    let traffic_writer = BidirectionalWriter::stdout_unbounded(exec, Some(mode), Some(mode));
    Some((
        RequestWriterLayer::new(traffic_writer.clone()),
        ResponseWriterLayer::new(traffic_writer),
    ))
}

fn layered_web_client<S>(
    inner: S,
    writer_layers: Option<TrafficWriterLayers>,
) -> impl Service<Request, Output = Response, Error = BoxError> + Clone
where
    S: Service<Request, Output = Response, Error = BoxError>,
{
    Arc::new(
        (
            MapErrLayer::new(Into::<BoxError>::into),
            SetRequestHeaderLayer::if_not_present(
                USER_AGENT,
                HeaderValue::from_static(env::user_agent()),
            ),
            writer_layers,
        )
            .into_layer(inner),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rama::{
        http::{
            HeaderMap, StatusCode,
            service::{client::HttpClientExt as _, web::response::IntoResponse as _},
        },
        service::service_fn,
    };

    use super::*;

    type SeenHeaders = Arc<Mutex<Vec<HeaderMap>>>;

    fn recording_inner(
        status: StatusCode,
    ) -> (
        impl Service<Request, Output = Response, Error = BoxError> + Clone,
        SeenHeaders,
    ) {
        let seen = SeenHeaders::default();
        let svc = service_fn({
            let seen = seen.clone();
            move |req: Request| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(req.headers().clone());
                    Ok::<_, BoxError>(status.into_response())
                }
            }
        });
        (svc, seen)
    }

    #[test]
    fn test_traffic_writer_layers_follow_http_debug() {
        let exec = Executor::default();
        assert!(traffic_writer_layers(&exec, Some(HttpDebug::Full)).is_some());
        assert!(traffic_writer_layers(&exec, Some(HttpDebug::Headers)).is_some());
        assert!(traffic_writer_layers(&exec, None).is_none());
    }

    #[tokio::test]
    async fn test_user_agent_added_when_missing() {
        let (inner, seen) = recording_inner(StatusCode::OK);
        let client = layered_web_client(inner, None);

        let resp = client.get("http://example.test/health").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get(USER_AGENT).unwrap(), env::user_agent());
    }

    #[tokio::test]
    async fn test_user_agent_of_caller_is_kept() {
        let (inner, seen) = recording_inner(StatusCode::OK);
        let client = layered_web_client(inner, None);

        client
            .get("http://example.test/health")
            .header(USER_AGENT, "custom-agent/1.0")
            .send()
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get(USER_AGENT).unwrap(), "custom-agent/1.0");
        assert_eq!(seen[0].get_all(USER_AGENT).iter().count(), 1);
    }

    #[tokio::test]
    async fn test_full_http_debug_passes_traffic_through() {
        let (inner, seen) = recording_inner(StatusCode::ACCEPTED);
        let exec = Executor::default();
        let client = layered_web_client(
            inner,
            traffic_writer_layers(&exec, crate::config::options().http_debug),
        );

        let resp = client.get("http://example.test/health").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
