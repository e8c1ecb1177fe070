use rama::http::layer::traffic_writer::WriterMode;
use serde::Serialize;

/// Options exported by the probe script,
/// consumed by whatever drives its iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Dump http traffic of every request made by the script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_debug: Option<HttpDebug>,
}

/// How much of the http traffic is dumped when debugging is enabled.
///
/// Same levels as the `httpDebug` option of load-test harnesses:
/// any value other than `full` only dumps heads.
/// The exported [`options`] always use [`HttpDebug::Full`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpDebug {
    /// Request and response heads only.
    Headers,
    /// Request and response heads, including their bodies.
    Full,
}

impl HttpDebug {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpDebug::Headers => "headers",
            HttpDebug::Full => "full",
        }
    }

    pub(crate) fn writer_mode(self) -> WriterMode {
        match self {
            HttpDebug::Headers => WriterMode::Headers,
            HttpDebug::Full => WriterMode::All,
        }
    }
}

impl std::fmt::Display for HttpDebug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The options of the probe script.
///
/// These are fixed: they do not depend on the environment or cli flags.
pub const fn options() -> Options {
    Options {
        http_debug: Some(HttpDebug::Full),
    }
}
