pub const fn project_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

/// User agent used for all outgoing probe requests.
pub const fn user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}
