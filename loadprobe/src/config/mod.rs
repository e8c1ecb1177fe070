mod env;
mod options;

pub use self::{
    env::{ScriptEnv, TARGET_URL_ENV_KEY, parse_env_pair},
    options::{HttpDebug, Options, options},
};
