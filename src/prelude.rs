// Internal logging facade: `debug!`, `info!`, `warn!`, `error!` backed by
// `tracing`, `log`, or nothing depending on enabled features.

#[allow(unused_imports, reason = "not every level is used by every module")]
pub(crate) use crate::logging::{
    log_debug as debug, log_error as error, log_info as info, log_warn as warn,
};
