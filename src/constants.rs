//! Constants shared by the argument template and the default launcher.

/// Location of the certificate verification helper on a standard installation.
///
/// The helper validates one certificate per invocation against the configured
/// CA database and reports the verdict through its exit status.
pub const DEFAULT_HELPER_PATH: &str = "/usr/libexec/sssd/p11_child";

/// Flag carrying the helper's own timeout, in whole seconds.
pub const ARG_TIMEOUT: &str = "--timeout";

/// Flag selecting the helper's verify-only mode.
pub const ARG_VERIFICATION: &str = "--verification";

/// Flag carrying extra certificate verification options.
pub const ARG_VERIFY_OPTIONS: &str = "--verify";

/// Flag carrying the CA database path.
pub const ARG_CA_DB: &str = "--ca_db";

/// Flag carrying the base64 encoded certificate. Always the last flag.
pub const ARG_CERTIFICATE: &str = "--certificate";
