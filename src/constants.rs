// -
// Annotations

/// Prefix namespacing the registration annotations
pub const DEFAULT_ANNOTATION_PREFIX: &str = "rossedman.io";

/// Annotation (without prefix) whose value is the endpoint a node registers with
pub const REGISTER_ANNOTATION: &str = "register";

/// Annotation (without prefix) marking a node as already registered
pub const REGISTERED_ANNOTATION: &str = "registered";

/// Value written into the registered annotation on success
pub const REGISTERED_MARKER_VALUE: &str = "true";

// -
// Configuration

/// Environment variable prefix for configuration overrides, e.g. `REGISTRAR__WORKER__...`
pub(crate) const CONFIG_ENV_PREFIX: &str = "REGISTRAR";

/// Environment variable naming an optional TOML config file
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
