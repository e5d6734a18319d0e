//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# huddle configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[voice_activity]
# threshold = 0.02       # RMS on [-1, 1] samples, 0.0-1.0
# buffer_size = 2048     # power of two, 32-32768
# tick_ms = 16           # 5-1000

[mesh]
# command_capacity = 64  # 1-4096
# event_capacity = 256   # 1-65536
# max_participants = 16  # 2-64

[relay]
# url = "ws://127.0.0.1:8080"
# port = 8080            # 1-65535
# connect_timeout_secs = 15
# reconnect_delay_secs = 1
# max_reconnect_delay_secs = 30
# hello_timeout_secs = 10

[logging]
# level = "INFO"         # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
