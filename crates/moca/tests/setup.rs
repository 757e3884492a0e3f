use assert_cmd::cmd::Command;

#[allow(dead_code)]
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Nothing listens here, connecting fails immediately.
#[allow(dead_code)]
pub const UNREACHABLE_PORT: &str = "1";

pub fn make_cli() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).expect("Failed to find binary");
    for var in [
        "MOCA_HOST",
        "MOCA_PORT",
        "MOCA_USERNAME",
        "MOCA_PASSWORD",
        "MOCA_DBNAME",
    ] {
        cmd.env_remove(var);
    }
    cmd
}
