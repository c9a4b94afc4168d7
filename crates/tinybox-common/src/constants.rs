//! System-wide constants and default paths.

/// Environment variable naming the base directory for container control dirs.
pub const HOME_ENV: &str = "TINYBOX_HOME";

/// Environment variable overriding the cgroup v1 mount root.
pub const CGROUP_ROOT_ENV: &str = "TINYBOX_CGROUP_ROOT";

/// Default cgroup v1 mount root; each controller is mounted beneath it.
pub const CGROUP_V1_PATH: &str = "/sys/fs/cgroup";

/// Cgroup directory prefix under each controller hierarchy.
pub const DEFAULT_CGROUP_PREFIX: &str = "tinybox";

/// Name of the serialized container state file in the control directory.
pub const STATE_FILE: &str = "container.json";

/// Name of the handoff FIFO in the control directory.
pub const PIPE_FILE: &str = "pipe";

/// Name of the lock file in the control directory.
pub const LOCK_FILE: &str = "lock";

/// Permission bits of the handoff FIFO.
///
/// Owner read/write rather than mode 0: a mode-0 FIFO cannot be opened by
/// its unprivileged owner, and the handoff only ever crosses processes of
/// the same user.
pub const PIPE_MODE: u32 = 0o600;

/// Path the master re-executes to become the container init.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Subcommand the re-executed child is started with.
pub const INIT_SUBCOMMAND: &str = "init";

/// Application name used in CLI output and re-exec argv[0].
pub const APP_NAME: &str = "tinybox";
