//! The container aggregate and its orchestration operations.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tinybox_common::config::{ContainerOptions, InvocationMode, Settings};
use tinybox_common::constants::{LOCK_FILE, PIPE_FILE, PIPE_MODE, STATE_FILE};
use tinybox_common::error::{Result, TinyboxError};
use tinybox_common::types::{ContainerRecord, ContainerState, validate_name};
use tinybox_core::cgroup::{CgroupOps, CgroupV1};
use tinybox_core::filesystem::{ChrootRootfs, RootfsOps};
use tinybox_core::namespace::{LinuxNamespaces, NamespaceOps};

use crate::lock::ContainerLock;
use crate::process::{Launch, ProcessRole};
use crate::{bootstrap, handoff, state};

/// Interval between liveness checks while waiting for a signalled container.
const STOP_POLL: Duration = Duration::from_millis(100);

/// A container as seen by one process invocation.
///
/// Both the master and the re-executed child build their own instance. The
/// [`ContainerRecord`] is the only part that crosses process boundaries; the
/// role and strategies are bound locally by [`Container::select_role`].
#[derive(Debug)]
pub struct Container {
    record: ContainerRecord,
    mode: InvocationMode,
    command: Vec<String>,
    role: Option<ProcessRole>,
    namespace: Option<Box<dyn NamespaceOps>>,
    rootfs: Option<Box<dyn RootfsOps>>,
    cgroup: Option<Box<dyn CgroupOps>>,
}

impl Container {
    /// Builds the container for this invocation and bootstraps its control
    /// directory, pipe, and lock file.
    ///
    /// In [`InvocationMode::ReExec`] the record is restored from
    /// `container.json` and its spawn spec is cleared; the program to run is
    /// taken from `options` and exposed through [`Container::command`].
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Config`] if the base directory is not absolute
    /// or the name is unusable, an I/O error if bootstrapping fails, and
    /// [`TinyboxError::NotFound`] if a re-exec finds no persisted state. A
    /// re-exec against an unknown name leaves nothing behind on disk.
    pub fn new(settings: &Settings, options: ContainerOptions) -> Result<Self> {
        if !settings.base_dir.is_absolute() {
            return Err(TinyboxError::Config {
                message: format!(
                    "base directory {} is not absolute",
                    settings.base_dir.display()
                ),
            });
        }
        validate_name(&options.name)?;

        let dir = settings.base_dir.join(&options.name);
        let restored = match options.mode {
            InvocationMode::ReExec => Some(state::load(&dir.join(STATE_FILE))?),
            InvocationMode::Create => None,
        };
        bootstrap::ensure_dir(&dir)?;
        bootstrap::ensure_fifo(&dir.join(PIPE_FILE), PIPE_MODE)?;
        bootstrap::ensure_file(&dir.join(LOCK_FILE))?;

        let (record, command) = match restored {
            Some(mut record) => {
                record.clear_spawn_spec();
                let command = if options.argv.is_empty() && !options.path.is_empty() {
                    vec![options.path]
                } else {
                    options.argv
                };
                (record, command)
            }
            None => {
                let record = ContainerRecord {
                    name: options.name,
                    dir,
                    rootfs: options.rootfs,
                    path: options.path,
                    argv: options.argv,
                    hostname: options.hostname,
                    cgroup_prefix: settings.cgroup_prefix.clone(),
                    cgroup: options.cgroup,
                    namespaces: options.namespaces,
                    pid: None,
                    created_at: chrono::Utc::now().to_rfc3339(),
                };
                (record, Vec::new())
            }
        };

        tracing::debug!(name = %record.name, mode = ?options.mode, "container constructed");
        Ok(Self {
            record,
            mode: options.mode,
            command,
            role: None,
            namespace: None,
            rootfs: None,
            cgroup: None,
        })
    }

    /// Binds the process role and the strategies it needs.
    ///
    /// Namespace and rootfs strategies are always bound. The master also gets
    /// a cgroup strategy whose validation must pass before anything is spawned,
    /// and refuses a name whose persisted init process is still alive.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Config`] if a role was already selected,
    /// [`TinyboxError::Process`] if the master would replace a running
    /// container, or [`TinyboxError::Validation`] if the master's resource
    /// limits are invalid.
    pub fn select_role(&mut self, role: ProcessRole, settings: &Settings) -> Result<()> {
        if let Some(current) = self.role {
            return Err(TinyboxError::Config {
                message: format!("role already selected as {current}"),
            });
        }

        self.namespace = Some(Box::new(LinuxNamespaces::new()));
        self.rootfs = Some(Box::new(ChrootRootfs::new()));

        if role == ProcessRole::Master {
            self.ensure_not_running()?;
            let cgroup = CgroupV1::new(
                &settings.cgroup_root,
                &self.record.cgroup_prefix,
                &self.record.name,
            );
            cgroup.validate(&self.record)?;
            self.cgroup = Some(Box::new(cgroup));
        }

        self.role = Some(role);
        tracing::debug!(name = %self.record.name, %role, "role selected");
        Ok(())
    }

    /// Fails if `container.json` names an init process that is still alive.
    fn ensure_not_running(&self) -> Result<()> {
        let persisted = match state::load(&self.state_file()) {
            Ok(record) => record,
            Err(TinyboxError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        if let (ContainerState::Running, Some(pid)) = (state::status(&persisted), persisted.pid) {
            return Err(TinyboxError::Process {
                message: format!(
                    "container {} is already running (pid {pid})",
                    self.record.name
                ),
            });
        }
        Ok(())
    }

    /// Runs the selected role.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::Config`] if no role was selected, otherwise
    /// whatever the role's sequence fails with.
    pub fn run(&mut self) -> Result<Launch> {
        let role = self.role.ok_or_else(|| TinyboxError::Config {
            message: "no process role selected".into(),
        })?;
        role.run(self)
    }

    /// Blocks until a record arrives on the pipe and adopts it.
    ///
    /// # Errors
    ///
    /// Returns a read-side [`TinyboxError::Handoff`] on open or decode failure.
    pub fn wait_for_state(&mut self) -> Result<()> {
        self.record = handoff::receive(&self.pipe_file())?;
        tracing::info!(name = %self.record.name, "container state received");
        Ok(())
    }

    /// Writes the record into the pipe, blocking until a reader opens it.
    ///
    /// # Errors
    ///
    /// Returns a write-side [`TinyboxError::Handoff`] on open or write failure.
    pub fn publish_state(&self) -> Result<()> {
        handoff::send(&self.pipe_file(), &self.record)?;
        tracing::info!(name = %self.record.name, "container state published");
        Ok(())
    }

    /// Writes the record to `container.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn persist(&self) -> Result<()> {
        state::save(&self.state_file(), &self.record)
    }

    /// Takes the exclusive advisory lock on this container's lock file.
    ///
    /// # Errors
    ///
    /// Returns an error if another invocation holds the lock.
    pub fn lock(&self) -> Result<ContainerLock> {
        ContainerLock::acquire(&self.lock_file())
    }

    /// Observed lifecycle state of the recorded init process.
    #[must_use]
    pub fn status(&self) -> ContainerState {
        state::status(&self.record)
    }

    /// Sends SIGTERM to the init process, then SIGKILL if it outlives `grace`.
    ///
    /// # Errors
    ///
    /// Returns [`TinyboxError::NotFound`] if no init pid was recorded, or
    /// [`TinyboxError::Process`] if signalling fails.
    pub fn stop(&self, grace: Duration) -> Result<()> {
        let raw = self.record.pid.ok_or_else(|| TinyboxError::NotFound {
            kind: "init process",
            id: self.record.name.clone(),
        })?;
        let pid = Pid::from_raw(raw);

        if kill(pid, Signal::SIGTERM).is_err() {
            tracing::info!(name = %self.record.name, pid = raw, "container already stopped");
            return Ok(());
        }
        tracing::info!(pid = raw, "sent SIGTERM");

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if kill(pid, None).is_err() {
                tracing::info!(name = %self.record.name, "container stopped");
                return Ok(());
            }
            std::thread::sleep(STOP_POLL);
        }

        kill(pid, Signal::SIGKILL).map_err(|e| TinyboxError::Process {
            message: format!("SIGKILL to {raw} failed: {e}"),
        })?;
        tracing::info!(pid = raw, "sent SIGKILL");
        Ok(())
    }

    /// The persisted part of the container.
    #[must_use]
    pub const fn record(&self) -> &ContainerRecord {
        &self.record
    }

    pub(crate) const fn record_mut(&mut self) -> &mut ContainerRecord {
        &mut self.record
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Control directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.record.dir
    }

    /// Whether this invocation creates or re-enters the container.
    #[must_use]
    pub const fn mode(&self) -> InvocationMode {
        self.mode
    }

    /// The selected role, if any.
    #[must_use]
    pub const fn role(&self) -> Option<ProcessRole> {
        self.role
    }

    /// Command to run when re-entering the container.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Path of the handoff FIFO.
    #[must_use]
    pub fn pipe_file(&self) -> PathBuf {
        self.record.dir.join(PIPE_FILE)
    }

    /// Path of the lock file.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.record.dir.join(LOCK_FILE)
    }

    /// Path of the persisted state file.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.record.dir.join(STATE_FILE)
    }

    pub(crate) fn namespace_ops(&self) -> Result<&dyn NamespaceOps> {
        self.namespace.as_deref().ok_or_else(|| unbound("namespace"))
    }

    pub(crate) fn rootfs_ops(&self) -> Result<&dyn RootfsOps> {
        self.rootfs.as_deref().ok_or_else(|| unbound("rootfs"))
    }

    pub(crate) fn cgroup_ops(&self) -> Result<&dyn CgroupOps> {
        self.cgroup.as_deref().ok_or_else(|| unbound("cgroup"))
    }
}

fn unbound(strategy: &str) -> TinyboxError {
    TinyboxError::Config {
        message: format!("{strategy} strategy is not bound for this role"),
    }
}

/// Removes a container's cgroups and control directory.
///
/// Works on half-created containers too: a missing state file only skips
/// the liveness check. Cgroup removal is best effort.
///
/// # Errors
///
/// Returns [`TinyboxError::Process`] if the container is still running,
/// [`TinyboxError::NotFound`] if it has no control directory, or an I/O
/// error if the directory cannot be removed.
pub fn destroy(settings: &Settings, name: &str) -> Result<()> {
    validate_name(name)?;
    let dir = settings.base_dir.join(name);
    if !dir.is_dir() {
        return Err(TinyboxError::NotFound {
            kind: "container",
            id: name.to_string(),
        });
    }

    let prefix = match state::load(&dir.join(STATE_FILE)) {
        Ok(record) => {
            if state::status(&record) == ContainerState::Running {
                return Err(TinyboxError::Process {
                    message: format!("container {name} is running; stop it first"),
                });
            }
            record.cgroup_prefix
        }
        Err(TinyboxError::NotFound { .. }) => settings.cgroup_prefix.clone(),
        Err(e) => return Err(e),
    };

    if let Err(e) = CgroupV1::new(&settings.cgroup_root, prefix, name).destroy() {
        tracing::warn!(name, error = %e, "cgroup cleanup incomplete");
    }
    std::fs::remove_dir_all(&dir).map_err(|e| TinyboxError::Io {
        path: dir.clone(),
        source: e,
    })?;
    tracing::info!(name, "container removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base: &Path) -> Settings {
        let mut settings = Settings::new(base);
        settings.cgroup_root = base.join("cgroup");
        settings
    }

    fn options(name: &str) -> ContainerOptions {
        ContainerOptions {
            name: name.into(),
            rootfs: "/srv/root".into(),
            path: "/bin/sh".into(),
            argv: vec!["sh".into()],
            hostname: name.into(),
            ..ContainerOptions::default()
        }
    }

    #[test]
    fn relative_base_dir_is_a_config_error() {
        let err = Container::new(&Settings::new("relative/base"), options("c1")).unwrap_err();
        assert!(matches!(err, TinyboxError::Config { .. }));
    }

    #[test]
    fn bad_name_is_a_config_error() {
        let base = tempfile::tempdir().unwrap();
        let err = Container::new(&settings(base.path()), options("../x")).unwrap_err();
        assert!(matches!(err, TinyboxError::Config { .. }));
    }

    #[test]
    fn create_mode_stamps_creation_time() {
        let base = tempfile::tempdir().unwrap();
        let c = Container::new(&settings(base.path()), options("c1")).unwrap();
        assert!(!c.record().created_at.is_empty());
        assert_eq!(c.mode(), InvocationMode::Create);
        assert!(c.command().is_empty());
        assert_eq!(c.status(), ContainerState::Created);
    }

    #[test]
    fn re_exec_without_state_is_not_found() {
        let base = tempfile::tempdir().unwrap();
        let opts = ContainerOptions {
            mode: InvocationMode::ReExec,
            ..options("c1")
        };
        let err = Container::new(&settings(base.path()), opts).unwrap_err();
        assert!(matches!(err, TinyboxError::NotFound { .. }));
        assert!(!base.path().join("c1").exists());
    }

    #[test]
    fn master_refuses_a_running_container() {
        let base = tempfile::tempdir().unwrap();
        let s = settings(base.path());
        let mut first = Container::new(&s, options("c1")).unwrap();
        first.record_mut().pid = Some(i32::try_from(std::process::id()).unwrap());
        first.persist().unwrap();
        assert_eq!(first.status(), ContainerState::Running);

        let mut second = Container::new(&s, options("c1")).unwrap();
        let err = second.select_role(ProcessRole::Master, &s).unwrap_err();
        assert!(matches!(err, TinyboxError::Process { .. }));
        assert_eq!(second.role(), None);
        assert_eq!(
            state::load(&first.state_file()).unwrap().pid,
            first.record().pid
        );
    }

    #[test]
    fn master_may_reuse_a_stopped_container() {
        let base = tempfile::tempdir().unwrap();
        let s = settings(base.path());
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = i32::try_from(child.id()).unwrap();
        child.wait().unwrap();

        let mut first = Container::new(&s, options("c1")).unwrap();
        first.record_mut().pid = Some(pid);
        first.persist().unwrap();

        let mut second = Container::new(&s, options("c1")).unwrap();
        second.select_role(ProcessRole::Master, &s).unwrap();
        assert_eq!(second.role(), Some(ProcessRole::Master));
    }

    #[test]
    fn re_exec_takes_command_from_path_when_argv_empty() {
        let base = tempfile::tempdir().unwrap();
        let s = settings(base.path());
        Container::new(&s, options("c1")).unwrap().persist().unwrap();

        let opts = ContainerOptions {
            name: "c1".into(),
            path: "/bin/ls".into(),
            mode: InvocationMode::ReExec,
            ..ContainerOptions::default()
        };
        let c = Container::new(&s, opts).unwrap();
        assert_eq!(c.command(), ["/bin/ls".to_string()]);
    }

    #[test]
    fn role_is_selected_once() {
        let base = tempfile::tempdir().unwrap();
        let s = settings(base.path());
        let mut c = Container::new(&s, options("c1")).unwrap();
        c.select_role(ProcessRole::Init, &s).unwrap();
        assert_eq!(c.role(), Some(ProcessRole::Init));
        let err = c.select_role(ProcessRole::Master, &s).unwrap_err();
        assert!(matches!(err, TinyboxError::Config { .. }));
    }

    #[test]
    fn only_master_binds_a_cgroup_strategy() {
        let base = tempfile::tempdir().unwrap();
        let s = settings(base.path());

        let mut init = Container::new(&s, options("c1")).unwrap();
        init.select_role(ProcessRole::Init, &s).unwrap();
        assert!(init.namespace_ops().is_ok());
        assert!(init.rootfs_ops().is_ok());
        assert!(init.cgroup_ops().is_err());

        let mut master = Container::new(&s, options("c2")).unwrap();
        master.select_role(ProcessRole::Master, &s).unwrap();
        assert_eq!(master.cgroup_ops().unwrap().paths().len(), 4);
    }

    #[test]
    fn run_without_role_is_a_config_error() {
        let base = tempfile::tempdir().unwrap();
        let mut c = Container::new(&settings(base.path()), options("c1")).unwrap();
        assert!(matches!(c.run(), Err(TinyboxError::Config { .. })));
    }

    #[test]
    fn stop_without_pid_is_not_found() {
        let base = tempfile::tempdir().unwrap();
        let c = Container::new(&settings(base.path()), options("c1")).unwrap();
        let err = c.stop(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, TinyboxError::NotFound { .. }));
    }

    #[test]
    fn lock_is_exclusive_per_container() {
        let base = tempfile::tempdir().unwrap();
        let c = Container::new(&settings(base.path()), options("c1")).unwrap();
        let _held = c.lock().unwrap();
        assert!(c.lock().is_err());
    }

    #[test]
    fn destroy_removes_half_created_container() {
        let base = tempfile::tempdir().unwrap();
        let s = settings(base.path());
        let dir = Container::new(&s, options("c1")).unwrap().dir().to_path_buf();
        destroy(&s, "c1").unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn destroy_refuses_running_container() {
        let base = tempfile::tempdir().unwrap();
        let s = settings(base.path());
        let mut c = Container::new(&s, options("c1")).unwrap();
        c.record_mut().pid = Some(i32::try_from(std::process::id()).unwrap());
        c.persist().unwrap();
        let err = destroy(&s, "c1").unwrap_err();
        assert!(matches!(err, TinyboxError::Process { .. }));
        assert!(c.dir().exists());
    }

    #[test]
    fn destroy_unknown_container_is_not_found() {
        let base = tempfile::tempdir().unwrap();
        let err = destroy(&settings(base.path()), "ghost").unwrap_err();
        assert!(matches!(err, TinyboxError::NotFound { .. }));
    }
}
