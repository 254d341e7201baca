//! openGauss command vocabulary.
//!
//! [`GaussCommands`] renders the shell commands the orchestrator runs inside
//! member pods. Each command carries the [`CommandKind`] its output is
//! classified by and a display form with the initial password redacted.

use gauss_core::{ClusterMode, MemberId, MemberSpec, ReplicationLink, Role};
use std::path::{Path, PathBuf};

use crate::classify::CommandKind;
use crate::settings::GaussSettings;

const REDACTED: &str = "******";

/// A shell command bound for one member pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    /// How the output is classified.
    pub kind: CommandKind,

    /// The command line.
    pub script: String,

    /// The command line as logged.
    pub display: String,
}

impl RemoteCommand {
    /// Creates a command with nothing to redact.
    pub fn new(kind: CommandKind, script: impl Into<String>) -> Self {
        let script = script.into();
        Self {
            kind,
            display: script.clone(),
            script,
        }
    }

    fn redacting(kind: CommandKind, script: String, secret: &str) -> Self {
        let display = if secret.is_empty() {
            script.clone()
        } else {
            script.replace(secret, REDACTED)
        };
        Self {
            kind,
            script,
            display,
        }
    }
}

/// Returns the start command kind of a member with `role` in a cluster of `mode`.
pub fn start_kind(mode: ClusterMode, role: Role) -> CommandKind {
    match (mode, role) {
        (ClusterMode::Single, _) => CommandKind::StartSingle,
        (ClusterMode::PrimaryReplica, Role::Primary) => CommandKind::StartPrimary,
        (ClusterMode::PrimaryReplica, Role::Replica) => CommandKind::StartReplicaBuild,
    }
}

/// Renders openGauss commands.
#[derive(Debug, Clone)]
pub struct GaussCommands {
    gauss: GaussSettings,
    user: String,
}

impl GaussCommands {
    /// Creates a renderer acting as OS and database user `user`.
    pub fn new(gauss: GaussSettings, user: impl Into<String>) -> Self {
        Self {
            gauss,
            user: user.into(),
        }
    }

    /// Returns the database owner.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the data directory of `member` inside its pod.
    pub fn member_dir(&self, member: &MemberId) -> PathBuf {
        self.gauss.data_dir.join(member.as_str())
    }

    /// Initializes the data directory of `member`.
    pub fn initialize(&self, member: &MemberSpec) -> RemoteCommand {
        let script = format!(
            "{} -w {} -D {} --nodename '{}' --locale='{}' -U {}",
            self.gauss.gs_initdb.display(),
            self.gauss.initial_password,
            member.storage_dir.display(),
            self.gauss.node_name,
            self.gauss.locale,
            self.user,
        );
        RemoteCommand::redacting(CommandKind::InitializeMember, script, &self.gauss.initial_password)
    }

    /// Opens client access and sets the listen address and port of `member`.
    pub fn configure(&self, member: &MemberSpec) -> RemoteCommand {
        let conf = member.config_file();
        let hba = member.client_auth_file();
        let script = format!(
            "echo \"host all all 0.0.0.0/0 sha256\" >> {hba} \
             && sed -i \"/^#listen_addresses =/c\\listen_addresses = '*'\" {conf} \
             && sed -i '/^#port =/c\\port = {port}' {conf}",
            hba = hba.display(),
            conf = conf.display(),
            port = member.port,
        );
        RemoteCommand::new(CommandKind::GenericConfig, script)
    }

    /// Appends one replication link to the configuration of its owner.
    pub fn replication(&self, member: &MemberSpec, link: &ReplicationLink) -> RemoteCommand {
        let script = format!(
            "echo \"{}\" >> {}",
            link.conf_line(),
            member.config_file().display()
        );
        RemoteCommand::new(CommandKind::GenericConfig, script)
    }

    /// Starts the member whose data lives in `dir`, as `kind` dictates.
    pub fn start(&self, dir: &Path, kind: CommandKind) -> RemoteCommand {
        let gs_ctl = self.gauss.gs_ctl.display();
        let dir = dir.display();
        let script = match kind {
            CommandKind::StartSingle => format!("{} start -D {} -Z single_node", gs_ctl, dir),
            CommandKind::StartReplicaBuild => format!("{} build -D {} -b full", gs_ctl, dir),
            _ => format!("{} start -D {} -M primary", gs_ctl, dir),
        };
        let kind = match kind {
            CommandKind::StartSingle | CommandKind::StartReplicaBuild => kind,
            _ => CommandKind::StartPrimary,
        };
        RemoteCommand::new(kind, script)
    }

    /// Stops the member whose data lives in `dir`.
    pub fn stop(&self, dir: &Path) -> RemoteCommand {
        RemoteCommand::new(
            CommandKind::StopMember,
            format!("{} stop -D {}", self.gauss.gs_ctl.display(), dir.display()),
        )
    }

    /// Lists the database server processes of `member`. Any output means one is live.
    pub fn probe(&self, member: &MemberId) -> RemoteCommand {
        RemoteCommand::new(
            CommandKind::Probe,
            format!(
                "ps -efww | grep -w {} | grep 'gaussdb ' | grep -v grep",
                member
            ),
        )
    }

    /// Prints the configured port of the member whose data lives in `dir`.
    pub fn read_port(&self, dir: &Path) -> RemoteCommand {
        RemoteCommand::new(
            CommandKind::Probe,
            format!(
                "sed -n '/^port/p' {} | awk '{{print $3}}'",
                dir.join(gauss_core::member::ENGINE_CONFIG_FILE).display()
            ),
        )
    }

    /// Runs one SQL statement through `gsql` against the `postgres` database.
    ///
    /// Output is tuples only, unaligned, one row per line.
    pub fn sql(&self, port: u16, statement: &str) -> RemoteCommand {
        let script = format!(
            "{} -d postgres -p {} -U {} -W '{}' -t -A -c \"{}\"",
            self.gauss.gsql.display(),
            port,
            self.user,
            self.gauss.initial_password,
            statement,
        );
        RemoteCommand::redacting(CommandKind::Sql, script, &self.gauss.initial_password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauss_core::ClusterSpec;

    fn commands() -> GaussCommands {
        GaussCommands::new(GaussSettings::default(), "dbuser")
    }

    fn cluster() -> ClusterSpec {
        ClusterSpec::builder("orders", "/opt/data1/greenopengauss/data")
            .member("orders-0", "10.0.0.1", 5432)
            .member("orders-1", "10.0.0.2", 5433)
            .build()
            .unwrap()
    }

    #[test]
    fn test_initialize_redacts_password() {
        let cluster = cluster();
        let cmd = commands().initialize(cluster.primary());

        assert_eq!(cmd.kind, CommandKind::InitializeMember);
        assert_eq!(
            cmd.script,
            "/opt/data1/greenopengauss/app/bin/gs_initdb -w Changeme_123 \
             -D /opt/data1/greenopengauss/data/orders-0 --nodename 'sg_node' \
             --locale='en_US.UTF-8' -U dbuser"
        );
        assert!(!cmd.display.contains("Changeme_123"));
        assert!(cmd.display.contains("-w ******"));
    }

    #[test]
    fn test_configure() {
        let cluster = cluster();
        let cmd = commands().configure(&cluster.members()[1]);

        assert_eq!(cmd.kind, CommandKind::GenericConfig);
        assert!(cmd.script.starts_with(
            "echo \"host all all 0.0.0.0/0 sha256\" >> /opt/data1/greenopengauss/data/orders-1/pg_hba.conf"
        ));
        assert!(cmd.script.contains("c\\listen_addresses = '*'"));
        assert!(cmd.script.ends_with(
            "sed -i '/^#port =/c\\port = 5433' /opt/data1/greenopengauss/data/orders-1/postgresql.conf"
        ));
    }

    #[test]
    fn test_start_commands_per_role() {
        let c = commands();
        let dir = Path::new("/data/orders-1");

        assert_eq!(
            c.start(dir, start_kind(ClusterMode::Single, Role::Primary)).script,
            "/opt/data1/greenopengauss/app/bin/gs_ctl start -D /data/orders-1 -Z single_node"
        );
        assert_eq!(
            c.start(dir, start_kind(ClusterMode::PrimaryReplica, Role::Primary)).script,
            "/opt/data1/greenopengauss/app/bin/gs_ctl start -D /data/orders-1 -M primary"
        );
        let build = c.start(dir, start_kind(ClusterMode::PrimaryReplica, Role::Replica));
        assert_eq!(build.kind, CommandKind::StartReplicaBuild);
        assert_eq!(
            build.script,
            "/opt/data1/greenopengauss/app/bin/gs_ctl build -D /data/orders-1 -b full"
        );
    }

    #[test]
    fn test_replication_line() {
        let cluster = cluster();
        let link = ReplicationLink::between(&cluster.members()[1], &cluster.members()[0]);
        let cmd = commands().replication(&cluster.members()[1], &link);

        assert_eq!(
            cmd.script,
            "echo \"replconninfo1 = 'localhost=10.0.0.2 localport=5434 localheartbeatport=5438 \
             localservice=5437 remotehost=10.0.0.1 remoteport=5433 remoteheartbeatport=5437 \
             remoteservice=5436'\" >> /opt/data1/greenopengauss/data/orders-1/postgresql.conf"
        );
    }

    #[test]
    fn test_sql_and_probes() {
        let c = commands();

        let sql = c.sql(5432, "SELECT datname FROM pg_database");
        assert_eq!(sql.kind, CommandKind::Sql);
        assert!(sql.script.contains("-p 5432 -U dbuser"));
        assert!(sql.script.ends_with("-t -A -c \"SELECT datname FROM pg_database\""));
        assert!(!sql.display.contains("Changeme_123"));

        assert_eq!(
            c.probe(&MemberId::new("orders-0")).script,
            "ps -efww | grep -w orders-0 | grep 'gaussdb ' | grep -v grep"
        );
        assert_eq!(
            c.read_port(&c.member_dir(&MemberId::new("orders-0"))).script,
            "sed -n '/^port/p' /opt/data1/greenopengauss/data/orders-0/postgresql.conf | awk '{print $3}'"
        );
    }
}
