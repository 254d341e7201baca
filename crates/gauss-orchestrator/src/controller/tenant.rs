//! Tenant provisioning on the primary member.
//!
//! A tenant is a database user with its own tablespace and temporary
//! tablespace. Tenants reach their data through the shared access database.

use gauss_core::{DatabaseNames, MemberId, Verb};
use std::collections::BTreeSet;
use tracing::info;

use super::report::{CommandReport, Run, Step, StepFailure};
use super::state::LifecycleState;
use super::Orchestrator;
use crate::error::{OrchestratorError, Result};
use crate::exec::ExecTransport;
use crate::substrate::{ControlPlane, WORKLOAD_KIND};

const TABLESPACE_MAXSIZE: &str = "102400M";
const TENANT_CONNECTION_LIMIT: u32 = 500;
const ACCESS_CONNECTION_LIMIT: u32 = 1024;

/// Statements that provision tenant `name`, in execution order.
pub fn provision_statements(name: &str, password: &str) -> Vec<String> {
    vec![
        "REVOKE ALL ON SCHEMA PUBLIC FROM PUBLIC".to_string(),
        format!(
            "CREATE TABLESPACE {0} RELATIVE LOCATION 'tablespace/{0}' MAXSIZE '{1}'",
            name, TABLESPACE_MAXSIZE
        ),
        format!(
            "CREATE USER {0} ENCRYPTED Password '{1}' NOSYSADMIN NOINHERIT CONNECTION LIMIT {2} \
             PERM SPACE '{3}' TEMP SPACE '{3}' SPILL SPACE '{3}';",
            name, password, TENANT_CONNECTION_LIMIT, TABLESPACE_MAXSIZE
        ),
        format!("ALTER TABLESPACE {0} OWNER TO {0}", name),
        format!("ALTER USER {0} SET search_path TO {0}", name),
        format!("ALTER USER {0} SET default_tablespace TO {0}", name),
        format!(
            "CREATE TABLESPACE {0}_tempdb RELATIVE LOCATION 'tablespace/{0}_tempdb' MAXSIZE '{1}'",
            name, TABLESPACE_MAXSIZE
        ),
        format!("ALTER USER {0} SET temp_tablespaces TO {0}_tempdb", name),
    ]
}

/// Statements that remove tenant `name`, handing its tablespace back to `owner` first.
pub fn removal_statements(name: &str, owner: &str) -> Vec<String> {
    vec![
        format!("DROP TABLESPACE {}_tempdb", name),
        format!("ALTER TABLESPACE {} OWNER TO {}", name, owner),
        format!("DROP USER IF EXISTS {} CASCADE", name),
        format!("DROP TABLESPACE IF EXISTS {}", name),
    ]
}

impl<C: ControlPlane, T: ExecTransport> Orchestrator<C, T> {
    /// Provisions one tenant per name on the primary of `instance`.
    ///
    /// Creates the access database first when it is missing, and refuses every
    /// name if any of them already names a database.
    pub async fn add_database(&self, instance: &str, names: &DatabaseNames) -> CommandReport {
        let mut run = self.run(Verb::AddDatabase, instance, LifecycleState::Unprovisioned);
        let result = self.add_database_steps(instance, names, &mut run).await;
        run.finish(result)
    }

    /// Removes one tenant per name from the primary of `instance`.
    pub async fn remove_database(&self, instance: &str, names: &DatabaseNames) -> CommandReport {
        let mut run = self.run(Verb::RemoveDatabase, instance, LifecycleState::Unprovisioned);
        let result = self.remove_database_steps(instance, names, &mut run).await;
        run.finish(result)
    }

    async fn add_database_steps(
        &self,
        instance: &str,
        names: &DatabaseNames,
        run: &mut Run,
    ) -> std::result::Result<(), StepFailure> {
        let (primary, port) = self.primary_session(instance, run).await?;

        run.step(Step::EnsureAccessDatabase, self.ensure_access_database(&primary, port))
            .await?;

        run.step(Step::CheckDatabases, async {
            let existing = self.list_databases(&primary, port).await?;
            match names.iter().find(|name| existing.contains(*name)) {
                Some(taken) => Err(OrchestratorError::already_exists("database", taken)),
                None => Ok(()),
            }
        })
        .await?;

        let password = self.settings.gauss.initial_password.as_str();
        for name in names.iter() {
            run.step(
                Step::AddTenant(name.to_string()),
                self.run_statements(&primary, port, provision_statements(name, password)),
            )
            .await?;
        }
        info!(cluster = instance, tenants = %names, "Tenants provisioned");
        Ok(())
    }

    async fn remove_database_steps(
        &self,
        instance: &str,
        names: &DatabaseNames,
        run: &mut Run,
    ) -> std::result::Result<(), StepFailure> {
        let (primary, port) = self.primary_session(instance, run).await?;

        for name in names.iter() {
            run.step(
                Step::RemoveTenant(name.to_string()),
                self.run_statements(&primary, port, removal_statements(name, self.commands.user())),
            )
            .await?;
        }
        info!(cluster = instance, tenants = %names, "Tenants removed");
        Ok(())
    }

    /// Checks that the primary is up and discovers its port.
    async fn primary_session(
        &self,
        instance: &str,
        run: &mut Run,
    ) -> std::result::Result<(MemberId, u16), StepFailure> {
        run.step(Step::ReadWorkload, self.substrate.read(instance))
            .await?
            .ok_or_else(|| {
                StepFailure::new(Step::ReadWorkload, OrchestratorError::not_found(WORKLOAD_KIND, instance))
            })?;
        run.observe(LifecycleState::Running);

        let primary = MemberId::for_ordinal(instance, 0);
        run.step(Step::ProbeMember(primary.clone()), async {
            if self.member_running(&primary).await? {
                Ok(())
            } else {
                Err(OrchestratorError::remote_exec(
                    primary.as_str(),
                    "database is not created or started",
                ))
            }
        })
        .await?;

        let port = run.step(Step::DiscoverPort, self.discover_port(&primary)).await?;
        Ok((primary, port))
    }

    async fn discover_port(&self, member: &MemberId) -> Result<u16> {
        let command = self.commands.read_port(&self.commands.member_dir(member));
        let output = self.executor.run(member.as_str(), &command).await?;
        let line = output.last_line().ok_or_else(|| {
            OrchestratorError::configuration(format!("no port configured on {}", member))
        })?;
        line.parse().map_err(|_| {
            OrchestratorError::configuration(format!("port of {} is not a number: {}", member, line))
        })
    }

    async fn list_databases(&self, member: &MemberId, port: u16) -> Result<BTreeSet<String>> {
        let command = self.commands.sql(port, "SELECT datname FROM pg_database");
        let output = self.executor.run(member.as_str(), &command).await?;
        Ok(output
            .stdout
            .iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    async fn ensure_access_database(&self, member: &MemberId, port: u16) -> Result<()> {
        let access = self.settings.gauss.access_database.as_str();
        let check = self.commands.sql(
            port,
            &format!("SELECT datname FROM pg_database WHERE datname = '{}'", access),
        );
        let output = self.executor.run(member.as_str(), &check).await?;
        if output.stdout.iter().any(|line| line.trim() == access) {
            info!(member = %member, database = access, "Access database present");
            return Ok(());
        }

        let create = self.commands.sql(
            port,
            &format!(
                "CREATE DATABASE {} WITH ENCODING = 'UTF8' template template0 lc_collate = 'C' \
                 LC_CTYPE= 'C' DBCOMPATIBILITY 'PG' CONNECTION LIMIT = {}",
                access, ACCESS_CONNECTION_LIMIT
            ),
        );
        self.executor.run(member.as_str(), &create).await?;
        info!(member = %member, database = access, "Access database created");
        Ok(())
    }

    async fn run_statements(&self, member: &MemberId, port: u16, statements: Vec<String>) -> Result<()> {
        for statement in &statements {
            self.executor
                .run(member.as_str(), &self.commands.sql(port, statement))
                .await?;
        }
        Ok(())
    }
}
