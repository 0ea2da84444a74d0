//! Azure SQL connection wizard.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::connection_string::{validate_sql_connection_string, SqlConnectionString};
use super::provider::SqlServer;
use super::{
    ConnectionContext, ConnectionTarget, WriteSettingsStep, CREATE_NEW_CHOICE, SQL_DATABASE_NAME, SQL_SERVER_NAME,
};
use crate::types::ProgressSink;
use crate::wizard::{
    input_validated, Choice, Elicitor, ExecuteOutcome, ExecuteStep, PromptOutcome, PromptStep, SubWizard, Wizard,
    WizardError, WizardResult,
};

pub const CONNECTION_SETTING: &str = "SQLDB_Connection";

pub const CREATE_SERVER_PRIORITY: u32 = 140;
pub const CREATE_DATABASE_PRIORITY: u32 = 160;

const RESERVED_LOGINS: [&str; 9] = [
    "admin",
    "administrator",
    "sa",
    "root",
    "dbmanager",
    "loginmanager",
    "dbo",
    "guest",
    "public",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlSource {
    New,
    Existing,
    Custom,
}

pub struct SqlContext {
    pub target: ConnectionTarget,
    pub source: Option<SqlSource>,
    pub server: Option<SqlServer>,
    pub new_server_name: Option<String>,
    pub database: Option<String>,
    pub new_database_name: Option<String>,
    pub admin_login: Option<String>,
    pub admin_password: Option<String>,
    pub custom_connection: Option<String>,
}

impl SqlContext {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            source: None,
            server: None,
            new_server_name: None,
            database: None,
            new_database_name: None,
            admin_login: None,
            admin_password: None,
            custom_connection: None,
        }
    }

    fn connection_string(&self) -> Option<String> {
        if let Some(custom) = &self.custom_connection {
            return Some(custom.clone());
        }
        let conn = SqlConnectionString {
            server: self.server.as_ref()?.name.clone(),
            database: self.database.clone()?,
            user: self.admin_login.clone()?,
            password: self.admin_password.clone()?,
        };
        Some(conn.to_string())
    }
}

impl ConnectionContext for SqlContext {
    fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    fn settings(&self) -> BTreeMap<String, String> {
        self.connection_string()
            .map(|c| BTreeMap::from([(CONNECTION_SETTING.to_string(), c)]))
            .unwrap_or_default()
    }
}

pub fn wizard() -> Wizard<SqlContext> {
    Wizard::new("Connect an Azure SQL database")
        .prompt(SqlSourceStep)
        .execute(WriteSettingsStep)
}

/// Azure SQL admin password complexity: 8 to 128 characters from at least
/// three of upper case, lower case, digits and symbols.
fn check_password(value: &str) -> Option<String> {
    let len = value.chars().count();
    if !(8..=128).contains(&len) {
        return Some("The password must be between 8 and 128 characters.".to_string());
    }
    let classes = [
        value.chars().any(|c| c.is_ascii_uppercase()),
        value.chars().any(|c| c.is_ascii_lowercase()),
        value.chars().any(|c| c.is_ascii_digit()),
        value.chars().any(|c| !c.is_alphanumeric()),
    ];
    if classes.iter().filter(|&&b| b).count() < 3 {
        return Some(
            "The password must contain characters from three of: upper case, lower case, digits, symbols.".to_string(),
        );
    }
    None
}

fn check_login(value: &str) -> Option<String> {
    if value.is_empty() {
        return Some("The login cannot be empty.".to_string());
    }
    if RESERVED_LOGINS.iter().any(|r| r.eq_ignore_ascii_case(value)) {
        return Some(format!("\"{value}\" is a reserved name and cannot be used as a login."));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') || value.starts_with(|c: char| c.is_ascii_digit()) {
        return Some("The login can only contain letters, numbers and underscores, and cannot start with a number.".to_string());
    }
    None
}

// ---------------------------------------------------------------------------
// Prompt steps
// ---------------------------------------------------------------------------

struct SqlSourceStep;

#[async_trait]
impl PromptStep<SqlContext> for SqlSourceStep {
    fn id(&self) -> &str {
        "sqlSource"
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let servers = ctx.target.provider.list_sql_servers(&ctx.target.scope).await?;
        let mut choices = vec![Choice::new("new", "Create a new SQL server and database")];
        if !servers.is_empty() {
            choices.push(Choice::new("existing", "Use an existing SQL server"));
        }
        choices.push(Choice::new("custom", "Enter a connection string"));

        let picked = elicitor
            .pick(self.id(), "How should your app connect to Azure SQL?", &choices)
            .await?;
        let sub = match picked.as_str() {
            "custom" => {
                ctx.source = Some(SqlSource::Custom);
                SubWizard::prompts(vec![Box::new(CustomConnectionStep)])
            }
            "existing" => {
                ctx.source = Some(SqlSource::Existing);
                SubWizard::prompts(vec![
                    Box::new(PickServerStep { servers }),
                    Box::new(DatabaseStep),
                    Box::new(AdminLoginStep),
                    Box::new(AdminPasswordStep { strict: false }),
                ])
            }
            _ => {
                ctx.source = Some(SqlSource::New);
                let existing = servers.into_iter().map(|s| s.name).collect();
                SubWizard::prompts(vec![
                    Box::new(ServerNameStep { existing }),
                    Box::new(AdminLoginStep),
                    Box::new(AdminPasswordStep { strict: true }),
                    Box::new(DatabaseNameStep { existing: Vec::new() }),
                ])
                .with_execute(vec![Box::new(CreateServerStep), Box::new(CreateDatabaseStep)])
            }
        };
        Ok(PromptOutcome::DoneWith(sub))
    }
}

struct CustomConnectionStep;

#[async_trait]
impl PromptStep<SqlContext> for CustomConnectionStep {
    fn id(&self) -> &str {
        "sqlConnectionString"
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let value = input_validated(elicitor, self.id(), "Enter the SQL connection string", None, |v| {
            validate_sql_connection_string(v).err().map(|e| e.to_string())
        })
        .await?;
        ctx.custom_connection = Some(value);
        Ok(PromptOutcome::Done)
    }
}

struct PickServerStep {
    servers: Vec<SqlServer>,
}

#[async_trait]
impl PromptStep<SqlContext> for PickServerStep {
    fn id(&self) -> &str {
        "sqlServer"
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let choices: Vec<_> = self
            .servers
            .iter()
            .map(|s| Choice::new(&s.name, &s.name).described(&s.location))
            .collect();
        let picked = elicitor.pick(self.id(), "Select a SQL server", &choices).await?;
        ctx.server = self.servers.iter().find(|s| s.name == picked).cloned();
        Ok(PromptOutcome::Done)
    }
}

struct DatabaseStep;

#[async_trait]
impl PromptStep<SqlContext> for DatabaseStep {
    fn id(&self) -> &str {
        "sqlDatabase"
    }

    fn should_prompt(&self, ctx: &SqlContext) -> bool {
        ctx.server.is_some()
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let Some(server) = &ctx.server else {
            return Err(WizardError::step(self.id(), "no SQL server selected"));
        };
        let databases: Vec<String> = ctx
            .target
            .provider
            .list_sql_databases(&ctx.target.scope, &server.name)
            .await?
            .into_iter()
            .map(|d| d.name)
            .collect();
        let mut choices = vec![Choice::new(CREATE_NEW_CHOICE, "Create a new database")];
        choices.extend(databases.iter().map(|d| Choice::new(d, d)));

        let picked = elicitor.pick(self.id(), "Select a database", &choices).await?;
        if picked == CREATE_NEW_CHOICE {
            return Ok(PromptOutcome::DoneWith(
                SubWizard::prompts(vec![Box::new(DatabaseNameStep { existing: databases })])
                    .with_execute(vec![Box::new(CreateDatabaseStep)]),
            ));
        }
        ctx.database = Some(picked);
        Ok(PromptOutcome::Done)
    }
}

struct ServerNameStep {
    existing: Vec<String>,
}

#[async_trait]
impl PromptStep<SqlContext> for ServerNameStep {
    fn id(&self) -> &str {
        "sqlServerName"
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let name = input_validated(elicitor, self.id(), "Enter a name for the new SQL server", None, |v| {
            SQL_SERVER_NAME.check(v, &self.existing)
        })
        .await?;
        ctx.new_server_name = Some(name);
        Ok(PromptOutcome::Done)
    }
}

struct DatabaseNameStep {
    existing: Vec<String>,
}

#[async_trait]
impl PromptStep<SqlContext> for DatabaseNameStep {
    fn id(&self) -> &str {
        "sqlDatabaseName"
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let name = input_validated(elicitor, self.id(), "Enter a name for the new database", None, |v| {
            SQL_DATABASE_NAME.check(v, &self.existing)
        })
        .await?;
        ctx.new_database_name = Some(name);
        Ok(PromptOutcome::Done)
    }
}

struct AdminLoginStep;

#[async_trait]
impl PromptStep<SqlContext> for AdminLoginStep {
    fn id(&self) -> &str {
        "sqlAdminLogin"
    }

    fn should_prompt(&self, ctx: &SqlContext) -> bool {
        ctx.source != Some(SqlSource::Existing) || ctx.server.is_some()
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let default = ctx.server.as_ref().map(|s| s.admin_login.clone());
        let login = input_validated(elicitor, self.id(), "Enter the SQL admin login", default.as_deref(), check_login).await?;
        ctx.admin_login = Some(login);
        Ok(PromptOutcome::Done)
    }
}

/// New servers get the full complexity check; an existing server's
/// password is whatever it already is.
struct AdminPasswordStep {
    strict: bool,
}

#[async_trait]
impl PromptStep<SqlContext> for AdminPasswordStep {
    fn id(&self) -> &str {
        "sqlAdminPassword"
    }

    fn should_prompt(&self, ctx: &SqlContext) -> bool {
        ctx.admin_login.is_some()
    }

    async fn prompt(&self, ctx: &mut SqlContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<SqlContext>> {
        let strict = self.strict;
        let password = input_validated(elicitor, self.id(), "Enter the SQL admin password", None, |v| {
            if strict {
                check_password(v)
            } else if v.is_empty() {
                Some("The password cannot be empty.".to_string())
            } else {
                None
            }
        })
        .await?;
        ctx.admin_password = Some(password);
        Ok(PromptOutcome::Done)
    }
}

// ---------------------------------------------------------------------------
// Execute steps
// ---------------------------------------------------------------------------

struct CreateServerStep;

#[async_trait]
impl ExecuteStep<SqlContext> for CreateServerStep {
    fn id(&self) -> &str {
        "createSqlServer"
    }

    fn priority(&self) -> u32 {
        CREATE_SERVER_PRIORITY
    }

    fn should_execute(&self, ctx: &SqlContext) -> bool {
        ctx.server.is_none()
            && ctx.new_server_name.is_some()
            && ctx.admin_login.is_some()
            && ctx.admin_password.is_some()
    }

    async fn execute(&self, ctx: &mut SqlContext, progress: &dyn ProgressSink) -> WizardResult<ExecuteOutcome<SqlContext>> {
        let (Some(name), Some(login), Some(password)) = (&ctx.new_server_name, &ctx.admin_login, &ctx.admin_password)
        else {
            return Ok(ExecuteOutcome::Done);
        };
        progress.progress(&format!("Creating SQL server \"{name}\"..."));
        let server = ctx
            .target
            .provider
            .create_sql_server(&ctx.target.scope, name, &ctx.target.location, login, password)
            .await?;
        progress.markdown(&format!("Created SQL server `{}`", server.name));
        ctx.server = Some(server);
        Ok(ExecuteOutcome::Done)
    }
}

struct CreateDatabaseStep;

#[async_trait]
impl ExecuteStep<SqlContext> for CreateDatabaseStep {
    fn id(&self) -> &str {
        "createSqlDatabase"
    }

    fn priority(&self) -> u32 {
        CREATE_DATABASE_PRIORITY
    }

    fn should_execute(&self, ctx: &SqlContext) -> bool {
        ctx.server.is_some() && ctx.new_database_name.is_some() && ctx.database.is_none()
    }

    async fn execute(&self, ctx: &mut SqlContext, progress: &dyn ProgressSink) -> WizardResult<ExecuteOutcome<SqlContext>> {
        let (Some(server), Some(name)) = (&ctx.server, &ctx.new_database_name) else {
            return Ok(ExecuteOutcome::Done);
        };
        progress.progress(&format!("Creating database \"{name}\"..."));
        let db = ctx
            .target
            .provider
            .create_sql_database(&ctx.target.scope, &server.name, name)
            .await?;
        progress.markdown(&format!("Created database `{}` on `{}`", db.name, db.server));
        ctx.database = Some(db.name);
        Ok(ExecuteOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::provider::{InMemoryResourceProvider, Inventory, ResourceScope};
    use crate::types::NullProgress;
    use crate::wizard::{ScriptedElicitor, WizardOutcome, WizardState};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn scope() -> ResourceScope {
        ResourceScope::new("sub", "rg")
    }

    fn context(provider: InMemoryResourceProvider) -> SqlContext {
        SqlContext::new(ConnectionTarget {
            provider: Arc::new(provider),
            scope: scope(),
            location: "eastus".into(),
            project_path: None,
        })
    }

    async fn run(ctx: &mut SqlContext, elicitor: &ScriptedElicitor) -> WizardOutcome {
        wizard()
            .run(ctx, elicitor, &NullProgress, &CancellationToken::new())
            .await
    }

    #[test]
    fn password_rules() {
        assert!(check_password("short1A").is_some());
        assert!(check_password("alllowercase").is_some());
        assert!(check_password("Passw0rdOK").is_none());
        assert!(check_password("lower-and-1").is_none());
    }

    #[test]
    fn login_rules() {
        assert!(check_login("sa").is_some());
        assert!(check_login("1user").is_some());
        assert!(check_login("app_admin").is_none());
    }

    #[tokio::test]
    async fn new_server_and_database() {
        let mut ctx = context(InMemoryResourceProvider::new());
        let elicitor = ScriptedElicitor::from_pairs([
            ("sqlSource", "new"),
            ("sqlServerName", "orders-sql"),
            ("sqlAdminLogin", "admin"),
            ("sqlAdminLogin", "orders_admin"),
            ("sqlAdminPassword", "weak"),
            ("sqlAdminPassword", "Str0ng!Pass"),
            ("sqlDatabaseName", "orders"),
        ]);
        let outcome = run(&mut ctx, &elicitor).await;
        assert_eq!(outcome.state, WizardState::Completed);
        assert_eq!(outcome.executed, vec!["createSqlServer", "createSqlDatabase"]);
        assert_eq!(elicitor.reported_feedback().len(), 2);
        assert_eq!(
            ctx.settings()[CONNECTION_SETTING],
            "Server=orders-sql.database.windows.net,1433;Database=orders;User=orders_admin;Password=Str0ng!Pass"
        );
    }

    #[tokio::test]
    async fn existing_server_existing_database() {
        let inventory: Inventory = serde_yaml::from_str(
            "sql_servers:\n  - name: shared-sql\n    location: eastus\n    admin_login: dba\n    databases: [inventory]\n",
        )
        .unwrap();
        let mut ctx = context(InMemoryResourceProvider::new().with_inventory(scope(), inventory));
        let elicitor = ScriptedElicitor::from_pairs([
            ("sqlSource", "existing"),
            ("sqlServer", "shared-sql"),
            ("sqlDatabase", "inventory"),
            ("sqlAdminLogin", ""),
            ("sqlAdminPassword", "secret"),
        ]);
        let outcome = run(&mut ctx, &elicitor).await;
        assert!(outcome.is_completed());
        assert!(outcome.executed.is_empty());
        assert_eq!(outcome.skipped, vec!["writeSettings"]);
        assert_eq!(
            ctx.settings()[CONNECTION_SETTING],
            "Server=shared-sql.database.windows.net,1433;Database=inventory;User=dba;Password=secret"
        );
    }

    #[tokio::test]
    async fn rejected_default_login_fails_instead_of_looping() {
        let inventory: Inventory = serde_yaml::from_str(
            "sql_servers:\n  - name: legacy-sql\n    location: eastus\n    admin_login: sa\n    databases: [new]\n",
        )
        .unwrap();
        let mut ctx = context(InMemoryResourceProvider::new().with_inventory(scope(), inventory));
        let elicitor = ScriptedElicitor::from_pairs([
            ("sqlSource", "existing"),
            ("sqlServer", "legacy-sql"),
            ("sqlDatabase", "new"),
            ("sqlAdminLogin", ""),
        ]);
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(2), run(&mut ctx, &elicitor))
            .await
            .expect("wizard did not finish");
        assert_eq!(outcome.state, WizardState::Failed);
        assert!(outcome.error.unwrap().contains("sqlAdminLogin"));
        assert_eq!(ctx.database.as_deref(), Some("new"));
        assert_eq!(elicitor.reported_feedback().len(), 1);
    }

    #[tokio::test]
    async fn custom_connection_string_is_kept_verbatim() {
        let mut ctx = context(InMemoryResourceProvider::new());
        let custom = "Server=tcp:x.database.windows.net,1433;Database=y;Authentication=Active Directory Default";
        let elicitor = ScriptedElicitor::from_pairs([
            ("sqlSource", "custom"),
            ("sqlConnectionString", "not a connection string"),
            ("sqlConnectionString", custom),
        ]);
        let outcome = run(&mut ctx, &elicitor).await;
        assert!(outcome.is_completed());
        assert_eq!(ctx.settings()[CONNECTION_SETTING], custom);
    }

    #[tokio::test]
    async fn server_creation_failure_fails_the_run() {
        let mut ctx = context(InMemoryResourceProvider::new().fail_on("create_sql_server", "region full"));
        let elicitor = ScriptedElicitor::from_pairs([
            ("sqlSource", "new"),
            ("sqlServerName", "srv"),
            ("sqlAdminLogin", "app"),
            ("sqlAdminPassword", "Str0ng!Pass"),
            ("sqlDatabaseName", "db"),
        ]);
        let outcome = run(&mut ctx, &elicitor).await;
        assert_eq!(outcome.state, WizardState::Failed);
        assert_eq!(outcome.executed, vec!["createSqlServer"]);
        assert!(outcome.error.unwrap().contains("region full"));
    }
}
