//! Durable Task Scheduler connection wizard.
//!
//! ```text
//! scheduler: emulator ─────────────────────────────────► writeSettings
//!            existing ─► schedulerName ─► taskHub ─┬───► writeSettings
//!                                                  └ new ─► taskHubName ─► createTaskHub
//!            new ──────► schedulerName ─► taskHubName ─► createScheduler ─► createTaskHub
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::connection_string::{DtsConnectionString, DTS_EMULATOR_TASK_HUB};
use super::provider::Scheduler;
use super::{
    ConnectionContext, ConnectionTarget, WriteSettingsStep, CREATE_NEW_CHOICE, SCHEDULER_NAME, TASK_HUB_NAME,
};
use crate::types::ProgressSink;
use crate::wizard::{
    input_validated, Choice, Elicitor, ExecuteOutcome, ExecuteStep, PromptOutcome, PromptStep, SubWizard, Wizard,
    WizardError, WizardResult,
};

pub const CONNECTION_SETTING: &str = "DURABLE_TASK_SCHEDULER_CONNECTION_STRING";
pub const TASK_HUB_SETTING: &str = "TASKHUB_NAME";

pub const CREATE_SCHEDULER_PRIORITY: u32 = 150;
pub const CREATE_TASK_HUB_PRIORITY: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtsSource {
    Emulator,
    Existing,
    New,
}

pub struct DtsContext {
    pub target: ConnectionTarget,
    pub source: Option<DtsSource>,
    pub scheduler: Option<Scheduler>,
    pub new_scheduler_name: Option<String>,
    pub task_hub: Option<String>,
    pub new_task_hub_name: Option<String>,
}

impl DtsContext {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            source: None,
            scheduler: None,
            new_scheduler_name: None,
            task_hub: None,
            new_task_hub_name: None,
        }
    }
}

impl ConnectionContext for DtsContext {
    fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    fn settings(&self) -> BTreeMap<String, String> {
        let connection = match (self.source, &self.scheduler, &self.task_hub) {
            (Some(DtsSource::Emulator), _, Some(hub)) => Some((DtsConnectionString::emulator(), hub)),
            (Some(_), Some(s), Some(hub)) => Some((DtsConnectionString::azure(&s.endpoint), hub)),
            _ => None,
        };
        connection
            .map(|(conn, hub)| {
                BTreeMap::from([
                    (CONNECTION_SETTING.to_string(), conn.to_string()),
                    (TASK_HUB_SETTING.to_string(), hub.clone()),
                ])
            })
            .unwrap_or_default()
    }
}

pub fn wizard() -> Wizard<DtsContext> {
    Wizard::new("Connect a Durable Task Scheduler")
        .prompt(SchedulerSourceStep)
        .execute(WriteSettingsStep)
}

// ---------------------------------------------------------------------------
// Prompt steps
// ---------------------------------------------------------------------------

struct SchedulerSourceStep;

#[async_trait]
impl PromptStep<DtsContext> for SchedulerSourceStep {
    fn id(&self) -> &str {
        "scheduler"
    }

    async fn prompt(&self, ctx: &mut DtsContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<DtsContext>> {
        let schedulers = ctx.target.provider.list_schedulers(&ctx.target.scope).await?;
        let mut choices = vec![
            Choice::new("emulator", "Use the local emulator").described("Endpoint http://localhost:8080, task hub \"default\""),
        ];
        if !schedulers.is_empty() {
            choices.push(Choice::new("existing", "Use an existing scheduler"));
        }
        choices.push(Choice::new("new", "Create a new scheduler"));

        let picked = elicitor
            .pick(self.id(), "How should your app connect to a Durable Task Scheduler?", &choices)
            .await?;
        match picked.as_str() {
            "emulator" => {
                ctx.source = Some(DtsSource::Emulator);
                ctx.task_hub = Some(DTS_EMULATOR_TASK_HUB.to_string());
                Ok(PromptOutcome::Done)
            }
            "existing" => {
                ctx.source = Some(DtsSource::Existing);
                Ok(PromptOutcome::DoneWith(SubWizard::prompts(vec![
                    Box::new(PickSchedulerStep { schedulers }),
                    Box::new(TaskHubStep),
                ])))
            }
            _ => {
                ctx.source = Some(DtsSource::New);
                let existing = schedulers.into_iter().map(|s| s.name).collect();
                Ok(PromptOutcome::DoneWith(
                    SubWizard::prompts(vec![
                        Box::new(SchedulerNameStep { existing }),
                        Box::new(TaskHubNameStep { existing: Vec::new() }),
                    ])
                    .with_execute(vec![Box::new(CreateSchedulerStep), Box::new(CreateTaskHubStep)]),
                ))
            }
        }
    }
}

struct PickSchedulerStep {
    schedulers: Vec<Scheduler>,
}

#[async_trait]
impl PromptStep<DtsContext> for PickSchedulerStep {
    fn id(&self) -> &str {
        "schedulerName"
    }

    async fn prompt(&self, ctx: &mut DtsContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<DtsContext>> {
        let choices: Vec<_> = self
            .schedulers
            .iter()
            .map(|s| Choice::new(&s.name, &s.name).described(&s.location))
            .collect();
        let picked = elicitor.pick(self.id(), "Select a scheduler", &choices).await?;
        ctx.scheduler = self.schedulers.iter().find(|s| s.name == picked).cloned();
        Ok(PromptOutcome::Done)
    }
}

struct TaskHubStep;

#[async_trait]
impl PromptStep<DtsContext> for TaskHubStep {
    fn id(&self) -> &str {
        "taskHub"
    }

    fn should_prompt(&self, ctx: &DtsContext) -> bool {
        ctx.scheduler.is_some()
    }

    async fn prompt(&self, ctx: &mut DtsContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<DtsContext>> {
        let Some(scheduler) = &ctx.scheduler else {
            return Err(WizardError::step(self.id(), "no scheduler selected"));
        };
        let hubs: Vec<String> = ctx
            .target
            .provider
            .list_task_hubs(&ctx.target.scope, &scheduler.name)
            .await?
            .into_iter()
            .map(|h| h.name)
            .collect();
        let mut choices = vec![Choice::new(CREATE_NEW_CHOICE, "Create a new task hub")];
        choices.extend(hubs.iter().map(|h| Choice::new(h, h)));

        let picked = elicitor.pick(self.id(), "Select a task hub", &choices).await?;
        if picked == CREATE_NEW_CHOICE {
            return Ok(PromptOutcome::DoneWith(
                SubWizard::prompts(vec![Box::new(TaskHubNameStep { existing: hubs })])
                    .with_execute(vec![Box::new(CreateTaskHubStep)]),
            ));
        }
        ctx.task_hub = Some(picked);
        Ok(PromptOutcome::Done)
    }
}

struct SchedulerNameStep {
    existing: Vec<String>,
}

#[async_trait]
impl PromptStep<DtsContext> for SchedulerNameStep {
    fn id(&self) -> &str {
        "schedulerName"
    }

    async fn prompt(&self, ctx: &mut DtsContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<DtsContext>> {
        let name = input_validated(elicitor, self.id(), "Enter a name for the new scheduler", None, |v| {
            SCHEDULER_NAME.check(v, &self.existing)
        })
        .await?;
        ctx.new_scheduler_name = Some(name);
        Ok(PromptOutcome::Done)
    }
}

struct TaskHubNameStep {
    existing: Vec<String>,
}

#[async_trait]
impl PromptStep<DtsContext> for TaskHubNameStep {
    fn id(&self) -> &str {
        "taskHubName"
    }

    async fn prompt(&self, ctx: &mut DtsContext, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<DtsContext>> {
        let name = input_validated(
            elicitor,
            self.id(),
            "Enter a name for the new task hub",
            Some(DTS_EMULATOR_TASK_HUB),
            |v| TASK_HUB_NAME.check(v, &self.existing),
        )
        .await?;
        ctx.new_task_hub_name = Some(name);
        Ok(PromptOutcome::Done)
    }
}

// ---------------------------------------------------------------------------
// Execute steps
// ---------------------------------------------------------------------------

struct CreateSchedulerStep;

#[async_trait]
impl ExecuteStep<DtsContext> for CreateSchedulerStep {
    fn id(&self) -> &str {
        "createScheduler"
    }

    fn priority(&self) -> u32 {
        CREATE_SCHEDULER_PRIORITY
    }

    fn should_execute(&self, ctx: &DtsContext) -> bool {
        ctx.new_scheduler_name.is_some() && ctx.scheduler.is_none()
    }

    async fn execute(&self, ctx: &mut DtsContext, progress: &dyn ProgressSink) -> WizardResult<ExecuteOutcome<DtsContext>> {
        let Some(name) = ctx.new_scheduler_name.clone() else {
            return Ok(ExecuteOutcome::Done);
        };
        progress.progress(&format!("Creating scheduler \"{name}\"..."));
        let scheduler = ctx
            .target
            .provider
            .create_scheduler(&ctx.target.scope, &name, &ctx.target.location)
            .await?;
        progress.markdown(&format!("Created scheduler `{}` at {}", scheduler.name, scheduler.endpoint));
        ctx.scheduler = Some(scheduler);
        Ok(ExecuteOutcome::Done)
    }
}

/// A failed task hub leaves the scheduler in place; the settings step then
/// finds no task hub and is skipped.
struct CreateTaskHubStep;

#[async_trait]
impl ExecuteStep<DtsContext> for CreateTaskHubStep {
    fn id(&self) -> &str {
        "createTaskHub"
    }

    fn priority(&self) -> u32 {
        CREATE_TASK_HUB_PRIORITY
    }

    fn should_execute(&self, ctx: &DtsContext) -> bool {
        ctx.scheduler.is_some() && ctx.new_task_hub_name.is_some() && ctx.task_hub.is_none()
    }

    fn continue_on_fail(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut DtsContext, progress: &dyn ProgressSink) -> WizardResult<ExecuteOutcome<DtsContext>> {
        let (Some(scheduler), Some(name)) = (&ctx.scheduler, &ctx.new_task_hub_name) else {
            return Ok(ExecuteOutcome::Done);
        };
        progress.progress(&format!("Creating task hub \"{name}\"..."));
        let hub = ctx
            .target
            .provider
            .create_task_hub(&ctx.target.scope, &scheduler.name, name)
            .await?;
        progress.markdown(&format!("Created task hub `{}`", hub.name));
        ctx.task_hub = Some(hub.name);
        Ok(ExecuteOutcome::Done)
    }
}
