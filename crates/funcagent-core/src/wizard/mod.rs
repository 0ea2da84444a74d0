//! Multi-step wizard engine.
//!
//! A wizard is a list of prompt steps followed by a list of execute steps,
//! both working on one context value owned by the run.
//!
//! ```text
//! NotStarted ──► Prompting ──► Executing ──► Completed
//!                    │             │
//!                    └─────────────┴──► Failed / Cancelled
//! ```
//!
//! Prompt steps run in registration order. A step may hand back a
//! [`SubWizard`]; its prompt steps are spliced in right after the current
//! one and its execute steps join the execute list. Once every prompt step
//! has been visited, the execute steps are stably sorted by priority and
//! run one by one. An execute step may return more execute steps, which run
//! immediately after it.

pub mod elicit;
pub mod error;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::types::ProgressSink;

pub use elicit::{input_validated, match_choice, Answers, Choice, Elicitor, ScriptedElicitor};
pub use error::{WizardError, WizardResult};

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Further steps discovered while a wizard runs.
pub struct SubWizard<C> {
    pub prompt_steps: Vec<Box<dyn PromptStep<C>>>,
    pub execute_steps: Vec<Box<dyn ExecuteStep<C>>>,
}

impl<C> Default for SubWizard<C> {
    fn default() -> Self {
        Self {
            prompt_steps: Vec::new(),
            execute_steps: Vec::new(),
        }
    }
}

impl<C> SubWizard<C> {
    pub fn prompts(steps: Vec<Box<dyn PromptStep<C>>>) -> Self {
        Self {
            prompt_steps: steps,
            execute_steps: Vec::new(),
        }
    }

    pub fn with_execute(mut self, steps: Vec<Box<dyn ExecuteStep<C>>>) -> Self {
        self.execute_steps = steps;
        self
    }
}

pub enum PromptOutcome<C> {
    Done,
    DoneWith(SubWizard<C>),
}

pub enum ExecuteOutcome<C> {
    Done,
    DoneWith(Vec<Box<dyn ExecuteStep<C>>>),
}

#[async_trait]
pub trait PromptStep<C>: Send + Sync {
    fn id(&self) -> &str;

    fn should_prompt(&self, _ctx: &C) -> bool {
        true
    }

    async fn prompt(&self, ctx: &mut C, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<C>>;
}

#[async_trait]
pub trait ExecuteStep<C>: Send + Sync {
    fn id(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> u32;

    fn should_execute(&self, ctx: &C) -> bool;

    /// Record a failure of this step as a diagnostic and keep going.
    fn continue_on_fail(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut C, progress: &dyn ProgressSink) -> WizardResult<ExecuteOutcome<C>>;
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardState {
    NotStarted,
    Prompting,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl WizardState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub step: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardOutcome {
    pub state: WizardState,
    /// Every state the run passed through, starting at `NotStarted`.
    pub transitions: Vec<WizardState>,
    /// Prompt steps that asked for input, in order.
    pub prompted: Vec<String>,
    /// Execute steps that ran, in order, including ones that failed.
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WizardOutcome {
    fn new() -> Self {
        Self {
            state: WizardState::NotStarted,
            transitions: vec![WizardState::NotStarted],
            prompted: Vec::new(),
            executed: Vec::new(),
            skipped: Vec::new(),
            diagnostics: Vec::new(),
            error: None,
        }
    }

    fn enter(&mut self, state: WizardState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "wizard state");
            self.state = state;
            self.transitions.push(state);
        }
    }

    fn fail(mut self, err: WizardError) -> Self {
        if err.is_cancelled() {
            tracing::info!("wizard cancelled");
            self.enter(WizardState::Cancelled);
        } else {
            tracing::warn!(error = %err, "wizard failed");
            self.error = Some(err.to_string());
            self.enter(WizardState::Failed);
        }
        self
    }

    pub fn is_completed(&self) -> bool {
        self.state == WizardState::Completed
    }
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

pub struct Wizard<C> {
    title: String,
    prompt_steps: Vec<Box<dyn PromptStep<C>>>,
    execute_steps: Vec<Box<dyn ExecuteStep<C>>>,
}

impl<C: Send + Sync> Wizard<C> {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            prompt_steps: Vec::new(),
            execute_steps: Vec::new(),
        }
    }

    pub fn prompt(mut self, step: impl PromptStep<C> + 'static) -> Self {
        self.prompt_steps.push(Box::new(step));
        self
    }

    pub fn execute(mut self, step: impl ExecuteStep<C> + 'static) -> Self {
        self.execute_steps.push(Box::new(step));
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Run to a terminal state. Failures are reported in the outcome.
    pub async fn run(
        self,
        ctx: &mut C,
        elicitor: &dyn Elicitor,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> WizardOutcome {
        let mut outcome = WizardOutcome::new();
        tracing::info!(wizard = %self.title, "wizard started");

        // Prompt phase.
        let mut pending: VecDeque<Box<dyn PromptStep<C>>> = self.prompt_steps.into();
        let mut execute_steps = self.execute_steps;
        while let Some(step) = pending.pop_front() {
            if cancel.is_cancelled() {
                return outcome.fail(WizardError::Cancelled);
            }
            if !step.should_prompt(ctx) {
                tracing::debug!(step = step.id(), "prompt skipped");
                continue;
            }
            outcome.enter(WizardState::Prompting);
            outcome.prompted.push(step.id().to_string());
            match cancellable(cancel, step.prompt(ctx, elicitor)).await {
                Ok(PromptOutcome::Done) => {}
                Ok(PromptOutcome::DoneWith(sub)) => {
                    for s in sub.prompt_steps.into_iter().rev() {
                        pending.push_front(s);
                    }
                    execute_steps.extend(sub.execute_steps);
                }
                Err(e) => return outcome.fail(e),
            }
        }

        // Execute phase. `sort_by_key` is stable, so ties keep discovery order.
        execute_steps.sort_by_key(|s| s.priority());
        let mut pending: VecDeque<Box<dyn ExecuteStep<C>>> = execute_steps.into();
        while let Some(step) = pending.pop_front() {
            if cancel.is_cancelled() {
                return outcome.fail(WizardError::Cancelled);
            }
            if !step.should_execute(ctx) {
                tracing::debug!(step = step.id(), "execute skipped");
                outcome.skipped.push(step.id().to_string());
                continue;
            }
            outcome.enter(WizardState::Executing);
            outcome.executed.push(step.id().to_string());
            match cancellable(cancel, step.execute(ctx, progress)).await {
                Ok(ExecuteOutcome::Done) => {}
                Ok(ExecuteOutcome::DoneWith(more)) => {
                    for s in more.into_iter().rev() {
                        pending.push_front(s);
                    }
                }
                Err(e) if e.is_cancelled() => return outcome.fail(e),
                Err(e) if step.continue_on_fail() => {
                    tracing::warn!(step = step.id(), error = %e, "step failed; continuing");
                    outcome.diagnostics.push(Diagnostic {
                        step: step.id().to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return outcome.fail(e),
            }
        }

        outcome.enter(WizardState::Completed);
        tracing::info!(wizard = %self.title, executed = outcome.executed.len(), "wizard completed");
        outcome
    }
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> WizardResult<T>
where
    F: Future<Output = WizardResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WizardError::Cancelled),
        r = fut => r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NullProgress;
    use std::sync::Arc;

    #[derive(Default)]
    struct Ctx {
        log: Vec<String>,
        wants_more: bool,
        value: Option<u32>,
    }

    struct Ask {
        id: &'static str,
        enabled: bool,
        sub: bool,
    }

    #[async_trait]
    impl PromptStep<Ctx> for Ask {
        fn id(&self) -> &str {
            self.id
        }

        fn should_prompt(&self, _ctx: &Ctx) -> bool {
            self.enabled
        }

        async fn prompt(&self, ctx: &mut Ctx, elicitor: &dyn Elicitor) -> WizardResult<PromptOutcome<Ctx>> {
            let answer = elicitor.input(self.id, self.id, None).await?;
            ctx.log.push(format!("{}={answer}", self.id));
            if self.sub {
                return Ok(PromptOutcome::DoneWith(
                    SubWizard::prompts(vec![Box::new(Ask {
                        id: "nested",
                        enabled: true,
                        sub: false,
                    })])
                    .with_execute(vec![Box::new(Exec::new("sub", 100))]),
                ));
            }
            Ok(PromptOutcome::Done)
        }
    }

    struct Exec {
        id: &'static str,
        priority: u32,
        fail: bool,
        continue_on_fail: bool,
        needs_value: bool,
    }

    impl Exec {
        fn new(id: &'static str, priority: u32) -> Self {
            Self {
                id,
                priority,
                fail: false,
                continue_on_fail: false,
                needs_value: false,
            }
        }
    }

    #[async_trait]
    impl ExecuteStep<Ctx> for Exec {
        fn id(&self) -> &str {
            self.id
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn should_execute(&self, ctx: &Ctx) -> bool {
            !self.needs_value || ctx.value.is_some()
        }

        fn continue_on_fail(&self) -> bool {
            self.continue_on_fail
        }

        async fn execute(&self, ctx: &mut Ctx, _progress: &dyn ProgressSink) -> WizardResult<ExecuteOutcome<Ctx>> {
            ctx.log.push(self.id.to_string());
            if self.fail {
                return Err(WizardError::step(self.id, "boom"));
            }
            if self.id == "produce" {
                ctx.value = Some(1);
            }
            if ctx.wants_more && self.id == "first" {
                ctx.wants_more = false;
                return Ok(ExecuteOutcome::DoneWith(vec![Box::new(Exec::new("inserted", 999))]));
            }
            Ok(ExecuteOutcome::Done)
        }
    }

    async fn run(wizard: Wizard<Ctx>, ctx: &mut Ctx, elicitor: &ScriptedElicitor) -> WizardOutcome {
        wizard
            .run(ctx, elicitor, &NullProgress, &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn no_op_wizard_completes_directly() {
        let wizard = Wizard::new("noop").prompt(Ask {
            id: "a",
            enabled: false,
            sub: false,
        });
        let mut ctx = Ctx::default();
        let outcome = run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(outcome.state, WizardState::Completed);
        assert_eq!(outcome.transitions, vec![WizardState::NotStarted, WizardState::Completed]);
        assert!(outcome.executed.is_empty());
    }

    #[tokio::test]
    async fn execute_steps_run_by_priority() {
        let wizard = Wizard::new("order")
            .execute(Exec::new("p250", 250))
            .execute(Exec::new("p150", 150))
            .execute(Exec::new("p350", 350));
        let mut ctx = Ctx::default();
        let outcome = run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(ctx.log, vec!["p150", "p250", "p350"]);
        assert_eq!(outcome.executed, ctx.log);
        assert_eq!(
            outcome.transitions,
            vec![WizardState::NotStarted, WizardState::Executing, WizardState::Completed]
        );
    }

    #[tokio::test]
    async fn equal_priorities_keep_registration_order() {
        let wizard = Wizard::new("ties")
            .execute(Exec::new("b", 10))
            .execute(Exec::new("a", 10))
            .execute(Exec::new("c", 5));
        let mut ctx = Ctx::default();
        run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(ctx.log, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn continue_on_fail_keeps_going() {
        let wizard = Wizard::new("tolerant")
            .execute(Exec {
                fail: true,
                continue_on_fail: true,
                ..Exec::new("flaky", 100)
            })
            .execute(Exec::new("after", 200));
        let mut ctx = Ctx::default();
        let outcome = run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(outcome.state, WizardState::Completed);
        assert_eq!(ctx.log, vec!["flaky", "after"]);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].step, "flaky");
    }

    #[tokio::test]
    async fn failure_without_opt_in_stops_the_run() {
        let wizard = Wizard::new("strict")
            .execute(Exec {
                fail: true,
                ..Exec::new("fatal", 100)
            })
            .execute(Exec::new("after", 200));
        let mut ctx = Ctx::default();
        let outcome = run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(outcome.state, WizardState::Failed);
        assert_eq!(ctx.log, vec!["fatal"]);
        assert!(outcome.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn dependent_step_is_skipped_after_tolerated_failure() {
        let wizard = Wizard::new("dependent")
            .execute(Exec {
                fail: true,
                continue_on_fail: true,
                ..Exec::new("produce", 100)
            })
            .execute(Exec {
                needs_value: true,
                ..Exec::new("consume", 200)
            });
        let mut ctx = Ctx::default();
        let outcome = run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(outcome.state, WizardState::Completed);
        assert_eq!(outcome.skipped, vec!["consume"]);
    }

    #[tokio::test]
    async fn sub_wizard_is_spliced_after_its_step() {
        let wizard = Wizard::new("nested")
            .prompt(Ask {
                id: "first",
                enabled: true,
                sub: true,
            })
            .prompt(Ask {
                id: "last",
                enabled: true,
                sub: false,
            })
            .execute(Exec::new("main", 200));
        let elicitor = ScriptedElicitor::from_pairs([("first", "1"), ("nested", "2"), ("last", "3")]);
        let mut ctx = Ctx::default();
        let outcome = run(wizard, &mut ctx, &elicitor).await;
        assert_eq!(outcome.prompted, vec!["first", "nested", "last"]);
        assert_eq!(ctx.log, vec!["first=1", "nested=2", "last=3", "sub", "main"]);
    }

    #[tokio::test]
    async fn executed_steps_can_insert_more() {
        let wizard = Wizard::new("insert")
            .execute(Exec::new("first", 1))
            .execute(Exec::new("second", 2));
        let mut ctx = Ctx {
            wants_more: true,
            ..Default::default()
        };
        run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(ctx.log, vec!["first", "inserted", "second"]);
    }

    #[tokio::test]
    async fn missing_answer_fails_in_prompt_phase() {
        let wizard = Wizard::new("unanswered")
            .prompt(Ask {
                id: "a",
                enabled: true,
                sub: false,
            })
            .execute(Exec::new("never", 1));
        let mut ctx = Ctx::default();
        let outcome = run(wizard, &mut ctx, &ScriptedElicitor::default()).await;
        assert_eq!(outcome.state, WizardState::Failed);
        assert!(outcome.executed.is_empty());
        assert_eq!(
            outcome.transitions,
            vec![WizardState::NotStarted, WizardState::Prompting, WizardState::Failed]
        );
    }

    #[tokio::test]
    async fn cancellation_is_not_a_failure() {
        let wizard = Wizard::new("cancelled").execute(Exec::new("never", 1));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ctx = Ctx::default();
        let outcome = wizard
            .run(&mut ctx, &ScriptedElicitor::default(), &NullProgress, &cancel)
            .await;
        assert_eq!(outcome.state, WizardState::Cancelled);
        assert!(outcome.error.is_none());
        assert!(ctx.log.is_empty());
    }

    #[tokio::test]
    async fn concurrent_runs_do_not_share_context() {
        let build = || Wizard::new("parallel").execute(Exec::new("only", 1));
        let elicitor = Arc::new(ScriptedElicitor::default());
        let (mut a, mut b) = (Ctx::default(), Ctx::default());
        let (cancel_a, cancel_b) = (CancellationToken::new(), CancellationToken::new());
        let (oa, ob) = tokio::join!(
            build().run(&mut a, elicitor.as_ref(), &NullProgress, &cancel_a),
            build().run(&mut b, elicitor.as_ref(), &NullProgress, &cancel_b),
        );
        assert!(oa.is_completed() && ob.is_completed());
        assert_eq!(a.log, vec!["only"]);
        assert_eq!(b.log, vec!["only"]);
    }
}
