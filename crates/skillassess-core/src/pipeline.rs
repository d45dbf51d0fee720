use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use skillassess_agent::{RetryCallback, RetryNotice, RetryReason, SchemaHint};
use skillassess_critic::{CritiqueError, CritiqueVerdict, DefectCategory, Finding};
use skillassess_generator::{GenerationContext, GenerationError};
use skillassess_logging::{LogEvent, Logger, Stage};
use skillassess_model::{validate, AssessmentGrid, Competency};

use crate::outcome::{Failure, FailureReason};
use crate::{CycleRecord, ModelCaller, PipelineError, PipelineOutcome, PipelineState, RunContext};

/// Regeneration cycles allowed after the first rejection
pub const DEFAULT_REGENERATION_BUDGET: usize = 1;

/// Orchestrates generate, critique and regenerate for one competency at a time
pub struct Pipeline<'a> {
    caller: &'a dyn ModelCaller,
    logger: Arc<Logger>,
    interrupted: Arc<AtomicBool>,
    regeneration_budget: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(caller: &'a dyn ModelCaller, logger: Arc<Logger>) -> Self {
        Self {
            caller,
            logger,
            interrupted: Arc::new(AtomicBool::new(false)),
            regeneration_budget: DEFAULT_REGENERATION_BUDGET,
        }
    }

    pub fn with_regeneration_budget(mut self, budget: usize) -> Self {
        self.regeneration_budget = budget;
        self
    }

    /// Share an externally owned interrupt flag (e.g. set from Ctrl+C)
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Run several independent pipelines concurrently.
    ///
    /// Runs share nothing but the caller; outbound concurrency is bounded by
    /// whatever throttle the caller's clients apply.
    pub async fn run_batch(
        &self,
        competencies: Vec<Competency>,
    ) -> Vec<Result<PipelineOutcome, PipelineError>> {
        info!(runs = competencies.len(), "Starting batch");
        join_all(competencies.into_iter().map(|c| self.run(c))).await
    }

    /// Run the pipeline until the grid is accepted, fails, or is cancelled
    pub async fn run(&self, competency: Competency) -> Result<PipelineOutcome, PipelineError> {
        competency.check()?;

        let mut context = RunContext::new(competency);
        self.logger.log(&LogEvent::RunStarted {
            run_id: context.run_id.clone(),
            competency: context.competency.statement().to_string(),
            level: context.competency.level().to_string(),
            track: context.competency.track().to_string(),
            duration_minutes: context.competency.duration_minutes(),
        });

        let on_retry = retry_logging_callback(self.logger.clone(), context.run_id.clone());
        let mut feedback: Vec<String> = Vec::new();
        let mut last_grid: Option<AssessmentGrid> = None;
        let mut last_findings: Vec<Finding> = Vec::new();

        loop {
            if let Some(outcome) = self.check_cancelled(&mut context)? {
                return Ok(outcome);
            }

            // Generating
            context.transition(PipelineState::Generating)?;
            self.logger.log(&LogEvent::GenerationStarted {
                run_id: context.run_id.clone(),
                cycle: context.cycle,
            });

            let generation_context = GenerationContext::regenerate(context.cycle, feedback.clone());
            let generation_started = Instant::now();
            let generated = self
                .caller
                .generate(&context.competency, &generation_context, Some(&on_retry))
                .await;
            let generation_secs = generation_started.elapsed().as_secs_f64();

            let candidate = match generated {
                Ok(grid) => Ok(grid),
                // A draft that parsed but stayed invalid is still critiqued, so
                // its defects count against the regeneration budget
                Err(GenerationError::MalformedOutput {
                    last_candidate: Some(grid),
                    attempts,
                    ..
                }) => {
                    warn!(
                        run_id = %context.run_id,
                        attempts,
                        "Draft still invalid after repair attempts, passing to critique"
                    );
                    Ok(*grid)
                }
                // Nothing parsed: the cycle is rejected without asking the critic
                Err(error @ GenerationError::MalformedOutput { .. }) => {
                    warn!(run_id = %context.run_id, error = %error, "No usable draft this cycle");
                    Err(Finding::new(DefectCategory::Structural, error.to_string()))
                }
                Err(error @ GenerationError::Unavailable(_)) => {
                    let failure = Failure {
                        failed_in: PipelineState::Generating,
                        reason: FailureReason::Unavailable,
                        error: error.to_string(),
                        last_grid: last_grid.take(),
                        findings: std::mem::take(&mut last_findings),
                    };
                    return self.fail(context, failure);
                }
            };

            if let Ok(grid) = &candidate {
                self.logger.log(&LogEvent::GenerationCompleted {
                    run_id: context.run_id.clone(),
                    cycle: context.cycle,
                    criteria: grid.rubric.criterion_count(),
                    duration_secs: generation_secs,
                });
            }

            if let Some(outcome) = self.check_cancelled(&mut context)? {
                return Ok(outcome);
            }

            // Critiquing
            context.transition(PipelineState::Critiquing)?;
            self.logger.log(&LogEvent::CritiqueStarted {
                run_id: context.run_id.clone(),
                cycle: context.cycle,
            });

            let critique_started = Instant::now();
            let (verdict, structurally_valid) = match &candidate {
                Ok(grid) => {
                    let verdict = match self.caller.critique(grid, Some(&on_retry)).await {
                        Ok(verdict) => verdict,
                        Err(CritiqueError::MalformedOutput { detail, .. }) => {
                            CritiqueVerdict::could_not_validate(&detail)
                        }
                        Err(error @ CritiqueError::Unavailable(_)) => {
                            let failure = Failure {
                                failed_in: PipelineState::Critiquing,
                                reason: FailureReason::Unavailable,
                                error: error.to_string(),
                                last_grid: Some(grid.clone()),
                                findings: last_findings,
                            };
                            return self.fail(context, failure);
                        }
                    };

                    // Structure always wins over the model's opinion
                    let structure = validate(grid);
                    let verdict = match (verdict, &structure) {
                        (CritiqueVerdict::Accepted { .. }, Err(invalid)) => {
                            warn!(run_id = %context.run_id, "Critic accepted an invalid grid, overriding");
                            CritiqueVerdict::from_validation(invalid)
                        }
                        (verdict, _) => verdict,
                    };
                    (verdict, structure.is_ok())
                }
                Err(unusable) => (
                    CritiqueVerdict::Rejected {
                        findings: vec![unusable.clone()],
                    },
                    false,
                ),
            };
            let critique_secs = critique_started.elapsed().as_secs_f64();

            self.logger.log(&LogEvent::CritiqueCompleted {
                run_id: context.run_id.clone(),
                cycle: context.cycle,
                verdict: verdict.short_description(),
                findings: verdict.findings().len(),
                duration_secs: critique_secs,
            });
            context.push_record(CycleRecord {
                cycle: context.cycle,
                structurally_valid,
                verdict: verdict.short_description(),
                findings: verdict.feedback_lines(),
                generation_secs,
                critique_secs,
                timestamp: Utc::now(),
            });

            match (verdict, candidate) {
                (CritiqueVerdict::Accepted { summary }, Ok(grid)) => {
                    context.transition(PipelineState::Accepted)?;
                    let duration = context.total_duration();
                    self.logger.log(&LogEvent::RunAccepted {
                        run_id: context.run_id.clone(),
                        cycles: context.history.len(),
                        summary: summary.clone(),
                        duration_secs: duration.as_secs_f64(),
                    });
                    return Ok(PipelineOutcome::accepted(
                        context.run_id,
                        grid,
                        summary,
                        context.history,
                        duration,
                    ));
                }
                (verdict, candidate) => {
                    let findings = verdict.findings().to_vec();
                    if context.regenerations() >= self.regeneration_budget {
                        let failure = Failure {
                            failed_in: PipelineState::Critiquing,
                            reason: FailureReason::RegenerationBudgetExhausted,
                            error: format!(
                                "Grid still rejected after {} regeneration(s)",
                                context.regenerations()
                            ),
                            last_grid: candidate.ok().or(last_grid),
                            findings,
                        };
                        return self.fail(context, failure);
                    }

                    if let Some(outcome) = self.check_cancelled(&mut context)? {
                        return Ok(outcome);
                    }

                    context.transition(PipelineState::Regenerating)?;
                    context.cycle += 1;
                    feedback = findings.iter().map(ToString::to_string).collect();
                    self.logger.log(&LogEvent::Regenerating {
                        run_id: context.run_id.clone(),
                        cycle: context.cycle,
                        findings: feedback.clone(),
                    });
                    if let Ok(grid) = candidate {
                        last_grid = Some(grid);
                    }
                    last_findings = findings;
                }
            }
        }
    }

    /// End the run as `Cancelled` if an interrupt was requested
    fn check_cancelled(
        &self,
        context: &mut RunContext,
    ) -> Result<Option<PipelineOutcome>, PipelineError> {
        if !self.interrupted.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let state = context.state();
        context.transition(PipelineState::Cancelled)?;
        info!(run_id = %context.run_id, state = %state, "Run interrupted by user");
        self.logger.log(&LogEvent::RunCancelled {
            run_id: context.run_id.clone(),
            state: state.to_string(),
        });
        let duration = context.total_duration();
        Ok(Some(PipelineOutcome::cancelled(
            context.run_id.clone(),
            state,
            std::mem::take(&mut context.history),
            duration,
        )))
    }

    fn fail(
        &self,
        mut context: RunContext,
        failure: Failure,
    ) -> Result<PipelineOutcome, PipelineError> {
        context.transition(PipelineState::Failed)?;
        self.logger.log(&LogEvent::RunFailed {
            run_id: context.run_id.clone(),
            failed_in: failure.failed_in.to_string(),
            reason: failure.reason.to_string(),
            findings: failure.findings.iter().map(ToString::to_string).collect(),
        });
        let duration = context.total_duration();
        Ok(PipelineOutcome::failed(
            context.run_id,
            failure,
            context.history,
            duration,
        ))
    }
}

/// Retry callback that reports each retry as a [`LogEvent::CallRetried`]
pub fn retry_logging_callback(logger: Arc<Logger>, run_id: String) -> RetryCallback {
    Arc::new(move |notice: &RetryNotice| {
        let stage = match notice.schema {
            SchemaHint::AssessmentGrid => Stage::Generation,
            SchemaHint::CritiqueVerdict => Stage::Critique,
        };
        let reason = match notice.reason {
            RetryReason::Transport => "transport",
            RetryReason::MalformedOutput => "malformed output",
        };
        logger.log(&LogEvent::CallRetried {
            run_id: run_id.clone(),
            stage,
            reason: reason.to_string(),
            attempt: notice.attempt,
            error: notice.error.clone(),
        });
    })
}
