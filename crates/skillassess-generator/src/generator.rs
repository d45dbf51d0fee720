use skillassess_agent::{
    FailureKind, ModelClient, ModelError, ModelRequest, RetryCallback, RetryNotice, RetryPolicy,
    RetryReason, SchemaHint,
};
use skillassess_model::{validate, AssessmentGrid, Competency, Violation};
use tracing::{debug, info, warn};

use crate::{parse_grid, GenerationPrompts};

/// What a generation cycle knows about earlier cycles
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    /// Critique findings from the previous cycle, rendered as feedback lines
    pub findings: Vec<String>,
    /// Zero-based generation cycle within the run
    pub cycle: usize,
}

impl GenerationContext {
    pub fn first() -> Self {
        Self::default()
    }

    pub fn regenerate(cycle: usize, findings: Vec<String>) -> Self {
        Self { findings, cycle }
    }
}

/// Drafts assessment grids from a competency record
pub struct GenerationAgent<'a> {
    client: &'a dyn ModelClient,
    policy: &'a RetryPolicy,
    on_retry: Option<RetryCallback>,
    temperature: Option<f32>,
}

impl<'a> GenerationAgent<'a> {
    pub fn new(client: &'a dyn ModelClient, policy: &'a RetryPolicy) -> Self {
        Self {
            client,
            policy,
            on_retry: None,
            temperature: None,
        }
    }

    pub fn with_retry_callback(mut self, on_retry: RetryCallback) -> Self {
        self.on_retry = Some(on_retry);
        self
    }

    /// Override the default sampling temperature for drafts
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Draft a grid that passes structural validation.
    ///
    /// Unparseable or invalid replies are re-prompted with a corrective note
    /// up to `max_repair_retries` times. Transport failures are retried inside
    /// [`RetryPolicy::call`] and surface as [`GenerationError::Unavailable`].
    pub async fn generate(
        &self,
        competency: &Competency,
        context: &GenerationContext,
    ) -> Result<AssessmentGrid, GenerationError> {
        let max_attempts = self.policy.max_repair_retries + 1;
        let mut repair: Option<String> = None;
        let mut details = Vec::new();
        let mut violations = Vec::new();
        let mut last_candidate = None;

        for attempt in 1..=max_attempts {
            let prompt = GenerationPrompts::build(competency, &context.findings, repair.as_deref());
            let mut request = ModelRequest::generation(prompt);
            if let Some(temperature) = self.temperature {
                request = request.with_temperature(temperature);
            }

            debug!(
                cycle = context.cycle,
                attempt,
                prompt_len = request.prompt.len(),
                "Requesting grid draft"
            );

            let response = self
                .policy
                .call(self.client, &request, self.on_retry.as_ref())
                .await
                .map_err(GenerationError::Unavailable)?;

            let problem = match parse_grid(&response.text, competency) {
                Ok(grid) => match validate(&grid) {
                    Ok(()) => {
                        info!(
                            cycle = context.cycle,
                            attempt,
                            criteria = grid.rubric.criterion_count(),
                            duration_secs = response.duration.as_secs_f64(),
                            "Grid draft passed validation"
                        );
                        return Ok(grid);
                    }
                    Err(invalid) => {
                        let problem = format!(
                            "The grid breaks these rules:\n{}",
                            invalid.as_bullets()
                        );
                        violations = invalid.violations;
                        last_candidate = Some(grid);
                        problem
                    }
                },
                Err(parse_error) => parse_error.to_string(),
            };

            warn!(cycle = context.cycle, attempt, max_attempts, problem = %problem, "Unusable grid draft");
            details.push(problem.clone());

            if attempt < max_attempts {
                if let Some(callback) = &self.on_retry {
                    callback(&RetryNotice {
                        schema: SchemaHint::AssessmentGrid,
                        reason: RetryReason::MalformedOutput,
                        attempt,
                        error: problem.clone(),
                    });
                }
            }
            repair = Some(problem);
        }

        Err(GenerationError::MalformedOutput {
            attempts: max_attempts,
            details,
            violations,
            last_candidate: last_candidate.map(Box::new),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("No usable grid after {attempts} attempt(s): {}", details.last().map(String::as_str).unwrap_or("no detail"))]
    MalformedOutput {
        attempts: u32,
        /// One entry per failed attempt
        details: Vec<String>,
        /// Violations of the last candidate that parsed, if any
        violations: Vec<Violation>,
        /// Last draft that parsed but failed validation
        last_candidate: Option<Box<AssessmentGrid>>,
    },

    #[error("Model provider unavailable: {0}")]
    Unavailable(ModelError),
}

impl GenerationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GenerationError::MalformedOutput { .. } => FailureKind::MalformedOutput,
            GenerationError::Unavailable(_) => FailureKind::Unavailable,
        }
    }
}
