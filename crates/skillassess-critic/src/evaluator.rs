use skillassess_agent::{
    FailureKind, ModelClient, ModelError, ModelRequest, RetryCallback, RetryNotice, RetryPolicy,
    RetryReason, SchemaHint,
};
use skillassess_model::{validate, AssessmentGrid};
use tracing::{debug, info, warn};

use crate::{CritiquePrompts, CritiqueVerdict};

/// Judges candidate grids with a second model call
pub struct CritiqueAgent<'a> {
    client: &'a dyn ModelClient,
    policy: &'a RetryPolicy,
    on_retry: Option<RetryCallback>,
    temperature: Option<f32>,
}

impl<'a> CritiqueAgent<'a> {
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

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Critique `grid`, degrading an unreadable critique to a conservative
    /// rejection. Only [`CritiqueError::Unavailable`] is returned as an error.
    pub async fn critique(&self, grid: &AssessmentGrid) -> Result<CritiqueVerdict, CritiqueError> {
        match self.evaluate(grid).await {
            Err(CritiqueError::MalformedOutput { attempts, detail }) => {
                warn!(attempts, detail = %detail, "Critique unreadable, rejecting conservatively");
                Ok(CritiqueVerdict::could_not_validate(&detail))
            }
            other => other,
        }
    }

    /// Critique `grid`, reporting an unreadable critique as an error.
    ///
    /// Structural violations are returned as a rejection without any model
    /// call.
    pub async fn evaluate(&self, grid: &AssessmentGrid) -> Result<CritiqueVerdict, CritiqueError> {
        if let Err(invalid) = validate(grid) {
            info!(
                violations = invalid.violations.len(),
                "Grid rejected on structure, skipping model critique"
            );
            return Ok(CritiqueVerdict::from_validation(&invalid));
        }

        let grid_json =
            serde_json::to_string_pretty(grid).map_err(|e| CritiqueError::MalformedOutput {
                attempts: 0,
                detail: format!("grid could not be serialized: {}", e),
            })?;
        let base_prompt = CritiquePrompts::build_critique_prompt(grid, &grid_json);

        let max_attempts = self.policy.max_repair_retries + 1;
        let mut repair_note = String::new();
        let mut last_problem = String::new();

        for attempt in 1..=max_attempts {
            let mut request = ModelRequest::critique(format!("{}{}", base_prompt, repair_note));
            if let Some(temperature) = self.temperature {
                request = request.with_temperature(temperature);
            }

            debug!(attempt, prompt_len = request.prompt.len(), "Running critique");

            let response = self
                .policy
                .call(self.client, &request, self.on_retry.as_ref())
                .await
                .map_err(CritiqueError::Unavailable)?;

            match CritiqueVerdict::parse(&response.text) {
                Ok(verdict) => {
                    info!(
                        attempt,
                        verdict = %verdict.short_description(),
                        duration_secs = response.duration.as_secs_f64(),
                        "Critique completed"
                    );
                    return Ok(verdict);
                }
                Err(parse_error) => {
                    last_problem = parse_error.to_string();
                    warn!(attempt, max_attempts, error = %last_problem, "Unreadable critique");
                    if attempt < max_attempts {
                        if let Some(callback) = &self.on_retry {
                            callback(&RetryNotice {
                                schema: SchemaHint::CritiqueVerdict,
                                reason: RetryReason::MalformedOutput,
                                attempt,
                                error: last_problem.clone(),
                            });
                        }
                    }
                    repair_note = CritiquePrompts::build_repair_note(&last_problem);
                }
            }
        }

        Err(CritiqueError::MalformedOutput {
            attempts: max_attempts,
            detail: last_problem,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error("Critique unreadable after {attempts} attempt(s): {detail}")]
    MalformedOutput { attempts: u32, detail: String },

    #[error("Model provider unavailable: {0}")]
    Unavailable(ModelError),
}

impl CritiqueError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CritiqueError::MalformedOutput { .. } => FailureKind::MalformedOutput,
            CritiqueError::Unavailable(_) => FailureKind::Unavailable,
        }
    }
}
