use async_trait::async_trait;
use std::sync::Arc;

use skillassess_agent::{ModelClient, RetryCallback, RetryPolicy};
use skillassess_critic::{CritiqueAgent, CritiqueError, CritiqueVerdict};
use skillassess_generator::{GenerationAgent, GenerationContext, GenerationError};
use skillassess_model::{AssessmentGrid, Competency};

/// The two model-backed capabilities the pipeline needs.
///
/// Implemented once against hosted clients by [`HostedModelCaller`]; tests
/// substitute scripted implementations.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// Draft a structurally valid grid
    async fn generate(
        &self,
        competency: &Competency,
        context: &GenerationContext,
        on_retry: Option<&RetryCallback>,
    ) -> Result<AssessmentGrid, GenerationError>;

    /// Judge a candidate grid
    async fn critique(
        &self,
        grid: &AssessmentGrid,
        on_retry: Option<&RetryCallback>,
    ) -> Result<CritiqueVerdict, CritiqueError>;
}

/// [`ModelCaller`] backed by hosted model clients sharing one retry policy
pub struct HostedModelCaller {
    generator: Arc<dyn ModelClient>,
    critic: Arc<dyn ModelClient>,
    policy: RetryPolicy,
    generation_temperature: Option<f32>,
    critique_temperature: Option<f32>,
}

impl HostedModelCaller {
    pub fn new(
        generator: Arc<dyn ModelClient>,
        critic: Arc<dyn ModelClient>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            critic,
            policy,
            generation_temperature: None,
            critique_temperature: None,
        }
    }

    pub fn with_temperatures(mut self, generation: Option<f32>, critique: Option<f32>) -> Self {
        self.generation_temperature = generation;
        self.critique_temperature = critique;
        self
    }
}

#[async_trait]
impl ModelCaller for HostedModelCaller {
    async fn generate(
        &self,
        competency: &Competency,
        context: &GenerationContext,
        on_retry: Option<&RetryCallback>,
    ) -> Result<AssessmentGrid, GenerationError> {
        let mut agent = GenerationAgent::new(self.generator.as_ref(), &self.policy);
        if let Some(callback) = on_retry {
            agent = agent.with_retry_callback(callback.clone());
        }
        if let Some(temperature) = self.generation_temperature {
            agent = agent.with_temperature(temperature);
        }
        agent.generate(competency, context).await
    }

    async fn critique(
        &self,
        grid: &AssessmentGrid,
        on_retry: Option<&RetryCallback>,
    ) -> Result<CritiqueVerdict, CritiqueError> {
        let mut agent = CritiqueAgent::new(self.critic.as_ref(), &self.policy);
        if let Some(callback) = on_retry {
            agent = agent.with_retry_callback(callback.clone());
        }
        if let Some(temperature) = self.critique_temperature {
            agent = agent.with_temperature(temperature);
        }
        agent.critique(grid).await
    }
}
