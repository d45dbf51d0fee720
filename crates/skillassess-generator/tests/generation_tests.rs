use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use skillassess_agent::{
    FailureKind, ModelClient, ModelError, ModelRequest, ModelResponse, RetryCallback, RetryNotice,
    RetryPolicy, RetryReason,
};
use skillassess_generator::{GenerationAgent, GenerationContext, GenerationError};
use skillassess_model::{Competency, RubricLevel, Violation};

/// Replays scripted replies; the last one repeats once the script runs out
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    last: Result<String, ModelError>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<String, ModelError>>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or_else(|| Err(ModelError::Transport("empty script".into())));
        Self {
            replies: Mutex::new(replies.into()),
            last,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.clone());
        reply.map(|text| ModelResponse::new(text, Duration::from_millis(5)))
    }
}

fn competency() -> Competency {
    Competency::new("Configure a small office LAN", "intermediate", "networking", 60).unwrap()
}

fn level_json(prefix: &str) -> String {
    format!(
        r#"[{{"description": "{p} cabling", "indicators": ["{p} patch panel"], "points": 3}},
            {{"description": "{p} addressing", "indicators": ["{p} subnet plan"], "points": 3}}]"#,
        p = prefix
    )
}

fn valid_reply() -> String {
    format!(
        r#"{{
            "rubric": {{"ND": {}, "NI": {}, "NA": {}}},
            "scenario": {{
                "context": "A networking contractor equips a new branch office.",
                "task": "Configure the switch and addressing plan.",
                "instructions": "Work alone and document each step."
            }},
            "grading_scale": {{"total_points": 20, "bands": {{
                "ND": {{"min": 0, "max": 9}},
                "NI": {{"min": 10, "max": 14}},
                "NA": {{"min": 15, "max": 20}}
            }}}}
        }}"#,
        level_json("ND"),
        level_json("NI"),
        level_json("NA")
    )
}

fn reply_missing_achieved() -> String {
    valid_reply().replace(r#""NA": ["#, r#""XX": ["#)
}

fn recording_callback() -> (RetryCallback, Arc<Mutex<Vec<RetryNotice>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: RetryCallback = Arc::new(move |notice: &RetryNotice| {
        sink.lock().unwrap().push(notice.clone());
    });
    (callback, seen)
}

#[tokio::test]
async fn test_valid_first_reply() {
    let client = ScriptedClient::new(vec![Ok(valid_reply())]);
    let policy = RetryPolicy::immediate(3, 2);
    let agent = GenerationAgent::new(&client, &policy);

    let grid = agent
        .generate(&competency(), &GenerationContext::first())
        .await
        .unwrap();

    assert_eq!(client.calls(), 1);
    assert_eq!(grid.competency, competency());
    assert_eq!(grid.rubric.criterion_count(), 6);
}

#[tokio::test]
async fn test_repairs_unparseable_reply() {
    let client = ScriptedClient::new(vec![
        Ok("Sorry, here is a summary instead.".into()),
        Ok(valid_reply()),
    ]);
    let policy = RetryPolicy::immediate(3, 2);
    let (callback, seen) = recording_callback();
    let agent = GenerationAgent::new(&client, &policy).with_retry_callback(callback);

    agent
        .generate(&competency(), &GenerationContext::first())
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert!(!client.prompt(0).contains("Correction Needed"));
    assert!(client.prompt(1).contains("Correction Needed"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].reason, RetryReason::MalformedOutput);
    assert_eq!(seen[0].attempt, 1);
}

#[tokio::test]
async fn test_invalid_grid_exhausts_repair_bound() {
    let client = ScriptedClient::new(vec![Ok(reply_missing_achieved())]);
    let policy = RetryPolicy::immediate(3, 2);
    let agent = GenerationAgent::new(&client, &policy);

    let err = agent
        .generate(&competency(), &GenerationContext::first())
        .await
        .unwrap_err();

    assert_eq!(client.calls(), 3);
    assert_eq!(err.kind(), FailureKind::MalformedOutput);
    match err {
        GenerationError::MalformedOutput {
            attempts,
            details,
            violations,
            last_candidate,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(details.len(), 3);
            assert!(violations.contains(&Violation::MissingLevel {
                level: RubricLevel::Achieved
            }));
            assert!(last_candidate.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(client.prompt(2).contains("rubric level NA is missing"));
}

#[tokio::test]
async fn test_never_parsing_leaves_no_candidate() {
    let client = ScriptedClient::new(vec![Ok("not json".into())]);
    let policy = RetryPolicy::immediate(0, 1);
    let agent = GenerationAgent::new(&client, &policy);

    let err = agent
        .generate(&competency(), &GenerationContext::first())
        .await
        .unwrap_err();

    assert_eq!(client.calls(), 2);
    assert!(matches!(
        err,
        GenerationError::MalformedOutput {
            last_candidate: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_transport_failures_are_unavailable() {
    let client = ScriptedClient::new(vec![Err(ModelError::Status {
        status: 503,
        body: "overloaded".into(),
    })]);
    let policy = RetryPolicy::immediate(3, 2);
    let agent = GenerationAgent::new(&client, &policy);

    let err = agent
        .generate(&competency(), &GenerationContext::first())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Unavailable);
    assert_eq!(client.calls(), 4);
}

#[tokio::test]
async fn test_findings_reach_the_prompt() {
    let client = ScriptedClient::new(vec![Ok(valid_reply())]);
    let policy = RetryPolicy::immediate(0, 0);
    let agent = GenerationAgent::new(&client, &policy).with_temperature(0.2);
    let context = GenerationContext::regenerate(
        1,
        vec!["[NI #1] indicator 'understands VLANs' is not observable".into()],
    );

    agent.generate(&competency(), &context).await.unwrap();

    assert!(client
        .prompt(0)
        .contains("indicator 'understands VLANs' is not observable"));
}
