//! LLM-backed refiner.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::llm::{complete_json, CompletionRequest, LlmClient};
use super::{PlanRequest, Refinement, RefinementError, RefinementRequest, Refiner, ResearchPlan};

const REFINE_SYSTEM_PROMPT: &str = r#"You are a research analyst reviewing web pages gathered for a research task.
Judge how well the gathered material covers the research goals and propose what to look at next.

Respond with a single JSON object and nothing else:
{"analysis": "<what was learned and what is missing>",
 "improvedTargets": ["<search query, domain or URL>", ...],
 "extractionFocus": "<what to pay attention to in the next pages>"}

Rules:
- improvedTargets may be free-text search queries, bare domains (example.com), site: queries or full URLs.
- Propose at most 5 targets. Never repeat a target that was already searched.
- Return an empty improvedTargets list when the goals are sufficiently covered."#;

const PLAN_SYSTEM_PROMPT: &str = r#"You are a research planner. Turn a research question into concrete starting points.

Respond with a single JSON object and nothing else:
{"searchTargets": ["<search query, domain or URL>", ...],
 "researchGoals": ["<what the research must find out>", ...]}

Propose between 2 and 5 search targets and between 1 and 5 goals."#;

/// Refiner that asks an LLM to review rounds and plan research.
pub struct LlmRefiner {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmRefiner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

fn build_refine_prompt(request: &RefinementRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Research round: {}", request.iteration);
    if let Some(context) = &request.context {
        let _ = writeln!(prompt, "Domain context: {}", context);
    }

    prompt.push_str("\nResearch goals:\n");
    if request.research_goals.is_empty() {
        prompt.push_str("- (none given, infer them from the searched targets)\n");
    }
    for goal in &request.research_goals {
        let _ = writeln!(prompt, "- {}", goal);
    }

    prompt.push_str("\nTargets searched this round:\n");
    for target in &request.search_targets {
        let _ = writeln!(prompt, "- {}", target);
    }

    let _ = writeln!(
        prompt,
        "\nGathered pages ({} total):",
        request.current_results.len()
    );
    if request.current_results.is_empty() {
        prompt.push_str("(no pages could be fetched for these targets)\n");
    }
    for (i, digest) in request.current_results.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "\n[{}] {} (from \"{}\"){}",
            i + 1,
            digest.url,
            digest.source_target,
            digest
                .title
                .as_deref()
                .map(|t| format!(" - {}", t))
                .unwrap_or_default()
        );
        let _ = writeln!(prompt, "{}", digest.excerpt);
    }

    prompt
}

fn build_plan_prompt(request: &PlanRequest) -> String {
    match &request.context {
        Some(context) => format!(
            "Research question: {}\nDomain context: {}",
            request.question, context
        ),
        None => format!("Research question: {}", request.question),
    }
}

#[async_trait]
impl Refiner for LlmRefiner {
    fn name(&self) -> &str {
        "llm"
    }

    async fn refine(&self, request: &RefinementRequest) -> Result<Refinement, RefinementError> {
        let completion = CompletionRequest::new(build_refine_prompt(request))
            .with_system(REFINE_SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens);

        let (refinement, usage): (Refinement, _) =
            complete_json(self.client.as_ref(), completion).await?;
        debug!(
            provider = self.client.provider(),
            model = self.client.model(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            improved_targets = refinement.improved_targets.len(),
            "Refinement complete"
        );
        Ok(refinement.normalized())
    }

    async fn plan(&self, request: &PlanRequest) -> Result<ResearchPlan, RefinementError> {
        let completion = CompletionRequest::new(build_plan_prompt(request))
            .with_system(PLAN_SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens);

        let (plan, _usage): (ResearchPlan, _) =
            complete_json(self.client.as_ref(), completion).await?;
        if plan.search_targets.is_empty() {
            return Err(RefinementError::InvalidResponse(
                "plan contains no search targets".to_string(),
            ));
        }
        Ok(plan)
    }
}
