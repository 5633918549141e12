//! Reasoning loop (agent controller)
//!
//! A bounded Thought → Action → Observation state machine over the tool
//! registry, plus a second, tool-free rendering pass that turns the final
//! technical answer into a short spoken reply.

use crate::error::AgentError;
use crate::models::{AgentStep, ToolInput};
use crate::tools::ToolRegistry;
use crate::Result;
use parser::OracleDirective;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod gemini;
pub mod parser;

pub use gemini::GeminiOracle;

/// Hard ceiling on THINKING iterations per turn
pub const MAX_REASONING_ITERATIONS: u32 = 8;

const AGENT_INSTRUCTIONS: &str = "\
You are Krishi-Mitra, an intelligent agricultural finance assistant for Indian farmers.
You speak in a simple, direct, and encouraging manner.
Your goal is to help a farmer apply for a loan.

To use a tool, please use the following format:

Thought: Do I need to use a tool? Yes
Action: the action to take, should be one of the listed tool names
Action Input: the input to the action as a JSON object

When you have a response to say to the Human, or if you do not need to use a tool, you MUST use the format:

Thought: Do I need to use a tool? No
Final Answer: [your response here]";

const HUMANIZER_INSTRUCTIONS: &str = "\
You are Krishi-Mitra. Convert the technical response below into a warm, natural spoken response for an Indian farmer (in English/Hinglish).
Keep it short (under 2 sentences) to reduce TTS latency.";

/// Trait for the external reasoning oracle: (instructions, prompt) → text.
#[async_trait::async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn complete(&self, instructions: &str, prompt: &str) -> Result<String>;
}

/// Scripted oracle for development & testing.
/// Keeps the loop exercisable without an LLM dependency.
pub struct MockOracle {
    responses: Mutex<VecDeque<String>>,
}

impl MockOracle {
    pub fn scripted<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait::async_trait]
impl ReasoningOracle for MockOracle {
    async fn complete(&self, _instructions: &str, _prompt: &str) -> Result<String> {
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .ok_or_else(|| AgentError::LlmError("Mock oracle script exhausted".to_string()))
    }
}

/// Output of a completed reasoning run
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    /// Technical final answer, before the humanizer pass
    pub final_answer: String,
    pub steps: Vec<AgentStep>,
    pub iterations: u32,
}

/// The bounded ReAct loop
pub struct ReasoningLoop {
    oracle: Arc<dyn ReasoningOracle>,
    registry: ToolRegistry,
    max_iterations: u32,
}

impl ReasoningLoop {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, registry: ToolRegistry) -> Self {
        Self {
            oracle,
            registry,
            max_iterations: MAX_REASONING_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run the loop until the oracle emits a Final Answer or the iteration
    /// bound is hit.
    pub async fn run(&self, input: &str, chat_history: &str) -> Result<ReasoningOutcome> {
        let mut steps: Vec<AgentStep> = Vec::new();

        for iteration in 1..=self.max_iterations {
            let prompt = self.render_prompt(input, chat_history, &steps);

            debug!(iteration, "Reasoning: thinking");
            let raw = self.oracle.complete(AGENT_INSTRUCTIONS, &prompt).await?;

            match parser::parse_directive(&raw)? {
                OracleDirective::FinalAnswer(answer) => {
                    info!(iterations = iteration, "Reasoning: final answer");
                    return Ok(ReasoningOutcome {
                        final_answer: answer,
                        steps,
                        iterations: iteration,
                    });
                }
                OracleDirective::Action { tool, input: tool_params } => {
                    debug!(iteration, tool = %tool, "Reasoning: acting");
                    let observation = self.observe(&tool, &tool_params).await?;

                    debug!(iteration, observation = %observation, "Reasoning: observing");
                    steps.push(AgentStep {
                        iteration,
                        tool_name: tool,
                        tool_input: tool_params,
                        observation,
                    });
                }
            }
        }

        Err(AgentError::ReasoningLimitExceeded(format!(
            "No final answer after {} iterations",
            self.max_iterations
        )))
    }

    /// Execute one tool call and render its observation. Unknown tools and
    /// malformed inputs become error observations; anything else aborts.
    async fn observe(&self, tool: &str, params: &serde_json::Value) -> Result<String> {
        let Some(handler) = self.registry.get(tool) else {
            warn!(tool = %tool, "Unknown tool requested by oracle");
            let mut names = self.registry.list();
            names.sort();
            return Ok(format!(
                "Error: unknown tool '{}'. Available tools: {}",
                tool,
                names.join(", ")
            ));
        };

        let tool_input = ToolInput {
            tool_name: tool.to_string(),
            parameters: params.clone(),
        };

        match handler.execute(&tool_input).await {
            Ok(output) => Ok(serde_json::to_string(&output.data)?),
            Err(AgentError::InvalidToolInput(msg)) => {
                warn!(tool = %tool, error = %msg, "Tool rejected its input");
                Ok(format!("Error: invalid tool input: {}", msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Convert the technical answer into a short spoken reply.
    /// Pure text-to-text pass; no tools, no loop.
    pub async fn humanize(&self, technical_answer: &str) -> Result<String> {
        let prompt = format!("Technical Response: {}", technical_answer);
        let spoken = self.oracle.complete(HUMANIZER_INSTRUCTIONS, &prompt).await?;
        Ok(spoken.trim().to_string())
    }

    fn render_prompt(&self, input: &str, chat_history: &str, steps: &[AgentStep]) -> String {
        let mut names = self.registry.list();
        names.sort();

        format!(
            "You have access to the following tools:\n{}\n\nTool names: {}\n\nConversation History:\n{}\n\nUser Input: {}\nAgent Scratchpad:\n{}",
            self.registry.render_catalog(),
            names.join(", "),
            chat_history,
            input,
            render_scratchpad(steps),
        )
    }
}

fn render_scratchpad(steps: &[AgentStep]) -> String {
    let mut scratchpad = String::new();

    for step in steps {
        scratchpad.push_str(&format!(
            "Action: {}\nAction Input: {}\nObservation: {}\n",
            step.tool_name, step.tool_input, step.observation
        ));
    }

    scratchpad
}
