use std::io::{self, Write};
use std::time::{Duration, Instant};

use futures::StreamExt;
use mantis_core::{ChatMessage, LLMProvider};
use mantis_providers::{AVAILABLE_MODELS, DEFAULT_MODEL, supports_thinking};
use tracing::warn;

use super::init_common_components;

/// Print the model catalog.
#[derive(Debug, Clone, Copy)]
pub struct ModelsStrategy;

impl super::CommandStrategy for ModelsStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        println!("Available models:");
        for (i, model) in AVAILABLE_MODELS.iter().enumerate() {
            let default = if *model == DEFAULT_MODEL {
                " (default)"
            } else {
                ""
            };
            let thinking = if supports_thinking(model) {
                " [thinking]"
            } else {
                ""
            };
            println!("  {}. {model}{thinking}{default}", i + 1);
        }
        Ok(())
    }
}

/// Input parameters for the `test-models` command strategy.
#[derive(Debug, Clone)]
pub struct TestModelsInput {
    pub prompt: String,
}

/// Send one prompt to every catalog model and report which ones answered.
#[derive(Debug, Clone, Copy)]
pub struct TestModelsStrategy;

impl super::CommandStrategy for TestModelsStrategy {
    type Input = TestModelsInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components()?;

        let results = run_sweep(&common.provider, &input.prompt, &AVAILABLE_MODELS, |chunk| {
            print!("{chunk}");
            let _ = io::stdout().flush();
        })
        .await;

        println!("\n=== Summary ===");
        for result in &results {
            match &result.outcome {
                Ok(chars) => println!(
                    "✅ {}: {chars} chars in {:.1}s",
                    result.model,
                    result.elapsed.as_secs_f32()
                ),
                Err(e) => println!("❌ {}: {e}", result.model),
            }
        }

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        println!("{} of {} models answered.", results.len() - failed, results.len());
        Ok(())
    }
}

#[derive(Debug)]
pub struct ModelResult {
    pub model: String,
    /// Reply length in characters, or the failure message
    pub outcome: Result<usize, String>,
    pub elapsed: Duration,
}

/// Stream `prompt` through each model in turn. A failing model never stops
/// the sweep.
pub async fn run_sweep<P, F>(
    provider: &P,
    prompt: &str,
    models: &[&str],
    mut on_chunk: F,
) -> Vec<ModelResult>
where
    P: LLMProvider + ?Sized,
    F: FnMut(&str),
{
    let messages = [ChatMessage::user(prompt)];
    let mut results = Vec::with_capacity(models.len());

    for model in models {
        println!("\n=== {model} ===");
        let started = Instant::now();
        let outcome = stream_reply(provider, &messages, model, &mut on_chunk).await;
        if let Err(e) = &outcome {
            warn!("Model {model} failed: {e}");
        }

        results.push(ModelResult {
            model: (*model).to_string(),
            outcome,
            elapsed: started.elapsed(),
        });
    }
    results
}

async fn stream_reply<P, F>(
    provider: &P,
    messages: &[ChatMessage],
    model: &str,
    on_chunk: &mut F,
) -> Result<usize, String>
where
    P: LLMProvider + ?Sized,
    F: FnMut(&str),
{
    let mut chunks = provider
        .chat_stream(messages, model)
        .await
        .map_err(|e| e.to_string())?;

    let mut chars = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        chars += chunk.chars().count();
        on_chunk(&chunk);
    }

    if chars == 0 {
        return Err("empty response".to_string());
    }
    Ok(chars)
}
