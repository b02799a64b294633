//! # Reference Pipeline
//!
//! Website generation as four steps:
//!
//! | step                      | service                | policy                         |
//! |---------------------------|------------------------|--------------------------------|
//! | `template_recommendation` | `template_recommender` | required                       |
//! | `context_retrieval`       | `rag_service`          | optional, falls back to `[]`   |
//! | `content_generation`      | `content_generator`    | required                       |
//! | `design_validation`       | `design_rules`         | optional, falls back to passed |
//!
//! Context retrieval is skipped when the request already carries context.

use super::pipeline::{Pipeline, PipelineStep, StepContext, StepPlan};
use super::types::AssembledResult;
use crate::config::PipelineConfig;
use crate::constants::{services, steps};
use crate::error::Result;
use serde_json::{json, Value};

/// Build the reference pipeline with configured overrides applied
pub fn reference_pipeline(config: &PipelineConfig) -> Result<Pipeline> {
    let top_k = config.rag_top_k;
    let default_template = config.default_template_id.clone();
    let content_template = default_template.clone();
    let design_template = default_template;

    let template_recommendation = PipelineStep::new(
        steps::TEMPLATE_RECOMMENDATION,
        services::TEMPLATE_RECOMMENDER,
        "/recommend-templates",
        0.3,
        |ctx: &StepContext<'_>| {
            Ok(StepPlan::Invoke(json!({
                "sessionId": ctx.input.session_id,
                "processed_input": ctx.input.processed_input,
            })))
        },
    );

    let context_retrieval = PipelineStep::new(
        steps::CONTEXT_RETRIEVAL,
        services::RAG_SERVICE,
        "/query",
        0.5,
        move |ctx: &StepContext<'_>| {
            if let Some(context) = ctx.input.provided_rag_context() {
                return Ok(StepPlan::Skip(Value::Array(context.to_vec())));
            }
            let query = ctx
                .input
                .processed_input
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(StepPlan::Invoke(json!({
                "query": query,
                "top_k": top_k,
                "sessionId": ctx.input.session_id,
            })))
        },
    )
    .optional(json!([]))
    .with_output_extractor(|response| {
        response
            .get("results")
            .filter(|r| r.is_array())
            .cloned()
            .unwrap_or_else(|| json!([]))
    });

    let content_generation = PipelineStep::new(
        steps::CONTENT_GENERATION,
        services::CONTENT_GENERATOR,
        "/generate-content",
        0.8,
        move |ctx: &StepContext<'_>| {
            Ok(StepPlan::Invoke(json!({
                "sessionId": ctx.input.session_id,
                "templateId": selected_template_id(ctx, &content_template),
                "processed_input": ctx.input.processed_input,
                "rag_context": context_or_empty(ctx),
                "branding": ctx.input.branding_value(),
            })))
        },
    );

    let design_validation = PipelineStep::new(
        steps::DESIGN_VALIDATION,
        services::DESIGN_RULES,
        "/validate-design",
        0.9,
        move |ctx: &StepContext<'_>| {
            Ok(StepPlan::Invoke(json!({
                "template_id": selected_template_id(ctx, &design_template),
                "generated_content": ctx.output(steps::CONTENT_GENERATION),
                "branding": ctx.input.branding_value(),
            })))
        },
    )
    .optional(json!({"passed": true, "issues": []}));

    let default_template_id = config.default_template_id.clone();
    Pipeline::new(vec![
        template_recommendation,
        context_retrieval,
        content_generation,
        design_validation,
    ])?
    .with_assembler(move |ctx| Ok(assemble_website(ctx, &default_template_id)))
    .apply_overrides(&config.steps)
}

/// `recommendations[0].templateId` from the recommender, or the configured default
pub fn selected_template_id(ctx: &StepContext<'_>, default_template_id: &str) -> String {
    ctx.output(steps::TEMPLATE_RECOMMENDATION)
        .get("recommendations")
        .and_then(|r| r.get(0))
        .and_then(|first| first.get("templateId"))
        .and_then(Value::as_str)
        .unwrap_or(default_template_id)
        .to_string()
}

fn context_or_empty(ctx: &StepContext<'_>) -> Value {
    match ctx.output(steps::CONTEXT_RETRIEVAL) {
        Value::Null => json!([]),
        other => other.clone(),
    }
}

fn assemble_website(ctx: &StepContext<'_>, default_template_id: &str) -> AssembledResult {
    let content = ctx.output(steps::CONTENT_GENERATION);
    let pages = content
        .get("pages")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    AssembledResult {
        website_generation_data: Some(json!({
            "template": ctx.output(steps::TEMPLATE_RECOMMENDATION),
            "template_id": selected_template_id(ctx, default_template_id),
            "design_validation": ctx.output(steps::DESIGN_VALIDATION),
        })),
        pages: Some(pages),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepOverride;
    use crate::orchestration::OrchestrationInput;
    use serde_json::Map;
    use std::collections::HashMap;

    fn input() -> OrchestrationInput {
        let mut processed = Map::new();
        processed.insert("description".to_string(), json!("artisan bakery"));
        OrchestrationInput::new("session-7", processed)
    }

    fn plan_for(pipeline: &Pipeline, step: &str, input: &OrchestrationInput, outputs: &HashMap<String, Value>) -> StepPlan {
        let ctx = StepContext { input, outputs };
        pipeline.step(step).unwrap().plan(&ctx).unwrap()
    }

    #[test]
    fn test_reference_steps_and_policies() {
        let pipeline = reference_pipeline(&PipelineConfig::default()).unwrap();
        let summaries = pipeline.summaries();
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "template_recommendation",
                "context_retrieval",
                "content_generation",
                "design_validation"
            ]
        );
        let required: Vec<bool> = summaries.iter().map(|s| s.required).collect();
        assert_eq!(required, vec![true, false, true, false]);
        assert_eq!(
            pipeline.services(),
            vec!["template_recommender", "rag_service", "content_generator", "design_rules"]
        );
    }

    #[test]
    fn test_context_retrieval_payload_and_skip() {
        let pipeline = reference_pipeline(&PipelineConfig::default()).unwrap();
        let outputs = HashMap::new();

        let plan = plan_for(&pipeline, "context_retrieval", &input(), &outputs);
        assert_eq!(
            plan,
            StepPlan::Invoke(json!({"query": "artisan bakery", "top_k": 5, "sessionId": "session-7"}))
        );

        let with_context = input().with_rag_context(vec![json!({"text": "cached"})]);
        let plan = plan_for(&pipeline, "context_retrieval", &with_context, &outputs);
        assert_eq!(plan, StepPlan::Skip(json!([{"text": "cached"}])));
    }

    #[test]
    fn test_content_generation_uses_top_template_and_context() {
        let pipeline = reference_pipeline(&PipelineConfig::default()).unwrap();
        let outputs = HashMap::from([
            (
                "template_recommendation".to_string(),
                json!({"recommendations": [{"templateId": "tpl-modern"}, {"templateId": "tpl-classic"}]}),
            ),
            ("context_retrieval".to_string(), json!(["doc-1"])),
        ]);

        let StepPlan::Invoke(payload) = plan_for(&pipeline, "content_generation", &input(), &outputs) else {
            panic!("content generation should invoke");
        };
        assert_eq!(payload["templateId"], "tpl-modern");
        assert_eq!(payload["rag_context"], json!(["doc-1"]));
        assert_eq!(payload["branding"], Value::Null);
    }

    #[test]
    fn test_default_template_when_no_recommendation() {
        let config = PipelineConfig {
            default_template_id: "fallback-tpl".to_string(),
            ..Default::default()
        };
        let pipeline = reference_pipeline(&config).unwrap();
        let outputs = HashMap::from([("template_recommendation".to_string(), json!({"recommendations": []}))]);

        let StepPlan::Invoke(payload) = plan_for(&pipeline, "design_validation", &input(), &outputs) else {
            panic!("design validation should invoke");
        };
        assert_eq!(payload["template_id"], "fallback-tpl");
    }

    #[test]
    fn test_rag_results_extracted() {
        let pipeline = reference_pipeline(&PipelineConfig::default()).unwrap();
        let step = pipeline.step("context_retrieval").unwrap();
        assert_eq!(step.extract_output(json!({"results": ["a"]})), json!(["a"]));
        assert_eq!(step.extract_output(json!({"results": "bad"})), json!([]));
    }

    #[test]
    fn test_assembled_result_shape() {
        let pipeline = reference_pipeline(&PipelineConfig::default()).unwrap();
        let input = input();
        let outputs = HashMap::from([
            ("template_recommendation".to_string(), json!({"recommendations": [{"templateId": "t1"}]})),
            ("content_generation".to_string(), json!({"pages": [{"slug": "home"}]})),
            ("design_validation".to_string(), json!({"passed": true, "issues": []})),
        ]);
        let assembled = pipeline
            .assemble(&StepContext { input: &input, outputs: &outputs })
            .unwrap();

        assert_eq!(assembled.pages, Some(vec![json!({"slug": "home"})]));
        let data = assembled.website_generation_data.unwrap();
        assert_eq!(data["template_id"], "t1");
        assert_eq!(data["design_validation"]["passed"], true);
    }

    #[test]
    fn test_overrides_flow_through() {
        let config = PipelineConfig {
            steps: HashMap::from([(
                "design_validation".to_string(),
                StepOverride {
                    required: Some(true),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        let pipeline = reference_pipeline(&config).unwrap();
        assert!(pipeline.step("design_validation").unwrap().required);
    }
}
