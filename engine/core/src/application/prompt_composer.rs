// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Composer
//!
//! Builds the instruction text handed to the reasoning service for one piece
//! of evidence.
//!
//! # Layering
//!
//! Layers are appended in a fixed order. A later layer overrides an earlier
//! one on conflict:
//!
//! 1. Base assessment (always present)
//! 2. Industry context and task description
//! 3. Authority: pack standards, the profile's numbered rules, then retrieved
//!    reference passages labelled as authoritative
//! 4. Strictness directive
//! 5. Output format
//!
//! Text evidence inserts its content between the strictness directive and the
//! output format so the JSON contract is always the final instruction.
//!
//! Composition never fails from the caller's point of view. A render error is
//! logged and the zero-config prompt is returned instead.

use crate::domain::catalog::Standard;
use crate::domain::finding::EvidenceAnalysis;
use crate::domain::profile::{StandardsProfile, MAX_RECOMMENDED_DOCUMENTS, MAX_RECOMMENDED_RULES};
use crate::domain::retrieval::ReferenceChunk;
use crate::infrastructure::prompt_template_engine::PromptTemplateEngine;
use serde::Serialize;
use tracing::{debug, error};

const ANALYSIS_TEMPLATE: &str = "analysis";
const SUMMARY_TEMPLATE: &str = "summary";

const ANALYSIS_PROMPT: &str = r#"You are evaluating {{subject}} taken during {{task_description}} in a {{industry}} setting at {{location}}.

Your role is to act as a {{mode}} verification system that checks whether work is being done correctly, consistently, and according to standards.

Analyze the {{noun}} to identify:
- What is present and what might be missing
- Conditions that may pose safety or quality risks
- Deviations from expected standards
- Items that appear out of place or improperly handled

**Base {{assessment}} Assessment:**
Use your {{mode}} understanding to identify:
- Objects, their condition, and organization
- Cleanliness and maintenance levels
- Safety hazards or risks
- Damage, contamination, or deterioration
- Common-sense correctness for the context

**Industry Context:**
Apply {{industry}} industry best practices: {{industry_practices}}
{{#if standards}}

**Protocol Standards ({{pack_name}}):**
Evaluate against these regulatory standards and cite the code in document_reference when a finding relates to one:
{{#each standards}}
- {{code}}: {{title}} ({{severity}})
{{/each}}
{{/if}}
{{#if rules}}

**Specific Requirements:**
Check for compliance with these specific rules:
{{#each rules}}
{{this}}
{{/each}}
{{/if}}
{{#if references}}

**AUTHORITATIVE DOCUMENTATION (OVERRIDE GENERAL REASONING):**
The following documentation provides specific requirements that MUST be followed:
If there is any conflict between general practices and these documents, defer to the documents.

{{#each references}}
Document {{number}}:
{{text}}
{{#if source}}
Source: {{source}}
{{/if}}

{{/each}}
{{/if}}

**Strictness Level:**
{{strictness_guidance}}
{{#if content}}

**Content to Analyze:**
{{content}}
{{/if}}

**Output Format:**

Return your analysis as a structured JSON object with the following format:

{
  "findings": [
    {
      "type": "issue" | "confirmation",
      "severity": "critical" | "major" | "minor" | "info",
      "category": "category name",
      "description": "Clear description of the finding",
      "confidence": 0.0 to 1.0,
      "location": "specific area in the {{noun}}",
      "recommendation": "what should be done",
      "document_reference": "citation if from documentation"
    }
  ],
  "overall_assessment": {
    "compliant": true | false,
    "score": 0-100,
    "summary": "brief overall summary"
  }
}

Guidelines:
- Be specific and actionable in descriptions
- Use confidence scores honestly (lower for uncertain findings)
- Include both issues AND confirmations of good practices
- Reference documentation when findings are based on uploaded documents
- Keep language professional but clear (no jargon unless from documentation)
- Focus on what can be observed in the {{noun}}"#;

const SUMMARY_PROMPT: &str = r#"You have analyzed {{count}} evidence items from a {{industry}} {{task}}.

Here are the individual findings:
{{results}}

Please provide:
1. An executive summary of key issues found
2. Overall compliance assessment
3. Priority recommendations
4. Any patterns or recurring issues

Keep the summary concise, actionable, and focused on the most important findings."#;

/// Which analysis path the prompt is for.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceMode {
    Image,
    /// Text, document or rendered checklist content (one chunk)
    Text(String),
}

/// Per-request context that is not part of the profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptMetadata {
    pub location: Option<String>,
    pub pack_name: Option<String>,
    /// Effective standards of the requested protocol pack
    pub standards: Vec<Standard>,
}

#[derive(Serialize)]
struct StandardLine<'a> {
    code: &'a str,
    title: &'a str,
    severity: &'static str,
}

#[derive(Serialize)]
struct ReferenceLine<'a> {
    number: usize,
    text: &'a str,
    source: Option<&'a str>,
}

#[derive(Serialize)]
struct AnalysisContext<'a> {
    subject: &'static str,
    noun: &'static str,
    mode: &'static str,
    assessment: &'static str,
    task_description: &'static str,
    industry: &'static str,
    industry_practices: &'static str,
    location: &'a str,
    pack_name: &'a str,
    standards: Vec<StandardLine<'a>>,
    rules: Vec<String>,
    references: Vec<ReferenceLine<'a>>,
    strictness_guidance: &'static str,
    content: Option<&'a str>,
}

#[derive(Serialize)]
struct SummaryContext {
    count: usize,
    industry: &'static str,
    task: &'static str,
    results: String,
}

pub struct PromptComposer {
    engine: PromptTemplateEngine,
}

impl PromptComposer {
    pub fn new() -> Self {
        let mut engine = PromptTemplateEngine::new();
        // Both templates are compile-time constants covered by tests.
        for (name, template) in [
            (ANALYSIS_TEMPLATE, ANALYSIS_PROMPT),
            (SUMMARY_TEMPLATE, SUMMARY_PROMPT),
        ] {
            if let Err(e) = engine.register(name, template) {
                error!("Failed to register prompt template {}: {:#}", name, e);
            }
        }
        Self { engine }
    }

    /// Compose the analysis prompt for one evidence item (or one text chunk).
    pub fn compose(
        &self,
        profile: &StandardsProfile,
        references: &[ReferenceChunk],
        metadata: &PromptMetadata,
        mode: &EvidenceMode,
    ) -> String {
        let industry = profile.industry();
        let (subject, noun, visual, content) = match mode {
            EvidenceMode::Image => ("an image", "image", true, None),
            EvidenceMode::Text(content) => ("text content", "content", false, Some(content.as_str())),
        };

        let context = AnalysisContext {
            subject,
            noun,
            mode: if visual { "visual" } else { "textual" },
            assessment: if visual { "Visual" } else { "Content" },
            task_description: profile.task_type().description(),
            industry: industry.as_str(),
            industry_practices: industry.best_practices(),
            location: metadata.location.as_deref().unwrap_or("unspecified location"),
            pack_name: metadata.pack_name.as_deref().unwrap_or("protocol pack"),
            standards: metadata
                .standards
                .iter()
                .map(|s| StandardLine {
                    code: &s.code,
                    title: &s.title,
                    severity: s.severity.as_str(),
                })
                .collect(),
            rules: profile
                .plain_language_rules
                .iter()
                .enumerate()
                .map(|(i, rule)| format!("{}. {}", i + 1, rule))
                .collect(),
            references: references
                .iter()
                .enumerate()
                .map(|(i, chunk)| ReferenceLine {
                    number: i + 1,
                    text: &chunk.text,
                    source: chunk.source.as_deref(),
                })
                .collect(),
            strictness_guidance: profile.strictness.guidance(),
            content,
        };

        match self.engine.render(ANALYSIS_TEMPLATE, &context) {
            Ok(prompt) => {
                debug!(
                    profile_id = %profile.id,
                    chars = prompt.len(),
                    references = references.len(),
                    "Composed analysis prompt"
                );
                prompt
            }
            Err(e) => {
                error!(profile_id = %profile.id, "Prompt composition failed, using zero-config prompt: {:#}", e);
                zero_config_prompt(metadata.location.as_deref(), content)
            }
        }
    }

    /// Executive-summary prompt over a set of per-item analyses.
    pub fn compose_summary(&self, results: &[EvidenceAnalysis], profile: &StandardsProfile) -> String {
        let context = SummaryContext {
            count: results.len(),
            industry: profile.industry().as_str(),
            task: profile.task_type().as_str(),
            results: serde_json::to_string_pretty(results).unwrap_or_else(|_| "[]".to_string()),
        };
        self.engine
            .render(SUMMARY_TEMPLATE, &context)
            .unwrap_or_else(|e| {
                error!("Summary prompt composition failed: {:#}", e);
                format!(
                    "Summarize the key issues, overall compliance and priority recommendations across these {} evidence analyses:\n{}",
                    context.count, context.results
                )
            })
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-fatal problems with composition inputs.
pub fn validate_inputs(profile: Option<&StandardsProfile>, references: &[ReferenceChunk]) -> Vec<String> {
    let mut warnings = Vec::new();
    match profile {
        None => warnings.push("No profile provided - using zero-config mode".to_string()),
        Some(profile) => {
            if profile.industry.is_none() {
                warnings.push("Profile missing industry - defaulting to general".to_string());
            }
            if profile.task_type.is_none() {
                warnings.push("Profile missing task_type - defaulting to general".to_string());
            }
            if profile.plain_language_rules.len() > MAX_RECOMMENDED_RULES {
                warnings.push(format!(
                    "Profile has {} rules (max recommended: {}) - may exceed token limits",
                    profile.plain_language_rules.len(),
                    MAX_RECOMMENDED_RULES
                ));
            }
        }
    }
    if references.len() > MAX_RECOMMENDED_DOCUMENTS {
        warnings.push(format!(
            "{} document chunks provided (max recommended: {}) - may exceed token limits",
            references.len(),
            MAX_RECOMMENDED_DOCUMENTS
        ));
    }
    warnings
}

/// Last-resort prompt built without the template engine.
pub fn zero_config_prompt(location: Option<&str>, content: Option<&str>) -> String {
    let location = location.unwrap_or("this location");
    let (subject, noun) = match content {
        Some(_) => ("text content produced", "content"),
        None => ("an image taken", "image"),
    };
    let mut prompt = format!(
        r#"You are evaluating {subject} during normal business operations at {location}.

**Your Task:**
Analyze this {noun} to verify that work is being done correctly and according to common standards.

**What to Check:**
- Safety: Are there any obvious safety hazards?
- Quality: Does the work appear complete and done properly?
- Organization: Is the area clean and organized?
- Damage: Are there any damaged items or equipment?
- Anomalies: Is there anything that looks out of place or incorrect?

**Approach:**
- Apply common sense and general best practices
- Flag only obvious issues that most people would agree are problems
- Avoid assumptions about specific industry requirements unless obvious
- Be conservative - when in doubt, note it as "informational" rather than a critical issue
"#
    );
    if let Some(content) = content {
        prompt.push_str("\n**Content to Analyze:**\n");
        prompt.push_str(content);
        prompt.push('\n');
    }
    prompt.push_str(
        r#"
**Output Format:**
Return a structured JSON with:
{
  "findings": [
    {
      "type": "issue" | "confirmation",
      "severity": "critical" | "major" | "minor" | "info",
      "category": "general category",
      "description": "what you observe",
      "confidence": 0.0 to 1.0,
      "recommendation": "suggested action"
    }
  ],
  "overall_assessment": {
    "compliant": true | false,
    "score": 0-100,
    "summary": "brief summary"
  }
}

Focus on being helpful without being overly critical. This is a safety net, not a replacement for human judgment."#,
    );
    prompt
}
