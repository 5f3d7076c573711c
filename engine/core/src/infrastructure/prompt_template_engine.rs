// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Handlebars wrapper used by the prompt composer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Render named, pre-registered templates into final prompt text
//!
//! Output is plain text for a model, not HTML, so escaping is disabled and
//! missing variables render as empty strings.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Compile and register a named template.
    pub fn register(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .with_context(|| format!("Invalid Handlebars template '{}'", name))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }

    /// Render a registered template
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .with_context(|| format!("Failed to render prompt template '{}'", name))
    }

    /// Render an ad-hoc template string
    pub fn render_template<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render prompt template")
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

impl Default for PromptTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
