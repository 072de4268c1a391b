//! Rendering of import directives into Terraform artifacts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    /// Declarative `import {}` blocks (Terraform >= 1.5).
    #[default]
    Blocks,
    /// `terraform import` invocations.
    Cli,
}

impl ImportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImportFormat::Blocks => "tf",
            ImportFormat::Cli => "sh",
        }
    }
}

pub fn render_import_block(address: &str, id: &str) -> String {
    format!("import {{\n  to = {}\n  id = \"{}\"\n}}", address, hcl_escape(id))
}

pub fn render_import_command(address: &str, id: &str) -> String {
    format!(
        "terraform import {} {}",
        shell_quote(address),
        shell_quote(id)
    )
}

/// Renders `(address, id)` pairs in the given order.
pub fn render<'a, I>(entries: I, format: ImportFormat) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    match format {
        ImportFormat::Blocks => {
            let blocks: Vec<String> = entries
                .into_iter()
                .map(|(address, id)| render_import_block(address, id))
                .collect();
            let mut out = blocks.join("\n\n");
            out.push('\n');
            out
        }
        ImportFormat::Cli => {
            let mut out = String::from("#!/bin/sh\nset -e\n\n");
            for (address, id) in entries {
                out.push_str(&render_import_command(address, id));
                out.push('\n');
            }
            out
        }
    }
}

fn hcl_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                escaped.push(c);
                escaped.push(c);
            }
            other => escaped.push(other),
        }
    }
    escaped
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
