use markdown::{CompileOptions, Constructs, Options, ParseOptions};
use serde::Deserialize;
use thiserror::Error;

use crate::content::parsing_utils::escape_underscores;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Extensions applied to every post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// `_` and `__` never turn into emphasis.
    pub code_friendly: bool,
    /// `$inline$` and `$$` blocks are kept for a client side LaTeX renderer.
    pub math: bool,
    pub allow_html: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            code_friendly: true,
            math: true,
            allow_html: false,
        }
    }
}

pub struct MarkdownRenderer {
    render_options: RenderOptions,
}

impl MarkdownRenderer {
    pub fn new(render_options: RenderOptions) -> Self {
        MarkdownRenderer { render_options }
    }

    pub fn render(&self, md_text: &str) -> Result<String, RenderError> {
        let buf = if self.render_options.code_friendly {
            escape_underscores(md_text)
        } else {
            md_text.to_string()
        };

        match markdown::to_html_with_options(buf.as_str(), &self.options()) {
            Ok(x) => Ok(x),
            Err(e) => Err(RenderError(e.reason.to_string())),
        }
    }

    // markdown::Options is not Sync, so it is built per call
    fn options(&self) -> Options {
        let constructs = Constructs {
            math_flow: self.render_options.math,
            math_text: self.render_options.math,
            ..Constructs::gfm()
        };

        Options {
            parse: ParseOptions {
                constructs,
                ..ParseOptions::gfm()
            },
            compile: CompileOptions {
                allow_dangerous_html: self.render_options.allow_html,
                ..CompileOptions::gfm()
            },
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        MarkdownRenderer::new(RenderOptions::default())
    }
}
