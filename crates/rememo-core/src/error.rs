use thiserror::Error;

/// Failures surfaced by a re-evaluation pass. The pass aborts and the last
/// committed output stays visible; nothing is swallowed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("memo cell `{cell}` failed to compute: {message}")]
    Compute { cell: String, message: String },

    #[error("node `{node}` failed to render: {message}")]
    Render { node: String, message: String },

    #[error("no state holder named `{name}` in this scope")]
    UnknownState { name: String },

    #[error("no memo cell named `{name}` in this scope")]
    UnknownCell { name: String },
}

impl RenderError {
    pub fn compute(cell: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Compute {
            cell: cell.into(),
            message: message.into(),
        }
    }

    pub fn render(node: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Render {
            node: node.into(),
            message: message.into(),
        }
    }
}
