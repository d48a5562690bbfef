/// Render output: an opaque, structurally comparable tree. Painting it to a
/// screen or terminal is a presentation-layer concern outside this crate.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Output {
    #[default]
    Empty,
    Text(String),
    Group(Vec<Output>),
}

impl Output {
    pub fn text(s: impl Into<String>) -> Self {
        Output::Text(s.into())
    }

    pub fn group(children: Vec<Output>) -> Self {
        Output::Group(children)
    }

    /// Concatenated text content, useful for asserting on committed output
    /// without caring about grouping.
    pub fn flatten(&self) -> String {
        match self {
            Output::Empty => String::new(),
            Output::Text(s) => s.clone(),
            Output::Group(children) => children.iter().map(Output::flatten).collect(),
        }
    }
}
