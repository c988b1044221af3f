//! Yes/no prompt in front of destructive operations.

/// What the user is asked before something is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
    pub title: String,
    pub message: String,
    /// Rows that will go, when known up front.
    pub count: Option<usize>,
}

impl DeletePrompt {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: "تأكيد الحذف".to_string(),
            message: message.into(),
            count: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

pub trait Confirm {
    fn confirm(&self, prompt: &DeletePrompt) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&DeletePrompt) -> bool,
{
    fn confirm(&self, prompt: &DeletePrompt) -> bool {
        self(prompt)
    }
}

/// Answer already given by the frontend's own dialog.
#[derive(Debug, Clone, Copy)]
pub struct Answered(pub bool);

impl Confirm for Answered {
    fn confirm(&self, _prompt: &DeletePrompt) -> bool {
        self.0
    }
}
