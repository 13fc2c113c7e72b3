//! Human review decisions.
//!
//! Decisions are transient: they travel from the approval prompt back into
//! the discovery stream and are never written to disk.

/// Decision delivered back into the event source for one interrupt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    /// Interrupt this decision answers
    pub interrupt_id: String,

    pub approved: bool,

    /// Reviewer feedback (rejections only)
    pub feedback: Option<String>,
}

impl ReviewDecision {
    pub fn approve(interrupt_id: impl Into<String>) -> Self {
        Self {
            interrupt_id: interrupt_id.into(),
            approved: true,
            feedback: None,
        }
    }

    /// Blank feedback is dropped
    pub fn reject(interrupt_id: impl Into<String>, feedback: Option<String>) -> Self {
        Self {
            interrupt_id: interrupt_id.into(),
            approved: false,
            feedback: feedback
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
        }
    }
}

/// Record of one answered interrupt, reported back to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRound {
    pub interrupt_id: String,
    pub companies_proposed: usize,
    pub approved: bool,
    pub feedback: Option<String>,

    /// True when approval came from an aborted prompt
    pub implicit: bool,
}
