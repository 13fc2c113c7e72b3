//! Approval prompts.
//!
//! [`TerminalPrompt`] renders the proposed companies to a writer and reads the
//! reviewer's answer from a reader (stdin/stdout in the CLI, buffers in
//! tests). [`AutoApprove`] answers "approve" without asking.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use super::ApprovalPrompt;
use crate::domain::CompanyRecord;

/// Reviewer answer to one proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    Approved,
    Rejected { feedback: Option<String> },

    /// Input closed or the reviewer quit without answering
    Aborted,
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt error: {0}")]
    Other(String),
}

struct TerminalIo {
    reader: Mutex<BufReader<Box<dyn Read + Send>>>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl TerminalIo {
    fn write(&self, text: &str) -> Result<(), PromptError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| PromptError::Other(format!("writer lock poisoned: {}", e)))?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// One line of input, or `None` at EOF
    fn read_line(&self) -> Result<Option<String>, PromptError> {
        let mut reader = self
            .reader
            .lock()
            .map_err(|e| PromptError::Other(format!("reader lock poisoned: {}", e)))?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn interact(&self, rendered: &str) -> Result<PromptResponse, PromptError> {
        self.write(rendered)?;

        loop {
            let Some(line) = self.read_line()? else {
                return Ok(PromptResponse::Aborted);
            };

            match parse_answer(&line) {
                Some(Answer::Approve) => return Ok(PromptResponse::Approved),
                Some(Answer::Quit) => return Ok(PromptResponse::Aborted),
                Some(Answer::Reject(Some(feedback))) => {
                    return Ok(PromptResponse::Rejected {
                        feedback: Some(feedback),
                    })
                }
                Some(Answer::Reject(None)) => {
                    self.write("Feedback for the next proposal (optional): ")?;
                    return match self.read_line()? {
                        None => Ok(PromptResponse::Aborted),
                        Some(feedback) => Ok(PromptResponse::Rejected {
                            feedback: Some(feedback).filter(|f| !f.is_empty()),
                        }),
                    };
                }
                None => self.write("Please answer a, r or q\n> ")?,
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Approve,
    Reject(Option<String>),
    Quit,
}

fn parse_answer(input: &str) -> Option<Answer> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    match lower.as_str() {
        "a" | "approve" | "y" | "yes" => Some(Answer::Approve),
        "q" | "quit" => Some(Answer::Quit),
        "r" | "reject" | "n" | "no" => Some(Answer::Reject(None)),
        _ => {
            // "r <feedback>" or "reject: <feedback>"
            let rest = ["reject", "r"].iter().find_map(|prefix| {
                lower
                    .strip_prefix(prefix)
                    .filter(|r| r.starts_with(' ') || r.starts_with(':'))
                    .and_then(|r| trimmed.len().checked_sub(r.len()))
                    .and_then(|offset| trimmed.get(offset..))
            })?;

            let feedback = rest.trim_start_matches(':').trim().to_string();
            Some(Answer::Reject(Some(feedback).filter(|f| !f.is_empty())))
        }
    }
}

/// Render the proposal the way the reviewer sees it
pub fn render_proposal(companies: &[CompanyRecord]) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&format!("  PROPOSED COMPANIES ({})\n", companies.len()));
    out.push_str(&"-".repeat(60));
    out.push('\n');

    for (index, company) in companies.iter().enumerate() {
        out.push_str(&format!("  {}. {} ({})\n", index + 1, company.name, company.domain));
        if let Some(why) = &company.why_good_fit {
            out.push_str(&format!("     {}\n", why));
        }
    }

    out.push_str(&"-".repeat(60));
    out.push('\n');
    out.push_str("  [a]pprove  [r]eject with feedback  [q]uit (keeps this list)\n");
    out.push_str(&"=".repeat(60));
    out.push_str("\n> ");
    out
}

/// Prompt that reads answers from a terminal or any reader/writer pair
#[derive(Clone)]
pub struct TerminalPrompt {
    io: Arc<TerminalIo>,
}

impl TerminalPrompt {
    pub fn new(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            io: Arc::new(TerminalIo {
                reader: Mutex::new(BufReader::new(reader)),
                writer: Mutex::new(writer),
            }),
        }
    }

    /// Real stdin/stdout
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
    }

    /// Ask a yes/no question; anything but `y`/`yes` (including EOF) is no
    pub fn confirm(&self, question: &str) -> Result<bool, PromptError> {
        self.io.write(&format!("{} [y/N] ", question))?;
        Ok(matches!(
            self.io.read_line()?.map(|l| l.to_lowercase()).as_deref(),
            Some("y") | Some("yes")
        ))
    }
}

#[async_trait]
impl ApprovalPrompt for TerminalPrompt {
    async fn request_approval(
        &self,
        companies: &[CompanyRecord],
    ) -> Result<PromptResponse, PromptError> {
        let rendered = render_proposal(companies);
        let io = Arc::clone(&self.io);

        tokio::task::spawn_blocking(move || io.interact(&rendered))
            .await
            .map_err(|e| PromptError::Other(format!("prompt task failed: {}", e)))?
    }
}

/// Approves every proposal without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalPrompt for AutoApprove {
    async fn request_approval(
        &self,
        _companies: &[CompanyRecord],
    ) -> Result<PromptResponse, PromptError> {
        Ok(PromptResponse::Approved)
    }
}
