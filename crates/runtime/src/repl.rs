//! Interactive read-evaluate-print loop.

use std::future::Future;
use std::io::{self, Write};

use crate::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// Typing this (any case) ends the loop.
pub const EXIT_COMMAND: &str = "quit";

pub const PROMPT: &str = "\nQuery: ";

/// Something that turns a query into an answer.
pub trait QueryHandler {
    fn handle(&self, query: &str) -> impl Future<Output = Result<String>>;
}

/// Where the loop is between two steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Processing(String),
    Terminated,
}

impl LoopState {
    /// State that follows reading `line`; `None` means end of input.
    pub fn after_read(line: Option<&str>) -> Self {
        let Some(line) = line else {
            return Self::Terminated;
        };
        let query = line.trim();
        if query.is_empty() {
            Self::AwaitingInput
        } else if query.eq_ignore_ascii_case(EXIT_COMMAND) {
            Self::Terminated
        } else {
            Self::Processing(query.to_string())
        }
    }
}

/// Run the loop until `quit` or end of input.
///
/// Query failures are printed and the loop carries on; only I/O errors on
/// `input` or `output` end it early.
pub async fn run<R, W, H>(input: R, output: &mut W, handler: &H) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    H: QueryHandler,
{
    let mut lines = input.lines();
    let mut state = LoopState::AwaitingInput;

    loop {
        state = match state {
            LoopState::AwaitingInput => {
                write!(output, "{PROMPT}")?;
                output.flush()?;
                LoopState::after_read(lines.next_line().await?.as_deref())
            }
            LoopState::Processing(query) => {
                match handler.handle(&query).await {
                    Ok(answer) => writeln!(output, "\n{answer}")?,
                    Err(e) => {
                        debug!(error = ?e, "query failed");
                        writeln!(output, "\nError: {e}")?;
                    }
                }
                output.flush()?;
                LoopState::AwaitingInput
            }
            LoopState::Terminated => return Ok(()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::RefCell;

    /// Echoes queries back, failing on any query containing "fail".
    #[derive(Default)]
    struct Echo {
        seen: RefCell<Vec<String>>,
    }

    impl QueryHandler for Echo {
        async fn handle(&self, query: &str) -> Result<String> {
            self.seen.borrow_mut().push(query.to_string());
            if query.contains("fail") {
                return Err(Error::MalformedToolCall {
                    name: "add".into(),
                    reason: "arguments are not valid JSON".into(),
                });
            }
            Ok(format!("echo: {query}"))
        }
    }

    async fn drive(input: &str) -> (String, Vec<String>) {
        let handler = Echo::default();
        let mut output = Vec::new();
        run(input.as_bytes(), &mut output, &handler).await.unwrap();
        (String::from_utf8(output).unwrap(), handler.seen.into_inner())
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(LoopState::after_read(None), LoopState::Terminated);
        assert_eq!(LoopState::after_read(Some("   ")), LoopState::AwaitingInput);
        assert_eq!(LoopState::after_read(Some("  QuIt ")), LoopState::Terminated);
        assert_eq!(
            LoopState::after_read(Some(" add 1 and 2 ")),
            LoopState::Processing("add 1 and 2".into())
        );
        assert_eq!(
            LoopState::after_read(Some("quit now")),
            LoopState::Processing("quit now".into())
        );
    }

    #[tokio::test]
    async fn answers_until_quit() {
        let (output, seen) = drive("hello\nquit\nnever read\n").await;
        assert_eq!(seen, ["hello"]);
        assert_eq!(output, "\nQuery: \necho: hello\n\nQuery: ");
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (output, seen) = drive("\n   \nhi\n").await;
        assert_eq!(seen, ["hi"]);
        assert_eq!(output.matches("Query: ").count(), 4);
    }

    #[tokio::test]
    async fn errors_are_reported_and_loop_continues() {
        let (output, seen) = drive("please fail\nthen succeed\nQUIT\n").await;
        assert_eq!(seen, ["please fail", "then succeed"]);
        assert!(output.contains("\nError: malformed call to add: arguments are not valid JSON\n"));
        assert!(output.contains("\necho: then succeed\n"));
    }

    #[tokio::test]
    async fn end_of_input_terminates() {
        let (output, seen) = drive("").await;
        assert!(seen.is_empty());
        assert_eq!(output, PROMPT);
    }
}
