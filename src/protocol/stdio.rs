//! Line-delimited JSON stdio adapter.
//!
//! Each line on stdin is one [`super::ToolCall`]; each response is written
//! as one JSON line on stdout. No framing beyond newlines — callers pipe a
//! single tool envelope per line, same shape the HTTP adapter accepts in
//! its POST body.

use std::io::{self, BufRead, Write};

use tracing::{error, info, warn};

use super::{dispatch, ToolCall, ToolResponse};
use crate::graph::PulseHive;

/// Runs the stdio loop until stdin closes. Malformed lines get an error
/// response instead of killing the loop.
pub fn run(graph: &PulseHive) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    info!("stdio adapter listening on stdin");

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolCall>(&line) {
            Ok(call) => dispatch(graph, call),
            Err(e) => {
                warn!(error = %e, "malformed tool call on stdio");
                ToolResponse::Error {
                    error: crate::error::ToolError::Invalid {
                        field: "request".to_string(),
                        reason: e.to_string(),
                    },
                }
            }
        };

        let serialized = serde_json::to_string(&response).unwrap_or_else(|e| {
            error!(error = %e, "failed to serialize tool response");
            r#"{"status":"error","error":{"error":"internal","detail":"serialization failure"}}"#.to_string()
        });
        writeln!(stdout, "{serialized}")?;
        stdout.flush()?;
    }

    info!("stdio adapter shutting down (stdin closed)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[test]
    fn test_malformed_line_yields_error_response_not_panic() {
        let dir = tempdir().unwrap();
        let graph = PulseHive::open(dir.path().join("g.db"), Config::default()).unwrap();
        let response = match serde_json::from_str::<ToolCall>("not json") {
            Ok(call) => dispatch(&graph, call),
            Err(_) => ToolResponse::Error {
                error: crate::error::ToolError::Invalid {
                    field: "request".into(),
                    reason: "bad json".into(),
                },
            },
        };
        assert!(matches!(response, ToolResponse::Error { .. }));
    }
}
