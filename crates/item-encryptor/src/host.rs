//! JSON-lines host loop behind the `dbe-item` binary.
//!
//! Each input line is one [`ItemRequest`]. Records are processed on the
//! blocking pool, up to [`MAX_IN_FLIGHT`] at a time, and one response line is
//! written per record in input order. A failing record produces an
//! [`ErrorResponse`] line and never affects the others.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use common::protocol::{ErrorResponse, ItemRequest, ItemResponse, Operation};
use common::ServiceError;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::encryptor::ItemEncryptor;

/// Maximum number of records processed concurrently.
pub const MAX_IN_FLIGHT: usize = 64;

/// Outcome of one record: the response line and, on failure, its exit status.
struct Outcome {
    line: String,
    exit_code: Option<i32>,
}

/// Process every line of `input`, writing responses to `output`.
///
/// Returns the exit status of the first failed record, or `0`.
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails.
pub async fn run<R, W>(encryptor: Arc<ItemEncryptor>, input: R, mut output: W) -> Result<i32>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut pending: VecDeque<JoinHandle<Outcome>> = VecDeque::new();
    let mut exit_code = 0;
    let mut records = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        if line.trim().is_empty() {
            continue;
        }
        records += 1;
        let encryptor = Arc::clone(&encryptor);
        pending.push_back(tokio::task::spawn_blocking(move || process_line(&encryptor, &line)));

        if pending.len() >= MAX_IN_FLIGHT {
            if let Some(task) = pending.pop_front() {
                write_outcome(&mut output, task, &mut exit_code).await?;
            }
        }
    }
    while let Some(task) = pending.pop_front() {
        write_outcome(&mut output, task, &mut exit_code).await?;
    }
    output.flush().await.context("failed to flush output")?;

    info!(records, exit_code, "input processed");
    Ok(exit_code)
}

async fn write_outcome<W>(output: &mut W, task: JoinHandle<Outcome>, exit_code: &mut i32) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => failure(&ServiceError::Internal(format!("record task failed: {e}"))),
    };
    if let (0, Some(code)) = (*exit_code, outcome.exit_code) {
        *exit_code = code;
    }
    output
        .write_all(outcome.line.as_bytes())
        .await
        .context("failed to write response")?;
    output
        .write_all(b"\n")
        .await
        .context("failed to write response")?;
    Ok(())
}

fn process_line(encryptor: &ItemEncryptor, line: &str) -> Outcome {
    let request: ItemRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return failure(&ServiceError::BadRequest(format!("invalid request: {e}"))),
    };

    let result = match request.op {
        Operation::Encrypt => encryptor
            .encrypt_item(&request.item, &request.encryption_context)
            .map(|out| ItemResponse {
                item: out.encrypted_item,
                header: out.parsed_header.summary(),
                weakly_protected: Vec::new(),
            }),
        Operation::Decrypt => encryptor
            .decrypt_item(&request.item, &request.encryption_context)
            .map(|out| ItemResponse {
                item: out.plaintext_item,
                header: out.parsed_header.summary(),
                weakly_protected: out.weakly_protected,
            }),
    };

    match result {
        Ok(response) => match serde_json::to_string(&response) {
            Ok(line) => Outcome {
                line,
                exit_code: None,
            },
            Err(e) => failure(&ServiceError::Internal(format!("failed to encode response: {e}"))),
        },
        Err(err) => {
            let service = ServiceError::from(&err);
            warn!(op = ?request.op, code = service.code(), error = %err, "record failed");
            failure(&service)
        }
    }
}

fn failure(err: &ServiceError) -> Outcome {
    let response = ErrorResponse::new(err.code(), err.to_string());
    let line = serde_json::to_string(&response).unwrap_or_else(|_| {
        format!(r#"{{"code":"{}","message":"unencodable error"}}"#, err.code())
    });
    Outcome {
        line,
        exit_code: Some(err.exit_code()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::keys::RawAesKeyring;
    use serde_json::Value;

    fn encryptor() -> Arc<ItemEncryptor> {
        let table: TableConfig = serde_json::from_str(
            r#"{
                "table_name": "t",
                "partition_key_name": "id",
                "attribute_actions_on_encrypt": {"id": "SIGN_ONLY", "secret": "ENCRYPT_AND_SIGN"}
            }"#,
        )
        .unwrap();
        let keyring = Arc::new(RawAesKeyring::new("local", "k1", [1u8; 32]));
        Arc::new(ItemEncryptor::new(table, keyring).unwrap())
    }

    async fn run_lines(input: &str) -> (i32, Vec<Value>) {
        let mut out = Vec::new();
        let code = run(encryptor(), input.as_bytes(), &mut out).await.unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (code, lines)
    }

    #[tokio::test]
    async fn responses_follow_input_order() {
        let input = [
            r#"{"op":"encrypt","item":{"id":{"S":"a"},"secret":{"S":"x"}}}"#,
            "not json",
            r#"{"op":"encrypt","item":{"secret":{"S":"y"}}}"#,
            "",
            r#"{"op":"encrypt","item":{"id":{"S":"b"}}}"#,
        ]
        .join("\n");
        let (code, lines) = run_lines(&input).await;

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["item"]["id"]["S"], "a");
        assert!(lines[0]["item"]["secret"]["B"].is_string());
        assert_eq!(lines[1]["code"], "bad_request");
        assert_eq!(lines[2]["code"], "bad_request");
        assert_eq!(lines[3]["item"]["id"]["S"], "b");
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_through_host() {
        let (code, lines) =
            run_lines(r#"{"op":"encrypt","item":{"id":{"S":"a"},"secret":{"S":"x"}},"encryption_context":{"tenant":"acme"}}"#)
                .await;
        assert_eq!(code, 0);
        assert_eq!(lines[0]["header"]["stored_encryption_context"]["tenant"], "acme");

        let request = serde_json::json!({"op": "decrypt", "item": lines[0]["item"]});
        let (code, lines) = run_lines(&request.to_string()).await;
        assert_eq!(code, 0);
        assert_eq!(lines[0]["item"]["secret"]["S"], "x");
        assert!(lines[0].get("weakly_protected").is_none());
    }

    #[tokio::test]
    async fn tampered_record_reports_integrity_failure() {
        let (_, lines) = run_lines(r#"{"op":"encrypt","item":{"id":{"S":"a"},"secret":{"S":"x"}}}"#).await;
        let mut item = lines[0]["item"].clone();
        item["id"]["S"] = Value::from("b");
        let request = serde_json::json!({"op": "decrypt", "item": item});

        let (code, lines) = run_lines(&request.to_string()).await;
        assert_eq!(lines[0]["code"], "integrity_failure");
        assert_eq!(code, 3);
    }
}
