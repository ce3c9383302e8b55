use std::env;
use std::io::{self, Write};

use act_core::Message;
use act_server::types::{ActMethod, ActReply, ActRequest, PlaceMessageRequest};
use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// `<method> <message json>`, e.g.
/// `placeOrderFIX {"message_type":"NewOrderSingle","fields":{"ClOrdID":"o-1"}}`
fn parse_command(id: u64, line: &str) -> Result<ActRequest> {
    let Some((method, message)) = line.split_once(char::is_whitespace) else {
        bail!("expected `<method> <message json>`");
    };
    let method: ActMethod = serde_json::from_value(serde_json::Value::String(method.to_string()))
        .with_context(|| format!("unknown method {method:?}"))?;
    let message: Message = serde_json::from_str(message.trim()).context("invalid message json")?;

    Ok(ActRequest {
        id,
        method,
        request: PlaceMessageRequest {
            message,
            parent_event_id: None,
            description: Some("act_client".to_string()),
        },
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Where to connect: env override or default.
    let addr = env::var("ACT_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:9100".to_string());

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut replies = BufReader::new(read_half).lines();
    println!("Connected.");
    println!("Type requests like:");
    println!(r#"  placeOrderFIX {{"message_type":"NewOrderSingle","fields":{{"ClOrdID":"o-1","Symbol":"EUR/USD"}}}}"#);
    println!(r#"  sendMessage {{"message_type":"News","fields":{{"Headline":"hello"}}}}"#);
    println!("Type 'quit' or 'exit' to leave.\n");

    let stdin = io::stdin();
    let mut next_id = 1;

    loop {
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!("\nEOF on stdin, exiting client.");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            println!("Exiting client.");
            break;
        }

        let request = match parse_command(next_id, trimmed) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("{e:#}");
                continue;
            }
        };
        next_id += 1;

        let mut out = serde_json::to_vec(&request)?;
        out.push(b'\n');
        write_half.write_all(&out).await?;

        // Acts block until the counterparty answers or the act times out.
        let Some(reply) = replies.next_line().await? else {
            println!("Server closed the connection.");
            break;
        };
        let reply: ActReply = serde_json::from_str(&reply)?;
        println!("{}", serde_json::to_string_pretty(&reply)?);
    }

    Ok(())
}
