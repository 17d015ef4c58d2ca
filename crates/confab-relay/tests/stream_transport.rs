// Drive send_stream against a local one-shot HTTP server emitting SSE bytes
// with adversarial segmentation: lines split across reads, a multi-byte
// UTF-8 character split between reads, the [DONE] sentinel, and an abrupt
// mid-body disconnect. Raw TCP rather than a framework server so each write
// lands in the client as its own read.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use confab_relay::openai::{CompletionError, CompletionRequest, OpenAiClient};
use confab_relay::prompt::{Message, Role};
use confab_relay::stream::{StreamEvent, UsageStats};

const EVENT_STREAM_HEAD: &str = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\r\n";

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-test".to_string(),
        messages: vec![Message {
            role: Role::User,
            content: "hi".to_string(),
        }],
    }
}

fn content_line(text: &str) -> String {
    format!(
        "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}},\"finish_reason\":null}}],\"usage\":null}}\n\n",
        serde_json::to_string(text).unwrap()
    )
}

fn usage_line(prompt: u32, completion: u32) -> String {
    format!(
        "data: {{\"choices\":[],\"usage\":{{\"prompt_tokens\":{prompt},\"completion_tokens\":{completion},\"total_tokens\":{}}}}}\n\n",
        prompt + completion
    )
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = socket.read(&mut tmp).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                return;
            }
        }
    }
}

/// Serve one connection: consume the request, answer with `head`, then write
/// the body `pieces` one at a time, pausing between writes so each piece
/// arrives in its own network read. The connection closes when the pieces
/// run out.
async fn serve_sse(head: &'static str, pieces: Vec<Vec<u8>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        for piece in pieces {
            tokio::time::sleep(Duration::from_millis(25)).await;
            socket.write_all(&piece).await.unwrap();
            socket.flush().await.unwrap();
        }
    });
    addr
}

async fn collect_stream(addr: SocketAddr) -> (Vec<StreamEvent>, Result<(), CompletionError>) {
    let client = OpenAiClient::new("sk-test".to_string(), Some(format!("http://{addr}")));
    let (tx, mut rx) = mpsc::channel(64);
    let result = client.send_stream(&request(), tx).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (events, result)
}

fn deltas(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk(c) => c.delta.clone(),
            _ => None,
        })
        .collect()
}

fn last_usage(events: &[StreamEvent]) -> Option<UsageStats> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk(c) => c.usage,
            _ => None,
        })
        .last()
}

#[tokio::test]
async fn utf8_character_split_across_reads_is_reassembled() {
    let line = content_line("café au lait").into_bytes();
    // Split between the two bytes of 'é'.
    let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
    let (left, right) = line.split_at(split);

    let mut tail = right.to_vec();
    tail.extend_from_slice(usage_line(42, 17).as_bytes());
    tail.extend_from_slice(b"data: [DONE]\n\n");

    let addr = serve_sse(EVENT_STREAM_HEAD, vec![left.to_vec(), tail]).await;
    let (events, result) = collect_stream(addr).await;

    assert!(result.is_ok());
    assert_eq!(deltas(&events), "café au lait");
    assert_eq!(
        last_usage(&events),
        Some(UsageStats {
            prompt_tokens: 42,
            completion_tokens: 17
        })
    );
}

#[tokio::test]
async fn line_split_across_reads_is_reassembled() {
    let first = content_line("Hello");
    let second = content_line(", world");

    // First line split mid-way; the [DONE] line itself split too.
    let (a, b) = first.as_bytes().split_at(20);
    let mut mid = b.to_vec();
    mid.extend_from_slice(second.as_bytes());
    mid.extend_from_slice(b"data: ");

    let addr = serve_sse(
        EVENT_STREAM_HEAD,
        vec![a.to_vec(), mid, b"[DONE]\n\n".to_vec()],
    )
    .await;
    let (events, result) = collect_stream(addr).await;

    assert!(result.is_ok());
    assert_eq!(deltas(&events), "Hello, world");
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn done_sentinel_ends_the_stream() {
    let mut body = content_line("before").into_bytes();
    body.extend_from_slice(b"data: [DONE]\n\n");
    body.extend_from_slice(content_line("after").as_bytes());

    let addr = serve_sse(EVENT_STREAM_HEAD, vec![body]).await;
    let (events, result) = collect_stream(addr).await;

    assert!(result.is_ok());
    assert_eq!(deltas(&events), "before");
}

#[tokio::test]
async fn mid_body_disconnect_surfaces_as_stream_error() {
    // Promise more body than is ever sent; closing the socket is then a
    // transport failure, not a clean end-of-stream.
    const TRUNCATED_HEAD: &str =
        "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 65536\r\n\r\n";

    let addr = serve_sse(TRUNCATED_HEAD, vec![content_line("partial").into_bytes()]).await;
    let (events, result) = collect_stream(addr).await;

    // Mid-stream failures ride the channel; the request itself was accepted.
    assert!(result.is_ok());
    assert_eq!(deltas(&events), "partial");
    assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
}
