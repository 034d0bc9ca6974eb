use std::time::SystemTime;
use crate::message::Message;

/// The message size the benchmark uses unless told otherwise. It is small enough to fit the
///  fire-and-forget variant's single datagram.
pub const DEFAULT_MESSAGE_SIZE_KB: usize = 10;

/// Number of records in the payload for `size_kb == 0`. At roughly 290 KB, this payload
///  only works with protocols that chunk their messages.
const DEFAULT_NUM_RECORDS: usize = 1000;

fn record(i: usize) -> String {
    format!(
        "field{}: This is a detailed data record with multiple fields that might represent a database row or event log. \
        Including various data types and lengths to simulate real application data. Current iteration: {}, \
        Additional padding to reach desired size with some random values: {}-{}-{}",
        i, i, i * 2, i * 3, i * 4)
}

/// Newline separated text records that look like a database dump or an event log. The content
///  is exactly `size_kb` KiB long, or a fixed number of records for `size_kb == 0`.
pub fn generate_content(size_kb: usize) -> String {
    if size_kb == 0 {
        return (0..DEFAULT_NUM_RECORDS)
            .map(record)
            .collect::<Vec<_>>()
            .join("\n");
    }

    let target_len = size_kb * 1024;
    let mut content = String::with_capacity(target_len + 256);
    let mut i = 0;
    while content.len() < target_len {
        if i > 0 {
            content.push('\n');
        }
        content.push_str(&record(i));
        i += 1;
    }
    // records are pure ASCII, so any byte offset is a char boundary
    content.truncate(target_len);
    content
}

pub fn generate_message(number: u64, size_kb: usize) -> Message {
    message_with_content(number, generate_content(size_kb))
}

/// Wraps pre-generated content, so a benchmark run does not pay for generating it per message
pub fn message_with_content(number: u64, content: String) -> Message {
    Message {
        id: format!("msg-{}", number),
        timestamp: SystemTime::now(),
        content,
        number,
        is_valid: true,
    }
}
