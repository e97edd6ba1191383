//! `contextkeeper facts`: Extract durable facts from a transcript.

use std::path::Path;

use contextkeeper_core::memory::MemoryBlock;
use contextkeeper_core::message::{Message, Role};
use contextkeeper_memory::FactMemoryBlock;

use super::{load_config, model_from_config, read_input};

pub async fn run(transcript: &Path, max_facts: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let messages = parse_transcript(&read_input(transcript)?)?;
    if messages.is_empty() {
        println!("Transcript is empty, nothing to extract.");
        return Ok(());
    }

    let llm = model_from_config(&config)?.completion;
    let block = FactMemoryBlock::new(llm, max_facts.unwrap_or(config.memory.max_facts));

    eprint!("  Extracting from {} messages...", messages.len());
    let result = block.put(&messages).await;
    eprint!("\r{}\r", " ".repeat(48));
    result?;

    let facts = block.facts();
    if facts.is_empty() {
        println!("No facts found.");
        return Ok(());
    }
    println!("Facts ({} / max {}):", facts.len(), block.max_facts());
    for (i, fact) in facts.iter().enumerate() {
        println!("  {:>2}. {fact}", i + 1);
    }
    Ok(())
}

/// A JSON array of messages, or one `role: content` turn per line.
///
/// Lines without a known role prefix continue the previous turn.
fn parse_transcript(raw: &str) -> Result<Vec<Message>, String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| format!("Invalid transcript JSON: {e}"));
    }

    let mut messages: Vec<Message> = Vec::new();
    for line in trimmed.lines() {
        match split_role(line) {
            Some((role, content)) => messages.push(Message::new(role, content)),
            None => match messages.last_mut() {
                Some(last) => {
                    last.content.push('\n');
                    last.content.push_str(line);
                }
                None if line.trim().is_empty() => {}
                None => return Err(format!("Transcript line has no role prefix: {line}")),
            },
        }
    }
    Ok(messages)
}

fn split_role(line: &str) -> Option<(Role, &str)> {
    let (prefix, content) = line.split_once(':')?;
    let role = match prefix.trim().to_ascii_lowercase().as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => return None,
    };
    Some((role, content.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_lines() {
        let messages = parse_transcript(
            "user: I'm building a Raft demo\nassistant: Sounds fun.\nIt uses tokio?\nUser: yes",
        )
        .unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "Sounds fun.\nIt uses tokio?");
        assert_eq!(messages[2].content, "yes");
    }

    #[test]
    fn parses_json_array() {
        let messages = parse_transcript(
            r#"[{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]"#,
        )
        .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn rejects_unprefixed_start() {
        assert!(parse_transcript("hello there").is_err());
        assert!(parse_transcript("").unwrap().is_empty());
    }
}
