//! Prompt assembly.
//!
//! Builds the message lists sent to the model: a system instruction
//! mandating the bare-JSON answer shape, a worked few-shot example
//! demonstrating it, optional prior turns, then the user question.

use jieri_core::Holiday;

use crate::error::AgentError;
use crate::openai::ChatMessage;

/// System instruction for single-turn holiday listing questions.
pub const LISTING_SYSTEM_PROMPT: &str = "\
你是一位台灣日曆專家，負責回答有關特定月份的台灣節日問題。
當回答問題時，請務必返回以下格式的 JSON，並且不要加上 ```json 或 ``` 等標記:
{
    \"Result\": [
        {
            \"date\": \"YYYY-MM-DD\",
            \"name\": \"節日名稱\"
        },
        ...
    ]
}
僅列出該月份的相關紀念日，其他資訊請不要包含。";

/// System instruction for two-turn conversations, covering both the listing
/// shape and the membership verdict shape.
pub const CONVERSATION_SYSTEM_PROMPT: &str = "\
你是一位台灣日曆專家，負責回答有關特定月份的台灣節日問題。
當回答有關某月份的節日問題時，請務必返回以下格式的 JSON，並且不要加上 ```json 或 ``` 等標記:
{
    \"Result\": [
        {
            \"date\": \"YYYY-MM-DD\",
            \"name\": \"節日名稱\"
        },
        ...
    ]
}
僅列出該月份的相關紀念日，其他資訊請不要包含。

當回答有關節日是否在先前節日清單中的問題時，請務必返回以下格式的 JSON:
add表示是否需要將節日新增到節日清單中。根據問題判斷該節日是否存在於清單中，如果不存在，則為 true;否則為false。
reason必須描述為什麼需要或不需要新增節日，具體說明是否該節日已經存在於清單中，以及當前清單的內容。
{
    \"Result\": [
        {
            \"add\": true/false,
            \"reason\": \"...\"
        }
    ]
}";

/// The worked example every prompt carries: question and the exact target
/// JSON shape.
pub fn few_shot_messages() -> Result<Vec<ChatMessage>, AgentError> {
    let example_list = [(2024, 10, 10, "國慶日"), (2024, 10, 11, "重陽節")]
        .into_iter()
        .map(|(year, month, day, name)| Holiday::from_ymd(year, month, day, name))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| AgentError::Other(format!("failed to build few-shot example: {err}")))?;

    let example_output = jieri_core::ApiResponse::holidays(example_list)
        .to_json()
        .map_err(|err| AgentError::Other(format!("failed to render few-shot example: {err}")))?;

    Ok(vec![
        ChatMessage::user("2024年台灣10月紀念日有哪些?"),
        ChatMessage::assistant(example_output),
    ])
}

/// Messages for a single-turn listing question.
pub fn listing_messages(question: ChatMessage) -> Result<Vec<ChatMessage>, AgentError> {
    let mut messages = vec![ChatMessage::system(LISTING_SYSTEM_PROMPT)];
    messages.extend(few_shot_messages()?);
    messages.push(question);
    Ok(messages)
}

/// Messages opening a multi-turn conversation with the first question.
pub fn conversation_messages(question: ChatMessage) -> Result<Vec<ChatMessage>, AgentError> {
    let mut messages = vec![ChatMessage::system(CONVERSATION_SYSTEM_PROMPT)];
    messages.extend(few_shot_messages()?);
    messages.push(question);
    Ok(messages)
}
