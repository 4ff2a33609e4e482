//! Assistant orchestration.
//!
//! One logical request runs end to end through here: extract the date
//! reference, send the prompt, dispatch on the reply variant (plain answer
//! vs. tool invocation), normalize or wrap the result, and maintain the
//! per-session holiday list for follow-up turns.

use std::sync::Arc;

use chrono::Datelike;
use serde::Deserialize;

use jieri_core::{ApiResponse, DateRef, Holiday, HolidayListStore, Verdict, normalizer};
use jieri_core::verdict::Candidate;

use crate::calendar::CALENDAR_TOOL_NAME;
use crate::error::AgentError;
use crate::extract;
use crate::openai::{ChatMessage, Llm, LlmReply};
use crate::prompt;
use crate::tool::ToolRegistry;

/// Upper bound on consecutive tool rounds in one turn. The protocol expects
/// a single lookup followed by a final answer; anything past this is the
/// model looping.
const MAX_TOOL_ROUNDS: usize = 3;

/// The assistant: an LLM, the tools it may invoke, and the conversation
/// state shared across turns.
pub struct Assistant {
    llm: Arc<dyn Llm>,
    tools: ToolRegistry,
    store: HolidayListStore,
}

impl Assistant {
    /// Creates an assistant with no tools and a fresh store.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            tools: ToolRegistry::new(),
            store: HolidayListStore::new(),
        }
    }

    /// Replaces the tool registry.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Shares an existing conversation store instead of a fresh one.
    pub fn with_store(mut self, store: HolidayListStore) -> Self {
        self.store = store;
        self
    }

    /// Answers a single holiday-listing question.
    ///
    /// Questions without an extractable year/month yield the structured
    /// error payload; everything else yields a (possibly empty) listing.
    ///
    /// # Errors
    ///
    /// Collaborator failures (LLM or lookup) are surfaced unmodified.
    pub async fn answer(&self, question: &str) -> Result<ApiResponse, AgentError> {
        self.answer_message(question, ChatMessage::user(question)).await
    }

    /// Like [`Assistant::answer`], with an image attached to the question.
    pub async fn answer_with_image(
        &self,
        question: &str,
        image_data_url: &str,
    ) -> Result<ApiResponse, AgentError> {
        self.answer_message(question, ChatMessage::user_with_image(question, image_data_url))
            .await
    }

    async fn answer_message(
        &self,
        question: &str,
        message: ChatMessage,
    ) -> Result<ApiResponse, AgentError> {
        let Ok(date_ref) = DateRef::extract(question) else {
            tracing::warn!("question carries no extractable year/month");
            return Ok(ApiResponse::date_not_found());
        };

        let mut messages = prompt::listing_messages(message)?;
        let holidays = self.run_turn(&mut messages, date_ref).await?;
        Ok(ApiResponse::holidays(holidays))
    }

    /// Runs a two-turn conversation: the first question produces and stores
    /// a holiday list for the session, the second asks whether a candidate
    /// holiday is already in it.
    ///
    /// # Errors
    ///
    /// Collaborator failures are surfaced unmodified. A malformed membership
    /// reply is not an error: the deterministic fallback keeps the response
    /// shape intact.
    pub async fn follow_up(
        &self,
        session_id: &str,
        question1: &str,
        question2: &str,
    ) -> Result<ApiResponse, AgentError> {
        let Ok(date_ref) = DateRef::extract(question1) else {
            tracing::warn!("first question carries no extractable year/month");
            return Ok(ApiResponse::date_not_found());
        };

        let mut messages = prompt::conversation_messages(ChatMessage::user(question1))?;
        let holidays = self.run_turn(&mut messages, date_ref).await?;

        self.store.put(session_id, holidays.clone()).await;
        tracing::info!(
            session = session_id,
            count = holidays.len(),
            "stored holiday list for session"
        );

        // The stored list itself becomes the assistant turn in history, so
        // the membership judgment sees exactly what was stored.
        let answer1 = ApiResponse::holidays(holidays)
            .to_json()
            .map_err(|err| AgentError::Other(format!("failed to render first answer: {err}")))?;
        messages.push(ChatMessage::assistant(answer1));
        messages.push(ChatMessage::user(question2));

        let stored = self.store.get(session_id).await;
        let verdict = match self.llm.invoke(&messages, &[]).await? {
            LlmReply::Text(text) => self.verdict_from_text(&text, question2, &stored),
            LlmReply::ToolCall(call) => {
                tracing::warn!(tool = %call.name, "unexpected tool request on membership turn");
                fallback_verdict(question2, &stored)
            }
        };

        Ok(ApiResponse::verdict(verdict))
    }

    /// Sends the conversation, dispatching tool invocations until the model
    /// produces a final answer.
    ///
    /// When the holiday lookup ran, its structured records (restricted to
    /// the target month) are the result; a plain-text answer goes through
    /// the normalizer instead.
    async fn run_turn(
        &self,
        messages: &mut Vec<ChatMessage>,
        target: DateRef,
    ) -> Result<Vec<Holiday>, AgentError> {
        let specs = self.tools.specs();
        let mut lookup: Option<Vec<Holiday>> = None;

        for _ in 0..=MAX_TOOL_ROUNDS {
            match self.llm.invoke(messages, &specs).await? {
                LlmReply::Text(text) => {
                    return Ok(match lookup {
                        Some(records) => records,
                        None => holidays_from_text(&text, target),
                    });
                }
                LlmReply::ToolCall(call) => {
                    tracing::info!(tool = %call.name, "model requested tool invocation");
                    let result = self.tools.dispatch(&call).await?;
                    if call.name == CALENDAR_TOOL_NAME {
                        lookup = Some(lookup_records(&result, target));
                    }
                    messages.push(ChatMessage::assistant_tool_call(&call));
                    messages.push(ChatMessage::tool_result(&call.id, result));
                }
            }
        }

        Err(AgentError::ExecutionFailed(format!(
            "model kept requesting tools after {MAX_TOOL_ROUNDS} rounds"
        )))
    }

    fn verdict_from_text(&self, text: &str, question: &str, stored: &[Holiday]) -> Verdict {
        match extract::parse_json::<VerdictEnvelope>(text) {
            Ok(envelope) => match envelope.result.into_iter().next() {
                Some(verdict) => verdict,
                None => {
                    tracing::warn!("membership reply carried an empty result");
                    fallback_verdict(question, stored)
                }
            },
            Err(err) => {
                tracing::warn!(%err, "membership reply not in verdict shape, using fallback");
                fallback_verdict(question, stored)
            }
        }
    }
}

/// Deserialization target for tool results and membership replies.
#[derive(Deserialize)]
struct HolidayEnvelope {
    #[serde(rename = "Result")]
    result: Vec<Holiday>,
}

#[derive(Deserialize)]
struct VerdictEnvelope {
    #[serde(rename = "Result")]
    result: Vec<Verdict>,
}

/// Turns a model text answer into holiday records.
///
/// The prompt mandates the bare-JSON envelope, so a compliant answer is
/// wrapped directly (restricted to the target month). Free-text answers go
/// through the segment normalizer; an answer yielding neither is a valid
/// empty result.
fn holidays_from_text(text: &str, target: DateRef) -> Vec<Holiday> {
    if let Ok(envelope) = extract::parse_json::<HolidayEnvelope>(text) {
        return envelope
            .result
            .into_iter()
            .filter(|holiday| {
                holiday.date.year() == target.year && holiday.date.month() == target.month
            })
            .collect();
    }
    normalizer::normalize(text, target)
}

/// Wraps a lookup tool result directly, keeping only the target month.
fn lookup_records(result: &str, target: DateRef) -> Vec<Holiday> {
    match serde_json::from_str::<HolidayEnvelope>(result) {
        Ok(envelope) => envelope
            .result
            .into_iter()
            .filter(|holiday| {
                holiday.date.year() == target.year && holiday.date.month() == target.month
            })
            .collect(),
        Err(err) => {
            tracing::warn!(%err, "lookup result not in record shape");
            Vec::new()
        }
    }
}

/// Deterministic shape-preserving verdict for unparseable membership
/// replies: recover the candidate from the question, judge it against the
/// stored list.
fn fallback_verdict(question: &str, stored: &[Holiday]) -> Verdict {
    match extract::parse_json::<Candidate>(question) {
        Ok(candidate) => Verdict::fallback(&candidate, stored),
        Err(_) => Verdict::unidentified(stored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::openai::{ToolCallRequest, ToolSpec};
    use crate::tool::Tool;

    struct CallRecord {
        roles: Vec<&'static str>,
        tool_count: usize,
    }

    struct ScriptedLlm {
        replies: Mutex<VecDeque<LlmReply>>,
        calls: Mutex<Vec<CallRecord>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<LlmReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn invoke(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolSpec],
        ) -> Result<LlmReply, AgentError> {
            self.calls.lock().unwrap().push(CallRecord {
                roles: messages.iter().map(|m| m.role).collect(),
                tool_count: tools.len(),
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::ExecutionFailed("no scripted reply left".into()))
        }
    }

    struct StubCalendarTool;

    #[async_trait]
    impl Tool for StubCalendarTool {
        fn name(&self) -> &str {
            CALENDAR_TOOL_NAME
        }

        fn description(&self) -> &str {
            "stub lookup"
        }

        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }

        async fn call(&self, _input: &str) -> Result<String, AgentError> {
            // one record outside the target month, to prove filtering
            let records = vec![
                Holiday::from_ymd(2024, 10, 10, "國慶日").unwrap(),
                Holiday::from_ymd(2024, 10, 11, "重陽節").unwrap(),
                Holiday::from_ymd(2024, 11, 12, "國父誕辰紀念日").unwrap(),
            ];
            Ok(ApiResponse::holidays(records).to_json().unwrap())
        }
    }

    fn tool_call(name: &str) -> LlmReply {
        LlmReply::ToolCall(ToolCallRequest {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: r#"{"input":"2024-10"}"#.to_string(),
        })
    }

    #[tokio::test]
    async fn test_answer_without_date_reference() {
        let llm = Arc::new(ScriptedLlm::new(Vec::new()));
        let assistant = Assistant::new(llm.clone());

        let response = assistant.answer("台灣有哪些節日?").await.unwrap();
        assert_eq!(
            response.to_json().unwrap(),
            r#"{"Error":"無法從問題中提取日期資訊"}"#
        );
        // the model is never consulted
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_normalizes_plain_text_reply() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmReply::Text(
            "**國慶日** 10月10日".to_string(),
        )]));
        let assistant = Assistant::new(llm.clone());

        let response = assistant.answer("2024年台灣10月紀念日有哪些?").await.unwrap();
        assert_eq!(
            response.to_json().unwrap(),
            r#"{"Result":[{"date":"2024-10-10","name":"國慶日"}]}"#
        );

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        // system, few-shot pair, question
        assert_eq!(calls[0].roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(calls[0].tool_count, 0);
    }

    #[tokio::test]
    async fn test_answer_wraps_compliant_json_reply() {
        let reply = "```json\n{\"Result\": [{\"date\": \"2024-10-10\", \"name\": \"國慶日\"}, {\"date\": \"2023-10-10\", \"name\": \"去年的國慶日\"}]}\n```";
        let llm = Arc::new(ScriptedLlm::new(vec![LlmReply::Text(reply.to_string())]));
        let assistant = Assistant::new(llm);

        let response = assistant.answer("2024年台灣10月紀念日有哪些?").await.unwrap();
        // out-of-target records from the model are filtered away
        assert_eq!(
            response.to_json().unwrap(),
            r#"{"Result":[{"date":"2024-10-10","name":"國慶日"}]}"#
        );
    }

    #[tokio::test]
    async fn test_answer_with_no_matching_segments_is_empty_listing() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmReply::Text(
            "五月沒有特別的紀念日。".to_string(),
        )]));
        let assistant = Assistant::new(llm);

        let response = assistant.answer("2025年台灣5月紀念日有哪些?").await.unwrap();
        assert_eq!(response.to_json().unwrap(), r#"{"Result":[]}"#);
    }

    #[tokio::test]
    async fn test_answer_wraps_lookup_result_directly() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call(CALENDAR_TOOL_NAME),
            LlmReply::Text("已查詢完成".to_string()),
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubCalendarTool));
        let assistant = Assistant::new(llm.clone()).with_tools(registry);

        let response = assistant.answer("2024年台灣10月紀念日有哪些?").await.unwrap();
        // the out-of-month record from the tool is filtered away
        assert_eq!(
            response.to_json().unwrap(),
            r#"{"Result":[{"date":"2024-10-10","name":"國慶日"},{"date":"2024-10-11","name":"重陽節"}]}"#
        );

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_count, 1);
        // second round carries the echoed call and the tool result
        assert_eq!(
            calls[1].roles,
            vec!["system", "user", "assistant", "user", "assistant", "tool"]
        );
    }

    #[tokio::test]
    async fn test_answer_unknown_tool_propagates() {
        let llm = Arc::new(ScriptedLlm::new(vec![tool_call("no_such_tool")]));
        let assistant = Assistant::new(llm);

        let err = assistant
            .answer("2024年台灣10月紀念日有哪些?")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "no_such_tool"));
    }

    #[tokio::test]
    async fn test_follow_up_uses_model_verdict_when_parseable() {
        let verdict_reply = "```json\n{\"Result\": [{\"add\": false, \"reason\": \"該節日已存在於清單中\"}]}\n```";
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmReply::Text("**國慶日** 10月10日，**10月31日 - 蔣公誕辰紀念日**".to_string()),
            LlmReply::Text(verdict_reply.to_string()),
        ]));
        let store = HolidayListStore::new();
        let assistant = Assistant::new(llm.clone()).with_store(store.clone());

        let response = assistant
            .follow_up(
                "session-1",
                "2024年台灣10月紀念日有哪些?",
                "根據先前的節日清單，這個節日{\"date\": \"10-31\", \"name\": \"蔣公誕辰紀念日\"}是否有在該月份清單？",
            )
            .await
            .unwrap();

        assert_eq!(
            response.to_json().unwrap(),
            r#"{"Result":[{"add":false,"reason":"該節日已存在於清單中"}]}"#
        );

        // the first turn's list was stored for the session
        let stored = store.get("session-1").await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].name, "蔣公誕辰紀念日");

        // membership turn saw the prior turn in history
        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1].roles,
            vec!["system", "user", "assistant", "user", "assistant", "user"]
        );
    }

    #[tokio::test]
    async fn test_follow_up_falls_back_on_unparseable_verdict() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmReply::Text("**10月31日 - 蔣公誕辰紀念日**".to_string()),
            LlmReply::Text("我覺得應該已經在清單裡了。".to_string()),
        ]));
        let assistant = Assistant::new(llm);

        let response = assistant
            .follow_up(
                "session-2",
                "2024年台灣10月紀念日有哪些?",
                "根據先前的節日清單，這個節日{\"date\": \"10-31\", \"name\": \"蔣公誕辰紀念日\"}是否有在該月份清單？",
            )
            .await
            .unwrap();

        let ApiResponse::Verdicts { result } = &response else {
            panic!("expected verdict response, got {response:?}");
        };
        assert_eq!(result.len(), 1);
        assert!(!result[0].add);
        // the fallback reason enumerates the stored list
        assert!(result[0].reason.contains("蔣公誕辰紀念日 (2024-10-31)"));
    }

    #[tokio::test]
    async fn test_follow_up_without_date_reference() {
        let store = HolidayListStore::new();
        let llm = Arc::new(ScriptedLlm::new(Vec::new()));
        let assistant = Assistant::new(llm).with_store(store.clone());

        let response = assistant
            .follow_up("session-3", "台灣有哪些節日?", "第二個問題")
            .await
            .unwrap();

        assert_eq!(
            response.to_json().unwrap(),
            r#"{"Error":"無法從問題中提取日期資訊"}"#
        );
        assert!(store.get("session-3").await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_records_filters_and_tolerates_garbage() {
        let target = DateRef::new(2024, 10).unwrap();
        assert!(lookup_records("not json", target).is_empty());

        let json = r#"{"Result":[{"date":"2024-10-10","name":"國慶日"},{"date":"2023-10-10","name":"去年的國慶日"}]}"#;
        let records = lookup_records(json, target);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "國慶日");
    }
}
